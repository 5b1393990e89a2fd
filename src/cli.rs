use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::engine::{Engine, EngineConfig};
use crate::gpu::{PresentRegion, Renderer};
use crate::preset;
use crate::render_job::{RenderError, RenderJobSpec, RenderMetadata, RenderPhase, RenderProgress};
use crate::shader_assembler::{self, ShaderConfig};
use crate::viewer::{self, ViewerOptions};

/// Format of headless frames. Unorm keeps shader output values as written.
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk
    Render {
        /// Render job JSON; other flags are ignored when given
        #[arg(long)]
        job: Option<PathBuf>,

        /// Output directory for frames
        #[arg(long, required_unless_present = "job")]
        out: Option<PathBuf>,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Duration in seconds
        #[arg(long, default_value_t = 5.0)]
        duration: f32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Preset applied before the first frame
        #[arg(long)]
        preset: Option<PathBuf>,

        /// Engine config JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Palette seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Open the live viewer
    View {
        #[arg(long, default_value_t = 1280)]
        width: u32,

        #[arg(long, default_value_t = 720)]
        height: u32,

        #[arg(long)]
        preset: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Image shown in overlay mode
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Print the generated WGSL program
    Shader {
        /// Take the configuration from a preset instead of the flags
        #[arg(long)]
        preset: Option<PathBuf>,

        /// Print the UV-feedback program instead
        #[arg(long)]
        uv: bool,

        #[arg(long, default_value_t = 0)]
        shape: i64,

        #[arg(long, default_value_t = 0)]
        mode: i64,

        #[arg(long, default_value_t = 0)]
        crunch: i64,

        #[arg(long, default_value_t = 0)]
        displace: i64,

        /// Treat the displacement amplitude as non-zero
        #[arg(long)]
        displace_on: bool,

        #[arg(long, default_value_t = 0)]
        effect: i64,

        #[arg(long, default_value_t = 0)]
        color: i64,

        #[arg(long, default_value_t = 0)]
        fog: i64,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { job, out, fps, duration, width, height, preset, config, seed } => {
            let spec = match job {
                Some(path) => RenderJobSpec::from_file(&path).map_err(anyhow::Error::msg)?,
                None => RenderJobSpec {
                    output_dir: out.unwrap_or_else(|| PathBuf::from("frames")),
                    fps,
                    duration,
                    width,
                    height,
                    preset_path: preset,
                    config_path: config,
                    seed,
                },
            };
            let metadata = pollster::block_on(render_offline(&spec))?;
            println!(
                "Rendered {} frames in {:.1}s ({:.1} fps)",
                metadata.frame_count, metadata.render_duration_secs, metadata.average_render_fps
            );
        }
        Commands::View { width, height, preset, config, image } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => EngineConfig::default(),
            };
            viewer::run(ViewerOptions { width, height, config, preset, image })?;
        }
        Commands::Shader { preset, uv, shape, mode, crunch, displace, displace_on, effect, color, fog } => {
            if uv {
                println!("{}", shader_assembler::build_uv_feedback());
                return Ok(());
            }
            let config = match preset {
                Some(path) => {
                    let mut engine = Engine::default();
                    preset::load_preset_file(&mut engine, &path)?;
                    engine.shader_config()
                }
                None => ShaderConfig {
                    shape_type: shape,
                    shape_mode: mode,
                    displacement_type: displace,
                    displacement_amp_nonzero: displace_on,
                    sdf_effect_type: effect,
                    color_type: color,
                    crunch_type: crunch,
                    fog_enabled: fog,
                },
            };
            eprintln!("// {}", config);
            println!("{}", shader_assembler::build(&config));
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(EngineConfig::from_json(&text)?)
}

/// Render a job to PNG frames plus `metadata.json`.
pub async fn render_offline(spec: &RenderJobSpec) -> Result<RenderMetadata, RenderError> {
    let started_at = chrono::Utc::now();
    let clock = Instant::now();
    let mut warnings = Vec::new();

    spec.validate()
        .map_err(|e| RenderError::new(RenderPhase::Initialization, e))?;
    std::fs::create_dir_all(&spec.output_dir).map_err(|e| {
        RenderError::with_source(RenderPhase::Initialization, "cannot create output directory", e)
    })?;

    let mut config = match &spec.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                RenderError::with_source(RenderPhase::Initialization, "cannot read config", e)
            })?;
            EngineConfig::from_json(&text).map_err(|e| {
                RenderError::with_source(RenderPhase::Initialization, "invalid config", e)
            })?
        }
        None => EngineConfig::default(),
    };
    if spec.seed.is_some() {
        config.palette_seed = spec.seed;
    }
    if config.palette_seed.is_none() {
        warnings.push("No palette seed; initial palette is random".to_string());
    }

    let mut engine = Engine::new(config);
    engine.resize(spec.width, spec.height);

    let preset_hash = match &spec.preset_path {
        Some(path) => {
            preset::load_preset_file(&mut engine, path).map_err(|e| {
                RenderError::with_source(RenderPhase::PresetLoading, format!("{}", path.display()), e)
            })?;
            Some(RenderMetadata::hash_file(path).map_err(|e| {
                RenderError::with_source(RenderPhase::PresetLoading, "cannot hash preset", e)
            })?)
        }
        None => None,
    };

    // WGPU Init
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| RenderError::new(RenderPhase::GpuSetup, "No adapter found"))?;
    let gpu_adapter = adapter.get_info().name;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .map_err(|e| RenderError::with_source(RenderPhase::GpuSetup, "request_device failed", e))?;

    let (width, height) = (spec.width, spec.height);
    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };
    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Rows are padded to the copy alignment.
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let (rw, rh) = engine.render_size();
    let mut renderer = Renderer::new(device, queue, OUTPUT_FORMAT, rw, rh);

    let total_frames = spec.frame_count();
    let dt = spec.frame_dt();
    log::info!("Rendering {} frames to {:?}", total_frames, spec.output_dir);

    for i in 0..total_frames {
        let plan = engine.advance_frame(dt);
        renderer.execute(&plan, &engine, &texture_view, PresentRegion::from_engine(&engine));

        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        renderer.queue().submit(Some(encoder.finish()));

        let pixels = read_frame(&renderer, &output_buffer, width, height, padded_bytes_per_row)
            .map_err(|e| RenderError::new(RenderPhase::FrameRender, format!("frame {}: {}", i, e)))?;

        let frame_path = spec.frame_path(i);
        image::save_buffer(&frame_path, &pixels, width, height, image::ColorType::Rgba8).map_err(|e| {
            RenderError::with_source(RenderPhase::FrameSave, format!("{}", frame_path.display()), e)
        })?;

        if i % 60 == 0 {
            let progress = RenderProgress::new(i + 1, total_frames, clock.elapsed().as_secs_f64());
            log::info!(
                "Frame {}/{} ({:.0}%, eta {:.1}s)",
                progress.current_frame,
                progress.total_frames,
                progress.percentage(),
                progress.eta_secs.unwrap_or(0.0)
            );
        }
    }

    let elapsed = clock.elapsed().as_secs_f64();
    let program = engine.program();
    let metadata = RenderMetadata {
        job: spec.clone(),
        started_at,
        completed_at: chrono::Utc::now(),
        render_duration_secs: elapsed,
        frame_count: total_frames,
        average_render_fps: if elapsed > 0.0 { total_frames as f64 / elapsed } else { 0.0 },
        preset_hash,
        shader_fingerprint: program.fingerprint.clone(),
        shader_generation: program.generation,
        raymarcher_version: env!("CARGO_PKG_VERSION").to_string(),
        gpu_adapter,
        warnings,
    };
    metadata
        .save(&spec.metadata_path())
        .map_err(|e| RenderError::new(RenderPhase::MetadataSave, e))?;

    Ok(metadata)
}

/// Map the readback buffer and strip row padding.
fn read_frame(
    renderer: &Renderer,
    buffer: &wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
) -> Result<Vec<u8>, String> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |v| {
        let _ = tx.send(v);
    });
    renderer.device().poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    let data = slice.get_mapped_range();
    let row = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height {
        let start = (y * padded_bytes_per_row) as usize;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    drop(data);
    buffer.unmap();
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_args_parse() {
        let cli = Cli::try_parse_from(["raymarcher", "render", "--out", "frames", "--seed", "7"]).unwrap();
        match cli.command {
            Commands::Render { out, fps, seed, job, .. } => {
                assert_eq!(out, Some(PathBuf::from("frames")));
                assert_eq!(fps, 60.0);
                assert_eq!(seed, Some(7));
                assert!(job.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_render_requires_out_or_job() {
        assert!(Cli::try_parse_from(["raymarcher", "render"]).is_err());
        assert!(Cli::try_parse_from(["raymarcher", "render", "--job", "job.json"]).is_ok());
    }

    #[test]
    fn test_shader_args_parse() {
        let cli = Cli::try_parse_from(["raymarcher", "shader", "--shape", "3", "--displace-on"]).unwrap();
        match cli.command {
            Commands::Shader { shape, displace_on, uv, .. } => {
                assert_eq!(shape, 3);
                assert!(displace_on);
                assert!(!uv);
            }
            _ => panic!("expected shader"),
        }
    }
}
