//! GPU renderer for the raymarch engine.
//!
//! Owns both feedback pairs, the UV-feedback and raymarch pipelines, the
//! overlay texture and the post chain, and executes an engine [`FramePlan`]
//! step by step.

use crate::engine::{Engine, FramePlan, FrameStep};
use crate::feedback::{FeedbackLoop, FeedbackPair};
use crate::gpu::pipeline::{
    create_fullscreen_pipeline, create_linear_sampler, create_quad_buffer, create_uniform_buffer,
    draw_fullscreen, post_source, sampler_entry, single_texture_layout, texture_bind_group,
    texture_entry, uniform_bind_group, uniform_layout, RenderTarget, HDR_FORMAT,
};
use crate::gpu::post_processor::PostProcessor;
use crate::params;
use crate::shader_assembler;

/// Raymarch pipeline tagged with the program generation it was built from.
struct RaymarchPipeline {
    generation: u64,
    pipeline: wgpu::RenderPipeline,
}

/// Overlay image on the GPU. Generation 0 is the 1x1 placeholder.
struct OverlayTexture {
    generation: u64,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Where and how the final frame lands on the output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PresentRegion {
    /// `(x, y, w, h)` in output pixels; `None` fills the output.
    pub viewport: Option<(f32, f32, f32, f32)>,
    pub background: wgpu::Color,
}

impl PresentRegion {
    pub const FULL: PresentRegion = PresentRegion {
        viewport: None,
        background: wgpu::Color::BLACK,
    };

    /// Gallery framing from the engine, or the full output.
    pub fn from_engine(engine: &Engine) -> Self {
        if !engine.gallery.enabled {
            return Self::FULL;
        }
        let [r, g, b] = engine.gallery.bg_rgb();
        Self {
            viewport: Some(engine.viewport()),
            background: wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: 1.0 },
        }
    }
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,

    width: u32,
    height: u32,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    uv_pair: FeedbackPair<RenderTarget>,
    main_pair: FeedbackPair<RenderTarget>,
    /// Post chain output, presented to the caller's view.
    frame: RenderTarget,

    uv_pipeline: wgpu::RenderPipeline,
    uv_textures_layout: wgpu::BindGroupLayout,
    main_textures_layout: wgpu::BindGroupLayout,
    main_layout_uniforms: wgpu::BindGroupLayout,
    raymarch: Option<RaymarchPipeline>,
    overlay: OverlayTexture,

    post: PostProcessor,

    present_pipeline: wgpu::RenderPipeline,
    present_layout: wgpu::BindGroupLayout,
    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    feedback_needs_clear: bool,
}

impl Renderer {
    /// `output_format` is the format of the views passed to [`Renderer::execute`].
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let uniforms_layout = uniform_layout(&device, "Uniform Block Layout");
        let uniform_buffer = create_uniform_buffer(
            &device,
            "Uniform Block Buffer",
            params::uniform_layout().size as u64,
        );
        let uniform_bind_group =
            uniform_bind_group(&device, "Uniform Block Bind Group", &uniforms_layout, &uniform_buffer);

        let uv_textures_layout = single_texture_layout(&device, "UV Feedback Texture Layout");
        let main_textures_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Raymarch Texture Layout"),
            entries: &[texture_entry(0), texture_entry(1), texture_entry(2), sampler_entry(3)],
        });

        let uv_pipeline = create_fullscreen_pipeline(
            &device,
            FeedbackLoop::Uv.label(),
            &shader_assembler::build_uv_feedback(),
            &[&uniforms_layout, &uv_textures_layout],
            HDR_FORMAT,
        );

        let present_layout = single_texture_layout(&device, "Present Texture Layout");
        let present_pipeline = create_fullscreen_pipeline(
            &device,
            "Present",
            &post_source(include_str!("shader_present.wgsl")),
            &[&present_layout],
            output_format,
        );

        let overlay = Self::create_overlay(&device, &queue, 0, 1, 1, &[0, 0, 0, 255]);
        let post = PostProcessor::new(&device, HDR_FORMAT, width, height);

        let (uv_pair, main_pair, frame) = Self::create_targets(&device, width, height);

        Self {
            quad_vertex_buffer: create_quad_buffer(&device, "Fullscreen Quad Buffer"),
            sampler: create_linear_sampler(&device, "Renderer Sampler"),
            device,
            queue,
            width,
            height,
            uniform_buffer,
            uniform_bind_group,
            uv_pair,
            main_pair,
            frame,
            uv_pipeline,
            uv_textures_layout,
            main_textures_layout,
            main_layout_uniforms: uniforms_layout,
            raymarch: None,
            overlay,
            post,
            present_pipeline,
            present_layout,
            feedback_needs_clear: true,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn create_targets(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (FeedbackPair<RenderTarget>, FeedbackPair<RenderTarget>, RenderTarget) {
        let target = |label: &str| RenderTarget::new(device, label, HDR_FORMAT, width, height);
        (
            FeedbackPair::new(target("UV Feedback A"), target("UV Feedback B")),
            FeedbackPair::new(target("Main Feedback A"), target("Main Feedback B")),
            target("Frame"),
        )
    }

    fn create_overlay(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        generation: u64,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> OverlayTexture {
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Image Overlay"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        OverlayTexture { generation, _texture: texture, view }
    }

    /// Recreate every size-dependent target. Feedback history is discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;

        let target = |label: &str| RenderTarget::new(&self.device, label, HDR_FORMAT, width, height);
        self.uv_pair.replace(target("UV Feedback A"), target("UV Feedback B"));
        self.main_pair.replace(target("Main Feedback A"), target("Main Feedback B"));
        self.frame = target("Frame");
        self.post.resize(&self.device, width, height);
        self.feedback_needs_clear = true;
        log::debug!("Render targets resized to {}x{}", width, height);
    }

    /// Bring GPU state in line with the engine: size, uniforms, program, overlay.
    fn sync(&mut self, engine: &Engine) {
        let (w, h) = engine.render_size();
        self.resize(w, h);

        self.queue.write_buffer(&self.uniform_buffer, 0, &engine.uniform_bytes());

        let program = engine.program();
        let stale = self
            .raymarch
            .as_ref()
            .map_or(true, |r| r.generation != program.generation);
        if stale {
            let pipeline = create_fullscreen_pipeline(
                &self.device,
                "Raymarch",
                &program.source,
                &[&self.main_layout_uniforms, &self.main_textures_layout],
                HDR_FORMAT,
            );
            log::info!(
                "Raymarch pipeline created (generation {}, {})",
                program.generation,
                &program.fingerprint[..12.min(program.fingerprint.len())]
            );
            self.raymarch = Some(RaymarchPipeline { generation: program.generation, pipeline });
        }

        if let Some(image) = engine.params().image() {
            if image.generation != self.overlay.generation {
                let expected = image.width as usize * image.height as usize * 4;
                if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
                    log::warn!(
                        "Ignoring overlay with {} bytes for {}x{}",
                        image.rgba.len(),
                        image.width,
                        image.height
                    );
                    self.overlay.generation = image.generation;
                } else {
                    self.overlay = Self::create_overlay(
                        &self.device,
                        &self.queue,
                        image.generation,
                        image.width,
                        image.height,
                        &image.rgba,
                    );
                }
            }
        }
    }

    /// Clear both feedback pairs to black.
    fn clear_feedback(&self, encoder: &mut wgpu::CommandEncoder) {
        let targets = [
            self.uv_pair.read(),
            self.uv_pair.write(),
            self.main_pair.read(),
            self.main_pair.write(),
        ];
        for target in targets {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Feedback Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
    }

    /// Execute one frame plan, presenting into `output`.
    ///
    /// Each step is recorded and submitted in order; swaps take effect
    /// between submissions so a pass never samples the target it writes.
    pub fn execute(
        &mut self,
        plan: &FramePlan,
        engine: &Engine,
        output: &wgpu::TextureView,
        region: PresentRegion,
    ) {
        self.sync(engine);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        if self.feedback_needs_clear {
            self.clear_feedback(&mut encoder);
            self.feedback_needs_clear = false;
        }

        for step in plan {
            match step {
                FrameStep::UvPass => self.uv_pass(&mut encoder),
                FrameStep::SwapUv => self.uv_pair.swap(),
                FrameStep::PresentUv => {
                    self.present(&mut encoder, &self.uv_pair.read().view, output, region)
                }
                FrameStep::MainPass => self.main_pass(&mut encoder),
                FrameStep::SwapMain => self.main_pair.swap(),
                FrameStep::PostChain => {
                    self.post.process(
                        &self.device,
                        &mut encoder,
                        &self.queue,
                        &self.main_pair.read().view,
                        &self.frame.view,
                        &engine.post,
                    );
                    self.present(&mut encoder, &self.frame.view, output, region);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn uv_pass(&self, encoder: &mut wgpu::CommandEncoder) {
        let textures = texture_bind_group(
            &self.device,
            "UV Feedback Texture Bind Group",
            &self.uv_textures_layout,
            &self.uv_pair.read().view,
            &self.sampler,
        );
        draw_fullscreen(
            encoder,
            "UV Feedback Pass",
            &self.uv_pair.write().view,
            wgpu::Color::BLACK,
            None,
            &self.uv_pipeline,
            &[&self.uniform_bind_group, &textures],
            &self.quad_vertex_buffer,
        );
    }

    fn main_pass(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(raymarch) = &self.raymarch else {
            return;
        };
        let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raymarch Texture Bind Group"),
            layout: &self.main_textures_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.uv_pair.read().view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.main_pair.read().view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.overlay.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        draw_fullscreen(
            encoder,
            "Raymarch Pass",
            &self.main_pair.write().view,
            wgpu::Color::BLACK,
            None,
            &raymarch.pipeline,
            &[&self.uniform_bind_group, &textures],
            &self.quad_vertex_buffer,
        );
    }

    fn present(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
        region: PresentRegion,
    ) {
        let group = texture_bind_group(
            &self.device,
            "Present Bind Group",
            &self.present_layout,
            input,
            &self.sampler,
        );
        draw_fullscreen(
            encoder,
            "Present Pass",
            output,
            region.background,
            region.viewport,
            &self.present_pipeline,
            &[&group],
            &self.quad_vertex_buffer,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::gallery::GalleryAspect;

    #[test]
    fn test_present_region_follows_gallery() {
        let mut engine = Engine::new(EngineConfig { palette_seed: Some(1), ..Default::default() });
        engine.resize(1000, 500);
        assert_eq!(PresentRegion::from_engine(&engine), PresentRegion::FULL);

        engine.gallery.set_aspect(GalleryAspect::Square);
        engine.gallery.bg_color = "#ff0000".to_string();
        engine.apply_size();
        let region = PresentRegion::from_engine(&engine);
        assert_eq!(region.viewport, Some((375.0, 125.0, 250.0, 250.0)));
        assert_eq!(region.background, wgpu::Color { r: 1.0, g: 0.0, b: 0.0, a: 1.0 });
    }
}
