//! Live viewer window.
//!
//! Drives the engine from the winit event loop: one `advance_frame` per
//! redraw, keyboard shortcuts for the common scene actions, and surface
//! reconfiguration on resize or loss.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::engine::{Engine, EngineConfig, FramePlan};
use crate::gpu::{PresentRegion, Renderer};
use crate::{preset, scene_actions};

/// Something a key press asks the viewer to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerAction {
    TogglePause,
    ToggleUvDebug,
    RandomizeShape,
    RandomizeEffect,
    RandomizePalette,
    SavePreset,
    CuratedPalette(usize),
    Quit,
}

pub fn action_for_key(code: KeyCode) -> Option<ViewerAction> {
    let action = match code {
        KeyCode::Space => ViewerAction::TogglePause,
        KeyCode::KeyU => ViewerAction::ToggleUvDebug,
        KeyCode::KeyR => ViewerAction::RandomizeShape,
        KeyCode::KeyE => ViewerAction::RandomizeEffect,
        KeyCode::KeyC => ViewerAction::RandomizePalette,
        KeyCode::KeyS => ViewerAction::SavePreset,
        KeyCode::Digit1 => ViewerAction::CuratedPalette(0),
        KeyCode::Digit2 => ViewerAction::CuratedPalette(1),
        KeyCode::Digit3 => ViewerAction::CuratedPalette(2),
        KeyCode::Digit4 => ViewerAction::CuratedPalette(3),
        KeyCode::Digit5 => ViewerAction::CuratedPalette(4),
        KeyCode::Digit6 => ViewerAction::CuratedPalette(5),
        KeyCode::Digit7 => ViewerAction::CuratedPalette(6),
        KeyCode::Escape => ViewerAction::Quit,
        _ => return None,
    };
    Some(action)
}

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub width: u32,
    pub height: u32,
    pub config: EngineConfig,
    pub preset: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

/// Apply a key action to the engine. Returns an immediate plan when the
/// scene should be re-presented without advancing, `None` otherwise.
fn apply_action(
    engine: &mut Engine,
    rng: &mut fastrand::Rng,
    action: ViewerAction,
) -> Option<FramePlan> {
    match action {
        ViewerAction::TogglePause => {
            let paused = engine.toggle_pause();
            log::info!("{}", if paused { "Paused" } else { "Resumed" });
        }
        ViewerAction::ToggleUvDebug => {
            let enabled = !engine.debug_uv();
            engine.set_debug_uv(enabled);
            log::info!("UV debug {}", if enabled { "on" } else { "off" });
        }
        ViewerAction::RandomizeShape => scene_actions::randomize_shape(engine, rng),
        ViewerAction::RandomizeEffect => scene_actions::randomize_sdf_effect(engine, rng),
        ViewerAction::RandomizePalette => scene_actions::randomize_palette(engine, rng),
        ViewerAction::CuratedPalette(index) => {
            scene_actions::curated_palette(engine, index);
        }
        ViewerAction::SavePreset => {
            let now = chrono::Utc::now();
            let path = PathBuf::from(format!("{}.json", preset::preset_name(now)));
            match preset::save_preset_file(engine, &path, now) {
                Ok(()) => log::info!("Preset saved to {}", path.display()),
                Err(e) => log::warn!("Could not save preset: {}", e),
            }
        }
        ViewerAction::Quit => {}
    }
    engine.is_paused().then(|| engine.present_once())
}

struct Surface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl Surface {
    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(device, &self.config);
        }
    }
}

async fn init_gpu(window: Arc<Window>) -> Result<(Surface, Renderer)> {
    let size = window.inner_size();
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance.create_surface(window)?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow!("No adapter found"))?;
    log::info!("Using adapter: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await?;

    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| anyhow!("Surface reports no formats"))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let renderer = Renderer::new(device, queue, format, config.width, config.height);
    Ok((Surface { surface, config }, renderer))
}

pub fn run(options: ViewerOptions) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("raymarcher")
            .with_inner_size(winit::dpi::PhysicalSize::new(options.width, options.height))
            .build(&event_loop)?,
    );

    let (mut surface, mut renderer) = pollster::block_on(init_gpu(window.clone()))?;

    let mut engine = Engine::new(options.config.clone());
    let size = window.inner_size();
    engine.resize(size.width, size.height);

    let mut pending: Option<FramePlan> = None;
    if let Some(path) = &options.image {
        engine.load_image(path);
    }
    if let Some(path) = &options.preset {
        match preset::load_preset_file(&mut engine, path) {
            Ok(plan) => pending = Some(plan),
            Err(e) => log::warn!("Could not load preset {}: {}", path.display(), e),
        }
    }

    let mut rng = fastrand::Rng::new();
    let mut last = Instant::now();

    event_loop.run(move |event, elwt| match event {
        Event::AboutToWait => window.request_redraw(),
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                surface.resize(renderer.device(), size.width, size.height);
                engine.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match action_for_key(code) {
                    Some(ViewerAction::Quit) => elwt.exit(),
                    Some(action) => {
                        if let Some(plan) = apply_action(&mut engine, &mut rng, action) {
                            pending = Some(plan);
                        }
                    }
                    None => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f32();
                last = now;

                let frame = match surface.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = window.inner_size();
                        surface.resize(renderer.device(), size.width, size.height);
                        return;
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Surface out of memory");
                        elwt.exit();
                        return;
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                        return;
                    }
                };
                let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

                let plan = pending.take().unwrap_or_else(|| engine.advance_frame(dt));
                renderer.execute(&plan, &engine, &view, PresentRegion::from_engine(&engine));
                frame.present();
            }
            _ => {}
        },
        _ => {}
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig { palette_seed: Some(3), ..Default::default() })
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(action_for_key(KeyCode::Space), Some(ViewerAction::TogglePause));
        assert_eq!(action_for_key(KeyCode::KeyU), Some(ViewerAction::ToggleUvDebug));
        assert_eq!(action_for_key(KeyCode::Digit1), Some(ViewerAction::CuratedPalette(0)));
        assert_eq!(action_for_key(KeyCode::Digit7), Some(ViewerAction::CuratedPalette(6)));
        assert_eq!(action_for_key(KeyCode::Escape), Some(ViewerAction::Quit));
        assert_eq!(action_for_key(KeyCode::Digit8), None);
    }

    #[test]
    fn test_pause_action_requests_present() {
        let mut e = engine();
        let mut rng = fastrand::Rng::with_seed(1);
        let plan = apply_action(&mut e, &mut rng, ViewerAction::TogglePause);
        assert!(e.is_paused());
        assert_eq!(plan, Some(e.present_once()));

        let plan = apply_action(&mut e, &mut rng, ViewerAction::TogglePause);
        assert!(!e.is_paused());
        assert_eq!(plan, None);
    }

    #[test]
    fn test_uv_debug_action_toggles() {
        let mut e = engine();
        let mut rng = fastrand::Rng::with_seed(1);
        apply_action(&mut e, &mut rng, ViewerAction::ToggleUvDebug);
        assert!(e.debug_uv());
        apply_action(&mut e, &mut rng, ViewerAction::ToggleUvDebug);
        assert!(!e.debug_uv());
    }
}
