use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::engine::{Engine, EngineConfig, FramePlan};
use crate::gpu::{PresentRegion, Renderer};
use crate::params::ParamValue;
use crate::preset;

#[wasm_bindgen]
pub struct WasmRaymarcher {
    inner: Rc<RefCell<RaymarcherContext>>,
}

struct RaymarcherContext {
    renderer: Renderer,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    engine: Engine,
    /// Plan to run on the next `render` instead of advancing.
    pending: Option<FramePlan>,
}

impl RaymarcherContext {
    fn present(&mut self, plan: &FramePlan) {
        match self.surface.get_current_texture() {
            Ok(output) => {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                let region = PresentRegion::from_engine(&self.engine);
                self.renderer.execute(plan, &self.engine, &view, region);
                output.present();
            }
            Err(wgpu::SurfaceError::Lost) => {
                self.surface.configure(self.renderer.device(), &self.config);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
            }
        }
    }
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
impl WasmRaymarcher {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmRaymarcher, JsValue> {
        Err(JsValue::from_str("Use create_raymarcher async constructor"))
    }

    /// Returns false for unknown names and non-scalar parameters.
    pub fn set_float(&self, name: &str, value: f32) -> bool {
        self.inner.borrow_mut().engine.set_parameter(name, ParamValue::Float(value))
    }

    pub fn set_vec2(&self, name: &str, x: f32, y: f32) -> bool {
        self.inner.borrow_mut().engine.set_parameter(name, ParamValue::Vec2([x, y]))
    }

    pub fn set_vec3(&self, name: &str, x: f32, y: f32, z: f32) -> bool {
        self.inner.borrow_mut().engine.set_parameter(name, ParamValue::Vec3([x, y, z]))
    }

    /// `null` for unknown names and textures.
    pub fn get_parameter_json(&self, name: &str) -> String {
        let inner = self.inner.borrow();
        let value = match inner.engine.get_parameter(name) {
            Some(ParamValue::Float(v)) => json!(v),
            Some(ParamValue::Vec2([x, y])) => json!({ "x": x, "y": y }),
            Some(ParamValue::Vec3([x, y, z])) => json!({ "x": x, "y": y, "z": z }),
            Some(ParamValue::Texture(_)) | None => serde_json::Value::Null,
        };
        value.to_string()
    }

    /// Advance by `dt` seconds and present.
    pub fn render(&self, dt: f32) {
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;
        let plan = match ctx.pending.take() {
            Some(plan) => plan,
            None => ctx.engine.advance_frame(dt),
        };
        ctx.present(&plan);
    }

    pub fn resize(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;

        ctx.engine.resize(width, height);
        ctx.config.width = width;
        ctx.config.height = height;
        ctx.surface.configure(ctx.renderer.device(), &ctx.config);
    }

    /// Rebuild the program if the discrete configuration changed.
    pub fn rebuild(&self, force: bool) -> bool {
        self.inner.borrow_mut().engine.rebuild_if_needed(force)
    }

    pub fn export_preset(&self) -> String {
        preset::export_preset_string(&self.inner.borrow().engine, chrono::Utc::now())
    }

    /// Returns false and leaves the state untouched when the preset is invalid.
    pub fn apply_preset(&self, json: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        match preset::apply_preset(&mut inner.engine, json) {
            Ok(plan) => {
                inner.pending = Some(plan);
                true
            }
            Err(e) => {
                log::warn!("Preset rejected: {}", e);
                false
            }
        }
    }

    pub fn toggle_pause(&self) -> bool {
        self.inner.borrow_mut().engine.toggle_pause()
    }

    pub fn set_debug_uv(&self, enabled: bool) {
        self.inner.borrow_mut().engine.set_debug_uv(enabled);
    }

    /// Install decoded RGBA pixels as the image overlay.
    pub fn set_image(&self, width: u32, height: u32, rgba: Vec<u8>) {
        self.inner.borrow_mut().engine.set_image(width, height, rgba);
    }
}

#[wasm_bindgen]
pub async fn create_raymarcher(canvas: HtmlCanvasElement) -> Result<WasmRaymarcher, JsValue> {
    init_panic_hook();

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let target = wgpu::SurfaceTarget::Canvas(canvas.clone());
    let surface = instance
        .create_surface(target)
        .map_err(|e| JsValue::from_str(&format!("Failed to create surface: {}", e)))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::None,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| JsValue::from_str("Failed to find an appropriate adapter"))?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to create device: {}", e)))?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| surface_caps.formats.first().copied())
        .ok_or_else(|| JsValue::from_str("Surface reports no formats"))?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: canvas.width().max(1),
        height: canvas.height().max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let mut engine = Engine::new(EngineConfig::default());
    engine.resize(config.width, config.height);
    let (w, h) = engine.render_size();
    let renderer = Renderer::new(device, queue, config.format, w, h);

    Ok(WasmRaymarcher {
        inner: Rc::new(RefCell::new(RaymarcherContext {
            renderer,
            surface,
            config,
            engine,
            pending: None,
        })),
    })
}
