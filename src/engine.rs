//! The simulation core: parameter state, integrators, rebuild gate and frame
//! sequencing.
//!
//! `Engine` is GPU-free. Each frame it advances time and integrators and
//! returns a [`FramePlan`] listing the passes the renderer must execute, in
//! order. Collaborators (viewer, CLI, wasm bindings, presets, scene actions)
//! only go through the operations exposed here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::gallery::{self, GalleryMode};
use crate::integrators::{Damping, Integrators};
use crate::params::{canonical_name, ImageOverlay, Palette, ParamValue, ParameterState};
use crate::post_processing::PostSettings;
use crate::program::{CompiledProgram, RebuildGate};
use crate::shader_assembler::ShaderConfig;

pub const DEFAULT_SPEED: f32 = 0.5;

/// Engine settings, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Render resolution relative to the window.
    pub resolution_scale: f32,
    /// Multiplier from `dt * speed` to shader time.
    pub time_scale: f32,
    pub damping: Damping,
    /// Makes the initial palette deterministic.
    pub palette_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolution_scale: 0.7,
            time_scale: 5.0,
            damping: Damping::PerTick,
            palette_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One step of a frame, executed by the renderer in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameStep {
    /// Render the UV-distortion program into the UV write buffer.
    UvPass,
    /// Make the freshly written UV buffer the read side.
    SwapUv,
    /// Debug: show the UV buffer instead of the scene.
    PresentUv,
    /// Render the raymarch program into the main write buffer.
    MainPass,
    SwapMain,
    /// Post chain from the main read buffer to the output.
    PostChain,
}

/// Ordered steps for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FramePlan {
    pub steps: Vec<FrameStep>,
}

impl FramePlan {
    fn new(steps: &[FrameStep]) -> Self {
        Self { steps: steps.to_vec() }
    }

    pub fn contains(&self, step: FrameStep) -> bool {
        self.steps.contains(&step)
    }

    /// True when no feedback buffer is written this frame.
    pub fn is_present_only(&self) -> bool {
        !self.contains(FrameStep::UvPass) && !self.contains(FrameStep::MainPass)
    }
}

impl<'a> IntoIterator for &'a FramePlan {
    type Item = &'a FrameStep;
    type IntoIter = std::slice::Iter<'a, FrameStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// The core engine.
pub struct Engine {
    params: ParameterState,
    pub integrators: Integrators,
    gate: RebuildGate,
    pub config: EngineConfig,
    pub post: PostSettings,
    pub gallery: GalleryMode,
    pub speed: f32,
    time: f32,
    paused: bool,
    debug_uv: bool,
    window_size: (u32, u32),
    render_size: (u32, u32),
    frame_count: u64,
    rng: fastrand::Rng,
}

impl Engine {
    /// Defaults, a randomized initial palette and a forced first build.
    pub fn new(config: EngineConfig) -> Self {
        let mut rng = match config.palette_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let mut params = ParameterState::new();
        params.set_palette(&Palette::pick_initial(&mut rng));

        let (w, h) = (800, 600);
        let render_size = gallery::window_render_size(w, h, config.resolution_scale);
        params.set_vec2("resolution", [render_size.0 as f32, render_size.1 as f32]);

        let gate = RebuildGate::new(ShaderConfig::from_params(&params));
        Self {
            params,
            integrators: Integrators::default(),
            gate,
            config,
            post: PostSettings::default(),
            gallery: GalleryMode::default(),
            speed: DEFAULT_SPEED,
            time: 0.0,
            paused: false,
            debug_uv: false,
            window_size: (w, h),
            render_size,
            frame_count: 0,
            rng,
        }
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Assign a parameter by name (`shapeType`, `u_shape_type` and
    /// `shape_type` are equivalent). Mismatched shapes and unknown names are
    /// logged and ignored.
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) -> bool {
        let name = canonical_name(name);
        match self.params.set(&name, value) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Ignoring parameter update: {}", e);
                false
            }
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        self.set_parameter(name, ParamValue::Float(value))
    }

    pub fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.params.get(&canonical_name(name)).cloned()
    }

    pub fn params(&self) -> &ParameterState {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterState {
        &mut self.params
    }

    pub fn rng(&mut self) -> &mut fastrand::Rng {
        &mut self.rng
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    /// Advance time and integrators by `dt` (unclamped) and plan the frame.
    pub fn advance_frame(&mut self, dt: f32) -> FramePlan {
        if self.paused {
            return self.present_plan();
        }

        self.time += dt * self.speed * self.config.time_scale;
        self.params.set_float("time", self.time);
        self.integrators
            .advance(&mut self.params, dt, self.speed, self.config.damping);
        self.frame_count += 1;

        if self.debug_uv {
            FramePlan::new(&[FrameStep::UvPass, FrameStep::SwapUv, FrameStep::PresentUv])
        } else {
            FramePlan::new(&[
                FrameStep::UvPass,
                FrameStep::SwapUv,
                FrameStep::MainPass,
                FrameStep::SwapMain,
                FrameStep::PostChain,
            ])
        }
    }

    /// Re-present whatever is already in the feedback buffers.
    fn present_plan(&self) -> FramePlan {
        if self.debug_uv {
            FramePlan::new(&[FrameStep::PresentUv])
        } else {
            FramePlan::new(&[FrameStep::PostChain])
        }
    }

    /// Render the scene once with current parameters, without advancing time
    /// or integrators. The UV field is reused from the last frame.
    pub fn present_once(&self) -> FramePlan {
        if self.debug_uv {
            return FramePlan::new(&[FrameStep::PresentUv]);
        }
        FramePlan::new(&[FrameStep::MainPass, FrameStep::SwapMain, FrameStep::PostChain])
    }

    /// Rebuild the program when the discrete configuration changed (or always when `force`).
    pub fn rebuild_if_needed(&mut self, force: bool) -> bool {
        let config = ShaderConfig::from_params(&self.params);
        self.gate.rebuild_if_needed(config, force)
    }

    pub fn program(&self) -> &CompiledProgram {
        self.gate.current()
    }

    pub fn shader_config(&self) -> ShaderConfig {
        ShaderConfig::from_params(&self.params)
    }

    /// Packed uniform block for the current state.
    pub fn uniform_bytes(&self) -> Vec<u8> {
        self.params.pack_uniforms()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn debug_uv(&self) -> bool {
        self.debug_uv
    }

    pub fn set_debug_uv(&mut self, enabled: bool) {
        self.debug_uv = enabled;
    }

    // ========================================================================
    // Sizing
    // ========================================================================

    /// Resize for a new window size. Gallery framing, when enabled, decides
    /// the render size. The resolution uniform follows the render size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window_size = (width.max(1), height.max(1));
        self.apply_size();
    }

    /// Recompute the render size after a gallery or scale change.
    pub fn apply_size(&mut self) {
        let (w, h) = self.window_size;
        self.render_size = if self.gallery.enabled {
            let (tw, th) = self.gallery.target_size(w as f32, h as f32);
            gallery::render_size(tw, th, self.config.resolution_scale)
        } else {
            gallery::window_render_size(w, h, self.config.resolution_scale)
        };
        let (rw, rh) = self.render_size;
        self.params.set_vec2("resolution", [rw as f32, rh as f32]);
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.render_size
    }

    /// Window-space rectangle `(x, y, w, h)` the frame is shown in.
    pub fn viewport(&self) -> (f32, f32, f32, f32) {
        let (w, h) = (self.window_size.0 as f32, self.window_size.1 as f32);
        if !self.gallery.enabled {
            return (0.0, 0.0, w, h);
        }
        let (tw, th) = self.gallery.target_size(w, h);
        ((w - tw) * 0.5, (h - th) * 0.5, tw, th)
    }

    // ========================================================================
    // Image overlay
    // ========================================================================

    /// Install a decoded image and switch to image-overlay mode.
    pub fn set_image(&mut self, width: u32, height: u32, rgba: Vec<u8>) {
        let generation = self.params.image().map(|i| i.generation + 1).unwrap_or(1);
        let overlay = Arc::new(ImageOverlay { width, height, rgba, generation });
        let aspect = overlay.aspect();
        self.params.set_float("image_aspect", aspect);
        self.params.set_float("image_opacity", 1.0);
        self.params.set_float("shape_mode", 5.0);
        // Shape already checked; the texture slot always accepts a texture value.
        let _ = self.params.set("image_texture", ParamValue::Texture(Some(overlay)));
        self.rebuild_if_needed(false);
        log::info!("Image loaded: {}x{}, aspect {:.2}", width, height, aspect);
    }

    /// Decode an image file into the overlay. Failures are logged and leave
    /// the state unchanged.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_image(&mut self, path: &std::path::Path) -> bool {
        match image::open(path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                self.set_image(w, h, rgba.into_raw());
                true
            }
            Err(e) => {
                log::warn!("Could not load overlay image {}: {}", path.display(), e);
                false
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig { palette_seed: Some(1), ..Default::default() })
    }

    #[test]
    fn test_frame_plan_order() {
        let mut e = engine();
        let plan = e.advance_frame(1.0 / 60.0);
        assert_eq!(
            plan.steps,
            vec![
                FrameStep::UvPass,
                FrameStep::SwapUv,
                FrameStep::MainPass,
                FrameStep::SwapMain,
                FrameStep::PostChain
            ]
        );
    }

    #[test]
    fn test_debug_uv_skips_main() {
        let mut e = engine();
        e.set_debug_uv(true);
        let plan = e.advance_frame(0.016);
        assert_eq!(plan.steps, vec![FrameStep::UvPass, FrameStep::SwapUv, FrameStep::PresentUv]);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut e = engine();
        e.advance_frame(0.1);
        let t = e.time();
        e.toggle_pause();
        let plan = e.advance_frame(0.1);
        assert!(plan.is_present_only());
        assert_eq!(e.time(), t);
        assert_eq!(e.params().float("time"), t);
    }

    #[test]
    fn test_time_advances_by_scaled_dt() {
        let mut e = engine();
        e.advance_frame(0.1);
        assert!((e.time() - 0.1 * DEFAULT_SPEED * 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_parameter_accepts_aliases() {
        let mut e = engine();
        assert!(e.set_float("shapeType", 10.0));
        assert_eq!(e.get_parameter("u_shape_type"), Some(ParamValue::Float(10.0)));
        assert!(!e.set_float("palette_a", 1.0));
        assert!(!e.set_float("not_a_param", 1.0));
    }

    #[test]
    fn test_palette_seed_is_deterministic() {
        let a = engine();
        let b = engine();
        assert_eq!(a.params().palette(), b.params().palette());
    }

    #[test]
    fn test_resize_updates_resolution() {
        let mut e = engine();
        e.resize(1000, 500);
        assert_eq!(e.render_size(), (700, 350));
        assert_eq!(e.params().vec2("resolution"), [700.0, 350.0]);

        e.gallery.set_aspect(crate::gallery::GalleryAspect::Square);
        e.apply_size();
        assert_eq!(e.render_size(), (250, 250));
        assert_eq!(e.viewport(), (375.0, 125.0, 250.0, 250.0));
    }

    #[test]
    fn test_set_image_switches_mode() {
        let mut e = engine();
        e.set_image(4, 2, vec![0; 32]);
        assert_eq!(e.params().int("shape_mode"), 5);
        assert_eq!(e.params().float("image_aspect"), 2.0);
        assert_eq!(e.program().config.shape_mode, 5);
        assert_eq!(e.params().image().map(|i| i.generation), Some(1));
        e.set_image(1, 1, vec![0; 4]);
        assert_eq!(e.params().image().map(|i| i.generation), Some(2));
    }

    #[test]
    fn test_present_once_does_not_advance() {
        let e = engine();
        let plan = e.present_once();
        assert_eq!(plan.steps, vec![FrameStep::MainPass, FrameStep::SwapMain, FrameStep::PostChain]);
        assert_eq!(e.time(), 0.0);
    }
}
