//! Composes the raymarch program from fixed infrastructure chunks and one
//! fragment from each effect library.
//!
//! Assembly is a pure function of [`ShaderConfig`]: equal configs always yield
//! byte-identical WGSL, which is what lets [`crate::program::RebuildGate`]
//! cache compiled programs by config value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::effects::{
    ColorMode, CrunchKind, DisplaceKind, EffectLibrary, SdfEffectKind, ShapeKind,
};
use crate::params::{uniform_block_wgsl, ParameterState};

const STRUCTS: &str = include_str!("wgsl/structs.wgsl");
const MATH: &str = include_str!("wgsl/math.wgsl");
const NOISE: &str = include_str!("wgsl/noise.wgsl");
const DOMAIN: &str = include_str!("wgsl/domain.wgsl");
const FOG: &str = include_str!("wgsl/fog.wgsl");
const GROUND: &str = include_str!("wgsl/ground.wgsl");
const REPEAT: &str = include_str!("wgsl/repeat.wgsl");
const LIGHTING: &str = include_str!("wgsl/lighting.wgsl");
const FEEDBACK: &str = include_str!("wgsl/feedback.wgsl");
const IMAGE: &str = include_str!("wgsl/image.wgsl");
const MAIN: &str = include_str!("wgsl/main.wgsl");
const UV_FEEDBACK: &str = include_str!("wgsl/uv_feedback.wgsl");

/// Statement spliced into `map` when displacement is active.
pub const DISPLACEMENT_CALL: &str = "d = op_displace(d, p, 0.0);";

/// Displacement amplitudes at or below this are treated as off.
pub const DISPLACEMENT_EPSILON: f32 = 0.001;

const MAIN_BINDINGS: &str = "\
@group(1) @binding(0) var uv_feedback_tex: texture_2d<f32>;
@group(1) @binding(1) var feedback_tex: texture_2d<f32>;
@group(1) @binding(2) var image_tex: texture_2d<f32>;
@group(1) @binding(3) var linear_sampler: sampler;
";

const UV_BINDINGS: &str = "\
@group(1) @binding(0) var prev_uv_tex: texture_2d<f32>;
@group(1) @binding(1) var linear_sampler: sampler;
";

/// The qualitative subset of parameter state. Fully determines program text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderConfig {
    pub shape_type: i64,
    pub shape_mode: i64,
    pub displacement_type: i64,
    pub displacement_amp_nonzero: bool,
    pub sdf_effect_type: i64,
    pub color_type: i64,
    pub crunch_type: i64,
    /// Part of the cache key only; `map()` does not branch on it.
    pub fog_enabled: i64,
}

impl ShaderConfig {
    /// Extract the discrete fields from the live parameter state.
    pub fn from_params(params: &ParameterState) -> Self {
        Self {
            shape_type: params.int("shape_type"),
            shape_mode: params.int("shape_mode"),
            displacement_type: params.int("displacement_type"),
            displacement_amp_nonzero: params.float("displacement_amp") > DISPLACEMENT_EPSILON,
            sdf_effect_type: params.int("sdf_effect_type"),
            color_type: params.int("color_type"),
            crunch_type: params.int("crunch_type"),
            fog_enabled: params.int("fog_enabled"),
        }
    }

    pub fn shape(&self) -> ShapeKind {
        ShapeKind::from_index(self.shape_type)
    }

    pub fn crunch(&self) -> CrunchKind {
        CrunchKind::from_index(self.crunch_type)
    }

    pub fn displace(&self) -> DisplaceKind {
        DisplaceKind::from_index(self.displacement_type)
    }

    pub fn sdf_effect(&self) -> SdfEffectKind {
        SdfEffectKind::from_index(self.sdf_effect_type)
    }

    pub fn color(&self) -> ColorMode {
        ColorMode::from_index(self.color_type)
    }
}

impl fmt::Display for ShaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape={} mode={} crunch={} displace={}{} effect={} color={} fog={}",
            self.shape().key(),
            self.shape_mode,
            self.crunch().key(),
            self.displace().key(),
            if self.displacement_amp_nonzero { "" } else { "(off)" },
            self.sdf_effect().key(),
            self.color().key(),
            self.fog_enabled,
        )
    }
}

/// One named section of the assembled program.
struct Section<'a> {
    name: &'a str,
    body: &'a str,
}

/// Ordered list of sections, rendered with banner comments.
#[derive(Default)]
struct ProgramText<'a> {
    sections: Vec<Section<'a>>,
}

impl<'a> ProgramText<'a> {
    fn push(&mut self, name: &'a str, body: &'a str) -> &mut Self {
        self.sections.push(Section { name, body });
        self
    }

    fn render(&self, header: &str) -> String {
        let len: usize = self.sections.iter().map(|s| s.body.len() + s.name.len() + 16).sum();
        let mut out = String::with_capacity(header.len() + len);
        out.push_str(header);
        for section in &self.sections {
            out.push_str("\n// ---- ");
            out.push_str(section.name);
            out.push_str(" ----\n");
            out.push_str(section.body.trim_end());
            out.push('\n');
        }
        out
    }
}

/// Source of the shape-mode dispatcher.
fn map_function(config: &ShaderConfig) -> String {
    let displacement = if config.displacement_amp_nonzero {
        DISPLACEMENT_CALL
    } else {
        ""
    };
    format!(
        "\
fn map(p_in: vec3<f32>, i: i32, t: f32) -> f32 {{
    var p = world_effects(p_in, t);
    if (u.sdf_effect_mix > 0.01) {{
        p = scene_warp(p);
    }}
    let og_p = p;

    let mode = i32(u.shape_mode);
    if (mode == 2) {{
        p = fractal_world(p);
    }}
    p = xy_transform(p, rot_time_m());

    var d = 0.0;
    switch mode {{
        case 0: {{
            d = sd_shape(p * 0.65, u.box_size) / 0.65;
        }}
        case 1: {{
            d = op_limited_repetition(p * 0.65, 0.25, vec3<f32>(1.0), i) / 0.65;
        }}
        case 2: {{
            d = sd_shape(p, u.box_size);
        }}
        case 3: {{
            d = sd_ground(p);
        }}
        case 4: {{
            return fog(og_p, t);
        }}
        default: {{
            d = 0.0;
        }}
    }}

    {displacement}
    return d;
}}
"
    )
}

/// Build the complete raymarch program for `config`.
pub fn build(config: &ShaderConfig) -> String {
    let uniforms = uniform_block_wgsl();
    let map = map_function(config);
    let header = format!("// raymarch program: {}\n", config);

    let mut text = ProgramText::default();
    text.push("uniforms", &uniforms)
        .push("bindings", MAIN_BINDINGS)
        .push("structs", STRUCTS)
        .push("math", MATH)
        .push("noise", NOISE)
        .push(CrunchKind::NAME, config.crunch().fragment())
        .push(DisplaceKind::NAME, config.displace().fragment())
        .push(SdfEffectKind::NAME, config.sdf_effect().fragment())
        .push("domain", DOMAIN)
        .push("fog", FOG)
        .push(ShapeKind::NAME, config.shape().fragment())
        .push("ground", GROUND)
        .push("repeat", REPEAT)
        .push("map", &map)
        .push(ColorMode::NAME, config.color().fragment())
        .push("lighting", LIGHTING)
        .push("feedback", FEEDBACK)
        .push("image", IMAGE)
        .push("main", MAIN);
    text.render(&header)
}

/// Build the UV-distortion program. Independent of [`ShaderConfig`].
pub fn build_uv_feedback() -> String {
    let uniforms = uniform_block_wgsl();
    let mut text = ProgramText::default();
    text.push("uniforms", &uniforms)
        .push("bindings", UV_BINDINGS)
        .push("structs", STRUCTS)
        .push("math", MATH)
        .push("noise", NOISE)
        .push("uv feedback", UV_FEEDBACK);
    text.render("// uv feedback program\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_is_deterministic() {
        let config = ShaderConfig { shape_type: 7, color_type: 3, ..Default::default() };
        assert_eq!(build(&config), build(&config));
    }

    #[test]
    fn test_displacement_call_gated() {
        let off = ShaderConfig::default();
        let on = ShaderConfig { displacement_amp_nonzero: true, ..off };
        assert!(!build(&off).contains(DISPLACEMENT_CALL));
        assert!(build(&on).contains(DISPLACEMENT_CALL));
        // op_displace itself is always defined.
        assert!(build(&off).contains("fn op_displace("));
    }

    #[test]
    fn test_out_of_range_matches_default_variant() {
        let fallback = ShaderConfig { shape_type: 99, crunch_type: -3, color_type: 1_000, ..Default::default() };
        let zero = ShaderConfig::default();
        assert_eq!(build(&fallback), build(&zero));
    }

    #[test]
    fn test_each_library_contributes_one_definition() {
        let src = build(&ShaderConfig::default());
        assert_eq!(src.matches("fn sd_shape(").count(), 1);
        assert_eq!(src.matches("fn apply_crunch(").count(), 1);
        assert_eq!(src.matches("fn apply_displace(").count(), 1);
        assert_eq!(src.matches("fn apply_sdf_effect(").count(), 1);
        assert_eq!(src.matches("fn apply_color_mode(").count(), 1);
        assert_eq!(src.matches("fn map(").count(), 1);
        assert!(src.contains("@fragment"));
    }

    #[test]
    fn test_sections_in_dependency_order() {
        let src = build(&ShaderConfig::default());
        let at = |needle: &str| src.find(needle).unwrap();
        assert!(at("struct Uniforms") < at("struct ColorAccum"));
        assert!(at("fn gmod(") < at("fn apply_crunch("));
        assert!(at("fn apply_sdf_effect(") < at("fn scene_warp("));
        assert!(at("fn sd_shape(") < at("fn sd_ground("));
        assert!(at("fn map(") < at("fn apply_color_mode("));
        assert!(at("fn calculate_feedback(") < at("fn fs_main("));
    }

    #[test]
    fn test_fog_flag_is_part_of_cache_key() {
        let a = ShaderConfig::default();
        let b = ShaderConfig { fog_enabled: 1, ..a };
        assert_ne!(a, b);
        // Only the banner line carries the flag.
        assert!(build(&b).contains("fog=1"));
        assert_eq!(build(&a).lines().skip(1).collect::<Vec<_>>(), build(&b).lines().skip(1).collect::<Vec<_>>());
    }

    #[test]
    fn test_config_from_params() {
        let mut params = ParameterState::new();
        params.set_float("shape_type", 10.0);
        params.set_float("displacement_amp", 0.5);
        let config = ShaderConfig::from_params(&params);
        assert_eq!(config.shape(), ShapeKind::Sphere);
        assert!(config.displacement_amp_nonzero);

        params.set_float("displacement_amp", 0.0005);
        assert!(!ShaderConfig::from_params(&params).displacement_amp_nonzero);
    }

    #[test]
    fn test_uv_program_has_its_own_bindings() {
        let src = build_uv_feedback();
        assert!(src.contains("var prev_uv_tex"));
        assert!(!src.contains("fn map("));
        assert!(src.contains("struct Uniforms"));
    }
}
