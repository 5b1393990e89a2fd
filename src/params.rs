//! Parameter state: every continuous and discrete control the raymarcher exposes.
//!
//! One ordered table ([`UNIFORMS`]) is the source of truth for names, kinds and
//! defaults. The WGSL `Uniforms` struct and the CPU-side packer are both derived
//! from it, so the two sides can never disagree on layout.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Storage class of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Float,
    /// Integer selector, stored as `f32` and floored on use.
    Int,
    Vec2,
    Vec3,
    /// Opaque texture handle, bound separately from the uniform block.
    Texture,
}

impl ParamKind {
    /// (alignment, size) in bytes under WGSL uniform layout rules.
    fn align_and_size(self) -> Option<(usize, usize)> {
        match self {
            ParamKind::Float | ParamKind::Int => Some((4, 4)),
            ParamKind::Vec2 => Some((8, 8)),
            ParamKind::Vec3 => Some((16, 12)),
            ParamKind::Texture => None,
        }
    }

    fn wgsl_type(self) -> Option<&'static str> {
        match self {
            ParamKind::Float | ParamKind::Int => Some("f32"),
            ParamKind::Vec2 => Some("vec2<f32>"),
            ParamKind::Vec3 => Some("vec3<f32>"),
            ParamKind::Texture => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, ParamKind::Float | ParamKind::Int)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Float => write!(f, "float"),
            ParamKind::Int => write!(f, "int"),
            ParamKind::Vec2 => write!(f, "vec2"),
            ParamKind::Vec3 => write!(f, "vec3"),
            ParamKind::Texture => write!(f, "texture"),
        }
    }
}

/// Declaration of one parameter.
#[derive(Clone, Copy, Debug)]
pub struct ParamDef {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: [f32; 3],
}

impl ParamDef {
    const fn float(name: &'static str, v: f32) -> Self {
        Self { name, kind: ParamKind::Float, default: [v, 0.0, 0.0] }
    }

    const fn int(name: &'static str, v: f32) -> Self {
        Self { name, kind: ParamKind::Int, default: [v, 0.0, 0.0] }
    }

    const fn vec2(name: &'static str, x: f32, y: f32) -> Self {
        Self { name, kind: ParamKind::Vec2, default: [x, y, 0.0] }
    }

    const fn vec3(name: &'static str, x: f32, y: f32, z: f32) -> Self {
        Self { name, kind: ParamKind::Vec3, default: [x, y, z] }
    }

    const fn texture(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Texture, default: [0.0; 3] }
    }

    pub fn default_value(&self) -> ParamValue {
        match self.kind {
            ParamKind::Float | ParamKind::Int => ParamValue::Float(self.default[0]),
            ParamKind::Vec2 => ParamValue::Vec2([self.default[0], self.default[1]]),
            ParamKind::Vec3 => ParamValue::Vec3(self.default),
            ParamKind::Texture => ParamValue::Texture(None),
        }
    }
}

/// Every parameter, in uniform-block order.
pub const UNIFORMS: &[ParamDef] = &[
    // Engine-owned
    ParamDef::float("time", 0.0),
    ParamDef::vec2("resolution", 800.0, 600.0),
    // Shape
    ParamDef::float("box_size", 0.1),
    ParamDef::float("distance_scale", 1.0),
    ParamDef::int("shape_type", 0.0),
    ParamDef::int("shape_mode", 0.0),
    ParamDef::int("lod_quality", 60.0),
    // Camera
    ParamDef::float("camera_theta", 0.0),
    ParamDef::float("camera_phi", 1.57),
    ParamDef::float("camera_distance", 3.0),
    // Domain
    ParamDef::float("twist", 0.0),
    ParamDef::float("crunch", 0.0),
    ParamDef::int("crunch_type", 0.0),
    ParamDef::float("spin", 0.0),
    ParamDef::float("rot_time_sin", 0.0),
    ParamDef::float("rot_time_cos", 1.0),
    ParamDef::float("mirror_x", 0.0),
    ParamDef::float("mirror_y", 0.0),
    ParamDef::float("mirror_z", 0.0),
    // Displacement and SDF effects
    ParamDef::float("displacement_freq", 20.0),
    ParamDef::float("displacement_amp", 0.0),
    ParamDef::int("displacement_type", 0.0),
    ParamDef::int("sdf_effect_type", 2.0),
    ParamDef::float("sdf_effect_mix", 0.0),
    // Colour
    ParamDef::float("color_intensity", 0.005),
    ParamDef::float("background_brightness", 1.0),
    ParamDef::int("color_type", 0.0),
    ParamDef::vec3("palette_a", 0.5, 0.5, 0.5),
    ParamDef::vec3("palette_b", 0.5, 0.5, 0.5),
    ParamDef::vec3("palette_c", 1.0, 1.0, 1.0),
    ParamDef::vec3("palette_d", 0.0, 0.33, 0.67),
    // Lighting
    ParamDef::float("surface_normals_enabled", 0.0),
    ParamDef::float("diffuse_strength", 0.7),
    ParamDef::float("specular_strength", 0.7),
    ParamDef::float("specular_power", 32.0),
    ParamDef::float("ambient_strength", 1.0),
    ParamDef::float("shadow_strength", 0.0),
    ParamDef::float("light_pos_x", 0.5),
    ParamDef::float("light_pos_y", 0.6),
    ParamDef::float("light_pos_z", 0.65),
    // Fog and turbulence
    ParamDef::float("fog_enabled", 0.0),
    ParamDef::float("fog_scale", 0.5),
    ParamDef::float("turb_num", 12.0),
    ParamDef::float("turb_amp", 1.1),
    ParamDef::float("turb_speed", 0.3),
    ParamDef::float("turb_freq", 2.1),
    ParamDef::float("turb_exp", 1.4),
    ParamDef::float("turb_time", 0.0),
    // Fractal
    ParamDef::float("fractal_rotation_speed", 0.0),
    ParamDef::float("fractal_rot_time_sin", 0.0),
    ParamDef::float("fractal_rot_time_cos", 1.0),
    ParamDef::float("fractal_drift_x", 0.0),
    ParamDef::float("fractal_drift_y", 0.0),
    ParamDef::float("fractal_drift_z", 0.1),
    ParamDef::float("fractal_drift_offset_x", 0.0),
    ParamDef::float("fractal_drift_offset_y", 0.0),
    ParamDef::float("fractal_drift_offset_z", 0.1),
    ParamDef::float("fractal_halving_x_base", 2.0),
    ParamDef::float("fractal_halving_y_base", 2.0),
    ParamDef::float("fractal_halving_z_base", 0.5),
    ParamDef::float("fractal_halving_freq_x", 0.0),
    ParamDef::float("fractal_halving_freq_y", 0.0),
    ParamDef::float("fractal_halving_freq_z", 0.0),
    ParamDef::float("fractal_halving_time_x", 0.0),
    ParamDef::float("fractal_halving_time_y", 0.0),
    ParamDef::float("fractal_halving_time_z", 0.0),
    ParamDef::float("fractal_halving_phase_x", 0.0),
    ParamDef::float("fractal_halving_phase_y", 0.0),
    ParamDef::float("fractal_halving_phase_z", 0.0),
    // UV field
    ParamDef::float("uv_scale", 1.0),
    ParamDef::float("uv_rotate", 0.0),
    ParamDef::vec2("uv_distort", 0.0, 0.0),
    ParamDef::vec3("uv_grid_size", 10.0, 20.0, 0.0),
    ParamDef::float("warp_gain", 0.5),
    ParamDef::int("warp_harmonics", 3.0),
    ParamDef::float("warp_lacunarity", 2.0),
    ParamDef::float("warp_amplitude", 0.0),
    ParamDef::int("warp_layers", 1.0),
    ParamDef::float("lens_distort", 0.0),
    ParamDef::float("polarize", 0.0),
    ParamDef::float("uv_pixel_size", 0.0),
    ParamDef::float("uv_feedback_opacity", 0.0),
    ParamDef::float("uv_feedback_blur", 0.0),
    ParamDef::float("uv_feedback_distort", 0.025),
    ParamDef::float("uv_feedback_noise_scale", 1.0),
    ParamDef::int("uv_feedback_harmonics", 4.0),
    ParamDef::float("uv_feedback_lacunarity", 2.0),
    ParamDef::float("uv_feedback_gain", 0.5),
    ParamDef::float("uv_feedback_amplitude", 0.5),
    ParamDef::float("uv_feedback_exponent", 1.0),
    ParamDef::float("uv_feedback_noise_mix", 0.98),
    ParamDef::int("uv_feedback_blend_mode", 0.0),
    ParamDef::float("uv_feedback_seed", 0.0),
    ParamDef::int("uv_feedback_layers", 1.0),
    ParamDef::float("bloat_strength", 0.0),
    ParamDef::int("pattern_type", 0.0),
    // Image feedback
    ParamDef::float("feedback_opacity", 0.0),
    ParamDef::float("feedback_blur", 0.0),
    ParamDef::float("feedback_distort", 0.025),
    ParamDef::float("feedback_noise_scale", 1.0),
    ParamDef::int("feedback_harmonics", 4.0),
    ParamDef::float("feedback_lacunarity", 2.0),
    ParamDef::float("feedback_gain", 0.5),
    ParamDef::float("feedback_exponent", 1.0),
    ParamDef::float("feedback_amplitude", 0.5),
    ParamDef::float("feedback_noise_mix", 0.98),
    ParamDef::int("feedback_blend_mode", 0.0),
    ParamDef::float("feedback_seed", 0.0),
    ParamDef::int("feedback_layers", 1.0),
    ParamDef::float("pixel_size", 0.0),
    // Image overlay
    ParamDef::float("image_opacity", 0.0),
    ParamDef::float("image_aspect", 1.0),
    ParamDef::float("uv_mirror_x", 0.0),
    ParamDef::float("uv_mirror_y", 0.0),
    ParamDef::texture("image_texture"),
];

/// Find a parameter declaration by canonical name.
pub fn find_def(name: &str) -> Option<(usize, &'static ParamDef)> {
    UNIFORMS.iter().enumerate().find(|(_, d)| d.name == name)
}

/// Normalize an externally supplied name: drops a `u_` prefix and converts
/// camelCase to snake_case (`shapeType` and `u_shape_type` both become
/// `shape_type`).
pub fn canonical_name(name: &str) -> String {
    let trimmed = name.strip_prefix("u_").unwrap_or(name);
    let mut out = String::with_capacity(trimmed.len() + 4);
    for ch in trimmed.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decoded RGBA8 image used by the overlay shape mode.
#[derive(Debug)]
pub struct ImageOverlay {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// Bumped on every new assignment so the renderer knows to re-upload.
    pub generation: u64,
}

impl ImageOverlay {
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// A typed parameter value.
#[derive(Clone, Debug)]
pub enum ParamValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Texture(Option<Arc<ImageOverlay>>),
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Float(a), ParamValue::Float(b)) => a == b,
            (ParamValue::Vec2(a), ParamValue::Vec2(b)) => a == b,
            (ParamValue::Vec3(a), ParamValue::Vec3(b)) => a == b,
            (ParamValue::Texture(a), ParamValue::Texture(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

impl ParamValue {
    fn shape_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "scalar",
            ParamValue::Vec2(_) => "vec2",
            ParamValue::Vec3(_) => "vec3",
            ParamValue::Texture(_) => "texture",
        }
    }

    /// Whether this value can be stored in a parameter of `kind`.
    pub fn fits(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (ParamValue::Float(_), ParamKind::Float | ParamKind::Int)
                | (ParamValue::Vec2(_), ParamKind::Vec2)
                | (ParamValue::Vec3(_), ParamKind::Vec3)
                | (ParamValue::Texture(_), ParamKind::Texture)
        )
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            ParamValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            ParamValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }
}

/// Rejected parameter assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    Unknown(String),
    ShapeMismatch {
        name: String,
        expected: ParamKind,
        found: &'static str,
    },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Unknown(name) => write!(f, "unknown parameter '{}'", name),
            ParamError::ShapeMismatch { name, expected, found } => write!(
                f,
                "parameter '{}' expects {}, got {}",
                name, expected, found
            ),
        }
    }
}

impl std::error::Error for ParamError {}

/// Byte placement of one uniform inside the packed block.
#[derive(Clone, Copy, Debug)]
pub struct UniformSlot {
    pub param: usize,
    pub offset: usize,
    pub kind: ParamKind,
}

/// Packed layout of the uniform block.
#[derive(Clone, Debug)]
pub struct UniformLayout {
    pub slots: Vec<UniformSlot>,
    /// Total size in bytes, rounded up to the struct alignment.
    pub size: usize,
}

impl UniformLayout {
    fn build(defs: &[ParamDef]) -> Self {
        let mut slots = Vec::with_capacity(defs.len());
        let mut offset = 0usize;
        let mut max_align = 4usize;
        for (i, def) in defs.iter().enumerate() {
            let Some((align, size)) = def.kind.align_and_size() else {
                continue;
            };
            offset = align_up(offset, align);
            slots.push(UniformSlot { param: i, offset, kind: def.kind });
            offset += size;
            max_align = max_align.max(align);
        }
        Self { slots, size: align_up(offset, max_align.max(16)) }
    }
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Layout of [`UNIFORMS`], computed once.
pub fn uniform_layout() -> &'static UniformLayout {
    static LAYOUT: OnceLock<UniformLayout> = OnceLock::new();
    LAYOUT.get_or_init(|| UniformLayout::build(UNIFORMS))
}

/// WGSL declaration of the uniform block and its binding.
pub fn uniform_block_wgsl() -> String {
    let mut out = String::from("struct Uniforms {\n");
    for def in UNIFORMS {
        if let Some(ty) = def.kind.wgsl_type() {
            out.push_str(&format!("    {}: {},\n", def.name, ty));
        }
    }
    out.push_str("};\n\n@group(0) @binding(0) var<uniform> u: Uniforms;\n");
    out
}

/// Cosine palette coefficients (`a + b * cos(2pi * (c * t + d))`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub a: [f32; 3],
    pub b: [f32; 3],
    pub c: [f32; 3],
    pub d: [f32; 3],
}

const HALF: [f32; 3] = [0.5, 0.5, 0.5];

pub const CURATED_PALETTES: [Palette; 7] = [
    Palette { a: HALF, b: HALF, c: [1.0, 1.0, 1.0], d: [0.0, 0.33, 0.67] },
    Palette { a: HALF, b: HALF, c: [1.0, 1.0, 1.0], d: [0.0, 0.1, 0.2] },
    Palette { a: HALF, b: HALF, c: [1.0, 1.0, 1.0], d: [0.3, 0.2, 0.2] },
    Palette { a: HALF, b: HALF, c: [1.0, 1.0, 0.5], d: [0.8, 0.9, 0.3] },
    Palette { a: HALF, b: HALF, c: [1.0, 0.7, 0.4], d: [0.0, 0.15, 0.2] },
    Palette { a: HALF, b: HALF, c: [2.0, 1.0, 0.0], d: [0.5, 0.2, 0.25] },
    Palette { a: [0.8, 0.5, 0.4], b: [0.2, 0.4, 0.2], c: [2.0, 1.0, 1.0], d: [0.0, 0.25, 0.25] },
];

impl Palette {
    pub fn random(rng: &mut fastrand::Rng) -> Self {
        let mut v = || [rng.f32(), rng.f32(), rng.f32()];
        Self { a: v(), b: v(), c: v(), d: v() }
    }

    /// 25% chance of a curated palette, otherwise fully random.
    pub fn pick_initial(rng: &mut fastrand::Rng) -> Self {
        if rng.f32() < 0.25 {
            CURATED_PALETTES[rng.usize(..CURATED_PALETTES.len())]
        } else {
            Self::random(rng)
        }
    }
}

/// Current value of every parameter.
#[derive(Clone, Debug)]
pub struct ParameterState {
    values: Vec<ParamValue>,
    index: HashMap<&'static str, usize>,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterState {
    /// All parameters at their documented defaults.
    pub fn new() -> Self {
        let values = UNIFORMS.iter().map(ParamDef::default_value).collect();
        let index = UNIFORMS.iter().enumerate().map(|(i, d)| (d.name, i)).collect();
        Self { values, index }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.index.get(name).map(|&i| &self.values[i])
    }

    /// Assign a value; only the shape (scalar / vec2 / vec3 / texture) is checked.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        let Some(&i) = self.index.get(name) else {
            return Err(ParamError::Unknown(name.to_string()));
        };
        let kind = UNIFORMS[i].kind;
        if !value.fits(kind) {
            return Err(ParamError::ShapeMismatch {
                name: name.to_string(),
                expected: kind,
                found: value.shape_name(),
            });
        }
        self.values[i] = value;
        Ok(())
    }

    /// Scalar value, or 0 when missing or not a scalar.
    pub fn float(&self, name: &str) -> f32 {
        self.get(name).and_then(ParamValue::as_float).unwrap_or(0.0)
    }

    /// Floored integer selector.
    pub fn int(&self, name: &str) -> i64 {
        self.float(name).floor() as i64
    }

    pub fn vec2(&self, name: &str) -> [f32; 2] {
        self.get(name).and_then(ParamValue::as_vec2).unwrap_or([0.0; 2])
    }

    pub fn vec3(&self, name: &str) -> [f32; 3] {
        self.get(name).and_then(ParamValue::as_vec3).unwrap_or([0.0; 3])
    }

    /// Write a scalar known to exist. Unknown names are ignored.
    pub fn set_float(&mut self, name: &str, v: f32) {
        if let Some(&i) = self.index.get(name) {
            if UNIFORMS[i].kind.is_scalar() {
                self.values[i] = ParamValue::Float(v);
            }
        }
    }

    pub fn set_vec2(&mut self, name: &str, v: [f32; 2]) {
        if let Some(&i) = self.index.get(name) {
            if UNIFORMS[i].kind == ParamKind::Vec2 {
                self.values[i] = ParamValue::Vec2(v);
            }
        }
    }

    pub fn set_vec3(&mut self, name: &str, v: [f32; 3]) {
        if let Some(&i) = self.index.get(name) {
            if UNIFORMS[i].kind == ParamKind::Vec3 {
                self.values[i] = ParamValue::Vec3(v);
            }
        }
    }

    pub fn image(&self) -> Option<Arc<ImageOverlay>> {
        match self.get("image_texture") {
            Some(ParamValue::Texture(t)) => t.clone(),
            _ => None,
        }
    }

    pub fn palette(&self) -> Palette {
        Palette {
            a: self.vec3("palette_a"),
            b: self.vec3("palette_b"),
            c: self.vec3("palette_c"),
            d: self.vec3("palette_d"),
        }
    }

    pub fn set_palette(&mut self, palette: &Palette) {
        self.set_vec3("palette_a", palette.a);
        self.set_vec3("palette_b", palette.b);
        self.set_vec3("palette_c", palette.c);
        self.set_vec3("palette_d", palette.d);
    }

    /// Iterate `(definition, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParamDef, &ParamValue)> {
        UNIFORMS.iter().zip(self.values.iter())
    }

    /// Pack the uniform block for upload.
    pub fn pack_uniforms(&self) -> Vec<u8> {
        let layout = uniform_layout();
        let mut words = vec![0f32; layout.size / 4];
        for slot in &layout.slots {
            let at = slot.offset / 4;
            match &self.values[slot.param] {
                ParamValue::Float(v) => words[at] = *v,
                ParamValue::Vec2(v) => words[at..at + 2].copy_from_slice(v),
                ParamValue::Vec3(v) => words[at..at + 3].copy_from_slice(v),
                ParamValue::Texture(_) => {}
            }
        }
        bytemuck::cast_slice(&words).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = UNIFORMS.iter().map(|d| d.name).collect();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn test_layout_follows_wgsl_rules() {
        let layout = uniform_layout();
        let offset_of = |name: &str| {
            let (i, _) = find_def(name).unwrap();
            layout.slots.iter().find(|s| s.param == i).unwrap().offset
        };
        assert_eq!(offset_of("time"), 0);
        // vec2 aligns to 8
        assert_eq!(offset_of("resolution"), 8);
        assert_eq!(offset_of("box_size"), 16);
        assert_eq!(offset_of("palette_a") % 16, 0);
        // scalar packs into the tail of the preceding vec3
        assert_eq!(offset_of("uv_grid_size") + 12, offset_of("warp_gain"));
        assert_eq!(layout.size % 16, 0);
        assert!(!layout.slots.iter().any(|s| s.kind == ParamKind::Texture));
    }

    #[test]
    fn test_pack_writes_values_at_offsets() {
        let mut state = ParameterState::new();
        state.set("camera_distance", ParamValue::Float(7.5)).unwrap();
        state.set("uv_grid_size", ParamValue::Vec3([1.0, 2.0, 3.0])).unwrap();
        let bytes = state.pack_uniforms();
        assert_eq!(bytes.len(), uniform_layout().size);

        let words: &[f32] = bytemuck::cast_slice(&bytes);
        let layout = uniform_layout();
        let (i, _) = find_def("camera_distance").unwrap();
        let slot = layout.slots.iter().find(|s| s.param == i).unwrap();
        assert_eq!(words[slot.offset / 4], 7.5);

        let (i, _) = find_def("uv_grid_size").unwrap();
        let slot = layout.slots.iter().find(|s| s.param == i).unwrap();
        assert_eq!(&words[slot.offset / 4..slot.offset / 4 + 3], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_set_checks_shape_only() {
        let mut state = ParameterState::new();
        // Out-of-range numbers are tolerated.
        assert!(state.set("box_size", ParamValue::Float(-4.0)).is_ok());
        assert_eq!(state.float("box_size"), -4.0);

        let err = state.set("box_size", ParamValue::Vec3([1.0; 3])).unwrap_err();
        assert!(matches!(err, ParamError::ShapeMismatch { .. }));
        assert_eq!(state.float("box_size"), -4.0);

        assert!(matches!(
            state.set("nope", ParamValue::Float(1.0)),
            Err(ParamError::Unknown(_))
        ));
    }

    #[test]
    fn test_int_selector_floors() {
        let mut state = ParameterState::new();
        state.set_float("shape_type", 10.7);
        assert_eq!(state.int("shape_type"), 10);
        state.set_float("shape_type", -0.5);
        assert_eq!(state.int("shape_type"), -1);
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("shapeType"), "shape_type");
        assert_eq!(canonical_name("u_shape_type"), "shape_type");
        assert_eq!(canonical_name("displacementAmp"), "displacement_amp");
        assert_eq!(canonical_name("box_size"), "box_size");
    }

    #[test]
    fn test_uniform_block_declares_every_uniform() {
        let src = uniform_block_wgsl();
        assert!(src.contains("    resolution: vec2<f32>,\n"));
        assert!(src.contains("    palette_d: vec3<f32>,\n"));
        assert!(src.contains("    shape_type: f32,\n"));
        assert!(!src.contains("image_texture"));
        assert!(src.contains("var<uniform> u: Uniforms;"));
    }

    #[test]
    fn test_initial_palette_choice() {
        let mut curated = 0;
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..2000 {
            let p = Palette::pick_initial(&mut rng);
            if CURATED_PALETTES.contains(&p) {
                curated += 1;
            }
        }
        // Expect roughly a quarter.
        assert!((350..650).contains(&curated), "curated = {}", curated);
    }

    #[test]
    fn test_texture_values_compare_by_identity() {
        let img = Arc::new(ImageOverlay { width: 2, height: 1, rgba: vec![0; 8], generation: 1 });
        let a = ParamValue::Texture(Some(img.clone()));
        let b = ParamValue::Texture(Some(img));
        assert_eq!(a, b);
        assert_ne!(a, ParamValue::Texture(None));
        assert_eq!(ImageOverlay { width: 4, height: 2, rgba: vec![], generation: 0 }.aspect(), 2.0);
    }
}
