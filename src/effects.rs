//! Interchangeable WGSL fragments for the raymarch program.
//!
//! Five closed libraries (shape, crunch, displacement, SDF effect, colour mode).
//! Every variant of a library implements the library's fixed function
//! signature, so the assembler can splice any combination into one program.
//! Lookups by integer index never fail: out-of-range indices resolve to the
//! library's first entry.

/// Common surface of the five fragment libraries.
pub trait EffectLibrary: Copy + Eq + std::fmt::Debug + Sized + 'static {
    /// Library name used in logs and section headers.
    const NAME: &'static str;
    /// Function signature every fragment must define.
    const SIGNATURE: &'static str;
    /// All variants, ordered by their stable index.
    const ALL: &'static [Self];

    /// Stable symbolic key.
    fn key(self) -> &'static str;

    /// WGSL source implementing [`Self::SIGNATURE`].
    fn fragment(self) -> &'static str;

    /// Resolve an index, falling back to the first entry when out of range.
    fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(Self::ALL[0])
    }

    /// Resolve a key, falling back to the first entry when unknown.
    fn from_key(key: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.key() == key)
            .unwrap_or(Self::ALL[0])
    }

    /// Stable index of this variant.
    fn index(self) -> usize {
        Self::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Box,
    SphereCylinder,
    Octahedron,
    CrossBox,
    BoxMinusSphere,
    CarvedBox,
    DoubleCross,
    SphereGrid,
    Cone,
    Flower,
    Sphere,
    DoubleCone,
    Mandelbulb,
}

impl EffectLibrary for ShapeKind {
    const NAME: &'static str = "shape";
    const SIGNATURE: &'static str = "fn sd_shape(p: vec3<f32>, s: f32) -> f32";
    const ALL: &'static [Self] = &[
        ShapeKind::Box,
        ShapeKind::SphereCylinder,
        ShapeKind::Octahedron,
        ShapeKind::CrossBox,
        ShapeKind::BoxMinusSphere,
        ShapeKind::CarvedBox,
        ShapeKind::DoubleCross,
        ShapeKind::SphereGrid,
        ShapeKind::Cone,
        ShapeKind::Flower,
        ShapeKind::Sphere,
        ShapeKind::DoubleCone,
        ShapeKind::Mandelbulb,
    ];

    fn key(self) -> &'static str {
        match self {
            ShapeKind::Box => "box",
            ShapeKind::SphereCylinder => "sphereCyl",
            ShapeKind::Octahedron => "octahedron",
            ShapeKind::CrossBox => "crossBox",
            ShapeKind::BoxMinusSphere => "boxMinusSphere",
            ShapeKind::CarvedBox => "carvedBox",
            ShapeKind::DoubleCross => "doubleCross",
            ShapeKind::SphereGrid => "sphereGrid",
            ShapeKind::Cone => "cone",
            ShapeKind::Flower => "flower",
            ShapeKind::Sphere => "sphere",
            ShapeKind::DoubleCone => "doubleCone",
            ShapeKind::Mandelbulb => "mandelbulb",
        }
    }

    fn fragment(self) -> &'static str {
        match self {
            ShapeKind::Box => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    return sd_box(p, vec3<f32>(s));
}
"#,
            ShapeKind::SphereCylinder => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let sphere = sd_sphere(p, s * 1.25);
    let cyl1 = sd_cylinder(p, vec3<f32>(0.0, 0.0, s * 0.5), 0);
    let cyl2 = sd_cylinder(p, vec3<f32>(0.0, 0.0, s * 0.5), 1);
    let c = op_smooth_union(sphere, cyl1, 0.01);
    return op_smooth_union(c, cyl2, 0.01);
}
"#,
            ShapeKind::Octahedron => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    return sd_octahedron(p, s);
}
"#,
            ShapeKind::CrossBox => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let cube = sd_box(p, vec3<f32>(s));
    let bar_x = sd_box(p, vec3<f32>(INFINITE_EXTENT, s * 0.25, s * 0.25));
    let bar_y = sd_box(p, vec3<f32>(s * 0.25, INFINITE_EXTENT, s * 0.25));
    let bar_z = sd_box(p, vec3<f32>(s * 0.25, s * 0.25, INFINITE_EXTENT));
    var c = op_smooth_union(bar_x, cube, 0.001);
    c = op_smooth_union(bar_y, c, 0.001);
    return op_smooth_union(bar_z, c, 0.001);
}
"#,
            ShapeKind::BoxMinusSphere => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let cube = sd_box(p, vec3<f32>(s));
    let sphere = sd_sphere(p, s * 1.25);
    return op_smooth_subtraction(sphere, cube, 0.001);
}
"#,
            ShapeKind::CarvedBox => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let q = abs(p) - vec3<f32>(s);
    let cube = length(max(q, vec3<f32>(0.0))) + min(max(q.x, max(q.y, q.z)), 0.0);
    let channel = abs(p) - vec3<f32>(s * 0.3);
    let carve_x = max(channel.y, channel.z) - s * 0.1;
    let carve_y = max(channel.x, channel.z) - s * 0.1;
    let carve_z = max(channel.x, channel.y) - s * 0.1;
    return max(cube, -min(min(carve_x, carve_y), carve_z));
}
"#,
            ShapeKind::DoubleCross => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let cube = sd_box(p, vec3<f32>(s));
    let bar_x = sd_box(p, vec3<f32>(s * 5.0, s * 0.25, s * 0.25));
    let bar_y = sd_box(p, vec3<f32>(s * 0.25, s * 5.0, s * 0.25));
    return op_smooth_union(bar_y, op_smooth_union(bar_x, cube, 0.001), 0.001);
}
"#,
            ShapeKind::SphereGrid => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let grid_size = s * 1.1;
    let limits = vec3<f32>(1.0);
    let q = p - grid_size * clamp(round(p / grid_size), -limits, limits);
    return sd_sphere(q, s * 0.8);
}
"#,
            ShapeKind::Cone => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    return sd_solid_angle(p, vec2<f32>(3.0, 4.0) / 5.0, s);
}
"#,
            ShapeKind::Flower => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    return sd_flower(p, 3.0);
}
"#,
            ShapeKind::Sphere => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    return sd_sphere(p, s * 1.25);
}
"#,
            ShapeKind::DoubleCone => r#"
fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    let lower = sd_solid_angle(vec3<f32>(p.x, -p.y, p.z), vec2<f32>(3.0, 4.0) / 5.0, s * 2.0);
    let upper = sd_solid_angle(p, vec2<f32>(3.0, 4.0) / 5.0, s * 2.0);
    return op_smooth_union(lower, upper, 0.04);
}
"#,
            ShapeKind::Mandelbulb => r#"
fn mandelbulb(p: vec3<f32>) -> f32 {
    var z = p;
    var dr = 1.0;
    var r = 0.0;
    let power = 8.0;
    for (var i = 0; i < 12; i++) {
        r = length(z);
        if (r > 2.0) {
            break;
        }
        var theta = acos(z.z / r);
        var phi = atan2(z.y, z.x);
        dr = pow(r, power - 1.0) * power * dr + 1.0;
        let zr = pow(r, power);
        theta = theta * power;
        phi = phi * power;
        let shifted = theta - u.time * 0.2;
        z = zr * vec3<f32>(sin(shifted) * cos(phi), sin(phi) * sin(shifted), cos(shifted));
        z += p;
    }
    return 0.5 * log(r) * r / dr;
}

fn sd_shape(p: vec3<f32>, s: f32) -> f32 {
    if (i32(u.shape_mode) == 2) {
        return mandelbulb(p / s) * s;
    }
    return mandelbulb(p * mix(0.9, 0.7, s * 2.0));
}
"#,
        }
    }
}

// ---------------------------------------------------------------------------
// Crunch (domain distortion)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CrunchKind {
    Basic,
    TimeOscillation,
    SmoothstepPos,
    Quantized,
    Modulated,
    FreqMod,
    Sawtooth,
    Triangle,
    Square,
    ExpDecay,
    SmoothPulse,
    HighFreq,
    TimeModY,
    TimeModXY,
    TimeModScale,
}

impl EffectLibrary for CrunchKind {
    const NAME: &'static str = "crunch";
    const SIGNATURE: &'static str = "fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32>";
    const ALL: &'static [Self] = &[
        CrunchKind::Basic,
        CrunchKind::TimeOscillation,
        CrunchKind::SmoothstepPos,
        CrunchKind::Quantized,
        CrunchKind::Modulated,
        CrunchKind::FreqMod,
        CrunchKind::Sawtooth,
        CrunchKind::Triangle,
        CrunchKind::Square,
        CrunchKind::ExpDecay,
        CrunchKind::SmoothPulse,
        CrunchKind::HighFreq,
        CrunchKind::TimeModY,
        CrunchKind::TimeModXY,
        CrunchKind::TimeModScale,
    ];

    fn key(self) -> &'static str {
        match self {
            CrunchKind::Basic => "basic",
            CrunchKind::TimeOscillation => "timeOscillation",
            CrunchKind::SmoothstepPos => "smoothstepPos",
            CrunchKind::Quantized => "quantized",
            CrunchKind::Modulated => "modulated",
            CrunchKind::FreqMod => "freqMod",
            CrunchKind::Sawtooth => "sawtooth",
            CrunchKind::Triangle => "triangle",
            CrunchKind::Square => "square",
            CrunchKind::ExpDecay => "expDecay",
            CrunchKind::SmoothPulse => "smoothPulse",
            CrunchKind::HighFreq => "highFreq",
            CrunchKind::TimeModY => "timeModY",
            CrunchKind::TimeModXY => "timeModXY",
            CrunchKind::TimeModScale => "timeModScale",
        }
    }

    fn fragment(self) -> &'static str {
        match self {
            CrunchKind::Basic => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += sin(t * u.crunch + u.time * 0.25) * u.crunch;
    q.y += cos(t * u.crunch + u.time * 0.25) * u.crunch;
    return q;
}
"#,
            CrunchKind::TimeOscillation => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.y += sin(t * 5.0 + u.time * 0.25) * (u.crunch * 0.5);
    return q;
}
"#,
            CrunchKind::SmoothstepPos => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += u.crunch + u.crunch * smoothstep(0.0, 0.7, sin(q.x + u.time * 0.1));
    q.y += u.crunch + u.crunch * smoothstep(0.0, 0.7, cos(q.y + u.time * 0.1));
    return q;
}
"#,
            CrunchKind::Quantized => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    let amount = (smoothstep(-1.0, 1.0, sin(t * 5.0 + u.time * 0.25)) - 0.5) * (-u.crunch * 0.2);
    return vec3<f32>(p.x - amount, p.y + amount, p.z);
}
"#,
            CrunchKind::Modulated => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    let eased = smoothstep(0.0, 1.0, abs(u.crunch));
    let amount = u.crunch * eased;
    q.x += sin((t + u.time * 0.25) * 3.0) * amount * 0.3;
    q.y += cos((t + u.time * 0.25) * 3.0) * amount * 0.3;
    return q;
}
"#,
            CrunchKind::FreqMod => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += sin(t * 5.0 + u.time * 0.25) * (u.crunch * 0.2);
    return q;
}
"#,
            CrunchKind::Sawtooth => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += (fract(t * 0.1 + u.time * 0.25) - 0.5) * u.crunch * 2.0;
    return q;
}
"#,
            CrunchKind::Triangle => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += (abs(fract(t * 0.1 + u.time * 0.25) * 2.0 - 1.0) - 0.5) * u.crunch * 2.0;
    return q;
}
"#,
            CrunchKind::Square => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += smoothstep(-1.0, 1.0, sin(t * 0.5 + u.time * 0.25)) * u.crunch;
    q.y += smoothstep(-1.0, 1.0, cos(t * 0.5 + u.time * 0.25)) * u.crunch;
    return q;
}
"#,
            CrunchKind::ExpDecay => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += sin(t * (u.crunch * 1.5) + u.time * 0.25) * (u.crunch * 0.7);
    return q;
}
"#,
            CrunchKind::SmoothPulse => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += smoothstep(0.0, 1.0, sin(t + u.time * 0.25) * 0.5 + 0.5) * u.crunch;
    q.y += smoothstep(0.0, 1.0, cos(t + u.time * 0.25) * 0.5 + 0.5) * u.crunch;
    return q;
}
"#,
            CrunchKind::HighFreq => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    q.x += sin(t * (u.crunch * 5.0) + u.time * 0.25) * (u.crunch * 0.25);
    q.y += cos(t * (u.crunch * 5.0) + u.time * 0.25) * (u.crunch * 0.25);
    return q;
}
"#,
            CrunchKind::TimeModY => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    let m = vec2<f32>(cos(u.time * 0.2), sin(u.time * 0.2));
    q.y += sin(t * (m.y + 1.0) * 0.5) * u.crunch;
    return q;
}
"#,
            CrunchKind::TimeModXY => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    let m = vec2<f32>(cos(u.time * 0.2), sin(u.time * 0.2));
    q.x += cos(t * (m.y + 1.0) * 0.5) * u.crunch;
    q.y += sin(t * (m.x + 1.0) * 0.5) * u.crunch;
    return q;
}
"#,
            CrunchKind::TimeModScale => r#"
fn apply_crunch(p: vec3<f32>, t: f32) -> vec3<f32> {
    var q = p;
    let m = vec2<f32>(cos(u.time * 0.2), sin(u.time * 0.2));
    q.x *= mix(1.0, cos(t * (m.y + 1.0) * 0.5) * u.crunch, u.crunch);
    q.y *= mix(1.0, sin(t * (m.x + 1.0) * 0.5) * u.crunch, u.crunch);
    return q;
}
"#,
        }
    }
}

// ---------------------------------------------------------------------------
// Displacement
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplaceKind {
    TimeOffset,
    CellNoise,
    RadialRipple,
    XyWave,
    VoronoiCell,
    AngularSpiral,
    SineGrid,
    ExpDecayWave,
}

impl EffectLibrary for DisplaceKind {
    const NAME: &'static str = "displacement";
    const SIGNATURE: &'static str = "fn apply_displace(p: vec3<f32>, offset: f32) -> f32";
    const ALL: &'static [Self] = &[
        DisplaceKind::TimeOffset,
        DisplaceKind::CellNoise,
        DisplaceKind::RadialRipple,
        DisplaceKind::XyWave,
        DisplaceKind::VoronoiCell,
        DisplaceKind::AngularSpiral,
        DisplaceKind::SineGrid,
        DisplaceKind::ExpDecayWave,
    ];

    fn key(self) -> &'static str {
        match self {
            DisplaceKind::TimeOffset => "timeOffset",
            DisplaceKind::CellNoise => "cellNoise",
            DisplaceKind::RadialRipple => "radialRipple",
            DisplaceKind::XyWave => "xyWave",
            DisplaceKind::VoronoiCell => "voronoiCell",
            DisplaceKind::AngularSpiral => "angularSpiral",
            DisplaceKind::SineGrid => "sineGrid",
            DisplaceKind::ExpDecayWave => "expDecayWave",
        }
    }

    fn fragment(self) -> &'static str {
        match self {
            DisplaceKind::TimeOffset => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let shift = vec3<f32>((u.time * 0.15 + offset * 10.0) * 0.05);
    return sin(p.y * u.displacement_freq + shift.y + u.time * 0.2)
        * cos(p.z * u.displacement_freq + shift.z + u.time * 0.2)
        * u.displacement_amp;
}
"#,
            DisplaceKind::CellNoise => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let scaled = p * u.displacement_freq;
    let cell = floor(scaled);
    let cell_noise = fract(sin(dot(cell, vec3<f32>(127.1, 311.7, 74.7))) * 43758.5453);
    return floor(cell_noise * 3.0) / 3.0 * (u.displacement_amp * 0.2);
}
"#,
            DisplaceKind::RadialRipple => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let dist_sq = p.x * p.x + p.z * p.z;
    return sin(sqrt(dist_sq) * u.displacement_freq - u.time * 0.5) * u.displacement_amp;
}
"#,
            DisplaceKind::XyWave => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let shift = u.time + offset * 3.5;
    let freq_x = p.x * u.displacement_freq * 0.5;
    let freq_y = p.y * u.displacement_freq + shift;
    return sin(freq_y) * cos(freq_x) * u.displacement_amp;
}
"#,
            DisplaceKind::VoronoiCell => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let scaled = p * u.displacement_freq;
    let cell = floor(scaled);
    let local = scaled - cell;
    let cell_noise = fract(sin(dot(cell, vec3<f32>(12.9898, 78.233, 37.719))) * 43758.5453);
    let dist = abs(local.x - 0.5) + abs(local.y - 0.5) + abs(local.z - 0.5);
    return (cell_noise - 0.5) * dist * u.displacement_amp * 0.25;
}
"#,
            DisplaceKind::AngularSpiral => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let angle = atan2(p.z, p.x) + u.time * 0.2;
    let radius_sq = p.x * p.x + p.z * p.z;
    return abs(sin(angle * 3.0 + sqrt(radius_sq) * u.displacement_freq)) * (u.displacement_amp * 0.2);
}
"#,
            DisplaceKind::SineGrid => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let freq_x = p.x * u.displacement_freq + u.time * 0.2;
    let freq_y = p.y * u.displacement_freq * 0.7 + u.time * 0.2 * 1.3;
    let freq_z = p.z * u.displacement_freq * 1.1 + u.time * 0.2 * 0.8;
    return abs(sin(freq_x) * sin(freq_y) * sin(freq_z)) * u.displacement_amp;
}
"#,
            DisplaceKind::ExpDecayWave => r#"
fn apply_displace(p: vec3<f32>, offset: f32) -> f32 {
    let dist = length(p);
    let shift = u.time + offset * 10.0;
    return sin(dist * (u.displacement_freq * 0.5) - shift * 0.5)
        * exp(-dist * 0.5) * u.displacement_amp * u.distance_scale;
}
"#,
        }
    }
}

// ---------------------------------------------------------------------------
// SDF effects (domain warps mixed by sdf_effect_mix)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SdfEffectKind {
    SineWave,
    ZLengthMod,
    XyWaveInterference,
    AbsLengthSine,
    YModuloSine,
    XCosWarp,
    DistanceField,
    MinDistBox,
    XTimeSine,
    YExpDecay,
    ZTimeMod,
}

impl EffectLibrary for SdfEffectKind {
    const NAME: &'static str = "sdf effect";
    const SIGNATURE: &'static str =
        "fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32>";
    const ALL: &'static [Self] = &[
        SdfEffectKind::SineWave,
        SdfEffectKind::ZLengthMod,
        SdfEffectKind::XyWaveInterference,
        SdfEffectKind::AbsLengthSine,
        SdfEffectKind::YModuloSine,
        SdfEffectKind::XCosWarp,
        SdfEffectKind::DistanceField,
        SdfEffectKind::MinDistBox,
        SdfEffectKind::XTimeSine,
        SdfEffectKind::YExpDecay,
        SdfEffectKind::ZTimeMod,
    ];

    fn key(self) -> &'static str {
        match self {
            SdfEffectKind::SineWave => "sineWave",
            SdfEffectKind::ZLengthMod => "zLengthMod",
            SdfEffectKind::XyWaveInterference => "xyWaveInterference",
            SdfEffectKind::AbsLengthSine => "absLengthSine",
            SdfEffectKind::YModuloSine => "yModuloSine",
            SdfEffectKind::XCosWarp => "xCosWarp",
            SdfEffectKind::DistanceField => "distanceField",
            SdfEffectKind::MinDistBox => "minDistBox",
            SdfEffectKind::XTimeSine => "xTimeSine",
            SdfEffectKind::YExpDecay => "yExpDecay",
            SdfEffectKind::ZTimeMod => "zTimeMod",
        }
    }

    fn fragment(self) -> &'static str {
        match self {
            SdfEffectKind::SineWave => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    return sin(p * 2.0) * 0.5;
}
"#,
            SdfEffectKind::ZLengthMod => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.z *= sin(l * 0.25) * 0.2;
    return q;
}
"#,
            SdfEffectKind::XyWaveInterference => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    let k = (sin(l * 0.5) * cos(ld * 0.5) * 1.0 - 0.4) * 0.75;
    return vec3<f32>(p.xy * k, p.z);
}
"#,
            SdfEffectKind::AbsLengthSine => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.x = abs(l + 0.125 * sin(l - 0.125 * 2.0));
    return q;
}
"#,
            SdfEffectKind::YModuloSine => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.y = abs(gmod(sin(q.y) * 4.0 - 0.5, 2.0));
    return q;
}
"#,
            SdfEffectKind::XCosWarp => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.x = 1.5 * cos(q.x) * 0.5;
    return q;
}
"#,
            SdfEffectKind::DistanceField => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.x = ld;
    return q;
}
"#,
            SdfEffectKind::MinDistBox => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.x = length(min(abs(q) - 5.0, vec3<f32>(0.0)));
    return q;
}
"#,
            SdfEffectKind::XTimeSine => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.x = q.x * sin(l + u.time * 0.1) * 0.4;
    return q;
}
"#,
            SdfEffectKind::YExpDecay => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.y = q.y * sin(l * 5.0 + u.time * 0.1) * exp(-abs(q.y) * 0.2);
    return q;
}
"#,
            SdfEffectKind::ZTimeMod => r#"
fn apply_sdf_effect(p: vec3<f32>, l: f32, ld: f32) -> vec3<f32> {
    var q = p;
    q.z = q.z * sin(l * (u.time * 0.2)) * 0.1;
    return q;
}
"#,
        }
    }
}

// ---------------------------------------------------------------------------
// Colour modes (per-step accumulation)
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorMode {
    PaletteShape,
    DistanceDensity,
    IterationFade,
    TimeAccumulation,
    SharpDistance,
    IntensityFade,
    DistanceMultiply,
    BandIsolation,
    HighFreqPalette,
    PositionDepth,
    TimePaletteShape,
    Posterized,
    SmoothSurface,
    BandedRings,
    RawDistance,
    GlassMaterial,
}

impl EffectLibrary for ColorMode {
    const NAME: &'static str = "color mode";
    const SIGNATURE: &'static str = "fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32>";
    const ALL: &'static [Self] = &[
        ColorMode::PaletteShape,
        ColorMode::DistanceDensity,
        ColorMode::IterationFade,
        ColorMode::TimeAccumulation,
        ColorMode::SharpDistance,
        ColorMode::IntensityFade,
        ColorMode::DistanceMultiply,
        ColorMode::BandIsolation,
        ColorMode::HighFreqPalette,
        ColorMode::PositionDepth,
        ColorMode::TimePaletteShape,
        ColorMode::Posterized,
        ColorMode::SmoothSurface,
        ColorMode::BandedRings,
        ColorMode::RawDistance,
        ColorMode::GlassMaterial,
    ];

    fn key(self) -> &'static str {
        match self {
            ColorMode::PaletteShape => "paletteShape",
            ColorMode::DistanceDensity => "distanceDensity",
            ColorMode::IterationFade => "iterationFade",
            ColorMode::TimeAccumulation => "timeAccumulation",
            ColorMode::SharpDistance => "sharpDistance",
            ColorMode::IntensityFade => "intensityFade",
            ColorMode::DistanceMultiply => "distanceMultiply",
            ColorMode::BandIsolation => "bandIsolation",
            ColorMode::HighFreqPalette => "highFreqPalette",
            ColorMode::PositionDepth => "positionDepth",
            ColorMode::TimePaletteShape => "timePaletteShape",
            ColorMode::Posterized => "posterized",
            ColorMode::SmoothSurface => "smoothSurface",
            ColorMode::BandedRings => "bandedRings",
            ColorMode::RawDistance => "rawDistance",
            ColorMode::GlassMaterial => "glassMaterial",
        }
    }

    fn fragment(self) -> &'static str {
        match self {
            ColorMode::PaletteShape => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let bg = palette(u.time * 0.025 + t * 0.05 + f32(i) * u.color_intensity);
    let shape_factor = smoothstep(0.5, 0.0, d);
    let level = mix(1.0, 0.0, u.background_brightness);
    let darken = mix(0.0, level, 1.0 - shape_factor);
    return bg - vec3<f32>(darken) * 2.0;
}
"#,
            ColorMode::DistanceDensity => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    let density = 0.08 * smoothstep(0.0, 0.5, d);
    (*accum).value += bg * density * (*accum).intensity;
    (*accum).intensity *= 1.0 - density * 0.1;
    return (*accum).value;
}
"#,
            ColorMode::IterationFade => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    let density = 0.08 * smoothstep(100.0, 0.0, f32(i));
    (*accum).value += bg * density * (*accum).intensity;
    (*accum).intensity *= 1.0 - density * 0.1;
    return (*accum).value;
}
"#,
            ColorMode::TimeAccumulation => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    let density = 0.12 * smoothstep(0.0, 10.0, t);
    (*accum).value += bg * density * (*accum).intensity;
    (*accum).intensity *= 1.0 - density * 0.1;
    return (*accum).value;
}
"#,
            ColorMode::SharpDistance => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    let density = 0.08 * smoothstep(0.0, 0.1, d);
    (*accum).value += bg * density * (*accum).intensity;
    (*accum).intensity *= 1.0 - density * 0.1;
    return (*accum).value;
}
"#,
            ColorMode::IntensityFade => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    return vec3<f32>(smoothstep(u.color_intensity * 200.0, 0.0, t));
}
"#,
            ColorMode::DistanceMultiply => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    let density = clamp(abs(d * 3.0 + 0.1), 0.0, 1.0);
    return bg * density;
}
"#,
            ColorMode::BandIsolation => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let density = smoothstep(0.1, 0.4, d) * smoothstep(0.9, 0.6, d);
    return vec3<f32>(density);
}
"#,
            ColorMode::HighFreqPalette => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    (*accum).value = palette(t * (u.color_intensity * 10.0) + u.time * 0.025) * u.background_brightness;
    (*accum).intensity = 1.0;
    return (*accum).value;
}
"#,
            ColorMode::PositionDepth => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    (*accum).value = palette((u.color_intensity * 10.0) * p.z + u.time * 0.025) * u.background_brightness;
    (*accum).intensity = 1.0;
    var shade = vec3<f32>(length(p * 0.25));
    shade = pow(shade, vec3<f32>(1.0 / 2.2));
    shade = vec3<f32>(1.0) - shade;
    return shade * (*accum).value;
}
"#,
            ColorMode::TimePaletteShape => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    (*accum).value = palette((u.color_intensity * 4.0) * t + u.time * 0.025);
    (*accum).intensity = 1.0;
    let shape_factor = smoothstep(0.5, 0.0, d);
    let level = mix(1.0, 0.0, u.background_brightness);
    let darken = mix(0.0, level, 1.0 - shape_factor);
    return (*accum).value - vec3<f32>(darken) * 2.0;
}
"#,
            ColorMode::Posterized => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    let density = step(d, 0.001) * 2.0;
    (*accum).value += bg * density * (*accum).intensity;
    (*accum).intensity *= 1.0 - density * 0.1;
    let levels = 2.0;
    return floor((*accum).value * levels) / levels;
}
"#,
            ColorMode::SmoothSurface => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let remapped = mix(0.0, 3.0, u.color_intensity);
    let bg = palette(t * remapped + u.time * 0.025) * u.background_brightness;
    return vec3<f32>(smoothstep(0.25, 0.0, d)) * bg;
}
"#,
            ColorMode::BandedRings => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    var rings = vec3<f32>(sin(d * u.background_brightness * 10.0) * 50.0);
    rings = pow(rings, vec3<f32>(u.color_intensity * 20.0));
    let threshold = 0.5;
    let sharpness = 0.05;
    return smoothstep(vec3<f32>(threshold - sharpness), vec3<f32>(threshold + sharpness), rings);
}
"#,
            ColorMode::RawDistance => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    return vec3<f32>(d);
}
"#,
            ColorMode::GlassMaterial => r#"
fn apply_color_mode(t: f32, d: f32, i: i32, p: vec3<f32>, accum: ptr<function, ColorAccum>) -> vec3<f32> {
    let freq = f32(i) * 0.5 * (u.color_intensity * 10.0);
    let spectral = max(
        sin(vec3<f32>(1.0, 2.0, 3.0) + freq) * 1.3 / max(d, 0.001),
        vec3<f32>(length(p * p))
    );
    let tint = palette(t * (u.color_intensity * 10.0) + u.time * 0.025) * 2.0;
    (*accum).value += spectral * tint;
    let tone = tanh((*accum).value * (*accum).value / 1e6);

    let shape_factor = smoothstep(0.5, 0.0, d);
    let gradient = palette(u.time * 0.025 + t * 0.05 + t * u.color_intensity * 0.1);
    let level = mix(1.0, 0.0, u.background_brightness);
    let darken = mix(0.0, level, 1.0 - shape_factor);
    let background = gradient - vec3<f32>(darken) * 2.0;

    let glass_mix = mix(0.5, 1.0, u.background_brightness);
    return mix(background, tone, shape_factor) * glass_mix;
}
"#,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fn_name(signature: &str) -> &str {
        let rest = signature.trim_start_matches("fn ");
        &rest[..rest.find('(').unwrap_or(rest.len())]
    }

    fn assert_library_defines_signature<L: EffectLibrary>() {
        let name = fn_name(L::SIGNATURE);
        for variant in L::ALL {
            let src = variant.fragment();
            let needle = format!("fn {}(", name);
            assert_eq!(
                src.matches(&needle).count(),
                1,
                "{} variant {:?} must define {} exactly once",
                L::NAME,
                variant,
                name
            );
            let signature_head = &L::SIGNATURE[..L::SIGNATURE.find(')').unwrap_or(0)];
            assert!(
                src.contains(signature_head),
                "{} variant {:?} does not match signature",
                L::NAME,
                variant
            );
        }
    }

    #[test]
    fn test_library_sizes() {
        assert_eq!(ShapeKind::ALL.len(), 13);
        assert_eq!(CrunchKind::ALL.len(), 15);
        assert_eq!(DisplaceKind::ALL.len(), 8);
        assert_eq!(SdfEffectKind::ALL.len(), 11);
        assert_eq!(ColorMode::ALL.len(), 16);
    }

    #[test]
    fn test_every_variant_defines_signature() {
        assert_library_defines_signature::<ShapeKind>();
        assert_library_defines_signature::<CrunchKind>();
        assert_library_defines_signature::<DisplaceKind>();
        assert_library_defines_signature::<SdfEffectKind>();
        assert_library_defines_signature::<ColorMode>();
    }

    #[test]
    fn test_index_round_trip() {
        for (i, shape) in ShapeKind::ALL.iter().enumerate() {
            assert_eq!(shape.index(), i);
            assert_eq!(ShapeKind::from_index(i as i64), *shape);
        }
        assert_eq!(ShapeKind::from_index(10), ShapeKind::Sphere);
        assert_eq!(ColorMode::from_index(15), ColorMode::GlassMaterial);
    }

    #[test]
    fn test_out_of_range_falls_back_to_first() {
        for i in [-1_i64, -1000, 13, 16, i64::MAX, i64::MIN] {
            assert_eq!(ShapeKind::from_index(i), ShapeKind::Box);
        }
        for i in [-1_i64, 15, 115, i64::MAX, i64::MIN] {
            assert_eq!(CrunchKind::from_index(i), CrunchKind::Basic);
        }
        for i in [-1_i64, 16, 1000, i64::MAX, i64::MIN] {
            assert_eq!(ColorMode::from_index(i), ColorMode::PaletteShape);
        }
        assert_eq!(DisplaceKind::from_index(8), DisplaceKind::TimeOffset);
        assert_eq!(SdfEffectKind::from_index(11), SdfEffectKind::SineWave);
    }

    #[test]
    fn test_keys_are_unique_and_resolvable() {
        for shape in ShapeKind::ALL {
            assert_eq!(ShapeKind::from_key(shape.key()), *shape);
        }
        assert_eq!(ColorMode::from_key("paletteGradient"), ColorMode::PaletteShape);
        let mut keys: Vec<_> = CrunchKind::ALL.iter().map(|c| c.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), CrunchKind::ALL.len());
    }

    #[test]
    fn test_fragments_are_distinct() {
        let box_src = ShapeKind::Box.fragment();
        let sphere_src = ShapeKind::Sphere.fragment();
        assert_ne!(box_src, sphere_src);
        assert!(!sphere_src.contains("sd_box"));
    }
}
