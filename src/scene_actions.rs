//! Resets and randomizers over the engine's parameters.
//!
//! Randomizers take an explicit RNG so sequences are reproducible in tests.
//! Actions that change a discrete selector request a rebuild themselves.

use std::f32::consts::PI;

use glam::Vec3;

use crate::engine::{Engine, DEFAULT_SPEED};
use crate::integrators::{Drift3, Oscillator, DRIFT_ORIGIN};
use crate::params::{Palette, CURATED_PALETTES};

fn set(engine: &mut Engine, name: &str, v: f32) {
    engine.params_mut().set_float(name, v);
}

fn get(engine: &Engine, name: &str) -> f32 {
    engine.params().float(name)
}

fn range(rng: &mut fastrand::Rng, lo: f32, hi: f32) -> f32 {
    lo + rng.f32() * (hi - lo)
}

// ============================================================================
// Resets
// ============================================================================

pub fn reset_camera(engine: &mut Engine) {
    set(engine, "camera_theta", 0.0);
    set(engine, "camera_phi", 1.57);
    set(engine, "camera_distance", 3.0);
}

pub fn reset_twist(engine: &mut Engine) {
    set(engine, "twist", 0.0);
}

pub fn reset_spin(engine: &mut Engine) {
    set(engine, "spin", 0.0);
    engine.integrators.spin = Oscillator::default();
    set(engine, "rot_time_sin", 0.0);
    set(engine, "rot_time_cos", 1.0);
}

pub fn reset_size(engine: &mut Engine) {
    set(engine, "box_size", 0.1);
}

pub fn reset_scale(engine: &mut Engine) {
    set(engine, "distance_scale", 1.0);
}

pub fn reset_rotation(engine: &mut Engine) {
    set(engine, "fractal_rotation_speed", 0.0);
    engine.integrators.fractal_rotation.reset();
    set(engine, "fractal_rot_time_sin", 0.0);
    set(engine, "fractal_rot_time_cos", 1.0);
}

pub fn reset_fractal_spread(engine: &mut Engine) {
    set(engine, "fractal_halving_x_base", 2.0);
    set(engine, "fractal_halving_y_base", 2.0);
    set(engine, "fractal_halving_z_base", 0.5);
}

pub fn reset_fractal_motion(engine: &mut Engine) {
    engine.integrators.drift = Drift3::with_phase(DRIFT_ORIGIN);
    engine.integrators.halving = Drift3::default();
    let params = engine.params_mut();
    for (axis, drift) in ["x", "y", "z"].iter().zip(DRIFT_ORIGIN.to_array()) {
        params.set_float(&format!("fractal_drift_{}", axis), drift);
        params.set_float(&format!("fractal_drift_offset_{}", axis), drift);
        params.set_float(&format!("fractal_halving_freq_{}", axis), 0.0);
        params.set_float(&format!("fractal_halving_time_{}", axis), 0.0);
        params.set_float(&format!("fractal_halving_phase_{}", axis), 0.0);
    }
}

pub fn reset_color_period(engine: &mut Engine) {
    set(engine, "color_intensity", 0.005);
    set(engine, "background_brightness", 1.0);
}

pub fn reset_displacements(engine: &mut Engine) {
    set(engine, "crunch", 0.0);
    set(engine, "displacement_amp", 0.0);
    set(engine, "displacement_freq", 20.0);
    set(engine, "sdf_effect_mix", 0.0);
    engine.rebuild_if_needed(false);
}

pub fn reset_warps(engine: &mut Engine) {
    for name in [
        "warp_amplitude",
        "bloat_strength",
        "polarize",
        "lens_distort",
        "uv_rotate",
        "uv_feedback_opacity",
        "pattern_type",
    ] {
        set(engine, name, 0.0);
    }
    set(engine, "uv_scale", 1.0);
    let params = engine.params_mut();
    params.set_vec2("uv_distort", [0.0, 0.0]);
    let grid = params.vec3("uv_grid_size");
    params.set_vec3("uv_grid_size", [grid[0], grid[1], 0.0]);
}

pub fn reset_all(engine: &mut Engine) {
    reset_camera(engine);
    reset_twist(engine);
    reset_spin(engine);
    reset_size(engine);
    reset_scale(engine);
    reset_rotation(engine);
    reset_fractal_spread(engine);
    reset_fractal_motion(engine);
    reset_color_period(engine);
    reset_displacements(engine);
    reset_warps(engine);
}

// ============================================================================
// Randomizers
// ============================================================================

/// Pick an effect family from a 0..100 roll against cumulative
/// thresholds 2/5/10/20/60.
pub fn randomize_sdf_effect(engine: &mut Engine, rng: &mut fastrand::Rng) {
    reset_displacements(engine);
    let roll = rng.f32() * 100.0;
    if roll < 2.0 {
        randomize_sdf_effect_only(engine, rng);
        randomize_crunch(engine, rng);
        randomize_displacement(engine, rng);
    } else if roll < 5.0 {
        randomize_sdf_effect_only(engine, rng);
        randomize_displacement(engine, rng);
    } else if roll < 10.0 {
        randomize_sdf_effect_only(engine, rng);
        randomize_crunch(engine, rng);
    } else if roll < 20.0 {
        randomize_sdf_effect_only(engine, rng);
    } else if roll < 60.0 {
        randomize_crunch(engine, rng);
    } else {
        randomize_displacement(engine, rng);
    }
    engine.rebuild_if_needed(false);
}

pub fn randomize_sdf_effect_only(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "sdf_effect_type", rng.u32(0..11) as f32);
    if get(engine, "sdf_effect_mix") == 0.0 {
        set(engine, "sdf_effect_mix", 1.0);
    }
    engine.rebuild_if_needed(false);
}

pub fn randomize_displacement(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "displacement_type", rng.u32(0..8) as f32);
    if get(engine, "displacement_amp") == 0.0 {
        set(engine, "displacement_amp", 0.05);
    }
    engine.rebuild_if_needed(false);
}

pub fn randomize_crunch(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "crunch_type", rng.u32(0..15) as f32);
    set(engine, "crunch", rng.f32());
    engine.rebuild_if_needed(false);
}

/// Toggle image feedback between off and a long trail.
pub fn quick_feedback(engine: &mut Engine) {
    let next = if get(engine, "feedback_opacity") > 0.5 { 0.0 } else { 0.98 };
    set(engine, "feedback_opacity", next);
}

pub fn quick_uv_feedback(engine: &mut Engine, rng: &mut fastrand::Rng) {
    let next = if get(engine, "uv_feedback_opacity") > 0.5 { 0.0 } else { 0.98 };
    set(engine, "uv_feedback_opacity", next);
    set(engine, "uv_feedback_distort", range(rng, 0.01, 0.31));
    set(engine, "uv_feedback_noise_scale", range(rng, 0.1, 4.1));
    set(engine, "uv_pixel_size", 0.0);
    set(engine, "uv_feedback_blur", range(rng, 0.0, 0.2));
    set(engine, "uv_feedback_seed", rng.u32(0..100) as f32);
}

pub fn quick_warp(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "warp_amplitude", rng.f32());
    set(engine, "warp_gain", rng.f32());
    set(engine, "warp_layers", rng.u32(1..=5) as f32);
    set(engine, "warp_harmonics", rng.u32(1..=2) as f32);
    set(engine, "warp_lacunarity", range(rng, 1.0, 4.0));
}

pub fn quick_pattern(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "pattern_type", rng.u32(1..=3) as f32);
    let strength = range(rng, 0.5, 1.0);
    let x = range(rng, 1.0, 6.0);
    let y = range(rng, 1.0, 6.0);
    engine.params_mut().set_vec3("uv_grid_size", [x, y, strength]);
}

/// Clear UV effects if any are active, otherwise start one (50/30/20 %).
pub fn random_uv_effect(engine: &mut Engine, rng: &mut fastrand::Rng) {
    let active = get(engine, "uv_feedback_opacity") > 0.0
        || get(engine, "warp_amplitude") > 0.0
        || get(engine, "pattern_type") > 0.0;
    if active {
        reset_warps(engine);
        return;
    }
    let roll = rng.f32() * 100.0;
    if roll < 50.0 {
        quick_uv_feedback(engine, rng);
    } else if roll < 80.0 {
        quick_warp(engine, rng);
    } else {
        quick_pattern(engine, rng);
    }
}

/// 40 % chance of no twist, otherwise uniform in [-1, 1).
pub fn randomize_twist(engine: &mut Engine, rng: &mut fastrand::Rng) {
    let twist = if rng.f32() * 100.0 < 40.0 {
        0.0
    } else {
        (rng.f32() - 0.5) * 2.0
    };
    set(engine, "twist", twist);
}

pub fn randomize_shape(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "shape_type", rng.u32(0..13) as f32);
    engine.rebuild_if_needed(false);
}

pub fn randomize_size(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "box_size", range(rng, 0.05, 0.5));
}

pub fn randomize_spread(engine: &mut Engine, rng: &mut fastrand::Rng) {
    for axis in ["x", "y", "z"] {
        let base = range(rng, 0.1, 4.1);
        set(engine, &format!("fractal_halving_{}_base", axis), base);
    }
}

pub fn randomize_color_period(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "color_intensity", range(rng, 0.001, 0.101));
}

pub fn randomize_camera(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "camera_theta", rng.f32() * PI * 2.0);
    set(engine, "camera_phi", PI * 0.3 + rng.f32() * PI * 0.4);
}

pub fn randomize_color_mode(engine: &mut Engine, rng: &mut fastrand::Rng) {
    set(engine, "color_type", rng.u32(0..13) as f32);
    engine.rebuild_if_needed(false);
}

/// Fully random palette.
pub fn randomize_palette(engine: &mut Engine, rng: &mut fastrand::Rng) {
    engine.params_mut().set_palette(&Palette::random(rng));
}

/// Curated palette by index; out-of-range indices are ignored.
pub fn curated_palette(engine: &mut Engine, index: usize) -> bool {
    match CURATED_PALETTES.get(index) {
        Some(palette) => {
            engine.params_mut().set_palette(palette);
            true
        }
        None => false,
    }
}

// ============================================================================
// Toggles
// ============================================================================

/// Switch between single and fractal shape modes.
pub fn toggle_fractal(engine: &mut Engine) {
    let next = if engine.params().int("shape_mode") == 0 { 2.0 } else { 0.0 };
    set(engine, "shape_mode", next);
    engine.rebuild_if_needed(false);
}

/// Stop motion or resume at the default speed.
pub fn toggle_speed(engine: &mut Engine) {
    engine.speed = if engine.speed > 0.0 { 0.0 } else { DEFAULT_SPEED };
}

const SPEED_STEPS: [f32; 4] = [0.1, 0.5, 1.0, 2.0];
const DETAIL_STEPS: [f32; 3] = [30.0, 60.0, 120.0];
const RESOLUTION_STEPS: [f32; 3] = [0.5, 0.7, 1.0];

fn next_step(steps: &[f32], current: f32) -> f32 {
    let i = steps.iter().position(|s| (s - current).abs() < 0.01);
    match i {
        Some(i) => steps[(i + 1) % steps.len()],
        None => steps[0],
    }
}

pub fn cycle_speed(engine: &mut Engine) -> f32 {
    engine.speed = next_step(&SPEED_STEPS, engine.speed);
    engine.speed
}

pub fn cycle_detail(engine: &mut Engine) -> f32 {
    let next = next_step(&DETAIL_STEPS, get(engine, "lod_quality"));
    set(engine, "lod_quality", next);
    next
}

pub fn cycle_resolution(engine: &mut Engine) -> f32 {
    engine.config.resolution_scale = next_step(&RESOLUTION_STEPS, engine.config.resolution_scale);
    engine.apply_size();
    engine.config.resolution_scale
}

/// Current drift offset, for display.
pub fn drift_offset(engine: &Engine) -> Vec3 {
    engine.integrators.drift.phase
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn setup() -> (Engine, fastrand::Rng) {
        (
            Engine::new(EngineConfig { palette_seed: Some(9), ..Default::default() }),
            fastrand::Rng::with_seed(42),
        )
    }

    #[test]
    fn test_reset_spin_zeroes_integrator() {
        let (mut e, _) = setup();
        e.set_float("spin", 3.0);
        e.advance_frame(0.1);
        assert!(e.integrators.spin.velocity > 0.0);
        reset_spin(&mut e);
        assert_eq!(e.integrators.spin, Oscillator::default());
        assert_eq!(e.params().float("rot_time_cos"), 1.0);
    }

    #[test]
    fn test_reset_fractal_motion() {
        let (mut e, _) = setup();
        e.set_float("fractal_drift_x", 1.0);
        e.set_float("fractal_halving_time_y", 1.0);
        e.advance_frame(0.1);
        reset_fractal_motion(&mut e);
        assert_eq!(drift_offset(&e), DRIFT_ORIGIN);
        assert_eq!(e.integrators.halving.velocity, Vec3::ZERO);
        assert_eq!(e.params().float("fractal_drift_x"), 0.0);
        assert_eq!(e.params().float("fractal_drift_offset_z"), 0.1);
    }

    #[test]
    fn test_randomize_shape_rebuilds() {
        let (mut e, mut rng) = setup();
        for _ in 0..20 {
            randomize_shape(&mut e, &mut rng);
            let shape = e.params().int("shape_type");
            assert!((0..13).contains(&shape));
            assert_eq!(e.program().config.shape_type, shape);
        }
    }

    #[test]
    fn test_randomize_color_mode_rebuilds() {
        let (mut e, mut rng) = setup();
        for _ in 0..30 {
            randomize_color_mode(&mut e, &mut rng);
            let color = e.params().int("color_type");
            assert!((0..13).contains(&color));
            assert_eq!(e.program().config.color_type, color);
        }
    }

    #[test]
    fn test_randomize_crunch_rebuilds() {
        let (mut e, mut rng) = setup();
        for _ in 0..30 {
            randomize_crunch(&mut e, &mut rng);
            let crunch = e.params().int("crunch_type");
            assert!((0..15).contains(&crunch));
            assert_eq!(e.program().config.crunch_type, crunch);
            assert!((0.0..=1.0).contains(&e.params().float("crunch")));
        }
    }

    #[test]
    fn test_twist_spread_and_color_period_ranges() {
        let (mut e, mut rng) = setup();
        let (mut zero, mut nonzero) = (0, 0);
        for _ in 0..100 {
            randomize_twist(&mut e, &mut rng);
            let twist = e.params().float("twist");
            assert!((-1.0..=1.0).contains(&twist));
            if twist == 0.0 {
                zero += 1;
            } else {
                nonzero += 1;
            }

            randomize_spread(&mut e, &mut rng);
            for axis in ["x", "y", "z"] {
                let base = e.params().float(&format!("fractal_halving_{}_base", axis));
                assert!((0.1..=4.1).contains(&base));
            }

            randomize_color_period(&mut e, &mut rng);
            let period = e.params().float("color_intensity");
            assert!((0.001..=0.101).contains(&period));
        }
        assert!(zero > 0);
        assert!(nonzero > 0);
    }

    #[test]
    fn test_reset_all_restores_defaults() {
        let (mut e, mut rng) = setup();
        let (fresh, _) = setup();
        e.set_float("twist", 0.7);
        e.set_float("spin", 2.0);
        e.set_float("fractal_rotation_speed", 1.5);
        e.set_float("fractal_drift_y", 0.8);
        e.set_float("warp_amplitude", 0.6);
        randomize_camera(&mut e, &mut rng);
        for _ in 0..5 {
            e.advance_frame(0.1);
        }

        reset_all(&mut e);
        assert_eq!(e.params().float("twist"), 0.0);
        assert_eq!(e.params().float("warp_amplitude"), 0.0);
        assert_eq!(e.integrators.spin, Oscillator::default());
        assert_eq!(e.integrators.fractal_rotation, Oscillator::default());
        assert_eq!(drift_offset(&e), DRIFT_ORIGIN);
        for name in ["camera_theta", "camera_phi", "camera_distance"] {
            assert_eq!(e.params().float(name), fresh.params().float(name));
        }
    }

    #[test]
    fn test_displacement_amp_nudged_from_zero() {
        let (mut e, mut rng) = setup();
        randomize_displacement(&mut e, &mut rng);
        assert_eq!(e.params().float("displacement_amp"), 0.05);
        assert!(e.program().config.displacement_amp_nonzero);
    }

    #[test]
    fn test_quick_feedback_toggles() {
        let (mut e, _) = setup();
        quick_feedback(&mut e);
        assert_eq!(e.params().float("feedback_opacity"), 0.98);
        quick_feedback(&mut e);
        assert_eq!(e.params().float("feedback_opacity"), 0.0);
    }

    #[test]
    fn test_random_uv_effect_resets_when_active() {
        let (mut e, mut rng) = setup();
        e.set_float("warp_amplitude", 0.5);
        random_uv_effect(&mut e, &mut rng);
        assert_eq!(e.params().float("warp_amplitude"), 0.0);
    }

    #[test]
    fn test_ranges() {
        let (mut e, mut rng) = setup();
        for _ in 0..50 {
            randomize_size(&mut e, &mut rng);
            let size = e.params().float("box_size");
            assert!((0.05..0.5).contains(&size));
            randomize_camera(&mut e, &mut rng);
            let phi = e.params().float("camera_phi");
            assert!(phi >= PI * 0.3 && phi <= PI * 0.7 + 1e-5);
            quick_warp(&mut e, &mut rng);
            let layers = e.params().float("warp_layers");
            assert!((1.0..=5.0).contains(&layers));
        }
    }

    #[test]
    fn test_curated_palette_bounds() {
        let (mut e, _) = setup();
        assert!(curated_palette(&mut e, 6));
        assert_eq!(e.params().palette(), CURATED_PALETTES[6]);
        assert!(!curated_palette(&mut e, 7));
    }

    #[test]
    fn test_cycles() {
        let (mut e, _) = setup();
        assert_eq!(cycle_speed(&mut e), 1.0);
        assert_eq!(cycle_detail(&mut e), 120.0);
        assert_eq!(cycle_detail(&mut e), 30.0);
        assert_eq!(cycle_resolution(&mut e), 1.0);
        toggle_speed(&mut e);
        assert_eq!(e.speed, 0.0);
        toggle_fractal(&mut e);
        assert_eq!(e.program().config.shape_mode, 2);
    }
}
