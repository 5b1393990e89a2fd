//! Preset export/import through the public engine surface.
//!
//! Run with: cargo test --test presets

use chrono::{DateTime, TimeZone, Utc};
use raymarcher::gallery::GalleryAspect;
use raymarcher::preset::{apply_preset, export_preset, export_preset_string, PresetError};
use raymarcher::{Engine, EngineConfig};

fn engine(seed: u64) -> Engine {
    Engine::new(EngineConfig { palette_seed: Some(seed), ..Default::default() })
}

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
}

/// A non-default scene with live integrator state.
fn populated() -> Engine {
    let mut e = engine(5);
    e.set_float("shapeType", 10.0);
    e.set_float("fractal_rotation_speed", 1.5);
    e.set_float("spin", 0.7);
    e.set_float("fractal_drift_x", 0.2);
    e.set_float("fractal_halving_time_y", 0.4);
    e.set_float("displacementAmp", 0.3);
    e.speed = 1.0;
    e.post.bloom.strength = 0.6;
    e.post.color_grading.contrast = 1.4;
    e.post.edge.strength = 0.5;
    e.gallery.set_aspect(GalleryAspect::Square);
    e.rebuild_if_needed(false);
    for _ in 0..30 {
        e.advance_frame(1.0 / 60.0);
    }
    e
}

#[test]
fn test_export_import_export_is_idempotent() {
    let source = populated();
    let first = export_preset(&source, at());

    let mut target = engine(99);
    apply_preset(&mut target, &first.to_string()).unwrap();
    let second = export_preset(&target, at());

    assert_eq!(first, second);
}

#[test]
fn test_apply_restores_motion_state() {
    let source = populated();
    let mut target = engine(1);
    apply_preset(&mut target, &export_preset_string(&source, at())).unwrap();

    assert_eq!(
        target.integrators.fractal_rotation.angle,
        source.integrators.fractal_rotation.angle
    );
    assert_eq!(target.integrators.drift.phase, source.integrators.drift.phase);
    assert_eq!(target.params().palette(), source.params().palette());
    assert!(target.gallery.enabled);
}

#[test]
fn test_apply_forces_rebuild_and_presents() {
    let mut e = engine(2);
    let generation = e.program().generation;
    let plan = apply_preset(&mut e, r#"{"uniforms": {}}"#).unwrap();
    assert_eq!(e.program().generation, generation + 1);
    assert_eq!(plan, e.present_once());
}

#[test]
fn test_partial_preset_touches_only_named_keys() {
    let mut e = engine(3);
    let before = e.params().clone();
    apply_preset(
        &mut e,
        r#"{"uniforms": {"u_twist": 0.25, "u_made_up": 4, "u_box_size": "big"}, "bloom": {"strength": 0.9, "bogus": 1}}"#,
    )
    .unwrap();

    assert_eq!(e.params().float("twist"), 0.25);
    assert_eq!(e.params().float("box_size"), before.float("box_size"));
    assert_eq!(e.params().palette(), before.palette());
    assert_eq!(e.post.bloom.strength, 0.9);
}

#[test]
fn test_bad_input_leaves_state_untouched() {
    let mut e = populated();
    let snapshot = export_preset(&e, at());
    let generation = e.program().generation;

    for bad in ["", "{", "[1, 2]", r#"{"uniforms": [1]}"#, r#"{"name": "no uniforms"}"#] {
        let err = apply_preset(&mut e, bad).unwrap_err();
        assert!(matches!(err, PresetError::Parse(_) | PresetError::MissingUniforms), "{}", bad);
    }

    assert_eq!(export_preset(&e, at()), snapshot);
    assert_eq!(e.program().generation, generation);
}
