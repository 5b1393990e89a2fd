//! Program assembly through the public engine surface.
//!
//! Run with: cargo test --test shader_assembly

use raymarcher::effects::{ColorMode, CrunchKind, DisplaceKind, EffectLibrary, SdfEffectKind, ShapeKind};
use raymarcher::shader_assembler::{self, ShaderConfig, DISPLACEMENT_CALL};
use raymarcher::{Engine, EngineConfig};

fn engine() -> Engine {
    Engine::new(EngineConfig { palette_seed: Some(11), ..Default::default() })
}

fn count_fn(src: &str, name: &str) -> usize {
    src.matches(&format!("fn {}(", name)).count()
}

#[test]
fn test_every_config_builds_identically_twice() {
    for shape in 0..ShapeKind::ALL.len() as i64 {
        for color in [0, 5, ColorMode::ALL.len() as i64 - 1] {
            let config = ShaderConfig { shape_type: shape, color_type: color, shape_mode: 2, ..Default::default() };
            assert_eq!(shader_assembler::build(&config), shader_assembler::build(&config));
        }
    }
}

#[test]
fn test_fallback_for_any_index() {
    for index in [-1_000_000, -1, 1_000, i64::MAX, i64::MIN] {
        assert_eq!(ShapeKind::from_index(index), ShapeKind::ALL[0]);
        assert_eq!(CrunchKind::from_index(index), CrunchKind::ALL[0]);
        assert_eq!(DisplaceKind::from_index(index), DisplaceKind::ALL[0]);
        assert_eq!(SdfEffectKind::from_index(index), SdfEffectKind::ALL[0]);
        assert_eq!(ColorMode::from_index(index), ColorMode::ALL[0]);
    }
    assert_eq!(ShapeKind::from_index(0), ShapeKind::Box);
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
fn test_every_variant_defines_its_signature() {
    fn check<L: EffectLibrary>() {
        let name = L::SIGNATURE
            .strip_prefix("fn ")
            .and_then(|s| s.split('(').next())
            .unwrap();
        for variant in L::ALL {
            assert!(
                variant.fragment().contains(&format!("fn {}(", name)),
                "{} variant {:?} lacks {}",
                L::NAME,
                variant,
                name
            );
        }
    }
    check::<ShapeKind>();
    check::<CrunchKind>();
    check::<DisplaceKind>();
    check::<SdfEffectKind>();
    check::<ColorMode>();
}

#[test]
fn test_shape_switch_triggers_rebuild() {
    let mut e = engine();
    assert!(e.set_float("shapeType", 0.0));
    e.rebuild_if_needed(false);
    let before = e.program().source.clone();
    assert!(before.contains(ShapeKind::Box.fragment().trim()));

    assert!(e.set_float("shapeType", 10.0));
    assert!(e.rebuild_if_needed(false));
    let after = &e.program().source;
    assert_ne!(&before, after);
    assert!(after.contains(ShapeKind::Sphere.fragment().trim()));
    assert!(!after.contains(ShapeKind::Box.fragment().trim()));
}

#[test]
fn test_zero_displacement_elides_call() {
    let mut e = engine();
    e.set_float("displacementAmp", 0.0);
    e.rebuild_if_needed(false);
    assert!(!e.program().source.contains(DISPLACEMENT_CALL));

    e.set_float("displacementAmp", 0.5);
    assert!(e.rebuild_if_needed(false));
    assert!(e.program().source.contains(DISPLACEMENT_CALL));
}

#[test]
fn test_structure_of_generated_program() {
    let config = ShaderConfig { shape_type: 12, crunch_type: 7, displacement_type: 3, sdf_effect_type: 4, color_type: 9, ..Default::default() };
    let src = shader_assembler::build(&config);
    for name in ["sd_shape", "apply_crunch", "apply_displace", "apply_sdf_effect", "apply_color_mode", "map", "fs_main", "vs_main"] {
        assert_eq!(count_fn(&src, name), 1, "{} defined {} times", name, count_fn(&src, name));
    }
    assert_eq!(src.matches("struct Uniforms").count(), 1);
    assert!(src.contains("@fragment"));
    assert!(src.contains("@vertex"));
}

#[test]
fn test_uv_program_is_config_independent() {
    let mut e = engine();
    let uv = shader_assembler::build_uv_feedback();
    e.set_float("shapeType", 4.0);
    e.set_float("colorType", 2.0);
    e.rebuild_if_needed(false);
    assert_eq!(uv, shader_assembler::build_uv_feedback());
    assert_eq!(count_fn(&uv, "fs_main"), 1);
}
