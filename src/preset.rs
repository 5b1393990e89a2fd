//! Preset import/export.
//!
//! Presets are JSON documents carrying every `u_*` control, the post chain
//! settings, gallery framing and the integrator phases needed to resume motion
//! where it left off. Import is tolerant: unknown keys are skipped, keys of the
//! wrong shape are skipped, and nothing is touched until the whole document
//! has parsed.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::engine::{Engine, FramePlan};
use crate::gallery::{parse_hex_rgb, GalleryAspect};
use crate::params::{canonical_name, ParamKind, ParamValue, UNIFORMS};
use crate::post_processing::Rgb;

pub const PRESET_VERSION: &str = "1.1";

/// Uniforms that are engine-owned or exported separately.
const NOT_EXPORTED: &[&str] = &["time", "resolution", "turb_time", "image_texture"];

#[derive(Debug)]
pub enum PresetError {
    Parse(serde_json::Error),
    /// The document has no `uniforms` object.
    MissingUniforms,
    Io(std::io::Error),
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetError::Parse(e) => write!(f, "preset is not valid JSON: {}", e),
            PresetError::MissingUniforms => write!(f, "preset has no 'uniforms' object"),
            PresetError::Io(e) => write!(f, "preset file error: {}", e),
        }
    }
}

impl std::error::Error for PresetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PresetError::Parse(e) => Some(e),
            PresetError::Io(e) => Some(e),
            PresetError::MissingUniforms => None,
        }
    }
}

impl From<serde_json::Error> for PresetError {
    fn from(e: serde_json::Error) -> Self {
        PresetError::Parse(e)
    }
}

impl From<std::io::Error> for PresetError {
    fn from(e: std::io::Error) -> Self {
        PresetError::Io(e)
    }
}

// ============================================================================
// Export
// ============================================================================

fn vec_json(value: &ParamValue) -> Option<Value> {
    match value {
        ParamValue::Float(v) => Some(json!(v)),
        ParamValue::Vec2([x, y]) => Some(json!({ "x": x, "y": y })),
        ParamValue::Vec3([x, y, z]) => Some(json!({ "x": x, "y": y, "z": z })),
        ParamValue::Texture(_) => None,
    }
}

fn to_value<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

/// `Preset_2024-01-02T03-04-05`
pub fn preset_name(at: DateTime<Utc>) -> String {
    let iso = at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let trimmed = iso.trim_end_matches('Z');
    format!("Preset_{}", trimmed.replace(':', "-"))
}

/// Serialize the engine state as a preset document.
pub fn export_preset(engine: &Engine, at: DateTime<Utc>) -> Value {
    let params = engine.params();
    let mut uniforms = Map::new();
    uniforms.insert("speed".to_string(), json!(engine.speed));
    for (def, value) in params.iter() {
        if NOT_EXPORTED.contains(&def.name) {
            continue;
        }
        if let Some(v) = vec_json(value) {
            uniforms.insert(format!("u_{}", def.name), v);
        }
    }
    uniforms.insert(
        "u_fractal_rot_phase".to_string(),
        json!(engine.integrators.fractal_rotation.angle),
    );

    json!({
        "name": preset_name(at),
        "timestamp": at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "version": PRESET_VERSION,
        "uniforms": Value::Object(uniforms),
        "bloom": to_value(&engine.post.bloom),
        "normals": to_value(&engine.post.normals),
        "colorGrading": to_value(&engine.post.color_grading),
        "edge": to_value(&engine.post.edge),
        "gallery": to_value(&engine.gallery),
    })
}

pub fn export_preset_string(engine: &Engine, at: DateTime<Utc>) -> String {
    serde_json::to_string_pretty(&export_preset(engine, at)).unwrap_or_default()
}

// ============================================================================
// Import
// ============================================================================

/// Map legacy key names onto current uniforms.
fn resolve_alias(name: &str) -> String {
    if let Some(base) = name.strip_suffix("_octaves") {
        return format!("{}_harmonics", base);
    }
    if let Some(base) = name.strip_suffix("_persistence") {
        return format!("{}_gain", base);
    }
    name.to_string()
}

/// Decode one preset value for a parameter of `kind`. Wrong shapes yield `None`.
fn decode_value(kind: ParamKind, v: &Value) -> Option<ParamValue> {
    let num = |key: &str| v.get(key).and_then(Value::as_f64).map(|f| f as f32);
    match kind {
        ParamKind::Float | ParamKind::Int => v.as_f64().map(|f| ParamValue::Float(f as f32)),
        ParamKind::Vec2 => Some(ParamValue::Vec2([num("x")?, num("y")?])),
        ParamKind::Vec3 => Some(ParamValue::Vec3([num("x")?, num("y")?, num("z")?])),
        ParamKind::Texture => None,
    }
}

/// Overlay the keys of `patch` onto `current`, skipping keys that don't fit.
fn merge_section<T>(current: &T, patch: &Value, section: &str) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(patch) = patch.as_object() else {
        return current.clone();
    };
    let mut merged = current.clone();
    for (key, value) in patch {
        let mut candidate = to_value(&merged);
        let Some(obj) = candidate.as_object_mut() else {
            break;
        };
        if !obj.contains_key(key) {
            continue;
        }
        obj.insert(key.clone(), value.clone());
        match serde_json::from_value::<T>(candidate) {
            Ok(next) => merged = next,
            Err(_) => log::warn!("Skipping preset field {}.{}", section, key),
        }
    }
    merged
}

/// `borderColor` may be `{x,y,z}` or `"#rrggbb"`; invalid hex becomes white.
fn normalize_border_color(section: &Value) -> Value {
    let mut section = section.clone();
    if let Some(obj) = section.as_object_mut() {
        if let Some(Value::String(hex)) = obj.get("borderColor") {
            let rgb = parse_hex_rgb(hex)
                .map(|c| Rgb {
                    x: c[0] as f32 / 255.0,
                    y: c[1] as f32 / 255.0,
                    z: c[2] as f32 / 255.0,
                })
                .unwrap_or(Rgb::WHITE);
            obj.insert("borderColor".to_string(), to_value(&rgb));
        }
    }
    section
}

/// Fully decoded preset, ready to apply.
struct ParsedPreset {
    speed: Option<f32>,
    values: Vec<(&'static str, ParamValue)>,
    fractal_rot_phase: Option<f32>,
    doc: Value,
}

fn parse(json_text: &str) -> Result<ParsedPreset, PresetError> {
    let doc: Value = serde_json::from_str(json_text)?;
    let uniforms = doc
        .get("uniforms")
        .and_then(Value::as_object)
        .ok_or(PresetError::MissingUniforms)?;

    let mut values = Vec::new();
    for def in UNIFORMS {
        if NOT_EXPORTED.contains(&def.name) {
            continue;
        }
        // Current name wins over legacy aliases.
        let found = uniforms.iter().find(|(k, _)| canonical_name(k) == def.name).or_else(|| {
            uniforms
                .iter()
                .find(|(k, _)| resolve_alias(&canonical_name(k)) == def.name)
        });
        let Some((key, raw)) = found else {
            continue;
        };
        match decode_value(def.kind, raw) {
            Some(v) => values.push((def.name, v)),
            None => log::warn!("Skipping preset uniform '{}': expected {}", key, def.kind),
        }
    }

    let number = |key: &str| uniforms.get(key).and_then(Value::as_f64).map(|f| f as f32);
    Ok(ParsedPreset {
        speed: number("speed"),
        values,
        fractal_rot_phase: number("u_fractal_rot_phase"),
        doc,
    })
}

/// Apply a preset document. On error the engine is untouched.
pub fn apply_preset(engine: &mut Engine, json_text: &str) -> Result<FramePlan, PresetError> {
    let preset = parse(json_text)?;

    if let Some(speed) = preset.speed {
        engine.speed = speed;
    }
    for (name, value) in preset.values {
        engine.set_parameter(name, value);
    }

    // Integrator phases and momentum.
    let rot_phase = preset
        .fractal_rot_phase
        .unwrap_or(engine.integrators.fractal_rotation.angle);
    if preset.fractal_rot_phase.is_some() {
        let (sin, cos) = rot_phase.sin_cos();
        let params = engine.params_mut();
        params.set_float("fractal_rot_time_sin", sin);
        params.set_float("fractal_rot_time_cos", cos);
    }
    let snapshot = engine.params().clone();
    engine.integrators.resync_from(&snapshot, rot_phase);

    let doc = &preset.doc;
    if let Some(section) = doc.get("bloom") {
        engine.post.bloom = merge_section(&engine.post.bloom, section, "bloom");
    }
    if let Some(section) = doc.get("normals") {
        engine.post.normals = merge_section(&engine.post.normals, section, "normals");
    }
    if let Some(section) = doc.get("colorGrading") {
        let section = normalize_border_color(section);
        engine.post.color_grading =
            merge_section(&engine.post.color_grading, &section, "colorGrading");
    }
    if let Some(section) = doc.get("edge") {
        engine.post.edge = merge_section(&engine.post.edge, section, "edge");
    }
    if let Some(section) = doc.get("gallery") {
        let text = |key: &str| section.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
        let aspect = GalleryAspect::parse(text("aspect").unwrap_or("fullscreen"));
        engine.gallery.scale = section
            .get("scale")
            .and_then(Value::as_f64)
            .filter(|s| *s != 0.0)
            .map(|s| s as f32)
            .unwrap_or(0.5);
        engine.gallery.bg_color = text("bgColor").unwrap_or("#000000").to_string();
        engine.gallery.set_aspect(aspect);
        engine.apply_size();
    }

    engine.rebuild_if_needed(true);
    log::info!("Preset applied");
    Ok(engine.present_once())
}

pub fn load_preset_file(engine: &mut Engine, path: &Path) -> Result<FramePlan, PresetError> {
    let text = std::fs::read_to_string(path)?;
    apply_preset(engine, &text)
}

pub fn save_preset_file(engine: &Engine, path: &Path, at: DateTime<Utc>) -> Result<(), PresetError> {
    std::fs::write(path, export_preset_string(engine, at))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use chrono::TimeZone;

    fn engine() -> Engine {
        Engine::new(EngineConfig { palette_seed: Some(3), ..Default::default() })
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn test_preset_name_format() {
        assert_eq!(preset_name(at()), "Preset_2024-05-06T07-08-09");
    }

    #[test]
    fn test_export_shape() {
        let doc = export_preset(&engine(), at());
        assert_eq!(doc["version"], "1.1");
        assert_eq!(doc["uniforms"]["speed"], json!(0.5f32));
        assert!(doc["uniforms"]["u_palette_a"]["z"].is_number());
        assert!(doc["uniforms"]["u_uv_distort"]["y"].is_number());
        assert!(doc["uniforms"].get("u_time").is_none());
        assert!(doc["uniforms"].get("u_fractal_rot_phase").is_some());
        assert_eq!(doc["gallery"]["aspect"], "fullscreen");
        assert_eq!(doc["normals"]["F0"], json!(0.04f32));
    }

    #[test]
    fn test_missing_uniforms_is_error() {
        let mut e = engine();
        assert!(matches!(apply_preset(&mut e, r#"{"name": "x"}"#), Err(PresetError::MissingUniforms)));
        assert!(matches!(apply_preset(&mut e, r#"{"uniforms": 3}"#), Err(PresetError::MissingUniforms)));
        assert!(matches!(apply_preset(&mut e, "{not json"), Err(PresetError::Parse(_))));
    }

    #[test]
    fn test_legacy_aliases() {
        let mut e = engine();
        apply_preset(&mut e, r#"{"uniforms": {"u_feedback_octaves": 6, "u_uv_feedback_persistence": 0.25}}"#)
            .unwrap();
        assert_eq!(e.params().float("feedback_harmonics"), 6.0);
        assert_eq!(e.params().float("uv_feedback_gain"), 0.25);
    }

    #[test]
    fn test_shape_mismatch_skipped() {
        let mut e = engine();
        let before = e.params().vec3("palette_a");
        apply_preset(&mut e, r#"{"uniforms": {"u_palette_a": 1.0, "u_box_size": {"x": 1}, "u_twist": 0.3}}"#)
            .unwrap();
        assert_eq!(e.params().vec3("palette_a"), before);
        assert_eq!(e.params().float("box_size"), 0.1);
        assert_eq!(e.params().float("twist"), 0.3);
    }

    #[test]
    fn test_border_color_hex() {
        let mut e = engine();
        apply_preset(&mut e, r##"{"uniforms": {}, "colorGrading": {"borderColor": "#ff0000", "contrast": 2}}"##)
            .unwrap();
        assert_eq!(e.post.color_grading.border_color, Rgb { x: 1.0, y: 0.0, z: 0.0 });
        assert_eq!(e.post.color_grading.contrast, 2.0);

        apply_preset(&mut e, r#"{"uniforms": {}, "colorGrading": {"borderColor": "nope"}}"#).unwrap();
        assert_eq!(e.post.color_grading.border_color, Rgb::WHITE);
    }

    #[test]
    fn test_gallery_section_enables_framing() {
        let mut e = engine();
        apply_preset(&mut e, r#"{"uniforms": {}, "gallery": {"aspect": "1:1", "scale": 0}}"#).unwrap();
        assert!(e.gallery.enabled);
        assert_eq!(e.gallery.scale, 0.5);
        assert_eq!(e.gallery.bg_color, "#000000");
    }

    #[test]
    fn test_phases_resync_velocities() {
        let mut e = engine();
        apply_preset(
            &mut e,
            r#"{"uniforms": {"u_fractal_rot_phase": 1.0, "u_fractal_rotation_speed": 2.0,
                "u_fractal_drift_x": 0.3, "u_fractal_drift_offset_x": 5.0, "u_spin": 1.5}}"#,
        )
        .unwrap();
        assert_eq!(e.integrators.fractal_rotation.angle, 1.0);
        assert!((e.integrators.fractal_rotation.velocity - 0.4).abs() < 1e-6);
        assert_eq!(e.integrators.drift.phase.x, 5.0);
        assert_eq!(e.integrators.drift.velocity.x, 0.3);
        assert!((e.integrators.spin.velocity - 0.3).abs() < 1e-6);
        assert_eq!(e.params().float("fractal_rot_time_sin"), 1.0f32.sin());
    }
}
