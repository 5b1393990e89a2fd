//! Post-processing pass parameters.
//!
//! The chain runs in a fixed order after the raymarch pass:
//! normals → dither/RGB split → colour grade → edge/sharpen → bloom.
//! Every pass is a no-op at its default strength except dithering.
//!
//! Field names serialize in camelCase so the structs double as the preset
//! file's post-processing sections.

use serde::{Deserialize, Serialize};

use crate::gpu::BloomParams;

/// Pixels of blur radius per unit of the `radius` control.
pub const BLOOM_RADIUS_PX: f32 = 16.0;

/// A pass in the post chain, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PostPass {
    Normals,
    Dither,
    ColorGrade,
    Edge,
    Bloom,
}

impl PostPass {
    pub const ORDER: [PostPass; 5] = [
        PostPass::Normals,
        PostPass::Dither,
        PostPass::ColorGrade,
        PostPass::Edge,
        PostPass::Bloom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PostPass::Normals => "Screen Normals",
            PostPass::Dither => "Dither",
            PostPass::ColorGrade => "Color Grade",
            PostPass::Edge => "Edge",
            PostPass::Bloom => "Bloom",
        }
    }
}

/// RGB colour serialized as `{x, y, z}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { x: 1.0, y: 1.0, z: 1.0 };

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self { strength: 0.0, radius: 0.4, threshold: 0.85 }
    }
}

impl BloomSettings {
    /// Map the user-facing controls onto the GPU bloom parameters.
    pub fn to_params(&self) -> BloomParams {
        BloomParams {
            threshold: self.threshold,
            intensity: self.strength,
            radius: self.radius * BLOOM_RADIUS_PX,
            ..BloomParams::default()
        }
        .sanitize()
    }
}

/// Screen-space normals from a luminance height field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalsParams {
    pub strength: f32,
    pub blend: f32,
    pub roughness: f32,
    #[serde(rename = "F0")]
    pub f0: f32,
    pub diffuse_scale: f32,
    pub specular_scale: f32,
}

impl Default for NormalsParams {
    fn default() -> Self {
        Self {
            strength: 0.0,
            blend: 0.3,
            roughness: 0.3,
            f0: 0.04,
            diffuse_scale: 0.8,
            specular_scale: 0.2,
        }
    }
}

/// Ordered 8x8 Bayer dithering plus horizontal RGB split.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DitherParams {
    pub dither_strength: f32,
    pub dither_scale: f32,
    pub rgb_split: f32,
}

impl Default for DitherParams {
    fn default() -> Self {
        Self { dither_strength: 0.25, dither_scale: 1.0, rgb_split: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorGradeParams {
    pub contrast: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub gamma: f32,
    /// Degrees.
    pub hue_shift: f32,
    pub solarize_mix: f32,
    pub solarize_light_thresh: f32,
    pub solarize_light_soft: f32,
    pub solarize_dark_thresh: f32,
    pub solarize_dark_soft: f32,
    pub border_thickness: f32,
    pub border_color: Rgb,
}

impl Default for ColorGradeParams {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            saturation: 1.0,
            brightness: 0.0,
            gamma: 1.0,
            hue_shift: 0.0,
            solarize_mix: 0.0,
            solarize_light_thresh: 0.5,
            solarize_light_soft: 0.0,
            solarize_dark_thresh: 0.5,
            solarize_dark_soft: 0.0,
            border_thickness: 0.0,
            border_color: Rgb::WHITE,
        }
    }
}

/// Sobel edge overlay and unsharp-mask sharpen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeParams {
    pub strength: f32,
    pub threshold: f32,
    pub color_r: f32,
    pub color_g: f32,
    pub color_b: f32,
    pub sharpen_strength: f32,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            strength: 0.0,
            threshold: 0.1,
            color_r: 1.0,
            color_g: 1.0,
            color_b: 1.0,
            sharpen_strength: 0.0,
        }
    }
}

/// All post-processing parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostSettings {
    pub bloom: BloomSettings,
    pub normals: NormalsParams,
    pub dither: DitherParams,
    pub color_grading: ColorGradeParams,
    pub edge: EdgeParams,
}

impl PostSettings {
    /// Whether `pass` changes the image with the current settings.
    pub fn is_active(&self, pass: PostPass) -> bool {
        match pass {
            PostPass::Normals => self.normals.strength != 0.0 && self.normals.blend != 0.0,
            PostPass::Dither => self.dither.dither_strength > 0.0 || self.dither.rgb_split != 0.0,
            PostPass::ColorGrade => {
                let defaults = ColorGradeParams::default();
                self.color_grading != defaults
            }
            PostPass::Edge => self.edge.strength > 0.0 || self.edge.sharpen_strength > 0.0,
            PostPass::Bloom => self.bloom.strength > 0.0,
        }
    }

    /// Passes that will run this frame, in chain order.
    pub fn active_passes(&self) -> Vec<PostPass> {
        PostPass::ORDER.iter().copied().filter(|p| self.is_active(*p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dither_active_by_default() {
        let settings = PostSettings::default();
        assert_eq!(settings.active_passes(), vec![PostPass::Dither]);
    }

    #[test]
    fn test_chain_order_is_fixed() {
        let mut settings = PostSettings::default();
        settings.bloom.strength = 1.0;
        settings.normals.strength = 2.0;
        settings.edge.sharpen_strength = 0.5;
        settings.color_grading.contrast = 1.2;
        assert_eq!(
            settings.active_passes(),
            vec![
                PostPass::Normals,
                PostPass::Dither,
                PostPass::ColorGrade,
                PostPass::Edge,
                PostPass::Bloom
            ]
        );
    }

    #[test]
    fn test_serde_names_match_preset_sections() {
        let json = serde_json::to_value(NormalsParams::default()).unwrap();
        assert_eq!(json["F0"], serde_json::json!(0.04f32));
        assert!(json.get("diffuseScale").is_some());

        let grade = serde_json::to_value(ColorGradeParams::default()).unwrap();
        assert_eq!(grade["borderColor"]["x"], serde_json::json!(1.0));
        assert!(grade.get("solarizeLightThresh").is_some());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let edge: EdgeParams = serde_json::from_str(r#"{"strength": 0.5}"#).unwrap();
        assert_eq!(edge.strength, 0.5);
        assert_eq!(edge.threshold, 0.1);
    }

    #[test]
    fn test_bloom_mapping() {
        let bloom = BloomSettings { strength: 1.5, radius: 0.5, threshold: 0.7 };
        let params = bloom.to_params();
        assert_eq!(params.intensity, 1.5);
        assert_eq!(params.radius, 8.0);
        assert_eq!(params.threshold, 0.7);
    }
}
