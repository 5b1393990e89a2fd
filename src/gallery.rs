//! Gallery framing: render into a fixed-aspect frame centred in the window.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Render sizes are capped to this many pixels times the resolution scale.
pub const MAX_RENDER_WIDTH: f32 = 1920.0;
pub const MAX_RENDER_HEIGHT: f32 = 1080.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GalleryAspect {
    #[default]
    #[serde(rename = "fullscreen")]
    Fullscreen,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "21:9")]
    Ultrawide,
}

impl GalleryAspect {
    pub fn as_str(self) -> &'static str {
        match self {
            GalleryAspect::Fullscreen => "fullscreen",
            GalleryAspect::Square => "1:1",
            GalleryAspect::Wide => "16:9",
            GalleryAspect::Tall => "9:16",
            GalleryAspect::Ultrawide => "21:9",
        }
    }

    /// Parse an aspect label. Unknown labels become `Fullscreen`.
    pub fn parse(s: &str) -> Self {
        match s {
            "1:1" => GalleryAspect::Square,
            "16:9" => GalleryAspect::Wide,
            "9:16" => GalleryAspect::Tall,
            "21:9" => GalleryAspect::Ultrawide,
            _ => GalleryAspect::Fullscreen,
        }
    }
}

impl fmt::Display for GalleryAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `#rrggbb` (leading `#` optional, case-insensitive).
pub fn parse_hex_rgb(hex: &str) -> Option<[u8; 3]> {
    static HEX: OnceLock<Option<Regex>> = OnceLock::new();
    let re = HEX
        .get_or_init(|| Regex::new(r"(?i)^#?([a-f\d]{2})([a-f\d]{2})([a-f\d]{2})$").ok())
        .as_ref()?;
    let caps = re.captures(hex)?;
    let channel = |i: usize| u8::from_str_radix(&caps[i], 16).ok();
    Some([channel(1)?, channel(2)?, channel(3)?])
}

/// Gallery presentation state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryMode {
    #[serde(skip)]
    pub enabled: bool,
    pub aspect: GalleryAspect,
    pub scale: f32,
    pub bg_color: String,
}

impl Default for GalleryMode {
    fn default() -> Self {
        Self {
            enabled: false,
            aspect: GalleryAspect::Fullscreen,
            scale: 0.5,
            bg_color: "#000000".to_string(),
        }
    }
}

impl GalleryMode {
    /// Select an aspect; anything but fullscreen enables gallery framing.
    pub fn set_aspect(&mut self, aspect: GalleryAspect) {
        self.aspect = aspect;
        self.enabled = aspect != GalleryAspect::Fullscreen;
    }

    /// Toggle framing, re-using the last aspect or 16:9.
    pub fn toggle(&mut self) {
        if self.enabled {
            self.enabled = false;
        } else {
            let aspect = match self.aspect {
                GalleryAspect::Fullscreen => GalleryAspect::Wide,
                other => other,
            };
            self.set_aspect(aspect);
        }
    }

    /// Frame size in window pixels.
    pub fn target_size(&self, window_w: f32, window_h: f32) -> (f32, f32) {
        let s = self.scale;
        let fit_wide = |ratio: f32| {
            let mut h = window_h * s;
            let mut w = h * ratio;
            if w > window_w * s {
                w = window_w * s;
                h = w / ratio;
            }
            (w, h)
        };
        match self.aspect {
            GalleryAspect::Square => {
                let side = window_w.min(window_h) * s;
                (side, side)
            }
            GalleryAspect::Wide => fit_wide(16.0 / 9.0),
            GalleryAspect::Ultrawide => fit_wide(21.0 / 9.0),
            GalleryAspect::Tall => {
                let mut w = window_w * s;
                let mut h = w * (16.0 / 9.0);
                if h > window_h * s {
                    h = window_h * s;
                    w = h * (9.0 / 16.0);
                }
                (w, h)
            }
            GalleryAspect::Fullscreen => (window_w, window_h),
        }
    }

    /// Background colour as linear 0..1 RGB; invalid hex is black.
    pub fn bg_rgb(&self) -> [f32; 3] {
        parse_hex_rgb(&self.bg_color)
            .map(|c| c.map(|v| v as f32 / 255.0))
            .unwrap_or([0.0; 3])
    }
}

/// Render resolution for a framed target, capped at 1920x1080 times `resolution_scale`.
pub fn render_size(target_w: f32, target_h: f32, resolution_scale: f32) -> (u32, u32) {
    let scale_x = (MAX_RENDER_WIDTH * resolution_scale / target_w.max(1.0)).min(1.0);
    let scale_y = (MAX_RENDER_HEIGHT * resolution_scale / target_h.max(1.0)).min(1.0);
    let k = scale_x.min(scale_y);
    (
        ((target_w * k).floor() as u32).max(1),
        ((target_h * k).floor() as u32).max(1),
    )
}

/// Render resolution without framing.
pub fn window_render_size(window_w: u32, window_h: u32, resolution_scale: f32) -> (u32, u32) {
    (
        ((window_w as f32 * resolution_scale).floor() as u32).max(1),
        ((window_h as f32 * resolution_scale).floor() as u32).max(1),
    )
}
