//! Offline render job specification and metadata.
//!
//! A job describes a deterministic headless render: output directory, frame
//! rate, duration, frame size and the optional preset/config/seed that fix
//! the scene. Finished renders leave a `metadata.json` next to the frames.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(not(target_arch = "wasm32"))]
use chrono::{DateTime, Utc};

#[cfg(not(target_arch = "wasm32"))]
use sha2::{Digest, Sha256};

fn default_fps() -> f32 {
    60.0
}

fn default_duration() -> f32 {
    5.0
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

/// Specification for a single headless render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJobSpec {
    /// Output directory for frames and metadata.
    pub output_dir: PathBuf,

    #[serde(default = "default_fps")]
    pub fps: f32,

    /// Duration in seconds.
    #[serde(default = "default_duration")]
    pub duration: f32,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Preset applied before the first frame.
    #[serde(default)]
    pub preset_path: Option<PathBuf>,

    /// Engine configuration JSON.
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// Seed for the initial palette. Overrides the config's seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RenderJobSpec {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            fps: default_fps(),
            duration: default_duration(),
            width: default_width(),
            height: default_height(),
            preset_path: None,
            config_path: None,
            seed: None,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read job file {:?}: {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse job file {:?}: {}", path, e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(preset) = &self.preset_path {
            if !preset.exists() {
                return Err(format!("Preset file not found: {:?}", preset));
            }
        }
        if let Some(config) = &self.config_path {
            if !config.exists() {
                return Err(format!("Config file not found: {:?}", config));
            }
        }
        if !(self.fps > 0.0) {
            return Err("FPS must be positive".to_string());
        }
        if !(self.duration > 0.0) {
            return Err("Duration must be positive".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("Width and height must be positive".to_string());
        }
        Ok(())
    }

    /// Number of frames covering the duration (at least one).
    pub fn frame_count(&self) -> usize {
        ((self.fps * self.duration).ceil() as usize).max(1)
    }

    /// Seconds between frames.
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.fps
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("frame_{:05}.png", index))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join("metadata.json")
    }
}

/// Written as `metadata.json` alongside rendered frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg(not(target_arch = "wasm32"))]
pub struct RenderMetadata {
    pub job: RenderJobSpec,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub render_duration_secs: f64,

    pub frame_count: usize,

    /// Frames divided by wall-clock render time.
    pub average_render_fps: f64,

    /// SHA-256 of the preset file, when one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_hash: Option<String>,

    /// Fingerprint of the raymarch program in use at the last frame.
    pub shader_fingerprint: String,

    /// Number of shader builds during the render.
    pub shader_generation: u64,

    pub raymarcher_version: String,

    pub gpu_adapter: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(not(target_arch = "wasm32"))]
impl RenderMetadata {
    /// SHA-256 of a file's content, hex encoded.
    pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
        use std::io::Read;

        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write metadata: {}", e))
    }
}

/// Render phase for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Initialization,
    PresetLoading,
    GpuSetup,
    FrameRender,
    FrameSave,
    MetadataSave,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderPhase::Initialization => write!(f, "Initialization"),
            RenderPhase::PresetLoading => write!(f, "Preset Loading"),
            RenderPhase::GpuSetup => write!(f, "GPU Setup"),
            RenderPhase::FrameRender => write!(f, "Frame Render"),
            RenderPhase::FrameSave => write!(f, "Frame Save"),
            RenderPhase::MetadataSave => write!(f, "Metadata Save"),
        }
    }
}

/// Structured error for render failures.
#[derive(Debug)]
pub struct RenderError {
    pub phase: RenderPhase,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl RenderError {
    pub fn new(phase: RenderPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        phase: RenderPhase,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Progress information for render callbacks.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// 1-indexed.
    pub current_frame: usize,
    pub total_frames: usize,
    pub elapsed_secs: f64,
    pub eta_secs: Option<f64>,
}

impl RenderProgress {
    pub fn new(current_frame: usize, total_frames: usize, elapsed_secs: f64) -> Self {
        let eta_secs = (current_frame > 0).then(|| {
            let per_frame = elapsed_secs / current_frame as f64;
            per_frame * total_frames.saturating_sub(current_frame) as f64
        });
        Self { current_frame, total_frames, elapsed_secs, eta_secs }
    }

    /// Progress in percent (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_frames == 0 {
            100.0
        } else {
            (self.current_frame as f64 / self.total_frames as f64) * 100.0
        }
    }
}
