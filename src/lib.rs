pub mod effects;
pub mod engine;
pub mod feedback;
pub mod gallery;
pub mod gpu;
pub mod integrators;
pub mod params;
pub mod post_processing;
pub mod preset;
pub mod program;
pub mod render_job;
pub mod scene_actions;
pub mod shader_assembler;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;
#[cfg(not(target_arch = "wasm32"))]
pub mod viewer;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use engine::{Engine, EngineConfig, FramePlan, FrameStep};
