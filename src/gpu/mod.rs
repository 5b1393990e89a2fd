pub mod pipeline;
pub mod renderer;
pub mod post_processor;
pub mod bloom_processor;

pub use bloom_processor::{BloomParams, BloomProcessor};
pub use post_processor::PostProcessor;
pub use renderer::{PresentRegion, Renderer};
