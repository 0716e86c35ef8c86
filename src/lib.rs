// Atelier - human-in-the-loop image generation workflows

pub mod workflow;

pub use workflow::{ImageVariationPipeline, TextToImagePipeline};
