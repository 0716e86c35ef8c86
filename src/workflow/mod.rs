// Workflow system - draft/approve/generate pipelines over a remote media service

pub mod error;
pub mod service;
pub mod text_to_image;
pub mod types;
pub mod variation;

pub use error::{Result, WorkflowError};
pub use service::{Availability, HttpMediaService, MediaService, ServiceError};
pub use text_to_image::TextToImagePipeline;
pub use types::*;
pub use variation::ImageVariationPipeline;
