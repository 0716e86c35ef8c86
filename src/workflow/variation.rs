// Image-to-variation pipeline - upload, analyze, generate

use super::error::{Result, WorkflowError};
use super::service::{DeriveRequest, GenerateRequest, MediaService};
use super::types::{ImagePayload, Phase, PresentationSurface, RawInput, WorkflowState};
use std::sync::Arc;
use tracing::{debug, warn};

/// State machine driving upload → analyze → generate.
///
/// Unlike the text pipeline there is no approval gate: the analysis is a
/// derived artifact and feeds generation directly.
pub struct ImageVariationPipeline {
    state: WorkflowState,
    service: Arc<dyn MediaService>,
    surface: Option<Arc<dyn PresentationSurface>>,
}

impl ImageVariationPipeline {
    pub fn new(service: Arc<dyn MediaService>) -> Self {
        Self {
            state: WorkflowState::new(),
            service,
            surface: None,
        }
    }

    pub fn with_surface(mut self, surface: Arc<dyn PresentationSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Accept a new source image; resets the whole cycle
    pub fn upload(&mut self, bytes: Vec<u8>, mime_type: &str) -> Result<()> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }
        if bytes.is_empty() {
            return Err(WorkflowError::empty_input("image payload"));
        }

        self.state.raw_input = RawInput::Image(ImagePayload::new(bytes, mime_type));
        self.state.clear_derived();
        self.state.phase = Phase::Uploaded;
        self.state.resume_phase = Phase::Uploaded;
        self.notify();
        Ok(())
    }

    /// Describe the uploaded image; re-running replaces the previous analysis
    pub async fn analyze(&mut self) -> Result<()> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }
        let image = match (&self.state.phase, &self.state.raw_input) {
            (Phase::Uploaded | Phase::Analyzed, RawInput::Image(image)) => image.clone(),
            _ => return Err(WorkflowError::Precondition("upload an image first")),
        };

        self.state.begin_request(Phase::Analyzing);
        self.notify();

        debug!(mime_type = %image.mime_type, "analyzing uploaded image");
        match self.service.derive(DeriveRequest::Analyze { image }).await {
            Ok(result) => {
                self.state.derived_text = Some(result);
                self.state.phase = Phase::Analyzed;
                self.notify();
                Ok(())
            }
            Err(e) => self.request_failed(e.to_string()),
        }
    }

    /// Generate a variation from the analysis
    pub async fn generate(&mut self) -> Result<()> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }
        let analysis = match (&self.state.phase, &self.state.derived_text) {
            (Phase::Analyzed, Some(text)) => text.clone(),
            _ => return Err(WorkflowError::Precondition("analyze an image first")),
        };

        self.state.begin_request(Phase::Generating);
        self.notify();

        debug!("generating variation from analysis");
        match self
            .service
            .generate(GenerateRequest::FromAnalysis { analysis })
            .await
        {
            Ok(image) => {
                self.state.produced_image = Some(image);
                self.state.phase = Phase::Complete;
                self.notify();
                Ok(())
            }
            Err(e) => self.request_failed(e.to_string()),
        }
    }

    /// Dismiss a failure banner and resume from the last stable phase
    pub fn acknowledge_error(&mut self) {
        if self.state.phase == Phase::Failed {
            self.state.acknowledge();
            self.notify();
        }
    }

    fn request_failed(&mut self, message: String) -> Result<()> {
        warn!(%message, "media service request failed");
        self.state.fail(message.clone());
        self.notify();
        Err(WorkflowError::Service(message))
    }

    fn notify(&self) {
        if let Some(surface) = &self.surface {
            surface.state_changed(&self.state.snapshot());
        }
    }
}
