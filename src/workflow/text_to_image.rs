// Text-to-image pipeline - enhance, approve or edit, generate

use super::error::{Result, WorkflowError};
use super::service::{DeriveRequest, GenerateRequest, MediaService};
use super::types::{Phase, PresentationSurface, RawInput, WorkflowState};
use std::sync::Arc;
use tracing::{debug, warn};

/// State machine driving enhance → approve/edit → generate.
///
/// The approval gate is deliberate: enhancement output is meant to be reviewed
/// before committing a generation call. `approved_text` is the only field that
/// unlocks `generate`, and it is always an exact copy of some emitted
/// `derived_text`.
pub struct TextToImagePipeline {
    state: WorkflowState,
    service: Arc<dyn MediaService>,
    surface: Option<Arc<dyn PresentationSurface>>,
}

impl TextToImagePipeline {
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

    /// Start a new cycle: enhance the prompt and await approval
    pub async fn submit_prompt(&mut self, text: &str) -> Result<()> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }

        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(WorkflowError::empty_input("prompt"));
        }

        self.state.raw_input = RawInput::Text(prompt.to_string());
        self.state.clear_derived();
        self.state.phase = Phase::Idle;
        self.state.begin_request(Phase::Deriving);
        self.notify();

        debug!(prompt, "enhancing prompt");
        match self
            .service
            .derive(DeriveRequest::Enhance {
                text: prompt.to_string(),
            })
            .await
        {
            Ok(result) => {
                self.state.derived_text = Some(result);
                self.state.phase = Phase::AwaitingApproval;
                self.notify();
                Ok(())
            }
            Err(e) => self.request_failed(e.to_string()),
        }
    }

    /// Commit the enhanced prompt for generation
    pub fn approve(&mut self) -> Result<()> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }
        if !matches!(self.state.phase, Phase::AwaitingApproval | Phase::Approved) {
            return Err(WorkflowError::Precondition("enhance a prompt first"));
        }

        self.state.approved_text = self.state.derived_text.clone();
        self.state.phase = Phase::Approved;
        self.notify();
        Ok(())
    }

    /// Take the enhanced prompt back for editing; the only backward transition.
    /// Returns the reclaimed text so the surface can refill its input.
    pub fn edit_again(&mut self) -> Result<String> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }
        if !matches!(self.state.phase, Phase::AwaitingApproval | Phase::Approved) {
            return Err(WorkflowError::Precondition("enhance a prompt first"));
        }

        let text = self.state.derived_text.take().unwrap_or_default();
        self.state.raw_input = RawInput::Text(text.clone());
        self.state.clear_derived();
        self.state.phase = Phase::Idle;
        self.notify();
        Ok(text)
    }

    /// Generate an image from the approved prompt
    pub async fn generate(&mut self) -> Result<()> {
        if self.state.is_busy() {
            return Err(WorkflowError::Busy);
        }
        let approved = match (&self.state.phase, &self.state.approved_text) {
            (Phase::Approved, Some(text)) => text.clone(),
            _ => return Err(WorkflowError::Precondition("approve a prompt first")),
        };

        self.state.begin_request(Phase::Generating);
        self.notify();

        debug!("generating image from approved prompt");
        match self
            .service
            .generate(GenerateRequest::FromPrompt {
                approved_prompt: approved,
            })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::service::{Availability, ServiceError};
    use crate::workflow::types::{ImagePayload, StateSnapshot};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted service double: pops pre-loaded responses, records requests
    struct ScriptedService {
        derive_results: Mutex<VecDeque<std::result::Result<String, ServiceError>>>,
        generate_results: Mutex<VecDeque<std::result::Result<ImagePayload, ServiceError>>>,
        derive_requests: Mutex<Vec<DeriveRequest>>,
        generate_requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedService {
        fn new() -> Self {
            Self {
                derive_results: Mutex::new(VecDeque::new()),
                generate_results: Mutex::new(VecDeque::new()),
                derive_requests: Mutex::new(Vec::new()),
                generate_requests: Mutex::new(Vec::new()),
            }
        }

        fn push_derive(&self, result: std::result::Result<String, ServiceError>) {
            self.derive_results.lock().unwrap().push_back(result);
        }

        fn push_generate(&self, result: std::result::Result<ImagePayload, ServiceError>) {
            self.generate_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl MediaService for ScriptedService {
        async fn derive(&self, request: DeriveRequest) -> std::result::Result<String, ServiceError> {
            self.derive_requests.lock().unwrap().push(request);
            self.derive_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("scripted".to_string()))
        }

        async fn generate(&self, request: GenerateRequest) -> std::result::Result<ImagePayload, ServiceError> {
            self.generate_requests.lock().unwrap().push(request);
            self.generate_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ImagePayload::new(vec![0], "image/png")))
        }

        async fn check_availability(&self) -> std::result::Result<Availability, ServiceError> {
            Ok(Availability { ready: true })
        }
    }

    struct RecordingSurface {
        snapshots: Mutex<Vec<StateSnapshot>>,
    }

    impl RecordingSurface {
        fn new() -> Self {
            Self {
                snapshots: Mutex::new(Vec::new()),
            }
        }

        fn phases(&self) -> Vec<Phase> {
            self.snapshots.lock().unwrap().iter().map(|s| s.phase).collect()
        }
    }

    impl PresentationSurface for RecordingSurface {
        fn state_changed(&self, snapshot: &StateSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot.clone());
        }
    }

    fn pipeline_with(service: Arc<ScriptedService>) -> TextToImagePipeline {
        TextToImagePipeline::new(service)
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_without_request() {
        let service = Arc::new(ScriptedService::new());
        let mut pipeline = pipeline_with(service.clone());

        let err = pipeline.submit_prompt("   ").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(pipeline.state().phase, Phase::Idle);
        assert!(service.derive_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enhance_success_awaits_approval() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Ok("a photorealistic cat in a garden".to_string()));
        let mut pipeline = pipeline_with(service.clone());

        pipeline.submit_prompt("a cat").await.unwrap();

        assert_eq!(pipeline.state().phase, Phase::AwaitingApproval);
        assert_eq!(
            pipeline.state().derived_text.as_deref(),
            Some("a photorealistic cat in a garden")
        );
        assert_eq!(
            service.derive_requests.lock().unwrap()[0],
            DeriveRequest::Enhance {
                text: "a cat".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_full_cycle_to_complete() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Ok("a photorealistic cat in a garden".to_string()));
        service.push_generate(Ok(ImagePayload::new(vec![0xDE, 0xAD], "image/png")));
        let surface = Arc::new(RecordingSurface::new());
        let mut pipeline = pipeline_with(service.clone()).with_surface(surface.clone());

        pipeline.submit_prompt("a cat").await.unwrap();
        pipeline.approve().unwrap();
        pipeline.generate().await.unwrap();

        assert_eq!(pipeline.state().phase, Phase::Complete);
        assert_eq!(
            pipeline.state().produced_image,
            Some(ImagePayload::new(vec![0xDE, 0xAD], "image/png"))
        );
        assert_eq!(
            service.generate_requests.lock().unwrap()[0],
            GenerateRequest::FromPrompt {
                approved_prompt: "a photorealistic cat in a garden".to_string()
            }
        );
        assert_eq!(
            surface.phases(),
            vec![
                Phase::Deriving,
                Phase::AwaitingApproval,
                Phase::Approved,
                Phase::Generating,
                Phase::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_before_approval_rejected() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Ok("enhanced".to_string()));
        let mut pipeline = pipeline_with(service.clone());

        pipeline.submit_prompt("a cat").await.unwrap();
        let before = pipeline.state().snapshot();

        let err = pipeline.generate().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition(_)));
        assert_eq!(pipeline.state().snapshot(), before);
        assert!(service.generate_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_copies_exactly_and_is_idempotent() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Ok("enhanced".to_string()));
        let mut pipeline = pipeline_with(service);

        pipeline.submit_prompt("a cat").await.unwrap();
        pipeline.approve().unwrap();
        assert_eq!(
            pipeline.state().approved_text,
            pipeline.state().derived_text
        );

        pipeline.approve().unwrap();
        assert_eq!(pipeline.state().phase, Phase::Approved);
        assert_eq!(pipeline.state().approved_text.as_deref(), Some("enhanced"));
    }

    #[tokio::test]
    async fn test_approve_out_of_order_rejected() {
        let service = Arc::new(ScriptedService::new());
        let mut pipeline = pipeline_with(service);

        let err = pipeline.approve().unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition(_)));
        assert_eq!(pipeline.state().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_edit_again_reopens_cycle() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Ok("enhanced".to_string()));
        let mut pipeline = pipeline_with(service);

        pipeline.submit_prompt("a cat").await.unwrap();
        pipeline.approve().unwrap();

        let text = pipeline.edit_again().unwrap();
        assert_eq!(text, "enhanced");
        assert_eq!(pipeline.state().phase, Phase::Idle);
        assert!(pipeline.state().approved_text.is_none());
        assert_eq!(
            pipeline.state().raw_input,
            RawInput::Text("enhanced".to_string())
        );

        let err = pipeline.generate().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_service_error_moves_to_failed_verbatim() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Err(ServiceError::Api("quota exceeded".to_string())));
        let mut pipeline = pipeline_with(service);

        let err = pipeline.submit_prompt("a cat").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Service(_)));
        assert_eq!(pipeline.state().phase, Phase::Failed);
        assert_eq!(pipeline.state().last_error.as_deref(), Some("quota exceeded"));
        assert!(pipeline.state().derived_text.is_none());
    }

    #[tokio::test]
    async fn test_acknowledge_then_retry_succeeds() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Err(ServiceError::Network("connection refused".to_string())));
        service.push_derive(Ok("enhanced".to_string()));
        let mut pipeline = pipeline_with(service);

        pipeline.submit_prompt("a cat").await.unwrap_err();
        pipeline.acknowledge_error();
        assert_eq!(pipeline.state().phase, Phase::Idle);
        assert!(pipeline.state().last_error.is_none());

        pipeline.submit_prompt("a cat").await.unwrap();
        assert_eq!(pipeline.state().phase, Phase::AwaitingApproval);
    }

    #[tokio::test]
    async fn test_generate_failure_resumes_to_approved() {
        let service = Arc::new(ScriptedService::new());
        service.push_derive(Ok("enhanced".to_string()));
        service.push_generate(Err(ServiceError::Api("model overloaded".to_string())));
        let mut pipeline = pipeline_with(service);

        pipeline.submit_prompt("a cat").await.unwrap();
        pipeline.approve().unwrap();
        pipeline.generate().await.unwrap_err();

        assert_eq!(pipeline.state().phase, Phase::Failed);
        assert_eq!(pipeline.state().approved_text.as_deref(), Some("enhanced"));

        pipeline.acknowledge_error();
        assert_eq!(pipeline.state().phase, Phase::Approved);
    }

    #[tokio::test]
    async fn test_operations_rejected_while_in_flight() {
        let service = Arc::new(ScriptedService::new());
        let mut pipeline = pipeline_with(service.clone());
        pipeline.state.phase = Phase::Deriving;

        assert!(matches!(
            pipeline.submit_prompt("a cat").await.unwrap_err(),
            WorkflowError::Busy
        ));
        assert!(matches!(pipeline.approve().unwrap_err(), WorkflowError::Busy));
        assert!(matches!(
            pipeline.generate().await.unwrap_err(),
            WorkflowError::Busy
        ));
        assert_eq!(pipeline.state().phase, Phase::Deriving);
        assert!(service.derive_requests.lock().unwrap().is_empty());
        assert!(service.generate_requests.lock().unwrap().is_empty());
    }
}
