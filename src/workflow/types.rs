// Core types for the workflow system

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Discrete stage of a pipeline's state machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Deriving,
    AwaitingApproval,
    Approved,
    Uploaded,
    Analyzing,
    Analyzed,
    Generating,
    Complete,
    Failed,
}

impl Phase {
    /// True while a network request is outstanding for this pipeline
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Deriving | Phase::Analyzing | Phase::Generating)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Phase::Idle => "Idle",
            Phase::Deriving => "Deriving",
            Phase::AwaitingApproval => "AwaitingApproval",
            Phase::Approved => "Approved",
            Phase::Uploaded => "Uploaded",
            Phase::Analyzing => "Analyzing",
            Phase::Analyzed => "Analyzed",
            Phase::Generating => "Generating",
            Phase::Complete => "Complete",
            Phase::Failed => "Failed",
        }
    }
}

/// Opaque binary image crossing the service and surface boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// User-supplied input at the head of a cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawInput {
    #[default]
    Empty,
    Text(String),
    Image(ImagePayload),
}

/// Mutable state carried through one pipeline's phase sequence.
///
/// One instance per pipeline; never shared between them. All derived fields
/// are cleared together when the user starts a new cycle.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub raw_input: RawInput,
    pub derived_text: Option<String>,
    pub approved_text: Option<String>,
    pub produced_image: Option<ImagePayload>,
    pub phase: Phase,
    pub last_error: Option<String>,
    /// Stable phase to resume from after a failure is acknowledged
    pub resume_phase: Phase,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            raw_input: RawInput::Empty,
            derived_text: None,
            approved_text: None,
            produced_image: None,
            phase: Phase::Idle,
            last_error: None,
            resume_phase: Phase::Idle,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_in_flight()
    }

    /// Clear everything downstream of the raw input (new cycle)
    pub fn clear_derived(&mut self) {
        self.derived_text = None;
        self.approved_text = None;
        self.produced_image = None;
        self.last_error = None;
    }

    /// Record the current phase as the resume point and enter an in-flight phase
    pub fn begin_request(&mut self, in_flight: Phase) {
        debug_assert!(in_flight.is_in_flight());
        self.resume_phase = self.phase;
        self.phase = in_flight;
    }

    /// Mark the outstanding request as failed; field values stay untouched
    pub fn fail(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.phase = Phase::Failed;
    }

    /// Return from `Failed` to the last stable phase
    pub fn acknowledge(&mut self) {
        if self.phase == Phase::Failed {
            self.phase = self.resume_phase;
            self.last_error = None;
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase,
            derived_text: self.derived_text.clone(),
            approved_text: self.approved_text.clone(),
            produced_image: self.produced_image.clone(),
            error_message: self.last_error.clone(),
        }
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a pipeline emits to its presentation surface on every state change
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub phase: Phase,
    pub derived_text: Option<String>,
    pub approved_text: Option<String>,
    pub produced_image: Option<ImagePayload>,
    pub error_message: Option<String>,
}

/// Renders pipeline state and shows loading/error banners.
///
/// Surfaces may disable controls for UX, but preconditions are enforced
/// inside the pipelines regardless.
pub trait PresentationSurface: Send + Sync {
    fn state_changed(&self, snapshot: &StateSnapshot);
}

/// Configuration for the studio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Base URL of the media backend
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// HTTP transport timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Where the surface saves produced images
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_endpoint() -> String {
    "http://localhost:3001".to_string()
}

fn default_request_timeout() -> u64 {
    120_000
}

fn default_output_dir() -> PathBuf {
    dirs::picture_dir().unwrap_or_else(|| PathBuf::from("./images"))
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_ms: default_request_timeout(),
            output_dir: default_output_dir(),
        }
    }
}
