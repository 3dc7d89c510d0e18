/// Client for a remote video-generation service
///
/// Submits a generation request, polls task status on a fixed period, and
/// tracks the job through a small explicit state machine until it completes
/// or fails. The presentation layer (CLI, UI) consumes snapshots and a
/// notice stream; it never touches the wire.
pub mod api;
pub mod config;
pub mod controller;
pub mod gate;

pub use api::{
    artifact_file_name, GenerationRequest, HttpJobClient, RemoteError, RemoteJobService,
    StatusResponse, TaskId, TaskStatus,
};
pub use config::ServiceConfig;
pub use controller::{apply, Download, Job, JobController, JobEvent, JobStatus, Notice, UiState};
pub use gate::{GateError, GenerationForm, SubmissionGate};
