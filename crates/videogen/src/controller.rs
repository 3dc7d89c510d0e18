/// Job lifecycle controller
///
/// Owns the single active Job, submits requests through the gate and the
/// remote service, and drives a fixed-period poll loop until the job reaches
/// a terminal state. State changes go through `apply`, a pure transition
/// function over a closed event set, so the machine is testable without any
/// presentation layer attached.
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::api::{
    artifact_file_name, RemoteError, RemoteJobService, StatusResponse, TaskId, TaskStatus,
};
use crate::gate::{GateError, GenerationForm, SubmissionGate};

/// Lifecycle states of the active Job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Nothing submitted yet
    Idle,
    /// Submission accepted by the gate, generate call in flight
    Submitting,
    /// Task accepted by the service, waiting to start
    Queued,
    /// Generation in progress
    Processing,
    /// Finished; artifact available for download
    Completed,
    /// Finished unsuccessfully
    Failed,
}

impl JobStatus {
    /// Terminal states end polling for the current Job
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// The single tracked generation job
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Set once the service has accepted the submission, immutable after
    pub task_id: Option<TaskId>,

    /// Current lifecycle state
    pub status: JobStatus,

    /// Percentage in [0,100]; meaningful while processing
    pub progress: f32,

    /// Human-readable description of the current activity
    pub current_step: String,

    /// Failure message, from the service or from the submission itself
    pub error: Option<String>,
}

impl Job {
    /// Initial state before any submission
    pub fn idle() -> Self {
        Self {
            task_id: None,
            status: JobStatus::Idle,
            progress: 0.0,
            current_step: String::new(),
            error: None,
        }
    }
}

/// Closed set of events that can mutate the Job
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Gate passed; a fresh Job supersedes whatever came before
    SubmitAccepted,
    /// Service accepted the submission and assigned a task id
    SubmitSucceeded { task_id: TaskId },
    /// The generate call itself failed
    SubmitFailed { message: String },
    /// A status poll came back for the named task
    PollReceived {
        task_id: TaskId,
        response: StatusResponse,
    },
    /// A status poll failed in transit; transient, never fatal
    PollFailed { task_id: TaskId, message: String },
}

/// Pure state transition. Stale or out-of-place events leave the Job
/// untouched; in particular a poll result for a task id the Job does not
/// own is discarded rather than applied.
pub fn apply(job: &Job, event: &JobEvent) -> Job {
    match event {
        JobEvent::SubmitAccepted => Job {
            task_id: None,
            status: JobStatus::Submitting,
            progress: 0.0,
            current_step: String::new(),
            error: None,
        },
        JobEvent::SubmitSucceeded { task_id } => {
            if job.status != JobStatus::Submitting {
                return job.clone();
            }
            Job {
                task_id: Some(task_id.clone()),
                status: JobStatus::Queued,
                ..job.clone()
            }
        }
        JobEvent::SubmitFailed { message } => {
            if job.status != JobStatus::Submitting {
                return job.clone();
            }
            Job {
                status: JobStatus::Failed,
                error: Some(message.clone()),
                ..job.clone()
            }
        }
        JobEvent::PollReceived { task_id, response } => {
            if job.task_id.as_ref() != Some(task_id) || job.status.is_terminal() {
                return job.clone();
            }
            let mut next = job.clone();
            // Fields absent from a tick are "not reported"; keep the last
            // known values instead of zeroing them.
            if let Some(step) = &response.current_step {
                next.current_step = step.clone();
            }
            if let Some(progress) = response.progress {
                next.progress = progress;
            }
            if let Some(error) = &response.error {
                next.error = Some(error.clone());
            }
            next.status = match response.status {
                TaskStatus::Queued => JobStatus::Queued,
                TaskStatus::Processing => JobStatus::Processing,
                TaskStatus::Completed => JobStatus::Completed,
                TaskStatus::Failed => {
                    if next.error.is_none() {
                        next.error = Some("Video generation failed".to_string());
                    }
                    JobStatus::Failed
                }
            };
            next
        }
        // Transient by contract: surfaced as a notice, never as state.
        JobEvent::PollFailed { .. } => job.clone(),
    }
}

/// Snapshot of controller state for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub is_submitting: bool,
    pub job: Option<Job>,
    pub access_key_error: Option<String>,
}

/// Out-of-band notification for the presentation layer (toast equivalent)
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// Finished artifact handed to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    /// Deterministic name derived from the task id
    pub file_name: String,
    pub bytes: Vec<u8>,
}

struct ControllerState {
    job: Job,
    access_key_error: Option<String>,
    /// Bumped on every accepted submission; poll results carry the epoch
    /// they were started under and are inert once it moves on.
    epoch: u64,
    poll_task: Option<JoinHandle<()>>,
}

/// Controller owning the Job record and the poll timer
pub struct JobController {
    service: Arc<dyn RemoteJobService>,
    gate: SubmissionGate,
    poll_interval: Duration,
    inner: Arc<Mutex<ControllerState>>,
    notices: UnboundedSender<Notice>,
}

impl JobController {
    /// Create a controller; the receiver yields transient notices
    pub fn new(
        service: Arc<dyn RemoteJobService>,
        gate: SubmissionGate,
        poll_interval: Duration,
    ) -> (Self, UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            service,
            gate,
            poll_interval,
            inner: Arc::new(Mutex::new(ControllerState {
                job: Job::idle(),
                access_key_error: None,
                epoch: 0,
                poll_task: None,
            })),
            notices: tx,
        };
        (controller, rx)
    }

    /// Current state for rendering
    pub fn snapshot(&self) -> UiState {
        let state = self.inner.lock();
        UiState {
            is_submitting: state.job.status == JobStatus::Submitting,
            job: if state.job.status == JobStatus::Idle {
                None
            } else {
                Some(state.job.clone())
            },
            access_key_error: state.access_key_error.clone(),
        }
    }

    /// The key field changed; clear any displayed gate error
    pub fn access_key_changed(&self) {
        self.inner.lock().access_key_error = None;
    }

    /// Submit a form. A gate rejection is returned (and recorded in
    /// `access_key_error`) without any network traffic; a remote failure is
    /// not an `Err` here, it lands in the Job as the `Failed` state.
    pub async fn submit(&self, form: GenerationForm) -> Result<(), GateError> {
        let request = match self.gate.validate(form) {
            Ok(request) => request,
            Err(err) => {
                self.inner.lock().access_key_error = Some(err.to_string());
                return Err(err);
            }
        };

        let epoch = self.supersede();
        log::info!("submitting generation request: {}", request.topic);

        match self.service.generate(&request).await {
            Ok(task_id) => {
                let mut state = self.inner.lock();
                if state.epoch != epoch {
                    // A newer submission took over while we were in flight.
                    return Ok(());
                }
                state.job = apply(
                    &state.job,
                    &JobEvent::SubmitSucceeded {
                        task_id: task_id.clone(),
                    },
                );
                let _ = self
                    .notices
                    .send(Notice::Info("Video generation started".to_string()));
                state.poll_task = Some(self.spawn_poll_loop(epoch, task_id));
            }
            Err(err) => {
                let mut state = self.inner.lock();
                if state.epoch == epoch {
                    log::warn!("generate call failed: {err}");
                    state.job = apply(
                        &state.job,
                        &JobEvent::SubmitFailed {
                            message: err.to_string(),
                        },
                    );
                    let _ = self.notices.send(Notice::Error(err.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Fetch the finished artifact. Only valid once the Job is completed;
    /// the presentation layer is expected to gate the affordance on that.
    pub async fn download(&self) -> Result<Download, RemoteError> {
        let task_id = {
            let state = self.inner.lock();
            match (&state.job.task_id, state.job.status) {
                (Some(task_id), JobStatus::Completed) => task_id.clone(),
                _ => return Err(RemoteError("No completed video to download".to_string())),
            }
        };
        let bytes = self.service.download(&task_id).await?;
        Ok(Download {
            file_name: artifact_file_name(&task_id),
            bytes,
        })
    }

    /// Stop polling and detach from the current Job. Idempotent; in-flight
    /// responses for the old task become inert.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.epoch += 1;
        if let Some(task) = state.poll_task.take() {
            task.abort();
        }
    }

    /// Discard the previous Job: cancel its timer, bump the epoch, and
    /// reset the record to a fresh Submitting state.
    fn supersede(&self) -> u64 {
        let mut state = self.inner.lock();
        state.access_key_error = None;
        state.epoch += 1;
        if let Some(task) = state.poll_task.take() {
            task.abort();
        }
        state.job = apply(&state.job, &JobEvent::SubmitAccepted);
        state.epoch
    }

    fn spawn_poll_loop(&self, epoch: u64, task_id: TaskId) -> JoinHandle<()> {
        let service = self.service.clone();
        let inner = self.inner.clone();
        let notices = self.notices.clone();
        let interval = self.poll_interval;

        tokio::spawn(async move {
            loop {
                // One outstanding query at a time: each tick is awaited to
                // completion before the next period starts.
                tokio::time::sleep(interval).await;
                let result = service.poll(&task_id).await;

                let finished = {
                    let mut state = inner.lock();
                    if state.epoch != epoch {
                        // Superseded while the request was in flight.
                        break;
                    }
                    match result {
                        Ok(response) => {
                            state.job = apply(
                                &state.job,
                                &JobEvent::PollReceived {
                                    task_id: task_id.clone(),
                                    response,
                                },
                            );
                            if state.job.status.is_terminal() {
                                state.poll_task = None;
                                true
                            } else {
                                false
                            }
                        }
                        Err(err) => {
                            // Transient transport failure: keep polling.
                            log::warn!("status poll failed for {task_id}: {err}");
                            state.job = apply(
                                &state.job,
                                &JobEvent::PollFailed {
                                    task_id: task_id.clone(),
                                    message: err.to_string(),
                                },
                            );
                            let _ = notices.send(Notice::Error(err.to_string()));
                            false
                        }
                    }
                };
                if finished {
                    break;
                }
            }
        })
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
