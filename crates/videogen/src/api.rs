/// Wire types and HTTP client for the remote video-generation service
///
/// The service exposes three endpoints: submit a generation request, query
/// task status by id, and fetch the finished video by id. All transport and
/// validation failures are normalized to a single `RemoteError` before they
/// reach the lifecycle controller.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ServiceConfig;

/// Opaque task identifier assigned by the service at submission time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized remote-call failure carrying a user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

/// Generation request as transmitted to the service.
///
/// Deliberately has no access-key field; the submission gate strips the key
/// before a request of this type can exist, so it is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Topic to generate the video about
    pub topic: String,

    /// Number of images, 1-10
    pub num_images: u32,

    /// Narration language code ("en", "it", ...)
    pub language: String,

    /// Text model selector (0 = GPT-4, 1 = GPT-3.5)
    pub text_model: u32,

    /// Image model selector (0 = DALL-E 2, 1 = DALL-E 3)
    pub image_model: u32,

    /// Target length selector (0 = 30s, 1 = 1min, 2 = 4min)
    pub video_length: u32,

    /// Personal API key; the server falls back to its own when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_key: Option<String>,

    /// Search the web for current information before generating
    pub use_web_search: bool,
}

impl GenerationRequest {
    /// New request with the service's documented defaults
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            num_images: 5,
            language: "en".to_string(),
            text_model: 0,
            image_model: 1,
            video_length: 1,
            openai_key: None,
            use_web_search: true,
        }
    }
}

/// Response to a submission
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub task_id: TaskId,
    #[serde(default)]
    pub status: Option<String>,
}

/// Task lifecycle states as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Status report for one task.
///
/// A `failed` status is a normal result here, not a client error; an absent
/// `error` field means no error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Deterministic artifact name for a finished task
pub fn artifact_file_name(task_id: &TaskId) -> String {
    format!("video_{}.mp4", task_id.0)
}

/// Remote service seam; the HTTP client implements it, tests mock it
#[async_trait]
pub trait RemoteJobService: Send + Sync {
    /// Submit a generation request, returning the assigned task id
    async fn generate(&self, request: &GenerationRequest) -> Result<TaskId, RemoteError>;

    /// Query the status of a task
    async fn poll(&self, task_id: &TaskId) -> Result<StatusResponse, RemoteError>;

    /// Fetch the finished video as raw bytes (valid once completed)
    async fn download(&self, task_id: &TaskId) -> Result<Vec<u8>, RemoteError>;
}

/// HTTP implementation of the remote service boundary
pub struct HttpJobClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpJobClient {
    /// Create a client for the configured service address
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn error_response(response: reqwest::Response, fallback: &str) -> RemoteError {
        let body = response.text().await.unwrap_or_default();
        error_from_body(&body, fallback)
    }
}

/// Structured error payload (`{"detail": "..."}`) from the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

/// Extract the server-provided detail message, falling back to a generic one
fn error_from_body(body: &str, fallback: &str) -> RemoteError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: Some(d) }) if !d.is_empty() => RemoteError(d),
        _ => RemoteError(fallback.to_string()),
    }
}

#[async_trait]
impl RemoteJobService for HttpJobClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<TaskId, RemoteError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|_| RemoteError("Network error occurred".to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_response(response, "Error generating video").await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|_| RemoteError("Error generating video".to_string()))?;
        log::debug!("submission accepted, task id {}", body.task_id);
        Ok(body.task_id)
    }

    async fn poll(&self, task_id: &TaskId) -> Result<StatusResponse, RemoteError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.base_url, task_id))
            .send()
            .await
            .map_err(|_| RemoteError("Network error while checking video status".to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_response(response, "Error checking video status").await);
        }

        response
            .json()
            .await
            .map_err(|_| RemoteError("Error checking video status".to_string()))
    }

    async fn download(&self, task_id: &TaskId) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .client
            .get(format!("{}/video/{}", self.base_url, task_id))
            .send()
            .await
            .map_err(|_| RemoteError("Network error occurred".to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_response(response, "Error downloading video").await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|_| RemoteError("Error downloading video".to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = GenerationRequest::new("volcanoes");
        assert_eq!(request.topic, "volcanoes");
        assert_eq!(request.num_images, 5);
        assert_eq!(request.language, "en");
        assert!(request.use_web_search);
        assert!(request.openai_key.is_none());
    }

    #[test]
    fn test_request_serialization_omits_absent_key() {
        let request = GenerationRequest::new("volcanoes");
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("openai_key").is_none());
        assert_eq!(value["topic"], "volcanoes");
        assert_eq!(value["use_web_search"], true);
    }

    #[test]
    fn test_request_serialization_includes_present_key() {
        let mut request = GenerationRequest::new("volcanoes");
        request.openai_key = Some("sk-test".to_string());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["openai_key"], "sk-test");
    }

    #[test]
    fn test_status_response_full() {
        let json = r#"{"status":"processing","current_step":"Generating images","progress":60.0,"error":null}"#;
        let response: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, TaskStatus::Processing);
        assert_eq!(response.current_step.as_deref(), Some("Generating images"));
        assert_eq!(response.progress, Some(60.0));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_status_response_sparse() {
        // Absent fields mean "not reported", not zero.
        let json = r#"{"status":"queued"}"#;
        let response: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, TaskStatus::Queued);
        assert!(response.current_step.is_none());
        assert!(response.progress.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_error_from_body_prefers_detail() {
        let err = error_from_body(r#"{"detail":"Task not found"}"#, "Error checking video status");
        assert_eq!(err, RemoteError("Task not found".to_string()));
    }

    #[test]
    fn test_error_from_body_fallback() {
        let err = error_from_body("<html>502</html>", "Error generating video");
        assert_eq!(err, RemoteError("Error generating video".to_string()));

        let err = error_from_body(r#"{"detail":""}"#, "Error generating video");
        assert_eq!(err, RemoteError("Error generating video".to_string()));
    }

    #[test]
    fn test_artifact_file_name() {
        let name = artifact_file_name(&TaskId("abc123".to_string()));
        assert_eq!(name, "video_abc123.mp4");
    }
}
