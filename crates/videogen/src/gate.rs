/// Client-side submission gate
///
/// Checks the user-entered access key against a fixed expected value before
/// any network call is made, and strips the key from the outgoing payload.
/// A deterrent only: the secret is visible to anyone inspecting the client.
use thiserror::Error;

use crate::api::GenerationRequest;

/// Gate validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Access denied. Invalid security key.")]
    InvalidAccessKey,
}

/// User-entered form: the generation parameters plus the access key.
///
/// The key lives only here; `validate` hands back a `GenerationRequest`,
/// which has no key field and is the only type the client will transmit.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationForm {
    pub request: GenerationRequest,
    pub security_key: String,
}

impl GenerationForm {
    pub fn new(request: GenerationRequest, security_key: impl Into<String>) -> Self {
        Self {
            request,
            security_key: security_key.into(),
        }
    }
}

/// Submission gate with an optional expected secret
#[derive(Debug, Clone)]
pub struct SubmissionGate {
    secret: Option<String>,
}

impl SubmissionGate {
    /// Gate comparing against the given secret; `None` disables the check
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Gate that admits every form
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    /// Validate the form, returning the cleaned payload on success.
    /// Pure comparison; the caller surfaces the error and clears it on
    /// key re-entry.
    pub fn validate(&self, form: GenerationForm) -> Result<GenerationRequest, GateError> {
        match &self.secret {
            Some(expected) if form.security_key != *expected => Err(GateError::InvalidAccessKey),
            _ => Ok(form.request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with_key(key: &str) -> GenerationForm {
        GenerationForm::new(GenerationRequest::new("volcanoes"), key)
    }

    #[test]
    fn test_gate_accepts_matching_key() {
        let gate = SubmissionGate::new(Some("secret-123".to_string()));
        let request = gate.validate(form_with_key("secret-123")).unwrap();
        assert_eq!(request.topic, "volcanoes");
    }

    #[test]
    fn test_gate_rejects_mismatched_key() {
        let gate = SubmissionGate::new(Some("secret-123".to_string()));
        assert_eq!(
            gate.validate(form_with_key("secret-124")),
            Err(GateError::InvalidAccessKey)
        );
        // Near-misses are still misses: comparison is exact.
        assert_eq!(
            gate.validate(form_with_key("Secret-123")),
            Err(GateError::InvalidAccessKey)
        );
        assert_eq!(
            gate.validate(form_with_key("")),
            Err(GateError::InvalidAccessKey)
        );
    }

    #[test]
    fn test_disabled_gate_admits_everything() {
        let gate = SubmissionGate::disabled();
        assert!(gate.validate(form_with_key("")).is_ok());
        assert!(gate.validate(form_with_key("anything")).is_ok());
    }

    #[test]
    fn test_cleaned_payload_carries_no_key() {
        let gate = SubmissionGate::new(Some("secret-123".to_string()));
        let request = gate.validate(form_with_key("secret-123")).unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("security_key").is_none());
    }
}
