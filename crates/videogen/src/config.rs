/// Client configuration for the remote video-generation service
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default service address (local development server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default status poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the remote generation service
    pub base_url: String,

    /// How often the controller polls task status
    pub poll_interval: Duration,

    /// Expected access key for the client-side submission gate.
    /// `None` disables the gate entirely.
    ///
    /// This is a deterrent, not a security boundary: the value ships with
    /// the client and must not stand in for server-side authorization.
    pub access_secret: Option<String>,
}

impl ServiceConfig {
    /// Create config pointing at the given service address
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            access_secret: None,
        }
    }

    /// With custom poll period
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// With the submission-gate secret enabled
    pub fn with_access_secret(mut self, secret: impl Into<String>) -> Self {
        self.access_secret = Some(secret.into());
        self
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(config.access_secret.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ServiceConfig::new("http://example.com:8000")
            .with_poll_interval(Duration::from_millis(500))
            .with_access_secret("letmein");

        assert_eq!(config.base_url, "http://example.com:8000");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.access_secret.as_deref(), Some("letmein"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = ServiceConfig::new("http://example.com").with_access_secret("k");
        let json = serde_json::to_string(&config).unwrap();
        let back: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
