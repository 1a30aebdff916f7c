//! Remote upload sinks

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::UploadError;

/// Opaque remote endpoint receiving segment payloads
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload(&self, payload: &[u8], mime_type: &str) -> Result<(), UploadError>;
}

/// Behaviour of the mock upload endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockUploadConfig {
    /// Simulated request time
    pub latency_ms: u64,

    /// Probability in [0, 1] that a request fails
    pub failure_rate: f64,
}

impl Default for MockUploadConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1500,
            failure_rate: 0.05,
        }
    }
}

/// Upload endpoint that waits and occasionally fails
#[derive(Debug, Clone, Default)]
pub struct MockUploadSink {
    config: MockUploadConfig,
}

impl MockUploadSink {
    pub fn new(config: MockUploadConfig) -> Self {
        Self { config }
    }

    fn roll_failure(&self) -> bool {
        let rate = self.config.failure_rate.clamp(0.0, 1.0);
        rand::thread_rng().gen_bool(rate)
    }
}

#[async_trait]
impl UploadSink for MockUploadSink {
    async fn upload(&self, payload: &[u8], mime_type: &str) -> Result<(), UploadError> {
        tracing::debug!("Uploading media chunk ({}), size: {} bytes", mime_type, payload.len());

        let fails = self.roll_failure();
        tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;

        if fails {
            return Err(UploadError::Network("Network Error".to_string()));
        }
        tracing::debug!("Upload complete");
        Ok(())
    }
}
