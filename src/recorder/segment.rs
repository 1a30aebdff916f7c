//! Finalized capture segments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::sink::FinalizedPayload;

/// Upload progress of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Queued,
    Uploading,
    Uploaded,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Uploaded | UploadStatus::Failed)
    }

    /// Short label shown next to a history entry
    pub fn badge(&self) -> &'static str {
        match self {
            UploadStatus::Queued => "Queued",
            UploadStatus::Uploading => "Uploading...",
            UploadStatus::Uploaded => "Sent",
            UploadStatus::Failed => "Error",
        }
    }
}

/// One finalized, uploadable unit of captured media
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,

    #[serde(skip)]
    pub payload: Arc<Vec<u8>>,

    pub size_bytes: usize,

    pub mime_type: String,

    /// Wall-clock time the segment started capturing
    pub captured_at: DateTime<Utc>,

    pub duration_ms: u64,

    pub duration_seconds: u64,

    pub upload_status: UploadStatus,
}

impl Segment {
    /// Build a queued segment; the id is assigned here
    pub fn new(payload: FinalizedPayload, captured_at: DateTime<Utc>, duration: Duration) -> Self {
        let duration_ms = duration.as_millis() as u64;
        Self {
            id: Uuid::new_v4(),
            size_bytes: payload.bytes.len(),
            payload: Arc::new(payload.bytes),
            mime_type: payload.mime_type,
            captured_at,
            duration_ms,
            duration_seconds: (duration_ms + 500) / 1000,
            upload_status: UploadStatus::Queued,
        }
    }

    /// Wall-clock time the segment stopped capturing
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.captured_at + chrono::Duration::milliseconds(self.duration_ms as i64)
    }
}
