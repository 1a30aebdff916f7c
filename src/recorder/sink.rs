//! Segment recorder
//!
//! Wraps a platform recorder over a live stream, buffers the chunks it
//! pushes and turns them into one payload when the sink is stopped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

use crate::capture::{
    CaptureError, CaptureKind, CaptureResult, ChunkWriter, MediaPlatform, MediaStream,
    PlatformRecorder, RecorderState,
};

/// Preferred mime type and its generic fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimePreference {
    pub preferred: String,
    pub fallback: String,
}

/// Mime negotiation order for each capture kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MimePreferences {
    pub display: MimePreference,
    pub audio: MimePreference,
}

impl Default for MimePreferences {
    fn default() -> Self {
        Self {
            display: MimePreference {
                preferred: "video/webm;codecs=vp8,opus".to_string(),
                fallback: "video/webm".to_string(),
            },
            audio: MimePreference {
                preferred: "audio/webm;codecs=opus".to_string(),
                fallback: "audio/webm".to_string(),
            },
        }
    }
}

impl MimePreferences {
    pub fn for_kind(&self, kind: CaptureKind) -> &MimePreference {
        match kind {
            CaptureKind::AudioPlusDisplay => &self.display,
            CaptureKind::AudioOnly => &self.audio,
        }
    }
}

/// Pick the preferred mime type if the platform supports it, else the fallback
pub fn negotiate_mime_type(platform: &dyn MediaPlatform, preference: &MimePreference) -> String {
    if platform.is_type_supported(&preference.preferred) {
        preference.preferred.clone()
    } else {
        tracing::debug!(
            "{} unsupported, falling back to {}",
            preference.preferred,
            preference.fallback
        );
        preference.fallback.clone()
    }
}

/// Concatenated chunks of one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Opens segment sinks on a stream
#[derive(Clone)]
pub struct SegmentRecorder {
    platform: Arc<dyn MediaPlatform>,
    preferences: MimePreferences,
}

impl SegmentRecorder {
    pub fn new(platform: Arc<dyn MediaPlatform>, preferences: MimePreferences) -> Self {
        Self { platform, preferences }
    }

    /// Start a new sink recording `stream`
    pub fn open(&self, stream: &MediaStream, kind: CaptureKind) -> CaptureResult<SegmentSink> {
        if !stream.active() {
            return Err(CaptureError::InactiveStream);
        }

        let mime_type = negotiate_mime_type(self.platform.as_ref(), self.preferences.for_kind(kind));
        let mut recorder = self.platform.create_recorder(stream, &mime_type)?;
        let writer = ChunkWriter::new();
        recorder.start(writer.clone())?;

        tracing::debug!("Opened segment sink on stream {} as {}", stream.id(), mime_type);

        Ok(SegmentSink {
            mime_type,
            recorder,
            writer,
            opened_at: Instant::now(),
            finished: false,
        })
    }
}

/// A recording sink producing one segment
pub struct SegmentSink {
    mime_type: String,
    recorder: Box<dyn PlatformRecorder>,
    writer: ChunkWriter,
    opened_at: Instant,
    finished: bool,
}

impl SegmentSink {
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn is_recording(&self) -> bool {
        !self.finished && self.recorder.state() == RecorderState::Recording
    }

    /// Bytes buffered so far
    pub fn buffered_len(&self) -> usize {
        self.writer.buffered_len()
    }

    /// Stop recording and finalize.
    ///
    /// Returns `None` when nothing was captured or the sink was already
    /// stopped.
    pub fn stop(&mut self) -> Option<FinalizedPayload> {
        if self.finished {
            return None;
        }
        self.finished = true;

        // The platform flushes its last chunk synchronously inside stop()
        self.recorder.stop();
        self.writer.close();
        self.finalize()
    }

    fn finalize(&mut self) -> Option<FinalizedPayload> {
        let bytes = self.writer.drain().concat();
        if bytes.is_empty() {
            tracing::warn!("Discarding empty segment ({})", self.mime_type);
            return None;
        }

        Some(FinalizedPayload {
            bytes,
            mime_type: self.mime_type.clone(),
        })
    }
}

impl Drop for SegmentSink {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Segment sink dropped while recording, data discarded");
            self.recorder.stop();
            self.writer.close();
        }
    }
}
