//! Capture trait definitions
//!
//! Platform-agnostic types for the host media boundary: tracks, streams,
//! recorders and the chunk callback that feeds a segment sink.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

/// Errors raised at the media boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Stream is inactive")]
    InactiveStream,

    #[error("Recorder error: {0}")]
    Recorder(String),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// What a session captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureKind {
    /// Microphone only
    AudioOnly,
    /// Display video plus microphone audio
    #[default]
    AudioPlusDisplay,
}

impl CaptureKind {
    pub fn includes_display(&self) -> bool {
        matches!(self, CaptureKind::AudioPlusDisplay)
    }
}

impl std::str::FromStr for CaptureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" | "audioonly" | "audio-only" => Ok(CaptureKind::AudioOnly),
            "screen" | "display" | "audioplusdisplay" | "audio-plus-display" => {
                Ok(CaptureKind::AudioPlusDisplay)
            }
            other => Err(format!("unknown capture kind '{}'", other)),
        }
    }
}

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

struct TrackInner {
    id: Uuid,
    kind: TrackKind,
    label: String,
    live: AtomicBool,
    /// Flips to true when the platform ends the track (revocation, device loss)
    ended_by_platform: watch::Sender<bool>,
}

/// A single live audio or video track handed out by the platform
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        let (ended_by_platform, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4(),
                kind,
                label: label.into(),
                live: AtomicBool::new(true),
                ended_by_platform,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Release the track locally. Does not notify `ended()` observers.
    pub fn stop(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
    }

    /// End the track from the platform side (the user revoked sharing,
    /// the device went away). Wakes every `ended()` observer.
    pub fn end(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
        self.inner.ended_by_platform.send_replace(true);
    }

    /// Resolves once the platform has ended this track.
    pub async fn ended(&self) {
        let mut rx = self.inner.ended_by_platform.subscribe();
        // The sender lives as long as `self`, so this only returns on `true`.
        let _ = rx.wait_for(|ended| *ended).await;
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("live", &self.is_live())
            .finish()
    }
}

struct StreamInner {
    id: Uuid,
    tracks: Vec<MediaTrack>,
}

/// A logical stream made of one or more tracks
///
/// Cloning shares the same underlying stream; use [`MediaStream::same_as`]
/// to compare identity.
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: Uuid::new_v4(),
                tracks,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.inner.tracks
    }

    pub fn audio_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<MediaTrack> {
        self.inner
            .tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    /// A stream is active while at least one of its tracks is live
    pub fn active(&self) -> bool {
        self.inner.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track of the stream
    pub fn stop_all(&self) {
        for track in &self.inner.tracks {
            track.stop();
        }
    }

    /// Whether both handles refer to the same underlying stream
    pub fn same_as(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("tracks", &self.inner.tracks)
            .finish()
    }
}

/// Chunk-available callback handed to a platform recorder
///
/// Chunks land in the owning sink's buffer. Empty chunks are ignored and
/// nothing is accepted once the sink has closed the writer.
#[derive(Clone, Default)]
pub struct ChunkWriter {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk. Returns whether it was buffered.
    pub fn push(&self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() || self.is_closed() {
            return false;
        }
        self.chunks.lock().push(chunk);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Take every buffered chunk, leaving the buffer empty
    pub(crate) fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.chunks.lock())
    }

    pub fn buffered_len(&self) -> usize {
        self.chunks.lock().iter().map(Vec::len).sum()
    }
}

/// State reported by a platform recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// A platform recording sink bound to one stream
pub trait PlatformRecorder: Send {
    /// Begin recording; encoded chunks are pushed into `writer`
    fn start(&mut self, writer: ChunkWriter) -> CaptureResult<()>;

    /// Stop recording. Must push any pending data into the writer before
    /// returning.
    fn stop(&mut self);

    fn state(&self) -> RecorderState;
}

/// Host platform capture services
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Ask for a microphone stream
    async fn request_audio(&self) -> CaptureResult<MediaStream>;

    /// Ask for a display (screen/window) video stream
    async fn request_display(&self) -> CaptureResult<MediaStream>;

    /// Whether the platform can record the given mime type
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Construct a recorder over `stream` producing `mime_type`
    fn create_recorder(
        &self,
        stream: &MediaStream,
        mime_type: &str,
    ) -> CaptureResult<Box<dyn PlatformRecorder>>;
}
