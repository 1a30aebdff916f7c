//! Simulated host platform
//!
//! An in-process stand-in for the browser media APIs: permission prompts
//! with configurable outcomes, tracks that can be revoked from the
//! "platform UI", and recorders that emit fixed-size chunks on a timer.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use super::traits::{
    CaptureError, CaptureResult, ChunkWriter, MediaPlatform, MediaStream, MediaTrack,
    PlatformRecorder, RecorderState, TrackKind,
};

/// Outcome of a simulated permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Allow,
    /// Granted, but every track arrives already ended
    AllowInactive,
    Deny,
    Unavailable,
}

const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Simulated media platform
pub struct SimulatedPlatform {
    audio_grant: Mutex<Grant>,
    display_grant: Mutex<Grant>,
    prompt_delay: Duration,
    supported_types: Mutex<Vec<String>>,
    chunk_interval: Duration,
    chunk_size: AtomicUsize,
    audio_requests: AtomicUsize,
    display_requests: AtomicUsize,
    recorders_created: AtomicUsize,
    issued: Mutex<Vec<MediaTrack>>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self {
            audio_grant: Mutex::new(Grant::Allow),
            display_grant: Mutex::new(Grant::Allow),
            prompt_delay: Duration::ZERO,
            supported_types: Mutex::new(vec![
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
                "audio/webm;codecs=opus".to_string(),
                "audio/webm".to_string(),
            ]),
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            chunk_size: AtomicUsize::new(DEFAULT_CHUNK_SIZE),
            audio_requests: AtomicUsize::new(0),
            display_requests: AtomicUsize::new(0),
            recorders_created: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Time the simulated user takes to answer each permission prompt
    pub fn with_prompt_delay(mut self, delay: Duration) -> Self {
        self.prompt_delay = delay;
        self
    }

    pub fn with_chunk_interval(mut self, interval: Duration) -> Self {
        self.chunk_interval = interval;
        self
    }

    pub fn set_audio_grant(&self, grant: Grant) {
        *self.audio_grant.lock() = grant;
    }

    pub fn set_display_grant(&self, grant: Grant) {
        *self.display_grant.lock() = grant;
    }

    /// Bytes per emitted chunk; 0 makes every recorder produce nothing
    pub fn set_chunk_size(&self, size: usize) {
        self.chunk_size.store(size, Ordering::SeqCst);
    }

    pub fn set_supported_types(&self, types: &[&str]) {
        *self.supported_types.lock() = types.iter().map(|t| t.to_string()).collect();
    }

    pub fn audio_requests(&self) -> usize {
        self.audio_requests.load(Ordering::SeqCst)
    }

    pub fn display_requests(&self) -> usize {
        self.display_requests.load(Ordering::SeqCst)
    }

    pub fn recorders_created(&self) -> usize {
        self.recorders_created.load(Ordering::SeqCst)
    }

    /// Every track handed out so far, in issue order
    pub fn issued_tracks(&self) -> Vec<MediaTrack> {
        self.issued.lock().clone()
    }

    /// Simulate the user pressing "stop sharing" in the platform UI
    pub fn revoke_display(&self) {
        for track in self.issued.lock().iter() {
            if track.kind() == TrackKind::Video && track.is_live() {
                tracing::info!("Platform ended display track {}", track.id());
                track.end();
            }
        }
    }

    async fn prompt(&self, grant: Grant, kind: TrackKind, label: &str) -> CaptureResult<MediaStream> {
        if !self.prompt_delay.is_zero() {
            time::sleep(self.prompt_delay).await;
        }

        match grant {
            Grant::Deny => Err(CaptureError::PermissionDenied(format!("{} access was denied", label))),
            Grant::Unavailable => Err(CaptureError::DeviceUnavailable(format!("no {} device found", label))),
            Grant::Allow | Grant::AllowInactive => {
                let track = MediaTrack::new(kind, label);
                if grant == Grant::AllowInactive {
                    track.stop();
                }
                self.issued.lock().push(track.clone());
                Ok(MediaStream::new(vec![track]))
            }
        }
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaPlatform for SimulatedPlatform {
    async fn request_audio(&self) -> CaptureResult<MediaStream> {
        self.audio_requests.fetch_add(1, Ordering::SeqCst);
        let grant = *self.audio_grant.lock();
        self.prompt(grant, TrackKind::Audio, "microphone").await
    }

    async fn request_display(&self) -> CaptureResult<MediaStream> {
        self.display_requests.fetch_add(1, Ordering::SeqCst);
        let grant = *self.display_grant.lock();
        self.prompt(grant, TrackKind::Video, "display").await
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported_types.lock().iter().any(|t| t == mime_type)
    }

    fn create_recorder(
        &self,
        stream: &MediaStream,
        mime_type: &str,
    ) -> CaptureResult<Box<dyn PlatformRecorder>> {
        if !self.is_type_supported(mime_type) {
            return Err(CaptureError::Recorder(format!("unsupported mime type '{}'", mime_type)));
        }

        let index = self.recorders_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedRecorder {
            stream: stream.clone(),
            chunk_interval: self.chunk_interval,
            chunk_size: self.chunk_size.load(Ordering::SeqCst),
            fill: (index % 251) as u8,
            state: RecorderState::Inactive,
            writer: None,
            producer: None,
        }))
    }
}

/// Recorder that emits `chunk_size` bytes every `chunk_interval`
struct SimulatedRecorder {
    stream: MediaStream,
    chunk_interval: Duration,
    chunk_size: usize,
    fill: u8,
    state: RecorderState,
    writer: Option<ChunkWriter>,
    producer: Option<JoinHandle<()>>,
}

impl PlatformRecorder for SimulatedRecorder {
    fn start(&mut self, writer: ChunkWriter) -> CaptureResult<()> {
        if self.state == RecorderState::Recording {
            return Err(CaptureError::Recorder("recorder already started".to_string()));
        }
        if !self.stream.active() {
            return Err(CaptureError::Recorder("stream is inactive".to_string()));
        }

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let producer_writer = writer.clone();
            let (interval, size, fill) = (self.chunk_interval, self.chunk_size, self.fill);
            self.producer = Some(handle.spawn(async move {
                let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
                loop {
                    ticker.tick().await;
                    if producer_writer.is_closed() {
                        break;
                    }
                    producer_writer.push(vec![fill; size]);
                }
            }));
        }

        self.writer = Some(writer);
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn stop(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        // Final flush, the equivalent of the last dataavailable before onstop
        if let Some(writer) = self.writer.take() {
            writer.push(vec![self.fill; self.chunk_size]);
        }
        self.state = RecorderState::Inactive;
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}

impl Drop for SimulatedRecorder {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}
