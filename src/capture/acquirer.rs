//! Media source acquisition
//!
//! Requests the microphone (and optionally the display) from the platform
//! and composes the grants into one stream for recording.

use std::sync::Arc;

use super::traits::{CaptureError, CaptureKind, CaptureResult, MediaPlatform, MediaStream, MediaTrack};

/// A successfully acquired capture source
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Combined stream (display video first, then microphone audio)
    pub stream: MediaStream,

    /// Track whose external termination must end the session
    pub termination_track: Option<MediaTrack>,
}

/// Obtains live media streams from the host platform
#[derive(Clone)]
pub struct MediaSourceAcquirer {
    platform: Arc<dyn MediaPlatform>,
}

impl MediaSourceAcquirer {
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self { platform }
    }

    /// Acquire a stream for `kind`
    pub async fn acquire(&self, kind: CaptureKind) -> CaptureResult<Acquisition> {
        tracing::info!("Acquiring media sources: {:?}", kind);

        let audio = self.platform.request_audio().await?;

        let acquisition = match kind {
            CaptureKind::AudioOnly => Acquisition {
                termination_track: None,
                stream: audio,
            },
            CaptureKind::AudioPlusDisplay => {
                let display = match self.platform.request_display().await {
                    Ok(display) => display,
                    Err(e) => {
                        // Don't leave the microphone hot after a refused display prompt
                        audio.stop_all();
                        return Err(e);
                    }
                };

                let display_video = display.video_tracks();
                let mut tracks = display_video.clone();
                tracks.extend(audio.audio_tracks());

                // Anything the platform handed over that we don't compose is released
                for track in display.audio_tracks() {
                    track.stop();
                }
                for track in audio.video_tracks() {
                    track.stop();
                }

                Acquisition {
                    stream: MediaStream::new(tracks),
                    termination_track: display_video.into_iter().next(),
                }
            }
        };

        if !acquisition.stream.active() {
            tracing::warn!("Acquired stream is inactive, refusing to record");
            acquisition.stream.stop_all();
            return Err(CaptureError::InactiveStream);
        }

        tracing::info!(
            "Acquired stream {} with {} track(s)",
            acquisition.stream.id(),
            acquisition.stream.tracks().len()
        );
        Ok(acquisition)
    }
}
