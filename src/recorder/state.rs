//! Recording state management
//!
//! Defines the session state machine, its timing configuration and the
//! summary produced when a session ends.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::sink::MimePreferences;
use super::SessionError;
use crate::capture::CaptureKind;

/// Current state of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Waiting on the platform permission prompts
    Acquiring,
    /// Capturing and rotating segments
    Active,
}

/// Why a session left the Active state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Explicit stop action
    UserStop,
    /// The platform ended the watched display track
    TrackEnded,
    /// The stream was found inactive when opening the next segment
    StreamInactive,
    /// The platform refused to open a recorder mid-session
    RecorderFailure,
    /// The owning view went away
    Unmount,
}

/// Timing and encoding settings for capture sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period between segment rotations
    pub rotation_interval: Duration,

    /// Period of the elapsed-time display timer
    pub tick_interval: Duration,

    /// Yield between stopping one segment and opening the next
    pub restart_delay: Duration,

    /// Mime type negotiation order per capture kind
    pub mime_preferences: MimePreferences,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotation_interval: Duration::from_secs(20 * 60),
            tick_interval: Duration::from_secs(1),
            restart_delay: Duration::from_millis(100),
            mime_preferences: MimePreferences::default(),
        }
    }
}

impl SessionConfig {
    /// Both timer periods must be non-zero
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.rotation_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "rotation interval must be greater than zero".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "tick interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub kind: CaptureKind,

    /// Value of the elapsed-time display when the session ended
    pub elapsed_seconds: u64,

    /// Segments handed to the upload pipeline (empty finalizes excluded)
    pub segments: usize,

    /// Rotations performed before the stop
    pub rotations: usize,

    pub reason: StopReason,
}
