//! Recording system module
//!
//! This module implements the rotating capture session:
//! - SegmentRecorder / SegmentSink to turn a stream into segment payloads
//! - SessionController to drive the start / rotate / stop lifecycle
//! - Segment, the unit handed to the upload pipeline

pub mod controller;
pub mod segment;
pub mod sink;
pub mod state;

use thiserror::Error;

use crate::capture::CaptureError;

pub use controller::{SessionController, SessionEvent, SESSION_LOST_NOTICE, START_FAILED_NOTICE};
pub use segment::{Segment, UploadStatus};
pub use sink::{FinalizedPayload, MimePreference, MimePreferences, SegmentRecorder, SegmentSink};
pub use state::{SessionConfig, SessionState, SessionSummary, StopReason};

/// Errors from the session lifecycle
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A capture session is already running")]
    AlreadyActive,

    #[error("Capture session was stopped before it started")]
    Cancelled,

    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
