//! Media capture
//!
//! The host media boundary, stream acquisition, and a simulated platform
//! used by the demo binary and the tests.

pub mod acquirer;
pub mod simulated;
pub mod traits;

pub use acquirer::{Acquisition, MediaSourceAcquirer};
pub use simulated::{Grant, SimulatedPlatform};
pub use traits::{
    CaptureError, CaptureKind, CaptureResult, ChunkWriter, MediaPlatform, MediaStream, MediaTrack,
    PlatformRecorder, RecorderState, TrackKind,
};
