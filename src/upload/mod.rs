//! Segment upload
//!
//! Fire-and-forget delivery of finalized segments to a remote sink.

pub mod pipeline;
pub mod sink;

use thiserror::Error;

pub use pipeline::UploadPipeline;
pub use sink::{MockUploadConfig, MockUploadSink, UploadSink};

/// Errors returned by an upload sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),
}
