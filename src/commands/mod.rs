//! Command handlers
//!
//! The operations the UI invokes. Each takes the composition root and
//! returns a serializable view or an `ErrorResponse`.

pub mod navigation;
pub mod recording;
pub mod schedule;
