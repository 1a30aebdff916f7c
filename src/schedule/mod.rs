//! Daily schedule
//!
//! Tasks grouped by hour of day, loaded from a remote source.

pub mod source;
pub mod store;
pub mod task;

use thiserror::Error;

pub use source::{MockTaskSource, TaskSource};
pub use store::{group_by_hour, ActiveHours, HourSlot, TaskScheduleStore, MAX_VISIBLE_PER_SLOT};
pub use task::{CompletionPolicy, Task};

/// Errors from the schedule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Failed to fetch tasks: {0}")]
    Fetch(String),

    #[error("Task {id} has hour {hour}, expected 0-23")]
    InvalidHour { id: String, hour: u8 },
}
