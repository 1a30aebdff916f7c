//! Schedule task model

use serde::{Deserialize, Serialize};

use super::ScheduleError;

/// A time-boxed task in the daily schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    /// Hour of day, 0-23
    pub hour: u8,

    pub completed: bool,

    /// Display color tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Task {
    /// Create a task, rejecting hours outside 0-23
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        hour: u8,
        color: Option<&str>,
    ) -> Result<Self, ScheduleError> {
        let task = Self {
            id: id.into(),
            title: title.into(),
            hour,
            completed: false,
            color: color.map(str::to_string),
        };
        task.validate()?;
        Ok(task)
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.hour > 23 {
            return Err(ScheduleError::InvalidHour {
                id: self.id.clone(),
                hour: self.hour,
            });
        }
        Ok(())
    }
}

/// What completing a task does to the active list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionPolicy {
    /// Drop the task from the list and bump the completed counter
    #[default]
    Remove,
    /// Flip the task's completed flag and keep it listed
    ToggleInPlace,
}

impl std::str::FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" => Ok(CompletionPolicy::Remove),
            "toggle" | "toggleinplace" | "toggle-in-place" => Ok(CompletionPolicy::ToggleInPlace),
            other => Err(format!("unknown completion policy '{}'", other)),
        }
    }
}
