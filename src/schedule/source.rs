//! Remote task sources

use async_trait::async_trait;
use std::time::Duration;

use super::task::Task;
use super::ScheduleError;

/// Remote provider of the day's tasks
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ScheduleError>;
}

/// Fixed seven-task day served after a short delay
#[derive(Debug, Clone)]
pub struct MockTaskSource {
    latency: Duration,
}

impl MockTaskSource {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn task(id: &str, title: &str, hour: u8, completed: bool, color: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            hour,
            completed,
            color: Some(color.to_string()),
        }
    }
}

impl Default for MockTaskSource {
    fn default() -> Self {
        Self::new(Duration::from_millis(800))
    }
}

#[async_trait]
impl TaskSource for MockTaskSource {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ScheduleError> {
        tokio::time::sleep(self.latency).await;
        Ok(vec![
            Self::task("1", "Morning Standup", 9, false, "bg-blue-500"),
            Self::task("2", "Code Review", 9, true, "bg-indigo-500"),
            Self::task("3", "Client Call", 10, false, "bg-emerald-500"),
            Self::task("4", "Lunch Break", 12, false, "bg-orange-500"),
            Self::task("5", "Focus Time", 14, false, "bg-purple-500"),
            Self::task("6", "Focus Time", 14, false, "bg-purple-500"),
            Self::task("7", "Team Sync", 16, false, "bg-pink-500"),
        ])
    }
}
