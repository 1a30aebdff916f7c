//! Task schedule store
//!
//! Loads the day's tasks into the app state, applies completions and
//! buckets tasks by hour for the schedule view.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::source::TaskSource;
use super::task::{CompletionPolicy, Task};
use super::ScheduleError;
use crate::app_state::AppStore;

/// Most tasks a slot shows side by side
pub const MAX_VISIBLE_PER_SLOT: usize = 4;

/// Hours always rendered, even when empty (inclusive on both ends)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveHours {
    pub start: u8,
    pub end: u8,
}

impl Default for ActiveHours {
    fn default() -> Self {
        Self { start: 8, end: 20 }
    }
}

impl ActiveHours {
    pub fn contains(&self, hour: u8) -> bool {
        (self.start..=self.end).contains(&hour)
    }
}

/// One hour row of the schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourSlot {
    pub hour: u8,
    pub label: String,
    pub tasks: Vec<Task>,
}

impl HourSlot {
    pub fn visible_tasks(&self) -> &[Task] {
        &self.tasks[..self.tasks.len().min(MAX_VISIBLE_PER_SLOT)]
    }

    pub fn is_free(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Bucket tasks by hour, keeping their original order within each hour.
///
/// Hours inside `active_hours` always get a slot; others only when they
/// hold tasks.
pub fn group_by_hour(tasks: &[Task], active_hours: ActiveHours) -> Vec<HourSlot> {
    let mut buckets: Vec<Vec<Task>> = vec![Vec::new(); 24];
    for task in tasks {
        match buckets.get_mut(task.hour as usize) {
            Some(bucket) => bucket.push(task.clone()),
            None => tracing::warn!("Task {} has out-of-range hour {}", task.id, task.hour),
        }
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(hour, tasks)| (hour as u8, tasks))
        .filter(|(hour, tasks)| active_hours.contains(*hour) || !tasks.is_empty())
        .map(|(hour, tasks)| HourSlot {
            hour,
            label: format!("{:02}:00", hour),
            tasks,
        })
        .collect()
}

/// Schedule operations over the shared app state
#[derive(Clone)]
pub struct TaskScheduleStore {
    source: Arc<dyn TaskSource>,
    store: AppStore,
    policy: CompletionPolicy,
    active_hours: ActiveHours,
}

impl TaskScheduleStore {
    pub fn new(
        source: Arc<dyn TaskSource>,
        store: AppStore,
        policy: CompletionPolicy,
        active_hours: ActiveHours,
    ) -> Self {
        Self {
            source,
            store,
            policy,
            active_hours,
        }
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Fetch the day's tasks and replace the active list
    pub async fn load(&self) -> Result<Vec<Task>, ScheduleError> {
        self.store.apply(|state| state.with_loading(true));

        let result = self.source.fetch_tasks().await;
        let outcome = match result {
            Ok(fetched) => {
                let tasks: Vec<Task> = fetched
                    .into_iter()
                    .filter(|task| match task.validate() {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!("Dropping task from source: {}", e);
                            false
                        }
                    })
                    .collect();
                tracing::info!("Loaded {} task(s)", tasks.len());
                let loaded = tasks.clone();
                self.store
                    .apply(|state| state.with_tasks(loaded).with_error(None));
                Ok(tasks)
            }
            Err(e) => {
                tracing::error!("Failed to fetch tasks: {}", e);
                let message = e.to_string();
                self.store.apply(|state| state.with_error(Some(message)));
                Err(e)
            }
        };

        self.store.apply(|state| state.with_loading(false));
        outcome
    }

    /// Append a task to the active list
    pub fn add(&self, task: Task) -> Result<(), ScheduleError> {
        let id = task.id.clone();
        self.store.update(|state| state.with_task(task))?;
        tracing::debug!("Added task {}", id);
        Ok(())
    }

    /// Complete a task. Returns false (and changes nothing) for unknown ids.
    pub fn complete(&self, id: &str) -> bool {
        let policy = self.policy;
        let changed = self.store.update(|state| state.complete_task(id, policy));
        if changed {
            tracing::debug!("Completed task {} ({:?})", id, policy);
        } else {
            tracing::debug!("No active task {} to complete", id);
        }
        changed
    }

    /// Current tasks grouped for display
    pub fn slots(&self) -> Vec<HourSlot> {
        self.store
            .read(|state| group_by_hour(&state.tasks, self.active_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::schedule::MockTaskSource;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingSource;

    #[async_trait]
    impl TaskSource for FailingSource {
        async fn fetch_tasks(&self) -> Result<Vec<Task>, ScheduleError> {
            Err(ScheduleError::Fetch("timeout".to_string()))
        }
    }

    struct StaticSource(Vec<Task>);

    #[async_trait]
    impl TaskSource for StaticSource {
        async fn fetch_tasks(&self) -> Result<Vec<Task>, ScheduleError> {
            Ok(self.0.clone())
        }
    }

    fn schedule(policy: CompletionPolicy) -> (TaskScheduleStore, AppStore) {
        let store = AppStore::new(AppState::default());
        let schedule = TaskScheduleStore::new(
            Arc::new(MockTaskSource::new(Duration::ZERO)),
            store.clone(),
            policy,
            ActiveHours::default(),
        );
        (schedule, store)
    }

    #[tokio::test]
    async fn shared_hour_keeps_both_tasks_in_order() {
        let (schedule, _) = schedule(CompletionPolicy::Remove);
        schedule.load().await.unwrap();

        let slots = schedule.slots();
        let two_pm = slots.iter().find(|s| s.hour == 14).unwrap();
        let ids: Vec<&str> = two_pm.tasks.iter().map(|t| t.id.as_str()).collect();

        assert_eq!(two_pm.label, "14:00");
        assert_eq!(ids, vec!["5", "6"]);
        let total: usize = slots.iter().map(|s| s.tasks.len()).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn empty_hours_outside_the_window_are_omitted() {
        let tasks = vec![
            Task::new("a", "Early run", 6, None).unwrap(),
            Task::new("b", "Planning", 9, None).unwrap(),
        ];
        let slots = group_by_hour(&tasks, ActiveHours { start: 8, end: 20 });
        let hours: Vec<u8> = slots.iter().map(|s| s.hour).collect();

        assert_eq!(hours, [6].into_iter().chain(8..=20).collect::<Vec<u8>>());
        assert!(slots.iter().find(|s| s.hour == 10).unwrap().is_free());
    }

    #[test]
    fn visible_tasks_cap_at_four() {
        let tasks: Vec<Task> = (0..6)
            .map(|i| Task::new(i.to_string(), "Busy", 11, None).unwrap())
            .collect();
        let slots = group_by_hour(&tasks, ActiveHours::default());
        let eleven = slots.iter().find(|s| s.hour == 11).unwrap();

        assert_eq!(eleven.tasks.len(), 6);
        assert_eq!(eleven.visible_tasks().len(), MAX_VISIBLE_PER_SLOT);
    }

    #[tokio::test]
    async fn remove_policy_drops_task_and_counts_it() {
        let (schedule, store) = schedule(CompletionPolicy::Remove);
        schedule.load().await.unwrap();
        let before = store.snapshot().completed_count();

        assert!(schedule.complete("3"));

        let state = store.snapshot();
        assert_eq!(state.tasks.len(), 6);
        assert!(state.tasks.iter().all(|t| t.id != "3"));
        assert_eq!(state.completed_counter, 1);
        assert_eq!(state.completed_count(), before + 1);
    }

    #[tokio::test]
    async fn unknown_id_changes_nothing() {
        let (schedule, store) = schedule(CompletionPolicy::Remove);
        schedule.load().await.unwrap();
        let before = store.snapshot();

        assert!(!schedule.complete("missing"));

        let after = store.snapshot();
        assert_eq!(after.tasks, before.tasks);
        assert_eq!(after.completed_counter, before.completed_counter);
    }

    #[tokio::test]
    async fn toggle_policy_flips_in_place() {
        let (schedule, store) = schedule(CompletionPolicy::ToggleInPlace);
        schedule.load().await.unwrap();

        assert!(schedule.complete("1"));
        let state = store.snapshot();
        assert_eq!(state.tasks.len(), 7);
        assert!(state.tasks.iter().find(|t| t.id == "1").unwrap().completed);
        assert_eq!(state.completed_counter, 0);
        assert_eq!(state.completed_count(), 2);
    }

    #[tokio::test]
    async fn added_task_lands_in_its_hour_slot() {
        let (schedule, store) = schedule(CompletionPolicy::Remove);
        schedule.load().await.unwrap();

        schedule
            .add(Task::new("8", "Retro", 14, Some("bg-teal-500")).unwrap())
            .unwrap();

        let two_pm = schedule.slots().into_iter().find(|s| s.hour == 14).unwrap();
        let ids: Vec<&str> = two_pm.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["5", "6", "8"]);
        assert_eq!(store.snapshot().total_count(), 8);
    }

    #[tokio::test]
    async fn fetch_failure_clears_loading_and_records_error() {
        let store = AppStore::new(AppState::default());
        let schedule = TaskScheduleStore::new(
            Arc::new(FailingSource),
            store.clone(),
            CompletionPolicy::Remove,
            ActiveHours::default(),
        );

        assert!(schedule.load().await.is_err());
        let state = store.snapshot();
        assert!(!state.is_loading);
        assert!(state.error.unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn out_of_range_hours_are_dropped_on_load() {
        let store = AppStore::new(AppState::default());
        let mut bad = Task::new("x", "Nowhere", 3, None).unwrap();
        bad.hour = 30;
        let good = Task::new("y", "Somewhere", 9, None).unwrap();
        let schedule = TaskScheduleStore::new(
            Arc::new(StaticSource(vec![bad, good])),
            store.clone(),
            CompletionPolicy::Remove,
            ActiveHours::default(),
        );

        let tasks = schedule.load().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(store.snapshot().tasks[0].id, "y");
    }
}
