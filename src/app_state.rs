//! Global application state
//!
//! `AppState` is a plain value; every change is a transition that takes
//! the previous state and returns the next one. `AppStore` applies those
//! transitions one at a time and notifies subscribers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::recorder::{Segment, UploadStatus};
use crate::schedule::{CompletionPolicy, ScheduleError, Task};

/// Top-level views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppTab {
    #[default]
    Capture,
    Schedule,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Active schedule tasks
    pub tasks: Vec<Task>,

    /// Recording history, newest first
    pub recordings: Vec<Segment>,

    /// Tasks removed by completion
    pub completed_counter: u32,

    pub is_loading: bool,

    pub error: Option<String>,

    /// Blocking user notice (e.g. capture could not start)
    pub notice: Option<String>,

    pub active_tab: AppTab,
}

impl AppState {
    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Append a task after checking its hour; the state is unchanged on error
    pub fn with_task(mut self, task: Task) -> (Self, Result<(), ScheduleError>) {
        if let Err(e) = task.validate() {
            return (self, Err(e));
        }
        self.tasks.push(task);
        (self, Ok(()))
    }

    /// Add a segment to the front of the history. Known ids are ignored.
    pub fn with_recording(mut self, segment: Segment) -> Self {
        if self.recording(segment.id).is_none() {
            self.recordings.insert(0, segment);
        }
        self
    }

    pub fn with_recording_status(mut self, id: Uuid, status: UploadStatus) -> Self {
        if let Some(recording) = self.recordings.iter_mut().find(|r| r.id == id) {
            recording.upload_status = status;
        }
        self
    }

    /// Complete a task under `policy`; the flag tells whether anything changed
    pub fn complete_task(mut self, id: &str, policy: CompletionPolicy) -> (Self, bool) {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            return (self, false);
        };

        match policy {
            CompletionPolicy::Remove => {
                self.tasks.remove(index);
                self.completed_counter += 1;
            }
            CompletionPolicy::ToggleInPlace => {
                let task = &mut self.tasks[index];
                task.completed = !task.completed;
            }
        }
        (self, true)
    }

    pub fn with_loading(mut self, is_loading: bool) -> Self {
        self.is_loading = is_loading;
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }

    pub fn with_tab(mut self, tab: AppTab) -> Self {
        self.active_tab = tab;
        self
    }

    pub fn recording(&self, id: Uuid) -> Option<&Segment> {
        self.recordings.iter().find(|r| r.id == id)
    }

    /// Removed tasks plus tasks still listed as completed
    pub fn completed_count(&self) -> u32 {
        self.completed_counter + self.tasks.iter().filter(|t| t.completed).count() as u32
    }

    pub fn total_count(&self) -> u32 {
        self.completed_counter + self.tasks.len() as u32
    }

    /// Completed share in [0, 1]
    pub fn progress(&self) -> f64 {
        match self.total_count() {
            0 => 0.0,
            total => self.completed_count() as f64 / total as f64,
        }
    }
}

/// Shared handle to the application state
#[derive(Clone)]
pub struct AppStore {
    tx: Arc<watch::Sender<AppState>>,
}

impl AppStore {
    pub fn new(initial: AppState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Replace the state with `transition(previous)`
    pub fn apply(&self, transition: impl FnOnce(AppState) -> AppState) {
        self.update(|state| (transition(state), ()));
    }

    /// Like `apply`, also returning a value computed by the transition
    pub fn update<R>(&self, transition: impl FnOnce(AppState) -> (AppState, R)) -> R {
        let mut output = None;
        self.tx.send_modify(|state| {
            let (next, result) = transition(std::mem::take(state));
            *state = next;
            output = Some(result);
        });
        output.expect("send_modify always runs the closure")
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}
