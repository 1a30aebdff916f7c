//! Schedule commands

use serde::Serialize;

use crate::schedule::{HourSlot, Task};
use crate::utils::ErrorResponse;
use crate::App;

/// One hour row as rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub hour: u8,
    pub label: String,
    /// Tasks shown side by side
    pub tasks: Vec<Task>,
    /// Tasks in this hour that don't fit
    pub hidden: usize,
    pub is_free: bool,
}

impl From<HourSlot> for SlotView {
    fn from(slot: HourSlot) -> Self {
        let visible = slot.visible_tasks().to_vec();
        Self {
            hour: slot.hour,
            hidden: slot.tasks.len() - visible.len(),
            is_free: slot.is_free(),
            label: slot.label,
            tasks: visible,
        }
    }
}

/// Everything the schedule tab renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub slots: Vec<SlotView>,
    pub completed: u32,
    pub total: u32,
    /// Completed share in [0, 1]
    pub progress: f64,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Fetch the day's tasks
pub async fn load_schedule(app: &App) -> Result<ScheduleView, ErrorResponse> {
    app.schedule.load().await?;
    get_schedule_view(app).await
}

/// Add a task to the day
pub async fn add_task(app: &App, task: Task) -> Result<ScheduleView, ErrorResponse> {
    app.schedule.add(task)?;
    get_schedule_view(app).await
}

/// Complete a task under the configured policy. Unknown ids leave the
/// schedule unchanged.
pub async fn complete_task(app: &App, id: String) -> Result<ScheduleView, ErrorResponse> {
    app.schedule.complete(&id);
    get_schedule_view(app).await
}

pub async fn get_schedule_view(app: &App) -> Result<ScheduleView, ErrorResponse> {
    let slots: Vec<SlotView> = app.schedule.slots().into_iter().map(SlotView::from).collect();
    let view = app.store.read(|state| ScheduleView {
        slots,
        completed: state.completed_count(),
        total: state.total_count(),
        progress: state.progress(),
        is_loading: state.is_loading,
        error: state.error.clone(),
    });
    Ok(view)
}
