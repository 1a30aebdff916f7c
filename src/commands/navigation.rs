//! Tab navigation commands

use crate::app_state::AppTab;
use crate::utils::ErrorResponse;
use crate::App;

/// Switch the visible tab.
///
/// Leaving the capture tab unmounts it, which stops a running session.
/// Entering the schedule tab loads the day's tasks.
pub async fn switch_tab(app: &App, tab: AppTab) -> Result<AppTab, ErrorResponse> {
    let previous = app.store.update(|state| {
        let previous = state.active_tab;
        (state.with_tab(tab), previous)
    });
    if previous == tab {
        return Ok(tab);
    }

    tracing::debug!("Switching from {:?} to {:?} tab", previous, tab);

    if previous == AppTab::Capture {
        if let Some(summary) = app.controller.unmount() {
            tracing::info!(
                "Capture tab closed, session stopped after {}s",
                summary.elapsed_seconds
            );
        }
    }
    if tab == AppTab::Schedule {
        app.schedule.load().await?;
    }

    Ok(tab)
}

pub async fn get_active_tab(app: &App) -> Result<AppTab, ErrorResponse> {
    Ok(app.store.read(|state| state.active_tab))
}
