//! Recording commands

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capture::CaptureKind;
use crate::recorder::{Segment, SessionState, SessionSummary, UploadStatus};
use crate::utils::ErrorResponse;
use crate::App;

/// Elapsed-time display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElapsedView {
    pub seconds: u64,
    pub formatted: String,
}

/// One row of the recording history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    /// Local wall-clock time the segment started
    pub time_label: String,
    /// Segment length as MM:SS
    pub duration: String,
    pub size_bytes: usize,
    pub mime_type: String,
    pub status: UploadStatus,
    pub badge: String,
}

impl From<&Segment> for HistoryEntry {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id,
            captured_at: segment.captured_at,
            time_label: segment
                .captured_at
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            duration: format_time(segment.duration_seconds),
            size_bytes: segment.size_bytes,
            mime_type: segment.mime_type.clone(),
            status: segment.upload_status,
            badge: segment.upload_status.badge().to_string(),
        }
    }
}

/// Everything the capture tab renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureView {
    pub is_recording: bool,
    pub state: SessionState,
    pub elapsed: String,
    pub notice: Option<String>,
    pub history: Vec<HistoryEntry>,
}

/// Format seconds as zero-padded MM:SS. Minutes are not wrapped at 60.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Start capturing. `kind` falls back to the configured capture kind.
pub async fn start_capture(
    app: &App,
    kind: Option<CaptureKind>,
) -> Result<SessionState, ErrorResponse> {
    let kind = kind.unwrap_or(app.config.capture_kind);
    app.controller.start(kind).await?;
    Ok(app.controller.state())
}

/// Stop capturing. Returns `None` when nothing was running.
pub async fn stop_capture(app: &App) -> Result<Option<SessionSummary>, ErrorResponse> {
    Ok(app.controller.stop())
}

pub async fn get_capture_state(app: &App) -> Result<SessionState, ErrorResponse> {
    Ok(app.controller.state())
}

pub async fn get_elapsed(app: &App) -> Result<ElapsedView, ErrorResponse> {
    let seconds = app.controller.elapsed_seconds();
    Ok(ElapsedView {
        seconds,
        formatted: format_time(seconds),
    })
}

pub async fn get_capture_view(app: &App) -> Result<CaptureView, ErrorResponse> {
    let state = app.controller.state();
    let (notice, history): (Option<String>, Vec<HistoryEntry>) = app.store.read(|s| {
        (
            s.notice.clone(),
            s.recordings.iter().map(HistoryEntry::from).collect(),
        )
    });

    Ok(CaptureView {
        is_recording: state == SessionState::Active,
        state,
        elapsed: format_time(app.controller.elapsed_seconds()),
        notice,
        history,
    })
}

/// Clear the blocking notice
pub async fn dismiss_notice(app: &App) -> Result<(), ErrorResponse> {
    app.store.apply(|state| state.with_notice(None));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Grant;
    use crate::config::AppConfig;
    use crate::recorder::START_FAILED_NOTICE;
    use std::time::Duration;

    fn app() -> (App, std::sync::Arc<crate::capture::SimulatedPlatform>) {
        let mut config = AppConfig::default();
        config.upload.failure_rate = 0.0;
        App::simulated(config).unwrap()
    }

    #[test]
    fn format_time_pads_and_does_not_wrap() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(2700), "45:00");
        assert_eq!(format_time(5999), "99:59");
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_stop_fills_history() {
        let (app, _) = app();

        let state = start_capture(&app, None).await.unwrap();
        assert_eq!(state, SessionState::Active);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let elapsed = get_elapsed(&app).await.unwrap();
        assert_eq!(elapsed.formatted, "00:03");

        let summary = stop_capture(&app).await.unwrap().unwrap();
        assert_eq!(summary.segments, 1);

        let view = get_capture_view(&app).await.unwrap();
        assert!(!view.is_recording);
        assert_eq!(view.elapsed, "00:03");
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].badge, "Queued");

        app.uploads.wait_idle().await;
        let view = get_capture_view(&app).await.unwrap();
        assert_eq!(view.history[0].badge, "Sent");
        assert_eq!(view.history[0].mime_type, "video/webm;codecs=vp8,opus");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_returns_none() {
        let (app, _) = app();
        assert!(stop_capture(&app).await.unwrap().is_none());
        assert_eq!(get_capture_state(&app).await.unwrap(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_surfaces_code_and_notice() {
        let (app, platform) = app();
        platform.set_audio_grant(Grant::Deny);

        let err = start_capture(&app, Some(CaptureKind::AudioOnly))
            .await
            .unwrap_err();
        assert_eq!(err.code, "PERMISSION_DENIED");

        let view = get_capture_view(&app).await.unwrap();
        assert_eq!(view.state, SessionState::Idle);
        assert_eq!(view.notice.as_deref(), Some(START_FAILED_NOTICE));

        dismiss_notice(&app).await.unwrap();
        assert!(get_capture_view(&app).await.unwrap().notice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let (app, _) = app();
        start_capture(&app, None).await.unwrap();

        let err = start_capture(&app, None).await.unwrap_err();
        assert_eq!(err.code, "SESSION_ERROR");

        stop_capture(&app).await.unwrap();
    }
}
