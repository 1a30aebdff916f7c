//! ChronoVoice - continuous capture with rolling segment uploads.
//!
//! This is the main library crate. It wires the capture session, the
//! upload pipeline and the daily schedule around one shared app state.

pub mod app_state;
pub mod capture;
pub mod commands;
pub mod config;
pub mod recorder;
pub mod schedule;
pub mod upload;
pub mod utils;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_state::AppStore;
use capture::{MediaPlatform, SimulatedPlatform};
use config::AppConfig;
use recorder::SessionController;
use schedule::{MockTaskSource, TaskScheduleStore, TaskSource};
use upload::{MockUploadSink, UploadPipeline, UploadSink};
use utils::AppResult;

/// Composition root shared by every command
#[derive(Clone)]
pub struct App {
    pub config: AppConfig,
    pub store: AppStore,
    pub controller: SessionController,
    pub schedule: TaskScheduleStore,
    pub uploads: UploadPipeline,
}

impl App {
    /// Build the app. The configuration is validated first.
    pub fn new(
        config: AppConfig,
        platform: Arc<dyn MediaPlatform>,
        upload_sink: Arc<dyn UploadSink>,
        task_source: Arc<dyn TaskSource>,
    ) -> AppResult<Self> {
        config.validate()?;

        let store = AppStore::default();
        let uploads = UploadPipeline::new(upload_sink, store.clone());
        let controller = SessionController::new(
            platform,
            uploads.clone(),
            store.clone(),
            config.session_config(),
        )?;
        let schedule = TaskScheduleStore::new(
            task_source,
            store.clone(),
            config.completion_policy,
            config.active_hours,
        );

        Ok(Self {
            config,
            store,
            controller,
            schedule,
            uploads,
        })
    }

    /// App backed by the simulated platform and the mock remote services
    pub fn simulated(config: AppConfig) -> AppResult<(Self, Arc<SimulatedPlatform>)> {
        let platform = Arc::new(SimulatedPlatform::new());
        let upload_sink = Arc::new(MockUploadSink::new(config.upload.clone()));
        let task_source = Arc::new(MockTaskSource::new(Duration::from_millis(
            config.task_fetch_latency_ms,
        )));
        let app = Self::new(config, platform.clone(), upload_sink, task_source)?;
        Ok((app, platform))
    }
}

/// Install the global tracing subscriber
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chronovoice=debug,chronovoice_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run a short capture session against the simulated platform
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting ChronoVoice v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("failed to load configuration")?;
    let demo_duration = Duration::from_secs(config.demo_duration_secs);
    let (app, _platform) = App::simulated(config)?;

    let schedule = commands::schedule::load_schedule(&app).await?;
    tracing::info!(
        "Schedule: {} slot(s), {:.0}% complete",
        schedule.slots.len(),
        schedule.progress * 100.0
    );

    commands::recording::start_capture(&app, None).await?;

    tokio::time::sleep(demo_duration).await;

    if let Some(summary) = commands::recording::stop_capture(&app).await? {
        tracing::info!(
            "Session ended after {}s with {} segment(s)",
            summary.elapsed_seconds,
            summary.segments
        );
    }

    app.uploads.wait_idle().await;

    let view = commands::recording::get_capture_view(&app).await?;
    for entry in &view.history {
        tracing::info!(
            "{} {} {} bytes [{}]",
            entry.captured_at,
            entry.duration,
            entry.size_bytes,
            entry.badge
        );
    }

    Ok(())
}
