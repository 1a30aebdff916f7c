//! Session cycle controller
//!
//! Owns the capture lifecycle: acquire a stream, record it into segments,
//! rotate the segment sink on a fixed period and tear everything down on
//! stop, track loss or unmount.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::segment::Segment;
use super::sink::{FinalizedPayload, SegmentRecorder, SegmentSink};
use super::state::{SessionConfig, SessionState, SessionSummary, StopReason};
use super::SessionError;
use crate::app_state::AppStore;
use crate::capture::{CaptureKind, MediaPlatform, MediaSourceAcquirer, MediaStream, MediaTrack};
use crate::upload::UploadPipeline;

/// Shown when a session cannot be started
pub const START_FAILED_NOTICE: &str =
    "Could not start recording. Please ensure microphone and screen permissions are granted.";

/// Shown when a running session had to be stopped by the controller
pub const SESSION_LOST_NOTICE: &str = "Recording stopped: the capture stream is no longer available.";

/// Events emitted during a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session became active
    Started { kind: CaptureKind, stream_id: Uuid },
    /// The elapsed-time display advanced
    Tick { elapsed_seconds: u64 },
    /// A rotation closed the current segment
    Rotated { rotation: usize },
    /// A segment was handed to the upload pipeline
    SegmentFinalized { id: Uuid, size_bytes: usize },
    /// A sink finalized with no data
    SegmentDiscarded,
    /// Session returned to Idle
    Stopped(SessionSummary),
    /// User-facing notice
    Notice(String),
}

enum Phase {
    Idle,
    Acquiring { generation: u64, cancelled: bool },
    Active(ActiveSession),
}

struct ActiveSession {
    generation: u64,
    kind: CaptureKind,
    stream: MediaStream,
    sink: Option<SegmentSink>,
    started_at: DateTime<Utc>,
    anchor: Instant,
    cancel: CancellationToken,
    ticker: Option<JoinHandle<()>>,
    rotation: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
    segments: usize,
    rotations: usize,
}

impl ActiveSession {
    /// Stop the current sink and turn its payload into a segment
    fn close_sink(&mut self) -> Option<Option<Segment>> {
        let mut sink = self.sink.take()?;
        let payload = sink.stop();
        let segment = payload.map(|payload| self.build_segment(&sink, payload));
        if segment.is_some() {
            self.segments += 1;
        }
        Some(segment)
    }

    fn build_segment(&self, sink: &SegmentSink, payload: FinalizedPayload) -> Segment {
        let offset = sink.opened_at().saturating_duration_since(self.anchor);
        let captured_at = self.started_at
            + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero());
        Segment::new(payload, captured_at, sink.opened_at().elapsed())
    }

    fn abort_tasks(&mut self) {
        self.cancel.cancel();
        for handle in [self.ticker.take(), self.rotation.take(), self.watcher.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

struct ControllerInner {
    acquirer: MediaSourceAcquirer,
    recorder: SegmentRecorder,
    uploads: UploadPipeline,
    store: AppStore,
    config: SessionConfig,
    phase: Mutex<Phase>,
    elapsed: watch::Sender<u64>,
    generation: AtomicU64,
    event_tx: broadcast::Sender<SessionEvent>,
}

/// Manages the capture session state machine
///
/// Cheap to clone; all clones drive the same session. Dropping the last
/// clone tears down an active session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    /// Create a new session controller. Zero timer periods are rejected.
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        uploads: UploadPipeline,
        store: AppStore,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(256);
        Ok(Self {
            inner: Arc::new(ControllerInner {
                acquirer: MediaSourceAcquirer::new(platform.clone()),
                recorder: SegmentRecorder::new(platform, config.mime_preferences.clone()),
                uploads,
                store,
                config,
                phase: Mutex::new(Phase::Idle),
                elapsed: watch::channel(0).0,
                generation: AtomicU64::new(0),
                event_tx,
            }),
        })
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        match &*self.inner.phase.lock() {
            Phase::Idle => SessionState::Idle,
            Phase::Acquiring { .. } => SessionState::Acquiring,
            Phase::Active(_) => SessionState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Seconds shown by the elapsed-time display. Keeps its last value
    /// after a stop until the next start.
    pub fn elapsed_seconds(&self) -> u64 {
        *self.inner.elapsed.borrow()
    }

    /// Follow the elapsed-time display
    pub fn watch_elapsed(&self) -> watch::Receiver<u64> {
        self.inner.elapsed.subscribe()
    }

    /// Number of session timers (elapsed ticker, rotation) still scheduled
    pub fn active_timer_count(&self) -> usize {
        match &*self.inner.phase.lock() {
            Phase::Active(session) => [&session.ticker, &session.rotation]
                .into_iter()
                .flatten()
                .filter(|handle| !handle.is_finished())
                .count(),
            _ => 0,
        }
    }

    /// The stream being captured, if any
    pub fn current_stream(&self) -> Option<MediaStream> {
        match &*self.inner.phase.lock() {
            Phase::Active(session) => Some(session.stream.clone()),
            _ => None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Start a capture session
    pub async fn start(&self, kind: CaptureKind) -> Result<(), SessionError> {
        let generation = {
            let mut phase = self.inner.phase.lock();
            if !matches!(*phase, Phase::Idle) {
                return Err(SessionError::AlreadyActive);
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *phase = Phase::Acquiring {
                generation,
                cancelled: false,
            };
            generation
        };

        tracing::info!("Starting capture session #{} ({:?})", generation, kind);

        let acquisition = match self.inner.acquirer.acquire(kind).await {
            Ok(acquisition) => acquisition,
            Err(e) => {
                let cancelled = {
                    let mut phase = self.inner.phase.lock();
                    let cancelled = matches!(*phase, Phase::Acquiring { cancelled: true, .. });
                    *phase = Phase::Idle;
                    cancelled
                };
                if cancelled {
                    tracing::info!(
                        "Capture session #{} cancelled during acquisition ({})",
                        generation,
                        e
                    );
                    return Err(SessionError::Cancelled);
                }
                tracing::error!("Error accessing media devices: {}", e);
                self.inner.notify(START_FAILED_NOTICE);
                return Err(e.into());
            }
        };

        let mut phase = self.inner.phase.lock();
        if !matches!(*phase, Phase::Acquiring { generation: g, cancelled: false } if g == generation) {
            *phase = Phase::Idle;
            drop(phase);
            tracing::info!("Capture session #{} cancelled during acquisition", generation);
            acquisition.stream.stop_all();
            return Err(SessionError::Cancelled);
        }

        let sink = match self.inner.recorder.open(&acquisition.stream, kind) {
            Ok(sink) => sink,
            Err(e) => {
                *phase = Phase::Idle;
                drop(phase);
                tracing::error!("Failed to open recorder: {}", e);
                acquisition.stream.stop_all();
                self.inner.notify(START_FAILED_NOTICE);
                return Err(e.into());
            }
        };

        let cancel = CancellationToken::new();
        let weak = Arc::downgrade(&self.inner);
        let config = &self.inner.config;
        self.inner.elapsed.send_replace(0);

        let ticker = spawn_ticker(weak.clone(), generation, cancel.clone(), config.tick_interval);
        let rotation = spawn_rotation(
            weak.clone(),
            generation,
            cancel.clone(),
            config.rotation_interval,
            config.restart_delay,
        );
        let watcher = acquisition
            .termination_track
            .map(|track| spawn_watcher(weak, generation, cancel.clone(), track));

        let stream_id = acquisition.stream.id();
        *phase = Phase::Active(ActiveSession {
            generation,
            kind,
            stream: acquisition.stream,
            sink: Some(sink),
            started_at: Utc::now(),
            anchor: Instant::now(),
            cancel,
            ticker: Some(ticker),
            rotation: Some(rotation),
            watcher,
            segments: 0,
            rotations: 0,
        });
        drop(phase);

        let _ = self.inner.event_tx.send(SessionEvent::Started { kind, stream_id });
        tracing::info!("Capture session #{} active", generation);
        Ok(())
    }

    /// Stop the session. A no-op when Idle.
    pub fn stop(&self) -> Option<SessionSummary> {
        self.inner.teardown(None, StopReason::UserStop)
    }

    /// Tear down on view unmount
    pub fn unmount(&self) -> Option<SessionSummary> {
        self.inner.teardown(None, StopReason::Unmount)
    }
}

impl ControllerInner {
    fn notify(&self, message: &str) {
        self.store.apply(|state| state.with_notice(Some(message.to_string())));
        let _ = self.event_tx.send(SessionEvent::Notice(message.to_string()));
    }

    fn hand_off(&self, segment: Option<Segment>) {
        match segment {
            Some(segment) => {
                let _ = self.event_tx.send(SessionEvent::SegmentFinalized {
                    id: segment.id,
                    size_bytes: segment.size_bytes,
                });
                self.uploads.dispatch(segment);
            }
            None => {
                let _ = self.event_tx.send(SessionEvent::SegmentDiscarded);
            }
        }
    }

    fn on_tick(&self, generation: u64) -> bool {
        let elapsed_seconds = {
            let phase = self.phase.lock();
            match &*phase {
                Phase::Active(session) if session.generation == generation => {
                    self.elapsed.send_modify(|elapsed| *elapsed += 1);
                    *self.elapsed.borrow()
                }
                _ => return false,
            }
        };
        let _ = self.event_tx.send(SessionEvent::Tick { elapsed_seconds });
        true
    }

    /// First half of a rotation: close the current sink.
    ///
    /// Returns false once the session this rotation belongs to is gone.
    fn rotate_close(&self, generation: u64) -> bool {
        let (closed, rotation) = {
            let mut phase = self.phase.lock();
            let Phase::Active(session) = &mut *phase else {
                return false;
            };
            if session.generation != generation {
                return false;
            }
            let closed = session.close_sink();
            if closed.is_some() {
                session.rotations += 1;
            }
            (closed, session.rotations)
        };

        if let Some(segment) = closed {
            tracing::info!("Rotating capture segment (rotation {})", rotation);
            let _ = self.event_tx.send(SessionEvent::Rotated { rotation });
            self.hand_off(segment);
        }
        true
    }

    /// Second half of a rotation: open the next sink on the same stream
    fn rotate_open(&self, generation: u64) {
        let failure = {
            let mut phase = self.phase.lock();
            let Phase::Active(session) = &mut *phase else {
                return;
            };
            if session.generation != generation || session.sink.is_some() {
                return;
            }

            if !session.stream.active() {
                tracing::warn!("Stream is inactive during restart");
                Some(StopReason::StreamInactive)
            } else {
                match self.recorder.open(&session.stream, session.kind) {
                    Ok(sink) => {
                        session.sink = Some(sink);
                        None
                    }
                    Err(e) => {
                        tracing::error!("Failed to reopen recorder: {}", e);
                        Some(StopReason::RecorderFailure)
                    }
                }
            }
        };

        if let Some(reason) = failure {
            self.teardown(Some(generation), reason);
            self.notify(SESSION_LOST_NOTICE);
        }
    }

    /// Move to Idle, releasing timers, sink and stream.
    ///
    /// With `only_generation` set, a newer session is left untouched.
    fn teardown(&self, only_generation: Option<u64>, reason: StopReason) -> Option<SessionSummary> {
        let mut session = {
            let mut phase = self.phase.lock();
            match &mut *phase {
                Phase::Idle => return None,
                Phase::Acquiring { generation, cancelled } => {
                    if only_generation.map_or(true, |g| g == *generation) {
                        *cancelled = true;
                    }
                    return None;
                }
                Phase::Active(session) => {
                    if only_generation.is_some_and(|g| g != session.generation) {
                        return None;
                    }
                }
            }
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Active(session) => session,
                _ => return None,
            }
        };

        tracing::info!("Stopping capture session #{} ({:?})", session.generation, reason);

        session.abort_tasks();
        let last = session.close_sink();
        session.stream.stop_all();

        let summary = SessionSummary {
            kind: session.kind,
            elapsed_seconds: *self.elapsed.borrow(),
            segments: session.segments,
            rotations: session.rotations,
            reason,
        };

        if let Some(segment) = last {
            self.hand_off(segment);
        }
        let _ = self.event_tx.send(SessionEvent::Stopped(summary.clone()));

        tracing::info!(
            "Capture stopped after {}s, {} segment(s)",
            summary.elapsed_seconds,
            summary.segments
        );
        Some(summary)
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.teardown(None, StopReason::Unmount);
    }
}

fn spawn_ticker(
    inner: Weak<ControllerInner>,
    generation: u64,
    cancel: CancellationToken,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match inner.upgrade() {
                Some(inner) if inner.on_tick(generation) => {}
                _ => break,
            }
        }
    })
}

fn spawn_rotation(
    inner: Weak<ControllerInner>,
    generation: u64,
    cancel: CancellationToken,
    period: Duration,
    restart_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match inner.upgrade() {
                Some(inner) if inner.rotate_close(generation) => {}
                _ => break,
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(restart_delay) => {}
            }
            let Some(inner) = inner.upgrade() else { break };
            inner.rotate_open(generation);
        }
    })
}

fn spawn_watcher(
    inner: Weak<ControllerInner>,
    generation: u64,
    cancel: CancellationToken,
    track: MediaTrack,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = track.ended() => {
                tracing::info!("Display track {} ended by the platform", track.id());
                if let Some(inner) = inner.upgrade() {
                    inner.teardown(Some(generation), StopReason::TrackEnded);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::capture::{Grant, SimulatedPlatform};
    use crate::recorder::UploadStatus;
    use crate::upload::{UploadError, UploadSink};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::HashSet;

    /// Upload sink that fails the calls whose 1-based index is listed
    struct ScriptedSink {
        failing_calls: HashSet<usize>,
        calls: SyncMutex<usize>,
    }

    impl ScriptedSink {
        fn new(failing_calls: &[usize]) -> Self {
            Self {
                failing_calls: failing_calls.iter().copied().collect(),
                calls: SyncMutex::new(0),
            }
        }
    }

    #[async_trait]
    impl UploadSink for ScriptedSink {
        async fn upload(&self, _payload: &[u8], _mime_type: &str) -> Result<(), UploadError> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            time::sleep(Duration::from_millis(1500)).await;
            if self.failing_calls.contains(&call) {
                Err(UploadError::Network("Network Error".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        platform: Arc<SimulatedPlatform>,
        store: AppStore,
        uploads: UploadPipeline,
        controller: SessionController,
    }

    fn harness(failing_calls: &[usize]) -> Harness {
        let platform = Arc::new(SimulatedPlatform::new());
        let store = AppStore::new(AppState::default());
        let uploads = UploadPipeline::new(Arc::new(ScriptedSink::new(failing_calls)), store.clone());
        let controller = SessionController::new(
            platform.clone(),
            uploads.clone(),
            store.clone(),
            SessionConfig::default(),
        )
        .unwrap();
        Harness {
            platform,
            store,
            uploads,
            controller,
        }
    }

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    /// Collect events on a separate task so ticks never lag the receiver
    fn record_events(controller: &SessionController) -> Arc<SyncMutex<Vec<SessionEvent>>> {
        let mut rx = controller.subscribe();
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let sink = seen.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => sink.lock().push(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn forty_five_minutes_yields_three_ordered_segments() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap();

        time::sleep(minutes(45) + Duration::from_millis(500)).await;
        let summary = h.controller.stop().unwrap();
        h.uploads.wait_idle().await;

        assert_eq!(summary.rotations, 2);
        assert_eq!(summary.segments, 3);
        assert_eq!(summary.elapsed_seconds, 45 * 60);

        let mut recordings = h.store.snapshot().recordings;
        assert_eq!(recordings.len(), 3);
        recordings.reverse();
        for pair in recordings.windows(2) {
            assert!(pair[0].captured_at < pair[1].captured_at);
            assert!(pair[0].ended_at() <= pair[1].captured_at);
        }
        assert!(recordings.iter().all(|r| r.upload_status == UploadStatus::Uploaded));
        assert_eq!(recordings[0].duration_seconds, 20 * 60);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_keeps_the_same_stream() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap();
        let before = h.controller.current_stream().unwrap();

        time::sleep(minutes(21)).await;

        let after = h.controller.current_stream().unwrap();
        assert!(before.same_as(&after));
        assert_eq!(h.platform.audio_requests(), 1);
        assert_eq!(h.platform.display_requests(), 1);
        assert_eq!(h.platform.recorders_created(), 2);
        h.controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_timers_and_releases_stream() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        assert_eq!(h.controller.active_timer_count(), 2);
        let stream = h.controller.current_stream().unwrap();

        time::sleep(Duration::from_secs(3)).await;
        h.controller.stop().unwrap();

        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.controller.active_timer_count(), 0);
        assert!(!stream.active());

        // Idle stop is a no-op
        assert!(h.controller.stop().is_none());
        assert!(h.controller.unmount().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_display_survives_stop_and_resets_on_start() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        time::sleep(Duration::from_millis(4500)).await;
        h.controller.stop();
        assert_eq!(h.controller.elapsed_seconds(), 4);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.controller.elapsed_seconds(), 4);

        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        assert_eq!(h.controller.elapsed_seconds(), 0);
        h.controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_segments_produce_no_history() {
        let h = harness(&[]);
        h.platform.set_chunk_size(0);
        let events = record_events(&h.controller);

        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        time::sleep(minutes(25)).await;
        let summary = h.controller.stop().unwrap();
        h.uploads.wait_idle().await;
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(summary.segments, 0);
        assert_eq!(summary.rotations, 1);
        assert!(h.store.snapshot().recordings.is_empty());

        let discarded = events
            .lock()
            .iter()
            .filter(|event| matches!(event, SessionEvent::SegmentDiscarded))
            .count();
        assert_eq!(discarded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_does_not_wedge_rotation() {
        let h = harness(&[1]);
        h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap();

        time::sleep(minutes(20) + Duration::from_secs(5)).await;
        {
            let state = h.store.snapshot();
            assert_eq!(state.recordings.len(), 1);
            assert_eq!(state.recordings[0].upload_status, UploadStatus::Failed);
        }

        time::sleep(minutes(20)).await;
        assert!(h.controller.is_active());
        h.controller.stop();
        h.uploads.wait_idle().await;

        let statuses: Vec<UploadStatus> = h
            .store
            .snapshot()
            .recordings
            .iter()
            .rev()
            .map(|r| r.upload_status)
            .collect();
        assert_eq!(
            statuses,
            vec![UploadStatus::Failed, UploadStatus::Uploaded, UploadStatus::Uploaded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_failure_returns_to_idle_with_notice() {
        let h = harness(&[]);
        h.platform.set_display_grant(Grant::Deny);

        let err = h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap_err();

        assert!(matches!(err, SessionError::Capture(_)));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.controller.active_timer_count(), 0);
        assert_eq!(h.store.snapshot().notice.as_deref(), Some(START_FAILED_NOTICE));

        h.platform.set_display_grant(Grant::Allow);
        h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap();
        assert!(h.controller.is_active());
        h.controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn revoked_display_forces_stop_with_final_segment() {
        let h = harness(&[]);
        let mut events = h.controller.subscribe();
        h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap();
        let stream = h.controller.current_stream().unwrap();

        time::sleep(Duration::from_secs(30)).await;
        h.platform.revoke_display();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.controller.active_timer_count(), 0);
        assert!(!stream.active());
        assert_eq!(h.store.snapshot().recordings.len(), 1);

        let mut reason = None;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Stopped(summary) = event {
                reason = Some(summary.reason);
            }
        }
        assert_eq!(reason, Some(StopReason::TrackEnded));
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_while_active() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioOnly).await.unwrap();

        let err = h.controller.start(CaptureKind::AudioOnly).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyActive));
        assert_eq!(h.platform.audio_requests(), 1);
        h.controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_acquisition_cancels_the_start() {
        let platform = Arc::new(SimulatedPlatform::new().with_prompt_delay(Duration::from_secs(2)));
        let store = AppStore::new(AppState::default());
        let uploads = UploadPipeline::new(Arc::new(ScriptedSink::new(&[])), store.clone());
        let controller =
            SessionController::new(platform.clone(), uploads, store, SessionConfig::default())
                .unwrap();

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start(CaptureKind::AudioOnly).await })
        };
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.state(), SessionState::Acquiring);
        assert!(controller.stop().is_none());

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(platform.issued_tracks().iter().all(|t| !t.is_live()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_restart_yield_does_not_reopen() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioOnly).await.unwrap();

        time::sleep(minutes(20) + Duration::from_millis(50)).await;
        let summary = h.controller.stop().unwrap();
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(summary.rotations, 1);
        assert_eq!(summary.segments, 1);
        assert_eq!(h.platform.recorders_created(), 1);
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_stream_at_reopen_stops_the_session() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        let stream = h.controller.current_stream().unwrap();

        time::sleep(minutes(20) + Duration::from_millis(10)).await;
        stream.stop_all();
        time::sleep(Duration::from_millis(200)).await;

        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.store.snapshot().notice.as_deref(), Some(SESSION_LOST_NOTICE));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_controller_releases_the_stream() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        let stream = h.controller.current_stream().unwrap();

        drop(h.controller);

        assert!(!stream.active());
        assert_eq!(h.store.snapshot().recordings.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_tick_is_broadcast() {
        let h = harness(&[]);
        let events = record_events(&h.controller);

        h.controller.start(CaptureKind::AudioOnly).await.unwrap();
        time::sleep(Duration::from_millis(5500)).await;
        h.controller.stop();
        time::sleep(Duration::from_millis(1)).await;

        let ticks: Vec<u64> = events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Tick { elapsed_seconds } => Some(*elapsed_seconds),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![1, 2, 3, 4, 5]);

        // No ticks once Idle
        time::sleep(Duration::from_secs(3)).await;
        let after = events
            .lock()
            .iter()
            .filter(|event| matches!(event, SessionEvent::Tick { .. }))
            .count();
        assert_eq!(after, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_forces_stop_of_an_active_session() {
        let h = harness(&[]);
        h.controller.start(CaptureKind::AudioPlusDisplay).await.unwrap();
        let stream = h.controller.current_stream().unwrap();

        time::sleep(Duration::from_millis(7400)).await;
        let summary = h.controller.unmount().unwrap();

        assert_eq!(summary.reason, StopReason::Unmount);
        assert_eq!(summary.segments, 1);
        assert_eq!(summary.elapsed_seconds, 7);
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.controller.active_timer_count(), 0);
        assert!(!stream.active());

        let recordings = h.store.snapshot().recordings;
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].duration_seconds, 7);
        assert!(h.store.snapshot().notice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_acquisition_after_cancel_shows_no_notice() {
        let platform = Arc::new(SimulatedPlatform::new().with_prompt_delay(Duration::from_secs(2)));
        platform.set_audio_grant(Grant::Deny);
        let store = AppStore::new(AppState::default());
        let uploads = UploadPipeline::new(Arc::new(ScriptedSink::new(&[])), store.clone());
        let controller =
            SessionController::new(platform, uploads, store.clone(), SessionConfig::default())
                .unwrap();

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start(CaptureKind::AudioOnly).await })
        };
        time::sleep(Duration::from_secs(1)).await;
        assert!(controller.stop().is_none());

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(store.snapshot().notice.is_none());
    }

    #[test]
    fn zero_timer_periods_are_rejected() {
        let store = AppStore::new(AppState::default());
        let uploads = UploadPipeline::new(Arc::new(ScriptedSink::new(&[])), store.clone());

        for config in [
            SessionConfig {
                tick_interval: Duration::ZERO,
                ..SessionConfig::default()
            },
            SessionConfig {
                rotation_interval: Duration::ZERO,
                ..SessionConfig::default()
            },
        ] {
            let result = SessionController::new(
                Arc::new(SimulatedPlatform::new()),
                uploads.clone(),
                store.clone(),
                config,
            );
            assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
        }
    }
}
