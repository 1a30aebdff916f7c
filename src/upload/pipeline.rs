//! Upload pipeline
//!
//! Registers finalized segments in the recording history and pushes them
//! to the remote sink. Failures are recorded on the segment and never
//! retried; nothing here blocks the capture session.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::sink::UploadSink;
use crate::app_state::AppStore;
use crate::recorder::{Segment, UploadStatus};

/// Decrements the in-flight count when an upload ends, however it ends
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl InFlightGuard {
    fn new(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Hands segments to the remote sink and tracks their status
#[derive(Clone)]
pub struct UploadPipeline {
    sink: Arc<dyn UploadSink>,
    store: AppStore,
    in_flight: Arc<watch::Sender<usize>>,
}

impl UploadPipeline {
    pub fn new(sink: Arc<dyn UploadSink>, store: AppStore) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            sink,
            store,
            in_flight: Arc::new(in_flight),
        }
    }

    /// Upload a segment and wait for its terminal status
    pub async fn submit(&self, segment: Segment) -> UploadStatus {
        let guard = InFlightGuard::new(self.in_flight.clone());
        self.register(&segment);
        let status = self.upload(segment).await;
        drop(guard);
        status
    }

    /// Register the segment now and upload it in the background.
    ///
    /// Returns `None` when no runtime is available; the segment then stays
    /// in history as queued.
    pub fn dispatch(&self, segment: Segment) -> Option<JoinHandle<UploadStatus>> {
        self.register(&segment);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime available, segment {} left queued", segment.id);
            return None;
        };

        let guard = InFlightGuard::new(self.in_flight.clone());
        let pipeline = self.clone();
        Some(runtime.spawn(async move {
            let status = pipeline.upload(segment).await;
            drop(guard);
            status
        }))
    }

    /// Uploads started and not yet finished
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until every started upload has finished
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn register(&self, segment: &Segment) {
        let mut queued = segment.clone();
        queued.upload_status = UploadStatus::Queued;
        self.store.apply(|state| state.with_recording(queued));
    }

    async fn upload(&self, segment: Segment) -> UploadStatus {
        let id = segment.id;
        self.set_status(id, UploadStatus::Uploading);

        tracing::info!(
            "Uploading segment {} ({}, {} bytes)",
            id,
            segment.mime_type,
            segment.size_bytes
        );

        let status = match self.sink.upload(&segment.payload, &segment.mime_type).await {
            Ok(()) => {
                tracing::info!("Segment {} uploaded", id);
                UploadStatus::Uploaded
            }
            Err(e) => {
                tracing::error!("Upload failed for segment {}: {}", id, e);
                UploadStatus::Failed
            }
        };

        self.set_status(id, status);
        status
    }

    fn set_status(&self, id: Uuid, status: UploadStatus) {
        self.store.apply(|state| state.with_recording_status(id, status));
    }
}
