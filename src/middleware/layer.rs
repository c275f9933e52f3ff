//! Tower layer wiring the window counter store into a service stack.

use std::sync::Arc;

use tower::Layer;
use tracing::{info, warn};

use super::service::RequestLimit;
use crate::ratelimit::{LimitConfig, ReclaimTask, WindowCounterStore};

/// Limiter state shared by every service produced from one layer.
pub(crate) struct Shared {
    pub(crate) store: Arc<WindowCounterStore>,
    reclaimer: Option<ReclaimTask>,
}

/// Applies per-client request limits to the services it wraps.
///
/// All services built from one layer (and its clones) share a single store,
/// so a client's budget is counted across them.
#[derive(Clone)]
pub struct RequestLimitLayer {
    shared: Arc<Shared>,
}

impl RequestLimitLayer {
    /// Create a layer with its own store.
    ///
    /// If `limits` enables background reclamation and a Tokio runtime is
    /// running, the reclamation task is started here and stops when the last
    /// clone of the layer and its services is dropped, or on
    /// [`RequestLimitLayer::shutdown`].
    pub fn new(limits: LimitConfig) -> Self {
        Self::with_store(Arc::new(WindowCounterStore::new(limits)))
    }

    /// Create a layer over an existing store.
    pub fn with_store(store: Arc<WindowCounterStore>) -> Self {
        let limits = *store.limits();

        let reclaimer = limits.reclaim_interval.and_then(|period| {
            if tokio::runtime::Handle::try_current().is_err() {
                warn!("No Tokio runtime available, idle reclamation disabled");
                return None;
            }
            Some(ReclaimTask::spawn(&store, period))
        });

        info!(
            max_requests = limits.max_requests,
            window = ?limits.window,
            reclaim = reclaimer.is_some(),
            "Request limiter initialized"
        );

        Self {
            shared: Arc::new(Shared { store, reclaimer }),
        }
    }

    /// Get the store backing this layer.
    pub fn store(&self) -> &Arc<WindowCounterStore> {
        &self.shared.store
    }

    /// Whether background reclamation is running.
    pub fn is_reclaiming(&self) -> bool {
        self.shared
            .reclaimer
            .as_ref()
            .is_some_and(ReclaimTask::is_running)
    }

    /// Stop background reclamation and wait for it to finish.
    ///
    /// Admission keeps working afterwards; idle records are then only
    /// removed by [`WindowCounterStore::reclaim_idle`].
    pub async fn shutdown(&self) {
        if let Some(reclaimer) = &self.shared.reclaimer {
            reclaimer.shutdown().await;
        }
    }
}

impl<S> Layer<S> for RequestLimitLayer {
    type Service = RequestLimit<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLimit::from_shared(inner, self.shared.clone())
    }
}
