//! Background idle reclamation.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::store::WindowCounterStore;

/// A periodic task that removes idle records from a [`WindowCounterStore`].
///
/// The task only holds a weak reference to the store and exits on its own
/// once the store is dropped. Dropping the handle aborts the task.
pub struct ReclaimTask {
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ReclaimTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReclaimTask")
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReclaimTask {
    /// Spawn a reclamation pass over `store` every `period`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(store: &Arc<WindowCounterStore>, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(Arc::downgrade(store), period, shutdown_rx));

        info!(period = ?period, "Started idle reclamation task");

        Self {
            shutdown: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(());
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
            info!("Stopped idle reclamation task");
        }
    }
}

impl Drop for ReclaimTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run(
    store: Weak<WindowCounterStore>,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else {
                    debug!("Window counter store dropped, ending reclamation");
                    break;
                };
                store.reclaim_idle();
            }
        }
    }
}
