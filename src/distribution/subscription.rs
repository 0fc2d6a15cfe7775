//! Live views of the distribution queue.
//!
//! Every change notification triggers a full re-read of the queue; nothing
//! is patched incrementally, so a view never drifts from the table.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::model::Project;
use crate::storage::{ChangeFeed, ProjectStore};
use crate::telemetry::metrics;

/// Handle to a running queue subscription. Dropping it stops the refreshes.
pub struct QueueSubscription {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl QueueSubscription {
    /// Stop refreshing and wait for the refresh task to exit.
    pub async fn unsubscribe(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// False once the change feed has ended or the task stopped.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for QueueSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Re-read the queue on every change and hand it to `callback`.
///
/// Refresh failures are logged and counted; the subscription keeps
/// listening so the next change gets another chance.
pub(crate) fn spawn_refresh_loop<S, F>(
    store: Arc<S>,
    mut feed: ChangeFeed,
    mut callback: F,
) -> QueueSubscription
where
    S: ProjectStore + 'static,
    F: FnMut(Vec<Project>) + Send + 'static,
{
    let shutdown = Arc::new(Notify::new());
    let stop = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.notified() => {
                    debug!("queue subscription closed");
                    return;
                }
                change = feed.next() => {
                    if change.is_none() {
                        warn!("change feed ended, queue subscription stopping");
                        return;
                    }
                    match store.queued_projects().await {
                        Ok(queue) => {
                            metrics::queue_refreshes().add(1, &[KeyValue::new("result", "ok")]);
                            debug!(queued = queue.len(), "queue refreshed");
                            callback(queue);
                        }
                        Err(e) => {
                            metrics::queue_refreshes().add(1, &[KeyValue::new("result", "error")]);
                            error!("queue refresh failed: {e}");
                        }
                    }
                }
            }
        }
    });

    QueueSubscription {
        shutdown,
        handle: Some(handle),
    }
}

/// Observable queue snapshot: the latest queue plus change notification.
pub struct QueueWatch {
    receiver: watch::Receiver<Vec<Project>>,
    subscription: QueueSubscription,
}

impl QueueWatch {
    pub(crate) fn new(
        receiver: watch::Receiver<Vec<Project>>,
        subscription: QueueSubscription,
    ) -> Self {
        Self {
            receiver,
            subscription,
        }
    }

    /// The most recent queue snapshot.
    pub fn current(&self) -> Vec<Project> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next refresh. False once the subscription is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    pub async fn close(self) {
        self.subscription.unsubscribe().await;
    }
}
