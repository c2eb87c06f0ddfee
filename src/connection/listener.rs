//! Listener worker: owns the bound endpoint and accepts inbound links

use super::manager::{LinkState, Shared};
use crate::transport::{Transport, TransportListener};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Accept-loop worker. Cancellation aborts the task, which drops (and
/// thereby closes) the endpoint, unblocking a pending accept. A
/// cancelled listener never reports a failure.
pub(crate) struct ListenerWorker {
    task: JoinHandle<()>,
}

impl ListenerWorker {
    pub(crate) fn spawn<T: Transport>(shared: Arc<Shared<T>>, mut endpoint: T::Listener) -> Self {
        let task = tokio::spawn(async move {
            debug!("BEGIN listener worker");
            loop {
                // Promotion aborts this task too; the explicit check
                // just stops the loop from issuing one more accept.
                if shared.state() == LinkState::Connected {
                    break;
                }
                match endpoint.accept().await {
                    Ok(stream) => {
                        Shared::offer_inbound(&shared, stream).await;
                    }
                    Err(e) => {
                        // Endpoint closed or broken: normal termination
                        // of the loop, not a reportable failure.
                        debug!("Accept loop ended: {}", e);
                        break;
                    }
                }
            }
            debug!("END listener worker");
        });
        Self { task }
    }

    /// Fire-and-forget cancellation; never waits for the task to exit.
    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}
