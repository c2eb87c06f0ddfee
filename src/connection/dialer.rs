//! Dialer worker: one outbound connect attempt to a known peer

use super::manager::{LinkEvent, Shared};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Single-attempt dial worker. Success hands the stream to the arbiter;
/// failure reports `ConnectionFailed` and falls back to listening. The
/// same peer is never redialed automatically. Cancellation aborts the
/// task, dropping any partially-opened handle without a failure report.
pub(crate) struct DialerWorker {
    task: JoinHandle<()>,
}

impl DialerWorker {
    pub(crate) fn spawn<T: Transport>(shared: Arc<Shared<T>>, peer: T::PeerAddr) -> Self {
        let task = tokio::spawn(async move {
            debug!("BEGIN dialer worker ({:?})", peer);
            match shared.transport.dial(&peer).await {
                Ok(stream) => {
                    // Unconditional: a dialed stream supersedes whatever
                    // role currently holds the link.
                    Shared::promote(&shared, stream).await;
                }
                Err(e) => {
                    warn!("{}", e);
                    let _ = shared
                        .event_tx
                        .send(LinkEvent::ConnectionFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    Shared::fall_back_from_dialer(&shared).await;
                }
            }
            debug!("END dialer worker");
        });
        Self { task }
    }

    /// Fire-and-forget cancellation; never waits for the task to exit.
    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}
