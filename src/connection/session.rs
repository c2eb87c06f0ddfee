//! Session worker: the single live bidirectional stream

use super::manager::{LinkEvent, Shared};
use crate::error::LinkError;
use crate::transport::{Transport, TransportStream};
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outbound write path of the live session. Cloneable so writes can
/// proceed after the arbiter lock is released; the internal lock
/// serializes concurrent senders so bytes never interleave.
pub(crate) struct SessionHandle<S> {
    writer: Arc<Mutex<WriteHalf<S>>>,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
        }
    }
}

impl<S: TransportStream> SessionHandle<S> {
    /// Write one chunk to the stream. A failure is reported to the
    /// caller but does not tear the session down; only the read loop
    /// changes state.
    pub(crate) async fn write(&self, bytes: Bytes) -> Result<(), LinkError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await.map_err(LinkError::Write)?;
        Ok(())
    }
}

/// Read-loop worker around one established stream. Emits `Connected`
/// once on startup, `Received` per chunk, and `ConnectionLost` exactly
/// once when the stream breaks, before falling back to listening.
/// Cancellation aborts the task, dropping both halves of the stream.
pub(crate) struct SessionWorker<S> {
    handle: SessionHandle<S>,
    task: JoinHandle<()>,
}

impl<S: TransportStream> SessionWorker<S> {
    pub(crate) fn spawn<T: Transport<Stream = S>>(shared: Arc<Shared<T>>, stream: S) -> Self {
        let peer = stream.peer_addr();
        let (mut reader, writer) = tokio::io::split(stream);
        let handle = SessionHandle {
            writer: Arc::new(Mutex::new(writer)),
        };

        let task = tokio::spawn(async move {
            debug!("BEGIN session worker (peer {:?})", peer);
            let _ = shared.event_tx.send(LinkEvent::Connected { peer }).await;

            let mut buf = vec![0u8; shared.config.read_buffer_size];
            let reason = loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break "peer closed the stream".to_string(),
                    Ok(n) => {
                        let chunk = Bytes::copy_from_slice(&buf[..n]);
                        let _ = shared.event_tx.send(LinkEvent::Received(chunk)).await;
                    }
                    Err(e) => break LinkError::Read(e).to_string(),
                }
            };

            warn!("Session lost: {}", reason);
            let _ = shared
                .event_tx
                .send(LinkEvent::ConnectionLost { reason })
                .await;
            Shared::fall_back_from_session(&shared).await;
            debug!("END session worker");
        });

        Self { handle, task }
    }

    /// Cloned write path for use outside the arbiter lock.
    pub(crate) fn handle(&self) -> SessionHandle<S> {
        self.handle.clone()
    }

    /// Fire-and-forget cancellation; never waits for the task to exit.
    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}
