//! Fault-path tests over an in-process mock transport.
//!
//! The mock can leave a dial blocked forever or hand out a stream whose
//! write side always fails, which loopback TCP cannot express
//! deterministically. Same single-threaded runtime discipline as the
//! arbitration tests.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use peerlink::{
    LinkConfig, LinkError, LinkEvent, LinkManager, LinkState, Transport, TransportListener,
    TransportStream,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep, timeout};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_WINDOW: Duration = Duration::from_millis(200);

/// Stream whose reads never complete and whose writes always fail.
struct BrokenWriteStream;

impl AsyncRead for BrokenWriteStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for BrokenWriteStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl TransportStream for BrokenWriteStream {
    fn peer_addr(&self) -> Option<String> {
        Some("mock".to_string())
    }
}

/// Endpoint that never produces an inbound connection.
struct IdleListener;

#[async_trait]
impl TransportListener for IdleListener {
    type Stream = BrokenWriteStream;
    type PeerAddr = String;

    async fn accept(&mut self) -> Result<Self::Stream, LinkError> {
        std::future::pending::<Result<BrokenWriteStream, LinkError>>().await
    }

    fn local_addr(&self) -> Option<String> {
        Some("mock:0".to_string())
    }
}

enum DialMode {
    /// The dial blocks forever, like a peer that never answers.
    Hang,
    /// The dial succeeds immediately with a [`BrokenWriteStream`].
    BrokenWrite,
}

struct MockTransport {
    dial_mode: DialMode,
    bind_delay: Duration,
    bind_calls: Arc<AtomicUsize>,
}

impl MockTransport {
    fn new(dial_mode: DialMode) -> Self {
        Self {
            dial_mode,
            bind_delay: Duration::ZERO,
            bind_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Stream = BrokenWriteStream;
    type Listener = IdleListener;
    type PeerAddr = String;

    async fn bind(&self) -> Result<Self::Listener, LinkError> {
        self.bind_calls.fetch_add(1, Ordering::SeqCst);
        if !self.bind_delay.is_zero() {
            sleep(self.bind_delay).await;
        }
        Ok(IdleListener)
    }

    async fn dial(&self, _peer: &String) -> Result<Self::Stream, LinkError> {
        match self.dial_mode {
            DialMode::Hang => std::future::pending::<Result<BrokenWriteStream, LinkError>>().await,
            DialMode::BrokenWrite => Ok(BrokenWriteStream),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

async fn expect_event(link: &mut LinkManager<MockTransport>) -> LinkEvent {
    timeout(EVENT_TIMEOUT, link.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_event(link: &mut LinkManager<MockTransport>) {
    if let Ok(event) = timeout(QUIET_WINDOW, link.recv()).await {
        panic!("unexpected event: {:?}", event);
    }
}

#[tokio::test]
async fn stop_cancels_blocked_dial_without_failure_event() {
    let mut link = LinkManager::new(MockTransport::new(DialMode::Hang), LinkConfig::default());
    link.start().await;
    link.connect_to("peer".to_string()).await;
    assert_eq!(link.state(), LinkState::Connecting);

    // Let the dialer task reach the blocked connect.
    sleep(Duration::from_millis(50)).await;

    timeout(EVENT_TIMEOUT, link.stop())
        .await
        .expect("stop blocked behind a pending dial");
    assert_eq!(link.state(), LinkState::Inactive);

    // The aborted dial never runs its failure path: no ConnectionFailed,
    // and no fallback transition resurrects the listener.
    assert_no_event(&mut link).await;
    assert_eq!(link.state(), LinkState::Inactive);
    assert!(link.listener_addr().await.is_none());
}

#[tokio::test]
async fn write_failure_leaves_session_connected() {
    let mut link = LinkManager::new(
        MockTransport::new(DialMode::BrokenWrite),
        LinkConfig::default(),
    );
    link.connect_to("peer".to_string()).await;
    assert!(matches!(
        expect_event(&mut link).await,
        LinkEvent::Connected { .. }
    ));
    assert_eq!(link.state(), LinkState::Connected);

    // The write fails, but only the read loop tears a session down: the
    // link stays Connected and no failure event is emitted.
    link.send(Bytes::from_static(b"doomed")).await;
    assert_eq!(link.state(), LinkState::Connected);
    assert_no_event(&mut link).await;
    assert_eq!(link.state(), LinkState::Connected);

    link.stop().await;
}

#[tokio::test]
async fn concurrent_starts_share_one_bind() {
    // The bind is slow enough that the second start runs while the first
    // one's bind is still in flight.
    let transport = MockTransport {
        dial_mode: DialMode::Hang,
        bind_delay: Duration::from_millis(50),
        bind_calls: Arc::new(AtomicUsize::new(0)),
    };
    let bind_calls = transport.bind_calls.clone();
    let mut link = LinkManager::new(transport, LinkConfig::default());

    tokio::join!(link.start(), link.start());
    assert_eq!(link.state(), LinkState::Listening);

    // The second start defers to the in-flight bind instead of binding
    // the same endpoint again, so exactly one listener exists and no
    // ListenFailed is reported.
    assert_eq!(bind_calls.load(Ordering::SeqCst), 1);
    assert!(link.listener_addr().await.is_some());
    assert_no_event(&mut link).await;

    link.stop().await;
}
