//! TCP transport implementation, the portable default backend

use crate::error::LinkError;
use crate::transport::traits::{Transport, TransportListener, TransportStream};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

/// TCP stream wrapper implementing TransportStream
#[derive(Debug)]
pub struct TcpLinkStream {
    inner: TcpStream,
    peer: Option<SocketAddr>,
}

impl TcpLinkStream {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self { inner: stream, peer }
    }
}

impl AsyncRead for TcpLinkStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpLinkStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl TransportStream for TcpLinkStream {
    fn peer_addr(&self) -> Option<String> {
        self.peer.map(|a| a.to_string())
    }
}

/// Bound TCP listening endpoint
pub struct TcpLinkListener {
    inner: TcpListener,
}

#[async_trait]
impl TransportListener for TcpLinkListener {
    type Stream = TcpLinkStream;
    type PeerAddr = String;

    async fn accept(&mut self) -> Result<TcpLinkStream, LinkError> {
        let (stream, _) = self.inner.accept().await.map_err(LinkError::Accept)?;
        Ok(TcpLinkStream::new(stream))
    }

    fn local_addr(&self) -> Option<String> {
        self.inner.local_addr().ok().map(|a| a.to_string())
    }
}

/// TCP transport bound to a configured local address
pub struct TcpTransport {
    listen_addr: String,
}

impl TcpTransport {
    /// Create a transport listening on `listen_addr` (host:port; port 0
    /// asks the OS for a free port).
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpLinkStream;
    type Listener = TcpLinkListener;
    type PeerAddr = String;

    async fn bind(&self) -> Result<TcpLinkListener, LinkError> {
        let inner = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(LinkError::Bind)?;
        Ok(TcpLinkListener { inner })
    }

    async fn dial(&self, peer: &String) -> Result<TcpLinkStream, LinkError> {
        let stream = TcpStream::connect(peer).await.map_err(LinkError::Dial)?;
        Ok(TcpLinkStream::new(stream))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}
