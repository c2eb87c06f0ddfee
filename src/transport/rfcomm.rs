//! RFCOMM transport implementation for Bluetooth links (Linux/BlueZ)

use crate::error::LinkError;
use crate::transport::discovery::{Discovery, DiscoveryConfig};
use crate::transport::traits::{Transport, TransportListener, TransportStream};
use async_trait::async_trait;
use bluer::rfcomm::{Listener as RfcommListener, SocketAddr as RfcommAddr, Stream as RfcommStream};
use bluer::Address;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

/// Default RFCOMM channel for the link service
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

fn to_io(e: bluer::Error) -> io::Error {
    io::Error::other(e)
}

/// RFCOMM stream wrapper implementing TransportStream
pub struct RfcommLinkStream {
    inner: RfcommStream,
    peer: RfcommAddr,
}

impl RfcommLinkStream {
    pub fn new(stream: RfcommStream, peer: RfcommAddr) -> Self {
        Self { inner: stream, peer }
    }

    /// The peer Bluetooth address.
    pub fn peer_address(&self) -> Address {
        self.peer.addr
    }
}

impl AsyncRead for RfcommLinkStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RfcommLinkStream {
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

impl TransportStream for RfcommLinkStream {
    fn peer_addr(&self) -> Option<String> {
        Some(format!("{} ch {}", self.peer.addr, self.peer.channel))
    }
}

/// Bound RFCOMM listening endpoint
pub struct RfcommLinkListener {
    inner: RfcommListener,
    bound: RfcommAddr,
}

#[async_trait]
impl TransportListener for RfcommLinkListener {
    type Stream = RfcommLinkStream;
    type PeerAddr = RfcommAddr;

    async fn accept(&mut self) -> Result<RfcommLinkStream, LinkError> {
        let (stream, peer) = self
            .inner
            .accept()
            .await
            .map_err(|e| LinkError::Accept(to_io(e)))?;
        debug!("[BT] Accepted inbound link from {}", peer.addr);
        Ok(RfcommLinkStream::new(stream, peer))
    }

    fn local_addr(&self) -> Option<RfcommAddr> {
        Some(self.bound)
    }
}

/// Configuration for the RFCOMM transport
#[derive(Debug, Clone)]
pub struct RfcommConfig {
    /// RFCOMM channel to listen on and dial to
    pub channel: u8,
    /// Local adapter address to bind; `Address::any()` uses the default
    pub local_address: Address,
    /// How to locate peers when none is known yet
    pub discovery: DiscoveryConfig,
}

impl Default for RfcommConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_RFCOMM_CHANNEL,
            local_address: Address::any(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// RFCOMM transport for short-range peer links
pub struct RfcommTransport {
    config: RfcommConfig,
}

impl RfcommTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: RfcommConfig) -> Self {
        Self { config }
    }

    /// Create a transport on the default adapter and channel.
    pub fn with_channel(channel: u8) -> Self {
        Self {
            config: RfcommConfig {
                channel,
                ..Default::default()
            },
        }
    }

    /// Scan for the best link peer and return its dialable address.
    ///
    /// The scan is bounded and has ended by the time this returns, so a
    /// subsequent dial never competes with an active discovery.
    pub async fn discover_peer(&self) -> anyhow::Result<RfcommAddr> {
        let adapter = Discovery::get_adapter().await?;
        let discovery = Discovery::new(self.config.discovery.clone());
        let peer = discovery.find_best_peer(&adapter).await?;
        Ok(RfcommAddr::new(peer.address, self.config.channel))
    }
}

#[async_trait]
impl Transport for RfcommTransport {
    type Stream = RfcommLinkStream;
    type Listener = RfcommLinkListener;
    type PeerAddr = RfcommAddr;

    async fn bind(&self) -> Result<RfcommLinkListener, LinkError> {
        let bound = RfcommAddr::new(self.config.local_address, self.config.channel);
        let inner = RfcommListener::bind(bound)
            .await
            .map_err(|e| LinkError::Bind(to_io(e)))?;
        debug!("[BT] Listening on channel {}", self.config.channel);
        Ok(RfcommLinkListener { inner, bound })
    }

    async fn dial(&self, peer: &RfcommAddr) -> Result<RfcommLinkStream, LinkError> {
        // An active scan slows RFCOMM setup; callers are expected to have
        // finished discovery before dialing (a Discovery scan stops when
        // it returns).
        debug!("[BT] Connecting to {} channel {}", peer.addr, peer.channel);
        let stream = RfcommStream::connect(*peer)
            .await
            .map_err(|e| LinkError::Dial(to_io(e)))?;
        debug!("[BT] Connected to {}", peer.addr);
        Ok(RfcommLinkStream::new(stream, *peer))
    }

    fn name(&self) -> &'static str {
        "rfcomm"
    }
}
