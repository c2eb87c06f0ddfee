//! Transport trait abstraction for pluggable link backends

use crate::error::LinkError;
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncWrite};

/// An established bidirectional byte stream.
///
/// Dropping the stream closes it; that drop is the cancellation
/// mechanism for any read or write blocked on it.
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// The remote endpoint in display form, if known.
    fn peer_addr(&self) -> Option<String>;
}

/// A bound endpoint accepting inbound stream connections.
///
/// Dropping the listener closes the endpoint and unblocks a pending
/// accept; the resulting error is treated as normal loop termination by
/// the caller, never reported upward.
#[async_trait]
pub trait TransportListener: Send + 'static {
    /// The stream type produced by accepted connections.
    type Stream: TransportStream;
    /// The address type peers use to reach this endpoint.
    type PeerAddr: Clone + Debug + Send + Sync + 'static;

    /// Block until the next inbound connection arrives.
    async fn accept(&mut self) -> Result<Self::Stream, LinkError>;

    /// The locally bound address, once known. Useful when the endpoint
    /// was bound with an OS-assigned port or channel.
    fn local_addr(&self) -> Option<Self::PeerAddr>;
}

/// Factory for the listening and dialing capabilities of one backend.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The stream type this transport produces.
    type Stream: TransportStream;
    /// The listening endpoint type.
    type Listener: TransportListener<Stream = Self::Stream, PeerAddr = Self::PeerAddr>;
    /// The peer address type accepted by [`Transport::dial`].
    type PeerAddr: Clone + Debug + Send + Sync + 'static;

    /// Create and bind the listening endpoint.
    async fn bind(&self) -> Result<Self::Listener, LinkError>;

    /// Perform one blocking connect attempt to the given peer.
    async fn dial(&self, peer: &Self::PeerAddr) -> Result<Self::Stream, LinkError>;

    /// Human-readable name for this transport.
    fn name(&self) -> &'static str;
}
