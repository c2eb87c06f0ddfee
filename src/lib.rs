//! PeerLink: a single-session peer link manager.
//!
//! One device simultaneously listens for an inbound connection, dials a
//! known peer, and keeps at most one live bidirectional byte session,
//! with deterministic handover between the three roles. The link always
//! falls back to listening after a failed dial or a lost session, so it
//! is never left dead.
//!
//! The manager is generic over a [`transport::Transport`]; TCP is the
//! portable backend and Bluetooth RFCOMM is available behind the
//! `rfcomm` feature.
//!
//! ```no_run
//! use bytes::Bytes;
//! use peerlink::{LinkConfig, LinkEvent, LinkManager, TcpTransport};
//!
//! # async fn run() {
//! let mut link = LinkManager::new(TcpTransport::new("0.0.0.0:7400"), LinkConfig::default());
//! link.start().await;
//! link.connect_to("10.0.0.2:7400".into()).await;
//! while let Some(event) = link.recv().await {
//!     match event {
//!         LinkEvent::Connected { .. } => link.send(Bytes::from_static(b"hello")).await,
//!         LinkEvent::Received(bytes) => println!("got {} bytes", bytes.len()),
//!         _ => {}
//!     }
//! }
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod transport;

pub use connection::{LinkConfig, LinkEvent, LinkManager, LinkState};
pub use error::LinkError;
pub use transport::{TcpTransport, Transport, TransportListener, TransportStream};

#[cfg(feature = "rfcomm")]
pub use transport::{RfcommConfig, RfcommTransport};
