//! Pluggable stream transports for the link layer
//!
//! The link manager is generic over [`Transport`]; TCP is the portable
//! default backend and RFCOMM (feature `rfcomm`) is the Bluetooth
//! backend the system was originally built for.

#[cfg(feature = "rfcomm")]
pub mod discovery;
#[cfg(feature = "rfcomm")]
pub mod rfcomm;
pub mod tcp;
pub mod traits;

#[cfg(feature = "rfcomm")]
pub use discovery::{Discovery, DiscoveryConfig, LinkPeer, SERVICE_NAME, SERVICE_UUID};
#[cfg(feature = "rfcomm")]
pub use rfcomm::{RfcommConfig, RfcommLinkStream, RfcommTransport, DEFAULT_RFCOMM_CHANNEL};
pub use tcp::{TcpLinkStream, TcpTransport};
pub use traits::{Transport, TransportListener, TransportStream};
