use anyhow::{bail, Result};
use bytes::Bytes;
use peerlink::{LinkConfig, LinkEvent, LinkManager, TcpTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Two-peer demo node: listens on the given port, optionally dials a
/// peer, and bridges stdin lines to the link.
///
/// Usage: peerlink <listen-addr> [peer-addr]
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut args = std::env::args().skip(1);
    let listen_addr = match args.next() {
        Some(a) => a,
        None => bail!("usage: peerlink <listen-addr> [peer-addr]"),
    };
    let peer_addr = args.next();

    let mut link = LinkManager::new(TcpTransport::new(listen_addr), LinkConfig::default());
    link.start().await;
    if let Some(addr) = link.listener_addr().await {
        info!("Listening on {}", addr);
    }

    if let Some(peer) = peer_addr {
        info!("Dialing {}", peer);
        link.connect_to(peer).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => link.send(Bytes::from(line.into_bytes())).await,
                    None => {
                        info!("stdin closed, shutting down");
                        link.stop().await;
                        break;
                    }
                }
            }
            event = link.recv() => {
                match event {
                    Some(LinkEvent::Connected { peer }) => {
                        info!("Connected to {}", peer.unwrap_or_else(|| "unknown peer".into()));
                    }
                    Some(LinkEvent::ConnectionLost { reason }) => {
                        warn!("Connection lost: {}", reason);
                    }
                    Some(LinkEvent::ConnectionFailed { reason }) => {
                        warn!("Connect failed: {}", reason);
                    }
                    Some(LinkEvent::ListenFailed { reason }) => {
                        error!("Listen failed: {}", reason);
                    }
                    Some(LinkEvent::Received(bytes)) => {
                        println!("{}", String::from_utf8_lossy(&bytes));
                    }
                    None => {
                        error!("Link manager closed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
