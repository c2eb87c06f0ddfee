//! Bluetooth peer discovery for locating link endpoints
//!
//! Scans are bounded: the adapter's event stream is dropped when the scan
//! duration elapses, so discovery is never still running when a dial
//! starts.

use anyhow::{anyhow, Result};
use bluer::{Adapter, Address, Device, Uuid};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Service identifier advertised by link endpoints; opaque configuration.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4c1b_dfa0_93d1_4de5_9f2e_0aa1_53b8_77c4);

/// Human-readable service name announced by link endpoints.
pub const SERVICE_NAME: &str = "PeerLink";

/// Configuration for peer discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long to scan for devices
    pub scan_duration: Duration,
    /// Known peer MAC addresses (preferred over scanning results)
    pub known_peers: Vec<Address>,
    /// Device name prefix to match
    pub name_prefix: Option<String>,
    /// Service UUID a peer must advertise, when it exposes any
    pub service_uuid: Uuid,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(10),
            known_peers: Vec::new(),
            name_prefix: Some(SERVICE_NAME.into()),
            service_uuid: SERVICE_UUID,
        }
    }
}

/// Information about a discovered link peer
#[derive(Debug, Clone)]
pub struct LinkPeer {
    /// Bluetooth MAC address
    pub address: Address,
    /// Signal strength (if available)
    pub rssi: Option<i16>,
}

/// Bluetooth peer discovery service
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    /// Create a new discovery service
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Get the default Bluetooth adapter
    pub async fn get_adapter() -> Result<Adapter> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        Ok(adapter)
    }

    /// Discover link peers
    pub async fn discover_peers(&self, adapter: &Adapter) -> Result<Vec<LinkPeer>> {
        let mut peers = Vec::new();
        let mut seen: HashSet<Address> = HashSet::new();

        // Known peers that are already reachable come first.
        for &addr in &self.config.known_peers {
            if let Ok(device) = adapter.device(addr) {
                if let Ok(true) = device.is_connected().await {
                    peers.push(LinkPeer {
                        address: addr,
                        rssi: device.rssi().await.ok().flatten(),
                    });
                    seen.insert(addr);
                }
            }
        }

        let discover = adapter.discover_devices().await?;
        tokio::pin!(discover);

        // Scan for the configured duration; timeout here is the normal
        // end of the scan, not an error.
        let scan_result = timeout(self.config.scan_duration, async {
            use futures::StreamExt;
            while let Some(evt) = discover.next().await {
                if let bluer::AdapterEvent::DeviceAdded(addr) = evt {
                    if seen.contains(&addr) {
                        continue;
                    }

                    if let Ok(device) = adapter.device(addr) {
                        if self.is_link_peer(&device).await {
                            peers.push(LinkPeer {
                                address: addr,
                                rssi: device.rssi().await.ok().flatten(),
                            });
                            seen.insert(addr);
                        }
                    }
                }
            }
        })
        .await;

        if scan_result.is_err() {
            info!("[BT] Discovery scan completed");
        }

        // Strongest signal first.
        peers.sort_by(|a, b| {
            let rssi_a = a.rssi.unwrap_or(i16::MIN);
            let rssi_b = b.rssi.unwrap_or(i16::MIN);
            rssi_b.cmp(&rssi_a)
        });

        Ok(peers)
    }

    /// Check whether a device looks like a link peer: known address,
    /// advertised service UUID, or matching name prefix.
    async fn is_link_peer(&self, device: &Device) -> bool {
        let addr = device.address();
        if self.config.known_peers.contains(&addr) {
            return true;
        }

        if let Ok(Some(uuids)) = device.uuids().await {
            if uuids.contains(&self.config.service_uuid) {
                return true;
            }
        }

        if let Some(ref prefix) = self.config.name_prefix {
            if let Ok(Some(name)) = device.name().await {
                if name.starts_with(prefix) {
                    return true;
                }
            }
        }

        false
    }

    /// Find the best peer (strongest signal)
    pub async fn find_best_peer(&self, adapter: &Adapter) -> Result<LinkPeer> {
        let peers = self.discover_peers(adapter).await?;
        peers
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No link peers found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.scan_duration, Duration::from_secs(10));
        assert!(config.known_peers.is_empty());
        assert_eq!(config.name_prefix, Some(SERVICE_NAME.into()));
        assert_eq!(config.service_uuid, SERVICE_UUID);
    }
}
