//! Device identity used for the broker client id and status payloads.

use std::net::IpAddr;

use crate::config::DeviceConfig;

/// Placeholder reported when an address could not be resolved.
pub const UNKNOWN: &str = "unknown";

/// Stable address pair identifying this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub ip_address: String,
    pub mac_address: String,
}

impl DeviceIdentity {
    pub fn new(ip_address: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            mac_address: mac_address.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.ip_address != UNKNOWN && self.mac_address != UNKNOWN
    }
}

pub trait IdentityProvider: Send + Sync {
    fn resolve(&self) -> DeviceIdentity;
}

/// One network interface as seen by discovery.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac_address: String,
    pub addresses: Vec<IpAddr>,
}

impl InterfaceInfo {
    fn first_ipv4(&self) -> Option<String> {
        self.addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .map(|addr| addr.to_string())
    }
}

fn is_wireless(name: &str) -> bool {
    name.starts_with("wl")
}

fn is_wired(name: &str) -> bool {
    name != "lo" && !name.starts_with("vbox") && !name.starts_with("docker") && !is_wireless(name)
}

/// Pick the identity from a set of interfaces: first wired interface with an
/// IPv4 address, then the first wireless one. Interfaces are taken in name order.
pub fn select_identity(interfaces: &[InterfaceInfo]) -> Option<DeviceIdentity> {
    let mut sorted: Vec<&InterfaceInfo> = interfaces.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let pick = |filter: fn(&str) -> bool| {
        sorted
            .iter()
            .filter(|iface| filter(&iface.name))
            .find_map(|iface| {
                iface
                    .first_ipv4()
                    .map(|ip| DeviceIdentity::new(ip, iface.mac_address.clone()))
            })
    };

    pick(is_wired).or_else(|| pick(is_wireless))
}

/// Discovers the identity from the host's network interfaces.
#[derive(Debug, Clone, Default)]
pub struct InterfaceIdentity {
    overrides: DeviceConfig,
}

impl InterfaceIdentity {
    pub fn new(overrides: DeviceConfig) -> Self {
        Self { overrides }
    }

    fn interfaces() -> Vec<InterfaceInfo> {
        let networks = sysinfo::Networks::new_with_refreshed_list();
        networks
            .iter()
            .map(|(name, data)| InterfaceInfo {
                name: name.clone(),
                mac_address: data.mac_address().to_string(),
                addresses: data.ip_networks().iter().map(|net| net.addr).collect(),
            })
            .collect()
    }
}

impl IdentityProvider for InterfaceIdentity {
    fn resolve(&self) -> DeviceIdentity {
        let discovered = select_identity(&Self::interfaces());
        if discovered.is_none() {
            tracing::warn!("No usable network interface found for device identity");
        }
        let discovered = discovered.unwrap_or_else(|| DeviceIdentity::new(UNKNOWN, UNKNOWN));

        DeviceIdentity {
            ip_address: self.overrides.ip_address.clone().unwrap_or(discovered.ip_address),
            mac_address: self.overrides.mac_address.clone().unwrap_or(discovered.mac_address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, mac: &str, addrs: &[&str]) -> InterfaceInfo {
        InterfaceInfo {
            name: name.to_string(),
            mac_address: mac.to_string(),
            addresses: addrs.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn test_wired_preferred_over_wireless() {
        let interfaces = vec![
            iface("wlan0", "22:22:22:22:22:22", &["192.168.1.20"]),
            iface("eth0", "11:11:11:11:11:11", &["fe80::1", "192.168.1.10"]),
            iface("lo", "00:00:00:00:00:00", &["127.0.0.1"]),
        ];
        let identity = select_identity(&interfaces).unwrap();
        assert_eq!(identity, DeviceIdentity::new("192.168.1.10", "11:11:11:11:11:11"));
    }

    #[test]
    fn test_falls_back_to_wireless() {
        let interfaces = vec![
            iface("docker0", "33:33:33:33:33:33", &["172.17.0.1"]),
            iface("eth0", "11:11:11:11:11:11", &["fe80::1"]),
            iface("wlp2s0", "22:22:22:22:22:22", &["10.0.0.5"]),
        ];
        let identity = select_identity(&interfaces).unwrap();
        assert_eq!(identity.mac_address, "22:22:22:22:22:22");
        assert_eq!(identity.ip_address, "10.0.0.5");
    }

    #[test]
    fn test_no_ipv4_anywhere() {
        let interfaces = vec![iface("lo", "00:00:00:00:00:00", &["127.0.0.1"])];
        assert!(select_identity(&interfaces).is_none());
    }

    #[test]
    fn test_overrides_win_over_discovery() {
        let provider = InterfaceIdentity::new(DeviceConfig {
            ip_address: Some("10.0.0.1".to_string()),
            mac_address: Some("aa:aa:aa:aa:aa:aa".to_string()),
        });
        let identity = provider.resolve();
        assert_eq!(identity, DeviceIdentity::new("10.0.0.1", "aa:aa:aa:aa:aa:aa"));
        assert!(identity.is_resolved());
        assert!(!DeviceIdentity::new(UNKNOWN, "aa").is_resolved());
    }
}
