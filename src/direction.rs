// Direction Module - Local identity discovery and packet direction resolution
use anyhow::{bail, Result};
use pnet::datalink;
use pnet::util::MacAddr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

use crate::packet::{Layer, PacketEvent};

// Addresses of the capture interface, used to spot locally originated traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub ipv4: Ipv4Addr,
    pub ipv6: Option<Ipv6Addr>,
    pub mac: Option<MacAddr>,
}

impl LocalIdentity {
    /// Look up `device` among the host's interfaces.
    pub fn discover(device: &str) -> Result<Self> {
        let interfaces = datalink::interfaces();
        let Some(iface) = interfaces.iter().find(|i| i.name == device) else {
            bail!("Network interface {} not found, are you connected to the network?", device);
        };
        Self::from_addresses(&iface.name, iface.ips.iter().map(|n| n.ip()), iface.mac)
    }

    fn from_addresses(
        name: &str,
        addresses: impl IntoIterator<Item = IpAddr>,
        mac: Option<MacAddr>,
    ) -> Result<Self> {
        let mut ipv4 = None;
        let mut ipv6 = None;

        // Last non-loopback address of each family wins
        for ip in addresses {
            if ip.is_loopback() {
                continue;
            }
            match ip {
                IpAddr::V4(v4) => ipv4 = Some(v4),
                IpAddr::V6(v6) => ipv6 = Some(v6),
            }
        }

        let mac = mac.filter(|m| *m != MacAddr::zero());

        match ipv4 {
            Some(ipv4) => {
                debug!("Interface {}: ipv4={} ipv6={:?} mac={:?}", name, ipv4, ipv6, mac);
                Ok(LocalIdentity { ipv4, ipv6, mac })
            }
            None => bail!("No IPv4 address on {}, are you connected to the network?", name),
        }
    }
}

/// Returns the `reverse` flag: true unless the packet looks locally originated.
///
/// Matching is textual containment of the local address in the source address
/// string, not equality, so `10.0.0.1` also matches `10.0.0.10`.
pub fn resolve_direction(event: &PacketEvent, identity: &LocalIdentity) -> bool {
    let mut reverse = true;

    if let Some(source) = event.network_source {
        let source = source.to_string();
        let v4 = identity.ipv4.to_string();
        let v6 = identity.ipv6.map(|ip| ip.to_string());
        if source.contains(&v4) || v6.map(|v6| source.contains(&v6)).unwrap_or(false) {
            reverse = false;
        }
    }

    if event.layers.contains(Layer::Arp) {
        if let (Some(sender), Some(mac)) = (event.hardware_source, identity.mac) {
            if sender.to_string().contains(&mac.to_string()) {
                reverse = false;
            }
        }
    }

    reverse
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::LayerSet;
    use std::time::SystemTime;

    fn identity() -> LocalIdentity {
        LocalIdentity {
            ipv4: Ipv4Addr::new(192, 168, 1, 10),
            ipv6: Some("fe80::ba27:ebff:fe01:203".parse().unwrap()),
            mac: Some(MacAddr::new(0xb8, 0x27, 0xeb, 0x01, 0x02, 0x03)),
        }
    }

    fn event(source: Option<IpAddr>, layers: LayerSet, hw: Option<MacAddr>) -> PacketEvent {
        PacketEvent {
            captured_at: SystemTime::now(),
            layers,
            network_source: source,
            hardware_source: hw,
            length: 60,
        }
    }

    #[test]
    fn test_local_source_is_forward() {
        let id = identity();
        let v4 = event(Some(IpAddr::V4(id.ipv4)), LayerSet::from_layers(&[Layer::Ipv4]), None);
        assert!(!resolve_direction(&v4, &id));

        let v6 = event(Some(IpAddr::V6(id.ipv6.unwrap())), LayerSet::from_layers(&[Layer::Ipv6]), None);
        assert!(!resolve_direction(&v6, &id));
    }

    #[test]
    fn test_other_sources_are_reverse() {
        let id = identity();
        let remote = event(Some("93.184.216.34".parse().unwrap()), LayerSet::from_layers(&[Layer::Ipv4]), None);
        assert!(resolve_direction(&remote, &id));

        let no_network = event(None, LayerSet::from_layers(&[Layer::Lldp]), None);
        assert!(resolve_direction(&no_network, &id));
    }

    #[test]
    fn test_substring_match_is_kept() {
        let mut id = identity();
        id.ipv4 = Ipv4Addr::new(10, 0, 0, 1);
        let neighbour = event(Some("10.0.0.17".parse().unwrap()), LayerSet::from_layers(&[Layer::Ipv4]), None);
        assert!(!resolve_direction(&neighbour, &id));
    }

    #[test]
    fn test_arp_sender_hardware_address() {
        let id = identity();
        let arp = LayerSet::from_layers(&[Layer::Ethernet, Layer::Arp]);
        assert!(!resolve_direction(&event(None, arp, id.mac), &id));

        let other = MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55);
        assert!(resolve_direction(&event(None, arp, Some(other)), &id));

        // Without a known local MAC nothing matches
        let anonymous = LocalIdentity { mac: None, ..identity() };
        assert!(resolve_direction(&event(None, arp, id.mac), &anonymous));
    }

    #[test]
    fn test_from_addresses() {
        let mac = Some(MacAddr::new(0xb8, 0x27, 0xeb, 0x01, 0x02, 0x03));
        let addresses: Vec<IpAddr> = vec![
            "127.0.0.1".parse().unwrap(),
            "10.9.9.9".parse().unwrap(),
            "192.168.1.10".parse().unwrap(),
            "fe80::ba27:ebff:fe01:203".parse().unwrap(),
            "::1".parse().unwrap(),
        ];
        let found = LocalIdentity::from_addresses("eth0", addresses, mac).unwrap();
        assert_eq!(found, identity());

        let zero_mac = LocalIdentity::from_addresses("eth0", vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))], Some(MacAddr::zero())).unwrap();
        assert_eq!(zero_mac.mac, None);
        assert_eq!(zero_mac.ipv6, None);

        let loopback_only: Vec<IpAddr> = vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()];
        assert!(LocalIdentity::from_addresses("lo", loopback_only, None).is_err());
    }
}
