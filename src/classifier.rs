// Classifier Module - Maps decoded layers to exactly one traffic category
use crate::packet::{Layer, LayerSet};
use crate::types::Category;

/// FIN, URG and PSH together never show up in honest traffic (Xmas-style scans do).
pub fn is_anomaly(layers: &LayerSet) -> bool {
    layers
        .tcp_control()
        .map(|c| c.fin && c.urg && c.psh)
        .unwrap_or(false)
}

fn matches(category: Category, layers: &LayerSet) -> bool {
    match category {
        Category::Anomaly => is_anomaly(layers),
        Category::Lldp => layers.contains(Layer::Lldp),
        Category::Dns => layers.contains(Layer::Dns),
        Category::Icmp => layers.contains(Layer::Icmpv4) || layers.contains(Layer::Icmpv6),
        Category::Dhcp => layers.contains(Layer::Dhcpv4),
        Category::Arp => layers.contains(Layer::Arp),
        Category::Igmp => layers.contains(Layer::Igmp),
        Category::Udp => layers.contains(Layer::Udp),
        Category::Tcp => layers.contains(Layer::Tcp),
        Category::Others => true,
    }
}

// First match in priority order wins
pub fn classify(layers: &LayerSet) -> Category {
    Category::PRIORITY
        .iter()
        .copied()
        .find(|&category| matches(category, layers))
        .unwrap_or(Category::Others)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::TcpControl;

    fn tcp(control: TcpControl) -> LayerSet {
        LayerSet::from_layers(&[Layer::Ethernet, Layer::Ipv4]).with_tcp(control)
    }

    #[test]
    fn test_single_predicate() {
        let cases = [
            (LayerSet::from_layers(&[Layer::Ethernet, Layer::Lldp]), Category::Lldp),
            (LayerSet::from_layers(&[Layer::Dns]), Category::Dns),
            (LayerSet::from_layers(&[Layer::Ipv4, Layer::Icmpv4]), Category::Icmp),
            (LayerSet::from_layers(&[Layer::Ipv6, Layer::Icmpv6]), Category::Icmp),
            (LayerSet::from_layers(&[Layer::Dhcpv4]), Category::Dhcp),
            (LayerSet::from_layers(&[Layer::Ethernet, Layer::Arp]), Category::Arp),
            (LayerSet::from_layers(&[Layer::Ipv4, Layer::Igmp]), Category::Igmp),
            (LayerSet::from_layers(&[Layer::Ipv4, Layer::Udp]), Category::Udp),
            (tcp(TcpControl { ack: true, ..Default::default() }), Category::Tcp),
        ];
        for (layers, expected) in cases {
            assert_eq!(classify(&layers), expected, "{:?}", layers);
        }
    }

    #[test]
    fn test_fallback_to_others() {
        assert_eq!(classify(&LayerSet::default()), Category::Others);
        assert_eq!(classify(&LayerSet::from_layers(&[Layer::Ethernet, Layer::Ipv4])), Category::Others);
    }

    #[test]
    fn test_priority_order() {
        // DNS carried over UDP and TCP
        let dns_udp = LayerSet::from_layers(&[Layer::Ipv4, Layer::Udp, Layer::Dns]);
        assert_eq!(classify(&dns_udp), Category::Dns);
        let mut dns_tcp = tcp(TcpControl { psh: true, ack: true, ..Default::default() });
        dns_tcp.insert(Layer::Dns);
        assert_eq!(classify(&dns_tcp), Category::Dns);

        let dhcp = LayerSet::from_layers(&[Layer::Ipv4, Layer::Udp, Layer::Dhcpv4]);
        assert_eq!(classify(&dhcp), Category::Dhcp);

        // Anomaly beats everything, even DNS
        let mut crafted = tcp(TcpControl { fin: true, urg: true, psh: true, ..Default::default() });
        crafted.insert(Layer::Dns);
        crafted.insert(Layer::Lldp);
        assert_eq!(classify(&crafted), Category::Anomaly);

        let lldp_and_arp = LayerSet::from_layers(&[Layer::Lldp, Layer::Arp]);
        assert_eq!(classify(&lldp_and_arp), Category::Lldp);

        let icmp_and_udp = LayerSet::from_layers(&[Layer::Icmpv4, Layer::Udp]);
        assert_eq!(classify(&icmp_and_udp), Category::Icmp);

        let igmp_and_udp = LayerSet::from_layers(&[Layer::Igmp, Layer::Udp]);
        assert_eq!(classify(&igmp_and_udp), Category::Igmp);
    }

    #[test]
    fn test_anomaly_flags() {
        let all = TcpControl { fin: true, syn: true, rst: true, psh: true, ack: true, urg: true };
        assert_eq!(classify(&tcp(all)), Category::Anomaly);

        let xmas = TcpControl { fin: true, urg: true, psh: true, ..Default::default() };
        assert_eq!(classify(&tcp(xmas)), Category::Anomaly);

        let missing_fin = TcpControl { fin: false, ..xmas };
        let missing_urg = TcpControl { urg: false, ..xmas };
        let missing_psh = TcpControl { psh: false, ..xmas };
        for control in [missing_fin, missing_urg, missing_psh] {
            assert_eq!(classify(&tcp(control)), Category::Tcp);
        }
    }
}
