// Packet Module - Decoded layer set and frame decoding via pnet packet views
use pnet::packet::arp::ArpPacket;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::net::IpAddr;
use std::time::SystemTime;

const ETHERTYPE_LLDP: EtherType = EtherType(0x88cc);

// Control bits in byte 13 of the TCP header
pub(crate) const TCP_FIN: u8 = 0x01;
pub(crate) const TCP_SYN: u8 = 0x02;
pub(crate) const TCP_RST: u8 = 0x04;
pub(crate) const TCP_PSH: u8 = 0x08;
pub(crate) const TCP_ACK: u8 = 0x10;
pub(crate) const TCP_URG: u8 = 0x20;

const PORT_DNS: u16 = 53;
const PORT_MDNS: u16 = 5353;
const PORT_DHCP_SERVER: u16 = 67;
const PORT_DHCP_CLIENT: u16 = 68;

// IPv4 "more fragments" flag
const IPV4_MORE_FRAGMENTS: u8 = 0b001;

// IPv6 extension headers walked before looking at the upper layer
const IPV6_HOP_BY_HOP: u8 = 0;
const IPV6_ROUTING: u8 = 43;
const IPV6_DESTINATION_OPTIONS: u8 = 60;

/// Top-level protocol layers recognised in a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Vlan,
    Arp,
    Lldp,
    Ipv4,
    Ipv6,
    Icmpv4,
    Icmpv6,
    Igmp,
    Tcp,
    Udp,
    Dns,
    Dhcpv4,
}

impl Layer {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

// TCP control bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpControl {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
    pub urg: bool,
}

impl TcpControl {
    fn from_flags(flags: u8) -> Self {
        TcpControl {
            fin: flags & TCP_FIN != 0,
            syn: flags & TCP_SYN != 0,
            rst: flags & TCP_RST != 0,
            psh: flags & TCP_PSH != 0,
            ack: flags & TCP_ACK != 0,
            urg: flags & TCP_URG != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerSet {
    bits: u16,
    tcp: Option<TcpControl>,
}

impl LayerSet {
    #[cfg(test)]
    pub fn from_layers(layers: &[Layer]) -> Self {
        let mut set = LayerSet::default();
        for &layer in layers {
            set.insert(layer);
        }
        set
    }

    pub fn insert(&mut self, layer: Layer) {
        self.bits |= layer.bit();
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.bits & layer.bit() != 0
    }

    /// Marks the TCP layer present along with its control bits.
    pub fn with_tcp(mut self, control: TcpControl) -> Self {
        self.insert(Layer::Tcp);
        self.tcp = Some(control);
        self
    }

    pub fn tcp_control(&self) -> Option<TcpControl> {
        self.tcp
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

// Link-layer framing of the capture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    RawIp,
    Unsupported,
}

/// One captured packet, decoded just far enough to classify it and tell where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketEvent {
    pub captured_at: SystemTime,
    pub layers: LayerSet,
    pub network_source: Option<IpAddr>,
    // Sender hardware address of ARP packets
    pub hardware_source: Option<MacAddr>,
    pub length: usize,
}

impl PacketEvent {
    pub fn decode(captured_at: SystemTime, link: LinkKind, data: &[u8]) -> Self {
        let mut event = PacketEvent {
            captured_at,
            layers: LayerSet::default(),
            network_source: None,
            hardware_source: None,
            length: data.len(),
        };

        match link {
            LinkKind::Ethernet => event.decode_ethernet(data),
            LinkKind::RawIp => match data.first().map(|b| b >> 4) {
                Some(4) => event.decode_ipv4(data),
                Some(6) => event.decode_ipv6(data),
                _ => {}
            },
            LinkKind::Unsupported => {}
        }

        event
    }

    fn decode_ethernet(&mut self, data: &[u8]) {
        let Some(eth) = EthernetPacket::new(data) else {
            return;
        };
        self.layers.insert(Layer::Ethernet);

        let mut ethertype = eth.get_ethertype();
        let mut payload = eth.payload();

        // Single 802.1Q tag
        if ethertype == EtherTypes::Vlan {
            let Some(vlan) = VlanPacket::new(payload) else {
                return;
            };
            self.layers.insert(Layer::Vlan);
            ethertype = vlan.get_ethertype();
            payload = &payload[VlanPacket::minimum_packet_size()..];
        }

        self.decode_ethertype(ethertype, payload);
    }

    fn decode_ethertype(&mut self, ethertype: EtherType, payload: &[u8]) {
        if ethertype == EtherTypes::Ipv4 {
            self.decode_ipv4(payload);
        } else if ethertype == EtherTypes::Ipv6 {
            self.decode_ipv6(payload);
        } else if ethertype == EtherTypes::Arp {
            if let Some(arp) = ArpPacket::new(payload) {
                self.layers.insert(Layer::Arp);
                self.hardware_source = Some(arp.get_sender_hw_addr());
            }
        } else if ethertype == ETHERTYPE_LLDP {
            self.layers.insert(Layer::Lldp);
        }
    }

    fn decode_ipv4(&mut self, data: &[u8]) {
        let Some(ip) = Ipv4Packet::new(data) else {
            return;
        };
        self.layers.insert(Layer::Ipv4);
        self.network_source = Some(IpAddr::V4(ip.get_source()));

        // Fragments are not reassembled, so their payload is never read as a transport header
        if ip.get_fragment_offset() != 0 || ip.get_flags() & IPV4_MORE_FRAGMENTS != 0 {
            return;
        }

        let header_len = ip.get_header_length() as usize * 4;
        let total_len = (ip.get_total_length() as usize).min(data.len());
        if header_len < 20 || header_len > total_len {
            return;
        }
        self.decode_transport(ip.get_next_level_protocol(), &data[header_len..total_len]);
    }

    fn decode_ipv6(&mut self, data: &[u8]) {
        let Some(ip) = Ipv6Packet::new(data) else {
            return;
        };
        self.layers.insert(Layer::Ipv6);
        self.network_source = Some(IpAddr::V6(ip.get_source()));

        let end = (40 + ip.get_payload_length() as usize).min(data.len());
        let mut next = ip.get_next_header();
        let mut payload = &data[40..end];

        while matches!(next.0, IPV6_HOP_BY_HOP | IPV6_ROUTING | IPV6_DESTINATION_OPTIONS) {
            if payload.len() < 8 {
                return;
            }
            let ext_len = (payload[1] as usize + 1) * 8;
            if ext_len > payload.len() {
                return;
            }
            next = IpNextHeaderProtocol::new(payload[0]);
            payload = &payload[ext_len..];
        }

        self.decode_transport(next, payload);
    }

    fn decode_transport(&mut self, protocol: IpNextHeaderProtocol, payload: &[u8]) {
        if protocol == IpNextHeaderProtocols::Icmp {
            self.layers.insert(Layer::Icmpv4);
        } else if protocol == IpNextHeaderProtocols::Icmpv6 {
            self.layers.insert(Layer::Icmpv6);
        } else if protocol == IpNextHeaderProtocols::Igmp {
            self.layers.insert(Layer::Igmp);
        } else if protocol == IpNextHeaderProtocols::Tcp {
            let Some(tcp) = TcpPacket::new(payload) else {
                return;
            };
            // TcpPacket::new guarantees the 20-byte fixed header
            self.layers = self.layers.with_tcp(TcpControl::from_flags(payload[13]));

            let header_len = tcp.get_data_offset() as usize * 4;
            let has_payload = header_len >= 20 && payload.len() > header_len;
            if has_payload && (tcp.get_destination() == PORT_DNS || tcp.get_source() == PORT_DNS) {
                self.layers.insert(Layer::Dns);
            }
        } else if protocol == IpNextHeaderProtocols::Udp {
            let Some(udp) = UdpPacket::new(payload) else {
                return;
            };
            self.layers.insert(Layer::Udp);

            if payload.len() <= 8 {
                return;
            }
            // Destination port decides first, like a dissector would
            let app = udp_application(udp.get_destination())
                .or_else(|| udp_application(udp.get_source()));
            if let Some(layer) = app {
                self.layers.insert(layer);
            }
        }
    }
}

fn udp_application(port: u16) -> Option<Layer> {
    match port {
        PORT_DNS | PORT_MDNS => Some(Layer::Dns),
        PORT_DHCP_SERVER | PORT_DHCP_CLIENT => Some(Layer::Dhcpv4),
        _ => None,
    }
}
