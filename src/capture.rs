// Capture Module - Live packet source backed by libpcap
use anyhow::{Context, Result};
use pcap::{Active, Capture, Linktype};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::packet::{LinkKind, PacketEvent};

/// Result of one blocking pull from a packet source.
#[derive(Debug)]
pub enum Pull {
    Packet(PacketEvent),
    // Read timeout elapsed without traffic
    Idle,
    Closed,
}

pub trait PacketSource {
    fn next_event(&mut self) -> Result<Pull>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub interface: String,
    pub snapshot_len: i32,
    pub promiscuous: bool,
    pub read_timeout_ms: i32,
}

pub struct PcapSource {
    capture: Capture<Active>,
    link: LinkKind,
}

impl PcapSource {
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let capture = Capture::from_device(config.interface.as_str())
            .with_context(|| format!("Unknown capture device {}", config.interface))?
            .snaplen(config.snapshot_len)
            .promisc(config.promiscuous)
            .timeout(config.read_timeout_ms)
            .open()
            .with_context(|| format!("Failed to open {} for capture", config.interface))?;

        let datalink = capture.get_datalink();
        let link = link_kind(datalink);
        info!(
            "Capturing on {} (snaplen={}, promiscuous={}, link={:?})",
            config.interface, config.snapshot_len, config.promiscuous, datalink
        );

        Ok(PcapSource { capture, link })
    }
}

impl PacketSource for PcapSource {
    fn next_event(&mut self) -> Result<Pull> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let captured_at = timestamp(packet.header.ts.tv_sec as i64, packet.header.ts.tv_usec as i64);
                Ok(Pull::Packet(PacketEvent::decode(captured_at, self.link, packet.data)))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(Pull::Idle),
            Err(pcap::Error::NoMorePackets) => {
                debug!("Capture source closed");
                Ok(Pull::Closed)
            }
            Err(e) => Err(e).context("Packet capture failed"),
        }
    }
}

fn link_kind(linktype: Linktype) -> LinkKind {
    match linktype.0 {
        1 => LinkKind::Ethernet,
        // DLT_RAW variants and LINKTYPE_IPV4 / LINKTYPE_IPV6
        12 | 14 | 101 | 228 | 229 => LinkKind::RawIp,
        _ => LinkKind::Unsupported,
    }
}

fn timestamp(secs: i64, micros: i64) -> SystemTime {
    if secs < 0 || micros < 0 {
        return UNIX_EPOCH;
    }
    UNIX_EPOCH + Duration::from_secs(secs as u64) + Duration::from_micros(micros as u64)
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;

    // Replays a fixed list of pulls, then reports the source closed
    pub struct ScriptedSource {
        pulls: VecDeque<Pull>,
    }

    impl ScriptedSource {
        pub fn new(pulls: Vec<Pull>) -> Self {
            ScriptedSource { pulls: pulls.into() }
        }
    }

    impl PacketSource for ScriptedSource {
        fn next_event(&mut self) -> Result<Pull> {
            Ok(self.pulls.pop_front().unwrap_or(Pull::Closed))
        }
    }
}
