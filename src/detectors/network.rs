//! Live network intrusion checks. Each attack category opens its own capture
//! session on the configured interface, applies its BPF filter, and inspects
//! decoded frames until a qualifying packet appears.
//!
//! The capture reads block with no timeout: a category that never sees a
//! qualifying packet stalls the whole detection cycle. Known failure mode.

use crate::config::NetworkConfig;
use crate::detectors::heuristics::{self, ArpReplyPredicate};
use crate::detectors::{Detector, DetectorError};
use crate::store::{SecurityStore, Violation, ViolationKind};
use pnet::packet::arp::ArpPacket;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("error opening interface {interface}: {source}")]
    CaptureOpen {
        interface: String,
        source: pcap::Error,
    },
    #[error("error applying BPF filter {filter:?}: {source}")]
    Filter {
        filter: String,
        source: pcap::Error,
    },
    #[error("error reading packet statistics for {interface}: {source}")]
    Stats {
        interface: String,
        source: std::io::Error,
    },
    #[error("capture read error: {0}")]
    Read(#[from] pcap::Error),
}

/// One attack category with its own filter expression and decision predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCheck {
    Ddos,
    DnsSpoofing,
    IpSpoofing,
    MacSpoofing,
    ArpSpoofing,
    DnsHijacking,
}

impl CaptureCheck {
    /// Every check, in cycle execution order.
    pub const ALL: [CaptureCheck; 6] = [
        CaptureCheck::Ddos,
        CaptureCheck::DnsSpoofing,
        CaptureCheck::IpSpoofing,
        CaptureCheck::MacSpoofing,
        CaptureCheck::ArpSpoofing,
        CaptureCheck::DnsHijacking,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CaptureCheck::Ddos => "ddos",
            CaptureCheck::DnsSpoofing => "dns_spoofing",
            CaptureCheck::IpSpoofing => "ip_spoofing",
            CaptureCheck::MacSpoofing => "mac_spoofing",
            CaptureCheck::ArpSpoofing => "arp_spoofing",
            CaptureCheck::DnsHijacking => "dns_hijacking",
        }
    }

    fn kind(&self) -> ViolationKind {
        match self {
            CaptureCheck::Ddos => ViolationKind::Ddos,
            CaptureCheck::DnsSpoofing => ViolationKind::DnsSpoofing,
            CaptureCheck::IpSpoofing => ViolationKind::IpSpoofing,
            CaptureCheck::MacSpoofing => ViolationKind::MacSpoofing,
            CaptureCheck::ArpSpoofing => ViolationKind::ArpSpoofing,
            CaptureCheck::DnsHijacking => ViolationKind::DnsHijacking,
        }
    }

    /// BPF filter applied to this check's capture, if any.
    fn filter<'a>(&self, config: &'a NetworkConfig) -> Option<&'a str> {
        match self {
            CaptureCheck::DnsSpoofing | CaptureCheck::DnsHijacking => Some(&config.dns_filter),
            CaptureCheck::ArpSpoofing => Some(&config.arp_filter),
            CaptureCheck::Ddos | CaptureCheck::IpSpoofing | CaptureCheck::MacSpoofing => None,
        }
    }
}

/// A decoded DNS response with zero answer records. NXDOMAIN and other
/// legitimate empty responses qualify too; accepted imprecision.
pub fn inspect_dns(frame: &[u8]) -> Option<String> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ip = Ipv4Packet::new(eth.payload())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Udp {
        return None;
    }
    let udp = UdpPacket::new(ip.payload())?;
    let dns = dns_parser::Packet::parse(udp.payload()).ok()?;
    if !dns.header.query && heuristics::dns_response_is_suspicious(dns.answers.len()) {
        return Some("DNS response with zero answer records".to_string());
    }
    None
}

/// An IPv4 packet whose textual source address fails syntactic validation.
pub fn inspect_ipv4_source(frame: &[u8]) -> Option<String> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ip = Ipv4Packet::new(eth.payload())?;
    let source = ip.get_source().to_string();
    if !heuristics::is_valid_ipv4(&source) {
        return Some(format!("invalid source IP address {source}"));
    }
    None
}

/// An Ethernet frame whose textual source MAC fails syntactic validation.
pub fn inspect_mac_source(frame: &[u8]) -> Option<String> {
    let eth = EthernetPacket::new(frame)?;
    let source = eth.get_source().to_string();
    if !heuristics::is_valid_mac(&source) {
        return Some(format!("invalid source MAC address {source}"));
    }
    None
}

/// An ARP reply the configured predicate deems suspicious.
pub fn inspect_arp_reply(frame: &[u8], predicate: ArpReplyPredicate) -> Option<String> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    let operation = arp.get_operation().0;
    if operation == heuristics::ARP_OP_REPLY && predicate(operation) {
        return Some(format!(
            "suspicious ARP reply from {}",
            arp.get_sender_proto_addr()
        ));
    }
    None
}

fn rx_packets(interface: &str) -> Result<u64, std::io::Error> {
    let raw = std::fs::read_to_string(format!(
        "/sys/class/net/{interface}/statistics/rx_packets"
    ))?;
    raw.trim()
        .parse::<u64>()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Interface packet arrival rate: the rx_packets counter sampled twice, one
/// second apart.
pub fn packets_per_second(interface: &str) -> Result<u64, std::io::Error> {
    let first = rx_packets(interface)?;
    std::thread::sleep(Duration::from_secs(1));
    let second = rx_packets(interface)?;
    Ok(second.saturating_sub(first))
}

/// Runs every configured capture check once per cycle, one at a time. A check
/// that fails to open its capture or apply its filter is skipped for the
/// cycle; the remaining checks still run.
pub struct NetworkDetector {
    config: NetworkConfig,
    checks: Vec<CaptureCheck>,
    arp_predicate: ArpReplyPredicate,
}

impl NetworkDetector {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            checks: CaptureCheck::ALL.to_vec(),
            arp_predicate: heuristics::arp_reply_is_suspicious,
        }
    }

    /// Replace the ARP reply predicate.
    pub fn with_arp_predicate(mut self, predicate: ArpReplyPredicate) -> Self {
        self.arp_predicate = predicate;
        self
    }

    fn open_capture(&self, filter: Option<&str>) -> Result<pcap::Capture<pcap::Active>, NetworkError> {
        let inactive = pcap::Capture::from_device(self.config.interface.as_str()).map_err(
            |source| NetworkError::CaptureOpen {
                interface: self.config.interface.clone(),
                source,
            },
        )?;
        let mut capture = inactive
            .promisc(true)
            .snaplen(self.config.max_frame_size)
            .open()
            .map_err(|source| NetworkError::CaptureOpen {
                interface: self.config.interface.clone(),
                source,
            })?;
        if let Some(expr) = filter {
            capture
                .filter(expr, true)
                .map_err(|source| NetworkError::Filter {
                    filter: expr.to_string(),
                    source,
                })?;
        }
        Ok(capture)
    }

    fn inspect(&self, check: CaptureCheck, frame: &[u8]) -> Option<String> {
        match check {
            CaptureCheck::Ddos => None,
            CaptureCheck::DnsSpoofing | CaptureCheck::DnsHijacking => inspect_dns(frame),
            CaptureCheck::IpSpoofing => inspect_ipv4_source(frame),
            CaptureCheck::MacSpoofing => inspect_mac_source(frame),
            CaptureCheck::ArpSpoofing => inspect_arp_reply(frame, self.arp_predicate),
        }
    }

    fn check_ddos(&self) -> Result<Option<Violation>, NetworkError> {
        let rate = packets_per_second(&self.config.interface).map_err(|source| {
            NetworkError::Stats {
                interface: self.config.interface.clone(),
                source,
            }
        })?;
        if rate > self.config.ddos_packet_rate {
            return Ok(Some(Violation::new(
                ViolationKind::Ddos,
                &self.config.interface,
                format!("{rate} packets per second exceeds configured threshold"),
            )));
        }
        Ok(None)
    }

    /// Run one check to completion: at most one violation, returned as soon as
    /// a qualifying packet is observed. The capture handle is released on
    /// every exit path.
    fn watch(&self, check: CaptureCheck) -> Result<Option<Violation>, NetworkError> {
        if check == CaptureCheck::Ddos {
            return self.check_ddos();
        }
        let mut capture = self.open_capture(check.filter(&self.config))?;
        loop {
            let packet = match capture.next_packet() {
                Ok(p) => p,
                Err(pcap::Error::NoMorePackets) => return Ok(None),
                Err(e) => return Err(NetworkError::Read(e)),
            };
            if let Some(detail) = self.inspect(check, packet.data) {
                return Ok(Some(Violation::new(
                    check.kind(),
                    &self.config.interface,
                    detail,
                )));
            }
        }
    }
}

impl Detector for NetworkDetector {
    fn name(&self) -> &'static str {
        "network_intrusion"
    }

    fn run(&mut self, store: &SecurityStore) -> Result<(), DetectorError> {
        for check in self.checks.clone() {
            match self.watch(check) {
                Ok(Some(violation)) => {
                    info!(check = check.name(), detail = %violation.detail, "attack detected");
                    store.record(violation);
                }
                Ok(None) => debug!(check = check.name(), "no qualifying packet"),
                Err(e) => warn!(check = check.name(), error = %e, "sub-check skipped for this cycle"),
            }
        }
        Ok(())
    }
}
