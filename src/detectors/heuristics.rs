//! Decision predicates for the capture checks. Deliberately simple heuristics;
//! each is a standalone function so it can be tested and replaced without
//! touching the capture plumbing.

/// ARP operation code for a reply.
pub const ARP_OP_REPLY: u16 = 2;

/// Whether a textual IPv4 address is syntactically valid dotted-quad form.
pub fn is_valid_ipv4(addr: &str) -> bool {
    addr.parse::<std::net::Ipv4Addr>().is_ok()
}

/// Whether a textual MAC address is six colon-separated hex octets.
pub fn is_valid_mac(mac: &str) -> bool {
    let octets: Vec<&str> = mac.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A DNS response carrying no answer records is treated as spoofed or
/// hijacked. Legitimate empty responses (NXDOMAIN and friends) are flagged
/// too; that imprecision is accepted.
pub fn dns_response_is_suspicious(answer_count: usize) -> bool {
    answer_count == 0
}

/// Predicate deciding whether an ARP reply looks spoofed.
pub type ArpReplyPredicate = fn(operation: u16) -> bool;

/// Default ARP heuristic: examines only the operation code, so every reply is
/// deemed suspicious.
pub fn arp_reply_is_suspicious(operation: u16) -> bool {
    operation == ARP_OP_REPLY
}
