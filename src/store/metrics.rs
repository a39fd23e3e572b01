//! Prometheus counter families, one per violation kind. Registered in a
//! registry owned by the store, not in process-wide statics.

use prometheus::{
    proto::MetricFamily, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

const DB_LABELS: &[&str] = &["database", "user"];

pub struct MetricSet {
    registry: Registry,

    pub integrity_violations: IntCounterVec,
    pub ddos_attacks: IntCounterVec,
    pub dns_spoofing_attacks: IntCounterVec,
    pub ip_spoofing_attacks: IntCounterVec,
    pub mac_spoofing_attacks: IntCounterVec,
    pub arp_spoofing_attacks: IntCounterVec,
    pub dns_hijacking_attacks: IntCounterVec,

    pub db_connection_errors: IntCounterVec,
    pub db_access_control_errors: IntCounterVec,
    pub db_tls_errors: IntCounterVec,
    pub db_encryption_errors: IntCounterVec,
    pub db_network_exposure_errors: IntCounterVec,

    pub high_cpu_events: IntCounter,
    pub high_memory_events: IntCounter,
    pub stale_accounts: IntCounter,
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let vec = IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("invalid metric {name}: {e}"));
    registry
        .register(Box::new(vec.clone()))
        .unwrap_or_else(|e| panic!("duplicate metric {name}: {e}"));
    vec
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).unwrap_or_else(|e| panic!("invalid metric {name}: {e}"));
    registry
        .register(Box::new(c.clone()))
        .unwrap_or_else(|e| panic!("duplicate metric {name}: {e}"));
    c
}

impl MetricSet {
    pub fn new() -> Self {
        let registry = Registry::new();
        Self {
            integrity_violations: counter_vec(
                &registry,
                "integrity_violations_total",
                "Unauthorized file changes detected",
                &["path"],
            ),
            ddos_attacks: counter_vec(
                &registry,
                "ddos_attacks_total",
                "DDoS attacks detected",
                &["interface"],
            ),
            dns_spoofing_attacks: counter_vec(
                &registry,
                "dns_spoofing_attacks_total",
                "DNS spoofing attacks detected",
                &["interface"],
            ),
            ip_spoofing_attacks: counter_vec(
                &registry,
                "ip_spoofing_attacks_total",
                "IP spoofing attacks detected",
                &["interface"],
            ),
            mac_spoofing_attacks: counter_vec(
                &registry,
                "mac_spoofing_attacks_total",
                "MAC spoofing attacks detected",
                &["interface"],
            ),
            arp_spoofing_attacks: counter_vec(
                &registry,
                "arp_spoofing_attacks_total",
                "ARP spoofing attacks detected",
                &["interface"],
            ),
            dns_hijacking_attacks: counter_vec(
                &registry,
                "dns_hijacking_attacks_total",
                "DNS hijacking attacks detected",
                &["interface"],
            ),
            db_connection_errors: counter_vec(
                &registry,
                "database_connection_errors",
                "Database connection failures",
                DB_LABELS,
            ),
            db_access_control_errors: counter_vec(
                &registry,
                "database_access_control_errors",
                "Database access control misconfigurations",
                DB_LABELS,
            ),
            db_tls_errors: counter_vec(
                &registry,
                "database_tls_errors",
                "Databases accepting non-TLS connections",
                DB_LABELS,
            ),
            db_encryption_errors: counter_vec(
                &registry,
                "database_encryption_errors",
                "Databases without data encryption",
                DB_LABELS,
            ),
            db_network_exposure_errors: counter_vec(
                &registry,
                "database_network_exposure_errors",
                "Databases with unlimited network exposure",
                DB_LABELS,
            ),
            high_cpu_events: counter(
                &registry,
                "high_cpu_events_total",
                "CPU utilisation threshold exceedances",
            ),
            high_memory_events: counter(
                &registry,
                "high_memory_events_total",
                "Memory utilisation threshold exceedances",
            ),
            stale_accounts: counter(
                &registry,
                "stale_accounts_total",
                "Accounts that never logged in",
            ),
            registry,
        }
    }

    /// Snapshot of every registered metric family; safe to call while
    /// detectors are still incrementing.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Prometheus text exposition of the current counter values.
    pub fn encode_text(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::new()
    }
}
