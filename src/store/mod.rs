//! Shared violation/metric store. One instance is constructed at startup and
//! passed by reference into every detector and into the export layer.

mod metrics;

pub use metrics::MetricSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Database misconfiguration classes, in battery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Connection,
    AccessControl,
    Tls,
    Encryption,
    NetworkExposure,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Connection => "connection",
            AuditKind::AccessControl => "access_control",
            AuditKind::Tls => "tls",
            AuditKind::Encryption => "encryption",
            AuditKind::NetworkExposure => "network_exposure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    Integrity,
    Ddos,
    DnsSpoofing,
    IpSpoofing,
    MacSpoofing,
    ArpSpoofing,
    DnsHijacking,
    Database { kind: AuditKind },
}

/// A recorded detection. Append-only for the process lifetime; the export
/// layer, not the store, decides whether to drain or reset anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub kind: ViolationKind,
    /// Path, interface, or database the detection is about
    pub subject: String,
    pub detail: String,
    pub ts: DateTime<Utc>,
}

impl Violation {
    pub fn new(kind: ViolationKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            subject: subject.into(),
            detail: detail.into(),
            ts: Utc::now(),
        }
    }
}

/// Snapshot record of one misconfigured (database, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub database: String,
    pub user: String,
    pub kind: AuditKind,
    pub detail: String,
}

/// Accumulates violations, malware-flagged directories, database
/// vulnerabilities, and the counter metrics. Appends and snapshot reads are
/// safe to interleave from different threads.
pub struct SecurityStore {
    violations: Mutex<Vec<Violation>>,
    malware_dirs: Mutex<Vec<String>>,
    vulnerabilities: Mutex<Vec<Vulnerability>>,
    pub metrics: MetricSet,
}

impl SecurityStore {
    pub fn new() -> Self {
        Self {
            violations: Mutex::new(Vec::new()),
            malware_dirs: Mutex::new(Vec::new()),
            vulnerabilities: Mutex::new(Vec::new()),
            metrics: MetricSet::new(),
        }
    }

    /// Append a violation and bump its counter family.
    pub fn record(&self, violation: Violation) {
        let m = &self.metrics;
        let subject = [violation.subject.as_str()];
        match &violation.kind {
            ViolationKind::Integrity => m.integrity_violations.with_label_values(&subject).inc(),
            ViolationKind::Ddos => m.ddos_attacks.with_label_values(&subject).inc(),
            ViolationKind::DnsSpoofing => m.dns_spoofing_attacks.with_label_values(&subject).inc(),
            ViolationKind::IpSpoofing => m.ip_spoofing_attacks.with_label_values(&subject).inc(),
            ViolationKind::MacSpoofing => m.mac_spoofing_attacks.with_label_values(&subject).inc(),
            ViolationKind::ArpSpoofing => m.arp_spoofing_attacks.with_label_values(&subject).inc(),
            ViolationKind::DnsHijacking => {
                m.dns_hijacking_attacks.with_label_values(&subject).inc()
            }
            // Database counters carry (database, user) labels and are bumped in
            // record_vulnerability, where the user is known.
            ViolationKind::Database { .. } => {}
        }
        self.violations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(violation);
    }

    /// Record one classified database misconfiguration: the vulnerability
    /// snapshot, the violation, and the (kind, database, user) counter.
    pub fn record_vulnerability(&self, vulnerability: Vulnerability) {
        let labels = [vulnerability.database.as_str(), vulnerability.user.as_str()];
        let m = &self.metrics;
        match vulnerability.kind {
            AuditKind::Connection => m.db_connection_errors.with_label_values(&labels).inc(),
            AuditKind::AccessControl => m.db_access_control_errors.with_label_values(&labels).inc(),
            AuditKind::Tls => m.db_tls_errors.with_label_values(&labels).inc(),
            AuditKind::Encryption => m.db_encryption_errors.with_label_values(&labels).inc(),
            AuditKind::NetworkExposure => {
                m.db_network_exposure_errors.with_label_values(&labels).inc()
            }
        }
        self.violations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Violation::new(
                ViolationKind::Database {
                    kind: vulnerability.kind,
                },
                vulnerability.database.clone(),
                vulnerability.detail.clone(),
            ));
        self.vulnerabilities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(vulnerability);
    }

    /// Store a directory flagged by the external malware scanner.
    pub fn record_malware_dir(&self, dir: impl Into<String>) {
        self.malware_dirs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(dir.into());
    }

    /// Clone of every violation recorded so far.
    pub fn violations(&self) -> Vec<Violation> {
        self.violations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deduplicated paths with at least one integrity violation.
    pub fn integrity_violated_paths(&self) -> Vec<PathBuf> {
        let violations = self.violations.lock().unwrap_or_else(|e| e.into_inner());
        let paths: BTreeSet<PathBuf> = violations
            .iter()
            .filter(|v| matches!(v.kind, ViolationKind::Integrity))
            .map(|v| PathBuf::from(&v.subject))
            .collect();
        paths.into_iter().collect()
    }

    /// Directories flagged by the external malware scanner.
    pub fn malware_detected_dirs(&self) -> Vec<String> {
        self.malware_dirs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every classified database misconfiguration recorded so far.
    pub fn database_vulnerabilities(&self) -> Vec<Vulnerability> {
        self.vulnerabilities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for SecurityStore {
    fn default() -> Self {
        Self::new()
    }
}
