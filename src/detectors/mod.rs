//! Detectors: file integrity, network intrusion, database audit, resource and
//! account checks. Each runs once per cycle against the shared store.

mod accounts;
mod database;
pub mod heuristics;
mod integrity;
mod network;
mod resources;

pub use accounts::{parse_lastlog, StaleAccountMonitor};
pub use database::{
    evaluate_mysql, evaluate_postgres, AuditError, DatabaseAuditor, MysqlSettings,
    PostgresSettings,
};
pub use integrity::{FileIntegrityMonitor, IntegrityDetector, IntegrityError};
pub use network::{
    inspect_arp_reply, inspect_dns, inspect_ipv4_source, inspect_mac_source, packets_per_second,
    CaptureCheck, NetworkDetector, NetworkError,
};
pub use resources::ResourceMonitor;

use crate::store::SecurityStore;

pub type DetectorError = Box<dyn std::error::Error + Send + Sync>;

/// One scheduled security check. Implementations mutate the store and keep
/// whatever state they need between cycles; a returned error is contained by
/// the scheduler and never aborts the cycle.
pub trait Detector: Send {
    fn name(&self) -> &'static str;

    fn run(&mut self, store: &SecurityStore) -> Result<(), DetectorError>;
}
