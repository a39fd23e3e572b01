//! Hostwatch — Continuous host and network security monitoring agent.
//!
//! Modular structure:
//! - [`detectors`] — File integrity, network intrusion, database audit, resource and account checks
//! - [`store`] — Shared violation list and monotonic counter metrics
//! - [`scheduler`] — Sequential per-cycle detector execution
//! - [`reporter`] — Event forwarding to a remote collector
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod detectors;
pub mod store;
pub mod scheduler;
pub mod reporter;
pub mod logging;

pub use config::AgentConfig;
pub use detectors::{
    DatabaseAuditor, Detector, FileIntegrityMonitor, IntegrityDetector, NetworkDetector,
    ResourceMonitor, StaleAccountMonitor,
};
pub use reporter::CollectorClient;
pub use scheduler::Scheduler;
pub use store::{SecurityStore, Violation, ViolationKind, Vulnerability};
pub use logging::StructuredLogger;
