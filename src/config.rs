//! Agent configuration. Loaded once at startup and immutable for the process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory tree watched for integrity violations
    pub watch_path: PathBuf,
    /// Integrity monitor behavior
    pub integrity: IntegrityConfig,
    /// Databases audited every cycle
    pub databases: Vec<DatabaseTarget>,
    /// Live-capture network checks
    pub network: NetworkConfig,
    /// CPU / memory utilisation thresholds
    pub system: SystemConfig,
    /// Seconds between detection cycles; 0 runs a single cycle and exits
    pub poll_interval_secs: u64,
    /// Event collector: where violations and counters are forwarded
    pub collector: CollectorConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Mysql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseTarget {
    #[serde(rename = "type")]
    pub dialect: Dialect,
    /// Database names audited under this target
    pub names: Vec<String>,
    /// Credentials tried against every database name
    pub users: Vec<Credential>,
}

/// Database login. The secret never appears in logs or Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interface the capture checks attach to
    pub interface: String,
    /// Maximum captured frame size in bytes (snaplen)
    pub max_frame_size: i32,
    /// BPF filter restricting capture to DNS traffic
    pub dns_filter: String,
    /// BPF filter restricting capture to ARP traffic
    pub arp_filter: String,
    /// Packets-per-second above which the interface is considered under DDoS
    pub ddos_packet_rate: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// CPU utilisation percentage threshold
    pub cpu_threshold: f32,
    /// Memory utilisation percentage threshold
    pub memory_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Whether cycle results are forwarded at all
    pub enabled: bool,
    /// Collector endpoint URL when enabled
    pub endpoint: Option<String>,
    /// Authorization token; HOSTWATCH_COLLECTOR_TOKEN overrides
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Keep the digest baseline across cycles instead of resetting it every cycle
    pub persist_baseline: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            watch_path: PathBuf::from("/etc"),
            integrity: IntegrityConfig::default(),
            databases: Vec::new(),
            network: NetworkConfig::default(),
            system: SystemConfig::default(),
            poll_interval_secs: 120,
            collector: CollectorConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            max_frame_size: 1600,
            dns_filter: "udp port 53".to_string(),
            arp_filter: "arp".to_string(),
            ddos_packet_rate: 100_000,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 80.0,
            memory_threshold: 65.0,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            token: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            persist_baseline: false,
        }
    }
}

impl AgentConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<AgentConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
