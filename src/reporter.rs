//! Export layer: drains counter samples and store snapshots to a remote HTTP
//! event collector, one JSON event per item. Send failures are logged and
//! never reach the detection cycle.

use crate::config::CollectorConfig;
use crate::store::SecurityStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const TOKEN_ENV: &str = "HOSTWATCH_COLLECTOR_TOKEN";

#[derive(Serialize)]
pub struct CollectorEvent {
    pub event: BTreeMap<String, String>,
    pub host: String,
}

pub struct CollectorClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: Option<String>,
    host: String,
}

impl CollectorClient {
    pub fn new(config: CollectorConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?.trim_end_matches('/').to_string();
        let token = std::env::var(TOKEN_ENV).ok().or(config.token);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .ok()?;
        let host = sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());
        Some(Self {
            client,
            endpoint,
            token,
            host,
        })
    }

    fn post(&self, event: &CollectorEvent) -> Result<(), String> {
        let mut request = self.client.post(&self.endpoint).json(event);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request.send().map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(format!("{status} {text}"));
        }
        Ok(())
    }

    fn send(&self, fields: BTreeMap<String, String>) {
        let event = CollectorEvent {
            event: fields,
            host: self.host.clone(),
        };
        if let Err(e) = self.post(&event) {
            warn!(error = %e, "collector send failed");
        }
    }

    fn message(text: String) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("message".to_string(), text);
        fields
    }

    /// Forward the current counter values and store snapshots: one event per
    /// counter sample, integrity-violated path, malware directory, and
    /// database vulnerability.
    pub fn publish(&self, store: &SecurityStore) {
        for family in store.metrics.gather() {
            for metric in family.get_metric() {
                let mut fields = BTreeMap::new();
                fields.insert("metric_name".to_string(), family.get_name().to_string());
                for label in metric.get_label() {
                    fields.insert(label.get_name().to_string(), label.get_value().to_string());
                }
                fields.insert(
                    "value".to_string(),
                    format!("{}", metric.get_counter().get_value()),
                );
                self.send(fields);
            }
        }

        for path in store.integrity_violated_paths() {
            self.send(Self::message(format!(
                "Detected unauthorized changes in {}",
                path.display()
            )));
        }

        for dir in store.malware_detected_dirs() {
            self.send(Self::message(format!("Detected malware in directory: {dir}")));
        }

        for vulnerability in store.database_vulnerabilities() {
            self.send(Self::message(format!(
                "Detected vulnerabilities in database {} for user {}: {}",
                vulnerability.database, vulnerability.user, vulnerability.detail
            )));
        }

        debug!("cycle results forwarded to collector");
    }
}
