//! Stale account detection: accounts `lastlog` reports as never logged in.

use crate::detectors::{Detector, DetectorError};
use crate::store::SecurityStore;
use std::process::Command;
use tracing::info;

/// Account names from `lastlog` output whose line reports no login ever.
pub fn parse_lastlog(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("Never logged in"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub struct StaleAccountMonitor;

impl Detector for StaleAccountMonitor {
    fn name(&self) -> &'static str {
        "stale_accounts"
    }

    fn run(&mut self, store: &SecurityStore) -> Result<(), DetectorError> {
        let output = Command::new("lastlog").output()?;
        let text = String::from_utf8_lossy(&output.stdout);
        for account in parse_lastlog(&text) {
            info!(account = %account, "stale user account detected");
            store.metrics.stale_accounts.inc();
        }
        Ok(())
    }
}
