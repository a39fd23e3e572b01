//! CPU and memory utilisation sampling against configured thresholds.

use crate::config::SystemConfig;
use crate::detectors::{Detector, DetectorError};
use crate::store::SecurityStore;
use sysinfo::System;
use tracing::{debug, info};

pub struct ResourceMonitor {
    config: SystemConfig,
    sys: System,
}

impl ResourceMonitor {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            sys: System::new(),
        }
    }

    /// Global CPU utilisation percentage. Two refreshes are needed for a
    /// meaningful delta-based reading.
    fn cpu_usage(&mut self) -> f32 {
        self.sys.refresh_cpu();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.sys.refresh_cpu();
        self.sys.global_cpu_info().cpu_usage()
    }

    fn memory_usage(&mut self) -> f32 {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        (self.sys.used_memory() as f32 / total as f32) * 100.0
    }
}

impl Detector for ResourceMonitor {
    fn name(&self) -> &'static str {
        "system_resources"
    }

    fn run(&mut self, store: &SecurityStore) -> Result<(), DetectorError> {
        let cpu = self.cpu_usage();
        if cpu > self.config.cpu_threshold {
            info!(cpu_percent = cpu, "high CPU load detected");
            store.metrics.high_cpu_events.inc();
            return Ok(());
        }
        let memory = self.memory_usage();
        if memory > self.config.memory_threshold {
            info!(memory_percent = memory, "high memory usage detected");
            store.metrics.high_memory_events.inc();
            return Ok(());
        }
        debug!(cpu_percent = cpu, memory_percent = memory, "CPU load and memory usage within limits");
        Ok(())
    }
}
