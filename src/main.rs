//! Hostwatch entrypoint: runs a single detection cycle or a daemon loop with a
//! configurable interval; when the collector is enabled, forwards counters and
//! violations after every cycle.

use hostwatch::{
    config::AgentConfig,
    detectors::{
        DatabaseAuditor, Detector, IntegrityDetector, NetworkDetector, ResourceMonitor,
        StaleAccountMonitor,
    },
    logging::StructuredLogger,
    reporter::CollectorClient,
    scheduler::Scheduler,
    store::SecurityStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn build_detectors(config: &AgentConfig) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(IntegrityDetector::new(
            &config.watch_path,
            config.integrity.persist_baseline,
        )),
        Box::new(DatabaseAuditor::new(config.databases.clone())),
        Box::new(ResourceMonitor::new(config.system.clone())),
        Box::new(StaleAccountMonitor),
        Box::new(NetworkDetector::new(config.network.clone())),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("HOSTWATCH_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = AgentConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(watch_path = ?config.watch_path, interface = %config.network.interface, "hostwatch starting");

    let store = Arc::new(SecurityStore::new());
    let collector: Option<CollectorClient> = if config.collector.enabled {
        CollectorClient::new(config.collector.clone())
    } else {
        None
    };

    let interval_secs = config.poll_interval_secs;
    let mut scheduler = Scheduler::new(
        build_detectors(&config),
        Duration::from_secs(interval_secs),
    );
    info!(detectors = ?scheduler.detector_names(), "detectors assembled");

    let run_daemon = interval_secs > 0;

    if run_daemon {
        info!(interval_secs, "daemon mode (Ctrl+C to stop)");
        static STOP: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
        let _ = ctrlc::set_handler(|| {
            STOP.store(true, std::sync::atomic::Ordering::Relaxed);
        });
        scheduler.run(&store, &STOP, |store| {
            if let Some(c) = &collector {
                c.publish(store);
            }
        });
        info!("hostwatch stopping");
    } else {
        scheduler.run_cycle(&store);
        if let Some(c) = &collector {
            c.publish(&store);
        }
        info!("hostwatch cycle complete");
    }

    Ok(())
}
