//! Cycle scheduler: every configured detector runs exactly once per poll
//! interval, sequentially and in declared order. Cycles never overlap, and a
//! detector failure is contained here rather than aborting the cycle.

use crate::detectors::Detector;
use crate::store::SecurityStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

pub struct Scheduler {
    detectors: Vec<Box<dyn Detector>>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(detectors: Vec<Box<dyn Detector>>, interval: Duration) -> Self {
        Self {
            detectors,
            interval,
        }
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every detector once, in order. Errors are logged and swallowed; the
    /// next detector always runs.
    pub fn run_cycle(&mut self, store: &SecurityStore) {
        for detector in &mut self.detectors {
            debug!(detector = detector.name(), "running detector");
            if let Err(e) = detector.run(store) {
                warn!(detector = detector.name(), error = %e, "detector failed; continuing cycle");
            }
        }
    }

    /// Run cycles until the stop flag is raised, invoking `after_cycle` (the
    /// export hook) between cycles. Sleeps in one-second slices so a stop
    /// request is honored promptly.
    pub fn run(
        &mut self,
        store: &SecurityStore,
        stop: &AtomicBool,
        mut after_cycle: impl FnMut(&SecurityStore),
    ) {
        let mut cycle: u64 = 0;
        while !stop.load(Ordering::Relaxed) {
            cycle += 1;
            debug!(cycle, "starting detection cycle");
            self.run_cycle(store);
            after_cycle(store);
            for _ in 0..self.interval.as_secs() {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
}
