//! File integrity monitoring: recursive SHA-256 digests compared against the
//! last observation of each path.

use crate::detectors::{Detector, DetectorError};
use crate::store::{SecurityStore, Violation, ViolationKind};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("walk error under {root:?}: {source}")]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    #[error("hash error for {path:?}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Tracks one digest per path under a single root. The map is overwritten on
/// every observation, never merged; entries are never removed.
pub struct FileIntegrityMonitor {
    root: PathBuf,
    digests: HashMap<PathBuf, [u8; 32]>,
}

impl FileIntegrityMonitor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            digests: HashMap::new(),
        }
    }

    /// SHA-256 of the file contents.
    pub fn hash_file(path: &Path) -> Result<[u8; 32], std::io::Error> {
        let data = std::fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        Ok(hasher.finalize().into())
    }

    /// Walk the root, hashing every regular file. A path whose digest differs
    /// from the previous observation records an integrity violation and keeps
    /// the new digest; the first observation of a path is never a violation.
    /// Returns whether any violation was recorded.
    ///
    /// A walk or read error aborts the scan early; digests recorded before the
    /// abort remain valid.
    pub fn scan(&mut self, store: &SecurityStore) -> Result<bool, IntegrityError> {
        let mut changed = false;
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|source| IntegrityError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            let digest = Self::hash_file(&path).map_err(|source| IntegrityError::Hash {
                path: path.clone(),
                source,
            })?;
            if let Some(previous) = self.digests.get(&path) {
                if *previous != digest {
                    store.record(Violation::new(
                        ViolationKind::Integrity,
                        path.to_string_lossy(),
                        "file contents changed since last observation",
                    ));
                    changed = true;
                }
            }
            self.digests.insert(path, digest);
        }
        Ok(changed)
    }

    /// Number of paths with a recorded digest.
    pub fn tracked_paths(&self) -> usize {
        self.digests.len()
    }

    /// Last recorded digest for a path, if the path has been observed.
    pub fn digest(&self, path: &Path) -> Option<[u8; 32]> {
        self.digests.get(path).copied()
    }
}

/// Scheduler-facing wrapper. By default the monitor is re-created every cycle,
/// so the digest history resets and only intra-walk changes are detected;
/// `persist_baseline` keeps one monitor for the process lifetime instead.
pub struct IntegrityDetector {
    root: PathBuf,
    persist_baseline: bool,
    monitor: Option<FileIntegrityMonitor>,
}

impl IntegrityDetector {
    pub fn new(root: impl Into<PathBuf>, persist_baseline: bool) -> Self {
        Self {
            root: root.into(),
            persist_baseline,
            monitor: None,
        }
    }
}

impl Detector for IntegrityDetector {
    fn name(&self) -> &'static str {
        "file_integrity"
    }

    fn run(&mut self, store: &SecurityStore) -> Result<(), DetectorError> {
        if !self.persist_baseline || self.monitor.is_none() {
            self.monitor = Some(FileIntegrityMonitor::new(&self.root));
        }
        let monitor = self.monitor.as_mut().ok_or("integrity monitor missing")?;
        match monitor.scan(store) {
            Ok(true) => {
                info!(root = %self.root.display(), "unauthorized file changes detected");
                Ok(())
            }
            Ok(false) => {
                debug!(root = %self.root.display(), "no changes detected");
                Ok(())
            }
            Err(e) => {
                // Fail loud: an aborted walk counts as changes detected.
                warn!(root = %self.root.display(), error = %e, "walk aborted; treating cycle as changes detected");
                Err(e.into())
            }
        }
    }
}
