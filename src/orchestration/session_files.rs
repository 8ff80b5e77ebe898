use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::types::SessionId;

/// Temporary input files of one session.
///
/// Files are removed when the guard is dropped, so cleanup runs on success,
/// failure, early return and panic alike. Removal errors are logged, never raised.
pub struct SessionFiles {
    session_id: SessionId,
    paths: Vec<PathBuf>,
}

impl SessionFiles {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            paths: Vec::new(),
        }
    }

    /// Register a path before writing it so partial writes are removed too
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every tracked file now; returns how many removals failed
    pub fn cleanup(&mut self) -> usize {
        let mut failures = 0;
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Cleanup warning for session {}: {}: {}",
                        self.session_id,
                        path.display(),
                        e
                    );
                }
            }
        }
        failures
    }
}

impl Drop for SessionFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}
