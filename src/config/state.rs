// Application state module
// Shared per-process state handed to every connection

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::vision::FaceDetector;

/// Application state
///
/// The detector is injected at construction so tests can substitute a
/// deterministic fake for the network-backed Watson client.
pub struct AppState {
    pub config: Config,
    pub detector: Arc<dyn FaceDetector>,

    // Cached config value for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,
}

impl AppState {
    /// Create `AppState` around a loaded config and a detection capability
    pub fn new(config: Config, detector: Arc<dyn FaceDetector>) -> Self {
        let cached_access_log = Arc::new(AtomicBool::new(config.logging.access_log));

        Self {
            config,
            detector,
            cached_access_log,
        }
    }
}
