//! Current timing policy

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crossway_core::{CrosswayError, CrosswayResult, Policy};

/// Holds the active policy; reads are lock-free snapshots
#[derive(Debug)]
pub struct PolicyManager {
    path: Option<PathBuf>,
    current: RwLock<Arc<Policy>>,
}

impl PolicyManager {
    /// Start from `path` when it loads, else from the hybrid defaults
    pub fn new(path: Option<PathBuf>) -> Self {
        let manager = PolicyManager {
            path,
            current: RwLock::new(Arc::new(Policy::hybrid())),
        };
        if manager.path.is_some() {
            if let Err(e) = manager.reload() {
                tracing::warn!(error = %e, "policy file unusable, using defaults");
            }
        }
        manager
    }

    pub fn current(&self) -> Arc<Policy> {
        Arc::clone(&self.current.read())
    }

    pub fn replace(&self, policy: Policy) {
        *self.current.write() = Arc::new(policy);
        tracing::info!(?policy, "policy replaced");
    }

    /// Re-read the policy file. On failure the previous policy stays active.
    pub fn reload(&self) -> CrosswayResult<Arc<Policy>> {
        let path = self.path.as_ref().ok_or(CrosswayError::PolicyUnavailable)?;
        let text = fs::read_to_string(path)?;
        let policy: Policy = serde_json::from_str(&text)
            .map_err(|e| CrosswayError::MalformedMessage(format!("{}: {e}", path.display())))?;
        self.replace(policy);
        Ok(self.current())
    }
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::new(None)
    }
}
