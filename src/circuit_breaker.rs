use crate::metrics;
use crate::model::ExecutionPermission;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Operator halt switch.
/// While halted every decision is published with DENY and is not executable;
/// decision memory keeps advancing so resuming needs no warm-up.
#[derive(Clone, Debug)]
pub struct GlobalHalt {
    is_halted: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl GlobalHalt {
    pub fn new() -> Self {
        // Default to NOT halted (false)
        Self {
            is_halted: Arc::new(AtomicBool::new(false)),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Check if the system is currently halted.
    pub fn is_halted(&self) -> bool {
        self.is_halted.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Set the halt state.
    pub fn set_halt(&self, active: bool, reason: &str) {
        let prev = self.is_halted.swap(active, Ordering::SeqCst);
        *self.reason.lock() = active.then(|| reason.to_string());
        metrics::set_halted(active);
        if prev != active {
            if active {
                warn!("🚨 DECISION HALT ACTIVATED: {}", reason);
            } else {
                info!("✅ DECISION HALT LIFTED: {}", reason);
            }
        }
    }

    /// Permission as it may be published right now.
    pub fn gate(&self, permission: ExecutionPermission) -> ExecutionPermission {
        if self.is_halted() {
            ExecutionPermission::Deny
        } else {
            permission
        }
    }
}

impl Default for GlobalHalt {
    fn default() -> Self {
        Self::new()
    }
}
