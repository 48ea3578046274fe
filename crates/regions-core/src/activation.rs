//! Process-wide guard allowing one active region manager.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{RegionError, RegionResult};

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Held by whoever runs the active manager. Released on drop.
#[derive(Debug)]
pub struct ActivationGuard {
    _private: (),
}

impl ActivationGuard {
    /// Claim the single activation slot.
    ///
    /// Fails with [`RegionError::ManagerActive`] while another guard is alive.
    pub fn acquire() -> RegionResult<Self> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { _private: () })
            .map_err(|_| RegionError::ManagerActive)
    }

    #[must_use]
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Acquire)
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
    }
}
