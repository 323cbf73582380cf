use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::BackendError;

/// Caps how many GPU contexts may be alive at once.
///
/// Owned by whoever builds GPU backends and passed to them by reference;
/// each backend holds a [`ContextLease`] for as long as it keeps its device.
#[derive(Debug)]
pub struct ContextPool {
    limit: usize,
    active: AtomicUsize,
}

impl ContextPool {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            active: AtomicUsize::new(0),
        }
    }

    pub fn shared(limit: usize) -> Arc<Self> {
        Arc::new(Self::new(limit))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Reserve a context slot, failing when all `limit` slots are taken.
    pub fn acquire(self: &Arc<Self>) -> Result<ContextLease, BackendError> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.limit {
                return Err(BackendError::ContextLimit { limit: self.limit });
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    log::debug!("GPU context acquired ({}/{})", current + 1, self.limit);
                    return Ok(ContextLease { pool: Arc::clone(self) });
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        // Browsers start evicting contexts around 16; stay well under.
        Self::new(4)
    }
}

/// A held slot in a [`ContextPool`], released on drop
#[derive(Debug)]
pub struct ContextLease {
    pool: Arc<ContextPool>,
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        let previous = self.pool.active.fetch_sub(1, Ordering::AcqRel);
        log::debug!("GPU context released ({}/{})", previous - 1, self.pool.limit);
    }
}
