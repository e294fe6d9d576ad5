//! Platform hooks: semaphores, cache maintenance and reset backoff.
//!
//! The driver never talks to the OS directly. Everything environment
//! specific goes through a [`Platform`] chosen by the integrator when the
//! driver is created:
//!
//! | Hook | [`HostedPlatform`] | [`BareMetalPlatform`] |
//! |------|--------------------|-----------------------|
//! | semaphores | `Mutex` + `Condvar` | atomic spin |
//! | cache flush / invalidate | no-op | no-op |
//! | reset backoff | `thread::yield_now` every 64 polls | `spin_loop` |
//! | inference begin / end | no-op | no-op |
//!
//! Override individual methods to plug in real cache maintenance or
//! tracing of inference boundaries.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Counting semaphore.
pub trait Semaphore: Send + Sync {
    /// Block until a permit is available, then consume it.
    fn take(&self);

    /// Release one permit, waking one waiter if any.
    fn give(&self);
}

/// Blocking semaphore for hosted environments.
#[derive(Debug, Default)]
pub struct CondvarSemaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl CondvarSemaphore {
    /// Semaphore holding `permits` initial permits.
    pub const fn new(permits: u32) -> Self {
        Self {
            count: Mutex::new(permits),
            available: Condvar::new(),
        }
    }
}

impl Semaphore for CondvarSemaphore {
    fn take(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    fn give(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_add(1);
        self.available.notify_one();
    }
}

/// Busy-waiting semaphore for environments without a scheduler.
#[derive(Debug, Default)]
pub struct SpinSemaphore {
    count: AtomicU32,
}

impl SpinSemaphore {
    /// Semaphore holding `permits` initial permits.
    pub const fn new(permits: u32) -> Self {
        Self {
            count: AtomicU32::new(permits),
        }
    }
}

impl Semaphore for SpinSemaphore {
    fn take(&self) {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current > 0
                && self
                    .count
                    .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
        }
    }

    fn give(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }
}

/// Memory range handed to cache maintenance hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheRegion {
    /// Start address
    pub addr: u64,
    /// Length in bytes
    pub len: usize,
}

/// Integration hooks supplied by the environment.
///
/// All methods have defaults; an empty `impl Platform for X {}` is a valid
/// hosted platform.
pub trait Platform: Send + Sync + fmt::Debug {
    /// New semaphore with zero permits.
    fn create_semaphore(&self) -> Box<dyn Semaphore> {
        Box::new(CondvarSemaphore::new(0))
    }

    /// Write dirty cache lines covering `region` back to memory before the
    /// NPU reads it. `None` means the whole data cache.
    fn flush_dcache(&self, region: Option<CacheRegion>) {
        let _ = region;
    }

    /// Discard cache lines covering `region` after the NPU wrote it.
    /// `None` means the whole data cache.
    fn invalidate_dcache(&self, region: Option<CacheRegion>) {
        let _ = region;
    }

    /// Called between status polls while waiting for a reset.
    fn reset_backoff(&self, poll: u32) {
        if poll % 64 == 63 {
            std::thread::yield_now();
        }
    }

    /// Called before the first record of a payload is dispatched.
    fn inference_begin(&self, driver_id: usize, payload: &[u8]) {
        let _ = (driver_id, payload);
    }

    /// Called after the last record of a payload, success or not.
    fn inference_end(&self, driver_id: usize, payload: &[u8]) {
        let _ = (driver_id, payload);
    }
}

/// Default platform for Linux and other hosted targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostedPlatform;

impl Platform for HostedPlatform {}

/// Platform without a scheduler: spin semaphores and spin backoff.
#[derive(Debug, Default, Clone, Copy)]
pub struct BareMetalPlatform;

impl Platform for BareMetalPlatform {
    fn create_semaphore(&self) -> Box<dyn Semaphore> {
        Box::new(SpinSemaphore::new(0))
    }

    fn reset_backoff(&self, _poll: u32) {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn exercise(sem: Arc<dyn Semaphore>) {
        sem.give();
        sem.give();
        sem.take();
        sem.take();

        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.take())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        sem.give();
        waiter.join().unwrap();
    }

    #[test]
    fn condvar_semaphore_counts() {
        exercise(Arc::new(CondvarSemaphore::new(0)));
    }

    #[test]
    fn spin_semaphore_counts() {
        exercise(Arc::new(SpinSemaphore::new(0)));
    }

    #[test]
    fn initial_permits() {
        let sem = CondvarSemaphore::new(1);
        sem.take();
        let spin = SpinSemaphore::new(1);
        spin.take();
    }
}
