//! Pool of drivers for systems with more than one NPU.
//!
//! Callers reserve a driver for the duration of an inference and release
//! it afterwards. [`DriverPool::reserve`] blocks while every registered
//! driver is in use; [`DriverPool::invoke`] wraps reserve, invoke and
//! release.
//!
//! The most recently registered driver is tried first. There is no
//! fairness between waiters.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::dispatch::BaseRegion;
use crate::driver::Driver;
use crate::error::{EthosuError, Result};
use crate::platform::{HostedPlatform, Platform, Semaphore};

/// Registry of drivers available for reservation.
pub struct DriverPool {
    drivers: Mutex<Vec<Arc<Driver>>>,
    available: Box<dyn Semaphore>,
}

impl DriverPool {
    /// Empty pool using hosted semaphores.
    pub fn new() -> Self {
        Self::with_platform(&HostedPlatform)
    }

    /// Empty pool whose wait semaphore comes from `platform`.
    pub fn with_platform(platform: &dyn Platform) -> Self {
        Self {
            drivers: Mutex::new(Vec::new()),
            available: platform.create_semaphore(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Driver>>> {
        self.drivers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `driver` to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::AlreadyRegistered`] if this driver is already
    /// in the pool.
    pub fn register(&self, driver: Arc<Driver>) -> Result<()> {
        let mut drivers = self.lock();
        if drivers.iter().any(|d| Arc::ptr_eq(d, &driver)) {
            tracing::error!(driver = driver.id(), "Driver already registered");
            return Err(EthosuError::AlreadyRegistered { id: driver.id() });
        }
        tracing::info!(driver = driver.id(), "Driver registered");
        drivers.insert(0, driver);
        drop(drivers);
        self.available.give();
        Ok(())
    }

    /// Remove `driver` from the pool.
    ///
    /// A caller holding a reservation keeps its `Arc` and may finish.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::NotRegistered`] if the driver is not in the pool.
    pub fn deregister(&self, driver: &Arc<Driver>) -> Result<()> {
        let mut drivers = self.lock();
        let Some(index) = drivers.iter().position(|d| Arc::ptr_eq(d, driver)) else {
            tracing::error!(driver = driver.id(), "Driver not registered, cannot deregister");
            return Err(EthosuError::NotRegistered { id: driver.id() });
        };
        drivers.remove(index);
        tracing::info!(driver = driver.id(), "Driver deregistered");
        Ok(())
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no driver is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Reserve the first free driver without blocking.
    pub fn try_reserve(&self) -> Option<Arc<Driver>> {
        let drivers = self.lock();
        let found = drivers.iter().find(|d| {
            d.reserved
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        });
        match found {
            Some(driver) => {
                tracing::info!(driver = driver.id(), "Driver reserved");
                Some(Arc::clone(driver))
            }
            None => {
                tracing::info!("No available drivers");
                None
            }
        }
    }

    /// Reserve a driver, blocking until one is free.
    pub fn reserve(&self) -> Arc<Driver> {
        loop {
            if let Some(driver) = self.try_reserve() {
                return driver;
            }
            tracing::info!("Waiting for driver");
            self.available.take();
        }
    }

    /// Return a reserved driver to the pool and wake one waiter.
    ///
    /// Releasing a driver that is not reserved does nothing.
    pub fn release(&self, driver: &Driver) {
        let _drivers = self.lock();
        if driver
            .reserved
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!(driver = driver.id(), "Driver released");
            self.available.give();
        }
    }

    /// Reserve a driver, run `payload` on it, and release it.
    ///
    /// # Errors
    ///
    /// Whatever [`Driver::invoke`] returns.
    pub fn invoke(&self, payload: &[u8], bases: &[BaseRegion]) -> Result<()> {
        let reservation = Reservation {
            pool: self,
            driver: self.reserve(),
        };
        reservation.driver.invoke(payload, bases)
    }
}

impl Default for DriverPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DriverPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<usize> = self.lock().iter().map(|d| d.id()).collect();
        f.debug_struct("DriverPool").field("drivers", &ids).finish()
    }
}

/// Releases its driver when dropped, including on unwind.
struct Reservation<'a> {
    pool: &'a DriverPool,
    driver: Arc<Driver>,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.pool.release(&self.driver);
    }
}
