//! Interrupt handling and completion wait.
//!
//! The integrator wires the NPU interrupt line to [`Driver::irq_handler`].
//! The handler acknowledges the interrupt, recovers from error status, and
//! signals the waiting caller through the driver semaphore.

use std::sync::atomic::Ordering;

use crate::driver::Driver;

/// How a wait for command-stream completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The interrupt handler ran
    Completed,
    /// [`Driver::abort`] was called
    Aborted,
}

impl Driver {
    /// Entry point for the NPU interrupt.
    ///
    /// Safe to call from any thread. An interrupt with no raised status is
    /// logged and ignored without waking the waiter.
    pub fn irq_handler(&self) {
        let mut core = self.lock_core();
        let status = core.dev.status();
        tracing::debug!(
            driver = self.id(),
            status = format_args!("{status:#010x}"),
            qread = core.dev.qread(),
            "Interrupt"
        );

        if !core.dev.is_irq_raised() {
            tracing::warn!(driver = self.id(), "Spurious interrupt, IRQ not raised");
            return;
        }

        self.irq_triggered.store(true, Ordering::Release);
        core.dev.clear_irq_status();
        if core.dev.is_irq_raised() {
            tracing::warn!(driver = self.id(), "IRQ still raised after clear");
        }

        if core.dev.status_has_error() {
            tracing::error!(
                driver = self.id(),
                status = format_args!("{status:#010x}"),
                "NPU error status, resetting"
            );
            self.fault_status.store(status, Ordering::Release);
            core.dev.mark_fault();
            if let Err(e) = core.soft_reset_and_restore() {
                tracing::error!(driver = self.id(), "Recovery reset failed: {e}");
            }
            self.status_error.store(true, Ordering::Release);
        }
        drop(core);

        self.semaphore.give();
    }

    /// Block until the interrupt handler runs or the inference is aborted.
    ///
    /// Consumes the triggered flag. The abort flag stays set until the next
    /// command stream starts.
    pub fn wait_for_irq(&self) -> WaitOutcome {
        loop {
            if self.irq_triggered.swap(false, Ordering::AcqRel) {
                return WaitOutcome::Completed;
            }
            if self.abort_inference.load(Ordering::Acquire) {
                return WaitOutcome::Aborted;
            }
            self.semaphore.take();
        }
    }

    /// Abort the inference in progress.
    ///
    /// Wakes a caller blocked in [`wait_for_irq`](Self::wait_for_irq). The
    /// NPU itself is not stopped or reset. The next command stream
    /// reprograms the queue and starts it again; it only soft-resets the
    /// NPU first if the `PROT` word no longer matches the one saved at the
    /// last reset.
    pub fn abort(&self) {
        tracing::warn!(driver = self.id(), "Abort requested");
        self.abort_inference.store(true, Ordering::Release);
        self.semaphore.give();
    }

    /// True once [`abort`](Self::abort) has been called for the current stream.
    pub fn abort_requested(&self) -> bool {
        self.abort_inference.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::sim::{SimConfig, SimulatedNpu};
    use ethosu_chip::regs::{self, status};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn driver() -> (SimulatedNpu, Arc<Driver>) {
        let sim = SimulatedNpu::new(SimConfig::default());
        let drv = Driver::init_hosted(Box::new(sim.clone()), DriverConfig::default()).unwrap();
        (sim, Arc::new(drv))
    }

    #[test]
    fn spurious_interrupt_is_ignored() {
        let (sim, drv) = driver();
        sim.clear_writes();
        drv.irq_handler();
        assert!(!drv.irq_triggered.load(Ordering::Acquire));
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn handler_wakes_waiter() {
        let (sim, drv) = driver();
        let waiter = {
            let drv = Arc::clone(&drv);
            thread::spawn(move || drv.wait_for_irq())
        };
        thread::sleep(Duration::from_millis(20));
        sim.poke(regs::STATUS, status::IRQ_RAISED.in_place());
        drv.irq_handler();
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Completed);
        assert!(!status::IRQ_RAISED.is_set(sim.peek(regs::STATUS)));
    }

    #[test]
    fn abort_wakes_waiter() {
        let (_sim, drv) = driver();
        let waiter = {
            let drv = Arc::clone(&drv);
            thread::spawn(move || drv.wait_for_irq())
        };
        thread::sleep(Duration::from_millis(20));
        drv.abort();
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Aborted);
        assert!(drv.abort_requested());
    }

    #[test]
    fn abort_before_wait_returns_immediately() {
        let (_sim, drv) = driver();
        drv.abort();
        assert_eq!(drv.wait_for_irq(), WaitOutcome::Aborted);
    }

    #[test]
    fn error_status_resets_and_flags() {
        let (sim, drv) = driver();
        sim.poke(
            regs::STATUS,
            status::IRQ_RAISED.in_place() | status::BUS_STATUS.in_place(),
        );
        let resets = sim.reset_count();
        drv.irq_handler();
        assert!(drv.status_error.load(Ordering::Acquire));
        assert_eq!(sim.reset_count(), resets + 1);
        assert_ne!(drv.fault_status.load(Ordering::Acquire) & status::BUS_STATUS.in_place(), 0);
        assert_eq!(drv.wait_for_irq(), WaitOutcome::Completed);
    }
}
