//! Performance monitoring unit.
//!
//! Counters live in NPU registers that read zero after a reset or power
//! loss. Every getter reconciles the hardware value with the shadow kept in
//! [`Device`](crate::Device): the larger of the two is returned, and the
//! shadow only moves forward. Counter values therefore never go backwards
//! across resets or power cycles; only the explicit resets and setters
//! below move them down.
//!
//! ```no_run
//! # use ethosu_driver::{Driver, PmuEvent};
//! # fn f(drv: &Driver) -> ethosu_driver::Result<()> {
//! let mut pmu = drv.pmu();
//! pmu.enable();
//! pmu.set_event_type(0, PmuEvent::NpuActive)?;
//! pmu.counter_enable(ethosu_driver::counter_mask(0));
//! # Ok(()) }
//! ```

use std::sync::MutexGuard;

use ethosu_chip::pmu::{PmuEvent, CCNT_MASK, NCOUNTERS};
use ethosu_chip::regs::{self, pmccntr_cfg, pmcr, CYCLE_COUNTER_MASK};

use crate::driver::{Driver, DriverCore};
use crate::error::{EthosuError, Result};
use crate::power::{Client, Request};

impl Driver {
    /// Exclusive handle on the PMU.
    ///
    /// Holds the device lock until dropped.
    pub fn pmu(&self) -> Pmu<'_> {
        Pmu {
            core: self.lock_core(),
        }
    }
}

/// PMU access, borrowed from a [`Driver`].
pub struct Pmu<'a> {
    core: MutexGuard<'a, DriverCore>,
}

fn check_index(index: usize) -> Result<()> {
    if index < NCOUNTERS {
        Ok(())
    } else {
        Err(EthosuError::invalid_param(format!(
            "PMU counter {index}, have {NCOUNTERS}"
        )))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn split(value: u64) -> (u32, u32) {
    let value = value & CYCLE_COUNTER_MASK;
    (value as u32, (value >> 32) as u32)
}

fn join(lo: u32, hi: u32) -> u64 {
    (u64::from(hi) << 32) | u64::from(lo)
}

impl Pmu<'_> {
    // ── Global control ───────────────────────────────────────────────────────

    /// Start counting. Holds NPU clock and power for the PMU.
    pub fn enable(&mut self) {
        tracing::debug!("PMU enable");
        let word = pmcr::CNT_EN.insert(self.core.dev.pmu.pmcr, 1);
        self.core.request_power(Client::Pmu, Request::Hold, Request::Hold);
        self.core.dev.pmu.pmcr = self.core.dev.write_reg_shadow(regs::PMCR, word);
    }

    /// Stop counting. Releases the PMU's clock and power hold.
    pub fn disable(&mut self) {
        tracing::debug!("PMU disable");
        let word = pmcr::CNT_EN.insert(self.core.dev.pmu.pmcr, 0);
        self.core
            .request_power(Client::Pmu, Request::Release, Request::Release);
        self.core.dev.pmu.pmcr = self.core.dev.write_reg_shadow(regs::PMCR, word);
    }

    /// Zero the cycle counter.
    pub fn reset_cycle_counter(&mut self) {
        tracing::debug!("PMU cycle counter reset");
        let word = pmcr::CYCLE_CNT_RST.insert(self.core.dev.pmu.pmcr, 1);
        self.core.dev.pmu.pmcr = self.core.dev.write_reg_shadow(regs::PMCR, word);
        self.core.dev.pmu.pmccntr = [0; 2];
    }

    /// Zero all event counters.
    pub fn reset_event_counters(&mut self) {
        tracing::debug!("PMU event counters reset");
        let word = pmcr::EVENT_CNT_RST.insert(self.core.dev.pmu.pmcr, 1);
        self.core.dev.pmu.pmcr = self.core.dev.write_reg_shadow(regs::PMCR, word);
        self.core.dev.pmu.pmu_evcntr = [0; NCOUNTERS];
    }

    // ── Event types ──────────────────────────────────────────────────────────

    /// Select what counter `index` counts.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `index` is out of range.
    pub fn set_event_type(&mut self, index: usize, event: PmuEvent) -> Result<()> {
        check_index(index)?;
        let hw_id = event.hw_id();
        tracing::debug!(index, event = event.name(), hw_id, "PMU set event type");
        self.core.dev.pmu.pmu_evtypr[index] =
            self.core.dev.write_reg_shadow(regs::pmevtyper(index), hw_id);
        Ok(())
    }

    /// Event counted by counter `index`, `None` if the hardware id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `index` is out of range.
    pub fn event_type(&self, index: usize) -> Result<Option<PmuEvent>> {
        check_index(index)?;
        let hw_id = self.core.dev.pmu.pmu_evtypr[index];
        let event = PmuEvent::from_hw_id(hw_id);
        if event.is_none() {
            tracing::error!(index, "Unknown PMU event id {hw_id:#x}");
        }
        Ok(event)
    }

    // ── Counter values ───────────────────────────────────────────────────────

    /// Value of event counter `index`, never less than any earlier reading.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `index` is out of range.
    pub fn event_counter(&mut self, index: usize) -> Result<u32> {
        check_index(index)?;
        Ok(self.read_event_counter(index))
    }

    fn read_event_counter(&mut self, index: usize) -> u32 {
        let value = self.core.dev.read_reg(regs::pmevcntr(index));
        let shadow = self.core.dev.pmu.pmu_evcntr[index];
        tracing::debug!(index, value, shadow, "PMU event counter");
        if shadow > value {
            return shadow;
        }
        self.core.dev.pmu.pmu_evcntr[index] = value;
        value
    }

    /// Write event counter `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `index` is out of range.
    pub fn set_event_counter(&mut self, index: usize, value: u32) -> Result<()> {
        check_index(index)?;
        tracing::debug!(index, value, "PMU set event counter");
        let dev = &mut self.core.dev;
        dev.pmu.pmu_evcntr[index] = dev.write_reg_shadow(regs::pmevcntr(index), value);
        Ok(())
    }

    /// 48-bit cycle counter, never less than any earlier reading.
    pub fn cycle_counter(&mut self) -> u64 {
        let lo = self.core.dev.read_reg(regs::PMCCNTR_LO);
        let hi = self.core.dev.read_reg(regs::PMCCNTR_HI);
        let value = join(lo, hi);
        let [shadow_lo, shadow_hi] = self.core.dev.pmu.pmccntr;
        let shadow = join(shadow_lo, shadow_hi);
        tracing::debug!(value, shadow, "PMU cycle counter");
        if shadow > value {
            return shadow;
        }
        self.core.dev.pmu.pmccntr = [lo, hi];
        value
    }

    /// Set the cycle counter. Bits above 47 are dropped.
    ///
    /// The counter is stopped while both halves are written and restarted
    /// afterwards if it was running.
    pub fn set_cycle_counter(&mut self, value: u64) {
        let active = self.counter_status() & CCNT_MASK != 0;
        tracing::debug!(value, active, "PMU set cycle counter");
        if active {
            self.counter_disable(CCNT_MASK);
        }
        self.write_cycle_counter(value);
        if active {
            self.counter_enable(CCNT_MASK);
        }
    }

    fn write_cycle_counter(&mut self, value: u64) {
        let (lo, hi) = split(value);
        let dev = &mut self.core.dev;
        dev.pmu.pmccntr[0] = dev.write_reg_shadow(regs::PMCCNTR_LO, lo);
        dev.pmu.pmccntr[1] = dev.write_reg_shadow(regs::PMCCNTR_HI, hi);
    }

    // ── Enable masks ─────────────────────────────────────────────────────────

    /// Enable the counters in `mask` (bit 31 = cycle counter).
    pub fn counter_enable(&mut self, mask: u32) {
        tracing::debug!("PMU counter enable {mask:#010x}");
        self.core.dev.pmu.pmcnten = self.core.dev.write_reg_shadow(regs::PMCNTENSET, mask);
    }

    /// Disable the counters in `mask`.
    pub fn counter_disable(&mut self, mask: u32) {
        tracing::debug!("PMU counter disable {mask:#010x}");
        self.core.dev.pmu.pmcnten = self.core.dev.write_reg_shadow(regs::PMCNTENCLR, mask);
    }

    /// Mask of enabled counters.
    pub fn counter_status(&self) -> u32 {
        self.core.dev.pmu.pmcnten
    }

    // ── Overflow and interrupts ──────────────────────────────────────────────

    /// Overflow flags.
    pub fn overflow_status(&self) -> u32 {
        self.core.dev.read_reg(regs::PMOVSSET)
    }

    /// Clear the overflow flags in `mask`.
    pub fn clear_overflow(&mut self, mask: u32) {
        self.core.dev.write_reg(regs::PMOVSCLR, mask);
    }

    /// Raise an interrupt when a counter in `mask` overflows.
    pub fn irq_enable(&mut self, mask: u32) {
        tracing::debug!("PMU irq enable {mask:#010x}");
        self.core.dev.pmu.pmint = self.core.dev.write_reg_shadow(regs::PMINTSET, mask);
    }

    /// Stop raising overflow interrupts for `mask`.
    pub fn irq_disable(&mut self, mask: u32) {
        tracing::debug!("PMU irq disable {mask:#010x}");
        self.core.dev.pmu.pmint = self.core.dev.write_reg_shadow(regs::PMINTCLR, mask);
    }

    /// Mask of counters with overflow interrupts enabled.
    pub fn irq_enabled(&self) -> u32 {
        self.core.dev.pmu.pmint
    }

    // ── Software increment ───────────────────────────────────────────────────

    /// Add one to each counter in `mask`.
    ///
    /// The selected counters are stopped during the update; counters that
    /// were running are restarted afterwards.
    pub fn increment(&mut self, mask: u32) {
        let active = self.counter_status();
        self.counter_disable(mask);

        if mask & CCNT_MASK != 0 {
            let value = self.cycle_counter() + 1;
            self.write_cycle_counter(value);
        }

        for index in 0..NCOUNTERS {
            if mask & (1 << index) != 0 {
                let value = self.read_event_counter(index);
                let dev = &mut self.core.dev;
                dev.pmu.pmu_evcntr[index] =
                    dev.write_reg_shadow(regs::pmevcntr(index), value.wrapping_add(1));
            }
        }

        self.counter_enable(active);
    }

    // ── Cycle counter start / stop ───────────────────────────────────────────

    /// Event that starts the cycle counter.
    pub fn set_cycle_start_event(&mut self, event: PmuEvent) {
        tracing::debug!(event = event.name(), "PMU cycle start event");
        let word = pmccntr_cfg::START_EVENT.insert(self.core.dev.pmu.pmccntr_cfg, event.hw_id());
        self.core.dev.pmu.pmccntr_cfg = self.core.dev.write_reg_shadow(regs::PMCCNTR_CFG, word);
    }

    /// Event that stops the cycle counter.
    pub fn set_cycle_stop_event(&mut self, event: PmuEvent) {
        tracing::debug!(event = event.name(), "PMU cycle stop event");
        let word = pmccntr_cfg::STOP_EVENT.insert(self.core.dev.pmu.pmccntr_cfg, event.hw_id());
        self.core.dev.pmu.pmccntr_cfg = self.core.dev.write_reg_shadow(regs::PMCCNTR_CFG, word);
    }
}

impl std::fmt::Debug for Pmu<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pmu")
            .field("shadow", self.core.dev.pmu_shadow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::sim::{SimConfig, SimulatedNpu};
    use ethosu_chip::pmu::counter_mask;
    use ethosu_chip::regs::cmd;

    fn driver() -> (SimulatedNpu, Driver) {
        let sim = SimulatedNpu::new(SimConfig::default());
        let drv = Driver::init_hosted(Box::new(sim.clone()), DriverConfig::default()).unwrap();
        (sim, drv)
    }

    #[test]
    fn out_of_range_index() {
        let (_sim, drv) = driver();
        let mut pmu = drv.pmu();
        assert!(matches!(
            pmu.set_event_type(4, PmuEvent::Cycle),
            Err(EthosuError::InvalidParam { .. })
        ));
        assert!(pmu.event_counter(NCOUNTERS).is_err());
        assert!(pmu.set_event_counter(9, 0).is_err());
        assert!(pmu.event_type(4).is_err());
    }

    #[test]
    fn event_type_round_trip() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        pmu.set_event_type(2, PmuEvent::MacActive).unwrap();
        assert_eq!(pmu.event_type(2).unwrap(), Some(PmuEvent::MacActive));
        assert_eq!(sim.peek(regs::pmevtyper(2)), PmuEvent::MacActive.hw_id());
        drop(pmu);

        sim.poke(regs::pmevtyper(1), 0x3FF);
        drv.with_device(crate::Device::save_pmu_config);
        assert_eq!(drv.pmu().event_type(1).unwrap(), None);
    }

    #[test]
    fn enable_holds_clock_and_power() {
        let (sim, drv) = driver();
        drv.with_device(|dev| dev.set_clock_and_power(true, true));
        let mut pmu = drv.pmu();
        pmu.enable();
        assert!(pmcr::CNT_EN.is_set(sim.peek(regs::PMCR)));
        let word = sim.peek(regs::CMD);
        assert!(!cmd::CLOCK_Q_ENABLE.is_set(word));
        assert!(!cmd::POWER_Q_ENABLE.is_set(word));

        pmu.disable();
        assert!(!pmcr::CNT_EN.is_set(sim.peek(regs::PMCR)));
    }

    #[test]
    fn event_counter_never_decreases() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        sim.poke(regs::pmevcntr(0), 100);
        assert_eq!(pmu.event_counter(0).unwrap(), 100);
        sim.poke(regs::pmevcntr(0), 0);
        assert_eq!(pmu.event_counter(0).unwrap(), 100);
        sim.poke(regs::pmevcntr(0), 150);
        assert_eq!(pmu.event_counter(0).unwrap(), 150);
    }

    #[test]
    fn cycle_counter_spans_both_halves() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        pmu.set_cycle_counter(0x1234_5678_9ABC);
        assert_eq!(sim.peek(regs::PMCCNTR_LO), 0x5678_9ABC);
        assert_eq!(sim.peek(regs::PMCCNTR_HI), 0x1234);
        assert_eq!(pmu.cycle_counter(), 0x1234_5678_9ABC);

        pmu.set_cycle_counter(u64::MAX);
        assert_eq!(pmu.cycle_counter(), CYCLE_COUNTER_MASK);
    }

    #[test]
    fn set_cycle_counter_restores_enable() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        pmu.counter_enable(CCNT_MASK | counter_mask(1));
        sim.clear_writes();
        pmu.set_cycle_counter(42);
        assert_eq!(pmu.counter_status(), CCNT_MASK | counter_mask(1));

        let offsets: Vec<usize> = sim.writes().iter().map(|&(o, _)| o).collect();
        assert_eq!(
            offsets,
            [regs::PMCNTENCLR, regs::PMCCNTR_LO, regs::PMCCNTR_HI, regs::PMCNTENSET]
        );

        pmu.counter_disable(CCNT_MASK);
        sim.clear_writes();
        pmu.set_cycle_counter(7);
        assert_eq!(sim.writes().len(), 2);
        assert_eq!(pmu.counter_status(), counter_mask(1));
    }

    #[test]
    fn software_increment() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        pmu.counter_enable(counter_mask(0));
        sim.poke(regs::pmevcntr(0), 9);
        pmu.set_cycle_counter(99);
        pmu.increment(CCNT_MASK | counter_mask(0) | counter_mask(3));
        assert_eq!(pmu.event_counter(0).unwrap(), 10);
        assert_eq!(pmu.event_counter(3).unwrap(), 1);
        assert_eq!(pmu.cycle_counter(), 100);
        assert_eq!(pmu.counter_status(), counter_mask(0));
    }

    #[test]
    fn resets_clear_shadows() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        sim.poke(regs::pmevcntr(2), 5);
        assert_eq!(pmu.event_counter(2).unwrap(), 5);
        pmu.reset_event_counters();
        assert_eq!(pmu.event_counter(2).unwrap(), 0);
        assert!(!pmcr::EVENT_CNT_RST.is_set(sim.peek(regs::PMCR)));

        pmu.set_cycle_counter(1000);
        pmu.reset_cycle_counter();
        assert_eq!(pmu.cycle_counter(), 0);
    }

    #[test]
    fn overflow_and_irq_masks() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        pmu.irq_enable(counter_mask(0) | counter_mask(2));
        assert_eq!(pmu.irq_enabled(), 0b101);
        pmu.irq_disable(counter_mask(0));
        assert_eq!(pmu.irq_enabled(), 0b100);

        sim.poke(regs::PMOVSSET, 0b11);
        assert_eq!(pmu.overflow_status(), 0b11);
        pmu.clear_overflow(0b01);
        assert_eq!(pmu.overflow_status(), 0b10);
    }

    #[test]
    fn cycle_counter_events() {
        let (sim, drv) = driver();
        let mut pmu = drv.pmu();
        pmu.set_cycle_start_event(PmuEvent::NpuActive);
        pmu.set_cycle_stop_event(PmuEvent::NpuIdle);
        let word = sim.peek(regs::PMCCNTR_CFG);
        assert_eq!(pmccntr_cfg::START_EVENT.get(word), PmuEvent::NpuActive.hw_id());
        assert_eq!(pmccntr_cfg::STOP_EVENT.get(word), PmuEvent::NpuIdle.hw_id());
    }
}
