//! Ethos-U device handle and register-level operations
//!
//! `Device` owns the register window and the host-side shadow of the PMU
//! configuration. It knows nothing about payloads, interrupts or the pool;
//! those layers drive it through the methods below.
//!
//! # Lifecycle
//!
//! ```text
//! Device::new ──► Initialized ──soft_reset──► ResetInProgress ──► Ready
//!                                                   ▲               │
//!                                                   └─ HardwareFault┘
//! ```

use std::sync::Arc;

use ethosu_chip::memory::MemoryType;
use ethosu_chip::pmu::NCOUNTERS;
use ethosu_chip::regs::{self, axi_limit, cmd, config, id, prot, regioncfg, reset, status};

use crate::config::{AxiLimit, ResetPolicy, Security};
use crate::error::{EthosuError, Result};
use crate::mmio::RegisterIo;
use crate::platform::Platform;

/// Hardware identification decoded from the `ID` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NpuId {
    /// Version status
    pub version_status: u32,
    /// Version minor
    pub version_minor: u32,
    /// Version major
    pub version_major: u32,
    /// Product major
    pub product_major: u32,
    /// Architecture patch revision
    pub arch_patch_rev: u32,
    /// Architecture minor revision
    pub arch_minor_rev: u32,
    /// Architecture major revision
    pub arch_major_rev: u32,
}

impl NpuId {
    /// Decode an `ID` word.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self {
            version_status: id::VERSION_STATUS.get(word),
            version_minor: id::VERSION_MINOR.get(word),
            version_major: id::VERSION_MAJOR.get(word),
            product_major: id::PRODUCT_MAJOR.get(word),
            arch_patch_rev: id::ARCH_PATCH.get(word),
            arch_minor_rev: id::ARCH_MINOR.get(word),
            arch_major_rev: id::ARCH_MAJOR.get(word),
        }
    }
}

/// Hardware capabilities decoded from the `CONFIG` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NpuConfig {
    /// log2 of MACs per clock cycle
    pub macs_per_cc: u32,
    /// Command stream version
    pub cmd_stream_version: u32,
    /// SHRAM size in KiB
    pub shram_size: u32,
    /// Custom DMA present
    pub custom_dma: bool,
}

impl NpuConfig {
    /// Decode a `CONFIG` word.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self {
            macs_per_cc: config::MACS_PER_CC.get(word),
            cmd_stream_version: config::CMD_STREAM_VERSION.get(word),
            shram_size: config::SHRAM_SIZE.get(word),
            custom_dma: config::CUSTOM_DMA.is_set(word),
        }
    }
}

/// Device lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Register window attached, PMU configuration captured
    Initialized,
    /// Reset written, waiting for completion
    ResetInProgress,
    /// Reset complete with the requested security state
    Ready,
    /// Error status observed; cleared by the next successful reset
    HardwareFault,
}

/// Host-side copy of PMU registers that do not survive a reset or power-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmuShadow {
    /// `PMCR`
    pub pmcr: u32,
    /// `PMCCNTR_LO` / `PMCCNTR_HI`
    pub pmccntr: [u32; 2],
    /// `PMCNTENSET`
    pub pmcnten: u32,
    /// `PMINTSET`
    pub pmint: u32,
    /// `PMCCNTR_CFG`
    pub pmccntr_cfg: u32,
    /// `PMEVTYPERn`
    pub pmu_evtypr: [u32; NCOUNTERS],
    /// `PMEVCNTRn`
    pub pmu_evcntr: [u32; NCOUNTERS],
}

/// Ethos-U device
///
/// Exclusively owns its register window for its whole lifetime.
pub struct Device {
    io: Box<dyn RegisterIo>,
    security: Security,
    reset_policy: ResetPolicy,
    platform: Arc<dyn Platform>,
    proto: u32,
    state: DeviceState,
    pub(crate) pmu: PmuShadow,
}

impl Device {
    /// Attach to a register window and capture the PMU configuration.
    pub fn new(
        io: Box<dyn RegisterIo>,
        security: Security,
        reset_policy: ResetPolicy,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let mut dev = Self {
            io,
            security,
            reset_policy,
            platform,
            proto: 0,
            state: DeviceState::Initialized,
            pmu: PmuShadow::default(),
        };
        dev.save_pmu_config();
        tracing::debug!(?security, "Device initialized");
        dev
    }

    // ── Raw register access ──────────────────────────────────────────────────

    /// Read a register.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not 4-byte aligned.
    pub fn read_reg(&self, offset: usize) -> u32 {
        assert!(offset % 4 == 0, "Register offset {offset:#x} not 4-byte aligned");
        self.io.read32(offset)
    }

    /// Write a register.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not 4-byte aligned.
    pub fn write_reg(&self, offset: usize, value: u32) {
        assert!(offset % 4 == 0, "Register offset {offset:#x} not 4-byte aligned");
        self.io.write32(offset, value);
    }

    /// Write a register and return what it reads back, for storing in a shadow.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not 4-byte aligned.
    pub fn write_reg_shadow(&self, offset: usize, value: u32) -> u32 {
        self.write_reg(offset, value);
        self.read_reg(offset)
    }

    // ── Identification ───────────────────────────────────────────────────────

    /// Decode the `ID` register.
    pub fn id(&self) -> NpuId {
        NpuId::from_word(self.read_reg(regs::ID))
    }

    /// Decode the `CONFIG` register.
    pub fn config(&self) -> NpuConfig {
        NpuConfig::from_word(self.read_reg(regs::CONFIG))
    }

    /// Raw `REVISION` register.
    pub fn revision(&self) -> u32 {
        self.read_reg(regs::REVISION)
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// Requested security state.
    pub const fn security(&self) -> Security {
        self.security
    }

    /// `PROT` word saved after the last successful reset.
    pub const fn proto(&self) -> u32 {
        self.proto
    }

    /// True if the live `PROT` word still matches the one saved at reset.
    pub fn prot_matches(&self) -> bool {
        self.read_reg(regs::PROT) == self.proto
    }

    // ── Reset ────────────────────────────────────────────────────────────────

    /// RESET word for the requested security state.
    fn reset_word(&self) -> u32 {
        let cpl = u32::from(self.security.privileged);
        let csl = u32::from(!self.security.secure);
        reset::PENDING_CPL.encode(cpl) | reset::PENDING_CSL.encode(csl)
    }

    /// Reset the NPU into the requested security state.
    ///
    /// Hardware PMU counters read zero after a reset; their shadows keep
    /// the last values seen.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::Timeout`] if the reset does not complete and
    /// [`EthosuError::SecurityMismatch`] if the NPU came up in a different
    /// privilege or security state.
    pub fn soft_reset(&mut self) -> Result<()> {
        let word = self.reset_word();
        tracing::info!(reset = format_args!("{word:#x}"), "Soft reset NPU");
        self.write_reg(regs::RESET, word);
        self.state = DeviceState::ResetInProgress;

        if let Err(e) = self.wait_for_reset() {
            tracing::error!("Soft reset timed out");
            return Err(e);
        }

        let active = self.read_reg(regs::PROT);
        if prot::ACTIVE_CPL.get(active) != reset::PENDING_CPL.get(word)
            || prot::ACTIVE_CSL.get(active) != reset::PENDING_CSL.get(word)
        {
            tracing::error!("Failed to switch security state and privilege level");
            return Err(EthosuError::SecurityMismatch {
                requested: word,
                active,
            });
        }

        self.proto = active;
        self.save_pmu_counters();
        self.state = DeviceState::Ready;
        Ok(())
    }

    /// Poll `STATUS` until the reset bit clears.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::Timeout`] after `ResetPolicy::max_polls` reads.
    pub fn wait_for_reset(&mut self) -> Result<()> {
        let max_polls = self.reset_policy.max_polls;
        for poll in 0..max_polls {
            if !status::RESET_STATUS.is_set(self.read_reg(regs::STATUS)) {
                tracing::debug!(polls = poll + 1, "Reset complete");
                if self.state == DeviceState::ResetInProgress {
                    self.state = DeviceState::Ready;
                }
                return Ok(());
            }
            self.platform.reset_backoff(poll);
        }
        Err(EthosuError::Timeout { polls: max_polls })
    }

    // ── Status and interrupts ────────────────────────────────────────────────

    /// Raw `STATUS` word.
    pub fn status(&self) -> u32 {
        self.read_reg(regs::STATUS)
    }

    /// Low 16 bits of `STATUS`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn status_mask(&self) -> u16 {
        (self.status() & 0xFFFF) as u16
    }

    /// Interrupt history bits from `STATUS`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn irq_history_mask(&self) -> u16 {
        status::IRQ_HISTORY_MASK.get(self.status()) as u16
    }

    /// Current `CMD` clock / power bits, to be preserved by command writes.
    fn cmd_q_bits(&self) -> u32 {
        let old = self.read_reg(regs::CMD);
        old & (cmd::CLOCK_Q_ENABLE.in_place() | cmd::POWER_Q_ENABLE.in_place())
    }

    /// Clear bits of the interrupt history.
    pub fn clear_irq_history_mask(&self, mask: u16) {
        let word = self.cmd_q_bits() | cmd::CLEAR_IRQ_HISTORY.encode(u32::from(mask));
        self.write_reg(regs::CMD, word);
        tracing::debug!("CMD={word:#010x}");
    }

    /// True if the NPU has an interrupt pending.
    pub fn is_irq_raised(&self) -> bool {
        status::IRQ_RAISED.is_set(self.status())
    }

    /// Acknowledge the pending interrupt.
    pub fn clear_irq_status(&self) {
        let word = self.cmd_q_bits() | cmd::CLEAR_IRQ.in_place();
        self.write_reg(regs::CMD, word);
        tracing::debug!("CMD={word:#010x}");
    }

    /// True if any of bus error, parse error, watchdog or ECC fault is set.
    pub fn status_has_error(&self) -> bool {
        self.status() & status::ERROR_MASK != 0
    }

    /// Record that an error status was observed.
    pub(crate) fn mark_fault(&mut self) {
        self.state = DeviceState::HardwareFault;
    }

    // ── Command queue ────────────────────────────────────────────────────────

    /// Byte offset of the next command the NPU will read.
    pub fn qread(&self) -> u32 {
        self.read_reg(regs::QREAD)
    }

    /// Start the programmed command stream.
    pub fn set_command_run(&self) {
        let word = self.cmd_q_bits() | cmd::TRANSITION_TO_RUNNING_STATE.in_place();
        self.write_reg(regs::CMD, word);
        tracing::debug!("CMD={word:#010x}");
    }

    /// Program queue and base pointers, then start the NPU.
    ///
    /// Addresses are used as given; translation and offsets are the
    /// caller's business.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] for more than 8 base pointers,
    /// addresses wider than 48 bits, or a stream longer than `u32::MAX`
    /// bytes. Nothing is written in that case.
    pub fn run_command_stream(&self, qbase: u64, qsize: usize, base_addrs: &[u64]) -> Result<()> {
        if base_addrs.len() > regs::BASEP_COUNT {
            return Err(EthosuError::invalid_param(format!(
                "{} base addresses, at most {}",
                base_addrs.len(),
                regs::BASEP_COUNT
            )));
        }
        if let Some(addr) = std::iter::once(&qbase)
            .chain(base_addrs)
            .find(|&&a| a > regs::ADDRESS_MASK)
        {
            return Err(EthosuError::invalid_param(format!(
                "address {addr:#x} exceeds 48 bits"
            )));
        }
        let qsize = u32::try_from(qsize)
            .map_err(|_| EthosuError::invalid_param(format!("stream of {qsize} bytes")))?;

        tracing::debug!("QBASE={qbase:#018x}, QSIZE={qsize}");
        self.write_reg(regs::QBASE_LO, lo32(qbase));
        self.write_reg(regs::QBASE_HI, hi32(qbase));
        self.write_reg(regs::QSIZE, qsize);

        for (i, &addr) in base_addrs.iter().enumerate() {
            tracing::debug!("BASEP{i}={addr:#018x}");
            self.write_reg(regs::basep_lo(i), lo32(addr));
            self.write_reg(regs::basep_hi(i), hi32(addr));
        }

        self.set_command_run();
        Ok(())
    }

    // ── Configuration ────────────────────────────────────────────────────────

    /// Set the memory type used for command stream fetches.
    pub fn set_qconfig(&self, memory_type: MemoryType) {
        self.write_reg(regs::QCONFIG, memory_type.raw());
        tracing::debug!("QCONFIG={:#010x}", memory_type.raw());
    }

    /// [`set_qconfig`](Self::set_qconfig) from a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `raw` is not a memory type.
    pub fn set_qconfig_raw(&self, raw: u32) -> Result<()> {
        self.set_qconfig(memory_type(raw)?);
        Ok(())
    }

    /// Assign a memory type to `region` (0..8).
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `region > 7`; the register
    /// is not touched.
    pub fn set_regioncfg(&self, region: usize, memory_type: MemoryType) -> Result<()> {
        if region >= regs::REGION_COUNT {
            return Err(EthosuError::invalid_param(format!("region {region}")));
        }
        let field = regioncfg::region(region);
        let word = field.insert(self.read_reg(regs::REGIONCFG), memory_type.raw());
        self.write_reg(regs::REGIONCFG, word);
        tracing::debug!("REGIONCFG{region}={word:#010x}");
        Ok(())
    }

    /// [`set_regioncfg`](Self::set_regioncfg) from a raw memory type.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] for an invalid region or
    /// memory type; the register is not touched.
    pub fn set_regioncfg_raw(&self, region: usize, raw: u32) -> Result<()> {
        self.set_regioncfg(region, memory_type(raw)?)
    }

    /// Program `AXI_LIMIT{index}`.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `index > 3` or the
    /// outstanding transaction counts fall outside 1..=32 (reads) /
    /// 1..=16 (writes); the register is not touched.
    pub fn set_axi_limit(&self, index: usize, limit: &AxiLimit) -> Result<()> {
        let Some(&offset) = regs::AXI_LIMIT.get(index) else {
            return Err(EthosuError::invalid_param(format!("AXI limit {index}")));
        };
        let reads_m1 = limit.max_reads.wrapping_sub(1);
        let writes_m1 = limit.max_writes.wrapping_sub(1);
        if !axi_limit::MAX_OUTSTANDING_READ_M1.fits(reads_m1) {
            return Err(EthosuError::invalid_param(format!(
                "max_reads {}",
                limit.max_reads
            )));
        }
        if !axi_limit::MAX_OUTSTANDING_WRITE_M1.fits(writes_m1) {
            return Err(EthosuError::invalid_param(format!(
                "max_writes {}",
                limit.max_writes
            )));
        }
        let word = axi_limit::MAX_BEATS.encode(limit.max_beats as u32)
            | axi_limit::MEMTYPE.encode(limit.memtype as u32)
            | axi_limit::MAX_OUTSTANDING_READ_M1.encode(reads_m1)
            | axi_limit::MAX_OUTSTANDING_WRITE_M1.encode(writes_m1);
        self.write_reg(offset, word);
        tracing::debug!("AXI_LIMIT{index}={word:#010x}");
        Ok(())
    }

    /// Set the clock and power gating permissions in `CMD`.
    ///
    /// `true` allows the NPU to gate the resource when idle.
    pub fn set_clock_and_power(&self, clock_q_enable: bool, power_q_enable: bool) {
        let word = cmd::CLOCK_Q_ENABLE.encode(u32::from(clock_q_enable))
            | cmd::POWER_Q_ENABLE.encode(u32::from(power_q_enable));
        self.write_reg(regs::CMD, word);
        tracing::debug!("CMD={word:#010x}");
    }

    // ── Diagnostic reads ─────────────────────────────────────────────────────

    /// Read `count` consecutive registers starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::InvalidParam`] if `start` is misaligned or the
    /// range leaves the register window.
    pub fn read_apb_reg(&self, start: usize, count: usize) -> Result<Vec<u32>> {
        let end = count.checked_mul(4).and_then(|n| n.checked_add(start));
        if start % 4 != 0 || !matches!(end, Some(end) if end <= regs::WINDOW_SIZE) {
            return Err(EthosuError::invalid_param(format!(
                "APB range {start:#x} + {count} registers"
            )));
        }
        Ok((0..count).map(|i| self.read_reg(start + i * 4)).collect())
    }

    /// Read 1 KiB window `section` of SHRAM.
    pub fn get_shram_data(&self, section: usize) -> Vec<u32> {
        #[allow(clippy::cast_possible_truncation)]
        let window = (section * regs::SHRAM_WINDOW) as u32;
        self.write_reg(regs::DEBUG_ADDRESS, window);
        (0..regs::SHRAM_WINDOW / 4)
            .map(|i| self.read_reg(regs::SHARED_BUFFER + i * 4))
            .collect()
    }

    // ── PMU save / restore ───────────────────────────────────────────────────

    /// Capture PMU configuration registers into the shadow.
    pub fn save_pmu_config(&mut self) {
        self.pmu.pmcr = self.read_reg(regs::PMCR);
        self.pmu.pmint = self.read_reg(regs::PMINTSET);
        self.pmu.pmcnten = self.read_reg(regs::PMCNTENSET);
        self.pmu.pmccntr_cfg = self.read_reg(regs::PMCCNTR_CFG);
        for i in 0..NCOUNTERS {
            self.pmu.pmu_evtypr[i] = self.read_reg(regs::pmevtyper(i));
        }
    }

    /// Write the shadowed PMU configuration back to the hardware.
    pub fn restore_pmu_config(&self) {
        self.write_reg(regs::PMCR, self.pmu.pmcr);
        self.write_reg(regs::PMINTSET, self.pmu.pmint);
        self.write_reg(regs::PMCNTENSET, self.pmu.pmcnten);
        self.write_reg(regs::PMCCNTR_CFG, self.pmu.pmccntr_cfg);
        for i in 0..NCOUNTERS {
            self.write_reg(regs::pmevtyper(i), self.pmu.pmu_evtypr[i]);
        }
    }

    /// Fold the live PMU counters into the shadow.
    ///
    /// A shadow only moves forward here; counters that read lower than
    /// their shadow (after a reset or power loss) keep the shadow value.
    pub fn save_pmu_counters(&mut self) {
        let lo = self.read_reg(regs::PMCCNTR_LO);
        let hi = self.read_reg(regs::PMCCNTR_HI);
        let [shadow_lo, shadow_hi] = self.pmu.pmccntr;
        if (hi, lo) > (shadow_hi, shadow_lo) {
            self.pmu.pmccntr = [lo, hi];
        }
        for i in 0..NCOUNTERS {
            let value = self.read_reg(regs::pmevcntr(i));
            self.pmu.pmu_evcntr[i] = self.pmu.pmu_evcntr[i].max(value);
        }
    }

    /// PMU shadow snapshot.
    pub const fn pmu_shadow(&self) -> &PmuShadow {
        &self.pmu
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("io", &self.io)
            .field("security", &self.security)
            .field("state", &self.state)
            .field("proto", &format_args!("{:#x}", self.proto))
            .finish_non_exhaustive()
    }
}

fn memory_type(raw: u32) -> Result<MemoryType> {
    MemoryType::from_raw(raw)
        .ok_or_else(|| EthosuError::invalid_param(format!("memory type {raw}")))
}

#[allow(clippy::cast_possible_truncation)]
const fn lo32(v: u64) -> u32 {
    v as u32
}

#[allow(clippy::cast_possible_truncation)]
const fn hi32(v: u64) -> u32 {
    (v >> 32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HostedPlatform;
    use crate::sim::{SimConfig, SimulatedNpu};

    fn device(sim: &SimulatedNpu, security: Security) -> Device {
        Device::new(
            Box::new(sim.clone()),
            security,
            ResetPolicy::default(),
            Arc::new(HostedPlatform),
        )
    }

    #[test]
    fn decode_id_and_config() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let dev = device(&sim, Security::default());
        let id = dev.id();
        assert_eq!(id.arch_major_rev, 1);
        assert_eq!(id.product_major, 4);
        let cfg = dev.config();
        assert_eq!(cfg.macs_per_cc, SimConfig::default().macs_per_cc);
        assert_eq!(cfg.shram_size, SimConfig::default().shram_kib);
        assert!(!cfg.custom_dma);
    }

    #[test]
    fn soft_reset_applies_security() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let security = Security {
            secure: true,
            privileged: true,
        };
        let mut dev = device(&sim, security);
        dev.soft_reset().unwrap();
        assert_eq!(dev.state(), DeviceState::Ready);
        assert_eq!(prot::ACTIVE_CPL.get(dev.proto()), 1);
        assert_eq!(prot::ACTIVE_CSL.get(dev.proto()), 0);
        assert!(dev.prot_matches());
    }

    #[test]
    fn soft_reset_times_out_when_stuck() {
        let sim = SimulatedNpu::new(SimConfig {
            stuck_reset: true,
            ..SimConfig::default()
        });
        let mut dev = Device::new(
            Box::new(sim.clone()),
            Security::default(),
            ResetPolicy { max_polls: 50 },
            Arc::new(HostedPlatform),
        );
        assert!(matches!(dev.soft_reset(), Err(EthosuError::Timeout { polls: 50 })));
        assert_eq!(dev.state(), DeviceState::ResetInProgress);
    }

    #[test]
    fn soft_reset_detects_security_mismatch() {
        let sim = SimulatedNpu::new(SimConfig {
            force_prot: Some(0),
            ..SimConfig::default()
        });
        let mut dev = device(
            &sim,
            Security {
                secure: false,
                privileged: true,
            },
        );
        assert!(matches!(
            dev.soft_reset(),
            Err(EthosuError::SecurityMismatch { .. })
        ));
    }

    #[test]
    fn regioncfg_rejects_without_writing() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let dev = device(&sim, Security::default());
        sim.clear_writes();
        assert!(dev.set_regioncfg(8, MemoryType::Axi0Counter0).is_err());
        assert!(dev.set_regioncfg_raw(0, 4).is_err());
        assert!(dev.set_qconfig_raw(7).is_err());
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn axi_limit_validation() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let dev = device(&sim, Security::default());
        let ok = AxiLimit::default();
        dev.set_axi_limit(3, &ok).unwrap();
        assert_eq!(sim.peek(regs::AXI_LIMIT[3]), 0x0F1F_0000);

        sim.clear_writes();
        assert!(dev.set_axi_limit(4, &ok).is_err());
        let too_many_reads = AxiLimit {
            max_reads: 33,
            ..ok
        };
        assert!(dev.set_axi_limit(0, &too_many_reads).is_err());
        let zero_writes = AxiLimit {
            max_writes: 0,
            ..ok
        };
        assert!(dev.set_axi_limit(0, &zero_writes).is_err());
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn status_error_bits() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let dev = device(&sim, Security::default());
        assert!(!dev.status_has_error());
        sim.poke(regs::STATUS, status::WD_FAULT.in_place());
        assert!(dev.status_has_error());
        sim.poke(regs::STATUS, status::IRQ_RAISED.in_place());
        assert!(!dev.status_has_error());
        assert!(dev.is_irq_raised());
    }

    #[test]
    fn read_apb_reg_bounds() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let dev = device(&sim, Security::default());
        assert_eq!(dev.read_apb_reg(0x200, 4).unwrap().len(), 4);
        assert!(dev.read_apb_reg(0xFFC, 2).is_err());
        assert!(dev.read_apb_reg(0x202, 1).is_err());
    }

    #[test]
    fn run_command_stream_rejects_too_many_bases() {
        let sim = SimulatedNpu::new(SimConfig::default());
        let dev = device(&sim, Security::default());
        sim.clear_writes();
        assert!(dev.run_command_stream(0x1000, 16, &[0; 9]).is_err());
        assert!(dev.run_command_stream(1 << 48, 16, &[]).is_err());
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn shram_window_selection() {
        let sim = SimulatedNpu::new(SimConfig::default());
        sim.fill_shram(|i| i as u32);
        let dev = device(&sim, Security::default());
        let section = dev.get_shram_data(1);
        assert_eq!(section.len(), 256);
        assert_eq!(section[0], 256);
        assert_eq!(section[255], 511);
    }
}
