//! Payload dispatch: [`Driver::invoke`].
//!
//! ```text
//! invoke ─► header check ─► fast-memory substitution ─► inference_begin
//!        ─► for each record:
//!             OptimizerConfig  compare with ID / CONFIG
//!             CommandStream    align check ─► flush ─► power up ─► program + run
//!                              ─► wait_for_irq ─► fault / abort / qread check
//!                              ─► invalidate ─► power down
//!             ReadApbReg       hold power ─► log registers
//!             DumpShram        hold power ─► log SHRAM
//!             Nop
//!        ─► inference_end
//! ```
//!
//! A bad header fails before anything is read or written. Dispatch stops at
//! the first failing record; the error carries the record's byte offset.

use std::sync::atomic::Ordering;

use ethosu_chip::payload::{FAST_MEMORY_BASE_INDEX, STREAM_ALIGN};
use ethosu_chip::regs;

use crate::device::{NpuConfig, NpuId};
use crate::diagnostics;
use crate::driver::{Driver, DriverCore, RunState};
use crate::error::{EthosuError, Result};
use crate::irq::WaitOutcome;
use crate::payload::{DriverAction, PayloadReader, Record};
use crate::platform::CacheRegion;
use crate::power::{Client, Request};

/// A buffer the command stream refers to through a base pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseRegion {
    /// Address as seen by the CPU
    pub addr: u64,
    /// Size in bytes; `None` makes cache maintenance cover the whole cache
    pub size: Option<usize>,
}

impl BaseRegion {
    /// Region of known size.
    pub const fn new(addr: u64, size: usize) -> Self {
        Self {
            addr,
            size: Some(size),
        }
    }

    /// Region of unknown size.
    pub const fn unsized_at(addr: u64) -> Self {
        Self { addr, size: None }
    }
}

const fn is_aligned(addr: u64) -> bool {
    addr % STREAM_ALIGN as u64 == 0
}

impl Driver {
    /// Execute a "COP1" payload.
    ///
    /// `bases` are the base pointers used by command streams in the
    /// payload (at most 8). Concurrent calls on the same driver run one
    /// after another.
    ///
    /// # Errors
    ///
    /// Header and fast-memory problems are returned as is, before any
    /// register access. Failures of individual records are wrapped in
    /// [`EthosuError::RecordFailed`] with the record's byte offset.
    pub fn invoke(&self, payload: &[u8], bases: &[BaseRegion]) -> Result<()> {
        let _dispatch = self.lock_dispatch();
        tracing::info!(driver = self.id(), len = payload.len(), "Invoke");
        let reader = PayloadReader::new(payload).map_err(|e| {
            tracing::error!(driver = self.id(), "Rejected payload: {e}");
            e
        })?;
        let bases = self.substitute_fast_memory(bases)?;

        self.status_error.store(false, Ordering::Release);
        self.platform.inference_begin(self.id(), payload);
        let result = self.dispatch(reader, &bases);
        self.platform.inference_end(self.id(), payload);

        if let Err(e) = &result {
            tracing::error!(driver = self.id(), "Invoke failed: {e}");
        }
        result
    }

    fn substitute_fast_memory(&self, bases: &[BaseRegion]) -> Result<Vec<BaseRegion>> {
        let mut bases = bases.to_vec();
        let fast_memory = self.lock_core().config.fast_memory;
        if let (Some(fast), Some(region)) = (fast_memory, bases.get_mut(FAST_MEMORY_BASE_INDEX)) {
            if let Some(required) = region.size.filter(|&size| size > fast.size) {
                tracing::error!(
                    fast_memory_size = fast.size,
                    base_addr_size = required,
                    "Fast memory area too small"
                );
                return Err(EthosuError::FastMemoryTooSmall {
                    available: fast.size,
                    required,
                });
            }
            tracing::debug!(
                "Base {FAST_MEMORY_BASE_INDEX} {:#x} -> fast memory {:#x}",
                region.addr,
                fast.addr
            );
            region.addr = fast.addr;
        }
        Ok(bases)
    }

    fn dispatch(&self, reader: PayloadReader<'_>, bases: &[BaseRegion]) -> Result<()> {
        for record in reader {
            let record = record?;
            self.execute(&record, bases)
                .map_err(|e| EthosuError::record_failed(record.offset, e))?;
        }
        Ok(())
    }

    fn execute(&self, record: &Record<'_>, bases: &[BaseRegion]) -> Result<()> {
        match record.action {
            DriverAction::OptimizerConfig {
                rel_nbr,
                patch_nbr,
                config_word,
                id_word,
            } => {
                tracing::info!(offset = record.offset, "OPTIMIZER_CONFIG");
                tracing::info!("Optimizer release nbr: {rel_nbr} patch: {patch_nbr}");
                self.check_optimizer_config(
                    NpuConfig::from_word(config_word),
                    NpuId::from_word(id_word),
                )
            }
            DriverAction::CommandStream { stream } => {
                tracing::info!(offset = record.offset, words = stream.len() / 4, "COMMAND_STREAM");
                self.handle_command_stream(stream, bases)
            }
            DriverAction::ReadApbReg { start, count } => {
                tracing::info!(offset = record.offset, "READ_APB_REG");
                let values = self.with_power(|core| core.dev.read_apb_reg(start, count))?;
                for (i, value) in values.iter().enumerate() {
                    tracing::info!("NPU_REG ADDR {:#06x} = {value:#010x}", start + i * 4);
                }
                Ok(())
            }
            DriverAction::DumpShram => {
                tracing::info!(offset = record.offset, "DUMP_SHRAM");
                self.with_power(|core| diagnostics::dump_shram(&core.dev));
                Ok(())
            }
            DriverAction::Nop => {
                tracing::info!(offset = record.offset, "NOP");
                Ok(())
            }
        }
    }

    /// Run `f` with the NPU clock and power held for the inference client.
    fn with_power<R>(&self, f: impl FnOnce(&DriverCore) -> R) -> R {
        let mut core = self.lock_core();
        let gated = !core.config.power_always_on;
        if gated {
            core.request_power(Client::Inference, Request::Hold, Request::Hold);
        }
        let result = f(&core);
        if gated {
            core.request_power(Client::Inference, Request::Release, Request::Release);
        }
        result
    }

    // ── Optimizer config ─────────────────────────────────────────────────────

    fn check_optimizer_config(&self, model: NpuConfig, model_id: NpuId) -> Result<()> {
        let (npu, npu_id) = {
            let core = self.lock_core();
            (core.dev.config(), core.dev.id())
        };
        tracing::info!(
            "Optimizer config cmd_stream_version: {} macs_per_cc: {} shram_size: {} custom_dma: {}",
            model.cmd_stream_version,
            model.macs_per_cc,
            model.shram_size,
            model.custom_dma
        );
        tracing::info!(
            "Optimizer config Ethos-U version: {}.{}.{}",
            model_id.arch_major_rev,
            model_id.arch_minor_rev,
            model_id.arch_patch_rev
        );
        tracing::info!(
            "Ethos-U config cmd_stream_version: {} macs_per_cc: {} shram_size: {} custom_dma: {}",
            npu.cmd_stream_version,
            npu.macs_per_cc,
            npu.shram_size,
            npu.custom_dma
        );

        let mut fields = Vec::new();
        if npu.macs_per_cc != model.macs_per_cc {
            tracing::error!(
                "NPU config mismatch: npu.macs_per_cc={} optimizer.macs_per_cc={}",
                npu.macs_per_cc,
                model.macs_per_cc
            );
            fields.push("macs_per_cc");
        }
        if npu.shram_size != model.shram_size {
            tracing::error!(
                "NPU config mismatch: npu.shram_size={} optimizer.shram_size={}",
                npu.shram_size,
                model.shram_size
            );
            fields.push("shram_size");
        }
        if npu.cmd_stream_version != model.cmd_stream_version {
            tracing::error!(
                "NPU config mismatch: npu.cmd_stream_version={} optimizer.cmd_stream_version={}",
                npu.cmd_stream_version,
                model.cmd_stream_version
            );
            fields.push("cmd_stream_version");
        }
        if !npu.custom_dma && model.custom_dma {
            tracing::error!(
                "NPU config mismatch: npu.custom_dma={} optimizer.custom_dma={}",
                npu.custom_dma,
                model.custom_dma
            );
            fields.push("custom_dma");
        }
        if !fields.is_empty() {
            tracing::error!("Model was compiled for a different Ethos-U configuration");
        }

        if npu_id.arch_major_rev != model_id.arch_major_rev
            || npu_id.arch_minor_rev < model_id.arch_minor_rev
        {
            tracing::error!(
                "NPU arch mismatch: npu.arch={}.{}.{} optimizer.arch={}.{}.{}",
                npu_id.arch_major_rev,
                npu_id.arch_minor_rev,
                npu_id.arch_patch_rev,
                model_id.arch_major_rev,
                model_id.arch_minor_rev,
                model_id.arch_patch_rev
            );
            fields.push("architecture");
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(EthosuError::ConfigMismatch { fields })
        }
    }

    // ── Command stream ───────────────────────────────────────────────────────

    fn handle_command_stream(&self, stream: &[u8], bases: &[BaseRegion]) -> Result<()> {
        self.abort_inference.store(false, Ordering::Release);
        self.irq_triggered.store(false, Ordering::Release);
        self.set_run_state(RunState::Idle);

        if bases.len() > regs::BASEP_COUNT {
            tracing::error!("{} base addresses, at most {}", bases.len(), regs::BASEP_COUNT);
            return Err(EthosuError::invalid_param(format!(
                "{} base addresses",
                bases.len()
            )));
        }
        let qbase = stream.as_ptr() as u64;
        if !is_aligned(qbase) {
            tracing::error!("Command stream addr {qbase:#x} not aligned to 16 bytes");
            return Err(EthosuError::misaligned("Command stream", qbase));
        }
        let mut first_misaligned = None;
        for (i, base) in bases.iter().enumerate() {
            if !is_aligned(base.addr) {
                tracing::error!("Base addr {i}: {:#x} not aligned to 16 bytes", base.addr);
                first_misaligned.get_or_insert((i, base.addr));
            }
        }
        if let Some((i, addr)) = first_misaligned {
            return Err(EthosuError::misaligned(format!("Base {i}"), addr));
        }

        self.cache_maintenance(qbase, stream.len(), bases, Maintenance::Flush);

        let outcome = {
            let mut core = self.lock_core();
            if let Err(e) = start_command_stream(&mut core, qbase, stream.len(), bases) {
                if !core.config.power_always_on {
                    core.request_power(Client::Inference, Request::Release, Request::Release);
                }
                return Err(e);
            }
            self.set_run_state(RunState::Running);
            drop(core);
            self.wait_for_irq()
        };

        let mut core = self.lock_core();
        let result = self.finish_command_stream(&core, outcome, qbase, stream.len(), bases);

        if result.is_err() && self.abort_requested() {
            let qread = core.dev.qread();
            tracing::error!(driver = self.id(), "NPU timeout");
            diagnostics::dump_command_stream(&diagnostics::stream_words(stream), qread);
            diagnostics::dump_diagnostic_registers(&core.dev);
            diagnostics::dump_shram(&core.dev);
        }

        if !self.status_error.load(Ordering::Acquire) && !core.config.power_always_on {
            core.dev.save_pmu_counters();
            core.request_power(Client::Inference, Request::Release, Request::Release);
        }
        result
    }

    fn finish_command_stream(
        &self,
        core: &DriverCore,
        outcome: WaitOutcome,
        qbase: u64,
        len: usize,
        bases: &[BaseRegion],
    ) -> Result<()> {
        if self.status_error.load(Ordering::Acquire) {
            self.set_run_state(RunState::Faulted);
            return Err(EthosuError::HardwareFault {
                status: self.fault_status.load(Ordering::Acquire),
            });
        }
        if outcome == WaitOutcome::Aborted {
            self.set_run_state(RunState::Aborted);
            return Err(EthosuError::Aborted);
        }
        self.set_run_state(RunState::Completed);

        self.cache_maintenance(qbase, len, bases, Maintenance::Invalidate);

        let qread = core.dev.qread();
        let expected = u32::try_from(len).unwrap_or(u32::MAX);
        if qread != expected {
            tracing::warn!("IRQ received but qread ({qread}) not at end of stream ({expected})");
            return Err(EthosuError::StreamIncomplete { qread, expected });
        }
        Ok(())
    }

    fn cache_maintenance(&self, qbase: u64, len: usize, bases: &[BaseRegion], op: Maintenance) {
        let apply = |region: Option<CacheRegion>| match op {
            Maintenance::Flush => self.platform.flush_dcache(region),
            Maintenance::Invalidate => self.platform.invalidate_dcache(region),
        };
        if bases.iter().any(|b| b.size.is_none()) {
            apply(None);
            return;
        }
        if op == Maintenance::Flush {
            apply(Some(CacheRegion { addr: qbase, len }));
        }
        for base in bases {
            apply(Some(CacheRegion {
                addr: base.addr,
                len: base.size.unwrap_or_default(),
            }));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Maintenance {
    Flush,
    Invalidate,
}

/// Bring the NPU back for a command stream after it may have been gated.
fn power_up(core: &mut DriverCore) -> Result<()> {
    if !core.dev.prot_matches() {
        tracing::info!("Protection changed, resetting NPU");
        core.dev.soft_reset()?;
    }
    core.request_power(Client::Inference, Request::Release, Request::Hold);
    core.dev.restore_pmu_config();
    core.axi_init()
}

fn start_command_stream(
    core: &mut DriverCore,
    qbase: u64,
    len: usize,
    bases: &[BaseRegion],
) -> Result<()> {
    if !core.config.power_always_on {
        power_up(core)?;
    }
    let qbase = core.config.npu_address(qbase);
    let addrs: Vec<u64> = bases
        .iter()
        .map(|b| core.config.npu_address(b.addr))
        .collect();
    core.dev.run_command_stream(qbase, len, &addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::payload::PayloadBuilder;
    use crate::sim::{SimConfig, SimulatedNpu};

    fn driver(config: DriverConfig) -> (SimulatedNpu, std::sync::Arc<Driver>) {
        let sim = SimulatedNpu::new(SimConfig::default());
        let drv = sim.connect(config).unwrap();
        (sim, drv)
    }

    #[test]
    fn bad_header_has_no_side_effects() {
        let (sim, drv) = driver(DriverConfig::default());
        sim.clear_accesses();
        assert!(matches!(
            drv.invoke(b"COP2", &[]),
            Err(EthosuError::BadMagic { .. })
        ));
        assert!(matches!(
            drv.invoke(b"COP1\0\0", &[]),
            Err(EthosuError::LengthNotAligned { .. })
        ));
        assert_eq!(sim.access_count(), 0);
    }

    #[test]
    fn command_stream_runs_to_completion() {
        let (sim, drv) = driver(DriverConfig::default());
        let payload = PayloadBuilder::new()
            .command_stream(&[0x0000_0001, 0x0000_0000])
            .build();
        drv.invoke(payload.as_bytes(), &[BaseRegion::new(0x1000, 64)])
            .unwrap();
        assert_eq!(drv.run_state(), RunState::Completed);
        assert_eq!(sim.run_count(), 1);
        assert_eq!(sim.peek(regs::QSIZE), 8);
        assert_eq!(sim.peek(regs::basep_lo(0)), 0x1000);
    }

    #[test]
    fn misaligned_base_is_rejected_before_run() {
        let (sim, drv) = driver(DriverConfig::default());
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        let err = drv
            .invoke(payload.as_bytes(), &[BaseRegion::new(0x1008, 16)])
            .unwrap_err();
        assert!(matches!(err.root(), EthosuError::Misaligned { addr: 0x1008, .. }));
        assert_eq!(sim.run_count(), 0);
    }

    #[test]
    fn fast_memory_replaces_base_two() {
        let config = DriverConfig::default().with_fast_memory(0x3000_0000, 0x1000);
        let (sim, drv) = driver(config);
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        let bases = [
            BaseRegion::new(0x1000, 16),
            BaseRegion::new(0x2000, 16),
            BaseRegion::new(0x4000, 0x800),
        ];
        drv.invoke(payload.as_bytes(), &bases).unwrap();
        assert_eq!(sim.peek(regs::basep_lo(2)), 0x3000_0000);
        assert_eq!(sim.peek(regs::basep_lo(1)), 0x2000);
    }

    #[test]
    fn fast_memory_too_small() {
        let config = DriverConfig::default().with_fast_memory(0x3000_0000, 0x100);
        let (sim, drv) = driver(config);
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        let bases = [
            BaseRegion::new(0x1000, 16),
            BaseRegion::new(0x2000, 16),
            BaseRegion::new(0x4000, 0x800),
        ];
        sim.clear_accesses();
        let err = drv.invoke(payload.as_bytes(), &bases).unwrap_err();
        assert!(matches!(
            err,
            EthosuError::FastMemoryTooSmall {
                available: 0x100,
                required: 0x800
            }
        ));
        assert_eq!(sim.access_count(), 0);
    }

    #[test]
    fn alias_and_offset_applied_to_addresses() {
        let config = DriverConfig::default()
            .with_alias(crate::AddressAlias::ALIF_HP)
            .with_base_pointer_offset(0x100);
        let (sim, drv) = driver(config);
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        drv.invoke(payload.as_bytes(), &[BaseRegion::new(0x2000_0000, 16)])
            .unwrap();
        assert_eq!(sim.peek(regs::basep_lo(0)), 0x5080_0100);
    }

    #[test]
    fn power_released_after_stream() {
        let (sim, drv) = driver(DriverConfig::default());
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        drv.invoke(payload.as_bytes(), &[]).unwrap();
        let word = sim.peek(regs::CMD);
        assert!(regs::cmd::CLOCK_Q_ENABLE.is_set(word));
        assert!(regs::cmd::POWER_Q_ENABLE.is_set(word));
        // axi setup reapplied before the run
        assert_eq!(sim.peek(regs::QCONFIG), 2);
    }

    #[test]
    fn diagnostic_records_hold_power() {
        let (sim, drv) = driver(DriverConfig::default());
        let stream = PayloadBuilder::new().command_stream(&[0]).build();
        drv.invoke(stream.as_bytes(), &[]).unwrap();

        sim.clear_writes();
        let payload = PayloadBuilder::new()
            .read_apb_reg(0x200, 4)
            .dump_shram()
            .build();
        drv.invoke(payload.as_bytes(), &[]).unwrap();

        let writes = sim.writes();
        let gating = regs::cmd::CLOCK_Q_ENABLE.in_place() | regs::cmd::POWER_Q_ENABLE.in_place();
        let cmds: Vec<u32> = writes
            .iter()
            .filter(|&&(offset, _)| offset == regs::CMD)
            .map(|&(_, word)| word & gating)
            .collect();
        assert_eq!(cmds, [0, gating, 0, gating]);

        // every SHRAM window is read between the hold and the release
        let positions = |reg: usize| -> Vec<usize> {
            (0..writes.len()).filter(|&i| writes[i].0 == reg).collect()
        };
        let cmd_at = positions(regs::CMD);
        let windows = positions(regs::DEBUG_ADDRESS);
        assert!(!windows.is_empty());
        assert!(windows.iter().all(|&i| i > cmd_at[2] && i < cmd_at[3]));
    }

    #[test]
    fn always_on_keeps_power() {
        let (sim, drv) = driver(DriverConfig::default().with_power_always_on(true));
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        drv.invoke(payload.as_bytes(), &[]).unwrap();
        assert!(!regs::cmd::POWER_Q_ENABLE.is_set(sim.peek(regs::CMD)));
    }

    #[test]
    fn record_errors_carry_offset() {
        let (_sim, drv) = driver(DriverConfig::default());
        let payload = PayloadBuilder::new()
            .nop()
            .read_apb_reg(0xFF8, 4)
            .build();
        let err = drv.invoke(payload.as_bytes(), &[]).unwrap_err();
        assert!(matches!(err, EthosuError::RecordFailed { offset: 8, .. }));
        assert!(matches!(err.root(), EthosuError::InvalidParam { .. }));
    }

    #[test]
    fn platform_hooks_bracket_dispatch() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;

        #[derive(Debug, Default)]
        struct Counting {
            begin: AtomicUsize,
            end: AtomicUsize,
            flushes: AtomicUsize,
            invalidates: AtomicUsize,
        }
        impl crate::Platform for Counting {
            fn flush_dcache(&self, _region: Option<CacheRegion>) {
                self.flushes.fetch_add(1, Ordering::Relaxed);
            }
            fn invalidate_dcache(&self, _region: Option<CacheRegion>) {
                self.invalidates.fetch_add(1, Ordering::Relaxed);
            }
            fn inference_begin(&self, _driver_id: usize, _payload: &[u8]) {
                self.begin.fetch_add(1, Ordering::Relaxed);
            }
            fn inference_end(&self, _driver_id: usize, _payload: &[u8]) {
                self.end.fetch_add(1, Ordering::Relaxed);
            }
        }

        let platform = Arc::new(Counting::default());
        let sim = SimulatedNpu::new(SimConfig::default());
        let drv = sim
            .connect_with_platform(DriverConfig::default(), platform.clone())
            .unwrap();
        let payload = PayloadBuilder::new().command_stream(&[0]).build();
        drv.invoke(payload.as_bytes(), &[BaseRegion::new(0x1000, 16)])
            .unwrap();
        assert_eq!(platform.begin.load(Ordering::Relaxed), 1);
        assert_eq!(platform.end.load(Ordering::Relaxed), 1);
        // stream + one base, then one base
        assert_eq!(platform.flushes.load(Ordering::Relaxed), 2);
        assert_eq!(platform.invalidates.load(Ordering::Relaxed), 1);

        drv.invoke(payload.as_bytes(), &[BaseRegion::unsized_at(0x1000)])
            .unwrap();
        assert_eq!(platform.flushes.load(Ordering::Relaxed), 3);
        assert_eq!(platform.invalidates.load(Ordering::Relaxed), 2);
    }
}
