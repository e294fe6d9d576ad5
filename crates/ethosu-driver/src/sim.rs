//! Simulated Ethos-U register window.
//!
//! [`SimulatedNpu`] implements [`RegisterIo`] in software so the whole
//! driver can run without hardware: in CI, in the CLI `selftest`, and in
//! the test suites. It models what the driver depends on and nothing more.
//!
//! - `ID` / `CONFIG` / `PROT` are read-only; `PROT` follows the last reset.
//! - A write to `RESET` clears status, queue, region and PMU state, and
//!   keeps `STATUS.RESET_STATUS` set for [`SimConfig::reset_polls`] reads.
//! - `CMD` keeps only the clock / power bits; the other bits are actions.
//! - Starting a command stream completes it immediately: `QREAD` moves to
//!   the end, enabled PMU counters advance, and the interrupt is delivered
//!   to the connected driver from a separate thread.
//! - The PMU enable, interrupt and overflow masks are set/clear register
//!   pairs over one backing word each.
//!
//! Fault injection (`set_hang`, `inject_fault`, `set_qread_shortfall`)
//! covers the error paths.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use ethosu_chip::pmu::{CCNT_MASK, NCOUNTERS};
use ethosu_chip::regs::{self, cmd, config, id, pmcr, status, CYCLE_COUNTER_MASK};

use crate::config::DriverConfig;
use crate::driver::Driver;
use crate::error::Result;
use crate::mmio::RegisterIo;
use crate::platform::{HostedPlatform, Platform};

const WORDS: usize = regs::WINDOW_SIZE / 4;

/// Hardware the simulator presents.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// log2 of MACs per clock cycle
    pub macs_per_cc: u32,
    /// Command stream version
    pub cmd_stream_version: u32,
    /// SHRAM size in KiB
    pub shram_kib: u32,
    /// Custom DMA present
    pub custom_dma: bool,
    /// Architecture revision (major, minor, patch)
    pub arch: (u32, u32, u32),
    /// Product major
    pub product_major: u32,
    /// `STATUS` reads that still report a reset in progress
    pub reset_polls: u32,
    /// Never finish a reset
    pub stuck_reset: bool,
    /// `PROT` value after every reset, regardless of the request
    pub force_prot: Option<u32>,
    /// Delay before a completion interrupt is delivered
    pub irq_delay: Duration,
    /// Cycles accounted per command word
    pub cycles_per_word: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            macs_per_cc: 7,
            cmd_stream_version: 0,
            shram_kib: 24,
            custom_dma: false,
            arch: (1, 1, 0),
            product_major: 4,
            reset_polls: 2,
            stuck_reset: false,
            force_prot: None,
            irq_delay: Duration::ZERO,
            cycles_per_word: 16,
        }
    }
}

#[derive(Debug)]
struct SimState {
    regs: Box<[u32; WORDS]>,
    shram: Vec<u32>,
    pmcnten: u32,
    pmint: u32,
    pmovs: u32,
    reset_reads_left: u32,
    writes: Vec<(usize, u32)>,
    accesses: usize,
    resets: usize,
    runs: usize,
    hang: bool,
    fault: Option<u32>,
    qread_shortfall: u32,
    driver: Option<Weak<Driver>>,
}

#[derive(Debug)]
struct Inner {
    config: SimConfig,
    state: Mutex<SimState>,
}

/// Software model of an Ethos-U55 register window.
///
/// Cheap to clone; clones share the same simulated device, so a test can
/// hand one clone to the driver and inspect the other.
#[derive(Clone)]
pub struct SimulatedNpu {
    inner: Arc<Inner>,
}

impl SimulatedNpu {
    /// Power-on state of a simulated NPU.
    pub fn new(hw: SimConfig) -> Self {
        let mut words = Box::new([0u32; WORDS]);
        words[regs::ID / 4] = id::ARCH_MAJOR.encode(hw.arch.0)
            | id::ARCH_MINOR.encode(hw.arch.1)
            | id::ARCH_PATCH.encode(hw.arch.2)
            | id::PRODUCT_MAJOR.encode(hw.product_major)
            | id::VERSION_MAJOR.encode(1);
        words[regs::CONFIG / 4] = config::MACS_PER_CC.encode(hw.macs_per_cc)
            | config::CMD_STREAM_VERSION.encode(hw.cmd_stream_version)
            | config::SHRAM_SIZE.encode(hw.shram_kib)
            | config::CUSTOM_DMA.encode(u32::from(hw.custom_dma))
            | config::PRODUCT.encode(hw.product_major);
        words[regs::REVISION / 4] = 0x0000_0001;
        words[regs::PROT / 4] = hw.force_prot.unwrap_or(0);

        let shram = vec![0; hw.shram_kib as usize * regs::SHRAM_WINDOW / 4];
        let state = SimState {
            regs: words,
            shram,
            pmcnten: 0,
            pmint: 0,
            pmovs: 0,
            reset_reads_left: 0,
            writes: Vec::new(),
            accesses: 0,
            resets: 0,
            runs: 0,
            hang: false,
            fault: None,
            qread_shortfall: 0,
            driver: None,
        };
        Self {
            inner: Arc::new(Inner {
                config: hw,
                state: Mutex::new(state),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hardware description this simulator was built with.
    pub fn sim_config(&self) -> &SimConfig {
        &self.inner.config
    }

    // ── Driver wiring ────────────────────────────────────────────────────────

    /// Deliver completion interrupts to `driver`.
    pub fn connect_irq(&self, driver: &Arc<Driver>) {
        self.state().driver = Some(Arc::downgrade(driver));
    }

    /// Initialize a driver on this simulator with interrupts connected.
    ///
    /// # Errors
    ///
    /// Whatever [`Driver::init`] returns.
    pub fn connect(&self, config: DriverConfig) -> Result<Arc<Driver>> {
        self.connect_with_platform(config, Arc::new(HostedPlatform))
    }

    /// [`connect`](Self::connect) with a custom platform.
    ///
    /// # Errors
    ///
    /// Whatever [`Driver::init`] returns.
    pub fn connect_with_platform(
        &self,
        config: DriverConfig,
        platform: Arc<dyn Platform>,
    ) -> Result<Arc<Driver>> {
        let driver = Arc::new(Driver::init(Box::new(self.clone()), config, platform)?);
        self.connect_irq(&driver);
        Ok(driver)
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// Register value as the driver would read it, without side effects.
    pub fn peek(&self, offset: usize) -> u32 {
        load(&self.state(), offset)
    }

    /// Overwrite a register's backing value, bypassing write semantics.
    ///
    /// For the PMU set/clear pairs either offset sets the shared mask.
    pub fn poke(&self, offset: usize, value: u32) {
        let mut st = self.state();
        match offset {
            regs::PMCNTENSET | regs::PMCNTENCLR => st.pmcnten = value,
            regs::PMINTSET | regs::PMINTCLR => st.pmint = value,
            regs::PMOVSSET | regs::PMOVSCLR => st.pmovs = value,
            _ => st.regs[offset / 4] = value,
        }
    }

    /// Register writes since the last clear, in order.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state().writes.clone()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Reads plus writes since the last [`clear_accesses`](Self::clear_accesses).
    pub fn access_count(&self) -> usize {
        self.state().accesses
    }

    /// Reset the access counter and the write log.
    pub fn clear_accesses(&self) {
        let mut st = self.state();
        st.accesses = 0;
        st.writes.clear();
    }

    /// Number of writes to `RESET` so far.
    pub fn reset_count(&self) -> usize {
        self.state().resets
    }

    /// Number of command streams started so far.
    pub fn run_count(&self) -> usize {
        self.state().runs
    }

    /// Fill SHRAM, word `i` getting `f(i)`.
    pub fn fill_shram(&self, f: impl Fn(usize) -> u32) {
        for (i, word) in self.state().shram.iter_mut().enumerate() {
            *word = f(i);
        }
    }

    // ── Fault injection ──────────────────────────────────────────────────────

    /// While set, started command streams never complete.
    pub fn set_hang(&self, hang: bool) {
        self.state().hang = hang;
    }

    /// Fail the next command stream with `status_bits` (e.g. `BUS_STATUS`).
    pub fn inject_fault(&self, status_bits: u32) {
        self.state().fault = Some(status_bits & status::ERROR_MASK);
    }

    /// Stop command streams `bytes` short of their end.
    pub fn set_qread_shortfall(&self, bytes: u32) {
        self.state().qread_shortfall = bytes;
    }

    /// Lose PMU counter contents, as a power-gated NPU does.
    pub fn power_cycle(&self) {
        let mut st = self.state();
        st.regs[regs::PMCCNTR_LO / 4] = 0;
        st.regs[regs::PMCCNTR_HI / 4] = 0;
        for i in 0..NCOUNTERS {
            st.regs[regs::pmevcntr(i) / 4] = 0;
        }
        tracing::debug!("sim: power cycle");
    }

    // ── Register semantics ───────────────────────────────────────────────────

    fn soft_reset(&self, st: &mut SimState, word: u32) {
        st.resets += 1;
        for offset in [
            regs::STATUS,
            regs::QREAD,
            regs::QCONFIG,
            regs::REGIONCFG,
            regs::PMCR,
            regs::PMCCNTR_LO,
            regs::PMCCNTR_HI,
            regs::PMCCNTR_CFG,
        ]
        .into_iter()
        .chain(regs::AXI_LIMIT)
        .chain((0..NCOUNTERS).flat_map(|i| [regs::pmevcntr(i), regs::pmevtyper(i)]))
        {
            st.regs[offset / 4] = 0;
        }
        st.pmcnten = 0;
        st.pmint = 0;
        st.pmovs = 0;
        st.regs[regs::PROT / 4] = self.inner.config.force_prot.unwrap_or(word & 0b11);
        st.reset_reads_left = self.inner.config.reset_polls;
        tracing::debug!(reset = word, "sim: soft reset");
    }

    fn write_cmd(&self, st: &mut SimState, value: u32) -> Option<Weak<Driver>> {
        let keep = cmd::CLOCK_Q_ENABLE.in_place() | cmd::POWER_Q_ENABLE.in_place();
        st.regs[regs::CMD / 4] = value & keep;

        let status_word = &mut st.regs[regs::STATUS / 4];
        if cmd::CLEAR_IRQ.is_set(value) {
            *status_word &= !status::IRQ_RAISED.in_place();
        }
        let history = cmd::CLEAR_IRQ_HISTORY.get(value);
        if history != 0 {
            *status_word &= !status::IRQ_HISTORY_MASK.encode(history);
        }

        if cmd::TRANSITION_TO_RUNNING_STATE.is_set(value) {
            self.run(st)
        } else {
            None
        }
    }

    /// Execute the programmed stream. Returns the driver to interrupt.
    fn run(&self, st: &mut SimState) -> Option<Weak<Driver>> {
        st.runs += 1;
        let qsize = st.regs[regs::QSIZE / 4];
        tracing::debug!(qsize, hang = st.hang, "sim: command stream started");

        if st.hang {
            st.regs[regs::STATUS / 4] |= status::STATE.in_place();
            return None;
        }

        let raised = status::IRQ_RAISED.in_place() | status::IRQ_HISTORY_MASK.encode(1);
        if let Some(fault) = st.fault.take() {
            st.regs[regs::QREAD / 4] = 0;
            st.regs[regs::STATUS / 4] = raised | fault;
        } else {
            st.regs[regs::QREAD / 4] = qsize.saturating_sub(st.qread_shortfall);
            st.regs[regs::STATUS / 4] = raised | status::CMD_END_REACHED.in_place();
            self.advance_pmu(st, u64::from(qsize / 4));
        }
        st.driver.clone()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn advance_pmu(&self, st: &mut SimState, words: u64) {
        if !pmcr::CNT_EN.is_set(st.regs[regs::PMCR / 4]) {
            return;
        }
        if st.pmcnten & CCNT_MASK != 0 {
            let cycles = words.max(1) * self.inner.config.cycles_per_word;
            let lo = st.regs[regs::PMCCNTR_LO / 4];
            let hi = st.regs[regs::PMCCNTR_HI / 4];
            let value = ((u64::from(hi) << 32) | u64::from(lo)).wrapping_add(cycles)
                & CYCLE_COUNTER_MASK;
            st.regs[regs::PMCCNTR_LO / 4] = value as u32;
            st.regs[regs::PMCCNTR_HI / 4] = (value >> 32) as u32;
        }
        let events = words.max(1) as u32;
        for i in 0..NCOUNTERS {
            if st.pmcnten & (1 << i) != 0 {
                let counter = &mut st.regs[regs::pmevcntr(i) / 4];
                *counter = counter.wrapping_add(events);
            }
        }
    }

    fn write_pmcr(st: &mut SimState, value: u32) {
        if pmcr::EVENT_CNT_RST.is_set(value) {
            for i in 0..NCOUNTERS {
                st.regs[regs::pmevcntr(i) / 4] = 0;
            }
        }
        if pmcr::CYCLE_CNT_RST.is_set(value) {
            st.regs[regs::PMCCNTR_LO / 4] = 0;
            st.regs[regs::PMCCNTR_HI / 4] = 0;
        }
        let self_clearing = pmcr::EVENT_CNT_RST.in_place()
            | pmcr::CYCLE_CNT_RST.in_place()
            | pmcr::NUM_EVENT_CNT.in_place();
        st.regs[regs::PMCR / 4] = value & !self_clearing;
    }
}

/// Side-effect-free register read.
#[allow(clippy::cast_possible_truncation)]
fn load(st: &SimState, offset: usize) -> u32 {
    match offset {
        regs::PMCNTENSET | regs::PMCNTENCLR => st.pmcnten,
        regs::PMINTSET | regs::PMINTCLR => st.pmint,
        regs::PMOVSSET | regs::PMOVSCLR => st.pmovs,
        regs::PMCR => st.regs[regs::PMCR / 4] | pmcr::NUM_EVENT_CNT.encode(NCOUNTERS as u32),
        o if (regs::SHARED_BUFFER..regs::SHARED_BUFFER + regs::SHRAM_WINDOW).contains(&o) => {
            let base = st.regs[regs::DEBUG_ADDRESS / 4] as usize / 4;
            let index = base + (o - regs::SHARED_BUFFER) / 4;
            st.shram.get(index).copied().unwrap_or(0)
        }
        o => st.regs[o / 4],
    }
}

impl RegisterIo for SimulatedNpu {
    fn read32(&self, offset: usize) -> u32 {
        let mut st = self.state();
        st.accesses += 1;
        let value = load(&st, offset);
        if offset != regs::STATUS {
            return value;
        }
        let resetting = if self.inner.config.stuck_reset {
            true
        } else if st.reset_reads_left > 0 {
            st.reset_reads_left -= 1;
            true
        } else {
            false
        };
        if resetting {
            value | status::RESET_STATUS.in_place()
        } else {
            value
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut st = self.state();
        st.accesses += 1;
        st.writes.push((offset, value));

        let irq_target = match offset {
            regs::ID | regs::CONFIG | regs::REVISION | regs::STATUS | regs::QREAD | regs::PROT => {
                None
            }
            regs::RESET => {
                self.soft_reset(&mut st, value);
                None
            }
            regs::CMD => self.write_cmd(&mut st, value),
            regs::PMCR => {
                Self::write_pmcr(&mut st, value);
                None
            }
            regs::PMCNTENSET => {
                st.pmcnten |= value;
                None
            }
            regs::PMCNTENCLR => {
                st.pmcnten &= !value;
                None
            }
            regs::PMINTSET => {
                st.pmint |= value;
                None
            }
            regs::PMINTCLR => {
                st.pmint &= !value;
                None
            }
            regs::PMOVSSET => {
                st.pmovs |= value;
                None
            }
            regs::PMOVSCLR => {
                st.pmovs &= !value;
                None
            }
            regs::PMCCNTR_HI => {
                st.regs[offset / 4] = value & 0xFFFF;
                None
            }
            _ => {
                st.regs[offset / 4] = value;
                None
            }
        };
        drop(st);

        if let Some(target) = irq_target {
            let delay = self.inner.config.irq_delay;
            thread::spawn(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                if let Some(driver) = target.upgrade() {
                    driver.irq_handler();
                }
            });
        }
    }
}

impl std::fmt::Debug for SimulatedNpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state();
        f.debug_struct("SimulatedNpu")
            .field("status", &format_args!("{:#010x}", st.regs[regs::STATUS / 4]))
            .field("resets", &st.resets)
            .field("runs", &st.runs)
            .finish_non_exhaustive()
    }
}
