//! Register map for the Ethos-U55 interface.
//!
//! Offsets are byte offsets from the base of the NPU register window. Every
//! register is 32 bits wide and 4-byte aligned. 64-bit quantities (queue
//! base, base pointers, cycle counter) are split across a `_LO`/`_HI` pair.
//!
//! Field layouts live in one sub-module per register. Each is a set of
//! [`Field`](crate::Field) constants; decoding a word is always `FIELD.get(word)`.
//!
//! ```text
//! 0x000-0x0FF   control, queue, protection, AXI
//! 0x080-0x0BF   base pointers (8 × lo/hi)
//! 0x140-0x17F   debug
//! 0x180-0x1AF   PMU control + cycle counter
//! 0x200-0x2BF   kernel / DMA debug state (read-only)
//! 0x300-0x39F   PMU event counters + event types
//! 0x400-0x7FF   SHRAM debug window (1 KiB)
//! 0x800-0xB5F   command-stream parameter state (read-only)
//! 0xFC0-0xFFF   revision + CoreSight id
//! ```

/// Size of the register window in bytes.
pub const WINDOW_SIZE: usize = 0x1000;

// ── Device identity ──────────────────────────────────────────────────────────

/// Identification register (version / product / architecture).
pub const ID: usize = 0x0000;

/// Hardware revision register.
pub const REVISION: usize = 0x0FC0;

// ── Status and control ───────────────────────────────────────────────────────

/// Status register.
pub const STATUS: usize = 0x0004;

/// Command register: run, IRQ clear, clock / power gating control.
pub const CMD: usize = 0x0008;

/// Reset register: requested privilege and security for the next reset.
pub const RESET: usize = 0x000C;

/// Protection register: active privilege and security after reset.
pub const PROT: usize = 0x0024;

/// Hardware configuration register (MACs, SHRAM size, stream version).
pub const CONFIG: usize = 0x0028;

/// Lock register.
pub const LOCK: usize = 0x002C;

// ── Command queue ────────────────────────────────────────────────────────────

/// Command stream base address (low 32 bits).
pub const QBASE_LO: usize = 0x0010;
/// Command stream base address (high 32 bits).
pub const QBASE_HI: usize = 0x0014;
/// Byte offset of the next command the NPU will read.
pub const QREAD: usize = 0x0018;
/// AXI memory configuration used for command stream fetches.
pub const QCONFIG: usize = 0x001C;
/// Command stream length in bytes.
pub const QSIZE: usize = 0x0020;

/// Queue and base pointer addresses are 48 bits wide.
pub const ADDRESS_MASK: u64 = (1 << 48) - 1;

// ── Memory regions and AXI ───────────────────────────────────────────────────

/// Region-to-AXI-config mapping, 2 bits per region.
pub const REGIONCFG: usize = 0x003C;

/// AXI limit registers 0..=3.
pub const AXI_LIMIT: [usize; 4] = [0x0040, 0x0044, 0x0048, 0x004C];

/// Number of AXI limit registers.
pub const AXI_LIMIT_COUNT: usize = AXI_LIMIT.len();

/// Number of base pointer pairs.
pub const BASEP_COUNT: usize = 8;

/// Number of memory regions addressable through `REGIONCFG`.
pub const REGION_COUNT: usize = 8;

/// Low half of base pointer `n`.
#[must_use]
pub const fn basep_lo(n: usize) -> usize {
    0x0080 + n * 8
}

/// High half of base pointer `n`.
#[must_use]
pub const fn basep_hi(n: usize) -> usize {
    0x0084 + n * 8
}

// ── Debug ────────────────────────────────────────────────────────────────────

/// Selects which 1 KiB SHRAM window appears at [`SHARED_BUFFER`].
pub const DEBUG_ADDRESS: usize = 0x0140;

/// First word of the SHRAM debug window.
pub const SHARED_BUFFER: usize = 0x0400;

/// Size of one SHRAM debug window in bytes.
pub const SHRAM_WINDOW: usize = 1024;

/// Register ranges dumped after a failed command stream, `(start, end_exclusive)`.
pub const DIAGNOSTIC_RANGES: [(usize, usize); 2] = [(0x0200, 0x02C0), (0x0800, 0x0B40)];

// ── PMU ──────────────────────────────────────────────────────────────────────

/// PMU control register.
pub const PMCR: usize = 0x0180;
/// Counter enable set.
pub const PMCNTENSET: usize = 0x0184;
/// Counter enable clear.
pub const PMCNTENCLR: usize = 0x0188;
/// Overflow status set.
pub const PMOVSSET: usize = 0x018C;
/// Overflow status clear.
pub const PMOVSCLR: usize = 0x0190;
/// Interrupt enable set.
pub const PMINTSET: usize = 0x0194;
/// Interrupt enable clear.
pub const PMINTCLR: usize = 0x0198;
/// Cycle counter, low 32 bits.
pub const PMCCNTR_LO: usize = 0x01A0;
/// Cycle counter, high 16 bits.
pub const PMCCNTR_HI: usize = 0x01A4;
/// Cycle counter start / stop event configuration.
pub const PMCCNTR_CFG: usize = 0x01A8;

/// Event counter `n`.
#[must_use]
pub const fn pmevcntr(n: usize) -> usize {
    0x0300 + n * 4
}

/// Event type selector for counter `n`.
#[must_use]
pub const fn pmevtyper(n: usize) -> usize {
    0x0380 + n * 4
}

// ── Field layouts ────────────────────────────────────────────────────────────

/// `ID` register fields.
pub mod id {
    use crate::Field;

    /// Version status.
    pub const VERSION_STATUS: Field = Field::new(0, 4);
    /// Version minor.
    pub const VERSION_MINOR: Field = Field::new(4, 4);
    /// Version major.
    pub const VERSION_MAJOR: Field = Field::new(8, 4);
    /// Product major.
    pub const PRODUCT_MAJOR: Field = Field::new(12, 4);
    /// Architecture patch revision.
    pub const ARCH_PATCH: Field = Field::new(16, 4);
    /// Architecture minor revision.
    pub const ARCH_MINOR: Field = Field::new(20, 8);
    /// Architecture major revision.
    pub const ARCH_MAJOR: Field = Field::new(28, 4);
}

/// `STATUS` register fields.
pub mod status {
    use crate::Field;

    /// 1 while the NPU is running a command stream.
    pub const STATE: Field = Field::bit(0);
    /// Interrupt raised.
    pub const IRQ_RAISED: Field = Field::bit(1);
    /// AXI bus error.
    pub const BUS_STATUS: Field = Field::bit(2);
    /// Reset still in progress.
    pub const RESET_STATUS: Field = Field::bit(3);
    /// Command stream parse error.
    pub const CMD_PARSE_ERROR: Field = Field::bit(4);
    /// Command stream end reached.
    pub const CMD_END_REACHED: Field = Field::bit(5);
    /// PMU interrupt raised.
    pub const PMU_IRQ_RAISED: Field = Field::bit(6);
    /// Watchdog fault.
    pub const WD_FAULT: Field = Field::bit(7);
    /// ECC fault.
    pub const ECC_FAULT: Field = Field::bit(8);
    /// AXI interface that faulted.
    pub const FAULTING_INTERFACE: Field = Field::bit(11);
    /// AXI channel that faulted.
    pub const FAULTING_CHANNEL: Field = Field::new(12, 4);
    /// History of raised interrupt sources.
    pub const IRQ_HISTORY_MASK: Field = Field::new(16, 16);

    /// Bits that make a status word an error status.
    pub const ERROR_MASK: u32 = BUS_STATUS.in_place()
        | CMD_PARSE_ERROR.in_place()
        | WD_FAULT.in_place()
        | ECC_FAULT.in_place();
}

/// `CMD` register fields.
pub mod cmd {
    use crate::Field;

    /// Start executing the programmed command stream.
    pub const TRANSITION_TO_RUNNING_STATE: Field = Field::bit(0);
    /// Clear the raised interrupt.
    pub const CLEAR_IRQ: Field = Field::bit(1);
    /// 1 allows clock gating, 0 keeps the clock running.
    pub const CLOCK_Q_ENABLE: Field = Field::bit(2);
    /// 1 allows power gating, 0 keeps power on.
    pub const POWER_Q_ENABLE: Field = Field::bit(3);
    /// Request the running stream to stop.
    pub const STOP_REQUEST: Field = Field::bit(4);
    /// Clear bits of the IRQ history mask.
    pub const CLEAR_IRQ_HISTORY: Field = Field::new(16, 16);
}

/// `RESET` register fields.
pub mod reset {
    use crate::Field;

    /// Requested privilege level (1 = privileged).
    pub const PENDING_CPL: Field = Field::bit(0);
    /// Requested security state (1 = non-secure).
    pub const PENDING_CSL: Field = Field::bit(1);
}

/// `PROT` register fields.
pub mod prot {
    use crate::Field;

    /// Active privilege level.
    pub const ACTIVE_CPL: Field = Field::bit(0);
    /// Active security state.
    pub const ACTIVE_CSL: Field = Field::bit(1);
}

/// `CONFIG` register fields. Also the layout of the hardware-config word in
/// an optimizer-config record.
pub mod config {
    use crate::Field;

    /// log2 of MACs per clock cycle.
    pub const MACS_PER_CC: Field = Field::new(0, 4);
    /// Supported command stream version.
    pub const CMD_STREAM_VERSION: Field = Field::new(4, 4);
    /// SHRAM size in KiB.
    pub const SHRAM_SIZE: Field = Field::new(8, 8);
    /// Custom DMA present.
    pub const CUSTOM_DMA: Field = Field::bit(27);
    /// Product identifier.
    pub const PRODUCT: Field = Field::new(28, 4);
}

/// `REGIONCFG` layout: one 2-bit memory-type field per region.
pub mod regioncfg {
    use crate::Field;

    /// Field for `region` (0..8).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn region(region: usize) -> Field {
        Field::new(2 * region as u32, 2)
    }
}

/// `AXI_LIMITn` fields.
pub mod axi_limit {
    use crate::Field;

    /// Maximum burst length.
    pub const MAX_BEATS: Field = Field::new(0, 2);
    /// AXI memory type.
    pub const MEMTYPE: Field = Field::new(4, 4);
    /// Maximum outstanding reads, minus one.
    pub const MAX_OUTSTANDING_READ_M1: Field = Field::new(16, 5);
    /// Maximum outstanding writes, minus one.
    pub const MAX_OUTSTANDING_WRITE_M1: Field = Field::new(24, 4);
}

/// `PMCR` fields.
pub mod pmcr {
    use crate::Field;

    /// Global counter enable.
    pub const CNT_EN: Field = Field::bit(0);
    /// Reset all event counters (self-clearing).
    pub const EVENT_CNT_RST: Field = Field::bit(1);
    /// Reset the cycle counter (self-clearing).
    pub const CYCLE_CNT_RST: Field = Field::bit(2);
    /// Enable mask for the counter registers.
    pub const MASK_EN: Field = Field::bit(3);
    /// Number of implemented event counters (read-only).
    pub const NUM_EVENT_CNT: Field = Field::new(11, 5);
}

/// `PMCCNTR_CFG` fields.
pub mod pmccntr_cfg {
    use crate::Field;

    /// Event that starts the cycle counter.
    pub const START_EVENT: Field = Field::new(0, 10);
    /// Event that stops the cycle counter.
    pub const STOP_EVENT: Field = Field::new(16, 10);
}

/// Header word of an optimizer-config record.
pub mod optimizer_header {
    use crate::Field;

    /// Release number of the optimizer config format.
    pub const REL_NBR: Field = Field::new(0, 4);
    /// Patch number of the optimizer config format.
    pub const PATCH_NBR: Field = Field::new(4, 4);
}

// ── Cycle counter ────────────────────────────────────────────────────────────

/// Cycle counter width in bits.
pub const CYCLE_COUNTER_BITS: u32 = 48;

/// Mask of the significant cycle counter bits.
pub const CYCLE_COUNTER_MASK: u64 = (1 << CYCLE_COUNTER_BITS) - 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_pointers_are_interleaved() {
        assert_eq!(basep_lo(0), 0x80);
        assert_eq!(basep_hi(0), 0x84);
        assert_eq!(basep_lo(7), 0xB8);
        assert_eq!(basep_hi(7), 0xBC);
    }

    #[test]
    fn status_error_mask() {
        assert_eq!(status::ERROR_MASK, 0b1_1001_0100);
        assert!(!status::IRQ_RAISED.is_set(status::ERROR_MASK));
    }

    #[test]
    fn decode_id_word() {
        let word = 0x1010_2011;
        assert_eq!(id::ARCH_MAJOR.get(word), 1);
        assert_eq!(id::ARCH_MINOR.get(word), 1);
        assert_eq!(id::ARCH_PATCH.get(word), 0);
        assert_eq!(id::PRODUCT_MAJOR.get(word), 2);
        assert_eq!(id::VERSION_MAJOR.get(word), 0);
        assert_eq!(id::VERSION_MINOR.get(word), 1);
        assert_eq!(id::VERSION_STATUS.get(word), 1);
    }

    #[test]
    fn regioncfg_fields_do_not_overlap() {
        let mut seen = 0u32;
        for r in 0..REGION_COUNT {
            let f = regioncfg::region(r);
            assert_eq!(seen & f.in_place(), 0);
            seen |= f.in_place();
        }
        assert_eq!(seen, 0xFFFF);
    }

    #[test]
    fn pmu_counter_layout() {
        assert_eq!(pmevcntr(3), 0x30C);
        assert_eq!(pmevtyper(3), 0x38C);
    }
}
