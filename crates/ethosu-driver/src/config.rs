//! Driver configuration
//!
//! Everything the integrator decides once, before the driver is created:
//! security state, AXI and region setup, reset polling, fast memory and
//! address aliasing. All fields have working defaults.

use ethosu_chip::memory::{AxiBeats, AxiMemType, MemoryType};
use ethosu_chip::regs;

/// Privilege and security state requested on every reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Security {
    /// Run the NPU in the secure state
    pub secure: bool,
    /// Run the NPU at privileged level
    pub privileged: bool,
}

/// One `AXI_LIMITn` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxiLimit {
    /// Burst split alignment
    pub max_beats: AxiBeats,
    /// AXI memory attributes
    pub memtype: AxiMemType,
    /// Maximum outstanding reads (1..=32)
    pub max_reads: u32,
    /// Maximum outstanding writes (1..=16)
    pub max_writes: u32,
}

impl Default for AxiLimit {
    fn default() -> Self {
        Self {
            max_beats: AxiBeats::Bytes64,
            memtype: AxiMemType::DeviceNonBufferable,
            max_reads: 32,
            max_writes: 16,
        }
    }
}

/// Queue, region and AXI setup reapplied after every reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxiConfig {
    /// Memory type used for command stream fetches
    pub qconfig: MemoryType,
    /// Memory type for each of the 8 regions
    pub regions: [MemoryType; regs::REGION_COUNT],
    /// AXI limit registers
    pub limits: [AxiLimit; regs::AXI_LIMIT_COUNT],
}

impl Default for AxiConfig {
    fn default() -> Self {
        Self {
            qconfig: MemoryType::Axi1Counter2,
            regions: [
                MemoryType::Axi1Counter3,
                MemoryType::Axi0Counter0,
                MemoryType::Axi0Counter1,
                MemoryType::Axi0Counter1,
                MemoryType::Axi0Counter1,
                MemoryType::Axi0Counter1,
                MemoryType::Axi0Counter1,
                MemoryType::Axi0Counter1,
            ],
            limits: [AxiLimit::default(); regs::AXI_LIMIT_COUNT],
        }
    }
}

/// Bounded polling for reset completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    /// STATUS reads before giving up
    pub max_polls: u32,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self { max_polls: 100_000 }
    }
}

/// Fast on-chip memory used for the scratch base region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastMemory {
    /// Bus address
    pub addr: u64,
    /// Size in bytes
    pub size: usize,
}

/// Rewrites CPU-local addresses (e.g. DTCM) to their global alias before
/// they are programmed into the NPU.
///
/// An address is rewritten when `addr & match_mask == match_value`; the
/// result is `global_base | (addr & offset_mask)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressAlias {
    /// Bits compared against `match_value`
    pub match_mask: u64,
    /// Local window identifier
    pub match_value: u64,
    /// Bits kept from the local address
    pub offset_mask: u64,
    /// Global alias of the local window
    pub global_base: u64,
}

impl AddressAlias {
    /// DTCM alias for the high-performance core of an Alif Ensemble part.
    pub const ALIF_HP: Self = Self {
        match_mask: 0xFF00_0000,
        match_value: 0x2000_0000,
        offset_mask: 0x007F_FFFF,
        global_base: 0x5080_0000,
    };

    /// DTCM alias for the high-efficiency core of an Alif Ensemble part.
    pub const ALIF_HE: Self = Self {
        global_base: 0x6080_0000,
        ..Self::ALIF_HP
    };

    /// Translate `addr` if it falls in the local window.
    #[must_use]
    pub const fn translate(&self, addr: u64) -> u64 {
        if addr & self.match_mask == self.match_value {
            self.global_base | (addr & self.offset_mask)
        } else {
            addr
        }
    }
}

/// Driver configuration
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Requested privilege / security state
    pub security: Security,
    /// AXI setup
    pub axi: AxiConfig,
    /// Reset polling
    pub reset: ResetPolicy,
    /// Fast memory replacing base region 2
    pub fast_memory: Option<FastMemory>,
    /// Local-to-global address translation
    pub alias: Option<AddressAlias>,
    /// Added to every address programmed into QBASE / BASEP
    pub base_pointer_offset: u64,
    /// Keep the NPU powered between inferences
    pub power_always_on: bool,
}

impl DriverConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set security state
    #[must_use]
    pub fn with_security(mut self, secure: bool, privileged: bool) -> Self {
        self.security = Security { secure, privileged };
        self
    }

    /// Set AXI configuration
    #[must_use]
    pub fn with_axi(mut self, axi: AxiConfig) -> Self {
        self.axi = axi;
        self
    }

    /// Set reset poll budget
    #[must_use]
    pub fn with_reset_polls(mut self, max_polls: u32) -> Self {
        self.reset.max_polls = max_polls;
        self
    }

    /// Use fast memory for base region 2
    #[must_use]
    pub fn with_fast_memory(mut self, addr: u64, size: usize) -> Self {
        self.fast_memory = Some(FastMemory { addr, size });
        self
    }

    /// Set address aliasing
    #[must_use]
    pub fn with_alias(mut self, alias: AddressAlias) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Set base pointer offset
    #[must_use]
    pub fn with_base_pointer_offset(mut self, offset: u64) -> Self {
        self.base_pointer_offset = offset;
        self
    }

    /// Keep the NPU powered between inferences
    #[must_use]
    pub fn with_power_always_on(mut self, always_on: bool) -> Self {
        self.power_always_on = always_on;
        self
    }

    /// Address as the NPU must see it: offset applied, then aliased.
    pub fn npu_address(&self, addr: u64) -> u64 {
        let addr = addr + self.base_pointer_offset;
        self.alias.map_or(addr, |alias| alias.translate(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_translates_dtcm_only() {
        let hp = AddressAlias::ALIF_HP;
        assert_eq!(hp.translate(0x2000_1230), 0x5080_1230);
        assert_eq!(hp.translate(0x8000_1230), 0x8000_1230);
        assert_eq!(AddressAlias::ALIF_HE.translate(0x2000_0010), 0x6080_0010);
    }

    #[test]
    fn default_axi_setup() {
        let axi = AxiConfig::default();
        assert_eq!(axi.qconfig.raw(), 2);
        let raw: Vec<u32> = axi.regions.iter().map(|m| m.raw()).collect();
        assert_eq!(raw, [3, 0, 1, 1, 1, 1, 1, 1]);
        assert_eq!(axi.limits[0].max_reads, 32);
        assert_eq!(axi.limits[3].max_writes, 16);
    }

    #[test]
    fn builder_and_npu_address() {
        let cfg = DriverConfig::new()
            .with_security(true, true)
            .with_base_pointer_offset(0x10)
            .with_alias(AddressAlias::ALIF_HP);
        assert!(cfg.security.secure && cfg.security.privileged);
        assert_eq!(cfg.npu_address(0x2000_0000), 0x5080_0010);
    }
}
