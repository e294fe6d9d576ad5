//! Memory-type and AXI burst encodings.
//!
//! `MemoryType` selects which outstanding-transaction counter (and so which
//! AXI port) a region or the command queue uses. `AxiMemType` and
//! `AxiBeats` are the per-port AXI attributes written to `AXI_LIMITn`.

/// AXI port / outstanding counter assigned to a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MemoryType {
    /// AXI0, outstanding counter 0.
    Axi0Counter0 = 0,
    /// AXI0, outstanding counter 1.
    Axi0Counter1 = 1,
    /// AXI1, outstanding counter 2.
    Axi1Counter2 = 2,
    /// AXI1, outstanding counter 3.
    Axi1Counter3 = 3,
}

impl MemoryType {
    /// Decode a raw 2-bit memory-type value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Axi0Counter0),
            1 => Some(Self::Axi0Counter1),
            2 => Some(Self::Axi1Counter2),
            3 => Some(Self::Axi1Counter3),
            _ => None,
        }
    }

    /// Raw register encoding.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// AXI burst split alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum AxiBeats {
    /// 64-byte bursts.
    #[default]
    Bytes64 = 0,
    /// 128-byte bursts.
    Bytes128 = 1,
    /// 256-byte bursts.
    Bytes256 = 2,
}

impl AxiBeats {
    /// Decode a raw burst value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Bytes64),
            1 => Some(Self::Bytes128),
            2 => Some(Self::Bytes256),
            _ => None,
        }
    }

    /// Burst length in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bytes64 => 64,
            Self::Bytes128 => 128,
            Self::Bytes256 => 256,
        }
    }
}

/// AXI memory attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum AxiMemType {
    /// Device, non-bufferable.
    #[default]
    DeviceNonBufferable = 0,
    /// Device, bufferable.
    DeviceBufferable = 1,
    /// Normal, non-cacheable, non-bufferable.
    NormalNonCacheableNonBufferable = 2,
    /// Normal, non-cacheable, bufferable.
    NormalNonCacheableBufferable = 3,
    /// Write-through, no allocate.
    WriteThroughNoAllocate = 4,
    /// Write-through, read allocate.
    WriteThroughReadAllocate = 5,
    /// Write-through, write allocate.
    WriteThroughWriteAllocate = 6,
    /// Write-through, read and write allocate.
    WriteThroughReadWriteAllocate = 7,
    /// Write-back, no allocate.
    WriteBackNoAllocate = 8,
    /// Write-back, read allocate.
    WriteBackReadAllocate = 9,
    /// Write-back, write allocate.
    WriteBackWriteAllocate = 10,
    /// Write-back, read and write allocate.
    WriteBackReadWriteAllocate = 11,
}

impl AxiMemType {
    /// Decode a raw 4-bit memory attribute.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::DeviceNonBufferable,
            1 => Self::DeviceBufferable,
            2 => Self::NormalNonCacheableNonBufferable,
            3 => Self::NormalNonCacheableBufferable,
            4 => Self::WriteThroughNoAllocate,
            5 => Self::WriteThroughReadAllocate,
            6 => Self::WriteThroughWriteAllocate,
            7 => Self::WriteThroughReadWriteAllocate,
            8 => Self::WriteBackNoAllocate,
            9 => Self::WriteBackReadAllocate,
            10 => Self::WriteBackWriteAllocate,
            11 => Self::WriteBackReadWriteAllocate,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_range() {
        for raw in 0..4 {
            assert_eq!(MemoryType::from_raw(raw).map(MemoryType::raw), Some(raw));
        }
        assert_eq!(MemoryType::from_raw(4), None);
    }

    #[test]
    fn axi_enums_reject_out_of_range() {
        assert_eq!(AxiBeats::from_raw(3), None);
        assert_eq!(AxiMemType::from_raw(12), None);
        assert_eq!(AxiBeats::Bytes256.bytes(), 256);
    }
}
