//! Performance monitoring unit encoding.
//!
//! The PMU has [`NCOUNTERS`] event counters plus a dedicated 48-bit cycle
//! counter. Counter selection masks use bit `n` for event counter `n` and
//! bit 31 ([`CCNT_MASK`]) for the cycle counter.
//!
//! Event types are written to `PMEVTYPERn` as sparse hardware ids; the
//! [`PmuEvent`] enum is the typed view and [`PmuEvent::hw_id`] /
//! [`PmuEvent::from_hw_id`] convert between the two.

/// Number of event counters.
pub const NCOUNTERS: usize = 4;

/// Selection bit for the cycle counter.
pub const CCNT_MASK: u32 = 1 << 31;

/// Selection bits for all event counters.
pub const EVENT_COUNTERS_MASK: u32 = (1 << NCOUNTERS) - 1;

/// Selection bit for event counter `index`.
#[must_use]
pub const fn counter_mask(index: usize) -> u32 {
    1 << index
}

macro_rules! pmu_events {
    ($( $(#[$doc:meta])* $variant:ident = $id:literal ),+ $(,)?) => {
        /// PMU event type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        pub enum PmuEvent {
            $( $(#[$doc])* $variant, )+
        }

        impl PmuEvent {
            /// Every event, in declaration order.
            pub const ALL: &'static [PmuEvent] = &[$( PmuEvent::$variant, )+];

            /// Hardware id written to `PMEVTYPERn` / `PMCCNTR_CFG`.
            #[must_use]
            pub const fn hw_id(self) -> u32 {
                match self {
                    $( PmuEvent::$variant => $id, )+
                }
            }

            /// Decode a hardware id. Unknown ids yield `None`.
            #[must_use]
            pub const fn from_hw_id(id: u32) -> Option<Self> {
                match id {
                    $( $id => Some(PmuEvent::$variant), )+
                    _ => None,
                }
            }

            /// Short name for logs.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( PmuEvent::$variant => stringify!($variant), )+
                }
            }
        }
    };
}

pmu_events! {
    /// No event; counter does not count.
    NoEvent = 0x00,
    /// Clock cycle.
    Cycle = 0x11,
    /// NPU idle.
    NpuIdle = 0x20,
    CcStalledOnBlockdep = 0x21,
    CcStalledOnShramReconfig = 0x22,
    /// NPU active.
    NpuActive = 0x23,
    MacActive = 0x30,
    MacActive8Bit = 0x31,
    MacActive16Bit = 0x32,
    MacDpuActive = 0x33,
    MacStalledByWdAcc = 0x34,
    MacStalledByWd = 0x35,
    MacStalledByAcc = 0x36,
    MacStalledByIb = 0x37,
    MacActive32Bit = 0x38,
    MacStalledByIntW = 0x39,
    MacStalledByIntAcc = 0x3A,
    AoActive = 0x40,
    AoActive8Bit = 0x41,
    AoActive16Bit = 0x42,
    AoStalledByOfmpOb = 0x43,
    AoStalledByOfmp = 0x44,
    AoStalledByOb = 0x45,
    AoStalledByAccIb = 0x46,
    AoStalledByAcc = 0x47,
    AoStalledByIb = 0x48,
    WdActive = 0x50,
    WdStalled = 0x51,
    WdStalledByWs = 0x52,
    WdStalledByWdBuf = 0x53,
    WdParseActive = 0x54,
    WdParseStalled = 0x55,
    WdParseStalledIn = 0x56,
    WdParseStalledOut = 0x57,
    WdTransWs = 0x58,
    WdTransWb = 0x59,
    WdTransDw0 = 0x5A,
    WdTransDw1 = 0x5B,
    Axi0RdTransAccepted = 0x80,
    Axi0RdTransCompleted = 0x81,
    Axi0RdDataBeatReceived = 0x82,
    Axi0RdTranReqStalled = 0x83,
    Axi0WrTransAccepted = 0x84,
    Axi0WrTransCompletedM = 0x85,
    Axi0WrTransCompletedS = 0x86,
    Axi0WrDataBeatWritten = 0x87,
    Axi0WrTranReqStalled = 0x88,
    Axi0WrDataBeatStalled = 0x89,
    Axi0EnabledCycles = 0x8C,
    Axi0RdStallLimit = 0x8E,
    Axi0WrStallLimit = 0x8F,
    AxiLatencyAny = 0xA0,
    AxiLatency32 = 0xA1,
    AxiLatency64 = 0xA2,
    AxiLatency128 = 0xA3,
    AxiLatency256 = 0xA4,
    AxiLatency512 = 0xA5,
    AxiLatency1024 = 0xA6,
    EccDma = 0xB0,
    EccSb0 = 0xB1,
    Axi1RdTransAccepted = 0x180,
    Axi1RdTransCompleted = 0x181,
    Axi1RdDataBeatReceived = 0x182,
    Axi1RdTranReqStalled = 0x183,
    Axi1WrTransAccepted = 0x184,
    Axi1WrTransCompletedM = 0x185,
    Axi1WrTransCompletedS = 0x186,
    Axi1WrDataBeatWritten = 0x187,
    Axi1WrTranReqStalled = 0x188,
    Axi1WrDataBeatStalled = 0x189,
    Axi1EnabledCycles = 0x18C,
    Axi1RdStallLimit = 0x18E,
    Axi1WrStallLimit = 0x18F,
    EccSb1 = 0x1B1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hw_ids_round_trip() {
        for &event in PmuEvent::ALL {
            assert_eq!(PmuEvent::from_hw_id(event.hw_id()), Some(event), "{}", event.name());
        }
    }

    #[test]
    fn unknown_hw_id() {
        assert_eq!(PmuEvent::from_hw_id(0x12), None);
        assert_eq!(PmuEvent::from_hw_id(0x3FF), None);
    }

    #[test]
    fn ids_fit_cycle_counter_config() {
        let start = crate::regs::pmccntr_cfg::START_EVENT;
        assert!(PmuEvent::ALL.iter().all(|e| start.fits(e.hw_id())));
    }

    #[test]
    fn masks() {
        assert_eq!(EVENT_COUNTERS_MASK, 0xF);
        assert_eq!(counter_mask(2), 0b100);
    }
}
