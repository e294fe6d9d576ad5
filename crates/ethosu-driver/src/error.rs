//! Error types for Ethos-U driver operations

use thiserror::Error;

/// Result type alias for Ethos-U operations
pub type Result<T> = std::result::Result<T, EthosuError>;

/// Errors that can occur during Ethos-U operations
#[derive(Debug, Error)]
pub enum EthosuError {
    /// Out-of-range index or enum value; nothing was written
    #[error("Invalid parameter: {what}")]
    InvalidParam {
        /// What was rejected
        what: String,
    },

    /// Payload does not start with the "COP1" FourCC
    #[error("Bad payload magic {found:#010x}, expected {expected:#010x}")]
    BadMagic {
        /// First word of the payload
        found: u32,
        /// Expected FourCC
        expected: u32,
    },

    /// Payload length is not a whole number of words
    #[error("Payload length {len} is not a multiple of 4 bytes")]
    LengthNotAligned {
        /// Payload length in bytes
        len: usize,
    },

    /// A record claims more words than remain in the payload
    #[error("Record at byte {offset} needs {needed} words, only {available} remain")]
    Truncated {
        /// Byte offset of the record header
        offset: usize,
        /// Words the record needs, header included
        needed: usize,
        /// Words left in the payload
        available: usize,
    },

    /// Unknown driver-action command code
    #[error("Unsupported driver action {code} at byte {offset}")]
    UnknownAction {
        /// Command code
        code: u8,
        /// Byte offset of the record header
        offset: usize,
    },

    /// Command stream or base address not 16-byte aligned
    #[error("{what} address {addr:#x} not aligned to 16 bytes")]
    Misaligned {
        /// Which address
        what: String,
        /// Offending address
        addr: u64,
    },

    /// Base region mapped to fast memory is larger than the fast-memory area
    #[error("Fast memory area too small: {available} bytes, need {required}")]
    FastMemoryTooSmall {
        /// Configured fast-memory size
        available: usize,
        /// Size of the base region it replaces
        required: usize,
    },

    /// Model was compiled for a different NPU configuration
    #[error("NPU config mismatch: {}", .fields.join(", "))]
    ConfigMismatch {
        /// Every field that did not match
        fields: Vec<&'static str>,
    },

    /// Error status raised by the NPU; the device has already been reset
    #[error("Hardware fault, status {status:#010x}")]
    HardwareFault {
        /// STATUS word observed in the interrupt handler
        status: u32,
    },

    /// Interrupt received but the NPU did not consume the whole stream
    #[error("Command stream incomplete: qread {qread}, expected {expected}")]
    StreamIncomplete {
        /// Final queue read offset in bytes
        qread: u32,
        /// Stream length in bytes
        expected: u32,
    },

    /// Reset did not complete within the poll budget
    #[error("Reset timeout after {polls} polls")]
    Timeout {
        /// Number of status polls
        polls: u32,
    },

    /// NPU came out of reset with a different privilege / security state
    #[error("Security state mismatch: requested {requested:#x}, active {active:#x}")]
    SecurityMismatch {
        /// Requested RESET word
        requested: u32,
        /// PROT word after reset
        active: u32,
    },

    /// Inference aborted by the caller
    #[error("Inference aborted")]
    Aborted,

    /// Driver already in the pool
    #[error("Driver {id} already registered")]
    AlreadyRegistered {
        /// Driver id
        id: usize,
    },

    /// Driver not in the pool
    #[error("Driver {id} not registered")]
    NotRegistered {
        /// Driver id
        id: usize,
    },

    /// A driver-action record failed during invoke
    #[error("Driver action at byte {offset} failed: {source}")]
    RecordFailed {
        /// Byte offset of the record header
        offset: usize,
        /// Underlying failure
        #[source]
        source: Box<EthosuError>,
    },

    /// I/O error while mapping the register window
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl EthosuError {
    /// Create an invalid parameter error
    pub fn invalid_param(what: impl Into<String>) -> Self {
        Self::InvalidParam { what: what.into() }
    }

    /// Create a misalignment error
    pub fn misaligned(what: impl Into<String>, addr: u64) -> Self {
        Self::Misaligned {
            what: what.into(),
            addr,
        }
    }

    /// Wrap a record failure with its payload offset
    pub fn record_failed(offset: usize, source: Self) -> Self {
        Self::RecordFailed {
            offset,
            source: Box::new(source),
        }
    }

    /// Innermost error, looking through [`EthosuError::RecordFailed`]
    pub fn root(&self) -> &Self {
        match self {
            Self::RecordFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<rustix::io::Errno> for EthosuError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io {
            source: errno.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_mismatch_lists_fields() {
        let e = EthosuError::ConfigMismatch {
            fields: vec!["macs_per_cc", "shram_size"],
        };
        assert_eq!(e.to_string(), "NPU config mismatch: macs_per_cc, shram_size");
    }

    #[test]
    fn root_unwraps_record_failure() {
        let e = EthosuError::record_failed(4, EthosuError::Aborted);
        assert!(matches!(e.root(), EthosuError::Aborted));
        assert!(e.to_string().contains("byte 4"));
    }
}
