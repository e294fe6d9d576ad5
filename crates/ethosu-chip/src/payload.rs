//! "Custom Operator Payload 1" wire format.
//!
//! ```text
//! word 0      FourCC "COP1" (little-endian bytes 'C','O','P','1')
//! word 1..    driver-action records
//!
//! record header (1 word)
//!   [7:0]    command code
//!   [15:8]   reserved / high bits of a stream length
//!   [31:16]  command data
//! ```
//!
//! | Code | Action | Extra words |
//! |------|--------|-------------|
//! | 1 | optimizer config | 2 (hardware config, architecture id) |
//! | 2 | command stream | `(reserved << 16) \| data` |
//! | 3 | read APB registers | 0 |
//! | 4 | dump SHRAM | 0 |
//! | 5 | no-op | 0 |

use crate::Field;

/// Payload magic, `"COP1"` read as a little-endian word.
pub const FOURCC: u32 = (b'1' as u32) << 24 | (b'P' as u32) << 16 | (b'O' as u32) << 8 | b'C' as u32;

/// Size of one payload word in bytes.
pub const WORD_BYTES: usize = 4;

/// Extra words following an optimizer-config header.
pub const OPTIMIZER_CONFIG_WORDS: usize = 2;

/// Driver-action command codes.
pub mod action {
    /// Check the model was compiled for this hardware.
    pub const OPTIMIZER_CONFIG: u8 = 1;
    /// Run an inline command stream.
    pub const COMMAND_STREAM: u8 = 2;
    /// Log a range of registers.
    pub const READ_APB_REG: u8 = 3;
    /// Log the SHRAM contents.
    pub const DUMP_SHRAM: u8 = 4;
    /// Do nothing.
    pub const NOP: u8 = 5;
}

/// Record header fields.
pub mod header {
    use crate::Field;

    /// Command code.
    pub const COMMAND: Field = Field::new(0, 8);
    /// Reserved byte; the high bits of a command-stream length.
    pub const RESERVED: Field = Field::new(8, 8);
    /// Command-specific data.
    pub const DATA: Field = Field::new(16, 16);
}

/// `READ_APB_REG` data: first register offset.
pub const APB_START: Field = Field::new(0, 12);

/// `READ_APB_REG` data: register count minus one.
pub const APB_COUNT_M1: Field = Field::new(12, 4);

/// Base address index replaced by the fast-memory area, if configured.
pub const FAST_MEMORY_BASE_INDEX: usize = 2;

/// Command streams and base addresses must be aligned to this many bytes.
pub const STREAM_ALIGN: usize = 16;

/// Build a record header word.
#[must_use]
pub const fn header_word(command: u8, reserved: u8, data: u16) -> u32 {
    header::DATA.encode(data as u32)
        | header::RESERVED.encode(reserved as u32)
        | header::COMMAND.encode(command as u32)
}
