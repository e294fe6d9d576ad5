//! Driver-action payload reader and builder.
//!
//! [`PayloadReader`] walks a "COP1" payload record by record with explicit
//! bounds checks and yields a typed [`DriverAction`] per record. It never
//! touches hardware. [`PayloadBuilder`] produces payloads for tests and
//! tooling, padding with NOPs so command streams land 16-byte aligned.

use bytemuck::{Pod, Zeroable};
use ethosu_chip::payload::{
    action, header, header_word, APB_COUNT_M1, APB_START, FOURCC, OPTIMIZER_CONFIG_WORDS,
    STREAM_ALIGN, WORD_BYTES,
};
use ethosu_chip::regs::optimizer_header;

use crate::error::{EthosuError, Result};

/// One decoded driver-action record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction<'a> {
    /// Hardware configuration the model was compiled for
    OptimizerConfig {
        /// Optimizer config release number
        rel_nbr: u32,
        /// Optimizer config patch number
        patch_nbr: u32,
        /// Expected `CONFIG` layout word
        config_word: u32,
        /// Expected `ID` layout word
        id_word: u32,
    },
    /// Inline NPU command stream
    CommandStream {
        /// Stream bytes, a whole number of words
        stream: &'a [u8],
    },
    /// Log `count` registers from `start`
    ReadApbReg {
        /// First register offset
        start: usize,
        /// Number of registers
        count: usize,
    },
    /// Log the SHRAM contents
    DumpShram,
    /// Do nothing
    Nop,
}

/// A record and where it starts in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Byte offset of the record header
    pub offset: usize,
    /// Decoded action
    pub action: DriverAction<'a>,
}

/// Cursor over the records of a payload.
///
/// Yields `Err` once for a malformed record and then stops.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> PayloadReader<'a> {
    /// Validate the payload header.
    ///
    /// # Errors
    ///
    /// Returns [`EthosuError::LengthNotAligned`] if the length is not a
    /// positive multiple of 4, or [`EthosuError::BadMagic`] if the first
    /// word is not the "COP1" FourCC.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < WORD_BYTES || bytes.len() % WORD_BYTES != 0 {
            return Err(EthosuError::LengthNotAligned { len: bytes.len() });
        }
        let magic = word_at(bytes, 0);
        if magic != FOURCC {
            return Err(EthosuError::BadMagic {
                found: magic,
                expected: FOURCC,
            });
        }
        Ok(Self {
            bytes,
            pos: WORD_BYTES,
            failed: false,
        })
    }

    /// Whole payload.
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn remaining_words(&self) -> usize {
        (self.bytes.len() - self.pos) / WORD_BYTES
    }

    fn take(&mut self, offset: usize, extra_words: usize) -> Result<&'a [u8]> {
        let available = self.remaining_words();
        if extra_words + 1 > available {
            return Err(EthosuError::Truncated {
                offset,
                needed: extra_words + 1,
                available,
            });
        }
        let start = self.pos + WORD_BYTES;
        let end = start + extra_words * WORD_BYTES;
        self.pos = end;
        Ok(&self.bytes[start..end])
    }

    fn decode(&mut self) -> Result<Record<'a>> {
        let offset = self.pos;
        let word = word_at(self.bytes, offset);
        #[allow(clippy::cast_possible_truncation)]
        let code = header::COMMAND.get(word) as u8;
        let data = header::DATA.get(word);

        let action = match code {
            action::OPTIMIZER_CONFIG => {
                let extra = self.take(offset, OPTIMIZER_CONFIG_WORDS)?;
                DriverAction::OptimizerConfig {
                    rel_nbr: optimizer_header::REL_NBR.get(data),
                    patch_nbr: optimizer_header::PATCH_NBR.get(data),
                    config_word: word_at(extra, 0),
                    id_word: word_at(extra, WORD_BYTES),
                }
            }
            action::COMMAND_STREAM => {
                let words = ((header::RESERVED.get(word) << 16) | data) as usize;
                DriverAction::CommandStream {
                    stream: self.take(offset, words)?,
                }
            }
            action::READ_APB_REG => {
                self.take(offset, 0)?;
                DriverAction::ReadApbReg {
                    start: APB_START.get(data) as usize,
                    count: APB_COUNT_M1.get(data) as usize + 1,
                }
            }
            action::DUMP_SHRAM => {
                self.take(offset, 0)?;
                DriverAction::DumpShram
            }
            action::NOP => {
                self.take(offset, 0)?;
                DriverAction::Nop
            }
            code => return Err(EthosuError::UnknownAction { code, offset }),
        };
        Ok(Record { offset, action })
    }
}

impl<'a> Iterator for PayloadReader<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytes.len() {
            return None;
        }
        let record = self.decode();
        self.failed = record.is_err();
        Some(record)
    }
}

fn word_at(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; WORD_BYTES];
    word.copy_from_slice(&bytes[offset..offset + WORD_BYTES]);
    u32::from_le_bytes(word)
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// 16-byte aligned storage unit so built payloads can carry aligned streams.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
struct Block([u8; STREAM_ALIGN]);

/// Builds payloads in 16-byte aligned memory.
#[derive(Debug, Default, Clone)]
pub struct PayloadBuilder {
    words: Vec<u32>,
}

impl PayloadBuilder {
    /// Empty payload holding only the FourCC.
    pub fn new() -> Self {
        Self { words: vec![FOURCC] }
    }

    /// Append an optimizer-config record.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn optimizer_config(
        mut self,
        rel_nbr: u32,
        patch_nbr: u32,
        config_word: u32,
        id_word: u32,
    ) -> Self {
        let data = optimizer_header::REL_NBR.encode(rel_nbr)
            | optimizer_header::PATCH_NBR.encode(patch_nbr);
        self.words
            .push(header_word(action::OPTIMIZER_CONFIG, 0, data as u16));
        self.words.extend([config_word, id_word]);
        self
    }

    /// Append a command-stream record, padding with NOPs first so the
    /// stream starts on a 16-byte boundary.
    #[must_use]
    pub fn command_stream(mut self, stream: &[u32]) -> Self {
        let per_block = STREAM_ALIGN / WORD_BYTES;
        while (self.words.len() + 1) % per_block != 0 {
            self.words.push(header_word(action::NOP, 0, 0));
        }
        self.push_stream_header(stream.len());
        self.words.extend_from_slice(stream);
        self
    }

    /// Append a command-stream record without alignment padding.
    #[must_use]
    pub fn command_stream_unaligned(mut self, stream: &[u32]) -> Self {
        let per_block = STREAM_ALIGN / WORD_BYTES;
        if (self.words.len() + 1) % per_block == 0 {
            self.words.push(header_word(action::NOP, 0, 0));
        }
        self.push_stream_header(stream.len());
        self.words.extend_from_slice(stream);
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push_stream_header(&mut self, len: usize) {
        let reserved = (len >> 16) as u8;
        let data = (len & 0xFFFF) as u16;
        self.words
            .push(header_word(action::COMMAND_STREAM, reserved, data));
    }

    /// Append a read-APB-registers record.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_apb_reg(mut self, start: usize, count: usize) -> Self {
        let data = APB_START.encode(start as u32)
            | APB_COUNT_M1.encode(count.saturating_sub(1) as u32);
        self.words
            .push(header_word(action::READ_APB_REG, 0, data as u16));
        self
    }

    /// Append a dump-SHRAM record.
    #[must_use]
    pub fn dump_shram(mut self) -> Self {
        self.words.push(header_word(action::DUMP_SHRAM, 0, 0));
        self
    }

    /// Append a NOP record.
    #[must_use]
    pub fn nop(mut self) -> Self {
        self.words.push(header_word(action::NOP, 0, 0));
        self
    }

    /// Append a raw word.
    #[must_use]
    pub fn raw(mut self, word: u32) -> Self {
        self.words.push(word);
        self
    }

    /// Finish the payload.
    pub fn build(self) -> Payload {
        let len = self.words.len() * WORD_BYTES;
        let mut blocks = vec![Block::zeroed(); len.div_ceil(STREAM_ALIGN)];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut blocks);
        for (chunk, word) in bytes.chunks_exact_mut(WORD_BYTES).zip(&self.words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Payload { blocks, len }
    }
}

/// Payload bytes starting on a 16-byte boundary.
#[derive(Debug, Clone)]
pub struct Payload {
    blocks: Vec<Block>,
    len: usize,
}

impl Payload {
    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.blocks)[..self.len]
    }

    /// Copy of `bytes` in aligned storage.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut blocks = vec![Block::zeroed(); bytes.len().div_ceil(STREAM_ALIGN)];
        bytemuck::cast_slice_mut::<Block, u8>(&mut blocks)[..bytes.len()].copy_from_slice(bytes);
        Self {
            blocks,
            len: bytes.len(),
        }
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(bytes: &[u8]) -> Vec<Result<Record<'_>>> {
        PayloadReader::new(bytes).unwrap().collect()
    }

    #[test]
    fn rejects_bad_header() {
        assert!(matches!(
            PayloadReader::new(b"COP2"),
            Err(EthosuError::BadMagic { .. })
        ));
        assert!(matches!(
            PayloadReader::new(b"COP1\0\0"),
            Err(EthosuError::LengthNotAligned { len: 6 })
        ));
        assert!(matches!(
            PayloadReader::new(&[]),
            Err(EthosuError::LengthNotAligned { len: 0 })
        ));
    }

    #[test]
    fn magic_only_has_no_records() {
        let p = PayloadBuilder::new().build();
        assert!(records(p.as_bytes()).is_empty());
    }

    #[test]
    fn decodes_every_action() {
        let p = PayloadBuilder::new()
            .optimizer_config(1, 2, 0x0000_1034, 0x1010_2011)
            .read_apb_reg(0x200, 4)
            .dump_shram()
            .nop()
            .command_stream(&[0xAAAA_0001, 0xBBBB_0002])
            .build();
        let actions: Vec<_> = records(p.as_bytes())
            .into_iter()
            .map(|r| r.unwrap().action)
            .collect();

        assert_eq!(
            actions[0],
            DriverAction::OptimizerConfig {
                rel_nbr: 1,
                patch_nbr: 2,
                config_word: 0x0000_1034,
                id_word: 0x1010_2011,
            }
        );
        assert_eq!(actions[1], DriverAction::ReadApbReg { start: 0x200, count: 4 });
        assert_eq!(actions[2], DriverAction::DumpShram);
        assert_eq!(actions[3], DriverAction::Nop);
        let DriverAction::CommandStream { stream } = actions.last().unwrap() else {
            panic!("expected a command stream");
        };
        assert_eq!(stream.len(), 8);
        assert_eq!(stream.as_ptr() as usize % STREAM_ALIGN, 0);
    }

    #[test]
    fn unknown_action_stops_iteration() {
        let p = PayloadBuilder::new()
            .raw(header_word(9, 0, 0))
            .nop()
            .build();
        let r = records(p.as_bytes());
        assert_eq!(r.len(), 1);
        assert!(matches!(
            r[0],
            Err(EthosuError::UnknownAction { code: 9, offset: 4 })
        ));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let p = PayloadBuilder::new()
            .raw(header_word(action::COMMAND_STREAM, 0, 8))
            .raw(0)
            .build();
        let r = records(p.as_bytes());
        assert!(matches!(
            r[0],
            Err(EthosuError::Truncated {
                offset: 4,
                needed: 9,
                available: 2
            })
        ));
    }

    #[test]
    fn stream_length_uses_reserved_byte() {
        let words = vec![0u32; 0x1_0002];
        let p = PayloadBuilder::new().command_stream(&words).build();
        let r = records(p.as_bytes());
        let Ok(Record {
            action: DriverAction::CommandStream { stream },
            ..
        }) = r.last().unwrap()
        else {
            panic!("expected a command stream");
        };
        assert_eq!(stream.len(), 0x1_0002 * 4);
    }

    #[test]
    fn unaligned_stream_builder() {
        let p = PayloadBuilder::new().command_stream_unaligned(&[1, 2]).build();
        let r = records(p.as_bytes());
        let Ok(Record {
            action: DriverAction::CommandStream { stream },
            ..
        }) = r.last().unwrap()
        else {
            panic!("expected a command stream");
        };
        assert_ne!(stream.as_ptr() as usize % STREAM_ALIGN, 0);
    }
}
