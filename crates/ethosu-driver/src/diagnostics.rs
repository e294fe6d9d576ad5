//! Post-mortem dumps: registers, SHRAM and command streams.
//!
//! Everything here logs at `info` and returns what it read, so callers and
//! tests can inspect the values without scraping logs.

use ethosu_chip::names::{cmd0_name, cmd1_name, register_name};
use ethosu_chip::regs;

use crate::device::Device;

/// Command word flag marking a two-word (`cmd1`) command.
const CMD1_FLAG: u32 = 0x4000;
/// Opcode bits of a command word.
const OPCODE_MASK: u32 = 0x3FF;

/// Log registers `start..end` (byte offsets, end exclusive).
pub fn dump_registers(dev: &Device, start: usize, end: usize) -> Vec<(usize, u32)> {
    tracing::info!("dump_register {start:#X} - {:#X}", end.saturating_sub(4));
    (start..end)
        .step_by(4)
        .map(|offset| {
            let value = dev.read_reg(offset);
            tracing::info!(
                "[{offset:#06X}] {value:#010X}\t{}",
                register_name(offset).unwrap_or("")
            );
            (offset, value)
        })
        .collect()
}

/// Log every [`regs::DIAGNOSTIC_RANGES`] register.
pub fn dump_diagnostic_registers(dev: &Device) -> Vec<(usize, u32)> {
    regs::DIAGNOSTIC_RANGES
        .iter()
        .flat_map(|&(start, end)| dump_registers(dev, start, end))
        .collect()
}

/// Log the whole SHRAM, one 1 KiB window at a time. Returns the number of
/// windows read.
pub fn dump_shram(dev: &Device) -> usize {
    let sections = dev.config().shram_size as usize;
    tracing::info!("dump_shram size = {sections} KB");
    for section in 0..sections {
        let data = dev.get_shram_data(section);
        tracing::info!("***SHRAM SECTION {section}***");
        for (i, word) in data.iter().enumerate() {
            tracing::info!("[{:#06x}] {word:x}", section * regs::SHRAM_WINDOW + i * 4);
        }
    }
    sections
}

/// One decoded command-stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    /// Byte offset of the command in the stream
    pub offset: usize,
    /// Raw word(s)
    pub words: Vec<u32>,
    /// Opcode mnemonic, if known
    pub name: Option<&'static str>,
    /// Parameter: the upper half of a `cmd0` word, or the second word of a `cmd1`
    pub value: u32,
    /// NPU had read up to this command
    pub at_qread: bool,
}

impl std::fmt::Display for StreamLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:04}]", self.offset)?;
        for word in &self.words {
            for b in word.to_le_bytes() {
                write!(f, " {b:#04X}")?;
            }
        }
        if let Some(name) = self.name {
            write!(f, "\t{name} {:#010X}", self.value)?;
        }
        if self.at_qread {
            write!(f, " <<== QREAD")?;
        }
        Ok(())
    }
}

/// Decode a command stream for display, marking the command at `qread`.
pub fn decode_command_stream(words: &[u32], qread: u32) -> Vec<StreamLine> {
    let mut lines = Vec::new();
    let mut n = 0;
    while n < words.len() {
        let offset = n * 4;
        let word = words[n];
        let line = if word & CMD1_FLAG != 0 && n + 1 < words.len() {
            n += 1;
            StreamLine {
                offset,
                words: vec![word, words[n]],
                name: cmd1_name(word & OPCODE_MASK),
                value: words[n],
                at_qread: false,
            }
        } else {
            StreamLine {
                offset,
                words: vec![word],
                name: cmd0_name(word & OPCODE_MASK),
                value: word >> 16,
                at_qread: false,
            }
        };
        lines.push(StreamLine {
            at_qread: offset as u64 == u64::from(qread),
            ..line
        });
        n += 1;
    }
    lines
}

/// Log a command stream.
pub fn dump_command_stream(words: &[u32], qread: u32) -> Vec<StreamLine> {
    tracing::info!(
        "dump_command_stream cms_length = {} qread = {qread}",
        words.len()
    );
    let lines = decode_command_stream(words, qread);
    for line in &lines {
        tracing::info!("{line}");
    }
    lines
}

/// Words of a byte stream, little-endian.
pub(crate) fn stream_words(stream: &[u8]) -> Vec<u32> {
    bytemuck::pod_collect_to_vec::<u8, [u8; 4]>(stream)
        .into_iter()
        .map(u32::from_le_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_cmd0_and_cmd1() {
        // NPU_SET_IFM_PAD_TOP 3, NPU_SET_IFM_BASE0 0x1000, NPU_OP_STOP
        let words = [0x0003_0100, 0x0000_4000, 0x0000_1000, 0xFFFF_0000];
        let lines = decode_command_stream(&words, 12);
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0].name, Some("NPU_SET_IFM_PAD_TOP"));
        assert_eq!(lines[0].value, 3);

        assert_eq!(lines[1].offset, 4);
        assert_eq!(lines[1].name, Some("NPU_SET_IFM_BASE0"));
        assert_eq!(lines[1].value, 0x1000);
        assert_eq!(lines[1].words.len(), 2);

        assert_eq!(lines[2].offset, 12);
        assert_eq!(lines[2].name, Some("NPU_OP_STOP"));
        assert!(lines[2].at_qread);
        assert!(!lines[0].at_qread);
    }

    #[test]
    fn trailing_cmd1_without_payload() {
        let lines = decode_command_stream(&[0x0000_4000], 0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words.len(), 1);
    }

    #[test]
    fn display_marks_qread() {
        let lines = decode_command_stream(&[0x0000_0000], 0);
        let s = lines[0].to_string();
        assert!(s.starts_with("[0000] 0x00 0x00 0x00 0x00"));
        assert!(s.contains("NPU_OP_STOP"));
        assert!(s.ends_with("<<== QREAD"));
    }

    #[test]
    fn stream_words_little_endian() {
        assert_eq!(stream_words(&[1, 0, 0, 0, 0, 0, 0, 0x80]), [1, 0x8000_0000]);
    }
}
