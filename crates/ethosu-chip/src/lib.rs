//! Silicon model for Arm Ethos-U class NPUs.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the accelerator: register offsets, register bit fields,
//! PMU event encoding, the driver-action payload format, and the name
//! tables used when dumping registers and command streams.
//!
//! The offsets follow the Ethos-U55 interface definition. Other variants
//! ship their own interface definition; the driver only ever refers to
//! these constants by name.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`field`] | `Field`, a named `(mask, shift)` pair over a 32-bit word |
//! | [`regs`] | Register offsets and per-register field layouts |
//! | [`memory`] | AXI memory-type / burst enums used by region and AXI config |
//! | [`pmu`] | PMU counter masks and the event-type encoding |
//! | [`payload`] | "Custom Operator Payload 1" format constants |
//! | [`names`] | Register / command-stream opcode name tables |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod field;
pub mod memory;
pub mod names;
pub mod payload;
pub mod pmu;
pub mod regs;

pub use field::Field;
