//! Bytecode format for the Clear VM.
//!
//! A compiled program is a constant-pool header followed by a raw
//! instruction stream:
//! - `count: u8`, then for each constant a `tag: u8` and its payload
//!   (int: 4 bytes LE signed, num: 8 bytes LE float, str: `len: u8` +
//!   UTF-8 bytes),
//! - then opcodes and index operands, one byte each, to EOF.
//!
//! This crate defines the opcode set and runtime tags, the [`Constant`]
//! and [`Code`] item types the code generator produces, the [`assemble`]
//! function that serializes them, and a [`dump`] disassembler used for
//! debug traces.

mod assemble;
mod constant;
mod dump;
mod opcode;

pub use assemble::{AssembleError, assemble, assemble_header, code_size};
pub use constant::{Constant, ConstantTag};
pub use dump::dump;
pub use opcode::{Code, ObjectTag, Opcode, ValueTag};

#[cfg(test)]
mod assemble_tests;
#[cfg(test)]
mod opcode_tests;
