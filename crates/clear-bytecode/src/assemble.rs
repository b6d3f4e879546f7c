//! Serialization of constants and instructions into the VM byte format.

use super::constant::Constant;
use super::opcode::Code;

/// Errors surfaced while assembling emitted code.
///
/// These point at the emitter, not at user source: a well-formed program
/// within the documented limits (≤ 255 constants, ≤ 255 slots per frame)
/// never triggers them.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("constant pool overflow: {0} entries (max 255)")]
    TooManyConstants(usize),

    #[error("string constant too long: {0} bytes (max 255)")]
    StringTooLong(usize),

    #[error("index {0} does not fit in a byte")]
    IndexTooLarge(i32),

    #[error("negative index {0} in emitted code")]
    NegativeIndex(i32),
}

/// Byte size of a slice of code items after assembly.
///
/// Jump offsets are measured with this, so it must agree with the writer
/// below item for item.
pub fn code_size(code: &[Code]) -> usize {
    code.iter().map(|item| item.size()).sum()
}

/// Assembles the constant-pool header: `count: u8`, then `tag: u8` +
/// payload per constant.
pub fn assemble_header(constants: &[Constant]) -> Result<Vec<u8>, AssembleError> {
    if constants.len() > 255 {
        return Err(AssembleError::TooManyConstants(constants.len()));
    }
    let mut out = Vec::new();
    out.push(constants.len() as u8);
    for constant in constants {
        out.push(constant.tag() as u8);
        match constant {
            Constant::Int(value) => out.extend_from_slice(&value.to_le_bytes()),
            Constant::Num(value) => out.extend_from_slice(&value.to_le_bytes()),
            Constant::Str(value) => {
                if value.len() > 255 {
                    return Err(AssembleError::StringTooLong(value.len()));
                }
                out.push(value.len() as u8);
                out.extend_from_slice(value.as_bytes());
            }
        }
    }
    Ok(out)
}

/// Assembles a full program: constant header followed by the instruction
/// stream, opcodes and index bytes written one byte each.
pub fn assemble(constants: &[Constant], code: &[Code]) -> Result<Vec<u8>, AssembleError> {
    let mut out = assemble_header(constants)?;
    out.reserve(code.len());
    for item in code {
        match *item {
            Code::Op(op) => out.push(op as u8),
            Code::Index(value) => {
                if value < 0 {
                    return Err(AssembleError::NegativeIndex(value));
                }
                if value > 255 {
                    return Err(AssembleError::IndexTooLarge(value));
                }
                out.push(value as u8);
            }
        }
    }
    Ok(out)
}
