//! Human-readable listing of emitted code, used by `clearc --debug`.

use std::fmt::Write;

use super::constant::Constant;
use super::opcode::{Code, Opcode};

/// Renders the constant pool and instruction stream as a listing with
/// byte offsets. Offsets count from the start of the instruction stream,
/// matching what jump operands are measured against.
pub fn dump(constants: &[Constant], code: &[Code]) -> String {
    let mut out = String::new();

    writeln!(out, "constants ({}):", constants.len()).unwrap();
    for (index, constant) in constants.iter().enumerate() {
        writeln!(out, "  {index:>3} {} {constant}", constant.tag().name()).unwrap();
    }

    writeln!(out, "code ({} bytes):", code.len()).unwrap();
    let mut offset = 0usize;
    let mut pos = 0usize;
    while pos < code.len() {
        match code[pos] {
            Code::Op(op) => {
                let operands = operand_values(&code[pos + 1..], op.operand_count());
                let width = 1 + operands.len();

                write!(out, "  {offset:>4} {}", op.name()).unwrap();
                for value in &operands {
                    write!(out, " {value}").unwrap();
                }
                if let Some(target) = jump_target(op, offset, &operands) {
                    write!(out, " -> {target}").unwrap();
                }
                out.push('\n');

                pos += width;
                offset += width;
            }
            Code::Index(value) => {
                // Stray operand outside any opcode; the emitter is broken,
                // show it rather than panic.
                writeln!(out, "  {offset:>4} .byte {value}").unwrap();
                pos += 1;
                offset += 1;
            }
        }
    }
    out
}

fn operand_values(rest: &[Code], count: usize) -> Vec<i32> {
    rest.iter()
        .take(count)
        .map(|item| match *item {
            Code::Index(value) => value,
            Code::Op(op) => op as i32,
        })
        .collect()
}

/// Resolved destination offset for jump instructions. Offsets are
/// relative to the byte after the operand; `LOOP` jumps backwards.
fn jump_target(op: Opcode, offset: usize, operands: &[i32]) -> Option<usize> {
    let operand = *operands.first()? as i64;
    let after = offset as i64 + 2;
    match op {
        Opcode::Jump | Opcode::JumpIfFalse => (after + operand).try_into().ok(),
        Opcode::Loop => (after - operand).try_into().ok(),
        _ => None,
    }
}
