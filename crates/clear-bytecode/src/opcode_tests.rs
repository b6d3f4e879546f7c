//! Tests for opcode numbering and operand shapes.

use super::opcode::{Code, ObjectTag, Opcode, ValueTag};

#[test]
fn opcodes_are_contiguous_from_zero() {
    assert_eq!(Opcode::PushConst as u8, 0);
    assert_eq!(Opcode::PushTrue as u8, 1);
    assert_eq!(Opcode::SetGlobal as u8, 4);
    assert_eq!(Opcode::Print as u8, 13);
    assert_eq!(Opcode::StrCat as u8, 26);
    assert_eq!(Opcode::Equal as u8, 32);
    assert_eq!(Opcode::Jump as u8, 33);
    assert_eq!(Opcode::Function as u8, 36);
    assert_eq!(Opcode::Struct as u8, 42);
    assert_eq!(Opcode::IsValType as u8, 50);
    assert_eq!(Opcode::IsObjType as u8, 51);
}

#[test]
fn value_tags_match_the_vm() {
    assert_eq!(ValueTag::Bool as u8, 0);
    assert_eq!(ValueTag::Nil as u8, 1);
    assert_eq!(ValueTag::Obj as u8, 2);
    assert_eq!(ValueTag::Int as u8, 3);
    assert_eq!(ValueTag::Num as u8, 4);
    assert_eq!(ValueTag::Ip as u8, 5);
    assert_eq!(ValueTag::Fp as u8, 6);
}

#[test]
fn object_tags_match_the_vm() {
    assert_eq!(ObjectTag::String as u8, 0);
    assert_eq!(ObjectTag::Struct as u8, 1);
    assert_eq!(ObjectTag::Upvalue as u8, 2);
}

#[test]
fn operand_counts() {
    assert_eq!(Opcode::Print.operand_count(), 0);
    assert_eq!(Opcode::PushConst.operand_count(), 1);
    assert_eq!(Opcode::Jump.operand_count(), 1);
    assert_eq!(Opcode::ExtractField.operand_count(), 2);
    assert_eq!(Opcode::LoadIp.operand_count(), 0);
}

#[test]
fn code_items_are_one_byte() {
    assert_eq!(Code::Op(Opcode::Pop).size(), 1);
    assert_eq!(Code::Index(7).size(), 1);
}
