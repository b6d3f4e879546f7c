//! Tests for the assembler byte format and its error cases.

use super::assemble::{AssembleError, assemble, assemble_header, code_size};
use super::constant::Constant;
use super::opcode::{Code, Opcode};

#[test]
fn header_layout_for_each_constant_kind() {
    let constants = [
        Constant::Int(-2),
        Constant::Num(1.5),
        Constant::Str("hi".to_owned()),
    ];
    let bytes = assemble_header(&constants).unwrap();

    let mut expected = vec![3u8];
    expected.push(0);
    expected.extend_from_slice(&(-2i32).to_le_bytes());
    expected.push(1);
    expected.extend_from_slice(&1.5f64.to_le_bytes());
    expected.push(2);
    expected.push(2);
    expected.extend_from_slice(b"hi");

    assert_eq!(bytes, expected);
}

#[test]
fn empty_pool_is_a_single_zero_byte() {
    assert_eq!(assemble_header(&[]).unwrap(), vec![0u8]);
}

#[test]
fn instructions_follow_the_header() {
    let constants = [Constant::Int(1)];
    let code = [
        Code::Op(Opcode::PushConst),
        Code::Index(0),
        Code::Op(Opcode::Print),
    ];
    let bytes = assemble(&constants, &code).unwrap();

    let header = assemble_header(&constants).unwrap();
    assert_eq!(&bytes[..header.len()], &header[..]);
    assert_eq!(
        &bytes[header.len()..],
        &[Opcode::PushConst as u8, 0, Opcode::Print as u8]
    );
}

#[test]
fn pool_overflow_is_rejected() {
    let constants: Vec<Constant> = (0..256).map(Constant::Int).collect();
    assert_eq!(
        assemble_header(&constants),
        Err(AssembleError::TooManyConstants(256))
    );
}

#[test]
fn oversized_string_is_rejected() {
    let constants = [Constant::Str("x".repeat(256))];
    assert_eq!(
        assemble_header(&constants),
        Err(AssembleError::StringTooLong(256))
    );
}

#[test]
fn out_of_range_indices_are_rejected() {
    assert_eq!(
        assemble(&[], &[Code::Index(256)]),
        Err(AssembleError::IndexTooLarge(256))
    );
    assert_eq!(
        assemble(&[], &[Code::Index(-1)]),
        Err(AssembleError::NegativeIndex(-1))
    );
}

#[test]
fn code_size_counts_one_byte_per_item() {
    let code = [
        Code::Op(Opcode::PushLocal),
        Code::Index(3),
        Code::Op(Opcode::Pop),
    ];
    assert_eq!(code_size(&code), 3);
    assert_eq!(code_size(&[]), 0);
}
