//! End-to-end code generation tests: source in, op stream out.

use clear_bytecode::{Code, Constant, Opcode};

use crate::test_utils::generated;

fn op(opcode: Opcode) -> Code {
    Code::Op(opcode)
}

fn ix(value: i32) -> Code {
    Code::Index(value)
}

/// True when `needle` appears contiguously inside `haystack`.
fn contains_seq(haystack: &[Code], needle: &[Code]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn addition_prints_via_str() {
    let (constants, code) = generated("print 1i + 2i;");
    assert_eq!(constants, vec![Constant::Int(1), Constant::Int(2)]);
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::PushConst),
            ix(1),
            op(Opcode::IntAdd),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn printing_a_string_skips_the_conversion() {
    let (constants, code) = generated("print \"hi\";");
    assert_eq!(constants, vec![Constant::Str("hi".to_owned())]);
    assert_eq!(code, vec![op(Opcode::PushConst), ix(0), op(Opcode::Print)]);
}

#[test]
fn blank_print_loads_the_empty_string() {
    let (constants, code) = generated("print;");
    assert_eq!(constants, vec![Constant::Str(String::new())]);
    assert_eq!(code, vec![op(Opcode::PushConst), ix(0), op(Opcode::Print)]);
}

#[test]
fn global_values_declare_and_load_by_slot() {
    let (constants, code) = generated("val x = 5i; print x;");
    assert_eq!(constants, vec![Constant::Int(5)]);
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::SetGlobal),
            ix(0),
            op(Opcode::PushGlobal),
            ix(0),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn function_declaration_and_call() {
    let (constants, code) = generated("func id(int x) int { return x; } print id(7i);");
    // Tag for id's function type, then the argument.
    assert_eq!(constants, vec![Constant::Int(0), Constant::Int(7)]);
    assert_eq!(
        code,
        vec![
            // Closure: tag, ip with patched body size, wrapped struct.
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::Function),
            ix(7),
            // Body: load the parameter, stash it, pop param + closure.
            op(Opcode::PushLocal),
            ix(1),
            op(Opcode::SetReturn),
            op(Opcode::Pop),
            op(Opcode::Pop),
            op(Opcode::LoadFp),
            op(Opcode::LoadIp),
            op(Opcode::Struct),
            ix(2),
            op(Opcode::SetGlobal),
            ix(0),
            // Call site: closure, argument, ip from under the argument.
            op(Opcode::PushGlobal),
            ix(0),
            op(Opcode::PushConst),
            ix(1),
            op(Opcode::ExtractField),
            ix(1),
            ix(1),
            op(Opcode::Call),
            ix(2),
            op(Opcode::PushReturn),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn if_else_patches_forward_jumps() {
    let (constants, code) = generated("if (true) { print \"a\"; } else { print \"b\"; }");
    assert_eq!(
        constants,
        vec![Constant::Str("a".to_owned()), Constant::Str("b".to_owned())]
    );
    assert_eq!(
        code,
        vec![
            op(Opcode::PushTrue),
            op(Opcode::JumpIfFalse),
            ix(5),
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::Print),
            op(Opcode::Jump),
            ix(3),
            op(Opcode::PushConst),
            ix(1),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn while_loops_jump_back_over_the_condition() {
    let (constants, code) = generated("var i = 0i; while (i < 3i) { i = i + 1i; }");
    assert_eq!(
        constants,
        vec![Constant::Int(0), Constant::Int(3), Constant::Int(1)]
    );
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::SetGlobal),
            ix(0),
            // Condition.
            op(Opcode::PushGlobal),
            ix(0),
            op(Opcode::PushConst),
            ix(1),
            op(Opcode::IntLess),
            op(Opcode::JumpIfFalse),
            ix(9),
            // Body: i = i + 1i.
            op(Opcode::PushGlobal),
            ix(0),
            op(Opcode::PushConst),
            ix(2),
            op(Opcode::IntAdd),
            op(Opcode::SetGlobal),
            ix(0),
            op(Opcode::Loop),
            ix(16),
        ]
    );
}

#[test]
fn and_short_circuits_to_false() {
    let (_, code) = generated("print true and false;");
    assert_eq!(
        code,
        vec![
            op(Opcode::PushTrue),
            op(Opcode::JumpIfFalse),
            ix(3),
            op(Opcode::PushFalse),
            op(Opcode::Jump),
            ix(1),
            op(Opcode::PushFalse),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn or_short_circuits_to_true() {
    let (_, code) = generated("print false or true;");
    assert_eq!(
        code,
        vec![
            op(Opcode::PushFalse),
            op(Opcode::Not),
            op(Opcode::JumpIfFalse),
            ix(3),
            op(Opcode::PushTrue),
            op(Opcode::Jump),
            ix(1),
            op(Opcode::PushTrue),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn comparison_opcodes_come_from_the_operator_table() {
    let (_, code) = generated("print 1i <= 2i;");
    assert!(contains_seq(
        &code,
        &[op(Opcode::IntGreater), op(Opcode::Not)]
    ));
}

#[test]
fn direct_builtin_calls_emit_the_single_opcode() {
    let (constants, code) = generated("print str(1i);");
    assert_eq!(constants, vec![Constant::Int(1)]);
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn builtin_used_as_a_value_synthesizes_a_closure() {
    let (_, code) = generated("val f = str;");
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::Function),
            ix(8),
            op(Opcode::PushLocal),
            ix(1),
            op(Opcode::Str),
            op(Opcode::SetReturn),
            op(Opcode::Pop),
            op(Opcode::Pop),
            op(Opcode::LoadFp),
            op(Opcode::LoadIp),
            op(Opcode::Struct),
            ix(2),
            op(Opcode::SetGlobal),
            ix(0),
        ]
    );
}

#[test]
fn tuples_build_tagged_structs() {
    let (constants, code) = generated("val t = (1i, \"a\");");
    assert_eq!(
        constants,
        vec![
            Constant::Int(0),
            Constant::Int(1),
            Constant::Str("a".to_owned()),
        ]
    );
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::PushConst),
            ix(1),
            op(Opcode::PushConst),
            ix(2),
            op(Opcode::Struct),
            ix(3),
            op(Opcode::SetGlobal),
            ix(0),
        ]
    );
}

#[test]
fn destructuring_spreads_and_declares_in_reverse() {
    let (_, code) = generated("val a, b = (1i, \"a\"); print b;");
    assert!(contains_seq(
        &code,
        &[
            op(Opcode::Destruct),
            ix(1),
            // b first (top of stack), then a.
            op(Opcode::SetGlobal),
            ix(1),
            op(Opcode::SetGlobal),
            ix(0),
        ]
    ));
}

#[test]
fn constructs_fill_fields_by_label_in_declaration_order() {
    let (constants, code) =
        generated("struct P { int x, int y } val p = P { y = 2i, x = 1i }; print p.y;");
    // Tag, then x's value before y's despite the source order.
    assert_eq!(
        constants,
        vec![Constant::Int(0), Constant::Int(1), Constant::Int(2)]
    );
    assert_eq!(
        code,
        vec![
            op(Opcode::PushConst),
            ix(0),
            op(Opcode::PushConst),
            ix(1),
            op(Opcode::PushConst),
            ix(2),
            op(Opcode::Struct),
            ix(3),
            op(Opcode::SetGlobal),
            ix(0),
            // p.y: field offsets skip the type tag.
            op(Opcode::PushGlobal),
            ix(0),
            op(Opcode::GetField),
            ix(2),
            op(Opcode::Str),
            op(Opcode::Print),
        ]
    );
}

#[test]
fn generators_run_over_the_partial_struct() {
    let (_, code) = generated(
        "struct C { int base, func doubled() int { return this.base + this.base; } }\n\
         val c = C { base = 3i };",
    );
    // The generator closure is declared first, like a function.
    assert!(contains_seq(&code, &[op(Opcode::SetGlobal), ix(0)]));
    // Construction: extract the generator from slot 2, call it with the
    // partial struct, store the result back.
    assert!(contains_seq(
        &code,
        &[
            op(Opcode::ExtractField),
            ix(0),
            ix(2),
            op(Opcode::PushLocal),
            ix(0),
            op(Opcode::ExtractField),
            ix(1),
            ix(1),
            op(Opcode::Call),
            ix(2),
            op(Opcode::PushReturn),
            op(Opcode::SetField),
            ix(2),
        ]
    ));
}

#[test]
fn case_squashes_the_dispatch_temporary() {
    let (_, code) = generated("val x = 5i; print x ? int 1i : 0i;");
    assert!(contains_seq(&code, &[op(Opcode::IsValType), ix(3)]));
    assert_eq!(
        code.iter().filter(|c| **c == op(Opcode::Squash)).count(),
        2,
        "arm and fallback both squash"
    );
}

#[test]
fn lambdas_capture_through_ref_cells() {
    let (_, code) = generated("func outer() func() int { val x = 1i; return func() int x; }");
    // The lambda reads x through its upvalue slot.
    assert!(contains_seq(
        &code,
        &[
            op(Opcode::PushLocal),
            ix(0),
            op(Opcode::GetField),
            ix(2),
            op(Opcode::Deref),
        ]
    ));
    // outer builds the capture from its frame slot.
    assert!(contains_seq(&code, &[op(Opcode::RefLocal), ix(1)]));
}

#[test]
fn returns_pop_locals_between_the_return_and_the_function_root() {
    let (_, code) = generated(
        "func f() int { val a = 1i; { val b = 2i; return a + b; } }",
    );
    // b (block), a (function scope), then the closure pop inside the
    // return sequence.
    assert!(contains_seq(
        &code,
        &[
            op(Opcode::SetReturn),
            op(Opcode::Pop),
            op(Opcode::Pop),
            op(Opcode::Pop),
            op(Opcode::LoadFp),
            op(Opcode::LoadIp),
        ]
    ));
}

#[test]
fn void_functions_get_an_implicit_return() {
    let (_, code) = generated("func f() void { print 1i; }");
    assert!(contains_seq(
        &code,
        &[
            op(Opcode::Print),
            op(Opcode::Pop),
            op(Opcode::LoadFp),
            op(Opcode::LoadIp),
        ]
    ));
}

#[test]
fn blocks_pop_their_locals() {
    let (_, code) = generated("{ val a = 1i; print a; }");
    assert!(contains_seq(
        &code,
        &[op(Opcode::Print), op(Opcode::Pop)]
    ));
}

#[test]
fn expression_statements_pop_non_void_values() {
    // The unused-value warning does not block code generation.
    let (_, code) = generated("func f() int { return 1i; } f();");
    assert!(contains_seq(
        &code,
        &[op(Opcode::PushReturn), op(Opcode::Pop)]
    ));
}
