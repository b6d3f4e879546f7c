//! End-to-end tests for the compiler facade.

use indoc::indoc;

use clear_bytecode::{AssembleError, Opcode};

use super::{Compiler, Error};

#[test]
fn assembles_constants_then_instructions() {
    let bytecode = Compiler::new().compile("print 1i + 2i;").unwrap();

    let mut expected = vec![2u8];
    expected.push(0);
    expected.extend_from_slice(&1i32.to_le_bytes());
    expected.push(0);
    expected.extend_from_slice(&2i32.to_le_bytes());
    expected.extend_from_slice(&[
        Opcode::PushConst as u8,
        0,
        Opcode::PushConst as u8,
        1,
        Opcode::IntAdd as u8,
        Opcode::Str as u8,
        Opcode::Print as u8,
    ]);
    assert_eq!(bytecode, expected);
}

#[test]
fn empty_source_is_an_empty_program() {
    let bytecode = Compiler::new().compile("").unwrap();
    assert_eq!(bytecode, vec![0u8]);
}

#[test]
fn a_realistic_program_compiles() {
    let source = indoc! {r#"
        struct Point { int x, int y }

        func manhattan(Point p) int {
            return p.x + p.y;
        }

        func repeat(str s, int n) str {
            var out = "";
            var i = 0i;
            while (i < n) {
                out = out + s;
                i = i + 1i;
            }
            return out;
        }

        val origin = Point { x = 3i, y = 4i };
        print manhattan(origin);
        print repeat("ab", 3i);
    "#};
    let bytecode = Compiler::new().compile(source).unwrap();
    assert!(!bytecode.is_empty());
}

#[test]
fn closures_and_case_dispatch_compile() {
    let source = indoc! {r#"
        func adder(int n) func(int) int {
            return func(int x) int x + n;
        }

        val inc = adder(1i);
        val maybe int? = 5i;
        print inc(maybe ? int maybe : 0i);
    "#};
    let bytecode = Compiler::new().compile(source).unwrap();
    assert!(!bytecode.is_empty());
}

#[test]
fn redefinition_fails_with_both_regions() {
    let err = Compiler::new()
        .compile("val x = 1i;\nval x = 2;")
        .unwrap_err();
    let Error::Invalid(diagnostics) = err else {
        panic!("expected invalid program");
    };
    assert_eq!(diagnostics.error_count(), 1);
    let rendered = diagnostics.printer().render();
    assert!(rendered.contains("redefinition of name x"));
    assert!(rendered.contains("previously defined here"));
}

#[test]
fn errors_produce_no_bytecode() {
    let compilation = Compiler::new()
        .compile_program("print missing;")
        .unwrap();
    assert!(compilation.bytecode.is_none());
    assert!(compilation.diagnostics.has_errors());
}

#[test]
fn warnings_still_produce_bytecode() {
    let compilation = Compiler::new().compile_program("1i + 2i;").unwrap();
    assert!(compilation.bytecode.is_some());
    assert!(compilation.diagnostics.has_warnings());
    assert!(!compilation.diagnostics.has_errors());
}

#[test]
fn diagnostics_come_back_in_source_order() {
    // The flow error sits later in the source than the type error but is
    // produced by a later phase.
    let source = indoc! {r#"
        func f() int { print 1i; }
        val x int = "s";
    "#};
    let err = Compiler::new().compile(source).unwrap_err();
    let Error::Invalid(diagnostics) = err else {
        panic!("expected invalid program");
    };
    let spans: Vec<u32> = diagnostics.iter().map(|d| d.span().start).collect();
    let mut sorted = spans.clone();
    sorted.sort_unstable();
    assert_eq!(spans, sorted);
}

#[test]
fn parse_errors_gate_the_semantic_phases() {
    let err = Compiler::new()
        .compile("val x = ;\nprint undefined_name;")
        .unwrap_err();
    let Error::Invalid(diagnostics) = err else {
        panic!("expected invalid program");
    };
    // Only the parse error reports; resolution never ran over the
    // partial tree.
    assert!(diagnostics.iter().all(|d| !d.message().contains("undeclared")));
}

#[test]
fn constant_pool_overflow_is_an_assembler_error() {
    let source: String = (0..300).map(|i| format!("print {i}i;\n")).collect();
    let err = Compiler::new().compile(&source).unwrap_err();
    assert!(matches!(
        err,
        Error::Assemble(AssembleError::TooManyConstants(_))
    ));
}

#[test]
fn multiple_declarations_each_report_their_first_error() {
    let err = Compiler::new()
        .compile("val = 1i;\nval = 2i;\nval ok = 3i;")
        .unwrap_err();
    let Error::Invalid(diagnostics) = err else {
        panic!("expected invalid program");
    };
    assert_eq!(diagnostics.error_count(), 2);
}
