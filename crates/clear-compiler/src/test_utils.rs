//! Shared helpers for unit tests.

use clear_bytecode::{Code, Constant};

use crate::ast::{Ast, Binding};
use crate::diagnostics::Diagnostics;
use crate::{analyze, codegen, lexer, parser};

/// Lexes and parses, asserting the source is syntactically clean.
pub fn parse_ok(source: &str) -> Ast {
    let mut diagnostics = Diagnostics::new();
    let tokens = lexer::lex(source, &mut diagnostics);
    let parsed = parser::parse(source, tokens);
    diagnostics.extend(parsed.diagnostics);
    assert!(
        !diagnostics.has_errors(),
        "unexpected parse errors: {diagnostics:?}"
    );
    parsed.ast
}

/// Runs the pipeline through resolution and sequencing.
pub fn resolved(source: &str) -> (Ast, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut ast = parse_ok(source);
    analyze::resolve::run(&mut ast, &mut diagnostics);
    analyze::sequence::run(&mut ast, &mut diagnostics);
    (ast, diagnostics)
}

/// Runs the pipeline through the checking phases (types and flow).
pub fn checked(source: &str) -> (Ast, Diagnostics) {
    let (mut ast, mut diagnostics) = resolved(source);
    analyze::type_check::run(&mut ast, &mut diagnostics);
    analyze::flow::run(&mut ast, &mut diagnostics);
    (ast, diagnostics)
}

/// Runs every analysis phase, asserting the source is clean, and returns
/// the fully annotated tree.
pub fn analyzed(source: &str) -> Ast {
    let (mut ast, diagnostics) = checked(source);
    assert!(
        !diagnostics.has_errors(),
        "unexpected diagnostics: {diagnostics:?}"
    );
    analyze::index::run(&mut ast);
    ast
}

/// Compiles a clean program down to constants and code items.
pub fn generated(source: &str) -> (Vec<Constant>, Vec<Code>) {
    let ast = analyzed(source);
    codegen::generate(&ast)
}

/// First binding with the given name.
pub fn binding_named<'a>(ast: &'a Ast, name: &str) -> &'a Binding {
    ast.bindings
        .iter()
        .find(|binding| binding.name == name)
        .unwrap_or_else(|| panic!("no binding named {name}"))
}

/// All diagnostic messages, rendered plainly, for message assertions.
pub fn messages(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics.iter().map(|d| d.message().to_owned()).collect()
}

/// Asserts some diagnostic message contains `needle`.
pub fn assert_diagnostic(diagnostics: &Diagnostics, needle: &str) {
    assert!(
        diagnostics.iter().any(|d| d.message().contains(needle)),
        "no diagnostic containing {needle:?} in {:?}",
        messages(diagnostics)
    );
}
