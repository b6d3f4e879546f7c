//! Tests for name resolution.

use crate::ast::{DeclKind, ExprKind, Stmt};
use crate::test_utils::{assert_diagnostic, binding_named, resolved};

#[test]
fn identifiers_resolve_to_their_bindings() {
    let (ast, diagnostics) = resolved("val x = 1i; print x;");
    assert!(!diagnostics.has_errors());

    let DeclKind::Stmt(Stmt::Print(Some(expr))) = &ast.decl(ast.items[1]).kind else {
        panic!("expected a print statement");
    };
    let ExprKind::Ident { ref_, .. } = &ast.expr(*expr).kind else {
        panic!("expected an identifier");
    };
    let binding = ref_.expect("resolved");
    assert_eq!(ast.binding(binding).name, "x");
}

#[test]
fn forward_references_resolve_at_top_level() {
    let (_, diagnostics) = resolved("print x; val x = 1i;");
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");
}

#[test]
fn undeclared_names_are_reported() {
    let (_, diagnostics) = resolved("print missing;");
    assert_diagnostic(&diagnostics, "reference to undeclared name missing");
}

#[test]
fn redefinition_in_one_scope_is_an_error() {
    let (_, diagnostics) = resolved("val x = 1i; val x = 2;");
    assert_diagnostic(&diagnostics, "redefinition of name x");
    // Both regions are cited.
    let rendered = diagnostics.printer().render();
    assert!(rendered.contains("previously defined here"));
}

#[test]
fn shadowing_across_scopes_is_allowed() {
    let (_, diagnostics) = resolved("val x = 1i; { val x = 2i; print x; }");
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");
}

#[test]
fn parameter_and_local_share_the_function_scope() {
    let (_, diagnostics) = resolved("func f(int x) int { val x = 1i; return x; }");
    assert_diagnostic(&diagnostics, "redefinition of name x");
}

#[test]
fn builtin_names_are_reserved() {
    let (_, diagnostics) = resolved("val str = 1i;");
    assert_diagnostic(&diagnostics, "reserved for the builtin function str");
}

#[test]
fn struct_names_are_not_values() {
    let (_, diagnostics) = resolved("struct S { int a } print S;");
    assert_diagnostic(&diagnostics, "invalid reference to struct S, expected value");
}

#[test]
fn values_are_not_constructors() {
    let (_, diagnostics) = resolved("val x = 1i; val y = x { a = 1i };");
    assert_diagnostic(&diagnostics, "invalid reference to value x, expected struct");
}

#[test]
fn named_types_must_be_structs() {
    let (_, diagnostics) = resolved("val x = 1i; val y x = 2i;");
    assert_diagnostic(&diagnostics, "invalid reference to value x, expected struct");
}

#[test]
fn this_outside_a_generator_is_an_error() {
    let (_, diagnostics) = resolved("print this;");
    assert_diagnostic(&diagnostics, "this is only available");
}

#[test]
fn this_resolves_inside_a_generator() {
    let (ast, diagnostics) = resolved(
        "struct S { int a, func gen() int { return 1i; } }",
    );
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");
    assert!(binding_named(&ast, "this").name == "this");
}

#[test]
fn set_target_must_be_assignable() {
    let (_, diagnostics) = resolved("val x = 1i; x = 2i;");
    assert_diagnostic(&diagnostics, "unassignable target x");

    let (_, diagnostics) = resolved("var x = 1i; x = 2i;");
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");

    let (_, diagnostics) = resolved("val p = 1i; p.x = 2i;");
    assert_diagnostic(&diagnostics, "unassignable target");
}

#[test]
fn functions_cannot_reassign_themselves() {
    let (_, diagnostics) = resolved("func f() void { f = f; }");
    assert_diagnostic(&diagnostics, "cannot set function within its own body");
}

#[test]
fn duplicate_struct_members_share_one_namespace() {
    let (_, diagnostics) = resolved("struct S { int a, int a }");
    assert_diagnostic(&diagnostics, "duplicate struct member a");

    let (_, diagnostics) = resolved(
        "struct S { int a, func a() int { return 1i; } }",
    );
    assert_diagnostic(&diagnostics, "duplicate struct member a");
}

#[test]
fn duplicate_construct_labels() {
    let (_, diagnostics) = resolved("struct S { int a } val s = S { a = 1i, a = 2i };");
    assert_diagnostic(&diagnostics, "duplicate field specifier a");
}

#[test]
fn case_arms_rebind_the_target_name() {
    let (ast, diagnostics) = resolved("val x = 1i; print x ? int x : 0i;");
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");
    // The arm's `x` resolves to the case binding, not the global.
    let case_binding = ast
        .exprs
        .iter()
        .find_map(|expr| match &expr.kind {
            ExprKind::Case { binding, .. } => Some(*binding),
            _ => None,
        })
        .expect("case expression");
    let arm_ident = ast
        .exprs
        .iter()
        .filter_map(|expr| match &expr.kind {
            ExprKind::Ident {
                name,
                ref_: Some(target),
                ..
            } if name == "x" => Some(*target),
            _ => None,
        })
        .any(|target| target == case_binding);
    assert!(arm_ident, "no identifier resolved to the case binding");
}
