//! Tests for declaration, statement, and type grammar.

use crate::ast::{DeclKind, FuncBody, Stmt, TypeExprKind};
use crate::test_utils::parse_ok;
use crate::types::Builtin;

#[test]
fn value_declaration_with_annotation() {
    let ast = parse_ok("val x int = 1i;");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    assert_eq!(data.bindings.len(), 1);
    let binding = ast.binding(data.bindings[0]);
    assert_eq!(binding.name, "x");
    assert!(!binding.mutable);
    let annotation = data.type_expr.expect("annotated");
    assert!(matches!(
        ast.type_expr(annotation).kind,
        TypeExprKind::Atom(Builtin::Int)
    ));
}

#[test]
fn var_declares_a_mutable_binding() {
    let ast = parse_ok("var x = 1i;");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    assert!(ast.binding(data.bindings[0]).mutable);
}

#[test]
fn destructuring_declares_several_bindings() {
    let ast = parse_ok("val a, b = (1i, 2i);");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    let names: Vec<&str> = data
        .bindings
        .iter()
        .map(|b| ast.binding(*b).name.as_str())
        .collect();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn function_declaration() {
    let ast = parse_ok("func add(int a, int b) int { return a + b; }");
    let DeclKind::Func(func) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a function declaration");
    };
    let info = ast.func(*func);
    assert_eq!(ast.binding(info.binding.unwrap()).name, "add");
    assert_eq!(info.params.len(), 2);
    let FuncBody::Block(block) = info.body else {
        panic!("expected a block body");
    };
    assert_eq!(ast.block(block).decls.len(), 1);
}

#[test]
fn struct_declaration_with_fields_and_generator() {
    let ast = parse_ok(
        "struct Counter {\n    int base,\n    func doubled() int { return 1i; }\n}",
    );
    let DeclKind::Struct(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a struct declaration");
    };
    assert_eq!(data.name, "Counter");
    assert_eq!(data.params.len(), 1);
    assert_eq!(data.generators.len(), 1);
    let generator = ast.func(data.generators[0]);
    assert!(generator.this_binding.is_some());
    assert_eq!(ast.binding(generator.binding.unwrap()).name, "doubled");
}

#[test]
fn if_chain_with_else() {
    let ast = parse_ok("if (true) { } else if (false) { } else { }");
    let DeclKind::Stmt(Stmt::If { arms, else_block }) = &ast.decl(ast.items[0]).kind else {
        panic!("expected an if statement");
    };
    assert_eq!(arms.len(), 2);
    assert!(else_block.is_some());
}

#[test]
fn while_condition_is_optional() {
    let ast = parse_ok("while { }");
    let DeclKind::Stmt(Stmt::While { cond, .. }) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a while statement");
    };
    assert!(cond.is_none());

    let ast = parse_ok("while (true) { }");
    let DeclKind::Stmt(Stmt::While { cond, .. }) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a while statement");
    };
    assert!(cond.is_some());
}

#[test]
fn return_value_is_optional() {
    let ast = parse_ok("func f() void { return; }");
    let DeclKind::Func(func) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a function");
    };
    let FuncBody::Block(block) = ast.func(*func).body else {
        panic!("expected a block");
    };
    let decl = ast.block(block).decls[0];
    assert!(matches!(
        ast.decl(decl).kind,
        DeclKind::Stmt(Stmt::Return(None))
    ));
}

#[test]
fn print_without_expression() {
    let ast = parse_ok("print;");
    assert!(matches!(
        ast.decl(ast.items[0]).kind,
        DeclKind::Stmt(Stmt::Print(None))
    ));
}

#[test]
fn assignment_parses_as_a_set_statement() {
    let ast = parse_ok("x = 1i;");
    assert!(matches!(
        ast.decl(ast.items[0]).kind,
        DeclKind::Stmt(Stmt::Set { .. })
    ));
}

#[test]
fn blocks_nest_as_statements() {
    let ast = parse_ok("{ val x = 1i; print x; }");
    let DeclKind::Stmt(Stmt::Block(block)) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a block statement");
    };
    assert_eq!(ast.block(*block).decls.len(), 2);
}

#[test]
fn optional_type_suffix() {
    let ast = parse_ok("val x int? = nil;");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    let annotation = data.type_expr.unwrap();
    let TypeExprKind::Optional(inner) = ast.type_expr(annotation).kind else {
        panic!("expected an optional type");
    };
    assert!(matches!(
        ast.type_expr(inner).kind,
        TypeExprKind::Atom(Builtin::Int)
    ));
}

#[test]
fn union_types_flatten_into_members() {
    let ast = parse_ok("val x int | str | bool = 1i;");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    let TypeExprKind::Union(members) = &ast.type_expr(data.type_expr.unwrap()).kind else {
        panic!("expected a union type");
    };
    assert_eq!(members.len(), 3);
}

#[test]
fn function_types() {
    let ast = parse_ok("val f func(int, str) void = g;");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    let TypeExprKind::Func { params, ret } = &ast.type_expr(data.type_expr.unwrap()).kind else {
        panic!("expected a function type");
    };
    assert_eq!(params.len(), 2);
    assert!(matches!(
        ast.type_expr(*ret).kind,
        TypeExprKind::Atom(Builtin::Void)
    ));
}

#[test]
fn named_types_refer_to_structs() {
    let ast = parse_ok("struct P { int x } val p P = P { x = 1i };");
    let DeclKind::Value(data) = &ast.decl(ast.items[1]).kind else {
        panic!("expected a value declaration");
    };
    assert!(matches!(
        &ast.type_expr(data.type_expr.unwrap()).kind,
        TypeExprKind::Named { name, .. } if name == "P"
    ));
}
