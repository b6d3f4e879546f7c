//! Tests for Pratt expression parsing.

use crate::ast::{Ast, BinaryOp, DeclKind, ExprId, ExprKind, Stmt, UnaryOp};
use crate::test_utils::parse_ok;

/// The expression behind a single expression statement.
fn expr_of(source: &str) -> (Ast, ExprId) {
    let ast = parse_ok(source);
    assert_eq!(ast.items.len(), 1, "expected one declaration");
    let expr = match &ast.decl(ast.items[0]).kind {
        DeclKind::Stmt(Stmt::Expr(expr)) => *expr,
        other => panic!("expected an expression statement, got {other:?}"),
    };
    (ast, expr)
}

#[test]
fn literals() {
    let (ast, expr) = expr_of("5i;");
    assert!(matches!(ast.expr(expr).kind, ExprKind::Int(5)));

    let (ast, expr) = expr_of("5.25;");
    assert!(matches!(ast.expr(expr).kind, ExprKind::Num(value) if value == 5.25));

    let (ast, expr) = expr_of("true;");
    assert!(matches!(ast.expr(expr).kind, ExprKind::Bool(true)));

    let (ast, expr) = expr_of("nil;");
    assert!(matches!(ast.expr(expr).kind, ExprKind::Nil));
}

#[test]
fn adjacent_strings_concatenate_with_a_quote() {
    let (ast, expr) = expr_of("\"a\" \"b\";");
    match &ast.expr(expr).kind {
        ExprKind::Str(value) => assert_eq!(value, "a\"b"),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn factor_binds_tighter_than_term() {
    let (ast, expr) = expr_of("1i + 2i * 3i;");
    let ExprKind::Binary { op, lhs, rhs, .. } = &ast.expr(expr).kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(ast.expr(*lhs).kind, ExprKind::Int(1)));
    assert!(matches!(
        ast.expr(*rhs).kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn repeated_operators_group_from_the_left() {
    let (ast, expr) = expr_of("1i - 2i - 3i;");
    let ExprKind::Binary { op, lhs, rhs, .. } = &ast.expr(expr).kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Sub);
    assert!(matches!(
        ast.expr(*lhs).kind,
        ExprKind::Binary {
            op: BinaryOp::Sub,
            ..
        }
    ));
    assert!(matches!(ast.expr(*rhs).kind, ExprKind::Int(3)));
}

#[test]
fn comparison_and_logic_precedence() {
    // (1 < 2) and (3 < 4)
    let (ast, expr) = expr_of("1i < 2i and 3i < 4i;");
    let ExprKind::Binary { op, lhs, rhs, .. } = &ast.expr(expr).kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::And);
    for side in [lhs, rhs] {
        assert!(matches!(
            ast.expr(*side).kind,
            ExprKind::Binary {
                op: BinaryOp::Less,
                ..
            }
        ));
    }
}

#[test]
fn unary_operators() {
    let (ast, expr) = expr_of("-1i;");
    assert!(matches!(
        ast.expr(expr).kind,
        ExprKind::Unary {
            op: UnaryOp::Neg,
            ..
        }
    ));

    let (ast, expr) = expr_of("!true;");
    assert!(matches!(
        ast.expr(expr).kind,
        ExprKind::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
}

#[test]
fn grouping_overrides_precedence() {
    let (ast, expr) = expr_of("(1i + 2i) * 3i;");
    assert!(matches!(
        ast.expr(expr).kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn parenthesized_list_is_a_tuple() {
    let (ast, expr) = expr_of("(1i, 2i, 3i);");
    match &ast.expr(expr).kind {
        ExprKind::Tuple(elements) => assert_eq!(elements.len(), 3),
        other => panic!("expected a tuple, got {other:?}"),
    }
}

#[test]
fn calls_and_arguments() {
    let (ast, expr) = expr_of("f(1i, 2i);");
    let ExprKind::Call { callee, args } = &ast.expr(expr).kind else {
        panic!("expected a call");
    };
    assert!(matches!(&ast.expr(*callee).kind, ExprKind::Ident { name, .. } if name == "f"));
    assert_eq!(args.len(), 2);
}

#[test]
fn access_chains() {
    let (ast, expr) = expr_of("p.x.y;");
    let ExprKind::Access { target, field, .. } = &ast.expr(expr).kind else {
        panic!("expected access");
    };
    assert_eq!(field, "y");
    assert!(matches!(
        &ast.expr(*target).kind,
        ExprKind::Access { field, .. } if field == "x"
    ));
}

#[test]
fn construct_takes_labeled_fields() {
    let (ast, expr) = expr_of("Point { x = 1i, y = 2i };");
    let ExprKind::Construct { name, inits, .. } = &ast.expr(expr).kind else {
        panic!("expected a constructor");
    };
    assert_eq!(name, "Point");
    let labels: Vec<&str> = inits.iter().map(|init| init.name.as_str()).collect();
    assert_eq!(labels, ["x", "y"]);
}

#[test]
fn case_dispatch_with_fallback() {
    let (ast, expr) = expr_of("x ? int x + 1i, str x : 0i;");
    let ExprKind::Case {
        target,
        arms,
        fallback,
        ..
    } = &ast.expr(expr).kind
    else {
        panic!("expected a case expression");
    };
    assert!(matches!(&ast.expr(*target).kind, ExprKind::Ident { name, .. } if name == "x"));
    assert_eq!(arms.len(), 2);
    assert!(matches!(ast.expr(*fallback).kind, ExprKind::Int(0)));
}

#[test]
fn case_rebinds_the_target_name() {
    let (ast, expr) = expr_of("x ? int x : x;");
    let ExprKind::Case { binding, .. } = &ast.expr(expr).kind else {
        panic!("expected a case expression");
    };
    assert_eq!(ast.binding(*binding).name, "x");
}

#[test]
fn lambda_expression() {
    let ast = parse_ok("val f = func(int x) int x + 1i;");
    let DeclKind::Value(data) = &ast.decl(ast.items[0]).kind else {
        panic!("expected a value declaration");
    };
    let ExprKind::Lambda(func) = &ast.expr(data.init).kind else {
        panic!("expected a lambda");
    };
    let info = ast.func(*func);
    assert_eq!(info.params.len(), 1);
    assert!(info.binding.is_none());
    assert!(matches!(info.body, crate::ast::FuncBody::Expr(_)));
}

#[test]
fn this_parses_as_an_identifier() {
    let (ast, expr) = expr_of("this.x;");
    let ExprKind::Access { target, .. } = &ast.expr(expr).kind else {
        panic!("expected access");
    };
    assert!(matches!(&ast.expr(*target).kind, ExprKind::Ident { name, .. } if name == "this"));
}
