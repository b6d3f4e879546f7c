//! Tests for type contraction, subtyping, and the operator tables.

use clear_bytecode::Opcode;

use crate::ast::{BinaryOp, DeclId, UnaryOp};

use super::{
    BUILTINS, Builtin, TYPED_OPERATORS, Type, UNARY_OPERATORS, UNTYPED_OPERATORS, contains,
    intersection, printable, union,
};

#[test]
fn single_element_union_is_that_element() {
    let ty = union([Type::int()]);
    assert_eq!(ty, Type::int());
}

#[test]
fn unions_deduplicate() {
    let ty = union([Type::int(), Type::int(), Type::num()]);
    assert_eq!(ty, union([Type::num(), Type::int()]));
}

#[test]
fn optional_displays_with_question_mark() {
    let ty = union([Type::int(), Type::nil()]);
    assert_eq!(ty.to_string(), "(int)?");
}

#[test]
fn functions_of_equal_arity_merge() {
    let f = Type::function(vec![Type::int()], Type::int());
    let g = Type::function(vec![union([Type::int(), Type::num()])], Type::str());
    let merged = union([f, g]);

    // Parameters intersect, returns union.
    let expected = Type::function(vec![Type::int()], union([Type::int(), Type::str()]));
    assert_eq!(merged, expected);
}

#[test]
fn functions_of_different_arity_stay_separate() {
    let f = Type::function(vec![Type::int()], Type::int());
    let g = Type::function(vec![], Type::int());
    let merged = union([f.clone(), g.clone()]);
    assert_eq!(merged.units().count(), 2);
    assert!(contains(&f, &merged));
    assert!(contains(&g, &merged));
}

#[test]
fn tuples_of_equal_length_merge_element_wise() {
    let a = Type::tuple(vec![Type::int(), Type::str()]);
    let b = Type::tuple(vec![Type::num(), Type::str()]);
    let merged = union([a, b]);
    let expected = Type::tuple(vec![union([Type::int(), Type::num()]), Type::str()]);
    assert_eq!(merged, expected);
}

#[test]
fn unresolved_contaminates() {
    let ty = union([Type::int(), Type::unresolved()]);
    assert_eq!(ty, Type::unresolved());
    assert!(ty.is_unresolved());
}

#[test]
fn contraction_is_idempotent() {
    let samples = [
        Type::int(),
        union([Type::int(), Type::nil()]),
        union([
            Type::function(vec![Type::int()], Type::int()),
            Type::function(vec![Type::num()], Type::num()),
        ]),
        union([Type::tuple(vec![Type::int()]), Type::tuple(vec![Type::num()])]),
        Type::unresolved(),
    ];
    for ty in samples {
        let units = ty.units().cloned().collect();
        let recontracted = Type::new(units);
        assert_eq!(recontracted, ty, "contract(contract(T)) != contract(T)");
    }
}

#[test]
fn contains_is_reflexive() {
    let samples = [
        Type::int(),
        union([Type::int(), Type::num()]),
        Type::function(vec![Type::str()], Type::void()),
        Type::structure(DeclId(0), "Point"),
    ];
    for ty in &samples {
        assert!(contains(ty, ty), "contains({ty}, {ty}) should hold");
    }
}

#[test]
fn contains_is_transitive_on_builtin_chain() {
    let a = Type::int();
    let b = union([Type::int(), Type::num()]);
    let c = union([Type::int(), Type::num(), Type::str()]);
    assert!(contains(&a, &b));
    assert!(contains(&b, &c));
    assert!(contains(&a, &c));
}

#[test]
fn nil_makes_an_optional_supertype() {
    let optional = union([Type::int(), Type::nil()]);
    assert!(contains(&Type::int(), &optional));
    assert!(contains(&Type::nil(), &optional));
    assert!(!contains(&optional, &Type::int()));
}

#[test]
fn intersection_narrows() {
    let a = union([Type::int(), Type::num()]);
    let b = union([Type::num(), Type::str()]);
    assert_eq!(intersection([a, b]), Type::num());
}

#[test]
fn any_absorbs() {
    assert_eq!(union([Type::any(), Type::int()]), Type::any());
    assert!(contains(&Type::int(), &Type::any()));
    assert_eq!(intersection([Type::any(), Type::int()]), Type::int());
}

#[test]
fn void_is_invalid_for_values_but_fine_as_return() {
    assert!(!Type::void().is_valid());
    assert!(Type::function(vec![], Type::void()).is_valid());
    assert!(!Type::function(vec![Type::void()], Type::int()).is_valid());
}

#[test]
fn struct_identity_is_by_declaration() {
    let a = Type::structure(DeclId(0), "Point");
    let b = Type::structure(DeclId(1), "Point");
    assert_ne!(a, b);
    assert_eq!(a, Type::structure(DeclId(0), "Point"));
}

#[test]
fn typed_operator_table_signatures() {
    let add = &TYPED_OPERATORS[&BinaryOp::Add];
    assert_eq!(add.overload_for(&Type::int()).unwrap().opcodes, [Opcode::IntAdd]);
    assert_eq!(add.overload_for(&Type::str()).unwrap().opcodes, [Opcode::StrCat]);
    assert!(add.overload_for(&Type::bool()).is_none());
    assert!(contains(&Type::str(), &add.domain));

    let le = &TYPED_OPERATORS[&BinaryOp::LessEqual];
    assert_eq!(
        le.overload_for(&Type::int()).unwrap().opcodes,
        [Opcode::IntGreater, Opcode::Not]
    );
    assert_eq!(le.overload_for(&Type::num()).unwrap().result, Type::bool());
}

#[test]
fn untyped_operator_table() {
    assert_eq!(UNTYPED_OPERATORS[&BinaryOp::Equal].opcodes, [Opcode::Equal]);
    assert_eq!(
        UNTYPED_OPERATORS[&BinaryOp::NotEqual].opcodes,
        [Opcode::Equal, Opcode::Not]
    );
}

#[test]
fn unary_operator_table() {
    let neg = &UNARY_OPERATORS[&UnaryOp::Neg];
    assert_eq!(neg.overload_for(&Type::num()).unwrap().opcodes, [Opcode::NumNeg]);
    let not = &UNARY_OPERATORS[&UnaryOp::Not];
    assert_eq!(not.overload_for(&Type::bool()).unwrap().opcodes, [Opcode::Not]);
}

#[test]
fn builtin_table_types() {
    let int = &BUILTINS["int"];
    assert_eq!(int.opcode, Opcode::Int);
    let (params, ret) = int.ty.as_function().unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(*ret, Type::int());
    assert!(contains(&Type::bool(), &params[0]));
    assert!(contains(&Type::nil(), &params[0]));

    let clock = &BUILTINS["clock"];
    let (params, ret) = clock.ty.as_function().unwrap();
    assert!(params.is_empty());
    assert_eq!(*ret, Type::num());
}

#[test]
fn printable_excludes_void_only() {
    let printable = printable();
    for builtin in [Builtin::Nil, Builtin::Int, Builtin::Bool, Builtin::Num, Builtin::Str] {
        assert!(contains(&Type::builtin(builtin), &printable));
    }
    assert!(!contains(&Type::void(), &printable));
}
