//! The Clear type system.
//!
//! A [`Type`] is a set of unit types plus a boolean "any" used for
//! operators that accept every operand. A multi-member set is a union;
//! `NIL` together with another unit is the optional form. Types are kept
//! contracted at all times: construction normalizes the unit set, so
//! structural equality on the set decides type equality, and subtyping is
//! `union(inner, outer) == outer`.
//!
//! The builtin function table and the operator opcode tables live here as
//! data, keyed by name and operator.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use indexmap::IndexMap;

use clear_bytecode::Opcode;

use crate::ast::{BinaryOp, DeclId, UnaryOp};

/// The builtin unit types.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Builtin {
    Nil,
    Void,
    Int,
    Bool,
    Num,
    Str,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Void => "void",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Num => "num",
            Self::Str => "str",
        }
    }

    /// Atom with this name, if any. `void` and `nil` are keywords and
    /// never reach this path; they are listed for completeness.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nil" => Some(Self::Nil),
            "void" => Some(Self::Void),
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "num" => Some(Self::Num),
            "str" => Some(Self::Str),
            _ => None,
        }
    }

    fn valid(self) -> bool {
        self != Self::Void
    }
}

/// One member of a union.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum UnitType {
    Builtin(Builtin),
    /// A struct type, identified by its declaration. The name is carried
    /// for display only; one declaration has one name.
    Struct { decl: DeclId, name: String },
    Function { params: Vec<Type>, ret: Type },
    Tuple(Vec<Type>),
    Unresolved,
}

impl UnitType {
    fn valid(&self) -> bool {
        match self {
            Self::Builtin(builtin) => builtin.valid(),
            Self::Struct { .. } => true,
            Self::Function { params, ret } => {
                params.iter().all(Type::is_valid)
                    && (ret.is_valid() || *ret == Type::builtin(Builtin::Void))
            }
            Self::Tuple(elements) => elements.iter().all(Type::is_valid),
            Self::Unresolved => false,
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(builtin) => f.write_str(builtin.name()),
            Self::Struct { name, .. } => f.write_str(name),
            Self::Function { params, ret } => {
                write!(f, "func(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") {ret}")
            }
            Self::Tuple(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
            Self::Unresolved => f.write_str("<unresolved>"),
        }
    }
}

/// The type of a value: a contracted set of unit types.
#[derive(Clone, PartialOrd, Ord, Debug, Default)]
pub struct Type {
    units: BTreeSet<UnitType>,
    any: bool,
}

impl Type {
    /// Builds a type from raw units and contracts it.
    pub fn new(units: BTreeSet<UnitType>) -> Self {
        let mut ty = Self { units, any: false };
        ty.contract();
        ty
    }

    pub fn unit(unit: UnitType) -> Self {
        Self::new(BTreeSet::from([unit]))
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Self::unit(UnitType::Builtin(builtin))
    }

    pub fn nil() -> Self {
        Self::builtin(Builtin::Nil)
    }

    pub fn void() -> Self {
        Self::builtin(Builtin::Void)
    }

    pub fn int() -> Self {
        Self::builtin(Builtin::Int)
    }

    pub fn bool() -> Self {
        Self::builtin(Builtin::Bool)
    }

    pub fn num() -> Self {
        Self::builtin(Builtin::Num)
    }

    pub fn str() -> Self {
        Self::builtin(Builtin::Str)
    }

    pub fn unresolved() -> Self {
        Self::unit(UnitType::Unresolved)
    }

    /// The "anything" type: equal to and containing every type.
    pub fn any() -> Self {
        Self {
            units: BTreeSet::new(),
            any: true,
        }
    }

    pub fn structure(decl: DeclId, name: impl Into<String>) -> Self {
        Self::unit(UnitType::Struct {
            decl,
            name: name.into(),
        })
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::unit(UnitType::Function { params, ret })
    }

    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::unit(UnitType::Tuple(elements))
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitType> {
        self.units.iter()
    }

    pub fn is_any(&self) -> bool {
        self.any
    }

    pub fn is_unresolved(&self) -> bool {
        self.units.contains(&UnitType::Unresolved)
    }

    fn single(&self) -> Option<&UnitType> {
        if self.units.len() == 1 {
            self.units.iter().next()
        } else {
            None
        }
    }

    /// The unit function type, if this is one.
    pub fn as_function(&self) -> Option<(&[Type], &Type)> {
        match self.single() {
            Some(UnitType::Function { params, ret }) => Some((params, ret)),
            _ => None,
        }
    }

    /// The unit struct type, if this is one.
    pub fn as_struct(&self) -> Option<DeclId> {
        match self.single() {
            Some(UnitType::Struct { decl, .. }) => Some(*decl),
            _ => None,
        }
    }

    /// The unit tuple type, if this is one.
    pub fn as_tuple(&self) -> Option<&[Type]> {
        match self.single() {
            Some(UnitType::Tuple(elements)) => Some(elements),
            _ => None,
        }
    }

    /// A type is valid for a value iff it has at least one unit and
    /// contains neither `unresolved` nor `void` (void is only legal as a
    /// function return type).
    pub fn is_valid(&self) -> bool {
        if self.any {
            return true;
        }
        !self.units.is_empty() && self.units.iter().all(UnitType::valid)
    }

    /// Normalizes the unit set:
    /// - `unresolved` contaminates the whole union;
    /// - functions of equal arity merge (parameter intersection, return
    ///   union);
    /// - tuples of equal length merge (element-wise union).
    fn contract(&mut self) {
        if self.units.contains(&UnitType::Unresolved) {
            self.units = BTreeSet::from([UnitType::Unresolved]);
            return;
        }
        if self.units.len() <= 1 {
            return;
        }

        let mut rest: BTreeSet<UnitType> = BTreeSet::new();
        let mut functions: BTreeMap<usize, Vec<(Vec<Type>, Type)>> = BTreeMap::new();
        let mut tuples: BTreeMap<usize, Vec<Vec<Type>>> = BTreeMap::new();

        for unit in std::mem::take(&mut self.units) {
            match unit {
                UnitType::Function { params, ret } => {
                    functions.entry(params.len()).or_default().push((params, ret));
                }
                UnitType::Tuple(elements) => {
                    tuples.entry(elements.len()).or_default().push(elements);
                }
                other => {
                    rest.insert(other);
                }
            }
        }

        for (arity, group) in functions {
            let ret = union(group.iter().map(|(_, ret)| ret.clone()));
            let params = (0..arity)
                .map(|i| intersection(group.iter().map(|(params, _)| params[i].clone())))
                .collect();
            rest.insert(UnitType::Function { params, ret });
        }

        for (len, group) in tuples {
            let elements = (0..len)
                .map(|i| union(group.iter().map(|elements| elements[i].clone())))
                .collect();
            rest.insert(UnitType::Tuple(elements));
        }

        self.units = rest;
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.any || other.any || self.units == other.units
    }
}

impl Eq for Type {}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.any {
            return f.write_str("anything");
        }
        if self.units.is_empty() {
            return f.write_str("<empty>");
        }
        let nil = UnitType::Builtin(Builtin::Nil);
        if self.units.contains(&nil) && self.units.len() > 1 {
            let target = self
                .units
                .iter()
                .filter(|unit| **unit != nil)
                .map(|unit| unit.to_string())
                .collect::<Vec<_>>()
                .join(" | ");
            return write!(f, "({target})?");
        }
        let joined = self
            .units
            .iter()
            .map(|unit| format!("({unit})"))
            .collect::<Vec<_>>()
            .join(" | ");
        f.write_str(&joined)
    }
}

/// Union of an iterator of types.
pub fn union(types: impl IntoIterator<Item = Type>) -> Type {
    let types: Vec<Type> = types.into_iter().collect();
    if types.iter().any(Type::is_any) {
        return Type::any();
    }
    let mut units = BTreeSet::new();
    for ty in types {
        units.extend(ty.units);
    }
    Type::new(units)
}

/// Intersection of an iterator of types.
pub fn intersection(types: impl IntoIterator<Item = Type>) -> Type {
    let types: Vec<Type> = types.into_iter().filter(|ty| !ty.is_any()).collect();
    if types.is_empty() {
        return Type::any();
    }
    let mut iter = types.into_iter();
    let mut units = iter.next().map(|ty| ty.units).unwrap_or_default();
    for ty in iter {
        units = units.intersection(&ty.units).cloned().collect();
    }
    Type::new(units)
}

/// Whether `inner` is a subtype of `outer`, decided on contracted forms.
pub fn contains(inner: &Type, outer: &Type) -> bool {
    union([inner.clone(), outer.clone()]) == *outer
}

/// A builtin function: one opcode, one function type.
#[derive(Clone, Debug)]
pub struct BuiltinFn {
    pub opcode: Opcode,
    pub ty: Type,
}

/// The builtin functions, by source name.
pub static BUILTINS: LazyLock<IndexMap<&'static str, BuiltinFn>> = LazyLock::new(|| {
    let scalar = union([Type::bool(), Type::int(), Type::nil(), Type::num()]);
    IndexMap::from([
        (
            "int",
            BuiltinFn {
                opcode: Opcode::Int,
                ty: Type::function(vec![scalar.clone()], Type::int()),
            },
        ),
        (
            "bool",
            BuiltinFn {
                opcode: Opcode::Bool,
                ty: Type::function(vec![scalar.clone()], Type::bool()),
            },
        ),
        (
            "num",
            BuiltinFn {
                opcode: Opcode::Num,
                ty: Type::function(vec![scalar.clone()], Type::num()),
            },
        ),
        (
            "str",
            BuiltinFn {
                opcode: Opcode::Str,
                ty: Type::function(vec![scalar], Type::str()),
            },
        ),
        (
            "clock",
            BuiltinFn {
                opcode: Opcode::Clock,
                ty: Type::function(vec![], Type::num()),
            },
        ),
    ])
});

/// One overload of a strictly typed operator.
#[derive(Clone, Debug)]
pub struct Overload {
    pub operands: Type,
    pub result: Type,
    pub opcodes: Vec<Opcode>,
}

/// A strictly typed binary operator: operands must be equal and must match
/// one overload exactly; each overload carries its opcode sequence.
#[derive(Clone, Debug)]
pub struct TypedOperator {
    /// Union of all accepted operand types, used for the domain check in
    /// diagnostics.
    pub domain: Type,
    pub overloads: Vec<Overload>,
}

impl TypedOperator {
    fn new(overloads: Vec<Overload>) -> Self {
        let domain = union(overloads.iter().map(|o| o.operands.clone()));
        Self { domain, overloads }
    }

    pub fn overload_for(&self, operand: &Type) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.operands == *operand)
    }
}

/// An operator accepting any valid operands, with a fixed opcode sequence.
#[derive(Clone, Debug)]
pub struct UntypedOperator {
    pub result: Type,
    pub opcodes: Vec<Opcode>,
}

fn overload(operands: Type, result: Type, opcodes: &[Opcode]) -> Overload {
    Overload {
        operands,
        result,
        opcodes: opcodes.to_vec(),
    }
}

/// Typed binary operators with their per-signature opcode sequences.
pub static TYPED_OPERATORS: LazyLock<IndexMap<BinaryOp, TypedOperator>> = LazyLock::new(|| {
    IndexMap::from([
        (
            BinaryOp::Add,
            TypedOperator::new(vec![
                overload(Type::int(), Type::int(), &[Opcode::IntAdd]),
                overload(Type::num(), Type::num(), &[Opcode::NumAdd]),
                overload(Type::str(), Type::str(), &[Opcode::StrCat]),
            ]),
        ),
        (
            BinaryOp::Sub,
            TypedOperator::new(vec![
                overload(Type::int(), Type::int(), &[Opcode::IntSub]),
                overload(Type::num(), Type::num(), &[Opcode::NumSub]),
            ]),
        ),
        (
            BinaryOp::Mul,
            TypedOperator::new(vec![
                overload(Type::int(), Type::int(), &[Opcode::IntMul]),
                overload(Type::num(), Type::num(), &[Opcode::NumMul]),
            ]),
        ),
        (
            BinaryOp::Div,
            TypedOperator::new(vec![
                overload(Type::int(), Type::int(), &[Opcode::IntDiv]),
                overload(Type::num(), Type::num(), &[Opcode::NumDiv]),
            ]),
        ),
        (
            BinaryOp::Less,
            TypedOperator::new(vec![
                overload(Type::int(), Type::bool(), &[Opcode::IntLess]),
                overload(Type::num(), Type::bool(), &[Opcode::NumLess]),
            ]),
        ),
        (
            BinaryOp::Greater,
            TypedOperator::new(vec![
                overload(Type::int(), Type::bool(), &[Opcode::IntGreater]),
                overload(Type::num(), Type::bool(), &[Opcode::NumGreater]),
            ]),
        ),
        (
            BinaryOp::LessEqual,
            TypedOperator::new(vec![
                overload(Type::int(), Type::bool(), &[Opcode::IntGreater, Opcode::Not]),
                overload(Type::num(), Type::bool(), &[Opcode::NumGreater, Opcode::Not]),
            ]),
        ),
        (
            BinaryOp::GreaterEqual,
            TypedOperator::new(vec![
                overload(Type::int(), Type::bool(), &[Opcode::IntLess, Opcode::Not]),
                overload(Type::num(), Type::bool(), &[Opcode::NumLess, Opcode::Not]),
            ]),
        ),
    ])
});

/// Equality operators: any valid operands, fixed opcodes.
pub static UNTYPED_OPERATORS: LazyLock<IndexMap<BinaryOp, UntypedOperator>> =
    LazyLock::new(|| {
        IndexMap::from([
            (
                BinaryOp::Equal,
                UntypedOperator {
                    result: Type::bool(),
                    opcodes: vec![Opcode::Equal],
                },
            ),
            (
                BinaryOp::NotEqual,
                UntypedOperator {
                    result: Type::bool(),
                    opcodes: vec![Opcode::Equal, Opcode::Not],
                },
            ),
        ])
    });

/// Unary operators with their per-signature opcode sequences.
pub static UNARY_OPERATORS: LazyLock<IndexMap<UnaryOp, TypedOperator>> = LazyLock::new(|| {
    IndexMap::from([
        (
            UnaryOp::Neg,
            TypedOperator::new(vec![
                overload(Type::int(), Type::int(), &[Opcode::IntNeg]),
                overload(Type::num(), Type::num(), &[Opcode::NumNeg]),
            ]),
        ),
        (
            UnaryOp::Not,
            TypedOperator::new(vec![overload(Type::bool(), Type::bool(), &[Opcode::Not])]),
        ),
    ])
});

/// Union of every printable type: all builtins except `void`.
pub fn printable() -> Type {
    union([
        Type::nil(),
        Type::int(),
        Type::bool(),
        Type::num(),
        Type::str(),
    ])
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
