//! The Clear parse tree.
//!
//! Nodes live in typed arenas on [`Ast`] and reference each other through
//! integer ids, so back-references (identifier -> binding, construct ->
//! struct declaration) never create owning cycles. The tree is created
//! once by the parser and mutated only through its annotation fields:
//! later phases fill in `ty`, `index`, `returns`, `upvalues`, name maps,
//! and the top-level `sequence`.

use indexmap::IndexMap;

use clear_bytecode::Opcode;

use crate::diagnostics::Span;
use crate::types::Type;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(DeclId);
arena_id!(ExprId);
arena_id!(TypeExprId);
arena_id!(BlockId);
arena_id!(BindingId);
arena_id!(FuncId);

/// How a resolved name is addressed at runtime.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum IndexKind {
    Global,
    Local,
    Param,
    Upvalue,
    #[default]
    Unresolved,
}

/// The `(kind, value)` pair describing a binding's runtime slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Index {
    pub kind: IndexKind,
    pub value: i32,
}

impl Index {
    pub fn new(kind: IndexKind, value: i32) -> Self {
        Self { kind, value }
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            IndexKind::Global => "GLOBAL",
            IndexKind::Local => "LOCAL",
            IndexKind::Param => "PARAM",
            IndexKind::Upvalue => "UPVALUE",
            IndexKind::Unresolved => "UNRESOLVED",
        };
        write!(f, "{kind}:{}", self.value)
    }
}

/// Reachability-to-return classification of a statement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ReturnFlow {
    #[default]
    Never,
    Sometimes,
    Always,
}

/// Resolution target a name can map to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NameDef {
    Value(BindingId),
    Struct(DeclId),
}

/// A named slot introduced by a declaration or parameter. Identity is the
/// arena id, stable across the whole tree.
#[derive(Clone, Debug)]
pub struct Binding {
    pub name: String,
    pub span: Span,
    pub mutable: bool,
    /// Filled by the type checker.
    pub ty: Type,
    /// Filled by the index builder.
    pub index: Index,
    /// Declaration this binding belongs to, used for sequencing.
    pub dependency: Option<DeclId>,
}

/// A `(type, binding)` parameter pair.
#[derive(Clone, Copy, Debug)]
pub struct Param {
    pub type_expr: TypeExprId,
    pub binding: BindingId,
}

/// A function-like node: `func` declaration, lambda, or struct generator.
#[derive(Debug)]
pub struct FuncInfo {
    /// The function's own name binding; `None` for lambdas.
    pub binding: Option<BindingId>,
    pub params: Vec<Param>,
    /// Implicit `this` parameter, present on struct generators only.
    pub this_binding: Option<BindingId>,
    pub return_type: TypeExprId,
    pub body: FuncBody,
    pub span: Span,
    /// Function scope name map: parameters, `this`, and body-level locals.
    /// Filled during name tracking.
    pub names: IndexMap<String, NameDef>,
    /// Bindings captured from enclosing functions. Position 0 of the
    /// runtime upvalue list is the self-reference, so slot offsets into
    /// this vector are shifted by one.
    pub upvalues: Vec<BindingId>,
    /// How each captured binding is reached from the enclosing frame.
    /// Filled by the index writer.
    pub upvalue_indices: Vec<Index>,
    /// The function type. Filled by the type checker.
    pub ty: Type,
}

#[derive(Clone, Copy, Debug)]
pub enum FuncBody {
    Block(BlockId),
    Expr(ExprId),
}

/// A brace-delimited sequence of declarations.
#[derive(Debug)]
pub struct Block {
    pub decls: Vec<DeclId>,
    pub span: Span,
    /// Scope name map for explicit blocks. Function bodies use the
    /// enclosing [`FuncInfo::names`] instead and leave this empty.
    pub names: IndexMap<String, NameDef>,
    pub returns: ReturnFlow,
}

#[derive(Debug)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
    pub returns: ReturnFlow,
}

#[derive(Debug)]
pub enum DeclKind {
    Value(ValueDecl),
    Func(FuncId),
    Struct(StructDecl),
    Stmt(Stmt),
}

#[derive(Debug)]
pub struct ValueDecl {
    /// One binding normally; several for `val a, b = expr;` destructuring.
    pub bindings: Vec<BindingId>,
    pub type_expr: Option<TypeExprId>,
    pub init: ExprId,
}

#[derive(Debug)]
pub struct StructDecl {
    pub name: String,
    pub name_span: Span,
    /// Plain fields, in declaration order.
    pub params: Vec<Param>,
    /// Generator functions; each produces one binding (its name) whose
    /// field holds the generator's result at construction.
    pub generators: Vec<FuncId>,
}

#[derive(Debug)]
pub enum Stmt {
    Print(Option<ExprId>),
    Block(BlockId),
    If {
        arms: Vec<(ExprId, BlockId)>,
        else_block: Option<BlockId>,
    },
    While {
        cond: Option<ExprId>,
        block: BlockId,
    },
    Return(Option<ExprId>),
    Expr(ExprId),
    Set {
        target: ExprId,
        value: ExprId,
    },
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Filled by the type checker; starts unresolved.
    pub ty: Type,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Int(i32),
    Num(f64),
    Str(String),
    Bool(bool),
    Nil,
    Ident {
        name: String,
        /// Resolved binding, `None` for builtins and unresolved names.
        ref_: Option<BindingId>,
        /// Filled by the index writer.
        index: Index,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
        /// Opcode sequence chosen by the type checker.
        opcodes: Vec<Opcode>,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        /// Opcode sequence chosen by the type checker; empty for the
        /// short-circuiting `and`/`or`.
        opcodes: Vec<Opcode>,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Tuple(Vec<ExprId>),
    Lambda(FuncId),
    Case {
        target: ExprId,
        /// Rebinds the target's name to the matched value inside each arm.
        binding: BindingId,
        arms: Vec<(TypeExprId, ExprId)>,
        fallback: ExprId,
    },
    Construct {
        name: String,
        name_span: Span,
        /// Resolved struct declaration.
        ref_: Option<DeclId>,
        inits: Vec<FieldInit>,
        /// Stack slot of the partially built struct. Filled by the index
        /// builder.
        index: Index,
    },
    Access {
        target: ExprId,
        field: String,
        field_span: Span,
    },
}

#[derive(Debug)]
pub struct FieldInit {
    pub name: String,
    pub span: Span,
    pub value: ExprId,
}

/// Root of the parse tree, owner of every node arena.
#[derive(Debug, Default)]
pub struct Ast {
    pub decls: Vec<Decl>,
    pub exprs: Vec<Expr>,
    pub type_exprs: Vec<TypeExpr>,
    pub blocks: Vec<Block>,
    pub bindings: Vec<Binding>,
    pub funcs: Vec<FuncInfo>,
    /// Top-level declarations in lexical order.
    pub items: Vec<DeclId>,
    /// Top-level declarations in execution order. Filled by the sequencer;
    /// phases after it traverse this.
    pub sequence: Vec<DeclId>,
    /// Global scope name map.
    pub names: IndexMap<String, NameDef>,
}

#[derive(Debug)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    /// Filled by the type checker.
    pub ty: Type,
}

#[derive(Debug)]
pub enum TypeExprKind {
    /// A builtin atom: `nil`, `void`, `int`, `bool`, `num`, `str`.
    Atom(crate::types::Builtin),
    /// A struct name.
    Named {
        name: String,
        /// Resolved struct declaration.
        ref_: Option<DeclId>,
    },
    Func {
        params: Vec<TypeExprId>,
        ret: TypeExprId,
    },
    Optional(TypeExprId),
    Union(Vec<TypeExprId>),
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExpr {
        &self.type_exprs[id.index()]
    }

    pub fn type_expr_mut(&mut self, id: TypeExprId) -> &mut TypeExpr {
        &mut self.type_exprs[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &FuncInfo {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncInfo {
        &mut self.funcs[id.index()]
    }

    pub fn alloc_decl(&mut self, kind: DeclKind, span: Span) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl {
            kind,
            span,
            returns: ReturnFlow::Never,
        });
        id
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr {
            kind,
            span,
            ty: Type::unresolved(),
        });
        id
    }

    pub fn alloc_type_expr(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        let id = TypeExprId(self.type_exprs.len() as u32);
        self.type_exprs.push(TypeExpr {
            kind,
            span,
            ty: Type::unresolved(),
        });
        id
    }

    pub fn alloc_block(&mut self, decls: Vec<DeclId>, span: Span) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            decls,
            span,
            names: IndexMap::new(),
            returns: ReturnFlow::Never,
        });
        id
    }

    pub fn alloc_binding(&mut self, name: impl Into<String>, span: Span, mutable: bool) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            name: name.into(),
            span,
            mutable,
            ty: Type::unresolved(),
            index: Index::default(),
            dependency: None,
        });
        id
    }

    pub fn alloc_func(
        &mut self,
        binding: Option<BindingId>,
        params: Vec<Param>,
        return_type: TypeExprId,
        body: FuncBody,
        span: Span,
    ) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(FuncInfo {
            binding,
            params,
            this_binding: None,
            return_type,
            body,
            span,
            names: IndexMap::new(),
            upvalues: Vec::new(),
            upvalue_indices: Vec::new(),
            ty: Type::unresolved(),
        });
        id
    }

    /// The struct declaration payload behind `id`. The caller must have
    /// resolved `id` to a struct declaration.
    pub fn struct_decl(&self, id: DeclId) -> &StructDecl {
        match &self.decl(id).kind {
            DeclKind::Struct(data) => data,
            _ => unreachable!("decl {id:?} is not a struct declaration"),
        }
    }
}
