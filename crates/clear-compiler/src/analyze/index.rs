//! Slot assignment and upvalue capture.
//!
//! Three traversals:
//! 1. upvalue tracking - a function referencing a binding from an
//!    enclosing function (not a global) captures it, and so does every
//!    function in between;
//! 2. index building - assigns `(kind, slot)` to every binding, keeping
//!    a simulated stack depth per frame so temporaries get distinct
//!    slots. Slot 0 of a function frame is the closure itself, so
//!    counting starts at 1;
//! 3. index writing - rewrites identifier references through the
//!    enclosing function's upvalue list (slot 0 is the self-reference)
//!    and resolves each function's capture chain against its enclosing
//!    frame.

use std::collections::HashSet;

use crate::ast::{
    Ast, BindingId, BlockId, DeclId, DeclKind, ExprId, ExprKind, FuncBody, FuncId, Index,
    IndexKind, NameDef, Stmt,
};

pub fn run(ast: &mut Ast) {
    UpvalueTracker {
        globals: ast
            .names
            .values()
            .filter_map(|def| match def {
                NameDef::Value(binding) => Some(*binding),
                NameDef::Struct(_) => None,
            })
            .collect(),
        ast: &mut *ast,
        contexts: Vec::new(),
    }
    .run();
    IndexBuilder {
        ast: &mut *ast,
        name_counts: Vec::new(),
        frames: Vec::new(),
    }
    .run();
    IndexWriter {
        ast,
        funcs: Vec::new(),
    }
    .run();
}

#[derive(Clone, Copy)]
enum Ctx {
    Func(FuncId),
    Block(BlockId),
    /// A case arm rebinding; the binding is frame-local to the enclosing
    /// function.
    CaseArm(BindingId),
}

// ---------------------------------------------------------------------
// Upvalue tracking

struct UpvalueTracker<'a> {
    ast: &'a mut Ast,
    globals: HashSet<BindingId>,
    contexts: Vec<Ctx>,
}

impl UpvalueTracker<'_> {
    fn run(mut self) {
        for decl in self.ast.items.clone() {
            self.visit_decl(decl);
        }
    }

    fn defines(&self, ctx: Ctx, target: BindingId) -> bool {
        let contains = |names: &indexmap::IndexMap<String, NameDef>| {
            names
                .values()
                .any(|def| matches!(def, NameDef::Value(b) if *b == target))
        };
        match ctx {
            Ctx::Func(func) => contains(&self.ast.func(func).names),
            Ctx::Block(block) => contains(&self.ast.block(block).names),
            Ctx::CaseArm(binding) => binding == target,
        }
    }

    /// Captures `target` into every function between the reference and
    /// its defining scope.
    fn capture(&mut self, target: BindingId) {
        if self.globals.contains(&target) {
            return;
        }
        let mut capturing = Vec::new();
        for &ctx in self.contexts.iter().rev() {
            if self.defines(ctx, target) {
                break;
            }
            if let Ctx::Func(func) = ctx {
                capturing.push(func);
            }
        }
        for func in capturing {
            let upvalues = &mut self.ast.func_mut(func).upvalues;
            if !upvalues.contains(&target) {
                upvalues.push(target);
            }
        }
    }

    fn visit_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let init = data.init;
                self.visit_expr(init);
            }
            DeclKind::Func(func) => {
                let func = *func;
                self.visit_function(func);
            }
            DeclKind::Struct(data) => {
                for func in data.generators.clone() {
                    self.visit_function(func);
                }
            }
            DeclKind::Stmt(_) => self.visit_stmt(id),
        }
    }

    fn visit_function(&mut self, func: FuncId) {
        self.contexts.push(Ctx::Func(func));
        match self.ast.func(func).body {
            FuncBody::Block(block) => {
                for decl in self.ast.block(block).decls.clone() {
                    self.visit_decl(decl);
                }
            }
            FuncBody::Expr(expr) => self.visit_expr(expr),
        }
        self.contexts.pop();
    }

    fn visit_block(&mut self, block: BlockId) {
        self.contexts.push(Ctx::Block(block));
        for decl in self.ast.block(block).decls.clone() {
            self.visit_decl(decl);
        }
        self.contexts.pop();
    }

    fn visit_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        match stmt {
            Stmt::Print(expr) | Stmt::Return(expr) => {
                if let Some(expr) = *expr {
                    self.visit_expr(expr);
                }
            }
            Stmt::Block(block) => self.visit_block(*block),
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.visit_expr(cond);
                    self.visit_block(block);
                }
                if let Some(block) = else_block {
                    self.visit_block(block);
                }
            }
            Stmt::While { cond, block } => {
                let cond = *cond;
                let block = *block;
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                }
                self.visit_block(block);
            }
            Stmt::Expr(expr) => self.visit_expr(*expr),
            Stmt::Set { target, value } => {
                let (target, value) = (*target, *value);
                self.visit_expr(target);
                self.visit_expr(value);
            }
        }
    }

    fn visit_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Ident { ref_, .. } => {
                if let Some(binding) = *ref_ {
                    self.capture(binding);
                }
            }
            ExprKind::Unary { operand, .. } => self.visit_expr(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
            ExprKind::Call { callee, args } => {
                let callee = *callee;
                let args = args.clone();
                self.visit_expr(callee);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::Tuple(elements) => {
                for element in elements.clone() {
                    self.visit_expr(element);
                }
            }
            ExprKind::Lambda(func) => self.visit_function(*func),
            ExprKind::Case {
                target,
                binding,
                arms,
                fallback,
            } => {
                let target = *target;
                let binding = *binding;
                let fallback = *fallback;
                let arms = arms.clone();
                self.visit_expr(target);
                for (_, value) in arms {
                    self.contexts.push(Ctx::CaseArm(binding));
                    self.visit_expr(value);
                    self.contexts.pop();
                }
                self.visit_expr(fallback);
            }
            ExprKind::Construct { inits, .. } => {
                let values: Vec<ExprId> = inits.iter().map(|init| init.value).collect();
                for value in values {
                    self.visit_expr(value);
                }
            }
            ExprKind::Access { target, .. } => self.visit_expr(*target),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------
// Index building

struct IndexBuilder<'a> {
    ast: &'a mut Ast,
    /// Names assigned so far, one entry per index scope.
    name_counts: Vec<i32>,
    /// Simulated stack depth, one entry per index scope.
    frames: Vec<i32>,
}

impl IndexBuilder<'_> {
    fn run(mut self) {
        self.name_counts.push(0);
        self.frames.push(0);
        for decl in self.ast.sequence.clone() {
            self.visit_decl(decl);
        }
    }

    fn make_index(&mut self) -> Index {
        let count = self.name_counts.last_mut().expect("scope entered");
        let value = *count;
        *count += 1;
        if self.name_counts.len() == 1 {
            Index::new(IndexKind::Global, value)
        } else {
            *self.frames.last_mut().expect("scope entered") += 1;
            Index::new(IndexKind::Local, value)
        }
    }

    fn temp_index(&self) -> Index {
        Index::new(
            IndexKind::Local,
            self.frames.last().expect("scope entered") - 1,
        )
    }

    fn bump(&mut self) {
        *self.frames.last_mut().expect("scope entered") += 1;
    }

    /// Runs `f`, then restores the frame depth to its previous value plus
    /// `offset` - the net stack effect of the construct.
    fn with_stack(&mut self, offset: i32, f: impl FnOnce(&mut Self)) {
        let prev = *self.frames.last().expect("scope entered");
        f(self);
        *self.frames.last_mut().expect("scope entered") = prev + offset;
    }

    fn enter_function(&mut self) {
        // Slot 0 holds the closure struct itself.
        self.name_counts.push(1);
        self.frames.push(1);
    }

    fn exit_function(&mut self) {
        self.name_counts.pop();
        self.frames.pop();
    }

    fn enter_block(&mut self) {
        // Names from enclosing function scopes stay underneath; a block
        // at global scope starts fresh.
        let (names, frame) = if self.name_counts.len() > 1 {
            (
                *self.name_counts.last().expect("scope entered"),
                *self.frames.last().expect("scope entered"),
            )
        } else {
            (0, 0)
        };
        self.name_counts.push(names);
        self.frames.push(frame);
    }

    fn exit_block(&mut self) {
        self.name_counts.pop();
        self.frames.pop();
    }

    fn visit_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let bindings = data.bindings.clone();
                let init = data.init;
                self.visit_expr(init);
                // The initializer's value becomes the bindings' slots.
                *self.frames.last_mut().expect("scope entered") -= 1;
                for binding in bindings {
                    let index = self.make_index();
                    self.ast.binding_mut(binding).index = index;
                }
            }
            DeclKind::Func(func) => {
                let func = *func;
                if let Some(binding) = self.ast.func(func).binding {
                    let index = self.make_index();
                    self.ast.binding_mut(binding).index = index;
                }
                self.index_function(func);
            }
            DeclKind::Struct(data) => {
                // Fields are layout, not slots; only the generators get
                // declared like functions in the enclosing scope.
                for func in data.generators.clone() {
                    if let Some(binding) = self.ast.func(func).binding {
                        let index = self.make_index();
                        self.ast.binding_mut(binding).index = index;
                    }
                    self.index_function(func);
                }
            }
            DeclKind::Stmt(_) => self.visit_stmt(id),
        }
    }

    fn index_function(&mut self, func: FuncId) {
        self.enter_function();
        let info = self.ast.func(func);
        let this_binding = info.this_binding;
        let params: Vec<BindingId> = info.params.iter().map(|p| p.binding).collect();
        let body = info.body;
        for binding in this_binding.into_iter().chain(params) {
            let mut index = self.make_index();
            index.kind = IndexKind::Param;
            self.ast.binding_mut(binding).index = index;
        }
        match body {
            FuncBody::Block(block) => {
                for decl in self.ast.block(block).decls.clone() {
                    self.visit_decl(decl);
                }
            }
            FuncBody::Expr(expr) => self.visit_expr(expr),
        }
        self.exit_function();
    }

    fn visit_block(&mut self, block: BlockId) {
        self.enter_block();
        for decl in self.ast.block(block).decls.clone() {
            self.visit_decl(decl);
        }
        self.exit_block();
    }

    fn visit_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        match stmt {
            Stmt::Print(expr) | Stmt::Return(expr) => {
                if let Some(expr) = *expr {
                    self.with_stack(0, |s| s.visit_expr(expr));
                }
            }
            Stmt::Block(block) => self.visit_block(*block),
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.with_stack(0, |s| s.visit_expr(cond));
                    self.visit_block(block);
                }
                if let Some(block) = else_block {
                    self.visit_block(block);
                }
            }
            Stmt::While { cond, block } => {
                let cond = *cond;
                let block = *block;
                if let Some(cond) = cond {
                    self.with_stack(0, |s| s.visit_expr(cond));
                }
                self.visit_block(block);
            }
            Stmt::Expr(expr) => {
                let expr = *expr;
                self.with_stack(0, |s| s.visit_expr(expr));
            }
            Stmt::Set { target, value } => {
                let (target, value) = (*target, *value);
                self.with_stack(0, |s| {
                    s.visit_expr(target);
                    s.visit_expr(value);
                });
            }
        }
    }

    fn visit_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Int(_)
            | ExprKind::Num(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Nil
            | ExprKind::Ident { .. } => self.bump(),
            ExprKind::Unary { operand, .. } => self.visit_expr(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.with_stack(1, |s| {
                    s.visit_expr(lhs);
                    s.visit_expr(rhs);
                });
            }
            ExprKind::Call { callee, args } => {
                let callee = *callee;
                let args = args.clone();
                // Direct builtin calls never push a closure, so the
                // callee contributes no stack slot.
                let direct_builtin = matches!(
                    &self.ast.expr(callee).kind,
                    ExprKind::Ident { name, ref_: None, .. }
                        if crate::types::BUILTINS.contains_key(name.as_str())
                );
                self.with_stack(1, |s| {
                    if !direct_builtin {
                        s.visit_expr(callee);
                    }
                    for arg in args {
                        s.visit_expr(arg);
                    }
                });
            }
            ExprKind::Tuple(elements) => {
                let elements = elements.clone();
                self.with_stack(1, |s| {
                    for element in elements {
                        s.visit_expr(element);
                    }
                });
            }
            ExprKind::Lambda(func) => {
                let func = *func;
                self.with_stack(1, |s| s.index_function(func));
            }
            ExprKind::Case {
                target,
                binding,
                arms,
                fallback,
            } => {
                let target = *target;
                let binding = *binding;
                let fallback = *fallback;
                let arms = arms.clone();
                self.with_stack(1, |s| {
                    s.visit_expr(target);
                    let index = s.temp_index();
                    s.ast.binding_mut(binding).index = index;
                    for (_, value) in arms {
                        s.visit_expr(value);
                    }
                    s.visit_expr(fallback);
                });
            }
            ExprKind::Construct { inits, .. } => {
                let values: Vec<ExprId> = inits.iter().map(|init| init.value).collect();
                self.with_stack(1, |s| {
                    for value in values {
                        s.visit_expr(value);
                    }
                });
                let index = self.temp_index();
                if let ExprKind::Construct { index: slot, .. } = &mut self.ast.expr_mut(id).kind {
                    *slot = index;
                }
            }
            ExprKind::Access { target, .. } => self.visit_expr(*target),
        }
    }
}

// ---------------------------------------------------------------------
// Index writing

struct IndexWriter<'a> {
    ast: &'a mut Ast,
    funcs: Vec<FuncId>,
}

impl IndexWriter<'_> {
    fn run(mut self) {
        for decl in self.ast.sequence.clone() {
            self.visit_decl(decl);
        }
    }

    /// How `target` is reached from inside the current function: the
    /// self-reference is `UPVALUE:0`, captured bindings are
    /// `UPVALUE:1+pos`, everything else keeps its own index.
    fn load_index(&self, target: BindingId) -> Index {
        let Some(&func) = self.funcs.last() else {
            return self.ast.binding(target).index;
        };
        let info = self.ast.func(func);
        if info.binding == Some(target) {
            return Index::new(IndexKind::Upvalue, 0);
        }
        if let Some(pos) = info.upvalues.iter().position(|&b| b == target) {
            return Index::new(IndexKind::Upvalue, 1 + pos as i32);
        }
        self.ast.binding(target).index
    }

    fn visit_function(&mut self, func: FuncId) {
        self.funcs.push(func);
        match self.ast.func(func).body {
            FuncBody::Block(block) => {
                for decl in self.ast.block(block).decls.clone() {
                    self.visit_decl(decl);
                }
            }
            FuncBody::Expr(expr) => self.visit_expr(expr),
        }
        self.funcs.pop();
        // Each capture is resolved from the enclosing frame, where the
        // closure is built.
        let upvalues = self.ast.func(func).upvalues.clone();
        let indices = upvalues.iter().map(|&b| self.load_index(b)).collect();
        self.ast.func_mut(func).upvalue_indices = indices;
    }

    fn visit_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let init = data.init;
                self.visit_expr(init);
            }
            DeclKind::Func(func) => self.visit_function(*func),
            DeclKind::Struct(data) => {
                for func in data.generators.clone() {
                    self.visit_function(func);
                }
            }
            DeclKind::Stmt(_) => self.visit_stmt(id),
        }
    }

    fn visit_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        match stmt {
            Stmt::Print(expr) | Stmt::Return(expr) => {
                if let Some(expr) = *expr {
                    self.visit_expr(expr);
                }
            }
            Stmt::Block(block) => {
                for decl in self.ast.block(*block).decls.clone() {
                    self.visit_decl(decl);
                }
            }
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.visit_expr(cond);
                    for decl in self.ast.block(block).decls.clone() {
                        self.visit_decl(decl);
                    }
                }
                if let Some(block) = else_block {
                    for decl in self.ast.block(block).decls.clone() {
                        self.visit_decl(decl);
                    }
                }
            }
            Stmt::While { cond, block } => {
                let cond = *cond;
                let block = *block;
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                }
                for decl in self.ast.block(block).decls.clone() {
                    self.visit_decl(decl);
                }
            }
            Stmt::Expr(expr) => self.visit_expr(*expr),
            Stmt::Set { target, value } => {
                let (target, value) = (*target, *value);
                self.visit_expr(target);
                self.visit_expr(value);
            }
        }
    }

    fn visit_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Ident { ref_, .. } => {
                let Some(binding) = *ref_ else { return };
                let index = self.load_index(binding);
                if let ExprKind::Ident { index: slot, .. } = &mut self.ast.expr_mut(id).kind {
                    *slot = index;
                }
            }
            ExprKind::Unary { operand, .. } => self.visit_expr(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
            ExprKind::Call { callee, args } => {
                let callee = *callee;
                let args = args.clone();
                self.visit_expr(callee);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::Tuple(elements) => {
                for element in elements.clone() {
                    self.visit_expr(element);
                }
            }
            ExprKind::Lambda(func) => self.visit_function(*func),
            ExprKind::Case {
                target,
                arms,
                fallback,
                ..
            } => {
                let target = *target;
                let fallback = *fallback;
                let arms = arms.clone();
                self.visit_expr(target);
                for (_, value) in arms {
                    self.visit_expr(value);
                }
                self.visit_expr(fallback);
            }
            ExprKind::Construct { inits, .. } => {
                let values: Vec<ExprId> = inits.iter().map(|init| init.value).collect();
                for value in values {
                    self.visit_expr(value);
                }
            }
            ExprKind::Access { target, .. } => self.visit_expr(*target),
            _ => {}
        }
    }
}
