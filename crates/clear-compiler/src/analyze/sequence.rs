//! Dependency-aware ordering of top-level declarations.
//!
//! Top-level declarations are put into use-before-definition order by a
//! depth-first search over referenced bindings. A reference from inside a
//! function body does not force ordering - function bodies only run when
//! called, so functions can recurse and forward-refer freely. A cycle
//! among initializers is a "circular dependency" diagnostic.

use crate::ast::{Ast, DeclId, DeclKind, ExprId, ExprKind, Stmt};
use crate::diagnostics::Diagnostics;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Unvisited,
    Started,
    Completed,
}

pub fn run(ast: &mut Ast, diagnostics: &mut Diagnostics) {
    let mut builder = SequenceBuilder {
        states: vec![State::Unvisited; ast.decls.len()],
        top_level: {
            let mut top_level = vec![false; ast.decls.len()];
            for &item in &ast.items {
                top_level[item.index()] = true;
            }
            top_level
        },
        ast,
        diagnostics,
        sequence: Vec::new(),
    };
    for item in builder.ast.items.clone() {
        builder.visit(item);
    }
    builder.ast.sequence = std::mem::take(&mut builder.sequence);
}

struct SequenceBuilder<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
    states: Vec<State>,
    top_level: Vec<bool>,
    sequence: Vec<DeclId>,
}

impl SequenceBuilder<'_> {
    fn visit(&mut self, id: DeclId) {
        match self.states[id.index()] {
            State::Completed => return,
            State::Started => {
                let span = self.ast.decl(id).span;
                self.diagnostics
                    .error("circular dependency for value", span)
                    .emit();
                return;
            }
            State::Unvisited => {}
        }
        self.states[id.index()] = State::Started;

        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let init = data.init;
                self.visit_expr(init);
            }
            // Function and generator bodies never force ordering.
            DeclKind::Func(_) | DeclKind::Struct(_) => {}
            DeclKind::Stmt(_) => self.visit_stmt(id),
        }

        self.states[id.index()] = State::Completed;
        self.sequence.push(id);
    }

    /// Follows a reference out of the current declaration. Only
    /// references to other top-level declarations reorder anything.
    fn follow(&mut self, target: DeclId) {
        if self.top_level[target.index()] {
            self.visit(target);
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
                    self.visit_nested(decl);
                }
            }
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.visit_expr(cond);
                    for decl in self.ast.block(block).decls.clone() {
                        self.visit_nested(decl);
                    }
                }
                if let Some(block) = else_block {
                    for decl in self.ast.block(block).decls.clone() {
                        self.visit_nested(decl);
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
                    self.visit_nested(decl);
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

    /// Declarations nested in a top-level statement execute with it; their
    /// references pull top-level values forward but the nested
    /// declarations themselves are not re-ordered.
    fn visit_nested(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let init = data.init;
                self.visit_expr(init);
            }
            DeclKind::Func(_) | DeclKind::Struct(_) => {}
            DeclKind::Stmt(_) => self.visit_stmt(id),
        }
    }

    fn visit_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Ident { ref_, .. } => {
                let Some(binding) = *ref_ else { return };
                if let Some(dependency) = self.ast.binding(binding).dependency {
                    self.follow(dependency);
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
            // A lambda body is a function body: no ordering.
            ExprKind::Lambda(_) => {}
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
            ExprKind::Construct { ref_, inits, .. } => {
                let ref_ = *ref_;
                let values: Vec<ExprId> = inits.iter().map(|init| init.value).collect();
                if let Some(decl) = ref_ {
                    self.follow(decl);
                }
                for value in values {
                    self.visit_expr(value);
                }
            }
            ExprKind::Access { target, .. } => self.visit_expr(*target),
            _ => {}
        }
    }
}
