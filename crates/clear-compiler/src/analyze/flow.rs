//! Control-flow classification: does a statement NEVER, SOMETIMES, or
//! ALWAYS return?
//!
//! Blocks fold left over their declarations; statements after an ALWAYS
//! are unreachable. An `if` chain is ALWAYS only when it has an `else`
//! and every branch is ALWAYS; a `while` body may not run, so its ALWAYS
//! demotes to SOMETIMES. A non-void function whose body is not ALWAYS is
//! rejected.

use crate::ast::{Ast, BlockId, DeclId, DeclKind, FuncBody, FuncId, ReturnFlow, Stmt};
use crate::diagnostics::Diagnostics;
use crate::types::Type;

pub fn run(ast: &mut Ast, diagnostics: &mut Diagnostics) {
    let mut checker = FlowChecker { ast, diagnostics };
    for decl in checker.ast.sequence.clone() {
        checker.visit_decl(decl);
    }
}

struct FlowChecker<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
}

impl FlowChecker<'_> {
    fn visit_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(_) => {}
            DeclKind::Func(func) => self.visit_function(*func),
            DeclKind::Struct(data) => {
                for func in data.generators.clone() {
                    self.visit_function(func);
                }
            }
            DeclKind::Stmt(_) => self.visit_stmt(id),
        }
    }

    fn visit_function(&mut self, func: FuncId) {
        let info = self.ast.func(func);
        let span = info.span;
        let ret = match info.ty.as_function() {
            Some((_, ret)) => ret.clone(),
            None => Type::unresolved(),
        };
        match info.body {
            FuncBody::Block(block) => {
                self.visit_block(block);
                if ret != Type::void()
                    && !ret.is_unresolved()
                    && self.ast.block(block).returns != ReturnFlow::Always
                {
                    self.diagnostics
                        .error("non-void function may not return", span)
                        .emit();
                }
            }
            // A lambda body is a single expression; it always produces
            // its value.
            FuncBody::Expr(_) => {}
        }
    }

    fn visit_block(&mut self, block: BlockId) {
        let decls = self.ast.block(block).decls.clone();
        let mut flow = ReturnFlow::Never;
        for decl in decls {
            self.visit_decl(decl);
            if flow == ReturnFlow::Always {
                let span = self.ast.decl(decl).span;
                self.diagnostics.error("unreachable code", span).emit();
                continue;
            }
            match self.ast.decl(decl).returns {
                ReturnFlow::Sometimes => flow = ReturnFlow::Sometimes,
                ReturnFlow::Always => flow = ReturnFlow::Always,
                ReturnFlow::Never => {}
            }
        }
        self.ast.block_mut(block).returns = flow;
    }

    fn visit_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        let flow = match stmt {
            Stmt::Return(_) => ReturnFlow::Always,
            Stmt::Block(block) => {
                let block = *block;
                self.visit_block(block);
                self.ast.block(block).returns
            }
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                let mut blocks = Vec::new();
                for (_, block) in arms {
                    self.visit_block(block);
                    blocks.push(self.ast.block(block).returns);
                }
                if let Some(block) = else_block {
                    self.visit_block(block);
                    blocks.push(self.ast.block(block).returns);
                }
                if else_block.is_some() && blocks.iter().all(|&f| f == ReturnFlow::Always) {
                    ReturnFlow::Always
                } else if blocks.iter().any(|&f| f != ReturnFlow::Never) {
                    ReturnFlow::Sometimes
                } else {
                    ReturnFlow::Never
                }
            }
            Stmt::While { block, .. } => {
                let block = *block;
                self.visit_block(block);
                // The loop may not execute at all.
                match self.ast.block(block).returns {
                    ReturnFlow::Never => ReturnFlow::Never,
                    _ => ReturnFlow::Sometimes,
                }
            }
            Stmt::Print(_) | Stmt::Expr(_) | Stmt::Set { .. } => ReturnFlow::Never,
        };
        self.ast.decl_mut(id).returns = flow;
    }
}
