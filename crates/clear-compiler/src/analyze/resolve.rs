//! Name resolution: duplicate checks, scope tracking, and reference
//! resolution.
//!
//! Three coordinated traversals, in order:
//! 1. duplicate check - struct members form one namespace, construct
//!    field labels must be unique;
//! 2. name tracking - fills the scope name maps (global, per function
//!    body, per explicit block);
//! 3. name resolution - identifier expressions and identifier types look
//!    up their name against the completed maps, so forward references
//!    resolve.

use indexmap::IndexMap;

use crate::ast::{
    Ast, BindingId, BlockId, DeclId, DeclKind, ExprId, ExprKind, FuncId, NameDef, Stmt,
    TypeExprId, TypeExprKind,
};
use crate::diagnostics::{Diagnostics, Span};
use crate::types::BUILTINS;

pub fn run(ast: &mut Ast, diagnostics: &mut Diagnostics) {
    check_duplicates(ast, diagnostics);
    NameTracker {
        ast: &mut *ast,
        diagnostics: &mut *diagnostics,
        scopes: Vec::new(),
    }
    .run();
    NameResolver {
        ast,
        diagnostics,
        scopes: Vec::new(),
        funcs: Vec::new(),
        overrides: Vec::new(),
    }
    .run();
}

/// A scope owning a name map.
#[derive(Clone, Copy, Debug)]
enum Scope {
    Global,
    Func(FuncId),
    Block(BlockId),
}

/// Struct members (fields and generators) share one namespace, and a
/// constructor may give each field only once.
fn check_duplicates(ast: &Ast, diagnostics: &mut Diagnostics) {
    for decl in &ast.decls {
        let DeclKind::Struct(data) = &decl.kind else {
            continue;
        };
        let mut seen: IndexMap<&str, Vec<Span>> = IndexMap::new();
        let members = data
            .params
            .iter()
            .map(|param| param.binding)
            .chain(data.generators.iter().filter_map(|g| ast.func(*g).binding));
        for binding in members {
            let binding = ast.binding(binding);
            let previous = seen.entry(&binding.name).or_default();
            if !previous.is_empty() {
                let mut builder = diagnostics.error(
                    format!("duplicate struct member {}", binding.name),
                    binding.span,
                );
                for &span in previous.iter() {
                    builder = builder.related_to("also declared here", span);
                }
                builder.emit();
            }
            previous.push(binding.span);
        }
    }

    for expr in &ast.exprs {
        let ExprKind::Construct { inits, .. } = &expr.kind else {
            continue;
        };
        let mut seen: IndexMap<&str, Span> = IndexMap::new();
        for init in inits {
            if let Some(&previous) = seen.get(init.name.as_str()) {
                diagnostics
                    .error(
                        format!("duplicate field specifier {}", init.name),
                        init.span,
                    )
                    .related_to("already given here", previous)
                    .emit();
            } else {
                seen.insert(&init.name, init.span);
            }
        }
    }
}

struct NameTracker<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
    scopes: Vec<Scope>,
}

impl NameTracker<'_> {
    fn run(mut self) {
        self.scopes.push(Scope::Global);
        for decl in self.ast.items.clone() {
            self.track_decl(decl);
        }
    }

    fn lookup_current(&self, name: &str) -> Option<NameDef> {
        let map = match *self.scopes.last().expect("scope stack never empty") {
            Scope::Global => &self.ast.names,
            Scope::Func(func) => &self.ast.func(func).names,
            Scope::Block(block) => &self.ast.block(block).names,
        };
        map.get(name).copied()
    }

    fn def_span(&self, def: NameDef) -> Span {
        match def {
            NameDef::Value(binding) => self.ast.binding(binding).span,
            NameDef::Struct(decl) => self.ast.struct_decl(decl).name_span,
        }
    }

    /// Declares a name into the innermost scope. Re-declaration within one
    /// scope is a diagnostic citing both regions; shadowing across scopes
    /// is fine.
    fn declare(&mut self, name: &str, span: Span, def: NameDef) {
        if BUILTINS.contains_key(name) {
            self.diagnostics
                .error(
                    format!("invalid name {name}, reserved for the builtin function {name}"),
                    span,
                )
                .emit();
            return;
        }
        if let Some(previous) = self.lookup_current(name) {
            let previous_span = self.def_span(previous);
            self.diagnostics
                .error(format!("redefinition of name {name}"), span)
                .related_to("previously defined here", previous_span)
                .emit();
            return;
        }
        let map = match *self.scopes.last().expect("scope stack never empty") {
            Scope::Global => &mut self.ast.names,
            Scope::Func(func) => &mut self.ast.func_mut(func).names,
            Scope::Block(block) => &mut self.ast.block_mut(block).names,
        };
        map.insert(name.to_owned(), def);
    }

    fn declare_binding(&mut self, binding: BindingId) {
        let (name, span) = {
            let binding = self.ast.binding(binding);
            (binding.name.clone(), binding.span)
        };
        self.declare(&name, span, NameDef::Value(binding));
    }

    fn track_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let bindings = data.bindings.clone();
                let init = data.init;
                self.track_expr(init);
                for binding in bindings {
                    self.declare_binding(binding);
                }
            }
            DeclKind::Func(func) => {
                let func = *func;
                if let Some(binding) = self.ast.func(func).binding {
                    self.declare_binding(binding);
                }
                self.track_function(func);
            }
            DeclKind::Struct(data) => {
                let name = data.name.clone();
                let span = data.name_span;
                let generators = data.generators.clone();
                self.declare(&name, span, NameDef::Struct(id));
                // Struct fields and generator names live in the struct's
                // own namespace, checked separately; only the generators'
                // bodies open real scopes.
                for generator in generators {
                    self.track_function(generator);
                }
            }
            DeclKind::Stmt(_) => self.track_stmt(id),
        }
    }

    /// Parameters, `this`, and body-level locals all land in the function
    /// scope map.
    fn track_function(&mut self, func: FuncId) {
        self.scopes.push(Scope::Func(func));
        let info = self.ast.func(func);
        let params: Vec<BindingId> = info.params.iter().map(|p| p.binding).collect();
        let this_binding = info.this_binding;
        let body = info.body;
        if let Some(this) = this_binding {
            self.declare_binding(this);
        }
        for param in params {
            self.declare_binding(param);
        }
        match body {
            crate::ast::FuncBody::Block(block) => {
                for decl in self.ast.block(block).decls.clone() {
                    self.track_decl(decl);
                }
            }
            crate::ast::FuncBody::Expr(expr) => self.track_expr(expr),
        }
        self.scopes.pop();
    }

    fn track_block(&mut self, block: BlockId) {
        self.scopes.push(Scope::Block(block));
        for decl in self.ast.block(block).decls.clone() {
            self.track_decl(decl);
        }
        self.scopes.pop();
    }

    fn track_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        match stmt {
            Stmt::Print(expr) => {
                if let Some(expr) = *expr {
                    self.track_expr(expr);
                }
            }
            Stmt::Block(block) => self.track_block(*block),
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.track_expr(cond);
                    self.track_block(block);
                }
                if let Some(block) = else_block {
                    self.track_block(block);
                }
            }
            Stmt::While { cond, block } => {
                let cond = *cond;
                let block = *block;
                if let Some(cond) = cond {
                    self.track_expr(cond);
                }
                self.track_block(block);
            }
            Stmt::Return(expr) => {
                if let Some(expr) = *expr {
                    self.track_expr(expr);
                }
            }
            Stmt::Expr(expr) => self.track_expr(*expr),
            Stmt::Set { target, value } => {
                let (target, value) = (*target, *value);
                self.track_expr(target);
                self.track_expr(value);
            }
        }
    }

    fn track_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Unary { operand, .. } => self.track_expr(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.track_expr(lhs);
                self.track_expr(rhs);
            }
            ExprKind::Call { callee, args } => {
                let callee = *callee;
                let args = args.clone();
                self.track_expr(callee);
                for arg in args {
                    self.track_expr(arg);
                }
            }
            ExprKind::Tuple(elements) => {
                for element in elements.clone() {
                    self.track_expr(element);
                }
            }
            ExprKind::Lambda(func) => self.track_function(*func),
            ExprKind::Case {
                target,
                arms,
                fallback,
                ..
            } => {
                let target = *target;
                let fallback = *fallback;
                let arms = arms.clone();
                self.track_expr(target);
                for (_, value) in arms {
                    self.track_expr(value);
                }
                self.track_expr(fallback);
            }
            ExprKind::Construct { inits, .. } => {
                let values: Vec<ExprId> = inits.iter().map(|init| init.value).collect();
                for value in values {
                    self.track_expr(value);
                }
            }
            ExprKind::Access { target, .. } => self.track_expr(*target),
            _ => {}
        }
    }
}

struct NameResolver<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
    scopes: Vec<Scope>,
    /// Enclosing function chain, innermost last.
    funcs: Vec<FuncId>,
    /// Case-arm rebindings, innermost last.
    overrides: Vec<(String, BindingId)>,
}

impl NameResolver<'_> {
    fn run(mut self) {
        self.scopes.push(Scope::Global);
        for decl in self.ast.items.clone() {
            self.resolve_decl(decl);
        }
    }

    fn lookup(&self, name: &str) -> Option<NameDef> {
        for (override_name, binding) in self.overrides.iter().rev() {
            if override_name == name {
                return Some(NameDef::Value(*binding));
            }
        }
        for scope in self.scopes.iter().rev() {
            let map = match *scope {
                Scope::Global => &self.ast.names,
                Scope::Func(func) => &self.ast.func(func).names,
                Scope::Block(block) => &self.ast.block(block).names,
            };
            if let Some(def) = map.get(name) {
                return Some(*def);
            }
        }
        None
    }

    fn resolve_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let bindings = data.bindings.clone();
                let type_expr = data.type_expr;
                let init = data.init;
                if let Some(type_expr) = type_expr {
                    self.resolve_type_expr(type_expr);
                }
                self.resolve_expr(init);
                for binding in bindings {
                    self.ast.binding_mut(binding).dependency = Some(id);
                }
            }
            DeclKind::Func(func) => {
                let func = *func;
                if let Some(binding) = self.ast.func(func).binding {
                    self.ast.binding_mut(binding).dependency = Some(id);
                }
                self.resolve_function(func);
            }
            DeclKind::Struct(data) => {
                let params: Vec<TypeExprId> = data.params.iter().map(|p| p.type_expr).collect();
                let generators = data.generators.clone();
                for type_expr in params {
                    self.resolve_type_expr(type_expr);
                }
                for generator in generators {
                    self.resolve_function(generator);
                }
            }
            DeclKind::Stmt(_) => self.resolve_stmt(id),
        }
    }

    fn resolve_function(&mut self, func: FuncId) {
        let info = self.ast.func(func);
        let param_types: Vec<TypeExprId> = info.params.iter().map(|p| p.type_expr).collect();
        let return_type = info.return_type;
        let body = info.body;
        for type_expr in param_types {
            self.resolve_type_expr(type_expr);
        }
        self.resolve_type_expr(return_type);

        self.scopes.push(Scope::Func(func));
        self.funcs.push(func);
        match body {
            crate::ast::FuncBody::Block(block) => {
                for decl in self.ast.block(block).decls.clone() {
                    self.resolve_decl(decl);
                }
            }
            crate::ast::FuncBody::Expr(expr) => self.resolve_expr(expr),
        }
        self.funcs.pop();
        self.scopes.pop();
    }

    fn resolve_block(&mut self, block: BlockId) {
        self.scopes.push(Scope::Block(block));
        for decl in self.ast.block(block).decls.clone() {
            self.resolve_decl(decl);
        }
        self.scopes.pop();
    }

    fn resolve_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        match stmt {
            Stmt::Print(expr) => {
                if let Some(expr) = *expr {
                    self.resolve_expr(expr);
                }
            }
            Stmt::Block(block) => self.resolve_block(*block),
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.resolve_expr(cond);
                    self.resolve_block(block);
                }
                if let Some(block) = else_block {
                    self.resolve_block(block);
                }
            }
            Stmt::While { cond, block } => {
                let cond = *cond;
                let block = *block;
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                self.resolve_block(block);
            }
            Stmt::Return(expr) => {
                if let Some(expr) = *expr {
                    self.resolve_expr(expr);
                }
            }
            Stmt::Expr(expr) => self.resolve_expr(*expr),
            Stmt::Set { target, value } => {
                let (target, value) = (*target, *value);
                self.resolve_expr(target);
                self.resolve_expr(value);
                self.check_set_target(target);
            }
        }
    }

    /// Set targets must name a mutable value, and a function cannot be
    /// reassigned inside its own body.
    fn check_set_target(&mut self, target: ExprId) {
        let span = self.ast.expr(target).span;
        let ExprKind::Ident { ref_, .. } = &self.ast.expr(target).kind else {
            self.diagnostics.error("unassignable target", span).emit();
            return;
        };
        let Some(binding) = *ref_ else {
            return;
        };
        for &func in self.funcs.iter().rev() {
            if self.ast.func(func).binding == Some(binding) {
                let binding_span = self.ast.binding(binding).span;
                self.diagnostics
                    .error("cannot set function within its own body", span)
                    .related_to("the enclosing function", binding_span)
                    .emit();
                return;
            }
        }
        let binding = self.ast.binding(binding);
        if !binding.mutable {
            let name = binding.name.clone();
            let binding_span = binding.span;
            self.diagnostics
                .error(format!("unassignable target {name}, declared with val"), span)
                .related_to("declared immutable here", binding_span)
                .emit();
        }
    }

    fn resolve_ident(&mut self, id: ExprId) {
        let (name, span) = {
            let expr = self.ast.expr(id);
            let ExprKind::Ident { name, .. } = &expr.kind else {
                return;
            };
            (name.clone(), expr.span)
        };

        if name == "this" {
            let this = self
                .funcs
                .iter()
                .rev()
                .find_map(|&func| self.ast.func(func).this_binding);
            match this {
                Some(binding) => self.set_ident_ref(id, binding),
                None => self
                    .diagnostics
                    .error("this is only available inside a struct initializer", span)
                    .emit(),
            }
            return;
        }
        if BUILTINS.contains_key(name.as_str()) {
            return;
        }

        match self.lookup(&name) {
            None => self
                .diagnostics
                .error(format!("reference to undeclared name {name}"), span)
                .emit(),
            Some(NameDef::Struct(_)) => self
                .diagnostics
                .error(
                    format!("invalid reference to struct {name}, expected value"),
                    span,
                )
                .emit(),
            Some(NameDef::Value(binding)) => self.set_ident_ref(id, binding),
        }
    }

    fn set_ident_ref(&mut self, id: ExprId, binding: BindingId) {
        if let ExprKind::Ident { ref_, .. } = &mut self.ast.expr_mut(id).kind {
            *ref_ = Some(binding);
        }
    }

    fn resolve_expr(&mut self, id: ExprId) {
        match &self.ast.expr(id).kind {
            ExprKind::Ident { .. } => self.resolve_ident(id),
            ExprKind::Unary { operand, .. } => self.resolve_expr(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                let (lhs, rhs) = (*lhs, *rhs);
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Call { callee, args } => {
                let callee = *callee;
                let args = args.clone();
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Tuple(elements) => {
                for element in elements.clone() {
                    self.resolve_expr(element);
                }
            }
            ExprKind::Lambda(func) => self.resolve_function(*func),
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
                self.resolve_expr(target);
                let name = self.ast.binding(binding).name.clone();
                for (arm_type, value) in arms {
                    self.resolve_type_expr(arm_type);
                    self.overrides.push((name.clone(), binding));
                    self.resolve_expr(value);
                    self.overrides.pop();
                }
                self.resolve_expr(fallback);
            }
            ExprKind::Construct { .. } => self.resolve_construct(id),
            ExprKind::Access { target, .. } => self.resolve_expr(*target),
            _ => {}
        }
    }

    fn resolve_construct(&mut self, id: ExprId) {
        let (name, name_span, values) = {
            let ExprKind::Construct {
                name,
                name_span,
                inits,
                ..
            } = &self.ast.expr(id).kind
            else {
                return;
            };
            (
                name.clone(),
                *name_span,
                inits.iter().map(|init| init.value).collect::<Vec<_>>(),
            )
        };

        match self.lookup(&name) {
            None => self
                .diagnostics
                .error(format!("reference to undeclared name {name}"), name_span)
                .emit(),
            Some(NameDef::Value(_)) => self
                .diagnostics
                .error(
                    format!("invalid reference to value {name}, expected struct"),
                    name_span,
                )
                .emit(),
            Some(NameDef::Struct(decl)) => {
                if let ExprKind::Construct { ref_, .. } = &mut self.ast.expr_mut(id).kind {
                    *ref_ = Some(decl);
                }
            }
        }
        for value in values {
            self.resolve_expr(value);
        }
    }

    fn resolve_type_expr(&mut self, id: TypeExprId) {
        match &self.ast.type_expr(id).kind {
            TypeExprKind::Named { name, .. } => {
                let name = name.clone();
                let span = self.ast.type_expr(id).span;
                match self.lookup(&name) {
                    None => self
                        .diagnostics
                        .error(format!("reference to undeclared type {name}"), span)
                        .emit(),
                    Some(NameDef::Value(_)) => self
                        .diagnostics
                        .error(
                            format!("invalid reference to value {name}, expected struct"),
                            span,
                        )
                        .emit(),
                    Some(NameDef::Struct(decl)) => {
                        if let TypeExprKind::Named { ref_, .. } =
                            &mut self.ast.type_expr_mut(id).kind
                        {
                            *ref_ = Some(decl);
                        }
                    }
                }
            }
            TypeExprKind::Func { params, ret } => {
                let params = params.clone();
                let ret = *ret;
                for param in params {
                    self.resolve_type_expr(param);
                }
                self.resolve_type_expr(ret);
            }
            TypeExprKind::Optional(inner) => self.resolve_type_expr(*inner),
            TypeExprKind::Union(members) => {
                for member in members.clone() {
                    self.resolve_type_expr(member);
                }
            }
            TypeExprKind::Atom(_) => {}
        }
    }
}
