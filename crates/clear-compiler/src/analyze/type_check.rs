//! Type inference and checking.
//!
//! Two steps over the tree:
//! 1. signatures - every type expression is resolved to a [`Type`], and
//!    function, parameter, struct field, and annotated value bindings get
//!    their declared types. This makes forward references to functions
//!    work regardless of sequence order.
//! 2. checking - a traversal in sequence order inferring every
//!    expression's type and enforcing the typing rules. Unresolved types
//!    from earlier resolution errors are propagated silently so one
//!    mistake does not cascade.

use clear_bytecode::Opcode;

use crate::ast::{
    Ast, BinaryOp, DeclId, DeclKind, ExprId, ExprKind, FuncBody, FuncId, Stmt, TypeExprKind,
    UnaryOp,
};
use crate::diagnostics::{Diagnostics, Span};
use crate::types::{
    BUILTINS, TYPED_OPERATORS, Type, UNARY_OPERATORS, UNTYPED_OPERATORS, contains, printable,
    union,
};

pub fn run(ast: &mut Ast, diagnostics: &mut Diagnostics) {
    let mut checker = TypeChecker {
        ast,
        diagnostics,
        expected_returns: Vec::new(),
    };
    checker.declare_signatures();
    for decl in checker.ast.sequence.clone() {
        checker.check_decl(decl);
    }
}

struct TypeChecker<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
    expected_returns: Vec<Type>,
}

impl TypeChecker<'_> {
    // ------------------------------------------------------------------
    // Signatures

    fn declare_signatures(&mut self) {
        // Type expressions are allocated children-first, so one forward
        // scan resolves every node bottom-up.
        for index in 0..self.ast.type_exprs.len() {
            let ty = match &self.ast.type_exprs[index].kind {
                TypeExprKind::Atom(builtin) => Type::builtin(*builtin),
                TypeExprKind::Named { name, ref_ } => match ref_ {
                    Some(decl) => Type::structure(*decl, name.clone()),
                    None => Type::unresolved(),
                },
                TypeExprKind::Func { params, ret } => {
                    let params = params
                        .iter()
                        .map(|id| self.ast.type_expr(*id).ty.clone())
                        .collect();
                    let ret = self.ast.type_expr(*ret).ty.clone();
                    Type::function(params, ret)
                }
                TypeExprKind::Optional(inner) => {
                    union([self.ast.type_expr(*inner).ty.clone(), Type::nil()])
                }
                TypeExprKind::Union(members) => union(
                    members
                        .iter()
                        .map(|id| self.ast.type_expr(*id).ty.clone())
                        .collect::<Vec<_>>(),
                ),
            };
            self.ast.type_exprs[index].ty = ty;
        }

        for func in 0..self.ast.funcs.len() {
            self.declare_function_signature(FuncId(func as u32));
        }

        for decl in 0..self.ast.decls.len() {
            self.declare_decl_signature(DeclId(decl as u32));
        }
    }

    fn declare_function_signature(&mut self, func: FuncId) {
        let info = self.ast.func(func);
        let params: Vec<(crate::ast::BindingId, crate::ast::TypeExprId)> = info
            .params
            .iter()
            .map(|param| (param.binding, param.type_expr))
            .collect();
        let return_type = info.return_type;
        let binding = info.binding;

        let mut param_types = Vec::new();
        for (param_binding, type_expr) in params {
            let ty = self.ast.type_expr(type_expr).ty.clone();
            let span = self.ast.type_expr(type_expr).span;
            if !ty.is_unresolved() && !ty.is_valid() {
                self.diagnostics
                    .error(format!("invalid parameter type {ty}"), span)
                    .emit();
            }
            self.ast.binding_mut(param_binding).ty = ty.clone();
            param_types.push(ty);
        }

        let ret = self.ast.type_expr(return_type).ty.clone();
        let ret_span = self.ast.type_expr(return_type).span;
        if !ret.is_unresolved() && !ret.is_valid() && ret != Type::void() {
            self.diagnostics
                .error(format!("invalid return type {ret}"), ret_span)
                .emit();
        }

        let ty = Type::function(param_types, ret);
        self.ast.func_mut(func).ty = ty.clone();
        if let Some(binding) = binding {
            self.ast.binding_mut(binding).ty = ty;
        }
    }

    fn declare_decl_signature(&mut self, decl: DeclId) {
        match &self.ast.decl(decl).kind {
            DeclKind::Value(data) => {
                // Annotated single-binding values are visible by type
                // before their initializer is checked.
                if data.bindings.len() == 1 {
                    if let Some(type_expr) = data.type_expr {
                        let binding = data.bindings[0];
                        let ty = self.ast.type_expr(type_expr).ty.clone();
                        self.ast.binding_mut(binding).ty = ty;
                    }
                }
            }
            DeclKind::Struct(data) => {
                let struct_type = Type::structure(decl, data.name.clone());
                let params: Vec<(crate::ast::BindingId, crate::ast::TypeExprId)> = data
                    .params
                    .iter()
                    .map(|param| (param.binding, param.type_expr))
                    .collect();
                let generators = data.generators.clone();

                for (binding, type_expr) in params {
                    let ty = self.ast.type_expr(type_expr).ty.clone();
                    let span = self.ast.type_expr(type_expr).span;
                    if !ty.is_unresolved() && !ty.is_valid() {
                        self.diagnostics
                            .error(format!("invalid type {ty} for struct field"), span)
                            .emit();
                    }
                    self.ast.binding_mut(binding).ty = ty;
                }

                for func in generators {
                    let info = self.ast.func(func);
                    let span = info.span;
                    let ret = self.ast.type_expr(info.return_type).ty.clone();
                    let this_binding = info.this_binding;
                    let binding = info.binding;
                    if !info.params.is_empty() {
                        self.diagnostics
                            .error("struct initializer cannot take parameters", span)
                            .emit();
                    }
                    if !ret.is_unresolved() && !ret.is_valid() {
                        let ret_span = self.ast.type_expr(self.ast.func(func).return_type).span;
                        self.diagnostics
                            .error(format!("invalid initializer type {ret}"), ret_span)
                            .emit();
                    }
                    // The generator runs over the partial struct; its
                    // result becomes the field named after it.
                    self.ast.func_mut(func).ty =
                        Type::function(vec![struct_type.clone()], ret.clone());
                    if let Some(this) = this_binding {
                        self.ast.binding_mut(this).ty = struct_type.clone();
                    }
                    if let Some(binding) = binding {
                        self.ast.binding_mut(binding).ty = ret;
                    }
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Checking

    fn check_decl(&mut self, id: DeclId) {
        match &self.ast.decl(id).kind {
            DeclKind::Value(data) => {
                let bindings = data.bindings.clone();
                let type_expr = data.type_expr;
                let init = data.init;
                let init_ty = self.check_expr(init);
                let init_span = self.ast.expr(init).span;

                let annotation = type_expr.map(|id| {
                    let ty = self.ast.type_expr(id).ty.clone();
                    let span = self.ast.type_expr(id).span;
                    (ty, span)
                });
                if let Some((ty, span)) = &annotation {
                    if !ty.is_unresolved() && !ty.is_valid() {
                        self.diagnostics
                            .error(format!("invalid value type {ty}"), *span)
                            .emit();
                    }
                    if !ty.is_unresolved()
                        && !init_ty.is_unresolved()
                        && !contains(&init_ty, ty)
                    {
                        self.diagnostics
                            .error(
                                format!(
                                    "mismatched type for value initializer: \
                                     expected {ty} but got {init_ty}"
                                ),
                                init_span,
                            )
                            .emit();
                    }
                }

                if bindings.len() == 1 {
                    match annotation {
                        Some((ty, _)) => self.ast.binding_mut(bindings[0]).ty = ty,
                        None => {
                            if init_ty == Type::void() {
                                self.diagnostics
                                    .error("cannot declare value as void", init_span)
                                    .emit();
                            }
                            self.ast.binding_mut(bindings[0]).ty = init_ty;
                        }
                    }
                } else {
                    self.check_destructuring(&bindings, &init_ty, init_span);
                }
            }
            DeclKind::Func(func) => self.check_function(*func),
            DeclKind::Struct(data) => {
                for func in data.generators.clone() {
                    self.check_function(func);
                }
            }
            DeclKind::Stmt(_) => self.check_stmt(id),
        }
    }

    /// `val a, b = expr;` requires a tuple initializer of matching length.
    fn check_destructuring(&mut self, bindings: &[crate::ast::BindingId], init_ty: &Type, span: Span) {
        if init_ty.is_unresolved() {
            return;
        }
        let Some(elements) = init_ty.as_tuple() else {
            self.diagnostics
                .error(
                    format!("cannot destructure {init_ty} into {} values", bindings.len()),
                    span,
                )
                .emit();
            return;
        };
        if elements.len() != bindings.len() {
            self.diagnostics
                .error(
                    format!(
                        "cannot destructure {} elements into {} values",
                        elements.len(),
                        bindings.len()
                    ),
                    span,
                )
                .emit();
            return;
        }
        let elements = elements.to_vec();
        for (binding, element) in bindings.iter().zip(elements) {
            self.ast.binding_mut(*binding).ty = element;
        }
    }

    fn check_function(&mut self, func: FuncId) {
        let info = self.ast.func(func);
        let body = info.body;
        let ret = match info.ty.as_function() {
            Some((_, ret)) => ret.clone(),
            None => Type::unresolved(),
        };
        match body {
            FuncBody::Block(block) => {
                self.expected_returns.push(ret);
                for decl in self.ast.block(block).decls.clone() {
                    self.check_decl(decl);
                }
                self.expected_returns.pop();
            }
            FuncBody::Expr(expr) => {
                let value_ty = self.check_expr(expr);
                let span = self.ast.expr(expr).span;
                if ret == Type::void() {
                    if !value_ty.is_unresolved() && value_ty != Type::void() {
                        self.diagnostics
                            .error(
                                format!("mismatched return type: expected void but got {value_ty}"),
                                span,
                            )
                            .emit();
                    }
                } else if !value_ty.is_unresolved()
                    && !ret.is_unresolved()
                    && !contains(&value_ty, &ret)
                {
                    self.diagnostics
                        .error(
                            format!("mismatched return type: expected {ret} but got {value_ty}"),
                            span,
                        )
                        .emit();
                }
            }
        }
    }

    fn check_block(&mut self, block: crate::ast::BlockId) {
        for decl in self.ast.block(block).decls.clone() {
            self.check_decl(decl);
        }
    }

    fn check_cond(&mut self, cond: ExprId) {
        let ty = self.check_expr(cond);
        if !ty.is_unresolved() && ty != Type::bool() {
            let span = self.ast.expr(cond).span;
            self.diagnostics
                .error(format!("invalid type {ty} for condition, expected bool"), span)
                .emit();
        }
    }

    fn check_stmt(&mut self, id: DeclId) {
        let DeclKind::Stmt(stmt) = &self.ast.decl(id).kind else {
            return;
        };
        let stmt_span = self.ast.decl(id).span;
        match stmt {
            Stmt::Print(expr) => {
                let Some(expr) = *expr else { return };
                let ty = self.check_expr(expr);
                if !ty.is_unresolved() && !contains(&ty, &printable()) {
                    self.diagnostics
                        .error(format!("unprintable type {ty}"), stmt_span)
                        .emit();
                }
            }
            Stmt::Block(block) => self.check_block(*block),
            Stmt::If { arms, else_block } => {
                let arms = arms.clone();
                let else_block = *else_block;
                for (cond, block) in arms {
                    self.check_cond(cond);
                    self.check_block(block);
                }
                if let Some(block) = else_block {
                    self.check_block(block);
                }
            }
            Stmt::While { cond, block } => {
                let cond = *cond;
                let block = *block;
                if let Some(cond) = cond {
                    self.check_cond(cond);
                }
                self.check_block(block);
            }
            Stmt::Return(expr) => {
                let expr = *expr;
                let expected = match self.expected_returns.last() {
                    Some(expected) => expected.clone(),
                    None => {
                        self.diagnostics
                            .error("return statement outside of function", stmt_span)
                            .emit();
                        return;
                    }
                };
                match expr {
                    Some(expr) => {
                        let ty = self.check_expr(expr);
                        let span = self.ast.expr(expr).span;
                        if ty.is_unresolved() || expected.is_unresolved() {
                            return;
                        }
                        if !ty.is_valid() {
                            self.diagnostics
                                .error(format!("invalid type {ty} to return"), span)
                                .emit();
                        } else if !contains(&ty, &expected) {
                            self.diagnostics
                                .error(
                                    format!(
                                        "mismatched return type: expected {expected} but got {ty}"
                                    ),
                                    span,
                                )
                                .emit();
                        }
                    }
                    None => {
                        if expected != Type::void() {
                            self.diagnostics
                                .error("missing return value in non-void function", stmt_span)
                                .emit();
                        }
                    }
                }
            }
            Stmt::Expr(expr) => {
                let expr = *expr;
                let ty = self.check_expr(expr);
                let span = self.ast.expr(expr).span;
                if ty.is_unresolved() {
                    return;
                }
                if !ty.is_valid() && ty != Type::void() {
                    self.diagnostics
                        .error(format!("invalid expression type {ty}"), span)
                        .emit();
                }
                if ty != Type::void() {
                    self.diagnostics
                        .warning("unused non-void value", span)
                        .emit();
                }
            }
            Stmt::Set { target, value } => {
                let (target, value) = (*target, *value);
                let target_ty = self.check_expr(target);
                let value_ty = self.check_expr(value);
                if !target_ty.is_unresolved()
                    && !value_ty.is_unresolved()
                    && !contains(&value_ty, &target_ty)
                {
                    let span = self.ast.expr(value).span;
                    self.diagnostics
                        .error(
                            format!(
                                "mismatched type for assignment: \
                                 expected {target_ty} but got {value_ty}"
                            ),
                            span,
                        )
                        .emit();
                }
            }
        }
    }

    fn check_expr(&mut self, id: ExprId) -> Type {
        let ty = self.infer_expr(id);
        self.ast.expr_mut(id).ty = ty.clone();
        ty
    }

    fn infer_expr(&mut self, id: ExprId) -> Type {
        let span = self.ast.expr(id).span;
        match &self.ast.expr(id).kind {
            ExprKind::Int(_) => Type::int(),
            ExprKind::Num(_) => Type::num(),
            ExprKind::Str(_) => Type::str(),
            ExprKind::Bool(_) => Type::bool(),
            ExprKind::Nil => Type::nil(),
            ExprKind::Ident { name, ref_, .. } => match ref_ {
                Some(binding) => self.ast.binding(*binding).ty.clone(),
                None => match BUILTINS.get(name.as_str()) {
                    Some(builtin) => builtin.ty.clone(),
                    None => Type::unresolved(),
                },
            },
            ExprKind::Unary { op, operand, .. } => {
                let (op, operand) = (*op, *operand);
                self.check_unary(id, op, operand, span)
            }
            ExprKind::Binary { op, lhs, rhs, .. } => {
                let (op, lhs, rhs) = (*op, *lhs, *rhs);
                self.check_binary(id, op, lhs, rhs, span)
            }
            ExprKind::Call { callee, args } => {
                let callee = *callee;
                let args = args.clone();
                self.check_call(callee, &args, span)
            }
            ExprKind::Tuple(elements) => {
                let elements = elements.clone();
                let tys = elements
                    .iter()
                    .map(|element| self.check_expr(*element))
                    .collect();
                Type::tuple(tys)
            }
            ExprKind::Lambda(func) => {
                let func = *func;
                self.check_function(func);
                self.ast.func(func).ty.clone()
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
                self.check_case(target, binding, &arms, fallback)
            }
            ExprKind::Construct { .. } => self.check_construct(id, span),
            ExprKind::Access {
                target,
                field,
                field_span,
            } => {
                let target = *target;
                let field = field.clone();
                let field_span = *field_span;
                self.check_access(target, &field, field_span)
            }
        }
    }

    fn check_unary(&mut self, id: ExprId, op: UnaryOp, operand: ExprId, span: Span) -> Type {
        let operand_ty = self.check_expr(operand);
        if operand_ty.is_unresolved() {
            return Type::unresolved();
        }
        let operator = &UNARY_OPERATORS[&op];
        match operator.overload_for(&operand_ty) {
            Some(overload) => {
                let opcodes = overload.opcodes.clone();
                let result = overload.result.clone();
                self.set_opcodes(id, opcodes);
                result
            }
            None => {
                self.diagnostics
                    .error(
                        format!(
                            "invalid operand type {operand_ty} for unary operator {}",
                            op.symbol()
                        ),
                        span,
                    )
                    .emit();
                operand_ty
            }
        }
    }

    fn check_binary(
        &mut self,
        id: ExprId,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
    ) -> Type {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);
        if lhs_ty.is_unresolved() || rhs_ty.is_unresolved() {
            return Type::unresolved();
        }

        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            for (side, ty) in [(lhs, &lhs_ty), (rhs, &rhs_ty)] {
                if *ty != Type::bool() {
                    let side_span = self.ast.expr(side).span;
                    self.diagnostics
                        .error(
                            format!("invalid type {ty} for logic operator {}", op.symbol()),
                            side_span,
                        )
                        .emit();
                }
            }
            return Type::bool();
        }

        if let Some(operator) = UNTYPED_OPERATORS.get(&op) {
            let result = operator.result.clone();
            let opcodes = operator.opcodes.clone();
            for ty in [&lhs_ty, &rhs_ty] {
                if !ty.is_valid() {
                    self.diagnostics
                        .error(
                            format!("invalid operand type {ty} for operator {}", op.symbol()),
                            span,
                        )
                        .emit();
                }
            }
            self.set_opcodes(id, opcodes);
            return result;
        }

        let operator = &TYPED_OPERATORS[&op];
        if lhs_ty != rhs_ty {
            self.diagnostics
                .error(
                    format!(
                        "mismatched operand types {lhs_ty} and {rhs_ty} \
                         for binary operator {}",
                        op.symbol()
                    ),
                    span,
                )
                .emit();
            return self.binary_fallback(op, lhs_ty);
        }
        match operator.overload_for(&lhs_ty) {
            Some(overload) => {
                let opcodes = overload.opcodes.clone();
                let result = overload.result.clone();
                self.set_opcodes(id, opcodes);
                result
            }
            None => {
                self.diagnostics
                    .error(
                        format!(
                            "invalid operand type {lhs_ty} for binary operator {}",
                            op.symbol()
                        ),
                        span,
                    )
                    .emit();
                self.binary_fallback(op, lhs_ty)
            }
        }
    }

    /// Result type to keep inferring with after an operand error.
    fn binary_fallback(&self, op: BinaryOp, lhs_ty: Type) -> Type {
        match op {
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
                Type::bool()
            }
            _ => lhs_ty,
        }
    }

    fn set_opcodes(&mut self, id: ExprId, chosen: Vec<Opcode>) {
        match &mut self.ast.expr_mut(id).kind {
            ExprKind::Unary { opcodes, .. } | ExprKind::Binary { opcodes, .. } => {
                *opcodes = chosen;
            }
            _ => {}
        }
    }

    fn check_call(&mut self, callee: ExprId, args: &[ExprId], span: Span) -> Type {
        let callee_ty = self.check_expr(callee);
        let arg_tys: Vec<Type> = args.iter().map(|arg| self.check_expr(*arg)).collect();
        if callee_ty.is_unresolved() {
            return Type::unresolved();
        }
        let Some((params, ret)) = callee_ty.as_function() else {
            let callee_span = self.ast.expr(callee).span;
            self.diagnostics
                .error(
                    format!("invalid type {callee_ty} to call, expected a function"),
                    callee_span,
                )
                .emit();
            return Type::unresolved();
        };
        let (params, ret) = (params.to_vec(), ret.clone());

        if args.len() != params.len() {
            let adjective = if args.len() < params.len() {
                "few"
            } else {
                "many"
            };
            let args_span = match (args.first(), args.last()) {
                (Some(first), Some(last)) => {
                    self.ast.expr(*first).span.to(self.ast.expr(*last).span)
                }
                _ => span,
            };
            self.diagnostics
                .error(
                    format!(
                        "too {adjective} arguments to function: expected {} but got {}",
                        params.len(),
                        args.len()
                    ),
                    args_span,
                )
                .emit();
        } else {
            for ((arg, arg_ty), param) in args.iter().zip(&arg_tys).zip(&params) {
                if !arg_ty.is_unresolved() && !contains(arg_ty, param) {
                    let arg_span = self.ast.expr(*arg).span;
                    self.diagnostics
                        .error(
                            format!(
                                "mismatched type for argument: expected {param} but got {arg_ty}"
                            ),
                            arg_span,
                        )
                        .emit();
                }
            }
        }
        ret
    }

    fn check_case(
        &mut self,
        target: ExprId,
        binding: crate::ast::BindingId,
        arms: &[(crate::ast::TypeExprId, ExprId)],
        fallback: ExprId,
    ) -> Type {
        let target_ty = self.check_expr(target);
        let mut results = Vec::new();
        for (arm_type, value) in arms {
            let arm_ty = self.ast.type_expr(*arm_type).ty.clone();
            let arm_span = self.ast.type_expr(*arm_type).span;
            if !arm_ty.is_unresolved() {
                if !arm_ty.is_valid() {
                    self.diagnostics
                        .error(format!("invalid case type {arm_ty}"), arm_span)
                        .emit();
                } else if !target_ty.is_unresolved() && !contains(&arm_ty, &target_ty) {
                    self.diagnostics
                        .error(
                            format!("case type {arm_ty} is not part of {target_ty}"),
                            arm_span,
                        )
                        .emit();
                }
            }
            // The arm sees the target's name with the matched type.
            self.ast.binding_mut(binding).ty = arm_ty;
            results.push(self.check_expr(*value));
        }
        self.ast.binding_mut(binding).ty = target_ty;
        results.push(self.check_expr(fallback));
        union(results)
    }

    fn check_construct(&mut self, id: ExprId, span: Span) -> Type {
        let (ref_, inits) = {
            let ExprKind::Construct { ref_, inits, .. } = &self.ast.expr(id).kind else {
                return Type::unresolved();
            };
            (
                *ref_,
                inits
                    .iter()
                    .map(|init| (init.name.clone(), init.span, init.value))
                    .collect::<Vec<_>>(),
            )
        };
        let Some(decl) = ref_ else {
            // Unresolved constructor; still check the field values.
            for (_, _, value) in inits {
                self.check_expr(value);
            }
            return Type::unresolved();
        };

        let data = self.ast.struct_decl(decl);
        let struct_name = data.name.clone();
        let fields: Vec<(String, crate::ast::BindingId)> = data
            .params
            .iter()
            .map(|param| (self.ast.binding(param.binding).name.clone(), param.binding))
            .collect();
        let generator_names: Vec<String> = data
            .generators
            .iter()
            .filter_map(|g| self.ast.func(*g).binding)
            .map(|b| self.ast.binding(b).name.clone())
            .collect();

        let mut given: Vec<String> = Vec::new();
        for (name, init_span, value) in &inits {
            let value_ty = self.check_expr(*value);
            given.push(name.clone());
            match fields.iter().find(|(field, _)| field == name) {
                Some((_, binding)) => {
                    let field_ty = self.ast.binding(*binding).ty.clone();
                    if !value_ty.is_unresolved()
                        && !field_ty.is_unresolved()
                        && !contains(&value_ty, &field_ty)
                    {
                        let value_span = self.ast.expr(*value).span;
                        self.diagnostics
                            .error(
                                format!(
                                    "mismatched type for field {name}: \
                                     expected {field_ty} but got {value_ty}"
                                ),
                                value_span,
                            )
                            .emit();
                    }
                }
                None => {
                    let message = if generator_names.iter().any(|g| g == name) {
                        format!("field {name} is computed by an initializer")
                    } else {
                        format!("unknown field {name} for struct {struct_name}")
                    };
                    self.diagnostics.error(message, *init_span).emit();
                }
            }
        }
        for (field, _) in &fields {
            if !given.iter().any(|given_name| given_name == field) {
                self.diagnostics
                    .error(format!("missing field {field} for struct {struct_name}"), span)
                    .emit();
            }
        }

        Type::structure(decl, struct_name)
    }

    fn check_access(&mut self, target: ExprId, field: &str, field_span: Span) -> Type {
        let target_ty = self.check_expr(target);
        if target_ty.is_unresolved() {
            return Type::unresolved();
        }
        let Some(decl) = target_ty.as_struct() else {
            let span = self.ast.expr(target).span;
            self.diagnostics
                .error(
                    format!("invalid type {target_ty} for field access, expected a struct"),
                    span,
                )
                .emit();
            return Type::unresolved();
        };

        let data = self.ast.struct_decl(decl);
        let struct_name = data.name.clone();
        let members = data
            .params
            .iter()
            .map(|param| param.binding)
            .chain(data.generators.iter().filter_map(|g| self.ast.func(*g).binding))
            .collect::<Vec<_>>();
        for binding in members {
            if self.ast.binding(binding).name == field {
                return self.ast.binding(binding).ty.clone();
            }
        }
        self.diagnostics
            .error(format!("no field {field} on struct {struct_name}"), field_span)
            .emit();
        Type::unresolved()
    }
}
