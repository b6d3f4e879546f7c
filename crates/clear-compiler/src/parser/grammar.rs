//! Declarations, statements, and type expressions.

use crate::ast::{
    BlockId, DeclId, DeclKind, FuncBody, Param, Stmt, StructDecl, TypeExprId, TypeExprKind,
    ValueDecl,
};
use crate::lexer::TokenKind;
use crate::types::Builtin;

use super::core::{Parse, Parser};

impl Parser<'_> {
    pub(crate) fn parse_program(&mut self) {
        while !self.done() {
            match self.parse_decl() {
                Ok(decl) => self.ast.items.push(decl),
                Err(_) => {
                    self.synchronize();
                    // Synchronization stops before a closing brace for the
                    // sake of block recovery; at top level it is junk.
                    if self.at(TokenKind::BraceClose) {
                        self.advance();
                    }
                }
            }
        }
    }

    pub(crate) fn parse_decl(&mut self) -> Parse<DeclId> {
        match self.current_kind() {
            Some(TokenKind::KwVal) | Some(TokenKind::KwVar) => self.parse_value_decl(),
            Some(TokenKind::KwFunc) => self.parse_func_decl(),
            Some(TokenKind::KwStruct) => self.parse_struct_decl(),
            _ => self.parse_stmt(),
        }
    }

    /// `val a[, b ...] [Type] = expr;` / `var ...`
    fn parse_value_decl(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked declaration starter");
        let mutable = keyword.kind == TokenKind::KwVar;

        let first = self.expect(TokenKind::Ident, "value name")?;
        let first_name = self.text(first).to_owned();
        let mut bindings = vec![self.ast.alloc_binding(first_name, first.span, mutable)];
        while self.eat(TokenKind::Comma) {
            let name = self.expect(TokenKind::Ident, "value name")?;
            let text = self.text(name).to_owned();
            bindings.push(self.ast.alloc_binding(text, name.span, mutable));
        }

        let type_expr = if self.at(TokenKind::Equals) {
            None
        } else {
            Some(self.parse_type()?)
        };
        self.expect(TokenKind::Equals, "'=' for value initializer")?;
        let init = self.parse_expr()?;
        self.expect_semicolon("after value declaration")?;

        let span = keyword.span.to(self.prev_span());
        Ok(self.ast.alloc_decl(
            DeclKind::Value(ValueDecl {
                bindings,
                type_expr,
                init,
            }),
            span,
        ))
    }

    /// `func name(T a, ...) R { ... }`
    fn parse_func_decl(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked declaration starter");
        let name = self.expect(TokenKind::Ident, "function name")?;
        let name_text = self.text(name).to_owned();
        let binding = self.ast.alloc_binding(name_text, name.span, false);

        let params = self.parse_params()?;
        let return_type = self.parse_type()?;
        let block = self.parse_block()?;

        let span = keyword.span.to(self.prev_span());
        let func = self
            .ast
            .alloc_func(Some(binding), params, return_type, FuncBody::Block(block), span);
        Ok(self.ast.alloc_decl(DeclKind::Func(func), span))
    }

    /// `struct Name { T field, func gen() R { ... }, ... }`
    fn parse_struct_decl(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked declaration starter");
        let name = self.expect(TokenKind::Ident, "struct name")?;
        let name_text = self.text(name).to_owned();
        self.expect(TokenKind::BraceOpen, "'{' to start struct body")?;

        let mut params = Vec::new();
        let mut generators = Vec::new();
        while !self.eat(TokenKind::BraceClose) {
            if self.done() {
                return self.error_at(name.span, "unclosed struct body");
            }
            if self.at(TokenKind::KwFunc) {
                generators.push(self.parse_generator()?);
                // Comma after a generator is optional; the closing brace
                // of its body already delimits it.
                self.eat(TokenKind::Comma);
            } else {
                let field_type = self.parse_type()?;
                let field_name = self.expect(TokenKind::Ident, "field name")?;
                let text = self.text(field_name).to_owned();
                let binding = self.ast.alloc_binding(text, field_name.span, false);
                params.push(Param {
                    type_expr: field_type,
                    binding,
                });
                if !self.at(TokenKind::BraceClose) {
                    self.expect(TokenKind::Comma, "',' to delimit struct members")?;
                }
            }
        }

        let span = keyword.span.to(self.prev_span());
        Ok(self.ast.alloc_decl(
            DeclKind::Struct(StructDecl {
                name: name_text,
                name_span: name.span,
                params,
                generators,
            }),
            span,
        ))
    }

    /// A generator: a `func` member of a struct. It receives the partly
    /// built struct as an implicit `this` and its result becomes the
    /// field named after it.
    fn parse_generator(&mut self) -> Parse<crate::ast::FuncId> {
        let keyword = self.advance().expect("checked 'func'");
        let name = self.expect(TokenKind::Ident, "initializer name")?;
        let name_text = self.text(name).to_owned();
        let binding = self.ast.alloc_binding(name_text, name.span, false);

        let params = self.parse_params()?;
        let return_type = self.parse_type()?;
        let block = self.parse_block()?;

        let span = keyword.span.to(self.prev_span());
        let func = self
            .ast
            .alloc_func(Some(binding), params, return_type, FuncBody::Block(block), span);
        let this_binding = self.ast.alloc_binding("this", name.span, false);
        self.ast.func_mut(func).this_binding = Some(this_binding);
        Ok(func)
    }

    /// `( (Type name),* )`
    pub(crate) fn parse_params(&mut self) -> Parse<Vec<Param>> {
        self.expect(TokenKind::ParenOpen, "'(' to start parameters")?;
        let mut params = Vec::new();
        if self.eat(TokenKind::ParenClose) {
            return Ok(params);
        }
        loop {
            let type_expr = self.parse_type()?;
            let name = self.expect(TokenKind::Ident, "parameter name")?;
            let text = self.text(name).to_owned();
            let binding = self.ast.alloc_binding(text, name.span, false);
            params.push(Param { type_expr, binding });
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::ParenClose, "')' to end parameters")?;
            break;
        }
        Ok(params)
    }

    fn parse_stmt(&mut self) -> Parse<DeclId> {
        match self.current_kind() {
            Some(TokenKind::KwPrint) => self.parse_print_stmt(),
            Some(TokenKind::BraceOpen) => {
                let start = self.current_span();
                let block = self.parse_block()?;
                let span = start.to(self.prev_span());
                Ok(self.ast.alloc_decl(DeclKind::Stmt(Stmt::Block(block)), span))
            }
            Some(TokenKind::KwIf) => self.parse_if_stmt(),
            Some(TokenKind::KwWhile) => self.parse_while_stmt(),
            Some(TokenKind::KwReturn) => self.parse_return_stmt(),
            _ => self.parse_expr_or_set_stmt(),
        }
    }

    /// `print expr?;`
    fn parse_print_stmt(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked statement starter");
        let expr = if self.eat(TokenKind::Semicolon) {
            None
        } else {
            let expr = self.parse_expr()?;
            self.expect_semicolon("after print statement")?;
            Some(expr)
        };
        let span = keyword.span.to(self.prev_span());
        Ok(self.ast.alloc_decl(DeclKind::Stmt(Stmt::Print(expr)), span))
    }

    /// `{ decl* }` - errors inside one declaration synchronize within the
    /// block, so the rest of the block still parses.
    pub(crate) fn parse_block(&mut self) -> Parse<BlockId> {
        let opener = self.expect(TokenKind::BraceOpen, "'{' to start block")?;
        let mut decls = Vec::new();
        loop {
            if self.eat(TokenKind::BraceClose) {
                break;
            }
            if self.done() {
                return self.error_at(opener.span, "unclosed block");
            }
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(_) => self.synchronize(),
            }
        }
        let span = opener.span.to(self.prev_span());
        Ok(self.ast.alloc_block(decls, span))
    }

    /// `if (c) {..} (else if (c) {..})* (else {..})?`
    fn parse_if_stmt(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked statement starter");
        let mut arms = vec![self.parse_if_arm()?];
        let mut else_block = None;
        while self.eat(TokenKind::KwElse) {
            if self.eat(TokenKind::KwIf) {
                arms.push(self.parse_if_arm()?);
            } else {
                else_block = Some(self.parse_block()?);
                break;
            }
        }
        let span = keyword.span.to(self.prev_span());
        Ok(self
            .ast
            .alloc_decl(DeclKind::Stmt(Stmt::If { arms, else_block }), span))
    }

    fn parse_if_arm(&mut self) -> Parse<(crate::ast::ExprId, BlockId)> {
        self.expect(TokenKind::ParenOpen, "'(' to start condition")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::ParenClose, "')' to end condition")?;
        let block = self.parse_block()?;
        Ok((cond, block))
    }

    /// `while ((c))? {..}` - the condition is optional; without one the
    /// loop runs until a return.
    fn parse_while_stmt(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked statement starter");
        let cond = if self.eat(TokenKind::ParenOpen) {
            let cond = self.parse_expr()?;
            self.expect(TokenKind::ParenClose, "')' to end condition")?;
            Some(cond)
        } else {
            None
        };
        let block = self.parse_block()?;
        let span = keyword.span.to(self.prev_span());
        Ok(self
            .ast
            .alloc_decl(DeclKind::Stmt(Stmt::While { cond, block }), span))
    }

    /// `return expr?;`
    fn parse_return_stmt(&mut self) -> Parse<DeclId> {
        let keyword = self.advance().expect("checked statement starter");
        let expr = if self.eat(TokenKind::Semicolon) {
            None
        } else {
            let expr = self.parse_expr()?;
            self.expect_semicolon("after return statement")?;
            Some(expr)
        };
        let span = keyword.span.to(self.prev_span());
        Ok(self
            .ast
            .alloc_decl(DeclKind::Stmt(Stmt::Return(expr)), span))
    }

    /// An expression statement, or a set statement when an `=` follows
    /// the expression.
    fn parse_expr_or_set_stmt(&mut self) -> Parse<DeclId> {
        let start = self.current_span();
        let expr = self.parse_expr()?;
        let stmt = if self.eat(TokenKind::Equals) {
            let value = self.parse_expr()?;
            self.expect_semicolon("after assignment")?;
            Stmt::Set {
                target: expr,
                value,
            }
        } else {
            self.expect_semicolon("after expression statement")?;
            Stmt::Expr(expr)
        };
        let span = start.to(self.prev_span());
        Ok(self.ast.alloc_decl(DeclKind::Stmt(stmt), span))
    }

    /// Type expression: unions of optionally suffixed primaries.
    pub(crate) fn parse_type(&mut self) -> Parse<TypeExprId> {
        let first = self.parse_type_no_union()?;
        if !self.at(TokenKind::Pipe) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.eat(TokenKind::Pipe) {
            members.push(self.parse_type_no_union()?);
        }
        let span = self
            .ast
            .type_expr(members[0])
            .span
            .to(self.ast.type_expr(*members.last().expect("nonempty")).span);
        Ok(self.ast.alloc_type_expr(TypeExprKind::Union(members), span))
    }

    fn parse_type_no_union(&mut self) -> Parse<TypeExprId> {
        let mut result = self.parse_type_primary()?;
        while self.eat(TokenKind::Question) {
            let span = self.ast.type_expr(result).span.to(self.prev_span());
            result = self
                .ast
                .alloc_type_expr(TypeExprKind::Optional(result), span);
        }
        Ok(result)
    }

    fn parse_type_primary(&mut self) -> Parse<TypeExprId> {
        match self.current_kind() {
            Some(TokenKind::ParenOpen) => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(TokenKind::ParenClose, "')' to end type grouping")?;
                Ok(inner)
            }
            Some(TokenKind::KwFunc) => self.parse_func_type(),
            Some(TokenKind::KwVoid) => {
                let token = self.advance().expect("checked");
                Ok(self
                    .ast
                    .alloc_type_expr(TypeExprKind::Atom(Builtin::Void), token.span))
            }
            Some(TokenKind::KwNil) => {
                let token = self.advance().expect("checked");
                Ok(self
                    .ast
                    .alloc_type_expr(TypeExprKind::Atom(Builtin::Nil), token.span))
            }
            Some(TokenKind::Ident) => {
                let token = self.advance().expect("checked");
                let name = self.text(token).to_owned();
                let kind = match Builtin::from_name(&name) {
                    Some(builtin) => TypeExprKind::Atom(builtin),
                    None => TypeExprKind::Named { name, ref_: None },
                };
                Ok(self.ast.alloc_type_expr(kind, token.span))
            }
            _ => self.error("expected type"),
        }
    }

    /// `func(T, ...) R`
    fn parse_func_type(&mut self) -> Parse<TypeExprId> {
        let keyword = self.advance().expect("checked 'func'");
        self.expect(TokenKind::ParenOpen, "'(' to begin parameter types")?;
        let mut params = Vec::new();
        if !self.eat(TokenKind::ParenClose) {
            loop {
                params.push(self.parse_type()?);
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::ParenClose, "')' for parameter types")?;
                break;
            }
        }
        let ret = self.parse_type()?;
        let span = keyword.span.to(self.ast.type_expr(ret).span);
        Ok(self
            .ast
            .alloc_type_expr(TypeExprKind::Func { params, ret }, span))
    }
}
