//! Pratt expression parsing.
//!
//! A table maps each token kind to `(prefix, infix, precedence)`. The
//! driver consumes an initial prefix rule, then applies infix rules while
//! the current token's precedence stays at or above the minimum. Infix
//! rules re-invoke the driver at `precedence.next()`, so repeated binary
//! operators group from the left.

use crate::ast::{BinaryOp, ExprId, ExprKind, FuncBody, UnaryOp};
use crate::lexer::TokenKind;

use super::core::{Abort, Parse, Parser};

/// Infix binding strength, lowest to highest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    pub fn next(self) -> Precedence {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call => Self::Primary,
            Self::Primary => Self::Primary,
        }
    }
}

type PrefixFn = fn(&mut Parser<'_>) -> Parse<ExprId>;
type InfixFn = fn(&mut Parser<'_>, ExprId) -> Parse<ExprId>;

struct ParseRule {
    prefix: Option<PrefixFn>,
    infix: Option<InfixFn>,
    precedence: Precedence,
}

const fn rule(
    prefix: Option<PrefixFn>,
    infix: Option<InfixFn>,
    precedence: Precedence,
) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

/// The Pratt table.
fn get_rule(kind: TokenKind) -> ParseRule {
    match kind {
        TokenKind::IntLit => rule(Some(int_literal), None, Precedence::None),
        TokenKind::NumLit => rule(Some(num_literal), None, Precedence::None),
        TokenKind::StrLit => rule(Some(str_literal), None, Precedence::None),
        TokenKind::KwTrue | TokenKind::KwFalse => rule(Some(bool_literal), None, Precedence::None),
        TokenKind::KwNil => rule(Some(nil_literal), None, Precedence::None),
        TokenKind::Ident => rule(Some(ident), None, Precedence::None),
        TokenKind::KwThis => rule(Some(this_ident), None, Precedence::None),
        TokenKind::KwFunc => rule(Some(lambda), None, Precedence::None),
        TokenKind::Minus => rule(Some(unary), Some(binary), Precedence::Term),
        TokenKind::Bang => rule(Some(unary), None, Precedence::None),
        TokenKind::Plus => rule(None, Some(binary), Precedence::Term),
        TokenKind::Star | TokenKind::Slash => rule(None, Some(binary), Precedence::Factor),
        TokenKind::EqualEqual | TokenKind::BangEqual => {
            rule(None, Some(binary), Precedence::Equality)
        }
        TokenKind::Less | TokenKind::Greater | TokenKind::LessEqual | TokenKind::GreaterEqual => {
            rule(None, Some(binary), Precedence::Comparison)
        }
        TokenKind::KwAnd => rule(None, Some(binary), Precedence::And),
        TokenKind::KwOr => rule(None, Some(binary), Precedence::Or),
        TokenKind::ParenOpen => rule(Some(grouping), Some(call), Precedence::Call),
        TokenKind::Dot => rule(None, Some(access), Precedence::Call),
        TokenKind::BraceOpen => rule(None, Some(construct), Precedence::Call),
        TokenKind::Question => rule(None, Some(case), Precedence::Call),
        _ => rule(None, None, Precedence::None),
    }
}

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Parse<ExprId> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub(crate) fn parse_precedence(&mut self, min: Precedence) -> Parse<ExprId> {
        let Some(token) = self.current() else {
            return self.error("expected expression");
        };
        let Some(prefix) = get_rule(token.kind).prefix else {
            return self.error(format!(
                "expected expression, found {}",
                token.kind.describe()
            ));
        };
        let mut expr = prefix(self)?;

        while let Some(token) = self.current() {
            let rule = get_rule(token.kind);
            if rule.precedence < min {
                break;
            }
            let Some(infix) = rule.infix else {
                break;
            };
            expr = infix(self, expr)?;
        }
        Ok(expr)
    }
}

fn int_literal(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    let text = p.text(token);
    let digits = text.strip_suffix('i').unwrap_or(text);
    let value = match digits.parse::<i32>() {
        Ok(value) => value,
        Err(_) => {
            p.diagnostics
                .error("integer literal out of range", token.span)
                .emit();
            0
        }
    };
    Ok(p.ast.alloc_expr(ExprKind::Int(value), token.span))
}

fn num_literal(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    let value = match p.text(token).parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            p.diagnostics
                .error("number literal is not a number", token.span)
                .emit();
            0.0
        }
    };
    Ok(p.ast.alloc_expr(ExprKind::Num(value), token.span))
}

/// Adjacent string literals concatenate, joined by a single `"` so the
/// author has a way to embed a quote.
fn str_literal(p: &mut Parser<'_>) -> Parse<ExprId> {
    let first = p.advance().expect("prefix rule has a current token");
    let unquote = |text: &str| text[1..text.len() - 1].to_owned();
    let mut parts = vec![unquote(p.text(first))];
    while p.eat(TokenKind::StrLit) {
        let token = p.prev();
        parts.push(unquote(p.text(token)));
    }
    let span = first.span.to(p.prev_span());
    Ok(p.ast.alloc_expr(ExprKind::Str(parts.join("\"")), span))
}

fn bool_literal(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    let value = token.kind == TokenKind::KwTrue;
    Ok(p.ast.alloc_expr(ExprKind::Bool(value), token.span))
}

fn nil_literal(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    Ok(p.ast.alloc_expr(ExprKind::Nil, token.span))
}

fn ident(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    let name = p.text(token).to_owned();
    Ok(p.ast.alloc_expr(
        ExprKind::Ident {
            name,
            ref_: None,
            index: Default::default(),
        },
        token.span,
    ))
}

fn this_ident(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    Ok(p.ast.alloc_expr(
        ExprKind::Ident {
            name: "this".to_owned(),
            ref_: None,
            index: Default::default(),
        },
        token.span,
    ))
}

fn unary(p: &mut Parser<'_>) -> Parse<ExprId> {
    let token = p.advance().expect("prefix rule has a current token");
    let op = match token.kind {
        TokenKind::Minus => UnaryOp::Neg,
        _ => UnaryOp::Not,
    };
    let operand = p.parse_precedence(Precedence::Unary)?;
    let span = token.span.to(p.ast.expr(operand).span);
    Ok(p.ast.alloc_expr(
        ExprKind::Unary {
            op,
            operand,
            opcodes: Vec::new(),
        },
        span,
    ))
}

/// `(expr)` grouping, or `(a, b, ...)` tuple.
fn grouping(p: &mut Parser<'_>) -> Parse<ExprId> {
    let open = p.advance().expect("prefix rule has a current token");
    let first = p.parse_expr()?;
    if !p.eat(TokenKind::Comma) {
        p.expect(TokenKind::ParenClose, "')' after expression")?;
        return Ok(first);
    }
    let mut elements = vec![first];
    loop {
        elements.push(p.parse_expr()?);
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::ParenClose, "')' after tuple elements")?;
    let span = open.span.to(p.prev_span());
    Ok(p.ast.alloc_expr(ExprKind::Tuple(elements), span))
}

/// `func(T a, ...) R expr` - a closure whose body is one expression.
fn lambda(p: &mut Parser<'_>) -> Parse<ExprId> {
    let kw = p.advance().expect("prefix rule has a current token");
    let params = p.parse_params()?;
    let return_type = p.parse_type()?;
    let body = p.parse_expr()?;
    let span = kw.span.to(p.ast.expr(body).span);
    let func = p
        .ast
        .alloc_func(None, params, return_type, FuncBody::Expr(body), span);
    Ok(p.ast.alloc_expr(ExprKind::Lambda(func), span))
}

fn binary(p: &mut Parser<'_>, lhs: ExprId) -> Parse<ExprId> {
    let token = p.advance().expect("infix rule has a current token");
    let op = match token.kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::EqualEqual => BinaryOp::Equal,
        TokenKind::BangEqual => BinaryOp::NotEqual,
        TokenKind::KwAnd => BinaryOp::And,
        TokenKind::KwOr => BinaryOp::Or,
        _ => return Err(Abort),
    };
    let precedence = get_rule(token.kind).precedence;
    let rhs = p.parse_precedence(precedence.next())?;
    let span = p.ast.expr(lhs).span.to(p.ast.expr(rhs).span);
    Ok(p.ast.alloc_expr(
        ExprKind::Binary {
            op,
            lhs,
            rhs,
            opcodes: Vec::new(),
        },
        span,
    ))
}

fn call(p: &mut Parser<'_>, callee: ExprId) -> Parse<ExprId> {
    p.advance();
    let mut args = Vec::new();
    if !p.eat(TokenKind::ParenClose) {
        loop {
            args.push(p.parse_expr()?);
            if p.eat(TokenKind::Comma) {
                continue;
            }
            p.expect(TokenKind::ParenClose, "')' after arguments")?;
            break;
        }
    }
    let span = p.ast.expr(callee).span.to(p.prev_span());
    Ok(p.ast.alloc_expr(ExprKind::Call { callee, args }, span))
}

fn access(p: &mut Parser<'_>, target: ExprId) -> Parse<ExprId> {
    p.advance();
    let field_token = p.expect(TokenKind::Ident, "field name after '.'")?;
    let field = p.text(field_token).to_owned();
    let span = p.ast.expr(target).span.to(field_token.span);
    Ok(p.ast.alloc_expr(
        ExprKind::Access {
            target,
            field,
            field_span: field_token.span,
        },
        span,
    ))
}

/// `Name { field = expr, ... }` - the left operand must be a bare struct
/// name.
fn construct(p: &mut Parser<'_>, left: ExprId) -> Parse<ExprId> {
    let (name, name_span) = match &p.ast.expr(left).kind {
        ExprKind::Ident { name, .. } => (name.clone(), p.ast.expr(left).span),
        _ => {
            let span = p.ast.expr(left).span;
            return p.error_at(span, "constructor requires a struct name");
        }
    };
    p.advance();
    let mut inits = Vec::new();
    while !p.eat(TokenKind::BraceClose) {
        if p.done() {
            return p.error_at(name_span, "unclosed constructor");
        }
        let label = p.expect(TokenKind::Ident, "field name")?;
        p.expect(TokenKind::Equals, "'=' for field value")?;
        let value = p.parse_expr()?;
        inits.push(crate::ast::FieldInit {
            name: p.text(label).to_owned(),
            span: label.span,
            value,
        });
        if !p.at(TokenKind::BraceClose) {
            p.expect(TokenKind::Comma, "',' to delimit fields")?;
        }
    }
    let span = name_span.to(p.prev_span());
    Ok(p.ast.alloc_expr(
        ExprKind::Construct {
            name,
            name_span,
            ref_: None,
            inits,
            index: Default::default(),
        },
        span,
    ))
}

/// `ident ? T1 v1, T2 v2 : fallback` - dispatch on the runtime type of
/// the named value. Each arm rebinds the name to the matched value.
fn case(p: &mut Parser<'_>, target: ExprId) -> Parse<ExprId> {
    let binding = match &p.ast.expr(target).kind {
        ExprKind::Ident { name, .. } => {
            let name = name.clone();
            let span = p.ast.expr(target).span;
            p.ast.alloc_binding(name, span, false)
        }
        _ => {
            let span = p.ast.expr(target).span;
            return p.error_at(span, "case dispatch requires a named value");
        }
    };
    p.advance();
    let mut arms = Vec::new();
    loop {
        let arm_type = p.parse_type()?;
        let value = p.parse_expr()?;
        arms.push((arm_type, value));
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::Colon, "':' before case fallback")?;
    let fallback = p.parse_expr()?;
    let span = p.ast.expr(target).span.to(p.ast.expr(fallback).span);
    Ok(p.ast.alloc_expr(
        ExprKind::Case {
            target,
            binding,
            arms,
            fallback,
        },
        span,
    ))
}
