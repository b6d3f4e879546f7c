//! Parser state machine and low-level operations.

use crate::ast::Ast;
use crate::diagnostics::{Diagnostics, Span};
use crate::lexer::{Token, TokenKind, token_text};

/// Marker for an abandoned declaration. The diagnostic has already been
/// emitted when this is returned; the caller synchronizes and continues.
#[derive(Debug)]
pub(crate) struct Abort;

pub(crate) type Parse<T> = Result<T, Abort>;

/// Token kinds that can begin a declaration, used as synchronization
/// points after a parse error.
const DECL_START: &[TokenKind] = &[
    TokenKind::KwVal,
    TokenKind::KwVar,
    TokenKind::KwFunc,
    TokenKind::KwStruct,
    TokenKind::KwPrint,
    TokenKind::KwIf,
    TokenKind::KwWhile,
    TokenKind::KwReturn,
    TokenKind::BraceOpen,
];

pub(crate) struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) ast: Ast,
    pub(crate) diagnostics: Diagnostics,
}

impl<'s> Parser<'s> {
    pub(crate) fn new(source: &'s str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            ast: Ast::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub(crate) fn finish(self) -> (Ast, Diagnostics) {
        (self.ast, self.diagnostics)
    }

    pub(crate) fn done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn current(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    pub(crate) fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    pub(crate) fn advance(&mut self) -> Option<Token> {
        let token = self.current()?;
        self.pos += 1;
        Some(token)
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn prev(&self) -> Token {
        self.tokens[self.pos - 1]
    }

    pub(crate) fn prev_span(&self) -> Span {
        self.prev().span
    }

    /// Span of the current token, or an empty span at end of input.
    pub(crate) fn current_span(&self) -> Span {
        self.current().map_or_else(
            || {
                let end = self.source.len() as u32;
                Span::new(end, end)
            },
            |t| t.span,
        )
    }

    pub(crate) fn text(&self, token: Token) -> &'s str {
        token_text(self.source, &token)
    }

    /// Emit a parse error at the current token and abandon the
    /// declaration.
    pub(crate) fn error<T>(&mut self, message: impl Into<String>) -> Parse<T> {
        let span = self.current_span();
        self.diagnostics.error(message, span).emit();
        Err(Abort)
    }

    pub(crate) fn error_at<T>(&mut self, span: Span, message: impl Into<String>) -> Parse<T> {
        self.diagnostics.error(message, span).emit();
        Err(Abort)
    }

    /// On mismatch: emit "missing X" without consuming, and abandon the
    /// declaration.
    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Parse<Token> {
        if self.eat(kind) {
            return Ok(self.prev());
        }
        match self.current() {
            Some(token) => {
                let found = token.kind.describe();
                self.error(format!("missing {what}, found {found}"))
            }
            None => self.error(format!("missing {what}")),
        }
    }

    /// A missing `;` gets a suggested fix: insert one right after the
    /// previous token.
    pub(crate) fn expect_semicolon(&mut self, what: &str) -> Parse<()> {
        if self.eat(TokenKind::Semicolon) {
            return Ok(());
        }
        let end = if self.pos > 0 {
            self.prev_span().end
        } else {
            self.current_span().start
        };
        let span = Span::new(end, end);
        self.diagnostics
            .error(format!("missing ';' {what}"), span)
            .fix("add a ';'", ";")
            .emit();
        Err(Abort)
    }

    pub(crate) fn at_decl_start(&self) -> bool {
        self.current_kind()
            .is_some_and(|kind| DECL_START.contains(&kind))
    }

    /// Skips ahead to the next declaration boundary: a declaration
    /// starter, a closing brace, or just past a semicolon.
    pub(crate) fn synchronize(&mut self) {
        while !self.done() {
            if self.at_decl_start() || self.at(TokenKind::BraceClose) {
                return;
            }
            let token = self.advance();
            if token.is_some_and(|t| t.kind == TokenKind::Semicolon) {
                return;
            }
        }
    }
}
