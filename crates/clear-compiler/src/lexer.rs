//! Lexer for Clear source.
//!
//! Produces span-based tokens without storing text - text is sliced from
//! source only when needed.
//!
//! ## Error handling
//!
//! Consecutive unrecognized characters are coalesced into a single
//! diagnostic rather than one per character, and unterminated strings are
//! reported where they start. Neither produces a token: the parser only
//! ever sees well-formed lexemes.

use logos::Logos;

use crate::diagnostics::{Diagnostics, Span};

/// Token kinds of the Clear surface syntax.
#[derive(Logos, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    #[regex(r"[0-9]+i")]
    IntLit,
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    NumLit,
    #[regex(r#""[^"\n]*""#)]
    StrLit,
    #[regex(r#""[^"\n]*"#)]
    UnterminatedStr,

    #[token("val")]
    KwVal,
    #[token("var")]
    KwVar,
    #[token("func")]
    KwFunc,
    #[token("struct")]
    KwStruct,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("return")]
    KwReturn,
    #[token("print")]
    KwPrint,
    #[token("or")]
    KwOr,
    #[token("and")]
    KwAnd,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("nil")]
    KwNil,
    #[token("this")]
    KwThis,
    #[token("void")]
    KwVoid,

    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("?")]
    Question,
    #[token("|")]
    Pipe,
    #[token(".")]
    Dot,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("!")]
    Bang,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    BangEqual,
}

impl TokenKind {
    /// Human-readable name used in "expected X" parse diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Ident => "identifier",
            Self::IntLit => "integer literal",
            Self::NumLit => "number literal",
            Self::StrLit => "string literal",
            Self::UnterminatedStr => "unterminated string",
            Self::KwVal => "'val'",
            Self::KwVar => "'var'",
            Self::KwFunc => "'func'",
            Self::KwStruct => "'struct'",
            Self::KwIf => "'if'",
            Self::KwElse => "'else'",
            Self::KwWhile => "'while'",
            Self::KwReturn => "'return'",
            Self::KwPrint => "'print'",
            Self::KwOr => "'or'",
            Self::KwAnd => "'and'",
            Self::KwTrue => "'true'",
            Self::KwFalse => "'false'",
            Self::KwNil => "'nil'",
            Self::KwThis => "'this'",
            Self::KwVoid => "'void'",
            Self::Equals => "'='",
            Self::Comma => "','",
            Self::Semicolon => "';'",
            Self::Colon => "':'",
            Self::BraceOpen => "'{'",
            Self::BraceClose => "'}'",
            Self::ParenOpen => "'('",
            Self::ParenClose => "')'",
            Self::Question => "'?'",
            Self::Pipe => "'|'",
            Self::Dot => "'.'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Bang => "'!'",
            Self::Less => "'<'",
            Self::Greater => "'>'",
            Self::LessEqual => "'<='",
            Self::GreaterEqual => "'>='",
            Self::EqualEqual => "'=='",
            Self::BangEqual => "'!='",
        }
    }
}

/// Zero-copy token: kind + span, text retrieved via [`token_text`] when
/// needed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[inline]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Tokenizes source into a vector of span-based tokens, reporting lex
/// errors into `diagnostics`.
pub fn lex(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let mut error_start: Option<usize> = None;

    let mut flush_errors = |start: &mut Option<usize>, end: usize, diags: &mut Diagnostics| {
        if let Some(begin) = start.take() {
            diags
                .error("unrecognized character(s)", Span::from(begin..end))
                .emit();
        }
    };

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                flush_errors(&mut error_start, lexer.span().start, diagnostics);
                let span = Span::from(lexer.span());
                if kind == TokenKind::UnterminatedStr {
                    diagnostics.error("unterminated string", span).emit();
                } else {
                    tokens.push(Token::new(kind, span));
                }
            }
            Some(Err(())) => {
                if error_start.is_none() {
                    error_start = Some(lexer.span().start);
                }
            }
            None => {
                flush_errors(&mut error_start, source.len(), diagnostics);
                break;
            }
        }
    }

    tokens
}

/// Retrieves the text slice for a token. O(1) slice into source.
#[inline]
pub fn token_text<'s>(source: &'s str, token: &Token) -> &'s str {
    token.span.text(source)
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod lexer_tests;
