//! Clear compiler: parser, analyzer, and bytecode generator.
//!
//! The pipeline is strictly phased; each phase annotates the same tree in
//! place and later phases assume the earlier annotations are present:
//! - `lexer` - token stream
//! - `parser` - parse tree construction with per-declaration recovery
//! - `analyze` - name resolution, sequencing, type checking, control
//!   flow, slot indexing and upvalue capture
//! - `codegen` - opcode emission with stack-depth bookkeeping
//! - `diagnostics` - error collection and rendering
//!
//! # Example
//!
//! ```
//! use clear_compiler::Compiler;
//!
//! let bytecode = Compiler::new().compile("print \"hi\";").expect("valid program");
//! assert!(!bytecode.is_empty());
//! ```

pub mod analyze;
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod types;

use clear_bytecode::AssembleError;

pub use diagnostics::{DiagnosticMessage, Diagnostics, DiagnosticsPrinter, Severity, Span};

#[cfg(test)]
mod compiler_tests;
#[cfg(test)]
pub mod test_utils;

/// Errors that stop a compilation outright.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The program has errors; no bytecode was produced.
    #[error("compilation failed with {} error(s)", .0.error_count())]
    Invalid(Diagnostics),

    /// The emitter produced code the byte format cannot express. This
    /// points at the compiler, not at user source.
    #[error("bytecode assembly failed: {0}")]
    Assemble(#[from] AssembleError),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of running the whole pipeline: bytecode when no errors
/// occurred, plus every diagnostic collected along the way (warnings
/// included), sorted in source order.
#[derive(Debug)]
pub struct Compilation {
    pub bytecode: Option<Vec<u8>>,
    pub diagnostics: Diagnostics,
}

/// The compiler: configuration plus the phase pipeline.
///
/// There is no global state; debug tracing and the diagnostic sink live
/// on the instance.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    debug: bool,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit per-phase traces to standard output while compiling.
    pub fn debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    /// Compiles Clear source to a bytecode program, treating any
    /// diagnostic error as failure.
    pub fn compile(&self, source: &str) -> Result<Vec<u8>> {
        let compilation = self.compile_program(source)?;
        match compilation.bytecode {
            Some(bytecode) => Ok(bytecode),
            None => Err(Error::Invalid(compilation.diagnostics)),
        }
    }

    /// Runs the pipeline, collecting diagnostics from every phase.
    ///
    /// Parse errors gate the semantic phases (their annotations would be
    /// incomplete); resolution and type errors do not stop their own
    /// traversals, so one compile reports as much as possible. Code is
    /// only generated for error-free trees.
    pub fn compile_program(&self, source: &str) -> Result<Compilation> {
        let mut diagnostics = Diagnostics::new();

        let tokens = lexer::lex(source, &mut diagnostics);
        self.trace(|| format!("lex: {} tokens", tokens.len()));

        let parsed = parser::parse(source, tokens);
        let mut ast = parsed.ast;
        diagnostics.extend(parsed.diagnostics);
        self.trace(|| format!("parse: {} top-level declarations", ast.items.len()));
        if diagnostics.has_errors() {
            return Ok(self.finish(None, diagnostics));
        }

        analyze::resolve::run(&mut ast, &mut diagnostics);
        self.trace(|| format!("resolve: {} bindings", ast.bindings.len()));

        analyze::sequence::run(&mut ast, &mut diagnostics);
        self.trace(|| {
            let order: Vec<String> = ast.sequence.iter().map(|d| d.0.to_string()).collect();
            format!("sequence: [{}]", order.join(", "))
        });

        analyze::type_check::run(&mut ast, &mut diagnostics);
        self.trace(|| "type check: done".to_owned());

        analyze::flow::run(&mut ast, &mut diagnostics);
        self.trace(|| "control flow: done".to_owned());

        if diagnostics.has_errors() {
            return Ok(self.finish(None, diagnostics));
        }

        analyze::index::run(&mut ast);
        self.trace(|| "index: done".to_owned());

        let (constants, code) = codegen::generate(&ast);
        self.trace(|| clear_bytecode::dump(&constants, &code));

        let bytecode = clear_bytecode::assemble(&constants, &code)?;
        self.trace(|| format!("assemble: {} bytes", bytecode.len()));
        Ok(self.finish(Some(bytecode), diagnostics))
    }

    fn finish(&self, bytecode: Option<Vec<u8>>, mut diagnostics: Diagnostics) -> Compilation {
        diagnostics.sort_by_span();
        Compilation {
            bytecode,
            diagnostics,
        }
    }

    fn trace(&self, message: impl FnOnce() -> String) {
        if self.debug {
            println!("[clearc] {}", message());
        }
    }
}
