//! Crate root: wires together the Mini-JS toolchain.
//!
//! The stages are small and composable:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns a [`Program`].
//! - `ast` defines the tree and its indented text dump.
//! - `symtab` is the scoped variable store behind the interpreter.
//! - `interpreter` walks the tree and prints as it goes.
//! - `codegen` lowers the tree into x86-64 AT&T assembly.
//! - `driver` packages whole-pipeline runs behind string entry points.
//! - `output` is the shared sink for everything the back-ends print.
//! - `error` centralises the diagnostic types shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod parser;
pub mod symtab;
pub mod tokenizer;

pub use ast::Program;
pub use error::{CompileError, CompileResult, SymbolError};
pub use interpreter::Evaluation;
pub use output::Output;
pub use parser::parse_source;

/// Compile a source string into AT&T assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let program = parser::parse_source(source)?;
  Ok(codegen::generate(&program))
}

/// Parse and run a source string, capturing everything it prints.
pub fn evaluate(source: &str) -> CompileResult<Evaluation> {
  let program = parser::parse_source(source)?;
  Ok(interpreter::evaluate(Some(&program)))
}

/// Parse a source string and render its tree dump.
pub fn dump_ast(source: &str) -> CompileResult<String> {
  let program = parser::parse_source(source)?;
  Ok(ast::dump(Some(&program)))
}
