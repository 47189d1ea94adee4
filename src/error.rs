//! Shared error types used across the toolchain.
//!
//! Front-end failures point at the offending byte with a caret, in the same
//! style as chibicc. Runtime problems inside a running script are not errors
//! at this level: the interpreter reports them on its output channel and keeps
//! going, and the generator writes a comment into the assembly.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  WithLocation {
    expr_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("failed to read program source: {source}"))]
  Io { source: std::io::Error },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  ///
  /// Only the line containing `loc` is echoed so multi-line scripts stay
  /// readable.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = floor_char_boundary(source, loc.min(source.len()));
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |idx| safe_loc + idx);
    let line = &source[line_start..line_end];
    let expr_line = format!("'{line}'");
    let char_offset = source[line_start..safe_loc].chars().count() + 1; // account for opening quote
    let marker = format!("{}^", " ".repeat(char_offset));
    Self::WithLocation {
      expr_line,
      marker,
      message: message.into(),
    }
  }

  /// The bare diagnostic message, without the echoed source line.
  pub fn message(&self) -> String {
    match self {
      Self::WithLocation { message, .. } => message.clone(),
      Self::Io { source } => source.to_string(),
    }
  }
}

fn floor_char_boundary(source: &str, mut idx: usize) -> usize {
  while idx > 0 && !source.is_char_boundary(idx) {
    idx -= 1;
  }
  idx
}

/// Failures reported by the scoped symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum SymbolError {
  #[snafu(display("symbol table full: cannot bind '{name}' (capacity {capacity})"))]
  TableExhausted { name: String, capacity: usize },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn caret_points_at_offending_column() {
    let err = CompileError::at("let x = ;", 8, "expected an expression");
    assert_eq!(
      err.to_string(),
      "'let x = ;'\n         ^ expected an expression"
    );
  }

  #[test]
  fn only_the_failing_line_is_echoed() {
    let source = "let a = 1;\nlet b = @;\n";
    let loc = source.find('@').unwrap_or_default();
    let err = CompileError::at(source, loc, "invalid token: '@'");
    let rendered = err.to_string();
    assert!(rendered.starts_with("'let b = @;'\n"));
    assert!(!rendered.contains("let a"));
    assert_eq!(err.message(), "invalid token: '@'");
  }

  #[test]
  fn table_exhausted_names_the_binding() {
    let err = SymbolError::TableExhausted {
      name: "x".into(),
      capacity: 2,
    };
    assert_eq!(
      err.to_string(),
      "symbol table full: cannot bind 'x' (capacity 2)"
    );
  }
}
