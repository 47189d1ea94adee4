//! String-in, string-out entry points for embedding the toolchain.
//!
//! Each call parses its own program and builds fresh generator and
//! interpreter sessions, so calls are independent of each other.

use tracing::debug;

use crate::ast::{self, Program};
use crate::codegen;
use crate::interpreter;
use crate::parser::parse_source;

pub const VERSION: &str = "Mini-JS Compiler v1.0.0";

/// Full report: AST dump, assembly, then the interpreter's output and result.
pub fn compile_and_run(source: &str) -> String {
  if source.is_empty() {
    return "Error: Empty input\n".to_string();
  }
  let Some(program) = parse_logged(source) else {
    return "=== Parse Error ===\nFailed to parse the input code.\n".to_string();
  };

  let mut report = String::from("=== AST ===\n");
  report.push_str(&ast::dump(Some(&program)));

  report.push_str("\n=== x86-64 Assembly ===\n");
  report.push_str(&codegen::generate(&program));

  report.push_str("\n=== Execution Result ===\n");
  let evaluation = interpreter::evaluate(Some(&program));
  report.push_str(&evaluation.output);
  report.push_str(&format!("\nReturn Value: {}\n", evaluation.value));
  report
}

/// Assembly only. Failures come back as assembler comments.
pub fn compile_to_asm(source: &str) -> String {
  if source.is_empty() {
    return "; Error: Empty input\n".to_string();
  }
  match parse_logged(source) {
    Some(program) => codegen::generate(&program),
    None => "; Parse Error\n".to_string(),
  }
}

/// Interpreter output followed by the return value.
pub fn execute(source: &str) -> String {
  if source.is_empty() {
    return "Error: Empty input\n".to_string();
  }
  let Some(program) = parse_logged(source) else {
    return "Parse Error\n".to_string();
  };
  let evaluation = interpreter::evaluate(Some(&program));
  format!("{}Return: {}\n", evaluation.output, evaluation.value)
}

pub fn version() -> &'static str {
  VERSION
}

fn parse_logged(source: &str) -> Option<Program> {
  match parse_source(source) {
    Ok(program) => Some(program),
    Err(err) => {
      debug!(%err, "parse failed");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ADD_PROGRAM: &str =
    "function add(a, b) { return a + b; }\nlet s = add(2, 3);\nconsole.log(s);\nreturn s;\n";

  #[test]
  fn empty_input_messages() {
    assert_eq!(compile_and_run(""), "Error: Empty input\n");
    assert_eq!(compile_to_asm(""), "; Error: Empty input\n");
    assert_eq!(execute(""), "Error: Empty input\n");
  }

  #[test]
  fn parse_error_messages() {
    let broken = "let = ;";
    assert_eq!(
      compile_and_run(broken),
      "=== Parse Error ===\nFailed to parse the input code.\n"
    );
    assert_eq!(compile_to_asm(broken), "; Parse Error\n");
    assert_eq!(execute(broken), "Parse Error\n");
  }

  #[test]
  fn execute_reports_output_and_return() {
    assert_eq!(execute(ADD_PROGRAM), "5\nReturn: 5\n");
  }

  #[test]
  fn compile_and_run_has_every_section_in_order() {
    let report = compile_and_run(ADD_PROGRAM);
    let ast_at = report.find("=== AST ===\nProgram\n").unwrap();
    let asm_at = report.find("\n=== x86-64 Assembly ===\n").unwrap();
    let run_at = report.find("\n=== Execution Result ===\n5\n").unwrap();
    assert!(ast_at < asm_at && asm_at < run_at);
    assert!(report.contains("    .globl add\n"));
    assert!(report.ends_with("\nReturn Value: 5\n"));
  }

  #[test]
  fn compile_to_asm_matches_generator() {
    let program = parse_source(ADD_PROGRAM).unwrap();
    assert_eq!(compile_to_asm(ADD_PROGRAM), codegen::generate(&program));
  }

  #[test]
  fn calls_do_not_share_state() {
    let first = execute("let x = 1; print(x);");
    let second = execute("print(x);");
    assert_eq!(first, "1\nReturn: 0\n");
    assert_eq!(second, "Error: undefined variable 'x'\n0\nReturn: 0\n");
  }

  #[test]
  fn version_string() {
    assert_eq!(version(), "Mini-JS Compiler v1.0.0");
  }
}
