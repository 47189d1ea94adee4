//! Tree-walking interpreter.
//!
//! Values are 64-bit integers. String literals only mean something as the
//! direct operand of a print statement; anywhere else they evaluate to 0.
//!
//! Semantic errors never abort a run: an undefined variable or function, or a
//! division by zero, writes a diagnostic to the same output channel as `print`
//! and evaluates to 0.
//!
//! All mutable state (symbol table, function registry, output cursor) lives in
//! the [`Interpreter`] value, so independent runs never observe each other.

use tracing::{debug, error};

use crate::ast::{BinaryOp, Expr, ExprList, Function, Item, Program, Stmt, UnaryOp};
use crate::output::{Output, emit};
use crate::symtab::SymbolTable;

/// Arguments past this count are neither evaluated nor bound.
pub const MAX_CALL_ARGS: usize = 16;

/// Functions registered so far, in definition order.
///
/// Registration happens when execution reaches a function item, so a call
/// placed before the definition in source order fails as undefined.
#[derive(Debug, Default)]
pub struct FunctionRegistry<'p> {
  functions: Vec<&'p Function>,
}

impl<'p> FunctionRegistry<'p> {
  pub fn register(&mut self, func: &'p Function) {
    self.functions.push(func);
  }

  /// First registered function with this name.
  pub fn lookup(&self, name: &str) -> Option<&'p Function> {
    self.functions.iter().copied().find(|func| func.name == name)
  }

  pub fn len(&self) -> usize {
    self.functions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.functions.is_empty()
  }

  pub fn clear(&mut self) {
    self.functions.clear();
  }
}

/// Result of running a program to completion with captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
  pub value: i64,
  pub output: String,
}

/// Run `program` with a fresh interpreter and capture everything it prints.
pub fn evaluate(program: Option<&Program>) -> Evaluation {
  let mut interp = Interpreter::new(Output::capture());
  let value = interp.eval_program(program);
  Evaluation {
    value,
    output: interp.into_output().into_string(),
  }
}

enum Flow {
  Normal,
  Return(i64),
}

pub struct Interpreter<'p, 'o> {
  symbols: SymbolTable,
  functions: FunctionRegistry<'p>,
  out: Output<'o>,
}

impl<'p, 'o> Interpreter<'p, 'o> {
  pub fn new(out: Output<'o>) -> Self {
    Self::with_symbols(out, SymbolTable::new())
  }

  pub fn with_symbols(out: Output<'o>, symbols: SymbolTable) -> Self {
    Self {
      symbols,
      functions: FunctionRegistry::default(),
      out,
    }
  }

  pub fn symbols(&self) -> &SymbolTable {
    &self.symbols
  }

  pub fn output(&self) -> &Output<'o> {
    &self.out
  }

  pub fn into_output(self) -> Output<'o> {
    self.out
  }

  /// Execute items in source order. Returns the value of the first top-level
  /// `return`, 0 when none runs, or -1 when there is no program at all.
  pub fn eval_program(&mut self, program: Option<&'p Program>) -> i64 {
    let Some(program) = program else {
      self.out.push_str("Error: No program to execute\n");
      return -1;
    };

    self.functions.clear();
    self.symbols.clear();
    debug!(items = program.items().len(), "evaluating program");

    let mut result = 0;
    for item in program.items() {
      match item {
        Item::Function(func) => {
          debug!(name = %func.name, params = func.params.len(), "registering function");
          self.functions.register(func);
        }
        Item::Stmt(stmt) => {
          if let Flow::Return(value) = self.exec_stmt(stmt) {
            result = value;
            break;
          }
        }
      }
    }

    self.functions.clear();
    result
  }

  fn exec_stmt(&mut self, stmt: &Stmt) -> Flow {
    match stmt {
      Stmt::VarDecl { name, init } => {
        let value = init.as_ref().map_or(0, |init| self.eval_expr(init));
        if let Err(err) = self.symbols.declare(name, value) {
          error!(%err, "declaration dropped");
        }
        Flow::Normal
      }
      Stmt::Assign { name, value } => {
        let value = self.eval_expr(value);
        if let Err(err) = self.symbols.set(name, value) {
          error!(%err, "assignment dropped");
        }
        Flow::Normal
      }
      Stmt::Expr { expr } => {
        self.eval_expr(expr);
        Flow::Normal
      }
      Stmt::Return { value } => {
        let value = value.as_ref().map_or(0, |value| self.eval_expr(value));
        Flow::Return(value)
      }
      Stmt::Print { expr } => {
        if let Expr::Str { text } = expr {
          emit!(self.out, "{text}\n");
        } else {
          let value = self.eval_expr(expr);
          emit!(self.out, "{value}\n");
        }
        Flow::Normal
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        if self.eval_expr(cond) != 0 {
          self.exec_stmt(then_branch)
        } else if let Some(else_branch) = else_branch {
          self.exec_stmt(else_branch)
        } else {
          Flow::Normal
        }
      }
      Stmt::While { cond, body } => {
        while self.eval_expr(cond) != 0 {
          if let Flow::Return(value) = self.exec_stmt(body) {
            return Flow::Return(value);
          }
        }
        Flow::Normal
      }
      Stmt::For {
        init,
        cond,
        step,
        body,
      } => {
        // one scope spans init, every iteration and the step
        self.symbols.push_scope();
        let flow = self.run_for(init.as_deref(), cond.as_ref(), step.as_deref(), body);
        self.symbols.pop_scope();
        flow
      }
      Stmt::Block { stmts } => {
        self.symbols.push_scope();
        let mut flow = Flow::Normal;
        for inner in stmts {
          flow = self.exec_stmt(inner);
          if matches!(flow, Flow::Return(_)) {
            break;
          }
        }
        self.symbols.pop_scope();
        flow
      }
    }
  }

  fn run_for(
    &mut self,
    init: Option<&Stmt>,
    cond: Option<&Expr>,
    step: Option<&Stmt>,
    body: &Stmt,
  ) -> Flow {
    if let Some(init) = init {
      self.exec_stmt(init);
    }
    loop {
      if let Some(cond) = cond
        && self.eval_expr(cond) == 0
      {
        return Flow::Normal;
      }
      if let Flow::Return(value) = self.exec_stmt(body) {
        return Flow::Return(value);
      }
      if let Some(step) = step {
        self.exec_stmt(step);
      }
    }
  }

  fn eval_expr(&mut self, expr: &Expr) -> i64 {
    match expr {
      Expr::Int { value } => *value,
      Expr::Str { .. } => 0,
      Expr::Var { name } => match self.symbols.get(name) {
        Some(value) => value,
        None => {
          emit!(self.out, "Error: undefined variable '{name}'\n");
          0
        }
      },
      Expr::Binary { op, lhs, rhs } => {
        // both operands, left first, before the operator applies
        let lhs = self.eval_expr(lhs);
        let rhs = self.eval_expr(rhs);
        self.apply_binary(*op, lhs, rhs)
      }
      Expr::Call { name, args } => self.eval_call(name, args),
      Expr::Unary { op, operand } => {
        let value = self.eval_expr(operand);
        match op {
          UnaryOp::Neg => value.wrapping_neg(),
          UnaryOp::Not => i64::from(value == 0),
        }
      }
    }
  }

  fn apply_binary(&mut self, op: BinaryOp, lhs: i64, rhs: i64) -> i64 {
    match op {
      BinaryOp::Add => lhs.wrapping_add(rhs),
      BinaryOp::Sub => lhs.wrapping_sub(rhs),
      BinaryOp::Mul => lhs.wrapping_mul(rhs),
      BinaryOp::Div => {
        if rhs == 0 {
          self.out.push_str("Error: division by zero\n");
          return 0;
        }
        lhs.wrapping_div(rhs)
      }
      BinaryOp::Mod => {
        if rhs == 0 {
          self.out.push_str("Error: modulo by zero\n");
          return 0;
        }
        lhs.wrapping_rem(rhs)
      }
      BinaryOp::Lt => i64::from(lhs < rhs),
      BinaryOp::Gt => i64::from(lhs > rhs),
      BinaryOp::Le => i64::from(lhs <= rhs),
      BinaryOp::Ge => i64::from(lhs >= rhs),
      BinaryOp::Eq => i64::from(lhs == rhs),
      BinaryOp::Ne => i64::from(lhs != rhs),
      BinaryOp::And => i64::from(lhs != 0 && rhs != 0),
      BinaryOp::Or => i64::from(lhs != 0 || rhs != 0),
    }
  }

  fn eval_call(&mut self, name: &str, args: &ExprList) -> i64 {
    let Some(func) = self.functions.lookup(name) else {
      emit!(self.out, "Error: undefined function '{name}'\n");
      return 0;
    };

    // arguments see the caller's scope, never the callee's
    let values: Vec<i64> = args
      .iter()
      .take(MAX_CALL_ARGS)
      .map(|arg| self.eval_expr(arg))
      .collect();

    self.symbols.push_scope();
    for (param, value) in func.params.iter().zip(&values) {
      if let Err(err) = self.symbols.declare(param, *value) {
        error!(%err, function = name, "parameter left unbound");
      }
    }

    let mut result = 0;
    for stmt in &func.body {
      if let Flow::Return(value) = self.exec_stmt(stmt) {
        result = value;
        break;
      }
    }

    self.symbols.pop_scope();
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{ParamList, StmtList};

  fn body(stmts: Vec<Stmt>) -> StmtList {
    stmts.into_iter().collect()
  }

  #[test]
  fn int_literal_evaluates_to_itself() {
    for value in [0, 1, -1, 123_456_789, i64::MIN, i64::MAX] {
      let mut program = Program::new();
      program.add_stmt(Stmt::ret(Some(Expr::int(value))));
      assert_eq!(evaluate(Some(&program)).value, value);
    }
  }

  #[test]
  fn missing_program_is_a_sentinel() {
    let eval = evaluate(None);
    assert_eq!(eval.value, -1);
    assert_eq!(eval.output, "Error: No program to execute\n");
  }

  #[test]
  fn string_outside_print_is_zero() {
    let mut program = Program::new();
    program.add_stmt(Stmt::print(Expr::binary(BinaryOp::Add, Expr::string("abc"), Expr::int(4))));
    program.add_stmt(Stmt::print(Expr::string("abc")));
    assert_eq!(evaluate(Some(&program)).output, "4\nabc\n");
  }

  #[test]
  fn first_registered_definition_wins() {
    let mut program = Program::new();
    program.add_function(Function::new(
      "f",
      ParamList::new(),
      body(vec![Stmt::ret(Some(Expr::int(1)))]),
    ));
    program.add_function(Function::new(
      "f",
      ParamList::new(),
      body(vec![Stmt::ret(Some(Expr::int(2)))]),
    ));
    program.add_stmt(Stmt::ret(Some(Expr::call("f", ExprList::new()))));
    assert_eq!(evaluate(Some(&program)).value, 1);
  }

  #[test]
  fn arguments_past_the_cap_are_not_evaluated() {
    let params: ParamList = (0..=MAX_CALL_ARGS).map(|idx| format!("p{idx}")).collect();
    let last = format!("p{MAX_CALL_ARGS}");

    let mut program = Program::new();
    program.add_function(Function::new(
      "noisy",
      ParamList::new(),
      body(vec![
        Stmt::print(Expr::string("noisy called")),
        Stmt::ret(Some(Expr::int(99))),
      ]),
    ));
    program.add_function(Function::new(
      "wide",
      params,
      body(vec![
        Stmt::print(Expr::var("p15")),
        Stmt::print(Expr::var(last.as_str())),
      ]),
    ));

    let mut args: ExprList = (0..MAX_CALL_ARGS as i64).map(Expr::int).collect();
    args.push(Expr::call("noisy", ExprList::new()));
    program.add_stmt(Stmt::expr(Expr::call("wide", args)));

    let eval = evaluate(Some(&program));
    assert_eq!(
      eval.output,
      format!("15\nError: undefined variable '{last}'\n0\n")
    );
  }

  #[test]
  fn exhausted_table_leaves_binding_unset_and_continues() {
    let mut program = Program::new();
    program.add_stmt(Stmt::var_decl("a", Some(Expr::int(1))));
    program.add_stmt(Stmt::var_decl("b", Some(Expr::int(2))));
    program.add_stmt(Stmt::print(Expr::var("b")));
    program.add_stmt(Stmt::print(Expr::var("a")));

    let mut interp = Interpreter::with_symbols(Output::capture(), SymbolTable::with_capacity(1));
    let value = interp.eval_program(Some(&program));
    assert_eq!(value, 0);
    assert_eq!(
      interp.into_output().into_string(),
      "Error: undefined variable 'b'\n0\n1\n"
    );
  }

  #[test]
  fn reused_interpreter_starts_clean() {
    let mut first = Program::new();
    first.add_function(Function::new(
      "f",
      ParamList::new(),
      body(vec![Stmt::ret(Some(Expr::int(3)))]),
    ));
    first.add_stmt(Stmt::var_decl("leftover", Some(Expr::int(1))));

    let mut second = Program::new();
    second.add_stmt(Stmt::print(Expr::var("leftover")));
    second.add_stmt(Stmt::print(Expr::call("f", ExprList::new())));

    let mut interp = Interpreter::new(Output::capture());
    interp.eval_program(Some(&first));
    interp.eval_program(Some(&second));
    assert_eq!(
      interp.into_output().into_string(),
      "Error: undefined variable 'leftover'\n0\nError: undefined function 'f'\n0\n"
    );
  }

  #[test]
  fn wrapping_arithmetic_does_not_trap() {
    let mut program = Program::new();
    program.add_stmt(Stmt::print(Expr::binary(BinaryOp::Add, Expr::int(i64::MAX), Expr::int(1))));
    program.add_stmt(Stmt::print(Expr::binary(BinaryOp::Div, Expr::int(i64::MIN), Expr::int(-1))));
    assert_eq!(
      evaluate(Some(&program)).output,
      format!("{}\n{}\n", i64::MIN, i64::MIN)
    );
  }

  #[test]
  fn bounded_output_truncates_and_terminates() {
    let mut program = Program::new();
    program.add_stmt(Stmt::print(Expr::int(12345)));
    program.add_stmt(Stmt::print(Expr::string("overflow")));
    program.add_stmt(Stmt::ret(Some(Expr::int(4))));

    let mut buf = [0xffu8; 8];
    let mut interp = Interpreter::new(Output::buffer(&mut buf));
    let value = interp.eval_program(Some(&program));
    let written = interp.into_output().finish();

    // execution runs to completion even once the buffer is full
    assert_eq!(value, 4);
    assert_eq!(written, 7);
    assert_eq!(&buf, b"12345\no\0");
  }
}
