//! Abstract syntax tree shared by the interpreter and the code generator.
//!
//! The tree has exactly one owner per node: expressions and statements are
//! boxed into their parent, lists own their elements, and the [`Program`] owns
//! its items. Dropping a `Program` tears the whole tree down bottom-up.
//!
//! The dumper at the bottom of this file renders the indented text form that
//! external tooling displays verbatim, so its tags and indentation must not
//! drift.

use std::fmt;
use std::slice;

use crate::output::{Output, emit};

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Lt,
  Gt,
  Le,
  Ge,
  Eq,
  Ne,
  And,
  Or,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Mod => "%",
      Self::Lt => "<",
      Self::Gt => ">",
      Self::Le => "<=",
      Self::Ge => ">=",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::And => "&&",
      Self::Or => "||",
    }
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
}

impl UnaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Neg => "-",
      Self::Not => "!",
    }
  }
}

impl fmt::Display for UnaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// Ordered, append-only list of AST nodes.
///
/// Appends are amortised O(1) and preserve insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeList<T> {
  items: Vec<T>,
}

pub type StmtList = NodeList<Stmt>;
pub type ExprList = NodeList<Expr>;
pub type ParamList = NodeList<String>;

impl<T> NodeList<T> {
  pub fn new() -> Self {
    Self { items: Vec::new() }
  }

  /// Append to a possibly absent list, returning the list that now ends
  /// with `item`.
  pub fn append(list: Option<Self>, item: T) -> Self {
    let mut list = list.unwrap_or_default();
    list.push(item);
    list
  }

  pub fn push(&mut self, item: T) {
    self.items.push(item);
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn first(&self) -> Option<&T> {
    self.items.first()
  }

  pub fn last(&self) -> Option<&T> {
    self.items.last()
  }

  pub fn iter(&self) -> slice::Iter<'_, T> {
    self.items.iter()
  }

  pub fn as_slice(&self) -> &[T] {
    &self.items
  }
}

impl<T> Default for NodeList<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> FromIterator<T> for NodeList<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self {
      items: iter.into_iter().collect(),
    }
  }
}

impl<'a, T> IntoIterator for &'a NodeList<T> {
  type Item = &'a T;
  type IntoIter = slice::Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

impl<T> IntoIterator for NodeList<T> {
  type Item = T;
  type IntoIter = std::vec::IntoIter<T>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.into_iter()
  }
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  Int {
    value: i64,
  },
  /// Only meaningful as the direct operand of a print statement.
  Str {
    text: String,
  },
  Var {
    name: String,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Call {
    name: String,
    args: ExprList,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
}

impl Expr {
  pub fn int(value: i64) -> Self {
    Self::Int { value }
  }

  pub fn string(text: impl Into<String>) -> Self {
    Self::Str { text: text.into() }
  }

  pub fn var(name: impl Into<String>) -> Self {
    Self::Var { name: name.into() }
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn call(name: impl Into<String>, args: ExprList) -> Self {
    Self::Call {
      name: name.into(),
      args,
    }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }
}

/// Statement tree. Sequences live in a [`StmtList`] owned by the enclosing
/// block, function body or loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Expr {
    expr: Expr,
  },
  Return {
    value: Option<Expr>,
  },
  VarDecl {
    name: String,
    init: Option<Expr>,
  },
  Assign {
    name: String,
    value: Expr,
  },
  Print {
    expr: Expr,
  },
  If {
    cond: Expr,
    then_branch: Box<Stmt>,
    else_branch: Option<Box<Stmt>>,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
  },
  For {
    init: Option<Box<Stmt>>,
    cond: Option<Expr>,
    step: Option<Box<Stmt>>,
    body: Box<Stmt>,
  },
  Block {
    stmts: StmtList,
  },
}

impl Stmt {
  pub fn expr(expr: Expr) -> Self {
    Self::Expr { expr }
  }

  pub fn ret(value: Option<Expr>) -> Self {
    Self::Return { value }
  }

  pub fn var_decl(name: impl Into<String>, init: Option<Expr>) -> Self {
    Self::VarDecl {
      name: name.into(),
      init,
    }
  }

  pub fn assign(name: impl Into<String>, value: Expr) -> Self {
    Self::Assign {
      name: name.into(),
      value,
    }
  }

  pub fn print(expr: Expr) -> Self {
    Self::Print { expr }
  }

  pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
    Self::If {
      cond,
      then_branch: Box::new(then_branch),
      else_branch: else_branch.map(Box::new),
    }
  }

  pub fn while_loop(cond: Expr, body: Stmt) -> Self {
    Self::While {
      cond,
      body: Box::new(body),
    }
  }

  pub fn for_loop(init: Option<Stmt>, cond: Option<Expr>, step: Option<Stmt>, body: Stmt) -> Self {
    Self::For {
      init: init.map(Box::new),
      cond,
      step: step.map(Box::new),
      body: Box::new(body),
    }
  }

  pub fn block(stmts: StmtList) -> Self {
    Self::Block { stmts }
  }
}

/// A named function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
  pub name: String,
  pub params: ParamList,
  pub body: StmtList,
}

impl Function {
  pub fn new(name: impl Into<String>, params: ParamList, body: StmtList) -> Self {
    Self {
      name: name.into(),
      params,
      body,
    }
  }
}

/// Top-level program element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
  Function(Function),
  Stmt(Stmt),
}

/// Script-style program: items run in source order, functions are not
/// hoisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
  items: Vec<Item>,
}

impl Program {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_function(&mut self, func: Function) {
    self.items.push(Item::Function(func));
  }

  pub fn add_stmt(&mut self, stmt: Stmt) {
    self.items.push(Item::Stmt(stmt));
  }

  pub fn items(&self) -> &[Item] {
    &self.items
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn functions(&self) -> impl Iterator<Item = &Function> {
    self.items.iter().filter_map(|item| match item {
      Item::Function(func) => Some(func),
      Item::Stmt(_) => None,
    })
  }

  pub fn top_level_stmts(&self) -> impl Iterator<Item = &Stmt> {
    self.items.iter().filter_map(|item| match item {
      Item::Stmt(stmt) => Some(stmt),
      Item::Function(_) => None,
    })
  }
}

impl FromIterator<Item> for Program {
  fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
    Self {
      items: iter.into_iter().collect(),
    }
  }
}

impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&dump(Some(self)))
  }
}

/// Render the indented AST text form into a fresh string.
pub fn dump(program: Option<&Program>) -> String {
  let mut out = Output::capture();
  dump_to(program, &mut out);
  out.into_string()
}

/// Render into a pre-sized buffer, truncating as needed. Returns the number of
/// bytes written, excluding the NUL terminator.
pub fn dump_to_buffer(program: Option<&Program>, buf: &mut [u8]) -> usize {
  if buf.is_empty() {
    return 0;
  }
  let mut out = Output::buffer(buf);
  dump_to(program, &mut out);
  out.finish()
}

/// Render into any output target.
pub fn dump_to(program: Option<&Program>, out: &mut Output<'_>) {
  let mut printer = AstPrinter { out };
  match program {
    Some(program) if !program.is_empty() => printer.program(program),
    _ => printer.out.push_str("(No program)\n"),
  }
}

struct AstPrinter<'p, 'a> {
  out: &'p mut Output<'a>,
}

impl AstPrinter<'_, '_> {
  fn indent(&mut self, depth: usize) {
    for _ in 0..depth {
      self.out.push_str("  ");
    }
  }

  fn label(&mut self, depth: usize, label: &str) {
    self.indent(depth);
    self.out.push_str(label);
    self.out.push_str("\n");
  }

  fn program(&mut self, program: &Program) {
    self.out.push_str("Program\n");
    for item in program.items() {
      match item {
        Item::Function(func) => self.function(func, 1),
        Item::Stmt(stmt) => {
          self.label(1, "TopLevel Statement:");
          self.stmt(stmt, 2);
        }
      }
    }
  }

  fn function(&mut self, func: &Function, depth: usize) {
    self.indent(depth);
    let params: Vec<&str> = func.params.iter().map(String::as_str).collect();
    emit!(self.out, "Function: {}({})\n", func.name, params.join(", "));
    for stmt in &func.body {
      self.stmt(stmt, depth + 1);
    }
  }

  fn stmt(&mut self, stmt: &Stmt, depth: usize) {
    self.indent(depth);
    match stmt {
      Stmt::Expr { expr } => {
        self.out.push_str("EXPR_STMT\n");
        self.expr(expr, depth + 1);
      }
      Stmt::Return { value } => {
        self.out.push_str("RETURN\n");
        if let Some(value) = value {
          self.expr(value, depth + 1);
        }
      }
      Stmt::VarDecl { name, init } => {
        emit!(self.out, "VARDECL: {name}\n");
        if let Some(init) = init {
          self.expr(init, depth + 1);
        }
      }
      Stmt::Assign { name, value } => {
        emit!(self.out, "ASSIGN: {name}\n");
        self.expr(value, depth + 1);
      }
      Stmt::Print { expr } => {
        self.out.push_str("PRINT\n");
        self.expr(expr, depth + 1);
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.out.push_str("IF\n");
        self.label(depth + 1, "COND:");
        self.expr(cond, depth + 2);
        self.label(depth + 1, "THEN:");
        self.stmt(then_branch, depth + 2);
        if let Some(else_branch) = else_branch {
          self.label(depth + 1, "ELSE:");
          self.stmt(else_branch, depth + 2);
        }
      }
      Stmt::While { cond, body } => {
        self.out.push_str("WHILE\n");
        self.label(depth + 1, "COND:");
        self.expr(cond, depth + 2);
        self.label(depth + 1, "BODY:");
        self.stmt(body, depth + 2);
      }
      Stmt::For {
        init,
        cond,
        step,
        body,
      } => {
        self.out.push_str("FOR\n");
        if let Some(init) = init {
          self.label(depth + 1, "INIT:");
          self.stmt(init, depth + 2);
        }
        if let Some(cond) = cond {
          self.label(depth + 1, "COND:");
          self.expr(cond, depth + 2);
        }
        if let Some(step) = step {
          self.label(depth + 1, "STEP:");
          self.stmt(step, depth + 2);
        }
        self.label(depth + 1, "BODY:");
        self.stmt(body, depth + 2);
      }
      Stmt::Block { stmts } => {
        self.out.push_str("BLOCK\n");
        for inner in stmts {
          self.stmt(inner, depth + 1);
        }
      }
    }
  }

  fn expr(&mut self, expr: &Expr, depth: usize) {
    self.indent(depth);
    match expr {
      Expr::Int { value } => emit!(self.out, "INT: {value}\n"),
      Expr::Str { text } => emit!(self.out, "STRING: \"{text}\"\n"),
      Expr::Var { name } => emit!(self.out, "VAR: {name}\n"),
      Expr::Binary { op, lhs, rhs } => {
        emit!(self.out, "BINOP: {op}\n");
        self.expr(lhs, depth + 1);
        self.expr(rhs, depth + 1);
      }
      Expr::Call { name, args } => {
        emit!(self.out, "CALL: {name}\n");
        for arg in args {
          self.expr(arg, depth + 1);
        }
      }
      Expr::Unary { op, operand } => {
        emit!(self.out, "UNARY: {op}\n");
        self.expr(operand, depth + 1);
      }
    }
  }
}
