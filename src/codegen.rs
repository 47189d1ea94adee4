//! Code generation: lower the AST into AT&T x86-64 assembly.
//!
//! Every expression leaves its value in `%rax`; binary operators evaluate the
//! right operand first, park it on the stack, then evaluate the left one.
//! Locals live in a per-function frame addressed relative to `%rbp`.
//!
//! The frame layout is static: each distinct name declared anywhere in a
//! function gets exactly one 8-byte slot, the first time it is seen. Two
//! unrelated blocks that both declare `x` share that slot, so there is no real
//! shadowing here, unlike the interpreter's scoped table.
//!
//! Top-level statements are collected into a synthesized `main`. When the
//! program defines its own `main` as well, that function is emitted as
//! `__minijs_user_main` and calls to `main` are redirected to it.

use tracing::{debug, warn};

use crate::ast::{BinaryOp, Expr, ExprList, Function, Item, ParamList, Program, Stmt, UnaryOp};
use crate::output::{Output, emit};

/// Integer argument registers of the System V calling convention, in order.
pub const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

const ENTRY_SYMBOL: &str = "main";
const USER_MAIN_SYMBOL: &str = "__minijs_user_main";
const SLOT_SIZE: i64 = 8;

/// Emit assembly for the whole program.
pub fn generate(program: &Program) -> String {
  let mut codegen = CodeGenerator::new(Output::capture());
  codegen.program(program);
  codegen.into_output().into_string()
}

/// Emit into a pre-sized buffer. Returns the bytes written excluding the NUL
/// terminator, or 0 when there is nothing to do.
pub fn generate_to_buffer(program: Option<&Program>, buf: &mut [u8]) -> usize {
  let Some(program) = program else {
    return 0;
  };
  if buf.is_empty() {
    return 0;
  }
  let mut codegen = CodeGenerator::new(Output::buffer(buf));
  codegen.program(program);
  codegen.into_output().finish()
}

/// A local variable or parameter cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
  pub name: String,
  /// Negative displacement from `%rbp`.
  pub offset: i64,
  pub param_index: Option<usize>,
}

/// Static stack layout of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameLayout {
  slots: Vec<Slot>,
}

impl FrameLayout {
  pub fn for_function(func: &Function) -> Self {
    Self::build(&func.params, func.body.iter())
  }

  /// Parameters take the first slots, then every distinct declared name in
  /// statement order.
  pub fn build<'a>(params: &ParamList, stmts: impl IntoIterator<Item = &'a Stmt>) -> Self {
    let mut layout = Self::default();
    for (idx, name) in params.iter().enumerate() {
      layout.add(name, Some(idx));
    }
    for stmt in stmts {
      layout.collect_locals(stmt);
    }
    layout
  }

  fn add(&mut self, name: &str, param_index: Option<usize>) {
    let offset = -SLOT_SIZE * (self.slots.len() as i64 + 1);
    self.slots.push(Slot {
      name: name.to_string(),
      offset,
      param_index,
    });
  }

  fn collect_locals(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::VarDecl { name, .. } => {
        if self.lookup(name).is_none() {
          self.add(name, None);
        }
      }
      Stmt::If {
        then_branch,
        else_branch,
        ..
      } => {
        self.collect_locals(then_branch);
        if let Some(else_branch) = else_branch {
          self.collect_locals(else_branch);
        }
      }
      Stmt::While { body, .. } => self.collect_locals(body),
      Stmt::For {
        init, step, body, ..
      } => {
        if let Some(init) = init {
          self.collect_locals(init);
        }
        self.collect_locals(body);
        if let Some(step) = step {
          self.collect_locals(step);
        }
      }
      Stmt::Block { stmts } => {
        for inner in stmts {
          self.collect_locals(inner);
        }
      }
      Stmt::Expr { .. } | Stmt::Return { .. } | Stmt::Assign { .. } | Stmt::Print { .. } => {}
    }
  }

  pub fn lookup(&self, name: &str) -> Option<&Slot> {
    self.slots.iter().find(|slot| slot.name == name)
  }

  pub fn slots(&self) -> &[Slot] {
    &self.slots
  }

  /// Bytes reserved below `%rbp`, rounded up to 16.
  pub fn stack_size(&self) -> i64 {
    let raw = SLOT_SIZE * self.slots.len() as i64;
    (raw + 15) & !15
  }
}

/// One generation session: label counters and the output cursor are private
/// to it, so separate sessions never interfere.
pub struct CodeGenerator<'o> {
  out: Output<'o>,
  label_counter: usize,
  string_counter: usize,
  rename_user_main: bool,
  frame: FrameLayout,
  end_label: String,
  // values currently pushed by expression code, for call alignment
  depth: usize,
}

impl<'o> CodeGenerator<'o> {
  pub fn new(out: Output<'o>) -> Self {
    Self {
      out,
      label_counter: 0,
      string_counter: 0,
      rename_user_main: false,
      frame: FrameLayout::default(),
      end_label: String::new(),
      depth: 0,
    }
  }

  pub fn into_output(self) -> Output<'o> {
    self.out
  }

  pub fn program(&mut self, program: &Program) {
    let has_top_level = program.top_level_stmts().next().is_some();
    self.rename_user_main =
      has_top_level && program.functions().any(|func| func.name == ENTRY_SYMBOL);

    self.out.push_str("    .section .rodata\n");
    self.out.push_str("fmt_int:\n");
    self.out.push_str("    .string \"%ld\\n\"\n");
    self.out.push_str("    .text\n");

    for item in program.items() {
      if let Item::Function(func) = item {
        let symbol = self.symbol_for(&func.name).to_string();
        self.function(&symbol, &func.params, func.body.as_slice());
      }
    }

    if has_top_level {
      let stmts: Vec<&Stmt> = program.top_level_stmts().collect();
      self.function(ENTRY_SYMBOL, &ParamList::new(), stmts);
    }

    self.out.push_str("\n    .section .note.GNU-stack,\"\",@progbits\n");
  }

  fn symbol_for<'n>(&self, name: &'n str) -> &'n str {
    if self.rename_user_main && name == ENTRY_SYMBOL {
      USER_MAIN_SYMBOL
    } else {
      name
    }
  }

  fn function<'a>(
    &mut self,
    symbol: &str,
    params: &ParamList,
    body: impl IntoIterator<Item = &'a Stmt> + Clone,
  ) {
    self.frame = FrameLayout::build(params, body.clone());
    self.end_label = format!(".Lend_{symbol}");
    self.depth = 0;
    let stack_size = self.frame.stack_size();
    debug!(
      function = symbol,
      slots = self.frame.slots().len(),
      stack_size,
      "generating function"
    );

    emit!(self.out, "\n    .globl {symbol}\n{symbol}:\n");
    self.out.push_str("    pushq %rbp\n");
    self.out.push_str("    movq %rsp, %rbp\n");
    if stack_size > 0 {
      emit!(self.out, "    subq ${stack_size}, %rsp\n");
    }

    for slot in self.frame.slots() {
      let Some(idx) = slot.param_index else {
        continue;
      };
      match ARG_REGS.get(idx) {
        Some(reg) => emit!(
          self.out,
          "    movq {reg}, {}(%rbp)   # param {}\n",
          slot.offset,
          slot.name
        ),
        None => emit!(
          self.out,
          "    # WARNING: param {} is not passed in a register\n",
          slot.name
        ),
      }
    }

    for stmt in body {
      self.stmt(stmt);
    }

    // falling off the end returns 0
    self.out.push_str("    movq $0, %rax\n");
    emit!(self.out, "{}:\n", self.end_label);
    self.out.push_str("    leave\n");
    self.out.push_str("    ret\n");
  }

  fn new_label(&mut self) -> usize {
    let label = self.label_counter;
    self.label_counter += 1;
    label
  }

  fn new_string_label(&mut self) -> usize {
    let label = self.string_counter;
    self.string_counter += 1;
    label
  }

  fn push(&mut self) {
    self.out.push_str("    pushq %rax\n");
    self.depth += 1;
  }

  fn pop(&mut self, reg: &str) {
    emit!(self.out, "    popq {reg}\n");
    self.depth = self.depth.saturating_sub(1);
  }

  /// `call` with `%rsp` 16-byte aligned.
  fn call(&mut self, target: &str) {
    if self.depth % 2 == 1 {
      self.out.push_str("    subq $8, %rsp\n");
      emit!(self.out, "    call {target}\n");
      self.out.push_str("    addq $8, %rsp\n");
    } else {
      emit!(self.out, "    call {target}\n");
    }
  }

  fn stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::VarDecl { name, init } => {
        emit!(self.out, "    # let {name}\n");
        match init {
          Some(init) => self.expr(init),
          None => self.out.push_str("    movq $0, %rax\n"),
        }
        if let Some(slot) = self.frame.lookup(name) {
          emit!(
            self.out,
            "    movq %rax, {}(%rbp)   # {name} = init\n",
            slot.offset
          );
        }
      }
      Stmt::Assign { name, value } => {
        self.expr(value);
        match self.frame.lookup(name) {
          Some(slot) => emit!(
            self.out,
            "    movq %rax, {}(%rbp)   # {name} = rax\n",
            slot.offset
          ),
          None => {
            warn!(variable = %name, "assignment to unknown variable");
            emit!(
              self.out,
              "    # ERROR: Unknown variable in assign: {name}\n"
            );
          }
        }
      }
      Stmt::Expr { expr } => self.expr(expr),
      Stmt::Return { value } => {
        match value {
          Some(value) => self.expr(value),
          None => self.out.push_str("    movq $0, %rax\n"),
        }
        emit!(self.out, "    jmp {}\n", self.end_label);
      }
      Stmt::Print { expr } => self.print(expr),
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let lbl_else = self.new_label();
        let lbl_end = self.new_label();

        self.expr(cond);
        self.out.push_str("    cmpq $0, %rax\n");
        match else_branch {
          Some(else_branch) => {
            emit!(self.out, "    je .Lelse_{lbl_else}\n");
            self.stmt(then_branch);
            emit!(self.out, "    jmp .Lend_{lbl_end}\n");
            emit!(self.out, ".Lelse_{lbl_else}:\n");
            self.stmt(else_branch);
          }
          None => {
            emit!(self.out, "    je .Lend_{lbl_end}\n");
            self.stmt(then_branch);
          }
        }
        emit!(self.out, ".Lend_{lbl_end}:\n");
      }
      Stmt::While { cond, body } => {
        let lbl_begin = self.new_label();
        let lbl_end = self.new_label();

        emit!(self.out, ".Lbegin_{lbl_begin}:\n");
        self.expr(cond);
        self.out.push_str("    cmpq $0, %rax\n");
        emit!(self.out, "    je .Lend_{lbl_end}\n");
        self.stmt(body);
        emit!(self.out, "    jmp .Lbegin_{lbl_begin}\n");
        emit!(self.out, ".Lend_{lbl_end}:\n");
      }
      Stmt::For {
        init,
        cond,
        step,
        body,
      } => {
        let lbl_begin = self.new_label();
        let lbl_end = self.new_label();

        if let Some(init) = init {
          self.stmt(init);
        }
        emit!(self.out, ".Lbegin_{lbl_begin}:\n");
        // an absent condition loops until a return jumps out
        if let Some(cond) = cond {
          self.expr(cond);
          self.out.push_str("    cmpq $0, %rax\n");
          emit!(self.out, "    je .Lend_{lbl_end}\n");
        }
        self.stmt(body);
        if let Some(step) = step {
          self.stmt(step);
        }
        emit!(self.out, "    jmp .Lbegin_{lbl_begin}\n");
        emit!(self.out, ".Lend_{lbl_end}:\n");
      }
      Stmt::Block { stmts } => {
        for inner in stmts {
          self.stmt(inner);
        }
      }
    }
  }

  fn print(&mut self, expr: &Expr) {
    if let Expr::Str { text } = expr {
      let label = self.new_string_label();
      self.out.push_str("    .section .rodata\n");
      emit!(self.out, ".Lstr_{label}:\n");
      emit!(self.out, "    .string \"{}\"\n", escape_string(text));
      self.out.push_str("    .text\n");
      emit!(self.out, "    leaq .Lstr_{label}(%rip), %rdi\n");
      self.call("puts");
    } else {
      self.expr(expr);
      self.out.push_str("    movq %rax, %rsi\n");
      self.out.push_str("    leaq fmt_int(%rip), %rdi\n");
      self.out.push_str("    movq $0, %rax\n");
      self.call("printf");
    }
  }

  fn expr(&mut self, expr: &Expr) {
    match expr {
      Expr::Int { value } => {
        if i32::try_from(*value).is_ok() {
          emit!(self.out, "    movq ${value}, %rax\n");
        } else {
          emit!(self.out, "    movabsq ${value}, %rax\n");
        }
      }
      Expr::Str { .. } => self.out.push_str("    movq $0, %rax    # string (handled in print)\n"),
      Expr::Var { name } => match self.frame.lookup(name) {
        Some(slot) => emit!(
          self.out,
          "    movq {}(%rbp), %rax    # load {name}\n",
          slot.offset
        ),
        None => {
          warn!(variable = %name, "reference to unknown variable");
          emit!(self.out, "    # ERROR: Unknown variable: {name}\n");
          self.out.push_str("    movq $0, %rax\n");
        }
      },
      Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
      Expr::Call { name, args } => self.call_expr(name, args),
      Expr::Unary { op, operand } => {
        self.expr(operand);
        match op {
          UnaryOp::Neg => self.out.push_str("    negq %rax           # negate\n"),
          UnaryOp::Not => {
            self.out.push_str("    testq %rax, %rax\n");
            self.out.push_str("    sete %al\n");
            self.out.push_str("    movzbq %al, %rax   # logical not\n");
          }
        }
      }
    }
  }

  fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) {
    // right operand first so the left one can be computed straight into %rax
    self.expr(rhs);
    self.push();
    self.expr(lhs);
    self.pop("%rcx");

    match op {
      BinaryOp::Add => self.out.push_str("    addq %rcx, %rax    # add\n"),
      BinaryOp::Sub => self.out.push_str("    subq %rcx, %rax    # sub\n"),
      BinaryOp::Mul => self.out.push_str("    imulq %rcx, %rax   # mul\n"),
      BinaryOp::Div => {
        self.out.push_str("    cqto\n");
        self.out.push_str("    idivq %rcx          # div\n");
      }
      BinaryOp::Mod => {
        self.out.push_str("    cqto\n");
        self.out.push_str("    idivq %rcx\n");
        self.out.push_str("    movq %rdx, %rax    # mod (remainder)\n");
      }
      BinaryOp::Lt => self.compare("setl", "less than"),
      BinaryOp::Gt => self.compare("setg", "greater than"),
      BinaryOp::Le => self.compare("setle", "less or equal"),
      BinaryOp::Ge => self.compare("setge", "greater or equal"),
      BinaryOp::Eq => self.compare("sete", "equal"),
      BinaryOp::Ne => self.compare("setne", "not equal"),
      BinaryOp::And => {
        self.out.push_str("    testq %rax, %rax\n");
        self.out.push_str("    setne %al\n");
        self.out.push_str("    testq %rcx, %rcx\n");
        self.out.push_str("    setne %cl\n");
        self.out.push_str("    andb %cl, %al\n");
        self.out.push_str("    movzbq %al, %rax   # logical and\n");
      }
      BinaryOp::Or => {
        self.out.push_str("    orq %rcx, %rax\n");
        self.out.push_str("    testq %rax, %rax\n");
        self.out.push_str("    setne %al\n");
        self.out.push_str("    movzbq %al, %rax   # logical or\n");
      }
    }
  }

  fn compare(&mut self, set: &str, note: &str) {
    self.out.push_str("    cmpq %rcx, %rax\n");
    emit!(self.out, "    {set} %al\n");
    emit!(self.out, "    movzbq %al, %rax   # {note}\n");
  }

  fn call_expr(&mut self, name: &str, args: &ExprList) {
    for arg in args {
      self.expr(arg);
      self.push();
    }

    let argc = args.len();
    if argc > ARG_REGS.len() {
      warn!(function = %name, argc, "call passes more arguments than registers");
      self
        .out
        .push_str("    # WARNING: More than 6 arguments not fully supported\n");
    }

    // last pushed is on top, so pop in reverse to land arg 0 in %rdi
    for idx in (0..argc).rev() {
      match ARG_REGS.get(idx) {
        Some(reg) => self.pop(reg),
        None => {
          self.out.push_str("    popq %rax    # extra arg discarded\n");
          self.depth = self.depth.saturating_sub(1);
        }
      }
    }

    let target = self.symbol_for(name).to_string();
    self.call(&target);
  }
}

/// Escape a string for a `.string` directive.
fn escape_string(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '\n' => escaped.push_str("\\n"),
      '\t' => escaped.push_str("\\t"),
      '\r' => escaped.push_str("\\r"),
      '\\' => escaped.push_str("\\\\"),
      '"' => escaped.push_str("\\\""),
      _ => escaped.push(ch),
    }
  }
  escaped
}
