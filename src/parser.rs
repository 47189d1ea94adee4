//! Recursive-descent parser producing a [`Program`].
//!
//! A precedence-climbing set of expression helpers sits under a thin
//! statement layer. A program is a flat sequence of items, each either a
//! function definition or a free statement, kept in source order.

use std::io::Read;

use snafu::ResultExt;

use crate::ast::{BinaryOp, Expr, ExprList, Function, ParamList, Program, Stmt, StmtList, UnaryOp};
use crate::error::{CompileError, CompileResult, IoSnafu};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text, tokenize};

/// Tokenize and parse an in-memory script.
pub fn parse_source(source: &str) -> CompileResult<Program> {
  let tokens = tokenize(source)?;
  parse(tokens, source)
}

/// Read a whole script from a stream and parse it.
pub fn parse_reader(mut reader: impl Read) -> CompileResult<Program> {
  let mut source = String::new();
  reader.read_to_string(&mut source).context(IoSnafu)?;
  parse_source(&source)
}

/// Parse a token stream into a program.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);
  let mut program = Program::new();

  while !stream.is_eof() {
    if stream.equal_keyword("function") {
      program.add_function(parse_function(&mut stream)?);
    } else {
      program.add_stmt(parse_stmt(&mut stream)?);
    }
  }

  Ok(program)
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Function> {
  let (name, _) = stream.get_ident()?;
  stream.skip("(")?;

  let mut params = ParamList::new();
  if !stream.equal(")") {
    loop {
      let (param, _) = stream.get_ident()?;
      params.push(param);
      if stream.equal(")") {
        break;
      }
      stream.skip(",")?;
    }
  }

  stream.skip("{")?;
  let body = parse_stmt_list(stream)?;
  Ok(Function::new(name, params, body))
}

/// Statements up to and including the closing brace.
fn parse_stmt_list(stream: &mut TokenStream) -> CompileResult<StmtList> {
  let mut stmts = StmtList::new();
  while !stream.equal("}") {
    if stream.is_eof() {
      return Err(stream.error_here("expected \"}\", but reached end of input"));
    }
    stmts.push(parse_stmt(stream)?);
  }
  Ok(stmts)
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.equal("{") {
    return Ok(Stmt::block(parse_stmt_list(stream)?));
  }

  if stream.is_decl_keyword() {
    let decl = parse_decl(stream)?;
    stream.skip(";")?;
    return Ok(decl);
  }

  if stream.equal_keyword("return") {
    if stream.equal(";") {
      return Ok(Stmt::ret(None));
    }
    let value = parse_expr(stream)?;
    stream.skip(";")?;
    return Ok(Stmt::ret(Some(value)));
  }

  if stream.equal_keyword("if") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let then_branch = parse_stmt(stream)?;
    let else_branch = if stream.equal_keyword("else") {
      Some(parse_stmt(stream)?)
    } else {
      None
    };
    return Ok(Stmt::if_else(cond, then_branch, else_branch));
  }

  if stream.equal_keyword("while") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let body = parse_stmt(stream)?;
    return Ok(Stmt::while_loop(cond, body));
  }

  if stream.equal_keyword("for") {
    return parse_for(stream);
  }

  if stream.at_print() {
    return parse_print(stream);
  }

  let stmt = parse_simple(stream)?;
  stream.skip(";")?;
  Ok(stmt)
}

/// `let|var|const NAME (= expr)?` without the terminator.
fn parse_decl(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.pos += 1;
  let (name, _) = stream.get_ident()?;
  let init = if stream.equal("=") {
    Some(parse_expr(stream)?)
  } else {
    None
  };
  Ok(Stmt::var_decl(name, init))
}

/// Assignment or bare expression, without the terminator.
fn parse_simple(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.peek_kind(0) == Some(TokenKind::Ident) && stream.peek_is(1, "=") {
    let (name, _) = stream.get_ident()?;
    stream.skip("=")?;
    let value = parse_expr(stream)?;
    return Ok(Stmt::assign(name, value));
  }
  Ok(Stmt::expr(parse_expr(stream)?))
}

fn parse_for(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip("(")?;

  let init = if stream.equal(";") {
    None
  } else {
    let init = if stream.is_decl_keyword() {
      parse_decl(stream)?
    } else {
      parse_simple(stream)?
    };
    stream.skip(";")?;
    Some(init)
  };

  let cond = if stream.equal(";") {
    None
  } else {
    let cond = parse_expr(stream)?;
    stream.skip(";")?;
    Some(cond)
  };

  let step = if stream.equal(")") {
    None
  } else {
    let step = parse_simple(stream)?;
    stream.skip(")")?;
    Some(step)
  };

  let body = parse_stmt(stream)?;
  Ok(Stmt::for_loop(init, cond, step, body))
}

/// `console.log(expr);` or `print(expr);`
fn parse_print(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let (name, _) = stream.get_ident()?;
  if name == "console" {
    stream.skip(".")?;
    let (method, loc) = stream.get_ident()?;
    if method != "log" {
      return Err(CompileError::at(
        stream.source,
        loc,
        format!("unsupported console method \"{method}\""),
      ));
    }
  }
  stream.skip("(")?;
  let expr = parse_expr(stream)?;
  stream.skip(")")?;
  stream.skip(";")?;
  Ok(Stmt::print(expr))
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_or(stream)
}

fn parse_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_and(stream)?;
  while stream.equal("||") {
    let rhs = parse_and(stream)?;
    node = Expr::binary(BinaryOp::Or, node, rhs);
  }
  Ok(node)
}

fn parse_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_equality(stream)?;
  while stream.equal("&&") {
    let rhs = parse_equality(stream)?;
    node = Expr::binary(BinaryOp::And, node, rhs);
  }
  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_relational(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("==") => BinaryOp::Eq,
      Some("!=") => BinaryOp::Ne,
      _ => break,
    };
    stream.pos += 1;
    let rhs = parse_relational(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_add(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("<") => BinaryOp::Lt,
      Some("<=") => BinaryOp::Le,
      Some(">") => BinaryOp::Gt,
      Some(">=") => BinaryOp::Ge,
      _ => break,
    };
    stream.pos += 1;
    let rhs = parse_add(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_mul(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("+") => BinaryOp::Add,
      Some("-") => BinaryOp::Sub,
      _ => break,
    };
    stream.pos += 1;
    let rhs = parse_mul(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("*") => BinaryOp::Mul,
      Some("/") => BinaryOp::Div,
      Some("%") => BinaryOp::Mod,
      _ => break,
    };
    stream.pos += 1;
    let rhs = parse_unary(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.equal("+") {
    return parse_unary(stream);
  }

  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::unary(UnaryOp::Neg, operand));
  }

  if stream.equal("!") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::unary(UnaryOp::Not, operand));
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  match stream.peek_kind(0) {
    Some(TokenKind::Ident) => {
      let (name, _) = stream.get_ident()?;
      if stream.equal("(") {
        let args = parse_args(stream)?;
        return Ok(Expr::call(name, args));
      }
      Ok(Expr::var(name))
    }
    Some(TokenKind::Str) => Ok(Expr::string(stream.get_string()?)),
    Some(TokenKind::Num) => {
      let (value, _) = stream.get_number()?;
      Ok(Expr::int(value))
    }
    _ => {
      let got = describe_token(stream.peek(), stream.source);
      Err(stream.error_here(format!("expected an expression, but got \"{got}\"")))
    }
  }
}

/// Call arguments after the opening parenthesis, through the closing one.
fn parse_args(stream: &mut TokenStream) -> CompileResult<ExprList> {
  let mut args = ExprList::new();
  if stream.equal(")") {
    return Ok(args);
  }
  loop {
    args.push(parse_expr(stream)?);
    if stream.equal(")") {
      return Ok(args);
    }
    stream.skip(",")?;
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_kind(&self, ahead: usize) -> Option<TokenKind> {
    self.tokens.get(self.pos + ahead).map(|token| token.kind)
  }

  fn peek_is(&self, ahead: usize, op: &str) -> bool {
    self.tokens.get(self.pos + ahead).is_some_and(|token| {
      token.kind == TokenKind::Punctuator && token_text(token, self.source) == op
    })
  }

  fn peek_punctuator(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))
  }

  fn is_decl_keyword(&self) -> bool {
    self.peek().is_some_and(|token| {
      token.kind == TokenKind::Keyword
        && matches!(token_text(token, self.source), "let" | "var" | "const")
    })
  }

  /// `console.log(` or `print(` at the cursor.
  fn at_print(&self) -> bool {
    let Some(token) = self.peek() else {
      return false;
    };
    if token.kind != TokenKind::Ident {
      return false;
    }
    match token_text(token, self.source) {
      "console" => self.peek_is(1, "."),
      "print" => self.peek_is(1, "("),
      _ => false,
    }
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it is the given keyword.
  fn equal_keyword(&mut self, keyword: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Keyword
      && token_text(token, self.source) == keyword
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = describe_token(self.peek(), self.source);
      Err(self.error_here(format!("expected \"{s}\", but got \"{got}\"")))
    }
  }

  fn error_here(&self, message: impl Into<String>) -> CompileError {
    let loc = self.peek().map_or(self.source.len(), |token| token.loc);
    CompileError::at(self.source, loc, message)
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }

    let got = describe_token(self.peek(), self.source);
    Err(self.error_here(format!("expected a number, but got \"{got}\"")))
  }

  /// Parse the current token as a string literal.
  fn get_string(&mut self) -> CompileResult<String> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Str
    {
      let text = token.text.clone().unwrap_or_default();
      self.pos += 1;
      return Ok(text);
    }

    let got = describe_token(self.peek(), self.source);
    Err(self.error_here(format!("expected a string, but got \"{got}\"")))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }

    let got = describe_token(self.peek(), self.source);
    Err(self.error_here(format!("expected an identifier, but got \"{got}\"")))
  }

  fn is_eof(&self) -> bool {
    matches!(
      self.peek().map(|token| token.kind),
      Some(TokenKind::Eof) | None
    )
  }
}
