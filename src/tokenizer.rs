//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about semantics beyond recognising keywords,
//! identifiers, literals and punctuators. Multi-character punctuators are
//! matched before single-character ones to avoid ambiguity.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword,
  Ident,
  Num,
  Str,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  /// Decoded contents of a string literal, escapes already applied.
  pub text: Option<String>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      text: None,
      loc,
      len,
    }
  }
}

const KEYWORDS: [&str; 9] = [
  "function", "let", "var", "const", "return", "if", "else", "while", "for",
];

const MULTI_PUNCTUATORS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      i = input[i..].find('\n').map_or(input.len(), |end| i + end + 1);
      continue;
    }

    if input[i..].starts_with("/*") {
      let Some(end) = input[i + 2..].find("*/") else {
        return Err(CompileError::at(input, i, "unclosed block comment"));
      };
      i += 2 + end + 2;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i64>()
        .map_err(|err| CompileError::at(input, start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      i += 1;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let kind = if KEYWORDS.contains(&&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, None));
      continue;
    }

    if matches!(c, b'"' | b'\'' | b'`') {
      let (token, end) = read_string(input, i)?;
      tokens.push(token);
      i = end;
      continue;
    }

    if let Some(op) = MULTI_PUNCTUATORS
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+'
        | b'-'
        | b'*'
        | b'/'
        | b'%'
        | b'('
        | b')'
        | b'{'
        | b'}'
        | b'<'
        | b'>'
        | b';'
        | b','
        | b'='
        | b'!'
        | b'.'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::at(input, i, format!("invalid token: '{invalid_char}'")));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  Ok(tokens)
}

/// Read a quoted literal starting at `start`. Returns the token and the byte
/// offset just past the closing quote.
fn read_string(input: &str, start: usize) -> CompileResult<(Token, usize)> {
  let quote = input[start..].chars().next().unwrap_or('"');
  let mut text = String::new();
  let mut chars = input[start + 1..].char_indices();

  while let Some((offset, ch)) = chars.next() {
    let pos = start + 1 + offset;
    if ch == quote {
      let end = pos + ch.len_utf8();
      let mut token = Token::new(TokenKind::Str, start, end - start, None);
      token.text = Some(text);
      return Ok((token, end));
    }
    if ch == '\n' && quote != '`' {
      return Err(CompileError::at(input, pos, "unterminated string literal"));
    }
    if ch == '\\' {
      let Some((_, escaped)) = chars.next() else {
        break;
      };
      text.push(match escaped {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
      });
      continue;
    }
    text.push(ch);
  }

  Err(CompileError::at(input, start, "unterminated string literal"))
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds_and_text(source: &str) -> Vec<(TokenKind, String)> {
    tokenize(source)
      .unwrap()
      .iter()
      .map(|token| (token.kind, token_text(token, source).to_string()))
      .collect()
  }

  #[test]
  fn splits_keywords_identifiers_and_punctuators() {
    let tokens = kinds_and_text("let total = a <= 10 && !b;");
    let expected = vec![
      (TokenKind::Keyword, "let"),
      (TokenKind::Ident, "total"),
      (TokenKind::Punctuator, "="),
      (TokenKind::Ident, "a"),
      (TokenKind::Punctuator, "<="),
      (TokenKind::Num, "10"),
      (TokenKind::Punctuator, "&&"),
      (TokenKind::Punctuator, "!"),
      (TokenKind::Ident, "b"),
      (TokenKind::Punctuator, ";"),
      (TokenKind::Eof, ""),
    ];
    let expected: Vec<(TokenKind, String)> = expected
      .into_iter()
      .map(|(kind, text)| (kind, text.to_string()))
      .collect();
    assert_eq!(tokens, expected);
  }

  #[test]
  fn skips_line_and_block_comments() {
    let tokens = kinds_and_text("// header\n1 /* inline */ + 2 // tail");
    let texts: Vec<&str> = tokens.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(texts, vec!["1", "+", "2", ""]);
  }

  #[test]
  fn decodes_all_quote_styles_and_escapes() {
    let source = r#""a\"b" 'it\'s' `tab\there`"#;
    let tokens = tokenize(source).unwrap();
    let texts: Vec<Option<&str>> = tokens.iter().map(|token| token.text.as_deref()).collect();
    assert_eq!(
      texts,
      vec![Some("a\"b"), Some("it's"), Some("tab\there"), None]
    );
  }

  #[test]
  fn number_values_are_parsed() {
    let tokens = tokenize("0 42 9223372036854775807").unwrap();
    let values: Vec<Option<i64>> = tokens.iter().map(|token| token.value).collect();
    assert_eq!(values, vec![Some(0), Some(42), Some(i64::MAX), None]);
  }

  #[test]
  fn rejects_overflowing_number() {
    let err = tokenize("99999999999999999999").unwrap_err();
    assert!(err.message().starts_with("invalid number"));
  }

  #[test]
  fn rejects_unknown_character() {
    let err = tokenize("let x = 1 # 2;").unwrap_err();
    assert_eq!(err.message(), "invalid token: '#'");
  }

  #[test]
  fn identifiers_are_c_shaped() {
    let tokens = kinds_and_text("_tmp1 x_2");
    assert_eq!(tokens[0], (TokenKind::Ident, "_tmp1".to_string()));
    assert_eq!(tokens[1], (TokenKind::Ident, "x_2".to_string()));

    let err = tokenize("function $f() {}").unwrap_err();
    assert_eq!(err.message(), "invalid token: '$'");
  }

  #[test]
  fn rejects_unterminated_string_and_comment() {
    assert_eq!(
      tokenize("print(\"oops);").unwrap_err().message(),
      "unterminated string literal"
    );
    assert_eq!(
      tokenize("1 /* never closed").unwrap_err().message(),
      "unclosed block comment"
    );
  }
}
