//! Emission targets shared by the AST dumper, the interpreter and the code
//! generator.
//!
//! Every stage writes formatted text through [`Output`], which hides whether
//! the bytes end up in an unbounded stream, a caller-provided fixed buffer or
//! an in-memory string. None of the targets ever fail the caller: a bounded
//! buffer truncates silently and a broken stream is logged once and then
//! ignored.

use std::fmt;
use std::io;

use tracing::warn;

/// A destination for emitted text.
pub struct Output<'a> {
  target: Target<'a>,
  written: usize,
}

enum Target<'a> {
  Stream {
    writer: &'a mut dyn io::Write,
    failed: bool,
  },
  Buffer(&'a mut [u8]),
  Capture(String),
}

impl<'a> Output<'a> {
  /// Write straight through to an `io::Write` implementor.
  pub fn stream(writer: &'a mut dyn io::Write) -> Self {
    Self {
      target: Target::Stream {
        writer,
        failed: false,
      },
      written: 0,
    }
  }

  /// Write into a pre-sized buffer. At most `buf.len() - 1` bytes are kept so
  /// a terminating NUL always fits.
  pub fn buffer(buf: &'a mut [u8]) -> Self {
    if let Some(first) = buf.first_mut() {
      *first = 0;
    }
    Self {
      target: Target::Buffer(buf),
      written: 0,
    }
  }

  /// Collect everything into an owned string.
  pub fn capture() -> Self {
    Self {
      target: Target::Capture(String::new()),
      written: 0,
    }
  }

  /// Emit pre-formatted arguments, usually through `format_args!`.
  pub fn emit(&mut self, args: fmt::Arguments<'_>) {
    match args.as_str() {
      Some(text) => self.push_str(text),
      None => self.push_str(&args.to_string()),
    }
  }

  pub fn push_str(&mut self, text: &str) {
    match &mut self.target {
      Target::Stream { writer, failed } => {
        if *failed {
          return;
        }
        match writer.write_all(text.as_bytes()) {
          Ok(()) => self.written += text.len(),
          Err(err) => {
            warn!(error = %err, "output stream failed, dropping further output");
            *failed = true;
          }
        }
      }
      Target::Buffer(buf) => {
        let capacity = buf.len().saturating_sub(1);
        let remaining = capacity.saturating_sub(self.written);
        let take = text.len().min(remaining);
        if take > 0 {
          buf[self.written..self.written + take].copy_from_slice(&text.as_bytes()[..take]);
          self.written += take;
        }
        if let Some(terminator) = buf.get_mut(self.written) {
          *terminator = 0;
        }
      }
      Target::Capture(out) => {
        out.push_str(text);
        self.written += text.len();
      }
    }
  }

  /// Number of bytes accepted so far (excluding any terminator).
  pub fn written(&self) -> usize {
    self.written
  }

  /// Text collected so far when the target is an in-memory capture or a
  /// bounded buffer. Truncation inside a multi-byte character is trimmed.
  pub fn contents(&self) -> Option<&str> {
    match &self.target {
      Target::Stream { .. } => None,
      Target::Buffer(buf) => Some(valid_prefix(&buf[..self.written])),
      Target::Capture(out) => Some(out),
    }
  }

  /// Flush streams, terminate buffers and report the byte count written.
  pub fn finish(self) -> usize {
    match self.target {
      Target::Stream { writer, failed } => {
        if !failed && let Err(err) = writer.flush() {
          warn!(error = %err, "failed to flush output stream");
        }
      }
      Target::Buffer(buf) => {
        if let Some(terminator) = buf.get_mut(self.written) {
          *terminator = 0;
        }
      }
      Target::Capture(_) => {}
    }
    self.written
  }

  /// Consume the target, returning captured text. Streams yield an empty
  /// string.
  pub fn into_string(self) -> String {
    match self.target {
      Target::Capture(out) => out,
      Target::Buffer(buf) => valid_prefix(&buf[..self.written]).to_owned(),
      Target::Stream { .. } => String::new(),
    }
  }
}

fn valid_prefix(bytes: &[u8]) -> &str {
  match std::str::from_utf8(bytes) {
    Ok(text) => text,
    Err(err) => std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
  }
}

impl fmt::Write for Output<'_> {
  fn write_str(&mut self, s: &str) -> fmt::Result {
    self.push_str(s);
    Ok(())
  }
}

impl fmt::Debug for Output<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match &self.target {
      Target::Stream { .. } => "stream",
      Target::Buffer(_) => "buffer",
      Target::Capture(_) => "capture",
    };
    f.debug_struct("Output")
      .field("target", &kind)
      .field("written", &self.written)
      .finish()
  }
}

/// `write!`-style helper that forwards to [`Output::emit`].
macro_rules! emit {
  ($out:expr, $($arg:tt)*) => {
    $out.emit(format_args!($($arg)*))
  };
}

pub(crate) use emit;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capture_keeps_everything() {
    let mut out = Output::capture();
    emit!(out, "{} + {}\n", 1, 2);
    out.push_str("done\n");
    assert_eq!(out.written(), 11);
    assert_eq!(out.into_string(), "1 + 2\ndone\n");
  }

  #[test]
  fn buffer_truncates_and_terminates() {
    let mut buf = [0xffu8; 8];
    let mut out = Output::buffer(&mut buf);
    out.push_str("hello ");
    out.push_str("world");
    assert_eq!(out.contents(), Some("hello w"));
    let written = out.finish();
    assert_eq!(written, 7);
    assert_eq!(&buf, b"hello w\0");
  }

  #[test]
  fn writes_after_truncation_are_dropped() {
    let mut buf = [0u8; 4];
    let mut out = Output::buffer(&mut buf);
    out.push_str("abcdef");
    out.push_str("xyz");
    assert_eq!(out.finish(), 3);
    assert_eq!(&buf, b"abc\0");
  }

  #[test]
  fn empty_buffer_accepts_nothing() {
    let mut buf: [u8; 0] = [];
    let mut out = Output::buffer(&mut buf);
    out.push_str("anything");
    assert_eq!(out.finish(), 0);
  }

  #[test]
  fn stream_forwards_bytes() {
    let mut sink: Vec<u8> = Vec::new();
    {
      let mut out = Output::stream(&mut sink);
      emit!(out, "{}\n", 42);
      assert_eq!(out.finish(), 3);
    }
    assert_eq!(sink, b"42\n");
  }

  struct Broken;

  impl io::Write for Broken {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
      Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn broken_stream_is_not_fatal() {
    let mut broken = Broken;
    let mut out = Output::stream(&mut broken);
    out.push_str("lost");
    out.push_str("also lost");
    assert_eq!(out.finish(), 0);
  }
}
