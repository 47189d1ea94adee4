use std::env;
use std::fs::{self, File};
use std::io;
use std::process;
use std::str::FromStr;

use minijs::ast;
use minijs::codegen;
use minijs::interpreter::Interpreter;
use minijs::parser::parse_reader;
use minijs::{CompileError, Output, Program};
use snafu::{ResultExt, Snafu};
use tracing::{Level, debug};

const LOG_ENV: &str = "MINIJS_LOG";
const DEFAULT_OUTPUT: &str = "out.s";

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("Error: -o requires an argument"))]
  MissingOutputPath,

  #[snafu(display("Unknown option: {option}"))]
  UnknownOption { option: String },

  #[snafu(display("Error: Cannot open file '{path}'"))]
  OpenInput { path: String, source: io::Error },

  #[snafu(display("{source}\nParse failed."))]
  Parse { source: CompileError },

  #[snafu(display("Error: Cannot open output file '{path}'"))]
  WriteOutput { path: String, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Compile,
  Eval,
  Ast,
}

#[derive(Debug)]
struct Options {
  mode: Mode,
  input: Option<String>,
  output: String,
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>, CliError> {
  let mut options = Options {
    mode: Mode::Compile,
    input: None,
    output: DEFAULT_OUTPUT.to_string(),
  };

  let mut iter = args.iter().skip(1);
  while let Some(arg) = iter.next() {
    match arg.as_str() {
      "-h" | "--help" => return Ok(None),
      "-e" | "--eval" => options.mode = Mode::Eval,
      "-c" | "--compile" => options.mode = Mode::Compile,
      "-a" | "--ast" => options.mode = Mode::Ast,
      "-o" => {
        let Some(path) = iter.next() else {
          return MissingOutputPathSnafu.fail();
        };
        options.output = path.clone();
      }
      other if !other.starts_with('-') => options.input = Some(other.to_string()),
      other => {
        return UnknownOptionSnafu {
          option: other.to_string(),
        }
        .fail();
      }
    }
  }

  Ok(Some(options))
}

fn print_usage(program: &str) {
  eprintln!("Usage: {program} [options] <input.js>");
  eprintln!("Options:");
  eprintln!("  -e, --eval     Interpret and execute the program");
  eprintln!("  -c, --compile  Generate x86-64 assembly (default)");
  eprintln!("  -a, --ast      Print the syntax tree");
  eprintln!("  -o <file>      Output file (default: {DEFAULT_OUTPUT} for compile)");
  eprintln!("  -h, --help     Show this help message");
}

fn read_program(input: Option<&str>) -> Result<Program, CliError> {
  match input {
    Some(path) => {
      let file = File::open(path).context(OpenInputSnafu { path })?;
      parse_reader(file).context(ParseSnafu)
    }
    None => {
      eprintln!("Reading from stdin...");
      parse_reader(io::stdin().lock()).context(ParseSnafu)
    }
  }
}

fn run(options: &Options) -> Result<(), CliError> {
  let program = read_program(options.input.as_deref())?;
  debug!(items = program.items().len(), mode = ?options.mode, "program parsed");

  match options.mode {
    Mode::Eval => {
      println!("=== Mini-JS Interpreter ===");
      let result = {
        let mut stdout = io::stdout().lock();
        let mut interp = Interpreter::new(Output::stream(&mut stdout));
        let result = interp.eval_program(Some(&program));
        interp.into_output().finish();
        result
      };
      println!("=== Return Value: {result} ===");
    }
    Mode::Compile => {
      let asm = codegen::generate(&program);
      fs::write(&options.output, asm).context(WriteOutputSnafu {
        path: options.output.as_str(),
      })?;
      println!("Assembly written to '{}'", options.output);
    }
    Mode::Ast => print!("{}", ast::dump(Some(&program))),
  }

  Ok(())
}

fn init_logging() {
  let level = env::var(LOG_ENV)
    .ok()
    .and_then(|value| Level::from_str(value.trim()).ok())
    .unwrap_or(Level::WARN);

  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_target(false)
    .with_max_level(level)
    .init();
}

fn main() {
  init_logging();

  let args: Vec<String> = env::args().collect();
  let program = args.first().map(String::as_str).unwrap_or("minijs");

  let options = match parse_args(&args) {
    Ok(Some(options)) => options,
    Ok(None) => {
      print_usage(program);
      return;
    }
    Err(err) => {
      eprintln!("{err}");
      if matches!(err, CliError::UnknownOption { .. }) {
        print_usage(program);
      }
      process::exit(1);
    }
  };

  if let Err(err) = run(&options) {
    eprintln!("{err}");
    process::exit(1);
  }
}
