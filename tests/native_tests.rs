//! Assemble generated code with the host C toolchain and run it.

#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use minijs::generate_assembly;

fn have_cc() -> bool {
  Command::new("cc")
    .arg("--version")
    .output()
    .is_ok_and(|out| out.status.success())
}

/// Build and run `source`, or `None` when no C compiler is available.
fn build_and_run(name: &str, source: &str) -> Option<Output> {
  if !have_cc() {
    eprintln!("skipping {name}: cc not found");
    return None;
  }

  let asm = generate_assembly(source).unwrap();
  let dir = env::temp_dir().join(format!("minijs-{}-{name}", std::process::id()));
  fs::create_dir_all(&dir).unwrap();
  let asm_path = dir.join("prog.s");
  let exe_path: PathBuf = dir.join("prog");
  fs::write(&asm_path, asm).unwrap();

  let status = Command::new("cc")
    .arg("-o")
    .arg(&exe_path)
    .arg(&asm_path)
    .status()
    .unwrap();
  assert!(status.success(), "assembling {name} failed");

  let output = Command::new(&exe_path).output().unwrap();
  let _ = fs::remove_dir_all(&dir);
  Some(output)
}

#[test]
fn add_program_prints_and_exits_with_result() {
  let source = r#"
    function add(a, b) { return a + b; }
    let s = add(2, 3);
    console.log(s);
    return s;
  "#;
  let Some(output) = build_and_run("add", source) else {
    return;
  };
  assert_eq!(String::from_utf8_lossy(&output.stdout), "5\n");
  assert_eq!(output.status.code(), Some(5));
}

#[test]
fn loops_strings_and_recursion() {
  let source = r#"
    function fib(n) {
      if (n < 2) { return n; }
      return fib(n - 1) + fib(n - 2);
    }
    console.log("fib:");
    for (let i = 0; i < 6; i = i + 1) {
      print(fib(i));
    }
    return 0;
  "#;
  let Some(output) = build_and_run("fib", source) else {
    return;
  };
  assert_eq!(
    String::from_utf8_lossy(&output.stdout),
    "fib:\n0\n1\n1\n2\n3\n5\n"
  );
  assert_eq!(output.status.code(), Some(0));
}

#[test]
fn binary_operands_run_right_to_left() {
  let source = r#"
    function a() { print(1); return 10; }
    function b() { print(2); return 3; }
    print(a() - b());
  "#;
  let Some(output) = build_and_run("order", source) else {
    return;
  };
  assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n1\n7\n");
}

#[test]
fn user_main_is_callable() {
  let source = "function main() { return 7; } print(main() * 6);";
  let Some(output) = build_and_run("user-main", source) else {
    return;
  };
  assert_eq!(String::from_utf8_lossy(&output.stdout), "42\n");
  assert_eq!(output.status.code(), Some(0));
}

#[test]
fn call_arguments_agree_with_interpreter() {
  let source = r#"
    function a() { print(1); return 10; }
    function b() { print(2); return 3; }
    function f(x, y) { return x - y; }
    print(f(a(), b()));
  "#;
  let Some(output) = build_and_run("args", source) else {
    return;
  };
  let interpreted = minijs::evaluate(source).unwrap();
  assert_eq!(String::from_utf8_lossy(&output.stdout), interpreted.output);
  assert_eq!(interpreted.output, "1\n2\n7\n");
}

#[test]
fn for_block_slot_outlives_the_iteration() {
  let source = r#"
    for (let i = 0; i < 2; i = i + 1) {
      if (i == 1) print(y);
      let y = 5;
    }
  "#;
  let Some(output) = build_and_run("for-slot", source) else {
    return;
  };
  assert_eq!(String::from_utf8_lossy(&output.stdout), "5\n");
  assert_eq!(output.status.code(), Some(0));

  let interpreted = minijs::evaluate(source).unwrap();
  assert_eq!(interpreted.output, "Error: undefined variable 'y'\n0\n");
}
