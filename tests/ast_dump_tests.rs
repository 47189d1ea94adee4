use minijs::{ast, dump_ast, parse_source};

#[test]
fn dump_of_mixed_program() {
  let source = r#"
    function add(a, b) { return a + b; }
    let s = add(2, 3);
    if (s > 4) print('big'); else { print(s); }
  "#;
  let expected = "\
Program
  Function: add(a, b)
    RETURN
      BINOP: +
        VAR: a
        VAR: b
  TopLevel Statement:
    VARDECL: s
      CALL: add
        INT: 2
        INT: 3
  TopLevel Statement:
    IF
      COND:
        BINOP: >
          VAR: s
          INT: 4
      THEN:
        PRINT
          STRING: \"big\"
      ELSE:
        BLOCK
          PRINT
            VAR: s
";
  assert_eq!(dump_ast(source).unwrap(), expected);
}

#[test]
fn dump_of_loops_and_unary() {
  let source = "for (let i = 0; i < 2; i = i + 1) { while (!i) return -1; }";
  let expected = "\
Program
  TopLevel Statement:
    FOR
      INIT:
        VARDECL: i
          INT: 0
      COND:
        BINOP: <
          VAR: i
          INT: 2
      STEP:
        ASSIGN: i
          BINOP: +
            VAR: i
            INT: 1
      BODY:
        BLOCK
          WHILE
            COND:
              UNARY: !
                VAR: i
            BODY:
              RETURN
                UNARY: -
                  INT: 1
";
  assert_eq!(dump_ast(source).unwrap(), expected);
}

#[test]
fn empty_source_dumps_no_program() {
  assert_eq!(dump_ast("").unwrap(), "(No program)\n");
  assert_eq!(ast::dump(None), "(No program)\n");
}

#[test]
fn display_matches_dump() {
  let program = parse_source("console.log(1 * 2);").unwrap();
  let text = program.to_string();
  assert_eq!(text, ast::dump(Some(&program)));
  assert!(text.ends_with("PRINT\n      BINOP: *\n        INT: 1\n        INT: 2\n"));
}

#[test]
fn buffer_dump_is_a_truncated_prefix() {
  let program = parse_source("print(1);").unwrap();
  let full = ast::dump(Some(&program));
  let mut buf = [0xffu8; 10];
  let written = ast::dump_to_buffer(Some(&program), &mut buf);
  assert_eq!(written, 9);
  assert_eq!(&buf[..9], &full.as_bytes()[..9]);
  assert_eq!(buf[9], 0);
}
