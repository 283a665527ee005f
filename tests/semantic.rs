mod common;

use common::{compile, messages};
use pretty_assertions::assert_eq;

#[test]
fn misspelled_name_gets_a_suggestion() {
    let diagnostics = compile("mut int counter = 0\non start { couter = 1 }").unwrap_err();

    assert_eq!(diagnostics.label(), "Semantic error");
    assert_eq!(diagnostics.len(), 1);

    let message = &messages(&diagnostics)[0];
    assert!(
        message.starts_with("Undefined variable 'couter'. Did you mean 'counter'?"),
        "{}",
        message
    );
}

#[test]
fn all_undefined_names_are_reported_together() {
    let diagnostics = compile("on start {\n    a = 1\n    b = 2\n}\non loop { c() }").unwrap_err();

    let lines: Vec<u32> = diagnostics.iter().map(|diagnostic| diagnostic.line()).collect();
    assert_eq!(lines, vec![2, 3, 5]);
}

#[test]
fn block_locals_do_not_escape() {
    let source = "on start {\n    if true {\n        mut int inner = 1\n    }\n    inner = 2\n}";
    let diagnostics = compile(source).unwrap_err();

    assert_eq!(diagnostics.len(), 1);
    assert!(messages(&diagnostics)[0].starts_with("Undefined variable 'inner'"));
}

#[test]
fn for_variable_is_scoped_to_the_loop() {
    let source = "on start {\n    for (mut int i = 0; i < 3; i = i + 1) { }\n    mut int i = 5\n}";
    assert!(compile(source).is_ok());
}

#[test]
fn initializer_cannot_reference_itself() {
    let diagnostics = compile("mut int x = x + 1").unwrap_err();
    assert_eq!(
        messages(&diagnostics),
        vec!["Variable 'x' cannot be used in its own initializer"]
    );
}

#[test]
fn catch_handler_sees_the_declared_variable() {
    let source = "fn sensor() -> int { return 1 }\non start { mut int r = sensor() catch { r = -1 } }";
    assert!(compile(source).is_ok());
}

#[test]
fn functions_are_visible_before_their_declaration() {
    assert!(compile("on start { later() }\nfn later() { }").is_ok());
}

#[test]
fn constants_cannot_be_assigned() {
    let source = "const int LIMIT = 10\nalias PIN = 2\non start {\n    LIMIT = 3\n    PIN = 4\n}";
    let diagnostics = compile(source).unwrap_err();

    assert_eq!(
        messages(&diagnostics),
        vec!["Cannot assign to constant 'LIMIT'", "Cannot assign to constant 'PIN'"]
    );
}

#[test]
fn redeclaration_in_the_same_scope() {
    let diagnostics = compile("mut int x = 1\nmut float x = 2.0").unwrap_err();
    assert_eq!(messages(&diagnostics), vec!["'x' is already declared in this scope"]);
}

#[test]
fn shadowing_in_an_inner_scope_is_allowed() {
    assert!(compile("mut int x = 1\nfn f() { mut int x = 2 }").is_ok());
}

#[test]
fn unknown_types_are_rejected() {
    let diagnostics = compile("mut Widget w").unwrap_err();
    assert_eq!(messages(&diagnostics), vec!["Unknown type 'Widget'"]);
}

#[test]
fn user_types_and_members() {
    let source = "\
enum State { Idle, Running }
struct Point { int x, int y }
class Counter {
    mut int value = 0
    fn bump() { self.value = self.value + 1 }
}
mut State state = State.Running
mut Point origin = Point { x: 0, y: 0 }
on start { state = Idle }
";

    assert!(compile(source).is_ok());
}

#[test]
fn member_checks() {
    let source = "\
enum State { Idle }
struct Point { int x }
mut State state = State.Busy
mut Point p = Point { z: 1 }
";

    let diagnostics = compile(source).unwrap_err();
    assert_eq!(
        messages(&diagnostics),
        vec![
            "'State' has no member 'Busy'",
            "Struct 'Point' has no field 'z'",
        ]
    );
}

#[test]
fn self_outside_of_a_class() {
    let diagnostics = compile("fn f() { self.x = 1 }").unwrap_err();
    assert_eq!(messages(&diagnostics), vec!["`self` can only be used inside a class"]);
}

#[test]
fn break_outside_of_a_loop() {
    let source = "fn f() {\n    while true { if true { break } }\n    continue\n}";
    let diagnostics = compile(source).unwrap_err();

    assert_eq!(messages(&diagnostics), vec!["`continue` outside of a loop"]);
    assert_eq!(diagnostics.iter().next().unwrap().line(), 3);
}

#[test]
fn emitted_names_must_be_signals() {
    let diagnostics = compile("mut int tick = 0\non start { emit tick }").unwrap_err();
    assert_eq!(messages(&diagnostics), vec!["'tick' is not a signal"]);
}

#[test]
fn unknown_board_is_reported() {
    let diagnostics = compile("config { board: pico }").unwrap_err();

    assert_eq!(diagnostics.label(), "Semantic error");
    assert_eq!(messages(&diagnostics), vec!["Unknown board 'pico'"]);
}

#[test]
fn enum_variants_share_the_enclosing_scope() {
    let diagnostics = compile("enum A { Idle }\nenum B { Idle }").unwrap_err();
    assert_eq!(messages(&diagnostics), vec!["'Idle' is already declared in this scope"]);
}
