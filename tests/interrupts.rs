mod common;

use std::collections::BTreeSet;

use common::{assert_contains, code, compile, messages};
use pretty_assertions::assert_eq;

fn rejected(body: &str) -> Vec<String> {
    let source = format!("mut int state = 0\nfn helper() {{ }}\ninterrupt on 2 rising {{\n{}\n}}", body);
    let diagnostics = compile(&source).unwrap_err();

    assert_eq!(diagnostics.label(), "Interrupt safety error");
    messages(&diagnostics)
}

fn volatile_names(source: &str) -> BTreeSet<String> {
    compile(source).unwrap().volatile_names
}

fn names(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|&name| name.to_owned()).collect()
}

#[test]
fn blocking_calls_are_rejected_directly() {
    assert_eq!(rejected("delay(10)"), vec!["delay() is not allowed in interrupts"]);
    assert_eq!(rejected("wait(1s)"), vec!["wait() is not allowed in interrupts"]);
}

#[test]
fn serial_output_is_rejected_inside_if() {
    assert_eq!(
        rejected("if state > 0 {\n    println(\"fired\")\n}"),
        vec!["println() is not allowed in interrupts"]
    );
}

#[test]
fn forbidden_calls_are_found_in_match_arms() {
    let body = "match state {\n    1 => { if true { delayMicros(5) } }\n    _ => { }\n}";
    assert_eq!(rejected(body), vec!["delayMicros() is not allowed in interrupts"]);
}

#[test]
fn serial_methods_are_rejected() {
    assert_eq!(
        rejected("Serial.print(state)"),
        vec!["Serial.print() is not allowed in interrupts"]
    );
}

#[test]
fn loops_are_rejected_at_any_depth() {
    assert_eq!(
        rejected("while state < 3 { state = state + 1 }"),
        vec!["loops are not allowed in interrupts"]
    );

    assert_eq!(
        rejected("if true {\n    atomic { repeat 3 { state = 1 } }\n}"),
        vec!["loops are not allowed in interrupts"]
    );
}

#[test]
fn user_function_calls_are_rejected() {
    assert_eq!(
        rejected("helper()"),
        vec!["calls to function 'helper' are not allowed in interrupts"]
    );
}

#[test]
fn every_violation_is_reported() {
    let errors = rejected("print(1)\nfor (mut int i = 0; i < 2; i = i + 1) { }\nhelper()");
    assert_eq!(errors.len(), 3);
}

#[test]
fn the_same_calls_are_fine_outside_interrupts() {
    assert!(compile("on loop {\n    delay(10)\n    while false { }\n    println(1)\n}").is_ok());
}

#[test]
fn reads_and_writes_both_mark_variables_volatile() {
    let source = "\
mut int written = 0
mut int read = 0
mut int untouched = 0
mut bool flag = false
interrupt on 2 rising {
    written = 1
    flag = read > 3
}
";

    assert_eq!(volatile_names(source), names(&["flag", "read", "written"]));
}

#[test]
fn reactive_variables_are_always_volatile() {
    let source = "react mut int level = 0\nmut int plain = 0";
    assert_eq!(volatile_names(source), names(&["level"]));
}

#[test]
fn volatility_follows_declarations_not_names() {
    let source = "\
mut bool flag = false
fn reset() {
    mut int flag = 1
}
interrupt on 2 falling {
    mut int local = 0
    flag = true
}
";

    let code = code(source);
    assert_contains(&code, "volatile bool flag = false;");
    assert_contains(&code, "    int flag = 1;");
    assert_contains(&code, "    int local = 0;");
    assert!(!code.contains("volatile int"), "{}", code);
}

#[test]
fn end_to_end_counter_interrupt() {
    let source = "mut int counter = 0\ninterrupt on 2 rising { counter = counter + 1 }";
    let compilation = compile(source).unwrap();

    assert_eq!(compilation.volatile_names, names(&["counter"]));
    assert!(!compilation.has_main_directive);
    assert_eq!(
        compilation.code,
        "\
// Generated by ysc from main.ys (board: uno)

#include <Arduino.h>

volatile int counter = 0;

void isr_0() {
    counter = counter + 1;
}

void setup() {
    attachInterrupt(digitalPinToInterrupt(2), isr_0, RISING);
}

void loop() {
}
"
    );
}

#[test]
fn user_methods_are_rejected_but_hardware_methods_are_not() {
    let source = "\
class C {
    fn slow() { delay(1000) }
}
mut C c = new C()
interrupt on 2 rising { c.slow() }
";

    let diagnostics = compile(source).unwrap_err();
    assert_eq!(diagnostics.label(), "Interrupt safety error");
    assert_eq!(
        messages(&diagnostics),
        vec!["calls to function 'C.slow' are not allowed in interrupts"]
    );

    assert!(compile("mut Led led = 13\ninterrupt on 2 rising { led.toggle() }").is_ok());
}

#[test]
fn the_trigger_pin_is_not_part_of_the_body() {
    let source = "mut int pin = 2\nmut int n = 0\ninterrupt on pin rising { n = 1 }";
    assert_eq!(volatile_names(source), names(&["n"]));
}
