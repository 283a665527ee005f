mod common;

use common::{assert_contains, compile, compile_with, messages};
use pretty_assertions::assert_eq;

const LIB: &str = "\
mut int count = 0
const int STEP = 2
fn bump() { count = count + STEP }
interrupt on 3 falling { count = 0 }
";

#[test]
fn module_declarations_are_namespaced() {
    let main = "@main\nload <lib.src> as L\non start { L.bump() }\non loop { println(L.count) }";
    let compilation = compile_with(main, &[("lib.src", LIB)]).unwrap();
    let code = &compilation.code;

    assert!(compilation.has_main_directive);
    assert_contains(code, "namespace L {");
    assert_contains(code, "} // namespace L");
    assert_contains(code, "void bump() {\n    L::count = L::count + L::STEP;\n}");
    assert_contains(code, "    attachInterrupt(digitalPinToInterrupt(3), L::isr_0, FALLING);");
    assert_contains(code, "    L::bump();");
    assert_contains(code, "    Serial.println(L::count);");

    // Fuera del espacio de nombres solo hay referencias calificadas
    let outside = code.split("} // namespace L").nth(1).unwrap();
    assert!(!outside.contains(" count"), "{}", outside);
    assert!(!outside.contains(" bump"), "{}", outside);
}

#[test]
fn module_volatile_names_are_qualified() {
    let main = "@main\nload <lib.src> as L\nmut int count = 0";
    let compilation = compile_with(main, &[("lib.src", LIB)]).unwrap();

    let names: Vec<&str> = compilation.volatile_names.iter().map(String::as_str).collect();
    assert_eq!(names, vec!["L.count"]);
    assert_contains(&compilation.code, "volatile int count = 0;\n\nconst int STEP = 2;\n\nvoid bump()");
    assert_contains(&compilation.code, "} // namespace L\n\nint count = 0;");
}

#[test]
fn implicit_namespace_is_the_file_stem() {
    let main = "@main\nload <util.ys>\non start { util.blink() }";
    let util = "fn blink() { }";
    let code = compile_with(main, &[("util.ys", util)]).unwrap().code;

    assert_contains(&code, "namespace util {");
    assert_contains(&code, "    util::blink();");
}

#[test]
fn module_members_must_exist() {
    let main = "@main\nload <lib.src> as L\non start { L.missing() }";
    let diagnostics = compile_with(main, &[("lib.src", LIB)]).unwrap_err();

    assert_eq!(messages(&diagnostics), vec!["'L' has no member 'missing'"]);
}

#[test]
fn modules_do_not_see_the_main_unit() {
    let main = "@main\nmut int secret = 1\nload <lib.ys> as L";
    let lib = "fn peek() -> int { return secret }";
    let diagnostics = compile_with(main, &[("lib.ys", lib)]).unwrap_err();

    assert_eq!(diagnostics.len(), 1);
    assert!(messages(&diagnostics)[0].starts_with("Undefined variable 'secret'"));
    assert_eq!(diagnostics.iter().next().unwrap().file(), "lib.ys");
}

#[test]
fn native_loads_become_includes() {
    let compilation = compile("load <Servo.h>\nload <Wire.h>\nload <Servo.h>").unwrap();

    assert!(!compilation.has_main_directive);
    assert_contains(
        &compilation.code,
        "#include <Arduino.h>\n#include <Servo.h>\n#include <Wire.h>\n",
    );
}

#[test]
fn two_main_directives_are_one_diagnostic() {
    let main = "@main\nload <lib.src> as L";
    let lib = "@main\nmut int x = 0";
    let diagnostics = compile_with(main, &[("lib.src", lib)]).unwrap_err();

    assert_eq!(diagnostics.label(), "Module error");
    assert_eq!(
        messages(&diagnostics),
        vec!["Multiple @main directives found in: main.ys, lib.src"]
    );
}

#[test]
fn missing_main_directive_lists_every_unit() {
    let diagnostics = compile_with("load <lib.src> as L", &[("lib.src", "mut int x = 0")]).unwrap_err();

    assert_eq!(
        messages(&diagnostics),
        vec!["No @main directive found in: main.ys, lib.src"]
    );
}

#[test]
fn cycles_are_detected() {
    let files = [("a.ys", "load <b.ys>"), ("b.ys", "load <a.ys>")];
    let diagnostics = compile_with("@main\nload <a.ys>", &files).unwrap_err();

    assert_eq!(
        messages(&diagnostics),
        vec!["Module cycle detected: a.ys -> b.ys -> a.ys"]
    );
}

#[test]
fn missing_files_are_fatal() {
    let diagnostics = compile("@main\nload <nowhere.ys> as N").unwrap_err();

    assert_eq!(diagnostics.label(), "Module error");
    assert_eq!(
        messages(&diagnostics),
        vec!["Cannot load module 'nowhere.ys': no such module"]
    );
}

#[test]
fn namespaces_are_unique_per_unit() {
    let files = [("a.ys", "mut int x = 0"), ("b.ys", "mut int y = 0")];
    let diagnostics = compile_with("@main\nload <a.ys> as M\nload <b.ys> as M", &files).unwrap_err();

    assert_eq!(messages(&diagnostics), vec!["Namespace 'M' is already in use"]);
}

#[test]
fn errors_in_modules_name_their_file() {
    let diagnostics = compile_with("@main\nload <bad.ys>", &[("bad.ys", "mut int = 1")]).unwrap_err();
    let error = diagnostics.iter().next().unwrap();

    assert_eq!(diagnostics.label(), "Syntax error");
    assert_eq!(error.file(), "bad.ys");
    assert_eq!(error.line(), 1);
}
