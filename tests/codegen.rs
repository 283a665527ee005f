mod common;

use common::{assert_contains, code, compile, compile_with, messages};
use pretty_assertions::assert_eq;
use ysc::{codegen::EmitFlags, compile_unit, CompileOptions};

#[test]
fn range_assignments_are_clamped() {
    let code = code("mut int v in 0...100 = 50\non start { v = 500 }");

    assert_contains(&code, "int v = constrain(50, 0, 100);");
    assert_contains(&code, "    v = constrain(500, 0, 100);");
}

#[test]
fn range_clamps_reach_module_and_class_members() {
    let lib = "mut int v in 0...100 = 50";
    let main = "@main\nload <lib.src> as L\non start { L.v = 500 }";
    let module = compile_with(main, &[("lib.src", lib)]).unwrap().code;

    assert_contains(&module, "namespace L {\n\nint v = constrain(50, 0, 100);");
    assert_contains(&module, "    L::v = constrain(500, 0, 100);");

    let class = code("class C {\n    mut int v in 0...100 = 50\n    fn f() { self.v = 500 }\n}");
    assert_contains(&class, "    int v = constrain(50, 0, 100);");
    assert_contains(&class, "void C::f() {\n    this->v = constrain(500, 0, 100);\n}");
}

#[test]
fn symbolic_bounds_are_evaluated_on_every_assignment() {
    let code = code("mut int limit = 10\nmut int v in 0...limit = 5\non start {\n    limit = 20\n    v = 50\n}");

    assert_contains(&code, "int v = constrain(5, 0, limit);");
    assert_contains(&code, "    limit = 20;\n    v = constrain(50, 0, limit);");
}

#[test]
fn inverted_literal_ranges_are_rejected() {
    let diagnostics = compile("mut int v in 10...0 = 5").unwrap_err();

    assert_eq!(diagnostics.label(), "Semantic error");
    assert_eq!(
        messages(&diagnostics),
        vec!["Invalid range for 'v': lower bound 10 is greater than upper bound 0"]
    );
}

#[test]
fn unit_literals_are_scalars() {
    let code = code("on loop {\n    delay(1s)\n    delayMicros(250)\n    wait(2min)\n}");

    assert_contains(
        &code,
        "void loop() {\n    delay(1000);\n    delayMicroseconds(250);\n    delay(120000);\n}",
    );
}

#[test]
fn match_lowers_to_if_chain_with_wildcard_last() {
    let source = "\
enum State { Idle, Running, Done }
mut State state = State.Idle
fn go() { }
fn stop() { }
on loop {
    match state {
        _ => stop()
        State.Idle => go()
        Running | Done => { state = State.Idle }
    }
}
";

    let code = code(source);
    assert_contains(&code, "enum State { Idle, Running, Done };");
    assert_contains(&code, "State state = State::Idle;");
    assert_contains(
        &code,
        "\
void loop() {
    if (state == State::Idle) {
        go();
    } else if (state == Running || state == Done) {
        state = State::Idle;
    } else {
        stop();
    }
}
",
    );
}

#[test]
fn computed_match_subjects_are_evaluated_once() {
    let code = code("fn read() -> int { return 1 }\non loop {\n    match read() + 1 {\n        2 => { }\n    }\n}");

    assert_contains(&code, "    auto ys_match_0 = read() + 1;\n    if (ys_match_0 == 2) {\n    }");
}

#[test]
fn switch_cases_break() {
    let code = code("mut int x = 0\non loop {\n    switch x {\n        case 1 { x = 2 }\n        default { x = 0 }\n    }\n}");

    assert_contains(
        &code,
        "\
    switch (x) {
    case 1: {
        x = 2;
        break;
    }
    default: {
        x = 0;
        break;
    }
    }
",
    );
}

#[test]
fn loops_and_atomic_sections() {
    let source = "\
mut int total = 0
on start {
    for (mut int i = 0; i < 3; i = i + 1) { total = total + i }
    repeat 2 { total = total * 2 }
    while total > 10 { total = total - 1 }
    atomic { total = 0 }
}
";

    assert_contains(
        &code(source),
        "\
    for (int i = 0; i < 3; i = i + 1) {
        total = total + i;
    }
    for (long ys_repeat_0 = 0; ys_repeat_0 < 2; ys_repeat_0++) {
        total = total * 2;
    }
    while (total > 10) {
        total = total - 1;
    }
    noInterrupts();
    {
        total = 0;
    }
    interrupts();
",
    );
}

#[test]
fn catch_guards_the_stored_value() {
    let source = "\
fn sensor() -> int { return 0 }
mut int cached = sensor() catch { cached = 5 }
on start {
    mut int r = sensor() catch { r = -1 }
    sensor() catch { println(\"failed\") }
}
";

    let code = code(source);
    assert_contains(&code, "int cached = sensor();");
    assert_contains(
        &code,
        "\
void setup() {
    if (!(cached)) {
        cached = 5;
    }
    int r = sensor();
    if (!(r)) {
        r = -1;
    }
    if (!(sensor())) {
        Serial.println(\"failed\");
    }
}
",
    );
}

#[test]
fn signals_and_tasks_are_scheduled_in_loop() {
    let source = "\
signal tick
mut int n = 0
on tick { n = 0 }
task blink every 500ms { n = n + 1 }
task poll background { }
interrupt on 2 rising { emit tick }
";

    let code = code(source);
    assert_contains(&code, "volatile bool ys_signal_tick = false;");
    assert_contains(&code, "void ys_on_tick_0() {\n    n = 0;\n}");
    assert_contains(&code, "unsigned long ys_last_blink = 0;\nvoid blink() {\n    n = n + 1;\n}");
    assert_contains(&code, "void isr_0() {\n    ys_signal_tick = true;\n}");
    assert_contains(
        &code,
        "\
void loop() {
    if (millis() - ys_last_blink >= 500) { ys_last_blink = millis(); blink(); }
    poll();
    if (ys_signal_tick) {
        ys_signal_tick = false;
        ys_on_tick_0();
    }
}
",
    );
}

#[test]
fn classes_and_structs() {
    let source = "\
struct Point { int x, int y }
class Blinker {
    mut int pin = 0
    constructor(int p) { self.pin = p }
    fn toggle() { digitalWrite(self.pin, !digitalRead(self.pin)) }
}
mut Point origin = Point { x: 1, y: 2 }
mut Blinker blinker = new Blinker(13)
on loop { blinker.toggle() }
";

    let code = code(source);
    assert_contains(&code, "struct Point {\n    int x;\n    int y;\n};");
    assert_contains(
        &code,
        "\
class Blinker {
public:
    int pin = 0;

    Blinker(int p);
    void toggle();
};
",
    );

    assert_contains(
        &code,
        "\
Blinker::Blinker(int p) {
    this->pin = p;
}

void Blinker::toggle() {
    digitalWrite(this->pin, !digitalRead(this->pin));
}
",
    );

    assert_contains(&code, "Point origin = Point{.x = 1, .y = 2};");
    assert_contains(&code, "Blinker blinker = Blinker(13);");
    assert_contains(&code, "    blinker.toggle();");
}

#[test]
fn method_bodies_follow_globals_and_prototypes() {
    let source = "\
mut int g = 0
class C {
    fn m() { g = helper() }
}
fn helper() -> int { return 1 }
";

    let code = code(source);
    let definition = code.find("class C {").unwrap();
    let prototype = code.find("int helper();").unwrap();
    let global = code.find("int g = 0;").unwrap();
    let body = code.find("void C::m() {\n    g = helper();\n}").unwrap();

    assert!(code[definition..].contains("    void m();\n};"), "{}", code);
    assert!(definition < prototype && prototype < global && global < body, "{}", code);
}

#[test]
fn expressions() {
    let source = "\
mut float ratio = 0.0
mut string label = \"say \\\"hi\\\"\"
mut int[] values = [1, 2, 3]
on start {
    ratio = values[0] as float
    label = ratio as string
    ratio = -(ratio + 1.0) * 2.0
    values[1] = values[2] % 2
}
";

    let code = code(source);
    assert_contains(&code, "float ratio = 0.0;");
    assert_contains(&code, "String label = \"say \\\"hi\\\"\";");
    assert_contains(&code, "int values[] = {1, 2, 3};");
    assert_contains(&code, "    ratio = (float)(values[0]);");
    assert_contains(&code, "    label = String(ratio);");
    assert_contains(&code, "    ratio = -(ratio + 1.0) * 2.0;");
    assert_contains(&code, "    values[1] = values[2] % 2;");
}

#[test]
fn native_passthrough() {
    let code = code("@cpp \"#define LIMIT 3\"\non start { @cpp \"Serial.flush();\" }");

    assert_contains(&code, "#define LIMIT 3\n");
    assert_contains(&code, "void setup() {\n    Serial.flush();\n}");
}

#[test]
fn functions_get_prototypes() {
    let code = code("on start { twice(2) }\nfn twice(int x) -> int { return x * 2 }");

    assert_contains(&code, "int twice(int x);\n\n");
    assert_contains(&code, "int twice(int x) {\n    return x * 2;\n}");
}

#[test]
fn line_comments_flag() {
    let options = CompileOptions {
        board: None,
        flags: EmitFlags::LINE_COMMENTS,
    };

    let mut loader = std::collections::HashMap::<String, String>::new();
    let source = "mut int a = 1\n\nfn f() { }";
    let code = compile_unit("blink.ys", source, &mut loader, &options).unwrap().code;

    assert_contains(&code, "// blink.ys:1\nint a = 1;");
    assert_contains(&code, "// blink.ys:3\nvoid f() {\n}");
}

#[test]
fn output_is_stable() {
    let source = "mut Led led = 13\ninterrupt on 2 rising { led.toggle() }\ntask t every 1s { }";
    assert_eq!(compile(source).unwrap().code, compile(source).unwrap().code);
}
