mod common;

use common::{assert_contains, code, compile, messages};
use pretty_assertions::assert_eq;
use ysc::{
    codegen::EmitFlags,
    compile_unit,
    config::{Board, Family},
    CompileOptions,
};

const FAN_AND_LEDS: &str = "\
config { board: esp32 }
mut Pwm fan = 5
mut Led a = 13
mut Led b = 12
on start {
    b.set(10)
    a.set(20)
    a.set(30)
}
";

fn channels(source: &str) -> Vec<(String, u8)> {
    compile(source).unwrap().pwm_channels
}

#[test]
fn avr_writes_pins_directly() {
    let code = code("mut Led led = 13\nmut Button button = 4\non loop {\n    led.set(128)\n    if button.pressed() { led.off() }\n}");

    assert_contains(&code, "uint8_t led = 13;");
    assert_contains(&code, "    pinMode(led, OUTPUT);\n    pinMode(button, INPUT_PULLUP);");
    assert_contains(&code, "    analogWrite(led, 128);");
    assert_contains(&code, "    if ((digitalRead(button) == LOW)) {\n        digitalWrite(led, LOW);\n    }");
    assert!(!code.contains("ledc"), "{}", code);
}

#[test]
fn esp32_channels_follow_first_use() {
    assert_eq!(
        channels(FAN_AND_LEDS),
        vec![("5".to_owned(), 0), ("12".to_owned(), 1), ("13".to_owned(), 2)]
    );
}

#[test]
fn channel_allocation_is_deterministic() {
    let first = compile(FAN_AND_LEDS).unwrap();
    let second = compile(FAN_AND_LEDS).unwrap();

    assert_eq!(first.pwm_channels, second.pwm_channels);
    assert_eq!(first.code, second.code);
}

#[test]
fn esp32_uses_channel_wrappers() {
    let code = code(FAN_AND_LEDS);

    assert_contains(
        &code,
        "\
void ys_pwm_write_ch0(uint32_t duty) { ledcWrite(0, duty); }
void ys_pwm_write_ch1(uint32_t duty) { ledcWrite(1, duty); }
void ys_pwm_write_ch2(uint32_t duty) { ledcWrite(2, duty); }
",
    );

    assert_contains(&code, "    pinMode(b, OUTPUT);\n    ledcSetup(1, 5000, 8);\n    ledcAttachPin(b, 1);");
    assert_contains(&code, "    ys_pwm_write_ch1(10);\n    ys_pwm_write_ch2(20);\n    ys_pwm_write_ch2(30);");
}

#[test]
fn pins_named_by_constants_share_a_channel() {
    let source = "\
config { board: esp32 }
const int PIN = 4
mut Pwm left = PIN
mut Pwm right = PIN
mut Pwm other = 7
";

    assert_eq!(
        channels(source),
        vec![("PIN".to_owned(), 0), ("7".to_owned(), 1)]
    );
}

#[test]
fn boards_have_a_channel_limit() {
    let mut source = String::from("config { board: esp32c3 }\n");
    for pin in 0..7 {
        source.push_str(&format!("mut Pwm p{0} = {0}\n", pin));
    }

    let diagnostics = compile(&source).unwrap_err();
    assert_eq!(diagnostics.label(), "Hardware error");
    assert_eq!(messages(&diagnostics), vec!["Board 'esp32c3' has only 6 PWM channels"]);
}

#[test]
fn esp8266_uses_native_pwm_with_iram_handlers() {
    let source = "config { board: esp8266 }\nmut Pwm fan = 5\ninterrupt on 2 change { fan.write(255) }";
    let compilation = compile(source).unwrap();

    assert_eq!(compilation.board.board.family(), Family::EspNative);
    assert!(compilation.pwm_channels.is_empty());
    assert_contains(&compilation.code, "void IRAM_ATTR isr_0() {\n    analogWrite(fan, 255);\n}");
}

#[test]
fn unknown_methods_and_arity() {
    let source = "mut Led led = 13\non start {\n    led.blink()\n    led.set()\n}";
    let diagnostics = compile(source).unwrap_err();

    assert_eq!(
        messages(&diagnostics),
        vec![
            "Hardware type 'Led' has no method 'blink'",
            "'Led.set()' takes 1 argument(s) but 0 were given",
        ]
    );
}

#[test]
fn hardware_only_instantiates_variables() {
    let diagnostics = compile("on start { pinMode(new Led(13), OUTPUT) }").unwrap_err();
    assert_eq!(
        messages(&diagnostics),
        vec!["Hardware type 'Led' can only be instantiated as a variable initializer"]
    );
}

#[test]
fn analog_and_pin_methods() {
    let code = code("mut Analog pot = 14\nmut Pin relay = 7\non loop {\n    mut int level = pot.read()\n    relay.toggle()\n    relay.write(level > 512)\n}");

    assert_contains(&code, "uint8_t pot = 14;");
    assert!(!code.contains("pinMode(pot"), "{}", code);
    assert_contains(&code, "    int level = analogRead(pot);");
    assert_contains(&code, "    digitalWrite(relay, !digitalRead(relay));");
    assert_contains(&code, "    digitalWrite(relay, level > 512);");
}

#[test]
fn board_override_and_config_values() {
    let source = "config { board: uno, clock: 16MHz, uart: 115200 }\nmut Led led = 2\non start { led.set(1) }";
    let options = CompileOptions {
        board: Some(Board::Esp32S3),
        flags: EmitFlags::empty(),
    };

    let mut loader = std::collections::HashMap::<String, String>::new();
    let compilation = compile_unit("sketch.ys", source, &mut loader, &options).unwrap();

    assert_eq!(compilation.board.board, Board::Esp32S3);
    assert_eq!(compilation.board.build_property(), "build.f_cpu=16000000L");
    assert_eq!(compilation.board.baud_rate(), Some("115200"));
    assert_eq!(compilation.pwm_channels, vec![("2".to_owned(), 0)]);

    assert!(compilation.code.starts_with("#include <Arduino.h>\n"));
    assert_contains(&compilation.code, "void setup() {\n    Serial.begin(115200);\n");
}
