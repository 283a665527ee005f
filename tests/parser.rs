mod common;

use pretty_assertions::assert_eq;
use ysc::{
    lex::Number,
    modules::parse_unit,
    parse::ast::*,
};

fn parse(source: &str) -> Program {
    match parse_unit("parser.ys", source) {
        Ok(program) => program,
        Err(diagnostics) => panic!("parsing failed:\n{}", diagnostics),
    }
}

/// Cuerpo del primer `on start`.
fn start_body(program: &Program) -> &Block {
    program
        .items
        .iter()
        .find_map(|item| match item.val() {
            Item::Event(EventBlock {
                kind: EventKind::Start,
                body,
            }) => Some(body),
            _ => None,
        })
        .expect("no start block")
}

fn int(expr: &Expr) -> i64 {
    match expr {
        Expr::Literal(Literal {
            value: LiteralValue::Number(Number::Int(value)),
            ..
        }) => *value,
        other => panic!("not an integer literal: {:?}", other),
    }
}

#[test]
fn semicolons_separate_items_on_one_line() {
    let program = parse("mut int x = 1; mut int y = 2\nconst int z = 3");
    assert_eq!(program.items.len(), 3);
    assert!(program.main_directive.is_none());
}

#[test]
fn main_directive_is_recorded() {
    let program = parse("@main\nmut int x = 1");
    assert!(program.main_directive.is_some());
    assert_eq!(program.items.len(), 1);
}

#[test]
fn multiplication_binds_tighter() {
    let program = parse("on start { x = 1 + 2 * 3 }");
    let body = start_body(&program);

    let value = match body[0].val() {
        Statement::Assign { value, .. } => value,
        other => panic!("not an assignment: {:?}", other),
    };

    match value.val() {
        Expr::Binary(left, BinOp::Add, right) => {
            assert_eq!(int(left.val()), 1);
            match right.val() {
                Expr::Binary(two, BinOp::Mul, three) => {
                    assert_eq!(int(two.val()), 2);
                    assert_eq!(int(three.val()), 3);
                }
                other => panic!("unexpected right operand: {:?}", other),
            }
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn call_requires_paren_on_same_line() {
    let program = parse("on start {\n    f\n    (1)\n    g(2)\n}");
    let body = start_body(&program);

    assert_eq!(body.len(), 3);
    assert!(matches!(
        body[0].val(),
        Statement::Expr(expr) if matches!(expr.val(), Expr::Identifier(_))
    ));
    assert!(matches!(
        body[2].val(),
        Statement::Expr(expr) if matches!(expr.val(), Expr::Call { .. })
    ));
}

#[test]
fn hardware_declaration_becomes_instantiation() {
    let program = parse("mut Led led = 13");
    let var = match program.items[0].val() {
        Item::Var(var) => var,
        other => panic!("not a variable: {:?}", other),
    };

    match var.initializer.as_ref().map(|init| init.val()) {
        Some(Expr::New { type_name, args }) => {
            assert_eq!(type_name.val().to_string(), "Led");
            assert_eq!(args.len(), 1);
            assert_eq!(int(args[0].val()), 13);
        }
        other => panic!("unexpected initializer: {:?}", other),
    }
}

#[test]
fn range_and_catch_on_declarations() {
    let program = parse("mut int v in 0...100 = 50\non start { mut int r = read() catch { r = -1 } }");

    match program.items[0].val() {
        Item::Var(var) => {
            let range = var.range.as_ref().expect("missing range");
            assert_eq!(int(range.min.val()), 0);
            assert_eq!(int(range.max.val()), 100);
        }
        other => panic!("not a variable: {:?}", other),
    }

    let body = start_body(&program);
    match body[0].val() {
        Statement::Var(var) => assert!(matches!(
            var.initializer.as_ref().map(|init| init.val()),
            Some(Expr::Catch { handler, .. }) if handler.len() == 1
        )),
        other => panic!("not a declaration: {:?}", other),
    }
}

#[test]
fn match_arms_with_alternatives_and_wildcard() {
    let source = "on start {\n    match x {\n        1 | 2 => a()\n        _ => { b() }\n        3 => c()\n    }\n}";
    let program = parse(source);

    let stmt = match start_body(&program)[0].val() {
        Statement::Match(stmt) => stmt,
        other => panic!("not a match: {:?}", other),
    };

    assert_eq!(stmt.arms.len(), 3);
    assert_eq!(stmt.arms[0].patterns.len(), 2);
    assert!(stmt.arms[1].is_wildcard());
    assert!(!stmt.arms[2].is_wildcard());
}

#[test]
fn interrupt_with_name_and_level_mode() {
    let program = parse("interrupt onButton on 3 low { }\ninterrupt on 2 rising { }");

    let modes: Vec<(Option<String>, TriggerMode)> = program
        .items
        .iter()
        .filter_map(|item| match item.val() {
            Item::Interrupt(interrupt) => Some((
                interrupt.name.as_ref().map(|name| name.val().to_string()),
                interrupt.mode,
            )),
            _ => None,
        })
        .collect();

    assert_eq!(
        modes,
        vec![
            (Some("onButton".to_owned()), TriggerMode::Low),
            (None, TriggerMode::Rising),
        ]
    );
}

#[test]
fn struct_literal_is_not_a_block_in_conditions() {
    let program = parse("on start {\n    if ready { go() }\n    p = Point { x: 1, y: 2 }\n}");
    let body = start_body(&program);

    assert!(matches!(body[0].val(), Statement::If { branches, .. } if branches.len() == 1));
    assert!(matches!(
        body[1].val(),
        Statement::Assign { value, .. } if matches!(value.val(), Expr::StructLiteral { fields, .. } if fields.len() == 2)
    ));
}

#[test]
fn constants_need_an_initializer() {
    let diagnostics = common::compile("const int LIMIT").unwrap_err();

    assert_eq!(diagnostics.label(), "Syntax error");
    assert_eq!(common::messages(&diagnostics), vec!["Constant 'LIMIT' must be initialized"]);
}

#[test]
fn syntax_errors_carry_their_line() {
    let diagnostics = common::compile("mut int x = 1\n\nmut int = 3").unwrap_err();
    let error = diagnostics.iter().next().unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(error.line(), 3);
    assert!(error.message().starts_with("Expected identifier"), "{}", error.message());
}

#[test]
fn assignment_target_must_be_a_place() {
    let diagnostics = common::compile("on start { f() = 3 }").unwrap_err();
    assert_eq!(common::messages(&diagnostics), vec!["Invalid assignment target"]);
}
