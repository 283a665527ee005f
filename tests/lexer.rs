mod common;

use pretty_assertions::assert_eq;
use ysc::{
    lex::{tokenize, Identifier, Keyword, Number, Token},
    source::{self, Located},
    units::Unit,
};

fn tokens(text: &str) -> Vec<Token> {
    let text = source::consume(text, "lexer.ys");
    tokenize(&text)
        .unwrap()
        .into_iter()
        .map(Located::into_inner)
        .collect()
}

fn id(name: &str) -> Token {
    Token::Id(Identifier::new(name))
}

#[test]
fn comments_run_to_end_of_line() {
    assert_eq!(
        tokens("mut int x = 1 # counter\nx"),
        vec![
            Token::Keyword(Keyword::Mut),
            id("int"),
            id("x"),
            Token::Assign,
            Token::Number(Number::Int(1), None),
            id("x"),
        ]
    );
}

#[test]
fn duration_literal_inside_call() {
    assert_eq!(
        tokens("delay(2s)"),
        vec![
            id("delay"),
            Token::OpenParen,
            Token::Number(Number::Int(2), Some(Unit::Seconds)),
            Token::CloseParen,
        ]
    );
}

#[test]
fn word_operators() {
    assert_eq!(
        tokens("a and not b or c"),
        vec![
            id("a"),
            Token::Keyword(Keyword::And),
            Token::Keyword(Keyword::Not),
            id("b"),
            Token::Keyword(Keyword::Or),
            id("c"),
        ]
    );
}

#[test]
fn trigger_levels_are_plain_identifiers() {
    assert_eq!(
        tokens("rising low"),
        vec![Token::Keyword(Keyword::Rising), id("low")]
    );
}

#[test]
fn bad_characters_are_all_reported() {
    let diagnostics = common::compile("mut int x = 1\nmut int y = 2 $\n$").unwrap_err();

    assert_eq!(diagnostics.label(), "Lexical error");
    assert_eq!(diagnostics.len(), 2);

    let first = diagnostics.iter().next().unwrap();
    assert_eq!(first.message(), "Bad character '$' in input stream");
    assert_eq!(first.line(), 2);
    assert_eq!(first.column(), 15);
}

#[test]
fn unterminated_string() {
    let diagnostics = common::compile("mut string s = \"abc\nmut int y = 0").unwrap_err();

    assert_eq!(diagnostics.label(), "Lexical error");
    assert_eq!(common::messages(&diagnostics)[0], "Unterminated string literal");
}
