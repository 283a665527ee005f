//! Análisis sintáctico.
//!
//! Parser de descenso recursivo sobre la secuencia de tokens. Las
//! expresiones se reconocen por escalada de precedencia. Las
//! instrucciones terminan en un salto de línea, en `;` o antes de `}`;
//! por la misma razón, una llamada `f(...)` o un subíndice `a[...]`
//! solo se forman si el delimitador abre en la misma línea.
//!
//! Todo error sintáctico es fatal para la unidad. No hay recuperación.

pub mod ast;
pub mod visit;

use std::{iter::Peekable, slice, str::FromStr};

use thiserror::Error;

use crate::{
    hardware::HardwareType,
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

use ast::*;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier, found {0}")]
    ExpectedId(Token),

    #[error("Expected an expression, found {0}")]
    ExpectedExpr(Token),

    #[error("Expected a declaration, found {0}")]
    ExpectedItem(Token),

    #[error("Expected a field, constructor or method, found {0}")]
    ExpectedMember(Token),

    #[error("Expected `case` or `default`, found {0}")]
    ExpectedCase(Token),

    #[error("Expected a module path after `load`, found {0}")]
    ExpectedPath(Token),

    #[error("Expected an interrupt mode (rising, falling, change, low, high), found {0}")]
    ExpectedTriggerMode(Token),

    #[error("Expected `every` or `background`, found {0}")]
    ExpectedSchedule(Token),

    #[error("Expected end of statement, found {0}")]
    ExpectedEndOfStatement(Token),

    #[error("Expected `,` or a new line, found {0}")]
    ExpectedSeparator(Token),

    #[error("Range constraints are only allowed on `mut` declarations ('{0}')")]
    RangeOnImmutable(Identifier),

    #[error("Constant '{0}' must be initialized")]
    MissingInitializer(Identifier),

    #[error("Invalid assignment target")]
    InvalidAssignTarget,

    #[error("Unknown directive `@{0}`")]
    UnknownDirective(Identifier),

    #[error("Duplicate `@main` directive")]
    DuplicateMainDirective,

    #[error("Class '{0}' has more than one constructor")]
    DuplicateConstructor(Identifier),

    #[error("Switch statement has more than one `default` case")]
    DuplicateDefault,

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

/// Construye el árbol de una unidad de compilación.
///
/// `start` es la ubicación que se reporta si la unidad termina antes
/// de consumir un solo token.
pub fn parse(
    tokens: &[Located<Token>],
    name: &str,
    start: Location,
) -> Result<Program, Located<ParserError>> {
    let mut parser = Parser {
        tokens: tokens.iter().peekable(),
        last_known: start,
        restricted: false,
    };

    let program = parser.program(name).map_err(Failure::coerce)?;
    tracing::trace!(unit = name, items = program.items.len(), "parsed unit");

    Ok(program)
}

#[derive(Clone)]
struct Parser<'a> {
    tokens: Peekable<slice::Iter<'a, Located<Token>>>,
    last_known: Location,

    /// En condiciones de control `Nombre {` abre un bloque, no un
    /// literal de estructura.
    restricted: bool,
}

enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn strict(self) -> Self {
        Failure::Strict(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

/// Nivel de precedencia más bajo, el de `or`.
const LOWEST: u8 = 1;

/// Nivel de `^`. Los patrones de `match` inician aquí para que `|`
/// separe alternativas.
const PATTERN: u8 = 4;

impl<'a> Parser<'a> {
    fn program(&mut self, name: &str) -> Parse<Program> {
        let mut main_directive = None;
        let mut items = Vec::new();

        while let Some(token) = self.peek() {
            match token.val() {
                Token::MainDirective => {
                    let location = self.next()?.location().clone();
                    if main_directive.is_some() {
                        return self.fail(ParserError::DuplicateMainDirective);
                    }

                    main_directive = Some(location);
                }

                Token::Semicolon => {
                    self.next()?;
                }

                _ => items.push(self.located(Parser::item)?),
            }
        }

        Ok(Program {
            name: name.to_owned(),
            main_directive,
            items,
        })
    }

    fn item(&mut self) -> Parse<Item> {
        let item = match self.peek_token() {
            Some(Token::Keyword(Keyword::Config)) => {
                self.next()?;
                let entries = self.braced(Parser::config_entry)?;

                return Ok(Item::Config(ConfigBlock { entries }));
            }

            Some(Token::Keyword(Keyword::Load)) => Item::Load(self.load()?),
            Some(Token::Keyword(Keyword::Mut | Keyword::Const | Keyword::React)) => {
                Item::Var(self.var_decl()?)
            }

            Some(Token::Keyword(Keyword::Alias)) => {
                self.next()?;
                let name = self.id()?;
                self.expect(Token::Assign)?;
                let value = self.expr().map_err(Failure::strict)?;

                Item::Alias(AliasDecl {
                    name,
                    value,
                    symbol: None,
                })
            }

            Some(Token::Keyword(Keyword::Signal)) => {
                self.next()?;
                let name = self.id()?;

                Item::Signal(SignalDecl { name, symbol: None })
            }

            Some(Token::Keyword(Keyword::Fn)) => return Ok(Item::Function(self.function()?)),
            Some(Token::Keyword(Keyword::Class)) => return Ok(Item::Class(self.class()?)),
            Some(Token::Keyword(Keyword::Enum)) => return self.enumeration(),
            Some(Token::Keyword(Keyword::Struct)) => return self.structure(),
            Some(Token::Keyword(Keyword::On)) => return self.event(),
            Some(Token::Keyword(Keyword::Interrupt)) => return self.interrupt(),
            Some(Token::Keyword(Keyword::Task)) => return self.task(),
            Some(Token::Directive(_)) => Item::Native(self.native()?),

            _ => {
                let found = self.next()?.into_inner();
                return self.fail(ParserError::ExpectedItem(found));
            }
        };

        self.end_of_statement()?;
        Ok(item)
    }

    fn config_entry(&mut self) -> Parse<(Located<Identifier>, Located<Expr>)> {
        let key = self.id()?;
        self.expect(Token::Colon)?;
        let value = self.expr().map_err(Failure::strict)?;

        Ok((key, value))
    }

    fn load(&mut self) -> Parse<LoadStmt> {
        self.keyword(Keyword::Load)?;

        let (location, token) = self.next()?.split();
        let path = match token {
            Token::Path(path) => Located::at(path, location),
            found => return self.fail(ParserError::ExpectedPath(found)),
        };

        let alias = if self.accept(&Token::Keyword(Keyword::As)) {
            Some(self.id()?)
        } else {
            None
        };

        Ok(LoadStmt { path, alias })
    }

    fn function(&mut self) -> Parse<FunctionDecl> {
        self.keyword(Keyword::Fn)?;
        let name = self.id()?;
        let params = self.parameters()?;

        let return_type = if self.accept(&Token::Arrow) {
            Some(self.type_name()?)
        } else {
            None
        };

        let body = self.block()?;

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            symbol: None,
        })
    }

    fn parameters(&mut self) -> Parse<Vec<Param>> {
        self.expect(Token::OpenParen)?;
        let params = self.comma_separated(Parser::parameter, true)?;
        self.expect(Token::CloseParen)?;

        Ok(params)
    }

    fn parameter(&mut self) -> Parse<Param> {
        let ty = self.type_name().map_err(Failure::weak)?;
        let name = self.id()?;

        Ok(Param {
            ty,
            name,
            symbol: None,
        })
    }

    fn class(&mut self) -> Parse<ClassDecl> {
        self.keyword(Keyword::Class)?;
        let name = self.id()?;
        self.expect(Token::OpenCurly)?;

        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        loop {
            match self.peek_token() {
                Some(Token::CloseCurly) => {
                    self.next()?;
                    break;
                }

                Some(Token::Semicolon) => {
                    self.next()?;
                }

                Some(Token::Keyword(Keyword::Mut | Keyword::Const | Keyword::React)) => {
                    let field = self.located(Parser::var_decl)?;
                    self.end_of_statement()?;
                    fields.push(field);
                }

                Some(Token::Keyword(Keyword::Constructor)) => {
                    let start = self.next()?.location().clone();
                    if constructor.is_some() {
                        return self.fail(ParserError::DuplicateConstructor(name.into_inner()));
                    }

                    let params = self.parameters()?;
                    let body = self.block()?;

                    constructor = Some(Constructor {
                        params,
                        body,
                        location: self.span_from(start),
                    });
                }

                Some(Token::Keyword(Keyword::Fn)) => methods.push(self.located(Parser::function)?),

                None => return self.fail(ParserError::MissingToken(Token::CloseCurly)),
                Some(_) => {
                    let found = self.next()?.into_inner();
                    return self.fail(ParserError::ExpectedMember(found));
                }
            }
        }

        Ok(ClassDecl {
            name,
            fields,
            constructor,
            methods,
            symbol: None,
        })
    }

    fn enumeration(&mut self) -> Parse<Item> {
        self.keyword(Keyword::Enum)?;
        let name = self.id()?;
        let variants = self.braced(Parser::id)?;

        Ok(Item::Enum(EnumDecl {
            name,
            variants,
            symbol: None,
        }))
    }

    fn structure(&mut self) -> Parse<Item> {
        self.keyword(Keyword::Struct)?;
        let name = self.id()?;
        let fields = self.braced(|s| {
            let ty = s.type_name()?;
            let name = s.id()?;

            Ok(Field { ty, name })
        })?;

        Ok(Item::Struct(StructDecl {
            name,
            fields,
            symbol: None,
        }))
    }

    fn event(&mut self) -> Parse<Item> {
        self.keyword(Keyword::On)?;

        let name = self.id()?;
        let kind = match name.val().as_ref() {
            "start" => EventKind::Start,
            "loop" => EventKind::Loop,
            _ => EventKind::Signal(Reference::new(name)),
        };

        let body = self.block()?;
        Ok(Item::Event(EventBlock { kind, body }))
    }

    fn interrupt(&mut self) -> Parse<Item> {
        self.keyword(Keyword::Interrupt)?;

        let name = match self.peek_token() {
            Some(Token::Id(_)) => Some(self.id()?),
            _ => None,
        };

        self.keyword(Keyword::On)?;
        let pin = self.condition()?;
        let mode = self.trigger_mode()?;
        let body = self.block()?;

        Ok(Item::Interrupt(InterruptBlock {
            name,
            pin,
            mode,
            body,
        }))
    }

    fn trigger_mode(&mut self) -> Parse<TriggerMode> {
        let mode = match self.next()?.into_inner() {
            Token::Keyword(Keyword::Rising) => TriggerMode::Rising,
            Token::Keyword(Keyword::Falling) => TriggerMode::Falling,
            Token::Keyword(Keyword::Change) => TriggerMode::Change,

            // Modos por nivel, reconocidos solo en esta posición
            Token::Id(id) if id.as_ref() == "low" => TriggerMode::Low,
            Token::Id(id) if id.as_ref() == "high" => TriggerMode::High,

            found => return self.fail(ParserError::ExpectedTriggerMode(found)),
        };

        Ok(mode)
    }

    fn task(&mut self) -> Parse<Item> {
        self.keyword(Keyword::Task)?;
        let name = self.id()?;

        let schedule = match self.next()?.into_inner() {
            Token::Keyword(Keyword::Every) => Schedule::Every(self.condition()?),
            Token::Keyword(Keyword::Background) => Schedule::Background,
            found => return self.fail(ParserError::ExpectedSchedule(found)),
        };

        let body = self.block()?;

        Ok(Item::Task(TaskDecl {
            name,
            schedule,
            body,
            symbol: None,
        }))
    }

    fn native(&mut self) -> Parse<String> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Directive(name) if name.as_ref() == "cpp" => (),
            Token::Directive(name) => {
                return Err(Failure::Strict(Located::at(
                    ParserError::UnknownDirective(name),
                    location,
                )))
            }

            found => return self.fail(ParserError::ExpectedItem(found)),
        }

        match self.next()?.into_inner() {
            Token::Str(text) => Ok(text),
            found => self.fail(ParserError::UnexpectedToken(Token::Str(String::new()), found)),
        }
    }

    fn var_decl(&mut self) -> Parse<VarDecl> {
        let mut qualifiers = Qualifiers::empty();
        if self.accept(&Token::Keyword(Keyword::React)) {
            qualifiers = Qualifiers::REACTIVE | Qualifiers::MUTABLE;
            self.accept(&Token::Keyword(Keyword::Mut));
        } else if self.accept(&Token::Keyword(Keyword::Mut)) {
            qualifiers = Qualifiers::MUTABLE;
        } else {
            self.keyword(Keyword::Const)?;
        }

        let mutable = qualifiers.contains(Qualifiers::MUTABLE);
        let declared_type = self.type_name()?;
        let name = self.id()?;

        let range = if self.accept(&Token::Keyword(Keyword::In)) {
            if !mutable {
                return self.fail(ParserError::RangeOnImmutable(name.into_inner()));
            }

            let min = self.expr().map_err(Failure::strict)?;
            self.expect(Token::Ellipsis)?;
            let max = self.expr().map_err(Failure::strict)?;

            Some(RangeConstraint { min, max })
        } else {
            None
        };

        let initializer = if self.accept(&Token::Assign) {
            let value = self.catchable()?;
            Some(hardware_sugar(&declared_type, value))
        } else if mutable {
            None
        } else {
            return self.fail(ParserError::MissingInitializer(name.into_inner()));
        };

        Ok(VarDecl {
            qualifiers,
            declared_type,
            name,
            initializer,
            range,
            symbol: None,
        })
    }

    fn type_name(&mut self) -> Parse<Located<TypeName>> {
        let first = self.id()?;
        let start = first.location().clone();

        let mut path = vec![first.into_inner()];
        while self.accept(&Token::Period) {
            path.push(self.id()?.into_inner());
        }

        let array = self
            .lookahead(|s| {
                s.expect(Token::OpenSquare)?;
                s.expect(Token::CloseSquare)
            })
            .is_ok();

        if array {
            self.next()?;
            self.next()?;
        }

        Ok(Located::at(TypeName { path, array }, self.span_from(start)))
    }

    fn block(&mut self) -> Parse<Block> {
        self.expect(Token::OpenCurly)?;

        self.with_restriction(false, |s| {
            let mut statements = Vec::new();
            loop {
                match s.peek_token() {
                    Some(Token::CloseCurly) => {
                        s.next()?;
                        break Ok(statements);
                    }

                    Some(Token::Semicolon) => {
                        s.next()?;
                    }

                    None => break s.fail(ParserError::MissingToken(Token::CloseCurly)),
                    Some(_) => statements.push(s.statement()?),
                }
            }
        })
    }

    fn statement(&mut self) -> Parse<Located<Statement>> {
        self.located(|s| {
            let statement = match s.peek_token() {
                Some(Token::Keyword(Keyword::If)) => return s.if_statement(),
                Some(Token::Keyword(Keyword::While)) => {
                    s.next()?;
                    let condition = s.condition()?;
                    let body = s.block()?;

                    return Ok(Statement::While { condition, body });
                }

                Some(Token::Keyword(Keyword::For)) => return s.for_statement(),
                Some(Token::Keyword(Keyword::Repeat)) => {
                    s.next()?;
                    let count = s.condition()?;
                    let body = s.block()?;

                    return Ok(Statement::Repeat { count, body });
                }

                Some(Token::Keyword(Keyword::Match)) => return s.match_statement(),
                Some(Token::Keyword(Keyword::Switch)) => return s.switch_statement(),
                Some(Token::Keyword(Keyword::Atomic)) => {
                    s.next()?;
                    return Ok(Statement::Atomic(s.block()?));
                }

                Some(Token::Keyword(Keyword::Mut | Keyword::Const | Keyword::React)) => {
                    Statement::Var(s.var_decl()?)
                }

                Some(Token::Keyword(Keyword::Emit)) => {
                    s.next()?;
                    Statement::Emit(Reference::new(s.id()?))
                }

                Some(Token::Keyword(Keyword::Return)) => {
                    s.next()?;

                    let ends = matches!(
                        s.peek_token(),
                        None | Some(Token::CloseCurly) | Some(Token::Semicolon)
                    );

                    if ends || !s.on_same_line() {
                        Statement::Return(None)
                    } else {
                        Statement::Return(Some(s.expr().map_err(Failure::strict)?))
                    }
                }

                Some(Token::Keyword(Keyword::Break)) => {
                    s.next()?;
                    Statement::Break
                }

                Some(Token::Keyword(Keyword::Continue)) => {
                    s.next()?;
                    Statement::Continue
                }

                Some(Token::Directive(_)) => Statement::Native(s.native()?),
                _ => s.simple_statement()?,
            };

            s.end_of_statement()?;
            Ok(statement)
        })
    }

    /// Asignación o expresión, sin terminador.
    fn simple_statement(&mut self) -> Parse<Statement> {
        let expr = self.expr().map_err(Failure::strict)?;

        if self.accept(&Token::Assign) {
            if !is_assignable(expr.val()) {
                let location = expr.location().clone();
                return Err(Failure::Strict(Located::at(
                    ParserError::InvalidAssignTarget,
                    location,
                )));
            }

            let value = self.catchable()?;
            Ok(Statement::Assign {
                target: expr,
                value,
            })
        } else {
            Ok(Statement::Expr(self.catch_suffix(expr)?))
        }
    }

    fn if_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::If)?;

        let condition = self.condition()?;
        let mut branches = vec![(condition, self.block()?)];
        let mut otherwise = None;

        while self.accept(&Token::Keyword(Keyword::Else)) {
            if self.accept(&Token::Keyword(Keyword::If)) {
                let condition = self.condition()?;
                branches.push((condition, self.block()?));
            } else {
                otherwise = Some(self.block()?);
                break;
            }
        }

        Ok(Statement::If {
            branches,
            otherwise,
        })
    }

    fn for_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::For)?;
        self.expect(Token::OpenParen)?;

        let init = if self.peek_is(&Token::Semicolon) {
            None
        } else {
            let init = self.located(|s| match s.peek_token() {
                Some(Token::Keyword(Keyword::Mut | Keyword::Const)) => {
                    Ok(Statement::Var(s.var_decl()?))
                }

                _ => s.simple_statement(),
            })?;

            Some(Box::new(init))
        };

        self.expect(Token::Semicolon)?;
        let condition = if self.peek_is(&Token::Semicolon) {
            None
        } else {
            Some(self.expr().map_err(Failure::strict)?)
        };

        self.expect(Token::Semicolon)?;
        let update = if self.peek_is(&Token::CloseParen) {
            None
        } else {
            Some(Box::new(self.located(Parser::simple_statement)?))
        };

        self.expect(Token::CloseParen)?;
        let body = self.block()?;

        Ok(Statement::For {
            init,
            condition,
            update,
            body,
        })
    }

    fn match_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Match)?;
        let subject = self.condition()?;
        let arms = self.braced(Parser::match_arm)?;

        Ok(Statement::Match(MatchStmt { subject, arms }))
    }

    fn match_arm(&mut self) -> Parse<MatchArm> {
        let mut patterns = vec![self.located(Parser::pattern)?];
        while self.accept(&Token::Pipe) {
            patterns.push(self.located(Parser::pattern)?);
        }

        self.expect(Token::FatArrow)?;

        // Ambas formas de brazo producen una lista de instrucciones
        let body = if self.peek_is(&Token::OpenCurly) {
            self.block()?
        } else {
            vec![self.located(Parser::simple_statement)?]
        };

        Ok(MatchArm { patterns, body })
    }

    fn pattern(&mut self) -> Parse<Pattern> {
        if let Some(Token::Id(id)) = self.peek_token() {
            if id.as_ref() == "_" {
                self.next()?;
                return Ok(Pattern::Wildcard);
            }
        }

        let value = self.with_restriction(true, |s| s.binary(PATTERN))?;
        Ok(Pattern::Value(value))
    }

    fn switch_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Switch)?;
        let subject = self.condition()?;
        self.expect(Token::OpenCurly)?;

        let mut cases = Vec::new();
        let mut default = None;

        loop {
            match self.next()?.into_inner() {
                Token::CloseCurly => break,
                Token::Semicolon => (),

                Token::Keyword(Keyword::Case) => {
                    let value = self.condition()?;
                    let body = self.block()?;

                    cases.push(SwitchCase { value, body });
                }

                Token::Keyword(Keyword::Default) => {
                    if default.is_some() {
                        return self.fail(ParserError::DuplicateDefault);
                    }

                    default = Some(self.block()?);
                }

                found => return self.fail(ParserError::ExpectedCase(found)),
            }
        }

        Ok(Statement::Switch(SwitchStmt {
            subject,
            cases,
            default,
        }))
    }

    /// Expresión en posición de control, donde `{` abre un bloque.
    fn condition(&mut self) -> Parse<Located<Expr>> {
        self.with_restriction(true, Parser::expr)
            .map_err(Failure::strict)
    }

    /// Expresión con un `catch { ... }` opcional.
    fn catchable(&mut self) -> Parse<Located<Expr>> {
        let value = self.expr().map_err(Failure::strict)?;
        self.catch_suffix(value)
    }

    fn catch_suffix(&mut self, value: Located<Expr>) -> Parse<Located<Expr>> {
        if !self.on_same_line() || !self.accept(&Token::Keyword(Keyword::Catch)) {
            return Ok(value);
        }

        let handler = self.block()?;
        let location = self.span_from(value.location().clone());

        Ok(Located::at(
            Expr::Catch {
                value: Box::new(value),
                handler,
            },
            location,
        ))
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.binary(LOWEST)
    }

    fn binary(&mut self, min: u8) -> Parse<Located<Expr>> {
        let mut left = self.unary()?;

        loop {
            let operator = match self.peek_token() {
                Some(token) if self.on_same_line() => binary_operator(token),
                _ => None,
            };

            let (operator, precedence) = match operator {
                Some((operator, precedence)) if precedence >= min => (operator, precedence),
                _ => break Ok(left),
            };

            self.next()?;
            let right = self.binary(precedence + 1).map_err(Failure::strict)?;

            let location = Location::span(left.location().clone(), right.location());
            left = Located::at(
                Expr::Binary(Box::new(left), operator, Box::new(right)),
                location,
            );
        }
    }

    fn unary(&mut self) -> Parse<Located<Expr>> {
        let operator = match self.peek_token() {
            Some(Token::Minus) => UnOp::Negate,
            Some(Token::Bang | Token::Keyword(Keyword::Not)) => UnOp::Not,
            _ => return self.postfix(),
        };

        let start = self.next()?.location().clone();
        let operand = self.unary().map_err(Failure::strict)?;
        let location = Location::span(start, operand.location());

        Ok(Located::at(Expr::Unary(operator, Box::new(operand)), location))
    }

    fn postfix(&mut self) -> Parse<Located<Expr>> {
        let mut expr = self.primary()?;

        loop {
            let same_line = self.on_same_line();
            let start = expr.location().clone();

            let next = match self.peek_token() {
                Some(Token::OpenParen) if same_line => {
                    self.next()?;
                    let args = self.arguments(Token::CloseParen)?;

                    Expr::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }

                Some(Token::OpenSquare) if same_line => {
                    self.next()?;
                    let index = self
                        .with_restriction(false, Parser::expr)
                        .map_err(Failure::strict)?;

                    self.expect(Token::CloseSquare)?;
                    Expr::Subscript(Box::new(expr), Box::new(index))
                }

                Some(Token::Period) => {
                    self.next()?;
                    let member = self.id()?;

                    Expr::Member {
                        object: Box::new(expr),
                        member,
                        symbol: None,
                    }
                }

                Some(Token::Keyword(Keyword::As)) if same_line => {
                    self.next()?;
                    let target = self.type_name()?;

                    Expr::Convert {
                        value: Box::new(expr),
                        target,
                    }
                }

                Some(Token::OpenCurly) if same_line && !self.restricted => {
                    let type_name = match type_path(expr.val()) {
                        Some(path) => Located::at(path, start.clone()),
                        None => break Ok(expr),
                    };

                    let fields = self.with_restriction(false, |s| {
                        s.braced(|s| {
                            let field = s.id()?;
                            s.expect(Token::Colon)?;
                            let value = s.expr().map_err(Failure::strict)?;

                            Ok((field, value))
                        })
                    })?;

                    Expr::StructLiteral { type_name, fields }
                }

                _ => break Ok(expr),
            };

            expr = Located::at(next, self.span_from(start));
        }
    }

    fn primary(&mut self) -> Parse<Located<Expr>> {
        let (location, token) = self.next()?.split();

        let expr = match token {
            Token::Number(number, unit) => Expr::Literal(Literal {
                value: LiteralValue::Number(number),
                unit,
            }),

            Token::Str(string) => Expr::Literal(Literal {
                value: LiteralValue::Str(string),
                unit: None,
            }),

            Token::Keyword(Keyword::True) => Expr::Literal(Literal {
                value: LiteralValue::Bool(true),
                unit: None,
            }),

            Token::Keyword(Keyword::False) => Expr::Literal(Literal {
                value: LiteralValue::Bool(false),
                unit: None,
            }),

            Token::Keyword(Keyword::SelfValue) => Expr::SelfValue,
            Token::Id(id) => Expr::Identifier(Reference::new(Located::at(id, location.clone()))),

            Token::OpenParen => {
                let inner = self
                    .with_restriction(false, Parser::expr)
                    .map_err(Failure::strict)?;

                self.expect(Token::CloseParen)?;
                inner.into_inner()
            }

            Token::OpenSquare => Expr::Array(self.arguments(Token::CloseSquare)?),

            Token::Keyword(Keyword::New) => {
                let type_name = self.type_name()?;
                self.expect(Token::OpenParen)?;
                let args = self.arguments(Token::CloseParen)?;

                Expr::New { type_name, args }
            }

            found => return self.fail(ParserError::ExpectedExpr(found)).map_err(Failure::weak),
        };

        Ok(Located::at(expr, self.span_from(location)))
    }

    /// Lista de expresiones hasta `close`, que ya se consume.
    fn arguments(&mut self, close: Token) -> Parse<Vec<Located<Expr>>> {
        self.with_restriction(false, |s| {
            let args = s.comma_separated(Parser::expr, true)?;
            s.expect(close)?;

            Ok(args)
        })
    }

    /// Elementos entre llaves, separados por comas o saltos de línea.
    fn braced<T, F>(&mut self, mut rule: F) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        self.expect(Token::OpenCurly)?;

        let mut items = Vec::new();
        loop {
            match self.peek_token() {
                Some(Token::CloseCurly) => {
                    self.next()?;
                    break Ok(items);
                }

                None => break self.fail(ParserError::MissingToken(Token::CloseCurly)),
                Some(_) => {
                    items.push(rule(self).map_err(Failure::strict)?);

                    match self.peek_token() {
                        Some(Token::Comma) => {
                            self.next()?;
                        }

                        None | Some(Token::CloseCurly) => (),
                        Some(_) if !self.on_same_line() => (),

                        Some(_) => {
                            let found = self.next()?.into_inner();
                            break self.fail(ParserError::ExpectedSeparator(found));
                        }
                    }
                }
            }
        }
    }

    fn end_of_statement(&mut self) -> Parse<()> {
        match self.peek_token() {
            None | Some(Token::CloseCurly) => Ok(()),
            Some(Token::Semicolon) => {
                self.next()?;
                Ok(())
            }

            Some(_) if !self.on_same_line() => Ok(()),
            Some(_) => {
                let found = self.next()?.into_inner();
                self.fail(ParserError::ExpectedEndOfStatement(found))
            }
        }
    }

    fn with_restriction<T, F>(&mut self, restricted: bool, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let saved = std::mem::replace(&mut self.restricted, restricted);
        let result = rule(self);
        self.restricted = saved;

        result
    }

    /// Aplica una regla y ubica su resultado desde el primer token.
    fn located<T, F>(&mut self, rule: F) -> Parse<Located<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let start = match self.peek() {
            Some(token) => token.location().clone(),
            None => return self.fail(ParserError::UnexpectedEof),
        };

        let value = rule(self)?;
        Ok(Located::at(value, self.span_from(start)))
    }

    fn span_from(&self, start: Location) -> Location {
        Location::span(start, &self.last_known)
    }

    fn lookahead<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        rule(&mut self.clone())
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn comma_separated<T, F>(&mut self, mut rule: F, allow_empty: bool) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = match self.attempt(|s| rule(s)) {
            Err(Failure::Weak(_)) if allow_empty => return Ok(Vec::new()),
            item => vec![item.map_err(Failure::strict)?],
        };

        while self.accept(&Token::Comma) {
            items.push(rule(self).map_err(Failure::strict)?);
        }

        Ok(items)
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(token, found)),
            Err(_) => self.fail(ParserError::MissingToken(token)),
        }
    }

    /// Consume el siguiente token solo si es `token`.
    fn accept(&mut self, token: &Token) -> bool {
        let accepted = self.peek_is(token);
        if accepted {
            let _ = self.next();
        }

        accepted
    }

    fn peek(&mut self) -> Option<&'a Located<Token>> {
        self.tokens.peek().copied()
    }

    fn peek_token(&mut self) -> Option<&'a Token> {
        self.peek().map(Located::val)
    }

    fn peek_is(&mut self, token: &Token) -> bool {
        self.peek_token() == Some(token)
    }

    /// Determina si el siguiente token está en la línea del último.
    fn on_same_line(&mut self) -> bool {
        let line = self.last_known.end().line();
        self.peek()
            .map_or(false, |token| token.location().line() == line)
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Strict(Located::at(error, self.last_known.clone())))
    }
}

fn binary_operator(token: &Token) -> Option<(BinOp, u8)> {
    use BinOp::*;

    let operator = match token {
        Token::Keyword(Keyword::Or) | Token::PipePipe => (Or, 1),
        Token::Keyword(Keyword::And) | Token::AmpAmp => (And, 2),
        Token::Pipe => (BitOr, 3),
        Token::Caret => (BitXor, 4),
        Token::Amp => (BitAnd, 5),
        Token::Equal => (Equal, 6),
        Token::NotEqual => (NotEqual, 6),
        Token::Less => (Less, 7),
        Token::LessEqual => (LessOrEqual, 7),
        Token::Greater => (Greater, 7),
        Token::GreaterEqual => (GreaterOrEqual, 7),
        Token::ShiftLeft => (ShiftLeft, 8),
        Token::ShiftRight => (ShiftRight, 8),
        Token::Plus => (Add, 9),
        Token::Minus => (Sub, 9),
        Token::Times => (Mul, 10),
        Token::Slash => (Div, 10),
        Token::Percent => (Mod, 10),
        _ => return None,
    };

    Some(operator)
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Identifier(_) | Expr::Member { .. } | Expr::Subscript(..)
    )
}

/// Interpreta `a` o `a.b.c` como nombre de tipo.
fn type_path(expr: &Expr) -> Option<TypeName> {
    match expr {
        Expr::Identifier(reference) => Some(TypeName {
            path: vec![reference.name.val().clone()],
            array: false,
        }),

        Expr::Member { object, member, .. } => {
            let mut path = type_path(object.val())?;
            path.path.push(member.val().clone());

            Some(path)
        }

        _ => None,
    }
}

/// `mut Led led = 13` equivale a `mut Led led = new Led(13)`.
fn hardware_sugar(ty: &Located<TypeName>, value: Located<Expr>) -> Located<Expr> {
    let sugared = !ty.val().is_qualified()
        && !ty.val().array
        && HardwareType::from_str(ty.val().base().as_ref()).is_ok()
        && !matches!(value.val(), Expr::New { .. });

    if !sugared {
        return value;
    }

    let location = value.location().clone();
    let expr = Expr::New {
        type_name: ty.clone(),
        args: vec![value],
    };

    Located::at(expr, location)
}
