//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`SourceText`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios (`#` hasta el final de la línea) se descartan
//! durante esta operación. Cada token emitido está asociado a una ubicación en
//! el código fuente original, lo cual permite rastrear errores en tanto los
//! mismos como constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores sí incluyen su lexema
//! original. Las constantes numéricas se resuelven a sus valores, junto con
//! el sufijo de unidad que les siga inmediatamente (`500ms`, `16MHz`).
//!
//! # Reglas importantes del lenguaje
//! - El lenguaje distingue mayúsculas de minúsculas.
//! - Un sufijo de unidad solo se reconoce si la palabra completa que sigue
//!   al número pertenece a [`Unit`]. En caso contrario el número termina
//!   ahí y la palabra se escanea como un identificador aparte.
//! - `@main` es una directiva por sí misma; cualquier otro `@nombre` es
//!   una directiva genérica (por ejemplo `@cpp`).
//! - Justo después de `load`, `<...>` se escanea como una ruta.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::{
    source::{Located, Position, SourceText},
    units::Unit,
};
use std::{
    borrow::Borrow,
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", i64::MAX)]
    IntOverflow,

    /// Secuencia de escape desconocida dentro de una cadena.
    #[error("Unknown escape sequence '\\{0}'")]
    BadEscape(char),

    /// Cadena sin cerrar antes del final de la línea.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Directiva `@` sin nombre.
    #[error("Expected a directive name after '@'")]
    EmptyDirective,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl Identifier {
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Valor de una constante numérica.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Display for Number {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(integer) => write!(fmt, "{}", integer),
            Number::Float(float) if float.fract() == 0.0 && float.is_finite() => {
                write!(fmt, "{:.1}", float)
            }
            Number::Float(float) => write!(fmt, "{}", float),
        }
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Constante numérica, con sufijo de unidad opcional.
    Number(Number, Option<Unit>),

    /// Literal de cadena, con escapes ya resueltos.
    Str(String),

    /// Ruta entre `<` y `>` inmediatamente después de `load`.
    Path(String),

    /// `@main`
    MainDirective,

    /// `@nombre`, cualquier directiva distinta de `@main`.
    Directive(Identifier),

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `=>`
    FatArrow,

    /// `->`
    Arrow,

    /// `...`
    Ellipsis,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `%`
    Percent,

    /// `&`
    Amp,

    /// `&&`
    AmpAmp,

    /// `|`
    Pipe,

    /// `||`
    PipePipe,

    /// `^`
    Caret,

    /// `!`
    Bang,

    /// `<<`
    ShiftLeft,

    /// `>>`
    ShiftRight,

    /// `,`
    Comma,

    /// `.`
    Period,

    /// `:`
    Colon,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `{`
    OpenCurly,

    /// `[`
    OpenSquare,

    /// `)`
    CloseParen,

    /// `}`
    CloseCurly,

    /// `]`
    CloseSquare,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Number(number, None) => write!(fmt, "literal `{}`", number),
            Number(number, Some(unit)) => write!(fmt, "literal `{}{}`", number, unit),
            Str(string) => write!(fmt, "string {:?}", string),
            Path(path) => write!(fmt, "path `<{}>`", path),
            MainDirective => fmt.write_str("`@main`"),
            Directive(name) => write!(fmt, "directive `@{}`", name),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterEqual => fmt.write_str("`>=`"),
            FatArrow => fmt.write_str("`=>`"),
            Arrow => fmt.write_str("`->`"),
            Ellipsis => fmt.write_str("`...`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Percent => fmt.write_str("`%`"),
            Amp => fmt.write_str("`&`"),
            AmpAmp => fmt.write_str("`&&`"),
            Pipe => fmt.write_str("`|`"),
            PipePipe => fmt.write_str("`||`"),
            Caret => fmt.write_str("`^`"),
            Bang => fmt.write_str("`!`"),
            ShiftLeft => fmt.write_str("`<<`"),
            ShiftRight => fmt.write_str("`>>`"),
            Comma => fmt.write_str("`,`"),
            Period => fmt.write_str("`.`"),
            Colon => fmt.write_str("`:`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            OpenCurly => fmt.write_str("`{`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseParen => fmt.write_str("`)`"),
            CloseCurly => fmt.write_str("`}`"),
            CloseSquare => fmt.write_str("`]`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Mut,
    Const,
    React,
    Fn,
    Return,
    If,
    Else,
    While,
    For,
    Repeat,
    Match,
    Switch,
    Case,
    Default,
    On,
    Interrupt,
    Task,
    Every,
    Background,
    Signal,
    Emit,
    Atomic,
    Load,
    As,
    Class,
    Struct,
    Enum,
    Constructor,
    New,
    SelfValue,
    Config,
    Alias,
    True,
    False,
    Break,
    Continue,
    And,
    Or,
    Not,
    In,
    Catch,
    Rising,
    Falling,
    Change,
}

/// Tabla de palabras clave.
///
/// `low` y `high` no son palabras clave: el parser las acepta de forma
/// contextual como modos de interrupción.
const KEYWORDS: &[(&str, Keyword)] = {
    use Keyword::*;
    &[
        ("mut",         Mut),
        ("const",       Const),
        ("react",       React),
        ("fn",          Fn),
        ("return",      Return),
        ("if",          If),
        ("else",        Else),
        ("while",       While),
        ("for",         For),
        ("repeat",      Repeat),
        ("match",       Match),
        ("switch",      Switch),
        ("case",        Case),
        ("default",     Default),
        ("on",          On),
        ("interrupt",   Interrupt),
        ("task",        Task),
        ("every",       Every),
        ("background",  Background),
        ("signal",      Signal),
        ("emit",        Emit),
        ("atomic",      Atomic),
        ("load",        Load),
        ("as",          As),
        ("class",       Class),
        ("struct",      Struct),
        ("enum",        Enum),
        ("constructor", Constructor),
        ("new",         New),
        ("self",        SelfValue),
        ("config",      Config),
        ("alias",       Alias),
        ("true",        True),
        ("false",       False),
        ("break",       Break),
        ("continue",    Continue),
        ("and",         And),
        ("or",          Or),
        ("not",         Not),
        ("in",          In),
        ("catch",       Catch),
        ("rising",      Rising),
        ("falling",     Falling),
        ("change",      Change),
    ]
};

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map(|&(name, _)| name)
            .unwrap_or("?");

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<'s> {
    text: &'s SourceText,
    cursor: usize,
    state: State,
    start: Position,
    last_accepted: Position,
    after_load: bool,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// y pasa a [`State::Start`].
    Complete(Token),

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante numérica en construcción.
    Number(NumberText),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),

    /// Nombre de una directiva después de `@`.
    Directive(String),

    /// Literal de cadena.
    Str(String),

    /// Se encontró `\` dentro de una cadena.
    Escape(String),

    /// Ruta de `load <...>`.
    Path(String),
}

/// Dígitos acumulados de una constante.
struct NumberText {
    digits: String,
    hex: bool,
    float: bool,
}

impl<'s> Lexer<'s> {
    /// Crea un lexer en estado inicial a partir de un texto fuente.
    pub fn new(text: &'s SourceText) -> Self {
        Lexer {
            text,
            cursor: 0,
            state: State::Start,
            start: Position::default(),
            last_accepted: Position::default(),
            after_load: false,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use State::*;

        loop {
            let next_char = self.peek(0);

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                if let Some(&(_, here)) = self.text.chars().get(self.cursor) {
                    self.start = here;
                }
            }

            // Operadores de uno a tres caracteres, el más largo primero
            let operator = match (&self.state, next_char) {
                (Start, Some('<')) if self.after_load => None,
                (Start, Some(_)) => self.operator(),
                _ => None,
            };

            if let Some((token, width)) = operator {
                self.skip(width);
                self.state = Complete(token);
                continue;
            }

            // Lookahead que las guardas de la tabla necesitan
            let after_load = self.after_load;
            let main_directive = self.lookahead_is("@main");
            let (hex_next, digit_next) = (self.peek_hex(1), self.peek_digit(1));

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                (Start, None) => return Ok(None),

                // `@main` se reconoce con cinco caracteres de lookahead
                (Start, Some('@')) if main_directive => {
                    self.skip(4);
                    self.state = Complete(Token::MainDirective);
                }

                (Start, Some('@')) => self.state = Directive(String::new()),
                (Start, Some('#')) => self.state = Comment,
                (Start, Some('"')) => self.state = Str(String::new()),
                (Start, Some('<')) if after_load => self.state = Path(String::new()),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume el
                // dígito, ya que esta lógica ya está implementada en
                // el respectivo caso para el estado de constante.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Number(NumberText {
                        digits: String::new(),
                        hex: false,
                        float: false,
                    });

                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => {
                    let token = std::mem::replace(token, Token::Comma);
                    return Ok(Some(token));
                }

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) | (Comment, None) => self.state = Start,
                (Comment, Some(_)) => (),

                // Prefijo hexadecimal
                (Number(number), Some('x' | 'X'))
                    if number.digits == "0" && !number.hex && hex_next =>
                {
                    number.digits.clear();
                    number.hex = true;
                }

                (Number(number), Some(c)) if number.hex && c.is_ascii_hexdigit() => {
                    number.digits.push(c)
                }

                (Number(number), Some(c)) if c.is_ascii_digit() => number.digits.push(c),

                // Un punto solo forma parte de la constante si le sigue un
                // dígito; así `0...100` se escanea como `0`, `...`, `100`
                (Number(number), Some('.'))
                    if !number.float && !number.hex && digit_next =>
                {
                    number.float = true;
                    number.digits.push('.');
                }

                // Sufijos de unidad: solo si la palabra completa es una unidad
                (Number(_), Some(c)) if c.is_ascii_alphabetic() => {
                    let word = self.word_at(self.cursor);
                    let unit = Unit::from_str(&word).ok();

                    if unit.is_some() {
                        self.skip(word.chars().count());
                    }

                    let value = self.number_value()?;
                    return Ok(Some(Token::Number(value, unit)));
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Number(_), _) => {
                    let value = self.number_value()?;
                    return Ok(Some(Token::Number(value, None)));
                }

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let word = std::mem::take(word);
                    return Ok(Some(match self::Keyword::from_str(&word) {
                        Ok(keyword) => Token::Keyword(keyword),
                        Err(()) => Token::Id(Identifier::new(&word)),
                    }));
                }

                (Directive(name), Some(c)) if is_word_char(c) => name.push(c),
                (Directive(name), _) if name.is_empty() => {
                    return Err(LexerError::EmptyDirective)
                }

                (Directive(name), _) => {
                    let name = Identifier::new(name);
                    return Ok(Some(Token::Directive(name)));
                }

                // Cadenas y secuencias de escape
                (Str(string), Some('"')) => {
                    let string = std::mem::take(string);
                    self.state = Complete(Token::Str(string));
                }

                (Str(_), Some('\n')) | (Str(_), None) | (Escape(_), None) => {
                    return Err(LexerError::UnterminatedString)
                }

                (Str(string), Some('\\')) => self.state = Escape(std::mem::take(string)),
                (Str(string), Some(c)) => string.push(c),

                (Escape(string), Some(c)) => {
                    let escaped = match c {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '"' | '\'' => c,
                        _ => return Err(LexerError::BadEscape(c)),
                    };

                    string.push(escaped);
                    self.state = Str(std::mem::take(string));
                }

                // Rutas de módulos
                (Path(path), Some('>')) => {
                    let path = std::mem::take(path).trim().to_owned();
                    self.state = Complete(Token::Path(path));
                }

                (Path(_), Some('\n')) | (Path(_), None) => return Err(LexerError::Expected('>')),
                (Path(path), Some(c)) => path.push(c),
            }

            // Si no hubo `continue` ni retorno, aquí se consume el
            // carácter que se observó con lookahead anteriormente
            self.skip(1);
        }
    }

    /// Reconoce operadores y puntuación en la posición actual.
    fn operator(&self) -> Option<(Token, usize)> {
        use Token::*;

        let (first, second, third) = (self.peek(0)?, self.peek(1), self.peek(2));
        let token = match (first, second, third) {
            ('.', Some('.'), Some('.')) => (Ellipsis, 3),
            ('=', Some('='), _) => (Equal, 2),
            ('!', Some('='), _) => (NotEqual, 2),
            ('<', Some('='), _) => (LessEqual, 2),
            ('>', Some('='), _) => (GreaterEqual, 2),
            ('=', Some('>'), _) => (FatArrow, 2),
            ('-', Some('>'), _) => (Arrow, 2),
            ('<', Some('<'), _) => (ShiftLeft, 2),
            ('>', Some('>'), _) => (ShiftRight, 2),
            ('&', Some('&'), _) => (AmpAmp, 2),
            ('|', Some('|'), _) => (PipePipe, 2),
            ('=', _, _) => (Assign, 1),
            ('<', _, _) => (Less, 1),
            ('>', _, _) => (Greater, 1),
            ('!', _, _) => (Bang, 1),
            ('-', _, _) => (Minus, 1),
            ('&', _, _) => (Amp, 1),
            ('|', _, _) => (Pipe, 1),
            ('.', _, _) => (Period, 1),
            ('+', _, _) => (Plus, 1),
            ('*', _, _) => (Times, 1),
            ('/', _, _) => (Slash, 1),
            ('%', _, _) => (Percent, 1),
            ('^', _, _) => (Caret, 1),
            (',', _, _) => (Comma, 1),
            (':', _, _) => (Colon, 1),
            (';', _, _) => (Semicolon, 1),
            ('(', _, _) => (OpenParen, 1),
            (')', _, _) => (CloseParen, 1),
            ('{', _, _) => (OpenCurly, 1),
            ('}', _, _) => (CloseCurly, 1),
            ('[', _, _) => (OpenSquare, 1),
            (']', _, _) => (CloseSquare, 1),
            _ => return None,
        };

        Some(token)
    }

    /// Convierte los dígitos acumulados a un valor.
    fn number_value(&mut self) -> Result<self::Number, LexerError> {
        let number = match &self.state {
            State::Number(number) => number,
            _ => unreachable!(),
        };

        if number.float {
            // Solo dígitos y un punto, por lo cual no puede fallar
            let value = number.digits.parse().unwrap_or(0.0);
            Ok(self::Number::Float(value))
        } else {
            let radix = if number.hex { 16 } else { 10 };
            i64::from_str_radix(&number.digits, radix)
                .map(self::Number::Int)
                .map_err(|_| LexerError::IntOverflow)
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.text
            .chars()
            .get(self.cursor + offset)
            .map(|&(c, _)| c)
    }

    fn peek_digit(&self, offset: usize) -> bool {
        self.peek(offset).map_or(false, |c| c.is_ascii_digit())
    }

    fn peek_hex(&self, offset: usize) -> bool {
        self.peek(offset).map_or(false, |c| c.is_ascii_hexdigit())
    }

    /// Determina si el texto en el cursor es exactamente `expected`,
    /// sin que le siga un carácter que extienda la palabra.
    fn lookahead_is(&self, expected: &str) -> bool {
        let width = expected.chars().count();
        let matches = expected
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c));

        matches && !self.peek(width).map_or(false, is_word_char)
    }

    /// Palabra completa que inicia en `from`.
    fn word_at(&self, from: usize) -> String {
        self.text.chars()[from..]
            .iter()
            .map(|&(c, _)| c)
            .take_while(|&c| is_word_char(c))
            .collect()
    }

    /// Consume `count` caracteres.
    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            if let Some(&(_, position)) = self.text.chars().get(self.cursor) {
                self.last_accepted = position.advance();
                self.cursor += 1;
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;
                self.after_load = token == Token::Keyword(Keyword::Load);

                let location = self.text.location(self.start, self.last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                self.after_load = false;

                let here = self
                    .text
                    .chars()
                    .get(self.cursor)
                    .map(|&(_, position)| position)
                    .unwrap_or(self.last_accepted);

                // Se consume el carácter ofensor para no reportarlo dos veces,
                // excepto un fin de línea, que es el punto de recuperación
                if self.peek(0) != Some('\n') {
                    self.skip(1);
                }

                Some(Err(Located::at(error, self.text.location(here, here.advance()))))
            }
        }
    }
}

/// Escanea un texto fuente completo.
pub fn tokenize(text: &SourceText) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
    let tokens = Lexer::new(text).try_exhaustive()?;
    tracing::trace!(tokens = tokens.len(), "lexed source");

    Ok(tokens)
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;

    fn lex(text: &str) -> Vec<Token> {
        let text = source::consume(text, "test.ys");
        tokenize(&text)
            .expect("lexing failed")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    #[test]
    fn unit_suffix_only_when_whitelisted() {
        assert_eq!(
            lex("500ms"),
            vec![Token::Number(Number::Int(500), Some(Unit::Milliseconds))]
        );

        assert_eq!(
            lex("128abc"),
            vec![
                Token::Number(Number::Int(128), None),
                Token::Id(Identifier::new("abc")),
            ]
        );
    }

    #[test]
    fn range_is_not_a_float() {
        assert_eq!(
            lex("0...100"),
            vec![
                Token::Number(Number::Int(0), None),
                Token::Ellipsis,
                Token::Number(Number::Int(100), None),
            ]
        );
    }

    #[test]
    fn hex_and_float() {
        assert_eq!(
            lex("0xFF 2.5"),
            vec![
                Token::Number(Number::Int(255), None),
                Token::Number(Number::Float(2.5), None),
            ]
        );
    }

    #[test]
    fn main_directive_is_distinct() {
        assert_eq!(
            lex("@main @cpp @mainly"),
            vec![
                Token::MainDirective,
                Token::Directive(Identifier::new("cpp")),
                Token::Directive(Identifier::new("mainly")),
            ]
        );
    }

    #[test]
    fn load_path() {
        assert_eq!(
            lex("load <lib.ys> as L"),
            vec![
                Token::Keyword(Keyword::Load),
                Token::Path("lib.ys".into()),
                Token::Keyword(Keyword::As),
                Token::Id(Identifier::new("L")),
            ]
        );
    }

    #[test]
    fn longest_operator_first() {
        assert_eq!(
            lex("a <= b => c -> d == e"),
            vec![
                Token::Id(Identifier::new("a")),
                Token::LessEqual,
                Token::Id(Identifier::new("b")),
                Token::FatArrow,
                Token::Id(Identifier::new("c")),
                Token::Arrow,
                Token::Id(Identifier::new("d")),
                Token::Equal,
                Token::Id(Identifier::new("e")),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(lex(r#""a\n\"b""#), vec![Token::Str("a\n\"b".into())]);
    }

    #[test]
    fn bad_character_position() {
        let text = source::consume("mut int x = 1\n  $", "test.ys");
        let errors = tokenize(&text).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].val(), LexerError::BadChar('$')));
        assert_eq!(errors[0].location().start().line(), 2);
        assert_eq!(errors[0].location().start().column(), 3);
    }
}
