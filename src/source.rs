//! Ubicaciones en los archivos `.ys`.
//!
//! Tokens, nodos del AST y errores de todas las fases cargan un
//! [`Location`]: archivo, línea y rango de columnas. Cada unidad de compilación (el archivo principal y cada módulo
//! cargado con `load`) tiene su propio [`Source`], de modo que los
//! diagnósticos siempre identifican el archivo de origen correcto.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

const TAB_STOP: u32 = 4;

/// Valor junto al fragmento de código que lo produjo.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn val_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Conserva la ubicación y reemplaza el valor.
    pub fn map<U>(self, map: impl FnOnce(T) -> U) -> Located<U> {
        let Located { location, value } = self;
        Located::at(map(value), location)
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Archivo de origen más el rango `[start, end)` dentro de él.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Desde el inicio de `from` hasta el final de `to`, en el mismo archivo.
    pub fn span(from: Location, to: &Location) -> Self {
        let Location { from: source, position } = from;
        Location {
            from: source,
            position: position.start..to.position.end,
        }
    }

    pub fn start(&self) -> Position {
        self.position.start
    }

    pub fn end(&self) -> Position {
        self.position.end
    }

    pub fn line(&self) -> u32 {
        self.position.start.line
    }

    /// Nombre del archivo de origen.
    pub fn source_name(&self) -> &str {
        &self.from.name
    }

    /// Texto de una línea del archivo de origen, si existe.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        self.from.lines.get(index).map(String::as_str)
    }
}

/// `archivo:línea:columna`, con la columna final si el rango ocupa
/// más de un carácter de la misma línea.
impl Display for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let Range { start, end } = self.position;
        write!(fmt, "{}:{}", self.from.name, start)?;

        if end.line == start.line && end.column > start.column + 1 {
            write!(fmt, "-{}", end.column - 1)?;
        }

        Ok(())
    }
}

impl Debug for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

/// Línea y columna, ambas desde 1.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Columna siguiente en la misma línea.
    pub fn advance(self) -> Position {
        Position {
            column: self.column + 1,
            ..self
        }
    }

    /// Posición del carácter que sigue a `c`. Los tabuladores saltan
    /// al siguiente múltiplo de [`TAB_STOP`].
    pub fn after(self, c: char) -> Position {
        match c {
            '\n' => Position {
                line: self.line + 1,
                column: 1,
            },

            '\t' => Position {
                column: 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP,
                ..self
            },

            _ => self.advance(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de origen y líneas originales.
struct Source {
    name: String,
    lines: Vec<String>,
}

/// Texto fuente descompuesto carácter por carácter.
///
/// Cada carácter va acompañado de su propia posición. Al final
/// del flujo siempre se agrega un `'\n'` virtual, lo cual simplifica
/// el cierre de tokens pendientes en el lexer.
pub struct SourceText {
    source: Rc<Source>,
    chars: Vec<(char, Position)>,
}

impl SourceText {
    /// Caracteres del texto con sus posiciones.
    pub fn chars(&self) -> &[(char, Position)] {
        &self.chars
    }

    /// Construye una ubicación dentro de este origen.
    pub fn location(&self, from: Position, to: Position) -> Location {
        Location {
            from: Rc::clone(&self.source),
            position: from..to,
        }
    }

    /// Ubicación del inicio del archivo.
    pub fn start(&self) -> Location {
        let start = Position::default();
        self.location(start, start.advance())
    }

    /// Ubicación inmediatamente después del último carácter.
    pub fn eof(&self) -> Location {
        let end = self
            .chars
            .last()
            .map(|&(_, position)| position)
            .unwrap_or_default();

        self.location(end, end.advance())
    }
}

/// Prepara un texto fuente para análisis léxico.
///
/// La posición asociada a cada carácter es la que le corresponde
/// en el archivo original, tomando en cuenta tabuladores.
pub fn consume<S: Into<String>>(text: &str, name: S) -> SourceText {
    let lines: Vec<String> = text.lines().map(String::from).collect();
    let source = Rc::new(Source {
        name: name.into(),
        lines,
    });

    let mut chars = Vec::with_capacity(text.len() + 1);
    let mut here = Position::default();

    for c in text.chars().filter(|&c| c != '\r').chain(std::iter::once('\n')) {
        chars.push((c, here));
        here = here.after(c);
    }

    SourceText { source, chars }
}
