//! Diagnósticos.
//!
//! Cada fase reporta errores ubicados ([`Located`]) de su propio tipo.
//! Este módulo los reduce a [`Diagnostic`], una forma de datos planos
//! que no depende del árbol sintáctico ni de los orígenes compartidos,
//! y que por tanto puede sobrevivir a la compilación que la produjo.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Un error reportado, ya desligado de su fase de origen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
    file: String,
    line: u32,
    column: u32,
    end_column: u32,
    excerpt: Option<String>,
}

impl Diagnostic {
    /// Construye un diagnóstico a partir de un mensaje y una ubicación.
    pub fn new<M: Into<String>>(message: M, location: &Location) -> Self {
        let (start, end) = (location.start(), location.end());
        let end_column = if end.line() == start.line() {
            end.column().max(start.column() + 1)
        } else {
            start.column() + 1
        };

        Diagnostic {
            message: message.into(),
            file: location.source_name().to_owned(),
            line: start.line(),
            column: start.column(),
            end_column,
            excerpt: location.line_text(start.line()).map(String::from),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

/// Conjunto de errores de una misma fase.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    /// Etiqueta de la fase que produjo los errores.
    pub fn label(&self) -> &'static str {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter()
    }

    /// Agrega un error ubicado.
    pub fn push<E: 'static + LocatedError>(&mut self, error: E) {
        self.errors.push(reduce(&error));
    }

    /// Agrega un diagnóstico ya construido.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![reduce(&error)],
            ..Default::default()
        }
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let errors = errors.iter().map(|error| reduce(error)).collect();

        Diagnostics {
            errors,
            ..Default::default()
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.message)?;
            writeln!(fmt, " --> {}:{}:{}", error.file, error.line, error.column)?;

            let digits = error.line.to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            if let Some(excerpt) = &error.excerpt {
                writeln!(fmt, "{:>digits$} | {}", error.line, excerpt, digits = digits)?;

                let skip = (error.column - 1) as usize;
                let highlight = (error.end_column - error.column).max(1) as usize;

                writeln!(
                    fmt,
                    "{:digits$} | {:skip$}{:^<highlight$}",
                    "",
                    "",
                    "",
                    digits = digits,
                    skip = skip,
                    highlight = highlight
                )?;
            }

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

fn reduce(error: &dyn LocatedError) -> Diagnostic {
    Diagnostic::new(error.source().to_string(), error.location())
}
