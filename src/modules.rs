//! Resolución de módulos.
//!
//! Cada `load <archivo.ys>` se sustituye por el árbol de la unidad
//! referida, obtenida mediante un [`ModuleLoader`] y procesada por las
//! mismas fases léxica y sintáctica que la unidad principal. Los `load`
//! sin extensión de código fuente (`load <Servo.h>`) se conservan como
//! inclusiones nativas.
//!
//! A lo largo de todas las unidades cargadas, exactamente una debe llevar
//! la directiva `@main`. Un programa de un solo archivo puede omitirla.

use std::{collections::HashMap, path::Path};

use thiserror::Error;

use crate::{
    error::Diagnostics,
    lex::{self, Identifier},
    parse::{
        self,
        ast::{Item, Module, Program},
    },
    source::{self, Located, Location},
};

/// Extensiones reconocidas como unidades de código fuente.
const SOURCE_EXTENSIONS: &[&str] = &["ys", "src"];

/// Colaborador que obtiene el texto de un módulo a partir de su ruta.
pub trait ModuleLoader {
    fn load(&mut self, path: &str) -> Result<String, String>;
}

impl ModuleLoader for HashMap<String, String> {
    fn load(&mut self, path: &str) -> Result<String, String> {
        self.get(path)
            .cloned()
            .ok_or_else(|| String::from("no such module"))
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Cannot load module '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Module cycle detected: {0}")]
    Cycle(String),

    #[error("Namespace '{0}' is already in use")]
    DuplicateNamespace(Identifier),

    #[error("Module path '{0}' does not name a valid namespace, use `load <...> as name`")]
    InvalidNamespace(String),

    #[error("No @main directive found in: {0}")]
    MissingMain(String),

    #[error("Multiple @main directives found in: {0}")]
    MultipleMain(String),
}

/// Resultado de resolver los módulos de una unidad principal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub has_main_directive: bool,
    pub modules: usize,
}

/// Análisis léxico y sintáctico de una unidad.
pub fn parse_unit(name: &str, source: &str) -> Result<Program, Diagnostics> {
    let text = source::consume(source, name);

    let tokens = lex::tokenize(&text).map_err(|errors| Diagnostics::from(errors).kind("Lexical error"))?;
    parse::parse(&tokens, name, text.start()).map_err(|error| Diagnostics::from(error).kind("Syntax error"))
}

/// Sustituye recursivamente cada `load` de `program`.
pub fn resolve(program: &mut Program, loader: &mut dyn ModuleLoader) -> Result<Resolution, Diagnostics> {
    let mut resolver = Resolver {
        loader,
        stack: Vec::new(),
        units: Vec::new(),
        markers: Vec::new(),
    };

    resolver.unit(program)?;

    let Resolver { units, markers, .. } = resolver;
    let modules = units.len() - 1;

    tracing::debug!(modules, "resolved modules");

    if modules > 0 && markers.len() != 1 {
        let error = match markers.get(1) {
            Some((_, location)) => {
                let names: Vec<&str> = markers.iter().map(|(name, _)| name.as_str()).collect();
                Located::at(ModuleError::MultipleMain(names.join(", ")), location.clone())
            }

            None => {
                let location = program
                    .items
                    .first()
                    .map(|item| item.location().clone())
                    .unwrap_or_else(|| program_start(program));

                Located::at(ModuleError::MissingMain(units.join(", ")), location)
            }
        };

        return Err(Diagnostics::from(error).kind("Module error"));
    }

    Ok(Resolution {
        has_main_directive: !markers.is_empty(),
        modules,
    })
}

struct Resolver<'a> {
    loader: &'a mut dyn ModuleLoader,

    /// Unidades en proceso de carga, para detectar ciclos.
    stack: Vec<String>,
    units: Vec<String>,
    markers: Vec<(String, Location)>,
}

impl Resolver<'_> {
    fn unit(&mut self, program: &mut Program) -> Result<(), Diagnostics> {
        self.units.push(program.name.clone());
        if let Some(location) = &program.main_directive {
            self.markers.push((program.name.clone(), location.clone()));
        }

        self.stack.push(program.name.clone());
        let mut namespaces: Vec<Identifier> = Vec::new();

        for item in &mut program.items {
            let load = match item.val() {
                Item::Load(load) => load.clone(),
                _ => continue,
            };

            let path = load.path.val().clone();
            if !is_source(&path) {
                *item.val_mut() = Item::NativeInclude(path);
                continue;
            }

            let namespace = match load.alias {
                Some(alias) => alias,
                None => {
                    let stem = namespace_of(&path)
                        .ok_or_else(|| module_error(ModuleError::InvalidNamespace(path.clone()), load.path.location()))?;

                    Located::at(stem, load.path.location().clone())
                }
            };

            if namespaces.contains(namespace.val()) {
                let error = ModuleError::DuplicateNamespace(namespace.val().clone());
                return Err(module_error(error, namespace.location()));
            }

            namespaces.push(namespace.val().clone());

            if let Some(start) = self.stack.iter().position(|unit| *unit == path) {
                let mut cycle = self.stack[start..].to_vec();
                cycle.push(path);

                let error = ModuleError::Cycle(cycle.join(" -> "));
                return Err(module_error(error, load.path.location()));
            }

            let source = self.loader.load(&path).map_err(|reason| {
                let error = ModuleError::LoadFailed {
                    path: path.clone(),
                    reason,
                };

                module_error(error, load.path.location())
            })?;

            tracing::trace!(module = %path, namespace = %namespace.val(), "loading module");

            let mut loaded = parse_unit(&path, &source)?;
            self.unit(&mut loaded)?;

            *item.val_mut() = Item::Module(Module {
                namespace,
                path,
                program: loaded,
                symbol: None,
            });
        }

        self.stack.pop();
        Ok(())
    }
}

fn is_source(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map_or(false, |extension| SOURCE_EXTENSIONS.contains(&extension))
}

/// Espacio de nombres implícito: el nombre del archivo sin extensión.
fn namespace_of(path: &str) -> Option<Identifier> {
    let stem = Path::new(path).file_stem()?.to_str()?;

    let mut chars = stem.chars();
    let valid = chars
        .next()
        .map_or(false, |first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    valid.then(|| Identifier::new(stem))
}

fn program_start(program: &Program) -> Location {
    source::consume("", program.name.as_str()).start()
}

fn module_error(error: ModuleError, location: &Location) -> Diagnostics {
    Diagnostics::from(Located::at(error, location.clone())).kind("Module error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_extensions() {
        assert!(is_source("lib.ys"));
        assert!(is_source("dir/lib.src"));
        assert!(!is_source("Servo.h"));
        assert!(!is_source("Wire"));
    }

    #[test]
    fn implicit_namespaces() {
        let stem = |path| namespace_of(path).map(|namespace| namespace.to_string());

        assert_eq!(stem("util.ys").as_deref(), Some("util"));
        assert_eq!(stem("dir/motor_ctl.ys").as_deref(), Some("motor_ctl"));
        assert!(namespace_of("2d-math.ys").is_none());
    }
}
