//! Compilador de YS a C++ para Arduino.
//!
//! # Front end
//! Cada compilación parte de una unidad principal. Esta se somete primero
//! a análisis léxico en [`lex`], de lo cual se obtiene un flujo de
//! tokens. El flujo de tokens se dispone en un AST por medio de análisis
//! sintáctico en [`parse`]. Cada `load` de un archivo fuente es resuelto
//! en [`modules`] con ayuda de un [`ModuleLoader`] externo, repitiendo
//! ambas fases sobre la unidad cargada.
//!
//! El árbol completo se somete luego a análisis semántico en
//! [`semantic`], que asigna a cada nombre su símbolo, y a verificación de
//! interrupciones en [`interrupt`], de la cual se deriva el conjunto de
//! variables volátiles.
//!
//! # Back end
//! En esta sección el compilador deja de ser agnóstico a la placa.
//! Los literales con unidades y las restricciones de rango se resuelven
//! en [`units`]. Los tipos de hardware se planifican en [`hardware`]
//! según la familia de la placa elegida en [`config`], y finalmente
//! [`codegen`] emite un único archivo fuente para la toolchain de
//! Arduino. La compilación y carga del programa resultante se delegan
//! a dicha toolchain.

#[macro_use]
mod macros;

pub mod codegen;
pub mod config;
pub mod error;
pub mod hardware;
pub mod interrupt;
pub mod lex;
pub mod modules;
pub mod parse;
pub mod semantic;
pub mod source;
pub mod units;

use std::collections::BTreeSet;

use crate::{
    codegen::{Context, EmitFlags},
    config::{Board, BoardConfig},
    error::{Diagnostic, Diagnostics},
    parse::ast::{Item, Program},
};

pub use crate::modules::ModuleLoader;

/// Nombre de la unidad principal cuando no proviene de un archivo.
pub const MAIN_UNIT: &str = "main.ys";

/// Opciones de compilación ajenas al código fuente.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Sustituye la placa indicada por el bloque `config`.
    pub board: Option<Board>,
    pub flags: EmitFlags,
}

/// Resultado de una compilación exitosa.
#[derive(Clone, Debug)]
pub struct Compilation {
    pub code: String,
    pub has_main_directive: bool,
    pub volatile_names: BTreeSet<String>,
    pub board: BoardConfig,
    pub pwm_channels: Vec<(String, u8)>,
}

/// Compila una unidad principal con las opciones por omisión.
pub fn compile(source: &str, loader: &mut dyn ModuleLoader) -> Result<Compilation, Diagnostics> {
    compile_unit(MAIN_UNIT, source, loader, &CompileOptions::default())
}

/// Compila la unidad principal `name`.
pub fn compile_unit(
    name: &str,
    source: &str,
    loader: &mut dyn ModuleLoader,
    options: &CompileOptions,
) -> Result<Compilation, Diagnostics> {
    let mut program = modules::parse_unit(name, source)?;
    tracing::debug!(unit = name, items = program.items.len(), "parsed main unit");

    let resolution = modules::resolve(&mut program, loader)?;

    let mut board = BoardConfig::from_block(config_block(&program))
        .map_err(|errors| Diagnostics::from(errors).kind("Semantic error"))?;

    if let Some(override_board) = options.board {
        board.board = override_board;
    }

    let table = semantic::analyze(&mut program)
        .map_err(|errors| Diagnostics::from(errors).kind("Semantic error"))?;

    let volatile = interrupt::check(&program, &table)
        .map_err(|errors| Diagnostics::from(errors).kind("Interrupt safety error"))?;

    units::resolve(&mut program).map_err(|errors| Diagnostics::from(errors).kind("Semantic error"))?;

    let plan = hardware::plan(&program, &table, &board)
        .map_err(|errors| Diagnostics::from(errors).kind("Hardware error"))?;

    let context = Context {
        table: &table,
        volatile: &volatile,
        plan: &plan,
        config: &board,
        flags: options.flags,
    };

    let mut code = String::new();
    if codegen::emit(&program, context, &mut code).is_err() {
        let mut diagnostics = Diagnostics::default().kind("Code generation error");
        let location = source::consume(source, name).start();
        diagnostics.push_diagnostic(Diagnostic::new("Failed to emit generated code", &location));

        return Err(diagnostics);
    }

    let volatile_names = volatile.names(&table);
    let pwm_channels = plan.channels().to_vec();

    Ok(Compilation {
        code,
        has_main_directive: resolution.has_main_directive,
        volatile_names,
        board,
        pwm_channels,
    })
}

fn config_block(program: &Program) -> Option<&parse::ast::ConfigBlock> {
    program.items.iter().find_map(|item| match item.val() {
        Item::Config(block) => Some(block),
        _ => None,
    })
}
