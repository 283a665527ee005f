//! Seguridad de interrupciones e inferencia de `volatile`.
//!
//! Los cuerpos de `interrupt` se ejecutan por preempción en cualquier
//! punto del programa. Esta fase rechaza dentro de ellos, a cualquier
//! profundidad, las construcciones que bloquean o que no son reentrantes:
//! ciclos, salida serie, esperas y llamadas a funciones del usuario.
//!
//! Al mismo tiempo se construye el conjunto de variables volátiles: toda
//! variable global o de módulo referida desde algún cuerpo de
//! interrupción, más toda variable `react`. La identidad de cada
//! variable es su [`SymbolId`], no su nombre.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::{
    lex::Identifier,
    parse::{
        ast::*,
        visit::{self, Visit},
    },
    semantic::{SymbolKind, SymbolTable},
    source::Located,
};

/// Funciones predefinidas que bloquean o escriben al puerto serie.
pub const FORBIDDEN_BUILTINS: &[&str] = &["print", "println", "delay", "delayMicros", "wait"];

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InterruptError {
    #[error("loops are not allowed in interrupts")]
    Loop,

    #[error("{0}() is not allowed in interrupts")]
    ForbiddenCall(String),

    #[error("calls to function '{0}' are not allowed in interrupts")]
    FunctionCall(String),
}

/// Conjunto de variables que se emiten con calificador `volatile`.
///
/// Solo admite inserciones. Una vez que [`check`] retorna, el conjunto
/// ya no cambia.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolatileSet(BTreeSet<SymbolId>);

impl VolatileSet {
    pub fn contains(&self, symbol: SymbolId) -> bool {
        self.0.contains(&symbol)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.0.iter().copied()
    }

    /// Nombres calificados por módulo (`L.count`).
    pub fn names(&self, table: &SymbolTable) -> BTreeSet<String> {
        self.iter().map(|id| table.qualified_name(id, ".")).collect()
    }

    fn insert(&mut self, symbol: SymbolId) {
        self.0.insert(symbol);
    }
}

/// Verifica todos los cuerpos de interrupción del programa.
pub fn check(program: &Program, table: &SymbolTable) -> Result<VolatileSet, Vec<Located<InterruptError>>> {
    let mut collector = Collector {
        table,
        volatile: VolatileSet::default(),
        errors: Vec::new(),
        interrupts: 0,
    };

    visit::walk_program(&mut collector, program);

    let Collector {
        volatile,
        errors,
        interrupts,
        ..
    } = collector;

    if errors.is_empty() {
        tracing::debug!(interrupts, volatile = volatile.len(), "interrupt bodies verified");
        Ok(volatile)
    } else {
        Err(errors)
    }
}

struct Collector<'a> {
    table: &'a SymbolTable,
    volatile: VolatileSet,
    errors: Vec<Located<InterruptError>>,
    interrupts: usize,
}

impl Visit for Collector<'_> {
    fn visit_item(&mut self, item: &Located<Item>) {
        match item.as_ref() {
            Item::Interrupt(interrupt) => {
                self.interrupts += 1;

                let mut body = InterruptBody {
                    table: self.table,
                    volatile: &mut self.volatile,
                    errors: &mut self.errors,
                };

                // El pin se evalúa al registrar, fuera del cuerpo
                body.visit_block(&interrupt.body);
            }

            _ => visit::walk_item(self, item),
        }
    }

    fn visit_var(&mut self, var: &VarDecl) {
        if var.is_reactive() {
            if let Some(symbol) = var.symbol {
                self.volatile.insert(symbol);
            }
        }

        visit::walk_var(self, var);
    }
}

/// Recorrido de un único cuerpo de interrupción.
struct InterruptBody<'a> {
    table: &'a SymbolTable,
    volatile: &'a mut VolatileSet,
    errors: &'a mut Vec<Located<InterruptError>>,
}

impl InterruptBody<'_> {
    fn error(&mut self, error: InterruptError, location: &crate::source::Location) {
        self.errors.push(Located::at(error, location.clone()));
    }

    fn shared(&mut self, symbol: Option<SymbolId>) {
        if let Some(id) = symbol {
            if self.table.kind(id) == SymbolKind::Var && self.table.is_global(id) {
                self.volatile.insert(id);
            }
        }
    }

    fn call(&mut self, callee: &Located<Expr>) {
        let forbidden = match callee.as_ref() {
            Expr::Identifier(Reference {
                name,
                symbol: Some(id),
            }) => match self.table.kind(*id) {
                SymbolKind::Builtin if FORBIDDEN_BUILTINS.contains(&name.val().as_ref()) => {
                    Some(InterruptError::ForbiddenCall(name.val().to_string()))
                }

                SymbolKind::Function => {
                    Some(InterruptError::FunctionCall(self.table.qualified_name(*id, ".")))
                }

                _ => None,
            },

            Expr::Member { object, member, symbol } => match (object.val(), symbol) {
                (
                    Expr::Identifier(Reference {
                        name,
                        symbol: Some(owner),
                    }),
                    _,
                ) if self.table.kind(*owner) == SymbolKind::Builtin => {
                    Some(InterruptError::ForbiddenCall(format!("{}.{}", name.val(), member.val())))
                }

                (_, Some(id)) if self.table.kind(*id) == SymbolKind::Function => {
                    Some(InterruptError::FunctionCall(self.table.qualified_name(*id, ".")))
                }

                (object, None) => self.method(object, member.val()),
                _ => None,
            },

            _ => None,
        };

        if let Some(error) = forbidden {
            self.error(error, callee.location());
        }
    }

    /// Métodos de instancias de clases del usuario. Las instancias de
    /// tipos de hardware no tienen clase y se permiten.
    fn method(&self, object: &Expr, method: &Identifier) -> Option<InterruptError> {
        let instance = instance_symbol(object)?;
        let class = self.table.type_of(instance)?;

        if self.table.kind(class) != SymbolKind::Class {
            return None;
        }

        let class = self.table.qualified_name(class, ".");
        Some(InterruptError::FunctionCall(format!("{}.{}", class, method)))
    }
}

fn instance_symbol(object: &Expr) -> Option<SymbolId> {
    match object {
        Expr::Identifier(reference) => reference.symbol,
        Expr::Member { symbol, .. } => *symbol,
        Expr::Subscript(array, _) => instance_symbol(array.val()),
        _ => None,
    }
}

impl Visit for InterruptBody<'_> {
    fn visit_statement(&mut self, statement: &Located<Statement>) {
        if let Statement::While { .. } | Statement::For { .. } | Statement::Repeat { .. } =
            statement.as_ref()
        {
            self.error(InterruptError::Loop, statement.location());
        }

        visit::walk_statement(self, statement);
    }

    fn visit_expr(&mut self, expr: &Located<Expr>) {
        match expr.as_ref() {
            Expr::Identifier(reference) => self.shared(reference.symbol),
            Expr::Member { symbol, .. } => self.shared(*symbol),
            Expr::Call { callee, .. } => self.call(callee),
            _ => (),
        }

        visit::walk_expr(self, expr);
    }
}
