//! Análisis semántico.
//!
//! Esta fase recorre el árbol ya resuelto por módulos manteniendo una
//! cadena de ámbitos. Cada referencia a un nombre se resuelve contra el
//! ámbito más cercano que lo declare, y la identidad resultante
//! ([`SymbolId`]) se escribe en el mismo árbol para uso de las fases
//! posteriores.
//!
//! Funciones, tipos, señales, tareas y módulos se declaran antes de
//! recorrer los cuerpos, por lo cual pueden usarse antes de su
//! declaración textual. Las variables, constantes y `alias` solo son
//! visibles a partir de su declaración. El inicializador de una variable
//! se resuelve antes de insertar la variable, así que `mut int x = x + 1`
//! siempre es un error.
//!
//! Los errores de esta fase no detienen el recorrido: se acumulan y se
//! reportan todos juntos.

mod scope;
mod suggest;

use std::str::FromStr;

use thiserror::Error;

use crate::{
    hardware::HardwareType,
    lex::Identifier,
    parse::ast::*,
    source::Located,
};

pub use scope::{ScopeId, ScopeKind, Symbol, SymbolKind, SymbolTable};
pub use suggest::{suggest, Suggestions};

/// Funciones predefinidas, visibles desde todo ámbito.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "print",
    "println",
    "delay",
    "wait",
    "delayMicros",
    "millis",
    "micros",
    "digitalRead",
    "digitalWrite",
    "analogRead",
    "analogWrite",
    "pinMode",
    "abs",
    "min",
    "max",
    "map",
    "constrain",
    "random",
    "sqrt",
    "pow",
    "sin",
    "cos",
];

/// Constantes y objetos predefinidos.
pub const BUILTIN_CONSTANTS: &[&str] = &[
    "HIGH",
    "LOW",
    "INPUT",
    "OUTPUT",
    "INPUT_PULLUP",
    "PI",
    "Serial",
];

/// Tipos primitivos del lenguaje.
pub const PRIMITIVE_TYPES: &[&str] = &[
    "int", "float", "bool", "string", "byte", "long", "char", "void",
];

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Undefined variable '{name}'{suggestions}")]
    Undefined {
        name: Identifier,
        suggestions: Suggestions,
    },

    #[error("Variable '{0}' cannot be used in its own initializer")]
    SelfReference(Identifier),

    #[error("'{0}' is already declared in this scope")]
    Redeclaration(Identifier),

    #[error("Cannot assign to constant '{0}'")]
    ConstantAssignment(String),

    #[error("Unknown type '{0}'")]
    UnknownType(TypeName),

    #[error("'{owner}' has no member '{member}'")]
    UnknownMember { owner: String, member: Identifier },

    #[error("Struct '{structure}' has no field '{field}'")]
    UnknownField {
        structure: TypeName,
        field: Identifier,
    },

    #[error("'{0}' is not a struct")]
    NotAStruct(TypeName),

    #[error("'{0}' is not a signal")]
    NotASignal(Identifier),

    #[error("`self` can only be used inside a class")]
    SelfOutsideClass,

    #[error("`{0}` outside of a loop")]
    OutsideLoop(&'static str),
}

/// Resuelve todos los nombres de un programa.
///
/// En caso de éxito, cada campo `symbol` alcanzable del árbol queda
/// asignado y se retorna la tabla de símbolos correspondiente.
pub fn analyze(program: &mut Program) -> Result<SymbolTable, Vec<Located<SemanticError>>> {
    let mut table = SymbolTable::new();
    let root = table.root();

    for &name in BUILTIN_FUNCTIONS.iter().chain(BUILTIN_CONSTANTS) {
        let builtin = Symbol {
            name: Identifier::new(name),
            kind: SymbolKind::Builtin,
            declared_type: None,
            scope: root,
            members: None,
        };

        // Los nombres predefinidos son distintos entre sí
        let _ = table.declare(root, builtin);
    }

    let global = table.push_scope(root, ScopeKind::Global);
    let mut context = Context {
        table,
        errors: Vec::new(),
        scope: global,
        class: None,
        declaring: None,
    };

    context.unit(program);

    let Context { table, errors, .. } = context;
    if errors.is_empty() {
        tracing::debug!(unit = %program.name, "semantic analysis complete");
        Ok(table)
    } else {
        Err(errors)
    }
}

struct Context {
    table: SymbolTable,
    errors: Vec<Located<SemanticError>>,
    scope: ScopeId,

    /// Clase cuyo constructor o método se está analizando.
    class: Option<SymbolId>,

    /// Variable cuyo inicializador se está analizando.
    declaring: Option<Identifier>,
}

impl Context {
    fn unit(&mut self, program: &mut Program) {
        for item in &mut program.items {
            self.hoist(item);
        }

        for item in &mut program.items {
            self.item(item);
        }
    }

    fn hoist(&mut self, item: &mut Located<Item>) {
        match item.val_mut() {
            Item::Function(function) => {
                let ty = function.return_type.as_ref().map(type_string);
                function.symbol = self.declare(&function.name, SymbolKind::Function, ty);
            }

            Item::Class(class) => {
                let id = self.declare(&class.name, SymbolKind::Class, None);
                let members = self.table.push_scope(self.scope, ScopeKind::Members);

                for field in &mut class.fields {
                    let field = field.val_mut();
                    let kind = if field.is_mutable() {
                        SymbolKind::Field
                    } else {
                        SymbolKind::Const
                    };

                    let ty = Some(type_string(&field.declared_type));
                    field.symbol = self.declare_in(members, &field.name, kind, ty);
                }

                for method in &mut class.methods {
                    let method = method.val_mut();
                    let ty = method.return_type.as_ref().map(type_string);
                    method.symbol = self.declare_in(members, &method.name, SymbolKind::Function, ty);
                }

                if let Some(id) = id {
                    self.table.set_members(id, members);
                }

                class.symbol = id;
            }

            Item::Enum(enumeration) => {
                let id = self.declare(&enumeration.name, SymbolKind::Enum, None);
                let members = self.table.push_scope(self.scope, ScopeKind::Members);
                let owner = Some(enumeration.name.val().to_string());

                for variant in &enumeration.variants {
                    self.declare_in(members, variant, SymbolKind::Variant, owner.clone());
                    self.declare(variant, SymbolKind::Variant, owner.clone());
                }

                if let Some(id) = id {
                    self.table.set_members(id, members);
                }

                enumeration.symbol = id;
            }

            Item::Struct(structure) => {
                let id = self.declare(&structure.name, SymbolKind::Struct, None);
                let members = self.table.push_scope(self.scope, ScopeKind::Members);

                for field in &structure.fields {
                    let ty = Some(type_string(&field.ty));
                    self.declare_in(members, &field.name, SymbolKind::Field, ty);
                }

                if let Some(id) = id {
                    self.table.set_members(id, members);
                }

                structure.symbol = id;
            }

            Item::Signal(signal) => {
                signal.symbol = self.declare(&signal.name, SymbolKind::Signal, None);
            }

            Item::Task(task) => {
                task.symbol = self.declare(&task.name, SymbolKind::Task, None);
            }

            Item::Module(module) => {
                let namespace = match self.table.namespace_of(self.scope) {
                    Some(outer) => format!("{}.{}", outer, module.namespace.val()),
                    None => module.namespace.val().to_string(),
                };

                // Un módulo se analiza completo antes que quien lo carga
                let scope = self.table.push_module(namespace);
                let outer = std::mem::replace(&mut self.scope, scope);
                self.unit(&mut module.program);
                self.scope = outer;

                module.symbol = self.declare(&module.namespace, SymbolKind::ModuleAlias, None);
                if let Some(id) = module.symbol {
                    self.table.set_members(id, scope);
                }
            }

            _ => (),
        }
    }

    fn item(&mut self, item: &mut Located<Item>) {
        match item.val_mut() {
            Item::Var(var) => self.var(var),

            Item::Alias(alias) => {
                self.expr(&mut alias.value);
                alias.symbol = self.declare(&alias.name, SymbolKind::Const, None);
            }

            Item::Function(function) => self.callable(
                &mut function.params,
                function.return_type.as_ref(),
                &mut function.body,
                ScopeKind::Function,
            ),

            Item::Class(class) => {
                for field in &mut class.fields {
                    let field = field.val_mut();
                    self.check_type(&field.declared_type);

                    if let Some(initializer) = &mut field.initializer {
                        let previous = self.declaring.replace(field.name.val().clone());
                        self.expr(initializer);
                        self.declaring = previous;
                    }
                }

                let outer = std::mem::replace(&mut self.class, class.symbol);

                if let Some(constructor) = &mut class.constructor {
                    self.callable(
                        &mut constructor.params,
                        None,
                        &mut constructor.body,
                        ScopeKind::Method,
                    );
                }

                for method in &mut class.methods {
                    let method = method.val_mut();
                    self.callable(
                        &mut method.params,
                        method.return_type.as_ref(),
                        &mut method.body,
                        ScopeKind::Method,
                    );
                }

                self.class = outer;
            }

            Item::Struct(structure) => {
                for field in &structure.fields {
                    self.check_type(&field.ty);
                }
            }

            Item::Event(event) => {
                if let EventKind::Signal(signal) = &mut event.kind {
                    self.signal(signal);
                }

                self.body(&mut event.body, ScopeKind::Function);
            }

            Item::Interrupt(interrupt) => {
                self.expr(&mut interrupt.pin);
                self.body(&mut interrupt.body, ScopeKind::Function);
            }

            Item::Task(task) => {
                if let Schedule::Every(period) = &mut task.schedule {
                    self.expr(period);
                }

                self.body(&mut task.body, ScopeKind::Function);
            }

            Item::Config(_)
            | Item::Load(_)
            | Item::Module(_)
            | Item::NativeInclude(_)
            | Item::Enum(_)
            | Item::Signal(_)
            | Item::Native(_) => (),
        }
    }

    fn callable(
        &mut self,
        params: &mut [Param],
        return_type: Option<&Located<TypeName>>,
        body: &mut [Located<Statement>],
        kind: ScopeKind,
    ) {
        if let Some(ty) = return_type {
            self.check_type(ty);
        }

        let outer = self.enter(kind);
        for param in params {
            self.check_type(&param.ty);

            let ty = Some(type_string(&param.ty));
            param.symbol = self.declare(&param.name, SymbolKind::Param, ty);
        }

        self.statements(body);
        self.leave(outer);
    }

    fn var(&mut self, var: &mut VarDecl) {
        self.check_type(&var.declared_type);
        if let Some(range) = &mut var.range {
            self.expr(&mut range.min);
            self.expr(&mut range.max);
        }

        let kind = if var.is_mutable() {
            SymbolKind::Var
        } else {
            SymbolKind::Const
        };

        // El manejador de `catch` ya puede referirse a la variable
        let mut handler = None;
        let previous = self.declaring.replace(var.name.val().clone());

        match var.initializer.as_mut() {
            Some(initializer) if initializer.val().is_catch() => {
                if let Expr::Catch {
                    value,
                    handler: block,
                } = initializer.val_mut()
                {
                    self.expr(value);
                    handler = Some(block);
                }
            }

            Some(initializer) => self.expr(initializer),
            None => (),
        }

        self.declaring = previous;

        let ty = Some(type_string(&var.declared_type));
        var.symbol = self.declare(&var.name, kind, ty);

        if let Some(handler) = handler {
            self.body(handler, ScopeKind::Block);
        }
    }

    fn body(&mut self, body: &mut [Located<Statement>], kind: ScopeKind) {
        let outer = self.enter(kind);
        self.statements(body);
        self.leave(outer);
    }

    fn statements(&mut self, statements: &mut [Located<Statement>]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &mut Located<Statement>) {
        let location = statement.location().clone();

        match statement.val_mut() {
            Statement::Var(var) => self.var(var),

            Statement::Assign { target, value } => {
                self.expr(target);
                self.expr(value);
                self.check_assignable(target);
            }

            Statement::Expr(expr) => self.expr(expr),

            Statement::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    self.expr(condition);
                    self.body(body, ScopeKind::Block);
                }

                if let Some(otherwise) = otherwise {
                    self.body(otherwise, ScopeKind::Block);
                }
            }

            Statement::While { condition, body } => {
                self.expr(condition);
                self.body(body, ScopeKind::Loop);
            }

            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                // La variable de inducción no sobrevive al ciclo
                let outer = self.enter(ScopeKind::Loop);

                if let Some(init) = init {
                    self.statement(init);
                }

                if let Some(condition) = condition {
                    self.expr(condition);
                }

                if let Some(update) = update {
                    self.statement(update);
                }

                self.body(body, ScopeKind::Block);
                self.leave(outer);
            }

            Statement::Repeat { count, body } => {
                self.expr(count);
                self.body(body, ScopeKind::Loop);
            }

            Statement::Match(stmt) => {
                self.expr(&mut stmt.subject);
                for arm in &mut stmt.arms {
                    for pattern in &mut arm.patterns {
                        if let Pattern::Value(value) = pattern.val_mut() {
                            self.expr(value);
                        }
                    }

                    self.body(&mut arm.body, ScopeKind::Block);
                }
            }

            Statement::Switch(stmt) => {
                self.expr(&mut stmt.subject);
                for case in &mut stmt.cases {
                    self.expr(&mut case.value);
                    self.body(&mut case.body, ScopeKind::Block);
                }

                if let Some(default) = &mut stmt.default {
                    self.body(default, ScopeKind::Block);
                }
            }

            Statement::Atomic(body) => self.body(body, ScopeKind::Block),
            Statement::Emit(signal) => self.signal(signal),

            Statement::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }

            Statement::Break if !self.table.in_loop(self.scope) => {
                self.error(SemanticError::OutsideLoop("break"), location)
            }

            Statement::Continue if !self.table.in_loop(self.scope) => {
                self.error(SemanticError::OutsideLoop("continue"), location)
            }

            Statement::Break | Statement::Continue | Statement::Native(_) => (),
        }
    }

    fn expr(&mut self, expr: &mut Located<Expr>) {
        let location = expr.location().clone();

        match expr.val_mut() {
            Expr::Literal(_) => (),
            Expr::Identifier(reference) => self.reference(reference),

            Expr::SelfValue => {
                if self.class.is_none() {
                    self.error(SemanticError::SelfOutsideClass, location);
                }
            }

            Expr::Binary(left, _, right) => {
                self.expr(left);
                self.expr(right);
            }

            Expr::Unary(_, operand) => self.expr(operand),

            Expr::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }

            Expr::Member {
                object,
                member,
                symbol,
            } => {
                self.expr(object);
                *symbol = self.member(object, member);
            }

            Expr::New { type_name, args } => {
                self.check_type(type_name);
                for arg in args {
                    self.expr(arg);
                }
            }

            Expr::Array(elements) => {
                for element in elements {
                    self.expr(element);
                }
            }

            Expr::Subscript(array, index) => {
                self.expr(array);
                self.expr(index);
            }

            Expr::Convert { value, target } => {
                self.expr(value);
                self.check_type(target);
            }

            Expr::Catch { value, handler } => {
                self.expr(value);
                self.body(handler, ScopeKind::Block);
            }

            Expr::StructLiteral { type_name, fields } => {
                for (_, value) in fields.iter_mut() {
                    self.expr(value);
                }

                self.struct_literal(type_name, fields);
            }

            Expr::Clamp { value, min, max } => {
                self.expr(value);
                self.expr(min);
                self.expr(max);
            }
        }
    }

    fn reference(&mut self, reference: &mut Reference) {
        let (location, name) = (reference.name.location(), reference.name.val());

        if self.declaring.as_ref() == Some(name) {
            let error = SemanticError::SelfReference(name.clone());
            self.error(error, location.clone());
            return;
        }

        match self.table.lookup(self.scope, name.as_ref()) {
            Some(id) => reference.symbol = Some(id),
            None => {
                let suggestions = suggest(name.as_ref(), self.table.visible(self.scope));
                let error = SemanticError::Undefined {
                    name: name.clone(),
                    suggestions,
                };

                self.error(error, location.clone());
            }
        }
    }

    /// Resuelve `objeto.miembro` cuando el objeto tiene miembros conocidos
    /// de forma estática: `self`, alias de módulo y enumeraciones.
    fn member(&mut self, object: &Located<Expr>, member: &Located<Identifier>) -> Option<SymbolId> {
        let owner = match object.val() {
            Expr::SelfValue => self.class?,

            Expr::Identifier(Reference {
                symbol: Some(id), ..
            })
            | Expr::Member {
                symbol: Some(id), ..
            } => match self.table.kind(*id) {
                SymbolKind::ModuleAlias | SymbolKind::Enum => *id,
                _ => return None,
            },

            _ => return None,
        };

        let members = self.table.get(owner).members?;
        match self.table.member(members, member.val().as_ref()) {
            Some(id) => Some(id),
            None => {
                let error = SemanticError::UnknownMember {
                    owner: self.table.qualified_name(owner, "."),
                    member: member.val().clone(),
                };

                self.error(error, member.location().clone());
                None
            }
        }
    }

    fn signal(&mut self, signal: &mut Reference) {
        self.reference(signal);

        if let Some(id) = signal.symbol {
            if self.table.kind(id) != SymbolKind::Signal {
                let error = SemanticError::NotASignal(signal.name.val().clone());
                self.error(error, signal.name.location().clone());
            }
        }
    }

    fn struct_literal(
        &mut self,
        type_name: &Located<TypeName>,
        fields: &[(Located<Identifier>, Located<Expr>)],
    ) {
        let id = match self.resolve_path(&type_name.val().path) {
            Some(id) if self.table.kind(id) == SymbolKind::Struct => id,
            Some(_) => {
                let error = SemanticError::NotAStruct(type_name.val().clone());
                return self.error(error, type_name.location().clone());
            }

            None => {
                let error = SemanticError::UnknownType(type_name.val().clone());
                return self.error(error, type_name.location().clone());
            }
        };

        let members = match self.table.get(id).members {
            Some(members) => members,
            None => return,
        };

        for (field, _) in fields {
            if self.table.member(members, field.val().as_ref()).is_none() {
                let error = SemanticError::UnknownField {
                    structure: type_name.val().clone(),
                    field: field.val().clone(),
                };

                self.error(error, field.location().clone());
            }
        }
    }

    fn check_assignable(&mut self, target: &Located<Expr>) {
        let symbol = match target.val() {
            Expr::Identifier(reference) => reference.symbol,
            Expr::Member { symbol, .. } => *symbol,
            _ => None,
        };

        if let Some(id) = symbol {
            if !self.table.kind(id).is_assignable() {
                let name = self.table.qualified_name(id, ".");
                self.error(SemanticError::ConstantAssignment(name), target.location().clone());
            }
        }
    }

    fn check_type(&mut self, ty: &Located<TypeName>) {
        let name = ty.val();
        let base = name.base().as_ref();

        let known = if name.is_qualified() {
            self.resolve_path(&name.path)
                .map_or(false, |id| is_type(self.table.kind(id)))
        } else {
            PRIMITIVE_TYPES.contains(&base)
                || HardwareType::from_str(base).is_ok()
                || self
                    .table
                    .lookup(self.scope, base)
                    .map_or(false, |id| is_type(self.table.kind(id)))
        };

        if !known {
            self.error(SemanticError::UnknownType(name.clone()), ty.location().clone());
        }
    }

    /// Resuelve `a.b.c` siguiendo ámbitos de miembros.
    fn resolve_path(&self, path: &[Identifier]) -> Option<SymbolId> {
        let (first, rest) = path.split_first()?;

        let mut id = self.table.lookup(self.scope, first.as_ref())?;
        for segment in rest {
            let members = self.table.get(id).members?;
            id = self.table.member(members, segment.as_ref())?;
        }

        Some(id)
    }

    fn declare(
        &mut self,
        name: &Located<Identifier>,
        kind: SymbolKind,
        declared_type: Option<String>,
    ) -> Option<SymbolId> {
        self.declare_in(self.scope, name, kind, declared_type)
    }

    fn declare_in(
        &mut self,
        scope: ScopeId,
        name: &Located<Identifier>,
        kind: SymbolKind,
        declared_type: Option<String>,
    ) -> Option<SymbolId> {
        let symbol = Symbol {
            name: name.val().clone(),
            kind,
            declared_type,
            scope,
            members: None,
        };

        match self.table.declare(scope, symbol) {
            Ok(id) => Some(id),
            Err(_) => {
                let error = SemanticError::Redeclaration(name.val().clone());
                self.error(error, name.location().clone());
                None
            }
        }
    }

    fn enter(&mut self, kind: ScopeKind) -> ScopeId {
        let inner = self.table.push_scope(self.scope, kind);
        std::mem::replace(&mut self.scope, inner)
    }

    fn leave(&mut self, outer: ScopeId) {
        self.scope = outer;
    }

    fn error(&mut self, error: SemanticError, location: crate::source::Location) {
        self.errors.push(Located::at(error, location));
    }
}

fn is_type(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Class | SymbolKind::Enum | SymbolKind::Struct
    )
}

fn type_string(ty: &Located<TypeName>) -> String {
    ty.val().to_string()
}
