//! Tabla de símbolos.
//!
//! Los ámbitos forman un árbol almacenado en un arreglo: cada ámbito
//! conoce el índice de su padre y nunca el de sus hijos. La búsqueda
//! de un nombre asciende por esta cadena hasta la raíz, que contiene
//! las funciones y constantes predefinidas.

use std::collections::HashMap;

use crate::{lex::Identifier, parse::ast::SymbolId};

/// Índice de un ámbito en la tabla.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Var,
    Const,
    Function,
    Class,
    Enum,
    Struct,
    Param,
    ModuleAlias,
    Builtin,
    Signal,
    Task,
    Variant,
    Field,
}

impl SymbolKind {
    /// Determina si un símbolo de este tipo admite asignaciones.
    pub fn is_assignable(self) -> bool {
        matches!(self, SymbolKind::Var | SymbolKind::Param | SymbolKind::Field)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Builtins,
    Global,
    Module,
    Function,
    Method,
    Block,
    Loop,

    /// Miembros de una clase, estructura o enumeración, o exportaciones
    /// de un módulo vistas a través de su alias.
    Members,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: Identifier,
    pub kind: SymbolKind,
    pub declared_type: Option<String>,
    pub scope: ScopeId,

    /// Ámbito de miembros, para módulos, clases, estructuras y enumeraciones.
    pub members: Option<ScopeId>,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    namespace: Option<String>,
    names: HashMap<Identifier, SymbolId>,
}

/// Resultado del análisis semántico.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub(super) fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                parent: None,
                kind: ScopeKind::Builtins,
                namespace: None,
                names: HashMap::new(),
            }],
            symbols: Vec::new(),
        }
    }

    /// Ámbito raíz, el de los nombres predefinidos.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn kind(&self, id: SymbolId) -> SymbolKind {
        self.get(id).kind
    }

    pub fn scope_kind(&self, scope: ScopeId) -> ScopeKind {
        self.scope(scope).kind
    }

    /// Determina si un símbolo se declaró al nivel superior de una unidad.
    pub fn is_global(&self, id: SymbolId) -> bool {
        matches!(
            self.scope_kind(self.get(id).scope),
            ScopeKind::Global | ScopeKind::Module
        )
    }

    /// Nombre calificado por módulo, separado por `separator`.
    ///
    /// Un símbolo declarado en el módulo `L` se nombra `L.x` con `"."`
    /// o `L::x` con `"::"`.
    pub fn qualified_name(&self, id: SymbolId, separator: &str) -> String {
        let symbol = self.get(id);
        match self.namespace_of(symbol.scope) {
            Some(namespace) => format!(
                "{}{}{}",
                namespace.replace('.', separator),
                separator,
                symbol.name
            ),

            None => symbol.name.to_string(),
        }
    }

    /// Tipo definido por el usuario con que se declaró un símbolo,
    /// resuelto desde el ámbito de la declaración.
    pub fn type_of(&self, id: SymbolId) -> Option<SymbolId> {
        let symbol = self.get(id);
        let declared = symbol.declared_type.as_deref()?;
        let mut path = declared.trim_end_matches("[]").split('.');

        let mut found = self.lookup(symbol.scope, path.next()?)?;
        for segment in path {
            found = self.member(self.get(found).members?, segment)?;
        }

        Some(found)
    }

    /// Busca un miembro directo de un ámbito, sin ascender.
    pub fn member(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).names.get(name).copied()
    }

    /// Busca un nombre desde `scope` hacia la raíz.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            let record = self.scope(scope);
            if let Some(&id) = record.names.get(name) {
                return Some(id);
            }

            current = record.parent;
        }

        None
    }

    /// Todos los nombres visibles desde `scope`.
    pub fn visible(&self, scope: ScopeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(scope);

        while let Some(scope) = current {
            let record = self.scope(scope);
            names.extend(record.names.keys().map(AsRef::as_ref));
            current = record.parent;
        }

        names
    }

    /// Determina si `scope` está dentro de un ciclo, sin cruzar el
    /// límite de una función.
    pub fn in_loop(&self, scope: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(scope) = current {
            match self.scope_kind(scope) {
                ScopeKind::Loop => return true,
                ScopeKind::Block => current = self.scope(scope).parent,
                _ => return false,
            }
        }

        false
    }

    pub(super) fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let namespace = self.scope(parent).namespace.clone();
        self.scopes.push(Scope {
            parent: Some(parent),
            kind,
            namespace,
            names: HashMap::new(),
        });

        ScopeId(self.scopes.len() as u32 - 1)
    }

    /// Ámbito de un módulo. Solo ve los nombres predefinidos.
    pub(super) fn push_module(&mut self, namespace: String) -> ScopeId {
        let scope = self.push_scope(self.root(), ScopeKind::Module);
        self.scopes[scope.0 as usize].namespace = Some(namespace);

        scope
    }

    pub(super) fn namespace_of(&self, scope: ScopeId) -> Option<&str> {
        self.scope(scope).namespace.as_deref()
    }

    /// Inserta un símbolo. Falla si el nombre ya existe en ese ámbito.
    pub(super) fn declare(&mut self, scope: ScopeId, symbol: Symbol) -> Result<SymbolId, SymbolId> {
        if let Some(&existing) = self.scope(scope).names.get(&symbol.name) {
            return Err(existing);
        }

        let id = SymbolId(self.symbols.len() as u32);
        let name = symbol.name.clone();

        self.symbols.push(Symbol { scope, ..symbol });
        self.scopes[scope.0 as usize].names.insert(name, id);

        Ok(id)
    }

    pub(super) fn set_members(&mut self, id: SymbolId, members: ScopeId) {
        self.symbols[id.0 as usize].members = Some(members);
    }

    fn scope(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope.0 as usize]
    }
}
