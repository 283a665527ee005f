//! Árbol sintáctico.
//!
//! El árbol se construye en [`super::parse`] y luego es anotado en sitio
//! por las fases posteriores: el resolvedor de módulos sustituye cada
//! `load` por su [`Module`], el análisis semántico llena los campos
//! `symbol` y la resolución de unidades reescribe literales y
//! asignaciones a variables con rango.

use std::fmt::{self, Display};

use bitflags::bitflags;

use crate::{
    lex::{Identifier, Number},
    source::{Located, Location},
    units::Unit,
};

/// Bloque de instrucciones.
pub type Block = Vec<Located<Statement>>;

/// Identidad de una declaración, asignada por el análisis semántico.
///
/// Dos declaraciones con el mismo nombre en distintos ámbitos tienen
/// identidades distintas.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Una unidad de compilación.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub main_directive: Option<Location>,
    pub items: Vec<Located<Item>>,
}

/// Declaraciones de nivel superior.
#[derive(Debug, Clone)]
pub enum Item {
    Config(ConfigBlock),
    Load(LoadStmt),
    Module(Module),
    NativeInclude(String),
    Var(VarDecl),
    Alias(AliasDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
    Struct(StructDecl),
    Signal(SignalDecl),
    Event(EventBlock),
    Interrupt(InterruptBlock),
    Task(TaskDecl),
    Native(String),
}

#[derive(Debug, Clone)]
pub struct ConfigBlock {
    pub entries: Vec<(Located<Identifier>, Located<Expr>)>,
}

#[derive(Debug, Clone)]
pub struct LoadStmt {
    pub path: Located<String>,
    pub alias: Option<Located<Identifier>>,
}

/// Módulo fuente ya resuelto, sustituye a su [`LoadStmt`].
#[derive(Debug, Clone)]
pub struct Module {
    pub namespace: Located<Identifier>,
    pub path: String,
    pub program: Program,
    pub symbol: Option<SymbolId>,
}

bitflags! {
    /// Calificadores de una declaración de variable.
    pub struct Qualifiers: u8 {
        /// `mut`; en su ausencia la declaración es `const`.
        const MUTABLE = 0x01;

        /// `react`, siempre se emite como `volatile`.
        const REACTIVE = 0x02;
    }
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub qualifiers: Qualifiers,
    pub declared_type: Located<TypeName>,
    pub name: Located<Identifier>,
    pub initializer: Option<Located<Expr>>,
    pub range: Option<RangeConstraint>,
    pub symbol: Option<SymbolId>,
}

impl VarDecl {
    pub fn is_mutable(&self) -> bool {
        self.qualifiers.contains(Qualifiers::MUTABLE)
    }

    pub fn is_reactive(&self) -> bool {
        self.qualifiers.contains(Qualifiers::REACTIVE)
    }
}

/// `in min...max`
#[derive(Debug, Clone)]
pub struct RangeConstraint {
    pub min: Located<Expr>,
    pub max: Located<Expr>,
}

#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: Located<Identifier>,
    pub value: Located<Expr>,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub ty: Located<TypeName>,
    pub name: Located<Identifier>,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Located<Identifier>,
    pub params: Vec<Param>,
    pub return_type: Option<Located<TypeName>>,
    pub body: Block,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Block,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Located<Identifier>,
    pub fields: Vec<Located<VarDecl>>,
    pub constructor: Option<Constructor>,
    pub methods: Vec<Located<FunctionDecl>>,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Located<Identifier>,
    pub variants: Vec<Located<Identifier>>,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub ty: Located<TypeName>,
    pub name: Located<Identifier>,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: Located<Identifier>,
    pub fields: Vec<Field>,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub struct SignalDecl {
    pub name: Located<Identifier>,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone)]
pub enum EventKind {
    Start,
    Loop,
    Signal(Reference),
}

#[derive(Debug, Clone)]
pub struct EventBlock {
    pub kind: EventKind,
    pub body: Block,
}

/// Modo de disparo de una interrupción.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerMode {
    Rising,
    Falling,
    Change,
    Low,
    High,
}

impl TriggerMode {
    /// Constante correspondiente en la toolchain.
    pub fn native(self) -> &'static str {
        match self {
            TriggerMode::Rising => "RISING",
            TriggerMode::Falling => "FALLING",
            TriggerMode::Change => "CHANGE",
            TriggerMode::Low => "LOW",
            TriggerMode::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterruptBlock {
    pub name: Option<Located<Identifier>>,
    pub pin: Located<Expr>,
    pub mode: TriggerMode,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum Schedule {
    Every(Located<Expr>),
    Background,
}

#[derive(Debug, Clone)]
pub struct TaskDecl {
    pub name: Located<Identifier>,
    pub schedule: Schedule,
    pub body: Block,
    pub symbol: Option<SymbolId>,
}

/// Nombre de tipo, posiblemente calificado por módulo (`L.Point`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub path: Vec<Identifier>,
    pub array: bool,
}

impl TypeName {
    pub fn simple(name: &str) -> Self {
        TypeName {
            path: vec![Identifier::new(name)],
            array: false,
        }
    }

    /// Último segmento del nombre.
    pub fn base(&self) -> &Identifier {
        self.path.last().expect("type names are never empty")
    }

    pub fn is_qualified(&self) -> bool {
        self.path.len() > 1
    }
}

impl Display for TypeName {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 {
                fmt.write_str(".")?;
            }

            write!(fmt, "{}", segment)?;
        }

        if self.array {
            fmt.write_str("[]")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Var(VarDecl),
    Assign {
        target: Located<Expr>,
        value: Located<Expr>,
    },
    Expr(Located<Expr>),
    If {
        branches: Vec<(Located<Expr>, Block)>,
        otherwise: Option<Block>,
    },
    While {
        condition: Located<Expr>,
        body: Block,
    },
    For {
        init: Option<Box<Located<Statement>>>,
        condition: Option<Located<Expr>>,
        update: Option<Box<Located<Statement>>>,
        body: Block,
    },
    Repeat {
        count: Located<Expr>,
        body: Block,
    },
    Match(MatchStmt),
    Switch(SwitchStmt),
    Atomic(Block),
    Emit(Reference),
    Return(Option<Located<Expr>>),
    Break,
    Continue,
    Native(String),
}

#[derive(Debug, Clone)]
pub struct MatchStmt {
    pub subject: Located<Expr>,
    pub arms: Vec<MatchArm>,
}

/// Brazo de `match`. Tanto `p => expr` como `p => { ... }` producen
/// una lista de instrucciones.
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub patterns: Vec<Located<Pattern>>,
    pub body: Block,
}

impl MatchArm {
    pub fn is_wildcard(&self) -> bool {
        self.patterns
            .iter()
            .any(|pattern| matches!(pattern.as_ref(), Pattern::Wildcard))
    }
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard,
    Value(Located<Expr>),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Located<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub subject: Located<Expr>,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Block>,
}

/// Referencia a un nombre, con su resolución una vez analizada.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: Located<Identifier>,
    pub symbol: Option<SymbolId>,
}

impl Reference {
    pub fn new(name: Located<Identifier>) -> Self {
        Reference { name, symbol: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(Number),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: LiteralValue,
    pub unit: Option<Unit>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    ShiftLeft,
    ShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    /// Operador en el lenguaje objetivo.
    pub fn native(self) -> &'static str {
        use BinOp::*;

        match self {
            Or => "||",
            And => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Negate,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Identifier(Reference),
    SelfValue,
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Unary(UnOp, Box<Located<Expr>>),
    Call {
        callee: Box<Located<Expr>>,
        args: Vec<Located<Expr>>,
    },
    Member {
        object: Box<Located<Expr>>,
        member: Located<Identifier>,
        symbol: Option<SymbolId>,
    },
    New {
        type_name: Located<TypeName>,
        args: Vec<Located<Expr>>,
    },
    Array(Vec<Located<Expr>>),
    Subscript(Box<Located<Expr>>, Box<Located<Expr>>),
    Convert {
        value: Box<Located<Expr>>,
        target: Located<TypeName>,
    },
    Catch {
        value: Box<Located<Expr>>,
        handler: Vec<Located<Statement>>,
    },
    StructLiteral {
        type_name: Located<TypeName>,
        fields: Vec<(Located<Identifier>, Located<Expr>)>,
    },

    /// Introducido por la resolución de rangos en cada asignación.
    Clamp {
        value: Box<Located<Expr>>,
        min: Box<Located<Expr>>,
        max: Box<Located<Expr>>,
    },
}

impl Expr {
    /// Declaración a la que se refiere un identificador o un acceso
    /// a miembro ya resuelto.
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Expr::Identifier(reference) => reference.symbol,
            Expr::Member { symbol, .. } => *symbol,
            _ => None,
        }
    }

    pub fn is_catch(&self) -> bool {
        matches!(self, Expr::Catch { .. })
    }
}
