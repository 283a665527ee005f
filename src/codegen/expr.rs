//! Expresiones.

use std::fmt::Write;

use super::Emitter;
use crate::{
    hardware::{Instance, Method},
    lex::{Identifier, Number},
    parse::ast::*,
    semantic::SymbolKind,
    source::Located,
};

impl<W: Write> Emitter<'_, W> {
    pub(super) fn expr(&self, expr: &Located<Expr>) -> String {
        match expr.val() {
            Expr::Literal(literal) => literal_text(&literal.value),
            Expr::Identifier(reference) => self.reference(reference),
            Expr::SelfValue => String::from("(*this)"),

            Expr::Binary(left, op, right) => {
                format!("{} {} {}", self.operand(left), op.native(), self.operand(right))
            }

            Expr::Unary(UnOp::Negate, operand) => format!("-{}", self.operand(operand)),
            Expr::Unary(UnOp::Not, operand) => format!("!{}", self.operand(operand)),

            Expr::Call { callee, args } => self.call(callee, args),

            Expr::Member {
                object,
                member,
                symbol,
            } => self.member(object, member.val(), *symbol),

            Expr::New { type_name, args } => {
                format!("{}({})", self.type_name(type_name), self.list(args))
            }

            Expr::Array(elements) => format!("{{{}}}", self.list(elements)),

            Expr::Subscript(array, index) => {
                format!("{}[{}]", self.operand(array), self.expr(index))
            }

            Expr::Convert { value, target } => {
                let value = self.expr(value);
                match self.type_name(target).as_str() {
                    "String" => format!("String({})", value),
                    target => format!("({})({})", target, value),
                }
            }

            // Un `catch` anidado en una expresión pierde su manejador
            Expr::Catch { value, .. } => self.expr(value),

            Expr::StructLiteral { type_name, fields } => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(field, value)| format!(".{} = {}", field.val(), self.expr(value)))
                    .collect();

                format!("{}{{{}}}", self.type_name(type_name), fields.join(", "))
            }

            Expr::Clamp { value, min, max } => format!(
                "constrain({}, {}, {})",
                self.expr(value),
                self.expr(min),
                self.expr(max)
            ),
        }
    }

    /// Como [`Self::expr`], con paréntesis alrededor de operaciones binarias.
    pub(super) fn operand(&self, expr: &Located<Expr>) -> String {
        match expr.val() {
            Expr::Binary(..) => format!("({})", self.expr(expr)),
            _ => self.expr(expr),
        }
    }

    /// Separa el manejador de un `catch` en la raíz de una expresión,
    /// incluso si la expresión fue envuelta por una restricción de rango.
    pub(super) fn split_catch<'e>(&self, expr: &'e Located<Expr>) -> (String, Option<&'e Block>) {
        match expr.val() {
            Expr::Catch { value, handler } => (self.expr(value), Some(handler)),

            Expr::Clamp { value, min, max } => match value.val() {
                Expr::Catch {
                    value: inner,
                    handler,
                } => {
                    let clamped = format!(
                        "constrain({}, {}, {})",
                        self.expr(inner),
                        self.expr(min),
                        self.expr(max)
                    );

                    (clamped, Some(handler))
                }

                _ => (self.expr(expr), None),
            },

            _ => (self.expr(expr), None),
        }
    }

    fn list(&self, exprs: &[Located<Expr>]) -> String {
        let exprs: Vec<String> = exprs.iter().map(|expr| self.expr(expr)).collect();
        exprs.join(", ")
    }

    fn reference(&self, reference: &Reference) -> String {
        let table = self.context.table;

        match reference.symbol {
            Some(id) if table.kind(id) != SymbolKind::Builtin && table.is_global(id) => {
                table.qualified_name(id, "::")
            }

            _ => reference.name.val().to_string(),
        }
    }

    fn call(&self, callee: &Located<Expr>, args: &[Located<Expr>]) -> String {
        let args: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();

        if let Expr::Member { object, member, .. } = callee.val() {
            if let Some((instance, method)) = self.hardware_method(object, member.val()) {
                let object = self.expr(object);
                return self.context.plan.call(instance, &object, method, &args);
            }
        }

        let function = match callee.val() {
            Expr::Identifier(Reference {
                name,
                symbol: Some(id),
            }) if self.context.table.kind(*id) == SymbolKind::Builtin => {
                builtin_function(name.val().as_ref()).to_owned()
            }

            _ => self.operand(callee),
        };

        format!("{}({})", function, args.join(", "))
    }

    fn member(&self, object: &Located<Expr>, member: &Identifier, symbol: Option<SymbolId>) -> String {
        let table = self.context.table;

        if let Expr::SelfValue = object.val() {
            return format!("this->{}", member);
        }

        match (symbol_of(object).map(|owner| table.kind(owner)), symbol) {
            (Some(SymbolKind::ModuleAlias), Some(id)) => table.qualified_name(id, "::"),
            (Some(SymbolKind::Enum), _) => format!("{}::{}", self.expr(object), member),
            _ => format!("{}.{}", self.operand(object), member),
        }
    }

    fn hardware_method(&self, object: &Located<Expr>, member: &Identifier) -> Option<(&Instance, Method)> {
        let instance = self.context.plan.instance(symbol_of(object)?)?;
        let (method, _) = instance.ty.method(member.as_ref())?;

        Some((instance, method))
    }
}

fn symbol_of(expr: &Located<Expr>) -> Option<SymbolId> {
    match expr.val() {
        Expr::Identifier(reference) => reference.symbol,
        Expr::Member { symbol, .. } => *symbol,
        _ => None,
    }
}

/// Nombre nativo de una función predefinida.
fn builtin_function(name: &str) -> &str {
    match name {
        "print" => "Serial.print",
        "println" => "Serial.println",
        "wait" => "delay",
        "delayMicros" => "delayMicroseconds",
        other => other,
    }
}

fn literal_text(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Number(Number::Int(integer)) => integer.to_string(),
        LiteralValue::Number(number) => number.to_string(),
        LiteralValue::Bool(boolean) => boolean.to_string(),

        LiteralValue::Str(string) => {
            let mut quoted = String::with_capacity(string.len() + 2);
            quoted.push('"');

            for c in string.chars() {
                match c {
                    '"' => quoted.push_str("\\\""),
                    '\\' => quoted.push_str("\\\\"),
                    '\n' => quoted.push_str("\\n"),
                    '\r' => quoted.push_str("\\r"),
                    '\t' => quoted.push_str("\\t"),
                    '\0' => quoted.push_str("\\0"),
                    c => quoted.push(c),
                }
            }

            quoted.push('"');
            quoted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literals_are_escaped() {
        let text = literal_text(&LiteralValue::Str("a\"b\\c\n".into()));
        assert_eq!(text, r#""a\"b\\c\n""#);
    }

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(literal_text(&LiteralValue::Number(Number::Float(2.0))), "2.0");
        assert_eq!(literal_text(&LiteralValue::Number(Number::Int(-3))), "-3");
    }

    #[test]
    fn builtin_names() {
        assert_eq!(builtin_function("println"), "Serial.println");
        assert_eq!(builtin_function("delayMicros"), "delayMicroseconds");
        assert_eq!(builtin_function("millis"), "millis");
    }
}
