//! Unidades físicas y restricciones de rango.
//!
//! Los literales con sufijo de unidad se convierten a un escalar canónico
//! por dimensión con [`resolve_literal()`]: tiempo a milisegundos,
//! distancia a milímetros, ángulo a grados, tensión a milivoltios,
//! corriente a miliamperios, resistencia a ohmios y potencia a
//! milivatios. Frecuencia y velocidad angular conservan su unidad.
//!
//! La segunda mitad de este módulo es la fase [`resolve()`], que aplica
//! la conversión sobre el árbol completo y reescribe cada asignación a
//! una variable declarada con `in min...max` como una asignación del
//! valor acotado.

use std::{
    collections::HashMap,
    f64::consts::PI,
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

use crate::{
    lex::Number,
    parse::{
        ast::{Expr, Literal, LiteralValue, Program, RangeConstraint, Statement, SymbolId, UnOp, VarDecl},
        visit::{self, VisitMut},
    },
    source::Located,
};

/// Magnitud física de una unidad.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dimension {
    Time,
    Frequency,
    Angle,
    Distance,
    Speed,
    Voltage,
    Current,
    Resistance,
    Power,
}

/// Sufijos de unidad reconocidos por el lexer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Hertz,
    Kilohertz,
    Megahertz,
    Degrees,
    Radians,
    Millimeters,
    Centimeters,
    Meters,
    Kilometers,
    Rpm,
    Millivolts,
    Volts,
    Milliamperes,
    Amperes,
    Ohms,
    Kiloohms,
    Milliwatts,
    Watts,
}

const UNITS: &[(&str, Unit)] = {
    use Unit::*;
    &[
        ("us",   Microseconds),
        ("ms",   Milliseconds),
        ("s",    Seconds),
        ("min",  Minutes),
        ("h",    Hours),
        ("Hz",   Hertz),
        ("kHz",  Kilohertz),
        ("MHz",  Megahertz),
        ("deg",  Degrees),
        ("rad",  Radians),
        ("mm",   Millimeters),
        ("cm",   Centimeters),
        ("m",    Meters),
        ("km",   Kilometers),
        ("rpm",  Rpm),
        ("mV",   Millivolts),
        ("V",    Volts),
        ("mA",   Milliamperes),
        ("A",    Amperes),
        ("ohm",  Ohms),
        ("kohm", Kiloohms),
        ("mW",   Milliwatts),
        ("W",    Watts),
    ]
};

/// Conversión de una unidad a la unidad canónica de su dimensión.
enum Conversion {
    /// Se conserva el valor tal cual.
    Keep,

    /// Multiplicación por un factor entero, con truncamiento a entero.
    Scale(i64),

    /// División entera, truncando.
    Divide(i64),

    /// Radianes a grados, redondeando.
    RadiansToDegrees,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        use Unit::*;

        match self {
            Microseconds | Milliseconds | Seconds | Minutes | Hours => Dimension::Time,
            Hertz | Kilohertz | Megahertz => Dimension::Frequency,
            Degrees | Radians => Dimension::Angle,
            Millimeters | Centimeters | Meters | Kilometers => Dimension::Distance,
            Rpm => Dimension::Speed,
            Millivolts | Volts => Dimension::Voltage,
            Milliamperes | Amperes => Dimension::Current,
            Ohms | Kiloohms => Dimension::Resistance,
            Milliwatts | Watts => Dimension::Power,
        }
    }

    /// Frecuencia en hertz, usada para propiedades de compilación.
    pub fn hertz(self, value: Number) -> Option<f64> {
        let factor = match self {
            Unit::Hertz => 1.0,
            Unit::Kilohertz => 1e3,
            Unit::Megahertz => 1e6,
            _ => return None,
        };

        Some(as_f64(value) * factor)
    }

    fn conversion(self) -> Conversion {
        use Unit::*;

        match self {
            Milliseconds | Degrees | Millimeters | Millivolts | Milliamperes | Ohms
            | Milliwatts => Conversion::Scale(1),

            Microseconds => Conversion::Divide(1000),
            Seconds => Conversion::Scale(1000),
            Minutes => Conversion::Scale(60_000),
            Hours => Conversion::Scale(3_600_000),
            Centimeters => Conversion::Scale(10),
            Meters | Volts | Amperes | Kiloohms | Watts => Conversion::Scale(1000),
            Kilometers => Conversion::Scale(1_000_000),
            Radians => Conversion::RadiansToDegrees,
            Hertz | Kilohertz | Megahertz | Rpm => Conversion::Keep,
        }
    }
}

impl Display for Unit {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = UNITS
            .iter()
            .find(|&&(_, unit)| unit == *self)
            .map(|&(suffix, _)| suffix)
            .unwrap_or("?");

        fmt.write_str(suffix)
    }
}

impl FromStr for Unit {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        UNITS
            .iter()
            .find(|&&(suffix, _)| suffix == string)
            .map(|&(_, unit)| unit)
            .ok_or(())
    }
}

/// Convierte un literal con unidad a su escalar canónico.
///
/// Esta función es pura y determinista. Tiempo, distancia y ángulo
/// producen siempre enteros: `2s` es `2000`, `500us` es `0` y
/// `1rad` es `57`.
pub fn resolve_literal(value: Number, unit: Unit) -> Number {
    match unit.conversion() {
        Conversion::Keep => value,

        Conversion::Scale(factor) => match value {
            Number::Int(integer) => Number::Int(integer.saturating_mul(factor)),
            Number::Float(float) => Number::Int((float * factor as f64) as i64),
        },

        Conversion::Divide(divisor) => match value {
            Number::Int(integer) => Number::Int(integer / divisor),
            Number::Float(float) => Number::Int((float / divisor as f64) as i64),
        },

        Conversion::RadiansToDegrees => Number::Int((as_f64(value) * 180.0 / PI).round() as i64),
    }
}

fn as_f64(value: Number) -> f64 {
    match value {
        Number::Int(integer) => integer as f64,
        Number::Float(float) => float,
    }
}

/// Errores de la resolución de rangos.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("Invalid range for '{name}': lower bound {min} is greater than upper bound {max}")]
    InvertedRange { name: String, min: Number, max: Number },
}

/// Restricciones de rango por declaración, ya con unidades resueltas.
pub type RangeTable = HashMap<SymbolId, RangeConstraint>;

/// Resuelve unidades y reescribe asignaciones a variables con rango.
///
/// Requiere que el análisis semántico ya haya asignado símbolos.
pub fn resolve(program: &mut Program) -> Result<RangeTable, Vec<Located<UnitError>>> {
    let mut literals = LiteralResolver;
    visit::walk_program_mut(&mut literals, program);

    let mut collector = RangeCollector {
        ranges: HashMap::new(),
        errors: Vec::new(),
    };

    visit::walk_program_mut(&mut collector, program);
    if !collector.errors.is_empty() {
        return Err(collector.errors);
    }

    let ranges = collector.ranges;
    let mut clamps = ClampInserter { ranges: &ranges };
    visit::walk_program_mut(&mut clamps, program);

    tracing::debug!(ranges = ranges.len(), "resolved units and ranges");
    Ok(ranges)
}

/// Sustituye cada literal con unidad por su escalar canónico.
struct LiteralResolver;

impl VisitMut for LiteralResolver {
    fn visit_expr_mut(&mut self, expr: &mut Located<Expr>) {
        if let Expr::Literal(Literal {
            value: LiteralValue::Number(number),
            unit,
        }) = expr.val_mut()
        {
            if let Some(from) = unit.take() {
                *number = resolve_literal(*number, from);
            }
        }

        visit::walk_expr_mut(self, expr);
    }
}

struct RangeCollector {
    ranges: RangeTable,
    errors: Vec<Located<UnitError>>,
}

impl VisitMut for RangeCollector {
    fn visit_var_mut(&mut self, var: &mut VarDecl) {
        if let (Some(range), Some(symbol)) = (&var.range, var.symbol) {
            let bounds = (constant_value(&range.min), constant_value(&range.max));

            // Con cotas simbólicas la restricción queda en tiempo de ejecución
            if let (Some(min), Some(max)) = bounds {
                if as_f64(min) > as_f64(max) {
                    let error = UnitError::InvertedRange {
                        name: var.name.as_ref().to_string(),
                        min,
                        max,
                    };

                    self.errors.push(Located::at(error, range.min.location().clone()));
                }
            }

            self.ranges.insert(symbol, range.clone());
        }

        visit::walk_var_mut(self, var);
    }
}

/// Envuelve inicializadores y asignaciones de variables con rango.
struct ClampInserter<'a> {
    ranges: &'a RangeTable,
}

impl ClampInserter<'_> {
    fn clamp(&self, symbol: Option<SymbolId>, value: &mut Located<Expr>) {
        let range = match symbol.and_then(|symbol| self.ranges.get(&symbol)) {
            Some(range) => range,
            None => return,
        };

        let location = value.location().clone();
        let placeholder = Located::at(Expr::SelfValue, location.clone());
        let inner = std::mem::replace(value, placeholder);

        *value = Located::at(
            Expr::Clamp {
                value: Box::new(inner),
                min: Box::new(range.min.clone()),
                max: Box::new(range.max.clone()),
            },
            location,
        );
    }
}

impl VisitMut for ClampInserter<'_> {
    fn visit_var_mut(&mut self, var: &mut VarDecl) {
        visit::walk_var_mut(self, var);
        if let Some(initializer) = &mut var.initializer {
            self.clamp(var.symbol, initializer);
        }
    }

    fn visit_statement_mut(&mut self, statement: &mut Located<Statement>) {
        visit::walk_statement_mut(self, statement);

        if let Statement::Assign { target, value } = statement.val_mut() {
            self.clamp(target.val().symbol(), value);
        }
    }
}

/// Valor de una cota si es un literal numérico, posiblemente negado.
fn constant_value(expr: &Located<Expr>) -> Option<Number> {
    match expr.as_ref() {
        Expr::Literal(Literal {
            value: LiteralValue::Number(number),
            ..
        }) => Some(*number),

        Expr::Unary(UnOp::Negate, operand) => match constant_value(operand)? {
            Number::Int(integer) => Some(Number::Int(-integer)),
            Number::Float(float) => Some(Number::Float(-float)),
        },

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64, unit: &str) -> Number {
        resolve_literal(Number::Int(value), unit.parse().expect("bad unit"))
    }

    #[test]
    fn time_to_milliseconds() {
        assert_eq!(int(2, "s"), Number::Int(2000));
        assert_eq!(int(500, "us"), Number::Int(0));
        assert_eq!(int(1500, "us"), Number::Int(1));
        assert_eq!(int(1, "min"), Number::Int(60_000));
        assert_eq!(int(1, "h"), Number::Int(3_600_000));
        assert_eq!(int(250, "ms"), Number::Int(250));
    }

    #[test]
    fn distance_to_millimeters() {
        assert_eq!(int(10, "cm"), Number::Int(100));
        assert_eq!(int(2, "m"), Number::Int(2000));
        assert_eq!(int(1, "km"), Number::Int(1_000_000));
    }

    #[test]
    fn angles_round_to_degrees() {
        assert_eq!(int(1, "rad"), Number::Int(57));
        assert_eq!(
            resolve_literal(Number::Float(3.14159), Unit::Radians),
            Number::Int(180)
        );
        assert_eq!(int(90, "deg"), Number::Int(90));
    }

    #[test]
    fn frequency_and_speed_pass_through() {
        assert_eq!(int(16, "MHz"), Number::Int(16));
        assert_eq!(
            resolve_literal(Number::Float(2.5), Unit::Kilohertz),
            Number::Float(2.5)
        );
        assert_eq!(int(3000, "rpm"), Number::Int(3000));
    }

    #[test]
    fn fractional_time() {
        assert_eq!(
            resolve_literal(Number::Float(1.5), Unit::Seconds),
            Number::Int(1500)
        );
    }

    #[test]
    fn unknown_suffix() {
        assert!("Ms".parse::<Unit>().is_err());
        assert!("abc".parse::<Unit>().is_err());
    }
}
