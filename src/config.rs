//! Configuración de placa.
//!
//! El bloque `config { ... }` de la unidad principal selecciona la placa
//! objetivo. La placa determina únicamente la forma en que se bajan los
//! tipos de hardware con PWM ([`Family`]) y la propiedad de compilación
//! derivada de `clock`. Los valores de `uart` y `port` se conservan tal
//! cual para el colaborador que invoque a la toolchain.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;
use unicase::UniCase;

use crate::{
    lex::{Identifier, Number},
    parse::ast::{ConfigBlock, Expr, Literal, LiteralValue},
    source::Located,
};

/// Error de configuración.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown board '{0}'")]
    UnknownBoard(String),

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(Identifier),

    #[error("Configuration key '{0}' is set more than once")]
    DuplicateKey(Identifier),

    #[error("Invalid value for configuration key '{0}'")]
    InvalidValue(Identifier),
}

/// Forma de bajar PWM en una familia de placas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    /// AVR: `analogWrite()` directo sobre el pin.
    Avr,

    /// ESP8266: `analogWrite()` directo, sin canales.
    EspNative,

    /// ESP32 y derivados: PWM por canales LEDC.
    EspChannel,
}

/// Placas soportadas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Board {
    Uno,
    Nano,
    Mega,
    Leonardo,
    Esp32,
    Esp32S3,
    Esp32C3,
    Esp8266,
}

const BOARDS: &[(&str, Board, &str)] = {
    use Board::*;
    &[
        ("uno",      Uno,      "arduino:avr:uno"),
        ("nano",     Nano,     "arduino:avr:nano"),
        ("mega",     Mega,     "arduino:avr:mega"),
        ("leonardo", Leonardo, "arduino:avr:leonardo"),
        ("esp32",    Esp32,    "esp32:esp32:esp32"),
        ("esp32s3",  Esp32S3,  "esp32:esp32:esp32s3"),
        ("esp32c3",  Esp32C3,  "esp32:esp32:esp32c3"),
        ("esp8266",  Esp8266,  "esp8266:esp8266:generic"),
    ]
};

impl Board {
    pub fn family(self) -> Family {
        use Board::*;

        match self {
            Uno | Nano | Mega | Leonardo => Family::Avr,
            Esp8266 => Family::EspNative,
            Esp32 | Esp32S3 | Esp32C3 => Family::EspChannel,
        }
    }

    /// Identificador completo de placa para la toolchain.
    pub fn fqbn(self) -> &'static str {
        self.entry().2
    }

    /// Frecuencia de reloj por omisión, en hertz.
    pub fn default_clock(self) -> u64 {
        match self.family() {
            Family::Avr => 16_000_000,
            Family::EspNative => 80_000_000,
            Family::EspChannel => 240_000_000,
        }
    }

    /// Canales LEDC disponibles, si la placa usa canales.
    pub fn pwm_channels(self) -> Option<u8> {
        match self {
            Board::Esp32 => Some(16),
            Board::Esp32S3 => Some(8),
            Board::Esp32C3 => Some(6),
            _ => None,
        }
    }

    fn entry(self) -> &'static (&'static str, Board, &'static str) {
        BOARDS
            .iter()
            .find(|(_, board, _)| *board == self)
            .unwrap_or(&BOARDS[0])
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::Uno
    }
}

impl Display for Board {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.entry().0)
    }
}

impl FromStr for Board {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let wanted = UniCase::new(name);
        BOARDS
            .iter()
            .find(|(candidate, _, _)| UniCase::new(*candidate) == wanted)
            .map(|&(_, board, _)| board)
            .ok_or_else(|| ConfigError::UnknownBoard(name.to_owned()))
    }
}

/// Configuración efectiva de una compilación.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BoardConfig {
    pub board: Board,
    pub clock: Option<u64>,
    pub uart: Option<String>,
    pub port: Option<String>,
}

impl BoardConfig {
    /// Interpreta el bloque `config` de la unidad principal.
    pub fn from_block(block: Option<&ConfigBlock>) -> Result<Self, Vec<Located<ConfigError>>> {
        let mut config = BoardConfig::default();
        let mut errors = Vec::new();
        let mut seen: Vec<&Identifier> = Vec::new();

        let entries = block.map(|block| block.entries.as_slice()).unwrap_or(&[]);
        for (key, value) in entries {
            if seen.contains(&key.val()) {
                let error = ConfigError::DuplicateKey(key.val().clone());
                errors.push(Located::at(error, key.location().clone()));
                continue;
            }

            seen.push(key.val());
            if let Err(error) = config.set(key.val(), value.val()) {
                errors.push(Located::at(error, value.location().clone()));
            }
        }

        if errors.is_empty() {
            tracing::debug!(board = %config.board, "board configuration");
            Ok(config)
        } else {
            Err(errors)
        }
    }

    /// Frecuencia efectiva, explícita o por omisión de la placa.
    pub fn clock_hz(&self) -> u64 {
        self.clock.unwrap_or_else(|| self.board.default_clock())
    }

    /// Propiedad de compilación que fija la frecuencia del reloj.
    pub fn build_property(&self) -> String {
        format!("build.f_cpu={}L", self.clock_hz())
    }

    /// Velocidad del puerto serie, si se configuró.
    pub fn baud_rate(&self) -> Option<&str> {
        self.uart.as_deref()
    }

    fn set(&mut self, key: &Identifier, value: &Expr) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue(key.clone());

        match key.as_ref() {
            "board" => {
                let name = word(value).ok_or_else(invalid)?;
                self.board = name.parse()?;
            }

            "clock" => {
                let hz = match value {
                    Expr::Literal(Literal {
                        value: LiteralValue::Number(number),
                        unit: Some(unit),
                    }) => unit.hertz(*number),

                    Expr::Literal(Literal {
                        value: LiteralValue::Number(Number::Int(hz)),
                        unit: None,
                    }) => Some(*hz as f64),

                    _ => None,
                };

                let hz = hz.filter(|hz| *hz > 0.0).ok_or_else(invalid)?;
                self.clock = Some(hz.round() as u64);
            }

            "uart" => self.uart = Some(word(value).ok_or_else(invalid)?),
            "port" => self.port = Some(word(value).ok_or_else(invalid)?),

            _ => return Err(ConfigError::UnknownKey(key.clone())),
        }

        Ok(())
    }
}

/// Valor textual: identificador, cadena o número.
fn word(value: &Expr) -> Option<String> {
    match value {
        Expr::Identifier(reference) => Some(reference.name.val().to_string()),
        Expr::Literal(Literal {
            value: LiteralValue::Str(string),
            ..
        }) => Some(string.clone()),

        Expr::Literal(Literal {
            value: LiteralValue::Number(number),
            unit: None,
        }) => Some(number.to_string()),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_names_ignore_case() {
        assert_eq!("ESP32".parse::<Board>().unwrap(), Board::Esp32);
        assert_eq!("Nano".parse::<Board>().unwrap(), Board::Nano);
        assert!("pico".parse::<Board>().is_err());
    }

    #[test]
    fn families() {
        assert_eq!(Board::Uno.family(), Family::Avr);
        assert_eq!(Board::Esp8266.family(), Family::EspNative);
        assert_eq!(Board::Esp32C3.family(), Family::EspChannel);
    }

    #[test]
    fn default_build_property() {
        let config = BoardConfig::default();
        assert_eq!(config.build_property(), "build.f_cpu=16000000L");
    }
}
