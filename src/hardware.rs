//! Tipos de hardware y su bajada según la placa.
//!
//! Una variable de tipo de hardware (`mut Led led = 13`) se emite como un
//! número de pin y sus métodos se sustituyen por llamadas nativas de
//! E/S. La única diferencia entre familias de placas está en PWM: las
//! placas AVR y el ESP8266 escriben con `analogWrite()` directamente,
//! mientras que la familia ESP32 requiere un canal LEDC por pin. Los
//! canales se asignan de forma secuencial en orden de primer uso, de modo
//! que dos compilaciones del mismo programa producen siempre la misma
//! asignación.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

use crate::{
    config::{Board, BoardConfig, Family},
    lex::{Identifier, Number},
    parse::{
        ast::*,
        visit::{self, Visit},
    },
    semantic::{ScopeKind, SymbolTable},
    source::{Located, Location},
};

/// Tipo nativo con el que se almacena el pin de una instancia.
pub const PIN_TYPE: &str = "uint8_t";

/// Frecuencia de los canales LEDC, en hertz.
const PWM_FREQUENCY: u32 = 5000;

/// Resolución de los canales LEDC, en bits.
const PWM_RESOLUTION: u8 = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HardwareType {
    Led,
    Pwm,
    Pin,
    Button,
    Analog,
}

const TYPES: &[(&str, HardwareType)] = &[
    ("Led", HardwareType::Led),
    ("Pwm", HardwareType::Pwm),
    ("Pin", HardwareType::Pin),
    ("Button", HardwareType::Button),
    ("Analog", HardwareType::Analog),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    On,
    Off,
    Toggle,
    Set,
    Write,
    High,
    Low,
    Read,
    Pressed,
}

/// Métodos de cada tipo, con su cantidad de argumentos.
const METHODS: &[(HardwareType, &str, Method, usize)] = {
    use HardwareType::*;
    use Method::*;

    &[
        (Led,    "on",      On,      0),
        (Led,    "off",     Off,     0),
        (Led,    "toggle",  Toggle,  0),
        (Led,    "set",     Set,     1),
        (Pwm,    "write",   Write,   1),
        (Pwm,    "off",     Off,     0),
        (Pin,    "high",    High,    0),
        (Pin,    "low",     Low,     0),
        (Pin,    "write",   Write,   1),
        (Pin,    "read",    Read,    0),
        (Pin,    "toggle",  Toggle,  0),
        (Button, "read",    Read,    0),
        (Button, "pressed", Pressed, 0),
        (Analog, "read",    Read,    0),
    ]
};

impl HardwareType {
    pub fn name(self) -> &'static str {
        TYPES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map_or("?", |&(name, _)| name)
    }

    /// Argumento de `pinMode()`, si el tipo lo requiere.
    pub fn pin_mode(self) -> Option<&'static str> {
        match self {
            HardwareType::Led | HardwareType::Pwm | HardwareType::Pin => Some("OUTPUT"),
            HardwareType::Button => Some("INPUT_PULLUP"),
            HardwareType::Analog => None,
        }
    }

    /// Busca un método y su aridad.
    pub fn method(self, name: &str) -> Option<(Method, usize)> {
        METHODS
            .iter()
            .find(|(ty, candidate, _, _)| *ty == self && *candidate == name)
            .map(|&(_, _, method, arity)| (method, arity))
    }
}

impl Display for HardwareType {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

impl FromStr for HardwareType {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TYPES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|&(_, ty)| ty)
            .ok_or(())
    }
}

impl Method {
    fn uses_pwm(self, ty: HardwareType) -> bool {
        matches!(
            (ty, self),
            (HardwareType::Led, Method::Set)
                | (HardwareType::Pwm, Method::Write)
                | (HardwareType::Pwm, Method::Off)
        )
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Hardware type '{ty}' has no method '{method}'")]
    UnknownMethod { ty: HardwareType, method: Identifier },

    #[error("'{ty}.{method}()' takes {expected} argument(s) but {found} were given")]
    Arity {
        ty: HardwareType,
        method: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Hardware type '{ty}' takes exactly one pin argument, found {found}")]
    PinArity { ty: HardwareType, found: usize },

    #[error("Hardware type '{0}' can only be instantiated as a variable initializer")]
    Instantiation(HardwareType),

    #[error("Board '{board}' has only {limit} PWM channels")]
    OutOfChannels { board: Board, limit: u8 },
}

/// Forma de emitir PWM en una familia de placas.
pub trait PwmLowering {
    /// Definiciones previas a todo el código del usuario.
    fn prelude(channels: &[(String, u8)]) -> Vec<String>;

    /// Configuración de un pin dentro de `setup()`.
    fn setup(pin: &str, channel: Option<u8>) -> Vec<String>;

    /// Escritura de un ciclo de trabajo.
    fn write(pin: &str, channel: Option<u8>, duty: &str) -> String;
}

/// `analogWrite()` directo.
pub struct NativePwm;

/// Canales LEDC con una función de escritura por canal.
pub struct ChannelPwm;

impl PwmLowering for NativePwm {
    fn prelude(_: &[(String, u8)]) -> Vec<String> {
        Vec::new()
    }

    fn setup(_: &str, _: Option<u8>) -> Vec<String> {
        Vec::new()
    }

    fn write(pin: &str, _: Option<u8>, duty: &str) -> String {
        format!("analogWrite({}, {})", pin, duty)
    }
}

impl PwmLowering for ChannelPwm {
    fn prelude(channels: &[(String, u8)]) -> Vec<String> {
        channels
            .iter()
            .map(|(_, channel)| {
                format!(
                    "void {}(uint32_t duty) {{ ledcWrite({}, duty); }}",
                    channel_writer(*channel),
                    channel
                )
            })
            .collect()
    }

    fn setup(pin: &str, channel: Option<u8>) -> Vec<String> {
        match channel {
            Some(channel) => vec![
                format!("ledcSetup({}, {}, {});", channel, PWM_FREQUENCY, PWM_RESOLUTION),
                format!("ledcAttachPin({}, {});", pin, channel),
            ],

            None => Vec::new(),
        }
    }

    fn write(pin: &str, channel: Option<u8>, duty: &str) -> String {
        match channel {
            Some(channel) => format!("{}({})", channel_writer(channel), duty),
            None => NativePwm::write(pin, None, duty),
        }
    }
}

fn channel_writer(channel: u8) -> String {
    format!("ys_pwm_write_ch{}", channel)
}

/// Una variable de tipo de hardware.
#[derive(Clone, Debug)]
pub struct Instance {
    pub ty: HardwareType,
    pub pin: Located<Expr>,
    pub channel: Option<u8>,
    key: String,
}

/// Decisiones de bajada para todo el programa.
#[derive(Clone, Debug)]
pub struct HardwarePlan {
    family: Family,
    instances: HashMap<SymbolId, Instance>,
    channels: Vec<(String, u8)>,
}

impl HardwarePlan {
    pub fn family(&self) -> Family {
        self.family
    }

    pub fn instance(&self, symbol: SymbolId) -> Option<&Instance> {
        self.instances.get(&symbol)
    }

    /// Canales asignados, por pin, en orden de asignación.
    pub fn channels(&self) -> &[(String, u8)] {
        &self.channels
    }

    pub fn prelude(&self) -> Vec<String> {
        dispatch_family!(Lowering: self.family => Lowering::prelude(&self.channels))
    }

    /// Instrucciones de inicialización de una instancia, cuyo pin se
    /// nombra `object` en el código emitido.
    pub fn setup(&self, instance: &Instance, object: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(mode) = instance.ty.pin_mode() {
            lines.push(format!("pinMode({}, {});", object, mode));
        }

        lines.extend(dispatch_family!(Lowering: self.family => Lowering::setup(object, instance.channel)));
        lines
    }

    /// Expresión equivalente a `object.method(args)`.
    pub fn call(&self, instance: &Instance, object: &str, method: Method, args: &[String]) -> String {
        use HardwareType::*;
        use Method::*;

        let pwm = |duty: &str| {
            dispatch_family!(Lowering: self.family => Lowering::write(object, instance.channel, duty))
        };

        let arg = args.first().map_or("0", String::as_str);
        match (instance.ty, method) {
            (Pwm, Off) => pwm("0"),
            (_, Set) | (Pwm, Write) => pwm(arg),
            (_, On) | (_, High) => format!("digitalWrite({}, HIGH)", object),
            (_, Off) | (_, Low) => format!("digitalWrite({}, LOW)", object),
            (_, Toggle) => format!("digitalWrite({0}, !digitalRead({0}))", object),
            (_, Write) => format!("digitalWrite({}, {})", object, arg),
            (Analog, Read) => format!("analogRead({})", object),
            (_, Read) => format!("digitalRead({})", object),
            (_, Pressed) => format!("(digitalRead({}) == LOW)", object),
        }
    }
}

/// Descubre instancias y usos de tipos de hardware y asigna canales.
pub fn plan(
    program: &Program,
    table: &SymbolTable,
    config: &BoardConfig,
) -> Result<HardwarePlan, Vec<Located<HardwareError>>> {
    let mut planner = Planner {
        table,
        board: config.board,
        plan: HardwarePlan {
            family: config.board.family(),
            instances: HashMap::new(),
            channels: Vec::new(),
        },
        errors: Vec::new(),
    };

    visit::walk_program(&mut planner, program);

    let Planner { plan, errors, .. } = planner;
    if errors.is_empty() {
        tracing::debug!(
            instances = plan.instances.len(),
            channels = plan.channels.len(),
            "hardware lowering planned"
        );

        Ok(plan)
    } else {
        Err(errors)
    }
}

struct Planner<'a> {
    table: &'a SymbolTable,
    board: Board,
    plan: HardwarePlan,
    errors: Vec<Located<HardwareError>>,
}

impl Planner<'_> {
    fn error(&mut self, error: HardwareError, location: &Location) {
        self.errors.push(Located::at(error, location.clone()));
    }

    fn instance(&mut self, symbol: SymbolId, ty: HardwareType, pin: &Located<Expr>) {
        let key = pin_key(pin.val(), self.table).unwrap_or_else(|| format!("{}#{}", ty, symbol.0));

        let instance = Instance {
            ty,
            pin: pin.clone(),
            channel: None,
            key,
        };

        self.plan.instances.insert(symbol, instance);
        if ty == HardwareType::Pwm {
            self.allocate(symbol, pin.location());
        }
    }

    fn method(&mut self, symbol: SymbolId, member: &Located<Identifier>, found: usize, location: &Location) {
        let ty = match self.plan.instance(symbol) {
            Some(instance) => instance.ty,
            None => return,
        };

        let method = member.val().clone();
        match ty.method(method.as_ref()) {
            None => self.error(HardwareError::UnknownMethod { ty, method }, member.location()),

            Some((_, expected)) if expected != found => {
                let error = HardwareError::Arity {
                    ty,
                    method,
                    expected,
                    found,
                };

                self.error(error, location);
            }

            Some((method, _)) => {
                if method.uses_pwm(ty) {
                    self.allocate(symbol, location);
                }
            }
        }
    }

    /// Asigna un canal al pin de una instancia, si la familia los usa.
    fn allocate(&mut self, symbol: SymbolId, location: &Location) {
        if self.plan.family != Family::EspChannel {
            return;
        }

        let instance = match self.plan.instances.get_mut(&symbol) {
            Some(instance) if instance.channel.is_none() => instance,
            _ => return,
        };

        let channels = &mut self.plan.channels;
        let channel = match channels.iter().find(|(key, _)| *key == instance.key) {
            Some(&(_, channel)) => channel,
            None => {
                let limit = self.board.pwm_channels().unwrap_or(u8::MAX);
                if channels.len() >= limit as usize {
                    let error = HardwareError::OutOfChannels {
                        board: self.board,
                        limit,
                    };

                    self.errors.push(Located::at(error, location.clone()));
                    return;
                }

                let channel = channels.len() as u8;
                channels.push((instance.key.clone(), channel));
                tracing::trace!(pin = %instance.key, channel, "allocated PWM channel");

                channel
            }
        };

        instance.channel = Some(channel);
    }

    fn instance_of(&self, object: &Located<Expr>) -> Option<SymbolId> {
        match object.val() {
            Expr::Identifier(Reference {
                symbol: Some(id), ..
            })
            | Expr::Member {
                symbol: Some(id), ..
            } if self.plan.instances.contains_key(id) => Some(*id),

            _ => None,
        }
    }

    fn is_member(&self, symbol: SymbolId) -> bool {
        self.table.scope_kind(self.table.get(symbol).scope) == ScopeKind::Members
    }
}

impl Visit for Planner<'_> {
    fn visit_var(&mut self, var: &VarDecl) {
        let instantiation = var.initializer.as_ref().and_then(|initializer| match initializer.val() {
            Expr::New { type_name, args } => {
                hardware_type(type_name.val()).map(|ty| (ty, args, initializer.location()))
            }

            _ => None,
        });

        let (ty, args, location) = match instantiation {
            Some(instantiation) => instantiation,
            None => return visit::walk_var(self, var),
        };

        for arg in args {
            self.visit_expr(arg);
        }

        let symbol = var.symbol.filter(|&symbol| !self.is_member(symbol));
        match (symbol, args.as_slice()) {
            (Some(symbol), [pin]) => self.instance(symbol, ty, pin),
            (Some(_), _) => self.error(HardwareError::PinArity { ty, found: args.len() }, location),
            (None, _) => self.error(HardwareError::Instantiation(ty), location),
        }
    }

    fn visit_expr(&mut self, expr: &Located<Expr>) {
        match expr.val() {
            Expr::New { type_name, .. } => {
                if let Some(ty) = hardware_type(type_name.val()) {
                    self.error(HardwareError::Instantiation(ty), expr.location());
                }
            }

            Expr::Call { callee, args } => {
                if let Expr::Member { object, member, .. } = callee.val() {
                    if let Some(symbol) = self.instance_of(object) {
                        self.method(symbol, member, args.len(), callee.location());
                    }
                }
            }

            _ => (),
        }

        visit::walk_expr(self, expr);
    }
}

/// Tipo de hardware nombrado por `type_name`, si lo es.
pub fn hardware_type(type_name: &TypeName) -> Option<HardwareType> {
    if type_name.is_qualified() || type_name.array {
        return None;
    }

    type_name.base().as_ref().parse().ok()
}

/// Identidad de un pin: su número o el nombre que lo define.
fn pin_key(pin: &Expr, table: &SymbolTable) -> Option<String> {
    match pin {
        Expr::Literal(Literal {
            value: LiteralValue::Number(Number::Int(pin)),
            ..
        }) => Some(pin.to_string()),

        Expr::Identifier(Reference {
            symbol: Some(id), ..
        })
        | Expr::Member {
            symbol: Some(id), ..
        } => Some(table.qualified_name(*id, ".")),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_table() {
        assert_eq!(HardwareType::Led.method("set"), Some((Method::Set, 1)));
        assert_eq!(HardwareType::Button.method("pressed"), Some((Method::Pressed, 0)));
        assert_eq!(HardwareType::Analog.method("write"), None);
        assert_eq!("Servo".parse::<HardwareType>(), Err(()));
    }

    #[test]
    fn native_pwm_writes_pin() {
        assert_eq!(NativePwm::write("led", None, "128"), "analogWrite(led, 128)");
        assert!(NativePwm::setup("led", None).is_empty());
    }

    #[test]
    fn channel_pwm_uses_wrappers() {
        assert_eq!(ChannelPwm::write("led", Some(2), "duty"), "ys_pwm_write_ch2(duty)");
        assert_eq!(
            ChannelPwm::setup("led", Some(2)),
            vec!["ledcSetup(2, 5000, 8);", "ledcAttachPin(led, 2);"]
        );

        let prelude = ChannelPwm::prelude(&[("13".into(), 0)]);
        assert_eq!(
            prelude,
            vec!["void ys_pwm_write_ch0(uint32_t duty) { ledcWrite(0, duty); }"]
        );
    }
}
