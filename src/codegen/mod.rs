//! Generación de código.
//!
//! La salida es un único archivo fuente para la toolchain de Arduino.
//! Cada unidad cargada como módulo se emite dentro de un `namespace`
//! con el nombre de su alias. Dentro de cada unidad el orden es fijo:
//! primero sus módulos, luego enumeraciones, estructuras y clases,
//! luego prototipos de todas las funciones y finalmente el resto de las
//! declaraciones en orden de aparición. Los bloques `on start` y
//! `on loop` de la unidad principal se funden en `setup()` y `loop()`.

mod expr;

use std::fmt::{self, Write};

use bitflags::bitflags;

use crate::{
    config::{BoardConfig, Family},
    hardware::{self, HardwarePlan, PIN_TYPE},
    interrupt::VolatileSet,
    parse::ast::*,
    semantic::{SymbolTable, PRIMITIVE_TYPES},
    source::Located,
};

bitflags! {
    /// Opciones de emisión.
    pub struct EmitFlags: u8 {
        /// Comentario inicial con la unidad y la placa.
        const HEADER_COMMENT = 0x01;

        /// Comentario `// archivo:línea` antes de cada declaración.
        const LINE_COMMENTS = 0x02;
    }
}

impl Default for EmitFlags {
    fn default() -> Self {
        EmitFlags::HEADER_COMMENT
    }
}

/// Resultados de las fases anteriores.
#[derive(Copy, Clone)]
pub struct Context<'a> {
    pub table: &'a SymbolTable,
    pub volatile: &'a VolatileSet,
    pub plan: &'a HardwarePlan,
    pub config: &'a BoardConfig,
    pub flags: EmitFlags,
}

/// Emite el programa completo.
pub fn emit<'a, W: Write>(program: &'a Program, context: Context<'a>, output: &'a mut W) -> fmt::Result {
    let mut emitter = Emitter {
        context,
        output,
        depth: 0,
        namespace: Vec::new(),
        interrupts: 0,
        handlers: 0,
        temporaries: 0,
        setup: Vec::new(),
        starts: Vec::new(),
        schedule: Vec::new(),
        dispatch: Vec::new(),
        loops: Vec::new(),
    };

    emitter.program(program)
}

/// Contenido diferido de `setup()`.
enum Deferred<'a> {
    Line(String),
    Catch { value: String, handler: &'a Block },
}

struct Emitter<'a, W> {
    context: Context<'a>,
    output: &'a mut W,
    depth: usize,
    namespace: Vec<String>,

    interrupts: usize,
    handlers: usize,
    temporaries: usize,

    setup: Vec<Deferred<'a>>,
    starts: Vec<&'a Block>,
    schedule: Vec<String>,
    dispatch: Vec<(String, Vec<String>)>,
    loops: Vec<&'a Block>,
}

impl<'a, W: Write> Emitter<'a, W> {
    fn output(&mut self) -> &mut W {
        &mut *self.output
    }

    fn indentation(&mut self) -> fmt::Result {
        for _ in 0..self.depth {
            self.output.write_str("    ")?;
        }

        Ok(())
    }

    fn program(&mut self, program: &'a Program) -> fmt::Result {
        let config = self.context.config;

        if self.context.flags.contains(EmitFlags::HEADER_COMMENT) {
            emit!(self, "// Generated by ysc from {} (board: {})", program.name, config.board)?;
            emit!(self)?;
        }

        emit!(self, "#include <Arduino.h>")?;

        let mut includes = Vec::new();
        native_includes(program, &mut includes);

        for include in includes {
            emit!(self, "#include <{}>", include)?;
        }

        emit!(self)?;

        let prelude = self.context.plan.prelude();
        for line in &prelude {
            emit!(self, "{}", line)?;
        }

        if !prelude.is_empty() {
            emit!(self)?;
        }

        if let Some(baud) = config.baud_rate() {
            self.setup.push(Deferred::Line(format!("Serial.begin({});", baud)));
        }

        self.unit(program, true)?;
        self.setup_function()?;
        self.loop_function()
    }

    fn unit(&mut self, program: &'a Program, root: bool) -> fmt::Result {
        for item in &program.items {
            if let Item::Module(module) = item.val() {
                self.module(module)?;
            }
        }

        for item in &program.items {
            match item.val() {
                Item::Enum(enumeration) => self.enumeration(enumeration)?,
                Item::Struct(structure) => self.structure(structure)?,
                Item::Class(class) => self.class(class)?,
                _ => (),
            }
        }

        let mut prototypes = false;
        for item in &program.items {
            if let Item::Function(function) = item.val() {
                let signature = self.signature(
                    function.name.val().as_ref(),
                    &function.params,
                    function.return_type.as_ref(),
                );

                emit!(self, "{};", signature)?;
                prototypes = true;
            }
        }

        if prototypes {
            emit!(self)?;
        }

        for item in &program.items {
            self.item(item, root)?;
        }

        // Cuerpos fuera de línea, ya con globales y prototipos declarados
        for item in &program.items {
            if let Item::Class(class) = item.val() {
                self.class_bodies(class)?;
            }
        }

        Ok(())
    }

    fn module(&mut self, module: &'a Module) -> fmt::Result {
        let namespace = module.namespace.val().to_string();

        emit!(self, "namespace {} {{", namespace)?;
        emit!(self)?;

        self.namespace.push(namespace.clone());
        self.unit(&module.program, false)?;
        self.namespace.pop();

        emit!(self, "}} // namespace {}", namespace)?;
        emit!(self)
    }

    fn item(&mut self, item: &'a Located<Item>, root: bool) -> fmt::Result {
        let location = item.location();
        let commented = !matches!(
            item.val(),
            Item::Config(_)
                | Item::Load(_)
                | Item::Module(_)
                | Item::NativeInclude(_)
                | Item::Enum(_)
                | Item::Struct(_)
                | Item::Class(_)
        );

        if commented && self.context.flags.contains(EmitFlags::LINE_COMMENTS) {
            emit!(self, "// {}:{}", location.source_name(), location.line())?;
        }

        match item.val() {
            Item::Var(var) => self.global(var),

            Item::Alias(alias) => {
                let value = self.expr(&alias.value);
                emit!(self, "const auto {} = {};", alias.name.val(), value)
            }

            Item::Function(function) => {
                let signature = self.signature(
                    function.name.val().as_ref(),
                    &function.params,
                    function.return_type.as_ref(),
                );

                self.function(&signature, &function.body)
            }

            Item::Signal(signal) => {
                emit!(self, "volatile bool {} = false;", signal_flag(signal.name.val()))?;
                emit!(self)
            }

            Item::Event(event) => self.event(event, root),
            Item::Interrupt(interrupt) => self.interrupt(interrupt),
            Item::Task(task) => self.task(task),

            Item::Native(text) => {
                emit!(self, "{}", text)?;
                emit!(self)
            }

            Item::Config(_)
            | Item::Load(_)
            | Item::Module(_)
            | Item::NativeInclude(_)
            | Item::Enum(_)
            | Item::Struct(_)
            | Item::Class(_) => Ok(()),
        }
    }

    fn global(&mut self, var: &'a VarDecl) -> fmt::Result {
        let (declaration, handler) = self.declaration(var);
        emit!(self, "{};", declaration)?;

        if let Some(id) = var.symbol {
            let plan = self.context.plan;
            let name = self.context.table.qualified_name(id, "::");

            if let Some(instance) = plan.instance(id) {
                let lines = plan.setup(instance, &name);
                self.setup.extend(lines.into_iter().map(Deferred::Line));
            }

            if let Some(handler) = handler {
                self.setup.push(Deferred::Catch {
                    value: name,
                    handler,
                });
            }
        }

        emit!(self)
    }

    /// Declaración de variable sin `;` final, junto con su manejador
    /// de `catch` si lo tiene.
    fn declaration<'v>(&self, var: &'v VarDecl) -> (String, Option<&'v Block>) {
        let mut declaration = String::new();

        let plan = self.context.plan;
        let instance = var.symbol.and_then(|id| plan.instance(id));
        if var.symbol.map_or(false, |id| self.context.volatile.contains(id)) {
            declaration.push_str("volatile ");
        }

        if !var.is_mutable() {
            declaration.push_str("const ");
        }

        let ty = match instance {
            Some(_) => PIN_TYPE.to_owned(),
            None => self.type_name(&var.declared_type),
        };

        let suffix = if var.declared_type.val().array { "[]" } else { "" };
        declaration.push_str(&format!("{} {}{}", ty, var.name.val(), suffix));

        let (value, handler) = match (instance, &var.initializer) {
            (Some(instance), _) => (Some(self.expr(&instance.pin)), None),
            (None, Some(initializer)) => {
                let (value, handler) = self.split_catch(initializer);
                (Some(value), handler)
            }

            (None, None) => (None, None),
        };

        if let Some(value) = value {
            declaration.push_str(" = ");
            declaration.push_str(&value);
        }

        (declaration, handler)
    }

    fn signature(&self, name: &str, params: &[Param], return_type: Option<&Located<TypeName>>) -> String {
        let returns = match return_type {
            Some(ty) if ty.val().array => format!("{}*", self.type_name(ty)),
            Some(ty) => self.type_name(ty),
            None => String::from("void"),
        };

        format!("{} {}({})", returns, name, self.parameters(params))
    }

    fn parameters(&self, params: &[Param]) -> String {
        let params: Vec<String> = params
            .iter()
            .map(|param| {
                let suffix = if param.ty.val().array { "[]" } else { "" };
                format!("{} {}{}", self.type_name(&param.ty), param.name.val(), suffix)
            })
            .collect();

        params.join(", ")
    }

    fn function(&mut self, signature: &str, body: &[Located<Statement>]) -> fmt::Result {
        emit!(self, "{} {{", signature)?;
        self.block(body)?;
        emit!(self, "}}")?;
        emit!(self)
    }

    fn enumeration(&mut self, enumeration: &EnumDecl) -> fmt::Result {
        let variants: Vec<String> = enumeration
            .variants
            .iter()
            .map(|variant| variant.val().to_string())
            .collect();

        emit!(self, "enum {} {{ {} }};", enumeration.name.val(), variants.join(", "))?;
        emit!(self)
    }

    fn structure(&mut self, structure: &StructDecl) -> fmt::Result {
        emit!(self, "struct {} {{", structure.name.val())?;

        self.depth += 1;
        for field in &structure.fields {
            let suffix = if field.ty.val().array { "[]" } else { "" };
            let ty = self.type_name(&field.ty);
            emit!(self, "{} {}{};", ty, field.name.val(), suffix)?;
        }

        self.depth -= 1;
        emit!(self, "}};")?;
        emit!(self)
    }

    /// Definición de la clase con los prototipos de sus miembros.
    fn class(&mut self, class: &ClassDecl) -> fmt::Result {
        let name = class.name.val();
        emit!(self, "class {} {{", name)?;
        emit!(self, "public:")?;

        self.depth += 1;
        for field in &class.fields {
            let (declaration, _) = self.declaration(field.val());
            emit!(self, "{};", declaration)?;
        }

        let callables = class.constructor.is_some() || !class.methods.is_empty();
        if callables && !class.fields.is_empty() {
            emit!(self)?;
        }

        if let Some(constructor) = &class.constructor {
            let params = self.parameters(&constructor.params);
            emit!(self, "{}({});", name, params)?;
        }

        for method in &class.methods {
            let method = method.val();
            let signature = self.signature(method.name.val().as_ref(), &method.params, method.return_type.as_ref());
            emit!(self, "{};", signature)?;
        }

        self.depth -= 1;
        emit!(self, "}};")?;
        emit!(self)
    }

    fn class_bodies(&mut self, class: &ClassDecl) -> fmt::Result {
        let name = class.name.val();

        if let Some(constructor) = &class.constructor {
            let signature = format!("{0}::{0}({1})", name, self.parameters(&constructor.params));
            self.function(&signature, &constructor.body)?;
        }

        for method in &class.methods {
            let method = method.val();
            let qualified = format!("{}::{}", name, method.name.val());
            let signature = self.signature(&qualified, &method.params, method.return_type.as_ref());
            self.function(&signature, &method.body)?;
        }

        Ok(())
    }

    fn event(&mut self, event: &'a EventBlock, root: bool) -> fmt::Result {
        match &event.kind {
            EventKind::Start if root => self.starts.push(&event.body),
            EventKind::Loop if root => self.loops.push(&event.body),

            EventKind::Start | EventKind::Loop => {
                let (name, start) = match event.kind {
                    EventKind::Start => (format!("ys_start_{}", self.handlers), true),
                    _ => (format!("ys_loop_{}", self.handlers), false),
                };

                self.handlers += 1;
                self.function(&format!("void {}()", name), &event.body)?;

                let call = format!("{}();", self.qualify(&name));
                if start {
                    self.setup.push(Deferred::Line(call));
                } else {
                    self.schedule.push(call);
                }
            }

            EventKind::Signal(signal) => {
                let name = format!("ys_on_{}_{}", signal.name.val(), self.handlers);
                self.handlers += 1;
                self.function(&format!("void {}()", name), &event.body)?;

                let flag = self.signal_reference(signal);
                let handler = format!("{}();", self.qualify(&name));

                match self.dispatch.iter_mut().find(|(existing, _)| *existing == flag) {
                    Some((_, handlers)) => handlers.push(handler),
                    None => self.dispatch.push((flag, vec![handler])),
                }
            }
        }

        Ok(())
    }

    fn interrupt(&mut self, interrupt: &InterruptBlock) -> fmt::Result {
        let name = match &interrupt.name {
            Some(name) => name.val().to_string(),
            None => format!("isr_{}", self.interrupts),
        };

        self.interrupts += 1;

        let attribute = match self.context.plan.family() {
            Family::Avr => "",
            Family::EspNative | Family::EspChannel => "IRAM_ATTR ",
        };

        self.function(&format!("void {}{}()", attribute, name), &interrupt.body)?;

        let registration = format!(
            "attachInterrupt(digitalPinToInterrupt({}), {}, {});",
            self.expr(&interrupt.pin),
            self.qualify(&name),
            interrupt.mode.native()
        );

        self.setup.push(Deferred::Line(registration));
        Ok(())
    }

    fn task(&mut self, task: &TaskDecl) -> fmt::Result {
        let name = task.name.val().to_string();
        let function = self.qualify(&name);

        match &task.schedule {
            Schedule::Every(period) => {
                let last = format!("ys_last_{}", name);
                emit!(self, "unsigned long {} = 0;", last)?;

                let last = self.qualify(&last);
                let period = self.operand(period);

                self.schedule.push(format!(
                    "if (millis() - {0} >= {1}) {{ {0} = millis(); {2}(); }}",
                    last, period, function
                ));
            }

            Schedule::Background => self.schedule.push(format!("{}();", function)),
        }

        self.function(&format!("void {}()", name), &task.body)
    }

    fn setup_function(&mut self) -> fmt::Result {
        emit!(self, "void setup() {{")?;
        self.depth += 1;

        let setup = std::mem::take(&mut self.setup);
        for deferred in setup {
            match deferred {
                Deferred::Line(line) => emit!(self, "{}", line)?,
                Deferred::Catch { value, handler } => self.guard(&value, handler)?,
            }
        }

        let starts = std::mem::take(&mut self.starts);
        for body in starts {
            for statement in body {
                self.statement(statement)?;
            }
        }

        self.depth -= 1;
        emit!(self, "}}")?;
        emit!(self)
    }

    fn loop_function(&mut self) -> fmt::Result {
        emit!(self, "void loop() {{")?;
        self.depth += 1;

        let schedule = std::mem::take(&mut self.schedule);
        for line in schedule {
            emit!(self, "{}", line)?;
        }

        let dispatch = std::mem::take(&mut self.dispatch);
        for (flag, handlers) in dispatch {
            emit!(self, "if ({}) {{", flag)?;
            self.depth += 1;

            emit!(self, "{} = false;", flag)?;
            for handler in handlers {
                emit!(self, "{}", handler)?;
            }

            self.depth -= 1;
            emit!(self, "}}")?;
        }

        let loops = std::mem::take(&mut self.loops);
        for body in loops {
            for statement in body {
                self.statement(statement)?;
            }
        }

        self.depth -= 1;
        emit!(self, "}}")
    }

    fn block(&mut self, block: &[Located<Statement>]) -> fmt::Result {
        self.depth += 1;
        for statement in block {
            self.statement(statement)?;
        }

        self.depth -= 1;
        Ok(())
    }

    /// `if (!(value)) { handler }`
    fn guard(&mut self, value: &str, handler: &[Located<Statement>]) -> fmt::Result {
        emit!(self, "if (!({})) {{", value)?;
        self.block(handler)?;
        emit!(self, "}}")
    }

    fn statement(&mut self, statement: &Located<Statement>) -> fmt::Result {
        match statement.val() {
            Statement::Var(var) => {
                let (declaration, handler) = self.declaration(var);
                emit!(self, "{};", declaration)?;

                let plan = self.context.plan;
                let name = var.name.val().to_string();

                if let Some(instance) = var.symbol.and_then(|id| plan.instance(id)) {
                    for line in plan.setup(instance, &name) {
                        emit!(self, "{}", line)?;
                    }
                }

                match handler {
                    Some(handler) => self.guard(&name, handler),
                    None => Ok(()),
                }
            }

            Statement::Assign { target, value } => {
                let target = self.expr(target);
                let (value, handler) = self.split_catch(value);
                emit!(self, "{} = {};", target, value)?;

                match handler {
                    Some(handler) => self.guard(&target, handler),
                    None => Ok(()),
                }
            }

            Statement::Expr(expr) => match self.split_catch(expr) {
                (value, Some(handler)) => self.guard(&value, handler),
                (value, None) => emit!(self, "{};", value),
            },

            Statement::If {
                branches,
                otherwise,
            } => {
                for (i, (condition, body)) in branches.iter().enumerate() {
                    let condition = self.expr(condition);
                    if i == 0 {
                        emit!(self, "if ({}) {{", condition)?;
                    } else {
                        emit!(self, "}} else if ({}) {{", condition)?;
                    }

                    self.block(body)?;
                }

                if let Some(otherwise) = otherwise {
                    emit!(self, "}} else {{")?;
                    self.block(otherwise)?;
                }

                emit!(self, "}}")
            }

            Statement::While { condition, body } => {
                let condition = self.expr(condition);
                emit!(self, "while ({}) {{", condition)?;
                self.block(body)?;
                emit!(self, "}}")
            }

            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                let init = init.as_deref().map(|init| self.inline(init)).unwrap_or_default();
                let condition = condition.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let update = update.as_deref().map(|update| self.inline(update)).unwrap_or_default();

                emit!(self, "for ({}; {}; {}) {{", init, condition, update)?;
                self.block(body)?;
                emit!(self, "}}")
            }

            Statement::Repeat { count, body } => {
                let counter = self.temporary("ys_repeat");
                let count = self.operand(count);

                emit!(self, "for (long {0} = 0; {0} < {1}; {0}++) {{", counter, count)?;
                self.block(body)?;
                emit!(self, "}}")
            }

            Statement::Match(stmt) => self.match_statement(stmt),
            Statement::Switch(stmt) => self.switch_statement(stmt),

            Statement::Atomic(body) => {
                emit!(self, "noInterrupts();")?;
                emit!(self, "{{")?;
                self.block(body)?;
                emit!(self, "}}")?;
                emit!(self, "interrupts();")
            }

            Statement::Emit(signal) => {
                let flag = self.signal_reference(signal);
                emit!(self, "{} = true;", flag)
            }

            Statement::Return(Some(value)) => {
                let value = self.expr(value);
                emit!(self, "return {};", value)
            }

            Statement::Return(None) => emit!(self, "return;"),
            Statement::Break => emit!(self, "break;"),
            Statement::Continue => emit!(self, "continue;"),
            Statement::Native(text) => emit!(self, "{}", text),
        }
    }

    /// Instrucción simple dentro del encabezado de un `for`.
    fn inline(&self, statement: &Located<Statement>) -> String {
        match statement.val() {
            Statement::Var(var) => self.declaration(var).0,
            Statement::Assign { target, value } => {
                format!("{} = {}", self.expr(target), self.expr(value))
            }

            Statement::Expr(expr) => self.expr(expr),
            _ => String::new(),
        }
    }

    /// `match` se baja a una cadena `if`/`else if`. El brazo comodín,
    /// donde sea que aparezca, se evalúa de último.
    fn match_statement(&mut self, stmt: &MatchStmt) -> fmt::Result {
        let subject = match stmt.subject.val() {
            Expr::Identifier(_) | Expr::Member { .. } | Expr::Literal(_) => self.expr(&stmt.subject),
            _ => {
                let temporary = self.temporary("ys_match");
                let value = self.expr(&stmt.subject);
                emit!(self, "auto {} = {};", temporary, value)?;

                temporary
            }
        };

        let mut first = true;
        for arm in stmt.arms.iter().filter(|arm| !arm.is_wildcard()) {
            let condition: Vec<String> = arm
                .patterns
                .iter()
                .filter_map(|pattern| match pattern.val() {
                    Pattern::Value(value) => Some(format!("{} == {}", subject, self.operand(value))),
                    Pattern::Wildcard => None,
                })
                .collect();

            let keyword = if first { "if" } else { "} else if" };
            emit!(self, "{} ({}) {{", keyword, condition.join(" || "))?;
            self.block(&arm.body)?;

            first = false;
        }

        if let Some(wildcard) = stmt.arms.iter().find(|arm| arm.is_wildcard()) {
            if first {
                emit!(self, "{{")?;
            } else {
                emit!(self, "}} else {{")?;
            }

            self.block(&wildcard.body)?;
            first = false;
        }

        if first {
            Ok(())
        } else {
            emit!(self, "}}")
        }
    }

    fn switch_statement(&mut self, stmt: &SwitchStmt) -> fmt::Result {
        let subject = self.expr(&stmt.subject);
        emit!(self, "switch ({}) {{", subject)?;

        for case in &stmt.cases {
            let value = self.expr(&case.value);
            emit!(self, "case {}: {{", value)?;
            self.case_body(&case.body)?;
        }

        if let Some(default) = &stmt.default {
            emit!(self, "default: {{")?;
            self.case_body(default)?;
        }

        emit!(self, "}}")
    }

    fn case_body(&mut self, body: &[Located<Statement>]) -> fmt::Result {
        self.block(body)?;

        self.depth += 1;
        emit!(self, "break;")?;
        self.depth -= 1;

        emit!(self, "}}")
    }

    fn temporary(&mut self, prefix: &str) -> String {
        let name = format!("{}_{}", prefix, self.temporaries);
        self.temporaries += 1;
        name
    }

    /// Nombre calificado por el espacio de nombres actual.
    fn qualify(&self, name: &str) -> String {
        let mut qualified = String::new();
        for namespace in &self.namespace {
            qualified.push_str(namespace);
            qualified.push_str("::");
        }

        qualified.push_str(name);
        qualified
    }

    fn signal_reference(&self, signal: &Reference) -> String {
        match signal.symbol {
            Some(id) => {
                let qualified = self.context.table.qualified_name(id, "::");
                match qualified.rfind("::") {
                    Some(split) => format!(
                        "{}::{}",
                        &qualified[..split],
                        signal_flag(&qualified[split + 2..])
                    ),

                    None => signal_flag(&qualified),
                }
            }

            None => signal_flag(signal.name.val()),
        }
    }

    fn type_name(&self, ty: &Located<TypeName>) -> String {
        let name = ty.val();
        if hardware::hardware_type(name).is_some() {
            return PIN_TYPE.to_owned();
        }

        let base = name.base().as_ref();
        if !name.is_qualified() && PRIMITIVE_TYPES.contains(&base) {
            return match base {
                "string" => String::from("String"),
                primitive => primitive.to_owned(),
            };
        }

        let path: Vec<&str> = name.path.iter().map(AsRef::as_ref).collect();
        path.join("::")
    }
}

fn signal_flag<N: std::fmt::Display + ?Sized>(name: &N) -> String {
    format!("ys_signal_{}", name)
}

fn native_includes<'p>(program: &'p Program, includes: &mut Vec<&'p str>) {
    for item in &program.items {
        match item.val() {
            Item::NativeInclude(include) if !includes.contains(&include.as_str()) => {
                includes.push(include);
            }

            Item::Module(module) => native_includes(&module.program, includes),
            _ => (),
        }
    }
}
