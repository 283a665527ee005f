//! Recorridos del árbol sintáctico.
//!
//! [`Visit`] recorre por referencia compartida y [`VisitMut`] por
//! referencia mutable. Cada método tiene una implementación por defecto
//! que desciende a los hijos, de modo que una fase solo sobreescribe los
//! nodos que le interesan y llama a `walk_*` para continuar el descenso.

use super::ast::*;
use crate::source::Located;

pub trait Visit {
    fn visit_item(&mut self, item: &Located<Item>) {
        walk_item(self, item)
    }

    fn visit_block(&mut self, block: &[Located<Statement>]) {
        for statement in block {
            self.visit_statement(statement);
        }
    }

    fn visit_var(&mut self, var: &VarDecl) {
        walk_var(self, var)
    }

    fn visit_statement(&mut self, statement: &Located<Statement>) {
        walk_statement(self, statement)
    }

    fn visit_expr(&mut self, expr: &Located<Expr>) {
        walk_expr(self, expr)
    }
}

pub fn walk_program<V: Visit + ?Sized>(visitor: &mut V, program: &Program) {
    for item in &program.items {
        visitor.visit_item(item);
    }
}

pub fn walk_var<V: Visit + ?Sized>(visitor: &mut V, var: &VarDecl) {
    if let Some(range) = &var.range {
        visitor.visit_expr(&range.min);
        visitor.visit_expr(&range.max);
    }

    if let Some(initializer) = &var.initializer {
        visitor.visit_expr(initializer);
    }
}

pub fn walk_item<V: Visit + ?Sized>(visitor: &mut V, item: &Located<Item>) {
    match item.as_ref() {
        Item::Config(config) => {
            for (_, value) in &config.entries {
                visitor.visit_expr(value);
            }
        }

        Item::Module(module) => walk_program(visitor, &module.program),
        Item::Var(var) => visitor.visit_var(var),
        Item::Alias(alias) => visitor.visit_expr(&alias.value),
        Item::Function(function) => visitor.visit_block(&function.body),

        Item::Class(class) => {
            for field in &class.fields {
                visitor.visit_var(field.as_ref());
            }

            if let Some(constructor) = &class.constructor {
                visitor.visit_block(&constructor.body);
            }

            for method in &class.methods {
                visitor.visit_block(&method.as_ref().body);
            }
        }

        Item::Event(event) => visitor.visit_block(&event.body),

        Item::Interrupt(interrupt) => {
            visitor.visit_expr(&interrupt.pin);
            visitor.visit_block(&interrupt.body);
        }

        Item::Task(task) => {
            if let Schedule::Every(period) = &task.schedule {
                visitor.visit_expr(period);
            }

            visitor.visit_block(&task.body);
        }

        Item::Load(_)
        | Item::NativeInclude(_)
        | Item::Enum(_)
        | Item::Struct(_)
        | Item::Signal(_)
        | Item::Native(_) => (),
    }
}

pub fn walk_statement<V: Visit + ?Sized>(visitor: &mut V, statement: &Located<Statement>) {
    match statement.as_ref() {
        Statement::Var(var) => visitor.visit_var(var),

        Statement::Assign { target, value } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }

        Statement::Expr(expr) => visitor.visit_expr(expr),

        Statement::If {
            branches,
            otherwise,
        } => {
            for (condition, body) in branches {
                visitor.visit_expr(condition);
                visitor.visit_block(body);
            }

            if let Some(otherwise) = otherwise {
                visitor.visit_block(otherwise);
            }
        }

        Statement::While { condition, body } => {
            visitor.visit_expr(condition);
            visitor.visit_block(body);
        }

        Statement::For {
            init,
            condition,
            update,
            body,
        } => {
            if let Some(init) = init {
                visitor.visit_statement(init);
            }

            if let Some(condition) = condition {
                visitor.visit_expr(condition);
            }

            if let Some(update) = update {
                visitor.visit_statement(update);
            }

            visitor.visit_block(body);
        }

        Statement::Repeat { count, body } => {
            visitor.visit_expr(count);
            visitor.visit_block(body);
        }

        Statement::Match(stmt) => {
            visitor.visit_expr(&stmt.subject);
            for arm in &stmt.arms {
                for pattern in &arm.patterns {
                    if let Pattern::Value(value) = pattern.as_ref() {
                        visitor.visit_expr(value);
                    }
                }

                visitor.visit_block(&arm.body);
            }
        }

        Statement::Switch(stmt) => {
            visitor.visit_expr(&stmt.subject);
            for case in &stmt.cases {
                visitor.visit_expr(&case.value);
                visitor.visit_block(&case.body);
            }

            if let Some(default) = &stmt.default {
                visitor.visit_block(default);
            }
        }

        Statement::Atomic(body) => visitor.visit_block(body),
        Statement::Return(Some(value)) => visitor.visit_expr(value),

        Statement::Emit(_)
        | Statement::Return(None)
        | Statement::Break
        | Statement::Continue
        | Statement::Native(_) => (),
    }
}

pub fn walk_expr<V: Visit + ?Sized>(visitor: &mut V, expr: &Located<Expr>) {
    match expr.as_ref() {
        Expr::Binary(left, _, right) => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }

        Expr::Unary(_, operand) => visitor.visit_expr(operand),

        Expr::Call { callee, args } => {
            visitor.visit_expr(callee);
            for arg in args {
                visitor.visit_expr(arg);
            }
        }

        Expr::Member { object, .. } => visitor.visit_expr(object),

        Expr::New { args, .. } | Expr::Array(args) => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }

        Expr::Subscript(array, index) => {
            visitor.visit_expr(array);
            visitor.visit_expr(index);
        }

        Expr::Convert { value, .. } => visitor.visit_expr(value),

        Expr::Catch { value, handler } => {
            visitor.visit_expr(value);
            visitor.visit_block(handler);
        }

        Expr::StructLiteral { fields, .. } => {
            for (_, value) in fields {
                visitor.visit_expr(value);
            }
        }

        Expr::Clamp { value, min, max } => {
            visitor.visit_expr(value);
            visitor.visit_expr(min);
            visitor.visit_expr(max);
        }

        Expr::Literal(_) | Expr::Identifier(_) | Expr::SelfValue => (),
    }
}

pub trait VisitMut {
    fn visit_item_mut(&mut self, item: &mut Located<Item>) {
        walk_item_mut(self, item)
    }

    fn visit_block_mut(&mut self, block: &mut [Located<Statement>]) {
        for statement in block {
            self.visit_statement_mut(statement);
        }
    }

    fn visit_var_mut(&mut self, var: &mut VarDecl) {
        walk_var_mut(self, var)
    }

    fn visit_statement_mut(&mut self, statement: &mut Located<Statement>) {
        walk_statement_mut(self, statement)
    }

    fn visit_expr_mut(&mut self, expr: &mut Located<Expr>) {
        walk_expr_mut(self, expr)
    }
}

pub fn walk_program_mut<V: VisitMut + ?Sized>(visitor: &mut V, program: &mut Program) {
    for item in &mut program.items {
        visitor.visit_item_mut(item);
    }
}

pub fn walk_var_mut<V: VisitMut + ?Sized>(visitor: &mut V, var: &mut VarDecl) {
    if let Some(range) = &mut var.range {
        visitor.visit_expr_mut(&mut range.min);
        visitor.visit_expr_mut(&mut range.max);
    }

    if let Some(initializer) = &mut var.initializer {
        visitor.visit_expr_mut(initializer);
    }
}

pub fn walk_item_mut<V: VisitMut + ?Sized>(visitor: &mut V, item: &mut Located<Item>) {
    match item.val_mut() {
        Item::Config(config) => {
            for (_, value) in &mut config.entries {
                visitor.visit_expr_mut(value);
            }
        }

        Item::Module(module) => walk_program_mut(visitor, &mut module.program),
        Item::Var(var) => visitor.visit_var_mut(var),
        Item::Alias(alias) => visitor.visit_expr_mut(&mut alias.value),
        Item::Function(function) => visitor.visit_block_mut(&mut function.body),

        Item::Class(class) => {
            for field in &mut class.fields {
                visitor.visit_var_mut(field.val_mut());
            }

            if let Some(constructor) = &mut class.constructor {
                visitor.visit_block_mut(&mut constructor.body);
            }

            for method in &mut class.methods {
                visitor.visit_block_mut(&mut method.val_mut().body);
            }
        }

        Item::Event(event) => visitor.visit_block_mut(&mut event.body),

        Item::Interrupt(interrupt) => {
            visitor.visit_expr_mut(&mut interrupt.pin);
            visitor.visit_block_mut(&mut interrupt.body);
        }

        Item::Task(task) => {
            if let Schedule::Every(period) = &mut task.schedule {
                visitor.visit_expr_mut(period);
            }

            visitor.visit_block_mut(&mut task.body);
        }

        Item::Load(_)
        | Item::NativeInclude(_)
        | Item::Enum(_)
        | Item::Struct(_)
        | Item::Signal(_)
        | Item::Native(_) => (),
    }
}

pub fn walk_statement_mut<V: VisitMut + ?Sized>(
    visitor: &mut V,
    statement: &mut Located<Statement>,
) {
    match statement.val_mut() {
        Statement::Var(var) => visitor.visit_var_mut(var),

        Statement::Assign { target, value } => {
            visitor.visit_expr_mut(target);
            visitor.visit_expr_mut(value);
        }

        Statement::Expr(expr) => visitor.visit_expr_mut(expr),

        Statement::If {
            branches,
            otherwise,
        } => {
            for (condition, body) in branches {
                visitor.visit_expr_mut(condition);
                visitor.visit_block_mut(body);
            }

            if let Some(otherwise) = otherwise {
                visitor.visit_block_mut(otherwise);
            }
        }

        Statement::While { condition, body } => {
            visitor.visit_expr_mut(condition);
            visitor.visit_block_mut(body);
        }

        Statement::For {
            init,
            condition,
            update,
            body,
        } => {
            if let Some(init) = init {
                visitor.visit_statement_mut(init);
            }

            if let Some(condition) = condition {
                visitor.visit_expr_mut(condition);
            }

            if let Some(update) = update {
                visitor.visit_statement_mut(update);
            }

            visitor.visit_block_mut(body);
        }

        Statement::Repeat { count, body } => {
            visitor.visit_expr_mut(count);
            visitor.visit_block_mut(body);
        }

        Statement::Match(stmt) => {
            visitor.visit_expr_mut(&mut stmt.subject);
            for arm in &mut stmt.arms {
                for pattern in &mut arm.patterns {
                    if let Pattern::Value(value) = pattern.val_mut() {
                        visitor.visit_expr_mut(value);
                    }
                }

                visitor.visit_block_mut(&mut arm.body);
            }
        }

        Statement::Switch(stmt) => {
            visitor.visit_expr_mut(&mut stmt.subject);
            for case in &mut stmt.cases {
                visitor.visit_expr_mut(&mut case.value);
                visitor.visit_block_mut(&mut case.body);
            }

            if let Some(default) = &mut stmt.default {
                visitor.visit_block_mut(default);
            }
        }

        Statement::Atomic(body) => visitor.visit_block_mut(body),
        Statement::Return(Some(value)) => visitor.visit_expr_mut(value),

        Statement::Emit(_)
        | Statement::Return(None)
        | Statement::Break
        | Statement::Continue
        | Statement::Native(_) => (),
    }
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(visitor: &mut V, expr: &mut Located<Expr>) {
    match expr.val_mut() {
        Expr::Binary(left, _, right) => {
            visitor.visit_expr_mut(left);
            visitor.visit_expr_mut(right);
        }

        Expr::Unary(_, operand) => visitor.visit_expr_mut(operand),

        Expr::Call { callee, args } => {
            visitor.visit_expr_mut(callee);
            for arg in args {
                visitor.visit_expr_mut(arg);
            }
        }

        Expr::Member { object, .. } => visitor.visit_expr_mut(object),

        Expr::New { args, .. } | Expr::Array(args) => {
            for arg in args {
                visitor.visit_expr_mut(arg);
            }
        }

        Expr::Subscript(array, index) => {
            visitor.visit_expr_mut(array);
            visitor.visit_expr_mut(index);
        }

        Expr::Convert { value, .. } => visitor.visit_expr_mut(value),

        Expr::Catch { value, handler } => {
            visitor.visit_expr_mut(value);
            visitor.visit_block_mut(handler);
        }

        Expr::StructLiteral { fields, .. } => {
            for (_, value) in fields {
                visitor.visit_expr_mut(value);
            }
        }

        Expr::Clamp { value, min, max } => {
            visitor.visit_expr_mut(value);
            visitor.visit_expr_mut(min);
            visitor.visit_expr_mut(max);
        }

        Expr::Literal(_) | Expr::Identifier(_) | Expr::SelfValue => (),
    }
}
