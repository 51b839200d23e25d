// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Deterministic source printer
//!
//! Output depends only on the tree: same tree, same bytes.

use super::ast::{AspectReference, Block, Expr, Literal, ReferenceAccess, Statement, UnaryOperator};
use super::member::{AccessorSyntax, MemberModifiers, MemberSyntax, SyntaxUnit, TypeSyntax};
use crate::symbols::{Accessibility, ConstructorInitializerKind, Parameter};
use std::fmt::Write;

const INDENT: &str = "    ";

/// Render a whole unit
pub fn print_unit(unit: &SyntaxUnit) -> String {
    let mut printer = Printer::default();
    printer.line(&format!("// {}", unit.path));
    for type_syntax in &unit.types {
        printer.blank();
        match &type_syntax.namespace {
            Some(namespace) => {
                printer.line(&format!("namespace {}", namespace));
                printer.open();
                printer.type_declaration(type_syntax);
                printer.close();
            }
            None => printer.type_declaration(type_syntax),
        }
    }
    printer.output
}

/// Render a single block at indentation zero
pub fn print_block(block: &Block) -> String {
    let mut printer = Printer::default();
    printer.block(block);
    printer.output
}

/// Render a single expression
pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

#[derive(Default)]
struct Printer {
    output: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.output.push_str(INDENT);
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn blank(&mut self) {
        self.output.push('\n');
    }

    fn open(&mut self) {
        self.line("{");
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    fn type_declaration(&mut self, type_syntax: &TypeSyntax) {
        let mut header = String::from(type_syntax.accessibility.keyword());
        if type_syntax.is_static {
            header.push_str(" static");
        }
        if type_syntax.is_partial {
            header.push_str(" partial");
        }
        let _ = write!(header, " {} {}", type_syntax.kind.keyword(), type_syntax.name);
        if !type_syntax.base_list.is_empty() {
            let _ = write!(header, " : {}", type_syntax.base_list.join(", "));
        }
        self.line(&header);
        self.open();
        for (index, member) in type_syntax.members.iter().enumerate() {
            if index > 0 {
                self.blank();
            }
            self.member(member);
        }
        self.close();
    }

    fn member(&mut self, member: &MemberSyntax) {
        match member {
            MemberSyntax::Field {
                accessibility,
                modifiers,
                ty,
                name,
                initializer,
            } => {
                let mut text = format!("{}{} {}", prefix(*accessibility, *modifiers), ty, name);
                if let Some(initializer) = initializer {
                    text.push_str(" = ");
                    write_expr(&mut text, initializer);
                }
                text.push(';');
                self.line(&text);
            }
            MemberSyntax::Method {
                accessibility,
                modifiers,
                return_type,
                name,
                explicit_interface,
                parameters,
                body,
            } => {
                let header = match explicit_interface {
                    Some(interface) => format!("{} {}.{}({})", return_type, interface, name, parameter_list(parameters)),
                    None => format!("{}{} {}({})", prefix(*accessibility, *modifiers), return_type, name, parameter_list(parameters)),
                };
                match body {
                    Some(body) => {
                        self.line(&header);
                        self.block(body);
                    }
                    None => self.line(&format!("{};", header)),
                }
            }
            MemberSyntax::Constructor {
                accessibility,
                modifiers,
                name,
                parameters,
                initializer,
                body,
            } => {
                let mut header = if modifiers.is_static {
                    format!("static {}({})", name, parameter_list(parameters))
                } else {
                    format!("{} {}({})", accessibility.keyword(), name, parameter_list(parameters))
                };
                if let Some(initializer) = initializer {
                    let keyword = match initializer.kind {
                        ConstructorInitializerKind::This => "this",
                        ConstructorInitializerKind::Base => "base",
                    };
                    let _ = write!(header, " : {}(", keyword);
                    write_arguments(&mut header, &initializer.arguments);
                    header.push(')');
                }
                self.line(&header);
                self.block(body);
            }
            MemberSyntax::Finalizer { name, body } => {
                self.line(&format!("~{}()", name));
                self.block(body);
            }
            MemberSyntax::Property {
                accessibility,
                modifiers,
                ty,
                name,
                explicit_interface,
                accessors,
                initializer,
            } => {
                let header = match explicit_interface {
                    Some(interface) => format!("{} {}.{}", ty, interface, name),
                    None => format!("{}{} {}", prefix(*accessibility, *modifiers), ty, name),
                };
                if accessors.iter().all(|a| a.body.is_none()) {
                    let keywords: Vec<String> = accessors.iter().map(|a| format!("{};", a.kind.keyword())).collect();
                    let mut text = format!("{} {{ {} }}", header, keywords.join(" "));
                    if let Some(initializer) = initializer {
                        text.push_str(" = ");
                        write_expr(&mut text, initializer);
                        text.push(';');
                    }
                    self.line(&text);
                } else {
                    self.line(&header);
                    self.accessors(accessors);
                }
            }
            MemberSyntax::Event {
                accessibility,
                modifiers,
                ty,
                name,
                explicit_interface,
                accessors,
            } => match accessors {
                None => self.line(&format!("{}event {} {};", prefix(*accessibility, *modifiers), ty, name)),
                Some(accessors) => {
                    let header = match explicit_interface {
                        Some(interface) => format!("event {} {}.{}", ty, interface, name),
                        None => format!("{}event {} {}", prefix(*accessibility, *modifiers), ty, name),
                    };
                    self.line(&header);
                    self.accessors(accessors);
                }
            },
            MemberSyntax::Type(type_syntax) => self.type_declaration(type_syntax),
        }
    }

    fn accessors(&mut self, accessors: &[AccessorSyntax]) {
        self.open();
        for accessor in accessors {
            match &accessor.body {
                Some(body) => {
                    self.line(accessor.kind.keyword());
                    self.block(body);
                }
                None => self.line(&format!("{};", accessor.kind.keyword())),
            }
        }
        self.close();
    }

    fn block(&mut self, block: &Block) {
        self.open();
        for statement in &block.statements {
            self.statement(statement);
        }
        self.close();
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.block(block),
            Statement::Expression { expression } => {
                let mut text = String::new();
                write_expr(&mut text, expression);
                text.push(';');
                self.line(&text);
            }
            Statement::Local { name, ty, initializer } => {
                let mut text = format!("{} {}", ty.as_deref().unwrap_or("var"), name);
                if let Some(initializer) = initializer {
                    text.push_str(" = ");
                    write_expr(&mut text, initializer);
                }
                text.push(';');
                self.line(&text);
            }
            Statement::Return { value } => match value {
                Some(value) => {
                    let mut text = String::from("return ");
                    write_expr(&mut text, value);
                    text.push(';');
                    self.line(&text);
                }
                None => self.line("return;"),
            },
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut text = String::from("if (");
                write_expr(&mut text, condition);
                text.push(')');
                self.line(&text);
                self.nested(then_branch);
                if let Some(else_branch) = else_branch {
                    self.line("else");
                    self.nested(else_branch);
                }
            }
            Statement::While { condition, body } => {
                let mut text = String::from("while (");
                write_expr(&mut text, condition);
                text.push(')');
                self.line(&text);
                self.nested(body);
            }
            Statement::Try { body, catches, finally } => {
                self.line("try");
                self.block(body);
                for catch in catches {
                    let header = match (&catch.exception_type, &catch.name) {
                        (Some(ty), Some(name)) => format!("catch ({} {})", ty, name),
                        (Some(ty), None) => format!("catch ({})", ty),
                        _ => "catch".to_string(),
                    };
                    self.line(&header);
                    self.block(&catch.body);
                }
                if let Some(finally) = finally {
                    self.line("finally");
                    self.block(finally);
                }
            }
            Statement::Throw { value } => match value {
                Some(value) => {
                    let mut text = String::from("throw ");
                    write_expr(&mut text, value);
                    text.push(';');
                    self.line(&text);
                }
                None => self.line("throw;"),
            },
            Statement::Labeled { label, statement } => {
                self.depth = self.depth.saturating_sub(1);
                self.line(&format!("{}:", label));
                self.depth += 1;
                self.statement(statement);
            }
            Statement::Goto { label } => self.line(&format!("goto {};", label)),
            Statement::Empty => self.line(";"),
        }
    }

    /// Embedded statement of an if/while: blocks print as-is, others indented
    fn nested(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.block(block),
            other => {
                self.depth += 1;
                self.statement(other);
                self.depth -= 1;
            }
        }
    }
}

fn prefix(accessibility: Accessibility, modifiers: MemberModifiers) -> String {
    let mut text = format!("{} ", accessibility.keyword());
    if modifiers.is_static {
        text.push_str("static ");
    }
    if modifiers.is_override {
        text.push_str("override ");
    }
    text
}

fn parameter_list(parameters: &[Parameter]) -> String {
    parameters.iter().map(|p| format!("{} {}", p.ty, p.name)).collect::<Vec<_>>().join(", ")
}

fn write_arguments(out: &mut String, arguments: &[Expr]) {
    for (index, argument) in arguments.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_expr(out, argument);
    }
}

fn needs_parentheses(expr: &Expr) -> bool {
    matches!(expr, Expr::Binary { .. } | Expr::Assignment { .. })
}

fn write_operand(out: &mut String, expr: &Expr) {
    if needs_parentheses(expr) {
        out.push('(');
        write_expr(out, expr);
        out.push(')');
    } else {
        write_expr(out, expr);
    }
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Null => out.push_str("null"),
        Literal::Default => out.push_str("default"),
        Literal::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Literal::Int(value) => {
            let _ = write!(out, "{}", value);
        }
        Literal::String(value) => {
            out.push('"');
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Literal { value } => write_literal(out, value),
        Expr::Identifier { name } | Expr::TypeName { name } => out.push_str(name),
        Expr::This => out.push_str("this"),
        Expr::Base => out.push_str("base"),
        Expr::MemberAccess { target, member } => {
            write_operand(out, target);
            out.push('.');
            out.push_str(member);
        }
        Expr::Invocation { target, arguments } => {
            write_operand(out, target);
            out.push('(');
            write_arguments(out, arguments);
            out.push(')');
        }
        Expr::Assignment { target, operator, value } => {
            write_expr(out, target);
            let _ = write!(out, " {} ", operator.token());
            write_expr(out, value);
        }
        Expr::Binary { left, operator, right } => {
            write_operand(out, left);
            let _ = write!(out, " {} ", operator.token());
            write_operand(out, right);
        }
        Expr::Unary { operator, operand } => {
            out.push(match operator {
                UnaryOperator::Not => '!',
                UnaryOperator::Negate => '-',
            });
            write_operand(out, operand);
        }
        Expr::AspectReference(reference) => write_aspect_reference(out, reference),
    }
}

/// Unresolved references only show up when printing templates
fn write_aspect_reference(out: &mut String, reference: &AspectReference) {
    let member = reference.target.rsplit('.').next().unwrap_or(&reference.target);
    let member = member.split('(').next().unwrap_or(member);
    let _ = write!(out, "/*{:?}*/ ", reference.order);
    write_operand(out, &reference.receiver);
    out.push('.');
    out.push_str(member);
    match &reference.access {
        ReferenceAccess::Invoke { arguments } => {
            out.push('(');
            write_arguments(out, arguments);
            out.push(')');
        }
        ReferenceAccess::Get => {}
        ReferenceAccess::Set { value } => {
            out.push_str(" = ");
            write_expr(out, value);
        }
        ReferenceAccess::Add { value } => {
            out.push_str(" += ");
            write_expr(out, value);
        }
        ReferenceAccess::Remove { value } => {
            out.push_str(" -= ");
            write_expr(out, value);
        }
    }
}
