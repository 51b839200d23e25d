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

//! Tree traversal helpers shared by the analysis, linking and cleanup passes

use super::ast::{AspectReference, Block, Expr, ReferenceAccess, Statement};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Visit every statement of a block, outer statements before nested ones
pub fn visit_statements<'a, F: FnMut(&'a Statement)>(block: &'a Block, f: &mut F) {
    for statement in &block.statements {
        visit_statement(statement, f);
    }
}

fn visit_statement<'a, F: FnMut(&'a Statement)>(statement: &'a Statement, f: &mut F) {
    f(statement);
    match statement {
        Statement::Block(block) => visit_statements(block, f),
        Statement::If { then_branch, else_branch, .. } => {
            visit_statement(then_branch, f);
            if let Some(else_branch) = else_branch {
                visit_statement(else_branch, f);
            }
        }
        Statement::While { body, .. } => visit_statement(body, f),
        Statement::Try { body, catches, finally } => {
            visit_statements(body, f);
            for catch in catches {
                visit_statements(&catch.body, f);
            }
            if let Some(finally) = finally {
                visit_statements(finally, f);
            }
        }
        Statement::Labeled { statement, .. } => visit_statement(statement, f),
        Statement::Expression { .. }
        | Statement::Local { .. }
        | Statement::Return { .. }
        | Statement::Throw { .. }
        | Statement::Goto { .. }
        | Statement::Empty => {}
    }
}

/// Mutable counterpart of [`visit_statements`]
pub fn visit_statements_mut<F: FnMut(&mut Statement)>(block: &mut Block, f: &mut F) {
    for statement in &mut block.statements {
        visit_statement_mut(statement, f);
    }
}

fn visit_statement_mut<F: FnMut(&mut Statement)>(statement: &mut Statement, f: &mut F) {
    f(statement);
    match statement {
        Statement::Block(block) => visit_statements_mut(block, f),
        Statement::If { then_branch, else_branch, .. } => {
            visit_statement_mut(then_branch, f);
            if let Some(else_branch) = else_branch {
                visit_statement_mut(else_branch, f);
            }
        }
        Statement::While { body, .. } => visit_statement_mut(body, f),
        Statement::Try { body, catches, finally } => {
            visit_statements_mut(body, f);
            for catch in catches {
                visit_statements_mut(&mut catch.body, f);
            }
            if let Some(finally) = finally {
                visit_statements_mut(finally, f);
            }
        }
        Statement::Labeled { statement, .. } => visit_statement_mut(statement, f),
        Statement::Expression { .. }
        | Statement::Local { .. }
        | Statement::Return { .. }
        | Statement::Throw { .. }
        | Statement::Goto { .. }
        | Statement::Empty => {}
    }
}

/// Expressions held directly by a statement (not by nested statements)
fn statement_expressions(statement: &Statement) -> Vec<&Expr> {
    match statement {
        Statement::Expression { expression } => vec![expression],
        Statement::Local { initializer, .. } => initializer.iter().collect(),
        Statement::Return { value } | Statement::Throw { value } => value.iter().collect(),
        Statement::If { condition, .. } | Statement::While { condition, .. } => vec![condition],
        Statement::Block(_) | Statement::Try { .. } | Statement::Labeled { .. } | Statement::Goto { .. } | Statement::Empty => Vec::new(),
    }
}

fn statement_expressions_mut(statement: &mut Statement) -> Vec<&mut Expr> {
    match statement {
        Statement::Expression { expression } => vec![expression],
        Statement::Local { initializer, .. } => initializer.iter_mut().collect(),
        Statement::Return { value } | Statement::Throw { value } => value.iter_mut().collect(),
        Statement::If { condition, .. } | Statement::While { condition, .. } => vec![condition],
        Statement::Block(_) | Statement::Try { .. } | Statement::Labeled { .. } | Statement::Goto { .. } | Statement::Empty => Vec::new(),
    }
}

/// Visit every expression of a block in source order, parents before children
pub fn visit_expressions<'a, F: FnMut(&'a Expr)>(block: &'a Block, f: &mut F) {
    visit_statements(block, &mut |statement| {
        for expression in statement_expressions(statement) {
            visit_expr(expression, f);
        }
    });
}

pub fn visit_expr<'a, F: FnMut(&'a Expr)>(expr: &'a Expr, f: &mut F) {
    f(expr);
    match expr {
        Expr::Literal { .. } | Expr::Identifier { .. } | Expr::This | Expr::Base | Expr::TypeName { .. } => {}
        Expr::MemberAccess { target, .. } => visit_expr(target, f),
        Expr::Invocation { target, arguments } => {
            visit_expr(target, f);
            for argument in arguments {
                visit_expr(argument, f);
            }
        }
        Expr::Assignment { target, value, .. } => {
            visit_expr(target, f);
            visit_expr(value, f);
        }
        Expr::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::Unary { operand, .. } => visit_expr(operand, f),
        Expr::AspectReference(reference) => {
            visit_expr(&reference.receiver, f);
            match &reference.access {
                ReferenceAccess::Invoke { arguments } => {
                    for argument in arguments {
                        visit_expr(argument, f);
                    }
                }
                ReferenceAccess::Get => {}
                ReferenceAccess::Set { value } | ReferenceAccess::Add { value } | ReferenceAccess::Remove { value } => visit_expr(value, f),
            }
        }
    }
}

/// Visit every expression mutably. The callback runs before the children are visited, so
/// children of a replacement expression are visited too.
pub fn visit_expressions_mut<F: FnMut(&mut Expr)>(block: &mut Block, f: &mut F) {
    visit_statements_mut(block, &mut |statement| {
        for expression in statement_expressions_mut(statement) {
            visit_expr_mut(expression, f);
        }
    });
}

pub fn visit_expr_mut<F: FnMut(&mut Expr)>(expr: &mut Expr, f: &mut F) {
    f(expr);
    match expr {
        Expr::Literal { .. } | Expr::Identifier { .. } | Expr::This | Expr::Base | Expr::TypeName { .. } => {}
        Expr::MemberAccess { target, .. } => visit_expr_mut(target, f),
        Expr::Invocation { target, arguments } => {
            visit_expr_mut(target, f);
            for argument in arguments {
                visit_expr_mut(argument, f);
            }
        }
        Expr::Assignment { target, value, .. } => {
            visit_expr_mut(target, f);
            visit_expr_mut(value, f);
        }
        Expr::Binary { left, right, .. } => {
            visit_expr_mut(left, f);
            visit_expr_mut(right, f);
        }
        Expr::Unary { operand, .. } => visit_expr_mut(operand, f),
        Expr::AspectReference(reference) => {
            visit_expr_mut(&mut reference.receiver, f);
            match &mut reference.access {
                ReferenceAccess::Invoke { arguments } => {
                    for argument in arguments {
                        visit_expr_mut(argument, f);
                    }
                }
                ReferenceAccess::Get => {}
                ReferenceAccess::Set { value } | ReferenceAccess::Add { value } | ReferenceAccess::Remove { value } => visit_expr_mut(value, f),
            }
        }
    }
}

/// Aspect references of a block in source order
pub fn aspect_references(block: &Block) -> Vec<&AspectReference> {
    let mut references = Vec::new();
    visit_expressions(block, &mut |expr| {
        if let Expr::AspectReference(reference) = expr {
            references.push(reference);
        }
    });
    references
}

/// Names of every local and catch variable declared anywhere in the block
pub fn declared_locals(block: &Block) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    visit_statements(block, &mut |statement| match statement {
        Statement::Local { name, .. } => {
            names.insert(name.clone());
        }
        Statement::Try { catches, .. } => {
            for catch in catches {
                if let Some(name) = &catch.name {
                    names.insert(name.clone());
                }
            }
        }
        _ => {}
    });
    names
}

/// Labels declared anywhere in the block
pub fn declared_labels(block: &Block) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    visit_statements(block, &mut |statement| {
        if let Statement::Labeled { label, .. } = statement {
            labels.insert(label.clone());
        }
    });
    labels
}

/// Number of `goto` statements targeting each label
pub fn goto_counts(block: &Block) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    visit_statements(block, &mut |statement| {
        if let Statement::Goto { label } = statement {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
    });
    counts
}

/// Rename locals (declarations and identifier uses) and labels
pub fn rename(block: &mut Block, locals: &HashMap<String, String>, labels: &HashMap<String, String>) {
    if locals.is_empty() && labels.is_empty() {
        return;
    }
    visit_statements_mut(block, &mut |statement| match statement {
        Statement::Local { name, .. } => {
            if let Some(renamed) = locals.get(name.as_str()) {
                *name = renamed.clone();
            }
        }
        Statement::Try { catches, .. } => {
            for catch in catches {
                if let Some(name) = &mut catch.name
                    && let Some(renamed) = locals.get(name.as_str())
                {
                    *name = renamed.clone();
                }
            }
        }
        Statement::Labeled { label, .. } | Statement::Goto { label } => {
            if let Some(renamed) = labels.get(label.as_str()) {
                *label = renamed.clone();
            }
        }
        _ => {}
    });
    visit_expressions_mut(block, &mut |expr| {
        if let Expr::Identifier { name } = expr
            && let Some(renamed) = locals.get(name.as_str())
        {
            *name = renamed.clone();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::{AspectReference, AssignmentOperator, CatchClause};

    fn sample() -> Block {
        Block::new(vec![
            Statement::local("result", Some("int".to_string()), Some(AspectReference::proceed("C.Foo()", vec![]).into_expr())),
            Statement::Try {
                body: Block::new(vec![Statement::expr(Expr::assign(Expr::ident("result"), AssignmentOperator::AddAssign, Expr::int(1)))]),
                catches: vec![CatchClause {
                    exception_type: Some("Exception".to_string()),
                    name: Some("e".to_string()),
                    body: Block::new(vec![Statement::goto("done")]),
                }],
                finally: None,
            },
            Statement::labeled("done", Statement::ret(Some(Expr::ident("result")))),
        ])
    }

    #[test]
    fn test_collects_locals_labels_and_gotos() {
        let block = sample();
        assert_eq!(declared_locals(&block).into_iter().collect::<Vec<_>>(), vec!["e".to_string(), "result".to_string()]);
        assert!(declared_labels(&block).contains("done"));
        assert_eq!(goto_counts(&block).get("done"), Some(&1));
        assert_eq!(aspect_references(&block).len(), 1);
    }

    #[test]
    fn test_rename_updates_declarations_and_uses() {
        let mut block = sample();
        let locals = HashMap::from([("result".to_string(), "result_1".to_string())]);
        let labels = HashMap::from([("done".to_string(), "done_1".to_string())]);
        rename(&mut block, &locals, &labels);

        assert!(declared_locals(&block).contains("result_1"));
        assert!(!declared_locals(&block).contains("result"));
        assert_eq!(goto_counts(&block).get("done_1"), Some(&1));
        let mut identifiers = Vec::new();
        visit_expressions(&block, &mut |expr| {
            if let Expr::Identifier { name } = expr {
                identifiers.push(name.clone());
            }
        });
        assert_eq!(identifiers, vec!["result_1".to_string(), "result_1".to_string()]);
    }
}
