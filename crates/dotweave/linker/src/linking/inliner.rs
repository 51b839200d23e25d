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

//! Splicing a callee body into the statement that calls it
//!
//! The callee's locals and labels are renamed away from every name already used by the member
//! being emitted, then its `return` statements are rewritten for the shape of the call site.

use crate::analysis::SitePattern;
use crate::symbols::Parameter;
use crate::syntax::ast::{AssignmentOperator, Block, Expr, Statement};
use crate::syntax::walk;
use std::collections::{BTreeSet, HashMap};

const RETURN_LABEL: &str = "__aspect_return";

/// Names used so far in the body of one emitted member
#[derive(Debug, Clone, Default)]
pub struct InliningScope {
    locals: BTreeSet<String>,
    labels: BTreeSet<String>,
    next_label: usize,
}

impl InliningScope {
    /// Scope of a member with `parameters` and `body`, before anything is inlined into it
    pub fn new(parameters: &[Parameter], body: Option<&Block>) -> Self {
        let mut scope = Self::default();
        scope.locals.extend(parameters.iter().map(|p| p.name.clone()));
        if let Some(body) = body {
            scope.locals.extend(walk::declared_locals(body));
            scope.labels.extend(walk::declared_labels(body));
        }
        scope
    }

    /// Take `name`, or the first free `name_N`
    fn claim_local(&mut self, name: &str) -> String {
        let fresh = first_free(&self.locals, name);
        self.locals.insert(fresh.clone());
        fresh
    }

    fn claim_label(&mut self, name: &str) -> String {
        let fresh = first_free(&self.labels, name);
        self.labels.insert(fresh.clone());
        fresh
    }

    fn fresh_return_label(&mut self) -> String {
        loop {
            let candidate = format!("{}_{}", RETURN_LABEL, self.next_label);
            self.next_label += 1;
            if self.labels.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn first_free(taken: &BTreeSet<String>, name: &str) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    (1..)
        .map(|suffix| format!("{}_{}", name, suffix))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Rename the callee's locals and labels that clash with the scope, and claim all of them.
/// Parameters are shared with the caller, which forwards them unchanged.
pub fn prepare_callee(mut body: Block, parameters: &[Parameter], scope: &mut InliningScope) -> Block {
    let mut locals = HashMap::new();
    for name in walk::declared_locals(&body) {
        if parameters.iter().any(|p| p.name == name) {
            continue;
        }
        let claimed = scope.claim_local(&name);
        if claimed != name {
            locals.insert(name, claimed);
        }
    }
    let mut labels = HashMap::new();
    for label in walk::declared_labels(&body) {
        let claimed = scope.claim_label(&label);
        if claimed != label {
            labels.insert(label, claimed);
        }
    }
    walk::rename(&mut body, &locals, &labels);
    body
}

/// Statements replacing the call site
pub fn splice(body: Block, pattern: &SitePattern, return_type: &str, scope: &mut InliningScope) -> Vec<Statement> {
    let returns_void = return_type == "void";
    if let SitePattern::Return = pattern {
        let mut statements = body.statements;
        if returns_void && !ends_in_jump(&statements) {
            statements.push(Statement::ret(None));
        }
        return vec![Statement::Block(Block::flattenable(statements))];
    }

    let label = scope.fresh_return_label();
    let mut output = Vec::new();
    let target = match pattern {
        SitePattern::Local { name, ty } => {
            let ty = ty.clone().unwrap_or_else(|| return_type.to_string());
            output.push(Statement::local(name.clone(), Some(ty), None));
            Some(Expr::ident(name.clone()))
        }
        SitePattern::Assign { target } => Some(Expr::ident(target.clone())),
        SitePattern::Discard if !returns_void => Some(Expr::ident("_")),
        SitePattern::Discard | SitePattern::Return => None,
    };

    let mut block = body;
    rewrite_returns(&mut block.statements, target.as_ref(), &label);
    if let Some(Statement::Goto { label: last }) = block.statements.last()
        && *last == label
    {
        block.statements.pop();
    }
    let jumps = walk::goto_counts(&block).get(&label).copied().unwrap_or(0);

    block.flattenable = true;
    output.push(Statement::Block(block));
    if jumps > 0 {
        output.push(Statement::labeled(label, Statement::Empty));
    }
    output
}

fn ends_in_jump(statements: &[Statement]) -> bool {
    matches!(statements.last(), Some(Statement::Return { .. } | Statement::Throw { .. } | Statement::Goto { .. }))
}

/// `return e;` becomes `target = e; goto label;`, or `goto label;` without a target
fn rewrite_returns(statements: &mut Vec<Statement>, target: Option<&Expr>, label: &str) {
    let mut rewritten = Vec::with_capacity(statements.len());
    for statement in statements.drain(..) {
        match statement {
            Statement::Return { value } => {
                let jump = Statement::goto(label);
                match (value, target) {
                    (Some(value), Some(target)) => rewritten.push(Statement::expr(Expr::assign(target.clone(), AssignmentOperator::Assign, value))),
                    (Some(value), None) => rewritten.push(Statement::expr(value)),
                    (None, _) => {}
                }
                rewritten.push(jump);
            }
            other => rewritten.push(rewrite_nested_returns(other, target, label)),
        }
    }
    *statements = rewritten;
}

fn rewrite_nested_returns(statement: Statement, target: Option<&Expr>, label: &str) -> Statement {
    let embedded = |statement: Statement| {
        let mut statements = vec![statement];
        rewrite_returns(&mut statements, target, label);
        match statements.pop() {
            Some(single) if statements.is_empty() => single,
            Some(last) => {
                statements.push(last);
                Statement::Block(Block::flattenable(statements))
            }
            None => Statement::Empty,
        }
    };
    match statement {
        Statement::Block(mut block) => {
            rewrite_returns(&mut block.statements, target, label);
            Statement::Block(block)
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => Statement::If {
            condition,
            then_branch: Box::new(embedded(*then_branch)),
            else_branch: else_branch.map(|e| Box::new(embedded(*e))),
        },
        Statement::While { condition, body } => Statement::While {
            condition,
            body: Box::new(embedded(*body)),
        },
        Statement::Try {
            mut body,
            mut catches,
            finally,
        } => {
            rewrite_returns(&mut body.statements, target, label);
            for catch in &mut catches {
                rewrite_returns(&mut catch.body.statements, target, label);
            }
            Statement::Try { body, catches, finally }
        }
        Statement::Labeled { label: own, statement } => Statement::Labeled {
            label: own,
            statement: Box::new(embedded(*statement)),
        },
        other => other,
    }
}
