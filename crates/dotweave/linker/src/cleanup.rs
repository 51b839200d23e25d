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

//! Cleanup of linked bodies
//!
//! Inlining leaves flattenable blocks, jumps to the very next statement, labels nothing jumps
//! to and bare returns closing a body. The cleanup rewrites each body until none of these remain.

use crate::config::LinkerConfig;
use crate::error::LinkerResult;
use crate::pipeline::{LinkerStage, PipelineContext};
use crate::syntax::ast::{Block, Statement};
use crate::syntax::{SyntaxUnit, walk};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Simplify one body. Running it again on its own output changes nothing.
pub fn clean_block(block: &mut Block) -> usize {
    let mut passes = 0;
    loop {
        let gotos = walk::goto_counts(block);
        let statements = std::mem::take(&mut block.statements);
        let (mut statements, mut changed) = clean_statements(statements, &gotos);
        // falling off the end of a body already returns
        if matches!(statements.last(), Some(Statement::Return { value: None })) {
            statements.pop();
            changed = true;
        }
        block.statements = statements;
        if !changed {
            return passes;
        }
        passes += 1;
    }
}

fn clean_statements(statements: Vec<Statement>, gotos: &BTreeMap<String, usize>) -> (Vec<Statement>, bool) {
    let mut output = Vec::with_capacity(statements.len());
    let mut changed = false;
    for statement in statements {
        match statement {
            Statement::Empty => changed = true,
            Statement::Block(block) if block.flattenable => {
                let (inner, _) = clean_statements(block.statements, gotos);
                output.extend(inner);
                changed = true;
            }
            Statement::Labeled { label, statement } if !gotos.get(&label).is_some_and(|&count| count > 0) => {
                output.push(*statement);
                changed = true;
            }
            other => {
                let (statement, nested) = clean_statement(other, gotos);
                changed |= nested;
                output.push(statement);
            }
        }
    }

    // a jump to the label right after it
    let mut index = 0;
    while index + 1 < output.len() {
        let redundant = matches!(
            (&output[index], &output[index + 1]),
            (Statement::Goto { label }, Statement::Labeled { label: next, .. }) if label == next
        );
        if redundant {
            output.remove(index);
            changed = true;
        } else {
            index += 1;
        }
    }
    (output, changed)
}

/// Clean the statement lists nested in a statement that stays in place
fn clean_statement(statement: Statement, gotos: &BTreeMap<String, usize>) -> (Statement, bool) {
    match statement {
        Statement::Block(mut block) => {
            let (statements, changed) = clean_statements(block.statements, gotos);
            block.statements = statements;
            (Statement::Block(block), changed)
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let (then_branch, mut changed) = clean_embedded(*then_branch, gotos);
            let else_branch = match else_branch {
                Some(else_branch) => {
                    let (else_branch, nested) = clean_embedded(*else_branch, gotos);
                    changed |= nested;
                    Some(Box::new(else_branch))
                }
                None => None,
            };
            (
                Statement::If {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch,
                },
                changed,
            )
        }
        Statement::While { condition, body } => {
            let (body, changed) = clean_embedded(*body, gotos);
            (Statement::While { condition, body: Box::new(body) }, changed)
        }
        Statement::Try { body, catches, finally } => {
            let (body, mut changed) = clean_nested_block(body, gotos);
            let mut cleaned = Vec::with_capacity(catches.len());
            for mut catch in catches {
                let (body, nested) = clean_nested_block(catch.body, gotos);
                changed |= nested;
                catch.body = body;
                cleaned.push(catch);
            }
            let finally = match finally {
                Some(block) => {
                    let (block, nested) = clean_nested_block(block, gotos);
                    changed |= nested;
                    Some(block)
                }
                None => None,
            };
            (
                Statement::Try {
                    body,
                    catches: cleaned,
                    finally,
                },
                changed,
            )
        }
        Statement::Labeled { label, statement } => {
            let (statement, changed) = clean_embedded(*statement, gotos);
            (
                Statement::Labeled {
                    label,
                    statement: Box::new(statement),
                },
                changed,
            )
        }
        other => (other, false),
    }
}

fn clean_nested_block(mut block: Block, gotos: &BTreeMap<String, usize>) -> (Block, bool) {
    let (statements, changed) = clean_statements(block.statements, gotos);
    block.statements = statements;
    (block, changed)
}

/// An embedded statement cannot be spliced into a list: a flattenable block there keeps its braces
fn clean_embedded(statement: Statement, gotos: &BTreeMap<String, usize>) -> (Statement, bool) {
    match statement {
        Statement::Block(block) if block.flattenable => {
            let (mut block, _) = clean_nested_block(block, gotos);
            block.flattenable = false;
            match block.statements.as_slice() {
                [single] if !matches!(single, Statement::Local { .. } | Statement::Labeled { .. }) => {
                    let single = block.statements.remove(0);
                    (single, true)
                }
                _ => (Statement::Block(block), true),
            }
        }
        Statement::Labeled { label, statement } if !gotos.get(&label).is_some_and(|&count| count > 0) => {
            let (statement, _) = clean_embedded(*statement, gotos);
            (statement, true)
        }
        other => clean_statement(other, gotos),
    }
}

/// Final stage: simplifies every body of every unit
pub struct CleanupStep;

impl LinkerStage for CleanupStep {
    type Input = Vec<SyntaxUnit>;
    type Output = Vec<SyntaxUnit>;

    #[instrument(skip_all, name = "cleanup")]
    fn execute(&mut self, mut units: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let mut bodies = 0;
        let mut rewritten = 0;
        for unit in &mut units {
            for body in unit.bodies_mut() {
                bodies += 1;
                if clean_block(body) > 0 {
                    rewritten += 1;
                }
            }
        }
        debug!("Cleaned {} of {} bodies", rewritten, bodies);
        context.metrics.record_processed_items(self.name(), bodies);
        Ok(units)
    }

    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn can_skip(&self, config: &LinkerConfig) -> bool {
        !config.run_cleanup
    }
}
