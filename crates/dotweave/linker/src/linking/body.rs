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

//! Linking of member bodies
//!
//! Aspect references become ordinary member accesses on the emitted member that holds the
//! referenced semantic, and single-use semantics are spliced into the statement calling them.

use super::inliner::{self, InliningScope};
use crate::analysis::{AnalysisRegistry, InliningSite, IntermediateSymbolSemantic, ResolvedTarget, SemanticKind, SitePattern, last_override_of};
use crate::error::{LinkerError, LinkerResult};
use crate::symbols::{DeclId, MethodRole};
use crate::syntax::ast::{AspectReference, AssignmentOperator, Block, Expr, Literal, ReferenceAccess, Statement};
use tracing::trace;

/// Code being linked: the semantic whose body it is, when it has one
#[derive(Debug, Clone, Copy)]
pub struct BodyOwner {
    pub semantic: Option<IntermediateSymbolSemantic>,
    /// Declaration whose return type governs `return` statements
    pub declaration: DeclId,
}

impl BodyOwner {
    pub fn semantic(semantic: IntermediateSymbolSemantic) -> Self {
        Self {
            semantic: Some(semantic),
            declaration: semantic.symbol,
        }
    }

    /// Constructor, finalizer or initializer code
    pub fn plain(declaration: DeclId) -> Self {
        Self { semantic: None, declaration }
    }
}

pub struct BodyLinker<'a> {
    analysis: &'a AnalysisRegistry,
    /// Semantics being spliced, outermost first
    inlining: Vec<IntermediateSymbolSemantic>,
}

impl<'a> BodyLinker<'a> {
    pub fn new(analysis: &'a AnalysisRegistry) -> Self {
        Self { analysis, inlining: Vec::new() }
    }

    /// Name of the emitted member holding a semantic
    pub fn emitted_name(&self, semantic: IntermediateSymbolSemantic) -> LinkerResult<String> {
        let introduction = &self.analysis.introduction;
        let graph = &introduction.graph;
        let member = graph.accessor_owner(semantic.symbol).unwrap_or(semantic.symbol);
        let registry = &introduction.registry;
        let is_override = registry.member_of(graph, member).is_some_and(|introduced| introduced.is_override());
        if semantic.kind == SemanticKind::Final || is_override || !registry.is_override_target(member) {
            return Ok(graph.get(member).name.clone());
        }
        // first link of a chain, emitted beside the final member
        introduction
            .source_names
            .get(&member)
            .cloned()
            .ok_or_else(|| LinkerError::assertion_failed("override targets have a source member name", graph.get(member).key.to_string()))
    }

    /// Link the body of a semantic, or of a constructor, finalizer or initializer
    pub fn link(&mut self, owner: BodyOwner, body: &Block, scope: &mut InliningScope) -> LinkerResult<Block> {
        let statements = self.link_statements(owner, body.statements.clone(), scope)?;
        Ok(Block {
            statements,
            flattenable: body.flattenable,
        })
    }

    /// Body of the final semantic of an overridden method or accessor
    pub fn final_body(&mut self, symbol: DeclId, scope: &mut InliningScope) -> LinkerResult<Block> {
        let final_semantic = IntermediateSymbolSemantic::final_of(symbol);
        let last = last_override_of(&self.analysis.introduction, symbol)?;
        if let Some(InliningSite::Final { holder }) = self.analysis.inlining_site(last)
            && *holder == final_semantic
        {
            let statements = self.inline(last, &SitePattern::Return, scope)?;
            return Ok(Block::new(statements));
        }

        let graph = &self.analysis.introduction.graph;
        let declaration = graph.get(symbol);
        let receiver = self.receiver_of(symbol)?;
        let name = self.emitted_name(last)?;
        let parameters = || declaration.parameters().iter().map(|p| Expr::ident(p.name.clone())).collect::<Vec<_>>();
        let value = || Box::new(Expr::ident("value"));
        let access = match declaration.method_role() {
            Some(MethodRole::PropertyGet) => ReferenceAccess::Get,
            Some(MethodRole::PropertySet) => ReferenceAccess::Set { value: value() },
            Some(MethodRole::EventAdd) => ReferenceAccess::Add { value: value() },
            Some(MethodRole::EventRemove) => ReferenceAccess::Remove { value: value() },
            Some(MethodRole::Ordinary) | None => ReferenceAccess::Invoke { arguments: parameters() },
        };
        let forward = member_access(receiver, name, access);
        let statement = if declaration.returns_void() {
            Statement::expr(forward)
        } else {
            Statement::ret(Some(forward))
        };
        Ok(Block::new(vec![statement]))
    }

    /// `this`, or the declaring type for static members
    fn receiver_of(&self, symbol: DeclId) -> LinkerResult<Expr> {
        let graph = &self.analysis.introduction.graph;
        let declaration = graph.get(symbol);
        if !declaration.is_static {
            return Ok(Expr::This);
        }
        let type_id = graph
            .declaring_type(symbol)
            .ok_or_else(|| LinkerError::assertion_failed("member has a declaring type", declaration.key.to_string()))?;
        Ok(Expr::type_name(graph.get(type_id).name.clone()))
    }

    /// Callee body spliced at a site
    fn inline(&mut self, callee: IntermediateSymbolSemantic, pattern: &SitePattern, scope: &mut InliningScope) -> LinkerResult<Vec<Statement>> {
        if self.inlining.contains(&callee) {
            return Err(LinkerError::assertion_failed("inlining never revisits a semantic", format!("{} is already being inlined", callee)));
        }
        let analysis = self.analysis;
        let declaration = analysis.introduction.graph.get(callee.symbol);
        let body = declaration
            .body()
            .cloned()
            .ok_or_else(|| LinkerError::assertion_failed("inlined semantics have a body", declaration.key.to_string()))?;
        let return_type = declaration.value_type().unwrap_or("void").to_string();
        trace!("Inlining {}", callee);

        let body = inliner::prepare_callee(body, declaration.parameters(), scope);
        self.inlining.push(callee);
        let linked = self.link(BodyOwner::semantic(callee), &body, scope);
        self.inlining.pop();
        Ok(inliner::splice(linked?, pattern, &return_type, scope))
    }

    fn link_statements(&mut self, owner: BodyOwner, statements: Vec<Statement>, scope: &mut InliningScope) -> LinkerResult<Vec<Statement>> {
        let mut linked = Vec::with_capacity(statements.len());
        for statement in statements {
            linked.extend(self.link_statement(owner, statement, scope)?);
        }
        Ok(linked)
    }

    /// A statement in a position holding exactly one statement
    fn link_embedded(&mut self, owner: BodyOwner, statement: Statement, scope: &mut InliningScope) -> LinkerResult<Statement> {
        let mut statements = self.link_statement(owner, statement, scope)?;
        Ok(match statements.len() {
            0 => Statement::Empty,
            1 => statements.remove(0),
            _ => Statement::Block(Block::flattenable(statements)),
        })
    }

    fn link_statement(&mut self, owner: BodyOwner, statement: Statement, scope: &mut InliningScope) -> LinkerResult<Vec<Statement>> {
        if let Some(site) = self.site_of(owner, &statement) {
            let (callee, pattern) = site;
            return self.inline(callee, &pattern, scope);
        }

        let statement = match statement {
            Statement::Block(block) => Statement::Block(Block {
                statements: self.link_statements(owner, block.statements, scope)?,
                flattenable: block.flattenable,
            }),
            Statement::Expression { expression } => {
                if let Expr::AspectReference(reference) = &expression
                    && self.evaluates_to_nothing(reference)
                {
                    return Ok(Vec::new());
                }
                Statement::expr(self.link_expr(expression)?)
            }
            Statement::Local { name, ty, initializer } => Statement::Local {
                name,
                ty,
                initializer: initializer.map(|e| self.link_expr(e)).transpose()?,
            },
            Statement::Return { value: Some(Expr::AspectReference(reference)) }
                if self.evaluates_to_nothing(&reference) && self.analysis.introduction.graph.get(owner.declaration).returns_void() =>
            {
                Statement::ret(None)
            }
            Statement::Return { value } => Statement::ret(value.map(|e| self.link_expr(e)).transpose()?),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => Statement::If {
                condition: self.link_expr(condition)?,
                then_branch: Box::new(self.link_embedded(owner, *then_branch, scope)?),
                else_branch: match else_branch {
                    Some(e) => Some(Box::new(self.link_embedded(owner, *e, scope)?)),
                    None => None,
                },
            },
            Statement::While { condition, body } => Statement::While {
                condition: self.link_expr(condition)?,
                body: Box::new(self.link_embedded(owner, *body, scope)?),
            },
            Statement::Try { body, catches, finally } => {
                let body = self.link(owner, &body, scope)?;
                let mut linked_catches = Vec::with_capacity(catches.len());
                for mut catch in catches {
                    catch.body = self.link(owner, &catch.body, scope)?;
                    linked_catches.push(catch);
                }
                let finally = match finally {
                    Some(block) => Some(self.link(owner, &block, scope)?),
                    None => None,
                };
                Statement::Try {
                    body,
                    catches: linked_catches,
                    finally,
                }
            }
            Statement::Throw { value } => Statement::Throw {
                value: value.map(|e| self.link_expr(e)).transpose()?,
            },
            Statement::Labeled { label, statement } => Statement::Labeled {
                label,
                statement: Box::new(self.link_embedded(owner, *statement, scope)?),
            },
            other @ (Statement::Goto { .. } | Statement::Empty) => other,
        };
        Ok(vec![statement])
    }

    /// The semantic inlined at this statement, if the statement is its site
    fn site_of(&self, owner: BodyOwner, statement: &Statement) -> Option<(IntermediateSymbolSemantic, SitePattern)> {
        let holder = owner.semantic?;
        let reference = match statement {
            Statement::Return { value: Some(Expr::AspectReference(reference)) } => reference,
            Statement::Expression {
                expression: Expr::AspectReference(reference),
            } => reference,
            Statement::Local {
                initializer: Some(Expr::AspectReference(reference)),
                ..
            } => reference,
            Statement::Expression {
                expression:
                    Expr::Assignment {
                        operator: AssignmentOperator::Assign,
                        value,
                        ..
                    },
            } => value.as_aspect_reference()?,
            _ => return None,
        };
        let id = reference.id?;
        let callee = self.analysis.resolution(id)?.semantic()?;
        match self.analysis.inlining_site(callee)? {
            InliningSite::Reference { holder: site_holder, id: site_id, pattern } if *site_holder == holder && *site_id == id => Some((callee, pattern.clone())),
            _ => None,
        }
    }

    /// Invalid references and references to an empty base behave as nothing
    fn evaluates_to_nothing(&self, reference: &AspectReference) -> bool {
        match reference.id.and_then(|id| self.analysis.resolution(id)) {
            Some(resolved) => resolved.target == ResolvedTarget::Empty,
            None => true,
        }
    }

    fn link_expr(&self, expr: Expr) -> LinkerResult<Expr> {
        let boxed = |expr: Box<Expr>| -> LinkerResult<Box<Expr>> { Ok(Box::new(self.link_expr(*expr)?)) };
        Ok(match expr {
            Expr::AspectReference(reference) => self.link_reference(reference)?,
            Expr::MemberAccess { target, member } => Expr::MemberAccess { target: boxed(target)?, member },
            Expr::Invocation { target, arguments } => Expr::Invocation {
                target: boxed(target)?,
                arguments: arguments.into_iter().map(|a| self.link_expr(a)).collect::<LinkerResult<_>>()?,
            },
            Expr::Assignment { target, operator, value } => Expr::Assignment {
                target: boxed(target)?,
                operator,
                value: boxed(value)?,
            },
            Expr::Binary { left, operator, right } => Expr::Binary {
                left: boxed(left)?,
                operator,
                right: boxed(right)?,
            },
            Expr::Unary { operator, operand } => Expr::Unary {
                operator,
                operand: boxed(operand)?,
            },
            leaf @ (Expr::Literal { .. } | Expr::Identifier { .. } | Expr::This | Expr::Base | Expr::TypeName { .. }) => leaf,
        })
    }

    fn link_reference(&self, reference: AspectReference) -> LinkerResult<Expr> {
        let Some(resolved) = reference.id.and_then(|id| self.analysis.resolution(id)) else {
            return Ok(Expr::literal(Literal::Default));
        };
        let access = match reference.access {
            ReferenceAccess::Invoke { arguments } => ReferenceAccess::Invoke {
                arguments: arguments.into_iter().map(|a| self.link_expr(a)).collect::<LinkerResult<_>>()?,
            },
            ReferenceAccess::Get => ReferenceAccess::Get,
            ReferenceAccess::Set { value } => ReferenceAccess::Set {
                value: Box::new(self.link_expr(*value)?),
            },
            ReferenceAccess::Add { value } => ReferenceAccess::Add {
                value: Box::new(self.link_expr(*value)?),
            },
            ReferenceAccess::Remove { value } => ReferenceAccess::Remove {
                value: Box::new(self.link_expr(*value)?),
            },
        };

        let graph = &self.analysis.introduction.graph;
        match resolved.target {
            ResolvedTarget::Semantic(semantic) => Ok(member_access(*reference.receiver, self.emitted_name(semantic)?, access)),
            ResolvedTarget::BaseMember => {
                let member = graph.accessor_owner(resolved.declaration).unwrap_or(resolved.declaration);
                Ok(member_access(Expr::Base, graph.get(member).name.clone(), access))
            }
            ResolvedTarget::Empty => Ok(Expr::literal(Literal::Default)),
        }
    }
}

/// `receiver.name(args)`, `receiver.name`, `receiver.name = value`, `+=` or `-=`
fn member_access(receiver: Expr, name: String, access: ReferenceAccess) -> Expr {
    let member = Expr::member(receiver, name);
    match access {
        ReferenceAccess::Invoke { arguments } => Expr::call(member, arguments),
        ReferenceAccess::Get => member,
        ReferenceAccess::Set { value } => Expr::assign(member, AssignmentOperator::Assign, *value),
        ReferenceAccess::Add { value } => Expr::assign(member, AssignmentOperator::AddAssign, *value),
        ReferenceAccess::Remove { value } => Expr::assign(member, AssignmentOperator::SubtractAssign, *value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{analyze, introduce, override_method};
    use crate::config::LinkerConfig;
    use crate::injection::{MemberFlags, MemberTemplate, Transformation};
    use crate::ordering::AspectLayerId;
    use crate::symbols::{CompilationModel, MemberModel, Parameter, TypeModel};
    use crate::syntax::print_block;

    fn model() -> CompilationModel {
        let body = Block::new(vec![Statement::ret(Some(Expr::binary(Expr::ident("x"), crate::syntax::BinaryOperator::Multiply, Expr::int(2))))]);
        CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs").with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], body).public()),
        ])
    }

    #[test]
    fn test_final_body_inlines_whole_chain() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")]);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let run = analysis.introduction.graph.resolve("Service.Run(int)").unwrap();

        let mut scope = InliningScope::new(&[Parameter::new("x", "int")], None);
        let body = BodyLinker::new(&analysis).final_body(run, &mut scope).unwrap();
        let text = print_block(&body);
        assert!(text.contains("return x * 2;"));
        assert!(!text.contains("Run_"));
    }

    #[test]
    fn test_final_body_forwards_without_inlining() {
        let layers = [AspectLayerId::new("A")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)")]);
        let analysis = analyze(introduction, &LinkerConfig::debug());
        let graph = &analysis.introduction.graph;
        let run = graph.resolve("Service.Run(int)").unwrap();
        let layer = graph.resolve("Service.Run_A(int)").unwrap();

        let mut linker = BodyLinker::new(&analysis);
        let mut scope = InliningScope::default();
        assert_eq!(print_block(&linker.final_body(run, &mut scope).unwrap()), "{\n    return this.Run_A(x);\n}\n");

        let layer_body = graph.get(layer).body().unwrap().clone();
        let linked = linker
            .link(BodyOwner::semantic(IntermediateSymbolSemantic::default_of(layer)), &layer_body, &mut scope)
            .unwrap();
        assert_eq!(print_block(&linked), "{\n    return this.Run_Source(x);\n}\n");
    }

    #[test]
    fn test_empty_base_is_dropped() {
        let layers = [AspectLayerId::new("Intro")];
        let body = Block::new(vec![
            Statement::expr(AspectReference::proceed("Service.Audit()", vec![]).into_expr()),
            Statement::ret(Some(AspectReference::proceed("Service.Audit()", vec![]).into_expr())),
        ]);
        let transformations = vec![Transformation::IntroduceMember {
            layer: layers[0].clone(),
            container: "Service".to_string(),
            member: MemberModel::method("Audit", "void", vec![], body).public(),
            flags: MemberFlags::NONE,
        }];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let audit = analysis.introduction.graph.resolve("Service.Audit()").unwrap();

        let body = analysis.introduction.graph.get(audit).body().unwrap().clone();
        let linked = BodyLinker::new(&analysis)
            .link(BodyOwner::semantic(IntermediateSymbolSemantic::default_of(audit)), &body, &mut InliningScope::default())
            .unwrap();
        assert_eq!(linked.statements, vec![Statement::ret(None)]);
    }

    #[test]
    fn test_discard_site_inlines_with_goto() {
        let layers = [AspectLayerId::new("A")];
        let source = Block::new(vec![
            Statement::If {
                condition: Expr::ident("flag"),
                then_branch: Box::new(Statement::ret(None)),
                else_branch: None,
            },
            Statement::expr(Expr::call(Expr::ident("Work"), vec![])),
        ]);
        let model = CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs").with_member(MemberModel::method("Stop", "void", vec![Parameter::new("flag", "bool")], source).public()),
        ]);
        let template = Block::new(vec![
            Statement::expr(AspectReference::proceed("Service.Stop(bool)", vec![Expr::ident("flag")]).into_expr()),
            Statement::expr(Expr::call(Expr::ident("Log"), vec![])),
        ]);
        let transformations = vec![Transformation::OverrideMember {
            layer: layers[0].clone(),
            target: "Service.Stop(bool)".to_string(),
            template: MemberTemplate::Method { body: template },
            flags: MemberFlags::NONE,
        }];
        let introduction = introduce(&model, &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let stop = analysis.introduction.graph.resolve("Service.Stop(bool)").unwrap();

        let mut scope = InliningScope::new(&[Parameter::new("flag", "bool")], None);
        let text = print_block(&BodyLinker::new(&analysis).final_body(stop, &mut scope).unwrap());
        assert!(text.contains("goto __aspect_return_0;"));
        assert!(text.contains("Work();"));
        assert!(text.contains("Log();"));
        assert!(!text.contains("Stop_"));
    }
}
