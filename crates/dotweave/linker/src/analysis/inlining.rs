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

//! Inlining analysis
//!
//! A semantic is spliced into its caller when it has exactly one call site among the code that
//! will be emitted and that site has a shape the inliner can rewrite.

use super::references::ResolvedReference;
use super::semantic::IntermediateSymbolSemantic;
use super::reachability::last_override_of;
use crate::config::LinkerConfig;
use crate::error::LinkerResult;
use crate::injection::{IntroductionResult, MemberFlags};
use crate::symbols::{DeclId, DeclarationKind};
use crate::syntax::ast::{AspectReference, AspectReferenceId, AssignmentOperator, Block, Expr, ReferenceAccess, Statement};
use crate::syntax::walk;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Statement shape around an inlineable reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitePattern {
    /// `return R;`
    Return,
    /// `R;`
    Discard,
    /// `var x = R;` or `T x = R;`
    Local { name: String, ty: Option<String> },
    /// `x = R;`
    Assign { target: String },
}

/// The one place an inlined semantic is spliced into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InliningSite {
    /// Body of a final semantic, which only dispatches to the last override
    Final { holder: IntermediateSymbolSemantic },
    Reference {
        holder: IntermediateSymbolSemantic,
        id: AspectReferenceId,
        pattern: SitePattern,
    },
}

/// A use of a semantic found while counting
#[derive(Debug, Clone)]
enum Use {
    Site(InliningSite),
    /// A use the inliner cannot rewrite
    Opaque,
}

pub struct InliningAnalyzer<'a> {
    introduction: &'a IntroductionResult,
    resolutions: &'a BTreeMap<AspectReferenceId, ResolvedReference>,
    reachable: &'a BTreeSet<IntermediateSymbolSemantic>,
    excluded: &'a BTreeSet<DeclId>,
    config: &'a LinkerConfig,
}

impl<'a> InliningAnalyzer<'a> {
    pub fn new(
        introduction: &'a IntroductionResult,
        resolutions: &'a BTreeMap<AspectReferenceId, ResolvedReference>,
        reachable: &'a BTreeSet<IntermediateSymbolSemantic>,
        excluded: &'a BTreeSet<DeclId>,
        config: &'a LinkerConfig,
    ) -> Self {
        Self {
            introduction,
            resolutions,
            reachable,
            excluded,
            config,
        }
    }

    /// Inlined semantics and the site each one is spliced into
    #[instrument(skip_all)]
    pub fn analyze(&self) -> LinkerResult<BTreeMap<IntermediateSymbolSemantic, InliningSite>> {
        let mut inlined = BTreeMap::new();
        if !self.config.enable_inlining {
            return Ok(inlined);
        }

        for (semantic, uses) in self.collect_uses()? {
            if !self.is_candidate(semantic) {
                continue;
            }
            if let [Use::Site(site)] = uses.as_slice() {
                let holder = match site {
                    InliningSite::Final { holder } | InliningSite::Reference { holder, .. } => *holder,
                };
                if holder.symbol != semantic.symbol {
                    inlined.insert(semantic, site.clone());
                }
            }
        }
        debug!("{} semantics inlined", inlined.len());
        Ok(inlined)
    }

    /// Uses of every semantic from the code that will be emitted
    fn collect_uses(&self) -> LinkerResult<BTreeMap<IntermediateSymbolSemantic, Vec<Use>>> {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        let mut uses: BTreeMap<IntermediateSymbolSemantic, Vec<Use>> = BTreeMap::new();

        for &semantic in self.reachable {
            if graph.get(semantic.symbol).kind() != DeclarationKind::Method {
                continue;
            }
            if semantic.is_final() {
                let next = last_override_of(self.introduction, semantic.symbol)?;
                uses.entry(next).or_default().push(Use::Site(InliningSite::Final { holder: semantic }));
                continue;
            }
            if let Some(body) = graph.get(semantic.symbol).body() {
                self.collect_body(body, Some(semantic), &mut uses);
            }
        }

        for declaration in graph.iter() {
            let Some(body) = declaration.body() else {
                continue;
            };
            let member = graph.accessor_owner(declaration.id).unwrap_or(declaration.id);
            if registry.member_of(graph, member).is_some() || registry.is_override_target(member) || self.excluded.contains(&member) {
                continue;
            }
            self.collect_body(body, None, &mut uses);
        }
        for type_id in registry.initialized_types() {
            for initializer in registry.initializers(type_id) {
                self.collect_body(&initializer.body, None, &mut uses);
            }
        }
        Ok(uses)
    }

    fn collect_body(&self, body: &Block, holder: Option<IntermediateSymbolSemantic>, uses: &mut BTreeMap<IntermediateSymbolSemantic, Vec<Use>>) {
        for reference in walk::aspect_references(body) {
            let Some(id) = reference.id else {
                continue;
            };
            let Some(target) = self.resolutions.get(&id).and_then(ResolvedReference::semantic) else {
                continue;
            };
            let found = holder.and_then(|holder| {
                let pattern = self.site_pattern(body, reference, holder.symbol, target.symbol)?;
                Some(Use::Site(InliningSite::Reference { holder, id, pattern }))
            });
            uses.entry(target).or_default().push(found.unwrap_or(Use::Opaque));
        }
    }

    /// Whether a semantic may be spliced at all, whatever its uses
    fn is_candidate(&self, semantic: IntermediateSymbolSemantic) -> bool {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        if semantic.is_final() || graph.get(semantic.symbol).body().is_none() {
            return false;
        }
        let member = graph.accessor_owner(semantic.symbol).unwrap_or(semantic.symbol);
        let introduced = registry.member_of(graph, member);
        if introduced.is_some_and(|m| m.flags.contains(MemberFlags::NOT_INLINEABLE)) {
            return false;
        }
        // overrides, or the first link of an overridden member's chain
        introduced.is_some_and(|m| m.is_override()) || registry.is_override_target(member)
    }

    /// Shape of the statement holding `reference`, when the inliner can rewrite it
    fn site_pattern(&self, body: &Block, reference: &AspectReference, holder: DeclId, callee: DeclId) -> Option<SitePattern> {
        if !self.forwards_arguments(reference, holder, callee) {
            return None;
        }
        let is_site = |expr: &Expr| matches!(expr, Expr::AspectReference(r) if r.id == reference.id);
        let mut pattern = None;
        walk::visit_statements(body, &mut |statement| {
            let found = match statement {
                Statement::Return { value: Some(value) } if is_site(value) => Some(SitePattern::Return),
                Statement::Expression { expression } if is_site(expression) => Some(SitePattern::Discard),
                Statement::Local {
                    name,
                    ty,
                    initializer: Some(initializer),
                } if is_site(initializer) => Some(SitePattern::Local {
                    name: name.clone(),
                    ty: ty.clone(),
                }),
                Statement::Expression {
                    expression:
                        Expr::Assignment {
                            target,
                            operator: AssignmentOperator::Assign,
                            value,
                        },
                } if is_site(value) => match target.as_ref() {
                    Expr::Identifier { name } => Some(SitePattern::Assign { target: name.clone() }),
                    _ => None,
                },
                _ => None,
            };
            if found.is_some() {
                pattern = found;
            }
        });
        pattern
    }

    /// Arguments are the holder's own parameters, passed through in order
    fn forwards_arguments(&self, reference: &AspectReference, holder: DeclId, callee: DeclId) -> bool {
        let graph = &self.introduction.graph;
        let holder_parameters = graph.get(holder).parameters();
        let callee_parameters = graph.get(callee).parameters();
        let forwards = |arguments: &[&Expr]| {
            arguments.len() == callee_parameters.len()
                && arguments.iter().zip(callee_parameters).all(|(argument, parameter)| {
                    matches!(argument, Expr::Identifier { name } if *name == parameter.name)
                        && holder_parameters.iter().any(|p| p.name == parameter.name && p.ty == parameter.ty)
                })
        };
        match &reference.access {
            ReferenceAccess::Invoke { arguments } => forwards(&arguments.iter().collect::<Vec<_>>()),
            ReferenceAccess::Get => callee_parameters.is_empty(),
            ReferenceAccess::Set { value } | ReferenceAccess::Add { value } | ReferenceAccess::Remove { value } => forwards(&[value.as_ref()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{analyze, introduce, override_method};
    use crate::injection::{MemberTemplate, Transformation};
    use crate::ordering::AspectLayerId;
    use crate::symbols::{CompilationModel, MemberModel, Parameter, TypeModel};

    fn model() -> CompilationModel {
        CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs")
                .with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], Block::empty()).public()),
        ])
    }

    #[test]
    fn test_single_use_chain_is_inlined() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")]);
        let analysis = analyze(introduction, &LinkerConfig::default());
        assert_eq!(analysis.inlined_count(), 3);
    }

    #[test]
    fn test_double_use_is_not_inlined() {
        let layers = [AspectLayerId::new("A")];
        let body = Block::new(vec![
            Statement::expr(AspectReference::proceed("Service.Run(int)", vec![Expr::ident("x")]).into_expr()),
            Statement::ret(Some(AspectReference::proceed("Service.Run(int)", vec![Expr::ident("x")]).into_expr())),
        ]);
        let transformations = vec![Transformation::OverrideMember {
            layer: layers[0].clone(),
            target: "Service.Run(int)".to_string(),
            template: MemberTemplate::Method { body },
            flags: MemberFlags::NONE,
        }];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let graph = &analysis.introduction.graph;
        let original = IntermediateSymbolSemantic::original(graph.resolve("Service.Run(int)").unwrap());
        let layer = IntermediateSymbolSemantic::default_of(graph.resolve("Service.Run_A(int)").unwrap());
        assert!(!analysis.is_inlined(original));
        assert!(analysis.is_inlined(layer));
    }

    #[test]
    fn test_non_forwarding_arguments_block_inlining() {
        let layers = [AspectLayerId::new("A")];
        let body = Block::new(vec![Statement::ret(Some(AspectReference::proceed("Service.Run(int)", vec![Expr::int(4)]).into_expr()))]);
        let transformations = vec![Transformation::OverrideMember {
            layer: layers[0].clone(),
            target: "Service.Run(int)".to_string(),
            template: MemberTemplate::Method { body },
            flags: MemberFlags::NONE,
        }];
        let introduction = introduce(&model(), &layers, &transformations);
        let analysis = analyze(introduction, &LinkerConfig::default());
        let original = IntermediateSymbolSemantic::original(analysis.introduction.graph.resolve("Service.Run(int)").unwrap());
        assert!(analysis.is_reachable(original));
        assert!(!analysis.is_inlined(original));
    }

    #[test]
    fn test_disabled_inlining() {
        let layers = [AspectLayerId::new("A")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)")]);
        let analysis = analyze(introduction, &LinkerConfig::debug());
        assert_eq!(analysis.inlined_count(), 0);
    }
}
