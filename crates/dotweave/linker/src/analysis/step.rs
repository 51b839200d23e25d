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

//! Analysis step
//!
//! Resolves every aspect reference, checks that colliding layers are ordered, then computes the
//! reachable and inlined semantics the linking step works from.

use super::inlining::{InliningAnalyzer, InliningSite};
use super::reachability::ReachabilityAnalyzer;
use super::references::{AspectReferenceResolver, ReferenceContext, ReferenceResolution, ResolvedReference};
use super::semantic::{IntermediateSymbolSemantic, SemanticKind};
use crate::config::LinkerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
use crate::error::{LinkerError, LinkerResult};
use crate::injection::IntroductionResult;
use crate::pipeline::{LinkerStage, PipelineContext};
use crate::symbols::{DeclId, DeclarationKind};
use crate::syntax::ast::{AspectReferenceId, Block};
use crate::syntax::walk;
use metrics::counter;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

/// Read-only result of the analysis, queried by the linking step
#[derive(Debug)]
pub struct AnalysisRegistry {
    pub introduction: IntroductionResult,
    resolutions: BTreeMap<AspectReferenceId, ResolvedReference>,
    reachable: BTreeSet<IntermediateSymbolSemantic>,
    inlined: BTreeMap<IntermediateSymbolSemantic, InliningSite>,
    /// Member-level declarations left out of the output
    excluded: BTreeSet<DeclId>,
}

impl AnalysisRegistry {
    pub fn is_reachable(&self, semantic: IntermediateSymbolSemantic) -> bool {
        self.reachable.contains(&semantic)
    }

    pub fn is_inlined(&self, semantic: IntermediateSymbolSemantic) -> bool {
        self.inlined.contains_key(&semantic)
    }

    /// Where an inlined semantic is spliced
    pub fn inlining_site(&self, semantic: IntermediateSymbolSemantic) -> Option<&InliningSite> {
        self.inlined.get(&semantic)
    }

    pub fn inlined_count(&self) -> usize {
        self.inlined.len()
    }

    pub fn reachable(&self) -> impl Iterator<Item = IntermediateSymbolSemantic> + '_ {
        self.reachable.iter().copied()
    }

    /// Resolution of a valid reference; `None` for references reported as invalid
    pub fn resolution(&self, id: AspectReferenceId) -> Option<&ResolvedReference> {
        self.resolutions.get(&id)
    }

    /// Whether a declaration is removed from the output, either itself or as an override of a
    /// removed declaration
    pub fn is_excluded(&self, declaration: DeclId) -> bool {
        let graph = &self.introduction.graph;
        let member = graph.accessor_owner(declaration).unwrap_or(declaration);
        if self.excluded.contains(&member) {
            return true;
        }
        self.introduction
            .registry
            .member_of(graph, member)
            .and_then(|introduced| introduced.target)
            .is_some_and(|target| self.excluded.contains(&target))
    }

    pub fn excluded(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.excluded.iter().copied()
    }

    /// Whether the `kind` semantic of a member-level declaration is emitted as a member of its
    /// own: some method or accessor semantic of it is reachable and not inlined
    pub fn needs_emission(&self, member: DeclId, kind: SemanticKind) -> bool {
        let graph = &self.introduction.graph;
        let declaration = graph.get(member);
        let symbols = match declaration.kind() {
            DeclarationKind::Property | DeclarationKind::Event => declaration.accessors(),
            _ => vec![member],
        };
        symbols.into_iter().any(|symbol| {
            let semantic = IntermediateSymbolSemantic::new(symbol, kind);
            self.is_reachable(semantic) && !self.is_inlined(semantic)
        })
    }
}

/// Runs reference resolution, the ordering check, reachability and inlining analysis
pub struct AnalysisStep;

impl LinkerStage for AnalysisStep {
    type Input = IntroductionResult;
    type Output = AnalysisRegistry;

    fn execute(&mut self, introduction: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let mut excluded = BTreeSet::new();
        check_layer_collisions(&introduction, &context.config, &mut context.diagnostics, &mut excluded);
        let resolutions = resolve_references(&introduction, &mut context.diagnostics, &mut excluded)?;

        let reachable = ReachabilityAnalyzer::new(&introduction, &resolutions, &excluded, context.config.max_reachability_depth).analyze_reachability()?;
        let inlined = InliningAnalyzer::new(&introduction, &resolutions, &reachable, &excluded, &context.config).analyze()?;

        counter!("dotweave_reachable_semantics", reachable.len() as u64);
        counter!("dotweave_inlined_semantics", inlined.len() as u64);
        context.metrics.record_processed_items(self.name(), resolutions.len());
        info!(
            "Analysis: {} references, {} reachable semantics, {} inlined, {} excluded declarations",
            resolutions.len(),
            reachable.len(),
            inlined.len(),
            excluded.len()
        );

        Ok(AnalysisRegistry {
            introduction,
            resolutions,
            reachable,
            inlined,
            excluded,
        })
    }

    fn name(&self) -> &'static str {
        "analysis"
    }
}

/// Report override chains mixing layers the constraints leave unordered
#[instrument(skip_all)]
fn check_layer_collisions(introduction: &IntroductionResult, config: &LinkerConfig, diagnostics: &mut DiagnosticBag, excluded: &mut BTreeSet<DeclId>) {
    let graph = &introduction.graph;
    let registry = &introduction.registry;
    for target in registry.get_overridden_members() {
        let chain = registry.get_overrides(target);
        let mut unordered = Vec::new();
        for (i, first) in chain.iter().enumerate() {
            for second in &chain[i + 1..] {
                if !introduction.order.is_comparable(&first.layer, &second.layer) {
                    unordered.push(format!("`{}` and `{}`", first.layer, second.layer));
                }
            }
        }
        if unordered.is_empty() {
            continue;
        }

        let key = graph.get(target).key.to_string();
        let message = format!("layers {} override `{}` but no constraint orders them", unordered.join(", "), key);
        if config.strict_layer_ordering {
            diagnostics.push(Diagnostic::error(DiagnosticCode::UnorderedLayers, message, Some(key)));
            excluded.insert(target);
        } else {
            warn!("{}; applying them in registration order", message);
            diagnostics.push(Diagnostic::warning(DiagnosticCode::UnorderedLayers, message, Some(key)));
        }
    }
}

/// Resolve the references of every body and initializer. Invalid references are reported and
/// exclude the declaration whose code holds them.
#[instrument(skip_all)]
fn resolve_references(
    introduction: &IntroductionResult,
    diagnostics: &mut DiagnosticBag,
    excluded: &mut BTreeSet<DeclId>,
) -> LinkerResult<BTreeMap<AspectReferenceId, ResolvedReference>> {
    let resolver = AspectReferenceResolver::new(introduction);
    let mut resolutions = BTreeMap::new();

    for declaration in introduction.graph.iter() {
        let Some(body) = declaration.body() else {
            continue;
        };
        let context = resolver.body_context(declaration.id)?;
        resolve_body(&resolver, &context, body, diagnostics, excluded, &mut resolutions)?;
    }
    for type_id in introduction.registry.initialized_types() {
        for initializer in introduction.registry.initializers(type_id) {
            let context = resolver.initializer_context(type_id, initializer.layer_order);
            resolve_body(&resolver, &context, &initializer.body, diagnostics, excluded, &mut resolutions)?;
        }
    }
    debug!("Resolved {} aspect references", resolutions.len());
    Ok(resolutions)
}

fn resolve_body(
    resolver: &AspectReferenceResolver<'_>,
    context: &ReferenceContext,
    body: &Block,
    diagnostics: &mut DiagnosticBag,
    excluded: &mut BTreeSet<DeclId>,
    resolutions: &mut BTreeMap<AspectReferenceId, ResolvedReference>,
) -> LinkerResult<()> {
    for reference in walk::aspect_references(body) {
        let id = reference
            .id
            .ok_or_else(|| LinkerError::assertion_failed("aspect references are numbered before analysis", reference.target.clone()))?;
        match resolver.resolve(context, id, reference)? {
            ReferenceResolution::Resolved(resolved) => {
                resolutions.insert(id, resolved);
            }
            ReferenceResolution::Invalid(diagnostic) => {
                warn!("Invalid aspect reference {}: {}", id, diagnostic.message);
                diagnostics.push(diagnostic);
                if let Some(declaration) = context.excludes {
                    excluded.insert(declaration);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{analyze_with, introduce, introduce_with, override_method};
    use crate::injection::{MemberFlags, Transformation};
    use crate::ordering::{AspectLayerId, LayerSelector, OrderingConstraint};
    use crate::symbols::{CompilationModel, MemberModel, Parameter, TypeModel};
    use crate::syntax::ast::{AspectReference, Expr, Statement};

    fn model() -> CompilationModel {
        CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs")
                .with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], Block::empty()).public())
                .with_member(MemberModel::method("Stop", "void", vec![], Block::empty()).public()),
        ])
    }

    #[test]
    fn test_unordered_layers_warn() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let transformations = [override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")];
        let introduction = introduce(&model(), &layers, &transformations);
        let (analysis, diagnostics) = analyze_with(introduction, &LinkerConfig::default());

        let codes: Vec<_> = diagnostics.iter().map(|d| (d.code, d.is_error())).collect();
        assert_eq!(codes, vec![(DiagnosticCode::UnorderedLayers, false)]);
        assert_eq!(analysis.excluded().count(), 0);
    }

    #[test]
    fn test_ordered_layers_are_silent() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let constraints = [OrderingConstraint::new(LayerSelector::aspect("A"), LayerSelector::aspect("B"))];
        let transformations = [override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")];
        let introduction = introduce_with(&model(), &layers, &constraints, &transformations);
        let (_, diagnostics) = analyze_with(introduction, &LinkerConfig::default());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_strict_ordering_excludes_target() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let transformations = [override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")];
        let introduction = introduce(&model(), &layers, &transformations);
        let (analysis, diagnostics) = analyze_with(introduction, &LinkerConfig::strict());

        assert!(diagnostics.has_errors());
        let graph = &analysis.introduction.graph;
        let target = graph.resolve("Service.Run(int)").unwrap();
        assert!(analysis.is_excluded(target));
        assert!(analysis.is_excluded(graph.resolve("Service.Run_B(int)").unwrap()));
        assert!(!analysis.is_reachable(IntermediateSymbolSemantic::final_of(target)));
    }

    #[test]
    fn test_invalid_receiver_excludes_only_its_target() {
        let layers = [AspectLayerId::new("A")];
        let bad = Block::new(vec![Statement::expr(
            AspectReference::proceed("Service.Stop()", vec![]).with_receiver(Expr::ident("other")).into_expr(),
        )]);
        let transformations = [
            override_method(&layers[0], "Service.Run(int)"),
            Transformation::OverrideMember {
                layer: layers[0].clone(),
                target: "Service.Stop()".to_string(),
                template: crate::injection::MemberTemplate::Method { body: bad },
                flags: MemberFlags::NONE,
            },
        ];
        let introduction = introduce(&model(), &layers, &transformations);
        let (analysis, diagnostics) = analyze_with(introduction, &LinkerConfig::default());

        assert_eq!(diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(), vec![DiagnosticCode::InvalidReferenceReceiver]);
        let graph = &analysis.introduction.graph;
        let stop = graph.resolve("Service.Stop()").unwrap();
        let run = graph.resolve("Service.Run(int)").unwrap();
        assert!(analysis.is_excluded(stop));
        assert!(!analysis.is_excluded(run));
        assert!(analysis.is_reachable(IntermediateSymbolSemantic::final_of(run)));
    }

    #[test]
    fn test_needs_emission_skips_inlined_semantics() {
        let layers = [AspectLayerId::new("A")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)")]);

        let (inlined, _) = analyze_with(introduction, &LinkerConfig::default());
        let run = inlined.introduction.graph.resolve("Service.Run(int)").unwrap();
        assert!(inlined.needs_emission(run, SemanticKind::Final));
        assert!(!inlined.needs_emission(run, SemanticKind::Original));

        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)")]);
        let (expanded, _) = analyze_with(introduction, &LinkerConfig::debug());
        assert!(expanded.needs_emission(run, SemanticKind::Original));
    }
}
