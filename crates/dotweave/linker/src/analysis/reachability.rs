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

//! Reachability analysis over intermediate semantics

use super::references::ResolvedReference;
use super::semantic::IntermediateSymbolSemantic;
use crate::error::{LinkerError, LinkerResult};
use crate::injection::{IntroductionResult, MemberFlags};
use crate::symbols::{DeclId, DeclarationKind};
use crate::syntax::ast::{AspectReferenceId, Block};
use crate::syntax::walk;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, trace};

/// Depth tracking for the search
#[derive(Debug, Clone)]
struct TraversalContext {
    depth: usize,
    max_depth: usize,
}

impl TraversalContext {
    fn new(max_depth: usize) -> Self {
        Self { depth: 0, max_depth }
    }

    fn enter(&mut self, semantic: IntermediateSymbolSemantic) -> LinkerResult<()> {
        if self.depth >= self.max_depth {
            return Err(LinkerError::assertion_failed(
                format!("reachability depth stays below {}", self.max_depth),
                format!("search entered {} at depth {}", semantic, self.depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Depth-first search from final semantics and non-discardable introductions
pub struct ReachabilityAnalyzer<'a> {
    introduction: &'a IntroductionResult,
    resolutions: &'a BTreeMap<AspectReferenceId, ResolvedReference>,
    excluded: &'a BTreeSet<DeclId>,
    context: TraversalContext,
    reachable: BTreeSet<IntermediateSymbolSemantic>,
}

impl<'a> ReachabilityAnalyzer<'a> {
    pub fn new(
        introduction: &'a IntroductionResult,
        resolutions: &'a BTreeMap<AspectReferenceId, ResolvedReference>,
        excluded: &'a BTreeSet<DeclId>,
        max_depth: usize,
    ) -> Self {
        Self {
            introduction,
            resolutions,
            excluded,
            context: TraversalContext::new(max_depth),
            reachable: BTreeSet::new(),
        }
    }

    /// Every reachable semantic. Property and event semantics are listed alongside the
    /// semantics of their accessors.
    #[instrument(skip_all)]
    pub fn analyze_reachability(mut self) -> LinkerResult<BTreeSet<IntermediateSymbolSemantic>> {
        for root in self.roots() {
            self.visit(root)?;
        }
        for target in self.always_emitted_edges() {
            self.visit(target)?;
        }
        debug!("{} semantics reachable", self.reachable.len());
        Ok(self.reachable)
    }

    fn roots(&self) -> Vec<IntermediateSymbolSemantic> {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        let mut roots: Vec<IntermediateSymbolSemantic> = registry
            .get_overridden_members()
            .filter(|target| !self.excluded.contains(target))
            .map(IntermediateSymbolSemantic::final_of)
            .collect();

        for member in registry.members() {
            let kind = graph.get(member.declaration).kind();
            let traversable = matches!(kind, DeclarationKind::Method | DeclarationKind::Property | DeclarationKind::Event);
            if member.is_override()
                || !traversable
                || !member.flags.contains(MemberFlags::NOT_DISCARDABLE)
                || registry.is_override_target(member.declaration)
                || self.excluded.contains(&member.declaration)
            {
                continue;
            }
            roots.push(IntermediateSymbolSemantic::default_of(member.declaration));
        }
        roots
    }

    /// Semantics referenced from code that is emitted whatever the analysis decides: source-like
    /// members that are not overridden, constructors, finalizers and initializers
    fn always_emitted_edges(&self) -> Vec<IntermediateSymbolSemantic> {
        let graph = &self.introduction.graph;
        let registry = &self.introduction.registry;
        let mut edges = Vec::new();
        for declaration in graph.iter() {
            let Some(body) = declaration.body() else {
                continue;
            };
            let member = graph.accessor_owner(declaration.id).unwrap_or(declaration.id);
            if registry.member_of(graph, member).is_some() || registry.is_override_target(member) || self.excluded.contains(&member) {
                continue;
            }
            edges.extend(self.body_edges(body));
        }
        for type_id in registry.initialized_types() {
            for initializer in registry.initializers(type_id) {
                edges.extend(self.body_edges(&initializer.body));
            }
        }
        edges
    }

    fn body_edges(&self, body: &Block) -> Vec<IntermediateSymbolSemantic> {
        walk::aspect_references(body)
            .into_iter()
            .filter_map(|reference| reference.id)
            .filter_map(|id| self.resolutions.get(&id))
            .filter_map(ResolvedReference::semantic)
            .collect()
    }

    fn is_excluded(&self, symbol: DeclId) -> bool {
        let graph = &self.introduction.graph;
        let member = graph.accessor_owner(symbol).unwrap_or(symbol);
        if self.excluded.contains(&member) {
            return true;
        }
        self.introduction
            .registry
            .member_of(graph, member)
            .and_then(|introduced| introduced.target)
            .is_some_and(|target| self.excluded.contains(&target))
    }

    fn visit(&mut self, semantic: IntermediateSymbolSemantic) -> LinkerResult<()> {
        if self.is_excluded(semantic.symbol) || self.reachable.contains(&semantic) {
            return Ok(());
        }
        self.context.enter(semantic)?;
        self.reachable.insert(semantic);
        trace!("Reached {}", semantic);
        let result = self.visit_edges(semantic);
        self.context.exit();
        result
    }

    fn visit_edges(&mut self, semantic: IntermediateSymbolSemantic) -> LinkerResult<()> {
        let graph = &self.introduction.graph;
        let declaration = graph.get(semantic.symbol);
        match declaration.kind() {
            DeclarationKind::Property | DeclarationKind::Event => {
                for accessor in declaration.accessors() {
                    self.visit(semantic.with_symbol(accessor))?;
                }
                Ok(())
            }
            DeclarationKind::Method => {
                if let Some(owner) = graph.accessor_owner(semantic.symbol) {
                    self.visit(semantic.with_symbol(owner))?;
                }
                if semantic.is_final() {
                    let next = self.last_override(semantic.symbol)?;
                    return self.visit(next);
                }
                let edges = declaration.body().map(|body| self.body_edges(body)).unwrap_or_default();
                for edge in edges {
                    self.visit(edge)?;
                }
                Ok(())
            }
            DeclarationKind::NamedType | DeclarationKind::Field | DeclarationKind::Constructor | DeclarationKind::Finalizer => {
                Err(LinkerError::assertion_failed(
                    "reachable semantics are methods, properties or events",
                    format!("{} reached on {:?} `{}`", semantic, declaration.kind(), declaration.key),
                ))
            }
        }
    }

    /// Implicit edge of a final semantic: the matching declaration of the last override
    fn last_override(&self, symbol: DeclId) -> LinkerResult<IntermediateSymbolSemantic> {
        last_override_of(self.introduction, symbol)
    }
}

/// The last override of the member owning `symbol`, mapped onto the same accessor role
pub fn last_override_of(introduction: &IntroductionResult, symbol: DeclId) -> LinkerResult<IntermediateSymbolSemantic> {
    let graph = &introduction.graph;
    let member = graph.accessor_owner(symbol).unwrap_or(symbol);
    let last = introduction
        .registry
        .get_last_override(member)
        .ok_or_else(|| LinkerError::assertion_failed("final semantics belong to overridden members", graph.get(member).key.to_string()))?;
    let declaration = match graph.get(symbol).method_role().filter(|role| role.is_accessor()) {
        Some(role) => graph
            .accessor(last.declaration, role)
            .ok_or_else(|| LinkerError::assertion_failed("override has the accessors of its target", graph.get(last.declaration).key.to_string()))?,
        None => last.declaration,
    };
    Ok(IntermediateSymbolSemantic::default_of(declaration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{introduce, override_method};
    use crate::ordering::AspectLayerId;
    use crate::injection::{MemberTemplate, Transformation};
    use crate::symbols::{CompilationModel, MemberModel, Parameter, TypeModel};
    use crate::syntax::ast::{AspectReference, AspectReferenceOrder, Expr, ReferenceAccess, Statement};
    use proptest::prelude::*;

    fn model() -> CompilationModel {
        CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs")
                .with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], Block::empty()).public()),
        ])
    }

    fn resolutions(introduction: &IntroductionResult) -> BTreeMap<AspectReferenceId, ResolvedReference> {
        let resolver = crate::analysis::references::AspectReferenceResolver::new(introduction);
        let mut resolved = BTreeMap::new();
        for declaration in introduction.graph.iter() {
            let Some(body) = declaration.body() else { continue };
            let context = resolver.body_context(declaration.id).unwrap();
            for reference in walk::aspect_references(body) {
                let id = reference.id.unwrap();
                if let crate::analysis::references::ReferenceResolution::Resolved(r) = resolver.resolve(&context, id, reference).unwrap() {
                    resolved.insert(id, r);
                }
            }
        }
        resolved
    }

    #[test]
    fn test_chain_is_reachable_from_final() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)"), override_method(&layers[1], "Service.Run(int)")]);
        let resolved = resolutions(&introduction);
        let excluded = BTreeSet::new();
        let reachable = ReachabilityAnalyzer::new(&introduction, &resolved, &excluded, 100).analyze_reachability().unwrap();

        let graph = &introduction.graph;
        let target = graph.resolve("Service.Run(int)").unwrap();
        let expected = vec![
            IntermediateSymbolSemantic::original(target),
            IntermediateSymbolSemantic::final_of(target),
            IntermediateSymbolSemantic::default_of(graph.resolve("Service.Run_A(int)").unwrap()),
            IntermediateSymbolSemantic::default_of(graph.resolve("Service.Run_B(int)").unwrap()),
        ];
        assert_eq!(reachable.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_depth_fuse_is_an_assertion() {
        let layers = [AspectLayerId::new("A"), AspectLayerId::new("B"), AspectLayerId::new("C")];
        let transformations: Vec<_> = layers.iter().map(|layer| override_method(layer, "Service.Run(int)")).collect();
        let introduction = introduce(&model(), &layers, &transformations);
        let resolved = resolutions(&introduction);
        let excluded = BTreeSet::new();
        let result = ReachabilityAnalyzer::new(&introduction, &resolved, &excluded, 2).analyze_reachability();
        assert!(matches!(result, Err(LinkerError::AssertionFailed { .. })));
    }

    #[test]
    fn test_excluded_target_is_not_traversed() {
        let layers = [AspectLayerId::new("A")];
        let introduction = introduce(&model(), &layers, &[override_method(&layers[0], "Service.Run(int)")]);
        let resolved = resolutions(&introduction);
        let excluded = BTreeSet::from([introduction.graph.resolve("Service.Run(int)").unwrap()]);
        let reachable = ReachabilityAnalyzer::new(&introduction, &resolved, &excluded, 100).analyze_reachability().unwrap();
        assert!(reachable.is_empty());
    }

    /// Which reference an override body makes to its own member
    #[derive(Debug, Clone, Copy)]
    enum Call {
        Skip,
        Base,
        Final,
    }

    fn call() -> impl Strategy<Value = Call> {
        prop_oneof![Just(Call::Skip), Just(Call::Base), Just(Call::Final)]
    }

    fn reference(target: &str, call: Call, access: ReferenceAccess) -> Statement {
        let order = match call {
            Call::Skip => return Statement::expr(Expr::call(Expr::ident("Log"), vec![])),
            Call::Base => AspectReferenceOrder::Base,
            Call::Final => AspectReferenceOrder::Final,
        };
        Statement::expr(AspectReference::new(target, order, access).into_expr())
    }

    fn value() -> Box<Expr> {
        Box::new(Expr::ident("value"))
    }

    fn members_model() -> CompilationModel {
        let run = Block::new(vec![Statement::ret(Some(Expr::ident("x")))]);
        let get = Block::new(vec![Statement::ret(Some(Expr::string("n")))]);
        let set = Block::new(vec![Statement::expr(Expr::call(Expr::ident("Store"), vec![Expr::ident("value")]))]);
        let add = Block::new(vec![Statement::expr(Expr::call(Expr::ident("Subscribe"), vec![Expr::ident("value")]))]);
        let remove = Block::new(vec![Statement::expr(Expr::call(Expr::ident("Unsubscribe"), vec![Expr::ident("value")]))]);
        CompilationModel::new(vec![
            TypeModel::class("Service", "Service.cs")
                .with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], run).public())
                .with_member(MemberModel::property("Name", "string", Some(get), Some(set)).public())
                .with_member(MemberModel::event("Changed", "Action", add, remove).public()),
        ])
    }

    /// Overrides of one layer: `Run` (optionally reading `Name` too), `Name` and `Changed`.
    /// `None` leaves the member alone; a `None` accessor forwards to the previous layer.
    type LayerPlan = (Option<(Call, bool)>, Option<(Option<Call>, Option<Call>)>, Option<(Option<Call>, Option<Call>)>);

    fn layer_plan() -> impl Strategy<Value = LayerPlan> {
        (
            prop::option::of((call(), any::<bool>())),
            prop::option::of((prop::option::of(call()), prop::option::of(call()))),
            prop::option::of((prop::option::of(call()), prop::option::of(call()))),
        )
    }

    fn transformations(layers: &[AspectLayerId], plans: &[LayerPlan]) -> Vec<Transformation> {
        let mut transformations = Vec::new();
        for (layer, (run, name, changed)) in layers.iter().zip(plans) {
            if let Some((call, reads_name)) = run {
                let mut body = vec![reference("Service.Run(int)", *call, ReferenceAccess::Invoke { arguments: vec![Expr::ident("x")] })];
                if *reads_name {
                    body.push(reference("Service.Name", Call::Final, ReferenceAccess::Get));
                }
                body.push(Statement::ret(Some(Expr::ident("x"))));
                transformations.push(Transformation::OverrideMember {
                    layer: layer.clone(),
                    target: "Service.Run(int)".to_string(),
                    template: MemberTemplate::Method { body: Block::new(body) },
                    flags: MemberFlags::NONE,
                });
            }
            if let Some((getter, setter)) = name {
                transformations.push(Transformation::OverrideMember {
                    layer: layer.clone(),
                    target: "Service.Name".to_string(),
                    template: MemberTemplate::Property {
                        getter: getter.map(|call| Block::new(vec![reference("Service.Name", call, ReferenceAccess::Get), Statement::ret(Some(Expr::string("n")))])),
                        setter: setter.map(|call| Block::new(vec![reference("Service.Name", call, ReferenceAccess::Set { value: value() })])),
                    },
                    flags: MemberFlags::NONE,
                });
            }
            if let Some((add, remove)) = changed {
                transformations.push(Transformation::OverrideMember {
                    layer: layer.clone(),
                    target: "Service.Changed".to_string(),
                    template: MemberTemplate::Event {
                        add: add.map(|call| Block::new(vec![reference("Service.Changed", call, ReferenceAccess::Add { value: value() })])),
                        remove: remove.map(|call| Block::new(vec![reference("Service.Changed", call, ReferenceAccess::Remove { value: value() })])),
                    },
                    flags: MemberFlags::NONE,
                });
            }
        }
        transformations
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_edges_of_reachable_semantics_are_reachable(plans in prop::collection::vec(layer_plan(), 1..4)) {
            let layers: Vec<AspectLayerId> = (0..plans.len()).map(|i| AspectLayerId::new(format!("L{}", i))).collect();
            let introduction = introduce(&members_model(), &layers, &transformations(&layers, &plans));
            let resolved = resolutions(&introduction);
            let excluded = BTreeSet::new();
            let edges = ReachabilityAnalyzer::new(&introduction, &resolved, &excluded, 100);
            let reachable = ReachabilityAnalyzer::new(&introduction, &resolved, &excluded, 100).analyze_reachability().unwrap();

            let graph = &introduction.graph;
            for &semantic in &reachable {
                let declaration = graph.get(semantic.symbol);
                let successors: Vec<IntermediateSymbolSemantic> = match declaration.kind() {
                    DeclarationKind::Property | DeclarationKind::Event => declaration.accessors().into_iter().map(|a| semantic.with_symbol(a)).collect(),
                    _ if semantic.is_final() => vec![last_override_of(&introduction, semantic.symbol).unwrap()],
                    _ => declaration.body().map(|body| edges.body_edges(body)).unwrap_or_default(),
                };
                let owner = graph.accessor_owner(semantic.symbol).map(|owner| semantic.with_symbol(owner));
                for successor in successors.into_iter().chain(owner) {
                    prop_assert!(reachable.contains(&successor), "{} is reachable but {} is not", semantic, successor);
                }
            }
        }
    }
}
