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

//! Deterministic order of introduced members sharing an insert position

use super::insert_position::InsertPosition;
use super::introduced_member::{IntroducedMember, LinkerNodeId};
use super::registry::IntroductionRegistry;
use super::step::IntroductionResult;
use crate::error::{LinkerError, LinkerResult};
use crate::ordering::LayerOrder;
use crate::pipeline::{LinkerStage, PipelineContext};
use crate::symbols::{Declaration, DeclarationKind, SymbolGraph};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Total order over introduced members destined for the same position
pub struct IntroducedMemberComparer<'a> {
    graph: &'a SymbolGraph,
    order: &'a LayerOrder,
}

fn kind_bucket(kind: DeclarationKind) -> u8 {
    match kind {
        DeclarationKind::Field => 0,
        DeclarationKind::Constructor => 1,
        DeclarationKind::Property => 2,
        DeclarationKind::Method => 3,
        DeclarationKind::Event => 4,
        DeclarationKind::NamedType => 5,
        DeclarationKind::Finalizer => 6,
    }
}

impl<'a> IntroducedMemberComparer<'a> {
    pub fn new(graph: &'a SymbolGraph, order: &'a LayerOrder) -> Self {
        Self { graph, order }
    }

    pub fn compare(&self, x: &IntroducedMember, y: &IntroducedMember) -> Ordering {
        let a = self.graph.get(x.declaration);
        let b = self.graph.get(y.declaration);
        self.compare_declarations(a, b)
            .then_with(|| x.category.cmp(&y.category))
            .then_with(|| self.layer_rank(x).cmp(&self.layer_rank(y)))
    }

    fn compare_declarations(&self, a: &Declaration, b: &Declaration) -> Ordering {
        kind_bucket(a.kind())
            .cmp(&kind_bucket(b.kind()))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| {
                if a.kind() == DeclarationKind::Method && b.kind() == DeclarationKind::Method {
                    a.signature().cmp(&b.signature())
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.accessibility.cmp(&b.accessibility))
            .then_with(|| {
                let left = a.explicit_interface.as_ref().map(|i| i.interface.as_str());
                let right = b.explicit_interface.as_ref().map(|i| i.interface.as_str());
                // `None` sorts before `Some`: non-explicit members first
                left.cmp(&right)
            })
            // same simple name in different namespaces or containers
            .then_with(|| a.key.cmp(&b.key))
    }

    /// Unregistered layers sort last
    fn layer_rank(&self, member: &IntroducedMember) -> usize {
        self.order.order(&member.layer).unwrap_or(usize::MAX)
    }

    /// Sort members in place; two distinct members comparing equal is a broken invariant
    pub fn sort(&self, members: &mut [&IntroducedMember]) -> LinkerResult<()> {
        members.sort_by(|x, y| self.compare(x, y));
        for pair in members.windows(2) {
            if pair[0].id != pair[1].id && self.compare(pair[0], pair[1]) == Ordering::Equal {
                return Err(LinkerError::assertion_failed(
                    "introduced member order is total",
                    format!(
                        "`{}` and `{}` compare equal",
                        self.graph.get(pair[0].declaration).key,
                        self.graph.get(pair[1].declaration).key
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Sorted member ids of every position of the registry
    pub fn sort_registry(&self, registry: &IntroductionRegistry) -> LinkerResult<BTreeMap<InsertPosition, Vec<LinkerNodeId>>> {
        let mut sorted = BTreeMap::new();
        for position in registry.positions() {
            let mut members = registry.get_introduced_members_on_position(position);
            self.sort(&mut members)?;
            sorted.insert(position.clone(), members.iter().map(|member| member.id).collect());
        }
        Ok(sorted)
    }
}

/// Sorts the members of every insert position once, so emission never re-sorts
pub struct SortStep;

impl LinkerStage for SortStep {
    type Input = IntroductionResult;
    type Output = IntroductionResult;

    fn execute(&mut self, mut input: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let ordered = IntroducedMemberComparer::new(&input.graph, &input.order).sort_registry(&input.registry)?;
        debug!("Sorted introduced members of {} positions", ordered.len());
        context.metrics.record_processed_items(self.name(), ordered.len());
        input.ordered = ordered;
        Ok(input)
    }

    fn name(&self) -> &'static str {
        "sort"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::transformation::MemberFlags;
    use crate::ordering::{AspectLayerId, LayerOrderer};
    use crate::symbols::{Accessibility, CompilationModel, DeclId, MemberModel, TypeModel};
    use crate::syntax::ast::Block;
    use crate::diagnostics::DiagnosticBag;

    fn fixture() -> (SymbolGraph, LayerOrder) {
        let model = CompilationModel::new(vec![
            TypeModel::class("C", "C.cs")
                .with_member(MemberModel::method("Run", "void", vec![], Block::empty()).public())
                .with_member(MemberModel::method("Run", "void", vec![crate::symbols::Parameter::new("x", "int")], Block::empty()).public())
                .with_member(MemberModel::field("_state", "int"))
                .with_member(MemberModel::auto_property("Name", "string").with_accessibility(Accessibility::Internal))
                .with_member(MemberModel::method("Apply", "void", vec![], Block::empty()).implementing("IApply")),
        ]);
        let graph = SymbolGraph::from_model(&model).unwrap();
        let layers = [AspectLayerId::new("First"), AspectLayerId::new("Second")];
        let mut diagnostics = DiagnosticBag::new();
        let order = LayerOrderer::new(&layers).unwrap().order(&mut diagnostics).unwrap();
        (graph, order)
    }

    fn member(id: u32, declaration: DeclId, layer: &str, container: DeclId) -> IntroducedMember {
        IntroducedMember::new_member(LinkerNodeId(id), 0, AspectLayerId::new(layer), declaration, Some(container), None, MemberFlags::NONE)
    }

    #[test]
    fn test_kind_then_name_then_signature() {
        let (graph, order) = fixture();
        let container = graph.resolve("C").unwrap();
        let run = member(0, graph.resolve("C.Run()").unwrap(), "First", container);
        let run_int = member(1, graph.resolve("C.Run(int)").unwrap(), "First", container);
        let field = member(2, graph.resolve("C._state").unwrap(), "First", container);
        let property = member(3, graph.resolve("C.Name").unwrap(), "First", container);
        let explicit = member(4, graph.resolve("C.IApply.Apply()").unwrap(), "First", container);

        let comparer = IntroducedMemberComparer::new(&graph, &order);
        let mut members = vec![&run_int, &explicit, &run, &property, &field];
        comparer.sort(&mut members).unwrap();
        let ids: Vec<u32> = members.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![2, 3, 4, 0, 1]);
    }

    #[test]
    fn test_layer_breaks_remaining_ties() {
        let (graph, order) = fixture();
        let container = graph.resolve("C").unwrap();
        let declaration = graph.resolve("C.Run()").unwrap();
        let late = member(0, declaration, "Second", container);
        let early = member(1, declaration, "First", container);

        let comparer = IntroducedMemberComparer::new(&graph, &order);
        assert_eq!(comparer.compare(&early, &late), Ordering::Less);
        assert_eq!(comparer.compare(&late, &early), Ordering::Greater);
    }

    #[test]
    fn test_same_name_in_other_namespace_is_ordered_by_key() {
        let model = CompilationModel::new(vec![
            TypeModel::class("Generated", "Beta.cs").in_namespace("Beta"),
            TypeModel::class("Generated", "Alpha.cs").in_namespace("Alpha"),
        ]);
        let graph = SymbolGraph::from_model(&model).unwrap();
        let (_, order) = fixture();
        let unit = "Introduced.g.cs".to_string();
        let beta = IntroducedMember::new_member(LinkerNodeId(0), 0, AspectLayerId::new("First"), graph.resolve("Beta.Generated").unwrap(), None, Some(unit.clone()), MemberFlags::NONE);
        let alpha = IntroducedMember::new_member(LinkerNodeId(1), 0, AspectLayerId::new("First"), graph.resolve("Alpha.Generated").unwrap(), None, Some(unit.clone()), MemberFlags::NONE);

        let comparer = IntroducedMemberComparer::new(&graph, &order);
        let mut members = vec![&beta, &alpha];
        comparer.sort(&mut members).unwrap();
        let ids: Vec<u32> = members.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn test_full_tie_is_an_assertion_failure() {
        let (graph, order) = fixture();
        let container = graph.resolve("C").unwrap();
        let declaration = graph.resolve("C.Run()").unwrap();
        let a = member(0, declaration, "First", container);
        let b = member(1, declaration, "First", container);

        let comparer = IntroducedMemberComparer::new(&graph, &order);
        let mut members = vec![&a, &b];
        assert!(matches!(comparer.sort(&mut members), Err(LinkerError::AssertionFailed { .. })));
    }
}
