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

//! Layer orderer
//!
//! Builds a graph of "before" edges between registered layers and sorts it topologically. When the
//! constraints leave two layers unordered, the one registered first is applied first.

use super::layer::{AspectLayerId, LayerOrder, OrderingConstraint};
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
use crate::error::{LinkerError, LinkerResult};
use crate::pipeline::{LinkerStage, PipelineContext};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, instrument, warn};

/// Computes the [`LayerOrder`] of one linking run
#[derive(Debug, Default)]
pub struct LayerOrderer {
    /// Nodes carry the registration index of their layer
    graph: DiGraph<usize, ()>,
    layers: Vec<AspectLayerId>,
}

impl LayerOrderer {
    /// Register layers in declaration order; duplicates are rejected
    pub fn new(layers: &[AspectLayerId]) -> LinkerResult<Self> {
        let mut orderer = Self::default();
        let mut seen = HashMap::new();
        for (index, layer) in layers.iter().enumerate() {
            if seen.insert(layer.clone(), index).is_some() {
                return Err(LinkerError::invalid_model(format!("layer `{}` is registered twice", layer)));
            }
            orderer.graph.add_node(index);
            orderer.layers.push(layer.clone());
        }
        orderer.chain_aspect_layers();
        Ok(orderer)
    }

    /// Layers of one aspect are applied in the order the aspect declares them
    fn chain_aspect_layers(&mut self) {
        let mut last_of_aspect: HashMap<&str, usize> = HashMap::new();
        for (index, layer) in self.layers.iter().enumerate() {
            if let Some(previous) = last_of_aspect.insert(layer.aspect.as_str(), index) {
                self.graph.update_edge(NodeIndex::new(previous), NodeIndex::new(index), ());
            }
        }
    }

    /// Add the user constraints. A constraint naming no registered layer is ignored with a warning.
    pub fn add_constraints(&mut self, constraints: &[OrderingConstraint], diagnostics: &mut DiagnosticBag) {
        for constraint in constraints {
            let before = self.select(|id| constraint.before.matches(id));
            let after = self.select(|id| constraint.after.matches(id));
            if before.is_empty() || after.is_empty() {
                let unknown = if before.is_empty() { &constraint.before } else { &constraint.after };
                warn!("Ignoring ordering constraint on unknown layer {}", unknown);
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::UnknownLayer,
                    format!("ordering constraint `{} before {}` names unknown layer `{}`", constraint.before, constraint.after, unknown),
                    None,
                ));
                continue;
            }
            for &from in &before {
                for &to in &after {
                    if from != to {
                        self.graph.update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
                    }
                }
            }
        }
    }

    fn select(&self, predicate: impl Fn(&AspectLayerId) -> bool) -> Vec<usize> {
        self.layers.iter().enumerate().filter(|(_, id)| predicate(id)).map(|(index, _)| index).collect()
    }

    /// Sort the layers. A cycle reports LINK0002 for each cycle and fails the run.
    #[instrument(skip_all, fields(layers = self.layers.len()))]
    pub fn order(self, diagnostics: &mut DiagnosticBag) -> LinkerResult<LayerOrder> {
        let count = self.layers.len();
        let mut in_degree = vec![0usize; count];
        for edge in self.graph.raw_edges() {
            in_degree[edge.target().index()] += 1;
        }

        // Kahn's algorithm; the heap yields the earliest-registered ready layer
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree.iter().enumerate().filter(|(_, d)| **d == 0).map(|(i, _)| Reverse(i)).collect();
        let mut sorted = Vec::with_capacity(count);
        while let Some(Reverse(index)) = ready.pop() {
            sorted.push(index);
            for successor in self.graph.neighbors(NodeIndex::new(index)) {
                let degree = &mut in_degree[successor.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(successor.index()));
                }
            }
        }

        if sorted.len() < count {
            return Err(self.report_cycles(diagnostics));
        }

        let position: Vec<usize> = {
            let mut position = vec![0; count];
            for (order, &index) in sorted.iter().enumerate() {
                position[index] = order;
            }
            position
        };

        let mut implied = vec![vec![false; count]; count];
        for start in 0..count {
            let mut dfs = Dfs::new(&self.graph, NodeIndex::new(start));
            while let Some(node) = dfs.next(&self.graph) {
                if node.index() != start {
                    implied[position[start]][position[node.index()]] = true;
                }
            }
        }

        let layers: Vec<AspectLayerId> = sorted.iter().map(|&index| self.layers[index].clone()).collect();
        debug!("Layer order: {}", layers.iter().map(ToString::to_string).collect::<Vec<_>>().join(" < "));
        Ok(LayerOrder::new(layers, implied))
    }

    fn report_cycles(&self, diagnostics: &mut DiagnosticBag) -> LinkerError {
        let mut members = Vec::new();
        let mut components: Vec<Vec<usize>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut indices: Vec<usize> = component.into_iter().map(|node| node.index()).collect();
                indices.sort_unstable();
                indices
            })
            .collect();
        components.sort();

        for component in components {
            let names: Vec<String> = component.iter().map(|&index| self.layers[index].to_string()).collect();
            warn!("Cyclic ordering constraints between {}", names.join(", "));
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::OrderingCycle,
                format!("ordering constraints form a cycle between layers {}", names.join(", ")),
                None,
            ));
            members.extend(names);
        }
        LinkerError::OrderingCycle { members }
    }
}

/// Ordering stage: sorts the registered layers under the run's constraints
pub struct OrderStep<'a> {
    constraints: &'a [OrderingConstraint],
}

impl<'a> OrderStep<'a> {
    pub fn new(constraints: &'a [OrderingConstraint]) -> Self {
        Self { constraints }
    }
}

impl LinkerStage for OrderStep<'_> {
    type Input = Vec<AspectLayerId>;
    type Output = LayerOrder;

    fn execute(&mut self, layers: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let mut orderer = LayerOrderer::new(&layers)?;
        orderer.add_constraints(self.constraints, &mut context.diagnostics);
        let order = orderer.order(&mut context.diagnostics)?;
        context.metrics.record_processed_items(self.name(), order.len());
        Ok(order)
    }

    fn name(&self) -> &'static str {
        "ordering"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::layer::LayerSelector;

    fn order(layers: &[AspectLayerId], constraints: &[OrderingConstraint]) -> (LinkerResult<LayerOrder>, DiagnosticBag) {
        let mut diagnostics = DiagnosticBag::new();
        let mut orderer = LayerOrderer::new(layers).unwrap();
        orderer.add_constraints(constraints, &mut diagnostics);
        (orderer.order(&mut diagnostics), diagnostics)
    }

    fn before(a: &str, b: &str) -> OrderingConstraint {
        OrderingConstraint::new(LayerSelector::aspect(a), LayerSelector::aspect(b))
    }

    #[test]
    fn test_constraints_override_registration_order() {
        let layers = vec![AspectLayerId::new("Logging"), AspectLayerId::new("Cache")];
        let (result, diagnostics) = order(&layers, &[before("Cache", "Logging")]);
        let order = result.unwrap();
        assert_eq!(order.layers(), &[AspectLayerId::new("Cache"), AspectLayerId::new("Logging")]);
        assert!(order.is_comparable(&layers[0], &layers[1]));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unconstrained_layers_fall_back_to_registration_order() {
        let layers = vec![AspectLayerId::new("B"), AspectLayerId::new("A"), AspectLayerId::new("C")];
        let (result, _) = order(&layers, &[before("C", "A")]);
        let order = result.unwrap();
        assert_eq!(order.layers(), &[AspectLayerId::new("B"), AspectLayerId::new("C"), AspectLayerId::new("A")]);
        assert!(!order.is_comparable(&layers[0], &layers[1]));
        assert_eq!(order.unordered_pairs().len(), 2);
    }

    #[test]
    fn test_layers_of_one_aspect_are_chained() {
        let layers = vec![AspectLayerId::with_layer("Cache", "Inner"), AspectLayerId::new("Logging"), AspectLayerId::with_layer("Cache", "Outer")];
        let (result, _) = order(&layers, &[before("Logging", "Cache")]);
        let order = result.unwrap();
        assert_eq!(order.order(&layers[1]), Some(0));
        assert!(order.is_comparable(&layers[0], &layers[2]));
        assert!(order.order(&layers[0]) < order.order(&layers[2]));
    }

    #[test]
    fn test_cycle_is_reported() {
        let layers = vec![AspectLayerId::new("A"), AspectLayerId::new("B"), AspectLayerId::new("C")];
        let (result, diagnostics) = order(&layers, &[before("A", "B"), before("B", "A")]);
        match result {
            Err(LinkerError::OrderingCycle { members }) => assert_eq!(members, vec!["A".to_string(), "B".to_string()]),
            other => panic!("expected a cycle, got {:?}", other),
        }
        assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::OrderingCycle));
    }

    #[test]
    fn test_unknown_layer_is_ignored_with_warning() {
        let layers = vec![AspectLayerId::new("A")];
        let (result, diagnostics) = order(&layers, &[before("A", "Missing")]);
        assert!(result.is_ok());
        assert_eq!(diagnostics.iter().next().map(|d| d.code), Some(DiagnosticCode::UnknownLayer));
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_duplicate_layer_rejected() {
        assert!(LayerOrderer::new(&[AspectLayerId::new("A"), AspectLayerId::new("A")]).is_err());
    }
}
