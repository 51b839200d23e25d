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

//! Introduction registry
//!
//! Written by the introduction step only, then frozen. Every later stage reads it.

use super::insert_position::InsertPosition;
use super::introduced_member::{IntroducedMember, LinkerNodeId};
use super::transformation::{InitializerKind, MemberFlags};
use crate::error::{LinkerError, LinkerResult};
use crate::ordering::AspectLayerId;
use crate::symbols::{DeclId, SymbolGraph};
use crate::syntax::ast::Block;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// An interface added to the base list of a type
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceAddition {
    pub layer: AspectLayerId,
    pub layer_order: usize,
    pub interface: String,
    /// Part whose declaration receives the base-list entry
    pub part: usize,
}

/// Statements prepended to the constructors of a type
#[derive(Debug, Clone, PartialEq)]
pub struct InitializerAddition {
    pub layer: AspectLayerId,
    pub layer_order: usize,
    pub kind: InitializerKind,
    pub body: Block,
}

#[derive(Debug, Default)]
pub struct IntroductionRegistry {
    members: Vec<IntroducedMember>,
    by_declaration: HashMap<DeclId, LinkerNodeId>,
    by_position: BTreeMap<InsertPosition, Vec<LinkerNodeId>>,
    /// Override chains keyed by member-level target, ordered by layer
    overrides: HashMap<DeclId, Vec<(usize, LinkerNodeId)>>,
    override_targets: BTreeSet<DeclId>,
    interface_additions: BTreeMap<DeclId, Vec<InterfaceAddition>>,
    initializers: BTreeMap<DeclId, Vec<InitializerAddition>>,
    frozen: bool,
}

impl IntroductionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_writable(&self) -> LinkerResult<()> {
        if self.frozen {
            return Err(LinkerError::assertion_failed("registry is writable", "introduction registry modified after it was frozen"));
        }
        Ok(())
    }

    fn next_id(&self) -> LinkerNodeId {
        LinkerNodeId(self.members.len() as u32)
    }

    fn insert(&mut self, graph: &SymbolGraph, member: IntroducedMember) -> LinkerNodeId {
        let id = member.id;
        let position = member.insert_position(graph).clone();
        self.by_declaration.insert(member.declaration, id);
        self.by_position.entry(position).or_default().push(id);
        self.members.push(member);
        id
    }

    /// Record an override of `target` (member level) produced by `layer`
    #[allow(clippy::too_many_arguments)]
    pub fn add_override(
        &mut self,
        graph: &SymbolGraph,
        transformation: usize,
        layer: AspectLayerId,
        layer_order: usize,
        declaration: DeclId,
        target: DeclId,
        flags: MemberFlags,
    ) -> LinkerResult<LinkerNodeId> {
        self.ensure_writable()?;
        if self.has_override_from(target, &layer) {
            return Err(LinkerError::assertion_failed(
                "one override per layer and target",
                format!("`{}` already overrides `{}`", layer, graph.get(target).key),
            ));
        }
        let id = self.next_id();
        let member = IntroducedMember::new_override(id, transformation, layer, declaration, target, flags);
        self.insert(graph, member);

        let chain = self.overrides.entry(target).or_default();
        let index = chain.partition_point(|(order, _)| *order <= layer_order);
        chain.insert(index, (layer_order, id));
        self.override_targets.insert(target);
        Ok(id)
    }

    /// Record a new member, or a new type when `container` is `None`
    #[allow(clippy::too_many_arguments)]
    pub fn add_member(
        &mut self,
        graph: &SymbolGraph,
        transformation: usize,
        layer: AspectLayerId,
        declaration: DeclId,
        container: Option<DeclId>,
        root_unit: Option<String>,
        flags: MemberFlags,
    ) -> LinkerResult<LinkerNodeId> {
        self.ensure_writable()?;
        let id = self.next_id();
        let member = IntroducedMember::new_member(id, transformation, layer, declaration, container, root_unit, flags);
        Ok(self.insert(graph, member))
    }

    /// Record a base-list addition. Additions are grouped on the primary part of the type.
    pub fn add_interface(&mut self, graph: &SymbolGraph, type_id: DeclId, layer: AspectLayerId, layer_order: usize, interface: String) -> LinkerResult<()> {
        self.ensure_writable()?;
        let additions = self.interface_additions.entry(type_id).or_default();
        if additions.iter().any(|addition| addition.interface == interface) {
            return Ok(());
        }
        let addition = InterfaceAddition {
            layer,
            layer_order,
            interface,
            part: graph.primary_part(type_id),
        };
        let index = additions.partition_point(|existing| existing.layer_order <= layer_order);
        additions.insert(index, addition);
        Ok(())
    }

    pub fn add_initializer(&mut self, type_id: DeclId, layer: AspectLayerId, layer_order: usize, kind: InitializerKind, body: Block) -> LinkerResult<()> {
        self.ensure_writable()?;
        let initializers = self.initializers.entry(type_id).or_default();
        let index = initializers.partition_point(|existing| existing.layer_order <= layer_order);
        initializers.insert(index, InitializerAddition { layer, layer_order, kind, body });
        Ok(())
    }

    /// Stop accepting writes
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: LinkerNodeId) -> &IntroducedMember {
        &self.members[id.index()]
    }

    pub fn members(&self) -> &[IntroducedMember] {
        &self.members
    }

    /// Introduced member whose declaration is `declaration`. Accessors map to their owner's member.
    pub fn member_of(&self, graph: &SymbolGraph, declaration: DeclId) -> Option<&IntroducedMember> {
        let owner = graph.accessor_owner(declaration).unwrap_or(declaration);
        self.by_declaration.get(&owner).map(|&id| self.get(id))
    }

    /// Members placed at a position, in registration order
    pub fn get_introduced_members_on_position(&self, position: &InsertPosition) -> Vec<&IntroducedMember> {
        self.by_position.get(position).map(|ids| ids.iter().map(|&id| self.get(id)).collect()).unwrap_or_default()
    }

    /// Every position holding at least one member
    pub fn positions(&self) -> impl Iterator<Item = &InsertPosition> {
        self.by_position.keys()
    }

    pub fn has_override_from(&self, target: DeclId, layer: &AspectLayerId) -> bool {
        self.overrides
            .get(&target)
            .is_some_and(|chain| chain.iter().any(|(_, id)| &self.get(*id).layer == layer))
    }

    /// Whether a member-level declaration has overrides
    pub fn is_override_target(&self, declaration: DeclId) -> bool {
        self.override_targets.contains(&declaration)
    }

    /// Overridden declarations in id order
    pub fn get_overridden_members(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.override_targets.iter().copied()
    }

    /// Override chain of a target, first-applied first
    pub fn get_overrides(&self, target: DeclId) -> Vec<&IntroducedMember> {
        self.overrides
            .get(&target)
            .map(|chain| chain.iter().map(|(_, id)| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Last-applied override of a target
    pub fn get_last_override(&self, target: DeclId) -> Option<&IntroducedMember> {
        self.overrides.get(&target).and_then(|chain| chain.last()).map(|(_, id)| self.get(*id))
    }

    /// Layer order of a chain entry
    pub fn chain_layer_order(&self, member: &IntroducedMember) -> Option<usize> {
        let target = member.target?;
        self.overrides.get(&target)?.iter().find(|(_, id)| *id == member.id).map(|(order, _)| *order)
    }

    pub fn interface_additions(&self, type_id: DeclId) -> &[InterfaceAddition] {
        self.interface_additions.get(&type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn initializers(&self, type_id: DeclId) -> &[InitializerAddition] {
        self.initializers.get(&type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Types receiving initializers, in id order
    pub fn initialized_types(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.initializers.keys().copied()
    }

    /// Initializer bodies, for numbering their aspect references before the registry is frozen
    pub(crate) fn initializer_bodies_mut(&mut self) -> LinkerResult<impl Iterator<Item = &mut Block>> {
        self.ensure_writable()?;
        Ok(self.initializers.values_mut().flatten().map(|addition| &mut addition.body))
    }
}
