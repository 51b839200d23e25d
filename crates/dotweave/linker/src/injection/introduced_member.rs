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

//! Introduced members: one transformation's output for one declaration

use super::insert_position::InsertPosition;
use super::transformation::MemberFlags;
use crate::ordering::AspectLayerId;
use crate::symbols::{DeclId, SymbolGraph};
use std::cell::OnceCell;
use std::fmt;

/// Stable arena index of an introduced member. Later passes look members up by this id,
/// never by syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkerNodeId(pub(crate) u32);

impl LinkerNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LinkerNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__linker_node_{}", self.0)
    }
}

/// Whether an introduction overrides an existing member or adds a new one.
/// Overrides sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntroductionCategory {
    Override,
    New,
}

/// A member produced by one transformation
#[derive(Debug, Clone)]
pub struct IntroducedMember {
    pub id: LinkerNodeId,
    /// Index of the originating transformation in the linker input
    pub transformation: usize,
    pub layer: AspectLayerId,
    pub category: IntroductionCategory,
    /// The member in the intermediate graph
    pub declaration: DeclId,
    /// Declaration overridden by this member
    pub target: Option<DeclId>,
    /// Receiving type of a new member; `None` for types at a unit root
    pub container: Option<DeclId>,
    pub flags: MemberFlags,
    root_unit: Option<String>,
    position: OnceCell<InsertPosition>,
}

impl IntroducedMember {
    pub(crate) fn new_override(
        id: LinkerNodeId,
        transformation: usize,
        layer: AspectLayerId,
        declaration: DeclId,
        target: DeclId,
        flags: MemberFlags,
    ) -> Self {
        Self {
            id,
            transformation,
            layer,
            category: IntroductionCategory::Override,
            declaration,
            target: Some(target),
            container: None,
            flags,
            root_unit: None,
            position: OnceCell::new(),
        }
    }

    pub(crate) fn new_member(
        id: LinkerNodeId,
        transformation: usize,
        layer: AspectLayerId,
        declaration: DeclId,
        container: Option<DeclId>,
        root_unit: Option<String>,
        flags: MemberFlags,
    ) -> Self {
        Self {
            id,
            transformation,
            layer,
            category: IntroductionCategory::New,
            declaration,
            target: None,
            container,
            flags,
            root_unit,
            position: OnceCell::new(),
        }
    }

    pub fn is_override(&self) -> bool {
        self.category == IntroductionCategory::Override
    }

    /// Placement of the member, computed on first use
    pub fn insert_position(&self, graph: &SymbolGraph) -> &InsertPosition {
        self.position.get_or_init(|| match (self.target, self.container) {
            (Some(target), _) => InsertPosition::after(graph, target),
            (None, Some(container)) => InsertPosition::within(graph, container),
            (None, None) => InsertPosition::Root {
                unit: self.root_unit.clone().unwrap_or_default(),
            },
        })
    }
}
