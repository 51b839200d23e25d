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

//! Physical placement of introduced syntax

use crate::symbols::{DeclId, DeclarationKind, SymbolGraph};
use std::fmt;

/// Where the syntax of an introduced member is placed in the output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InsertPosition {
    /// Root of a syntax unit
    Root { unit: String },
    /// End of one part of a type
    Within { type_id: DeclId, part: usize },
    /// Directly after a member of the source
    After { declaration: DeclId },
}

impl InsertPosition {
    /// Position of a new member or nested type added to `container`: the type's primary part
    pub fn within(graph: &SymbolGraph, container: DeclId) -> Self {
        InsertPosition::Within {
            type_id: container,
            part: graph.primary_part(container),
        }
    }

    /// Position of an override of `target`. Overrides of accessors go after their property or event.
    pub fn after(graph: &SymbolGraph, target: DeclId) -> Self {
        let declaration = graph.accessor_owner(target).unwrap_or(target);
        InsertPosition::After { declaration }
    }

    /// Type whose syntax receives the member, `None` for a unit root
    pub fn declaring_type(&self, graph: &SymbolGraph) -> Option<DeclId> {
        match self {
            InsertPosition::Root { .. } => None,
            InsertPosition::Within { type_id, .. } => Some(*type_id),
            InsertPosition::After { declaration } => {
                if graph.get(*declaration).kind() == DeclarationKind::NamedType {
                    graph.parent(*declaration)
                } else {
                    graph.declaring_type(*declaration)
                }
            }
        }
    }
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertPosition::Root { unit } => write!(f, "root of {}", unit),
            InsertPosition::Within { type_id, part } => write!(f, "within {} part {}", type_id, part),
            InsertPosition::After { declaration } => write!(f, "after {}", declaration),
        }
    }
}
