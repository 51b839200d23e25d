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

//! Introduction of aspect-produced members
//!
//! Transformations are applied in layer order to an extension of the source graph. Every
//! declaration they add is recorded in the [`IntroductionRegistry`], which is frozen before the
//! analysis stage reads it.

pub mod comparer;
pub mod insert_position;
pub mod introduced_member;
pub mod registry;
pub mod step;
pub mod transformation;

pub use comparer::{IntroducedMemberComparer, SortStep};
pub use insert_position::InsertPosition;
pub use introduced_member::{IntroducedMember, IntroductionCategory, LinkerNodeId};
pub use registry::{InitializerAddition, InterfaceAddition, IntroductionRegistry};
pub use step::{IntroductionResult, IntroductionStep};
pub use transformation::{InitializerKind, MemberFlag, MemberFlags, MemberTemplate, Transformation};
