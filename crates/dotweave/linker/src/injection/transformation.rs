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

//! Transformation requests produced by the template engine

use crate::ordering::AspectLayerId;
use crate::symbols::{MemberModel, TypeModel};
use crate::syntax::ast::Block;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Named member flag, the serialised form of [`MemberFlags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberFlag {
    NotDiscardable,
    NotInlineable,
}

/// Classification bits of an introduced member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<MemberFlag>", into = "Vec<MemberFlag>")]
pub struct MemberFlags(u8);

impl MemberFlags {
    pub const NONE: MemberFlags = MemberFlags(0);
    /// Kept even when nothing references it
    pub const NOT_DISCARDABLE: MemberFlags = MemberFlags(1);
    /// Never spliced into a caller
    pub const NOT_INLINEABLE: MemberFlags = MemberFlags(1 << 1);

    pub fn contains(self, other: MemberFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MemberFlags {
    type Output = MemberFlags;

    fn bitor(self, rhs: MemberFlags) -> MemberFlags {
        MemberFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MemberFlags {
    fn bitor_assign(&mut self, rhs: MemberFlags) {
        self.0 |= rhs.0;
    }
}

impl From<MemberFlag> for MemberFlags {
    fn from(flag: MemberFlag) -> Self {
        match flag {
            MemberFlag::NotDiscardable => MemberFlags::NOT_DISCARDABLE,
            MemberFlag::NotInlineable => MemberFlags::NOT_INLINEABLE,
        }
    }
}

impl From<Vec<MemberFlag>> for MemberFlags {
    fn from(flags: Vec<MemberFlag>) -> Self {
        flags.into_iter().fold(MemberFlags::NONE, |acc, flag| acc | flag.into())
    }
}

impl From<MemberFlags> for Vec<MemberFlag> {
    fn from(flags: MemberFlags) -> Self {
        [MemberFlag::NotDiscardable, MemberFlag::NotInlineable]
            .into_iter()
            .filter(|&flag| flags.contains(flag.into()))
            .collect()
    }
}

impl fmt::Display for MemberFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<MemberFlag> = (*self).into();
        write!(f, "{:?}", names)
    }
}

/// Template of an override. Accessor templates left out forward to the previous layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberTemplate {
    Method {
        body: Block,
    },
    Property {
        #[serde(default)]
        getter: Option<Block>,
        #[serde(default)]
        setter: Option<Block>,
    },
    Event {
        #[serde(default)]
        add: Option<Block>,
        #[serde(default)]
        remove: Option<Block>,
    },
}

/// Which constructors an initializer runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializerKind {
    #[default]
    Instance,
    Static,
}

/// One transformation request, tagged with the layer that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformation {
    /// Override an existing member
    OverrideMember {
        layer: AspectLayerId,
        /// Key of the overridden declaration
        target: String,
        template: MemberTemplate,
        #[serde(default)]
        flags: MemberFlags,
    },
    /// Add a member to an existing type
    IntroduceMember {
        layer: AspectLayerId,
        /// Key of the receiving type
        container: String,
        member: MemberModel,
        #[serde(default)]
        flags: MemberFlags,
    },
    /// Add a type at the root of the introduced unit, or nested in `container`
    IntroduceType {
        layer: AspectLayerId,
        #[serde(default)]
        container: Option<String>,
        declaration: TypeModel,
    },
    /// Add an interface to the base list of a type
    IntroduceInterface {
        layer: AspectLayerId,
        target: String,
        interface: String,
    },
    /// Prepend statements to the constructors of a type
    AddInitializer {
        layer: AspectLayerId,
        target: String,
        #[serde(default)]
        initializer: InitializerKind,
        body: Block,
    },
}

impl Transformation {
    pub fn layer(&self) -> &AspectLayerId {
        match self {
            Transformation::OverrideMember { layer, .. }
            | Transformation::IntroduceMember { layer, .. }
            | Transformation::IntroduceType { layer, .. }
            | Transformation::IntroduceInterface { layer, .. }
            | Transformation::AddInitializer { layer, .. } => layer,
        }
    }

    /// Short name used in logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Transformation::OverrideMember { .. } => "override",
            Transformation::IntroduceMember { .. } => "introduce member",
            Transformation::IntroduceType { .. } => "introduce type",
            Transformation::IntroduceInterface { .. } => "introduce interface",
            Transformation::AddInitializer { .. } => "add initializer",
        }
    }
}
