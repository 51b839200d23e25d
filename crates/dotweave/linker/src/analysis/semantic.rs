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

//! Intermediate symbol semantics: the versions of a declaration during composition

use crate::symbols::DeclId;
use std::fmt;

/// Which version of a declaration's behaviour a semantic stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SemanticKind {
    /// Body written in the source
    Original,
    /// Body of an override or of a new member
    Default,
    /// Fully composed behaviour, dispatching to the last override
    Final,
}

impl fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticKind::Original => "original",
            SemanticKind::Default => "default",
            SemanticKind::Final => "final",
        };
        f.write_str(name)
    }
}

/// A (declaration, kind) pair. Methods and accessors carry bodies; property and event
/// semantics stand for all of their accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntermediateSymbolSemantic {
    pub symbol: DeclId,
    pub kind: SemanticKind,
}

impl IntermediateSymbolSemantic {
    pub fn new(symbol: DeclId, kind: SemanticKind) -> Self {
        Self { symbol, kind }
    }

    pub fn original(symbol: DeclId) -> Self {
        Self::new(symbol, SemanticKind::Original)
    }

    pub fn default_of(symbol: DeclId) -> Self {
        Self::new(symbol, SemanticKind::Default)
    }

    pub fn final_of(symbol: DeclId) -> Self {
        Self::new(symbol, SemanticKind::Final)
    }

    /// Same kind on another declaration
    pub fn with_symbol(self, symbol: DeclId) -> Self {
        Self { symbol, kind: self.kind }
    }

    pub fn is_final(self) -> bool {
        self.kind == SemanticKind::Final
    }
}

impl fmt::Display for IntermediateSymbolSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.kind)
    }
}
