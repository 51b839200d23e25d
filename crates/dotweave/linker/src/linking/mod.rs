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

//! Linking: rewriting the intermediate graph into output syntax
//!
//! Every aspect reference is replaced by an access to the emitted member holding its semantic,
//! override chains collapse into the overridden member where inlining allows, and the result is
//! laid out per source file.

pub mod body;
pub mod inliner;
pub mod rewriter;
pub mod step;

pub use body::{BodyLinker, BodyOwner};
pub use inliner::InliningScope;
pub use rewriter::UnitEmitter;
pub use step::LinkStep;
