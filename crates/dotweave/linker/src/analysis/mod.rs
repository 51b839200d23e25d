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

//! Analysis of the intermediate graph
//!
//! Every aspect reference is resolved to the [`IntermediateSymbolSemantic`] it observes. The
//! reachability analysis then finds the semantics that must exist in the output, and the inlining
//! analysis picks those that can be spliced into their only caller.

pub mod inlining;
pub mod reachability;
pub mod references;
pub mod semantic;
pub mod step;

pub use inlining::{InliningAnalyzer, InliningSite, SitePattern};
pub use reachability::{ReachabilityAnalyzer, last_override_of};
pub use references::{AspectReferenceResolver, ReferenceContext, ReferenceResolution, ResolvedReference, ResolvedTarget};
pub use semantic::{IntermediateSymbolSemantic, SemanticKind};
pub use step::{AnalysisRegistry, AnalysisStep};
