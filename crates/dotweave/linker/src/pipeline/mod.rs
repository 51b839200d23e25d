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

//! Pipeline architecture for linking
//!
//! A pass runs as a fixed sequence of stages: adaptation, ordering, introduction, sorting,
//! analysis, linking and cleanup. Each stage consumes the previous stage's output.

pub mod cancellation;
pub mod context;
pub mod stage;

pub use cancellation::CancellationToken;
pub use context::{PipelineContext, PipelineMetrics};
pub use stage::LinkerStage;
