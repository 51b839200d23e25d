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

//! The stage abstraction every pass step implements

use super::context::PipelineContext;
use crate::config::LinkerConfig;
use crate::error::LinkerResult;

/// Trait for pipeline stages
pub trait LinkerStage {
    /// The input type for this stage
    type Input;
    /// The output type for this stage
    type Output;

    /// Execute this pipeline stage
    fn execute(&mut self, input: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output>;

    /// Get the name of this stage for debugging
    fn name(&self) -> &'static str;

    /// Check if this stage can be skipped based on configuration
    fn can_skip(&self, _config: &LinkerConfig) -> bool {
        false
    }
}
