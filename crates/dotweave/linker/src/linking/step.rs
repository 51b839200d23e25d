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

//! Linking step

use super::rewriter::UnitEmitter;
use crate::analysis::AnalysisRegistry;
use crate::error::LinkerResult;
use crate::pipeline::{LinkerStage, PipelineContext};
use crate::syntax::SyntaxUnit;
use metrics::counter;
use tracing::info;

/// Emits the linked syntax units from the analysed intermediate graph
pub struct LinkStep;

impl LinkerStage for LinkStep {
    type Input = AnalysisRegistry;
    type Output = Vec<SyntaxUnit>;

    fn execute(&mut self, analysis: Self::Input, context: &mut PipelineContext) -> LinkerResult<Self::Output> {
        let units = UnitEmitter::new(&analysis).emit()?;

        let members: usize = units.iter().flat_map(|unit| &unit.types).map(|t| t.members.len()).sum();
        counter!("dotweave_emitted_units", units.len() as u64);
        context.metrics.record_processed_items(self.name(), members);
        info!("Linked {} units with {} top-level members", units.len(), members);
        Ok(units)
    }

    fn name(&self) -> &'static str {
        "linking"
    }
}
