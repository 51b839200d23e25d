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

//! State shared by the stages of one linking pass

use crate::config::LinkerConfig;
use crate::diagnostics::DiagnosticBag;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Pipeline context for sharing data between stages
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: LinkerConfig,
    /// Diagnostics reported by every stage so far
    pub diagnostics: DiagnosticBag,
    pub metrics: PipelineMetrics,
}

impl PipelineContext {
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            config,
            diagnostics: DiagnosticBag::new(),
            metrics: PipelineMetrics::default(),
        }
    }

    /// Record stage execution time
    pub fn record_stage_time(&mut self, stage: &str, duration: Duration) {
        histogram!("dotweave_stage_seconds", duration.as_secs_f64(), "stage" => stage.to_string());
        self.metrics.stage_times.insert(stage.to_string(), duration);
    }

    pub fn total_time(&self) -> Duration {
        self.metrics.stage_times.values().sum()
    }
}

/// Performance metrics of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Execution time for each stage
    pub stage_times: BTreeMap<String, Duration>,
    /// Number of processed items per stage
    pub processed_items: BTreeMap<String, usize>,
}

impl PipelineMetrics {
    pub fn record_processed_items(&mut self, stage: &str, count: usize) {
        counter!("dotweave_processed_items", count as u64, "stage" => stage.to_string());
        self.processed_items.insert(stage.to_string(), count);
    }

    /// Items per second for a stage
    pub fn processing_rate(&self, stage: &str) -> Option<f64> {
        let items = self.processed_items.get(stage)?;
        let time = self.stage_times.get(stage)?;

        if time.as_secs_f64() > 0.0 { Some(*items as f64 / time.as_secs_f64()) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_rate() {
        let mut context = PipelineContext::new(LinkerConfig::default());
        context.record_stage_time("analysis", Duration::from_millis(500));
        context.metrics.record_processed_items("analysis", 10);
        assert_eq!(context.metrics.processing_rate("analysis"), Some(20.0));
        assert_eq!(context.metrics.processing_rate("linking"), None);
        assert_eq!(context.total_time(), Duration::from_millis(500));
    }
}
