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

//! # Dotweave linker
//!
//! Composes the transformations of ordered aspect layers over a compiled declaration graph and
//! emits the linked source units.
//!
//! A run goes through these stages:
//!
//! 1. **Adaptation**: the front-end [`CompilationModel`] becomes a [`SymbolGraph`]
//! 2. **Ordering**: aspect layers are sorted under the ordering constraints
//! 3. **Introduction**: every transformation is applied to an extension of the graph
//! 4. **Sorting**: introduced members are ordered within each insert position
//! 5. **Analysis**: aspect references are resolved, reachability and inlining computed
//! 6. **Linking**: units are emitted with references rewritten and chains inlined
//! 7. **Cleanup**: bodies are simplified
//!
//! ```no_run
//! use dotweave_linker::{AspectLinker, CancellationToken, LinkerConfig, LinkerInput};
//!
//! # fn run(input: LinkerInput) -> dotweave_linker::LinkerResult<()> {
//! let linker = AspectLinker::new(LinkerConfig::default())?;
//! let output = linker.link(&input, &CancellationToken::new())?;
//! for (path, text) in output.sources() {
//!     println!("// {}\n{}", path, text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cleanup;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod injection;
pub mod linking;
pub mod ordering;
pub mod pipeline;
pub mod symbols;
pub mod syntax;

pub use config::LinkerConfig;
pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode, Severity};
pub use error::{LinkerError, LinkerResult};
pub use injection::{InitializerKind, MemberFlags, MemberTemplate, Transformation};
pub use ordering::{AspectLayerId, LayerOrder, LayerSelector, OrderingConstraint};
pub use pipeline::{CancellationToken, LinkerStage, PipelineContext, PipelineMetrics};
pub use symbols::{CompilationModel, MemberModel, SymbolGraph, TypeModel};
pub use syntax::SyntaxUnit;

use analysis::AnalysisStep;
use cleanup::CleanupStep;
use injection::{IntroductionStep, SortStep};
use linking::LinkStep;
use ordering::OrderStep;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use symbols::AdaptStep;
use tracing::{debug, info, instrument};

/// Everything one linking run consumes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkerInput {
    pub compilation: CompilationModel,
    /// Layers in registration order; unordered layers are applied in this order
    pub layers: Vec<AspectLayerId>,
    #[serde(default)]
    pub ordering: Vec<OrderingConstraint>,
    #[serde(default)]
    pub transformations: Vec<Transformation>,
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkerOutput {
    pub units: Vec<SyntaxUnit>,
    /// Warnings, and errors that excluded declarations from the output
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: PipelineMetrics,
}

impl LinkerOutput {
    /// Each unit's path with its printed text
    pub fn sources(&self) -> Vec<(&str, String)> {
        self.units.iter().map(|unit| (unit.path.as_str(), unit.to_source())).collect()
    }

    pub fn unit(&self, path: &str) -> Option<&SyntaxUnit> {
        self.units.iter().find(|unit| unit.path == path)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Layer order computed without linking
#[derive(Debug, Clone)]
pub struct OrderingReport {
    pub order: LayerOrder,
    pub diagnostics: Vec<Diagnostic>,
}

/// Entry point of the linker
#[derive(Debug, Clone)]
pub struct AspectLinker {
    config: LinkerConfig,
}

impl AspectLinker {
    pub fn new(config: LinkerConfig) -> LinkerResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Run every stage over `input`. The token is checked before each stage.
    #[instrument(skip_all, fields(types = input.compilation.types.len(), transformations = input.transformations.len()))]
    pub fn link(&self, input: &LinkerInput, token: &CancellationToken) -> LinkerResult<LinkerOutput> {
        let start_time = Instant::now();
        let mut context = PipelineContext::new(self.config.clone());

        let graph = run_stage(&mut AdaptStep, input.compilation.clone(), &mut context, token)?;
        let order = run_stage(&mut OrderStep::new(&input.ordering), input.layers.clone(), &mut context, token)?;
        let introduction = run_stage(&mut IntroductionStep::new(&input.transformations), (graph, order), &mut context, token)?;
        let introduction = run_stage(&mut SortStep, introduction, &mut context, token)?;
        let analysis = run_stage(&mut AnalysisStep, introduction, &mut context, token)?;
        let units = run_stage(&mut LinkStep, analysis, &mut context, token)?;

        let mut cleanup = CleanupStep;
        let units = if cleanup.can_skip(&context.config) {
            debug!("Skipping stage: {}", cleanup.name());
            units
        } else {
            run_stage(&mut cleanup, units, &mut context, token)?
        };

        context.metrics.stage_times.insert("total".to_string(), start_time.elapsed());
        info!(
            "Linked {} units in {:.2}ms with {} diagnostics",
            units.len(),
            start_time.elapsed().as_secs_f64() * 1000.0,
            context.diagnostics.len()
        );
        Ok(LinkerOutput {
            units,
            diagnostics: context.diagnostics.into_vec(),
            metrics: context.metrics,
        })
    }

    /// Only order the layers of `input`
    pub fn order(&self, input: &LinkerInput) -> LinkerResult<OrderingReport> {
        let mut context = PipelineContext::new(self.config.clone());
        let order = run_stage(&mut OrderStep::new(&input.ordering), input.layers.clone(), &mut context, &CancellationToken::new())?;
        Ok(OrderingReport {
            order,
            diagnostics: context.diagnostics.into_vec(),
        })
    }

    /// Stage timings and rates of a finished run
    pub fn performance_report(output: &LinkerOutput) -> String {
        let mut report = String::new();
        report.push_str("=== Linking Performance Report ===\n\n");

        report.push_str("Stage Execution Times:\n");
        for (stage, duration) in &output.metrics.stage_times {
            report.push_str(&format!("  {}: {:.2}ms\n", stage, duration.as_secs_f64() * 1000.0));
        }

        report.push_str("\nProcessing Rates:\n");
        for stage in ["adaptation", "introduction", "analysis", "linking", "cleanup"] {
            if let Some(rate) = output.metrics.processing_rate(stage) {
                report.push_str(&format!("  {}: {:.2} items/sec\n", stage, rate));
            }
        }

        if !output.diagnostics.is_empty() {
            report.push_str("\nDiagnostics:\n");
            for diagnostic in &output.diagnostics {
                report.push_str(&format!("  - {}\n", diagnostic));
            }
        }
        report
    }
}

/// Execute a single stage with cancellation check and timing
fn run_stage<S: LinkerStage>(stage: &mut S, input: S::Input, context: &mut PipelineContext, token: &CancellationToken) -> LinkerResult<S::Output> {
    if token.is_cancelled() {
        info!("Cancelled before {}: {}", stage.name(), token.reason().unwrap_or_default());
        return Err(LinkerError::Cancelled {
            stage: stage.name().to_string(),
        });
    }

    let start_time = Instant::now();
    let output = stage.execute(input, context)?;
    context.record_stage_time(stage.name(), start_time.elapsed());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Parameter;
    use crate::syntax::ast::{Block, Expr, Statement};

    fn input() -> LinkerInput {
        let body = Block::new(vec![Statement::ret(Some(Expr::ident("x")))]);
        LinkerInput {
            compilation: CompilationModel::new(vec![
                TypeModel::class("Service", "Service.cs").with_member(MemberModel::method("Run", "int", vec![Parameter::new("x", "int")], body).public()),
            ]),
            layers: vec![AspectLayerId::new("A")],
            ordering: Vec::new(),
            transformations: Vec::new(),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = LinkerConfig::default().with_max_reachability_depth(0);
        assert!(matches!(AspectLinker::new(config), Err(LinkerError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_cancelled_token_stops_before_first_stage() {
        let linker = AspectLinker::new(LinkerConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel(Some("test"));
        match linker.link(&input(), &token) {
            Err(LinkerError::Cancelled { stage }) => assert_eq!(stage, "adaptation"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stage_times_are_recorded() {
        let linker = AspectLinker::new(LinkerConfig::default()).unwrap();
        let output = linker.link(&input(), &CancellationToken::new()).unwrap();
        for stage in ["adaptation", "ordering", "introduction", "sort", "analysis", "linking", "cleanup", "total"] {
            assert!(output.metrics.stage_times.contains_key(stage), "missing {}", stage);
        }
        assert!(AspectLinker::performance_report(&output).contains("linking"));
    }

    #[test]
    fn test_debug_config_skips_cleanup() {
        let linker = AspectLinker::new(LinkerConfig::debug()).unwrap();
        let output = linker.link(&input(), &CancellationToken::new()).unwrap();
        assert!(!output.metrics.stage_times.contains_key("cleanup"));
    }
}
