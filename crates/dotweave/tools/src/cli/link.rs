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

//! `dotweave link`

use super::load_input;
use anyhow::{Context, Result};
use clap::Args;
use dotweave_linker::{AspectLinker, CancellationToken, Diagnostic, LinkerConfig, LinkerOutput, PipelineMetrics};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Linker input (JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving one file per linked unit; units are printed to stdout without it
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print units, diagnostics and metrics as JSON
    #[arg(long)]
    pub json: bool,

    /// Emit every reachable layer as its own member
    #[arg(long)]
    pub no_inline: bool,

    /// Treat unordered layers on one declaration as an error
    #[arg(long)]
    pub strict: bool,

    /// Leave flattenable blocks and unused labels in place
    #[arg(long)]
    pub no_cleanup: bool,

    /// Depth limit of the reachability search
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Print stage timings to stderr
    #[arg(long)]
    pub report: bool,

    /// Abandon the run at the next stage boundary after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl LinkArgs {
    pub fn config(&self) -> LinkerConfig {
        let mut config = LinkerConfig::default()
            .with_inlining(!self.no_inline)
            .with_strict_layer_ordering(self.strict)
            .with_cleanup(!self.no_cleanup);
        if let Some(depth) = self.max_depth {
            config = config.with_max_reachability_depth(depth);
        }
        config
    }

    pub fn token(&self) -> CancellationToken {
        self.timeout
            .map(|seconds| CancellationToken::with_timeout(Duration::from_secs(seconds)))
            .unwrap_or_default()
    }
}

#[derive(Serialize)]
struct JsonUnit<'a> {
    path: &'a str,
    source: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    units: Vec<JsonUnit<'a>>,
    diagnostics: &'a [Diagnostic],
    metrics: &'a PipelineMetrics,
}

/// Link the input. Returns `false` when errors were reported for some declarations.
pub fn handle_link(args: &LinkArgs) -> Result<bool> {
    let input = load_input(&args.input)?;
    let linker = AspectLinker::new(args.config())?;
    let output = linker.link(&input, &args.token())?;

    for diagnostic in &output.diagnostics {
        eprintln!("{}", diagnostic);
    }
    if args.report {
        eprintln!("{}", AspectLinker::performance_report(&output));
    }

    if let Some(dir) = &args.output_dir {
        let written = write_units(&output, dir)?;
        info!("Wrote {} units to {}", written, dir.display());
    }
    if args.json {
        println!("{}", render_json(&output)?);
    } else if args.output_dir.is_none() {
        for (path, source) in output.sources() {
            println!("// {}\n{}", path, source);
        }
    }
    Ok(!output.has_errors())
}

/// Write each unit under `dir`, creating parent directories of nested unit paths
pub fn write_units(output: &LinkerOutput, dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    output
        .sources()
        .into_par_iter()
        .map(|(path, source)| {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(&target, source).with_context(|| format!("failed to write {}", target.display()))
        })
        .collect::<Result<Vec<()>>>()
        .map(|written| written.len())
}

pub fn render_json(output: &LinkerOutput) -> Result<String> {
    let report = JsonReport {
        units: output.sources().into_iter().map(|(path, source)| JsonUnit { path, source }).collect(),
        diagnostics: &output.diagnostics,
        metrics: &output.metrics,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> LinkArgs {
        LinkArgs {
            input: PathBuf::from("in.json"),
            output_dir: None,
            json: false,
            no_inline: false,
            strict: false,
            no_cleanup: false,
            max_depth: None,
            report: false,
            timeout: None,
        }
    }

    #[test]
    fn test_flags_map_to_config() {
        assert_eq!(args().config(), LinkerConfig::default());

        let config = LinkArgs {
            no_inline: true,
            strict: true,
            max_depth: Some(7),
            ..args()
        }
        .config();
        assert!(!config.enable_inlining);
        assert!(config.strict_layer_ordering);
        assert_eq!(config.max_reachability_depth, 7);
    }

    #[test]
    fn test_timeout_cancels_token() {
        assert!(!args().token().is_cancelled());

        let token = LinkArgs { timeout: Some(0), ..args() }.token();
        std::thread::sleep(Duration::from_millis(2));
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("Timeout"));
    }
}
