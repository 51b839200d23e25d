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

//! Argument parsing and command dispatch

pub mod link;
pub mod order;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotweave_linker::LinkerInput;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub use link::LinkArgs;

#[derive(Parser, Debug)]
#[command(name = "dotweave", version, about = "Aspect linker: composes layered transformations into linked source")]
pub struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Link a compilation and write the resulting units
    Link(LinkArgs),

    /// Print the order in which the aspect layers are applied
    Order {
        /// Linker input (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// Install the global subscriber; `RUST_LOG` wins over `--verbose`
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Run a parsed command. `Ok(false)` means the run finished but reported errors.
pub fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Link(args) => link::handle_link(&args),
        Commands::Order { input } => order::handle_order(&input),
    }
}

pub(crate) fn load_input(path: &Path) -> Result<LinkerInput> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let input: LinkerInput = serde_json::from_str(&text).with_context(|| format!("{} is not a valid linker input", path.display()))?;
    debug!(
        "Loaded {} types, {} layers, {} transformations from {}",
        input.compilation.types.len(),
        input.layers.len(),
        input.transformations.len(),
        path.display()
    );
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_flags_parse() {
        let cli = Cli::parse_from(["dotweave", "link", "--input", "in.json", "--no-inline", "--strict", "--max-depth", "12", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Link(args) => {
                assert_eq!(args.input, PathBuf::from("in.json"));
                assert!(args.no_inline && args.strict);
                assert_eq!(args.max_depth, Some(12));
                assert!(args.output_dir.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_order_requires_input() {
        assert!(Cli::try_parse_from(["dotweave", "order"]).is_err());
    }
}
