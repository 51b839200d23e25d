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

//! `dotweave order`

use super::load_input;
use anyhow::Result;
use dotweave_linker::{AspectLinker, LayerOrder, LinkerConfig};
use std::path::Path;

/// Print the layer order of the input and the layer pairs no constraint orders
pub fn handle_order(path: &Path) -> Result<bool> {
    let input = load_input(path)?;
    let report = AspectLinker::new(LinkerConfig::default())?.order(&input)?;
    for diagnostic in &report.diagnostics {
        eprintln!("{}", diagnostic);
    }
    print!("{}", render_order(&report.order));
    Ok(!report.diagnostics.iter().any(|d| d.is_error()))
}

pub fn render_order(order: &LayerOrder) -> String {
    let mut text = String::new();
    for (index, layer) in order.layers().iter().enumerate() {
        text.push_str(&format!("{:>3}. {}\n", index + 1, layer));
    }
    let unordered = order.unordered_pairs();
    if !unordered.is_empty() {
        text.push_str("\nUnordered (registration order applies):\n");
        for (a, b) in unordered {
            text.push_str(&format!("  {} / {}\n", a, b));
        }
    }
    text
}
