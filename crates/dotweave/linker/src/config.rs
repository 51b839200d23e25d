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

//! Configuration for a linking run

use crate::error::{LinkerError, LinkerResult};
use serde::{Deserialize, Serialize};

/// Configuration for the aspect linker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Depth at which the reachability search gives up and reports a broken invariant
    pub max_reachability_depth: usize,

    /// Whether single-use semantics are spliced into their caller
    pub enable_inlining: bool,

    /// Whether colliding unordered layers are an error instead of a warning
    pub strict_layer_ordering: bool,

    /// Whether the cleanup pass runs over linked bodies
    pub run_cleanup: bool,

    /// Path of the unit that receives top-level introduced types
    pub introduced_unit_path: String,

    /// Suffix appended to the name of an emitted original body
    pub source_member_suffix: String,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            max_reachability_depth: 100,
            enable_inlining: true,
            strict_layer_ordering: false,
            run_cleanup: true,
            introduced_unit_path: "Introduced.g.cs".to_string(),
            source_member_suffix: "Source".to_string(),
        }
    }
}

impl LinkerConfig {
    /// Configuration that keeps every reachable semantic as its own member
    pub fn debug() -> Self {
        Self {
            enable_inlining: false,
            run_cleanup: false,
            ..Default::default()
        }
    }

    /// Configuration that refuses to guess an order between colliding layers
    pub fn strict() -> Self {
        Self {
            strict_layer_ordering: true,
            ..Default::default()
        }
    }

    pub fn with_inlining(mut self, enable: bool) -> Self {
        self.enable_inlining = enable;
        self
    }

    pub fn with_strict_layer_ordering(mut self, strict: bool) -> Self {
        self.strict_layer_ordering = strict;
        self
    }

    pub fn with_max_reachability_depth(mut self, depth: usize) -> Self {
        self.max_reachability_depth = depth;
        self
    }

    pub fn with_cleanup(mut self, enable: bool) -> Self {
        self.run_cleanup = enable;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> LinkerResult<()> {
        if self.max_reachability_depth == 0 {
            return Err(LinkerError::InvalidConfiguration("max_reachability_depth must be greater than 0".to_string()));
        }

        if self.introduced_unit_path.trim().is_empty() {
            return Err(LinkerError::InvalidConfiguration("introduced_unit_path must not be empty".to_string()));
        }

        if self.source_member_suffix.is_empty() || !self.source_member_suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LinkerError::InvalidConfiguration(format!(
                "source_member_suffix `{}` is not a valid identifier fragment",
                self.source_member_suffix
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LinkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_reachability_depth, 100);
        assert!(config.enable_inlining);
    }

    #[test]
    fn test_presets() {
        assert!(!LinkerConfig::debug().enable_inlining);
        assert!(LinkerConfig::strict().strict_layer_ordering);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LinkerConfig::default().with_max_reachability_depth(0).validate().is_err());

        let config = LinkerConfig {
            source_member_suffix: "Not Valid".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LinkerConfig = serde_json::from_str(r#"{ "enable_inlining": false }"#).unwrap();
        assert!(!config.enable_inlining);
        assert_eq!(config.max_reachability_depth, 100);
    }
}
