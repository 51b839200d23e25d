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

//! Error taxonomy for the aspect linker
//!
//! User-facing problems travel as [`Diagnostic`](crate::diagnostics::Diagnostic)s. The variants
//! here are reserved for conditions that stop a run: fatal diagnostics raised before analysis,
//! cancellation, bad configuration, and broken invariants.

use crate::diagnostics::Diagnostic;
use thiserror::Error;

/// Result type used throughout the linker
pub type LinkerResult<T> = Result<T, LinkerError>;

/// Errors that can abort a linking run
#[derive(Error, Debug)]
pub enum LinkerError {
    // Configuration Errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Front-end Model Errors
    #[error("Invalid compilation model: {0}")]
    InvalidModel(String),

    #[error("Unresolved declaration: {0}")]
    UnresolvedDeclaration(String),

    // Ordering Errors
    #[error("Cyclic aspect ordering constraints between layers: {}", members.join(", "))]
    OrderingCycle { members: Vec<String> },

    // Stage Errors
    #[error("Linking aborted during {stage}: {} error(s) reported", diagnostics.len())]
    Aborted { stage: String, diagnostics: Vec<Diagnostic> },

    #[error("Linking cancelled before {stage}")]
    Cancelled { stage: String },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal Errors
    #[error("Assertion failed: {condition} - {context}")]
    AssertionFailed { condition: String, context: String },
}

impl LinkerError {
    /// Create an assertion failure for a broken invariant
    pub fn assertion_failed(condition: impl Into<String>, context: impl Into<String>) -> Self {
        Self::AssertionFailed {
            condition: condition.into(),
            context: context.into(),
        }
    }

    /// Create an invalid model error
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel(message.into())
    }

    /// Check if this error came from user input rather than a broken precondition
    pub fn is_recoverable(&self) -> bool {
        match self {
            LinkerError::InvalidConfiguration(_)
            | LinkerError::InvalidModel(_)
            | LinkerError::UnresolvedDeclaration(_)
            | LinkerError::OrderingCycle { .. }
            | LinkerError::Aborted { .. }
            | LinkerError::Cancelled { .. }
            | LinkerError::Serialization(_) => true,
            LinkerError::AssertionFailed { .. } => false,
        }
    }

    /// Diagnostics carried by the error, if any
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            LinkerError::Aborted { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostic, DiagnosticCode};

    #[test]
    fn test_assertion_failures_are_not_recoverable() {
        let error = LinkerError::assertion_failed("depth <= 100", "reachability");
        assert!(!error.is_recoverable());
        assert_eq!(error.to_string(), "Assertion failed: depth <= 100 - reachability");
    }

    #[test]
    fn test_aborted_exposes_diagnostics() {
        let diagnostic = Diagnostic::error(DiagnosticCode::UnknownTarget, "no such member", None);
        let error = LinkerError::Aborted {
            stage: "introduction".to_string(),
            diagnostics: vec![diagnostic],
        };
        assert!(error.is_recoverable());
        assert_eq!(error.diagnostics().len(), 1);
        assert!(error.to_string().contains("introduction"));
    }

    #[test]
    fn test_cycle_message_lists_members() {
        let error = LinkerError::OrderingCycle {
            members: vec!["Logging".to_string(), "Caching".to_string()],
        };
        assert_eq!(error.to_string(), "Cyclic aspect ordering constraints between layers: Logging, Caching");
    }
}
