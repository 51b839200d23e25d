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

//! Diagnostic stream reported to the caller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Stable diagnostic identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Two layers without a relative order transform the same declaration
    UnorderedLayers,
    /// The explicit ordering constraints form a cycle
    OrderingCycle,
    /// An aspect reference is invoked on something other than `this`
    InvalidReferenceReceiver,
    /// A transformation targets a declaration that does not exist
    UnknownTarget,
    /// Two introductions produce the same member in one type
    ConflictingIntroduction,
    /// A transformation targets a declaration kind that cannot be overridden
    UnsupportedOverrideTarget,
    /// An aspect reference names a declaration outside the overridden member's type
    InvalidReferenceTarget,
    /// An ordering constraint names a layer that was never registered
    UnknownLayer,
}

impl DiagnosticCode {
    /// Textual identifier, e.g. `LINK0003`
    pub fn id(self) -> &'static str {
        match self {
            DiagnosticCode::UnorderedLayers => "LINK0001",
            DiagnosticCode::OrderingCycle => "LINK0002",
            DiagnosticCode::InvalidReferenceReceiver => "LINK0003",
            DiagnosticCode::UnknownTarget => "LINK0004",
            DiagnosticCode::ConflictingIntroduction => "LINK0005",
            DiagnosticCode::UnsupportedOverrideTarget => "LINK0006",
            DiagnosticCode::InvalidReferenceTarget => "LINK0007",
            DiagnosticCode::UnknownLayer => "LINK0008",
        }
    }
}

/// A single user-facing diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    /// Structural key of the declaration the diagnostic is about
    pub declaration: Option<String>,
}

impl Diagnostic {
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, declaration: Option<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            declaration,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, declaration: Option<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            declaration,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.declaration {
            Some(declaration) => write!(f, "{} {}: {} [{}]", severity, self.code.id(), self.message, declaration),
            None => write!(f, "{} {}: {}", severity, self.code.id(), self.message),
        }
    }
}

/// Ordered collection of diagnostics produced during one run
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Errors reported since the bag held `mark` entries
    pub fn errors_since(&self, mark: usize) -> Vec<Diagnostic> {
        self.diagnostics.iter().skip(mark).filter(|d| d.is_error()).cloned().collect()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_declaration() {
        let diagnostic = Diagnostic::error(DiagnosticCode::InvalidReferenceReceiver, "receiver must be `this`", Some("C.Foo()".to_string()));
        assert_eq!(diagnostic.to_string(), "error LINK0003: receiver must be `this` [C.Foo()]");
    }

    #[test]
    fn test_bag_counts_errors() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::warning(DiagnosticCode::UnorderedLayers, "unordered", None));
        assert!(!bag.has_errors());
        let mark = bag.len();
        bag.push(Diagnostic::error(DiagnosticCode::UnknownTarget, "missing", None));
        assert!(bag.has_errors());
        assert_eq!(bag.error_count(), 1);
        assert_eq!(bag.errors_since(mark).len(), 1);
        assert_eq!(bag.errors_since(bag.len()).len(), 0);
    }
}
