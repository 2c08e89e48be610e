use oxdom::TextPosition;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::fmt;

/// Severity level of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "lowercase"))]
pub enum Severity {
    /// Violation severity (most severe).
    #[default]
    Violation,
    /// Warning severity.
    Warning,
    /// Info severity (least severe).
    Info,
}

impl Severity {
    /// Maps a Schematron `role` to a severity, unknown roles being violations.
    pub fn from_role(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "warning" | "warn" => Self::Warning,
            "info" | "information" => Self::Info,
            _ => Self::Violation,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Violation => write!(f, "Violation"),
            Self::Warning => write!(f, "Warning"),
            Self::Info => write!(f, "Info"),
        }
    }
}

/// Which validation layer produced a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "snake_case"))]
pub enum DiagnosticKind {
    /// The fragment does not follow the structural grammar.
    StructuralViolation,
    /// A rule assertion failed or a rule report fired.
    RuleAssertionFailure,
}

impl DiagnosticKind {
    /// The source tag: `structural` or `rule`.
    pub fn source(self) -> &'static str {
        match self {
            Self::StructuralViolation => "structural",
            Self::RuleAssertionFailure => "rule",
        }
    }
}

/// Where a [`Diagnostic`] applies in the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Location {
    path: String,
    line: Option<u64>,
    column: Option<u64>,
}

impl Location {
    pub fn new(path: impl Into<String>, position: Option<TextPosition>) -> Self {
        Self {
            path: path.into(),
            line: position.map(|p| p.line),
            column: position.map(|p| p.column),
        }
    }

    /// The node path, like `/body[1]/p[2]`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn position(&self) -> Option<TextPosition> {
        Some(TextPosition {
            line: self.line?,
            column: self.column?,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A single structural or rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Diagnostic {
    kind: DiagnosticKind,
    severity: Severity,
    message: String,
    location: Location,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        severity: Severity,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            location,
        }
    }

    #[inline]
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// The outcome of a validation request, built by [`aggregate`](crate::aggregate).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ValidationResult {
    valid: bool,
    diagnostics: Vec<Diagnostic>,
    explanation: String,
}

impl ValidationResult {
    pub(crate) fn new(valid: bool, diagnostics: Vec<Diagnostic>, explanation: String) -> Self {
        Self {
            valid,
            diagnostics,
            explanation,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Structural diagnostics first, then rule diagnostics, each in discovery order.
    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// A summary of the outcome.
    #[inline]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// The diagnostics rendered as `{location}: {message}` lines.
    pub fn error_lines(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explanation)?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::RuleAssertionFailure,
            Severity::Warning,
            "no head",
            Location::new("/div[1]", Some(TextPosition { line: 2, column: 5 })),
        );
        assert_eq!(diagnostic.to_string(), "/div[1]: no head");
        assert_eq!(diagnostic.kind().source(), "rule");
        assert_eq!(
            diagnostic.location().position(),
            Some(TextPosition { line: 2, column: 5 })
        );
    }

    #[test]
    fn roles() {
        assert_eq!(Severity::from_role("error"), Severity::Violation);
        assert_eq!(Severity::from_role("fatal"), Severity::Violation);
        assert_eq!(Severity::from_role("Warning"), Severity::Warning);
        assert_eq!(Severity::from_role("info"), Severity::Info);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_serde() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::StructuralViolation,
            Severity::Violation,
            "text not allowed here",
            Location::new("/p[1]/text()[1]", None),
        );
        assert_eq!(
            serde_json::to_string(&diagnostic).unwrap(),
            r#"{"kind":"structural_violation","severity":"violation","message":"text not allowed here","location":{"path":"/p[1]/text()[1]","line":null,"column":null}}"#
        );
    }
}
