use crate::diagnostic::{Diagnostic, DiagnosticKind, Location, Severity};
use oxdom::Document;
use oxrng::{Grammar, StructuralValidator};

/// The outcome of [`check_structure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralCheck {
    diagnostics: Vec<Diagnostic>,
}

impl StructuralCheck {
    pub(crate) fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// `true` iff no structural diagnostic was produced.
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Matches a parsed fragment against a grammar, usually one re-anchored with [`oxrng::rewrite`].
///
/// Each mismatch becomes one [`DiagnosticKind::StructuralViolation`] located at the offending node.
pub fn check_structure(fragment: &Document, grammar: &Grammar) -> StructuralCheck {
    let report = StructuralValidator::new(grammar).validate(fragment);
    StructuralCheck::new(
        report
            .into_violations()
            .into_iter()
            .map(|violation| {
                Diagnostic::new(
                    DiagnosticKind::StructuralViolation,
                    Severity::Violation,
                    violation.message(),
                    Location::new(violation.path(), Some(violation.position())),
                )
            })
            .collect(),
    )
}
