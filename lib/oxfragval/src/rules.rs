use crate::diagnostic::{Diagnostic, DiagnosticKind, Location, Severity};
use oxdom::Document;
use oxschematron::Schema;

/// Evaluates the rule grammar on a parsed fragment, whatever its anchor.
///
/// Each failed assertion and each fired report becomes one
/// [`DiagnosticKind::RuleAssertionFailure`], its severity given by the check `role`.
pub fn check_rules(fragment: &Document, rules: &Schema) -> Vec<Diagnostic> {
    rules
        .validate(fragment)
        .into_failures()
        .into_iter()
        .map(|failure| {
            Diagnostic::new(
                DiagnosticKind::RuleAssertionFailure,
                failure.role().map_or(Severity::Violation, Severity::from_role),
                failure.message(),
                Location::new(failure.path(), Some(failure.position())),
            )
        })
        .collect()
}
