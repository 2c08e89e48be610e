use crate::diagnostic::{Diagnostic, ValidationResult};
use crate::structural::StructuralCheck;

/// The explanation of a valid result.
pub const VALID_EXPLANATION: &str = "the fragment is valid";

/// Merges the outcomes of both validation layers.
///
/// The result is valid iff the structural check is and there is no rule diagnostic.
/// Structural diagnostics come first.
///
/// ```
/// use oxfragval::{StructuralCheck, aggregate};
///
/// let result = aggregate(StructuralCheck::default(), Vec::new());
/// assert!(result.is_valid());
/// assert_eq!(result.explanation(), "the fragment is valid");
/// ```
pub fn aggregate(structural: StructuralCheck, rules: Vec<Diagnostic>) -> ValidationResult {
    let valid = structural.is_valid() && rules.is_empty();
    let structural = structural.into_diagnostics();
    let explanation = if valid {
        VALID_EXPLANATION.into()
    } else {
        let mut parts = Vec::new();
        if !structural.is_empty() {
            parts.push(count(structural.len(), "structural violation"));
        }
        if !rules.is_empty() {
            parts.push(count(rules.len(), "rule assertion failure"));
        }
        format!("the fragment is invalid: {}", parts.join(" and "))
    };
    let mut diagnostics = structural;
    diagnostics.extend(rules);
    ValidationResult::new(valid, diagnostics, explanation)
}

fn count(n: usize, what: &str) -> String {
    if n == 1 {
        format!("1 {what}")
    } else {
        format!("{n} {what}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{DiagnosticKind, Location, Severity};

    fn diagnostic(kind: DiagnosticKind, path: &str) -> Diagnostic {
        Diagnostic::new(kind, Severity::Violation, "m", Location::new(path, None))
    }

    #[test]
    fn ordering_and_explanation() {
        let structural =
            StructuralCheck::new(vec![diagnostic(DiagnosticKind::StructuralViolation, "/b")]);
        let rules = vec![
            diagnostic(DiagnosticKind::RuleAssertionFailure, "/a"),
            diagnostic(DiagnosticKind::RuleAssertionFailure, "/c"),
        ];
        let result = aggregate(structural, rules);
        assert!(!result.is_valid());
        assert_eq!(result.error_lines(), ["/b: m", "/a: m", "/c: m"]);
        assert_eq!(
            result.explanation(),
            "the fragment is invalid: 1 structural violation and 2 rule assertion failures"
        );
    }

    #[test]
    fn rule_failures_alone_invalidate() {
        let result = aggregate(
            StructuralCheck::default(),
            vec![diagnostic(DiagnosticKind::RuleAssertionFailure, "/a")],
        );
        assert!(!result.is_valid());
        assert_eq!(
            result.explanation(),
            "the fragment is invalid: 1 rule assertion failure"
        );
    }
}
