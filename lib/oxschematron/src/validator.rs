use crate::eval::{Evaluator, Variables};
use crate::schema::{Check, CheckKind, MessagePart, Schema, Variable, normalize_space};
use oxdom::{Document, Name, NodeId, NodeRef, TextPosition};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::fmt;
use tracing::trace;

/// A failed `assert` or a fired `report`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    kind: CheckKind,
    message: String,
    path: String,
    position: TextPosition,
    test: String,
    id: Option<String>,
    role: Option<String>,
    pattern: Option<String>,
}

impl RuleFailure {
    #[inline]
    pub fn kind(&self) -> CheckKind {
        self.kind
    }

    /// The message of the check with its `name` and `value-of` parts evaluated.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The path of the node the rule was fired on.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn position(&self) -> TextPosition {
        self.position
    }

    /// The XPath test of the check.
    #[inline]
    pub fn test(&self) -> &str {
        &self.test
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The `role` of the check, or of its rule.
    #[inline]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// The `id` of the pattern that contains the check.
    #[inline]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The outcome of [`Schema::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    failures: Vec<RuleFailure>,
}

impl RuleReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures, pattern by pattern, in document order within each pattern.
    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<RuleFailure> {
        self.failures
    }
}

impl Schema {
    /// Evaluates every pattern of the schema on the document.
    ///
    /// Within a pattern each node is checked by the first rule whose context matches it.
    pub fn validate(&self, document: &Document) -> RuleReport {
        let root = document.root();
        let mut variables = Variables::default();
        bind(&self.lets, document, root, &mut variables);
        let mut failures = Vec::new();
        for pattern in &self.patterns {
            let mut pattern_variables = variables.clone();
            bind(&pattern.lets, document, root, &mut pattern_variables);
            let evaluator = Evaluator::new(document, &pattern_variables);
            let mut fired = FxHashMap::<NodeId, usize>::default();
            for (i, rule) in pattern.rules.iter().enumerate() {
                for node in evaluator.select(&rule.context, root) {
                    fired.entry(node).or_insert(i);
                }
            }
            let mut fired: Vec<_> = fired.into_iter().collect();
            fired.sort_unstable();
            for (node, rule) in fired {
                let Some(rule) = pattern.rules.get(rule) else {
                    continue;
                };
                let node = document.node(node);
                trace!("Rule fired on {}", node.path());
                let variables = if rule.lets.is_empty() {
                    Cow::Borrowed(&pattern_variables)
                } else {
                    let mut variables = pattern_variables.clone();
                    bind(&rule.lets, document, node, &mut variables);
                    Cow::Owned(variables)
                };
                let evaluator = Evaluator::new(document, &variables);
                for check in &rule.checks {
                    if evaluator.boolean(&check.test, node) == (check.kind == CheckKind::Report) {
                        failures.push(failure(check, &evaluator, node, pattern.id.as_deref()));
                    }
                }
            }
        }
        RuleReport { failures }
    }
}

fn bind(lets: &[Variable], document: &Document, node: NodeRef<'_>, variables: &mut Variables) {
    for variable in lets {
        let value = Evaluator::new(document, variables).evaluate(&variable.value, node);
        variables.insert(variable.name.clone(), value);
    }
}

fn failure<'d>(
    check: &Check,
    evaluator: &Evaluator<'d, '_>,
    node: NodeRef<'d>,
    pattern: Option<&str>,
) -> RuleFailure {
    let mut message = String::new();
    for part in &check.message {
        match part {
            MessagePart::Text(text) => message.push_str(text),
            MessagePart::Name(path) => {
                let named = match path {
                    Some(path) => evaluator
                        .select(path, node)
                        .first()
                        .map(|id| node.document().node(*id)),
                    None => Some(node),
                };
                if let Some(name) = named.and_then(NodeRef::name) {
                    message.push_str(&Name::qualified(name));
                }
            }
            MessagePart::ValueOf(select) => message.push_str(&evaluator.string(select, node)),
        }
    }
    RuleFailure {
        kind: check.kind,
        message: normalize_space(&message),
        path: node.path(),
        position: node.position(),
        test: check.source.clone(),
        id: check.id.clone(),
        role: check.role.clone(),
        pattern: pattern.map(Into::into),
    }
}
