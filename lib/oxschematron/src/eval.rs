//! Evaluation of XPath expressions over an [`oxdom`] tree.

use crate::xpath::{ArithmeticOperator, Axis, CompareOperator, Expr, Function, LocationPath, Step};
use oxdom::{Document, NodeId, NodeRef};
use regex::RegexBuilder;
use rustc_hash::FxHashMap;
use std::iter::once;
use tracing::warn;

const REGEX_SIZE_LIMIT: usize = 1_000_000;

/// The result of an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    /// Node-set, sorted in document order without duplicates.
    Nodes(Vec<NodeId>),
    Boolean(bool),
    Number(f64),
    String(String),
}

pub(crate) type Variables = FxHashMap<String, Value>;

#[derive(Clone, Copy)]
struct Focus<'d> {
    node: NodeRef<'d>,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'d, 'v> {
    document: &'d Document,
    variables: &'v Variables,
}

impl<'d, 'v> Evaluator<'d, 'v> {
    pub(crate) fn new(document: &'d Document, variables: &'v Variables) -> Self {
        Self {
            document,
            variables,
        }
    }

    pub(crate) fn evaluate(&self, expr: &Expr, node: NodeRef<'d>) -> Value {
        self.eval(
            expr,
            Focus {
                node,
                position: 1,
                size: 1,
            },
        )
    }

    pub(crate) fn boolean(&self, expr: &Expr, node: NodeRef<'d>) -> bool {
        to_boolean(&self.evaluate(expr, node))
    }

    pub(crate) fn string(&self, expr: &Expr, node: NodeRef<'d>) -> String {
        self.to_string(&self.evaluate(expr, node))
    }

    /// The nodes selected by `expr`, empty if it does not return a node-set.
    pub(crate) fn select(&self, expr: &Expr, node: NodeRef<'d>) -> Vec<NodeId> {
        match self.evaluate(expr, node) {
            Value::Nodes(nodes) => nodes,
            _ => Vec::new(),
        }
    }

    fn eval(&self, expr: &Expr, focus: Focus<'d>) -> Value {
        match expr {
            Expr::Or(left, right) => Value::Boolean(
                to_boolean(&self.eval(left, focus)) || to_boolean(&self.eval(right, focus)),
            ),
            Expr::And(left, right) => Value::Boolean(
                to_boolean(&self.eval(left, focus)) && to_boolean(&self.eval(right, focus)),
            ),
            Expr::Compare(operator, left, right) => Value::Boolean(self.compare(
                *operator,
                &self.eval(left, focus),
                &self.eval(right, focus),
            )),
            Expr::Arithmetic(operator, left, right) => {
                let left = self.to_number(&self.eval(left, focus));
                let right = self.to_number(&self.eval(right, focus));
                Value::Number(match operator {
                    ArithmeticOperator::Add => left + right,
                    ArithmeticOperator::Subtract => left - right,
                    ArithmeticOperator::Multiply => left * right,
                    ArithmeticOperator::Divide => left / right,
                    ArithmeticOperator::Modulo => left % right,
                })
            }
            Expr::Negate(inner) => Value::Number(-self.to_number(&self.eval(inner, focus))),
            Expr::Union(left, right) => {
                match (self.eval(left, focus), self.eval(right, focus)) {
                    (Value::Nodes(mut left), Value::Nodes(right)) => {
                        left.extend(right);
                        left.sort_unstable();
                        left.dedup();
                        Value::Nodes(left)
                    }
                    _ => {
                        warn!("Union of values that are not node-sets");
                        Value::Nodes(Vec::new())
                    }
                }
            }
            Expr::Path(path) => Value::Nodes(self.location_path(path, focus.node)),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let Value::Nodes(nodes) = self.eval(primary, focus) else {
                    return Value::Nodes(Vec::new());
                };
                let mut nodes: Vec<_> = nodes.into_iter().map(|id| self.document.node(id)).collect();
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate);
                }
                Value::Nodes(self.steps(nodes.into_iter().map(NodeRef::id).collect(), steps))
            }
            Expr::Literal(value) => Value::String(value.clone()),
            Expr::Number(value) => Value::Number(*value),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            Expr::Call(function, args) => self.call(*function, args, focus),
        }
    }

    fn location_path(&self, path: &LocationPath, node: NodeRef<'d>) -> Vec<NodeId> {
        let start = if path.absolute {
            self.document.root()
        } else {
            node
        };
        self.steps(vec![start.id()], &path.steps)
    }

    fn steps(&self, mut nodes: Vec<NodeId>, steps: &[Step]) -> Vec<NodeId> {
        for step in steps {
            let mut next = Vec::new();
            for id in &nodes {
                next.extend(self.step(step, self.document.node(*id)));
            }
            next.sort_unstable();
            next.dedup();
            nodes = next;
        }
        nodes
    }

    fn step(&self, step: &Step, node: NodeRef<'d>) -> Vec<NodeId> {
        let mut candidates: Vec<_> = axis(step.axis, node)
            .into_iter()
            .filter(|n| step.test.matches(*n, step.axis))
            .collect();
        for predicate in &step.predicates {
            candidates = self.filter(candidates, predicate);
        }
        candidates.into_iter().map(NodeRef::id).collect()
    }

    /// Keeps the nodes for which the predicate holds, numbers being compared to the proximity position.
    fn filter(&self, nodes: Vec<NodeRef<'d>>, predicate: &Expr) -> Vec<NodeRef<'d>> {
        let size = nodes.len();
        nodes
            .into_iter()
            .enumerate()
            .filter(|(i, node)| {
                let focus = Focus {
                    node: *node,
                    position: i + 1,
                    size,
                };
                match self.eval(predicate, focus) {
                    Value::Number(n) => n == to_f64(i + 1),
                    value => to_boolean(&value),
                }
            })
            .map(|(_, node)| node)
            .collect()
    }

    fn call(&self, function: Function, args: &[Expr], focus: Focus<'d>) -> Value {
        let arg = |i: usize| args.get(i).map(|arg| self.eval(arg, focus));
        let string_arg = |i: usize| arg(i).map(|v| self.to_string(&v)).unwrap_or_default();
        // the focus node stands for a missing optional argument
        let node_arg = || match arg(0) {
            Some(Value::Nodes(nodes)) => nodes.first().map(|id| self.document.node(*id)),
            Some(_) => None,
            None => Some(focus.node),
        };
        match function {
            Function::Not => Value::Boolean(!arg(0).is_some_and(|v| to_boolean(&v))),
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Boolean => Value::Boolean(arg(0).is_some_and(|v| to_boolean(&v))),
            Function::Count => Value::Number(match arg(0) {
                Some(Value::Nodes(nodes)) => to_f64(nodes.len()),
                _ => 1.,
            }),
            Function::String => Value::String(self.context_string(arg(0), focus)),
            Function::StringLength => Value::Number(to_f64(
                self.context_string(arg(0), focus).chars().count(),
            )),
            Function::NormalizeSpace => Value::String(
                self.context_string(arg(0), focus)
                    .split_ascii_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Function::Concat => Value::String((0..args.len()).map(string_arg).collect()),
            Function::Contains => Value::Boolean(string_arg(0).contains(&string_arg(1))),
            Function::StartsWith => Value::Boolean(string_arg(0).starts_with(&string_arg(1))),
            Function::EndsWith => Value::Boolean(string_arg(0).ends_with(&string_arg(1))),
            Function::SubstringBefore => {
                let value = string_arg(0);
                let pattern = string_arg(1);
                Value::String(
                    value
                        .find(&pattern)
                        .map_or_else(String::new, |i| value[..i].into()),
                )
            }
            Function::SubstringAfter => {
                let value = string_arg(0);
                let pattern = string_arg(1);
                Value::String(
                    value
                        .find(&pattern)
                        .map_or_else(String::new, |i| value[i + pattern.len()..].into()),
                )
            }
            Function::Substring => {
                let value = string_arg(0);
                let start = round(self.to_number(&arg(1).unwrap_or(Value::Number(f64::NAN))));
                let end = arg(2).map(|v| start + round(self.to_number(&v)));
                Value::String(
                    value
                        .chars()
                        .enumerate()
                        .filter(|(i, _)| {
                            let position = to_f64(i + 1);
                            position >= start && end.is_none_or(|end| position < end)
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            Function::Translate => {
                let from: Vec<char> = string_arg(1).chars().collect();
                let to: Vec<char> = string_arg(2).chars().collect();
                Value::String(
                    string_arg(0)
                        .chars()
                        .filter_map(|c| match from.iter().position(|f| *f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            Function::Number => Value::Number(match arg(0) {
                Some(value) => self.to_number(&value),
                None => parse_number(&focus.node.string_value()),
            }),
            Function::Sum => Value::Number(match arg(0) {
                Some(Value::Nodes(nodes)) => nodes
                    .iter()
                    .map(|id| parse_number(&self.document.node(*id).string_value()))
                    .sum(),
                Some(value) => self.to_number(&value),
                None => f64::NAN,
            }),
            Function::Name => Value::String(
                node_arg()
                    .and_then(NodeRef::name)
                    .map(|name| name.qualified())
                    .unwrap_or_default(),
            ),
            Function::LocalName => Value::String(
                node_arg()
                    .and_then(NodeRef::name)
                    .map(|name| name.local().into())
                    .unwrap_or_default(),
            ),
            Function::NamespaceUri => Value::String(
                node_arg()
                    .and_then(NodeRef::name)
                    .map(|name| name.namespace().into())
                    .unwrap_or_default(),
            ),
            Function::Position => Value::Number(to_f64(focus.position)),
            Function::Last => Value::Number(to_f64(focus.size)),
            Function::Exists => Value::Boolean(match arg(0) {
                Some(Value::Nodes(nodes)) => !nodes.is_empty(),
                _ => true,
            }),
            Function::Empty => Value::Boolean(match arg(0) {
                Some(Value::Nodes(nodes)) => nodes.is_empty(),
                _ => false,
            }),
            Function::Matches => {
                Value::Boolean(matches(&string_arg(0), &string_arg(1), &string_arg(2)))
            }
        }
    }

    fn context_string(&self, value: Option<Value>, focus: Focus<'d>) -> String {
        match value {
            Some(value) => self.to_string(&value),
            None => focus.node.string_value(),
        }
    }

    pub(crate) fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|id| self.document.node(*id).string_value())
                .unwrap_or_default(),
            Value::Boolean(value) => value.to_string(),
            Value::Number(value) => format_number(*value),
            Value::String(value) => value.clone(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Nodes(_) => parse_number(&self.to_string(value)),
            Value::Boolean(value) => {
                if *value {
                    1.
                } else {
                    0.
                }
            }
            Value::Number(value) => *value,
            Value::String(value) => parse_number(value),
        }
    }

    fn compare(&self, operator: CompareOperator, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(left), Value::Nodes(right)) => left.iter().any(|l| {
                let l = Value::String(self.document.node(*l).string_value());
                right.iter().any(|r| {
                    let r = Value::String(self.document.node(*r).string_value());
                    compare_atomic(operator, &l, &r)
                })
            }),
            (Value::Nodes(_), Value::Boolean(_)) | (Value::Boolean(_), Value::Nodes(_)) => {
                compare_atomic(
                    operator,
                    &Value::Boolean(to_boolean(left)),
                    &Value::Boolean(to_boolean(right)),
                )
            }
            (Value::Nodes(nodes), other) => nodes
                .iter()
                .any(|n| compare_atomic(operator, &self.atomize(*n, other), other)),
            (other, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|n| compare_atomic(operator, other, &self.atomize(*n, other))),
            (left, right) => compare_atomic(operator, left, right),
        }
    }

    /// The value of a node converted to the type of `other`.
    fn atomize(&self, node: NodeId, other: &Value) -> Value {
        let value = self.document.node(node).string_value();
        if matches!(other, Value::Number(_)) {
            Value::Number(parse_number(&value))
        } else {
            Value::String(value)
        }
    }
}

pub(crate) fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Boolean(value) => *value,
        Value::Number(value) => *value != 0. && !value.is_nan(),
        Value::String(value) => !value.is_empty(),
    }
}

/// Compares two values that are not node-sets.
fn compare_atomic(operator: CompareOperator, left: &Value, right: &Value) -> bool {
    let number = |value: &Value| match value {
        Value::Boolean(value) => {
            if *value {
                1.
            } else {
                0.
            }
        }
        Value::Number(value) => *value,
        Value::String(value) => parse_number(value),
        Value::Nodes(_) => f64::NAN,
    };
    let string = |value: &Value| match value {
        Value::Boolean(value) => value.to_string(),
        Value::Number(value) => format_number(*value),
        Value::String(value) => value.clone(),
        Value::Nodes(_) => String::new(),
    };
    match operator {
        CompareOperator::Equal | CompareOperator::NotEqual => {
            let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
                to_boolean(left) == to_boolean(right)
            } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                number(left) == number(right)
            } else {
                string(left) == string(right)
            };
            equal == (operator == CompareOperator::Equal)
        }
        CompareOperator::Less => number(left) < number(right),
        CompareOperator::LessOrEqual => number(left) <= number(right),
        CompareOperator::Greater => number(left) > number(right),
        CompareOperator::GreaterOrEqual => number(left) >= number(right),
    }
}

/// Nodes of the axis in proximity order.
fn axis(axis: Axis, node: NodeRef<'_>) -> Vec<NodeRef<'_>> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::Descendant => node.descendants().collect(),
        Axis::DescendantOrSelf => once(node).chain(node.descendants()).collect(),
        Axis::SelfNode => vec![node],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => node.ancestors().collect(),
        Axis::AncestorOrSelf => once(node).chain(node.ancestors()).collect(),
        Axis::Attribute => node.attributes().collect(),
        Axis::FollowingSibling | Axis::PrecedingSibling => {
            let Some(parent) = node.parent().filter(|_| !node.is_attribute()) else {
                return Vec::new();
            };
            let siblings: Vec<_> = parent.children().collect();
            let Some(index) = siblings.iter().position(|s| *s == node) else {
                return Vec::new();
            };
            let (before, after) = siblings.split_at(index);
            if axis == Axis::FollowingSibling {
                after.iter().skip(1).copied().collect()
            } else {
                before.iter().rev().copied().collect()
            }
        }
    }
}

fn matches(value: &str, pattern: &str, flags: &str) -> bool {
    let mut builder = RegexBuilder::new(pattern);
    builder.size_limit(REGEX_SIZE_LIMIT);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => {
                warn!("Unsupported regular expression flag '{flag}'");
                return false;
            }
        };
    }
    match builder.build() {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            warn!("Invalid regular expression '{pattern}': {e}");
            false
        }
    }
}

/// Parses an XPath number literal, surrounded by optional whitespace.
fn parse_number(value: &str) -> f64 {
    let value = value.trim_matches(|c: char| c.is_ascii_whitespace());
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut parts = digits.splitn(2, '.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let valid = is_digits(integer)
        && fraction.is_none_or(is_digits)
        && (!integer.is_empty() || fraction.is_some_and(|f| !f.is_empty()));
    if valid {
        value.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        (if value > 0. { "Infinity" } else { "-Infinity" }).into()
    } else if value == 0. {
        "0".into()
    } else {
        value.to_string()
    }
}

fn round(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn to_f64(value: usize) -> f64 {
    u32::try_from(value).map_or(f64::INFINITY, f64::from)
}
