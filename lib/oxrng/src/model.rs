//! Data structures of a simplified RelaxNG grammar.

use crate::datatype::Datatype;
use crate::error::GrammarError;
use oxdom::Name;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A content model.
///
/// References to other productions are kept by name and resolved through the grammar index.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Empty,
    NotAllowed,
    Text,
    /// Ordered sequence.
    Group(Vec<Pattern>),
    /// Unordered sequence.
    Interleave(Vec<Pattern>),
    Choice(Vec<Pattern>),
    Optional(Box<Pattern>),
    ZeroOrMore(Box<Pattern>),
    OneOrMore(Box<Pattern>),
    /// Content interleaved with text.
    Mixed(Box<Pattern>),
    Element {
        name: NameClass,
        content: Box<Pattern>,
    },
    Attribute {
        name: NameClass,
        value: Box<Pattern>,
    },
    Ref(String),
    Data {
        datatype: Datatype,
        except: Option<Box<Pattern>>,
    },
    Value {
        datatype: Datatype,
        value: String,
    },
    List(Box<Pattern>),
}

impl Pattern {
    /// Shortcut for an element with a single name.
    pub fn element(namespace: impl Into<String>, local: impl Into<String>, content: Self) -> Self {
        Self::Element {
            name: NameClass::Name {
                namespace: namespace.into(),
                local: local.into(),
            },
            content: Box::new(content),
        }
    }

    /// Shortcut for an attribute with a single name.
    pub fn attribute(namespace: impl Into<String>, local: impl Into<String>, value: Self) -> Self {
        Self::Attribute {
            name: NameClass::Name {
                namespace: namespace.into(),
                local: local.into(),
            },
            value: Box::new(value),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    /// Calls `f` on every reference, including the ones nested in element content.
    pub fn for_each_ref<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        self.walk_refs(true, f)
    }

    /// References reachable without entering an element.
    fn for_each_ref_outside_elements<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        self.walk_refs(false, f)
    }

    fn walk_refs<'a>(&'a self, into_elements: bool, f: &mut impl FnMut(&'a str)) {
        match self {
            Self::Empty | Self::NotAllowed | Self::Text | Self::Value { .. } => (),
            Self::Group(patterns) | Self::Interleave(patterns) | Self::Choice(patterns) => {
                for pattern in patterns {
                    pattern.walk_refs(into_elements, f);
                }
            }
            Self::Optional(p)
            | Self::ZeroOrMore(p)
            | Self::OneOrMore(p)
            | Self::Mixed(p)
            | Self::List(p)
            | Self::Attribute { value: p, .. } => p.walk_refs(into_elements, f),
            Self::Element { content, .. } => {
                if into_elements {
                    content.walk_refs(into_elements, f)
                }
            }
            Self::Ref(name) => f(name),
            Self::Data { except, .. } => {
                if let Some(except) = except {
                    except.walk_refs(into_elements, f)
                }
            }
        }
    }
}

/// The set of names an element or attribute pattern accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameClass {
    Name {
        namespace: String,
        local: String,
    },
    AnyName {
        except: Option<Box<NameClass>>,
    },
    NsName {
        namespace: String,
        except: Option<Box<NameClass>>,
    },
    Choice(Box<NameClass>, Box<NameClass>),
}

impl NameClass {
    pub fn contains(&self, name: &Name) -> bool {
        match self {
            Self::Name { namespace, local } => name.is(namespace, local),
            Self::AnyName { except } => !except.as_ref().is_some_and(|e| e.contains(name)),
            Self::NsName { namespace, except } => {
                name.namespace() == namespace && !except.as_ref().is_some_and(|e| e.contains(name))
            }
            Self::Choice(a, b) => a.contains(name) || b.contains(name),
        }
    }
}

impl fmt::Display for NameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name { local, .. } => write!(f, "\"{local}\""),
            Self::AnyName { .. } => f.write_str("any name"),
            Self::NsName { namespace, .. } => write!(f, "any name in \"{namespace}\""),
            Self::Choice(a, b) => write!(f, "{a} or {b}"),
        }
    }
}

/// A named definition of the grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    name: String,
    pattern: Arc<Pattern>,
}

impl Production {
    pub fn new(name: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            pattern: Arc::new(pattern),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

/// An immutable structural grammar: named productions plus a start choice group.
///
/// Cloning is cheap, productions and their index are shared between clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    productions: Arc<[Production]>,
    index: Arc<FxHashMap<String, usize>>,
    start: Vec<Arc<Pattern>>,
}

impl Grammar {
    /// Builds a grammar and checks its references.
    ///
    /// Fails if two productions share a name, if a reference is dangling or if a production
    /// reaches itself without going through an element.
    pub fn new(
        productions: impl IntoIterator<Item = Production>,
        start: impl IntoIterator<Item = Pattern>,
    ) -> Result<Self, GrammarError> {
        let productions: Arc<[Production]> = productions.into_iter().collect();
        let mut index = FxHashMap::default();
        for (i, production) in productions.iter().enumerate() {
            if index.insert(production.name.clone(), i).is_some() {
                return Err(GrammarError::DuplicateDefinition {
                    name: production.name.clone(),
                });
            }
        }
        let grammar = Self {
            productions,
            index: Arc::new(index),
            start: start.into_iter().map(Arc::new).collect(),
        };
        grammar.validate_refs()?;
        grammar.detect_cycles()?;
        debug!(
            "Loaded a grammar with {} productions and {} start alternatives",
            grammar.productions.len(),
            grammar.start.len()
        );
        Ok(grammar)
    }

    pub(crate) fn with_start(&self, start: Vec<Arc<Pattern>>) -> Self {
        Self {
            productions: Arc::clone(&self.productions),
            index: Arc::clone(&self.index),
            start,
        }
    }

    /// The alternatives of the start choice group, in order.
    pub fn start_alternatives(&self) -> &[Arc<Pattern>] {
        &self.start
    }

    /// Looks up a production by its exact name.
    pub fn production(&self, name: &str) -> Option<&Production> {
        self.index.get(name).map(|i| &self.productions[*i])
    }

    pub fn contains_production(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Production names in definition order.
    pub fn production_names(&self) -> impl Iterator<Item = &str> {
        self.productions.iter().map(|p| p.name.as_str())
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    /// Returns true if both grammars share the same production storage.
    pub fn shares_productions_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.productions, &other.productions)
    }

    fn validate_refs(&self) -> Result<(), GrammarError> {
        let mut missing = None;
        let patterns = self
            .productions
            .iter()
            .map(|p| p.pattern.as_ref())
            .chain(self.start.iter().map(Arc::as_ref));
        for pattern in patterns {
            pattern.for_each_ref(&mut |name| {
                if missing.is_none() && !self.index.contains_key(name) {
                    missing = Some(name.to_owned());
                }
            });
            if let Some(name) = missing.take() {
                return Err(GrammarError::UndefinedReference { name });
            }
        }
        Ok(())
    }

    /// Rejects references cycles that do not go through an element.
    fn detect_cycles(&self) -> Result<(), GrammarError> {
        let mut visited = FxHashSet::default();
        let mut rec_stack = Vec::new();
        for i in 0..self.productions.len() {
            if !visited.contains(&i) {
                self.detect_cycles_impl(i, &mut visited, &mut rec_stack)?;
            }
        }
        Ok(())
    }

    fn detect_cycles_impl(
        &self,
        production: usize,
        visited: &mut FxHashSet<usize>,
        rec_stack: &mut Vec<usize>,
    ) -> Result<(), GrammarError> {
        visited.insert(production);
        rec_stack.push(production);
        let mut refs = Vec::new();
        self.productions[production]
            .pattern
            .for_each_ref_outside_elements(&mut |name| {
                if let Some(i) = self.index.get(name) {
                    refs.push(*i);
                }
            });
        for target in refs {
            if let Some(position) = rec_stack.iter().position(|p| *p == target) {
                let cycle = rec_stack[position..]
                    .iter()
                    .chain([&target])
                    .map(|i| self.productions[*i].name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(GrammarError::RecursiveReference {
                    name: self.productions[target].name.clone(),
                    cycle,
                });
            }
            if !visited.contains(&target) {
                self.detect_cycles_impl(target, visited, rec_stack)?;
            }
        }
        rec_stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_lookup() -> Result<(), GrammarError> {
        let grammar = Grammar::new(
            [
                Production::new("a", Pattern::element("", "a", Pattern::Empty)),
                Production::new("b", Pattern::element("", "b", Pattern::reference("a"))),
            ],
            [Pattern::reference("b")],
        )?;
        assert_eq!(grammar.production("a").map(Production::name), Some("a"));
        assert!(grammar.production("c").is_none());
        assert_eq!(grammar.production_names().collect::<Vec<_>>(), ["a", "b"]);
        Ok(())
    }

    #[test]
    fn dangling_reference() {
        let error = Grammar::new(
            [Production::new("a", Pattern::reference("missing"))],
            [Pattern::reference("a")],
        )
        .unwrap_err();
        assert!(matches!(error, GrammarError::UndefinedReference { name } if name == "missing"));
    }

    #[test]
    fn dangling_start_reference() {
        let error = Grammar::new([], [Pattern::reference("a")]).unwrap_err();
        assert!(matches!(error, GrammarError::UndefinedReference { .. }));
    }

    #[test]
    fn recursion_through_element_is_allowed() {
        Grammar::new(
            [Production::new(
                "list",
                Pattern::element(
                    "",
                    "item",
                    Pattern::ZeroOrMore(Box::new(Pattern::reference("list"))),
                ),
            )],
            [Pattern::reference("list")],
        )
        .unwrap();
    }

    #[test]
    fn recursion_without_element_is_rejected() {
        let error = Grammar::new(
            [
                Production::new("a", Pattern::Optional(Box::new(Pattern::reference("b")))),
                Production::new("b", Pattern::Group(vec![Pattern::Text, Pattern::reference("a")])),
            ],
            [],
        )
        .unwrap_err();
        assert!(
            matches!(&error, GrammarError::RecursiveReference { cycle, .. } if cycle == "a -> b -> a"),
            "{error}"
        );
    }

    #[test]
    fn duplicate_definition() {
        let error = Grammar::new(
            [
                Production::new("a", Pattern::Empty),
                Production::new("a", Pattern::Text),
            ],
            [],
        )
        .unwrap_err();
        assert!(matches!(error, GrammarError::DuplicateDefinition { .. }));
    }

    #[test]
    fn name_classes() {
        let class = NameClass::AnyName {
            except: Some(Box::new(NameClass::NsName {
                namespace: "urn:x".into(),
                except: None,
            })),
        };
        assert!(class.contains(&Name::unqualified("a")));
        assert!(!class.contains(&Name::new(Some("x"), "a", "urn:x")));
    }
}
