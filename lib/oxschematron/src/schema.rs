use crate::error::RuleCompileError;
use crate::xpath::{Expr, ParserState};
use oxdom::{Document, Name, NodeRef};
use rustc_hash::FxHashMap;
use std::str::FromStr;
use tracing::debug;

/// The ISO Schematron namespace.
pub const SCHEMATRON_NAMESPACE: &str = "http://purl.oclc.org/dsdl/schematron";

/// A compiled Schematron schema.
///
/// Compilation parses every XPath expression once; the schema is then immutable and can be shared
/// between threads to [validate](Schema::validate) any number of documents.
///
/// ```
/// use oxdom::Document;
/// use oxschematron::Schema;
///
/// let schema: Schema = r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
///   <ns prefix="tei" uri="http://www.tei-c.org/ns/1.0"/>
///   <pattern>
///     <rule context="tei:p">
///       <assert test="normalize-space(.)">A <name/> must not be empty</assert>
///     </rule>
///   </pattern>
/// </schema>"#.parse()?;
///
/// let document = Document::parse(r#"<body xmlns="http://www.tei-c.org/ns/1.0"><p>a</p><p/></body>"#)?;
/// let report = schema.validate(&document);
/// assert_eq!(report.failures()[0].to_string(), "/body[1]/p[2]: A p must not be empty");
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) title: Option<String>,
    pub(crate) lets: Vec<Variable>,
    pub(crate) patterns: Vec<RulePattern>,
}

#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub(crate) struct RulePattern {
    pub id: Option<String>,
    pub lets: Vec<Variable>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub(crate) struct Rule {
    /// Selects from the document node every node the rule context matches.
    pub context: Expr,
    pub lets: Vec<Variable>,
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone)]
pub(crate) struct Check {
    pub kind: CheckKind,
    pub test: Expr,
    pub source: String,
    pub id: Option<String>,
    pub role: Option<String>,
    pub message: Vec<MessagePart>,
}

#[derive(Debug, Clone)]
pub(crate) enum MessagePart {
    Text(String),
    /// `<name/>`, of the context node or of the first node selected by `path`.
    Name(Option<Expr>),
    ValueOf(Expr),
}

/// Whether a check is an `assert` or a `report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    /// Fails when its test is false.
    Assert,
    /// Fails when its test is true.
    Report,
}

impl Schema {
    /// Parses and compiles a schema from its XML serialization.
    pub fn parse(text: &str) -> Result<Self, RuleCompileError> {
        Self::from_document(&Document::parse(text)?)
    }

    pub fn from_document(document: &Document) -> Result<Self, RuleCompileError> {
        let schema = document.document_element();
        if !is_schematron(schema, "schema") {
            return Err(RuleCompileError::NotSchematron {
                found: schema.name().map_or_else(String::new, Name::qualified),
            });
        }
        if let Some(binding) = schema.attribute_value("", "queryBinding") {
            if !binding.starts_with("xslt") && !binding.starts_with("xpath") {
                return Err(RuleCompileError::unsupported(
                    format!("query binding '{binding}'"),
                    schema.path(),
                ));
            }
        }
        let mut namespaces = FxHashMap::default();
        for ns in schematron_children(schema).filter(|e| is_schematron(*e, "ns")) {
            namespaces.insert(
                required(ns, "prefix")?.to_owned(),
                required(ns, "uri")?.to_owned(),
            );
        }
        let mut compiler = Compiler {
            state: ParserState::new(namespaces),
        };
        let mut title = None;
        let mut lets = Vec::new();
        let mut patterns = Vec::new();
        for child in schematron_children(schema) {
            match local(child) {
                "ns" | "p" | "diagnostics" | "properties" => (),
                "title" => title = Some(normalize_space(&child.string_value())),
                "let" => lets.push(compiler.variable(child)?),
                "pattern" => patterns.push(compiler.pattern(child)?),
                "phase" | "include" => return Err(unsupported_element(child)),
                other => return Err(unexpected_element(child, other)),
            }
        }
        debug!(
            "Schematron schema compiled with {} patterns and {} rules",
            patterns.len(),
            patterns.iter().map(|p: &RulePattern| p.rules.len()).sum::<usize>()
        );
        Ok(Self {
            title,
            lets,
            patterns,
        })
    }

    /// The `title` of the schema, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.iter().all(|p| p.rules.is_empty())
    }
}

impl FromStr for Schema {
    type Err = RuleCompileError;

    fn from_str(text: &str) -> Result<Self, RuleCompileError> {
        Self::parse(text)
    }
}

struct Compiler {
    state: ParserState,
}

impl Compiler {
    fn variable(&mut self, element: NodeRef<'_>) -> Result<Variable, RuleCompileError> {
        let name = required(element, "name")?;
        let Some(value) = element.attribute_value("", "value") else {
            return Err(RuleCompileError::unsupported(
                "<let> without value attribute",
                element.path(),
            ));
        };
        let value = self.state.parse(value)?;
        self.state.declare_variable(name);
        Ok(Variable {
            name: name.into(),
            value,
        })
    }

    fn pattern(&mut self, element: NodeRef<'_>) -> Result<RulePattern, RuleCompileError> {
        if element.attribute_value("", "abstract") == Some("true")
            || element.attribute("", "is-a").is_some()
        {
            return Err(RuleCompileError::unsupported(
                "abstract pattern",
                element.path(),
            ));
        }
        let scope = self.state.variables().clone();
        let mut lets = Vec::new();
        let mut rules = Vec::new();
        for child in schematron_children(element) {
            match local(child) {
                "title" | "p" => (),
                "let" => lets.push(self.variable(child)?),
                "rule" => rules.extend(self.rule(child)?),
                "include" => return Err(unsupported_element(child)),
                other => return Err(unexpected_element(child, other)),
            }
        }
        self.state.set_variables(scope);
        Ok(RulePattern {
            id: element.attribute_value("", "id").map(Into::into),
            lets,
            rules,
        })
    }

    /// Abstract rules are only reachable through `extends` and compile to nothing.
    fn rule(&mut self, element: NodeRef<'_>) -> Result<Option<Rule>, RuleCompileError> {
        if element.attribute_value("", "abstract") == Some("true") {
            return Ok(None);
        }
        let context = self
            .state
            .parse(required(element, "context")?)?
            .into_match_pattern();
        let role = element.attribute_value("", "role");
        let scope = self.state.variables().clone();
        let mut lets = Vec::new();
        let mut checks = Vec::new();
        for child in schematron_children(element) {
            match local(child) {
                "title" | "p" => (),
                "let" => lets.push(self.variable(child)?),
                "assert" => checks.push(self.check(child, CheckKind::Assert, role)?),
                "report" => checks.push(self.check(child, CheckKind::Report, role)?),
                "extends" | "include" => return Err(unsupported_element(child)),
                other => return Err(unexpected_element(child, other)),
            }
        }
        self.state.set_variables(scope);
        Ok(Some(Rule {
            context,
            lets,
            checks,
        }))
    }

    fn check(
        &mut self,
        element: NodeRef<'_>,
        kind: CheckKind,
        rule_role: Option<&str>,
    ) -> Result<Check, RuleCompileError> {
        let source = required(element, "test")?;
        let mut message = Vec::new();
        self.message(element, &mut message)?;
        Ok(Check {
            kind,
            test: self.state.parse(source)?,
            source: source.into(),
            id: element.attribute_value("", "id").map(Into::into),
            role: element
                .attribute_value("", "role")
                .or(rule_role)
                .map(Into::into),
            message,
        })
    }

    fn message(
        &mut self,
        element: NodeRef<'_>,
        parts: &mut Vec<MessagePart>,
    ) -> Result<(), RuleCompileError> {
        for child in element.children() {
            if let Some(text) = child.text() {
                parts.push(MessagePart::Text(text.into()));
            } else if is_schematron(child, "name") {
                let path = child
                    .attribute_value("", "path")
                    .map(|path| self.state.parse(path))
                    .transpose()?;
                parts.push(MessagePart::Name(path));
            } else if is_schematron(child, "value-of") {
                parts.push(MessagePart::ValueOf(
                    self.state.parse(required(child, "select")?)?,
                ));
            } else {
                // emph, dir, span and foreign markup contribute their text
                self.message(child, parts)?;
            }
        }
        Ok(())
    }
}

fn is_schematron(node: NodeRef<'_>, local: &str) -> bool {
    node.name()
        .is_some_and(|n| n.is(SCHEMATRON_NAMESPACE, local))
}

/// Child elements in the Schematron namespace, foreign elements being annotations.
fn schematron_children<'d>(element: NodeRef<'d>) -> impl Iterator<Item = NodeRef<'d>> + 'd {
    element
        .child_elements()
        .filter(|e| e.name().is_some_and(|n| n.namespace() == SCHEMATRON_NAMESPACE))
}

fn local(element: NodeRef<'_>) -> &str {
    element.name().map_or("", Name::local)
}

fn required<'d>(element: NodeRef<'d>, attribute: &str) -> Result<&'d str, RuleCompileError> {
    element.attribute_value("", attribute).ok_or_else(|| {
        RuleCompileError::invalid(
            element.path(),
            format!("<{}> requires a {attribute} attribute", local(element)),
        )
    })
}

fn unsupported_element(element: NodeRef<'_>) -> RuleCompileError {
    RuleCompileError::unsupported(format!("<{}>", local(element)), element.path())
}

fn unexpected_element(element: NodeRef<'_>, local: &str) -> RuleCompileError {
    RuleCompileError::invalid(element.path(), format!("unexpected <{local}> element"))
}

pub(crate) fn normalize_space(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}
