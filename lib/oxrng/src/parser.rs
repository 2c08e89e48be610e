//! Loader for grammars written in the RelaxNG XML syntax.

use crate::datatype::{Datatype, Facet};
use crate::error::GrammarError;
use crate::model::{Grammar, NameClass, Pattern, Production};
use oxdom::{Document, NodeRef};
use rustc_hash::FxHashMap;
use std::str::FromStr;

/// Namespace of RelaxNG structure elements.
pub const RELAXNG_NAMESPACE: &str = "http://relaxng.org/ns/structure/1.0";

impl Grammar {
    /// Parses a grammar in the RelaxNG XML syntax.
    ///
    /// ```
    /// use oxrng::Grammar;
    ///
    /// let grammar = Grammar::parse(r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
    ///   <start><ref name="body"/></start>
    ///   <define name="body"><element name="body"><zeroOrMore><ref name="p"/></zeroOrMore></element></define>
    ///   <define name="p"><element name="p"><text/></element></define>
    /// </grammar>"#)?;
    /// assert_eq!(grammar.production_names().collect::<Vec<_>>(), ["body", "p"]);
    /// # Result::<_, oxrng::GrammarError>::Ok(())
    /// ```
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        Self::from_document(&Document::parse(text)?)
    }

    /// Builds a grammar from an already parsed RelaxNG document.
    pub fn from_document(document: &Document) -> Result<Self, GrammarError> {
        let root = document.document_element();
        if !is_rng(root) {
            return Err(GrammarError::invalid(
                root.path(),
                "the root element is not in the RelaxNG namespace",
            ));
        }
        if local(root) != "grammar" {
            // A bare pattern is a grammar with this pattern as start.
            let start = parse_pattern(root)?;
            return Self::new([], start_alternatives(start));
        }
        let mut parser = GrammarParser::default();
        parser.grammar_content(root)?;
        let start = parser.start.ok_or(GrammarError::MissingStart)?;
        let start = start.into_pattern(root)?;
        let productions = parser
            .defines
            .into_iter()
            .map(|(name, definition)| Ok(Production::new(name, definition.into_pattern(root)?)))
            .collect::<Result<Vec<_>, GrammarError>>()?;
        Self::new(productions, start_alternatives(start))
    }
}

impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(text: &str) -> Result<Self, GrammarError> {
        Self::parse(text)
    }
}

fn start_alternatives(start: Pattern) -> Vec<Pattern> {
    match start {
        Pattern::Choice(alternatives) => alternatives,
        start => vec![start],
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Combine {
    Choice,
    Interleave,
}

/// All the parts of a `define` or `start` split across several elements.
#[derive(Default)]
struct Definition {
    parts: Vec<Pattern>,
    combine: Option<Combine>,
    without_combine: usize,
}

impl Definition {
    fn add(&mut self, element: NodeRef<'_>, pattern: Pattern) -> Result<(), GrammarError> {
        match element.attribute_value("", "combine").map(str::trim) {
            None => self.without_combine += 1,
            Some(value) => {
                let combine = match value {
                    "choice" => Combine::Choice,
                    "interleave" => Combine::Interleave,
                    _ => {
                        return Err(GrammarError::invalid(
                            element.path(),
                            format!("invalid combine value '{value}'"),
                        ));
                    }
                };
                if self.combine.is_some_and(|c| c != combine) {
                    return Err(GrammarError::invalid(
                        element.path(),
                        "inconsistent combine values",
                    ));
                }
                self.combine = Some(combine);
            }
        }
        self.parts.push(pattern);
        Ok(())
    }

    fn into_pattern(mut self, grammar: NodeRef<'_>) -> Result<Pattern, GrammarError> {
        if self.without_combine > 1 {
            return Err(GrammarError::invalid(
                grammar.path(),
                "several definitions without combine attribute",
            ));
        }
        if self.parts.len() == 1 {
            return Ok(self.parts.remove(0));
        }
        Ok(match self.combine {
            Some(Combine::Interleave) => Pattern::Interleave(self.parts),
            Some(Combine::Choice) | None => Pattern::Choice(self.parts),
        })
    }
}

#[derive(Default)]
struct GrammarParser {
    defines: Vec<(String, Definition)>,
    index: FxHashMap<String, usize>,
    start: Option<Definition>,
}

impl GrammarParser {
    fn grammar_content(&mut self, element: NodeRef<'_>) -> Result<(), GrammarError> {
        for child in rng_children(element) {
            match local(child) {
                "start" => {
                    let pattern = group_of(child, rng_children(child))?;
                    self.start
                        .get_or_insert_with(Definition::default)
                        .add(child, pattern)?;
                }
                "define" => {
                    let name = required_attribute(child, "name")?.trim().to_owned();
                    let pattern = group_of(child, rng_children(child))?;
                    let i = if let Some(i) = self.index.get(&name) {
                        *i
                    } else {
                        self.index.insert(name.clone(), self.defines.len());
                        self.defines.push((name.clone(), Definition::default()));
                        self.defines.len() - 1
                    };
                    let (_, definition) = &mut self.defines[i];
                    if definition.without_combine > 0
                        && child.attribute_value("", "combine").is_none()
                    {
                        return Err(GrammarError::DuplicateDefinition { name });
                    }
                    definition.add(child, pattern)?;
                }
                "div" => self.grammar_content(child)?,
                "include" => return Err(GrammarError::unsupported("include", child.path())),
                other => {
                    return Err(GrammarError::invalid(
                        child.path(),
                        format!("<{other}> is not allowed in a grammar"),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parse_pattern(element: NodeRef<'_>) -> Result<Pattern, GrammarError> {
    Ok(match local(element) {
        "element" => {
            let (name, rest) = name_class_and_content(element, false)?;
            if rest.is_empty() {
                return Err(GrammarError::invalid(
                    element.path(),
                    "an element pattern needs a content pattern",
                ));
            }
            Pattern::Element {
                name,
                content: Box::new(group_of(element, rest)?),
            }
        }
        "attribute" => {
            let (name, rest) = name_class_and_content(element, true)?;
            let value = if rest.is_empty() {
                Pattern::Text
            } else {
                group_of(element, rest)?
            };
            Pattern::Attribute {
                name,
                value: Box::new(value),
            }
        }
        "group" => Pattern::Group(patterns(rng_children(element))?),
        "interleave" => Pattern::Interleave(patterns(rng_children(element))?),
        "choice" => {
            let mut alternatives = patterns(rng_children(element))?;
            if alternatives.len() == 1 {
                alternatives.remove(0)
            } else {
                Pattern::Choice(alternatives)
            }
        }
        "optional" => Pattern::Optional(Box::new(group_of(element, rng_children(element))?)),
        "zeroOrMore" => Pattern::ZeroOrMore(Box::new(group_of(element, rng_children(element))?)),
        "oneOrMore" => Pattern::OneOrMore(Box::new(group_of(element, rng_children(element))?)),
        "mixed" => Pattern::Mixed(Box::new(group_of(element, rng_children(element))?)),
        "list" => Pattern::List(Box::new(group_of(element, rng_children(element))?)),
        "empty" => Pattern::Empty,
        "text" => Pattern::Text,
        "notAllowed" => Pattern::NotAllowed,
        "ref" => Pattern::Ref(required_attribute(element, "name")?.trim().to_owned()),
        "data" => {
            let mut datatype = datatype(element, required_attribute(element, "type")?);
            let mut except = None;
            for child in rng_children(element) {
                match local(child) {
                    "param" => {
                        let name = required_attribute(child, "name")?.trim();
                        if let Some(facet) = Facet::from_param(name, &child.string_value()) {
                            datatype = datatype.with_facet(facet);
                        }
                    }
                    "except" => {
                        let alternatives = patterns(rng_children(child))?;
                        except = Some(Box::new(Pattern::Choice(alternatives)));
                    }
                    other => {
                        return Err(GrammarError::invalid(
                            child.path(),
                            format!("<{other}> is not allowed in <data>"),
                        ));
                    }
                }
            }
            Pattern::Data { datatype, except }
        }
        "value" => Pattern::Value {
            datatype: match element.attribute_value("", "type") {
                Some(name) => datatype(element, name),
                None => Datatype::token(),
            },
            value: element.string_value(),
        },
        name @ ("parentRef" | "externalRef" | "grammar" | "include") => {
            return Err(GrammarError::unsupported(name, element.path()));
        }
        other => {
            return Err(GrammarError::invalid(
                element.path(),
                format!("<{other}> is not a pattern"),
            ));
        }
    })
}

fn patterns<'a>(
    elements: impl Iterator<Item = NodeRef<'a>>,
) -> Result<Vec<Pattern>, GrammarError> {
    elements.map(parse_pattern).collect()
}

/// Children of `define`, `element`, `oneOrMore`... form an implicit group.
fn group_of<'a>(
    parent: NodeRef<'a>,
    elements: impl IntoIterator<Item = NodeRef<'a>>,
) -> Result<Pattern, GrammarError> {
    let mut patterns = patterns(elements.into_iter())?;
    match patterns.len() {
        0 => Err(GrammarError::invalid(parent.path(), "a pattern is expected")),
        1 => Ok(patterns.remove(0)),
        _ => Ok(Pattern::Group(patterns)),
    }
}

/// Reads the name class of an `element` or `attribute` and returns the remaining children.
fn name_class_and_content(
    element: NodeRef<'_>,
    is_attribute: bool,
) -> Result<(NameClass, Vec<NodeRef<'_>>), GrammarError> {
    let mut children: Vec<_> = rng_children(element).collect();
    if let Some(name) = element.attribute_value("", "name") {
        // unprefixed attribute names only use an `ns` attribute set on the attribute itself
        let default_namespace = is_attribute
            .then(|| element.attribute_value("", "ns").unwrap_or_default().to_owned());
        let name_class = resolve_qname(element, name.trim(), default_namespace)?;
        return Ok((name_class, children));
    }
    if children.is_empty() {
        return Err(GrammarError::invalid(element.path(), "a name class is expected"));
    }
    let name_class = parse_name_class(children.remove(0))?;
    Ok((name_class, children))
}

fn parse_name_class(element: NodeRef<'_>) -> Result<NameClass, GrammarError> {
    match local(element) {
        "name" => resolve_qname(element, element.string_value().trim(), None),
        "anyName" => Ok(NameClass::AnyName {
            except: name_class_except(element)?,
        }),
        "nsName" => Ok(NameClass::NsName {
            namespace: inherited(element, "ns").to_owned(),
            except: name_class_except(element)?,
        }),
        "choice" => {
            let mut classes = rng_children(element).map(parse_name_class);
            let first = classes.next().ok_or_else(|| {
                GrammarError::invalid(element.path(), "an empty choice of names")
            })??;
            classes.try_fold(first, |a, b| Ok(NameClass::Choice(Box::new(a), Box::new(b?))))
        }
        other => Err(GrammarError::invalid(
            element.path(),
            format!("<{other}> is not a name class"),
        )),
    }
}

fn name_class_except(element: NodeRef<'_>) -> Result<Option<Box<NameClass>>, GrammarError> {
    let Some(except) = rng_children(element).find(|c| local(*c) == "except") else {
        return Ok(None);
    };
    let mut classes = rng_children(except).map(parse_name_class);
    let Some(first) = classes.next() else {
        return Ok(None);
    };
    let class = classes.try_fold(first?, |a, b| {
        Ok::<_, GrammarError>(NameClass::Choice(Box::new(a), Box::new(b?)))
    })?;
    Ok(Some(Box::new(class)))
}

/// Resolves a QName. Unprefixed names get `default_namespace` or the inherited `ns` attribute.
fn resolve_qname(
    element: NodeRef<'_>,
    qname: &str,
    default_namespace: Option<String>,
) -> Result<NameClass, GrammarError> {
    if let Some((prefix, local)) = qname.split_once(':') {
        let namespace = element.lookup_namespace(Some(prefix)).ok_or_else(|| {
            GrammarError::invalid(
                element.path(),
                format!("the namespace prefix {prefix} is not bound"),
            )
        })?;
        Ok(NameClass::Name {
            namespace: namespace.to_owned(),
            local: local.to_owned(),
        })
    } else {
        Ok(NameClass::Name {
            namespace: default_namespace.unwrap_or_else(|| inherited(element, "ns").to_owned()),
            local: qname.to_owned(),
        })
    }
}

fn datatype(element: NodeRef<'_>, name: &str) -> Datatype {
    Datatype::new(inherited(element, "datatypeLibrary").trim(), name.trim())
}

/// Value of an attribute on the element or its closest ancestor carrying it.
fn inherited<'a>(element: NodeRef<'a>, attribute: &str) -> &'a str {
    std::iter::once(element)
        .chain(element.ancestors())
        .find_map(|e| e.attribute_value("", attribute))
        .unwrap_or_default()
}

fn required_attribute<'a>(element: NodeRef<'a>, name: &str) -> Result<&'a str, GrammarError> {
    element.attribute_value("", name).ok_or_else(|| {
        GrammarError::invalid(element.path(), format!("the attribute {name} is required"))
    })
}

fn is_rng(element: NodeRef<'_>) -> bool {
    element
        .name()
        .is_some_and(|n| n.namespace() == RELAXNG_NAMESPACE)
}

fn local(element: NodeRef<'_>) -> &str {
    element.name().map_or("", |n| n.local())
}

/// Child elements in the RelaxNG namespace, annotations are skipped.
fn rng_children<'a>(element: NodeRef<'a>) -> impl Iterator<Item = NodeRef<'a>> + 'a {
    element.child_elements().filter(|c| is_rng(*c))
}
