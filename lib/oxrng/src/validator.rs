use crate::derivative::{
    Compiler, Residual, attribute_deriv, choice, drop_attributes, end_tag, expected_elements,
    force_end_tag, is_not_allowed, is_whitespace, required_attributes, start_tag_close,
    text_deriv,
};
use crate::model::Grammar;
use oxdom::{Document, Name, NodeRef, TextPosition};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// The kind of a structural violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ViolationKind {
    /// The element is not allowed at this position.
    ElementNotAllowed,
    /// The element does not accept this attribute or this attribute value.
    AttributeNotAllowed,
    /// Some required attributes are missing.
    MissingAttribute,
    /// Character content where none is allowed or that does not match a datatype.
    TextNotAllowed,
    /// The end tag came before the required content.
    IncompleteContent,
}

/// A mismatch between a document and the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralViolation {
    kind: ViolationKind,
    message: String,
    path: String,
    position: TextPosition,
}

impl StructuralViolation {
    #[inline]
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Path of the offending node, like `/body[1]/heading[1]`.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn position(&self) -> TextPosition {
        self.position
    }
}

impl fmt::Display for StructuralViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The violations found in a document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralReport {
    violations: Vec<StructuralViolation>,
}

impl StructuralReport {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    #[inline]
    pub fn violations(&self) -> &[StructuralViolation] {
        &self.violations
    }

    #[inline]
    pub fn into_violations(self) -> Vec<StructuralViolation> {
        self.violations
    }
}

/// Checks documents against the start alternatives of a grammar.
///
/// ```
/// use oxdom::Document;
/// use oxrng::{Grammar, StructuralValidator};
///
/// let grammar = Grammar::parse(r#"<element name="body" xmlns="http://relaxng.org/ns/structure/1.0">
///   <zeroOrMore><element name="p"><text/></element></zeroOrMore>
/// </element>"#)?;
/// let validator = StructuralValidator::new(&grammar);
/// assert!(validator.validate(&Document::parse("<body><p>hi</p></body>")?).is_valid());
/// let report = validator.validate(&Document::parse("<body><head/></body>")?);
/// assert_eq!(report.violations()[0].path(), "/body[1]/head[1]");
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StructuralValidator<'g> {
    grammar: &'g Grammar,
}

impl<'g> StructuralValidator<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Validates the document element against the start choice.
    ///
    /// Validation goes on after a violation: unexpected elements are skipped with their
    /// subtree, unexpected attributes and text are skipped, missing attributes are assumed
    /// present and incomplete elements are closed anyway.
    pub fn validate(&self, document: &Document) -> StructuralReport {
        let mut run = Run {
            compiler: Compiler::new(self.grammar),
            violations: Vec::new(),
        };
        let start = run.compiler.start();
        run.document(&start, document.document_element());
        StructuralReport {
            violations: run.violations,
        }
    }
}

struct Run<'g> {
    compiler: Compiler<'g>,
    violations: Vec<StructuralViolation>,
}

/// An element whose start tag is matched and whose children are being matched.
struct OpenElement<'d, 'g> {
    element: NodeRef<'d>,
    name: &'d Name,
    /// The residual before the start tag, to go on if the element can not be closed.
    before: Residual<'g>,
    /// The residual of the content matched so far.
    content: Residual<'g>,
    children: Vec<NodeRef<'d>>,
    next_child: usize,
}

impl<'g> Run<'g> {
    fn report(&mut self, kind: ViolationKind, node: NodeRef<'_>, message: String) {
        trace!("{kind:?} at {}: {message}", node.path());
        self.violations.push(StructuralViolation {
            kind,
            message,
            path: node.path(),
            position: node.position(),
        });
    }

    /// Walks the tree depth-first with an explicit stack, the documents being arbitrarily deep.
    fn document(&mut self, start: &Residual<'g>, root: NodeRef<'_>) {
        let mut stack = Vec::new();
        stack.extend(self.start_tag(start, root));
        while let Some(open) = stack.last_mut() {
            let Some(child) = open.children.get(open.next_child).copied() else {
                let Some(open) = stack.pop() else {
                    break;
                };
                let after = self.close(open);
                if let Some(parent) = stack.last_mut() {
                    parent.content = after;
                }
                continue;
            };
            open.next_child += 1;
            if child.is_element() {
                let opened = self.start_tag(&open.content, child);
                stack.extend(opened);
            } else if let Some(text) = child.text() {
                if is_whitespace(text) {
                    continue;
                }
                let next = text_deriv(&open.content, text);
                if is_not_allowed(&next) {
                    self.report(
                        ViolationKind::TextNotAllowed,
                        child,
                        format!("text \"{}\" not allowed here", shorten(text)),
                    );
                } else {
                    open.content = next;
                }
            }
        }
    }

    /// Matches the start tag and the attributes of an element.
    ///
    /// Returns `None` if the element is not allowed, the residual `p` being kept unchanged.
    fn start_tag<'d>(
        &mut self,
        p: &Residual<'g>,
        element: NodeRef<'d>,
    ) -> Option<OpenElement<'d, 'g>> {
        let name = element.name()?;
        trace!("start tag {name} at {}", element.path());
        let opened = self.compiler.start_tag_open(p, name);
        if is_not_allowed(&opened) {
            let mut message = format!("element \"{name}\" not allowed here");
            let mut expected = Vec::new();
            expected_elements(p, &mut expected);
            if !expected.is_empty() {
                message.push_str("; expected element ");
                message.push_str(&expected.join(", "));
            }
            self.report(ViolationKind::ElementNotAllowed, element, message);
            return None;
        }

        let mut current = opened;
        for attribute in element.attributes() {
            let (Some(attribute_name), Some(value)) = (attribute.name(), attribute.text()) else {
                continue;
            };
            let next = attribute_deriv(&current, attribute_name, Some(value));
            if !is_not_allowed(&next) {
                current = next;
                continue;
            }
            self.report(
                ViolationKind::AttributeNotAllowed,
                attribute,
                format!(
                    "attribute \"{attribute_name}\" with value \"{}\" not allowed on element \"{name}\"",
                    shorten(value)
                ),
            );
            // an expected attribute with a wrong value is not missing too
            let by_name = attribute_deriv(&current, attribute_name, None);
            if !is_not_allowed(&by_name) {
                current = by_name;
            }
        }

        let mut closed = start_tag_close(&current);
        if is_not_allowed(&closed) {
            let mut missing = Vec::new();
            required_attributes(&current, &mut missing);
            self.report(
                ViolationKind::MissingAttribute,
                element,
                format!(
                    "element \"{name}\" missing required attribute {}",
                    missing.join(", ")
                ),
            );
            closed = start_tag_close(&drop_attributes(&current));
        }

        if element.child_elements().next().is_none() {
            // Only character data: it is matched as a whole, even when empty.
            let content = self.text_content(closed, element);
            return Some(OpenElement {
                element,
                name,
                before: Rc::clone(p),
                content,
                children: Vec::new(),
                next_child: 0,
            });
        }
        Some(OpenElement {
            element,
            name,
            before: Rc::clone(p),
            content: closed,
            children: element.children().collect(),
            next_child: 0,
        })
    }

    fn text_content(&mut self, p: Residual<'g>, element: NodeRef<'_>) -> Residual<'g> {
        let text_node = element.children().find(|c| c.is_text());
        let text = text_node.and_then(|t| t.text()).unwrap_or_default();
        let derived = text_deriv(&p, text);
        let next = if is_whitespace(text) {
            choice(Rc::clone(&p), derived)
        } else {
            derived
        };
        if is_not_allowed(&next) {
            self.report(
                ViolationKind::TextNotAllowed,
                text_node.unwrap_or(element),
                format!("text \"{}\" not allowed here", shorten(text)),
            );
            return p;
        }
        next
    }

    /// Matches the end tag of an element and returns the residual that follows it.
    fn close(&mut self, open: OpenElement<'_, 'g>) -> Residual<'g> {
        let ended = end_tag(&open.content);
        if !is_not_allowed(&ended) {
            return ended;
        }
        let mut message = format!("element \"{}\" incomplete", open.name);
        let mut expected = Vec::new();
        expected_elements(&open.content, &mut expected);
        if !expected.is_empty() {
            message.push_str("; missing required element ");
            message.push_str(&expected.join(", "));
        }
        self.report(ViolationKind::IncompleteContent, open.element, message);
        let forced = force_end_tag(&open.content);
        if is_not_allowed(&forced) {
            open.before
        } else {
            forced
        }
    }
}

fn shorten(text: &str) -> String {
    const MAX: usize = 40;
    let text = text.trim();
    if text.chars().count() <= MAX {
        text.to_owned()
    } else {
        let mut shortened: String = text.chars().take(MAX).collect();
        shortened.push('…');
        shortened
    }
}
