//! Residual patterns and their derivatives with respect to the events of an XML tree.
//!
//! A residual is what remains to be matched after consuming a prefix of the input. Choices keep
//! every viable interpretation alive so ambiguous content models are matched without
//! backtracking.

use crate::datatype::Datatype;
use crate::model::{Grammar, NameClass, Pattern};
use oxdom::Name;
use rustc_hash::FxHashMap;
use std::rc::Rc;

pub(crate) type Residual<'g> = Rc<Node<'g>>;

#[derive(Debug)]
pub(crate) enum Node<'g> {
    Empty,
    NotAllowed,
    Text,
    Choice(Residual<'g>, Residual<'g>),
    Interleave(Residual<'g>, Residual<'g>),
    Group(Residual<'g>, Residual<'g>),
    OneOrMore(Residual<'g>),
    /// An element whose content is compiled when its start tag is seen.
    Element(&'g NameClass, &'g Pattern),
    Attribute(&'g NameClass, Residual<'g>),
    Data(&'g Datatype, Option<Residual<'g>>),
    Value(&'g Datatype, &'g str),
    List(Residual<'g>),
    /// Content of the current element, then what follows its end tag.
    After(Residual<'g>, Residual<'g>),
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        // Continuations are as deep as the document, so the comparison keeps its own stack.
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if std::ptr::eq(a, b) {
                continue;
            }
            match (a, b) {
                (Self::Empty, Self::Empty)
                | (Self::NotAllowed, Self::NotAllowed)
                | (Self::Text, Self::Text) => (),
                (Self::Choice(a1, b1), Self::Choice(a2, b2))
                | (Self::Interleave(a1, b1), Self::Interleave(a2, b2))
                | (Self::Group(a1, b1), Self::Group(a2, b2))
                | (Self::After(a1, b1), Self::After(a2, b2)) => {
                    pending.push((&**a1, &**a2));
                    pending.push((&**b1, &**b2));
                }
                (Self::OneOrMore(a), Self::OneOrMore(b)) | (Self::List(a), Self::List(b)) => {
                    pending.push((&**a, &**b));
                }
                (Self::Element(n1, c1), Self::Element(n2, c2)) => {
                    if !std::ptr::eq(*n1, *n2) || !std::ptr::eq(*c1, *c2) {
                        return false;
                    }
                }
                (Self::Attribute(n1, v1), Self::Attribute(n2, v2)) => {
                    if !std::ptr::eq(*n1, *n2) {
                        return false;
                    }
                    pending.push((&**v1, &**v2));
                }
                (Self::Data(d1, e1), Self::Data(d2, e2)) => {
                    if !std::ptr::eq(*d1, *d2) {
                        return false;
                    }
                    match (e1, e2) {
                        (Some(e1), Some(e2)) => pending.push((&**e1, &**e2)),
                        (None, None) => (),
                        _ => return false,
                    }
                }
                (Self::Value(d1, v1), Self::Value(d2, v2)) => {
                    if !std::ptr::eq(*d1, *d2) || v1 != v2 {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

fn same(a: &Residual<'_>, b: &Residual<'_>) -> bool {
    Rc::ptr_eq(a, b) || **a == **b
}

pub(crate) fn empty<'g>() -> Residual<'g> {
    Rc::new(Node::Empty)
}

pub(crate) fn not_allowed<'g>() -> Residual<'g> {
    Rc::new(Node::NotAllowed)
}

#[inline]
pub(crate) fn is_not_allowed(p: &Residual<'_>) -> bool {
    matches!(**p, Node::NotAllowed)
}

fn choice_contains(choice: &Residual<'_>, p: &Residual<'_>) -> bool {
    match &**choice {
        Node::Choice(a, b) => choice_contains(a, p) || choice_contains(b, p),
        _ => same(choice, p),
    }
}

pub(crate) fn choice<'g>(a: Residual<'g>, b: Residual<'g>) -> Residual<'g> {
    if is_not_allowed(&b) || choice_contains(&a, &b) {
        return a;
    }
    if is_not_allowed(&a) {
        return b;
    }
    Rc::new(Node::Choice(a, b))
}

#[inline]
fn is_empty(p: &Residual<'_>) -> bool {
    matches!(**p, Node::Empty)
}

pub(crate) fn group<'g>(a: Residual<'g>, b: Residual<'g>) -> Residual<'g> {
    if is_not_allowed(&a) || is_empty(&b) {
        a
    } else if is_not_allowed(&b) || is_empty(&a) {
        b
    } else {
        Rc::new(Node::Group(a, b))
    }
}

pub(crate) fn interleave<'g>(a: Residual<'g>, b: Residual<'g>) -> Residual<'g> {
    if is_not_allowed(&a) || is_empty(&b) {
        a
    } else if is_not_allowed(&b) || is_empty(&a) {
        b
    } else {
        Rc::new(Node::Interleave(a, b))
    }
}

pub(crate) fn after<'g>(a: Residual<'g>, b: Residual<'g>) -> Residual<'g> {
    if is_not_allowed(&a) {
        a
    } else if is_not_allowed(&b) {
        b
    } else {
        Rc::new(Node::After(a, b))
    }
}

pub(crate) fn one_or_more(a: Residual<'_>) -> Residual<'_> {
    if is_not_allowed(&a) {
        a
    } else {
        Rc::new(Node::OneOrMore(a))
    }
}

/// Compiles grammar patterns into residuals, expanding references up to element boundaries.
pub(crate) struct Compiler<'g> {
    grammar: &'g Grammar,
    productions: FxHashMap<&'g str, Residual<'g>>,
    contents: FxHashMap<*const Pattern, Residual<'g>>,
}

impl<'g> Compiler<'g> {
    pub(crate) fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            productions: FxHashMap::default(),
            contents: FxHashMap::default(),
        }
    }

    /// The choice of all start alternatives.
    pub(crate) fn start(&mut self) -> Residual<'g> {
        let mut start = not_allowed();
        for alternative in self.grammar.start_alternatives() {
            let alternative = self.compile(alternative);
            start = choice(start, alternative);
        }
        start
    }

    pub(crate) fn compile(&mut self, pattern: &'g Pattern) -> Residual<'g> {
        match pattern {
            Pattern::Empty => empty(),
            Pattern::NotAllowed => not_allowed(),
            Pattern::Text => Rc::new(Node::Text),
            Pattern::Group(patterns) => {
                let mut result = empty();
                for p in patterns {
                    let p = self.compile(p);
                    result = group(result, p);
                }
                result
            }
            Pattern::Interleave(patterns) => {
                let mut result = empty();
                for p in patterns {
                    let p = self.compile(p);
                    result = interleave(result, p);
                }
                result
            }
            Pattern::Choice(patterns) => {
                let mut result = not_allowed();
                for p in patterns {
                    let p = self.compile(p);
                    result = choice(result, p);
                }
                result
            }
            Pattern::Optional(p) => choice(self.compile(p), empty()),
            Pattern::ZeroOrMore(p) => choice(one_or_more(self.compile(p)), empty()),
            Pattern::OneOrMore(p) => one_or_more(self.compile(p)),
            Pattern::Mixed(p) => interleave(self.compile(p), Rc::new(Node::Text)),
            Pattern::Element { name, content } => Rc::new(Node::Element(name, content)),
            Pattern::Attribute { name, value } => Rc::new(Node::Attribute(name, self.compile(value))),
            Pattern::Ref(name) => self.production(name),
            Pattern::Data { datatype, except } => {
                let except = except.as_deref().map(|e| self.compile(e));
                Rc::new(Node::Data(datatype, except))
            }
            Pattern::Value { datatype, value } => Rc::new(Node::Value(datatype, value)),
            Pattern::List(p) => Rc::new(Node::List(self.compile(p))),
        }
    }

    fn production(&mut self, name: &str) -> Residual<'g> {
        if let Some(residual) = self.productions.get(name) {
            return Rc::clone(residual);
        }
        let Some(production) = self.grammar.production(name) else {
            return not_allowed();
        };
        // No cycle can be reached without an element, so this terminates.
        let residual = self.compile(production.pattern());
        self.productions
            .insert(production.name(), Rc::clone(&residual));
        residual
    }

    fn content(&mut self, content: &'g Pattern) -> Residual<'g> {
        let key: *const Pattern = content;
        if let Some(residual) = self.contents.get(&key) {
            return Rc::clone(residual);
        }
        let residual = self.compile(content);
        self.contents.insert(key, Rc::clone(&residual));
        residual
    }

    pub(crate) fn start_tag_open(&mut self, p: &Residual<'g>, name: &Name) -> Residual<'g> {
        match &**p {
            Node::Choice(a, b) => {
                let a = self.start_tag_open(a, name);
                let b = self.start_tag_open(b, name);
                choice(a, b)
            }
            Node::Element(name_class, content) => {
                if name_class.contains(name) {
                    after(self.content(content), empty())
                } else {
                    not_allowed()
                }
            }
            Node::Interleave(a, b) => {
                let left = self.start_tag_open(a, name);
                let left = apply_after(&left, &|r| interleave(r, Rc::clone(b)));
                let right = self.start_tag_open(b, name);
                let right = apply_after(&right, &|r| interleave(Rc::clone(a), r));
                choice(left, right)
            }
            Node::OneOrMore(a) => {
                let opened = self.start_tag_open(a, name);
                apply_after(&opened, &|r| group(r, choice(Rc::clone(p), empty())))
            }
            Node::Group(a, b) => {
                let opened = self.start_tag_open(a, name);
                let left = apply_after(&opened, &|r| group(r, Rc::clone(b)));
                if nullable(a) {
                    let right = self.start_tag_open(b, name);
                    choice(left, right)
                } else {
                    left
                }
            }
            Node::After(a, b) => {
                let opened = self.start_tag_open(a, name);
                apply_after(&opened, &|r| after(r, Rc::clone(b)))
            }
            _ => not_allowed(),
        }
    }
}

fn apply_after<'g>(
    p: &Residual<'g>,
    f: &dyn Fn(Residual<'g>) -> Residual<'g>,
) -> Residual<'g> {
    match &**p {
        Node::After(a, b) => after(Rc::clone(a), f(Rc::clone(b))),
        Node::Choice(a, b) => choice(apply_after(a, f), apply_after(b, f)),
        _ => not_allowed(),
    }
}

pub(crate) fn nullable(p: &Node<'_>) -> bool {
    match p {
        Node::Empty | Node::Text => true,
        Node::Group(a, b) | Node::Interleave(a, b) => nullable(a) && nullable(b),
        Node::Choice(a, b) => nullable(a) || nullable(b),
        Node::OneOrMore(a) => nullable(a),
        _ => false,
    }
}

pub(crate) fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

pub(crate) fn text_deriv<'g>(p: &Residual<'g>, text: &str) -> Residual<'g> {
    match &**p {
        Node::Choice(a, b) => choice(text_deriv(a, text), text_deriv(b, text)),
        Node::Interleave(a, b) => choice(
            interleave(text_deriv(a, text), Rc::clone(b)),
            interleave(Rc::clone(a), text_deriv(b, text)),
        ),
        Node::Group(a, b) => {
            let left = group(text_deriv(a, text), Rc::clone(b));
            if nullable(a) {
                choice(left, text_deriv(b, text))
            } else {
                left
            }
        }
        Node::After(a, b) => after(text_deriv(a, text), Rc::clone(b)),
        Node::OneOrMore(a) => group(text_deriv(a, text), choice(Rc::clone(p), empty())),
        Node::Text => Rc::clone(p),
        Node::Value(datatype, value) => {
            if datatype.equals(value, text) {
                empty()
            } else {
                not_allowed()
            }
        }
        Node::Data(datatype, except) => {
            let excluded = except
                .as_ref()
                .is_some_and(|e| nullable(&text_deriv(e, text)));
            if datatype.allows(text) && !excluded {
                empty()
            } else {
                not_allowed()
            }
        }
        Node::List(a) => {
            let mut residual = Rc::clone(a);
            for token in text.split_ascii_whitespace() {
                residual = text_deriv(&residual, token);
            }
            if nullable(&residual) {
                empty()
            } else {
                not_allowed()
            }
        }
        _ => not_allowed(),
    }
}

fn value_matches(p: &Residual<'_>, value: &str) -> bool {
    (nullable(p) && is_whitespace(value)) || nullable(&text_deriv(p, value))
}

/// Derives with respect to an attribute. Without a value, only its name is matched, to go on
/// after an invalid value.
pub(crate) fn attribute_deriv<'g>(
    p: &Residual<'g>,
    name: &Name,
    value: Option<&str>,
) -> Residual<'g> {
    match &**p {
        Node::After(a, b) => after(attribute_deriv(a, name, value), Rc::clone(b)),
        Node::Choice(a, b) => choice(
            attribute_deriv(a, name, value),
            attribute_deriv(b, name, value),
        ),
        Node::Group(a, b) => choice(
            group(attribute_deriv(a, name, value), Rc::clone(b)),
            group(Rc::clone(a), attribute_deriv(b, name, value)),
        ),
        Node::Interleave(a, b) => choice(
            interleave(attribute_deriv(a, name, value), Rc::clone(b)),
            interleave(Rc::clone(a), attribute_deriv(b, name, value)),
        ),
        Node::OneOrMore(a) => group(
            attribute_deriv(a, name, value),
            choice(Rc::clone(p), empty()),
        ),
        Node::Attribute(name_class, value_pattern) => {
            if name_class.contains(name) && value.is_none_or(|v| value_matches(value_pattern, v)) {
                empty()
            } else {
                not_allowed()
            }
        }
        _ => not_allowed(),
    }
}

pub(crate) fn start_tag_close<'g>(p: &Residual<'g>) -> Residual<'g> {
    match &**p {
        Node::After(a, b) => after(start_tag_close(a), Rc::clone(b)),
        Node::Choice(a, b) => choice(start_tag_close(a), start_tag_close(b)),
        Node::Group(a, b) => group(start_tag_close(a), start_tag_close(b)),
        Node::Interleave(a, b) => interleave(start_tag_close(a), start_tag_close(b)),
        Node::OneOrMore(a) => one_or_more(start_tag_close(a)),
        Node::Attribute(..) => not_allowed(),
        _ => Rc::clone(p),
    }
}

/// Replaces the attributes still expected by `empty`, to go on after a missing attribute.
pub(crate) fn drop_attributes<'g>(p: &Residual<'g>) -> Residual<'g> {
    match &**p {
        Node::After(a, b) => after(drop_attributes(a), Rc::clone(b)),
        Node::Choice(a, b) => choice(drop_attributes(a), drop_attributes(b)),
        Node::Group(a, b) => group(drop_attributes(a), drop_attributes(b)),
        Node::Interleave(a, b) => interleave(drop_attributes(a), drop_attributes(b)),
        Node::OneOrMore(a) => one_or_more(drop_attributes(a)),
        Node::Attribute(..) => empty(),
        _ => Rc::clone(p),
    }
}

pub(crate) fn end_tag<'g>(p: &Residual<'g>) -> Residual<'g> {
    match &**p {
        Node::Choice(a, b) => choice(end_tag(a), end_tag(b)),
        Node::After(a, b) => {
            if nullable(a) {
                Rc::clone(b)
            } else {
                not_allowed()
            }
        }
        _ => not_allowed(),
    }
}

/// Closes the current element even if its content is incomplete.
pub(crate) fn force_end_tag<'g>(p: &Residual<'g>) -> Residual<'g> {
    match &**p {
        Node::Choice(a, b) => choice(force_end_tag(a), force_end_tag(b)),
        Node::After(_, b) => Rc::clone(b),
        _ => not_allowed(),
    }
}

/// Names of the elements that could come next, for error messages.
pub(crate) fn expected_elements(p: &Node<'_>, names: &mut Vec<String>) {
    match p {
        Node::Choice(a, b) | Node::Interleave(a, b) => {
            expected_elements(a, names);
            expected_elements(b, names);
        }
        Node::Group(a, b) => {
            expected_elements(a, names);
            if nullable(a) {
                expected_elements(b, names);
            }
        }
        Node::OneOrMore(a) | Node::After(a, _) => expected_elements(a, names),
        Node::Element(name_class, _) => {
            let name = name_class.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        _ => (),
    }
}

/// Names of the attributes that must still be present, for error messages.
pub(crate) fn required_attributes(p: &Node<'_>, names: &mut Vec<String>) {
    if nullable(p) {
        return;
    }
    match p {
        Node::Choice(a, b) | Node::Interleave(a, b) | Node::Group(a, b) => {
            required_attributes(a, names);
            required_attributes(b, names);
        }
        Node::OneOrMore(a) | Node::After(a, _) => required_attributes(a, names),
        Node::Attribute(name_class, _) => {
            let name = name_class.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        _ => (),
    }
}
