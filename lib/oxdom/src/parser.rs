use crate::document::{Document, NodeId, NodeKind, TextPosition};
use crate::error::XmlSyntaxError;
use crate::name::{Name, XML_NAMESPACE, split_qname};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub(crate) fn parse(text: &str) -> Result<Document, XmlSyntaxError> {
    let mut parser = Parser {
        reader: Reader::from_str(text),
        lines: LineIndex::new(text),
        text,
        document: Document::new(),
        stack: vec![NodeId::ROOT],
        scopes: Vec::new(),
    };
    parser.reader.config_mut().expand_empty_elements = true;
    parser.run()?;
    Ok(parser.document)
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
    lines: LineIndex,
    text: &'a str,
    document: Document,
    stack: Vec<NodeId>,
    /// Namespace declarations of each open element.
    scopes: Vec<Vec<(Option<String>, String)>>,
}

impl Parser<'_> {
    fn run(&mut self) -> Result<(), XmlSyntaxError> {
        loop {
            let offset = to_usize(self.reader.buffer_position());
            let position = self.lines.position(self.text, offset);
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(error) => {
                    let offset = to_usize(self.reader.error_position());
                    let position = self.lines.position(self.text, offset);
                    return Err(XmlSyntaxError::from(error).at(position));
                }
            };
            match event {
                Event::Start(event) => {
                    self.start(&event, position).map_err(|e| e.at(position))?;
                }
                Event::End(_) => {
                    self.stack.pop();
                    self.scopes.pop();
                }
                Event::Text(event) => {
                    let text = event
                        .unescape()
                        .map_err(|e| XmlSyntaxError::from(e).at(position))?;
                    self.characters(&text, position)?;
                }
                Event::CData(event) => {
                    let text = std::str::from_utf8(&event)
                        .map_err(|e| XmlSyntaxError::msg(e.to_string()).at(position))?;
                    self.characters(text, position)?;
                }
                Event::Empty(_) => {
                    return Err(XmlSyntaxError::msg(
                        "The expand_empty_elements option must be enabled",
                    ));
                }
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => (),
                Event::Eof => {
                    if self.stack.len() > 1 {
                        return Err(XmlSyntaxError::msg(
                            "Unexpected end of file, some elements are not closed",
                        )
                        .at(position));
                    }
                    if !self.document.has_document_element() {
                        return Err(
                            XmlSyntaxError::msg("The document has no root element").at(position)
                        );
                    }
                    return Ok(());
                }
            }
        }
    }

    fn start(
        &mut self,
        event: &BytesStart<'_>,
        position: TextPosition,
    ) -> Result<(), XmlSyntaxError> {
        let parent = self.stack.last().copied().unwrap_or(NodeId::ROOT);
        if parent == NodeId::ROOT && self.document.has_document_element() {
            return Err(XmlSyntaxError::msg("The document has more than one root element"));
        }

        let mut declarations = Vec::new();
        let mut attributes = Vec::new();
        for attribute in event.attributes() {
            let attribute = attribute?;
            let key = utf8(attribute.key.as_ref())?;
            let value = attribute.unescape_value()?.into_owned();
            if key == "xmlns" {
                declarations.push((None, value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                if prefix == "xmlns" || (prefix == "xml" && value != XML_NAMESPACE) {
                    return Err(XmlSyntaxError::msg(format!(
                        "The prefix {prefix} can not be redeclared"
                    )));
                }
                if value.is_empty() {
                    return Err(XmlSyntaxError::msg(format!(
                        "The prefix {prefix} can not be undeclared"
                    )));
                }
                declarations.push((Some(prefix.to_owned()), value));
            } else {
                attributes.push((key.to_owned(), value));
            }
        }
        self.scopes.push(declarations.clone());

        let raw_name = event.name();
        let qname = utf8(raw_name.as_ref())?;
        let (prefix, local) = split_qname(qname);
        let namespace = self.resolve(prefix)?;
        let element = self.document.push(
            parent,
            NodeKind::Element {
                name: Name::new(prefix, local, namespace.unwrap_or_default()),
                attributes: Vec::new(),
                children: Vec::new(),
                namespaces: declarations,
            },
            position,
        );

        let mut names: Vec<Name> = Vec::with_capacity(attributes.len());
        for (key, value) in attributes {
            let (prefix, local) = split_qname(&key);
            let namespace = match prefix {
                Some(_) => self.resolve(prefix)?.unwrap_or_default(),
                None => String::new(),
            };
            let name = Name::new(prefix, local, namespace);
            if names.contains(&name) {
                return Err(XmlSyntaxError::msg(format!("The attribute {name} is repeated")));
            }
            names.push(name.clone());
            self.document
                .push(element, NodeKind::Attribute { name, value }, position);
        }
        self.stack.push(element);
        Ok(())
    }

    fn characters(&mut self, text: &str, position: TextPosition) -> Result<(), XmlSyntaxError> {
        match self.stack.last().copied() {
            Some(parent) if parent != NodeId::ROOT => {
                self.document.push_text(parent, text, position);
                Ok(())
            }
            _ => {
                if text.trim().is_empty() {
                    Ok(())
                } else {
                    Err(
                        XmlSyntaxError::msg("Text is not allowed outside of the root element")
                            .at(position),
                    )
                }
            }
        }
    }

    /// Resolves a prefix against the open scopes. Unprefixed names use the default namespace.
    fn resolve(&self, prefix: Option<&str>) -> Result<Option<String>, XmlSyntaxError> {
        if prefix == Some("xml") {
            return Ok(Some(XML_NAMESPACE.into()));
        }
        for scope in self.scopes.iter().rev() {
            if let Some((_, namespace)) = scope.iter().find(|(p, _)| p.as_deref() == prefix) {
                return Ok(if namespace.is_empty() {
                    None
                } else {
                    Some(namespace.clone())
                });
            }
        }
        match prefix {
            Some(prefix) => Err(XmlSyntaxError::msg(format!(
                "The namespace prefix {prefix} is not bound"
            ))),
            None => Ok(None),
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, XmlSyntaxError> {
    std::str::from_utf8(bytes).map_err(|e| XmlSyntaxError::msg(e.to_string()))
}

fn to_usize(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

/// Byte offsets of line starts, used to turn reader offsets into line and column numbers.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn position(&self, text: &str, offset: usize) -> TextPosition {
        let offset = offset.min(text.len());
        let line = self.starts.partition_point(|start| *start <= offset).max(1);
        let start = self.starts[line - 1];
        let column = text
            .get(start..offset)
            .map_or(offset - start, |s| s.chars().count());
        TextPosition {
            line: u64::try_from(line).unwrap_or(u64::MAX),
            column: u64::try_from(column).unwrap_or(u64::MAX).saturating_add(1),
        }
    }
}
