//! A small, read-only XML element tree.
//!
//! Documents are parsed with [quick-xml](https://docs.rs/quick-xml) into an arena of nodes
//! numbered in document order. Element and attribute names are resolved against the in-scope
//! namespace declarations and every node remembers where it starts in the source text.
//!
//! ```
//! use oxdom::Document;
//!
//! let document = Document::parse(r#"<body xmlns="http://www.tei-c.org/ns/1.0"><p n="1">hi</p></body>"#)?;
//! let body = document.document_element();
//! assert_eq!(body.name().map(|n| n.local()), Some("body"));
//! let p = body.child_elements().next().unwrap();
//! assert_eq!(p.attribute_value("", "n"), Some("1"));
//! assert_eq!(p.path(), "/body[1]/p[1]");
//! # Result::<_, oxdom::XmlSyntaxError>::Ok(())
//! ```

#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![deny(unsafe_code)]

mod document;
mod error;
mod name;
mod parser;

pub use document::{Descendants, Document, NodeId, NodeKind, NodeRef, TextPosition};
pub use error::XmlSyntaxError;
pub use name::{Name, XML_NAMESPACE, XMLNS_NAMESPACE};
