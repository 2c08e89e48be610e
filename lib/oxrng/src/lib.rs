//! RelaxNG structural grammars that can be re-anchored on any of their productions.
//!
//! A [`Grammar`] is loaded once from the RelaxNG XML syntax and never modified afterwards.
//! To validate a fragment rooted at some element instead of a whole document, the element name is
//! [resolved](resolve) to a production and a [`DerivedGrammar`] is built by [`rewrite`]: its
//! start choice is the original one plus a reference to that production, so it still accepts
//! whole documents.
//!
//! Conformance is checked by [`StructuralValidator`] with the derivative algorithm described by
//! James Clark in [An algorithm for RELAX NG validation](https://relaxng.org/jclark/derivative.html).
//!
//! ```
//! use oxdom::Document;
//! use oxrng::{Grammar, StructuralValidator, resolve, rewrite};
//!
//! let grammar = Grammar::parse(r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
//!   <start><ref name="TEI"/></start>
//!   <define name="TEI"><element name="TEI"><ref name="tei_body"/></element></define>
//!   <define name="tei_body"><element name="body"><zeroOrMore><ref name="p"/></zeroOrMore></element></define>
//!   <define name="p"><element name="p"><text/></element></define>
//! </grammar>"#)?;
//!
//! let fragment = Document::parse("<body><p>hi</p></body>")?;
//! assert!(!StructuralValidator::new(&grammar).validate(&fragment).is_valid());
//!
//! let derived = rewrite(&grammar, &resolve(&grammar, "tei:body")?);
//! assert!(StructuralValidator::new(derived.grammar()).validate(&fragment).is_valid());
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![deny(unsafe_code)]

mod anchor;
mod datatype;
mod derivative;
mod error;
mod model;
mod parser;
mod rewrite;
mod validator;

pub use anchor::{AnchorName, normalize, resolve};
pub use datatype::{Datatype, Facet, XSD_DATATYPES};
pub use error::{GrammarError, UnknownAnchorError};
pub use model::{Grammar, NameClass, Pattern, Production};
pub use parser::RELAXNG_NAMESPACE;
pub use rewrite::{DerivedGrammar, rewrite};
pub use validator::{StructuralReport, StructuralValidator, StructuralViolation, ViolationKind};
