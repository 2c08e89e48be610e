//! Validation of XML fragments against a structural grammar written for whole documents and a
//! set of rules.
//!
//! A [`GrammarStore`] holds a RelaxNG grammar and a Schematron schema, loaded once.
//! [`GrammarStore::validate`] checks a fragment whose root element is described by any production
//! of the grammar (the *anchor*):
//! 1. the anchor is [resolved](oxrng::resolve) to a production, `tei:body` naming `tei_body`;
//! 2. a derived grammar accepting both the original documents and fragments rooted at the anchor
//!    is built by [`oxrng::rewrite`] without touching the canonical grammar;
//! 3. the fragment is matched against it by [`check_structure`] and the rules are evaluated by
//!    [`check_rules`];
//! 4. both outcomes are merged by [`aggregate`] into a [`ValidationResult`].
//!
//! A fragment that is not well-formed or an unknown anchor rejects the request with a
//! [`RequestError`] instead of producing diagnostics.
//!
//! ```
//! use oxfragval::{DiagnosticKind, GrammarStore};
//!
//! let store = GrammarStore::from_sources(
//!     r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0" ns="http://www.tei-c.org/ns/1.0">
//!       <start><ref name="TEI"/></start>
//!       <define name="TEI"><element name="TEI"><ref name="tei_body"/></element></define>
//!       <define name="tei_body"><element name="body"><zeroOrMore><ref name="tei_p"/></zeroOrMore></element></define>
//!       <define name="tei_p"><element name="p"><optional><attribute name="n"/></optional><text/></element></define>
//!     </grammar>"#,
//!     r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
//!       <ns prefix="tei" uri="http://www.tei-c.org/ns/1.0"/>
//!       <pattern><rule context="tei:p"><assert test="@n">A paragraph must be numbered</assert></rule></pattern>
//!     </schema>"#,
//! )?;
//!
//! let result = store.validate(
//!     r#"<body xmlns="http://www.tei-c.org/ns/1.0"><p n="1">a</p><p>b</p><head/></body>"#,
//!     "tei:body",
//! )?;
//! assert!(!result.is_valid());
//! assert_eq!(result.diagnostics()[0].kind(), DiagnosticKind::StructuralViolation);
//! assert_eq!(
//!     result.error_lines()[1],
//!     "/body[1]/p[2]: A paragraph must be numbered"
//! );
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![deny(unsafe_code)]

mod aggregate;
mod config;
mod diagnostic;
mod error;
mod rules;
mod store;
mod structural;
mod validator;

pub use aggregate::{VALID_EXPLANATION, aggregate};
pub use config::{RELAXNG_PATH_VAR, SCHEMATRON_PATH_VAR, ValidatorConfig};
pub use diagnostic::{Diagnostic, DiagnosticKind, Location, Severity, ValidationResult};
pub use error::{Error, LoadError, RequestError, SourceError};
pub use rules::check_rules;
pub use store::GrammarStore;
pub use structural::{StructuralCheck, check_structure};
pub use validator::validate;
