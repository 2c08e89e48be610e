//! Schematron rule schemas evaluated on [`oxdom`] trees.
//!
//! A [`Schema`] is compiled once from an [ISO Schematron](https://schematron.com/) document:
//! rule contexts, assertion tests, variables and message parts are parsed as XPath 1.0
//! expressions. [`Schema::validate`] then reports every `assert` whose test is false and every
//! `report` whose test is true as a [`RuleFailure`] located at the node the rule was fired on.
//!
//! The supported XPath is XPath 1.0 without the `following`, `preceding` and `namespace` axes,
//! plus the `exists`, `empty`, `ends-with` and `matches` functions.
//! Schema inclusion, abstract patterns, `extends` and phases are rejected at compilation.

#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![deny(unsafe_code)]

mod error;
mod eval;
mod schema;
mod validator;
mod xpath;

pub use error::RuleCompileError;
pub use schema::{CheckKind, SCHEMATRON_NAMESPACE, Schema};
pub use validator::{RuleFailure, RuleReport};
