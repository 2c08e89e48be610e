use crate::aggregate::aggregate;
use crate::config::ValidatorConfig;
use crate::diagnostic::ValidationResult;
use crate::error::{Error, RequestError};
use crate::rules::check_rules;
use crate::store::GrammarStore;
use crate::structural::check_structure;
use oxdom::Document;
use oxrng::{resolve, rewrite};
use std::fs;
use std::path::Path;
use tracing::debug;

impl GrammarStore {
    /// Validates a fragment whose root element is described by the `anchor` production.
    ///
    /// The anchor is a production name, `tei:body` and `tei_body` being equivalent.
    /// The fragment may also be a whole document accepted by the original start of the grammar.
    ///
    /// ```
    /// use oxfragval::GrammarStore;
    ///
    /// let store = GrammarStore::from_sources(
    ///     r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
    ///       <start><ref name="TEI"/></start>
    ///       <define name="TEI"><element name="TEI"><ref name="tei_body"/></element></define>
    ///       <define name="tei_body"><element name="body"><zeroOrMore><ref name="p"/></zeroOrMore></element></define>
    ///       <define name="p"><element name="p"><text/></element></define>
    ///     </grammar>"#,
    ///     r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron"/>"#,
    /// )?;
    /// assert!(store.validate("<body><p>hi</p></body>", "tei:body")?.is_valid());
    ///
    /// let result = store.validate("<body><head/></body>", "tei:body")?;
    /// assert_eq!(result.error_lines().len(), 1);
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn validate(&self, fragment: &str, anchor: &str) -> Result<ValidationResult, RequestError> {
        let anchor = resolve(self.grammar(), anchor)?;
        let derived = rewrite(self.grammar(), &anchor);
        let document = Document::parse(fragment)?;
        let result = aggregate(
            check_structure(&document, derived.grammar()),
            check_rules(&document, self.rule_grammar()),
        );
        debug!(
            "Validated a fragment anchored on {anchor}: {} diagnostics",
            result.diagnostics().len()
        );
        Ok(result)
    }

    /// Validates a whole document against the original start of the grammar.
    pub fn validate_document(&self, document: &str) -> Result<ValidationResult, RequestError> {
        let document = Document::parse(document)?;
        let result = aggregate(
            check_structure(&document, self.grammar()),
            check_rules(&document, self.rule_grammar()),
        );
        debug!(
            "Validated a document: {} diagnostics",
            result.diagnostics().len()
        );
        Ok(result)
    }

    /// Reads and validates a file, as a fragment if an anchor is given or else as a whole document.
    pub fn validate_file(
        &self,
        path: impl AsRef<Path>,
        anchor: Option<&str>,
    ) -> Result<ValidationResult, RequestError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RequestError::Read {
            path: path.into(),
            source,
        })?;
        match anchor {
            Some(anchor) => self.validate(&text, anchor),
            None => self.validate_document(&text),
        }
    }
}

/// Validates a fragment with the process-wide [`GrammarStore`].
///
/// The store is loaded on first use from [`ValidatorConfig::from_env`].
pub fn validate(fragment: &str, anchor: &str) -> Result<ValidationResult, Error> {
    Ok(GrammarStore::global(&ValidatorConfig::from_env())?.validate(fragment, anchor)?)
}
