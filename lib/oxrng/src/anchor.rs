use crate::error::UnknownAnchorError;
use crate::model::Grammar;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator between a namespace prefix and a local name in element names.
const NAMESPACE_SEPARATOR: char = ':';

/// An element name chosen by a caller as the root of a fragment, with its production name.
///
/// `tei:body` is looked up as the production `tei_body`. Two anchors are equal when their
/// normalized forms are, so `tei:body` and `tei_body` designate the same anchor.
#[derive(Debug, Clone)]
pub struct AnchorName {
    raw: String,
    normalized: String,
}

impl AnchorName {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self { raw, normalized }
    }

    /// The name as supplied by the caller.
    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The production name.
    #[inline]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for AnchorName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for AnchorName {}

impl Hash for AnchorName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for AnchorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Replaces each namespace separator with an underscore.
pub fn normalize(raw: &str) -> String {
    raw.replace(NAMESPACE_SEPARATOR, "_")
}

/// Resolves a caller-supplied element name to a production of `grammar`.
///
/// ```
/// use oxrng::{Grammar, Pattern, Production, resolve};
///
/// let grammar = Grammar::new(
///     [Production::new("tei_body", Pattern::element("", "body", Pattern::Empty))],
///     [],
/// )?;
/// assert_eq!(resolve(&grammar, "tei:body")?, resolve(&grammar, "tei_body")?);
/// assert!(resolve(&grammar, "tei:front").is_err());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub fn resolve(grammar: &Grammar, raw: &str) -> Result<AnchorName, UnknownAnchorError> {
    let anchor = AnchorName::new(raw);
    if grammar.contains_production(anchor.normalized()) {
        Ok(anchor)
    } else {
        Err(UnknownAnchorError::new(anchor.raw, anchor.normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization() {
        assert_eq!(normalize("tei:body"), "tei_body");
        assert_eq!(normalize("body"), "body");
        assert_eq!(AnchorName::new("j:divineName").normalized(), "j_divineName");
        assert_eq!(AnchorName::new("tei:body"), AnchorName::new("tei_body"));
        assert_eq!(AnchorName::new("tei:body").raw(), "tei:body");
    }
}
