use std::fmt;

/// The namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace of namespace declaration attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A resolved element or attribute name.
///
/// The namespace is the empty string when the name is in no namespace.
/// Equality only considers the expanded name (namespace and local part), the prefix is kept
/// to render names the way they were written.
#[derive(Debug, Clone)]
pub struct Name {
    prefix: Option<String>,
    local: String,
    namespace: String,
}

impl Name {
    pub fn new(
        prefix: Option<impl Into<String>>,
        local: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.map(Into::into),
            local: local.into(),
            namespace: namespace.into(),
        }
    }

    /// A name in no namespace and without prefix.
    pub fn unqualified(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: String::new(),
        }
    }

    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    #[inline]
    pub fn local(&self) -> &str {
        &self.local
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns true if this name has the given namespace and local part.
    #[inline]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }

    /// The name as written in the source, i.e. `prefix:local` or `local`.
    pub fn qualified(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Eq for Name {}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, "{prefix}:{}", self.local)
        } else {
            f.write_str(&self.local)
        }
    }
}

/// Splits a QName into its optional prefix and its local part.
pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_prefix() {
        let a = Name::new(Some("tei"), "body", "http://www.tei-c.org/ns/1.0");
        let b = Name::new(None::<String>, "body", "http://www.tei-c.org/ns/1.0");
        assert_eq!(a, b);
        assert_ne!(a, Name::unqualified("body"));
    }

    #[test]
    fn display_keeps_prefix() {
        let a = Name::new(Some("j"), "divineName", "http://jewishliturgy.org/ns/jlptei/2");
        assert_eq!(a.to_string(), "j:divineName");
        assert_eq!(Name::unqualified("p").qualified(), "p");
    }

    #[test]
    fn split() {
        assert_eq!(split_qname("tei:body"), (Some("tei"), "body"));
        assert_eq!(split_qname("body"), (None, "body"));
    }
}
