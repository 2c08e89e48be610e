use oxdom::XmlSyntaxError;

/// An error raised while loading a structural grammar.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GrammarError {
    /// The grammar document is not well-formed XML.
    #[error(transparent)]
    Syntax(#[from] XmlSyntaxError),

    /// The grammar has no `start` element.
    #[error("The grammar has no start pattern")]
    MissingStart,

    /// A `ref` names a production that is not defined.
    #[error("Reference to the undefined production '{name}'")]
    UndefinedReference { name: String },

    /// A production reaches itself again without an element in between.
    #[error("Production '{name}' is recursive without an element in between: {cycle}")]
    RecursiveReference { name: String, cycle: String },

    /// Two definitions share a name and neither uses `combine`.
    #[error("Production '{name}' is defined several times without combine attribute")]
    DuplicateDefinition { name: String },

    /// A construct that can not be used in a self-contained grammar.
    #[error("Unsupported grammar construct <{element}> at {path}")]
    Unsupported { element: String, path: String },

    /// Any other malformed construct.
    #[error("Invalid grammar at {path}: {message}")]
    Invalid { path: String, message: String },
}

impl GrammarError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(element: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Unsupported {
            element: element.into(),
            path: path.into(),
        }
    }
}

/// No production of the grammar is defined under the normalized anchor name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown anchor '{name}': the grammar has no production named '{normalized}'")]
pub struct UnknownAnchorError {
    name: String,
    normalized: String,
}

impl UnknownAnchorError {
    pub(crate) fn new(name: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            normalized: normalized.into(),
        }
    }

    /// The name as supplied by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}
