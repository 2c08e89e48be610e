use oxdom::XmlSyntaxError;

/// An error raised while compiling a Schematron schema.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RuleCompileError {
    /// The schema document is not well-formed XML.
    #[error(transparent)]
    Syntax(#[from] XmlSyntaxError),

    /// The document element is not `sch:schema`.
    #[error("The document element is {found}, not a Schematron schema")]
    NotSchematron { found: String },

    /// An XPath expression can not be parsed.
    #[error("Invalid XPath expression '{expression}': {message}")]
    XPath { expression: String, message: String },

    #[error("Unknown XPath function {name}() in '{expression}'")]
    UnknownFunction { name: String, expression: String },

    #[error("Undeclared namespace prefix '{prefix}' in '{expression}'")]
    UndeclaredPrefix { prefix: String, expression: String },

    #[error("Undefined variable ${name} in '{expression}'")]
    UndefinedVariable { name: String, expression: String },

    /// A Schematron or XPath construct this engine does not evaluate.
    #[error("Unsupported construct {construct} at {path}")]
    Unsupported { construct: String, path: String },

    /// Any other malformed construct.
    #[error("Invalid schema at {path}: {message}")]
    Invalid { path: String, message: String },
}

impl RuleCompileError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(construct: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            path: path.into(),
        }
    }
}
