use oxdom::XmlSyntaxError;
use oxrng::{GrammarError, UnknownAnchorError};
use oxschematron::RuleCompileError;
use std::io;
use std::path::PathBuf;

/// An error raised while loading the grammars of a [`GrammarStore`](crate::GrammarStore).
///
/// No validation can be served until it is fixed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The structural grammar can not be read or is not a valid RelaxNG grammar.
    #[error("Failed to load the structural grammar from {origin}")]
    GrammarLoad {
        origin: String,
        #[source]
        source: SourceError,
    },
    /// The rule grammar can not be read or is not a valid Schematron schema.
    #[error("Failed to compile the rule grammar from {origin}")]
    StylesheetCompile {
        origin: String,
        #[source]
        source: SourceError,
    },
}

/// The cause of a [`LoadError`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Rules(#[from] RuleCompileError),
}

impl LoadError {
    pub(crate) fn grammar(origin: impl Into<String>, source: impl Into<SourceError>) -> Self {
        Self::GrammarLoad {
            origin: origin.into(),
            source: source.into(),
        }
    }

    pub(crate) fn rules(origin: impl Into<String>, source: impl Into<SourceError>) -> Self {
        Self::StylesheetCompile {
            origin: origin.into(),
            source: source.into(),
        }
    }
}

/// An error that rejects a single validation request.
///
/// It is distinct from an invalid fragment, which is reported by a
/// [`ValidationResult`](crate::ValidationResult).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RequestError {
    /// The anchor does not name a production of the structural grammar.
    #[error(transparent)]
    UnknownAnchor(#[from] UnknownAnchorError),
    /// The fragment is not well-formed XML.
    #[error("The fragment is not well-formed XML")]
    WellFormedness(#[from] XmlSyntaxError),
    /// The fragment file can not be read.
    #[error("Unable to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Any error returned by [`validate`](crate::validate).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Request(#[from] RequestError),
}
