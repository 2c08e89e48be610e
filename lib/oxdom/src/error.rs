use crate::document::TextPosition;
use std::error::Error;
use std::fmt;

/// An error in the syntax of a parsed XML text: not well-formed, unbound namespace prefix...
#[derive(Debug)]
pub struct XmlSyntaxError {
    pub(crate) inner: XmlSyntaxErrorKind,
    pub(crate) position: Option<TextPosition>,
}

#[derive(Debug)]
pub(crate) enum XmlSyntaxErrorKind {
    Xml(quick_xml::Error),
    Msg { msg: String },
}

impl XmlSyntaxError {
    /// Builds an error from a printable error message.
    #[inline]
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        Self {
            inner: XmlSyntaxErrorKind::Msg { msg: msg.into() },
            position: None,
        }
    }

    #[inline]
    pub(crate) fn at(mut self, position: TextPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// The location of the error in the source text, if known.
    #[inline]
    pub fn position(&self) -> Option<TextPosition> {
        self.position
    }
}

impl From<quick_xml::Error> for XmlSyntaxError {
    #[inline]
    fn from(error: quick_xml::Error) -> Self {
        Self {
            inner: XmlSyntaxErrorKind::Xml(error),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for XmlSyntaxError {
    #[inline]
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        quick_xml::Error::from(error).into()
    }
}

impl fmt::Display for XmlSyntaxError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            XmlSyntaxErrorKind::Xml(error) => error.fmt(f)?,
            XmlSyntaxErrorKind::Msg { msg } => f.write_str(msg)?,
        }
        if let Some(position) = self.position {
            write!(f, " at line {} column {}", position.line, position.column)?;
        }
        Ok(())
    }
}

impl Error for XmlSyntaxError {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.inner {
            XmlSyntaxErrorKind::Xml(error) => Some(error),
            XmlSyntaxErrorKind::Msg { .. } => None,
        }
    }
}
