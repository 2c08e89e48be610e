//! The subset of the XML Schema datatype library usable in `data` and `value` patterns.

use oxsdatatypes::{Boolean, Date, Decimal, Integer};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Namespace of the XML Schema datatype library.
pub const XSD_DATATYPES: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

const REGEX_SIZE_LIMIT: usize = 1_000_000;

/// A datatype with its facets.
///
/// Datatypes of unknown libraries or with unknown names accept any text.
#[derive(Debug, Clone)]
pub struct Datatype {
    library: String,
    name: String,
    facets: Vec<Facet>,
}

/// A restriction of the value space set with a `param` element.
#[derive(Debug, Clone)]
pub enum Facet {
    Pattern { source: String, regex: Regex },
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
}

impl PartialEq for Facet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Pattern { source: a, .. }, Self::Pattern { source: b, .. }) => a == b,
            (Self::Length(a), Self::Length(b))
            | (Self::MinLength(a), Self::MinLength(b))
            | (Self::MaxLength(a), Self::MaxLength(b)) => a == b,
            _ => false,
        }
    }
}

impl Facet {
    /// Builds a facet from a `param` element. Unsupported parameters return `None`.
    pub fn from_param(name: &str, value: &str) -> Option<Self> {
        let value = value.trim();
        match name {
            "pattern" => {
                let Some(regex) = compile_xsd_pattern(value) else {
                    warn!("Ignoring the pattern facet '{value}' that can not be compiled");
                    return None;
                };
                Some(Self::Pattern {
                    source: value.into(),
                    regex,
                })
            }
            "length" => value.parse().ok().map(Self::Length),
            "minLength" => value.parse().ok().map(Self::MinLength),
            "maxLength" => value.parse().ok().map(Self::MaxLength),
            _ => None,
        }
    }

    fn allows(&self, value: &str) -> bool {
        match self {
            Self::Pattern { regex, .. } => regex.is_match(value),
            Self::Length(length) => value.chars().count() == *length,
            Self::MinLength(length) => value.chars().count() >= *length,
            Self::MaxLength(length) => value.chars().count() <= *length,
        }
    }
}

impl Datatype {
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            facets: Vec::new(),
        }
    }

    /// The `token` datatype of the built-in library, used by `value` without `type`.
    pub fn token() -> Self {
        Self::new("", "token")
    }

    #[must_use]
    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    fn is_xsd(&self) -> bool {
        self.library == XSD_DATATYPES
    }

    /// Applies the whitespace processing of the datatype.
    pub fn normalize<'a>(&self, value: &'a str) -> std::borrow::Cow<'a, str> {
        match (self.is_xsd(), self.name.as_str()) {
            (_, "string") => value.into(),
            (true, "normalizedString") => value.replace(['\t', '\n', '\r'], " ").into(),
            _ => collapse(value).into(),
        }
    }

    /// Returns true if the text is in the lexical space of this datatype and matches its facets.
    pub fn allows(&self, value: &str) -> bool {
        let normalized = self.normalize(value);
        if !self.facets.iter().all(|f| f.allows(&normalized)) {
            return false;
        }
        if !self.is_xsd() {
            return true;
        }
        let v = normalized.as_ref();
        match self.name.as_str() {
            "NCName" | "ID" | "IDREF" => is_ncname(v),
            "Name" => is_name(v),
            "NMTOKEN" => is_nmtoken(v),
            "NMTOKENS" => !v.is_empty() && v.split(' ').all(is_nmtoken),
            "IDREFS" => !v.is_empty() && v.split(' ').all(is_ncname),
            "language" => is_language(v),
            "boolean" => matches!(v, "true" | "false" | "1" | "0"),
            "decimal" => is_decimal(v),
            "integer" => is_integer(v),
            "nonNegativeInteger" => is_integer(v) && (!v.starts_with('-') || is_zero(v)),
            "positiveInteger" => is_integer(v) && !v.starts_with('-') && !is_zero(v),
            "int" => v.parse::<i32>().is_ok(),
            "date" => is_date(v),
            _ => true,
        }
    }

    /// Compares two lexical values in the value space of this datatype.
    ///
    /// Numbers, booleans and dates are compared by value, other types after whitespace
    /// processing. Values out of range of the parsed representation fall back to the latter.
    pub fn equals(&self, a: &str, b: &str) -> bool {
        let a = self.normalize(a);
        let b = self.normalize(b);
        if self.is_xsd() {
            let by_value = match self.name.as_str() {
                "boolean" => same_value::<Boolean>(&a, &b),
                "integer" | "nonNegativeInteger" | "positiveInteger" | "int" => {
                    same_value::<Integer>(&a, &b)
                }
                "decimal" => same_value::<Decimal>(&a, &b),
                "date" => same_value::<Date>(&a, &b),
                _ => None,
            };
            if let Some(equal) = by_value {
                return equal;
            }
        }
        a == b
    }
}

impl PartialEq for Datatype {
    fn eq(&self, other: &Self) -> bool {
        self.library == other.library && self.name == other.name && self.facets == other.facets
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_xsd() {
            write!(f, "xsd:{}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

fn same_value<T: FromStr + PartialEq>(a: &str, b: &str) -> Option<bool> {
    Some(a.parse::<T>().ok()? == b.parse::<T>().ok()?)
}

fn collapse(value: &str) -> String {
    value.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_name_start_char(c: char) -> bool {
    c == '_' || c == ':' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || c == '-'
        || c == '.'
        || c == '\u{B7}'
        || c.is_numeric()
        || ('\u{300}'..='\u{36F}').contains(&c)
        || ('\u{203F}'..='\u{2040}').contains(&c)
}

fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

fn is_ncname(value: &str) -> bool {
    !value.contains(':') && is_name(value)
}

fn is_nmtoken(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_name_char)
}

fn is_language(value: &str) -> bool {
    let mut parts = value.split('-');
    parts
        .next()
        .is_some_and(|p| (1..=8).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_alphabetic()))
        && parts.all(|p| (1..=8).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_alphanumeric()))
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_zero(value: &str) -> bool {
    value.trim_start_matches(['+', '-']).bytes().all(|b| b == b'0')
}

fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    (!int.is_empty() || !frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

fn is_date(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (date, timezone) = match unsigned.find(['Z', '+']).or_else(|| {
        // a '-' after the day starts a timezone
        unsigned.get(1..).and_then(|s| s.match_indices('-').nth(2).map(|(i, _)| i + 1))
    }) {
        Some(i) => unsigned.split_at(i),
        None => (unsigned, ""),
    };
    let mut parts = date.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let number = |s: &str, len: usize| {
        if s.len() == len && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<u32>().ok()
        } else {
            None
        }
    };
    let valid_year = year.len() >= 4 && year.bytes().all(|b| b.is_ascii_digit());
    let valid_month = number(month, 2).is_some_and(|m| (1..=12).contains(&m));
    let valid_day = number(day, 2).is_some_and(|d| (1..=31).contains(&d));
    let valid_timezone = match timezone {
        "" | "Z" => true,
        tz => tz
            .strip_prefix(['+', '-'])
            .and_then(|tz| tz.split_once(':'))
            .is_some_and(|(h, m)| {
                number(h, 2).is_some_and(|h| h <= 14) && number(m, 2).is_some_and(|m| m < 60)
            }),
    };
    valid_year && valid_month && valid_day && valid_timezone
}

/// Compiles an XML Schema regular expression. They are implicitly anchored.
///
/// The `\i` and `\c` multi-character escapes are rewritten into classes, character class
/// subtraction is not supported.
fn compile_xsd_pattern(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'i' if in_class => translated.push_str(r"\p{L}_:"),
                'i' => translated.push_str(r"[\p{L}_:]"),
                'I' if !in_class => translated.push_str(r"[^\p{L}_:]"),
                'c' if in_class => translated.push_str(r"\p{L}\p{N}._:\-"),
                'c' => translated.push_str(r"[\p{L}\p{N}._:\-]"),
                'C' if !in_class => translated.push_str(r"[^\p{L}\p{N}._:\-]"),
                other => {
                    translated.push('\\');
                    translated.push(other);
                }
            },
            '[' => {
                if in_class {
                    // character class subtraction
                    return None;
                }
                in_class = true;
                translated.push(c);
            }
            ']' => {
                in_class = false;
                translated.push(c);
            }
            _ => translated.push(c),
        }
    }
    let mut builder = RegexBuilder::new(&format!("^(?:{translated})$"));
    builder.size_limit(REGEX_SIZE_LIMIT);
    builder.build().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xsd(name: &str) -> Datatype {
        Datatype::new(XSD_DATATYPES, name)
    }

    #[test]
    fn lexical_spaces() {
        assert!(xsd("integer").allows(" 42 "));
        assert!(!xsd("integer").allows("4.2"));
        assert!(xsd("decimal").allows("-4.2"));
        assert!(!xsd("decimal").allows("."));
        assert!(xsd("nonNegativeInteger").allows("0"));
        assert!(!xsd("positiveInteger").allows("0"));
        assert!(xsd("boolean").allows("true"));
        assert!(!xsd("boolean").allows("yes"));
        assert!(xsd("NCName").allows("p1"));
        assert!(!xsd("NCName").allows("tei:p"));
        assert!(xsd("language").allows("he-Latn"));
        assert!(xsd("date").allows("2024-03-01"));
        assert!(xsd("date").allows("2024-03-01+02:00"));
        assert!(!xsd("date").allows("2024-13-01"));
        assert!(xsd("whatever").allows("anything"));
    }

    #[test]
    fn facets() {
        let datatype = xsd("string")
            .with_facet(Facet::from_param("pattern", "[a-z]+").unwrap())
            .with_facet(Facet::from_param("maxLength", "3").unwrap());
        assert!(datatype.allows("abc"));
        assert!(!datatype.allows("abcd"));
        assert!(!datatype.allows("ab1"));
    }

    #[test]
    fn xsd_escapes() {
        let regex = compile_xsd_pattern(r"\i\c*").unwrap();
        assert!(regex.is_match("tei_p"));
        assert!(!regex.is_match("1p"));
        assert!(compile_xsd_pattern(r"[\i-[:]]").is_none());
    }

    #[test]
    fn token_comparison() {
        assert!(Datatype::token().equals(" a  b ", "a b"));
        assert!(!Datatype::new("", "string").equals(" a", "a"));
    }

    #[test]
    fn value_space_comparison() {
        assert!(xsd("integer").equals("1", "01"));
        assert!(xsd("integer").equals("+1", " 1 "));
        assert!(!xsd("integer").equals("1", "2"));
        assert!(xsd("boolean").equals("true", "1"));
        assert!(!xsd("boolean").equals("true", "0"));
        assert!(xsd("decimal").equals("1.50", "01.5"));
        assert!(xsd("date").equals("2024-03-01", "2024-03-01"));
        assert!(!xsd("token").equals("01", "1"));
        // out of the parsed range, compared lexically
        assert!(xsd("integer").equals("123456789012345678901234", "123456789012345678901234"));
    }
}
