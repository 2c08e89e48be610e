use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the structural grammar path.
pub const RELAXNG_PATH_VAR: &str = "OXFRAGVAL_RELAXNG";
/// Environment variable overriding the rule grammar path.
pub const SCHEMATRON_PATH_VAR: &str = "OXFRAGVAL_SCHEMATRON";

const DEFAULT_RELAXNG_PATH: &str = "schema/jlptei.odd.xml.relaxng";
const DEFAULT_SCHEMATRON_PATH: &str = "schema/jlptei.odd.xml.schematron";

/// Where to find the grammars a [`GrammarStore`](crate::GrammarStore) loads.
///
/// ```
/// use oxfragval::ValidatorConfig;
///
/// let config = ValidatorConfig::new().with_relaxng_path("tei_all.rng");
/// assert_eq!(config.relaxng_path().to_str(), Some("tei_all.rng"));
/// assert_eq!(
///     config.schematron_path().to_str(),
///     Some("schema/jlptei.odd.xml.schematron")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    relaxng_path: PathBuf,
    schematron_path: PathBuf,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            relaxng_path: DEFAULT_RELAXNG_PATH.into(),
            schematron_path: DEFAULT_SCHEMATRON_PATH.into(),
        }
    }
}

impl ValidatorConfig {
    /// The default paths, relative to the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default paths, overridden by the `OXFRAGVAL_RELAXNG` and `OXFRAGVAL_SCHEMATRON`
    /// environment variables when they are set.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var_os(name))
    }

    fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut config = Self::default();
        if let Some(path) = var(RELAXNG_PATH_VAR).filter(|p| !p.is_empty()) {
            config.relaxng_path = path.into();
        }
        if let Some(path) = var(SCHEMATRON_PATH_VAR).filter(|p| !p.is_empty()) {
            config.schematron_path = path.into();
        }
        config
    }

    #[must_use]
    pub fn with_relaxng_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.relaxng_path = path.into();
        self
    }

    #[must_use]
    pub fn with_schematron_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schematron_path = path.into();
        self
    }

    pub fn relaxng_path(&self) -> &Path {
        &self.relaxng_path
    }

    pub fn schematron_path(&self) -> &Path {
        &self.schematron_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_defaults() {
        let config = ValidatorConfig::from_vars(|name| {
            (name == RELAXNG_PATH_VAR).then(|| OsString::from("/etc/tei.rng"))
        });
        assert_eq!(config.relaxng_path(), Path::new("/etc/tei.rng"));
        assert_eq!(
            config.schematron_path(),
            Path::new(DEFAULT_SCHEMATRON_PATH)
        );
    }

    #[test]
    fn empty_variables_are_ignored() {
        let config = ValidatorConfig::from_vars(|_| Some(OsString::new()));
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn builder_takes_precedence() {
        let config = ValidatorConfig::from_vars(|_| Some(OsString::from("env.xml")))
            .with_schematron_path("rules.sch");
        assert_eq!(config.relaxng_path(), Path::new("env.xml"));
        assert_eq!(config.schematron_path(), Path::new("rules.sch"));
    }
}
