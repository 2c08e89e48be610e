use crate::config::ValidatorConfig;
use crate::error::LoadError;
use oxrng::Grammar;
use oxschematron::Schema;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

static GLOBAL: OnceLock<GrammarStore> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = Mutex::new(());
static GLOBAL_FAILED: AtomicBool = AtomicBool::new(false);

/// The canonical structural grammar and the compiled rule grammar.
///
/// Both are immutable once loaded: validation requests only borrow them, so a store can be shared
/// between any number of threads without locking.
///
/// ```
/// use oxfragval::GrammarStore;
///
/// let store = GrammarStore::from_sources(
///     r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
///       <start><ref name="body"/></start>
///       <define name="body"><element name="body"><zeroOrMore><ref name="p"/></zeroOrMore></element></define>
///       <define name="p"><element name="p"><text/></element></define>
///     </grammar>"#,
///     r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron"/>"#,
/// )?;
/// assert_eq!(store.grammar().len(), 2);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug)]
pub struct GrammarStore {
    grammar: Grammar,
    rules: Schema,
}

impl GrammarStore {
    pub fn new(grammar: Grammar, rules: Schema) -> Self {
        Self { grammar, rules }
    }

    /// Reads and compiles the grammars at the configured paths.
    pub fn open(config: &ValidatorConfig) -> Result<Self, LoadError> {
        let grammar = load_grammar(config.relaxng_path())?;
        let rules = load_rules(config.schematron_path())?;
        debug!(
            "Loaded {} productions from {} and the rules of {}",
            grammar.len(),
            config.relaxng_path().display(),
            config.schematron_path().display()
        );
        Ok(Self::new(grammar, rules))
    }

    /// Compiles grammars given as XML text.
    pub fn from_sources(relaxng: &str, schematron: &str) -> Result<Self, LoadError> {
        let grammar = Grammar::parse(relaxng).map_err(|e| LoadError::grammar("source text", e))?;
        let rules = Schema::parse(schematron).map_err(|e| LoadError::rules("source text", e))?;
        debug!("Loaded {} productions from source text", grammar.len());
        Ok(Self::new(grammar, rules))
    }

    /// The process-wide store, opened with `config` by the first successful call.
    ///
    /// Concurrent first calls load the grammars only once. After a failed load the next call
    /// tries again; once loaded, the `config` of later calls is ignored.
    pub fn global(config: &ValidatorConfig) -> Result<&'static Self, LoadError> {
        if let Some(store) = GLOBAL.get() {
            return Ok(store);
        }
        let _guard = GLOBAL_INIT
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = GLOBAL.get() {
            return Ok(store);
        }
        if GLOBAL_FAILED.load(Ordering::Relaxed) {
            warn!("Retrying to load the grammars after a previous failure");
        }
        let store = Self::open(config).inspect_err(|_| GLOBAL_FAILED.store(true, Ordering::Relaxed))?;
        GLOBAL_FAILED.store(false, Ordering::Relaxed);
        Ok(GLOBAL.get_or_init(|| store))
    }

    /// The canonical structural grammar.
    #[inline]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// The compiled rule grammar.
    #[inline]
    pub fn rule_grammar(&self) -> &Schema {
        &self.rules
    }
}

fn load_grammar(path: &Path) -> Result<Grammar, LoadError> {
    let origin = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| LoadError::grammar(origin.clone(), e))?;
    Grammar::parse(&text).map_err(|e| LoadError::grammar(origin, e))
}

fn load_rules(path: &Path) -> Result<Schema, LoadError> {
    let origin = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| LoadError::rules(origin.clone(), e))?;
    Schema::parse(&text).map_err(|e| LoadError::rules(origin, e))
}

#[cfg(test)]
#[allow(clippy::panic_in_result_fn)]
mod tests {
    use super::*;

    #[test]
    fn failure_cleared_by_successful_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = ValidatorConfig::new()
            .with_relaxng_path(dir.path().join("grammar.rng"))
            .with_schematron_path(dir.path().join("rules.sch"));
        GrammarStore::global(&config).unwrap_err();
        assert!(GLOBAL_FAILED.load(Ordering::Relaxed));

        fs::write(
            config.relaxng_path(),
            r#"<element name="body" xmlns="http://relaxng.org/ns/structure/1.0"><empty/></element>"#,
        )?;
        fs::write(
            config.schematron_path(),
            r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron"/>"#,
        )?;
        GrammarStore::global(&config)?;
        assert!(!GLOBAL_FAILED.load(Ordering::Relaxed));
        Ok(())
    }
}
