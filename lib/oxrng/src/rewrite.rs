use crate::anchor::AnchorName;
use crate::model::{Grammar, Pattern};
use std::sync::Arc;
use tracing::trace;

/// A grammar whose start choice accepts the anchor production in addition to the original
/// start alternatives.
///
/// Productions are shared with the grammar it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedGrammar {
    grammar: Grammar,
    anchor: AnchorName,
}

impl DerivedGrammar {
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn anchor(&self) -> &AnchorName {
        &self.anchor
    }

    /// Start alternatives: the original ones followed by the reference to the anchor.
    pub fn start_alternatives(&self) -> &[Arc<Pattern>] {
        self.grammar.start_alternatives()
    }
}

impl AsRef<Grammar> for DerivedGrammar {
    fn as_ref(&self) -> &Grammar {
        &self.grammar
    }
}

/// Derives from `grammar` a grammar whose start choice gains a reference to `anchor`.
///
/// The original alternatives keep their order and are shared, not copied. `grammar` is not
/// modified and deriving twice gives equal grammars.
pub fn rewrite(grammar: &Grammar, anchor: &AnchorName) -> DerivedGrammar {
    let mut start = Vec::with_capacity(grammar.start_alternatives().len() + 1);
    start.extend(grammar.start_alternatives().iter().map(Arc::clone));
    start.push(Arc::new(Pattern::reference(anchor.normalized())));
    trace!(
        "Derived a grammar anchored at {} with {} start alternatives",
        anchor.normalized(),
        start.len()
    );
    DerivedGrammar {
        grammar: grammar.with_start(start),
        anchor: anchor.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::resolve;
    use crate::model::Production;

    fn grammar() -> Grammar {
        Grammar::new(
            [
                Production::new("TEI", Pattern::element("", "TEI", Pattern::reference("body"))),
                Production::new("body", Pattern::element("", "body", Pattern::Text)),
            ],
            [Pattern::reference("TEI")],
        )
        .unwrap()
    }

    #[test]
    fn appends_anchor() {
        let grammar = grammar();
        let derived = rewrite(&grammar, &resolve(&grammar, "body").unwrap());
        assert_eq!(
            derived
                .start_alternatives()
                .iter()
                .map(Arc::as_ref)
                .collect::<Vec<_>>(),
            [&Pattern::reference("TEI"), &Pattern::reference("body")]
        );
        assert!(Arc::ptr_eq(
            &derived.start_alternatives()[0],
            &grammar.start_alternatives()[0]
        ));
        assert!(derived.grammar().shares_productions_with(&grammar));
    }

    #[test]
    fn leaves_original_untouched() {
        let grammar = grammar();
        let before = grammar.clone();
        let anchor = resolve(&grammar, "body").unwrap();
        let first = rewrite(&grammar, &anchor);
        let second = rewrite(&grammar, &anchor);
        assert_eq!(first, second);
        assert_eq!(grammar, before);
        assert_eq!(grammar.start_alternatives().len(), 1);
    }
}
