//! Loading a TEI-like grammar, re-anchoring it and validating fragments.

use oxdom::Document;
use oxrng::{
    Grammar, GrammarError, Pattern, StructuralReport, StructuralValidator, ViolationKind,
    resolve, rewrite,
};
use std::sync::Arc;

const GRAMMAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         xmlns:a="http://relaxng.org/ns/compatibility/annotations/1.0"
         ns="http://www.tei-c.org/ns/1.0"
         datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <start>
    <choice>
      <ref name="TEI"/>
      <ref name="teiCorpus"/>
    </choice>
  </start>
  <define name="TEI">
    <element name="TEI">
      <ref name="tei_teiHeader"/>
      <ref name="tei_text"/>
    </element>
  </define>
  <define name="teiCorpus">
    <element name="teiCorpus">
      <oneOrMore><ref name="TEI"/></oneOrMore>
    </element>
  </define>
  <define name="tei_teiHeader">
    <element name="teiHeader"><empty/></element>
  </define>
  <define name="tei_text">
    <element name="text"><ref name="tei_body"/></element>
  </define>
  <define name="tei_body">
    <a:documentation>text body</a:documentation>
    <element name="body">
      <zeroOrMore>
        <choice>
          <ref name="tei_p"/>
          <ref name="tei_div"/>
        </choice>
      </zeroOrMore>
    </element>
  </define>
  <define name="tei_div">
    <element name="div">
      <optional><attribute name="n"><data type="positiveInteger"/></attribute></optional>
      <optional><ref name="tei_head"/></optional>
      <oneOrMore><choice><ref name="tei_p"/><ref name="tei_div"/></choice></oneOrMore>
    </element>
  </define>
  <define name="tei_head">
    <element name="head"><text/></element>
  </define>
  <define name="tei_p">
    <element name="p">
      <optional>
        <attribute name="xml:lang"><data type="language"/></attribute>
      </optional>
      <mixed><zeroOrMore><ref name="tei_hi"/></zeroOrMore></mixed>
    </element>
  </define>
  <define name="tei_hi">
    <element name="hi">
      <attribute name="rend"><choice><value>bold</value><value>italic</value></choice></attribute>
      <text/>
    </element>
  </define>
</grammar>"#;

const TEI: &str = r#"xmlns="http://www.tei-c.org/ns/1.0""#;

fn grammar() -> Grammar {
    Grammar::parse(GRAMMAR).unwrap()
}

fn validate(grammar: &Grammar, anchor: &str, xml: &str) -> StructuralReport {
    let derived = rewrite(grammar, &resolve(grammar, anchor).unwrap());
    StructuralValidator::new(derived.grammar()).validate(&Document::parse(xml).unwrap())
}

#[test]
fn loads_productions() {
    let grammar = grammar();
    assert_eq!(grammar.len(), 9);
    assert_eq!(grammar.start_alternatives().len(), 2);
    assert!(grammar.production("tei_body").is_some());
}

#[test]
fn derived_start_appends_anchor() -> Result<(), Box<dyn std::error::Error>> {
    let grammar = grammar();
    let derived = rewrite(&grammar, &resolve(&grammar, "tei:p")?);
    let alternatives: Vec<&Pattern> = derived
        .start_alternatives()
        .iter()
        .map(Arc::as_ref)
        .collect();
    assert_eq!(
        alternatives,
        [
            &Pattern::reference("TEI"),
            &Pattern::reference("teiCorpus"),
            &Pattern::reference("tei_p")
        ]
    );
    Ok(())
}

#[test]
fn unknown_anchor() {
    let grammar = grammar();
    let error = resolve(&grammar, "no_such_name").unwrap_err();
    assert_eq!(error.name(), "no_such_name");
    let error = resolve(&grammar, "tei:sp").unwrap_err();
    assert_eq!(error.normalized(), "tei_sp");
}

#[test]
fn prefixed_and_normalized_anchor_are_equal() -> Result<(), Box<dyn std::error::Error>> {
    let grammar = grammar();
    assert_eq!(resolve(&grammar, "tei:body")?, resolve(&grammar, "tei_body")?);
    Ok(())
}

#[test]
fn rewrite_is_idempotent_and_pure() -> Result<(), Box<dyn std::error::Error>> {
    let grammar = grammar();
    let snapshot = grammar.clone();
    let anchor = resolve(&grammar, "tei:div")?;
    let derived = (0..5).map(|_| rewrite(&grammar, &anchor)).collect::<Vec<_>>();
    assert!(derived.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(grammar, snapshot);
    assert_eq!(derived[0].start_alternatives().len(), 3);
    Ok(())
}

#[test]
fn whole_documents_stay_valid() {
    let grammar = grammar();
    let report = validate(
        &grammar,
        "tei:p",
        &format!("<TEI {TEI}><teiHeader/><text><body><p>x</p></body></text></TEI>"),
    );
    assert!(report.is_valid(), "{report:?}");
}

#[test]
fn fragment_rooted_at_anchor() {
    let grammar = grammar();
    let report = validate(
        &grammar,
        "tei:div",
        &format!(
            r#"<div {TEI} n="2"><head>Title</head><p xml:lang="he">a <hi rend="bold">b</hi> c</p><div><p/></div></div>"#
        ),
    );
    assert!(report.is_valid(), "{report:?}");
}

#[test]
fn fragment_with_another_root_is_rejected() {
    let grammar = grammar();
    let report = validate(&grammar, "tei:div", &format!("<p {TEI}>x</p>"));
    assert_eq!(report.violations().len(), 1);
    assert_eq!(report.violations()[0].kind(), ViolationKind::ElementNotAllowed);
}

#[test]
fn wrong_namespace_is_rejected() {
    let grammar = grammar();
    let report = validate(&grammar, "tei:p", "<p>x</p>");
    assert!(!report.is_valid());
}

#[test]
fn datatype_violations() {
    let grammar = grammar();
    let report = validate(
        &grammar,
        "tei:div",
        &format!(r#"<div {TEI} n="zero"><p><hi rend="underline">b</hi></p></div>"#),
    );
    let found: Vec<_> = report
        .violations()
        .iter()
        .map(|v| (v.kind(), v.path()))
        .collect();
    // the invalid rend value leaves the required attribute unmatched
    assert_eq!(
        found,
        [
            (ViolationKind::AttributeNotAllowed, "/div[1]/@n"),
            (ViolationKind::AttributeNotAllowed, "/div[1]/p[1]/hi[1]/@rend"),
            (ViolationKind::MissingAttribute, "/div[1]/p[1]/hi[1]"),
        ]
    );
}

#[test]
fn several_violations_in_document_order() {
    let grammar = grammar();
    let report = validate(
        &grammar,
        "tei_body",
        &format!("<body {TEI}><head/><p>x</p><div><head>t</head></div><list/></body>"),
    );
    let found: Vec<_> = report
        .violations()
        .iter()
        .map(|v| (v.kind(), v.path()))
        .collect();
    assert_eq!(
        found,
        [
            (ViolationKind::ElementNotAllowed, "/body[1]/head[1]"),
            (ViolationKind::IncompleteContent, "/body[1]/div[1]"),
            (ViolationKind::ElementNotAllowed, "/body[1]/list[1]"),
        ]
    );
}

#[test]
fn recursive_grammar_without_element_is_rejected() {
    let error = Grammar::parse(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
        <start><ref name="a"/></start>
        <define name="a"><choice><text/><ref name="b"/></choice></define>
        <define name="b"><ref name="a"/></define>
        </grammar>"#,
    )
    .unwrap_err();
    assert!(matches!(error, GrammarError::RecursiveReference { .. }), "{error}");
}
