//! Compiling Schematron schemas and evaluating them on fragments.

use oxdom::Document;
use oxschematron::{CheckKind, RuleCompileError, RuleReport, Schema};

const SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://purl.oclc.org/dsdl/schematron"
        xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
        queryBinding="xslt2">
  <title>Liturgy rules</title>
  <ns prefix="tei" uri="http://www.tei-c.org/ns/1.0"/>
  <ns prefix="j" uri="http://jewishliturgy.org/ns/jlptei/2"/>
  <pattern id="ids">
    <rule context="tei:*[@xml:id]">
      <let name="id" value="@xml:id"/>
      <assert test="count(//tei:*[@xml:id = $id]) = 1" id="unique-id">
        The identifier <value-of select="$id"/> of <name/> is not unique
      </assert>
    </rule>
  </pattern>
  <pattern id="structure">
    <rule context="tei:div[@type = 'section']">
      <assert test="tei:head">A section needs a <emph>head</emph></assert>
    </rule>
    <rule context="tei:div">
      <report test="tei:div and tei:p" role="warning">A <name/> mixes paragraphs and subdivisions</report>
    </rule>
    <rule context="@rend">
      <assert test="matches(., '^(bold|italic)$')" role="info">Unknown rendition "<value-of select="."/>"</assert>
    </rule>
  </pattern>
</schema>"#;

const TEI: &str = r#"xmlns="http://www.tei-c.org/ns/1.0""#;

fn validate(xml: &str) -> RuleReport {
    let schema = Schema::parse(SCHEMA).unwrap();
    schema.validate(&Document::parse(xml).unwrap())
}

fn lines(report: &RuleReport) -> Vec<String> {
    report.failures().iter().map(ToString::to_string).collect()
}

#[test]
fn valid_fragment() {
    let report = validate(&format!(
        r#"<div {TEI} type="section" xml:id="a"><head>H</head><p xml:id="b" rend="bold">x</p></div>"#
    ));
    assert!(report.is_valid(), "{report:?}");
}

#[test]
fn failed_assert_with_value_of() {
    let report = validate(&format!(r#"<div {TEI}><p xml:id="a"/><p xml:id="a"/></div>"#));
    assert_eq!(
        lines(&report),
        [
            "/div[1]/p[1]: The identifier a of p is not unique",
            "/div[1]/p[2]: The identifier a of p is not unique",
        ]
    );
    let failure = &report.failures()[0];
    assert_eq!(failure.kind(), CheckKind::Assert);
    assert_eq!(failure.id(), Some("unique-id"));
    assert_eq!(failure.pattern(), Some("ids"));
    assert_eq!(failure.role(), None);
}

#[test]
fn first_matching_rule_wins() {
    // the section rule shadows the generic div rule so the report is not evaluated on it
    let report = validate(&format!(
        r#"<div {TEI} type="section"><div><p/></div><p/><div><div/><p/></div></div>"#
    ));
    assert_eq!(
        lines(&report),
        [
            "/div[1]: A section needs a head",
            "/div[1]/div[2]: A div mixes paragraphs and subdivisions",
        ]
    );
    assert_eq!(report.failures()[1].kind(), CheckKind::Report);
    assert_eq!(report.failures()[1].role(), Some("warning"));
}

#[test]
fn attribute_context() {
    let report = validate(&format!(r#"<p {TEI} rend="underline">x</p>"#));
    assert_eq!(lines(&report), [r#"/p[1]/@rend: Unknown rendition "underline""#]);
    assert_eq!(report.failures()[0].role(), Some("info"));
    assert_eq!(report.failures()[0].test(), "matches(., '^(bold|italic)$')");
}

#[test]
fn patterns_are_reported_in_order() {
    let report = validate(&format!(
        r#"<div {TEI} type="section" xml:id="x"><p xml:id="x" rend="small"/></div>"#
    ));
    let patterns: Vec<_> = report.failures().iter().map(|f| f.pattern()).collect();
    assert_eq!(
        patterns,
        [Some("ids"), Some("ids"), Some("structure"), Some("structure")]
    );
}

#[test]
fn nodes_outside_the_namespace_are_ignored() {
    let report = validate(r#"<div type="section"><p xml:id="a"/><p xml:id="a"/></div>"#);
    assert!(report.is_valid());
}

#[test]
fn compiled_schema_is_reusable() {
    let schema = Schema::parse(SCHEMA).unwrap();
    assert_eq!(schema.title(), Some("Liturgy rules"));
    let invalid = Document::parse(&format!(r#"<div {TEI} type="section"/>"#)).unwrap();
    let valid = Document::parse(&format!(r#"<div {TEI}/>"#)).unwrap();
    for _ in 0..3 {
        assert_eq!(schema.validate(&invalid).failures().len(), 1);
        assert!(schema.validate(&valid).is_valid());
    }
}

#[test]
fn compile_errors() {
    let error = Schema::parse(
        r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
        <pattern><rule context="tei:p"><assert test="true()">x</assert></rule></pattern>
        </schema>"#,
    )
    .unwrap_err();
    assert!(
        matches!(error, RuleCompileError::UndeclaredPrefix { ref prefix, .. } if prefix == "tei"),
        "{error}"
    );

    let error = Schema::parse(
        r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
        <pattern><rule context="p"><assert test="p[">x</assert></rule></pattern>
        </schema>"#,
    )
    .unwrap_err();
    assert!(matches!(error, RuleCompileError::XPath { .. }), "{error}");

    let error = Schema::parse(
        r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
        <pattern><rule context="p"><assert test="unknown-function()">x</assert></rule></pattern>
        </schema>"#,
    )
    .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Unknown XPath function unknown-function() in 'unknown-function()'"
    );
}
