//! Fragment validation requests against a loaded grammar store.

use oxfragval::{
    DiagnosticKind, GrammarStore, LoadError, RequestError, Severity, VALID_EXPLANATION,
    ValidationResult, ValidatorConfig,
};
use std::io::Write;
use std::thread;

const RELAXNG: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
         ns="http://www.tei-c.org/ns/1.0"
         datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <start>
    <choice>
      <ref name="TEI"/>
    </choice>
  </start>
  <define name="TEI">
    <element name="TEI"><ref name="tei_text"/></element>
  </define>
  <define name="tei_text">
    <element name="text"><ref name="tei_body"/></element>
  </define>
  <define name="tei_body">
    <element name="body"><zeroOrMore><ref name="tei_paragraph"/></zeroOrMore></element>
  </define>
  <define name="tei_paragraph">
    <element name="paragraph">
      <optional><attribute name="n"><data type="integer"/></attribute></optional>
      <text/>
    </element>
  </define>
</grammar>"#;

const SCHEMATRON: &str = r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron" queryBinding="xslt2">
  <ns prefix="tei" uri="http://www.tei-c.org/ns/1.0"/>
  <pattern>
    <rule context="tei:paragraph">
      <assert test="normalize-space(.) != ''" role="warning">An empty <name/> is useless</assert>
      <report test="contains(., 'TODO')">Unfinished <name/>: <value-of select="."/></report>
    </rule>
  </pattern>
</schema>"#;

const TEI: &str = r#"xmlns="http://www.tei-c.org/ns/1.0""#;

fn store() -> GrammarStore {
    GrammarStore::from_sources(RELAXNG, SCHEMATRON).unwrap()
}

#[test]
fn valid_fragment() -> Result<(), RequestError> {
    let result = store().validate(
        &format!("<body {TEI}><paragraph>hi</paragraph></body>"),
        "tei:body",
    )?;
    assert!(result.is_valid(), "{result}");
    assert!(result.diagnostics().is_empty());
    assert_eq!(result.explanation(), VALID_EXPLANATION);
    Ok(())
}

#[test]
fn unexpected_child() -> Result<(), RequestError> {
    let result = store().validate(&format!("<body {TEI}><heading/></body>"), "tei:body")?;
    assert!(!result.is_valid());
    assert_eq!(result.diagnostics().len(), 1);
    let diagnostic = &result.diagnostics()[0];
    assert_eq!(diagnostic.kind(), DiagnosticKind::StructuralViolation);
    assert_eq!(diagnostic.severity(), Severity::Violation);
    assert_eq!(diagnostic.location().path(), "/body[1]/heading[1]");
    assert_eq!(
        result.explanation(),
        "the fragment is invalid: 1 structural violation"
    );
    Ok(())
}

#[test]
fn malformed_fragment() {
    let error = store()
        .validate(
            &format!("<body {TEI}><paragraph>hi</body>"),
            "tei:body",
        )
        .unwrap_err();
    assert!(matches!(error, RequestError::WellFormedness(_)), "{error}");
}

#[test]
fn unknown_anchor_is_checked_first() {
    let error = store().validate("<body><paragraph>", "tei:nothing").unwrap_err();
    let RequestError::UnknownAnchor(error) = error else {
        unreachable!("{error}")
    };
    assert_eq!(error.name(), "tei:nothing");
    assert_eq!(error.normalized(), "tei_nothing");
}

#[test]
fn whole_documents_still_accepted() -> Result<(), RequestError> {
    let store = store();
    let document = format!("<TEI {TEI}><text><body><paragraph>x</paragraph></body></text></TEI>");
    assert!(store.validate(&document, "tei:paragraph")?.is_valid());
    assert!(store.validate_document(&document)?.is_valid());
    assert!(
        !store
            .validate_document(&format!("<body {TEI}/>"))?
            .is_valid()
    );
    Ok(())
}

#[test]
fn structural_diagnostics_precede_rule_diagnostics() -> Result<(), RequestError> {
    let result = store().validate(
        &format!(
            r#"<body {TEI}><paragraph/><paragraph n="x">TODO later</paragraph><list/></body>"#
        ),
        "tei_body",
    )?;
    let found: Vec<_> = result
        .diagnostics()
        .iter()
        .map(|d| (d.kind(), d.severity(), d.to_string()))
        .collect();
    assert_eq!(
        found,
        [
            (
                DiagnosticKind::StructuralViolation,
                Severity::Violation,
                r#"/body[1]/paragraph[2]/@n: attribute "n" with value "x" not allowed on element "paragraph""#.to_owned()
            ),
            (
                DiagnosticKind::StructuralViolation,
                Severity::Violation,
                r#"/body[1]/list[1]: element "list" not allowed here; expected element "paragraph""#.to_owned()
            ),
            (
                DiagnosticKind::RuleAssertionFailure,
                Severity::Warning,
                "/body[1]/paragraph[1]: An empty paragraph is useless".to_owned()
            ),
            (
                DiagnosticKind::RuleAssertionFailure,
                Severity::Violation,
                "/body[1]/paragraph[2]: Unfinished paragraph: TODO later".to_owned()
            ),
        ]
    );
    assert_eq!(
        result.explanation(),
        "the fragment is invalid: 2 structural violations and 2 rule assertion failures"
    );
    Ok(())
}

#[test]
fn rules_do_not_depend_on_the_anchor() -> Result<(), RequestError> {
    let store = store();
    let fragment = format!("<paragraph {TEI}>TODO</paragraph>");
    let result = store.validate(&fragment, "tei:paragraph")?;
    assert_eq!(result.diagnostics().len(), 1);
    assert_eq!(
        result.diagnostics()[0].kind(),
        DiagnosticKind::RuleAssertionFailure
    );
    // the structural layer rejects the root but the rules report the same failure
    let result = store.validate(&fragment, "tei:body")?;
    let rules: Vec<_> = result
        .diagnostics()
        .iter()
        .filter(|d| d.kind() == DiagnosticKind::RuleAssertionFailure)
        .collect();
    assert_eq!(rules.len(), 1);
    Ok(())
}

#[test]
fn concurrent_requests_match_sequential_ones() -> Result<(), RequestError> {
    let store = store();
    let requests = [
        (format!("<body {TEI}><paragraph>a</paragraph></body>"), "tei:body"),
        (format!("<body {TEI}><heading/><paragraph/></body>"), "tei:body"),
        (format!("<paragraph {TEI} n='1'>TODO</paragraph>"), "tei:paragraph"),
        (format!("<text {TEI}><body/></text>"), "tei_text"),
    ];
    let sequential = requests
        .iter()
        .map(|(fragment, anchor)| store.validate(fragment, anchor))
        .collect::<Result<Vec<_>, _>>()?;
    let concurrent: Vec<Vec<ValidationResult>> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    requests
                        .iter()
                        .rev()
                        .map(|(fragment, anchor)| store.validate(fragment, anchor).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for mut results in concurrent {
        results.reverse();
        assert_eq!(results, sequential);
    }
    Ok(())
}

#[test]
fn canonical_grammar_is_not_modified() -> Result<(), RequestError> {
    let store = store();
    let before = store.grammar().clone();
    for anchor in ["tei:body", "tei:paragraph", "tei_text", "TEI"] {
        store.validate(&format!("<body {TEI}/>"), anchor)?;
    }
    assert_eq!(store.grammar(), &before);
    assert_eq!(store.grammar().start_alternatives().len(), 1);
    Ok(())
}

#[test]
fn validate_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, "<body {TEI}><paragraph>x</paragraph></body>")?;
    let store = store();
    assert!(store.validate_file(file.path(), Some("tei:body"))?.is_valid());
    assert!(!store.validate_file(file.path(), None)?.is_valid());
    let error = store
        .validate_file(file.path().with_extension("missing"), Some("tei:body"))
        .unwrap_err();
    assert!(matches!(error, RequestError::Read { .. }), "{error}");
    Ok(())
}

#[test]
fn open_from_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let relaxng = dir.path().join("grammar.rng");
    let schematron = dir.path().join("rules.sch");
    std::fs::write(&relaxng, RELAXNG)?;
    std::fs::write(&schematron, SCHEMATRON)?;
    let config = ValidatorConfig::new()
        .with_relaxng_path(&relaxng)
        .with_schematron_path(&schematron);
    let store = GrammarStore::open(&config)?;
    assert_eq!(store.grammar().len(), 4);

    let error = GrammarStore::open(&config.clone().with_relaxng_path(dir.path().join("no.rng")))
        .unwrap_err();
    assert!(matches!(error, LoadError::GrammarLoad { .. }), "{error}");

    std::fs::write(&schematron, "<schema")?;
    let error = GrammarStore::open(&config).unwrap_err();
    assert!(matches!(error, LoadError::StylesheetCompile { .. }), "{error}");
    Ok(())
}

#[test]
fn invalid_grammars() {
    let error = GrammarStore::from_sources(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
          <start><ref name="missing"/></start>
        </grammar>"#,
        SCHEMATRON,
    )
    .unwrap_err();
    assert!(matches!(error, LoadError::GrammarLoad { .. }), "{error}");

    let error = GrammarStore::from_sources(
        RELAXNG,
        r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
          <pattern><rule context="tei:p"><assert test="1">x</assert></rule></pattern>
        </schema>"#,
    )
    .unwrap_err();
    assert!(matches!(error, LoadError::StylesheetCompile { .. }), "{error}");
}
