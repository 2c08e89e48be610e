#![allow(clippy::panic)]

use codspeed_criterion_compat::{Criterion, Throughput, criterion_group, criterion_main};
use oxdom::Document;
use oxrng::{Grammar, StructuralValidator, resolve, rewrite};
use std::fmt::Write;

const GRAMMAR: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="TEI"/></start>
  <define name="TEI"><element name="TEI"><ref name="tei_body"/></element></define>
  <define name="tei_body">
    <element name="body"><zeroOrMore><choice><ref name="tei_p"/><ref name="tei_div"/></choice></zeroOrMore></element>
  </define>
  <define name="tei_div">
    <element name="div">
      <optional><attribute name="n"/></optional>
      <oneOrMore><choice><ref name="tei_p"/><ref name="tei_div"/></choice></oneOrMore>
    </element>
  </define>
  <define name="tei_p">
    <element name="p">
      <interleave>
        <optional><attribute name="n"/></optional>
        <optional><attribute name="rend"/></optional>
        <optional><attribute name="type"/></optional>
      </interleave>
      <mixed><zeroOrMore><element name="hi"><text/></element></zeroOrMore></mixed>
    </element>
  </define>
</grammar>"#;

fn fragment(paragraphs: u64) -> String {
    let mut xml = String::from("<div n=\"1\">");
    for i in 0..paragraphs {
        write!(xml, "<p n=\"{i}\" rend=\"x\">some <hi>text</hi> here</p>").unwrap();
    }
    xml.push_str("</div>");
    xml
}

fn grammar_loading(c: &mut Criterion) {
    c.bench_function("parse grammar", |b| {
        b.iter(|| Grammar::parse(GRAMMAR).unwrap())
    });
}

fn rewriting(c: &mut Criterion) {
    let grammar = Grammar::parse(GRAMMAR).unwrap();
    c.bench_function("resolve and rewrite", |b| {
        b.iter(|| rewrite(&grammar, &resolve(&grammar, "tei:div").unwrap()))
    });
}

fn structural_validation(c: &mut Criterion) {
    let grammar = Grammar::parse(GRAMMAR).unwrap();
    let derived = rewrite(&grammar, &resolve(&grammar, "tei:div").unwrap());
    let mut group = c.benchmark_group("structural validation");
    for size in [10_u64, 100, 1_000] {
        let document = Document::parse(&fragment(size)).unwrap();
        group.throughput(Throughput::Elements(size));
        group.bench_function(format!("fragment with {size} paragraphs"), |b| {
            b.iter(|| {
                assert!(
                    StructuralValidator::new(derived.grammar())
                        .validate(&document)
                        .is_valid()
                )
            })
        });
    }
    group.finish();
}

criterion_group!(validation, grammar_loading, rewriting, structural_validation);
criterion_main!(validation);
