//! Entity expansion and DTD subset handling, end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use xylem::{parse_str, parse_str_with_options, ErrorKind, ParseOptions, Parser,
    ResourceRequest, ResourceResolver};

/// A resolver serving a fixed external subset and one external entity,
/// counting how many times the subset is actually fetched.
fn counting_resolver(fetches: Arc<AtomicUsize>) -> ResourceResolver {
    Arc::new(move |request: ResourceRequest<'_>| match request.system_id {
        "shared.dtd" => {
            fetches.fetch_add(1, Ordering::SeqCst);
            Some(b"<!ENTITY motto \"per aspera\"> <!ELEMENT r (#PCDATA)>".to_vec())
        }
        "chapter.txt" => Some(b"external body".to_vec()),
        _ => None,
    })
}

#[test]
fn external_subset_is_fetched_once_per_session() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let options = ParseOptions::new().resolver(counting_resolver(fetches.clone()));
    let mut parser = Parser::new(options);

    let input = r#"<!DOCTYPE r SYSTEM "shared.dtd"><r>&motto;</r>"#;
    for _ in 0..3 {
        let doc = parser.parse_str(input).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "per aspera");
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(parser.cached_subsets(), 1);
}

#[test]
fn separate_sessions_do_not_share_the_cache() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let input = r#"<!DOCTYPE r SYSTEM "shared.dtd"><r>&motto;</r>"#;

    for _ in 0..2 {
        let options = ParseOptions::new().resolver(counting_resolver(fetches.clone()));
        Parser::new(options).parse_str(input).unwrap();
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[test]
fn internal_declaration_wins_over_external_subset() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let options = ParseOptions::new().resolver(counting_resolver(fetches));
    let mut parser = Parser::new(options);

    let input =
        r#"<!DOCTYPE r SYSTEM "shared.dtd" [<!ENTITY motto "ad astra">]><r>&motto;</r>"#;
    let doc = parser.parse_str(input).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "ad astra");
}

#[test]
fn first_declaration_wins_within_a_subset() {
    let doc = parse_str(
        r#"<!DOCTYPE r [<!ENTITY e "first"><!ENTITY e "second">]><r>&e;</r>"#,
    )
    .unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "first");
}

#[test]
fn builtin_entities_cannot_be_redeclared() {
    let doc = parse_str(r#"<!DOCTYPE r [<!ENTITY amp "XXX">]><r>&amp;</r>"#).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "&");
}

#[test]
fn external_general_entity_in_content() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let options = ParseOptions::new().resolver(counting_resolver(fetches));
    let mut parser = Parser::new(options);

    let input = concat!(
        r#"<!DOCTYPE r [<!ENTITY chap SYSTEM "chapter.txt">]>"#,
        "<r>&chap;</r>"
    );
    let doc = parser.parse_str(input).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "external body");
}

#[test]
fn external_entity_without_resolver_is_fatal() {
    let err = parse_str(concat!(
        r#"<?xml version="1.0" standalone="yes"?>"#,
        r#"<!DOCTYPE r [<!ENTITY chap SYSTEM "chapter.txt">]>"#,
        "<r>&chap;</r>"
    ))
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
    assert!(err.message.contains("&chap;"));
}

#[test]
fn external_entity_rejected_in_attribute_value() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let options = ParseOptions::new().resolver(counting_resolver(fetches));
    let err = parse_str_with_options(
        concat!(
            r#"<!DOCTYPE r [<!ENTITY chap SYSTEM "chapter.txt">]>"#,
            r#"<r a="&chap;"/>"#
        ),
        options,
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
    assert!(err.message.contains("attribute"));
}

#[test]
fn parameter_entities_build_declarations() {
    let doc = parse_str(concat!(
        "<!DOCTYPE r [",
        r#"<!ENTITY % text "msg CDATA #IMPLIED">"#,
        "<!ATTLIST r %text;>",
        r#"<!ENTITY greet "hi">"#,
        "]><r>&greet;</r>"
    ))
    .unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "hi");
}

#[test]
fn undefined_parameter_entity_is_fatal_even_in_tidy() {
    let input = "<!DOCTYPE r [%nope;]><r/>";
    let err = parse_str(input).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedEntity);

    let err = parse_str_with_options(input, ParseOptions::new().tidy(true)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedEntity);
}

#[test]
fn entity_recursion_is_fatal() {
    let err = parse_str(r#"<!DOCTYPE r [<!ENTITY e "x&e;y">]><r>&e;</r>"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
    assert!(err.message.contains("recursive"));

    // Indirect, through an attribute value.
    let err = parse_str(
        r#"<!DOCTYPE r [<!ENTITY a "&b;"><!ENTITY b "&a;">]><r x="&a;"/>"#,
    )
    .unwrap_err();
    assert!(err.message.contains("recursive"));
}

#[test]
fn nonrecursive_reuse_of_an_entity_is_fine() {
    let doc = parse_str(
        r#"<!DOCTYPE r [<!ENTITY e "x">]><r a="&e;">&e; and &e;</r>"#,
    )
    .unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.attribute(root, "a"), Some("x"));
    assert_eq!(doc.text_content(root), "x and x");
}

#[test]
fn duplicate_element_declaration_is_validity_error() {
    let input = "<!DOCTYPE r [<!ELEMENT r EMPTY><!ELEMENT r ANY>]><r/>";
    let err = parse_str(input).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validity);

    // Tidy keeps the first declaration and moves on.
    let doc = parse_str_with_options(input, ParseOptions::new().tidy(true)).unwrap();
    assert!(doc.root_element().is_some());
}

#[test]
fn entity_declared_in_entity_error_names_the_entity_source() {
    // The bad reference lives inside the replacement text of &e;, so the
    // error position points into the entity, not the document.
    let err = parse_str(r#"<!DOCTYPE r [<!ENTITY e "a &nope; b">]><r>&e;</r>"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
    assert_eq!(err.position.source, "&e;");
}
