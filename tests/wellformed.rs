//! End-to-end well-formedness and structure tests.

use pretty_assertions::assert_eq;
use xylem::{parse_bytes, parse_str, parse_str_with_options, Document, ErrorKind, NodeKind,
    ParseOptions};

/// Renders the tree as one canonical line per node, for structural
/// comparison without a serializer.
fn shape(doc: &Document) -> String {
    fn walk(doc: &Document, id: xylem::NodeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match &doc.node(id).kind {
            NodeKind::Document => {}
            NodeKind::Element {
                name,
                prefix,
                namespace,
                attributes,
            } => {
                out.push_str(&indent);
                out.push_str("element ");
                if let Some(prefix) = prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(name);
                if let Some(ns) = namespace {
                    out.push_str(&format!(" ns={ns}"));
                }
                for attr in attributes {
                    out.push_str(&format!(" {}={:?}", attr.name, attr.value));
                }
                out.push('\n');
            }
            NodeKind::Text { content } => {
                out.push_str(&format!("{indent}text {content:?}\n"));
            }
            NodeKind::CData { content } => {
                out.push_str(&format!("{indent}cdata {content:?}\n"));
            }
            NodeKind::Comment { content } => {
                out.push_str(&format!("{indent}comment {content:?}\n"));
            }
            NodeKind::ProcessingInstruction { target, data } => {
                out.push_str(&format!("{indent}pi {target} {data:?}\n"));
            }
            NodeKind::DocumentType { name, .. } => {
                out.push_str(&format!("{indent}doctype {name}\n"));
            }
        }
        for child in doc.children(id) {
            walk(doc, child, depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(doc, doc.root(), 0, &mut out);
    out
}

#[test]
fn full_document_end_to_end() {
    let input = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!DOCTYPE r [<!ENTITY note \"N\">]>\n",
        "<!-- header -->\n",
        "<r a=\"&amp;1\"><c/>text &note;<![CDATA[<raw>]]></r>\n",
        "<?done now?>"
    );
    let doc = parse_str(input).unwrap();

    assert_eq!(doc.version.as_deref(), Some("1.0"));
    assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));

    let root = doc.root_element().unwrap();
    assert_eq!(doc.node_name(root), Some("r"));
    assert_eq!(doc.attribute(root, "a"), Some("&1"));

    let children: Vec<_> = doc.children(root).collect();
    assert_eq!(children.len(), 3);
    assert_eq!(doc.node_name(children[0]), Some("c"));
    assert_eq!(doc.node_text(children[1]), Some("text N"));
    assert!(matches!(doc.node(children[2]).kind, NodeKind::CData { .. }));
    assert_eq!(doc.text_content(root), "text N<raw>");

    let top: Vec<_> = doc.children(doc.root()).collect();
    assert!(matches!(doc.node(top[0]).kind, NodeKind::DocumentType { .. }));
    assert!(matches!(doc.node(top[1]).kind, NodeKind::Comment { .. }));
    assert!(matches!(
        doc.node(top[3]).kind,
        NodeKind::ProcessingInstruction { .. }
    ));
}

#[test]
fn parsing_is_deterministic() {
    let input = r#"<a x="1"><b>one</b><!-- c --><b>two&#33;</b></a>"#;
    let first = parse_str(input).unwrap();
    let second = parse_str(input).unwrap();
    assert_eq!(shape(&first), shape(&second));
}

#[test]
fn bytes_with_utf16_bom() {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "<r a=\"v\">t</r>".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let doc = parse_bytes(&bytes).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.attribute(root, "a"), Some("v"));
    assert_eq!(doc.text_content(root), "t");
}

#[test]
fn bytes_with_declared_latin1() {
    let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>";
    let doc = parse_bytes(bytes).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "café");
}

#[test]
fn utf8_bom_is_skipped() {
    let doc = parse_bytes(b"\xEF\xBB\xBF<r/>").unwrap();
    assert!(doc.root_element().is_some());
}

#[test]
fn duplicate_attribute_is_well_formedness_error() {
    let err = parse_str(r#"<r a="1" a="2"/>"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
}

#[test]
fn mismatched_end_tag_reports_position() {
    let err = parse_str("<a>\n<b></c></a>").unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
    assert_eq!(err.position.line, 2);
    assert_eq!(err.position.column, 6);
}

#[test]
fn truncated_document_names_the_open_construct() {
    let err = parse_str("<root><open>").unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
    assert!(err.message.contains("'open'"));

    let err = parse_str("<r><!-- never closed").unwrap_err();
    assert!(err.message.contains("comment"));

    let err = parse_str("<r><![CDATA[open").unwrap_err();
    assert!(err.message.contains("CDATA"));
}

#[test]
fn source_name_appears_in_errors() {
    let err = parse_str_with_options(
        "<r><bad</r>",
        ParseOptions::new().source_name("sample.xml"),
    )
    .unwrap_err();
    assert_eq!(err.position.source, "sample.xml");
    assert!(err.to_string().starts_with("sample.xml:"));
}

#[test]
fn public_doctype_without_system_literal() {
    // Legacy doctypes may carry only a public identifier.
    let input = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN"><html/>"#;
    let doc = parse_str(input).unwrap();
    let dt = doc.doctype().unwrap();
    match &doc.node(dt).kind {
        NodeKind::DocumentType {
            public_id,
            system_id,
            ..
        } => {
            assert_eq!(public_id.as_deref(), Some("-//W3C//DTD HTML 4.01//EN"));
            assert_eq!(*system_id, None);
        }
        other => panic!("expected a doctype node, got {other:?}"),
    }
    assert!(
        parse_str_with_options(input, ParseOptions::new().tidy(true)).is_ok(),
        "tidy should accept a public-only doctype"
    );
}

#[test]
fn whitespace_between_top_level_constructs_is_allowed() {
    let doc = parse_str("\n  <!-- a -->\n  <r/>\n  <!-- b -->\n").unwrap();
    assert!(doc.root_element().is_some());
}

#[test]
fn multiple_root_elements_rejected() {
    let err = parse_str("<a/> <b/>").unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
}

#[test]
fn text_outside_root_rejected() {
    let err = parse_str("stray <r/>").unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);

    let err = parse_str("<r/> stray").unwrap_err();
    assert_eq!(err.kind, ErrorKind::WellFormedness);
}

#[test]
fn crlf_input_normalizes_and_counts_lines() {
    let doc = parse_str("<r>\r\nline\r\n</r>").unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "\nline\n");

    let err = parse_str("<r>\r\n<b></x>\r\n</r>").unwrap_err();
    assert_eq!(err.position.line, 2);
}
