//! Namespace resolution as a post-pass over the finished tree.
//!
//! The grammar stores qualified names raw (`p:a` is one string). This pass
//! walks the tree depth-first in document order with a stack of in-scope
//! declarations, splits every element and attribute name, and fills in the
//! resolved prefix and namespace URI.
//!
//! Resolution is deliberately lenient: a prefix with no in-scope
//! declaration resolves to no namespace rather than an error, the name
//! still being split. Unprefixed attributes never take the default
//! namespace (Namespaces in XML 1.0 §6.2). `xmlns=""` unbinds the default
//! namespace for its subtree.

use crate::reader::split_name;
use crate::tree::{Document, NodeId, NodeKind};

/// The namespace name bound to the `xml` prefix, implicitly and always.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace name of namespace declaration attributes themselves.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// One scope frame: `(prefix, uri)` pairs declared on a single element.
/// `prefix: None` is the default namespace; `uri: None` is an unbinding.
type Frame = Vec<(Option<String>, Option<String>)>;

/// Resolves namespaces across the whole document in place.
pub fn resolve_namespaces(doc: &mut Document) {
    let mut scopes: Vec<Frame> = Vec::new();
    visit(doc, doc.root(), &mut scopes);
}

fn visit(doc: &mut Document, id: NodeId, scopes: &mut Vec<Frame>) {
    let mut pushed = false;

    if matches!(doc.node(id).kind, NodeKind::Element { .. }) {
        // Declarations on this element take effect before its own name is
        // resolved, so collect them first from the raw attribute names.
        let mut frame: Frame = Vec::new();
        if let NodeKind::Element { attributes, .. } = &doc.node(id).kind {
            for attr in attributes {
                if attr.name == "xmlns" {
                    frame.push((None, non_empty(&attr.value)));
                } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                    frame.push((Some(prefix.to_string()), non_empty(&attr.value)));
                }
            }
        }
        scopes.push(frame);
        pushed = true;

        if let NodeKind::Element {
            name,
            prefix,
            namespace,
            attributes,
        } = &mut doc.node_mut(id).kind
        {
            for attr in attributes.iter_mut() {
                if attr.name == "xmlns" {
                    attr.namespace = Some(XMLNS_NAMESPACE.to_string());
                } else if let Some(local) = attr.name.strip_prefix("xmlns:") {
                    attr.name = local.to_string();
                    attr.prefix = Some("xmlns".to_string());
                    attr.namespace = Some(XMLNS_NAMESPACE.to_string());
                } else {
                    let (p, local) = owned_split(&attr.name);
                    if let Some(p) = p {
                        attr.namespace = lookup(scopes, Some(p.as_str()));
                        attr.prefix = Some(p);
                        attr.name = local;
                    }
                    // Unprefixed attributes never take the default namespace.
                }
            }

            let (p, local) = owned_split(name);
            match p {
                Some(p) => {
                    *namespace = lookup(scopes, Some(&p));
                    *prefix = Some(p);
                    *name = local;
                }
                None => *namespace = lookup(scopes, None),
            }
        }
    }

    for child in doc.children(id).collect::<Vec<_>>() {
        visit(doc, child, scopes);
    }
    if pushed {
        scopes.pop();
    }
}

/// Resolves a prefix (or the default namespace for `None`) against the
/// scope stack, innermost declaration first.
fn lookup(scopes: &[Frame], prefix: Option<&str>) -> Option<String> {
    // xml and xmlns are bound implicitly and cannot be redeclared away.
    match prefix {
        Some("xml") => return Some(XML_NAMESPACE.to_string()),
        Some("xmlns") => return Some(XMLNS_NAMESPACE.to_string()),
        _ => {}
    }
    for frame in scopes.iter().rev() {
        for (declared, uri) in frame.iter().rev() {
            if declared.as_deref() == prefix {
                return uri.clone();
            }
        }
    }
    None
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn owned_split(name: &str) -> (Option<String>, String) {
    let (prefix, local) = split_name(name);
    (prefix.map(str::to_string), local.to_string())
}
