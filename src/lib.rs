//! An XML 1.0 parser with namespace resolution and a tidy recovery mode.
//!
//! `xylem` parses XML documents into an arena-backed tree, with positioned
//! errors, DTD entity handling, automatic encoding detection, and an
//! optional error-tolerant mode that repairs HTML-legacy sloppiness.
//!
//! # Quick start
//!
//! ```
//! use xylem::Document;
//!
//! let doc = Document::parse_str(r#"<greeting lang="en">hello</greeting>"#)?;
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(root), Some("greeting"));
//! assert_eq!(doc.attribute(root, "lang"), Some("en"));
//! assert_eq!(doc.text_content(root), "hello");
//! # Ok::<(), xylem::XmlError>(())
//! ```
//!
//! # Sessions and options
//!
//! [`Parser`] is a reusable session: it owns the [`ParseOptions`] and
//! caches fetched external DTD subsets, so many documents sharing a DTD
//! pay for it once.
//!
//! ```
//! use xylem::{ParseOptions, Parser};
//!
//! let mut parser = Parser::new(ParseOptions::new().tidy(true));
//! let doc = parser.parse_str("<P CLASS=note>repaired</P>")?;
//! let p = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(p), Some("p"));
//! assert_eq!(doc.attribute(p, "class"), Some("note"));
//! # Ok::<(), xylem::XmlError>(())
//! ```
//!
//! # Errors
//!
//! Every [`XmlError`] carries an [`ErrorKind`] and a [`Position`] (line,
//! column, and the name of the input the error was detected in, which for
//! errors inside entity replacement text is the entity). A parse stops at
//! the first error.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dtd;
pub mod encoding;
pub mod entity;
pub mod error;
pub mod namespace;
pub mod parser;
mod reader;
pub mod tree;

pub use error::{ErrorKind, Position, XmlError};
pub use namespace::{XML_NAMESPACE, XMLNS_NAMESPACE};
pub use parser::{
    parse_bytes, parse_bytes_with_options, parse_str, parse_str_with_options, ParseOptions,
    Parser, ResourceRequest, ResourceResolver,
};
pub use tree::{Attribute, Document, NodeId, NodeKind};
