//! Parsing entry points, options, and the reusable parse session.
//!
//! [`Parser`] is a session: it owns the [`ParseOptions`] and the external
//! subset cache, so parsing several documents that share a DTD fetches and
//! parses the subset once. The free functions ([`parse_str`],
//! [`parse_bytes`], and their `_with_options` variants) are one-shot
//! conveniences that build a throwaway session.
//!
//! Namespace resolution always runs as a post-pass over the finished tree;
//! the grammar itself stores raw qualified names.

use std::sync::Arc;

use crate::encoding;
use crate::entity::SubsetCache;
use crate::error::XmlError;
use crate::namespace;
use crate::reader::Reader;
use crate::tree::Document;

mod markup;

use markup::MarkupParser;

/// Maximum element nesting depth unless overridden in [`ParseOptions`].
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A request to fetch an external resource (DTD subset or external entity).
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    /// The SYSTEM identifier of the resource.
    pub system_id: &'a str,
    /// The PUBLIC identifier, if the reference carried one.
    pub public_id: Option<&'a str>,
}

/// Resolves external resources to their raw bytes.
///
/// The parser never does I/O itself; the host supplies a resolver that maps
/// identifiers to bytes (read a file, hit a catalog, consult an HTTP cache).
/// Returning `None` means the resource is unavailable.
pub type ResourceResolver = Arc<dyn Fn(ResourceRequest<'_>) -> Option<Vec<u8>> + Send + Sync>;

/// Options controlling parser behavior.
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Enables error-tolerant tidy mode: case-folded names, repaired
    /// attribute syntax, recovered tag mismatches.
    pub tidy: bool,
    /// Maximum element nesting depth; `None` uses [`DEFAULT_MAX_DEPTH`].
    pub max_depth: Option<usize>,
    /// Name reported in error positions for the main input. Defaults to
    /// `"<input>"`.
    pub source_name: Option<String>,
    /// Resolver for external DTD subsets and external entities. Without
    /// one, external resources are skipped or rejected per context.
    pub resolver: Option<ResourceResolver>,
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("tidy", &self.tidy)
            .field("max_depth", &self.max_depth)
            .field("source_name", &self.source_name)
            .field("resolver", &self.resolver.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ParseOptions {
    /// Creates default options: strict mode, default depth limit, no
    /// resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables tidy (error-tolerant) mode.
    #[must_use]
    pub fn tidy(mut self, tidy: bool) -> Self {
        self.tidy = tidy;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the source name used in error positions.
    #[must_use]
    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Installs a resolver for external resources.
    #[must_use]
    pub fn resolver(mut self, resolver: ResourceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// A reusable parse session.
///
/// Owns the options and the external subset cache. Parsing many documents
/// against the same DTD through one session fetches the subset once.
pub struct Parser {
    options: ParseOptions,
    subset_cache: SubsetCache,
}

impl Parser {
    /// Creates a session with the given options.
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            subset_cache: SubsetCache::default(),
        }
    }

    /// Parses one document from a string.
    ///
    /// # Errors
    ///
    /// Returns the first `XmlError` encountered; the parse does not
    /// continue past it.
    pub fn parse_str(&mut self, input: &str) -> Result<Document, XmlError> {
        let source = self
            .options
            .source_name
            .clone()
            .unwrap_or_else(|| "<input>".to_string());
        let reader = Reader::new(input, source);
        let mut doc =
            MarkupParser::new(&self.options, &mut self.subset_cache).parse(reader)?;
        namespace::resolve_namespaces(&mut doc);
        Ok(doc)
    }

    /// Parses one document from raw bytes, detecting the encoding first.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the decoded input is not well-formed.
    pub fn parse_bytes(&mut self, input: &[u8]) -> Result<Document, XmlError> {
        let decoded = encoding::decode(input);
        self.parse_str(&decoded.text)
    }

    /// Number of external subsets cached so far in this session.
    #[must_use]
    pub fn cached_subsets(&self) -> usize {
        self.subset_cache.len()
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns `XmlError` if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document, XmlError> {
    parse_str_with_options(input, ParseOptions::default())
}

/// Parses an XML string with explicit options.
///
/// # Errors
///
/// Returns `XmlError` if the input is not well-formed XML (subject to tidy
/// leniency when enabled).
pub fn parse_str_with_options(input: &str, options: ParseOptions) -> Result<Document, XmlError> {
    Parser::new(options).parse_str(input)
}

/// Parses XML from raw bytes with default options, detecting the encoding.
///
/// # Errors
///
/// Returns `XmlError` if the decoded input is not well-formed XML.
pub fn parse_bytes(input: &[u8]) -> Result<Document, XmlError> {
    parse_bytes_with_options(input, ParseOptions::default())
}

/// Parses XML from raw bytes with explicit options.
///
/// # Errors
///
/// Returns `XmlError` if the decoded input is not well-formed XML.
pub fn parse_bytes_with_options(input: &[u8], options: ParseOptions) -> Result<Document, XmlError> {
    Parser::new(options).parse_bytes(input)
}
