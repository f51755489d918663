//! DTD subset grammar and declaration data model.
//!
//! Parses internal and external DTD subsets: `<!ENTITY>`, `<!ELEMENT>`,
//! `<!ATTLIST>`, `<!NOTATION>` declarations, comments, processing
//! instructions, and `%name;` parameter-entity references between
//! declarations. Entity declarations populate the session's
//! [`EntityTable`]; element and attribute-list declarations are parsed into
//! a data form ([`ContentModel`], [`AttributeDecl`]) but not mechanically
//! verified against instance documents.
//!
//! Parameter-entity expansion inside a declaration body follows XML 1.0
//! §4.4.8: every `%name;` in the raw text is replaced, recursively, by its
//! replacement text padded with one leading and one trailing space, and the
//! expanded text is then re-tokenized with a fresh reader.

use std::collections::HashMap;

use crate::encoding;
use crate::entity::{Entity, EntityKind, EntityTable, EntityValue, ExternalId};
use crate::error::{ErrorKind, Position, XmlError};
use crate::parser::ResourceResolver;
use crate::reader::{is_name_char, is_name_start_char, is_xml_char, is_xml_whitespace, Reader};

// ---------------------------------------------------------------------------
// Declaration data model
// ---------------------------------------------------------------------------

/// All element and attribute-list declarations gathered from the subsets.
#[derive(Debug, Clone, Default)]
pub struct Dtd {
    /// Element declarations, keyed by element name.
    pub elements: HashMap<String, ElementDecl>,
    /// Attribute-list declarations, keyed by element name.
    pub attlists: HashMap<String, Vec<AttributeDecl>>,
}

/// An element declaration from `<!ELEMENT name content-model>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    /// The element name.
    pub name: String,
    /// The declared content model.
    pub content_model: ContentModel,
}

/// The content model of an element declaration (XML 1.0 §3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum ContentModel {
    /// `EMPTY`: no children allowed.
    Empty,
    /// `ANY`: any content allowed.
    Any,
    /// Mixed content `(#PCDATA)` or `(#PCDATA|a|b)*`; the list holds the
    /// allowed element names.
    Mixed(Vec<String>),
    /// Element-only content, e.g. `(a,(b|c)*,d?)`.
    Children(ContentSpec),
}

/// A content particle with its occurrence indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpec {
    /// What the particle matches.
    pub kind: ContentSpecKind,
    /// How many times it may occur.
    pub occurrence: Occurrence,
}

/// The kind of a content particle.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSpecKind {
    /// A single element name.
    Name(String),
    /// A sequence `(a, b, c)`.
    Seq(Vec<ContentSpec>),
    /// A choice `(a | b | c)`.
    Choice(Vec<ContentSpec>),
}

/// Occurrence indicator: none, `?`, `*`, or `+` (XML 1.0 §3.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Exactly once.
    Once,
    /// Zero or one (`?`).
    Optional,
    /// Zero or more (`*`).
    ZeroOrMore,
    /// One or more (`+`).
    OneOrMore,
}

/// One attribute declaration from an `<!ATTLIST>` (XML 1.0 §3.3).
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    /// The element the attribute belongs to.
    pub element_name: String,
    /// The attribute name.
    pub attribute_name: String,
    /// The declared type.
    pub attribute_type: AttributeType,
    /// The declared default.
    pub default: AttributeDefault,
}

/// The declared type of an attribute (XML 1.0 §3.3.1).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    /// `CDATA`.
    CData,
    /// `ID`.
    Id,
    /// `IDREF`.
    IdRef,
    /// `IDREFS`.
    IdRefs,
    /// `ENTITY`.
    Entity,
    /// `ENTITIES`.
    Entities,
    /// `NMTOKEN`.
    NmToken,
    /// `NMTOKENS`.
    NmTokens,
    /// `NOTATION (a|b)`.
    Notation(Vec<String>),
    /// Enumeration `(a|b|c)`.
    Enumeration(Vec<String>),
}

/// The default-value specification of an attribute (XML 1.0 §3.3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDefault {
    /// `#REQUIRED`.
    Required,
    /// `#IMPLIED`.
    Implied,
    /// `#FIXED "value"`.
    Fixed(String),
    /// A plain default value.
    Default(String),
}

// ---------------------------------------------------------------------------
// Subset parser
// ---------------------------------------------------------------------------

/// Parses DTD subsets into declarations, sharing the session entity table.
pub(crate) struct DtdParser<'a> {
    entities: &'a mut EntityTable,
    dtd: &'a mut Dtd,
    resolver: Option<&'a ResourceResolver>,
    tidy: bool,
}

impl<'a> DtdParser<'a> {
    pub fn new(
        entities: &'a mut EntityTable,
        dtd: &'a mut Dtd,
        resolver: Option<&'a ResourceResolver>,
        tidy: bool,
    ) -> Self {
        Self {
            entities,
            dtd,
            resolver,
            tidy,
        }
    }

    /// Parses a bracketed internal subset. The reader is positioned just
    /// past the opening `[`; the closing `]` is consumed.
    pub fn parse_internal_subset(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        self.parse_subset_body(reader, true)
    }

    /// Parses a whole subset (an external subset or a parameter-entity
    /// expansion) to end of input.
    pub fn parse_subset(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        self.parse_subset_body(reader, false)
    }

    fn parse_subset_body(&mut self, reader: &mut Reader, internal: bool) -> Result<(), XmlError> {
        loop {
            reader.skip_whitespace();
            if internal && reader.looking_at("]") {
                reader.read_expected_string("]")?;
                return Ok(());
            }
            if reader.at_end() {
                if internal {
                    // The document ended before the subset's closing ']'.
                    return Err(reader.premature_end());
                }
                return Ok(());
            }

            if reader.looking_at("<!--") {
                self.parse_comment(reader)?;
            } else if reader.looking_at("<?") {
                // Processing instructions in subsets are read and dropped.
                reader.read_expected_string("<?")?;
                reader
                    .read_delimited_string("?>")
                    .map_err(|e| e.or_incomplete("processing instruction", ""))?;
            } else if reader.looking_at("<!ENTITY") {
                self.parse_entity_decl(reader)?;
            } else if reader.looking_at("<!ELEMENT") {
                self.parse_element_decl(reader)?;
            } else if reader.looking_at("<!ATTLIST") {
                self.parse_attlist_decl(reader)?;
            } else if reader.looking_at("<!NOTATION") {
                // Notations are accepted and dropped; nothing here uses them.
                self.read_raw_decl_body(reader)?;
            } else if reader.looking_at("%") {
                self.parse_pe_reference(reader)?;
            } else {
                return Err(reader.error(
                    ErrorKind::Syntax,
                    format!(
                        "unexpected character '{}' in DTD subset",
                        reader.peek_char().unwrap_or('?')
                    ),
                ));
            }
        }
    }

    fn parse_comment(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        reader.read_expected_string("<!--")?;
        reader
            .read_delimited_string("--")
            .map_err(|e| e.or_incomplete("comment", ""))?;
        reader
            .read_expected_char(">")
            .map_err(|e| match e.kind {
                ErrorKind::Syntax => XmlError::new(
                    ErrorKind::WellFormedness,
                    "comment must not contain '--'",
                    e.position,
                ),
                _ => e.or_incomplete("comment", ""),
            })?;
        Ok(())
    }

    // -- <!ENTITY> --

    fn parse_entity_decl(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        reader.read_expected_string("<!ENTITY")?;
        reader.skip_whitespace_required()?;

        let kind = if reader.looking_at("%") {
            reader.read_expected_string("%")?;
            reader.skip_whitespace_required()?;
            EntityKind::Parameter
        } else {
            EntityKind::General
        };

        let position = reader.position();
        let name = reader.read_name()?;
        reader
            .skip_whitespace_required()
            .map_err(|e| e.or_incomplete("entity declaration", &name))?;

        let entity = match reader.peek_char() {
            Some('"' | '\'') => {
                let raw = self.read_quoted(reader, "entity declaration", &name)?;
                // Character references and parameter-entity references in
                // the literal are expanded at declaration time (XML 1.0
                // §4.5); general entity references stay for lazy expansion.
                let pe_expanded = self.expand_parameter_text(&raw, &position)?;
                let text = expand_char_refs(&pe_expanded, &position)?;
                Entity::internal(name.clone(), kind, text, position)
            }
            _ => {
                let external_id = parse_external_id(reader, &name)?;
                // Optional NDATA notation name for unparsed entities; read
                // and dropped.
                reader.skip_whitespace();
                if reader.looking_at("NDATA") {
                    reader.read_expected_string("NDATA")?;
                    reader.skip_whitespace_required()?;
                    reader.read_name()?;
                }
                Entity::external(name.clone(), kind, external_id, position)
            }
        };

        reader.skip_whitespace();
        reader
            .read_expected_char(">")
            .map_err(|e| e.or_incomplete("entity declaration", &name))?;

        match kind {
            EntityKind::General => self.entities.declare_general(entity),
            EntityKind::Parameter => self.entities.declare_parameter(entity),
        }
        Ok(())
    }

    // -- <!ELEMENT> --

    fn parse_element_decl(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        reader.read_expected_string("<!ELEMENT")?;
        let position = reader.position();
        let raw = self.read_raw_decl_body(reader)?;
        let expanded = self.expand_parameter_text(&raw, &position)?;

        let mut body = Reader::with_position(&expanded, reader.source(), position.line, position.column);
        body.skip_whitespace();
        let name = body
            .read_name()
            .map_err(|e| e.or_incomplete("element declaration", ""))?;
        body.skip_whitespace_required()
            .map_err(|e| e.or_incomplete("element declaration", &name))?;
        let content_model = parse_content_model(&mut body, &name)?;
        body.skip_whitespace();
        if !body.at_end() {
            return Err(body.error(
                ErrorKind::Syntax,
                format!("unexpected content after the content model of element '{name}'"),
            ));
        }

        if self.dtd.elements.contains_key(&name) {
            if self.tidy {
                // First declaration stands.
                return Ok(());
            }
            return Err(XmlError::new(
                ErrorKind::Validity,
                format!("duplicate declaration of element type '{name}'"),
                position,
            ));
        }
        self.dtd.elements.insert(
            name.clone(),
            ElementDecl {
                name,
                content_model,
            },
        );
        Ok(())
    }

    // -- <!ATTLIST> --

    fn parse_attlist_decl(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        reader.read_expected_string("<!ATTLIST")?;
        let position = reader.position();
        let raw = self.read_raw_decl_body(reader)?;
        let expanded = self.expand_parameter_text(&raw, &position)?;

        let mut body = Reader::with_position(&expanded, reader.source(), position.line, position.column);
        body.skip_whitespace();
        let element_name = body
            .read_name()
            .map_err(|e| e.or_incomplete("attribute-list declaration", ""))?;

        loop {
            body.skip_whitespace();
            if body.at_end() {
                break;
            }
            let attribute_name = body.read_name()?;
            body.skip_whitespace_required()
                .map_err(|e| e.or_incomplete("attribute-list declaration", &element_name))?;
            let attribute_type = parse_attribute_type(&mut body, &element_name)?;
            body.skip_whitespace_required()
                .map_err(|e| e.or_incomplete("attribute-list declaration", &element_name))?;
            let default = parse_attribute_default(&mut body, &element_name)?;

            self.dtd
                .attlists
                .entry(element_name.clone())
                .or_default()
                .push(AttributeDecl {
                    element_name: element_name.clone(),
                    attribute_name,
                    attribute_type,
                    default,
                });
        }
        Ok(())
    }

    // -- Parameter entities --

    /// Parses a `%name;` reference between declarations and recursively
    /// parses the replacement text as its own subset.
    fn parse_pe_reference(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        let position = reader.position();
        reader.read_expected_string("%")?;
        let name = reader.read_name()?;
        reader
            .read_expected_char(";")
            .map_err(|e| e.or_incomplete("parameter entity reference", &name))?;

        let text = self.parameter_replacement_text(&name, &position)?;
        let entity_position = match self.entities.resolve_parameter(&name) {
            Some(entity) => entity.position.clone(),
            None => position.clone(),
        };

        let key = format!("%{name}");
        self.entities.begin_expansion(&key, &position)?;
        let mut pe_reader = Reader::with_position(
            &text,
            format!("%{name};"),
            entity_position.line,
            entity_position.column,
        );
        let result = self.parse_subset(&mut pe_reader);
        self.entities.end_expansion(&key);
        result
    }

    /// Returns the replacement text of a parameter entity, fetching and
    /// decoding external ones. Undeclared or unfetchable parameter
    /// entities are always a hard error.
    fn parameter_replacement_text(
        &mut self,
        name: &str,
        position: &Position,
    ) -> Result<String, XmlError> {
        let entity = self.entities.resolve_parameter(name).ok_or_else(|| {
            XmlError::new(
                ErrorKind::UndefinedEntity,
                format!("undefined parameter entity '%{name};'"),
                position.clone(),
            )
        })?;
        match &entity.value {
            EntityValue::Internal(text) => Ok(text.clone()),
            EntityValue::External(external_id) => {
                let external_id = external_id.clone();
                match self.resolver {
                    Some(resolver) => fetch_external(resolver, &external_id, position),
                    None => Err(XmlError::new(
                        ErrorKind::UndefinedEntity,
                        format!("external parameter entity '%{name};' cannot be resolved"),
                        position.clone(),
                    )),
                }
            }
        }
    }

    /// Expands every `%name;` reference in `text`, recursively, padding
    /// each expansion with one leading and one trailing space, so the
    /// result can be re-tokenized as declaration text (XML 1.0 §4.4.8).
    pub fn expand_parameter_text(
        &mut self,
        text: &str,
        position: &Position,
    ) -> Result<String, XmlError> {
        if !text.contains('%') {
            return Ok(text.to_string());
        }
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '%' || !chars.peek().copied().is_some_and(is_name_start_char) {
                out.push(ch);
                continue;
            }
            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if is_name_char(next) {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek() != Some(&';') {
                return Err(XmlError::new(
                    ErrorKind::Syntax,
                    format!("parameter entity reference '%{name}' is missing ';'"),
                    position.clone(),
                ));
            }
            chars.next(); // ;

            let replacement = self.parameter_replacement_text(&name, position)?;
            let key = format!("%{name}");
            self.entities.begin_expansion(&key, position)?;
            let expanded = self.expand_parameter_text(&replacement, position);
            self.entities.end_expansion(&key);
            out.push(' ');
            out.push_str(&expanded?);
            out.push(' ');
        }
        Ok(out)
    }

    /// Reads a declaration body up to and including the closing `>`,
    /// honoring quoted literals (a `>` inside quotes does not close).
    fn read_raw_decl_body(&mut self, reader: &mut Reader) -> Result<String, XmlError> {
        let mut out = String::new();
        loop {
            let ch = reader.read_char()?;
            match ch {
                '>' => return Ok(out),
                '"' | '\'' => {
                    out.push(ch);
                    out.push_str(&reader.read_string_until_char(&ch.to_string(), true)?);
                    out.push(reader.read_char()?);
                }
                _ => out.push(ch),
            }
        }
    }

    fn read_quoted(
        &mut self,
        reader: &mut Reader,
        construct: &str,
        name: &str,
    ) -> Result<String, XmlError> {
        let quote = reader.read_expected_char("\"'")?;
        let value = reader
            .read_string_until_char(&quote.to_string(), true)
            .map_err(|e| e.or_incomplete(construct, name))?;
        reader.read_char()?; // closing quote
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Shared grammar pieces
// ---------------------------------------------------------------------------

/// Parses a `SYSTEM "sys"` or `PUBLIC "pub" ["sys"]` external identifier.
/// The system literal after a public one is optional; legacy doctypes
/// often carry only the public identifier.
pub(crate) fn parse_external_id(reader: &mut Reader, owner: &str) -> Result<ExternalId, XmlError> {
    if reader.looking_at("SYSTEM") {
        reader.read_expected_string("SYSTEM")?;
        reader.skip_whitespace_required()?;
        let system_id = read_quoted_literal(reader, owner)?;
        Ok(ExternalId {
            public_id: None,
            system_id: Some(system_id),
        })
    } else if reader.looking_at("PUBLIC") {
        reader.read_expected_string("PUBLIC")?;
        reader.skip_whitespace_required()?;
        let public_id = read_quoted_literal(reader, owner)?;
        // Look past whitespace without consuming it: a quote starts the
        // system literal, anything else ends the identifier.
        let mut ahead = 0;
        while reader.peek_at(ahead).is_some_and(is_xml_whitespace) {
            ahead += 1;
        }
        let system_id = if matches!(reader.peek_at(ahead), Some('"' | '\'')) {
            reader.skip_whitespace();
            Some(read_quoted_literal(reader, owner)?)
        } else {
            None
        };
        Ok(ExternalId {
            public_id: Some(public_id),
            system_id,
        })
    } else {
        Err(reader.error(
            ErrorKind::Syntax,
            "expected SYSTEM or PUBLIC external identifier",
        ))
    }
}

fn read_quoted_literal(reader: &mut Reader, owner: &str) -> Result<String, XmlError> {
    let quote = reader.read_expected_char("\"'")?;
    let value = reader
        .read_string_until_char(&quote.to_string(), true)
        .map_err(|e| e.or_incomplete("external identifier", owner))?;
    reader.read_char()?;
    Ok(value)
}

/// Fetches and decodes an external resource through the resolver.
pub(crate) fn fetch_external(
    resolver: &ResourceResolver,
    external_id: &ExternalId,
    position: &Position,
) -> Result<String, XmlError> {
    let Some(system_id) = external_id.system_id.as_deref() else {
        return Err(XmlError::new(
            ErrorKind::WellFormedness,
            "external resource has no system identifier to fetch",
            position.clone(),
        ));
    };
    let request = crate::parser::ResourceRequest {
        system_id,
        public_id: external_id.public_id.as_deref(),
    };
    match resolver(request) {
        Some(bytes) => Ok(encoding::decode(&bytes).text),
        None => Err(XmlError::new(
            ErrorKind::WellFormedness,
            format!("external resource '{system_id}' cannot be resolved"),
            position.clone(),
        )),
    }
}

/// Expands `&#N;` and `&#xN;` character references; everything else is
/// copied through untouched.
pub(crate) fn expand_char_refs(text: &str, position: &Position) -> Result<String, XmlError> {
    if !text.contains("&#") {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("&#") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 2..];
        let end = after.find(';').ok_or_else(|| {
            XmlError::new(
                ErrorKind::WellFormedness,
                "character reference is missing ';'",
                position.clone(),
            )
        })?;
        let digits = &after[..end];
        out.push(char_from_reference(digits, position)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Decodes the digits of a character reference (`65` or `x41`), validating
/// that the result is a legal XML character.
pub(crate) fn char_from_reference(digits: &str, position: &Position) -> Result<char, XmlError> {
    let value = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16)
    } else {
        digits.parse::<u32>()
    };
    let code = value.map_err(|_| {
        XmlError::new(
            ErrorKind::WellFormedness,
            format!("malformed character reference '&#{digits};'"),
            position.clone(),
        )
    })?;
    match char::from_u32(code) {
        Some(ch) if is_xml_char(ch) => Ok(ch),
        _ => Err(XmlError::new(
            ErrorKind::WellFormedness,
            format!("character reference &#{digits}; is not a legal XML character"),
            position.clone(),
        )),
    }
}

// -- Content models --

fn parse_content_model(reader: &mut Reader, element: &str) -> Result<ContentModel, XmlError> {
    if reader.looking_at("EMPTY") {
        reader.read_expected_string("EMPTY")?;
        return Ok(ContentModel::Empty);
    }
    if reader.looking_at("ANY") {
        reader.read_expected_string("ANY")?;
        return Ok(ContentModel::Any);
    }
    reader
        .read_expected_char("(")
        .map_err(|e| e.or_incomplete("element declaration", element))?;
    reader.skip_whitespace();

    if reader.looking_at("#PCDATA") {
        reader.read_expected_string("#PCDATA")?;
        let mut names = Vec::new();
        loop {
            reader.skip_whitespace();
            if reader.looking_at(")") {
                reader.read_expected_string(")")?;
                break;
            }
            reader.read_expected_char("|")?;
            reader.skip_whitespace();
            names.push(reader.read_name()?);
        }
        // A repetition star is required when names are listed, optional
        // for bare (#PCDATA).
        if reader.looking_at("*") {
            reader.read_expected_string("*")?;
        } else if !names.is_empty() {
            return Err(reader.error(
                ErrorKind::Syntax,
                "mixed content model with names must end in ')*'",
            ));
        }
        return Ok(ContentModel::Mixed(names));
    }

    let spec = parse_content_group(reader, element)?;
    Ok(ContentModel::Children(spec))
}

/// Parses the inside of a `(...)` group; the opening paren is consumed.
fn parse_content_group(reader: &mut Reader, element: &str) -> Result<ContentSpec, XmlError> {
    let mut items = vec![parse_content_particle(reader, element)?];
    let mut separator: Option<char> = None;
    loop {
        reader.skip_whitespace();
        match reader.peek_char() {
            Some(')') => {
                reader.read_char()?;
                break;
            }
            Some(sep @ (',' | '|')) => {
                if separator.is_some_and(|s| s != sep) {
                    return Err(reader.error(
                        ErrorKind::Syntax,
                        "content model group mixes ',' and '|'",
                    ));
                }
                separator = Some(sep);
                reader.read_char()?;
                reader.skip_whitespace();
                items.push(parse_content_particle(reader, element)?);
            }
            _ => {
                return Err(reader
                    .error(ErrorKind::Syntax, "expected ',', '|', or ')' in content model")
                    .or_incomplete("element declaration", element))
            }
        }
    }
    let kind = match separator {
        Some('|') => ContentSpecKind::Choice(items),
        // A single-particle group is a degenerate sequence.
        _ => ContentSpecKind::Seq(items),
    };
    Ok(ContentSpec {
        kind,
        occurrence: parse_occurrence(reader),
    })
}

fn parse_content_particle(reader: &mut Reader, element: &str) -> Result<ContentSpec, XmlError> {
    reader.skip_whitespace();
    if reader.looking_at("(") {
        reader.read_expected_string("(")?;
        reader.skip_whitespace();
        return parse_content_group(reader, element);
    }
    let name = reader
        .read_name()
        .map_err(|e| e.or_incomplete("element declaration", element))?;
    Ok(ContentSpec {
        kind: ContentSpecKind::Name(name),
        occurrence: parse_occurrence(reader),
    })
}

fn parse_occurrence(reader: &mut Reader) -> Occurrence {
    let occurrence = match reader.peek_char() {
        Some('?') => Occurrence::Optional,
        Some('*') => Occurrence::ZeroOrMore,
        Some('+') => Occurrence::OneOrMore,
        _ => return Occurrence::Once,
    };
    let _ = reader.read_char();
    occurrence
}

// -- Attribute types and defaults --

fn parse_attribute_type(reader: &mut Reader, element: &str) -> Result<AttributeType, XmlError> {
    // Longest keywords first: ID is a prefix of IDREF/IDREFS, and so on.
    const KEYWORDS: &[(&str, fn() -> AttributeType)] = &[
        ("CDATA", || AttributeType::CData),
        ("IDREFS", || AttributeType::IdRefs),
        ("IDREF", || AttributeType::IdRef),
        ("ID", || AttributeType::Id),
        ("ENTITIES", || AttributeType::Entities),
        ("ENTITY", || AttributeType::Entity),
        ("NMTOKENS", || AttributeType::NmTokens),
        ("NMTOKEN", || AttributeType::NmToken),
    ];
    for (keyword, build) in KEYWORDS {
        if reader.looking_at(keyword) {
            reader.read_expected_string(keyword)?;
            return Ok(build());
        }
    }
    if reader.looking_at("NOTATION") {
        reader.read_expected_string("NOTATION")?;
        reader.skip_whitespace_required()?;
        let names = parse_name_group(reader, element)?;
        return Ok(AttributeType::Notation(names));
    }
    if reader.looking_at("(") {
        let names = parse_name_group(reader, element)?;
        return Ok(AttributeType::Enumeration(names));
    }
    Err(reader.error(ErrorKind::Syntax, "expected attribute type"))
}

fn parse_name_group(reader: &mut Reader, element: &str) -> Result<Vec<String>, XmlError> {
    reader.read_expected_char("(")?;
    let mut names = Vec::new();
    loop {
        reader.skip_whitespace();
        names.push(read_nmtoken(reader, element)?);
        reader.skip_whitespace();
        match reader.read_expected_char("|)")? {
            ')' => return Ok(names),
            _ => continue,
        }
    }
}

/// Reads an `Nmtoken` (any run of name characters; enumerated attribute
/// values need not start with a name start character).
fn read_nmtoken(reader: &mut Reader, element: &str) -> Result<String, XmlError> {
    let mut token = String::new();
    while let Some(ch) = reader.peek_char() {
        if is_name_char(ch) {
            token.push(reader.read_char()?);
        } else {
            break;
        }
    }
    if token.is_empty() {
        return Err(reader
            .error(ErrorKind::Syntax, "expected name token in enumeration")
            .or_incomplete("attribute-list declaration", element));
    }
    Ok(token)
}

fn parse_attribute_default(
    reader: &mut Reader,
    element: &str,
) -> Result<AttributeDefault, XmlError> {
    if reader.looking_at("#REQUIRED") {
        reader.read_expected_string("#REQUIRED")?;
        return Ok(AttributeDefault::Required);
    }
    if reader.looking_at("#IMPLIED") {
        reader.read_expected_string("#IMPLIED")?;
        return Ok(AttributeDefault::Implied);
    }
    let fixed = if reader.looking_at("#FIXED") {
        reader.read_expected_string("#FIXED")?;
        reader.skip_whitespace_required()?;
        true
    } else {
        false
    };
    let quote = reader.read_expected_char("\"'")?;
    let value = reader
        .read_string_until_char(&quote.to_string(), true)
        .map_err(|e| e.or_incomplete("attribute-list declaration", element))?;
    reader.read_char()?;
    Ok(if fixed {
        AttributeDefault::Fixed(value)
    } else {
        AttributeDefault::Default(value)
    })
}
