//! The recursive-descent markup grammar.
//!
//! [`MarkupParser`] drives one document parse: XML declaration, prolog
//! misc, doctype (wiring the DTD subsystem in), the root element, and
//! trailing misc. Elements are parsed by direct recursion; the element
//! nesting depth is capped by [`super::DEFAULT_MAX_DEPTH`] unless the
//! options override it.
//!
//! Names are stored raw: `p:a` stays one string until the namespace pass
//! runs over the finished tree.
//!
//! # Entity boundaries
//!
//! Expanding an entity in content opens a fresh [`Reader`] over the
//! replacement text and recurses into [`parse_content`]
//! (`MarkupParser::parse_content`) against the same parent node and the
//! same text buffer. Running out of input there is the expected way an
//! expansion finishes ([`ContentEnd::Exhausted`]); it becomes an error only
//! when the construct that ran dry was still open. Elements must balance
//! within the reader that opened them, so an end tag with no matching start
//! inside an entity is rejected rather than allowed to close an element
//! from the document.
//!
//! # Tidy mode
//!
//! With [`ParseOptions::tidy`] set, HTML-legacy sloppiness is repaired
//! instead of rejected: names are case-folded to lowercase, void elements
//! never look for an end tag, valueless and unquoted attributes are
//! accepted, and a mismatched end tag is pushed back onto the input so an
//! ancestor element can claim it. Syntax of the XML declaration, undefined
//! parameter entities, and illegal characters stay fatal even in tidy mode.

use crate::dtd::{self, Dtd, DtdParser};
use crate::entity::{builtin_char, EntityTable, EntityValue, ExternalId, GeneralLookup};
use crate::error::{ErrorKind, Position, XmlError};
use crate::reader::{is_xml_char, is_xml_whitespace, Reader};
use crate::tree::{Attribute, Document, NodeId, NodeKind};

use super::{ParseOptions, ResourceRequest, DEFAULT_MAX_DEPTH};

/// Elements that never have content in HTML-legacy documents; in tidy mode
/// their start tag closes them.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "frame", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// How a content run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentEnd {
    /// Stopped in front of an end tag (`</`), which the caller consumes.
    EndTag,
    /// The reader ran out of input between constructs. Expected when the
    /// reader covers entity replacement text; an error at document level.
    Exhausted,
}

/// One document parse over one main input.
pub(super) struct MarkupParser<'a> {
    options: &'a ParseOptions,
    subset_cache: &'a mut crate::entity::SubsetCache,
    doc: Document,
    entities: EntityTable,
    dtd: Dtd,
    has_dtd: bool,
    /// The document references an external subset that was never fetched;
    /// undeclared general entities then expand to their literal reference
    /// text instead of erroring.
    unread_subset: bool,
    standalone: bool,
    depth: usize,
    /// How many entity readers are currently stacked. Zero means the main
    /// input; tidy's close-at-end-of-input leniency applies only there.
    entity_depth: usize,
    doctype_position: Option<Position>,
}

impl<'a> MarkupParser<'a> {
    pub fn new(
        options: &'a ParseOptions,
        subset_cache: &'a mut crate::entity::SubsetCache,
    ) -> Self {
        Self {
            options,
            subset_cache,
            doc: Document::new(),
            entities: EntityTable::with_builtins(),
            dtd: Dtd::default(),
            has_dtd: false,
            unread_subset: false,
            standalone: false,
            depth: 0,
            entity_depth: 0,
            doctype_position: None,
        }
    }

    /// Parses one complete document.
    pub fn parse(mut self, mut reader: Reader) -> Result<Document, XmlError> {
        if reader.looking_at("<?xml")
            && reader.peek_at(5).is_some_and(is_xml_whitespace)
        {
            self.parse_xml_decl(&mut reader)?;
        }

        let root = self.doc.root();

        // Prolog: misc and at most one doctype before the root element.
        loop {
            reader.skip_whitespace();
            if reader.at_end() {
                return Err(reader.error(ErrorKind::WellFormedness, "document has no root element"));
            }
            if reader.looking_at("<!--") {
                self.parse_comment(&mut reader, root)?;
            } else if self.looking_at_doctype(&reader) {
                if self.has_dtd {
                    return Err(reader.error(
                        ErrorKind::WellFormedness,
                        "multiple document type declarations",
                    ));
                }
                self.parse_doctype(&mut reader)?;
            } else if reader.looking_at("<?") {
                self.parse_pi(&mut reader, root)?;
            } else if reader.looking_at("<") {
                break;
            } else {
                return Err(reader.error(
                    ErrorKind::WellFormedness,
                    "content is not allowed before the root element",
                ));
            }
        }

        self.parse_element(&mut reader, root)?;
        self.check_doctype_root_agreement()?;

        // Trailing misc: comments and PIs only.
        loop {
            reader.skip_whitespace();
            if reader.at_end() {
                break;
            }
            if reader.looking_at("<!--") {
                self.parse_comment(&mut reader, root)?;
            } else if reader.looking_at("<?") {
                self.parse_pi(&mut reader, root)?;
            } else if self.options.tidy && reader.looking_at("</") {
                // A stray end tag with no open ancestor; drop it.
                reader.read_expected_string("</")?;
                reader.read_name()?;
                reader.skip_whitespace();
                reader.read_expected_char(">")?;
            } else {
                return Err(reader.error(
                    ErrorKind::WellFormedness,
                    "content is not allowed after the root element",
                ));
            }
        }
        Ok(self.doc)
    }

    fn looking_at_doctype(&self, reader: &Reader) -> bool {
        if self.options.tidy {
            reader.looking_at_ci("<!DOCTYPE")
        } else {
            reader.looking_at("<!DOCTYPE")
        }
    }

    // -- XML declaration (XML 1.0 §2.8) --

    /// Parses `<?xml version="1.0" encoding="..." standalone="..."?>`.
    /// Pseudo-attribute order is fixed; violations are syntax errors even
    /// in tidy mode.
    fn parse_xml_decl(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        reader.read_expected_string("<?xml")?;
        reader.skip_whitespace_required()?;

        let pos = reader.position();
        let (name, value) = parse_pseudo_attr(reader)?;
        if name != "version" {
            return Err(XmlError::new(
                ErrorKind::Syntax,
                "XML declaration must start with 'version'",
                pos,
            ));
        }
        self.doc.version = Some(value);

        let mut seen_encoding = false;
        let mut seen_standalone = false;
        loop {
            let had_ws = reader.skip_whitespace();
            if reader.looking_at("?>") {
                reader.read_expected_string("?>")?;
                return Ok(());
            }
            if !had_ws {
                return Err(reader.error(
                    ErrorKind::Syntax,
                    "whitespace required between XML declaration attributes",
                ));
            }
            let pos = reader.position();
            let (name, value) =
                parse_pseudo_attr(reader).map_err(|e| e.or_incomplete("XML declaration", ""))?;
            match name.as_str() {
                "encoding" if !seen_encoding && !seen_standalone => {
                    seen_encoding = true;
                    self.doc.encoding = Some(value);
                }
                "standalone" if !seen_standalone => {
                    seen_standalone = true;
                    self.standalone = match value.as_str() {
                        "yes" => true,
                        "no" => false,
                        other => {
                            return Err(XmlError::new(
                                ErrorKind::Syntax,
                                format!("standalone must be 'yes' or 'no', found '{other}'"),
                                pos,
                            ))
                        }
                    };
                    self.doc.standalone = Some(self.standalone);
                }
                _ => {
                    return Err(XmlError::new(
                        ErrorKind::Syntax,
                        format!("unexpected or out-of-order XML declaration attribute '{name}'"),
                        pos,
                    ))
                }
            }
        }
    }

    // -- Doctype (XML 1.0 §2.8) --

    fn parse_doctype(&mut self, reader: &mut Reader) -> Result<(), XmlError> {
        self.doctype_position = Some(reader.position());
        if self.options.tidy {
            reader.read_expected_string_ci("<!DOCTYPE")?;
        } else {
            reader.read_expected_string("<!DOCTYPE")?;
        }
        reader.skip_whitespace_required()?;
        let mut name = reader
            .read_name()
            .map_err(|e| e.or_incomplete("document type declaration", ""))?;
        if self.options.tidy {
            name = name.to_ascii_lowercase();
        }
        reader.skip_whitespace();

        let external_id = if reader.looking_at("SYSTEM") || reader.looking_at("PUBLIC") {
            let id = dtd::parse_external_id(reader, &name)?;
            reader.skip_whitespace();
            Some(id)
        } else {
            None
        };

        if reader.looking_at("[") {
            reader.read_expected_string("[")?;
            let resolver = self.options.resolver.clone();
            let mut parser = DtdParser::new(
                &mut self.entities,
                &mut self.dtd,
                resolver.as_ref(),
                self.options.tidy,
            );
            parser
                .parse_internal_subset(reader)
                .map_err(|e| e.or_incomplete("document type declaration", &name))?;
            reader.skip_whitespace();
        }
        reader
            .read_expected_char(">")
            .map_err(|e| e.or_incomplete("document type declaration", &name))?;

        let node = self.doc.create_node(NodeKind::DocumentType {
            name,
            public_id: external_id.as_ref().and_then(|id| id.public_id.clone()),
            system_id: external_id.as_ref().and_then(|id| id.system_id.clone()),
        });
        let root = self.doc.root();
        self.doc.append_child(root, node);
        self.has_dtd = true;

        // Standalone documents promise not to depend on the external
        // subset, so it is not fetched for them.
        if let Some(external_id) = external_id {
            if self.standalone {
                self.unread_subset = true;
            } else {
                let loaded = self.load_external_subset(&external_id)?;
                self.unread_subset = !loaded;
            }
        }
        Ok(())
    }

    /// Fetches and parses the external DTD subset, consulting the session
    /// cache first. Without a resolver (or when the resolver declines) the
    /// subset is skipped and `false` is returned; undeclared entities then
    /// take the placeholder path instead of erroring.
    fn load_external_subset(&mut self, external_id: &ExternalId) -> Result<bool, XmlError> {
        if let Some(cached) = self.subset_cache.get(external_id) {
            self.entities.merge_general_first_wins(&cached);
            return Ok(true);
        }
        let Some(resolver) = self.options.resolver.clone() else {
            return Ok(false);
        };
        // A public-only identifier gives the resolver nothing to fetch by.
        let Some(system_id) = external_id.system_id.as_deref() else {
            return Ok(false);
        };
        let request = ResourceRequest {
            system_id,
            public_id: external_id.public_id.as_deref(),
        };
        let Some(bytes) = resolver(request) else {
            return Ok(false);
        };
        let text = crate::encoding::decode(&bytes).text;

        let mut ext_entities = EntityTable::default();
        let mut ext_dtd = Dtd::default();
        let mut parser = DtdParser::new(
            &mut ext_entities,
            &mut ext_dtd,
            Some(&resolver),
            self.options.tidy,
        );
        let mut ext_reader = Reader::new(&text, system_id.to_string());
        parser.parse_subset(&mut ext_reader)?;

        self.subset_cache.insert(external_id, &ext_entities);
        self.entities.merge_general_first_wins(&ext_entities);
        // Internal-subset declarations take precedence over external ones.
        for (name, decl) in ext_dtd.elements {
            self.dtd.elements.entry(name).or_insert(decl);
        }
        for (name, attrs) in ext_dtd.attlists {
            self.dtd.attlists.entry(name).or_default().extend(attrs);
        }
        Ok(true)
    }

    fn check_doctype_root_agreement(&mut self) -> Result<(), XmlError> {
        let Some(doctype) = self.doc.doctype() else {
            return Ok(());
        };
        let Some(root) = self.doc.root_element() else {
            return Ok(());
        };
        let declared = self.doc.node_name(doctype).unwrap_or_default().to_string();
        let actual = self.doc.node_name(root).unwrap_or_default().to_string();
        if declared == actual {
            return Ok(());
        }
        if self.options.tidy {
            // Repair the declaration to match reality.
            if let NodeKind::DocumentType { name, .. } = &mut self.doc.node_mut(doctype).kind {
                *name = actual;
            }
            return Ok(());
        }
        Err(XmlError::new(
            ErrorKind::Validity,
            format!("root element '{actual}' does not match document type name '{declared}'"),
            self.doctype_position.clone().unwrap_or_default(),
        ))
    }

    // -- Elements (XML 1.0 §3.1) --

    fn parse_element(&mut self, reader: &mut Reader, parent: NodeId) -> Result<(), XmlError> {
        self.depth += 1;
        let max = self.options.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let result = if self.depth > max {
            Err(reader.error(
                ErrorKind::WellFormedness,
                format!("maximum element nesting depth ({max}) exceeded"),
            ))
        } else {
            self.parse_element_inner(reader, parent)
        };
        self.depth -= 1;
        result
    }

    fn parse_element_inner(&mut self, reader: &mut Reader, parent: NodeId) -> Result<(), XmlError> {
        reader.read_expected_string("<")?;
        let mut name = reader.read_name()?;
        if self.options.tidy {
            name = name.to_ascii_lowercase();
        }

        let mut attributes: Vec<Attribute> = Vec::new();
        let mut empty = false;
        loop {
            let had_ws = reader.skip_whitespace();
            if reader.looking_at("/>") {
                reader.read_expected_string("/>")?;
                empty = true;
                break;
            }
            if reader.looking_at(">") {
                reader.read_char()?;
                break;
            }
            if reader.at_end() {
                return Err(reader.premature_end().or_incomplete("element", &name));
            }
            if !had_ws {
                return Err(reader.error(
                    ErrorKind::Syntax,
                    format!("expected whitespace, '>' or '/>' in element '{name}'"),
                ));
            }
            let attr_pos = reader.position();
            let attribute = self.parse_attribute(reader)?;
            if attributes.iter().any(|a| a.name == attribute.name) {
                return Err(XmlError::new(
                    ErrorKind::WellFormedness,
                    format!("duplicate attribute '{}' on element '{name}'", attribute.name),
                    attr_pos,
                ));
            }
            attributes.push(attribute);
        }

        // Void elements never carry content in legacy documents.
        if self.options.tidy && VOID_ELEMENTS.contains(&name.as_str()) {
            empty = true;
        }

        let node = self.doc.create_node(NodeKind::Element {
            name: name.clone(),
            prefix: None,
            namespace: None,
            attributes,
        });
        self.doc.append_child(parent, node);
        if empty {
            return Ok(());
        }

        let mut text = String::new();
        match self.parse_content(reader, node, &mut text)? {
            ContentEnd::EndTag => {}
            ContentEnd::Exhausted => {
                // Tidy closes elements left open at the end of the main
                // input; inside entity text the element must balance.
                if self.options.tidy && self.entity_depth == 0 {
                    self.flush_text(node, &mut text);
                    return Ok(());
                }
                return Err(reader.premature_end().or_incomplete("element", &name));
            }
        }

        reader.read_expected_string("</")?;
        let end_pos = reader.position();
        let mut end_name = reader
            .read_name()
            .map_err(|e| e.or_incomplete("element", &name))?;
        if self.options.tidy {
            end_name = end_name.to_ascii_lowercase();
        }
        reader.skip_whitespace();
        if self.options.tidy {
            // Legacy markup sometimes puts attributes on end tags; they
            // carry no meaning, so everything up to '>' is dropped. Quoted
            // values are honored so a '>' inside one does not close the tag.
            while let Some(ch) = reader.peek_char() {
                if ch == '>' {
                    break;
                }
                let ch = reader.read_char()?;
                if ch == '"' || ch == '\'' {
                    reader
                        .read_string_until_char(&ch.to_string(), true)
                        .map_err(|e| e.or_incomplete("element", &name))?;
                    reader.read_char()?;
                }
            }
        }
        reader
            .read_expected_char(">")
            .map_err(|e| e.or_incomplete("element", &name))?;

        if end_name != name {
            if self.options.tidy {
                // Close this element implicitly and give the end tag back
                // to whichever ancestor it belongs to.
                reader.unread(&format!("</{end_name}>"));
                return Ok(());
            }
            return Err(XmlError::new(
                ErrorKind::WellFormedness,
                format!("mismatched end tag: expected '</{name}>', found '</{end_name}>'"),
                end_pos,
            ));
        }
        Ok(())
    }

    // -- Content (XML 1.0 §3.1 [43]) --

    /// Parses element content until an end tag or reader exhaustion.
    ///
    /// `text` accumulates character data across entity boundaries; it is
    /// materialized into a text node whenever markup interrupts it, and
    /// deliberately NOT flushed on exhaustion so text spanning an entity
    /// reference coalesces into one node.
    fn parse_content(
        &mut self,
        reader: &mut Reader,
        parent: NodeId,
        text: &mut String,
    ) -> Result<ContentEnd, XmlError> {
        loop {
            if reader.at_end() {
                return Ok(ContentEnd::Exhausted);
            }
            if reader.looking_at("</") {
                self.flush_text(parent, text);
                return Ok(ContentEnd::EndTag);
            }
            match reader.peek_expected_one_of(&["<!--", "<![CDATA[", "<!DOCTYPE", "<?", "<"]) {
                Some(0) => {
                    self.flush_text(parent, text);
                    self.parse_comment(reader, parent)?;
                }
                Some(1) => {
                    self.flush_text(parent, text);
                    self.parse_cdata(reader, parent)?;
                }
                Some(2) => {
                    return Err(reader.error(
                        ErrorKind::WellFormedness,
                        "document type declaration is only allowed in the prolog",
                    ));
                }
                Some(3) => {
                    self.flush_text(parent, text);
                    self.parse_pi(reader, parent)?;
                }
                Some(4) => {
                    self.flush_text(parent, text);
                    self.parse_element(reader, parent)?;
                }
                _ => {
                    if reader.looking_at("]]>") {
                        return Err(reader.error(
                            ErrorKind::WellFormedness,
                            "']]>' is not allowed in character data",
                        ));
                    }
                    let pos = reader.position();
                    let ch = reader.read_char()?;
                    if ch == '&' {
                        self.parse_reference(reader, parent, text, pos)?;
                    } else if is_xml_char(ch) {
                        text.push(ch);
                    } else {
                        return Err(XmlError::new(
                            ErrorKind::WellFormedness,
                            format!("character U+{:04X} is not allowed in XML content", ch as u32),
                            pos,
                        ));
                    }
                }
            }
        }
    }

    fn flush_text(&mut self, parent: NodeId, text: &mut String) {
        if !text.is_empty() {
            self.doc.append_text(parent, text);
            text.clear();
        }
    }

    // -- References in content (XML 1.0 §4.1, §4.4) --

    /// Parses the reference after a consumed `&`.
    fn parse_reference(
        &mut self,
        reader: &mut Reader,
        parent: NodeId,
        text: &mut String,
        position: Position,
    ) -> Result<(), XmlError> {
        if reader.looking_at("#") {
            reader.read_char()?;
            let digits = reader
                .read_string_until_char(";", true)
                .map_err(|e| e.or_incomplete("character reference", ""))?;
            reader.read_char()?;
            text.push(dtd::char_from_reference(&digits, &position)?);
            return Ok(());
        }
        let name = reader
            .read_name()
            .map_err(|e| e.or_incomplete("entity reference", ""))?;
        reader
            .read_expected_char(";")
            .map_err(|e| e.or_incomplete("entity reference", &name))?;

        // The five predefined entities expand to their literal character;
        // they never re-enter the grammar, so `&amp;lt;` stays text.
        if let Some(ch) = builtin_char(&name) {
            text.push(ch);
            return Ok(());
        }

        match self
            .entities
            .resolve_general(&name, self.unread_subset, self.standalone)
        {
            GeneralLookup::Declared(entity) => {
                let replacement = match &entity.value {
                    EntityValue::Internal(t) => t.clone(),
                    EntityValue::External(id) => {
                        let Some(resolver) = self.options.resolver.clone() else {
                            return Err(XmlError::new(
                                ErrorKind::WellFormedness,
                                format!("external entity '&{name};' cannot be resolved"),
                                position,
                            ));
                        };
                        dtd::fetch_external(&resolver, id, &position)?
                    }
                };
                self.entities.begin_expansion(&name, &position)?;
                let mut entity_reader = Reader::with_position(
                    &replacement,
                    format!("&{name};"),
                    entity.position.line,
                    entity.position.column,
                );
                let result = self.parse_entity_content(&mut entity_reader, parent, text, &name);
                self.entities.end_expansion(&name);
                result
            }
            GeneralLookup::Placeholder => {
                // The declaration may live in the unread external subset;
                // keep the reference as literal text.
                text.push('&');
                text.push_str(&name);
                text.push(';');
                Ok(())
            }
            GeneralLookup::Undeclared => Err(XmlError::new(
                ErrorKind::WellFormedness,
                format!("undefined entity '&{name};'"),
                position,
            )),
        }
    }

    /// Parses entity replacement text as content. Exhaustion is the normal
    /// outcome; a leftover end tag means the entity text was unbalanced.
    fn parse_entity_content(
        &mut self,
        reader: &mut Reader,
        parent: NodeId,
        text: &mut String,
        name: &str,
    ) -> Result<(), XmlError> {
        self.entity_depth += 1;
        let end = self.parse_content(reader, parent, text);
        self.entity_depth -= 1;
        match end? {
            ContentEnd::Exhausted => Ok(()),
            ContentEnd::EndTag => Err(reader.error(
                ErrorKind::WellFormedness,
                format!("entity '&{name};' contains an unbalanced end tag"),
            )),
        }
    }

    // -- Attributes (XML 1.0 §3.1 [41], §3.3.3) --

    fn parse_attribute(&mut self, reader: &mut Reader) -> Result<Attribute, XmlError> {
        let mut name = reader.read_name()?;
        if self.options.tidy {
            name = name.to_ascii_lowercase();
        }
        // Look past optional whitespace for '=' without consuming, so a
        // valueless attribute keeps its separator for the next one.
        let mut ahead = 0;
        while reader.peek_at(ahead).is_some_and(is_xml_whitespace) {
            ahead += 1;
        }
        if reader.peek_at(ahead) != Some('=') {
            if self.options.tidy {
                // HTML boolean attribute: the name is its own value.
                return Ok(Attribute::new(name.clone(), name));
            }
            return Err(reader.error(
                ErrorKind::Syntax,
                format!("attribute '{name}' is missing '='"),
            ));
        }
        reader.skip_whitespace();
        reader.read_char()?;
        reader.skip_whitespace();

        match reader.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                reader.read_char()?;
                let value = self.parse_attribute_value(reader, quote, &name)?;
                Ok(Attribute::new(name, value))
            }
            Some(_) if self.options.tidy => {
                // Unquoted value: everything up to whitespace or tag close.
                let mut value = String::new();
                while let Some(ch) = reader.peek_char() {
                    if is_xml_whitespace(ch) || ch == '>' {
                        break;
                    }
                    if ch == '/' && reader.peek_at(1) == Some('>') {
                        break;
                    }
                    value.push(reader.read_char()?);
                }
                Ok(Attribute::new(name, value))
            }
            _ => Err(reader.error(
                ErrorKind::Syntax,
                format!("attribute '{name}' value must be quoted"),
            )),
        }
    }

    /// Parses a quoted attribute value after the opening quote, expanding
    /// references and normalizing literal tabs and newlines to spaces.
    fn parse_attribute_value(
        &mut self,
        reader: &mut Reader,
        quote: char,
        attr: &str,
    ) -> Result<String, XmlError> {
        let mut value = String::new();
        loop {
            let pos = reader.position();
            let ch = reader
                .read_char()
                .map_err(|e| e.or_incomplete("attribute value", attr))?;
            if ch == quote {
                return Ok(value);
            }
            match ch {
                '<' => {
                    return Err(XmlError::new(
                        ErrorKind::WellFormedness,
                        format!("literal '<' is not allowed in the value of attribute '{attr}'"),
                        pos,
                    ))
                }
                '&' => self.parse_attribute_reference(reader, &mut value, attr, pos)?,
                '\t' | '\n' => value.push(' '),
                _ => value.push(ch),
            }
        }
    }

    fn parse_attribute_reference(
        &mut self,
        reader: &mut Reader,
        value: &mut String,
        attr: &str,
        position: Position,
    ) -> Result<(), XmlError> {
        if reader.looking_at("#") {
            reader.read_char()?;
            let digits = reader
                .read_string_until_char(";", true)
                .map_err(|e| e.or_incomplete("character reference", ""))?;
            reader.read_char()?;
            // Whitespace smuggled in via a character reference survives
            // normalization (XML 1.0 §3.3.3).
            value.push(dtd::char_from_reference(&digits, &position)?);
            return Ok(());
        }
        let name = reader
            .read_name()
            .map_err(|e| e.or_incomplete("entity reference", ""))?;
        reader
            .read_expected_char(";")
            .map_err(|e| e.or_incomplete("entity reference", &name))?;

        if let Some(ch) = builtin_char(&name) {
            value.push(ch);
            return Ok(());
        }
        match self
            .entities
            .resolve_general(&name, self.unread_subset, self.standalone)
        {
            GeneralLookup::Declared(entity) => match &entity.value {
                EntityValue::Internal(t) => {
                    self.entities.begin_expansion(&name, &position)?;
                    let result =
                        self.expand_attribute_text(t, value, attr, &name, &entity.position);
                    self.entities.end_expansion(&name);
                    result
                }
                EntityValue::External(_) => Err(XmlError::new(
                    ErrorKind::WellFormedness,
                    format!(
                        "external entity '&{name};' is not allowed in the value of attribute '{attr}'"
                    ),
                    position,
                )),
            },
            GeneralLookup::Placeholder => {
                value.push('&');
                value.push_str(&name);
                value.push(';');
                Ok(())
            }
            GeneralLookup::Undeclared => Err(XmlError::new(
                ErrorKind::WellFormedness,
                format!("undefined entity '&{name};'"),
                position,
            )),
        }
    }

    /// Expands entity replacement text inside an attribute value, with the
    /// same rules as the literal text: no `<`, nested references allowed,
    /// whitespace normalized.
    fn expand_attribute_text(
        &mut self,
        replacement: &str,
        value: &mut String,
        attr: &str,
        entity_name: &str,
        declared_at: &Position,
    ) -> Result<(), XmlError> {
        let mut reader = Reader::with_position(
            replacement,
            format!("&{entity_name};"),
            declared_at.line,
            declared_at.column,
        );
        while !reader.at_end() {
            let pos = reader.position();
            let ch = reader.read_char()?;
            match ch {
                '<' => {
                    return Err(XmlError::new(
                        ErrorKind::WellFormedness,
                        format!("literal '<' is not allowed in the value of attribute '{attr}'"),
                        pos,
                    ))
                }
                '&' => self.parse_attribute_reference(&mut reader, value, attr, pos)?,
                '\t' | '\n' => value.push(' '),
                _ => value.push(ch),
            }
        }
        Ok(())
    }

    // -- Comments, CDATA, PIs (XML 1.0 §2.5 - §2.7) --

    fn parse_comment(&mut self, reader: &mut Reader, parent: NodeId) -> Result<(), XmlError> {
        reader.read_expected_string("<!--")?;
        let content = reader
            .read_delimited_string("--")
            .map_err(|e| e.or_incomplete("comment", ""))?;
        reader.read_expected_char(">").map_err(|e| {
            if e.kind == ErrorKind::Syntax {
                XmlError::new(
                    ErrorKind::WellFormedness,
                    "comment must not contain '--'",
                    e.position,
                )
            } else {
                e.or_incomplete("comment", "")
            }
        })?;
        let node = self.doc.create_node(NodeKind::Comment { content });
        self.doc.append_child(parent, node);
        Ok(())
    }

    fn parse_cdata(&mut self, reader: &mut Reader, parent: NodeId) -> Result<(), XmlError> {
        reader.read_expected_string("<![CDATA[")?;
        let content = reader
            .read_delimited_string("]]>")
            .map_err(|e| e.or_incomplete("CDATA section", ""))?;
        let node = self.doc.create_node(NodeKind::CData { content });
        self.doc.append_child(parent, node);
        Ok(())
    }

    fn parse_pi(&mut self, reader: &mut Reader, parent: NodeId) -> Result<(), XmlError> {
        reader.read_expected_string("<?")?;
        let pos = reader.position();
        let target = reader
            .read_name()
            .map_err(|e| e.or_incomplete("processing instruction", ""))?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(XmlError::new(
                ErrorKind::WellFormedness,
                "processing instruction target 'xml' is reserved",
                pos,
            ));
        }
        let data = if reader.looking_at("?>") {
            reader.read_expected_string("?>")?;
            None
        } else {
            reader
                .skip_whitespace_required()
                .map_err(|e| e.or_incomplete("processing instruction", &target))?;
            let body = reader
                .read_delimited_string("?>")
                .map_err(|e| e.or_incomplete("processing instruction", &target))?;
            if body.is_empty() {
                None
            } else {
                Some(body)
            }
        };
        let node = self
            .doc
            .create_node(NodeKind::ProcessingInstruction { target, data });
        self.doc.append_child(parent, node);
        Ok(())
    }
}

/// Parses `name = "value"` with optional surrounding whitespace, for the
/// XML declaration's pseudo-attributes.
fn parse_pseudo_attr(reader: &mut Reader) -> Result<(String, String), XmlError> {
    let name = reader.read_name()?;
    reader.skip_whitespace();
    reader.read_expected_char("=")?;
    reader.skip_whitespace();
    let quote = reader.read_expected_char("\"'")?;
    let value = reader.read_string_until_char(&quote.to_string(), true)?;
    reader.read_char()?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use crate::parser::{parse_str, parse_str_with_options, ParseOptions};
    use crate::error::ErrorKind;
    use crate::tree::{Document, NodeKind};
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Document {
        parse_str(input).expect("document parses")
    }

    fn parse_err(input: &str) -> crate::error::XmlError {
        parse_str(input).expect_err("parse fails")
    }

    fn tidy(input: &str) -> Document {
        parse_str_with_options(input, ParseOptions::new().tidy(true)).expect("tidy parses")
    }

    #[test]
    fn test_simple_document() {
        let doc = parse("<root><child>text</child></root>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        let child = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(child), Some("child"));
        assert_eq!(doc.text_content(child), "text");
    }

    #[test]
    fn test_xml_declaration_fields() {
        let doc = parse("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><r/>");
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(doc.standalone, Some(true));
    }

    #[test]
    fn test_xml_declaration_attribute_order_enforced() {
        let err = parse_err("<?xml encoding=\"UTF-8\" version=\"1.0\"?><r/>");
        assert_eq!(err.kind, ErrorKind::Syntax);

        let err = parse_err("<?xml version=\"1.0\" standalone=\"no\" encoding=\"UTF-8\"?><r/>");
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.message.contains("encoding"));
    }

    #[test]
    fn test_attributes() {
        let doc = parse(r#"<r a="1" b='two'/>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "a"), Some("1"));
        assert_eq!(doc.attribute(root, "b"), Some("two"));
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let err = parse_err(r#"<r a="1" a="2"/>"#);
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("'a'"));
    }

    #[test]
    fn test_attribute_value_rules() {
        // Literal '<' is fatal.
        let err = parse_err(r#"<r a="x<y"/>"#);
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        // Tab and newline normalize to spaces.
        let doc = parse("<r a=\"x\ty\nz\"/>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "a"), Some("x y z"));
        // A character reference keeps its whitespace.
        let doc = parse(r#"<r a="x&#9;y"/>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "a"), Some("x\ty"));
    }

    #[test]
    fn test_builtin_entities_are_literal_text() {
        let doc = parse("<r>&amp;lt; &gt;</r>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "&lt; >");
    }

    #[test]
    fn test_character_references() {
        let doc = parse("<r>&#65;&#x42;</r>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "AB");

        let err = parse_err("<r>&#xFFFE;</r>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);
    }

    #[test]
    fn test_undefined_entity_without_dtd() {
        let err = parse_err("<r>&nope;</r>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("&nope;"));
    }

    #[test]
    fn test_undeclared_entity_with_unread_external_subset_is_placeholder() {
        // A DTD with a system id and no resolver: the declaration might
        // live in the unread external subset, so the literal reference
        // survives as text.
        let doc = parse(r#"<!DOCTYPE r SYSTEM "r.dtd"><r>&maybe;</r>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "&maybe;");
    }

    #[test]
    fn test_standalone_makes_undeclared_entity_fatal() {
        let err = parse_err(
            r#"<?xml version="1.0" standalone="yes"?><!DOCTYPE r SYSTEM "r.dtd"><r>&maybe;</r>"#,
        );
        assert_eq!(err.kind, ErrorKind::WellFormedness);
    }

    #[test]
    fn test_internal_entity_expansion_coalesces_text() {
        let doc = parse(r#"<!DOCTYPE r [<!ENTITY e "mid">]><r>pre &e; post</r>"#);
        let root = doc.root_element().unwrap();
        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.node_text(children[0]), Some("pre mid post"));
    }

    #[test]
    fn test_entity_with_markup() {
        let doc = parse(r#"<!DOCTYPE r [<!ENTITY e "<b>bold</b>">]><r>&e;</r>"#);
        let root = doc.root_element().unwrap();
        let b = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(b), Some("b"));
        assert_eq!(doc.text_content(b), "bold");
    }

    #[test]
    fn test_entity_with_unbalanced_markup_rejected() {
        let err = parse_err(r#"<!DOCTYPE r [<!ENTITY e "<b>">]><r>&e;</r>"#);
        assert_eq!(err.kind, ErrorKind::WellFormedness);

        let err = parse_err(r#"<!DOCTYPE r [<!ENTITY e "</r>">]><r>&e;</r>"#);
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("unbalanced"));
    }

    #[test]
    fn test_recursive_entity_rejected() {
        let err = parse_err(r#"<!DOCTYPE r [<!ENTITY e "&e;">]><r>&e;</r>"#);
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("recursive"));

        // Indirect recursion through a second entity.
        let err =
            parse_err(r#"<!DOCTYPE r [<!ENTITY a "&b;"><!ENTITY b "&a;">]><r>&a;</r>"#);
        assert!(err.message.contains("recursive"));
    }

    #[test]
    fn test_entity_in_attribute_value() {
        let doc = parse(r#"<!DOCTYPE r [<!ENTITY e "v">]><r a="x&e;y"/>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "a"), Some("xvy"));
    }

    #[test]
    fn test_entity_with_markup_rejected_in_attribute() {
        let err = parse_err(r#"<!DOCTYPE r [<!ENTITY e "<b/>">]><r a="&e;"/>"#);
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains('<'));
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = parse_err("<a><b></a></b>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("</b>"));
    }

    #[test]
    fn test_cdata_section() {
        let doc = parse("<r><![CDATA[<not-markup> & fine]]></r>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "<not-markup> & fine");
        let child = doc.first_child(root).unwrap();
        assert!(matches!(doc.node(child).kind, NodeKind::CData { .. }));
    }

    #[test]
    fn test_cdata_end_in_char_data_rejected() {
        let err = parse_err("<r>a]]>b</r>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);
    }

    #[test]
    fn test_comments_and_pis() {
        let doc = parse("<!-- head --><?style href=\"a.css\"?><r/><!-- tail -->");
        let kinds: Vec<_> = doc
            .children(doc.root())
            .map(|id| std::mem::discriminant(&doc.node(id).kind))
            .collect();
        assert_eq!(kinds.len(), 4);

        let err = parse_err("<r><!-- double -- hyphen --></r>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);

        let err = parse_err("<r><?xml version=\"1.0\"?></r>");
        assert!(err.message.contains("reserved"));
    }

    #[test]
    fn test_doctype_root_name_agreement() {
        let err = parse_err("<!DOCTYPE other><r/>");
        assert_eq!(err.kind, ErrorKind::Validity);

        // Tidy repairs the declaration instead.
        let doc = tidy("<!DOCTYPE other><r/>");
        let dt = doc.doctype().unwrap();
        assert_eq!(doc.node_name(dt), Some("r"));
    }

    #[test]
    fn test_content_after_root_rejected() {
        let err = parse_err("<a/><b/>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("after the root"));
    }

    #[test]
    fn test_unclosed_element_names_construct() {
        let err = parse_err("<root><child>");
        assert_eq!(err.kind, ErrorKind::WellFormedness);
        assert!(err.message.contains("'child'"));
    }

    #[test]
    fn test_depth_limit() {
        let deep = "<a>".repeat(300) + &"</a>".repeat(300);
        let err = parse_err(&deep);
        assert!(err.message.contains("depth"));

        let ok = "<a>".repeat(10) + &"</a>".repeat(10);
        let doc = parse_str_with_options(&ok, ParseOptions::new().max_depth(10)).unwrap();
        assert!(doc.root_element().is_some());
        assert!(parse_str_with_options(&ok, ParseOptions::new().max_depth(9)).is_err());
    }

    #[test]
    fn test_error_positions() {
        let err = parse_err("<r>\n  <x>\n</r>");
        assert_eq!(err.position.line, 3);
        assert_eq!(err.position.source, "<input>");

        let err = parse_str_with_options("<r", ParseOptions::new().source_name("doc.xml"))
            .unwrap_err();
        assert_eq!(err.position.source, "doc.xml");
    }

    #[test]
    fn test_tidy_case_folding() {
        let doc = tidy("<Root Attr=\"1\"><CHILD/></rOOt>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        assert_eq!(doc.attribute(root, "attr"), Some("1"));
        let child = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(child), Some("child"));
    }

    #[test]
    fn test_tidy_void_elements() {
        let doc = tidy("<p>one<br>two<img src=\"x\">three</p>");
        let root = doc.root_element().unwrap();
        let names: Vec<_> = doc
            .children(root)
            .filter_map(|id| doc.node_name(id).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["br", "img"]);
        assert_eq!(doc.text_content(root), "onetwothree");
    }

    #[test]
    fn test_tidy_attribute_repairs() {
        let doc = tidy("<input disabled value=abc>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "disabled"), Some("disabled"));
        assert_eq!(doc.attribute(root, "value"), Some("abc"));
    }

    #[test]
    fn test_tidy_mismatched_end_tag_closes_ancestors() {
        // </list> closes the open <item> implicitly.
        let doc = tidy("<list><item>one</list>");
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("list"));
        let item = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(item), Some("item"));
        assert_eq!(doc.text_content(item), "one");
    }

    #[test]
    fn test_tidy_leaves_strict_errors_fatal() {
        // The XML declaration grammar is never repaired.
        let err = parse_str_with_options(
            "<?xml encoding=\"UTF-8\" version=\"1.0\"?><r/>",
            ParseOptions::new().tidy(true),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn test_whitespace_only_document_has_no_root() {
        let err = parse_err("   \n ");
        assert!(err.message.contains("no root element"));
    }
}
