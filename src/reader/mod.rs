//! The lexical reader: a positioned character cursor over one logical input.
//!
//! [`Reader`] supplies the primitives the grammar drives: single-character
//! peek/read, multi-character lookahead, expected-token consumption,
//! delimited-string extraction, and push-back (`unread`). Every failure to
//! read caused by running out of input raises the distinguishable
//! premature-end signal ([`ErrorKind::PrematureEnd`]); callers decide
//! whether that is an error for the construct they are parsing.
//!
//! One reader covers one logical input: the document itself, an entity's
//! replacement text, or a fetched external subset. Entity expansion opens a
//! fresh reader with [`Reader::with_position`], seeded with the entity's
//! original declaration site so nested errors report where the entity was
//! declared rather than where it was referenced.
//!
//! Line endings are normalized (`\r\n` and bare `\r` become `\n`) when the
//! reader is constructed, per XML 1.0 §2.11.

use crate::error::{ErrorKind, Position, XmlError};

// -------------------------------------------------------------------------
// XML character classes (XML 1.0 §2.2, §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2 `[2]`.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 [4a].
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Returns `true` if `c` is XML whitespace (`S` per XML 1.0 §2.3 `[3]`).
pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Splits a qualified name into optional prefix and local part.
///
/// `"foo:bar"` → `(Some("foo"), "bar")`; `"bar"` → `(None, "bar")`.
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

// -------------------------------------------------------------------------
// Reader
// -------------------------------------------------------------------------

/// A positioned character cursor with push-back over one logical input.
pub struct Reader {
    /// The input, decoded to characters, with line endings normalized.
    chars: Vec<char>,
    /// Index of the next character in `chars`.
    pos: usize,
    /// Pushed-back characters; the top of the stack is read next.
    pushback: Vec<char>,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based). Best-effort after `unread`.
    column: u32,
    /// Name of this input (file name, system id, or entity name).
    source: String,
}

impl Reader {
    /// Creates a reader over `text`, positioned at line 1, column 1.
    pub fn new(text: &str, source: impl Into<String>) -> Self {
        Self::with_position(text, source, 1, 1)
    }

    /// Creates a reader over `text` seeded with an explicit starting
    /// position. Used when expanding an entity: the fresh reader reports
    /// positions relative to the entity's declaration site.
    pub fn with_position(text: &str, source: impl Into<String>, line: u32, column: u32) -> Self {
        let normalized = normalize_line_endings(text);
        Self {
            chars: normalized.chars().collect(),
            pos: 0,
            pushback: Vec::new(),
            line,
            column,
            source: source.into(),
        }
    }

    /// Returns the current source position.
    #[must_use]
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            source: self.source.clone(),
        }
    }

    /// Returns the name of this input.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if all input (including push-back) is consumed.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pushback.is_empty() && self.pos >= self.chars.len()
    }

    // -- Errors --

    /// Builds an error of the given kind at the current position.
    pub(crate) fn error(&self, kind: ErrorKind, message: impl Into<String>) -> XmlError {
        XmlError::new(kind, message, self.position())
    }

    /// Builds the premature-end signal at the current position.
    pub(crate) fn premature_end(&self) -> XmlError {
        self.error(ErrorKind::PrematureEnd, "unexpected end of input")
    }

    // -- Peek --

    /// Returns the next character without consuming it.
    #[must_use]
    pub fn peek_char(&self) -> Option<char> {
        self.peek_at(0)
    }

    /// Returns the character `offset` positions ahead without consuming.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        if offset < self.pushback.len() {
            // The top of the pushback stack is the next character.
            return Some(self.pushback[self.pushback.len() - 1 - offset]);
        }
        self.chars.get(self.pos + offset - self.pushback.len()).copied()
    }

    /// Returns `true` if the upcoming input starts with `literal`.
    #[must_use]
    pub fn looking_at(&self, literal: &str) -> bool {
        literal
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    /// Case-insensitive (ASCII) variant of [`looking_at`](Self::looking_at).
    #[must_use]
    pub fn looking_at_ci(&self, literal: &str) -> bool {
        literal.chars().enumerate().all(|(i, c)| {
            self.peek_at(i)
                .is_some_and(|got| got.eq_ignore_ascii_case(&c))
        })
    }

    /// Returns the index of the first candidate the upcoming input starts
    /// with, or `None`. Candidates are checked in order, so callers list
    /// longer/more specific literals before their prefixes.
    #[must_use]
    pub fn peek_expected_one_of(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().position(|cand| self.looking_at(cand))
    }

    // -- Read --

    /// Consumes and returns the next character.
    ///
    /// # Errors
    ///
    /// Raises the premature-end signal at end of input.
    pub fn read_char(&mut self) -> Result<char, XmlError> {
        let ch = if let Some(ch) = self.pushback.pop() {
            ch
        } else if self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            self.pos += 1;
            ch
        } else {
            return Err(self.premature_end());
        };
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Ok(ch)
    }

    /// Pushes `text` back onto the input so it is read again, before any
    /// previously pushed-back characters. Column bookkeeping after an
    /// unread is best-effort.
    pub fn unread(&mut self, text: &str) {
        for ch in text.chars().rev() {
            self.pushback.push(ch);
            if ch == '\n' {
                self.line = self.line.saturating_sub(1).max(1);
            } else {
                self.column = self.column.saturating_sub(1).max(1);
            }
        }
    }

    /// Consumes the next character and asserts it is one of `set`.
    ///
    /// # Errors
    ///
    /// Syntax error if the character is not in `set`; premature-end at EOF.
    pub fn read_expected_char(&mut self, set: &str) -> Result<char, XmlError> {
        let pos = self.position();
        let ch = self.read_char()?;
        if !set.contains(ch) {
            return Err(XmlError::new(
                ErrorKind::Syntax,
                format!("expected one of \"{set}\", found '{ch}'"),
                pos,
            ));
        }
        Ok(ch)
    }

    /// Consumes characters and asserts they match `literal` exactly.
    ///
    /// # Errors
    ///
    /// Syntax error on the first mismatching character; premature-end at EOF.
    pub fn read_expected_string(&mut self, literal: &str) -> Result<(), XmlError> {
        for expected in literal.chars() {
            let pos = self.position();
            let got = self.read_char()?;
            if got != expected {
                return Err(XmlError::new(
                    ErrorKind::Syntax,
                    format!("expected \"{literal}\", found '{got}'"),
                    pos,
                ));
            }
        }
        Ok(())
    }

    /// Case-insensitive (ASCII) variant of
    /// [`read_expected_string`](Self::read_expected_string). Returns the
    /// characters actually consumed.
    pub fn read_expected_string_ci(&mut self, literal: &str) -> Result<String, XmlError> {
        let mut read = String::with_capacity(literal.len());
        for expected in literal.chars() {
            let pos = self.position();
            let got = self.read_char()?;
            if !got.eq_ignore_ascii_case(&expected) {
                return Err(XmlError::new(
                    ErrorKind::Syntax,
                    format!("expected \"{literal}\", found '{got}'"),
                    pos,
                ));
            }
            read.push(got);
        }
        Ok(read)
    }

    /// Consumes characters up to (not including) the first character in
    /// `delims`. With `eof_is_error`, running out of input raises the
    /// premature-end signal; otherwise the remainder is returned.
    pub fn read_string_until_char(
        &mut self,
        delims: &str,
        eof_is_error: bool,
    ) -> Result<String, XmlError> {
        let mut out = String::new();
        loop {
            match self.peek_char() {
                Some(ch) if delims.contains(ch) => return Ok(out),
                Some(_) => out.push(self.read_char()?),
                None if eof_is_error => return Err(self.premature_end()),
                None => return Ok(out),
            }
        }
    }

    /// Consumes characters up to and including the literal `end`, returning
    /// everything before it.
    ///
    /// # Errors
    ///
    /// Raises the premature-end signal if `end` never appears.
    pub fn read_delimited_string(&mut self, end: &str) -> Result<String, XmlError> {
        let mut out = String::new();
        loop {
            if self.looking_at(end) {
                self.read_expected_string(end)?;
                return Ok(out);
            }
            if self.at_end() {
                return Err(self.premature_end());
            }
            out.push(self.read_char()?);
        }
    }

    // -- Whitespace --

    /// Skips whitespace characters. Returns `true` if any were consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while let Some(ch) = self.peek_char() {
            if is_xml_whitespace(ch) {
                let _ = self.read_char();
                skipped = true;
            } else {
                break;
            }
        }
        skipped
    }

    /// Skips whitespace, raising a syntax error if none is found.
    pub fn skip_whitespace_required(&mut self) -> Result<(), XmlError> {
        if self.at_end() {
            return Err(self.premature_end());
        }
        if !self.skip_whitespace() {
            return Err(self.error(ErrorKind::Syntax, "whitespace required"));
        }
        Ok(())
    }

    // -- Names (XML 1.0 §2.3) --

    /// Parses an XML `Name` per XML 1.0 §2.3 production `[5]`.
    ///
    /// # Errors
    ///
    /// Well-formedness error if the next character is not a valid name
    /// start character; premature-end at EOF.
    pub fn read_name(&mut self) -> Result<String, XmlError> {
        let first = self.peek_char().ok_or_else(|| self.premature_end())?;
        if !is_name_start_char(first) {
            return Err(self.error(
                ErrorKind::WellFormedness,
                format!("invalid name start character: '{first}'"),
            ));
        }
        let mut name = String::new();
        name.push(self.read_char()?);
        while let Some(ch) = self.peek_char() {
            if is_name_char(ch) {
                name.push(self.read_char()?);
            } else {
                break;
            }
        }
        Ok(name)
    }
}

/// Normalizes `\r\n` and bare `\r` to `\n` (XML 1.0 §2.11).
fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(ch);
        }
    }
    out
}
