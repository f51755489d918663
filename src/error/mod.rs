//! Error taxonomy for XML parsing.
//!
//! Every error carries the line, column, and source name where it was
//! detected. Errors unwind the recursive parse at the point of detection:
//! there is no partial-result recovery at intermediate levels, and the
//! caller receives exactly one terminal error per parse attempt.
//!
//! Running out of input mid-construct is first raised as the internal
//! [`ErrorKind::PrematureEnd`] signal. Callers convert it into a positioned
//! well-formedness error only once the parse unit owning the construct has
//! confirmed that no further input exists — this is what lets entity-boundary
//! exhaustion (expected, not an error) be told apart from a genuine
//! end-of-file in the middle of a construct.

use std::fmt;

/// The kind of a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed literal grammar (e.g., out-of-order XML-declaration
    /// pseudo-attributes). Always fatal, never repaired in tidy mode.
    Syntax,
    /// A structural XML rule is violated: mismatched tags, duplicate
    /// attributes, illegal `<` in an attribute value, undeclared entity
    /// where one is required, entity self-recursion, illegal character
    /// reference, invalid name.
    WellFormedness,
    /// A DTD-level mismatch: root element name vs. declared document-type
    /// name, duplicate element-type declaration.
    Validity,
    /// A parameter entity reference that cannot be resolved. Always fatal,
    /// not subject to tidy leniency.
    UndefinedEntity,
    /// Input ran out during a sub-parse. Internal signal — converted to a
    /// well-formedness error by [`XmlError::or_incomplete`] when the
    /// enclosing parse unit confirms the construct is genuinely unfinished.
    PrematureEnd,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax error"),
            Self::WellFormedness => write!(f, "well-formedness error"),
            Self::Validity => write!(f, "validity error"),
            Self::UndefinedEntity => write!(f, "undefined entity"),
            Self::PrematureEnd => write!(f, "premature end of input"),
        }
    }
}

/// A source position: 1-based line and column plus the name of the input
/// the position refers to (a file name, a system identifier, or an entity
/// name for errors raised inside entity replacement text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (characters, not bytes).
    pub column: u32,
    /// Name of the input this position refers to.
    pub source: String,
}

impl Position {
    /// Creates a position at the start of the named input.
    #[must_use]
    pub fn start(source: impl Into<String>) -> Self {
        Self {
            line: 1,
            column: 1,
            source: source.into(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start("<input>")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

/// The error type returned when XML parsing fails.
#[derive(Debug, Clone)]
pub struct XmlError {
    /// Which rule class was violated.
    pub kind: ErrorKind,
    /// Human-readable message with contextual arguments.
    pub message: String,
    /// Where in the source the error was detected.
    pub position: Position,
}

impl XmlError {
    /// Creates a new error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }

    /// Returns `true` if this error is the internal premature-end signal.
    #[must_use]
    pub fn is_premature_end(&self) -> bool {
        self.kind == ErrorKind::PrematureEnd
    }

    /// Converts a premature-end signal into a well-formedness error naming
    /// the unfinished construct. Any other error passes through unchanged.
    ///
    /// `construct` is the markup kind ("element", "comment", ...); `name`
    /// is the construct's name where one exists, or `""`.
    #[must_use]
    pub fn or_incomplete(self, construct: &str, name: &str) -> Self {
        if !self.is_premature_end() {
            return self;
        }
        let message = if name.is_empty() {
            format!("unexpected end of input while parsing {construct}")
        } else {
            format!("unexpected end of input while parsing {construct} named '{name}'")
        };
        Self {
            kind: ErrorKind::WellFormedness,
            message,
            position: self.position,
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.position, self.kind, self.message)
    }
}

impl std::error::Error for XmlError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_position_display() {
        let pos = Position {
            line: 3,
            column: 14,
            source: "doc.xml".to_string(),
        };
        assert_eq!(pos.to_string(), "doc.xml:3:14");
    }

    #[test]
    fn test_error_display() {
        let err = XmlError::new(
            ErrorKind::WellFormedness,
            "duplicate attribute: 'x'",
            Position {
                line: 1,
                column: 10,
                source: "doc.xml".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "doc.xml:1:10: well-formedness error: duplicate attribute: 'x'"
        );
    }

    #[test]
    fn test_or_incomplete_converts_premature_end() {
        let err = XmlError::new(ErrorKind::PrematureEnd, "end of input", Position::default());
        let converted = err.or_incomplete("element", "root");
        assert_eq!(converted.kind, ErrorKind::WellFormedness);
        assert_eq!(
            converted.message,
            "unexpected end of input while parsing element named 'root'"
        );
    }

    #[test]
    fn test_or_incomplete_passes_other_errors_through() {
        let err = XmlError::new(ErrorKind::Syntax, "bad decl", Position::default());
        let passed = err.or_incomplete("element", "root");
        assert_eq!(passed.kind, ErrorKind::Syntax);
        assert_eq!(passed.message, "bad decl");
    }

    #[test]
    fn test_error_is_error_trait() {
        let err = XmlError::new(ErrorKind::Validity, "test", Position::default());
        let _: &dyn std::error::Error = &err;
    }
}
