//! Encoding detection and decoding.
//!
//! Implements BOM sniffing and XML-declaration encoding detection per
//! XML 1.0 §4.3.3 and Appendix F, bridging to `encoding_rs` for character
//! encoding conversion.
//!
//! # Detection policy
//!
//! 1. A byte-order mark, if present, wins. It is skipped before lexing and
//!    trusted over any declared encoding.
//! 2. Otherwise the `encoding=` pseudo-attribute of a leading XML
//!    declaration is honored, looked up by IANA label.
//! 3. Otherwise UTF-8 is the fallback.
//!
//! Detection is deliberately lenient: an unknown or absent encoding never
//! raises an error — the fallback is used, and malformed byte sequences
//! decode to replacement characters.

use encoding_rs::Encoding;

/// The fallback charset used when no BOM and no declared encoding is found.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// The result of decoding a byte stream to characters.
#[derive(Debug, Clone)]
pub struct DecodedInput {
    /// The input decoded to UTF-8, BOM excluded.
    pub text: String,
    /// How many bytes of byte-order mark were skipped (possibly zero).
    pub bom_length: usize,
    /// The encoding name declared in the XML declaration, if any.
    pub declared_encoding: Option<String>,
}

/// Sniffs the byte-order mark of an XML byte stream.
///
/// Returns the indicated IANA encoding name and the number of BOM bytes to
/// skip. Per XML 1.0 Appendix F:
///
/// - `EF BB BF` → UTF-8
/// - `FE FF`    → UTF-16BE
/// - `FF FE`    → UTF-16LE
/// - no BOM     → UTF-8, zero bytes skipped
#[must_use]
pub fn detect_bom(bytes: &[u8]) -> (&'static str, usize) {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        ("UTF-8", 3)
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        ("UTF-16BE", 2)
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        ("UTF-16LE", 2)
    } else {
        (DEFAULT_ENCODING, 0)
    }
}

/// Decodes an XML byte stream to characters, applying the detection policy.
///
/// Never fails: unknown encoding labels fall back to UTF-8 and malformed
/// sequences decode to replacement characters. Strict callers can inspect
/// [`DecodedInput::declared_encoding`] to impose their own policy.
#[must_use]
pub fn decode(bytes: &[u8]) -> DecodedInput {
    let (bom_encoding, bom_length) = detect_bom(bytes);
    let body = &bytes[bom_length..];

    // The declared encoding is extracted even when a BOM overrides it, so
    // callers can see both.
    let declared_encoding = if bom_length == 2 {
        // UTF-16: decode first, then scan the declaration as text.
        let text = decode_with_label(body, bom_encoding);
        let declared = extract_decl_encoding(&text);
        return DecodedInput {
            text,
            bom_length,
            declared_encoding: declared,
        };
    } else {
        extract_decl_encoding(&String::from_utf8_lossy(decl_window(body)))
    };

    let label = if bom_length > 0 {
        bom_encoding
    } else {
        declared_encoding.as_deref().unwrap_or(DEFAULT_ENCODING)
    };
    DecodedInput {
        text: decode_with_label(body, label),
        bom_length,
        declared_encoding,
    }
}

/// Decodes bytes by IANA label, falling back to UTF-8 for unknown labels.
/// Malformed sequences become replacement characters.
fn decode_with_label(bytes: &[u8], label: &str) -> String {
    let encoding =
        Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    encoding.decode(bytes).0.into_owned()
}

/// Returns the leading slice of `bytes` that can contain an XML declaration.
fn decl_window(bytes: &[u8]) -> &[u8] {
    let limit = bytes.len().min(256);
    let window = &bytes[..limit];
    // Stop at the declaration close if it is in the window.
    match window.windows(2).position(|w| w == b"?>") {
        Some(end) => &window[..end + 2],
        None => window,
    }
}

/// Extracts the `encoding` pseudo-attribute value from a leading XML
/// declaration, without running the full parser.
fn extract_decl_encoding(text: &str) -> Option<String> {
    if !text.starts_with("<?xml") {
        return None;
    }
    let decl_end = text.find("?>")?;
    let decl = &text[..decl_end];

    let enc_pos = decl.find("encoding")?;
    let after = decl[enc_pos + "encoding".len()..].trim_start();
    let after = after.strip_prefix('=')?.trim_start();
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &after[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_bom_utf8() {
        let (enc, skip) = detect_bom(b"\xEF\xBB\xBF<root/>");
        assert_eq!(enc, "UTF-8");
        assert_eq!(skip, 3);
    }

    #[test]
    fn test_detect_bom_absent() {
        let (enc, skip) = detect_bom(b"<root/>");
        assert_eq!(enc, "UTF-8");
        assert_eq!(skip, 0);
    }

    #[test]
    fn test_decode_skips_bom() {
        let decoded = decode(b"\xEF\xBB\xBF<root/>");
        assert_eq!(decoded.text, "<root/>");
        assert_eq!(decoded.bom_length, 3);
        assert_eq!(decoded.declared_encoding, None);
    }

    #[test]
    fn test_decode_utf16le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode(&bytes);
        assert_eq!(decoded.text, "<a/>");
        assert_eq!(decoded.bom_length, 2);
    }

    #[test]
    fn test_decode_utf16be_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let decoded = decode(&bytes);
        assert_eq!(decoded.text, "<a/>");
    }

    #[test]
    fn test_declared_encoding_used_without_bom() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r a=\"\xE9\"/>";
        let decoded = decode(bytes);
        assert_eq!(decoded.declared_encoding.as_deref(), Some("ISO-8859-1"));
        assert!(decoded.text.contains('\u{E9}'));
    }

    #[test]
    fn test_bom_wins_over_declared_encoding() {
        let bytes = b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r/>";
        let decoded = decode(bytes);
        assert_eq!(decoded.bom_length, 3);
        // Declared encoding is reported but the BOM's UTF-8 was used.
        assert_eq!(decoded.declared_encoding.as_deref(), Some("ISO-8859-1"));
        assert!(decoded.text.starts_with("<?xml"));
    }

    #[test]
    fn test_unknown_encoding_falls_back() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"no-such-charset\"?><r/>";
        let decoded = decode(bytes);
        assert_eq!(
            decoded.declared_encoding.as_deref(),
            Some("no-such-charset")
        );
        assert!(decoded.text.ends_with("<r/>"));
    }

    #[test]
    fn test_extract_decl_encoding_quoting() {
        assert_eq!(
            extract_decl_encoding("<?xml version='1.0' encoding='UTF-8'?>"),
            Some("UTF-8".to_string())
        );
        assert_eq!(extract_decl_encoding("<?xml version=\"1.0\"?>"), None);
        assert_eq!(extract_decl_encoding("<root/>"), None);
    }
}
