//! Byte-to-text decoding: charset detection, transcoding to UTF-8 and a
//! binary-input check.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use regex::Regex;
use tracing::debug;

use cmsextract_shared::{CmsExtractError, Result};

/// Bytes inspected when deciding whether input is binary.
const SNIFF_LEN: usize = 8 * 1024;

/// Bytes scanned for a `<meta>` charset declaration.
const META_PRESCAN_LEN: usize = 1024;

/// Share of control bytes above which input is treated as binary.
const MAX_CONTROL_RATIO: f64 = 0.10;

/// `<meta charset=...>` as well as the `charset=` parameter inside
/// `<meta http-equiv="Content-Type" content="...">`.
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s;/>]+)"#).expect("valid regex")
});

/// Decode a fetched document into UTF-8 text.
///
/// The encoding is taken from a byte-order mark, then from the charset of the
/// transport `content_type`, then from a `<meta>` declaration near the top of
/// the document, defaulting to UTF-8. Undecodable bytes become U+FFFD.
///
/// Malformed HTML is fine; only input that is not text at all (NUL bytes or a
/// high share of control characters) is a parse error.
pub fn decode_document<'a>(bytes: &'a [u8], content_type: Option<&str>) -> Result<Cow<'a, str>> {
    let (encoding, bom_len) = match Encoding::for_bom(bytes) {
        Some((encoding, len)) => (encoding, len),
        None => (detect_encoding(bytes, content_type), 0),
    };
    let body = &bytes[bom_len..];

    // UTF-16 text is full of NUL bytes.
    let utf16 = encoding == UTF_16LE || encoding == UTF_16BE;
    if !utf16 && looks_binary(body) {
        return Err(CmsExtractError::parse("input is not text"));
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        debug!(encoding = encoding.name(), "replaced undecodable bytes");
    }
    Ok(text)
}

/// Encoding declared by the transport header or the markup, else UTF-8.
fn detect_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some(encoding) = content_type.and_then(header_charset) {
        return encoding;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_PRESCAN_LEN)]);
    let declared = META_CHARSET
        .captures(&head)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()));

    match declared {
        // A document that could be scanned as ASCII is not UTF-16.
        Some(encoding) if encoding == UTF_16LE || encoding == UTF_16BE => UTF_8,
        Some(encoding) => encoding,
        None => UTF_8,
    }
}

/// The `charset` parameter of a `Content-Type` value.
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
        })
        .and_then(|label| Encoding::for_label(label.as_bytes()))
}

fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(SNIFF_LEN)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    let control = sample
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
        .count();

    control as f64 / sample.len() as f64 > MAX_CONTROL_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        let text = decode_document("<p>Grüße</p>".as_bytes(), None).unwrap();
        assert_eq!(text, "<p>Grüße</p>");
        assert!(matches!(text, Cow::Borrowed(_)));
    }

    #[test]
    fn bom_is_stripped() {
        let text = decode_document(b"\xEF\xBB\xBF<html></html>", None).unwrap();
        assert_eq!(text, "<html></html>");
    }

    #[test]
    fn empty_is_text() {
        assert_eq!(decode_document(b"", None).unwrap(), "");
    }

    #[test]
    fn meta_charset_latin1() {
        let text = decode_document(b"<meta charset=\"iso-8859-1\"><title>Caf\xE9</title>", None).unwrap();
        assert_eq!(text, "<meta charset=\"iso-8859-1\"><title>Café</title>");
    }

    #[test]
    fn http_equiv_charset_windows_1252() {
        let html = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"><p>\x93quoted\x94</p>";
        let text = decode_document(html, None).unwrap();
        assert!(text.ends_with("<p>\u{201C}quoted\u{201D}</p>"));
    }

    #[test]
    fn meta_charset_shift_jis() {
        let text = decode_document(b"<meta charset=shift_jis><p>\x93\xFA\x96\x7B</p>", None).unwrap();
        assert_eq!(text, "<meta charset=shift_jis><p>日本</p>");
    }

    #[test]
    fn header_charset_wins_over_meta() {
        let html = b"<meta charset=\"utf-8\"><p>Caf\xE9</p>";
        let text = decode_document(html, Some("text/html; charset=ISO-8859-1")).unwrap();
        assert_eq!(text, "<meta charset=\"utf-8\"><p>Café</p>");
    }

    #[test]
    fn header_without_charset_falls_back_to_meta() {
        let html = b"<meta charset=\"iso-8859-1\"><p>Caf\xE9</p>";
        let text = decode_document(html, Some("text/html")).unwrap();
        assert_eq!(text, "<meta charset=\"iso-8859-1\"><p>Café</p>");
    }

    #[test]
    fn utf16_with_bom_is_text() {
        let text = decode_document(b"\xFF\xFE<\x00p\x00>\x00", None).unwrap();
        assert_eq!(text, "<p>");
    }

    #[test]
    fn undeclared_invalid_utf8_is_replaced() {
        let text = decode_document(b"<p>caf\xE9</p>", None).unwrap();
        assert_eq!(text, "<p>caf\u{FFFD}</p>");
    }

    #[test]
    fn binary_is_rejected() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00";
        let err = decode_document(png, None).unwrap_err();
        assert!(matches!(err, CmsExtractError::Parse { .. }));

        let noise: Vec<u8> = (0u8..=31).cycle().take(256).filter(|b| *b != 0).collect();
        assert!(decode_document(&noise, None).is_err());
    }
}
