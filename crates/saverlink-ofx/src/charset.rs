//! Character set of a raw export.
//!
//! OFX 1.x declares its charset in the plain-text header (`ENCODING:USASCII`
//! with `CHARSET:1252`, or `ENCODING:UTF-8`); OFX 2.x uses the XML
//! declaration. Exports without a usable declaration are read as UTF-8 when
//! they are valid UTF-8 and as windows-1252 otherwise.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Decodes an export body to text using its declared character set.
#[must_use]
pub fn decode_export(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = declared_encoding(header(bytes)).unwrap_or_else(|| {
        if std::str::from_utf8(bytes).is_ok() {
            UTF_8
        } else {
            WINDOWS_1252
        }
    });
    let (text, _, _) = encoding.decode(bytes);
    text
}

/// Bytes before the `<OFX>` root, which hold every charset declaration.
fn header(bytes: &[u8]) -> Cow<'_, str> {
    let end = find(bytes, b"<OFX").unwrap_or_else(|| bytes.len().min(1024));
    String::from_utf8_lossy(&bytes[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn declared_encoding(header: Cow<'_, str>) -> Option<&'static Encoding> {
    if let Some(label) = xml_encoding(&header) {
        return Encoding::for_label(label.as_bytes());
    }

    let mut encoding = None;
    let mut charset = None;
    for line in header.lines() {
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "ENCODING" => encoding = Some(value.trim()),
                "CHARSET" => charset = Some(value.trim()),
                _ => {}
            }
        }
    }

    if encoding.is_some_and(|e| e.eq_ignore_ascii_case("UTF-8")) {
        return Some(UTF_8);
    }
    match charset? {
        c if c.eq_ignore_ascii_case("NONE") => None,
        // Windows code page numbers: 1252, 1251, ...
        c if c.bytes().all(|b| b.is_ascii_digit()) => {
            Encoding::for_label(format!("windows-{c}").as_bytes())
        }
        c => Encoding::for_label(c.as_bytes()),
    }
}

fn xml_encoding(header: &str) -> Option<&str> {
    let start = header.find("<?xml")?;
    let declaration = &header[start..start + header[start..].find("?>")?];
    let rest = &declaration[declaration.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let value = &rest[1..];
    Some(&value[..value.find(quote)?])
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn sgml(header: &str, name: &[u8]) -> Vec<u8> {
        let mut bytes = format!("OFXHEADER:100\r\nDATA:OFXSGML\r\n{header}\r\n\r\n<OFX><NAME>").into_bytes();
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(b"</OFX>");
        bytes
    }

    #[test]
    fn test_windows_1252_header() {
        let bytes = sgml("ENCODING:USASCII\r\nCHARSET:1252", b"Caf\xE9 \x80");
        assert!(decode_export(&bytes).contains("<NAME>Café €"));
    }

    #[test]
    fn test_latin1_label() {
        let bytes = sgml("ENCODING:USASCII\r\nCHARSET:ISO-8859-1", b"Caf\xE9");
        assert!(decode_export(&bytes).contains("Café"));
    }

    #[test]
    fn test_utf8_header_wins_over_charset() {
        let bytes = sgml("ENCODING:UTF-8\r\nCHARSET:NONE", "Café".as_bytes());
        assert!(decode_export(&bytes).contains("Café"));
    }

    #[test]
    fn test_xml_declaration() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<OFX><NAME>Caf\xE9</NAME></OFX>";
        assert!(decode_export(bytes).contains("Café"));
    }

    #[test]
    fn test_undeclared_charset() {
        let utf8 = sgml("CHARSET:NONE", "Café".as_bytes());
        assert!(decode_export(&utf8).contains("Café"));

        let legacy = sgml("", b"Caf\xE9");
        assert!(decode_export(&legacy).contains("Café"));
    }

    #[test]
    fn test_unknown_label_falls_back() {
        let bytes = sgml("CHARSET:KLINGON", "Café".as_bytes());
        assert!(decode_export(&bytes).contains("Café"));
    }

    #[test]
    fn test_plain_utf8_is_borrowed() {
        let bytes = b"<OFX><NAME>Coffee</NAME></OFX>";
        assert!(matches!(decode_export(bytes), Cow::Borrowed(_)));
    }
}
