//! OFX element lexer.
//!
//! OFX 1.x is SGML: aggregates are closed explicitly but leaf elements are
//! not (`<TRNAMT>-42.50` runs until the next `<`). OFX 2.x is XML and closes
//! everything. The lexer emits the same token stream for both; a closing tag
//! that follows a leaf value is reported as a plain [`Token::Close`] and the
//! parser ignores closes that don't match an open aggregate.

use std::borrow::Cow;

use crate::{Error, Result};

/// A single OFX markup token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<NAME>` with no text before the next tag: an aggregate start.
    Open(&'a str),
    /// `</NAME>`.
    Close(&'a str),
    /// `<NAME>value`: a leaf element and its (entity-decoded) value.
    Leaf(&'a str, Cow<'a, str>),
}

/// OFX lexer over the body of a document.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer positioned at the `<OFX>` root, skipping the header
    /// block and any XML prologue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRoot`] if the document has no `<OFX>` element.
    pub fn new(input: &'a str) -> Result<Self> {
        let pos = find_root(input).ok_or(Error::MissingRoot)?;
        Ok(Self { input, pos })
    }

    /// Reads the next token, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnterminatedElement`] if a `<` has no matching `>`.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            let rest = &self.input[self.pos..];
            let Some(lt) = rest.find('<') else {
                self.pos = self.input.len();
                return Ok(None);
            };
            let start = self.pos + lt;
            let Some(gt) = self.input[start..].find('>') else {
                return Err(Error::UnterminatedElement(start));
            };
            let tag = self.input[start + 1..start + gt].trim();
            let text_start = start + gt + 1;
            let text_end = self.input[text_start..]
                .find('<')
                .map_or(self.input.len(), |i| text_start + i);
            let text = self.input[text_start..text_end].trim();
            self.pos = text_end;

            // Processing instructions and comments carry nothing we need.
            if tag.starts_with('?') || tag.starts_with('!') || tag.is_empty() {
                continue;
            }

            if let Some(name) = tag.strip_prefix('/') {
                return Ok(Some(Token::Close(name.trim())));
            }

            let name = tag.split_whitespace().next().unwrap_or(tag);
            if text.is_empty() {
                return Ok(Some(Token::Open(name)));
            }
            return Ok(Some(Token::Leaf(name, decode_entities(text))));
        }
    }
}

fn find_root(input: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = input[from..].find("<OFX") {
        let at = from + i;
        match input.as_bytes().get(at + 4) {
            Some(b'>' | b' ' | b'\t' | b'\r' | b'\n') => return Some(at),
            _ => from = at + 4,
        }
    }
    None
}

fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&nbsp;", " ")
            .replace("&amp;", "&"),
    )
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

    fn collect(input: &str) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input).unwrap();
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token().unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn test_sgml_leaf_without_close() {
        let tokens = collect("OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>\n<TRNAMT>-42.5\n</OFX>");
        assert_eq!(
            tokens,
            vec![
                Token::Open("OFX"),
                Token::Leaf("TRNAMT", Cow::Borrowed("-42.5")),
                Token::Close("OFX"),
            ]
        );
    }

    #[test]
    fn test_xml_leaf_with_close() {
        let tokens = collect("<?xml version=\"1.0\"?><?OFX OFXHEADER=\"200\"?><OFX><NAME>A</NAME></OFX>");
        assert_eq!(
            tokens,
            vec![
                Token::Open("OFX"),
                Token::Leaf("NAME", Cow::Borrowed("A")),
                Token::Close("NAME"),
                Token::Close("OFX"),
            ]
        );
    }

    #[test]
    fn test_entities_decoded() {
        let tokens = collect("<OFX><NAME>AT&amp;T &lt;WIRELESS&gt;</OFX>");
        assert_eq!(tokens[1], Token::Leaf("NAME", Cow::Owned("AT&T <WIRELESS>".into())));
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(Lexer::new("<html></html>"), Err(Error::MissingRoot)));
        // A tag that merely starts with OFX is not the root.
        assert!(matches!(Lexer::new("<OFXHEADER>"), Err(Error::MissingRoot)));
    }

    #[test]
    fn test_unterminated_element() {
        let mut lexer = Lexer::new("<OFX><NAME").unwrap();
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Open("OFX")));
        assert!(matches!(
            lexer.next_token(),
            Err(Error::UnterminatedElement(5))
        ));
    }
}
