//! Randomized on-screen keypad decoding.
//!
//! The PIN page renders a ten-button keypad whose buttons are shuffled on
//! every visit. Each button's click handler is bound to an opaque symbol, and
//! the form expects those symbols instead of digits. The page lists buttons
//! for digits 1-9 first and the 0 button last.

use regex::Regex;

use crate::config::compile_pattern;
use crate::error::{DecodeError, Result};

/// Number of keys on the keypad.
pub const KEYPAD_SIZE: usize = 10;

/// Extracts keypad mappings from PIN pages.
#[derive(Debug, Clone)]
pub struct KeypadMapper {
    button: Regex,
}

impl KeypadMapper {
    /// Creates a mapper for a button pattern whose first capture group is the
    /// button's symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or has no capture group.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            button: compile_pattern("pin.keypad_pattern", pattern)?,
        })
    }

    /// Decodes the keypad from a page fragment.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] unless exactly ten buttons are found.
    pub fn decode(&self, html: &str) -> Result<KeypadMapping> {
        let mut symbols: Vec<String> = self
            .button
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect();

        if symbols.len() < KEYPAD_SIZE {
            return Err(DecodeError::KeypadTooShort {
                found: symbols.len(),
            }
            .into());
        }
        if symbols.len() > KEYPAD_SIZE {
            return Err(DecodeError::KeypadTooLong {
                found: symbols.len(),
            }
            .into());
        }

        // "0" is rendered last; move it to index 0.
        symbols.rotate_right(1);
        Ok(KeypadMapping { symbols })
    }
}

/// Symbols for digits 0-9, indexed by digit value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadMapping {
    symbols: Vec<String>,
}

impl KeypadMapping {
    /// Returns the symbol for a digit, or `None` if `digit > 9`.
    #[must_use]
    pub fn symbol(&self, digit: u8) -> Option<&str> {
        self.symbols.get(usize::from(digit)).map(String::as_str)
    }

    /// Returns all symbols in digit order.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Translates a PIN into keypad tokens, one per digit, in order.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidPinDigit`] for a non-digit character.
    pub fn translate(&self, pin: &str) -> Result<PinTokens> {
        let mut tokens = Vec::with_capacity(pin.len());
        for (position, ch) in pin.chars().enumerate() {
            let symbol = ch
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .and_then(|d| self.symbol(d))
                .ok_or(DecodeError::InvalidPinDigit { position })?;
            tokens.push(symbol.to_string());
        }
        Ok(PinTokens(tokens))
    }
}

/// Keypad tokens standing in for PIN digits.
#[derive(Clone, PartialEq, Eq)]
pub struct PinTokens(Vec<String>);

impl PinTokens {
    /// Joins the tokens with the form's separator.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    /// Returns the individual tokens.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of tokens (the PIN length).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Tokens are as good as the PIN for the lifetime of the session.
impl std::fmt::Debug for PinTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PinTokens(<{} redacted>)", self.0.len())
    }
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
    use crate::config::PinForm;
    use crate::error::Error;

    /// Renders a keypad page with buttons for 1..9 then 0, bound to `symbols`
    /// in that order.
    fn keypad_page(symbols: &[&str]) -> String {
        let mut html = String::from("<div id=\"keypad\">\n");
        for (i, symbol) in symbols.iter().enumerate() {
            let label = (i + 1) % 10;
            html.push_str(&format!(
                "<img src=\"/images/pinpad/{label}.gif\" onmouseup=\"addClick('{symbol}');\" />\n"
            ));
        }
        html.push_str("</div>");
        html
    }

    fn mapper() -> KeypadMapper {
        KeypadMapper::new(&PinForm::default().keypad_pattern).unwrap()
    }

    const SYMBOLS: [&str; 10] = ["KQ", "ZX", "AB", "PL", "MN", "RT", "VW", "CD", "EF", "GH"];

    #[test]
    fn test_decode_rotates_zero_to_front() {
        let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
        assert_eq!(mapping.symbols().len(), 10);
        // Last button on the page is "0".
        assert_eq!(mapping.symbol(0), Some("GH"));
        assert_eq!(mapping.symbol(1), Some("KQ"));
        assert_eq!(mapping.symbol(9), Some("EF"));
        assert_eq!(mapping.symbol(10), None);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let page = keypad_page(&SYMBOLS);
        let mapper = mapper();
        assert_eq!(mapper.decode(&page).unwrap(), mapper.decode(&page).unwrap());
    }

    #[test]
    fn test_decode_too_short() {
        let err = mapper().decode(&keypad_page(&SYMBOLS[..9])).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::KeypadTooShort { found: 9 })
        ));
    }

    #[test]
    fn test_decode_too_long() {
        let mut page = keypad_page(&SYMBOLS);
        page.push_str("<img onmouseup=\"addClick('XX');\" />");
        let err = mapper().decode(&page).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::KeypadTooLong { found: 11 })
        ));
    }

    #[test]
    fn test_translate_in_order() {
        let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
        let tokens = mapping.translate("1234").unwrap();
        assert_eq!(tokens.as_slice(), ["KQ", "ZX", "AB", "PL"]);
        assert_eq!(tokens.join(","), "KQ,ZX,AB,PL");
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_translate_zero() {
        let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
        assert_eq!(mapping.translate("90").unwrap().join("-"), "EF-GH");
    }

    #[test]
    fn test_translate_rejects_non_digit() {
        let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
        let err = mapping.translate("12a4").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::InvalidPinDigit { position: 2 })
        ));
        // Non-ASCII digits are not PIN digits either.
        assert!(mapping.translate("١٢").is_err());
    }

    #[test]
    fn test_tokens_debug_is_redacted() {
        let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
        let tokens = mapping.translate("1234").unwrap();
        assert_eq!(format!("{tokens:?}"), "PinTokens(<4 redacted>)");
    }

    proptest::proptest! {
        #[test]
        fn prop_translation_never_leaks_digits(pin in "[0-9]{4,8}") {
            let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
            let joined = mapping.translate(&pin).unwrap().join(",");
            proptest::prop_assert!(!joined.chars().any(|c| c.is_ascii_digit()));
            proptest::prop_assert_eq!(joined.split(',').count(), pin.len());
        }

        #[test]
        fn prop_each_digit_maps_to_its_symbol(pin in "[0-9]{1,8}") {
            let mapping = mapper().decode(&keypad_page(&SYMBOLS)).unwrap();
            let tokens = mapping.translate(&pin).unwrap();
            for (ch, token) in pin.chars().zip(tokens.as_slice()) {
                let digit = u8::try_from(ch.to_digit(10).unwrap()).unwrap();
                proptest::prop_assert_eq!(Some(token.as_str()), mapping.symbol(digit));
            }
        }
    }
}
