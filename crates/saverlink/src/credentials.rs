//! Login credentials.
//!
//! Credentials are supplied by the caller and never change afterwards. The
//! PIN and challenge answers are redacted from `Debug` output, identifiers
//! are masked, and none of them are logged; only the translated keypad
//! tokens ever leave the process.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Everything the login sequence needs from the account holder.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    saver_id: String,
    customer_number: String,
    pin: String,
    #[serde(default)]
    answers: HashMap<String, String>,
}

impl Credentials {
    /// Creates credentials with no challenge answers.
    #[must_use]
    pub fn new(
        saver_id: impl Into<String>,
        customer_number: impl Into<String>,
        pin: impl Into<String>,
    ) -> Self {
        Self {
            saver_id: saver_id.into(),
            customer_number: customer_number.into(),
            pin: pin.into(),
            answers: HashMap::new(),
        }
    }

    /// Adds the answer for a challenge question key (e.g. `AnswerQ1.4`).
    ///
    /// Supply answers for every question the site may ask; the server picks
    /// which ones to present at login time.
    #[must_use]
    pub fn with_answer(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(question.into(), answer.into());
        self
    }

    /// Primary identifier (saver/account ID).
    #[must_use]
    pub fn saver_id(&self) -> &str {
        &self.saver_id
    }

    /// Secondary identifier (customer/TLS search number).
    #[must_use]
    pub fn customer_number(&self) -> &str {
        &self.customer_number
    }

    pub(crate) fn pin(&self) -> &str {
        &self.pin
    }

    /// Returns the answer for a question key.
    #[must_use]
    pub fn answer(&self, question: &str) -> Option<&str> {
        self.answers.get(question).map(String::as_str)
    }

    /// Returns true if an answer exists for the question key.
    #[must_use]
    pub fn has_answer(&self, question: &str) -> bool {
        self.answers.contains_key(question)
    }

    /// Validates the credentials.
    ///
    /// # Errors
    ///
    /// Returns every validation error found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.saver_id.trim().is_empty() {
            errors.push(ValidationError::EmptySaverId);
        }
        if self.customer_number.trim().is_empty() {
            errors.push(ValidationError::EmptyCustomerNumber);
        }
        if self.pin.is_empty() {
            errors.push(ValidationError::EmptyPin);
        } else if !self.pin.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(ValidationError::NonDigitPin);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut questions: Vec<_> = self.answers.keys().collect();
        questions.sort();
        f.debug_struct("Credentials")
            .field("saver_id", &mask(&self.saver_id))
            .field("customer_number", &mask(&self.customer_number))
            .field("pin", &"<redacted>")
            .field("questions", &questions)
            .finish()
    }
}

/// Keeps the last four characters of an identifier; shorter values are
/// masked entirely.
fn mask(value: &str) -> String {
    let count = value.chars().count();
    let shown = if count > 4 { 4 } else { 0 };
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i + shown < count { '*' } else { c })
        .collect()
}

/// Validation error for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Saver ID is empty.
    EmptySaverId,
    /// Customer number is empty.
    EmptyCustomerNumber,
    /// PIN is empty.
    EmptyPin,
    /// PIN contains a non-digit character.
    NonDigitPin,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptySaverId => "Saver ID is required",
            Self::EmptyCustomerNumber => "Customer number is required",
            Self::EmptyPin => "PIN is required",
            Self::NonDigitPin => "PIN must contain only digits",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptySaverId => "saver_id",
            Self::EmptyCustomerNumber => "customer_number",
            Self::EmptyPin | Self::NonDigitPin => "pin",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

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

    #[test]
    fn test_valid_credentials() {
        let creds = Credentials::new("12345678", "987654", "2468")
            .with_answer("AnswerQ1.4", "1950")
            .with_answer("AnswerQ2.8", "Rex");
        assert!(creds.validate().is_ok());
        assert_eq!(creds.answer("AnswerQ1.4"), Some("1950"));
        assert!(creds.has_answer("AnswerQ2.8"));
        assert!(!creds.has_answer("AnswerQ3.1"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let creds = Credentials::new(" ", "", "12a4");
        let errors = creds.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptySaverId,
                ValidationError::EmptyCustomerNumber,
                ValidationError::NonDigitPin,
            ]
        );
        assert_eq!(errors[2].field(), "pin");
    }

    #[test]
    fn test_empty_pin() {
        let errors = Credentials::new("1", "2", "").validate().unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyPin]);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("12345678", "987654", "2468").with_answer("AnswerQ1.4", "Fluffy");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("12345678"));
        assert!(!debug.contains("987654"));
        assert!(debug.contains("****5678"));
        assert!(debug.contains("**7654"));
        assert!(debug.contains("AnswerQ1.4"));
        assert!(!debug.contains("2468"));
        assert!(!debug.contains("Fluffy"));
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("12345678"), "****5678");
        assert_eq!(mask("1234"), "****");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "saver_id": "12345678",
            "customer_number": "987654",
            "pin": "2468",
            "answers": { "AnswerQ1.4": "1950" }
        }"#;
        let creds: Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.saver_id(), "12345678");
        assert_eq!(creds.answer("AnswerQ1.4"), Some("1950"));
    }
}
