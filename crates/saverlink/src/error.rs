//! Error types for the site client.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::credentials::ValidationError;

/// Steps of the login sequence, in the order the site runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStage {
    /// Initial GET of the login page (cookie priming).
    Init,
    /// POST of the primary identifier.
    Identify,
    /// Challenge questions page.
    Challenge,
    /// Randomized keypad PIN entry.
    Pin,
    /// Authenticated landing page.
    Landing,
}

impl LoginStage {
    /// Returns the stage name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Identify => "identify",
            Self::Challenge => "challenge",
            Self::Pin => "pin",
            Self::Landing => "landing",
        }
    }
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a login stage failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The response status was not the one the stage expects
    /// (redirect for form posts, success for the landing page).
    UnexpectedStatus(StatusCode),
    /// The challenge page did not present the expected number of questions.
    QuestionMismatch {
        /// Number of questions the configuration expects.
        expected: usize,
        /// Number of question keys found on the page.
        found: usize,
    },
    /// The server asked a question the credentials have no answer for.
    MissingAnswer(String),
    /// The request never produced a response.
    Transport(String),
    /// The page did not have the structure the stage scrapes for.
    Decode(DecodeError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedStatus(status) => write!(f, "unexpected status {status}"),
            Self::QuestionMismatch { expected, found } => {
                write!(f, "question mismatch: expected {expected}, found {found}")
            }
            Self::MissingAnswer(key) => write!(f, "no answer supplied for question {key}"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Decode(e) => write!(f, "{e}"),
        }
    }
}

/// Extraction failures: the page did not have the structure we scrape for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer than ten keypad buttons were found.
    #[error("keypad has {found} buttons, expected 10")]
    KeypadTooShort {
        /// Buttons found.
        found: usize,
    },

    /// More than ten keypad buttons were found; the layout is ambiguous.
    #[error("keypad has {found} buttons, expected 10")]
    KeypadTooLong {
        /// Buttons found.
        found: usize,
    },

    /// The PIN contains a character that is not a decimal digit.
    #[error("PIN character at position {position} is not a digit")]
    InvalidPinDigit {
        /// Zero-based position in the PIN.
        position: usize,
    },

    /// The account summary rows don't group into complete triples.
    #[error("account summary has {lines} row lines, not a multiple of 3")]
    IncompleteAccountRow {
        /// Number of row lines found.
        lines: usize,
    },

    /// An account row line could not be split into its fields.
    #[error("malformed account row: {0}")]
    MalformedAccountRow(String),

    /// A balance could not be parsed as money.
    #[error("invalid balance: {0}")]
    InvalidBalance(String),
}

/// Errors that can occur while talking to the site.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport error outside the login sequence.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A login stage did not get the response it requires.
    #[error("Login failed at {stage} stage: {reason}")]
    LoginFailed {
        /// Stage that failed.
        stage: LoginStage,
        /// What went wrong.
        reason: FailureReason,
    },

    /// Scraped content did not have the expected structure.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The export endpoint did not return success.
    #[error("Download failed with status {status}")]
    DownloadFailed {
        /// Response status.
        status: StatusCode,
    },

    /// The operation needs a completed login.
    #[error("Session is not authenticated")]
    NotAuthenticated,

    /// Invalid transaction date range.
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    /// Invalid site configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credentials failed validation before any request was sent.
    #[error("Invalid credentials: {}", join_messages(.0))]
    InvalidCredentials(Vec<ValidationError>),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON configuration error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The export payload could not be parsed.
    #[error("Export parse error: {0}")]
    Ofx(#[from] saverlink_ofx::Error),
}

impl Error {
    /// Creates a login failure for a stage.
    #[must_use]
    pub const fn login_failed(stage: LoginStage, reason: FailureReason) -> Self {
        Self::LoginFailed { stage, reason }
    }

    /// Returns the failed login stage, if this is a login failure.
    #[must_use]
    pub const fn stage(&self) -> Option<LoginStage> {
        match self {
            Self::LoginFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_login_failed_display() {
        let err = Error::login_failed(
            LoginStage::Challenge,
            FailureReason::QuestionMismatch {
                expected: 2,
                found: 1,
            },
        );
        assert_eq!(
            err.to_string(),
            "Login failed at challenge stage: question mismatch: expected 2, found 1"
        );
        assert_eq!(err.stage(), Some(LoginStage::Challenge));
    }

    #[test]
    fn test_unexpected_status_display() {
        let err = Error::login_failed(
            LoginStage::Identify,
            FailureReason::UnexpectedStatus(StatusCode::OK),
        );
        assert_eq!(
            err.to_string(),
            "Login failed at identify stage: unexpected status 200 OK"
        );
    }

    #[test]
    fn test_invalid_credentials_display() {
        let err = Error::InvalidCredentials(vec![
            ValidationError::EmptySaverId,
            ValidationError::NonDigitPin,
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid credentials: Saver ID is required, PIN must contain only digits"
        );
        assert_eq!(err.stage(), None);
    }
}
