//! Error types for OFX parsing.

/// Result type alias for OFX operations.
pub type Result<T> = std::result::Result<T, Error>;

/// OFX error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has no `<OFX>` root element.
    #[error("Missing <OFX> root element")]
    MissingRoot,

    /// An element was opened but never terminated with `>`.
    #[error("Unterminated element at byte {0}")]
    UnterminatedElement(usize),

    /// A required field is missing from an aggregate.
    #[error("Missing required field {field} in {aggregate}")]
    MissingField {
        /// Aggregate name (e.g., `STMTTRN`).
        aggregate: &'static str,
        /// Field name (e.g., `FITID`).
        field: &'static str,
    },

    /// Invalid date-time value.
    #[error("Invalid OFX date-time: {0}")]
    InvalidDate(String),

    /// Invalid monetary amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
