// Error types for JSON Pointer parsing

use thiserror::Error;

/// Errors produced while parsing a pointer from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    /// A non-empty pointer must start with `/`
    #[error("JSON pointer '{0}' must be empty or start with '/'")]
    MissingLeadingSlash(String),

    /// `~` must be followed by `0` or `1`
    #[error("JSON pointer '{pointer}' has an invalid escape at byte {offset}")]
    InvalidEscape { pointer: String, offset: usize },

    /// A URI fragment contained a malformed `%XX` sequence or non-UTF-8 bytes
    #[error("URI fragment '{0}' is not valid percent-encoded UTF-8")]
    InvalidPercentEncoding(String),
}

/// Result type for pointer parsing
pub type PointerResult<T> = Result<T, PointerError>;
