//! Error and warning types for the streaming parser.

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal parser errors.
///
/// Any of these terminates the parse: the error is surfaced once and no
/// further tokens are processed. Recoverable content problems are reported as
/// [`Warning`] events instead and never abort the parse.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the input stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural error from the message splitter (oversized header block,
    /// unbounded line, nesting too deep).
    #[error("Message structure error: {0}")]
    Structure(String),

    /// The whole-message helper was invoked with no input.
    #[error("Empty input")]
    EmptyInput,

    /// The event consumer went away while the parse still had output for it.
    #[error("Event consumer dropped")]
    ConsumerGone,
}

/// A recoverable content problem, reported out-of-band while the parse
/// continues (charset fallback, oversized HTML guard, HTML conversion
/// failure).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Warning {
    /// Dotted positional identifier of the affected part, when known.
    pub part: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.part {
            Some(part) => write!(f, "part {part}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
