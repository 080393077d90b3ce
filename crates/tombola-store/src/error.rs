use thiserror::Error;

/// Errors produced by the store layer.
///
/// Business-rule refusals (duplicate join, unknown giveaway, already
/// banned) are expressed as ordinary return values on the operations that
/// can produce them; this enum covers only real failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the document failed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// The file holds valid JSON that does not match the schema (for
    /// example an unknown status string).  Surfaced loudly rather than
    /// silently starting fresh.
    #[error("Stored document does not match the schema: {0}")]
    Corrupt(String),

    /// Malformed input to a creating operation.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
