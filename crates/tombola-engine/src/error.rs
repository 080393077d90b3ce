use thiserror::Error;

use tombola_store::StoreError;

/// Errors produced by the lifecycle engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The store failed underneath an engine operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed input to an engine operation.
    #[error("Invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
