use thiserror::Error as ThisError;

/// Library-level errors for artifact and transcript handling.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed artifact: {0}")]
    Json(#[from] serde_json::Error),
}
