//! Error types for fontsynth-bank.

use thiserror::Error;

/// Result type alias for bank operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing a sound bank.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated bank data.
    #[error("Format error in '{chunk}': {reason}")]
    Format { chunk: String, reason: String },

    /// A chunk the format requires is absent.
    #[error("Missing required chunk '{0}'")]
    MissingChunk(&'static str),

    /// No preset with this exact (bank, program).
    #[error("Preset {bank}:{program} not found")]
    PresetNotFound { bank: u16, program: u16 },
}

impl Error {
    pub(crate) fn format(chunk: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Format {
            chunk: chunk.into(),
            reason: reason.into(),
        }
    }
}
