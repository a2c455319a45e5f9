//! Error types for fontsynth-midi.

use thiserror::Error;

/// Result type alias for MIDI parsing.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated MIDI data.
    #[error("MIDI format error: {0}")]
    Format(String),

    /// The header declares no tracks.
    #[error("MIDI file contains no tracks")]
    NoTracks,

    /// SMPTE timecode division where metrical timing is required.
    #[error("Timecode-based MIDI timing is not supported here")]
    UnsupportedTiming,
}

impl Error {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Error::Format(reason.into())
    }
}
