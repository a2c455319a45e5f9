//! Error types for fontsynth-synth.

use thiserror::Error;

/// Result type alias for fontsynth-synth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fontsynth-synth.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bank loading or lookup error.
    #[error("Bank error: {0}")]
    Bank(#[from] fontsynth_bank::Error),

    /// MIDI parsing error.
    #[error("MIDI error: {0}")]
    Midi(#[from] fontsynth_midi::Error),

    /// The render side is not draining commands fast enough.
    #[error("Command queue full")]
    QueueFull,

    /// The render side was dropped.
    #[error("Synthesizer disconnected")]
    Disconnected,

    #[error("Channel {0} out of range")]
    ChannelOutOfRange(usize),
}

impl From<fontsynth_core::Error> for Error {
    fn from(err: fontsynth_core::Error) -> Self {
        match err {
            fontsynth_core::Error::InvalidConfig(msg) => Error::InvalidConfig(msg),
        }
    }
}
