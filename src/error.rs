//! Centralized error type for the fontsynth umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] fontsynth_core::Error),

    #[error("Bank: {0}")]
    Bank(#[from] fontsynth_bank::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] fontsynth_midi::Error),

    #[error("Synth: {0}")]
    Synth(#[from] fontsynth_synth::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
