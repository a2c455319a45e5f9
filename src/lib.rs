//! # fontsynth - SoundFont Synthesizer Core
//!
//! Turns MIDI into audio using SoundFont 2 banks.
//!
//! ## Architecture
//!
//! fontsynth is an umbrella crate that coordinates:
//! - **fontsynth-core** - Configuration, lock-free atomics, SoundFont unit conversions
//! - **fontsynth-bank** - SF2 parsing and writing, preset resolution, bank sets
//! - **fontsynth-midi** - Standard MIDI File parsing, VLQ codec, live message decoding
//! - **fontsynth-synth** - Channels, voices, block mixer, control handle, sequencer
//!
//! ## Quick Start
//!
//! ```ignore
//! use fontsynth::prelude::*;
//!
//! let mut synth = SynthBuilder::new()
//!     .bank_file("GeneralUser.sf2")
//!     .build()?;
//!
//! // Control from any thread
//! let handle = synth.handle();
//! handle.program_change(0, 24)?;
//! handle.note_on(0, 64, 100)?;
//!
//! // Render in the audio callback
//! let mut block = StereoBlock::new(128);
//! synth.render_block(&mut block);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything below
//! - `sequencer` - MIDI file playback through [`Sequencer`]

/// Re-export of fontsynth-core for direct access
pub use fontsynth_core as core;

/// Re-export of fontsynth-bank for direct access
pub use fontsynth_bank as bank;

/// Re-export of fontsynth-midi for direct access
pub use fontsynth_midi as midi;

/// Re-export of fontsynth-synth for direct access
pub use fontsynth_synth as synth;

mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::SynthBuilder;

// Configuration
pub use fontsynth_core::{Interpolation, SynthConfig};

// Banks
pub use fontsynth_bank::{BankLibrary, BankSet, GeneratorType, Preset, SoundBank, DRUM_BANK};

// MIDI
pub use fontsynth_midi::{ChannelEvent, ChannelMessage, MidiFile};

// Engine
pub use fontsynth_synth::{
    cc, EventKind, KeyModifier, StereoBlock, StereoBuffer, SynthCommand, SynthEvent, SynthHandle,
    Synthesizer,
};

#[cfg(feature = "sequencer")]
pub use fontsynth_synth::Sequencer;

/// Commonly used types.
pub mod prelude {
    pub use crate::{Error, Result, SynthBuilder};

    pub use fontsynth_bank::{BankSet, SoundBank};
    pub use fontsynth_core::{Interpolation, SynthConfig};
    pub use fontsynth_midi::MidiFile;
    pub use fontsynth_synth::{
        cc, EventKind, StereoBlock, SynthEvent, SynthHandle, Synthesizer,
    };

    #[cfg(feature = "sequencer")]
    pub use fontsynth_synth::Sequencer;
}
