//! SoundFont voice engine for fontsynth.
//!
//! Turns MIDI into audio using banks from `fontsynth-bank`:
//!
//! - **[`Synthesizer`]** - Channels, MIDI/SysEx dispatch, voice cap and block rendering
//! - **[`SynthHandle`]** - Cloneable control handle feeding a lock-free command queue
//! - **[`Channel`]** - Per-channel controller, RPN/NRPN and preset state machine
//! - **[`Voice`]** - Wavetable playback with envelopes, LFOs, filter and glide
//! - **[`StereoBlock`]** - Dry output plus reverb and chorus send buffers
//! - **[`Sequencer`]** - Sample-accurate MIDI file playback (feature: `sequencer`)
//!
//! # Quick Start
//!
//! ```ignore
//! use fontsynth_bank::SoundBank;
//! use fontsynth_core::SynthConfig;
//! use fontsynth_synth::{StereoBlock, Synthesizer};
//!
//! let bank = SoundBank::load("piano.sf2")?;
//! let mut synth = Synthesizer::with_bank(SynthConfig::default(), bank)?;
//!
//! // From another thread
//! let handle = synth.handle();
//! handle.note_on(0, 60, 100)?;
//!
//! // In the audio callback
//! let mut block = StereoBlock::new(128);
//! synth.render_block(&mut block);
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `sequencer` | MIDI file playback through [`Sequencer`] |

pub mod error;
pub use error::{Error, Result};

pub mod controllers;
pub use controllers::{cc, ChannelTuning, ControllerTable};

pub mod portamento;
pub use portamento::{glide_duration, portamento_seconds, Glide};

pub mod voice;
pub use voice::{ChannelVibrato, LoopMode, Voice, VoiceTemplate};

mod mixer;
pub use mixer::{MixBus, MixGains, StereoBlock, StereoBuffer};

mod channel;
pub use channel::{Channel, DataEntryState, MIN_EXCLUSIVE_LENGTH, MIN_NOTE_LENGTH};

mod key_modifiers;
pub use key_modifiers::{KeyModifier, KeyModifierManager};

mod events;
pub use events::{EventKind, Listener, ListenerId, SynthEvent};

mod stats;
pub use stats::{RenderStats, StatsSnapshot};

mod handle;
pub use handle::{SynthCommand, SynthHandle};

mod synth;
pub use synth::Synthesizer;

#[cfg(feature = "sequencer")]
mod sequencer;

#[cfg(feature = "sequencer")]
pub use sequencer::Sequencer;

#[cfg(test)]
mod test_support;
