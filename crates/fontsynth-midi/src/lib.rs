//! MIDI parsing for fontsynth.
//!
//! - **[`vlq`]** - Variable-length quantity codec
//! - **[`TrackReader`]** - Lazy track decoder with running status and SysEx continuation
//! - **[`MidiFile`]** - Standard MIDI File parser, track merge and tempo map
//! - **[`ChannelEvent`]** - Channel voice messages, also used for live input
//!
//! # Quick Start
//!
//! ```ignore
//! use fontsynth_midi::MidiFile;
//!
//! let file = MidiFile::load("song.mid")?;
//! for event in file.timed_events() {
//!     println!("{:.3}s {:?}", event.time, event.kind);
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod vlq;

mod event;
pub use event::{
    meta, ChannelEvent, ChannelMessage, EventKind, TrackEvent, DEFAULT_TEMPO_MICROS,
};

mod track;
pub use track::TrackReader;

mod file;
pub use file::{MidiFile, TempoMap, TimedEvent, Timing};
