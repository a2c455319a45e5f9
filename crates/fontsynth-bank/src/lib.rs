//! SoundFont 2 banks for fontsynth.
//!
//! - **[`SoundBank`]** - Parsed bank graph: samples, instruments, presets
//! - **[`BankSet`]** - Primary bank plus an optional override bank
//! - **[`BankLibrary`]** - Path-keyed cache of loaded banks
//! - **[`GeneratorType`] / [`Modulator`]** - The SF2 parameter model
//!
//! # Quick Start
//!
//! ```ignore
//! use fontsynth_bank::SoundBank;
//!
//! let bank = SoundBank::load("GeneralUser.sf2")?;
//! let piano = bank.preset_for(0, 0).unwrap();
//! for zone in bank.resolve(piano.index, 60, 100) {
//!     println!("sample {} pan {}", zone.sample, zone.generators[GeneratorType::Pan]);
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod riff;

mod generator;
pub use generator::{Generator, GeneratorLimits, GeneratorSet, GeneratorType, GENERATOR_COUNT};

mod modulator;
pub use modulator::{
    curve_value, default_modulators, source, CurveType, Modulator, ModulatorSource,
};

mod sample;
pub use sample::{sample_type, Sample};

mod zone;
pub use zone::{InstrumentZone, PresetZone, ZoneParams, ZoneRange};

mod preset;
pub use preset::{Instrument, Preset, ResolvedZone, DRUM_BANK};

mod bank;
pub use bank::{BankInfo, PresetFallback, PresetMatch, ResolvedZones, SoundBank};

mod bank_set;
pub use bank_set::{BankSet, PresetRef};

mod library;
pub use library::{BankHandle, BankLibrary};

mod parser;
mod writer;
