//! Builder for configuring and constructing a [`Synthesizer`].

use crate::{Error, Result};
use fontsynth_bank::{BankSet, SoundBank};
use fontsynth_core::{Interpolation, SynthConfig};
use fontsynth_synth::Synthesizer;
use std::path::PathBuf;
use std::sync::Arc;

enum BankSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    Parsed(SoundBank),
}

impl BankSource {
    fn load(self) -> Result<SoundBank> {
        Ok(match self {
            BankSource::File(path) => SoundBank::load(path)?,
            BankSource::Bytes(bytes) => SoundBank::from_bytes(&bytes)?,
            BankSource::Parsed(bank) => bank,
        })
    }
}

/// Banks are parsed in [`build`](SynthBuilder::build); a synthesizer built
/// without a bank renders silence until one is loaded.
///
/// # Example
///
/// ```ignore
/// use fontsynth::prelude::*;
///
/// let mut synth = SynthBuilder::new()
///     .sample_rate(48000.0)
///     .block_size(256)
///     .bank_file("GeneralUser.sf2")
///     .build()?;
///
/// synth.note_on(0, 60, 100)?;
/// ```
#[derive(Default)]
pub struct SynthBuilder {
    config: SynthConfig,
    bank: Option<BankSource>,
    overlay: Option<(BankSource, u16)>,
}

impl SynthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: SynthConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 128
    pub fn block_size(mut self, frames: usize) -> Self {
        self.config.block_size = frames;
        self
    }

    /// Default: 16
    pub fn channels(mut self, count: usize) -> Self {
        self.config.channel_count = count;
        self
    }

    /// Default: 350
    pub fn voice_cap(mut self, voices: usize) -> Self {
        self.config.voice_cap = voices;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.config.interpolation = interpolation;
        self
    }

    pub fn effects(mut self, enabled: bool) -> Self {
        self.config.effects_enabled = enabled;
        self
    }

    pub fn bank_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.bank = Some(BankSource::File(path.into()));
        self
    }

    pub fn bank_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bank = Some(BankSource::Bytes(bytes.into()));
        self
    }

    pub fn bank(mut self, bank: SoundBank) -> Self {
        self.bank = Some(BankSource::Parsed(bank));
        self
    }

    /// Layer `bank` over the primary one; melodic bank numbers in the
    /// overlay are shifted by `offset`.
    pub fn override_bank(mut self, bank: SoundBank, offset: u16) -> Self {
        self.overlay = Some((BankSource::Parsed(bank), offset));
        self
    }

    pub fn override_bank_file(mut self, path: impl Into<PathBuf>, offset: u16) -> Self {
        self.overlay = Some((BankSource::File(path.into()), offset));
        self
    }

    pub fn build(self) -> Result<Synthesizer> {
        let mut synth = Synthesizer::new(self.config)?;

        let banks = match (self.bank, self.overlay) {
            (None, None) => return Ok(synth),
            (Some(primary), overlay) => {
                let set = BankSet::new(Arc::new(primary.load()?));
                match overlay {
                    Some((source, offset)) => set.with_override(Arc::new(source.load()?), offset),
                    None => set,
                }
            }
            (None, Some(_)) => {
                return Err(Error::Core(fontsynth_core::Error::InvalidConfig(
                    "override bank given without a primary bank".into(),
                )))
            }
        };
        synth.set_banks(banks);
        Ok(synth)
    }
}
