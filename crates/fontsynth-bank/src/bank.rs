//! The parsed bank graph and preset resolution.

use crate::error::{Error, Result};
use crate::modulator::{default_modulators, Modulator};
use crate::preset::{merge_zone, Instrument, Preset, ResolvedZone, DRUM_BANK};
use crate::sample::Sample;
use smallvec::SmallVec;
use std::path::Path;
use tracing::{debug, warn};

/// Layers resolved for one note; most presets produce one or two.
pub type ResolvedZones = SmallVec<[ResolvedZone; 4]>;

/// Contents of the `INFO` list.
#[derive(Debug, Clone, PartialEq)]
pub struct BankInfo {
    /// `ifil` (major, minor)
    pub version: (u16, u16),
    /// `INAM`
    pub name: String,
    /// All other text fields in file order, keyed by their chunk tag
    pub fields: Vec<(String, String)>,
}

impl Default for BankInfo {
    fn default() -> Self {
        Self {
            version: (2, 1),
            name: String::new(),
            fields: Vec::new(),
        }
    }
}

impl BankInfo {
    pub fn field(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == tag)
            .map(|(_, v)| v.as_str())
    }
}

/// How [`SoundBank::preset_for`] found its preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetFallback {
    /// Exact bank and program
    Exact,
    /// Same program in the lowest other melodic bank
    AnyBank,
    /// Another drum kit (drum requests only)
    AnyDrumKit,
    /// Program 0 of the requested bank
    ProgramZero,
    /// Program 0 of bank 0
    DefaultPreset,
    /// First preset in the bank
    FirstPreset,
}

/// Result of a preset lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetMatch {
    /// Index into [`SoundBank::presets`]
    pub index: usize,
    pub fallback: PresetFallback,
}

/// A parsed sound bank: samples, instruments and presets.
///
/// Presets and instruments refer to each other by index; the bank owns
/// everything and is shared read-only (behind `Arc`) once built.
#[derive(Debug, Clone)]
pub struct SoundBank {
    pub info: BankInfo,
    pub samples: Vec<Sample>,
    pub instruments: Vec<Instrument>,
    /// Sorted by (bank, program)
    pub presets: Vec<Preset>,
    /// Default modulators applied to every instrument zone
    pub default_modulators: Vec<Modulator>,
    /// Whether `default_modulators` came from a `DMOD` chunk
    pub custom_defaults: bool,
}

impl Default for SoundBank {
    fn default() -> Self {
        Self {
            info: BankInfo::default(),
            samples: Vec::new(),
            instruments: Vec::new(),
            presets: Vec::new(),
            default_modulators: default_modulators(),
            custom_defaults: false,
        }
    }
}

impl SoundBank {
    /// Create an empty bank for programmatic construction.
    pub fn new(name: impl Into<String>) -> Self {
        let mut bank = Self::default();
        bank.info.name = name.into();
        bank
    }

    /// Parse an SF2 image.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        crate::parser::parse(data)
    }

    /// Read and parse an SF2 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn add_sample(&mut self, sample: Sample) -> usize {
        self.samples.push(sample);
        self.samples.len() - 1
    }

    pub fn add_instrument(&mut self, instrument: Instrument) -> usize {
        self.instruments.push(instrument);
        self.instruments.len() - 1
    }

    /// Add a preset, keeping the list sorted. Returns its index.
    pub fn add_preset(&mut self, preset: Preset) -> usize {
        let key = (preset.bank, preset.program);
        let at = self
            .presets
            .partition_point(|p| (p.bank, p.program) <= key);
        self.presets.insert(at, preset);
        at
    }

    pub(crate) fn sort_presets(&mut self) {
        self.presets.sort_by_key(|p| (p.bank, p.program));
    }

    /// Exact (bank, program) lookup.
    pub fn find_preset(&self, bank: u16, program: u16) -> Option<usize> {
        self.presets
            .iter()
            .position(|p| p.bank == bank && p.program == program)
    }

    /// Exact (bank, program) lookup that fails instead of falling back.
    pub fn preset(&self, bank: u16, program: u16) -> Result<&Preset> {
        self.find_preset(bank, program)
            .map(|i| &self.presets[i])
            .ok_or(Error::PresetNotFound { bank, program })
    }

    /// Preset lookup with the deterministic fallback chain.
    ///
    /// Melodic: exact, same program in the lowest other melodic bank,
    /// program 0 of the bank, program 0 of bank 0, first preset.
    /// Drums (bank 128): exact, program 0 of bank 128, the first drum kit,
    /// program 0 of bank 0, first preset.
    /// Returns `None` only for a bank without presets.
    pub fn preset_for(&self, bank: u16, program: u16) -> Option<PresetMatch> {
        let found = |index: usize, fallback| Some(PresetMatch { index, fallback });

        if let Some(index) = self.find_preset(bank, program) {
            return found(index, PresetFallback::Exact);
        }

        let nearby = if bank == DRUM_BANK {
            self.find_preset(DRUM_BANK, 0)
                .map(|i| (i, PresetFallback::ProgramZero))
                .or_else(|| {
                    self.presets
                        .iter()
                        .position(Preset::is_drum)
                        .map(|i| (i, PresetFallback::AnyDrumKit))
                })
        } else {
            self.presets
                .iter()
                .position(|p| p.program == program && !p.is_drum())
                .map(|i| (i, PresetFallback::AnyBank))
                .or_else(|| {
                    self.find_preset(bank, 0)
                        .map(|i| (i, PresetFallback::ProgramZero))
                })
        };
        let result = nearby
            .or_else(|| {
                self.find_preset(0, 0)
                    .map(|i| (i, PresetFallback::DefaultPreset))
            })
            .or_else(|| (!self.presets.is_empty()).then_some((0, PresetFallback::FirstPreset)));

        match result {
            Some((index, fallback)) => {
                let p = &self.presets[index];
                debug!(
                    "Preset {bank}:{program} not found, using '{}' ({}:{}) via {:?}",
                    p.name, p.bank, p.program, fallback
                );
                found(index, fallback)
            }
            None => {
                warn!("Bank '{}' has no presets", self.info.name);
                None
            }
        }
    }

    /// Resolve every sample layer a preset plays for (key, velocity).
    pub fn resolve(&self, preset_index: usize, key: u8, velocity: u8) -> ResolvedZones {
        let mut out = ResolvedZones::new();
        let Some(preset) = self.presets.get(preset_index) else {
            return out;
        };
        for preset_zone in &preset.zones {
            if !preset_zone.params.matches(&preset.global, key, velocity) {
                continue;
            }
            let Some(instrument) = self.instruments.get(preset_zone.instrument) else {
                continue;
            };
            for inst_zone in &instrument.zones {
                if inst_zone.sample >= self.samples.len()
                    || !inst_zone.params.matches(&instrument.global, key, velocity)
                {
                    continue;
                }
                out.push(merge_zone(
                    preset,
                    preset_zone,
                    instrument,
                    inst_zone,
                    &self.default_modulators,
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Generator, GeneratorType as G};
    use crate::zone::{InstrumentZone, PresetZone, ZoneParams, ZoneRange};

    fn preset(bank: u16, program: u16) -> Preset {
        Preset {
            name: format!("{bank}:{program}"),
            bank,
            program,
            ..Default::default()
        }
    }

    fn bank_with(presets: &[(u16, u16)]) -> SoundBank {
        let mut bank = SoundBank::new("test");
        for &(b, p) in presets {
            bank.add_preset(preset(b, p));
        }
        bank
    }

    fn name_of(bank: &SoundBank, m: PresetMatch) -> &str {
        &bank.presets[m.index].name
    }

    #[test]
    fn test_exact_match() {
        let bank = bank_with(&[(0, 0), (0, 5), (8, 5)]);
        let m = bank.preset_for(8, 5).unwrap();
        assert_eq!(m.fallback, PresetFallback::Exact);
        assert_eq!(name_of(&bank, m), "8:5");
    }

    #[test]
    fn test_bank_wildcard_prefers_lowest_bank() {
        let bank = bank_with(&[(0, 0), (16, 5), (3, 5)]);
        let m = bank.preset_for(1, 5).unwrap();
        assert_eq!(m.fallback, PresetFallback::AnyBank);
        assert_eq!(name_of(&bank, m), "3:5");
    }

    #[test]
    fn test_program_zero_same_bank() {
        let bank = bank_with(&[(0, 0), (4, 0)]);
        let m = bank.preset_for(4, 9).unwrap();
        assert_eq!(m.fallback, PresetFallback::ProgramZero);
        assert_eq!(name_of(&bank, m), "4:0");
    }

    #[test]
    fn test_default_then_first() {
        let bank = bank_with(&[(0, 0), (2, 1)]);
        assert_eq!(bank.preset_for(7, 9).unwrap().fallback, PresetFallback::DefaultPreset);

        let bank = bank_with(&[(2, 1), (3, 3)]);
        let m = bank.preset_for(7, 9).unwrap();
        assert_eq!(m.fallback, PresetFallback::FirstPreset);
        assert_eq!(name_of(&bank, m), "2:1");
    }

    #[test]
    fn test_drums_never_use_melodic_wildcard() {
        let bank = bank_with(&[(0, 0), (0, 25), (128, 0), (128, 16)]);
        let m = bank.preset_for(128, 25).unwrap();
        assert_eq!(m.fallback, PresetFallback::ProgramZero);
        assert_eq!(name_of(&bank, m), "128:0");

        let bank = bank_with(&[(0, 0), (128, 16)]);
        let m = bank.preset_for(128, 25).unwrap();
        assert_eq!(m.fallback, PresetFallback::AnyDrumKit);
    }

    #[test]
    fn test_exact_preset_error() {
        let bank = bank_with(&[(0, 0)]);
        assert!(bank.preset(0, 0).is_ok());
        assert!(matches!(
            bank.preset(3, 7),
            Err(Error::PresetNotFound { bank: 3, program: 7 })
        ));
    }

    #[test]
    fn test_empty_bank() {
        assert!(SoundBank::new("empty").preset_for(0, 0).is_none());
    }

    #[test]
    fn test_resolve_filters_by_key_and_velocity() {
        let mut bank = SoundBank::new("test");
        bank.add_sample(Sample::new("low", vec![0.0; 16], 44100, 48, 0, 0));
        bank.add_sample(Sample::new("high", vec![0.0; 16], 44100, 72, 0, 0));
        let inst = bank.add_instrument(Instrument {
            name: "split".into(),
            global: ZoneParams::default(),
            zones: vec![
                InstrumentZone {
                    params: ZoneParams {
                        key_range: Some(ZoneRange::new(0, 59)),
                        ..Default::default()
                    },
                    sample: 0,
                },
                InstrumentZone {
                    params: ZoneParams {
                        key_range: Some(ZoneRange::new(60, 127)),
                        generators: vec![Generator::new(G::Pan, -250)],
                        ..Default::default()
                    },
                    sample: 1,
                },
            ],
        });
        let idx = bank.add_preset(Preset {
            name: "piano".into(),
            zones: vec![PresetZone {
                params: ZoneParams {
                    vel_range: Some(ZoneRange::new(1, 100)),
                    ..Default::default()
                },
                instrument: inst,
            }],
            ..Default::default()
        });

        let low = bank.resolve(idx, 40, 90);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sample, 0);

        let high = bank.resolve(idx, 64, 90);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].sample, 1);
        assert_eq!(high[0].generators[G::Pan], -250);

        assert!(bank.resolve(idx, 64, 120).is_empty());
    }
}
