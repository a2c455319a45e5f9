//! Instruments, presets and the layered generator/modulator merge.

use crate::generator::{add_unique, GeneratorSet};
use crate::modulator::{self, Modulator};
use crate::zone::{InstrumentZone, PresetZone, ZoneParams};
use std::sync::Arc;

/// Bank number reserved for drum kits.
pub const DRUM_BANK: u16 = 128;

/// An ordered list of zones, each playing one sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instrument {
    pub name: String,
    /// Global zone: defaults merged into every other zone
    pub global: ZoneParams,
    pub zones: Vec<InstrumentZone>,
}

/// A bank/program addressable patch layering one or more instruments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preset {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
    pub global: ZoneParams,
    pub zones: Vec<PresetZone>,
}

impl Preset {
    #[inline]
    pub fn is_drum(&self) -> bool {
        self.bank == DRUM_BANK
    }
}

/// The effective parameters of one sample layer for one (key, velocity).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedZone {
    /// Index into [`SoundBank::samples`](crate::SoundBank::samples)
    pub sample: usize,
    pub generators: GeneratorSet,
    /// Shared with every voice template built from this zone
    pub modulators: Arc<[Modulator]>,
}

/// Merge one preset zone with one instrument zone.
///
/// Generators: zone-specific over global at each level, then preset values
/// added on top of instrument values. Modulators: instrument zone, then
/// instrument global, then the bank defaults (identical ones skipped); preset
/// modulators identical to an instrument one add their amount, others are
/// appended.
pub(crate) fn merge_zone(
    preset: &Preset,
    preset_zone: &PresetZone,
    instrument: &Instrument,
    instrument_zone: &InstrumentZone,
    defaults: &[Modulator],
) -> ResolvedZone {
    let preset_gens = add_unique(&preset_zone.params.generators, &preset.global.generators);
    let inst_gens = add_unique(&instrument_zone.params.generators, &instrument.global.generators);
    let generators = GeneratorSet::combine(&inst_gens, &preset_gens);

    let mut modulators = instrument_zone.params.modulators.clone();
    modulator::add_unique(&mut modulators, &instrument.global.modulators);
    modulator::add_unique(&mut modulators, defaults);

    let mut preset_mods = preset_zone.params.modulators.clone();
    modulator::add_unique(&mut preset_mods, &preset.global.modulators);
    for pm in preset_mods {
        match modulators.iter_mut().find(|m| m.is_identical(&pm)) {
            Some(existing) => existing.amount = existing.amount.saturating_add(pm.amount),
            None => modulators.push(pm),
        }
    }

    ResolvedZone {
        sample: instrument_zone.sample,
        generators,
        modulators: modulators.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Generator, GeneratorType as G};
    use crate::modulator::default_modulators;

    fn zone_params(generators: Vec<Generator>, modulators: Vec<Modulator>) -> ZoneParams {
        ZoneParams {
            generators,
            modulators,
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_generators_layers() {
        let instrument = Instrument {
            name: "inst".into(),
            global: zone_params(vec![Generator::new(G::ReleaseVolEnv, 1200)], vec![]),
            zones: vec![InstrumentZone {
                params: zone_params(vec![Generator::new(G::CoarseTune, 2)], vec![]),
                sample: 3,
            }],
        };
        let preset = Preset {
            global: zone_params(vec![Generator::new(G::CoarseTune, 1)], vec![]),
            zones: vec![PresetZone {
                params: ZoneParams::default(),
                instrument: 0,
            }],
            ..Default::default()
        };
        let resolved = merge_zone(
            &preset,
            &preset.zones[0],
            &instrument,
            &instrument.zones[0],
            &default_modulators(),
        );
        assert_eq!(resolved.sample, 3);
        assert_eq!(resolved.generators[G::CoarseTune], 3);
        assert_eq!(resolved.generators[G::ReleaseVolEnv], 1200);
        assert_eq!(resolved.modulators.len(), default_modulators().len());
    }

    #[test]
    fn test_identical_preset_modulator_sums() {
        let vib = Modulator::new(0x0081, 0, G::VibLfoToPitch, 30, 0);
        let instrument = Instrument {
            zones: vec![InstrumentZone {
                params: ZoneParams::default(),
                sample: 0,
            }],
            ..Default::default()
        };
        let preset = Preset {
            zones: vec![PresetZone {
                params: zone_params(vec![], vec![vib]),
                instrument: 0,
            }],
            ..Default::default()
        };
        let resolved = merge_zone(
            &preset,
            &preset.zones[0],
            &instrument,
            &instrument.zones[0],
            &default_modulators(),
        );
        let merged: Vec<_> = resolved
            .modulators
            .iter()
            .filter(|m| m.is_identical(&vib))
            .collect();
        assert_eq!(merged.len(), 1);
        // default 50 + preset 30
        assert_eq!(merged[0].amount, 80);
    }

    #[test]
    fn test_custom_instrument_modulator_replaces_default() {
        let custom = Modulator::new(0x0081, 0, G::VibLfoToPitch, 5, 0);
        let instrument = Instrument {
            zones: vec![InstrumentZone {
                params: zone_params(vec![], vec![custom]),
                sample: 0,
            }],
            ..Default::default()
        };
        let preset = Preset {
            zones: vec![PresetZone {
                params: ZoneParams::default(),
                instrument: 0,
            }],
            ..Default::default()
        };
        let resolved = merge_zone(
            &preset,
            &preset.zones[0],
            &instrument,
            &instrument.zones[0],
            &default_modulators(),
        );
        let vib = resolved
            .modulators
            .iter()
            .find(|m| m.is_identical(&custom))
            .unwrap();
        assert_eq!(vib.amount, 5);
    }
}
