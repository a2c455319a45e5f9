//! The banks a synthesizer plays from: a primary bank plus an optional
//! override layered in front of it.

use crate::bank::{PresetFallback, ResolvedZones, SoundBank};
use crate::preset::{Preset, DRUM_BANK};
use crate::sample::Sample;
use std::sync::Arc;
use tracing::debug;

/// A preset chosen from a [`BankSet`], keeping its bank alive.
#[derive(Debug, Clone)]
pub struct PresetRef {
    bank: Arc<SoundBank>,
    index: usize,
    pub fallback: PresetFallback,
    /// Whether the preset came from the override bank
    pub from_override: bool,
}

impl PresetRef {
    pub fn preset(&self) -> &Preset {
        &self.bank.presets[self.index]
    }

    pub fn bank(&self) -> &Arc<SoundBank> {
        &self.bank
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.preset().name
    }

    /// Zones sounding for (key, velocity).
    pub fn resolve(&self, key: u8, velocity: u8) -> ResolvedZones {
        self.bank.resolve(self.index, key, velocity)
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.bank.samples.get(index)
    }

    /// Same preset of the same bank instance.
    pub fn same_as(&self, other: &PresetRef) -> bool {
        Arc::ptr_eq(&self.bank, &other.bank) && self.index == other.index
    }
}

/// Primary bank plus optional override bank.
///
/// The override only wins on an exact (bank, program) hit, looked up at
/// `bank - offset` for melodic banks; drum bank 128 is never offset.
#[derive(Debug, Clone, Default)]
pub struct BankSet {
    primary: Option<Arc<SoundBank>>,
    overlay: Option<(Arc<SoundBank>, u16)>,
}

impl BankSet {
    /// A set with no banks; every lookup returns `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(primary: Arc<SoundBank>) -> Self {
        Self {
            primary: Some(primary),
            overlay: None,
        }
    }

    pub fn with_override(mut self, bank: Arc<SoundBank>, offset: u16) -> Self {
        self.overlay = Some((bank, offset));
        self
    }

    pub fn primary(&self) -> Option<&Arc<SoundBank>> {
        self.primary.as_ref()
    }

    pub fn override_bank(&self) -> Option<&Arc<SoundBank>> {
        self.overlay.as_ref().map(|(bank, _)| bank)
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.overlay.is_none()
    }

    /// Pick the preset a channel plays for (bank, program).
    pub fn preset_for(&self, bank: u16, program: u16) -> Option<PresetRef> {
        if let Some((overlay, offset)) = &self.overlay {
            let shifted = if bank == DRUM_BANK {
                Some(DRUM_BANK)
            } else {
                bank.checked_sub(*offset)
            };
            if let Some(index) = shifted.and_then(|b| overlay.find_preset(b, program)) {
                debug!(
                    "Using override preset '{}' for {bank}:{program}",
                    overlay.presets[index].name
                );
                return Some(PresetRef {
                    bank: Arc::clone(overlay),
                    index,
                    fallback: PresetFallback::Exact,
                    from_override: true,
                });
            }
        }

        let primary = self.primary.as_ref().or(self.override_bank())?;
        let found = primary.preset_for(bank, program)?;
        Some(PresetRef {
            bank: Arc::clone(primary),
            index: found.index,
            fallback: found.fallback,
            from_override: self.primary.is_none(),
        })
    }

    /// `(bank, program, name)` of every preset, override first.
    pub fn preset_names(&self) -> Vec<(u16, u16, String)> {
        let mut names = Vec::new();
        if let Some((overlay, offset)) = &self.overlay {
            names.extend(overlay.presets.iter().map(|p| {
                let bank = if p.is_drum() { p.bank } else { p.bank.saturating_add(*offset) };
                (bank, p.program, p.name.clone())
            }));
        }
        if let Some(primary) = &self.primary {
            names.extend(
                primary
                    .presets
                    .iter()
                    .map(|p| (p.bank, p.program, p.name.clone())),
            );
        }
        names
    }
}
