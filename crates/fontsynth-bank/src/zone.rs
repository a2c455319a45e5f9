//! Zones: key/velocity scoped bundles of generators and modulators.

use crate::generator::Generator;
use crate::modulator::Modulator;

/// Inclusive 7-bit range used for key and velocity splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRange {
    pub lo: u8,
    pub hi: u8,
}

impl ZoneRange {
    pub const FULL: ZoneRange = ZoneRange { lo: 0, hi: 127 };

    pub fn new(lo: u8, hi: u8) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        (self.lo..=self.hi).contains(&value)
    }
}

impl Default for ZoneRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// The generator/modulator payload shared by preset and instrument zones.
///
/// `generators` never contains the structural generators (ranges,
/// `instrument`, `sampleID`); those are held in dedicated fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneParams {
    pub key_range: Option<ZoneRange>,
    pub vel_range: Option<ZoneRange>,
    pub generators: Vec<Generator>,
    pub modulators: Vec<Modulator>,
}

impl ZoneParams {
    /// Whether the note falls inside this zone, falling back to the global
    /// zone's ranges where this zone sets none.
    pub fn matches(&self, global: &ZoneParams, key: u8, velocity: u8) -> bool {
        let key_range = self.key_range.or(global.key_range).unwrap_or_default();
        let vel_range = self.vel_range.or(global.vel_range).unwrap_or_default();
        key_range.contains(key) && vel_range.contains(velocity)
    }

    pub fn is_empty(&self) -> bool {
        self.key_range.is_none()
            && self.vel_range.is_none()
            && self.generators.is_empty()
            && self.modulators.is_empty()
    }
}

/// Instrument zone: parameters plus the sample it plays.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentZone {
    pub params: ZoneParams,
    /// Index into [`SoundBank::samples`](crate::SoundBank::samples)
    pub sample: usize,
}

/// Preset zone: parameters plus the instrument it layers.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetZone {
    pub params: ZoneParams,
    /// Index into [`SoundBank::instruments`](crate::SoundBank::instruments)
    pub instrument: usize,
}
