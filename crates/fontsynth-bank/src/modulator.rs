//! Modulators: routing rules from live controllers into generators.

use crate::generator::GeneratorType;

/// Non-CC source indices.
pub mod source {
    pub const NO_CONTROLLER: u8 = 0;
    pub const NOTE_ON_VELOCITY: u8 = 2;
    pub const NOTE_ON_KEY: u8 = 3;
    pub const POLY_PRESSURE: u8 = 10;
    pub const CHANNEL_PRESSURE: u8 = 13;
    pub const PITCH_WHEEL: u8 = 14;
    pub const PITCH_WHEEL_RANGE: u8 = 16;
    pub const LINK: u8 = 127;
}

/// Shape applied to a normalized controller value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveType {
    #[default]
    Linear,
    Concave,
    Convex,
    Switch,
}

impl CurveType {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => CurveType::Linear,
            1 => CurveType::Concave,
            2 => CurveType::Convex,
            _ => CurveType::Switch,
        }
    }

    fn bits(self) -> u16 {
        match self {
            CurveType::Linear => 0,
            CurveType::Concave => 1,
            CurveType::Convex => 2,
            CurveType::Switch => 3,
        }
    }
}

// 400/960: one curve unit spans 96 dB of attenuation
const CURVE_SLOPE: f32 = 400.0 / 960.0;

#[inline]
fn concave(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    (-CURVE_SLOPE * (1.0 - x).log10()).clamp(0.0, 1.0)
}

#[inline]
fn convex(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    (1.0 + CURVE_SLOPE * x.log10()).clamp(0.0, 1.0)
}

/// Evaluate a curve on a 0..1 input.
pub fn curve_value(curve: CurveType, bipolar: bool, negative: bool, value: f32) -> f32 {
    let value = if negative { 1.0 - value } else { value };
    let shape = |x: f32| match curve {
        CurveType::Linear => x,
        CurveType::Concave => concave(x),
        CurveType::Convex => convex(x),
        CurveType::Switch => {
            if x > 0.5 {
                1.0
            } else {
                0.0
            }
        }
    };
    if !bipolar {
        return shape(value);
    }
    match curve {
        CurveType::Linear | CurveType::Switch => shape(value) * 2.0 - 1.0,
        CurveType::Concave | CurveType::Convex => {
            let centered = value * 2.0 - 1.0;
            if centered < 0.0 {
                -shape(-centered)
            } else {
                shape(centered)
            }
        }
    }
}

/// Decoded 16-bit modulator source enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModulatorSource {
    /// Controller number (CC) or general source index
    pub index: u8,
    pub is_cc: bool,
    /// Max to min direction
    pub negative: bool,
    pub bipolar: bool,
    pub curve: CurveType,
}

impl ModulatorSource {
    pub const NONE: ModulatorSource = ModulatorSource {
        index: source::NO_CONTROLLER,
        is_cc: false,
        negative: false,
        bipolar: false,
        curve: CurveType::Linear,
    };

    pub fn from_raw(raw: u16) -> Self {
        Self {
            index: (raw & 0x7F) as u8,
            is_cc: raw & 0x80 != 0,
            negative: raw & 0x100 != 0,
            bipolar: raw & 0x200 != 0,
            curve: CurveType::from_bits(raw >> 10),
        }
    }

    pub fn to_raw(&self) -> u16 {
        (self.curve.bits() << 10)
            | ((self.bipolar as u16) << 9)
            | ((self.negative as u16) << 8)
            | ((self.is_cc as u16) << 7)
            | self.index as u16
    }

    /// `true` for the "no controller" source.
    #[inline]
    pub fn is_none(&self) -> bool {
        !self.is_cc && self.index == source::NO_CONTROLLER
    }

    /// Map a 14-bit controller value (0..=16383) through this source's curve.
    #[inline]
    pub fn transform(&self, raw: u16) -> f32 {
        let value = raw.min(16383) as f32 / 16384.0;
        curve_value(self.curve, self.bipolar, self.negative, value)
    }
}

const fn source_enum(curve: u16, bipolar: u16, negative: u16, cc: u16, index: u16) -> u16 {
    (curve << 10) | (bipolar << 9) | (negative << 8) | (cc << 7) | index
}

/// A routing rule from a controller into a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulator {
    pub source: ModulatorSource,
    pub amount_source: ModulatorSource,
    pub destination: GeneratorType,
    pub amount: i16,
    /// 0 = linear, 2 = absolute value
    pub transform: u16,
}

impl Modulator {
    pub fn new(
        source: u16,
        amount_source: u16,
        destination: GeneratorType,
        amount: i16,
        transform: u16,
    ) -> Self {
        Self {
            source: ModulatorSource::from_raw(source),
            amount_source: ModulatorSource::from_raw(amount_source),
            destination,
            amount,
            transform,
        }
    }

    /// Same source, secondary source, destination and transform.
    ///
    /// Identical modulators replace (instrument level) or add to (preset
    /// level) each other instead of stacking.
    pub fn is_identical(&self, other: &Modulator) -> bool {
        self.source == other.source
            && self.amount_source == other.amount_source
            && self.destination == other.destination
            && self.transform == other.transform
    }

    /// CC91/CC93 into the reverb/chorus send with no secondary source.
    pub fn is_effect_modulator(&self) -> bool {
        let raw = self.source.to_raw();
        (raw == 0x00DB || raw == 0x00DD)
            && self.amount_source.to_raw() == 0
            && matches!(
                self.destination,
                GeneratorType::ReverbEffectsSend | GeneratorType::ChorusEffectsSend
            )
    }
}

/// Append `extra` modulators not identical to one already in `list`.
pub(crate) fn add_unique(list: &mut Vec<Modulator>, extra: &[Modulator]) {
    for m in extra {
        if !list.iter().any(|existing| existing.is_identical(m)) {
            list.push(*m);
        }
    }
}

const CONCAVE: u16 = 1;
const CONVEX: u16 = 2;
const DEFAULT_ATTENUATION_AMOUNT: i16 = 960;

/// The built-in modulators applied to every instrument zone.
pub fn default_modulators() -> Vec<Modulator> {
    use GeneratorType as G;
    vec![
        // velocity to attenuation
        Modulator::new(
            source_enum(CONCAVE, 0, 1, 0, source::NOTE_ON_VELOCITY as u16),
            0,
            G::InitialAttenuation,
            DEFAULT_ATTENUATION_AMOUNT,
            0,
        ),
        // mod wheel to vibrato
        Modulator::new(0x0081, 0, G::VibLfoToPitch, 50, 0),
        // volume to attenuation
        Modulator::new(
            source_enum(CONCAVE, 0, 1, 1, 7),
            0,
            G::InitialAttenuation,
            DEFAULT_ATTENUATION_AMOUNT,
            0,
        ),
        // channel pressure to vibrato
        Modulator::new(0x000D, 0, G::VibLfoToPitch, 50, 0),
        // pitch wheel (scaled by its range) to fine tune
        Modulator::new(0x020E, 0x0010, G::FineTune, 12700, 0),
        // pan
        Modulator::new(0x028A, 0, G::Pan, 500, 0),
        // expression to attenuation
        Modulator::new(
            source_enum(CONCAVE, 0, 1, 1, 11),
            0,
            G::InitialAttenuation,
            DEFAULT_ATTENUATION_AMOUNT,
            0,
        ),
        Modulator::new(0x00DB, 0, G::ReverbEffectsSend, 200, 0),
        Modulator::new(0x00DD, 0, G::ChorusEffectsSend, 200, 0),
        // poly pressure to vibrato
        Modulator::new(
            source_enum(0, 0, 0, 0, source::POLY_PRESSURE as u16),
            0,
            G::VibLfoToPitch,
            50,
            0,
        ),
        // CC92 (tremolo depth) to mod LFO volume
        Modulator::new(source_enum(0, 0, 0, 1, 92), 0, G::ModLfoToVolume, 24, 0),
        // CC73 (attack time)
        Modulator::new(source_enum(CONVEX, 1, 0, 1, 73), 0, G::AttackVolEnv, 6000, 0),
        // CC72 (release time)
        Modulator::new(source_enum(0, 1, 0, 1, 72), 0, G::ReleaseVolEnv, 3600, 0),
        // CC74 (brightness)
        Modulator::new(source_enum(0, 1, 0, 1, 74), 0, G::InitialFilterFc, 6000, 0),
        // CC71 (resonance)
        Modulator::new(source_enum(0, 1, 0, 1, 71), 0, G::InitialFilterQ, 250, 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_source_bits_round_trip() {
        for raw in [0x0502u16, 0x0081, 0x020E, 0x028A, 0x0AC9, 0x02C7] {
            assert_eq!(ModulatorSource::from_raw(raw).to_raw(), raw);
        }
        let src = ModulatorSource::from_raw(0x0587);
        assert!(src.is_cc);
        assert!(src.negative);
        assert!(!src.bipolar);
        assert_eq!(src.curve, CurveType::Concave);
        assert_eq!(src.index, 7);
    }

    #[test]
    fn test_linear_curves() {
        assert_relative_eq!(curve_value(CurveType::Linear, false, false, 0.25), 0.25);
        assert_relative_eq!(curve_value(CurveType::Linear, false, true, 0.25), 0.75);
        assert_relative_eq!(curve_value(CurveType::Linear, true, false, 0.5), 0.0);
        assert_relative_eq!(curve_value(CurveType::Linear, true, false, 1.0), 1.0);
    }

    #[test]
    fn test_concave_convex_endpoints() {
        assert_eq!(curve_value(CurveType::Concave, false, false, 0.0), 0.0);
        assert_eq!(curve_value(CurveType::Concave, false, false, 1.0), 1.0);
        assert_eq!(curve_value(CurveType::Convex, false, false, 0.0), 0.0);
        assert_eq!(curve_value(CurveType::Convex, false, false, 1.0), 1.0);
        // concave stays below linear, convex above
        assert!(curve_value(CurveType::Concave, false, false, 0.5) < 0.5);
        assert!(curve_value(CurveType::Convex, false, false, 0.5) > 0.5);
    }

    #[test]
    fn test_bipolar_concave_is_odd() {
        let up = curve_value(CurveType::Concave, true, false, 0.8);
        let down = curve_value(CurveType::Concave, true, false, 0.2);
        assert_relative_eq!(up, -down, epsilon = 1e-6);
    }

    #[test]
    fn test_switch() {
        assert_eq!(curve_value(CurveType::Switch, false, false, 0.4), 0.0);
        assert_eq!(curve_value(CurveType::Switch, false, false, 0.6), 1.0);
        assert_eq!(curve_value(CurveType::Switch, true, false, 0.4), -1.0);
    }

    #[test]
    fn test_identity() {
        let a = Modulator::new(0x0081, 0, GeneratorType::VibLfoToPitch, 50, 0);
        let b = Modulator::new(0x0081, 0, GeneratorType::VibLfoToPitch, 100, 0);
        let c = Modulator::new(0x0081, 0, GeneratorType::ModLfoToPitch, 50, 0);
        assert!(a.is_identical(&b));
        assert!(!a.is_identical(&c));
    }

    #[test]
    fn test_add_unique_keeps_first() {
        let mut list = vec![Modulator::new(0x0081, 0, GeneratorType::VibLfoToPitch, 10, 0)];
        add_unique(&mut list, &default_modulators());
        let vib: Vec<_> = list
            .iter()
            .filter(|m| m.source.to_raw() == 0x0081)
            .collect();
        assert_eq!(vib.len(), 1);
        assert_eq!(vib[0].amount, 10);
        assert_eq!(list.len(), default_modulators().len());
    }

    #[test]
    fn test_effect_modulators() {
        let defaults = default_modulators();
        assert_eq!(defaults.iter().filter(|m| m.is_effect_modulator()).count(), 2);
    }
}
