//! Generators: the numeric synthesis parameters attached to zones.

use smallvec::SmallVec;

/// Number of generator slots a voice tracks (ids 0..=59; `endOper` excluded).
pub const GENERATOR_COUNT: usize = 60;

/// SoundFont 2 generator ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    Unused1 = 14,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeyNumToModEnvHold = 31,
    KeyNumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeyNumToVolEnvHold = 39,
    KeyNumToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    KeyNum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    Reserved2 = 49,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
    Unused5 = 59,
    EndOper = 60,
}

use GeneratorType as G;

const ALL: [GeneratorType; 61] = [
    G::StartAddrsOffset, G::EndAddrsOffset, G::StartloopAddrsOffset, G::EndloopAddrsOffset,
    G::StartAddrsCoarseOffset, G::ModLfoToPitch, G::VibLfoToPitch, G::ModEnvToPitch,
    G::InitialFilterFc, G::InitialFilterQ, G::ModLfoToFilterFc, G::ModEnvToFilterFc,
    G::EndAddrsCoarseOffset, G::ModLfoToVolume, G::Unused1, G::ChorusEffectsSend,
    G::ReverbEffectsSend, G::Pan, G::Unused2, G::Unused3, G::Unused4, G::DelayModLfo,
    G::FreqModLfo, G::DelayVibLfo, G::FreqVibLfo, G::DelayModEnv, G::AttackModEnv,
    G::HoldModEnv, G::DecayModEnv, G::SustainModEnv, G::ReleaseModEnv,
    G::KeyNumToModEnvHold, G::KeyNumToModEnvDecay, G::DelayVolEnv, G::AttackVolEnv,
    G::HoldVolEnv, G::DecayVolEnv, G::SustainVolEnv, G::ReleaseVolEnv,
    G::KeyNumToVolEnvHold, G::KeyNumToVolEnvDecay, G::Instrument, G::Reserved1,
    G::KeyRange, G::VelRange, G::StartloopAddrsCoarseOffset, G::KeyNum, G::Velocity,
    G::InitialAttenuation, G::Reserved2, G::EndloopAddrsCoarseOffset, G::CoarseTune,
    G::FineTune, G::SampleId, G::SampleModes, G::Reserved3, G::ScaleTuning,
    G::ExclusiveClass, G::OverridingRootKey, G::Unused5, G::EndOper,
];

/// Numeric bounds and default of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorLimits {
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

const fn lim(min: i32, max: i32, default: i32) -> Option<GeneratorLimits> {
    Some(GeneratorLimits { min, max, default })
}

/// Used for ids without defined limits.
const FALLBACK_LIMITS: GeneratorLimits = GeneratorLimits {
    min: 0,
    max: 32768,
    default: 0,
};

const LIMITS: [Option<GeneratorLimits>; 61] = [
    lim(0, 32768, 0),           // startAddrsOffset
    lim(-32768, 32768, 0),      // endAddrOffset
    lim(-32768, 32768, 0),      // startloopAddrsOffset
    lim(-32768, 32768, 0),      // endloopAddrsOffset
    lim(0, 32768, 0),           // startAddrsCoarseOffset
    lim(-12000, 12000, 0),      // modLfoToPitch
    lim(-12000, 12000, 0),      // vibLfoToPitch
    lim(-12000, 12000, 0),      // modEnvToPitch
    lim(1500, 13500, 13500),    // initialFilterFc
    lim(0, 960, 0),             // initialFilterQ
    lim(-12000, 12000, 0),      // modLfoToFilterFc
    lim(-12000, 12000, 0),      // modEnvToFilterFc
    lim(-32768, 32768, 0),      // endAddrsCoarseOffset
    lim(-960, 960, 0),          // modLfoToVolume
    None,                       // unused1
    lim(0, 1000, 0),            // chorusEffectsSend
    lim(0, 1000, 0),            // reverbEffectsSend
    lim(-500, 500, 0),          // pan
    None,
    None,
    None,
    lim(-12000, 5000, -12000),  // delayModLFO
    lim(-16000, 4500, 0),       // freqModLFO
    lim(-12000, 5000, -12000),  // delayVibLFO
    lim(-16000, 4500, 0),       // freqVibLFO
    lim(-32768, 5000, -32768),  // delayModEnv
    lim(-32768, 8000, -32768),  // attackModEnv
    lim(-12000, 5000, -12000),  // holdModEnv
    lim(-12000, 8000, -12000),  // decayModEnv
    lim(0, 1000, 0),            // sustainModEnv
    lim(-7200, 8000, -12000),   // releaseModEnv
    lim(-1200, 1200, 0),        // keyNumToModEnvHold
    lim(-1200, 1200, 0),        // keyNumToModEnvDecay
    lim(-12000, 5000, -12000),  // delayVolEnv
    lim(-12000, 8000, -12000),  // attackVolEnv
    lim(-12000, 5000, -12000),  // holdVolEnv
    lim(-12000, 8000, -12000),  // decayVolEnv
    lim(0, 1440, 0),            // sustainVolEnv
    lim(-7200, 8000, -12000),   // releaseVolEnv
    lim(-1200, 1200, 0),        // keyNumToVolEnvHold
    lim(-1200, 1200, 0),        // keyNumToVolEnvDecay
    None,                       // instrument
    None,
    None,                       // keyRange
    None,                       // velRange
    lim(-32768, 32768, 0),      // startloopAddrsCoarseOffset
    lim(-1, 127, -1),           // keyNum
    lim(-1, 127, -1),           // velocity
    lim(0, 1440, 0),            // initialAttenuation
    None,
    lim(-32768, 32768, 0),      // endloopAddrsCoarseOffset
    lim(-120, 120, 0),          // coarseTune
    lim(-12700, 12700, 0),      // fineTune
    None,                       // sampleID
    lim(0, 3, 0),               // sampleModes
    None,
    lim(0, 1200, 100),          // scaleTuning
    lim(0, 99999, 0),           // exclusiveClass
    lim(-1, 127, -1),           // overridingRootKey
    None,
    None,                       // endOper
];

impl GeneratorType {
    /// Look up a generator by its raw id.
    #[inline]
    pub fn from_id(id: u16) -> Option<Self> {
        ALL.get(id as usize).copied()
    }

    #[inline]
    pub fn id(self) -> u16 {
        self as u16
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Defined bounds, if the generator has any.
    #[inline]
    pub fn limits(self) -> Option<GeneratorLimits> {
        LIMITS[self.index()]
    }

    /// Default value used when an instrument zone does not set the generator.
    #[inline]
    pub fn default_value(self) -> i32 {
        self.limits().map_or(0, |l| l.default)
    }

    /// Clamp `value` to this generator's limits.
    #[inline]
    pub fn clamp_value(self, value: i32) -> i32 {
        let limits = self.limits().unwrap_or(FALLBACK_LIMITS);
        value.clamp(limits.min, limits.max)
    }

    /// Generators that define zone structure rather than sound.
    #[inline]
    pub fn is_structural(self) -> bool {
        matches!(self, G::Instrument | G::SampleId | G::KeyRange | G::VelRange | G::EndOper)
    }

    /// Generators only meaningful at instrument level; ignored in preset zones.
    pub fn is_instrument_only(self) -> bool {
        matches!(
            self,
            G::StartAddrsOffset
                | G::EndAddrsOffset
                | G::StartloopAddrsOffset
                | G::EndloopAddrsOffset
                | G::StartAddrsCoarseOffset
                | G::EndAddrsCoarseOffset
                | G::StartloopAddrsCoarseOffset
                | G::EndloopAddrsCoarseOffset
                | G::KeyNum
                | G::Velocity
                | G::SampleModes
                | G::ExclusiveClass
                | G::OverridingRootKey
        )
    }
}

/// A single (generator, amount) record of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    pub ty: GeneratorType,
    pub amount: i16,
}

impl Generator {
    pub fn new(ty: GeneratorType, amount: i16) -> Self {
        Self { ty, amount }
    }

    /// Build a range generator (`keyRange` / `velRange`) from its bounds.
    pub fn range(ty: GeneratorType, lo: u8, hi: u8) -> Self {
        Self {
            ty,
            amount: i16::from_le_bytes([lo, hi]),
        }
    }

    /// Split a range amount into `(lo, hi)`.
    #[inline]
    pub fn range_bounds(&self) -> (u8, u8) {
        let [lo, hi] = self.amount.to_le_bytes();
        (lo, hi)
    }
}

/// Zone-level generator list: zone-specific entries win over global ones.
pub(crate) fn add_unique(
    zone: &[Generator],
    global: &[Generator],
) -> SmallVec<[Generator; 32]> {
    let mut merged: SmallVec<[Generator; 32]> = zone.iter().copied().collect();
    for g in global {
        if !merged.iter().any(|m| m.ty == g.ty) {
            merged.push(*g);
        }
    }
    merged
}

/// The effective generator values of one voice.
///
/// Stored as `i32` so modulated sums never overflow the 16-bit file range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSet {
    values: [i32; GENERATOR_COUNT],
}

impl Default for GeneratorSet {
    fn default() -> Self {
        let mut values = [0; GENERATOR_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = ALL[i].default_value();
        }
        Self { values }
    }
}

impl GeneratorSet {
    /// Combine instrument- and preset-level generators.
    ///
    /// Each value is `instrument (or default) + preset (or 0)`, clamped to
    /// the generator limits. `initialAttenuation` is left unclamped here so
    /// negative preset offsets still reach the modulators.
    pub fn combine(instrument: &[Generator], preset: &[Generator]) -> Self {
        let mut set = Self::default();
        for g in instrument {
            if g.ty.index() < GENERATOR_COUNT && !g.ty.is_structural() {
                set.values[g.ty.index()] = g.amount as i32;
            }
        }
        for g in preset {
            if g.ty.index() < GENERATOR_COUNT
                && !g.ty.is_structural()
                && !g.ty.is_instrument_only()
            {
                set.values[g.ty.index()] += g.amount as i32;
            }
        }
        for ty in ALL.iter().take(GENERATOR_COUNT) {
            if *ty != G::InitialAttenuation {
                set.values[ty.index()] = ty.clamp_value(set.values[ty.index()]);
            }
        }
        set
    }

    #[inline]
    pub fn get(&self, ty: GeneratorType) -> i32 {
        self.values.get(ty.index()).copied().unwrap_or(0)
    }

    #[inline]
    pub fn set(&mut self, ty: GeneratorType, value: i32) {
        if let Some(slot) = self.values.get_mut(ty.index()) {
            *slot = value;
        }
    }

    pub fn as_slice(&self) -> &[i32; GENERATOR_COUNT] {
        &self.values
    }
}

impl std::ops::Index<GeneratorType> for GeneratorSet {
    type Output = i32;

    fn index(&self, ty: GeneratorType) -> &i32 {
        static END_OPER: i32 = 0;
        self.values.get(ty.index()).unwrap_or(&END_OPER)
    }
}
