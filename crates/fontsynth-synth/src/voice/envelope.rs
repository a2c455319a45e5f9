//! Volume envelope.
//!
//! Runs per sample in the SoundFont stages delay, attack, hold, decay,
//! sustain and release. Levels are tracked as attenuation in dB (0 = full
//! level, 100 = silence). Attack is a linear gain ramp, decay and release
//! are linear in dB, i.e. exponential in amplitude.
//!
//! Stage boundaries are recomputed from the (modulated) generators whenever
//! they change, so CC-driven attack/release changes reach sounding voices.

use fontsynth_bank::{GeneratorSet, GeneratorType as G};
use fontsynth_core::units::{db_attenuation_to_gain, timecents_to_seconds};

/// Per-sample smoothing applied to the attenuation gain.
pub const SMOOTHING_FACTOR: f32 = 0.01;

const DB_SILENCE: f32 = 100.0;
/// Levels below this are inaudible; the voice may end here.
const PERCEIVED_DB_SILENCE: f32 = 90.0;
const PERCEIVED_GAIN_SILENCE: f32 = 0.000015;

/// Envelope stage before release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnvelopeStage {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
}

/// Sample-driven volume envelope of one voice.
#[derive(Debug, Clone)]
pub struct VolumeEnvelope {
    sample_rate: f64,
    /// Samples rendered since note-on
    position: f64,
    stage: EnvelopeStage,
    /// Envelope attenuation at `position`, in dB
    current_db: f32,

    released: bool,
    release_start: f64,
    release_start_db: f32,
    current_release_gain: f32,

    attack_duration: f64,
    decay_duration: f64,
    release_duration: f64,
    delay_end: f64,
    attack_end: f64,
    hold_end: f64,
    decay_end: f64,

    /// Smoothed linear gain of `initialAttenuation`
    attenuation: f32,
    attenuation_target_gain: f32,
    sustain_db: f32,
    can_end_on_silent_sustain: bool,
    finished: bool,
}

impl VolumeEnvelope {
    pub fn new(sample_rate: f64, generators: &GeneratorSet, target_key: u8) -> Self {
        let mut env = Self {
            sample_rate,
            position: 0.0,
            stage: EnvelopeStage::Delay,
            current_db: DB_SILENCE,
            released: false,
            release_start: 0.0,
            release_start_db: DB_SILENCE,
            current_release_gain: 1.0,
            attack_duration: 0.0,
            decay_duration: 0.0,
            release_duration: 0.0,
            delay_end: 0.0,
            attack_end: 0.0,
            hold_end: 0.0,
            decay_end: 0.0,
            attenuation: 0.0,
            attenuation_target_gain: 0.0,
            sustain_db: 0.0,
            can_end_on_silent_sustain: generators[G::SustainVolEnv] as f32 / 10.0
                >= PERCEIVED_DB_SILENCE,
            finished: false,
        };
        env.recalculate(generators, target_key);
        // start at the target instead of fading in from silence
        env.attenuation = env.attenuation_target_gain;
        env
    }

    #[inline]
    fn samples(&self, timecents: f64) -> f64 {
        (timecents_to_seconds(timecents) * self.sample_rate)
            .floor()
            .max(0.0)
    }

    /// Recompute stage boundaries from the generators.
    pub fn recalculate(&mut self, generators: &GeneratorSet, target_key: u8) {
        let gen = |ty: G| f64::from(generators[ty]);

        let attenuation_db = generators[G::InitialAttenuation].clamp(0, 1440) as f32 / 10.0;
        self.attenuation_target_gain = db_attenuation_to_gain(attenuation_db);
        self.sustain_db = (generators[G::SustainVolEnv] as f32 / 10.0).min(DB_SILENCE);
        let sustain_fraction = f64::from(self.sustain_db.clamp(0.0, DB_SILENCE) / DB_SILENCE);

        let key_offset = 60.0 - f64::from(target_key);
        self.attack_duration = self.samples(gen(G::AttackVolEnv));
        let decay_timecents = gen(G::DecayVolEnv) + key_offset * gen(G::KeyNumToVolEnvDecay);
        self.decay_duration = self.samples(decay_timecents) * sustain_fraction;
        self.release_duration = self.samples(gen(G::ReleaseVolEnv));

        self.delay_end = self.samples(gen(G::DelayVolEnv));
        self.attack_end = self.delay_end + self.attack_duration;
        let hold_timecents = gen(G::HoldVolEnv) + key_offset * gen(G::KeyNumToVolEnvHold);
        self.hold_end = self.attack_end + self.samples(hold_timecents);
        self.decay_end = self.hold_end + self.decay_duration;

        if self.stage == EnvelopeStage::Delay && self.attack_end == 0.0 {
            self.stage = EnvelopeStage::Hold;
        }

        if self.released {
            self.derive_release();
        }
    }

    /// Release level and duration from the stage the release interrupted.
    fn derive_release(&mut self) {
        let at = self.release_start;
        let start_db = match self.stage {
            EnvelopeStage::Delay => DB_SILENCE,
            EnvelopeStage::Attack if self.attack_duration > 0.0 => {
                let elapsed = 1.0 - (self.attack_end - at) / self.attack_duration;
                -20.0 * (elapsed as f32).log10()
            }
            EnvelopeStage::Attack | EnvelopeStage::Hold => 0.0,
            EnvelopeStage::Decay if self.decay_duration > 0.0 => {
                (1.0 - (self.decay_end - at) / self.decay_duration) as f32 * self.sustain_db
            }
            EnvelopeStage::Decay | EnvelopeStage::Sustain => self.sustain_db,
        };
        self.release_start_db = if start_db.is_nan() {
            DB_SILENCE
        } else {
            start_db.clamp(0.0, DB_SILENCE)
        };
        if self.release_start_db >= PERCEIVED_DB_SILENCE {
            self.finished = true;
        }
        self.current_release_gain = db_attenuation_to_gain(self.release_start_db);
        self.release_duration *= f64::from((DB_SILENCE - self.release_start_db) / DB_SILENCE);
    }

    /// Enter the release stage from wherever the envelope currently is.
    pub fn start_release(&mut self, generators: &GeneratorSet, target_key: u8) {
        if self.released {
            return;
        }
        self.released = true;
        self.release_start = self.position;
        self.current_release_gain = db_attenuation_to_gain(self.current_db);
        self.recalculate(generators, target_key);
    }

    /// Multiply `buffer` by the envelope, advancing it by `buffer.len()`
    /// samples. `centibel_offset` is extra attenuation (mod LFO to volume).
    ///
    /// Returns `true` once the envelope has finished.
    pub fn apply(&mut self, buffer: &mut [f32], centibel_offset: f32) -> bool {
        if buffer.is_empty() {
            return self.finished;
        }
        let db_offset = centibel_offset / 10.0;

        if self.released {
            let mut elapsed = self.position - self.release_start;
            if elapsed >= self.release_duration {
                buffer.fill(0.0);
                self.finished = true;
                return true;
            }
            let db_range = DB_SILENCE - self.release_start_db;
            for sample in buffer.iter_mut() {
                self.smooth();
                let db = (elapsed / self.release_duration) as f32 * db_range + self.release_start_db;
                self.current_release_gain = self.attenuation * db_attenuation_to_gain(db + db_offset);
                *sample *= self.current_release_gain;
                self.position += 1.0;
                elapsed += 1.0;
            }
            if self.current_release_gain <= PERCEIVED_GAIN_SILENCE {
                self.finished = true;
            }
            return self.finished;
        }

        let offset_gain = db_attenuation_to_gain(db_offset);
        let len = buffer.len();
        let mut i = 0;
        loop {
            match self.stage {
                EnvelopeStage::Delay => {
                    while self.position < self.delay_end {
                        self.current_db = DB_SILENCE;
                        buffer[i] = 0.0;
                        self.position += 1.0;
                        i += 1;
                        if i >= len {
                            return self.finished;
                        }
                    }
                    self.stage = EnvelopeStage::Attack;
                }
                EnvelopeStage::Attack => {
                    while self.position < self.attack_end {
                        self.smooth();
                        let linear =
                            (1.0 - (self.attack_end - self.position) / self.attack_duration) as f32;
                        buffer[i] *= linear * self.attenuation * offset_gain;
                        self.current_db = 0.0;
                        self.position += 1.0;
                        i += 1;
                        if i >= len {
                            return self.finished;
                        }
                    }
                    self.stage = EnvelopeStage::Hold;
                }
                EnvelopeStage::Hold => {
                    while self.position < self.hold_end {
                        self.smooth();
                        buffer[i] *= self.attenuation * offset_gain;
                        self.current_db = 0.0;
                        self.position += 1.0;
                        i += 1;
                        if i >= len {
                            return self.finished;
                        }
                    }
                    self.stage = EnvelopeStage::Decay;
                }
                EnvelopeStage::Decay => {
                    while self.position < self.decay_end {
                        self.smooth();
                        self.current_db = (1.0
                            - (self.decay_end - self.position) / self.decay_duration)
                            as f32
                            * self.sustain_db;
                        buffer[i] *=
                            self.attenuation * db_attenuation_to_gain(self.current_db + db_offset);
                        self.position += 1.0;
                        i += 1;
                        if i >= len {
                            return self.finished;
                        }
                    }
                    self.stage = EnvelopeStage::Sustain;
                }
                EnvelopeStage::Sustain => {
                    if self.can_end_on_silent_sustain && self.sustain_db >= PERCEIVED_DB_SILENCE {
                        self.finished = true;
                    }
                    let sustain_gain = db_attenuation_to_gain(self.sustain_db + db_offset);
                    while i < len {
                        self.smooth();
                        buffer[i] *= self.attenuation * sustain_gain;
                        self.current_db = self.sustain_db;
                        self.position += 1.0;
                        i += 1;
                    }
                    return self.finished;
                }
            }
        }
    }

    #[inline]
    fn smooth(&mut self) {
        self.attenuation += (self.attenuation_target_gain - self.attenuation) * SMOOTHING_FACTOR;
    }

    /// Current output level (linear), used to pick voices to kill.
    pub fn level(&self) -> f32 {
        if self.released {
            self.current_release_gain
        } else {
            self.attenuation * db_attenuation_to_gain(self.current_db)
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Release length in samples, after scaling by the release start level.
    pub fn release_samples(&self) -> f64 {
        self.release_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn generators(pairs: &[(G, i32)]) -> GeneratorSet {
        let mut set = GeneratorSet::default();
        set.set(G::DelayVolEnv, -32768);
        for &(ty, value) in pairs {
            set.set(ty, value);
        }
        set
    }

    fn run(env: &mut VolumeEnvelope, frames: usize) -> Vec<f32> {
        let mut buffer = vec![1.0; frames];
        env.apply(&mut buffer, 0.0);
        buffer
    }

    #[test]
    fn test_attack_ramps_up() {
        // 1 second attack
        let gens = generators(&[(G::AttackVolEnv, 0)]);
        let mut env = VolumeEnvelope::new(SR, &gens, 60);
        let out = run(&mut env, 22050);
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        assert!(out[0] < 0.001);
        assert!((out[22049] - 0.5).abs() < 0.01);
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_sustain_level() {
        // 20 dB sustain, instant attack and decay
        let gens = generators(&[
            (G::AttackVolEnv, -12000),
            (G::DecayVolEnv, -12000),
            (G::SustainVolEnv, 200),
        ]);
        let mut env = VolumeEnvelope::new(SR, &gens, 60);
        let out = run(&mut env, 4096);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((out[4095] - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_release_mid_attack_starts_from_current_level() {
        let gens = generators(&[(G::AttackVolEnv, 0), (G::ReleaseVolEnv, 0)]);
        let mut env = VolumeEnvelope::new(SR, &gens, 60);
        let before = run(&mut env, 11025);
        let level = *before.last().unwrap();

        env.start_release(&gens, 60);
        let after = run(&mut env, 64);
        // continues from ~0.25, not from the sustain level (1.0)
        assert!(after[0] <= level * 1.01);
        assert!(after[0] > level * 0.9);
    }

    #[test]
    fn test_release_finishes() {
        let gens = generators(&[(G::AttackVolEnv, -12000), (G::ReleaseVolEnv, -3600)]);
        let mut env = VolumeEnvelope::new(SR, &gens, 60);
        run(&mut env, 512);
        env.start_release(&gens, 60);
        let mut finished = false;
        for _ in 0..100 {
            let mut buffer = [1.0f32; 128];
            if env.apply(&mut buffer, 0.0) {
                finished = true;
                break;
            }
        }
        assert!(finished);
    }

    #[test]
    fn test_release_during_delay_is_silent() {
        let gens = generators(&[(G::DelayVolEnv, 0)]);
        let mut env = VolumeEnvelope::new(SR, &gens, 60);
        run(&mut env, 128);
        assert_eq!(env.stage(), EnvelopeStage::Delay);
        env.start_release(&gens, 60);
        assert!(env.is_finished());
    }

    #[test]
    fn test_attenuation_applied() {
        // 144 cB = 14.4 dB
        let gens = generators(&[(G::AttackVolEnv, -12000), (G::InitialAttenuation, 144)]);
        let mut env = VolumeEnvelope::new(SR, &gens, 60);
        let out = run(&mut env, 256);
        let expected = db_attenuation_to_gain(14.4);
        assert!((out[255] - expected).abs() < 1e-4);
    }
}
