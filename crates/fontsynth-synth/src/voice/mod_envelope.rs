//! Modulation envelope, evaluated from absolute time in seconds.

use fontsynth_bank::{curve_value, CurveType, GeneratorSet, GeneratorType as G};
use fontsynth_core::units::timecents_to_seconds;

/// Envelope routed to pitch and filter cutoff. Output is in [0, 1].
#[derive(Debug, Clone, Default)]
pub struct ModulationEnvelope {
    attack_duration: f64,
    decay_duration: f64,
    release_duration: f64,
    sustain_level: f64,
    delay_end: f64,
    attack_end: f64,
    hold_end: f64,
    decay_end: f64,
    release_start_level: f64,
}

impl ModulationEnvelope {
    pub fn new(generators: &GeneratorSet, key: u8, start_time: f64) -> Self {
        let mut env = Self::default();
        env.recalculate(generators, key, start_time, None);
        env
    }

    /// Recompute stage boundaries. With `release_time` set, the release
    /// starts from the level the envelope had at that moment.
    pub fn recalculate(
        &mut self,
        generators: &GeneratorSet,
        key: u8,
        start_time: f64,
        release_time: Option<f64>,
    ) {
        let tc = |ty: G| timecents_to_seconds(f64::from(generators[ty]));
        let key_offset = 60.0 - f64::from(key);

        self.sustain_level = 1.0 - f64::from(generators[G::SustainModEnv]) / 1000.0;
        self.attack_duration = tc(G::AttackModEnv);
        let decay_tc = f64::from(generators[G::DecayModEnv])
            + key_offset * f64::from(generators[G::KeyNumToModEnvDecay]);
        self.decay_duration = timecents_to_seconds(decay_tc) * (1.0 - self.sustain_level);
        let hold_tc = f64::from(generators[G::HoldModEnv])
            + key_offset * f64::from(generators[G::KeyNumToModEnvHold]);
        let hold_duration = timecents_to_seconds(hold_tc);

        self.delay_end = start_time + tc(G::DelayModEnv);
        self.attack_end = self.delay_end + self.attack_duration;
        self.hold_end = self.attack_end + hold_duration;
        self.decay_end = self.hold_end + self.decay_duration;

        if let Some(at) = release_time {
            self.release_start_level = self.level_at(at);
        }
        self.release_duration = tc(G::ReleaseModEnv) * self.release_start_level;
    }

    /// Level at `now` ignoring any release.
    fn level_at(&self, now: f64) -> f64 {
        if now < self.delay_end {
            0.0
        } else if now < self.attack_end {
            let progress = 1.0 - (self.attack_end - now) / self.attack_duration;
            f64::from(curve_value(CurveType::Convex, false, false, progress as f32))
        } else if now < self.hold_end {
            1.0
        } else if now < self.decay_end {
            1.0 - (1.0 - (self.decay_end - now) / self.decay_duration) * (1.0 - self.sustain_level)
        } else {
            self.sustain_level
        }
    }

    pub fn value(&self, now: f64, release_time: Option<f64>) -> f64 {
        match release_time {
            Some(at) => {
                if self.release_start_level == 0.0 || self.release_duration <= 0.0 {
                    return 0.0;
                }
                let progress = (now - at) / self.release_duration;
                ((1.0 - progress) * self.release_start_level).max(0.0)
            }
            None => self.level_at(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn generators(pairs: &[(G, i32)]) -> GeneratorSet {
        let mut set = GeneratorSet::default();
        set.set(G::DelayModEnv, -32768);
        for &(ty, value) in pairs {
            set.set(ty, value);
        }
        set
    }

    #[test]
    fn test_stages() {
        // 1 s attack, 1 s hold, sustain 0.5
        let gens = generators(&[
            (G::AttackModEnv, 0),
            (G::HoldModEnv, 0),
            (G::DecayModEnv, 0),
            (G::SustainModEnv, 500),
        ]);
        let env = ModulationEnvelope::new(&gens, 60, 0.0);
        assert_abs_diff_eq!(env.value(0.0, None), 0.0);
        assert!(env.value(0.5, None) > 0.5, "convex attack rises fast");
        assert_abs_diff_eq!(env.value(1.5, None), 1.0);
        assert_abs_diff_eq!(env.value(10.0, None), 0.5);
    }

    #[test]
    fn test_release_from_current_level() {
        let gens = generators(&[
            (G::AttackModEnv, -12000),
            (G::HoldModEnv, -12000),
            (G::DecayModEnv, -12000),
            (G::SustainModEnv, 500),
            (G::ReleaseModEnv, 0),
        ]);
        let mut env = ModulationEnvelope::new(&gens, 60, 0.0);
        env.recalculate(&gens, 60, 0.0, Some(2.0));
        // starts at 0.5, falls over 0.5 s
        assert_abs_diff_eq!(env.value(2.0, Some(2.0)), 0.5);
        assert_abs_diff_eq!(env.value(2.25, Some(2.0)), 0.25, epsilon = 1e-9);
        assert_eq!(env.value(3.0, Some(2.0)), 0.0);
    }

    #[test]
    fn test_release_of_silent_envelope() {
        let gens = generators(&[(G::DelayModEnv, 1200)]);
        let mut env = ModulationEnvelope::new(&gens, 60, 0.0);
        env.recalculate(&gens, 60, 0.0, Some(0.5));
        assert_eq!(env.value(0.6, Some(0.5)), 0.0);
    }
}
