//! Resonant biquad lowpass driven by `initialFilterFc` / `initialFilterQ`.

use fontsynth_core::units::{abs_cents_to_hz, db_attenuation_to_gain};
use std::f64::consts::PI;

/// Cutoff (absolute cents) at or above which the filter may be bypassed.
const BYPASS_CUTOFF: f64 = 13500.0;
const CUTOFF_SMOOTHING: f64 = 0.1;
/// Minimum target change (cents) that triggers new coefficients.
const RECALC_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct LowpassFilter {
    coefficients: [f64; 5],
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    resonance_cb: i32,
    current_cutoff: f64,
    last_target: f64,
    initialized: bool,
    bypassed: bool,
}

impl LowpassFilter {
    pub fn new() -> Self {
        Self {
            last_target: f64::NAN,
            ..Default::default()
        }
    }

    /// Filter `buffer` in place.
    ///
    /// `initial_fc` is the generator cutoff in absolute cents, `q_cb` the
    /// resonance in centibels and `excursion` the LFO/envelope offset in cents.
    pub fn process(
        &mut self,
        buffer: &mut [f32],
        initial_fc: i32,
        q_cb: i32,
        excursion: f64,
        sample_rate: f64,
    ) {
        let initial_fc = f64::from(initial_fc);
        if self.initialized {
            self.current_cutoff += (initial_fc - self.current_cutoff) * CUTOFF_SMOOTHING;
        } else {
            self.current_cutoff = initial_fc;
            self.initialized = true;
        }

        let target = self.current_cutoff + excursion;
        if self.current_cutoff > BYPASS_CUTOFF - 1.0 && target > BYPASS_CUTOFF - 1.0 && q_cb == 0
        {
            self.current_cutoff = BYPASS_CUTOFF;
            self.bypassed = true;
            return;
        }
        self.bypassed = false;

        if (self.last_target - target).abs() > RECALC_THRESHOLD
            || self.resonance_cb != q_cb
            || self.last_target.is_nan()
        {
            self.last_target = target;
            self.resonance_cb = q_cb;
            self.calculate_coefficients(target, sample_rate);
        }

        let [c0, c1, c2, c3, c4] = self.coefficients;
        for sample in buffer.iter_mut() {
            let x = f64::from(*sample);
            let y = c0 * x + c1 * self.x1 + c2 * self.x2 - c3 * self.y1 - c4 * self.y2;
            self.x2 = self.x1;
            self.x1 = x;
            self.y2 = self.y1;
            self.y1 = y;
            *sample = y as f32;
        }
    }

    fn calculate_coefficients(&mut self, cutoff_cents: f64, sample_rate: f64) {
        let cutoff_hz = abs_cents_to_hz(cutoff_cents.floor()).min(sample_rate * 0.45);
        let q_db = self.resonance_cb as f32 / 10.0;
        let resonance_gain = f64::from(db_attenuation_to_gain(-(q_db - 3.01)));
        let q_gain = 1.0 / f64::from(db_attenuation_to_gain(-q_db)).sqrt();

        let w = 2.0 * PI * cutoff_hz / sample_rate;
        let cos_w = w.cos();
        let alpha = w.sin() / (2.0 * resonance_gain);

        let b1 = (1.0 - cos_w) * q_gain;
        let b0 = b1 / 2.0;
        let b2 = b0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w;
        let a2 = 1.0 - alpha;

        self.coefficients = [b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0];
    }

    /// Whether the last call skipped filtering.
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn sine(freq: f64, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f64 / SR).sin() as f32)
            .collect()
    }

    fn peak(buffer: &[f32]) -> f32 {
        buffer.iter().fold(0.0, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_open_filter_is_bypassed() {
        let mut filter = LowpassFilter::new();
        let mut buffer = sine(5000.0, 256);
        let original = buffer.clone();
        filter.process(&mut buffer, 13500, 0, 0.0, SR);
        assert!(filter.is_bypassed());
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_low_cutoff_attenuates_highs() {
        let mut filter = LowpassFilter::new();
        // 6000 absolute cents ~ 262 Hz
        let mut highs = sine(8000.0, 4096);
        filter.process(&mut highs, 6000, 0, 0.0, SR);
        assert!(!filter.is_bypassed());
        assert!(peak(&highs[2048..]) < 0.05);

        let mut filter = LowpassFilter::new();
        let mut lows = sine(50.0, 4096);
        filter.process(&mut lows, 6000, 0, 0.0, SR);
        assert!(peak(&lows[2048..]) > 0.8);
    }

    #[test]
    fn test_resonance_disables_bypass() {
        let mut filter = LowpassFilter::new();
        let mut buffer = sine(1000.0, 128);
        filter.process(&mut buffer, 13500, 100, 0.0, SR);
        assert!(!filter.is_bypassed());
    }
}
