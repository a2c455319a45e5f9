//! SoundFont unit conversions.
//!
//! Generators store times in timecents, frequencies in absolute cents and
//! attenuation in centibels. These helpers turn them into seconds, Hz and
//! linear gain.

/// Frequency of absolute cent 0 (MIDI key 0).
pub const ABS_CENTS_BASE_HZ: f64 = 8.176;

/// Convert timecents to seconds: `2^(tc / 1200)`.
#[inline]
pub fn timecents_to_seconds(timecents: f64) -> f64 {
    if timecents <= -32767.0 {
        return 0.0;
    }
    (timecents / 1200.0).exp2()
}

/// Convert absolute cents to Hz: `8.176 * 2^(cents / 1200)`.
#[inline]
pub fn abs_cents_to_hz(cents: f64) -> f64 {
    ABS_CENTS_BASE_HZ * (cents / 1200.0).exp2()
}

/// Convert a decibel attenuation (positive = quieter) to linear gain.
#[inline]
pub fn db_attenuation_to_gain(db: f32) -> f32 {
    10f32.powf(-db / 20.0)
}

/// Convert a linear gain to decibel attenuation.
#[inline]
pub fn gain_to_db_attenuation(gain: f32) -> f32 {
    -20.0 * gain.log10()
}

/// Convert cents to a frequency ratio.
#[inline]
pub fn cents_to_ratio(cents: f64) -> f64 {
    (cents / 1200.0).exp2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_timecents() {
        assert_relative_eq!(timecents_to_seconds(0.0), 1.0);
        assert_relative_eq!(timecents_to_seconds(1200.0), 2.0);
        assert_relative_eq!(timecents_to_seconds(-1200.0), 0.5);
        assert_eq!(timecents_to_seconds(-32768.0), 0.0);
    }

    #[test]
    fn test_abs_cents() {
        // 6900 absolute cents is A4
        assert_relative_eq!(abs_cents_to_hz(6900.0), 440.0, epsilon = 0.05);
        assert_relative_eq!(abs_cents_to_hz(0.0), ABS_CENTS_BASE_HZ);
    }

    #[test]
    fn test_gain_round_trip() {
        assert_relative_eq!(db_attenuation_to_gain(0.0), 1.0);
        assert_relative_eq!(db_attenuation_to_gain(20.0), 0.1, epsilon = 1e-6);
        assert_relative_eq!(gain_to_db_attenuation(0.5), 6.0206, epsilon = 1e-3);
    }
}
