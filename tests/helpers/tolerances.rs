//! Numeric tolerances for audio assertions.

/// Exact operations (parameter round trips, unity gain)
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Table lookups and unit conversions
pub const DSP_EPSILON: f64 = 1e-4;

/// Peak level below which a block counts as silent (-80dB)
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Peak level above which a block counts as audible (-40dB)
pub const AUDIBLE_THRESHOLD: f32 = 0.01;
