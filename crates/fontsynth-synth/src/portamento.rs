//! Portamento (pitch glide) timing.
//!
//! CC5 (portamento time) is mapped to seconds through a sparse table of
//! measured hardware glide times, linearly interpolated between anchors.
//! The glide length then scales with the distance between the keys.
//!
//! # Example
//!
//! ```ignore
//! use fontsynth_synth::portamento::{glide_duration, Glide};
//!
//! // CC5 = 64, gliding from C4 to G4
//! let glide = Glide::new(60, glide_duration(64, 7));
//!
//! // In the render loop
//! let offset = glide.semitone_offset(67, elapsed_seconds);
//! ```

/// Semitone distance at which the table time applies unscaled.
pub const REFERENCE_DISTANCE: f64 = 30.0;

/// (CC5 value, seconds) anchors.
const ANCHORS: [(u8, f64); 15] = [
    (0, 0.000),
    (1, 0.006),
    (2, 0.023),
    (4, 0.050),
    (8, 0.110),
    (16, 0.250),
    (32, 0.500),
    (64, 2.060),
    (80, 4.200),
    (96, 8.400),
    (112, 19.500),
    (116, 26.700),
    (120, 40.000),
    (124, 80.000),
    (127, 480.000),
];

/// Base glide time in seconds for a CC5 value.
///
/// Values between anchors are linearly interpolated. A value with no
/// anchor on one side (anything above 127) yields 0.
pub fn portamento_seconds(time: u8) -> f64 {
    if let Some(&(_, seconds)) = ANCHORS.iter().find(|(value, _)| *value == time) {
        return seconds;
    }
    let lower = ANCHORS.iter().rev().find(|(value, _)| *value < time);
    let upper = ANCHORS.iter().find(|(value, _)| *value > time);
    match (lower, upper) {
        (Some(&(lo, lo_time)), Some(&(hi, hi_time))) => {
            lo_time + (f64::from(time - lo) * (hi_time - lo_time)) / f64::from(hi - lo)
        }
        _ => 0.0,
    }
}

/// Glide duration for a CC5 value over `distance` semitones.
#[inline]
pub fn glide_duration(time: u8, distance: u8) -> f64 {
    portamento_seconds(time) * (f64::from(distance) / REFERENCE_DISTANCE)
}

/// Per-voice glide from a previous key towards the voice's key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glide {
    /// Key the pitch starts from
    pub from_key: u8,
    /// Glide duration in seconds
    pub duration: f64,
}

impl Glide {
    pub fn new(from_key: u8, duration: f64) -> Self {
        Self { from_key, duration }
    }

    /// Progress (0.0 to 1.0) after `elapsed` seconds.
    #[inline]
    pub fn progress(&self, elapsed: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (elapsed / self.duration).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_complete(&self, elapsed: f64) -> bool {
        self.progress(elapsed) >= 1.0
    }

    /// Semitones still to travel towards `target_key`; subtracted from the
    /// voice pitch.
    #[inline]
    pub fn semitone_offset(&self, target_key: u8, elapsed: f64) -> f64 {
        let diff = f64::from(target_key) - f64::from(self.from_key);
        diff * (1.0 - self.progress(elapsed))
    }
}
