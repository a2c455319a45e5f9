//! Sample playback: cursor advance, loop wrap and interpolation.

use fontsynth_core::Interpolation;
use std::sync::Arc;

/// `sampleModes` generator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    None,
    Continuous,
    /// Silent until the key is released, then plays unlooped
    StartOnRelease,
    /// Loops while the key is held, then plays out the tail
    UntilRelease,
}

impl LoopMode {
    pub fn from_generator(value: i32) -> Self {
        match value {
            1 => LoopMode::Continuous,
            2 => LoopMode::StartOnRelease,
            3 => LoopMode::UntilRelease,
            _ => LoopMode::None,
        }
    }

    #[inline]
    pub fn loops(self) -> bool {
        matches!(self, LoopMode::Continuous | LoopMode::UntilRelease)
    }
}

/// Read position into one sample's PCM data.
///
/// Positions are in frames of the source data. `end` is the last readable
/// frame; the loop is `[loop_start, loop_end)`.
#[derive(Debug, Clone)]
pub struct SampleCursor {
    data: Arc<[f32]>,
    pub position: f64,
    /// Source frames per output frame at the root pitch
    pub step: f64,
    pub end: f64,
    pub loop_start: f64,
    pub loop_end: f64,
    pub looping: bool,
    pub mode: LoopMode,
}

impl SampleCursor {
    pub fn new(data: Arc<[f32]>, step: f64, mode: LoopMode) -> Self {
        let end = data.len().saturating_sub(1) as f64;
        Self {
            data,
            position: 0.0,
            step,
            end,
            loop_start: 0.0,
            loop_end: 0.0,
            looping: mode.loops(),
            mode,
        }
    }

    #[inline]
    fn loop_length(&self) -> f64 {
        self.loop_end - self.loop_start
    }

    /// Wrap a position past `loop_end` back into the loop.
    #[inline]
    pub fn wrap(&self, position: f64) -> f64 {
        let length = self.loop_length();
        if position >= self.loop_end && length > 0.0 {
            self.loop_start + (position - self.loop_start) % length
        } else {
            position
        }
    }

    #[inline]
    fn frame(&self, index: i64) -> f32 {
        let index = if self.looping && index >= self.loop_end as i64 {
            let length = self.loop_length() as i64;
            if length > 0 {
                self.loop_start as i64 + (index - self.loop_start as i64) % length
            } else {
                index
            }
        } else {
            index
        };
        if index < 0 {
            return 0.0;
        }
        self.data.get(index as usize).copied().unwrap_or(0.0)
    }

    #[inline]
    fn read(&self, position: f64, interpolation: Interpolation) -> f32 {
        let floor = position.floor();
        let index = floor as i64;
        let fraction = (position - floor) as f32;
        match interpolation {
            Interpolation::Nearest => self.frame(position.round() as i64),
            Interpolation::Linear => {
                let a = self.frame(index);
                let b = self.frame(index + 1);
                a + (b - a) * fraction
            }
            Interpolation::Cubic => {
                let xm1 = self.frame(index - 1);
                let x0 = self.frame(index);
                let x1 = self.frame(index + 1);
                let x2 = self.frame(index + 2);
                let c1 = 0.5 * (x1 - xm1);
                let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
                let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);
                ((c3 * fraction + c2) * fraction + c1) * fraction + x0
            }
        }
    }

    /// Fill `out` at `ratio` times the root step.
    ///
    /// Returns `true` when an unlooped sample ran off its end; the rest of
    /// `out` is zeroed.
    pub fn fill(
        &mut self,
        out: &mut [f32],
        ratio: f64,
        interpolation: Interpolation,
        released: bool,
    ) -> bool {
        if self.mode == LoopMode::StartOnRelease && !released {
            out.fill(0.0);
            return false;
        }
        let increment = self.step * ratio;

        if self.looping && self.loop_length() > 0.0 {
            for sample in out.iter_mut() {
                self.position = self.wrap(self.position);
                *sample = self.read(self.position, interpolation);
                self.position += increment;
            }
            return false;
        }

        for (i, sample) in out.iter_mut().enumerate() {
            let ceil = self.position.floor() + 1.0;
            if ceil >= self.end {
                out[i..].fill(0.0);
                return true;
            }
            *sample = self.read(self.position, interpolation);
            self.position += increment;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Arc<[f32]> {
        (0..len).map(|i| i as f32).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_loop_mode_from_generator() {
        assert_eq!(LoopMode::from_generator(0), LoopMode::None);
        assert_eq!(LoopMode::from_generator(3), LoopMode::UntilRelease);
        assert!(LoopMode::Continuous.loops());
        assert!(!LoopMode::StartOnRelease.loops());
    }

    #[test]
    fn test_linear_interpolation() {
        let mut cursor = SampleCursor::new(ramp(16), 1.0, LoopMode::None);
        let mut out = [0.0; 4];
        cursor.fill(&mut out, 0.5, Interpolation::Linear, false);
        assert_eq!(out, [0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_unlooped_end_finishes() {
        let mut cursor = SampleCursor::new(ramp(8), 1.0, LoopMode::None);
        let mut out = [9.0; 16];
        assert!(cursor.fill(&mut out, 1.0, Interpolation::Linear, false));
        assert_eq!(out[0], 0.0);
        assert_eq!(out[5], 5.0);
        assert!(out[6..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_loop_wrap_idempotent() {
        let mut cursor = SampleCursor::new(ramp(32), 1.0, LoopMode::Continuous);
        cursor.loop_start = 8.0;
        cursor.loop_end = 16.0;
        for position in [16.0, 17.5, 30.25, 100.0] {
            let once = cursor.wrap(position);
            assert!((8.0..16.0).contains(&once));
            assert_eq!(cursor.wrap(once), once);
        }
        assert_eq!(cursor.wrap(12.0), 12.0);
    }

    #[test]
    fn test_looping_never_finishes() {
        let mut cursor = SampleCursor::new(ramp(32), 1.0, LoopMode::Continuous);
        cursor.loop_start = 8.0;
        cursor.loop_end = 16.0;
        let mut out = [0.0; 64];
        assert!(!cursor.fill(&mut out, 1.0, Interpolation::Nearest, false));
        assert!(out[20..].iter().all(|&s| (8.0..16.0).contains(&s)));
        assert!(cursor.position < 17.0);
    }

    #[test]
    fn test_start_on_release_silent_while_held() {
        let mut cursor = SampleCursor::new(ramp(32), 1.0, LoopMode::StartOnRelease);
        let mut out = [1.0; 8];
        cursor.fill(&mut out, 1.0, Interpolation::Linear, false);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(cursor.position, 0.0);
        cursor.fill(&mut out, 1.0, Interpolation::Linear, true);
        assert_eq!(out[3], 3.0);
    }

    #[test]
    fn test_cubic_passes_through_frames() {
        let mut cursor = SampleCursor::new(ramp(16), 1.0, LoopMode::None);
        cursor.position = 4.0;
        let mut out = [0.0; 3];
        cursor.fill(&mut out, 1.0, Interpolation::Cubic, false);
        assert_eq!(out, [4.0, 5.0, 6.0]);
    }
}
