//! Output buffers of the block mixer.

use std::ops::Range;

/// A pair of planar channel buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    pub fn new(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Grow or shrink to `frames`, zeroing new frames.
    pub fn resize(&mut self, frames: usize) {
        self.left.resize(frames, 0.0);
        self.right.resize(frames, 0.0);
    }

    pub fn slices_mut(&mut self, range: Range<usize>) -> (&mut [f32], &mut [f32]) {
        (&mut self.left[range.clone()], &mut self.right[range])
    }

    /// Hard-limit `range` to `[-1, 1]`.
    pub fn limit(&mut self, range: Range<usize>) {
        let (left, right) = self.slices_mut(range);
        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Largest absolute sample on either side.
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

/// Dry output plus the reverb and chorus sends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBlock {
    pub dry: StereoBuffer,
    pub reverb: StereoBuffer,
    pub chorus: StereoBuffer,
}

impl StereoBlock {
    pub fn new(frames: usize) -> Self {
        Self {
            dry: StereoBuffer::new(frames),
            reverb: StereoBuffer::new(frames),
            chorus: StereoBuffer::new(frames),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dry.len().min(self.reverb.len()).min(self.chorus.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.dry.clear();
        self.reverb.clear();
        self.chorus.clear();
    }

    pub fn resize(&mut self, frames: usize) {
        self.dry.resize(frames);
        self.reverb.resize(frames);
        self.chorus.resize(frames);
    }

    /// Hard-limit `range` of the dry signal and both sends.
    pub fn limit(&mut self, range: Range<usize>) {
        self.dry.limit(range.clone());
        self.reverb.limit(range.clone());
        self.chorus.limit(range);
    }

    /// Mix destination over `range` of every buffer.
    pub fn bus(&mut self, range: Range<usize>) -> MixBus<'_> {
        let (dry_left, dry_right) = self.dry.slices_mut(range.clone());
        let (reverb_left, reverb_right) = self.reverb.slices_mut(range.clone());
        let (chorus_left, chorus_right) = self.chorus.slices_mut(range);
        MixBus {
            dry_left,
            dry_right,
            reverb_left,
            reverb_right,
            chorus_left,
            chorus_right,
        }
    }

    /// Like [`bus`](Self::bus), with the dry signal going to `dry` instead.
    pub fn bus_with_dry<'a>(
        &'a mut self,
        dry: &'a mut StereoBuffer,
        range: Range<usize>,
    ) -> MixBus<'a> {
        let (dry_left, dry_right) = dry.slices_mut(range.clone());
        let (reverb_left, reverb_right) = self.reverb.slices_mut(range.clone());
        let (chorus_left, chorus_right) = self.chorus.slices_mut(range);
        MixBus {
            dry_left,
            dry_right,
            reverb_left,
            reverb_right,
            chorus_left,
            chorus_right,
        }
    }
}

/// Borrowed slices voices accumulate into. All slices have the same length.
pub struct MixBus<'a> {
    pub dry_left: &'a mut [f32],
    pub dry_right: &'a mut [f32],
    pub reverb_left: &'a mut [f32],
    pub reverb_right: &'a mut [f32],
    pub chorus_left: &'a mut [f32],
    pub chorus_right: &'a mut [f32],
}

/// Synth-wide gains applied while mixing a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixGains {
    /// Master gain times the sysex master volume
    pub master: f32,
    pub reverb: f32,
    pub chorus: f32,
    /// Write the effect sends at all
    pub effects: bool,
}

impl Default for MixGains {
    fn default() -> Self {
        Self {
            master: 1.0,
            reverb: 1.0,
            chorus: 1.0,
            effects: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_covers_range() {
        let mut block = StereoBlock::new(8);
        {
            let bus = block.bus(2..5);
            bus.dry_left.fill(1.0);
            bus.chorus_right.fill(0.5);
        }
        assert_eq!(block.dry.left, [0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(block.chorus.right[4], 0.5);
        assert_eq!(block.dry.peak(), 1.0);
        block.clear();
        assert_eq!(block.dry.peak(), 0.0);
    }

    #[test]
    fn test_split_dry() {
        let mut block = StereoBlock::new(4);
        let mut channel = StereoBuffer::new(4);
        {
            let bus = block.bus_with_dry(&mut channel, 0..4);
            bus.dry_right.fill(0.25);
            bus.reverb_left.fill(0.1);
        }
        assert_eq!(channel.right, vec![0.25; 4]);
        assert!(block.dry.right.iter().all(|&s| s == 0.0));
        assert_eq!(block.reverb.left, vec![0.1; 4]);
    }

    #[test]
    fn test_limit_only_touches_range() {
        let mut block = StereoBlock::new(4);
        block.dry.left.copy_from_slice(&[3.0, -2.5, 0.5, 4.0]);
        block.reverb.right.fill(-1.5);
        block.limit(0..3);
        assert_eq!(block.dry.left, [1.0, -1.0, 0.5, 4.0]);
        assert_eq!(block.reverb.right, [-1.0, -1.0, -1.0, -1.5]);
    }
}
