//! Sample headers and PCM data.

use std::sync::Arc;

/// Sample type bits from the `shdr` record.
pub mod sample_type {
    pub const MONO: u16 = 1;
    pub const RIGHT: u16 = 2;
    pub const LEFT: u16 = 4;
    pub const LINKED: u16 = 8;
    /// SF3 compressed data (not decoded by this crate)
    pub const COMPRESSED: u16 = 0x10;
    pub const ROM: u16 = 0x8000;
}

/// One mono PCM sample with its playback metadata.
///
/// Immutable after parsing. The PCM buffer is shared (`Arc`) by every voice
/// that plays it.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    /// PCM data normalized to [-1, 1]
    pub data: Arc<[f32]>,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// MIDI key at which the sample plays at its recorded pitch
    pub original_key: u8,
    /// Pitch correction in cents
    pub pitch_correction: i8,
    /// Loop start, relative to the start of `data`
    pub loop_start: u32,
    /// Loop end (exclusive), relative to the start of `data`
    pub loop_end: u32,
    pub link: u16,
    pub sample_type: u16,
}

impl Sample {
    /// Build a mono sample; the loop is disabled if it does not fit the data.
    pub fn new(
        name: impl Into<String>,
        data: impl Into<Arc<[f32]>>,
        sample_rate: u32,
        original_key: u8,
        loop_start: u32,
        loop_end: u32,
    ) -> Self {
        let mut sample = Self {
            name: name.into(),
            data: data.into(),
            sample_rate,
            original_key,
            pitch_correction: 0,
            loop_start,
            loop_end,
            link: 0,
            sample_type: sample_type::MONO,
        };
        sample.sanitize_loop();
        sample
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the sample loop spans at least one frame.
    #[inline]
    pub fn has_loop(&self) -> bool {
        self.loop_end > self.loop_start
    }

    /// Whether voices can be built from this sample.
    pub fn is_playable(&self) -> bool {
        !self.data.is_empty()
            && self.sample_rate > 0
            && self.sample_type & (sample_type::ROM | sample_type::COMPRESSED) == 0
    }

    /// Disable the loop when it is inverted or outside the data.
    ///
    /// Returns `true` if the loop had to be disabled.
    pub fn sanitize_loop(&mut self) -> bool {
        let len = self.data.len() as u32;
        let valid = self.loop_end >= self.loop_start && self.loop_end <= len;
        if !valid {
            self.loop_start = 0;
            self.loop_end = 0;
        }
        !valid
    }
}
