//! Synthesizer configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Wavetable interpolation used by every voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Nearest sample, no interpolation
    Nearest,
    /// Linear interpolation between the two neighbouring samples
    #[default]
    Linear,
    /// 4-point Hermite interpolation
    Cubic,
}

/// Configuration for the synthesizer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Output sample rate in Hz
    pub sample_rate: f64,
    /// Frames per render block
    pub block_size: usize,
    /// Number of MIDI channels (16 per port)
    pub channel_count: usize,
    /// Maximum number of voices across all channels
    pub voice_cap: usize,
    pub interpolation: Interpolation,
    /// Channel that defaults to the drum bank
    pub drum_channel: usize,
    pub master_gain: f32,
    pub reverb_gain: f32,
    pub chorus_gain: f32,
    /// When false, nothing is written to the reverb/chorus send buffers
    pub effects_enabled: bool,
    /// Capacity of the control-to-render command queue
    pub command_queue_capacity: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 128,
            channel_count: 16,
            voice_cap: 350,
            interpolation: Interpolation::Linear,
            drum_channel: 9,
            master_gain: 1.0,
            reverb_gain: 1.0,
            chorus_gain: 1.0,
            effects_enabled: true,
            command_queue_capacity: 1024,
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} out of range (1-8192 frames)",
                self.block_size
            )));
        }
        if self.channel_count == 0 || self.channel_count > 256 {
            return Err(Error::InvalidConfig(format!(
                "channel_count {} out of range (1-256)",
                self.channel_count
            )));
        }
        if self.voice_cap == 0 || self.voice_cap > 4096 {
            return Err(Error::InvalidConfig(format!(
                "voice_cap {} out of range (1-4096)",
                self.voice_cap
            )));
        }
        if self.drum_channel >= self.channel_count {
            return Err(Error::InvalidConfig(format!(
                "drum_channel {} must be below channel_count {}",
                self.drum_channel, self.channel_count
            )));
        }
        for (name, gain) in [
            ("master_gain", self.master_gain),
            ("reverb_gain", self.reverb_gain),
            ("chorus_gain", self.chorus_gain),
        ] {
            if !(0.0..=10.0).contains(&gain) {
                return Err(Error::InvalidConfig(format!(
                    "{name} {gain} out of range (0.0-10.0)"
                )));
            }
        }
        if self.command_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "command_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Duration of one render block in seconds.
    #[inline]
    pub fn block_duration(&self) -> f64 {
        self.block_size as f64 / self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SynthConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.channel_count, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_sample_rate() {
        let config = SynthConfig {
            sample_rate: 1000.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_drum_channel_must_exist() {
        let config = SynthConfig {
            channel_count: 4,
            drum_channel: 9,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: SynthConfig =
            serde_json::from_str(r#"{ "sample_rate": 48000.0, "interpolation": "Cubic" }"#)
                .unwrap();
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.interpolation, Interpolation::Cubic);
        assert_eq!(config.block_size, 128);
    }

    #[test]
    fn test_block_duration() {
        let config = SynthConfig {
            sample_rate: 48000.0,
            block_size: 480,
            ..Default::default()
        };
        approx::assert_relative_eq!(config.block_duration(), 0.01);
    }
}
