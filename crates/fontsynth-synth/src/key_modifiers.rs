//! Per-key overrides: velocity, gain and patch for single keys of a channel.

use std::collections::HashMap;

/// Overrides applied to one key of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyModifier {
    /// Fixed velocity for this key
    pub velocity: Option<u8>,
    /// (bank, program) played instead of the channel's preset
    pub patch: Option<(u16, u16)>,
    /// Linear gain multiplier
    pub gain: f32,
}

impl Default for KeyModifier {
    fn default() -> Self {
        Self {
            velocity: None,
            patch: None,
            gain: 1.0,
        }
    }
}

impl KeyModifier {
    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = Some(velocity.min(127));
        self
    }

    pub fn with_patch(mut self, bank: u16, program: u16) -> Self {
        self.patch = Some((bank, program));
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }
}

/// Key modifiers of every channel.
#[derive(Debug, Clone, Default)]
pub struct KeyModifierManager {
    mappings: HashMap<(usize, u8), KeyModifier>,
}

impl KeyModifierManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mapping(&mut self, channel: usize, key: u8, modifier: KeyModifier) {
        self.mappings.insert((channel, key), modifier);
    }

    pub fn delete_mapping(&mut self, channel: usize, key: u8) -> Option<KeyModifier> {
        self.mappings.remove(&(channel, key))
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    pub fn get(&self, channel: usize, key: u8) -> Option<&KeyModifier> {
        self.mappings.get(&(channel, key))
    }

    #[inline]
    pub fn velocity(&self, channel: usize, key: u8) -> Option<u8> {
        self.get(channel, key).and_then(|m| m.velocity)
    }

    #[inline]
    pub fn gain(&self, channel: usize, key: u8) -> f32 {
        self.get(channel, key).map_or(1.0, |m| m.gain)
    }

    #[inline]
    pub fn patch(&self, channel: usize, key: u8) -> Option<(u16, u16)> {
        self.get(channel, key).and_then(|m| m.patch)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_key_defaults() {
        let manager = KeyModifierManager::new();
        assert_eq!(manager.velocity(0, 60), None);
        assert_eq!(manager.gain(0, 60), 1.0);
        assert_eq!(manager.patch(0, 60), None);
    }

    #[test]
    fn test_mapping_lifecycle() {
        let mut manager = KeyModifierManager::new();
        manager.add_mapping(
            9,
            36,
            KeyModifier::default().with_velocity(200).with_gain(0.5),
        );
        manager.add_mapping(0, 60, KeyModifier::default().with_patch(8, 4));

        assert_eq!(manager.velocity(9, 36), Some(127));
        assert_eq!(manager.gain(9, 36), 0.5);
        assert_eq!(manager.patch(0, 60), Some((8, 4)));
        // other channel, same key
        assert_eq!(manager.velocity(0, 36), None);

        assert!(manager.delete_mapping(9, 36).is_some());
        assert_eq!(manager.gain(9, 36), 1.0);
        manager.clear();
        assert!(manager.is_empty());
    }
}
