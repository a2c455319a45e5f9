//! MIDI controller numbers and the per-channel controller table.
//!
//! The table holds the 128 CCs followed by the non-CC modulator sources
//! (channel pressure, pitch wheel, pitch wheel range) so modulators can
//! read any source by index. Every entry is stored as a 14-bit value.

use fontsynth_bank::source;

/// Index of the first non-CC modulator source in the table.
pub const NON_CC_INDEX_OFFSET: usize = 128;

/// 128 CCs plus the general modulator sources.
pub const CONTROLLER_TABLE_SIZE: usize = 147;

/// Portamento control value meaning "no previous key".
///
/// Real keys are stored shifted left by 7, so 1 never collides with one.
pub const PORTAMENTO_CONTROL_UNSET: u16 = 1;

/// MIDI controller numbers.
pub mod cc {
    pub const BANK_SELECT: u8 = 0;
    pub const MODULATION_WHEEL: u8 = 1;
    pub const PORTAMENTO_TIME: u8 = 5;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const MAIN_VOLUME: u8 = 7;
    pub const BALANCE: u8 = 8;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const EFFECT_CONTROL_2: u8 = 13;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const MODULATION_WHEEL_LSB: u8 = 33;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const MAIN_VOLUME_LSB: u8 = 39;
    pub const PAN_LSB: u8 = 42;
    pub const EFFECT_CONTROL_2_LSB: u8 = 45;
    pub const SUSTAIN_PEDAL: u8 = 64;
    pub const PORTAMENTO_ON_OFF: u8 = 65;
    pub const SOSTENUTO_PEDAL: u8 = 66;
    pub const SOFT_PEDAL: u8 = 67;
    pub const SOUND_VARIATION: u8 = 70;
    pub const FILTER_RESONANCE: u8 = 71;
    pub const RELEASE_TIME: u8 = 72;
    pub const ATTACK_TIME: u8 = 73;
    pub const BRIGHTNESS: u8 = 74;
    pub const DECAY_TIME: u8 = 75;
    pub const VIBRATO_RATE: u8 = 76;
    pub const VIBRATO_DEPTH: u8 = 77;
    pub const VIBRATO_DELAY: u8 = 78;
    pub const SOUND_CONTROLLER_10: u8 = 79;
    pub const GENERAL_PURPOSE_6: u8 = 81;
    pub const GENERAL_PURPOSE_8: u8 = 83;
    pub const PORTAMENTO_CONTROL: u8 = 84;
    pub const REVERB_DEPTH: u8 = 91;
    pub const TREMOLO_DEPTH: u8 = 92;
    pub const CHORUS_DEPTH: u8 = 93;
    pub const DETUNE_DEPTH: u8 = 94;
    pub const PHASER_DEPTH: u8 = 95;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const LOCAL_CONTROL: u8 = 122;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// Table index of a non-CC modulator source.
#[inline]
pub const fn source_index(source: u8) -> usize {
    NON_CC_INDEX_OFFSET + source as usize
}

const fn reset_values() -> [u16; CONTROLLER_TABLE_SIZE] {
    let mut table = [0u16; CONTROLLER_TABLE_SIZE];
    table[cc::MAIN_VOLUME as usize] = 100 << 7;
    table[cc::BALANCE as usize] = 64 << 7;
    table[cc::EXPRESSION as usize] = 127 << 7;
    table[cc::PAN as usize] = 64 << 7;
    table[cc::PORTAMENTO_ON_OFF as usize] = 127 << 7;
    table[cc::FILTER_RESONANCE as usize] = 64 << 7;
    table[cc::RELEASE_TIME as usize] = 64 << 7;
    table[cc::ATTACK_TIME as usize] = 64 << 7;
    table[cc::BRIGHTNESS as usize] = 64 << 7;
    table[cc::DECAY_TIME as usize] = 64 << 7;
    table[cc::VIBRATO_RATE as usize] = 64 << 7;
    table[cc::VIBRATO_DEPTH as usize] = 64 << 7;
    table[cc::VIBRATO_DELAY as usize] = 64 << 7;
    table[cc::GENERAL_PURPOSE_6 as usize] = 64 << 7;
    table[cc::GENERAL_PURPOSE_8 as usize] = 64 << 7;
    table[cc::RPN_LSB as usize] = 127 << 7;
    table[cc::RPN_MSB as usize] = 127 << 7;
    table[cc::NRPN_LSB as usize] = 127 << 7;
    table[cc::NRPN_MSB as usize] = 127 << 7;
    table[cc::PORTAMENTO_CONTROL as usize] = PORTAMENTO_CONTROL_UNSET;
    table[source_index(source::PITCH_WHEEL)] = 64 << 7;
    table[source_index(source::PITCH_WHEEL_RANGE)] = 2 << 7;
    table
}

/// Power-on value of every table entry.
pub const RESET_VALUES: [u16; CONTROLLER_TABLE_SIZE] = reset_values();

/// Controllers left untouched by CC121 (RP-15 reset all controllers).
pub fn survives_rp15_reset(controller: u8) -> bool {
    matches!(
        controller,
        cc::BANK_SELECT
            | cc::BANK_SELECT_LSB
            | cc::MAIN_VOLUME
            | cc::MAIN_VOLUME_LSB
            | cc::PAN
            | cc::PAN_LSB
            | cc::REVERB_DEPTH
            | cc::TREMOLO_DEPTH
            | cc::CHORUS_DEPTH
            | cc::DETUNE_DEPTH
            | cc::PHASER_DEPTH
    ) || (cc::SOUND_VARIATION..=cc::SOUND_CONTROLLER_10).contains(&controller)
}

/// 14-bit controller values of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerTable {
    values: [u16; CONTROLLER_TABLE_SIZE],
}

impl Default for ControllerTable {
    fn default() -> Self {
        Self {
            values: RESET_VALUES,
        }
    }
}

impl ControllerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw 14-bit value at a table index; 0 when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> u16 {
        self.values.get(index).copied().unwrap_or(0)
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u16) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value.min(0x3FFF);
        }
    }

    /// 7-bit value of a CC.
    #[inline]
    pub fn cc(&self, controller: u8) -> u8 {
        (self.get(controller as usize) >> 7) as u8
    }

    /// Store a 7-bit CC value in the upper bits.
    #[inline]
    pub fn set_cc(&mut self, controller: u8, value: u8) {
        self.set(controller as usize, u16::from(value & 0x7F) << 7);
    }

    /// Replace the low 7 bits of a CC (its LSB partner).
    #[inline]
    pub fn set_lsb(&mut self, controller: u8, value: u8) {
        let index = controller as usize;
        self.set(index, (self.get(index) & 0x3F80) | u16::from(value & 0x7F));
    }

    /// Raw value of a non-CC modulator source.
    #[inline]
    pub fn source(&self, source: u8) -> u16 {
        self.get(source_index(source))
    }

    #[inline]
    pub fn set_source(&mut self, source: u8, value: u16) {
        self.set(source_index(source), value);
    }

    /// Pitch wheel position, 8192 = center.
    #[inline]
    pub fn pitch_wheel(&self) -> u16 {
        self.source(source::PITCH_WHEEL)
    }

    /// Pitch wheel range in semitones, with the LSB as cents.
    pub fn pitch_wheel_range(&self) -> f32 {
        let raw = self.source(source::PITCH_WHEEL_RANGE);
        (raw >> 7) as f32 + (raw & 0x7F) as f32 / 100.0
    }

    /// Restore every entry for which `keep` returns `false`.
    pub fn reset_where(&mut self, mut keep: impl FnMut(usize) -> bool) {
        for (index, (value, reset)) in self.values.iter_mut().zip(RESET_VALUES).enumerate() {
            if !keep(index) {
                *value = reset;
            }
        }
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }
}

/// Channel tuning contributions in cents, plus the modulation depth scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTuning {
    /// RPN 1 fine tuning
    pub fine_cents: f32,
    /// Fractional part of a user transpose
    pub transpose_fine_cents: f32,
    /// Synth-wide master tuning
    pub master_cents: f32,
    /// RPN 2 coarse tuning
    pub coarse_semitones: f32,
    /// RPN 5 modulation depth as a multiple of 50 cents
    pub modulation_multiplier: f32,
}

impl Default for ChannelTuning {
    fn default() -> Self {
        Self {
            fine_cents: 0.0,
            transpose_fine_cents: 0.0,
            master_cents: 0.0,
            coarse_semitones: 0.0,
            modulation_multiplier: 1.0,
        }
    }
}

impl ChannelTuning {
    /// Total detune applied to every voice of the channel.
    #[inline]
    pub fn total_cents(&self) -> f32 {
        self.fine_cents + self.transpose_fine_cents + self.master_cents + self.coarse_semitones * 100.0
    }
}
