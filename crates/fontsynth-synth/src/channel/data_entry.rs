//! RPN and NRPN data entry.
//!
//! CC101/100 select a registered parameter, CC99/98 a non-registered one;
//! CC6 (coarse) and CC38 (fine) then write it. Supported parameters:
//!
//! | Parameter | Meaning |
//! |-----------|---------|
//! | RPN 0 | pitch bend range (MSB semitones, LSB cents) |
//! | RPN 1 | fine tuning, 14-bit, centered at 8192 = ±100 cents |
//! | RPN 2 | coarse tuning in semitones around 64 |
//! | RPN 5 | modulation depth (MSB semitones, LSB fraction) |
//! | RPN 0x3FFF | null: return to idle |
//! | NRPN 01 08/09/0A | GS vibrato rate, depth, delay |
//! | NRPN 01 20/64/66 | GS cutoff, attack, release (as CC74/73/72) |
//! | NRPN 1D xx | GS drum reverb (as CC91) |

use super::Channel;
use crate::controllers::cc;
use crate::events::SynthEvent;
use crate::voice::ChannelVibrato;
use fontsynth_bank::source;
use tracing::{debug, warn};

/// Which parameter selector was received last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataEntryState {
    #[default]
    Idle,
    RpCoarse,
    RpFine,
    NrpCoarse,
    NrpFine,
}

const RPN_PITCH_BEND_RANGE: u16 = 0x0000;
const RPN_FINE_TUNING: u16 = 0x0001;
const RPN_COARSE_TUNING: u16 = 0x0002;
const RPN_MODULATION_DEPTH: u16 = 0x0005;
const RPN_NULL: u16 = 0x3FFF;

const NRPN_PART_PARAMETER: u8 = 0x01;
const NRPN_DRUM_REVERB: u8 = 0x1D;
const NRPN_VIBRATO_RATE: u8 = 0x08;
const NRPN_VIBRATO_DEPTH: u8 = 0x09;
const NRPN_VIBRATO_DELAY: u8 = 0x0A;
const NRPN_FILTER_CUTOFF: u8 = 0x20;
const NRPN_ATTACK_TIME: u8 = 0x64;
const NRPN_RELEASE_TIME: u8 = 0x66;

/// GS NRPN data value meaning "no change".
const NRPN_DEFAULT_VALUE: u8 = 64;

impl Channel {
    fn selected_rpn(&self) -> u16 {
        (u16::from(self.controllers.cc(cc::RPN_MSB)) << 7) | u16::from(self.controllers.cc(cc::RPN_LSB))
    }

    pub fn data_entry_state(&self) -> DataEntryState {
        self.data_entry
    }

    /// Store a controller on behalf of an NRPN and announce it.
    fn set_controller_from_nrpn(&mut self, controller: u8, value: u8) {
        if self.locked_controllers[controller as usize] {
            return;
        }
        self.controllers.set_cc(controller, value);
        self.emit(SynthEvent::ControllerChange {
            channel: self.index,
            controller,
            value,
        });
    }

    fn update_vibrato(&mut self, apply: impl FnOnce(&mut ChannelVibrato)) {
        if self.vibrato.is_unset() {
            self.vibrato = ChannelVibrato::GS_DEFAULT;
        }
        apply(&mut self.vibrato);
    }

    /// CC6.
    pub(crate) fn data_entry_coarse(&mut self, value: u8) {
        match self.data_entry {
            DataEntryState::Idle | DataEntryState::NrpCoarse => {}
            DataEntryState::NrpFine => {
                if self.lock_gs_nrpn {
                    return;
                }
                let (msb, lsb) = (
                    self.controllers.cc(cc::NRPN_MSB),
                    self.controllers.cc(cc::NRPN_LSB),
                );
                match (msb, lsb) {
                    (NRPN_PART_PARAMETER, NRPN_VIBRATO_RATE) => {
                        if value != NRPN_DEFAULT_VALUE {
                            self.update_vibrato(|v| v.rate = f64::from(value) / 64.0 * 8.0);
                        }
                    }
                    (NRPN_PART_PARAMETER, NRPN_VIBRATO_DEPTH) => {
                        if value != NRPN_DEFAULT_VALUE {
                            self.update_vibrato(|v| v.depth = f64::from(value) / 2.0);
                        }
                    }
                    (NRPN_PART_PARAMETER, NRPN_VIBRATO_DELAY) => {
                        if value != NRPN_DEFAULT_VALUE {
                            self.update_vibrato(|v| v.delay = f64::from(value) / 64.0 / 3.0);
                        }
                    }
                    (NRPN_PART_PARAMETER, NRPN_FILTER_CUTOFF) => {
                        self.set_controller_from_nrpn(cc::BRIGHTNESS, value)
                    }
                    (NRPN_PART_PARAMETER, NRPN_ATTACK_TIME) => {
                        self.set_controller_from_nrpn(cc::ATTACK_TIME, value)
                    }
                    (NRPN_PART_PARAMETER, NRPN_RELEASE_TIME) => {
                        self.set_controller_from_nrpn(cc::RELEASE_TIME, value)
                    }
                    (NRPN_DRUM_REVERB, _) => self.set_controller_from_nrpn(cc::REVERB_DEPTH, value),
                    _ => {
                        if value != NRPN_DEFAULT_VALUE {
                            warn!(
                                "Channel {}: unrecognized NRPN {:#04x} {:#04x} = {}",
                                self.index, msb, lsb, value
                            );
                        }
                    }
                }
            }
            DataEntryState::RpCoarse | DataEntryState::RpFine => match self.selected_rpn() {
                RPN_PITCH_BEND_RANGE => {
                    self.controllers
                        .set_source(source::PITCH_WHEEL_RANGE, u16::from(value) << 7);
                    debug!("Channel {} bend range {} semitones", self.index, value);
                }
                RPN_FINE_TUNING => {
                    self.fine_tuning_raw = (u16::from(value) << 7) | (self.fine_tuning_raw & 0x7F);
                    self.apply_fine_tuning();
                }
                RPN_COARSE_TUNING => {
                    self.tuning.coarse_semitones = f32::from(value) - 64.0;
                    debug!(
                        "Channel {} coarse tuning {} semitones",
                        self.index, self.tuning.coarse_semitones
                    );
                }
                RPN_MODULATION_DEPTH => self.set_modulation_depth(f32::from(value) * 100.0),
                RPN_NULL => self.reset_parameters(),
                other => warn!(
                    "Channel {}: unrecognized RPN {:#06x} = {}",
                    self.index, other, value
                ),
            },
        }
    }

    /// CC38.
    pub(crate) fn data_entry_fine(&mut self, value: u8) {
        if !matches!(
            self.data_entry,
            DataEntryState::RpCoarse | DataEntryState::RpFine
        ) {
            return;
        }
        match self.selected_rpn() {
            RPN_PITCH_BEND_RANGE => {
                if value != 0 {
                    let range = self.controllers.source(source::PITCH_WHEEL_RANGE);
                    self.controllers.set_source(
                        source::PITCH_WHEEL_RANGE,
                        (range & 0x3F80) | u16::from(value),
                    );
                }
            }
            RPN_FINE_TUNING => {
                self.fine_tuning_raw = (self.fine_tuning_raw & 0x3F80) | u16::from(value);
                self.apply_fine_tuning();
            }
            RPN_MODULATION_DEPTH => {
                let cents = self.tuning.modulation_multiplier * 50.0 + f32::from(value) / 128.0 * 100.0;
                self.set_modulation_depth(cents);
            }
            RPN_NULL => self.reset_parameters(),
            _ => {}
        }
    }

    fn apply_fine_tuning(&mut self) {
        self.tuning.fine_cents = (f32::from(self.fine_tuning_raw) - 8192.0) * 100.0 / 8192.0;
        debug!("Channel {} fine tuning {} cents", self.index, self.tuning.fine_cents);
    }

    /// Return the parameter state machine to idle.
    pub fn reset_parameters(&mut self) {
        self.data_entry = DataEntryState::Idle;
    }
}
