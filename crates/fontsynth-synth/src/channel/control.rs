//! Control change handling and controller resets.

use super::{Channel, DataEntryState};
use crate::controllers::{cc, source_index, survives_rp15_reset, PORTAMENTO_CONTROL_UNSET,
    RESET_VALUES};
use crate::events::SynthEvent;
use crate::voice::ChannelVibrato;
use fontsynth_bank::source;
use tracing::debug;

impl Channel {
    /// Apply a control change.
    pub fn controller_change(&mut self, controller: u8, value: u8, now: f64) {
        if controller > 127 {
            return;
        }
        let value = value & 0x7F;

        // LSB partners fill in the low bits of their MSB controller
        if (cc::MODULATION_WHEEL_LSB..=cc::EFFECT_CONTROL_2_LSB).contains(&controller)
            && controller != cc::DATA_ENTRY_LSB
        {
            let msb = controller - 32;
            if self.locked_controllers[msb as usize] {
                return;
            }
            self.controllers.set_lsb(msb, value);
        }
        if self.locked_controllers[controller as usize] {
            return;
        }
        self.controllers.set_cc(controller, value);

        match controller {
            cc::ALL_NOTES_OFF => self.stop_all(false, now),
            cc::ALL_SOUND_OFF => self.stop_all(true, now),
            cc::BANK_SELECT => self.set_bank_select(u16::from(value)),
            cc::RPN_LSB => self.data_entry = DataEntryState::RpFine,
            cc::RPN_MSB => self.data_entry = DataEntryState::RpCoarse,
            cc::NRPN_MSB => self.data_entry = DataEntryState::NrpCoarse,
            cc::NRPN_LSB => self.data_entry = DataEntryState::NrpFine,
            cc::DATA_ENTRY_MSB => self.data_entry_coarse(value),
            cc::DATA_ENTRY_LSB => self.data_entry_fine(value),
            cc::RESET_ALL_CONTROLLERS => self.reset_controllers_rp15(now),
            cc::SUSTAIN_PEDAL => {
                if value >= 64 {
                    self.hold_pedal = true;
                } else {
                    self.hold_pedal = false;
                    self.release_sustained(now);
                }
            }
            _ => {}
        }

        self.emit(SynthEvent::ControllerChange {
            channel: self.index,
            controller,
            value,
        });
    }

    /// Lock or unlock a controller; locked controllers ignore changes and
    /// resets.
    pub fn lock_controller(&mut self, controller: usize, locked: bool) {
        if let Some(slot) = self.locked_controllers.get_mut(controller) {
            *slot = locked;
        }
    }

    pub fn is_controller_locked(&self, controller: usize) -> bool {
        self.locked_controllers
            .get(controller)
            .copied()
            .unwrap_or(false)
    }

    /// Reset every unlocked controller to its power-on value, plus vibrato,
    /// hold pedal, tuning and the parameter state machine.
    pub fn reset_controllers(&mut self, now: f64) {
        for index in 0..RESET_VALUES.len() {
            if self.locked_controllers[index] {
                continue;
            }
            let reset = RESET_VALUES[index];
            if index < 127 && self.controllers.get(index) != reset {
                if index == cc::PORTAMENTO_CONTROL as usize {
                    self.controllers.set(index, PORTAMENTO_CONTROL_UNSET);
                } else {
                    self.controller_change(index as u8, (reset >> 7) as u8, now);
                }
            } else {
                self.controllers.set(index, reset);
            }
        }
        self.vibrato = ChannelVibrato::default();
        self.hold_pedal = false;
        self.release_sustained(now);

        self.tuning.fine_cents = 0.0;
        self.tuning.coarse_semitones = 0.0;
        self.tuning.modulation_multiplier = 1.0;
        self.fine_tuning_raw = 8192;
        self.velocity_override = 0;
        self.reset_parameters();
    }

    /// CC121: reset controllers as recommended by RP-15, keeping bank,
    /// volume, pan, effect depths and sound controllers.
    pub fn reset_controllers_rp15(&mut self, now: f64) {
        self.pitch_wheel(8192);
        self.vibrato = ChannelVibrato::default();
        for controller in 0..128u8 {
            let reset = RESET_VALUES[controller as usize];
            if survives_rp15_reset(controller)
                || controller == cc::RESET_ALL_CONTROLLERS
                || self.controllers.get(controller as usize) == reset
            {
                continue;
            }
            if controller == cc::PORTAMENTO_CONTROL {
                self.controllers
                    .set(controller as usize, PORTAMENTO_CONTROL_UNSET);
            } else {
                self.controller_change(controller, (reset >> 7) as u8, now);
            }
        }
        debug!("Channel {} RP-15 controller reset", self.index);
    }

    /// Current pitch bend in semitones.
    pub fn pitch_bend_semitones(&self) -> f32 {
        let wheel = f32::from(self.controllers.pitch_wheel()) - 8192.0;
        wheel / 8192.0 * self.controllers.pitch_wheel_range()
    }

    /// Whether the pitch wheel is locked.
    pub fn is_pitch_wheel_locked(&self) -> bool {
        self.locked_controllers[source_index(source::PITCH_WHEEL)]
    }
}
