//! Per-channel MIDI state machine.
//!
//! A [`Channel`] owns its controller table, tuning, current preset, voice
//! template cache and sounding voices. It is driven by MIDI messages at
//! block boundaries and renders its voices into a [`MixBus`].
//!
//! Voices released while the hold pedal is down stay in the voice list
//! with their `sustained` flag set until the pedal comes up.

mod control;
mod data_entry;

pub use data_entry::DataEntryState;

use crate::controllers::{cc, ChannelTuning, ControllerTable, CONTROLLER_TABLE_SIZE,
    PORTAMENTO_CONTROL_UNSET};
use crate::events::SynthEvent;
use crate::key_modifiers::KeyModifierManager;
use crate::mixer::{MixBus, MixGains};
use crate::portamento::{glide_duration, Glide};
use crate::voice::{ChannelVibrato, Voice, VoiceContext, VoiceTemplate, EXCLUSIVE_RELEASE};
use fontsynth_bank::{source, BankSet, PresetRef, DRUM_BANK};
use fontsynth_core::Interpolation;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Shortest time a note sounds before its release starts.
pub const MIN_NOTE_LENGTH: f64 = 0.03;
/// Shortest time before a voice cut by an exclusive class releases.
pub const MIN_EXCLUSIVE_LENGTH: f64 = 0.07;

/// Voices a channel holds before its voice list would grow.
const DEFAULT_VOICE_CAPACITY: usize = 64;
/// Extra voice slots for the layers of the note that pushes a channel past
/// the voice cap before stealing trims it.
const LAYER_HEADROOM: usize = 16;
/// (key, velocity) pairs reserved in the template cache.
const TEMPLATE_CACHE_CAPACITY: usize = 256;

type TemplateCache = HashMap<(u8, u8), Arc<[VoiceTemplate]>>;

/// One MIDI channel.
#[derive(Debug)]
pub struct Channel {
    index: usize,
    sample_rate: f64,
    interpolation: Interpolation,

    pub(crate) controllers: ControllerTable,
    locked_controllers: [bool; CONTROLLER_TABLE_SIZE],
    pub(crate) tuning: ChannelTuning,
    pub(crate) vibrato: ChannelVibrato,
    data_entry: DataEntryState,
    /// 14-bit RPN 1 value
    fine_tuning_raw: u16,
    lock_gs_nrpn: bool,

    preset: Option<PresetRef>,
    bank: u16,
    program: u16,
    preset_locked: bool,
    is_drum: bool,
    muted: bool,
    hold_pedal: bool,
    /// Whole-semitone part of the transpose
    key_shift: i32,
    /// Fixed velocity for every note; 0 disables
    velocity_override: u8,

    voices: Vec<Voice>,
    scratch: Vec<f32>,
    cache: TemplateCache,
    pub(crate) outbox: Vec<SynthEvent>,
}

impl Channel {
    pub fn new(index: usize, sample_rate: f64, block_size: usize, interpolation: Interpolation) -> Self {
        Self {
            index,
            sample_rate,
            interpolation,
            controllers: ControllerTable::new(),
            locked_controllers: [false; CONTROLLER_TABLE_SIZE],
            tuning: ChannelTuning::default(),
            vibrato: ChannelVibrato::default(),
            data_entry: DataEntryState::Idle,
            fine_tuning_raw: 8192,
            lock_gs_nrpn: false,
            preset: None,
            bank: 0,
            program: 0,
            preset_locked: false,
            is_drum: false,
            muted: false,
            hold_pedal: false,
            key_shift: 0,
            velocity_override: 0,
            voices: Vec::with_capacity(DEFAULT_VOICE_CAPACITY),
            scratch: vec![0.0; block_size],
            cache: HashMap::with_capacity(TEMPLATE_CACHE_CAPACITY),
            outbox: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Pre-size the voice list so up to `voice_cap` voices, plus the layers
    /// of one note, never grow it while rendering.
    pub fn reserve_voices(&mut self, voice_cap: usize) {
        let wanted = voice_cap + LAYER_HEADROOM;
        self.voices.reserve(wanted.saturating_sub(self.voices.len()));
    }

    /// Slots the voice list holds without reallocating.
    pub fn voice_capacity(&self) -> usize {
        self.voices.capacity()
    }

    pub fn preset(&self) -> Option<&PresetRef> {
        self.preset.as_ref()
    }

    pub fn program(&self) -> u16 {
        self.program
    }

    /// Bank select (MSB) as last received.
    pub fn bank(&self) -> u16 {
        self.bank
    }

    pub fn is_drum(&self) -> bool {
        self.is_drum
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn hold_pedal(&self) -> bool {
        self.hold_pedal
    }

    pub fn controllers(&self) -> &ControllerTable {
        &self.controllers
    }

    pub fn tuning(&self) -> &ChannelTuning {
        &self.tuning
    }

    pub fn vibrato(&self) -> &ChannelVibrato {
        &self.vibrato
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn cached_templates(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    fn emit(&mut self, event: SynthEvent) {
        self.outbox.push(event);
    }

    /// Key after the transpose key shift, if still a valid key.
    #[inline]
    fn shifted_key(&self, key: u8) -> Option<u8> {
        let shifted = i32::from(key) + self.key_shift;
        (0..=127).contains(&shifted).then_some(shifted as u8)
    }

    // ---- presets ----

    /// Select a program from the current bank (bank 128 on drum channels).
    pub fn program_change(&mut self, program: u16, banks: &BankSet) {
        if self.preset_locked {
            return;
        }
        self.program = program;
        let bank = if self.is_drum { DRUM_BANK } else { self.bank };
        self.preset = banks.preset_for(bank, program);
        self.cache.clear();
        match &self.preset {
            Some(preset) => debug!(
                "Channel {} program {}:{} -> '{}'",
                self.index,
                bank,
                program,
                preset.name()
            ),
            None => debug!("Channel {} has no preset for {}:{}", self.index, bank, program),
        }
        self.emit(SynthEvent::ProgramChange {
            channel: self.index,
            program,
            bank,
        });
    }

    /// Re-resolve the current program against a new bank set.
    pub fn reload_preset(&mut self, banks: &BankSet) {
        let locked = std::mem::replace(&mut self.preset_locked, false);
        self.program_change(self.program, banks);
        self.preset_locked = locked;
    }

    /// Drop the preset (banks were cleared).
    pub fn clear_preset(&mut self) {
        self.preset = None;
        self.cache.clear();
    }

    pub fn set_drums(&mut self, is_drum: bool, banks: &BankSet) {
        if self.preset_locked || self.is_drum == is_drum {
            return;
        }
        self.is_drum = is_drum;
        if is_drum {
            self.key_shift = 0;
        }
        self.emit(SynthEvent::DrumChange {
            channel: self.index,
            is_drum,
        });
        self.program_change(self.program, banks);
    }

    /// Drums flag without re-resolving or checking the lock; used by
    /// system resets.
    pub(crate) fn force_drums(&mut self, is_drum: bool) {
        self.is_drum = is_drum;
        self.emit(SynthEvent::DrumChange {
            channel: self.index,
            is_drum,
        });
    }

    /// Emit a ProgramChange for the current program without re-resolving.
    pub(crate) fn announce_program(&mut self) {
        let bank = if self.is_drum { DRUM_BANK } else { self.bank };
        self.emit(SynthEvent::ProgramChange {
            channel: self.index,
            program: self.program,
            bank,
        });
    }

    pub(crate) fn set_bank_select(&mut self, bank: u16) {
        if !self.preset_locked {
            self.bank = bank;
        }
    }

    pub fn lock_preset(&mut self, locked: bool) {
        self.preset_locked = locked;
    }

    pub fn is_preset_locked(&self) -> bool {
        self.preset_locked
    }

    // ---- notes ----

    /// Start the voices for a key.
    pub fn note_on(
        &mut self,
        key: u8,
        velocity: u8,
        now: f64,
        banks: &BankSet,
        modifiers: &KeyModifierManager,
    ) {
        if velocity == 0 {
            self.note_off(key, now);
            return;
        }
        if self.muted {
            return;
        }
        let Some(key) = self.shifted_key(key) else {
            return;
        };

        let mut velocity = velocity.min(127);
        if self.velocity_override > 0 {
            velocity = self.velocity_override;
        }
        if let Some(forced) = modifiers.velocity(self.index, key) {
            velocity = forced;
        }
        let gain = modifiers.gain(self.index, key);

        let glide = self.portamento_glide(key);

        let Some(templates) = self.templates(key, velocity, banks, modifiers) else {
            trace!("Channel {} key {} has no voices", self.index, key);
            return;
        };

        for template in templates.iter() {
            if template.exclusive_class != 0 {
                for voice in self
                    .voices
                    .iter_mut()
                    .filter(|v| v.exclusive_class == template.exclusive_class)
                {
                    voice.release_with_override(now, MIN_EXCLUSIVE_LENGTH, EXCLUSIVE_RELEASE);
                }
            }
        }

        let ctx = VoiceContext {
            controllers: &self.controllers,
            tuning: &self.tuning,
            vibrato: &self.vibrato,
            sample_rate: self.sample_rate,
            interpolation: self.interpolation,
        };
        for template in templates.iter() {
            self.voices
                .push(Voice::new(template, key, now, &ctx, glide, gain));
        }

        self.emit(SynthEvent::NoteOn {
            channel: self.index,
            key,
            velocity,
        });
    }

    /// Glide for a new key, updating the portamento control key.
    fn portamento_glide(&mut self, key: u8) -> Option<Glide> {
        let control = self.controllers.get(cc::PORTAMENTO_CONTROL as usize);
        let time = self.controllers.cc(cc::PORTAMENTO_TIME);
        if self.is_drum
            || (control >> 7) as u8 == key
            || self.controllers.get(cc::PORTAMENTO_ON_OFF as usize) < 8192
            || time == 0
        {
            return None;
        }
        let glide = (control != PORTAMENTO_CONTROL_UNSET).then(|| {
            let from = (control >> 7) as u8;
            Glide::new(from, glide_duration(time, from.abs_diff(key)))
        });
        self.controllers
            .set(cc::PORTAMENTO_CONTROL as usize, u16::from(key) << 7);
        glide
    }

    /// Voice templates for (key, velocity), cached unless a key modifier
    /// swaps the patch.
    fn templates(
        &mut self,
        key: u8,
        velocity: u8,
        banks: &BankSet,
        modifiers: &KeyModifierManager,
    ) -> Option<Arc<[VoiceTemplate]>> {
        if let Some((bank, program)) = modifiers.patch(self.index, key) {
            let preset = banks.preset_for(bank, program)?;
            return Some(build_templates(&preset, key, velocity, self.sample_rate));
        }
        if let Some(cached) = self.cache.get(&(key, velocity)) {
            return Some(Arc::clone(cached));
        }
        let preset = self.preset.as_ref()?;
        let templates = build_templates(preset, key, velocity, self.sample_rate);
        self.cache.insert((key, velocity), Arc::clone(&templates));
        Some(templates)
    }

    /// Release every held voice of a key; with the hold pedal down they are
    /// marked sustained instead.
    pub fn note_off(&mut self, key: u8, now: f64) {
        let Some(key) = self.shifted_key(key) else {
            return;
        };
        let hold = self.hold_pedal;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.note == key && !v.is_releasing() && !v.sustained)
        {
            if hold {
                voice.sustained = true;
            } else {
                voice.release(now, MIN_NOTE_LENGTH);
            }
        }
        self.emit(SynthEvent::NoteOff {
            channel: self.index,
            key,
        });
    }

    /// Release every voice of a key almost instantly.
    pub fn kill_note(&mut self, key: u8, now: f64) {
        for voice in self.voices.iter_mut().filter(|v| v.note == key) {
            voice.kill(now);
        }
    }

    /// Release (or with `force`, drop) every voice, sustained ones included.
    pub fn stop_all(&mut self, force: bool, now: f64) {
        if force {
            self.voices.clear();
        } else {
            for voice in self.voices.iter_mut() {
                voice.sustained = false;
                if !voice.is_releasing() {
                    voice.release(now, MIN_NOTE_LENGTH);
                }
            }
        }
        self.emit(SynthEvent::StopAll {
            channel: Some(self.index),
            force,
        });
    }

    pub(crate) fn release_sustained(&mut self, now: f64) {
        for voice in self.voices.iter_mut().filter(|v| v.sustained) {
            voice.sustained = false;
            voice.release(now, MIN_NOTE_LENGTH);
        }
    }

    pub fn mute(&mut self, muted: bool, now: f64) {
        if muted {
            self.stop_all(true, now);
        }
        self.muted = muted;
        self.emit(SynthEvent::ChannelMute {
            channel: self.index,
            muted,
        });
    }

    // ---- pressure and pitch ----

    pub fn pitch_wheel(&mut self, value: u16) {
        if self.locked_controllers[crate::controllers::source_index(source::PITCH_WHEEL)] {
            return;
        }
        let value = value.min(16383);
        self.controllers.set_source(source::PITCH_WHEEL, value);
        self.emit(SynthEvent::PitchWheel {
            channel: self.index,
            value,
        });
    }

    pub fn channel_pressure(&mut self, pressure: u8) {
        self.controllers
            .set_source(source::CHANNEL_PRESSURE, u16::from(pressure & 0x7F) << 7);
    }

    pub fn poly_pressure(&mut self, key: u8, pressure: u8) {
        let Some(key) = self.shifted_key(key) else {
            return;
        };
        for voice in self.voices.iter_mut().filter(|v| v.note == key) {
            voice.pressure = pressure & 0x7F;
        }
    }

    // ---- tuning ----

    /// Transpose by `semitones`; the fraction becomes fine tuning. Drum
    /// channels ignore it unless `force` is set.
    pub fn transpose(&mut self, semitones: f32, force: bool) {
        if self.is_drum && !force {
            return;
        }
        let whole = semitones.trunc();
        self.key_shift = whole as i32;
        self.tuning.transpose_fine_cents = (semitones - whole) * 100.0;
    }

    /// Channel fine tuning in cents.
    pub fn set_tuning(&mut self, cents: f32) {
        self.tuning.fine_cents = cents;
    }

    pub fn set_master_tuning(&mut self, cents: f32) {
        self.tuning.master_cents = cents;
    }

    /// Modulation (vibrato) depth in cents; 50 cents is the default scale.
    pub fn set_modulation_depth(&mut self, cents: f32) {
        self.tuning.modulation_multiplier = cents / 50.0;
    }

    pub fn set_velocity_override(&mut self, velocity: u8) {
        self.velocity_override = velocity.min(127);
    }

    pub fn set_vibrato(&mut self, vibrato: ChannelVibrato) {
        if !self.lock_gs_nrpn {
            self.vibrato = vibrato;
        }
    }

    /// Clear the channel vibrato and ignore GS NRPNs from now on.
    pub fn disable_gs_nrpn(&mut self) {
        self.lock_gs_nrpn = true;
        self.vibrato = ChannelVibrato::default();
    }

    // ---- rendering ----

    /// Render all voices for `frames` frames starting at `now` into `bus`.
    ///
    /// Finished voices are removed. Returns the remaining voice count.
    pub fn render(&mut self, now: f64, frames: usize, bus: &mut MixBus<'_>, gains: &MixGains) -> usize {
        if self.voices.is_empty() {
            return 0;
        }
        if self.scratch.len() < frames {
            self.scratch.resize(frames, 0.0);
        }
        let ctx = VoiceContext {
            controllers: &self.controllers,
            tuning: &self.tuning,
            vibrato: &self.vibrato,
            sample_rate: self.sample_rate,
            interpolation: self.interpolation,
        };
        let scratch = &mut self.scratch[..frames];
        for voice in self.voices.iter_mut() {
            voice.render(&ctx, now, scratch);
            voice.mix(scratch, bus, gains);
        }
        self.voices.retain(|v| !v.is_finished());
        self.voices.len()
    }

    /// Index and steal priority of the voice to drop first: releasing
    /// voices before held ones, then the quietest, then the oldest.
    pub(crate) fn weakest_voice(&self) -> Option<(usize, (bool, f32, f64))> {
        self.voices
            .iter()
            .enumerate()
            .map(|(i, v)| (i, (!v.is_releasing(), v.level(), v.start_time)))
            .min_by(|(_, a), (_, b)| steal_order(a, b))
    }

    pub(crate) fn remove_voice(&mut self, index: usize) {
        if index < self.voices.len() {
            self.voices.swap_remove(index);
        }
    }
}

/// Ordering used to pick the voice to steal (smallest first).
pub(crate) fn steal_order(a: &(bool, f32, f64), b: &(bool, f32, f64)) -> std::cmp::Ordering {
    a.0.cmp(&b.0)
        .then(a.1.total_cmp(&b.1))
        .then(a.2.total_cmp(&b.2))
}

fn build_templates(
    preset: &PresetRef,
    key: u8,
    velocity: u8,
    sample_rate: f64,
) -> Arc<[VoiceTemplate]> {
    preset
        .resolve(key, velocity)
        .iter()
        .filter_map(|zone| {
            let sample = preset.sample(zone.sample)?;
            VoiceTemplate::build(zone, sample, key, velocity, sample_rate)
        })
        .collect()
}
