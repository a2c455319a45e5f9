//! Voice engine: one sounding sample layer of one note.
//!
//! A [`VoiceTemplate`] is everything about a voice that depends only on the
//! preset, key and velocity; channels cache templates per (key, velocity).
//! A [`Voice`] adds the running state: read cursor, envelopes, filter,
//! glide and release scheduling.
//!
//! Each block the voice:
//!
//! 1. re-evaluates its modulators against the channel's live controllers
//! 2. derives the pitch ratio from tuning, LFOs, vibrato, glide and the
//!    modulation envelope
//! 3. reads the wavetable, filters it and applies the volume envelope
//! 4. pans the result into the dry bus and the effect sends

pub mod envelope;
pub mod filter;
pub mod lfo;
pub mod mod_envelope;
pub mod wavetable;

pub use envelope::{EnvelopeStage, VolumeEnvelope};
pub use filter::LowpassFilter;
pub use lfo::ChannelVibrato;
pub use mod_envelope::ModulationEnvelope;
pub use wavetable::{LoopMode, SampleCursor};

use crate::controllers::{ChannelTuning, ControllerTable};
use crate::mixer::{MixBus, MixGains};
use crate::portamento::Glide;
use fontsynth_bank::{
    source, GeneratorSet, GeneratorType as G, Modulator, ModulatorSource, ResolvedZone, Sample,
    GENERATOR_COUNT,
};
use fontsynth_core::units::{abs_cents_to_hz, timecents_to_seconds};
use fontsynth_core::Interpolation;
use std::sync::Arc;

/// Above this modulated attenuation (cB) a voice is inaudible.
const SILENT_ATTENUATION: i32 = 2500;
/// EMU hardware scales `initialAttenuation` by 0.4.
const ATTENUATION_CORRECTION: f64 = 0.4;
const PAN_SMOOTHING: f32 = 0.05;
const REVERB_SEND_DIVISOR: f32 = 4600.0;
const CHORUS_SEND_DIVISOR: f32 = 2000.0;
const MAX_EFFECT_SEND: i32 = 1000;

/// Release time overrides (volume, modulation) in timecents for a killed
/// voice.
pub const KILL_RELEASE: (i32, i32) = (-12000, -12000);
/// Release time overrides for a voice cut by an exclusive class.
pub const EXCLUSIVE_RELEASE: (i32, i32) = (-2320, -1130);

/// Everything about a voice that depends only on preset, key and velocity.
#[derive(Debug, Clone)]
pub struct VoiceTemplate {
    pub data: Arc<[f32]>,
    pub loop_start: u32,
    pub loop_end: u32,
    pub generators: GeneratorSet,
    pub modulators: Arc<[Modulator]>,
    pub root_key: u8,
    pub target_key: u8,
    pub velocity: u8,
    /// Source frames per output frame at the root key
    pub playback_step: f64,
    pub loop_mode: LoopMode,
    pub exclusive_class: i32,
}

impl VoiceTemplate {
    /// Build the template for one resolved zone; `None` if its sample can
    /// not be played.
    pub fn build(
        zone: &ResolvedZone,
        sample: &Sample,
        key: u8,
        velocity: u8,
        output_rate: f64,
    ) -> Option<Self> {
        if !sample.is_playable() {
            return None;
        }
        let mut generators = zone.generators;
        let attenuation =
            (f64::from(generators[G::InitialAttenuation]) * ATTENUATION_CORRECTION).floor();
        generators.set(G::InitialAttenuation, attenuation as i32);

        let root_key = match generators[G::OverridingRootKey] {
            k @ 0..=127 => k as u8,
            _ => sample.original_key,
        };
        let target_key = match generators[G::KeyNum] {
            k @ 0..=127 => k as u8,
            _ => key,
        };
        let velocity = match generators[G::Velocity] {
            v @ 0..=127 => v as u8,
            _ => velocity,
        };
        let playback_step = f64::from(sample.sample_rate) / output_rate
            * (f64::from(sample.pitch_correction) / 1200.0).exp2();

        Some(Self {
            data: Arc::clone(&sample.data),
            loop_start: sample.loop_start,
            loop_end: sample.loop_end,
            generators,
            modulators: Arc::clone(&zone.modulators),
            root_key,
            target_key,
            velocity,
            playback_step,
            loop_mode: LoopMode::from_generator(generators[G::SampleModes]),
            exclusive_class: generators[G::ExclusiveClass],
        })
    }
}

/// Live channel state a voice reads while rendering.
#[derive(Debug, Clone, Copy)]
pub struct VoiceContext<'a> {
    pub controllers: &'a ControllerTable,
    pub tuning: &'a ChannelTuning,
    pub vibrato: &'a ChannelVibrato,
    pub sample_rate: f64,
    pub interpolation: Interpolation,
}

/// One sounding sample layer.
#[derive(Debug, Clone)]
pub struct Voice {
    base_generators: GeneratorSet,
    modulators: Arc<[Modulator]>,
    /// Generators after modulation
    generators: GeneratorSet,
    cursor: SampleCursor,
    volume_envelope: VolumeEnvelope,
    modulation_envelope: ModulationEnvelope,
    filter: LowpassFilter,

    /// Key as received (after transpose), used to target note-offs
    pub note: u8,
    pub velocity: u8,
    pub target_key: u8,
    root_key: u8,
    /// Poly pressure for this key (7-bit)
    pub pressure: u8,
    pub exclusive_class: i32,

    pub start_time: f64,
    /// Time the release begins; infinite while held
    pub release_start_time: f64,
    released: bool,
    /// Note-off arrived while the hold pedal was down
    pub sustained: bool,
    finished: bool,

    glide: Option<Glide>,
    /// Key modifier gain
    gain: f32,
    current_pan: f32,
    release_override: Option<(i32, i32)>,
}

impl Voice {
    /// Start a voice from a template at `start_time` (seconds).
    pub fn new(
        template: &VoiceTemplate,
        note: u8,
        start_time: f64,
        ctx: &VoiceContext<'_>,
        glide: Option<Glide>,
        gain: f32,
    ) -> Self {
        let mut voice = Self {
            base_generators: template.generators,
            modulators: Arc::clone(&template.modulators),
            generators: template.generators,
            cursor: SampleCursor::new(
                Arc::clone(&template.data),
                template.playback_step,
                template.loop_mode,
            ),
            volume_envelope: VolumeEnvelope::new(
                ctx.sample_rate,
                &template.generators,
                template.target_key,
            ),
            modulation_envelope: ModulationEnvelope::new(&template.generators, note, start_time),
            filter: LowpassFilter::new(),
            note,
            velocity: template.velocity,
            target_key: template.target_key,
            root_key: template.root_key,
            pressure: 0,
            exclusive_class: template.exclusive_class,
            start_time,
            release_start_time: f64::INFINITY,
            released: false,
            sustained: false,
            finished: false,
            glide,
            gain,
            current_pan: 0.0,
            release_override: None,
        };
        voice.compute_modulators(ctx.controllers);
        voice.apply_sample_offsets(template);
        voice.volume_envelope = VolumeEnvelope::new(
            ctx.sample_rate,
            &voice.generators,
            voice.target_key,
        );
        voice.current_pan = voice.generators[G::Pan].clamp(-500, 500) as f32;
        voice
    }

    /// Apply the address offset generators to the cursor.
    fn apply_sample_offsets(&mut self, template: &VoiceTemplate) {
        let gens = &self.generators;
        let last = template.data.len().saturating_sub(1) as i64;
        let offset = |fine: G, coarse: G| i64::from(gens[fine]) + i64::from(gens[coarse]) * 32768;

        let start = offset(G::StartAddrsOffset, G::StartAddrsCoarseOffset).clamp(0, last);
        let end = (last + offset(G::EndAddrsOffset, G::EndAddrsCoarseOffset)).clamp(0, last);
        let mut loop_start = (i64::from(template.loop_start)
            + offset(G::StartloopAddrsOffset, G::StartloopAddrsCoarseOffset))
        .clamp(0, last);
        let mut loop_end = (i64::from(template.loop_end)
            + offset(G::EndloopAddrsOffset, G::EndloopAddrsCoarseOffset))
        .clamp(0, last);
        if loop_start > loop_end {
            std::mem::swap(&mut loop_start, &mut loop_end);
        }
        if loop_end - loop_start < 1 {
            self.cursor.looping = false;
        }

        self.cursor.position = start as f64;
        self.cursor.end = end as f64;
        self.cursor.loop_start = loop_start as f64;
        self.cursor.loop_end = loop_end as f64;
    }

    /// Raw 14-bit value of a modulator source for this voice.
    fn source_value(&self, src: &ModulatorSource, controllers: &ControllerTable) -> u16 {
        if src.is_cc {
            return controllers.get(src.index as usize);
        }
        match src.index {
            source::NO_CONTROLLER => 16383,
            source::NOTE_ON_KEY => u16::from(self.note) << 7,
            source::NOTE_ON_VELOCITY => u16::from(self.velocity) << 7,
            source::POLY_PRESSURE => u16::from(self.pressure) << 7,
            index => controllers.source(index),
        }
    }

    /// Recompute the modulated generators from the live controllers.
    pub fn compute_modulators(&mut self, controllers: &ControllerTable) {
        let mut sums = [0.0f32; GENERATOR_COUNT];
        for modulator in self.modulators.iter() {
            let primary = modulator
                .source
                .transform(self.source_value(&modulator.source, controllers));
            let secondary = modulator
                .amount_source
                .transform(self.source_value(&modulator.amount_source, controllers));
            let mut amount = i32::from(modulator.amount);
            if modulator.is_effect_modulator() && amount <= MAX_EFFECT_SEND {
                amount = (amount * 5).min(MAX_EFFECT_SEND);
            }
            let mut value = primary * secondary * amount as f32;
            if modulator.transform == 2 {
                value = value.abs();
            }
            if let Some(slot) = sums.get_mut(modulator.destination.index()) {
                *slot += value;
            }
        }

        let mut modulated = self.base_generators;
        for ty in (0..GENERATOR_COUNT as u16).filter_map(G::from_id) {
            let sum = self.base_generators[ty] + sums[ty.index()].trunc() as i32;
            let value = if ty == G::InitialAttenuation {
                sum
            } else {
                ty.clamp_value(sum)
            };
            modulated.set(ty, value);
        }
        if let Some((volume, modulation)) = self.release_override {
            modulated.set(G::ReleaseVolEnv, volume);
            modulated.set(G::ReleaseModEnv, modulation);
        }

        if modulated != self.generators {
            self.generators = modulated;
            self.volume_envelope
                .recalculate(&self.generators, self.target_key);
            let release = self.released.then_some(self.release_start_time);
            self.modulation_envelope.recalculate(
                &self.generators,
                self.note,
                self.start_time,
                release,
            );
        }
    }

    /// Schedule the release at `now`, but not before `min_length` seconds
    /// after the start.
    pub fn release(&mut self, now: f64, min_length: f64) {
        self.release_start_time = now.max(self.start_time + min_length);
    }

    /// Release with a near-instant fade.
    pub fn kill(&mut self, now: f64) {
        self.release_override = Some(KILL_RELEASE);
        self.release(now, 0.0);
    }

    /// Release with the given (volume, modulation) release times in
    /// timecents.
    pub fn release_with_override(&mut self, now: f64, min_length: f64, times: (i32, i32)) {
        self.release_override = Some(times);
        self.release(now, min_length);
    }

    /// Release has been scheduled.
    #[inline]
    pub fn is_releasing(&self) -> bool {
        self.release_start_time.is_finite()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Current output level, used to pick voices to steal.
    pub fn level(&self) -> f32 {
        self.volume_envelope.level() * self.gain
    }

    pub fn generators(&self) -> &GeneratorSet {
        &self.generators
    }

    /// Render this block's mono samples into `out`.
    pub fn render(&mut self, ctx: &VoiceContext<'_>, now: f64, out: &mut [f32]) {
        if self.finished {
            out.fill(0.0);
            return;
        }
        self.compute_modulators(ctx.controllers);

        if now >= self.release_start_time && !self.released {
            self.released = true;
            self.volume_envelope
                .start_release(&self.generators, self.target_key);
            self.modulation_envelope.recalculate(
                &self.generators,
                self.note,
                self.start_time,
                Some(self.release_start_time),
            );
            if self.cursor.mode == LoopMode::UntilRelease {
                self.cursor.looping = false;
            }
        }

        if self.generators[G::InitialAttenuation] > SILENT_ATTENUATION {
            if self.released {
                self.finished = true;
            }
            out.fill(0.0);
            return;
        }

        let gen = |ty: G| f64::from(self.generators[ty]);
        let mut cents = gen(G::FineTune) + f64::from(ctx.tuning.total_cents());
        let mut semitones = gen(G::CoarseTune);
        if let Some(glide) = &self.glide {
            semitones -= glide.semitone_offset(self.target_key, now - self.start_time);
        }
        cents += (f64::from(self.target_key) - f64::from(self.root_key)) * gen(G::ScaleTuning);

        let depth_scale = f64::from(ctx.tuning.modulation_multiplier);
        let vib_to_pitch = gen(G::VibLfoToPitch);
        if vib_to_pitch != 0.0 {
            let start = self.start_time + timecents_to_seconds(gen(G::DelayVibLfo));
            let lfo = lfo::triangle(start, abs_cents_to_hz(gen(G::FreqVibLfo)), now);
            cents += lfo * vib_to_pitch * depth_scale;
        }

        let mut filter_excursion = 0.0;
        let mut centibels = 0.0;
        let (mod_to_pitch, mod_to_volume, mod_to_filter) = (
            gen(G::ModLfoToPitch),
            gen(G::ModLfoToVolume),
            gen(G::ModLfoToFilterFc),
        );
        if mod_to_pitch != 0.0 || mod_to_volume != 0.0 || mod_to_filter != 0.0 {
            let start = self.start_time + timecents_to_seconds(gen(G::DelayModLfo));
            let lfo = lfo::triangle(start, abs_cents_to_hz(gen(G::FreqModLfo)), now);
            cents += lfo * mod_to_pitch * depth_scale;
            centibels = -lfo * mod_to_volume;
            filter_excursion += lfo * mod_to_filter;
        }

        cents += ctx.vibrato.cents(self.start_time, now);

        let (env_to_pitch, env_to_filter) = (gen(G::ModEnvToPitch), gen(G::ModEnvToFilterFc));
        if env_to_pitch != 0.0 || env_to_filter != 0.0 {
            let release = self.released.then_some(self.release_start_time);
            let env = self.modulation_envelope.value(now, release);
            filter_excursion += env * env_to_filter;
            cents += env * env_to_pitch;
        }

        let ratio = ((cents + semitones * 100.0).trunc() / 1200.0).exp2();
        let ended = self
            .cursor
            .fill(out, ratio, ctx.interpolation, self.released);
        self.filter.process(
            out,
            self.generators[G::InitialFilterFc],
            self.generators[G::InitialFilterQ],
            filter_excursion,
            ctx.sample_rate,
        );
        let silent = self.volume_envelope.apply(out, centibels as f32);
        if ended || silent {
            self.finished = true;
        }
    }

    /// Pan `samples` into the dry bus and the effect sends.
    pub fn mix(&mut self, samples: &[f32], bus: &mut MixBus<'_>, gains: &MixGains) {
        let target_pan = self.generators[G::Pan].clamp(-500, 500) as f32;
        self.current_pan += (target_pan - self.current_pan) * PAN_SMOOTHING;

        let pan = self.current_pan / 500.0;
        let gain = gains.master * self.gain;
        let gain_left = gain * (1.0 - pan).min(1.0);
        let gain_right = gain * (1.0 + pan).min(1.0);

        for ((sample, left), right) in samples
            .iter()
            .zip(bus.dry_left.iter_mut())
            .zip(bus.dry_right.iter_mut())
        {
            *left += sample * gain_left;
            *right += sample * gain_right;
        }

        if !gains.effects {
            return;
        }

        let reverb_send = self.generators[G::ReverbEffectsSend];
        if reverb_send > 0 {
            let level = reverb_send as f32 / REVERB_SEND_DIVISOR * gains.reverb * gain;
            for ((sample, left), right) in samples
                .iter()
                .zip(bus.reverb_left.iter_mut())
                .zip(bus.reverb_right.iter_mut())
            {
                let wet = sample * level;
                *left += wet;
                *right += wet;
            }
        }

        let chorus_send = self.generators[G::ChorusEffectsSend];
        if chorus_send > 0 {
            let level = chorus_send as f32 / CHORUS_SEND_DIVISOR * gains.chorus;
            let (left_level, right_level) = (level * gain_left, level * gain_right);
            for ((sample, left), right) in samples
                .iter()
                .zip(bus.chorus_left.iter_mut())
                .zip(bus.chorus_right.iter_mut())
            {
                *left += sample * left_level;
                *right += sample * right_level;
            }
        }
    }
}
