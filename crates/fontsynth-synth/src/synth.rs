//! The synthesizer engine: channels, MIDI dispatch and block rendering.

use crate::channel::{steal_order, Channel};
use crate::events::{EventKind, ListenerId, Listeners, SynthEvent};
use crate::handle::{SynthCommand, SynthHandle};
use crate::key_modifiers::KeyModifierManager;
use crate::mixer::{MixGains, StereoBlock, StereoBuffer};
use crate::stats::RenderStats;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender};
use fontsynth_bank::{BankSet, SoundBank};
use fontsynth_core::SynthConfig;
use fontsynth_midi::{ChannelEvent, ChannelMessage};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// MIDI channels per port.
const PORT_CHANNELS: usize = 16;

/// A SoundFont synthesizer.
///
/// Owns every channel and renders them block by block. MIDI can be fed
/// directly through the methods here, or from other threads through a
/// [`SynthHandle`]; queued commands are applied at the start of each
/// [`render_block`](Self::render_block).
pub struct Synthesizer {
    config: SynthConfig,
    channels: Vec<Channel>,
    banks: Arc<ArcSwap<BankSet>>,
    key_modifiers: KeyModifierManager,
    listeners: Listeners,
    outbox: Vec<SynthEvent>,
    stats: Arc<RenderStats>,
    command_tx: Sender<SynthCommand>,
    command_rx: Receiver<SynthCommand>,
    /// Monotonic clock in output frames
    frames_rendered: u64,
    /// Universal SysEx master volume, 0.0 to 1.0
    midi_volume: f32,
    master_tuning: f32,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("config", &self.config)
            .field("channels", &self.channels.len())
            .field("voices", &self.voice_count())
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Result<Self> {
        config.validate()?;
        let drum_channel = config.drum_channel % PORT_CHANNELS;
        let channels = (0..config.channel_count)
            .map(|i| {
                let mut channel = Channel::new(
                    i,
                    config.sample_rate,
                    config.block_size,
                    config.interpolation,
                );
                channel.reserve_voices(config.voice_cap);
                if i % PORT_CHANNELS == drum_channel {
                    channel.force_drums(true);
                }
                channel.outbox.clear();
                channel
            })
            .collect();
        let (command_tx, command_rx) = bounded(config.command_queue_capacity);
        info!(
            "Synthesizer: {} channels at {} Hz, {} frame blocks, {} voices max",
            config.channel_count, config.sample_rate, config.block_size, config.voice_cap
        );
        Ok(Self {
            config,
            channels,
            banks: Arc::new(ArcSwap::from_pointee(BankSet::empty())),
            key_modifiers: KeyModifierManager::new(),
            listeners: Listeners::new(),
            outbox: Vec::with_capacity(64),
            stats: Arc::new(RenderStats::new()),
            command_tx,
            command_rx,
            frames_rendered: 0,
            midi_volume: 1.0,
            master_tuning: 0.0,
        })
    }

    /// Create a synthesizer playing `bank`.
    pub fn with_bank(config: SynthConfig, bank: SoundBank) -> Result<Self> {
        let mut synth = Self::new(config)?;
        synth.set_banks(BankSet::new(Arc::new(bank)));
        Ok(synth)
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// A control handle for other threads.
    pub fn handle(&self) -> SynthHandle {
        SynthHandle::new(
            self.command_tx.clone(),
            Arc::clone(&self.banks),
            Arc::clone(&self.stats),
        )
    }

    pub fn stats(&self) -> &Arc<RenderStats> {
        &self.stats
    }

    /// Seconds rendered so far.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.config.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn channel(&self, channel: usize) -> Option<&Channel> {
        self.channels.get(channel)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn voice_count(&self) -> usize {
        self.channels.iter().map(Channel::voice_count).sum()
    }

    pub fn key_modifiers(&self) -> &KeyModifierManager {
        &self.key_modifiers
    }

    pub fn key_modifiers_mut(&mut self) -> &mut KeyModifierManager {
        &mut self.key_modifiers
    }

    fn channel_mut(&mut self, channel: usize) -> Result<&mut Channel> {
        self.channels
            .get_mut(channel)
            .ok_or(Error::ChannelOutOfRange(channel))
    }

    // ---- listeners ----

    /// Register a callback for one event kind. Callbacks run synchronously,
    /// in registration order, on the thread driving the synthesizer.
    pub fn add_listener<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&SynthEvent) + Send + 'static,
    {
        self.listeners.add(kind, Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Collect channel events and hand them to the listeners.
    fn flush_events(&mut self) {
        for channel in self.channels.iter_mut() {
            self.outbox.append(&mut channel.outbox);
        }
        self.listeners.drain(&mut self.outbox);
    }

    // ---- banks ----

    /// Shared bank set, also read by every [`SynthHandle`].
    pub fn banks(&self) -> Arc<BankSet> {
        self.banks.load_full()
    }

    /// Replace the bank set and re-resolve every channel's program.
    pub fn set_banks(&mut self, banks: BankSet) {
        self.banks.store(Arc::new(banks));
        self.reload_banks();
    }

    pub fn load_bank(&mut self, bytes: &[u8]) -> Result<()> {
        let bank = SoundBank::from_bytes(bytes)?;
        self.set_banks(BankSet::new(Arc::new(bank)));
        Ok(())
    }

    fn reload_banks(&mut self) {
        let banks = self.banks.load();
        for channel in self.channels.iter_mut() {
            channel.reload_preset(&banks);
        }
        debug!("Reloaded presets on {} channels", self.channels.len());
        self.outbox.push(SynthEvent::BankChanged);
        self.flush_events();
    }

    /// Remove all banks; every channel is silenced and left without a preset.
    pub fn clear_banks(&mut self) {
        self.banks.store(Arc::new(BankSet::empty()));
        let now = self.now();
        for channel in self.channels.iter_mut() {
            channel.stop_all(true, now);
            channel.clear_preset();
        }
        info!("Banks cleared");
        self.outbox.push(SynthEvent::BankChanged);
        self.flush_events();
    }

    /// `(bank, program, name)` of every loaded preset.
    pub fn preset_names(&self) -> Vec<(u16, u16, String)> {
        self.banks.load().preset_names()
    }

    // ---- channel voice messages ----

    pub fn note_on(&mut self, channel: usize, key: u8, velocity: u8) -> Result<()> {
        let now = self.now();
        let banks = self.banks.load();
        let target = self
            .channels
            .get_mut(channel)
            .ok_or(Error::ChannelOutOfRange(channel))?;
        target.note_on(key & 0x7F, velocity & 0x7F, now, &banks, &self.key_modifiers);
        drop(banks);
        self.enforce_voice_cap();
        self.flush_events();
        Ok(())
    }

    pub fn note_off(&mut self, channel: usize, key: u8) -> Result<()> {
        let now = self.now();
        self.channel_mut(channel)?.note_off(key & 0x7F, now);
        self.flush_events();
        Ok(())
    }

    /// Release every voice of a key with a near-instant fade.
    pub fn kill_note(&mut self, channel: usize, key: u8) -> Result<()> {
        let now = self.now();
        self.channel_mut(channel)?.kill_note(key & 0x7F, now);
        Ok(())
    }

    pub fn controller_change(&mut self, channel: usize, controller: u8, value: u8) -> Result<()> {
        let now = self.now();
        self.channel_mut(channel)?
            .controller_change(controller, value, now);
        self.flush_events();
        Ok(())
    }

    pub fn program_change(&mut self, channel: usize, program: u8) -> Result<()> {
        let banks = self.banks.load();
        let target = self
            .channels
            .get_mut(channel)
            .ok_or(Error::ChannelOutOfRange(channel))?;
        target.program_change(u16::from(program & 0x7F), &banks);
        drop(banks);
        self.flush_events();
        Ok(())
    }

    pub fn pitch_wheel(&mut self, channel: usize, value: u16) -> Result<()> {
        self.channel_mut(channel)?.pitch_wheel(value);
        self.flush_events();
        Ok(())
    }

    pub fn channel_pressure(&mut self, channel: usize, pressure: u8) -> Result<()> {
        self.channel_mut(channel)?.channel_pressure(pressure);
        Ok(())
    }

    pub fn poly_pressure(&mut self, channel: usize, key: u8, pressure: u8) -> Result<()> {
        self.channel_mut(channel)?.poly_pressure(key, pressure);
        Ok(())
    }

    // ---- channel control ----

    pub fn mute_channel(&mut self, channel: usize, muted: bool) -> Result<()> {
        let now = self.now();
        self.channel_mut(channel)?.mute(muted, now);
        self.flush_events();
        Ok(())
    }

    /// Switch a channel between the drum bank and melodic banks.
    pub fn set_drums(&mut self, channel: usize, is_drum: bool) -> Result<()> {
        let banks = self.banks.load();
        let target = self
            .channels
            .get_mut(channel)
            .ok_or(Error::ChannelOutOfRange(channel))?;
        target.set_drums(is_drum, &banks);
        drop(banks);
        self.flush_events();
        Ok(())
    }

    /// Transpose one channel by `semitones`; drum channels need `force`.
    pub fn transpose_channel(&mut self, channel: usize, semitones: f32, force: bool) -> Result<()> {
        self.channel_mut(channel)?.transpose(semitones, force);
        Ok(())
    }

    pub fn lock_controller(&mut self, channel: usize, controller: usize, locked: bool) -> Result<()> {
        self.channel_mut(channel)?.lock_controller(controller, locked);
        Ok(())
    }

    pub fn lock_preset(&mut self, channel: usize, locked: bool) -> Result<()> {
        self.channel_mut(channel)?.lock_preset(locked);
        Ok(())
    }

    /// Release (or with `force`, drop) the voices of one channel or of all.
    pub fn stop_all(&mut self, channel: Option<usize>, force: bool) -> Result<()> {
        match channel {
            Some(index) => {
                let now = self.now();
                self.channel_mut(index)?.stop_all(force, now);
                self.flush_events();
            }
            None => self.stop_all_channels(force),
        }
        Ok(())
    }

    /// Release (or with `force`, drop) the voices of every channel.
    pub fn stop_all_channels(&mut self, force: bool) {
        let now = self.now();
        for target in self.channels.iter_mut() {
            target.stop_all(force, now);
        }
        self.outbox.push(SynthEvent::StopAll {
            channel: None,
            force,
        });
        self.flush_events();
    }

    // ---- synth-wide ----

    pub fn set_master_gain(&mut self, gain: f32) {
        self.config.master_gain = gain.clamp(0.0, 10.0);
    }

    /// Master tuning in cents, applied to every channel.
    pub fn set_master_tuning(&mut self, cents: f32) {
        self.master_tuning = cents;
        for channel in self.channels.iter_mut() {
            channel.set_master_tuning(cents);
        }
    }

    pub fn master_tuning(&self) -> f32 {
        self.master_tuning
    }

    /// Universal SysEx master volume, 0.0 to 1.0.
    pub fn midi_volume(&self) -> f32 {
        self.midi_volume
    }

    pub fn set_effects_enabled(&mut self, enabled: bool) {
        self.config.effects_enabled = enabled;
    }

    /// Reset every channel as a GM/GS/XG system reset does: controllers,
    /// bank, drum assignment and program, plus the master volume.
    pub fn reset_all_controllers(&mut self) {
        let now = self.now();
        let drum_channel = self.config.drum_channel % PORT_CHANNELS;
        let banks = self.banks.load();
        self.outbox.push(SynthEvent::AllControllerReset);
        for (i, channel) in self.channels.iter_mut().enumerate() {
            channel.reset_controllers(now);
            if channel.is_preset_locked() {
                let is_drum = channel.is_drum();
                channel.force_drums(is_drum);
                channel.announce_program();
            } else {
                channel.set_bank_select(0);
                channel.force_drums(i % PORT_CHANNELS == drum_channel);
                channel.program_change(0, &banks);
            }
        }
        drop(banks);
        self.midi_volume = 1.0;
        self.flush_events();
    }

    // ---- MIDI bytes ----

    /// Dispatch raw MIDI: one short channel message or a SysEx.
    pub fn process_midi(&mut self, bytes: &[u8]) {
        match bytes.first() {
            Some(0xF0) => self.system_exclusive(bytes),
            Some(_) => match ChannelEvent::from_bytes(bytes) {
                Some(event) => self.handle_channel_event(&event),
                None => trace!("Ignoring MIDI message {:02X?}", bytes),
            },
            None => {}
        }
    }

    pub fn handle_channel_event(&mut self, event: &ChannelEvent) {
        self.channel_message(usize::from(event.channel), &event.message);
    }

    /// Apply one channel voice message. Messages for channels that do not
    /// exist are logged and dropped.
    pub fn channel_message(&mut self, channel: usize, message: &ChannelMessage) {
        let result = match *message {
            ChannelMessage::NoteOff { key, .. } => self.note_off(channel, key),
            ChannelMessage::NoteOn { key, velocity } => self.note_on(channel, key, velocity),
            ChannelMessage::PolyPressure { key, pressure } => {
                self.poly_pressure(channel, key, pressure)
            }
            ChannelMessage::ControlChange { controller, value } => {
                self.controller_change(channel, controller, value)
            }
            ChannelMessage::ProgramChange { program } => self.program_change(channel, program),
            ChannelMessage::ChannelPressure { pressure } => {
                self.channel_pressure(channel, pressure)
            }
            ChannelMessage::PitchBend { value } => self.pitch_wheel(channel, value),
        };
        if let Err(err) = result {
            warn!("Dropping {:?}: {}", message, err);
        }
    }

    /// Handle a SysEx message, with or without the `F0`/`F7` framing.
    ///
    /// Recognized: GM system on, GS reset and XG system on (all reset every
    /// channel) and the universal master volume.
    pub fn system_exclusive(&mut self, data: &[u8]) {
        let data = data.strip_prefix(&[0xF0]).unwrap_or(data);
        let data = data.strip_suffix(&[0xF7]).unwrap_or(data);
        match data {
            [0x7E, _, 0x09, 0x01 | 0x03, ..] => {
                info!("GM system on");
                self.reset_all_controllers();
            }
            [0x7E, _, 0x09, 0x02, ..] => debug!("GM system off"),
            [0x7F, _, 0x04, 0x01, lsb, msb, ..] => {
                let volume = (u16::from(*msb & 0x7F) << 7) | u16::from(*lsb & 0x7F);
                self.midi_volume = f32::from(volume) / 16383.0;
                debug!("Master volume {:.3}", self.midi_volume);
            }
            [0x41, _, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, ..] => {
                info!("GS reset");
                self.reset_all_controllers();
            }
            [0x43, device, 0x4C, 0x00, 0x00, 0x7E, 0x00, ..] if device & 0xF0 == 0x10 => {
                info!("XG system on");
                self.reset_all_controllers();
            }
            _ => debug!("Unrecognized SysEx {:02X?}", data),
        }
    }

    // ---- commands ----

    /// Apply every command queued by [`SynthHandle`]s.
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: SynthCommand) {
        let result = match command {
            SynthCommand::NoteOn {
                channel,
                key,
                velocity,
            } => self.note_on(channel, key, velocity),
            SynthCommand::NoteOff { channel, key } => self.note_off(channel, key),
            SynthCommand::ControlChange {
                channel,
                controller,
                value,
            } => self.controller_change(channel, controller, value),
            SynthCommand::ProgramChange { channel, program } => {
                self.program_change(channel, program)
            }
            SynthCommand::PitchBend { channel, value } => self.pitch_wheel(channel, value),
            SynthCommand::ChannelPressure { channel, pressure } => {
                self.channel_pressure(channel, pressure)
            }
            SynthCommand::PolyPressure {
                channel,
                key,
                pressure,
            } => self.poly_pressure(channel, key, pressure),
            SynthCommand::Midi(bytes) => {
                self.process_midi(&bytes);
                Ok(())
            }
            SynthCommand::MuteChannel { channel, muted } => self.mute_channel(channel, muted),
            SynthCommand::StopAll { channel, force } => self.stop_all(channel, force),
            SynthCommand::ResetAllControllers => {
                self.reset_all_controllers();
                Ok(())
            }
            SynthCommand::ReloadBanks => {
                self.reload_banks();
                Ok(())
            }
            SynthCommand::ClearBanks => {
                self.clear_banks();
                Ok(())
            }
            SynthCommand::SetMasterGain(gain) => {
                self.set_master_gain(gain);
                Ok(())
            }
            SynthCommand::SetMasterTuning(cents) => {
                self.set_master_tuning(cents);
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!("Command failed: {}", err);
        }
    }

    /// Drop the weakest voices until the total is within the voice cap.
    fn enforce_voice_cap(&mut self) {
        let mut total = self.voice_count();
        while total > self.config.voice_cap {
            let victim = self
                .channels
                .iter()
                .enumerate()
                .filter_map(|(c, channel)| channel.weakest_voice().map(|(v, key)| (c, v, key)))
                .min_by(|a, b| steal_order(&a.2, &b.2));
            let Some((channel, voice, _)) = victim else {
                break;
            };
            trace!("Voice cap reached, stealing voice {} on channel {}", voice, channel);
            self.channels[channel].remove_voice(voice);
            total -= 1;
        }
    }

    // ---- rendering ----

    fn gains(&self) -> MixGains {
        MixGains {
            master: self.config.master_gain * self.midi_volume,
            reverb: self.config.reverb_gain,
            chorus: self.config.chorus_gain,
            effects: self.config.effects_enabled,
        }
    }

    /// Render one block: apply queued commands, clear `out` and fill it
    /// with every channel's dry signal and effect sends.
    ///
    /// The block may be any length; it is rendered in chunks of at most
    /// `block_size` frames. Silence is rendered when no voice is active.
    pub fn render_block(&mut self, out: &mut StereoBlock) {
        self.process_commands();
        out.clear();
        let frames = out.len();
        self.render_range(out, 0..frames);
    }

    /// Render into `range` of `out`, adding to what is already there.
    /// The summed range is hard-limited to `[-1, 1]`.
    ///
    /// Does not drain the command queue; used for sample-accurate event
    /// scheduling inside one block.
    pub fn render_range(&mut self, out: &mut StereoBlock, range: Range<usize>) {
        let start = Instant::now();
        let gains = self.gains();
        let block_size = self.config.block_size;
        let mut offset = range.start;
        let mut voices = 0;
        while offset < range.end {
            let frames = (range.end - offset).min(block_size);
            let now = self.now();
            voices = 0;
            for channel in self.channels.iter_mut() {
                let mut bus = out.bus(offset..offset + frames);
                voices += channel.render(now, frames, &mut bus, &gains);
            }
            out.limit(offset..offset + frames);
            self.frames_rendered += frames as u64;
            offset += frames;
        }
        self.stats.record(
            range.len(),
            self.config.sample_rate,
            start.elapsed(),
            voices,
        );
    }

    /// Like [`render_block`](Self::render_block), with each channel's dry
    /// signal written to `dry[channel % dry.len()]` instead of
    /// `effects.dry`. The effect sends still go to `effects`.
    pub fn render_block_split(&mut self, dry: &mut [StereoBuffer], effects: &mut StereoBlock) {
        self.process_commands();
        if dry.is_empty() {
            self.render_block(effects);
            return;
        }
        let frames = effects.len();
        effects.clear();
        for buffer in dry.iter_mut() {
            if buffer.len() != frames {
                buffer.resize(frames);
            }
            buffer.clear();
        }

        let start = Instant::now();
        let gains = self.gains();
        let outputs = dry.len();
        let mut offset = 0;
        let mut voices = 0;
        while offset < frames {
            let chunk = (frames - offset).min(self.config.block_size);
            let now = self.now();
            voices = 0;
            for channel in self.channels.iter_mut() {
                let target = &mut dry[channel.index() % outputs];
                let mut bus = effects.bus_with_dry(target, offset..offset + chunk);
                voices += channel.render(now, chunk, &mut bus, &gains);
            }
            effects.limit(offset..offset + chunk);
            for buffer in dry.iter_mut() {
                buffer.limit(offset..offset + chunk);
            }
            self.frames_rendered += chunk as u64;
            offset += chunk;
        }
        self.stats
            .record(frames, self.config.sample_rate, start.elapsed(), voices);
    }
}
