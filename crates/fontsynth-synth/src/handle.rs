//! Thread-safe control handle.
//!
//! [`SynthHandle`] is the control surface for threads other than the one
//! rendering audio. Commands go through a bounded lock-free queue that the
//! [`Synthesizer`](crate::Synthesizer) drains at the start of every block,
//! so a command sent before a block starts takes effect in that block.
//!
//! Bank loading parses on the calling thread and publishes the result
//! through an `ArcSwap`; the render side only re-resolves presets.

use crate::stats::{RenderStats, StatsSnapshot};
use crate::{Error, Result};
use arc_swap::ArcSwap;
use crossbeam_channel::{Sender, TrySendError};
use fontsynth_bank::{BankSet, SoundBank};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A command for the render side.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthCommand {
    NoteOn {
        channel: usize,
        key: u8,
        velocity: u8,
    },
    NoteOff {
        channel: usize,
        key: u8,
    },
    ControlChange {
        channel: usize,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: usize,
        program: u8,
    },
    PitchBend {
        channel: usize,
        value: u16,
    },
    ChannelPressure {
        channel: usize,
        pressure: u8,
    },
    PolyPressure {
        channel: usize,
        key: u8,
        pressure: u8,
    },
    /// Raw short message or complete SysEx (`F0 ... F7`)
    Midi(Vec<u8>),
    MuteChannel {
        channel: usize,
        muted: bool,
    },
    /// All notes off on one channel or all of them
    StopAll {
        channel: Option<usize>,
        force: bool,
    },
    ResetAllControllers,
    /// The shared bank set changed; re-resolve every channel's preset
    ReloadBanks,
    /// Drop all banks and silence every channel
    ClearBanks,
    SetMasterGain(f32),
    /// Master tuning in cents
    SetMasterTuning(f32),
}

/// Cloneable, `Send` control handle for a [`Synthesizer`](crate::Synthesizer).
#[derive(Clone)]
pub struct SynthHandle {
    tx: Sender<SynthCommand>,
    banks: Arc<ArcSwap<BankSet>>,
    stats: Arc<RenderStats>,
}

impl std::fmt::Debug for SynthHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthHandle")
            .field("pending", &self.tx.len())
            .finish()
    }
}

impl SynthHandle {
    pub(crate) fn new(
        tx: Sender<SynthCommand>,
        banks: Arc<ArcSwap<BankSet>>,
        stats: Arc<RenderStats>,
    ) -> Self {
        Self { tx, banks, stats }
    }

    /// Queue a command without blocking.
    pub fn send(&self, command: SynthCommand) -> Result<()> {
        self.tx.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Disconnected(_) => Error::Disconnected,
        })
    }

    pub fn note_on(&self, channel: usize, key: u8, velocity: u8) -> Result<()> {
        self.send(SynthCommand::NoteOn {
            channel,
            key,
            velocity,
        })
    }

    pub fn note_off(&self, channel: usize, key: u8) -> Result<()> {
        self.send(SynthCommand::NoteOff { channel, key })
    }

    pub fn control_change(&self, channel: usize, controller: u8, value: u8) -> Result<()> {
        self.send(SynthCommand::ControlChange {
            channel,
            controller,
            value,
        })
    }

    pub fn program_change(&self, channel: usize, program: u8) -> Result<()> {
        self.send(SynthCommand::ProgramChange { channel, program })
    }

    pub fn pitch_bend(&self, channel: usize, value: u16) -> Result<()> {
        self.send(SynthCommand::PitchBend { channel, value })
    }

    /// Raw MIDI bytes, either one short message or a complete SysEx.
    pub fn midi(&self, bytes: &[u8]) -> Result<()> {
        self.send(SynthCommand::Midi(bytes.to_vec()))
    }

    pub fn mute_channel(&self, channel: usize, muted: bool) -> Result<()> {
        self.send(SynthCommand::MuteChannel { channel, muted })
    }

    pub fn stop_all(&self, channel: Option<usize>, force: bool) -> Result<()> {
        self.send(SynthCommand::StopAll { channel, force })
    }

    pub fn reset_all_controllers(&self) -> Result<()> {
        self.send(SynthCommand::ResetAllControllers)
    }

    pub fn set_master_gain(&self, gain: f32) -> Result<()> {
        self.send(SynthCommand::SetMasterGain(gain))
    }

    /// Parse an SF2 image and make it the primary bank.
    pub fn load_bank(&self, bytes: &[u8]) -> Result<()> {
        let bank = SoundBank::from_bytes(bytes)?;
        self.set_banks(BankSet::new(Arc::new(bank)))
    }

    pub fn load_bank_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bank = SoundBank::load(path)?;
        self.set_banks(BankSet::new(Arc::new(bank)))
    }

    /// Publish a new bank set; channels switch at the next block.
    pub fn set_banks(&self, banks: BankSet) -> Result<()> {
        info!(
            "Publishing bank set '{}'",
            banks.primary().map(|b| b.name()).unwrap_or("")
        );
        self.banks.store(Arc::new(banks));
        self.send(SynthCommand::ReloadBanks)
    }

    pub fn clear_banks(&self) -> Result<()> {
        self.send(SynthCommand::ClearBanks)
    }

    /// `(bank, program, name)` of every preset currently loaded.
    pub fn preset_names(&self) -> Vec<(u16, u16, String)> {
        self.banks.load().preset_names()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Commands waiting for the render side.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}
