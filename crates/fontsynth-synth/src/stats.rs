//! Render statistics shared with control threads.

use fontsynth_core::{AtomicCounter, AtomicFlag, AtomicFloat};
use std::time::Duration;

/// Lock-free counters updated once per rendered block.
#[derive(Debug, Default)]
pub struct RenderStats {
    blocks: AtomicCounter,
    overruns: AtomicCounter,
    active_voices: AtomicCounter,
    load: AtomicFloat,
    peak_load: AtomicFloat,
    silent: AtomicFlag,
}

/// Point-in-time copy of [`RenderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub blocks: u64,
    pub overruns: u64,
    pub active_voices: u64,
    /// Render time over block duration of the last block
    pub load: f32,
    pub peak_load: f32,
    /// The last block rendered no voices
    pub silent: bool,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one block that took `elapsed` to render `frames` at
    /// `sample_rate`.
    pub fn record(&self, frames: usize, sample_rate: f64, elapsed: Duration, voices: usize) {
        self.blocks.increment();
        self.active_voices.set(voices as u64);
        self.silent.set(voices == 0);

        let budget = frames as f64 / sample_rate;
        if budget > 0.0 {
            let load = (elapsed.as_secs_f64() / budget) as f32;
            self.load.set(load);
            self.peak_load.fetch_max(load);
            if elapsed.as_secs_f64() > budget {
                self.overruns.increment();
            }
        }
    }

    pub fn blocks(&self) -> u64 {
        self.blocks.get()
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.get()
    }

    pub fn active_voices(&self) -> u64 {
        self.active_voices.get()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.get(),
            overruns: self.overruns.get(),
            active_voices: self.active_voices.get(),
            load: self.load.get(),
            peak_load: self.peak_load.get(),
            silent: self.silent.get(),
        }
    }

    /// Clear the peak load.
    pub fn reset_peak(&self) {
        self.peak_load.set(0.0);
    }
}
