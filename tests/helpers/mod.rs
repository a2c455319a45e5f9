//! Test helpers and fixtures for fontsynth integration tests.
//!
//! Banks are built in memory and pushed through the SF2 writer and parser,
//! so every test that plays a note also exercises the file format.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations
//! - `DSP_EPSILON` (1e-4): Unit conversions and table lookups
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use fontsynth::bank::{
    Generator, GeneratorType as G, Instrument, InstrumentZone, Preset, PresetZone, Sample,
    ZoneParams,
};
use fontsynth::prelude::*;
use tolerances::{AUDIBLE_THRESHOLD, SILENCE_THRESHOLD};

pub const TEST_SAMPLE_RATE: f64 = 44100.0;

pub const TEST_BLOCK_SIZE: usize = 128;

/// Preset numbers in [`fixture_bank`].
pub mod programs {
    pub const ORGAN: u8 = 0;
    pub const CLOSED_HAT: u8 = 1;
    pub const OPEN_HAT: u8 = 2;
    pub const PLUCK: u8 = 3;
}

/// Opt-in log output: `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn sine(name: &str, frames: usize, looped: bool) -> Sample {
    // 441 Hz at 44.1 kHz
    let data: Vec<f32> = (0..frames)
        .map(|i| (i as f32 * std::f32::consts::TAU / 100.0).sin() * 0.5)
        .collect();
    let (start, end) = if looped { (200, 8000) } else { (0, 0) };
    Sample::new(name, data, 44100, 69, start, end)
}

fn add_instrument(bank: &mut SoundBank, name: &str, sample: usize, generators: Vec<Generator>) -> usize {
    bank.add_instrument(Instrument {
        name: name.to_string(),
        global: ZoneParams::default(),
        zones: vec![InstrumentZone {
            params: ZoneParams {
                generators,
                ..Default::default()
            },
            sample,
        }],
    })
}

fn add_preset(bank: &mut SoundBank, name: &str, bank_number: u16, program: u8, instrument: usize) {
    bank.add_preset(Preset {
        name: name.to_string(),
        bank: bank_number,
        program: u16::from(program),
        zones: vec![PresetZone {
            params: ZoneParams::default(),
            instrument,
        }],
        ..Default::default()
    });
}

/// A small General MIDI style bank:
/// - 0:0 "Organ": looped sine, 0.1 s release
/// - 0:1 "Closed Hat" / 0:2 "Open Hat": looped, exclusive class 1
/// - 0:3 "Pluck": one-shot
/// - 128:0 "Kit": one-shot
pub fn fixture_bank() -> SoundBank {
    let mut bank = SoundBank::new("Fixture");
    let looped = bank.add_sample(sine("loop", 8820, true));
    let short = bank.add_sample(sine("short", 4410, false));

    let organ = add_instrument(
        &mut bank,
        "organ",
        looped,
        vec![
            Generator::new(G::SampleModes, 1),
            // 0.1 s
            Generator::new(G::ReleaseVolEnv, -3986),
        ],
    );
    let hat = add_instrument(
        &mut bank,
        "hat",
        looped,
        vec![
            Generator::new(G::SampleModes, 1),
            Generator::new(G::ExclusiveClass, 1),
        ],
    );
    let pluck = add_instrument(&mut bank, "pluck", short, Vec::new());

    add_preset(&mut bank, "Organ", 0, programs::ORGAN, organ);
    add_preset(&mut bank, "Closed Hat", 0, programs::CLOSED_HAT, hat);
    add_preset(&mut bank, "Open Hat", 0, programs::OPEN_HAT, hat);
    add_preset(&mut bank, "Pluck", 0, programs::PLUCK, pluck);
    add_preset(&mut bank, "Kit", fontsynth::DRUM_BANK, 0, pluck);
    bank
}

/// [`fixture_bank`] written as an SF2 image.
pub fn fixture_sf2() -> Vec<u8> {
    fixture_bank().write_sf2()
}

pub fn test_synth() -> Synthesizer {
    SynthBuilder::new()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_size(TEST_BLOCK_SIZE)
        .bank_bytes(fixture_sf2())
        .build()
        .expect("Failed to create test synthesizer")
}

/// Render `seconds` of audio; returns the left and right dry output.
pub fn render_seconds(synth: &mut Synthesizer, seconds: f64) -> (Vec<f32>, Vec<f32>) {
    let blocks = (seconds * TEST_SAMPLE_RATE / TEST_BLOCK_SIZE as f64).ceil() as usize;
    let mut block = StereoBlock::new(TEST_BLOCK_SIZE);
    let mut left = Vec::with_capacity(blocks * TEST_BLOCK_SIZE);
    let mut right = Vec::with_capacity(blocks * TEST_BLOCK_SIZE);
    for _ in 0..blocks {
        synth.render_block(&mut block);
        left.extend_from_slice(&block.dry.left);
        right.extend_from_slice(&block.dry.right);
    }
    (left, right)
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak absolute value of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0, f32::max)
}

pub fn assert_silence(samples: &[f32], context: &str) {
    let p = peak(samples);
    assert!(
        p < SILENCE_THRESHOLD,
        "{}: expected silence, peak = {:.6}",
        context,
        p
    );
}

pub fn assert_has_audio(samples: &[f32], context: &str) {
    let p = peak(samples);
    assert!(
        p > AUDIBLE_THRESHOLD,
        "{}: expected audio, peak = {:.6}",
        context,
        p
    );
}

/// Builds a format 1 Standard MIDI File.
pub struct SmfBuilder {
    ticks_per_quarter: u16,
    tracks: Vec<Vec<u8>>,
}

impl SmfBuilder {
    pub fn new(ticks_per_quarter: u16) -> Self {
        Self {
            ticks_per_quarter,
            tracks: Vec::new(),
        }
    }

    /// Add a track from `(delta, event bytes)` pairs; end-of-track is appended.
    pub fn track(mut self, events: &[(u64, &[u8])]) -> Self {
        let mut data = Vec::new();
        for (delta, bytes) in events {
            fontsynth::midi::vlq::encode(*delta, &mut data);
            data.extend_from_slice(bytes);
        }
        data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        self.tracks.push(data);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = b"MThd".to_vec();
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&(self.tracks.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.ticks_per_quarter.to_be_bytes());
        for track in &self.tracks {
            out.extend_from_slice(b"MTrk");
            out.extend_from_slice(&(track.len() as u32).to_be_bytes());
            out.extend_from_slice(track);
        }
        out
    }

    pub fn parse(&self) -> MidiFile {
        MidiFile::parse(&self.build()).expect("Failed to parse built MIDI file")
    }
}
