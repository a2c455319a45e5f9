//! In-memory banks for unit tests.

use fontsynth_bank::{
    BankSet, Generator, GeneratorType as G, Instrument, InstrumentZone, Preset, PresetZone, Sample,
    SoundBank, ZoneParams, DRUM_BANK,
};
use std::sync::Arc;

pub const LOOPED: u16 = 0;
pub const EXCLUSIVE: u16 = 1;
pub const ONE_SHOT: u16 = 2;

/// 441 Hz sine at 44.1 kHz, root key 69.
fn sine(frames: usize, looped: bool) -> Sample {
    let data: Vec<f32> = (0..frames)
        .map(|i| (i as f32 * std::f32::consts::TAU / 100.0).sin() * 0.8)
        .collect();
    let (loop_start, loop_end) = if looped { (100, 4000) } else { (0, 0) };
    Sample::new("sine", data, 44100, 69, loop_start, loop_end)
}

fn instrument(bank: &mut SoundBank, name: &str, sample: usize, generators: Vec<Generator>) -> usize {
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

fn preset(bank: &mut SoundBank, name: &str, bank_number: u16, program: u16, instrument: usize) {
    bank.add_preset(Preset {
        name: name.to_string(),
        bank: bank_number,
        program,
        zones: vec![PresetZone {
            params: ZoneParams::default(),
            instrument,
        }],
        ..Default::default()
    });
}

/// Presets 0:0 (looped), 0:1 (looped, exclusive class 1), 0:2 (one-shot)
/// and 128:0 (one-shot drum kit).
pub fn test_bank() -> SoundBank {
    let mut bank = SoundBank::new("unit");
    let looped = bank.add_sample(sine(4410, true));
    let short = bank.add_sample(sine(2205, false));

    let lead = instrument(
        &mut bank,
        "lead",
        looped,
        vec![Generator::new(G::SampleModes, 1)],
    );
    let hat = instrument(
        &mut bank,
        "hat",
        looped,
        vec![
            Generator::new(G::SampleModes, 1),
            Generator::new(G::ExclusiveClass, 1),
        ],
    );
    let pluck = instrument(&mut bank, "pluck", short, Vec::new());

    preset(&mut bank, "Lead", 0, LOOPED, lead);
    preset(&mut bank, "Hat", 0, EXCLUSIVE, hat);
    preset(&mut bank, "Pluck", 0, ONE_SHOT, pluck);
    preset(&mut bank, "Kit", DRUM_BANK, 0, pluck);
    bank
}

pub fn test_banks() -> BankSet {
    BankSet::new(Arc::new(test_bank()))
}
