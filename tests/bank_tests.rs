//! SoundFont bank integration tests

mod helpers;

use fontsynth::bank::{BankLibrary, BankSet, Error, GeneratorType, PresetFallback, SoundBank};
use helpers::*;
use std::io::Write;
use std::sync::Arc;

fn parsed_fixture() -> SoundBank {
    SoundBank::from_bytes(&fixture_sf2()).unwrap()
}

#[test]
fn test_written_bank_reads_back() {
    let bank = parsed_fixture();
    assert_eq!(bank.name(), "Fixture");
    assert_eq!(bank.samples.len(), 2);
    assert_eq!(bank.instruments.len(), 3);

    let names: Vec<(u16, u16, &str)> = bank
        .presets
        .iter()
        .map(|p| (p.bank, p.program, p.name.as_str()))
        .collect();
    assert_eq!(
        names,
        [
            (0, 0, "Organ"),
            (0, 1, "Closed Hat"),
            (0, 2, "Open Hat"),
            (0, 3, "Pluck"),
            (128, 0, "Kit"),
        ]
    );

    let looped = &bank.samples[0];
    assert_eq!(looped.loop_start, 200);
    assert_eq!(looped.loop_end, 8000);
}

#[test]
fn test_resolved_zone_carries_generators() {
    let bank = parsed_fixture();
    let organ = bank.find_preset(0, 0).unwrap();
    let zones = bank.resolve(organ, 60, 100);
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].generators[GeneratorType::SampleModes], 1);
    assert_eq!(zones[0].generators[GeneratorType::ReleaseVolEnv], -3986);

    let hat = bank.find_preset(0, 1).unwrap();
    let zones = bank.resolve(hat, 42, 100);
    assert_eq!(zones[0].generators[GeneratorType::ExclusiveClass], 1);
}

#[test]
fn test_preset_fallbacks() {
    let banks = BankSet::new(Arc::new(parsed_fixture()));

    let exact = banks.preset_for(0, 3).unwrap();
    assert_eq!(exact.name(), "Pluck");
    assert_eq!(exact.fallback, PresetFallback::Exact);

    // unknown bank, known program
    let any_bank = banks.preset_for(8, 3).unwrap();
    assert_eq!(any_bank.name(), "Pluck");
    assert_eq!(any_bank.fallback, PresetFallback::AnyBank);

    // unknown program
    assert_eq!(banks.preset_for(0, 90).unwrap().name(), "Organ");
    // drum requests never fall back to melodic programs of other banks
    assert_eq!(banks.preset_for(128, 5).unwrap().name(), "Kit");
}

#[test]
fn test_override_bank_layers_in_front() {
    let mut overlay = SoundBank::new("Overlay");
    overlay.add_preset(fontsynth::Preset {
        name: "Bright Organ".into(),
        bank: 0,
        program: 0,
        ..Default::default()
    });

    let banks = BankSet::new(Arc::new(parsed_fixture())).with_override(Arc::new(overlay), 1);
    // bank 1 maps to the overlay's bank 0
    let found = banks.preset_for(1, 0).unwrap();
    assert_eq!(found.name(), "Bright Organ");
    assert!(found.from_override);
    // bank 0 misses the overlay and comes from the primary bank
    let found = banks.preset_for(0, 0).unwrap();
    assert_eq!(found.name(), "Organ");
    assert!(!found.from_override);

    let names = banks.preset_names();
    assert_eq!(names[0], (1, 0, "Bright Organ".to_string()));
    assert_eq!(names.len(), 6);
}

#[test]
fn test_truncated_bank_is_error() {
    let data = fixture_sf2();
    let err = SoundBank::from_bytes(&data[..data.len() / 2]).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "got {err:?}");
}

#[test]
fn test_not_a_soundfont() {
    let midi = SmfBuilder::new(96).track(&[]).build();
    assert!(SoundBank::from_bytes(&midi).is_err());
}

#[test]
fn test_library_shares_loaded_banks() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&fixture_sf2()).unwrap();

    let library = BankLibrary::new();
    let first = library.load(file.path()).unwrap();
    let second = library.load(file.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(library.len(), 1);

    let bank = library.get(&first).unwrap();
    assert_eq!(bank.presets.len(), 5);
    assert!(library.unload(&first));
    assert!(library.get(&first).is_none());
}
