//! SynthHandle tests
//!
//! Control from other threads through the command queue; the render side
//! applies everything at the start of the next block.

mod helpers;

use approx::assert_abs_diff_eq;
use fontsynth::prelude::*;
use helpers::*;
use std::thread;

#[test]
fn test_note_from_control_thread() {
    let mut synth = test_synth();
    let handle = synth.handle();

    thread::spawn(move || {
        handle.program_change(0, programs::ORGAN).unwrap();
        handle.note_on(0, 60, 100).unwrap();
    })
    .join()
    .unwrap();

    // nothing happens until a block is rendered
    assert_eq!(synth.voice_count(), 0);
    let (left, _) = render_seconds(&mut synth, 0.05);
    assert_has_audio(&left, "after handle note on");
    assert_eq!(synth.voice_count(), 1);
}

#[test]
fn test_commands_keep_order() {
    let mut synth = test_synth();
    let handle = synth.handle();
    handle.note_on(0, 60, 100).unwrap();
    handle.stop_all(Some(0), true).unwrap();
    assert_eq!(handle.pending(), 2);

    let (left, _) = render_seconds(&mut synth, 0.01);
    assert_eq!(handle.pending(), 0);
    assert_eq!(synth.voice_count(), 0);
    assert_silence(&left, "note stopped in the same block");
}

#[test]
fn test_raw_midi_through_handle() {
    let mut synth = test_synth();
    let handle = synth.handle();
    handle.midi(&[0xB0, cc::MAIN_VOLUME, 32]).unwrap();
    handle.midi(&[0xF0, 0x7F, 0x7F, 0x04, 0x01, 0x7F, 0x3F, 0xF7]).unwrap();
    render_seconds(&mut synth, 0.003);

    let channel = synth.channel(0).unwrap();
    assert_eq!(channel.controllers().cc(cc::MAIN_VOLUME), 32);
    assert_abs_diff_eq!(synth.midi_volume(), 0.5, epsilon = 0.01);
}

#[test]
fn test_load_bank_from_control_thread() {
    let mut synth = SynthBuilder::new().build().unwrap();
    let handle = synth.handle();
    assert!(handle.preset_names().is_empty());

    let loader = handle.clone();
    thread::spawn(move || loader.load_bank(&fixture_sf2()).unwrap())
        .join()
        .unwrap();
    assert_eq!(handle.preset_names().len(), 5);

    handle.note_on(0, 60, 100).unwrap();
    let (left, _) = render_seconds(&mut synth, 0.05);
    assert_has_audio(&left, "after bank load");
}

#[test]
fn test_load_bank_file_error_reported_to_caller() {
    let synth = test_synth();
    let handle = synth.handle();
    let err = handle.load_bank_file("/nonexistent/bank.sf2").unwrap_err();
    assert!(matches!(err, fontsynth::synth::Error::Bank(_)));
    // the old banks are still in place
    assert_eq!(handle.preset_names().len(), 5);
}

#[test]
fn test_clear_banks_silences() {
    let mut synth = test_synth();
    let handle = synth.handle();
    synth.note_on(0, 60, 100).unwrap();
    render_seconds(&mut synth, 0.05);

    handle.clear_banks().unwrap();
    let (left, _) = render_seconds(&mut synth, 0.01);
    assert_silence(&left, "banks cleared");
    assert!(handle.preset_names().is_empty());
}

#[test]
fn test_queue_full() {
    let config = SynthConfig {
        command_queue_capacity: 2,
        ..Default::default()
    };
    let mut synth = SynthBuilder::new().config(config).build().unwrap();
    let handle = synth.handle();
    handle.note_on(0, 60, 100).unwrap();
    handle.note_on(0, 61, 100).unwrap();
    assert!(matches!(
        handle.note_on(0, 62, 100),
        Err(fontsynth::synth::Error::QueueFull)
    ));

    render_seconds(&mut synth, 0.003);
    handle.note_on(0, 62, 100).unwrap();
}

#[test]
fn test_stats_visible_from_handle() {
    let mut synth = test_synth();
    let handle = synth.handle();
    handle.note_on(0, 60, 100).unwrap();
    render_seconds(&mut synth, 0.01);

    let stats = handle.stats();
    assert_eq!(stats.blocks, 4);
    assert_eq!(stats.active_voices, 1);
    assert!(!stats.silent);
}

#[test]
fn test_handle_disconnected_after_drop() {
    let synth = test_synth();
    let handle = synth.handle();
    drop(synth);
    assert!(matches!(
        handle.note_on(0, 60, 100),
        Err(fontsynth::synth::Error::Disconnected)
    ));
}
