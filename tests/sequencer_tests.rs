//! MIDI file playback through the synthesizer

#![cfg(feature = "sequencer")]

mod helpers;

use approx::assert_abs_diff_eq;
use fontsynth::prelude::*;
use helpers::*;

/// Organ note on channel 0 for one beat at 120 BPM, then a one-beat rest.
fn one_note() -> MidiFile {
    SmfBuilder::new(480)
        .track(&[(0, &[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20])])
        .track(&[
            (0, &[0xC0, programs::ORGAN]),
            (0, &[0x90, 60, 100]),
            (480, &[0x80, 60, 0]),
            (480, &[0xB0, 0x07, 100]),
        ])
        .parse()
}

#[test]
fn test_render_file_offline() {
    init_tracing();
    let mut synth = test_synth();
    let mut sequencer = Sequencer::new(&one_note());
    assert_abs_diff_eq!(sequencer.duration(), 1.0, epsilon = 1e-9);

    let output = sequencer.render_to_buffers(&mut synth, 0.5);
    assert_eq!(output.len(), (1.5 * TEST_SAMPLE_RATE) as usize);

    let left = &output.dry.left;
    let half_second = TEST_SAMPLE_RATE as usize / 2;
    assert_has_audio(&left[..half_second], "note");
    // 0.1 s release after the note off at 0.5 s
    assert_silence(&left[half_second + 8820..], "after release");
    assert!(sequencer.is_finished());
}

#[test]
fn test_pause_holds_position() {
    let mut synth = test_synth();
    let mut sequencer = Sequencer::new(&one_note());
    let mut block = StereoBlock::new(TEST_BLOCK_SIZE);

    sequencer.play();
    for _ in 0..10 {
        sequencer.render_block(&mut synth, &mut block);
    }
    let position = sequencer.position();
    assert!(position > 0.0);

    sequencer.pause();
    for _ in 0..10 {
        sequencer.render_block(&mut synth, &mut block);
    }
    assert_eq!(sequencer.position(), position);
    assert!(!sequencer.is_playing());
}

#[test]
fn test_seek_past_note_is_silent() {
    let mut synth = test_synth();
    let mut sequencer = Sequencer::new(&one_note());
    sequencer.seek(&mut synth, 0.75);
    sequencer.play();

    let mut block = StereoBlock::new(TEST_BLOCK_SIZE);
    sequencer.render_block(&mut synth, &mut block);
    assert_eq!(synth.voice_count(), 0);
    assert_silence(&block.dry.left, "seeked past the note");
}

#[test]
fn test_port_meta_routes_to_second_port() {
    let file = SmfBuilder::new(480)
        .track(&[(0, &[0xFF, 0x21, 0x01, 0x01]), (0, &[0x90, 60, 100])])
        .parse();
    let mut synth = SynthBuilder::new()
        .channels(32)
        .bank(fixture_bank())
        .build()
        .unwrap();
    let mut sequencer = Sequencer::new(&file);
    sequencer.play();

    let mut block = StereoBlock::new(TEST_BLOCK_SIZE);
    sequencer.render_block(&mut synth, &mut block);
    assert_eq!(synth.channel(0).unwrap().voice_count(), 0);
    assert_eq!(synth.channel(16).unwrap().voice_count(), 1);
}
