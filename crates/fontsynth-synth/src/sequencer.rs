//! MIDI file playback into a [`Synthesizer`].
//!
//! The sequencer walks the merged event list of a [`MidiFile`] and splits
//! every render block at event times, so events land on the exact frame
//! they are due rather than on block boundaries.
//!
//! # Example
//!
//! ```ignore
//! use fontsynth_synth::{Sequencer, StereoBlock, Synthesizer};
//!
//! let mut sequencer = Sequencer::new(&MidiFile::load("song.mid")?);
//! sequencer.play();
//!
//! let mut block = StereoBlock::new(128);
//! while !sequencer.is_finished() {
//!     sequencer.render_block(&mut synth, &mut block);
//!     // hand `block` to the audio device
//! }
//! ```

use crate::mixer::{StereoBlock, StereoBuffer};
use crate::Synthesizer;
use fontsynth_midi::{meta, ChannelMessage, EventKind, MidiFile, TimedEvent};
use tracing::{debug, trace};

/// Plays one parsed MIDI file.
#[derive(Debug, Clone)]
pub struct Sequencer {
    events: Vec<TimedEvent>,
    duration: f64,
    /// Index of the next event to dispatch
    cursor: usize,
    /// Song position in seconds
    position: f64,
    playing: bool,
    looping: bool,
    finished: bool,
    /// MIDI port assigned to each track by port meta events
    track_ports: Vec<usize>,
}

impl Sequencer {
    pub fn new(file: &MidiFile) -> Self {
        let events = file.timed_events();
        let duration = file.duration();
        debug!(
            "Sequencer: {} events, {:.2}s, {} tracks",
            events.len(),
            duration,
            file.tracks.len()
        );
        Self {
            events,
            duration,
            cursor: 0,
            position: 0.0,
            playing: false,
            looping: false,
            finished: false,
            track_ports: vec![0; file.tracks.len()],
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
        if self.finished {
            self.finished = false;
            self.cursor = 0;
            self.position = 0.0;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The last event has been dispatched and looping is off.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Song position in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Jump to `seconds`.
    ///
    /// Stops every voice, resets the controllers, then replays every
    /// non-note event before the target so programs, controllers and pitch
    /// bends match what playing from the start would have produced.
    pub fn seek(&mut self, synth: &mut Synthesizer, seconds: f64) {
        let target = seconds.clamp(0.0, self.duration);
        synth.stop_all_channels(true);
        synth.reset_all_controllers();
        self.track_ports.fill(0);

        self.cursor = 0;
        while let Some(event) = self.events.get(self.cursor) {
            if event.time >= target {
                break;
            }
            let is_note = matches!(
                &event.kind,
                EventKind::Channel(c) if matches!(
                    c.message,
                    ChannelMessage::NoteOn { .. } | ChannelMessage::NoteOff { .. }
                )
            );
            if !is_note {
                dispatch(&mut self.track_ports, synth, event);
            }
            self.cursor += 1;
        }
        self.position = target;
        self.finished = false;
        debug!("Seek to {:.3}s (event {})", target, self.cursor);
    }

    /// Dispatch every event due at or before the current position.
    fn dispatch_due(&mut self, synth: &mut Synthesizer) {
        while let Some(event) = self.events.get(self.cursor) {
            if event.time > self.position {
                break;
            }
            dispatch(&mut self.track_ports, synth, event);
            self.cursor += 1;
        }
    }

    /// Render one block of `out`, dispatching the events that fall inside
    /// it on their exact frame.
    pub fn render_block(&mut self, synth: &mut Synthesizer, out: &mut StereoBlock) {
        synth.process_commands();
        out.clear();
        let frames = out.len();
        let sample_rate = synth.config().sample_rate;
        let mut offset = 0;

        while offset < frames {
            let mut chunk = frames - offset;
            if self.playing {
                self.dispatch_due(synth);
                if self.cursor >= self.events.len() && self.position >= self.duration {
                    if self.looping {
                        self.seek(synth, 0.0);
                        self.dispatch_due(synth);
                    } else {
                        self.playing = false;
                        self.finished = true;
                        debug!("Sequencer finished at {:.3}s", self.position);
                    }
                }
                if let Some(next) = self.events.get(self.cursor) {
                    let until = ((next.time - self.position) * sample_rate).ceil();
                    chunk = chunk.min(until.max(1.0) as usize);
                }
            }

            synth.render_range(out, offset..offset + chunk);
            if self.playing {
                self.position += chunk as f64 / sample_rate;
            }
            offset += chunk;
        }
    }

    /// Render the rest of the file offline plus `tail` seconds for release
    /// tails, returning the dry mix and the effect sends.
    ///
    /// Looping is ignored.
    pub fn render_to_buffers(
        &mut self,
        synth: &mut Synthesizer,
        tail: f64,
    ) -> StereoBlock {
        let sample_rate = synth.config().sample_rate;
        let block_size = synth.config().block_size;
        let remaining = (self.duration - self.position).max(0.0) + tail.max(0.0);
        let total = (remaining * sample_rate).ceil() as usize;

        let looping = std::mem::replace(&mut self.looping, false);
        self.play();

        let mut output = StereoBlock::new(total);
        let mut block = StereoBlock::new(block_size);
        let mut written = 0;
        while written < total {
            let frames = (total - written).min(block_size);
            if block.len() != frames {
                block.resize(frames);
            }
            self.render_block(synth, &mut block);
            for (dst, src) in [
                (&mut output.dry, &block.dry),
                (&mut output.reverb, &block.reverb),
                (&mut output.chorus, &block.chorus),
            ] {
                copy_into(dst, src, written);
            }
            written += frames;
        }
        self.looping = looping;
        debug!("Rendered {} frames offline", total);
        output
    }
}

/// Send one file event to the synthesizer, tracking port assignments.
fn dispatch(track_ports: &mut [usize], synth: &mut Synthesizer, event: &TimedEvent) {
    match &event.kind {
        EventKind::Channel(channel_event) => {
            let port = track_ports.get(event.track).copied().unwrap_or(0);
            let channel = port * 16 + usize::from(channel_event.channel);
            let channel = channel % synth.config().channel_count;
            synth.channel_message(channel, &channel_event.message);
        }
        EventKind::SysEx(data) => synth.system_exclusive(data),
        EventKind::Meta { kind, data } if *kind == meta::MIDI_PORT => {
            if let (Some(slot), Some(&port)) = (track_ports.get_mut(event.track), data.first()) {
                *slot = usize::from(port);
            }
        }
        _ => trace!("Skipping {:?}", event.kind),
    }
}

fn copy_into(dst: &mut StereoBuffer, src: &StereoBuffer, at: usize) {
    let frames = src.len();
    dst.left[at..at + frames].copy_from_slice(&src.left[..frames]);
    dst.right[at..at + frames].copy_from_slice(&src.right[..frames]);
}
