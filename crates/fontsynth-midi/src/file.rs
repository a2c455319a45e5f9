//! Standard MIDI File parsing.
//!
//! Tracks are decoded with [`TrackReader`] and kept per track; playback
//! code asks for [`MidiFile::timed_events`], which merges them on one
//! timeline and converts ticks to seconds through the file's tempo map.

use crate::error::{Error, Result};
use crate::event::{meta, ChannelMessage, EventKind, TrackEvent, DEFAULT_TEMPO_MICROS};
use crate::track::TrackReader;
use std::path::Path;
use tracing::{debug, trace};

/// Time division from the `MThd` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Ticks per quarter note
    Metrical(u16),
    /// SMPTE frames per second and ticks per frame
    Timecode(u8, u8),
}

/// An event on the merged file timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    /// Seconds from the start of the file
    pub time: f64,
    /// Ticks from the start of the file
    pub tick: u64,
    /// Index of the source track
    pub track: usize,
    pub kind: EventKind,
}

/// Tick to seconds conversion built from `Set Tempo` events.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    timing: Timing,
    /// (tick, microseconds per quarter, seconds at tick), sorted by tick
    changes: Vec<(u64, u32, f64)>,
}

impl TempoMap {
    fn new(timing: Timing, mut tempos: Vec<(u64, u32)>) -> Self {
        tempos.sort_by_key(|&(tick, _)| tick);
        let mut changes = vec![(0, DEFAULT_TEMPO_MICROS, 0.0)];
        for (tick, micros) in tempos {
            let &(last_tick, last_micros, last_seconds) = changes.last().unwrap_or(&(0, 0, 0.0));
            let seconds = last_seconds + Self::span(timing, tick - last_tick, last_micros);
            if tick == last_tick {
                changes.pop();
            }
            changes.push((tick, micros, seconds));
        }
        Self { timing, changes }
    }

    fn span(timing: Timing, ticks: u64, micros_per_quarter: u32) -> f64 {
        match timing {
            Timing::Metrical(tpq) => {
                ticks as f64 * f64::from(micros_per_quarter) / 1_000_000.0 / f64::from(tpq.max(1))
            }
            Timing::Timecode(fps, sub) => {
                ticks as f64 / (f64::from(fps.max(1)) * f64::from(sub.max(1)))
            }
        }
    }

    /// Seconds at `tick`.
    pub fn seconds_at(&self, tick: u64) -> f64 {
        let i = self.changes.partition_point(|&(t, _, _)| t <= tick);
        let (start, micros, seconds) = self.changes[i.saturating_sub(1)];
        seconds + Self::span(self.timing, tick - start, micros)
    }

    /// Tempo in effect at `tick`, in microseconds per quarter note.
    pub fn tempo_at(&self, tick: u64) -> u32 {
        let i = self.changes.partition_point(|&(t, _, _)| t <= tick);
        self.changes[i.saturating_sub(1)].1
    }

    /// Tempo changes as (tick, microseconds per quarter).
    pub fn changes(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.changes.iter().map(|&(tick, micros, _)| (tick, micros))
    }
}

/// A parsed Standard MIDI File.
#[derive(Debug, Clone)]
pub struct MidiFile {
    /// 0 single track, 1 simultaneous tracks, 2 sequential tracks
    pub format: u16,
    pub timing: Timing,
    pub tracks: Vec<Vec<TrackEvent>>,
}

impl MidiFile {
    /// Load and parse a MIDI file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Parse MIDI file from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut chunks = SmfChunks { data, pos: 0 };

        let (id, header) = chunks
            .next()
            .ok_or_else(|| Error::format("empty file"))??;
        if &id != b"MThd" {
            return Err(Error::format(format!(
                "expected 'MThd', got '{}'",
                String::from_utf8_lossy(&id)
            )));
        }
        if header.len() < 6 {
            return Err(Error::format(format!("MThd too short ({} bytes)", header.len())));
        }
        let format = u16::from_be_bytes([header[0], header[1]]);
        let track_count = u16::from_be_bytes([header[2], header[3]]) as usize;
        let division = u16::from_be_bytes([header[4], header[5]]);
        if format > 2 {
            return Err(Error::format(format!("unknown SMF format {format}")));
        }
        if track_count == 0 {
            return Err(Error::NoTracks);
        }

        let timing = if division & 0x8000 == 0 {
            Timing::Metrical(division)
        } else {
            let fps = ((division >> 8) as u8 as i8).wrapping_neg() as u8;
            Timing::Timecode(fps, division as u8)
        };

        debug!(
            "Parsing MIDI file: format {}, {} tracks, {:?}",
            format, track_count, timing
        );

        let mut tracks = Vec::with_capacity(track_count);
        for chunk in chunks {
            let (id, body) = chunk?;
            if &id != b"MTrk" {
                trace!("skipping chunk '{}'", String::from_utf8_lossy(&id));
                continue;
            }
            let events = TrackReader::new(body).collect::<Result<Vec<_>>>()?;
            tracks.push(events);
            if tracks.len() == track_count {
                break;
            }
        }
        if tracks.is_empty() {
            return Err(Error::NoTracks);
        }
        if format == 2 {
            tracks
                .iter()
                .try_fold(0u64, |total, track| {
                    total.checked_add(track.last().map_or(0, |e| e.tick))
                })
                .ok_or_else(|| Error::format("sequential tracks overflow the tick range"))?;
        }
        if tracks.len() < track_count {
            debug!("Header declares {} tracks, found {}", track_count, tracks.len());
        }

        Ok(Self {
            format,
            timing,
            tracks,
        })
    }

    /// Ticks per quarter note, for callers that need metrical timing.
    pub fn ticks_per_quarter(&self) -> Result<u16> {
        match self.timing {
            Timing::Metrical(tpq) => Ok(tpq),
            Timing::Timecode(..) => Err(Error::UnsupportedTiming),
        }
    }

    /// Tick offset of each track on the merged timeline (format 2 plays
    /// tracks one after another).
    fn track_offsets(&self) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(self.tracks.len());
        let mut next: u64 = 0;
        for track in &self.tracks {
            if self.format == 2 {
                offsets.push(next);
                next = next.saturating_add(track.last().map_or(0, |e| e.tick));
            } else {
                offsets.push(0);
            }
        }
        offsets
    }

    pub fn tempo_map(&self) -> TempoMap {
        let offsets = self.track_offsets();
        let tempos = self
            .tracks
            .iter()
            .zip(&offsets)
            .flat_map(|(track, &offset)| {
                track.iter().filter_map(move |e| {
                    e.kind.tempo().map(|t| (e.tick.saturating_add(offset), t))
                })
            })
            .collect();
        TempoMap::new(self.timing, tempos)
    }

    /// All events on one timeline, sorted by tick (ties keep track order).
    pub fn timed_events(&self) -> Vec<TimedEvent> {
        let offsets = self.track_offsets();
        let tempo = self.tempo_map();
        let mut events: Vec<TimedEvent> = self
            .tracks
            .iter()
            .zip(&offsets)
            .enumerate()
            .flat_map(|(track, (events, &offset))| {
                events.iter().map(move |e| TimedEvent {
                    time: 0.0,
                    tick: e.tick.saturating_add(offset),
                    track,
                    kind: e.kind.clone(),
                })
            })
            .collect();
        events.sort_by_key(|e| e.tick);
        for event in &mut events {
            event.time = tempo.seconds_at(event.tick);
        }
        debug!("Merged {} MIDI events", events.len());
        events
    }

    /// Length in seconds (time of the last event).
    pub fn duration(&self) -> f64 {
        let offsets = self.track_offsets();
        let last_tick = self
            .tracks
            .iter()
            .zip(&offsets)
            .filter_map(|(t, &offset)| t.last().map(|e| e.tick.saturating_add(offset)))
            .max()
            .unwrap_or(0);
        self.tempo_map().seconds_at(last_tick)
    }

    /// Time of the first sounding note, if any.
    pub fn first_note_on(&self) -> Option<f64> {
        let offsets = self.track_offsets();
        let tick = self
            .tracks
            .iter()
            .zip(&offsets)
            .filter_map(|(track, &offset)| {
                track
                    .iter()
                    .find(|e| e.kind.as_channel().is_some_and(|c| c.message.is_note_on()))
                    .map(|e| e.tick.saturating_add(offset))
            })
            .min()?;
        Some(self.tempo_map().seconds_at(tick))
    }

    /// First track name meta event of each track.
    pub fn track_names(&self) -> Vec<Option<String>> {
        self.tracks
            .iter()
            .map(|track| {
                track.iter().find_map(|e| match &e.kind {
                    EventKind::Meta { kind, data } if *kind == meta::TRACK_NAME => {
                        Some(String::from_utf8_lossy(data).into_owned())
                    }
                    _ => None,
                })
            })
            .collect()
    }

    /// Channels that receive at least one note-on, ascending.
    pub fn channels_used(&self) -> Vec<u8> {
        let mut used = [false; 16];
        for event in self.tracks.iter().flatten() {
            if let Some(c) = event.kind.as_channel() {
                if matches!(c.message, ChannelMessage::NoteOn { .. }) {
                    used[c.channel as usize] = true;
                }
            }
        }
        (0..16u8).filter(|&c| used[c as usize]).collect()
    }
}

/// Big-endian `id + size + body` chunks of an SMF image.
struct SmfChunks<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for SmfChunks<'a> {
    type Item = Result<([u8; 4], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.data[self.pos..];
        if rest.len() < 8 {
            if !rest.is_empty() {
                trace!("{} trailing bytes ignored", rest.len());
            }
            return None;
        }
        let id = [rest[0], rest[1], rest[2], rest[3]];
        let size = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        if size > rest.len() - 8 {
            self.pos = self.data.len();
            return Some(Err(Error::format(format!(
                "chunk '{}' declares {size} bytes, {} remain",
                String::from_utf8_lossy(&id),
                rest.len() - 8
            ))));
        }
        self.pos += 8 + size;
        Some(Ok((id, &rest[8..8 + size])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn smf(format: u16, division: u16, tracks: &[&[u8]]) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&format.to_be_bytes());
        header.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        header.extend_from_slice(&division.to_be_bytes());
        let mut out = chunk(b"MThd", &header);
        for t in tracks {
            out.extend(chunk(b"MTrk", t));
        }
        out
    }

    // tempo 120 -> 60 BPM at tick 96
    const CONDUCTOR: &[u8] = &[
        0x00, 0xFF, 0x03, 0x04, b'T', b'e', b'm', b'p',
        0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20,
        0x60, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40,
        0x00, 0xFF, 0x2F, 0x00,
    ];
    const NOTES: &[u8] = &[
        0x60, 0x91, 60, 100,
        0x60, 0x81, 60, 0,
        0x00, 0xFF, 0x2F, 0x00,
    ];

    #[test]
    fn test_header_and_tracks() {
        let file = MidiFile::parse(&smf(1, 96, &[CONDUCTOR, NOTES])).unwrap();
        assert_eq!(file.format, 1);
        assert_eq!(file.timing, Timing::Metrical(96));
        assert_eq!(file.tracks.len(), 2);
        assert_eq!(file.track_names(), vec![Some("Temp".to_string()), None]);
        assert_eq!(file.channels_used(), vec![1]);
    }

    #[test]
    fn test_tempo_map_seconds() {
        let file = MidiFile::parse(&smf(1, 96, &[CONDUCTOR, NOTES])).unwrap();
        let events = file.timed_events();
        let note_on = events
            .iter()
            .find(|e| e.kind.as_channel().is_some_and(|c| c.message.is_note_on()))
            .unwrap();
        assert_eq!(note_on.tick, 96);
        assert_abs_diff_eq!(note_on.time, 0.5, epsilon = 1e-9);
        // second quarter runs at 60 BPM
        assert_abs_diff_eq!(file.duration(), 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(file.first_note_on().unwrap(), 0.5, epsilon = 1e-9);
        assert_eq!(file.tempo_map().tempo_at(100), 1_000_000);
    }

    #[test]
    fn test_merge_is_stable_by_track() {
        let a: &[u8] = &[0x00, 0xC0, 1, 0x00, 0xFF, 0x2F, 0x00];
        let b: &[u8] = &[0x00, 0xC1, 2, 0x00, 0xFF, 0x2F, 0x00];
        let file = MidiFile::parse(&smf(1, 96, &[a, b])).unwrap();
        let tracks: Vec<usize> = file.timed_events().iter().map(|e| e.track).collect();
        assert_eq!(tracks, [0, 0, 1, 1]);
    }

    #[test]
    fn test_format_2_is_sequential() {
        let file = MidiFile::parse(&smf(2, 96, &[NOTES, NOTES])).unwrap();
        let ticks: Vec<u64> = file
            .timed_events()
            .iter()
            .filter(|e| e.kind.as_channel().is_some())
            .map(|e| e.tick)
            .collect();
        assert_eq!(ticks, [96, 192, 288, 384]);
    }

    #[test]
    fn test_timecode_division() {
        // 25 fps, 40 ticks per frame -> 1000 ticks per second
        let division = ((-25i8 as u8 as u16) << 8) | 40;
        let track: &[u8] = &[0x87, 0x68, 0x90, 60, 100];
        let file = MidiFile::parse(&smf(0, division, &[track])).unwrap();
        assert_eq!(file.timing, Timing::Timecode(25, 40));
        assert_abs_diff_eq!(file.timed_events()[0].time, 1.0, epsilon = 1e-9);
        assert!(matches!(file.ticks_per_quarter(), Err(Error::UnsupportedTiming)));
    }

    #[test]
    fn test_load_from_disk() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&smf(0, 96, &[NOTES])).unwrap();
        let parsed = MidiFile::load(file.path()).unwrap();
        assert_eq!(parsed.tracks[0].len(), 3);
    }

    #[test]
    fn test_zero_tracks() {
        let data = smf(1, 96, &[]);
        assert!(matches!(MidiFile::parse(&data), Err(Error::NoTracks)));
    }

    #[test]
    fn test_oversized_track_chunk() {
        let mut data = smf(0, 96, &[NOTES]);
        let len = data.len();
        data[len - NOTES.len() - 1] = 0xFF;
        assert!(matches!(MidiFile::parse(&data), Err(Error::Format(_))));
    }

    #[test]
    fn test_format_2_tick_overflow() {
        let mut track = crate::vlq::to_bytes(1 << 63);
        track.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        let data = smf(2, 96, &[&track, &track]);
        assert!(matches!(MidiFile::parse(&data), Err(Error::Format(_))));
        // one track alone fits
        let data = smf(2, 96, &[&track]);
        assert_eq!(MidiFile::parse(&data).unwrap().tracks[0][0].tick, 1 << 63);
    }

    #[test]
    fn test_unknown_chunks_skipped() {
        let mut data = smf(0, 96, &[]);
        data[10..12].copy_from_slice(&1u16.to_be_bytes());
        data.extend(chunk(b"XFIH", &[1, 2, 3]));
        data.extend(chunk(b"MTrk", NOTES));
        let file = MidiFile::parse(&data).unwrap();
        assert_eq!(file.tracks.len(), 1);
    }

    #[test]
    fn test_matches_midly() {
        let data = smf(1, 96, &[CONDUCTOR, NOTES]);
        let ours = MidiFile::parse(&data).unwrap();
        let theirs = midly::Smf::parse(&data).unwrap();
        assert_eq!(ours.tracks.len(), theirs.tracks.len());
        for (a, b) in ours.tracks.iter().zip(&theirs.tracks) {
            assert_eq!(a.len(), b.len());
            for (ea, eb) in a.iter().zip(b) {
                assert_eq!(ea.delta, u64::from(eb.delta.as_int()));
                if let midly::TrackEventKind::Midi { channel, message } = eb.kind {
                    let ours = ea.kind.as_channel().unwrap();
                    assert_eq!(ours.channel, channel.as_int());
                    match message {
                        midly::MidiMessage::NoteOn { key, vel } => assert_eq!(
                            ours.message,
                            ChannelMessage::NoteOn { key: key.as_int(), velocity: vel.as_int() }
                        ),
                        midly::MidiMessage::NoteOff { key, vel } => assert_eq!(
                            ours.message,
                            ChannelMessage::NoteOff { key: key.as_int(), velocity: vel.as_int() }
                        ),
                        _ => {}
                    }
                }
            }
        }
    }
}
