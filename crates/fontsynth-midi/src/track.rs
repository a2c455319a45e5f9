//! Lazy decoding of one `MTrk` body.
//!
//! Event layout: `delta(VLQ) status data...`. A data byte in status
//! position reuses the last channel status (running status). Meta and
//! SysEx events do not change the running status.

use crate::error::{Error, Result};
use crate::event::{ChannelEvent, ChannelMessage, EventKind, TrackEvent};
use crate::vlq;
use tracing::{trace, warn};

/// Iterator over the events of one track.
///
/// Cloning a reader snapshots its position; [`TrackReader::reset`] restarts
/// from the first event.
#[derive(Debug, Clone)]
pub struct TrackReader<'a> {
    data: &'a [u8],
    pos: usize,
    tick: u64,
    running_status: Option<u8>,
    /// `F0` packet still waiting for its `F7` continuation
    pending_sysex: Option<Vec<u8>>,
    failed: bool,
}

impl<'a> TrackReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            tick: 0,
            running_status: None,
            pending_sysex: None,
            failed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.data);
    }

    /// Ticks of the last decoded event.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::format(format!("track truncated at byte {}", self.pos)))?;
        self.pos += 1;
        Ok(byte)
    }

    fn vlq(&mut self) -> Result<u64> {
        let (value, len) = vlq::decode(&self.data[self.pos..])?;
        self.pos += len;
        Ok(value)
    }

    /// Add the next delta to `delta`, rejecting sums past `u64::MAX`.
    fn advance(&mut self, delta: u64) -> Result<u64> {
        let at = self.pos;
        delta
            .checked_add(self.vlq()?)
            .ok_or_else(|| Error::format(format!("tick overflow at byte {at}")))
    }

    fn bytes(&mut self, len: u64) -> Result<&'a [u8]> {
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| self.pos.checked_add(len))
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::format(format!(
                    "event at byte {} declares {len} bytes past the end of the track",
                    self.pos
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Decode the next event, or `None` at the end of the data.
    fn read_event(&mut self) -> Result<Option<TrackEvent>> {
        let mut delta = 0;
        loop {
            if self.pos >= self.data.len() {
                if let Some(pending) = self.pending_sysex.take() {
                    warn!("track ended inside a SysEx message ({} bytes dropped)", pending.len());
                }
                return Ok(None);
            }

            delta = self.advance(delta)?;
            let start = self.pos;
            let first = self.byte()?;

            let status = if first >= 0x80 {
                first
            } else if let Some(running) = self.running_status {
                self.pos -= 1;
                running
            } else {
                warn!("data byte {first:#04x} at {start} with no running status, skipped");
                continue;
            };

            let kind = match status {
                0xFF => {
                    let kind = self.byte()?;
                    let len = self.vlq()?;
                    let data = self.bytes(len)?.to_vec();
                    EventKind::Meta { kind, data }
                }
                0xF0 => {
                    let len = self.vlq()?;
                    let packet = self.bytes(len)?;
                    match packet.split_last() {
                        Some((0xF7, body)) => EventKind::SysEx(body.to_vec()),
                        _ => {
                            trace!("SysEx at {start} continues in a later packet");
                            self.pending_sysex = Some(packet.to_vec());
                            continue;
                        }
                    }
                }
                0xF7 => {
                    let len = self.vlq()?;
                    let packet = self.bytes(len)?;
                    match self.pending_sysex.take() {
                        Some(mut pending) => match packet.split_last() {
                            Some((0xF7, body)) => {
                                pending.extend_from_slice(body);
                                EventKind::SysEx(pending)
                            }
                            _ => {
                                pending.extend_from_slice(packet);
                                self.pending_sysex = Some(pending);
                                continue;
                            }
                        },
                        None => EventKind::Escape(packet.to_vec()),
                    }
                }
                0xF1..=0xFE => EventKind::System(status),
                _ => {
                    let data = self.bytes(ChannelMessage::data_len(status) as u64)?;
                    self.running_status = Some(status);
                    let message = ChannelMessage::from_status(status, data)
                        .ok_or_else(|| Error::format(format!("bad status {status:#04x}")))?;
                    EventKind::Channel(ChannelEvent {
                        status,
                        channel: status & 0x0F,
                        message,
                    })
                }
            };

            self.tick = self
                .tick
                .checked_add(delta)
                .ok_or_else(|| Error::format(format!("tick overflow at byte {start}")))?;
            return Ok(Some(TrackEvent {
                delta,
                tick: self.tick,
                kind,
            }));
        }
    }
}

impl Iterator for TrackReader<'_> {
    type Item = Result<TrackEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_event() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::meta;

    fn decode(data: &[u8]) -> Vec<TrackEvent> {
        TrackReader::new(data).collect::<Result<Vec<_>>>().unwrap()
    }

    fn channel(event: &TrackEvent) -> ChannelEvent {
        *event.kind.as_channel().unwrap()
    }

    #[test]
    fn test_running_status() {
        // [0x90,60,100, 62,100, 0x80,60,0] with zero deltas
        let data = [0x00, 0x90, 60, 100, 0x00, 62, 100, 0x00, 0x80, 60, 0];
        let events = decode(&data);
        assert_eq!(events.len(), 3);

        let second = channel(&events[1]);
        assert_eq!(second.status, 0x90);
        assert_eq!(second.message, ChannelMessage::NoteOn { key: 62, velocity: 100 });

        let third = channel(&events[2]);
        assert_eq!(third.status, 0x80);
        assert_eq!(third.message, ChannelMessage::NoteOff { key: 60, velocity: 0 });
    }

    #[test]
    fn test_cumulative_ticks() {
        let data = [0x00, 0x90, 60, 100, 0x81, 0x00, 0x80, 60, 0, 0x10, 0xFF, 0x2F, 0x00];
        let events = decode(&data);
        let ticks: Vec<u64> = events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, [0, 128, 144]);
        assert!(events[2].kind.is_end_of_track());
    }

    #[test]
    fn test_meta_keeps_running_status() {
        let data = [
            0x00, 0xC1, 5, // program change
            0x00, 0xFF, meta::TEXT, 2, b'h', b'i', // text
            0x00, 7, // running status program change
        ];
        let events = decode(&data);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind.text().as_deref(), Some("hi"));
        assert_eq!(channel(&events[2]).message, ChannelMessage::ProgramChange { program: 7 });
        assert_eq!(channel(&events[2]).channel, 1);
    }

    #[test]
    fn test_sysex_continuation_concatenated() {
        let data = [
            0x00, 0xF0, 3, 0x7E, 0x7F, 0x09, // no F7: incomplete
            0x05, 0xF7, 2, 0x01, 0xF7, // continuation with terminator
        ];
        let events = decode(&data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SysEx(vec![0x7E, 0x7F, 0x09, 0x01]));
        assert_eq!(events[0].tick, 5);
    }

    #[test]
    fn test_escape_without_pending() {
        let events = decode(&[0x00, 0xF7, 2, 0xF8, 0xFA]);
        assert_eq!(events[0].kind, EventKind::Escape(vec![0xF8, 0xFA]));
    }

    #[test]
    fn test_orphan_data_byte_skipped() {
        let data = [0x00, 0x3C, 0x00, 0x90, 60, 100];
        let events = decode(&data);
        assert_eq!(events.len(), 1);
        assert_eq!(channel(&events[0]).message, ChannelMessage::NoteOn { key: 60, velocity: 100 });
    }

    #[test]
    fn test_truncated_event_is_error_then_stops() {
        let mut reader = TrackReader::new(&[0x00, 0x90, 60]);
        assert!(matches!(reader.next(), Some(Err(Error::Format(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_oversized_meta_length() {
        let mut reader = TrackReader::new(&[0x00, 0xFF, 0x01, 0x7F, b'a']);
        assert!(matches!(reader.next(), Some(Err(Error::Format(_)))));
    }

    #[test]
    fn test_tick_overflow_is_format_error() {
        let mut data = Vec::new();
        for _ in 0..2 {
            vlq::encode(1 << 63, &mut data);
            data.extend_from_slice(&[0xFF, 0x01, 0x00]);
        }
        let mut reader = TrackReader::new(&data);
        assert_eq!(reader.next().unwrap().unwrap().tick, 1 << 63);
        assert!(matches!(reader.next(), Some(Err(Error::Format(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reset_restarts() {
        let data = [0x00, 0x90, 60, 100, 0x00, 62, 100];
        let mut reader = TrackReader::new(&data);
        let first: Vec<_> = reader.by_ref().collect();
        assert!(reader.next().is_none());
        reader.reset();
        let second: Vec<_> = reader.collect();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }
}
