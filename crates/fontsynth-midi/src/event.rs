//! Decoded MIDI events.

/// Meta event types the engine reacts to.
pub mod meta {
    pub const SEQUENCE_NUMBER: u8 = 0x00;
    pub const TEXT: u8 = 0x01;
    pub const COPYRIGHT: u8 = 0x02;
    pub const TRACK_NAME: u8 = 0x03;
    pub const INSTRUMENT_NAME: u8 = 0x04;
    pub const LYRIC: u8 = 0x05;
    pub const MARKER: u8 = 0x06;
    pub const CUE_POINT: u8 = 0x07;
    pub const MIDI_PORT: u8 = 0x21;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const SET_TEMPO: u8 = 0x51;
    pub const TIME_SIGNATURE: u8 = 0x58;
    pub const KEY_SIGNATURE: u8 = 0x59;
}

/// Default tempo when a file sets none (120 BPM).
pub const DEFAULT_TEMPO_MICROS: u32 = 500_000;

/// Channel voice message without its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    PolyPressure { key: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// 14-bit value, 8192 = center
    PitchBend { value: u16 },
}

impl ChannelMessage {
    /// Data bytes that follow a status byte with this high nibble.
    #[inline]
    pub fn data_len(status: u8) -> usize {
        match status & 0xF0 {
            0xC0 | 0xD0 => 1,
            _ => 2,
        }
    }

    /// Build from a status byte (0x80-0xEF) and its data bytes.
    pub fn from_status(status: u8, data: &[u8]) -> Option<Self> {
        let d0 = data.first().copied().unwrap_or(0) & 0x7F;
        let d1 = data.get(1).copied().unwrap_or(0) & 0x7F;
        Some(match status & 0xF0 {
            0x80 => Self::NoteOff { key: d0, velocity: d1 },
            0x90 => Self::NoteOn { key: d0, velocity: d1 },
            0xA0 => Self::PolyPressure { key: d0, pressure: d1 },
            0xB0 => Self::ControlChange { controller: d0, value: d1 },
            0xC0 => Self::ProgramChange { program: d0 },
            0xD0 => Self::ChannelPressure { pressure: d0 },
            0xE0 => Self::PitchBend {
                value: (u16::from(d1) << 7) | u16::from(d0),
            },
            _ => return None,
        })
    }

    /// Status nibble (0x80-0xE0).
    pub fn status_nibble(&self) -> u8 {
        match self {
            Self::NoteOff { .. } => 0x80,
            Self::NoteOn { .. } => 0x90,
            Self::PolyPressure { .. } => 0xA0,
            Self::ControlChange { .. } => 0xB0,
            Self::ProgramChange { .. } => 0xC0,
            Self::ChannelPressure { .. } => 0xD0,
            Self::PitchBend { .. } => 0xE0,
        }
    }

    /// Note-on with velocity 0 counts as note-off.
    pub fn is_note_on(&self) -> bool {
        matches!(self, Self::NoteOn { velocity, .. } if *velocity > 0)
    }
}

/// A channel voice event from a stream or file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Full status byte as used for this event (reused under running status)
    pub status: u8,
    pub channel: u8,
    pub message: ChannelMessage,
}

impl ChannelEvent {
    /// Parse a complete short message (`status data...`).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if !(0x80..0xF0).contains(&status) || data.len() < ChannelMessage::data_len(status) {
            return None;
        }
        Some(Self {
            status,
            channel: status & 0x0F,
            message: ChannelMessage::from_status(status, data)?,
        })
    }
}

/// Event payloads a track can contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Channel(ChannelEvent),
    Meta { kind: u8, data: Vec<u8> },
    /// Complete system exclusive message, without the leading `F0` or the
    /// trailing `F7`.
    SysEx(Vec<u8>),
    /// `F7` packet with no pending SysEx (raw bytes to transmit).
    Escape(Vec<u8>),
    /// System common / realtime status byte carrying no data.
    System(u8),
}

impl EventKind {
    /// Tempo in microseconds per quarter note, for `Set Tempo` meta events.
    pub fn tempo(&self) -> Option<u32> {
        match self {
            Self::Meta { kind, data } if *kind == meta::SET_TEMPO && data.len() >= 3 => {
                Some(u32::from_be_bytes([0, data[0], data[1], data[2]]))
            }
            _ => None,
        }
    }

    /// Text payload of text-like meta events (0x01-0x07).
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Meta { kind, data } if (meta::TEXT..=meta::CUE_POINT).contains(kind) => {
                Some(String::from_utf8_lossy(data).into_owned())
            }
            _ => None,
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(self, Self::Meta { kind, .. } if *kind == meta::END_OF_TRACK)
    }

    pub fn as_channel(&self) -> Option<&ChannelEvent> {
        match self {
            Self::Channel(event) => Some(event),
            _ => None,
        }
    }
}

/// One decoded track event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEvent {
    /// Ticks since the previous event
    pub delta: u64,
    /// Ticks since the start of the track
    pub tick: u64,
    pub kind: EventKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_parsing() {
        let e = ChannelEvent::from_bytes(&[0x93, 60, 100]).unwrap();
        assert_eq!(e.channel, 3);
        assert_eq!(e.message, ChannelMessage::NoteOn { key: 60, velocity: 100 });

        let e = ChannelEvent::from_bytes(&[0xC5, 12]).unwrap();
        assert_eq!(e.message, ChannelMessage::ProgramChange { program: 12 });

        assert!(ChannelEvent::from_bytes(&[0x90, 60]).is_none());
        assert!(ChannelEvent::from_bytes(&[0xF0, 1, 2]).is_none());
        assert!(ChannelEvent::from_bytes(&[]).is_none());
    }

    #[test]
    fn test_pitch_bend_14_bit() {
        let e = ChannelEvent::from_bytes(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(e.message, ChannelMessage::PitchBend { value: 8192 });
        let e = ChannelEvent::from_bytes(&[0xE0, 0x7F, 0x7F]).unwrap();
        assert_eq!(e.message, ChannelMessage::PitchBend { value: 16383 });
    }

    #[test]
    fn test_zero_velocity_is_not_note_on() {
        assert!(!ChannelMessage::NoteOn { key: 60, velocity: 0 }.is_note_on());
        assert!(ChannelMessage::NoteOn { key: 60, velocity: 1 }.is_note_on());
    }

    #[test]
    fn test_tempo_meta() {
        let kind = EventKind::Meta {
            kind: meta::SET_TEMPO,
            data: vec![0x07, 0xA1, 0x20],
        };
        assert_eq!(kind.tempo(), Some(500_000));
        assert_eq!(kind.text(), None);
    }
}
