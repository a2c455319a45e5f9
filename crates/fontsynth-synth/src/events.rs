//! Synthesizer events and listener registry.
//!
//! Channels push [`SynthEvent`]s into an outbox while they process MIDI;
//! the synthesizer hands them to listeners after each dispatch.
//! Listeners run synchronously, in registration order, on whatever thread
//! drives the synthesizer.

/// Something observable that happened inside the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthEvent {
    NoteOn {
        channel: usize,
        key: u8,
        velocity: u8,
    },
    NoteOff {
        channel: usize,
        key: u8,
    },
    ControllerChange {
        channel: usize,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: usize,
        program: u16,
        bank: u16,
    },
    PitchWheel {
        channel: usize,
        value: u16,
    },
    ChannelMute {
        channel: usize,
        muted: bool,
    },
    DrumChange {
        channel: usize,
        is_drum: bool,
    },
    StopAll {
        channel: Option<usize>,
        force: bool,
    },
    AllControllerReset,
    BankChanged,
}

/// Discriminant of [`SynthEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    ControllerChange,
    ProgramChange,
    PitchWheel,
    ChannelMute,
    DrumChange,
    StopAll,
    AllControllerReset,
    BankChanged,
}

impl SynthEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SynthEvent::NoteOn { .. } => EventKind::NoteOn,
            SynthEvent::NoteOff { .. } => EventKind::NoteOff,
            SynthEvent::ControllerChange { .. } => EventKind::ControllerChange,
            SynthEvent::ProgramChange { .. } => EventKind::ProgramChange,
            SynthEvent::PitchWheel { .. } => EventKind::PitchWheel,
            SynthEvent::ChannelMute { .. } => EventKind::ChannelMute,
            SynthEvent::DrumChange { .. } => EventKind::DrumChange,
            SynthEvent::StopAll { .. } => EventKind::StopAll,
            SynthEvent::AllControllerReset => EventKind::AllControllerReset,
            SynthEvent::BankChanged => EventKind::BankChanged,
        }
    }
}

/// Handle returned by [`Listeners::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&SynthEvent) + Send>;

/// Registered callbacks, in registration order.
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(ListenerId, EventKind, Listener)>,
    next_id: u64,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, kind, listener));
        id
    }

    /// Returns `false` if no listener had this id.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dispatch(&mut self, event: &SynthEvent) {
        let kind = event.kind();
        for (_, listen_kind, listener) in self.entries.iter_mut() {
            if *listen_kind == kind {
                listener(event);
            }
        }
    }

    /// Dispatch and empty `outbox`.
    pub fn drain(&mut self, outbox: &mut Vec<SynthEvent>) {
        if self.entries.is_empty() {
            outbox.clear();
            return;
        }
        for event in outbox.drain(..) {
            self.dispatch(&event);
        }
    }
}
