//! Monophonic note controller
//!
//! Turns clicker status lines into button events, and button events into
//! the note on / note off messages that keep exactly one note sounding.

use tracing::{debug, warn};

use crate::config::{AppConfig, HandoffOrder};
use crate::midi::{MidiMessage, BASE_NOTE, DEFAULT_VELOCITY, MAX_NOTE};

const LINE_PREFIX: &str = "incoming: ";
const ADDRESS_SEPARATOR: &str = " --> ";
const ADDRESS_LEN: usize = 12;
const STOP_TOKEN: char = '?';

/// A button token decoded from a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Button with the given index (0-9) was pressed
    Press(u8),
    /// Silence the current note without starting a new one
    Stop,
}

/// A status line that carried a valid button token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    /// The 12-character address reported by the receiver
    pub address: &'a str,
    pub event: ButtonEvent,
}

impl ParsedLine<'_> {
    /// Device part of the address (first 6 characters)
    pub fn device(&self) -> &str {
        let end = self
            .address
            .char_indices()
            .nth(6)
            .map(|(i, _)| i)
            .unwrap_or(self.address.len());
        &self.address[..end]
    }
}

/// Parse a status line of the form `incoming: <12 chars> --> <token>`
///
/// Returns `None` for anything else, including a token that is neither a
/// decimal digit nor `?`.
pub fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix(LINE_PREFIX)?;

    // Address is 12 characters, not bytes
    let split = rest
        .char_indices()
        .nth(ADDRESS_LEN)
        .map(|(i, _)| i)?;
    let (address, rest) = rest.split_at(split);

    let token = rest.strip_prefix(ADDRESS_SEPARATOR)?;
    let mut chars = token.chars();
    let token = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    let event = match token {
        STOP_TOKEN => ButtonEvent::Stop,
        c if c.is_ascii_digit() => ButtonEvent::Press(c as u8 - b'0'),
        _ => return None,
    };

    Some(ParsedLine { address, event })
}

/// Parse a line, keeping only the button event
pub fn parse(line: &str) -> Option<ButtonEvent> {
    parse_line(line).map(|parsed| parsed.event)
}

/// Single-voice controller holding the currently sounding note
#[derive(Debug, Clone)]
pub struct NoteController {
    active_note: Option<u8>,
    base_note: u8,
    velocity: u8,
    channel: u8,
    handoff_order: HandoffOrder,
}

impl Default for NoteController {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteController {
    /// Controller with middle C as base note and velocity 112 on channel 1
    pub fn new() -> Self {
        Self {
            active_note: None,
            base_note: BASE_NOTE,
            velocity: DEFAULT_VELOCITY,
            channel: 0,
            handoff_order: HandoffOrder::OnThenOff,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            active_note: None,
            base_note: config.notes.base_note,
            velocity: config.notes.velocity,
            channel: config.midi.channel,
            handoff_order: config.notes.handoff_order,
        }
    }

    pub fn with_handoff_order(mut self, order: HandoffOrder) -> Self {
        self.handoff_order = order;
        self
    }

    /// The note now sounding, if any
    pub fn active_note(&self) -> Option<u8> {
        self.active_note
    }

    /// Note number a button index maps to, `None` past 127
    pub fn note_for(&self, button: u8) -> Option<u8> {
        self.base_note
            .checked_add(button)
            .filter(|&note| note <= MAX_NOTE)
    }

    /// Apply a button event and return the messages to send, in order
    ///
    /// When a press replaces a different note the result holds two
    /// messages; the caller pauses between them.
    pub fn handle(&mut self, event: ButtonEvent) -> Vec<MidiMessage> {
        match event {
            ButtonEvent::Press(button) => self.press(button),
            ButtonEvent::Stop => self.release_all(),
        }
    }

    fn press(&mut self, button: u8) -> Vec<MidiMessage> {
        let Some(note) = self.note_for(button) else {
            warn!(
                "Button {} maps past note {} (base {}), ignoring",
                button, MAX_NOTE, self.base_note
            );
            return Vec::new();
        };

        let note_on = MidiMessage::note_on(self.channel, note, self.velocity);
        let stale_off = self
            .active_note
            .filter(|&previous| previous != note)
            .map(|previous| MidiMessage::note_off(self.channel, previous));

        self.active_note = Some(note);
        debug!("Active note -> {}", note);

        match (stale_off, self.handoff_order) {
            (None, _) => vec![note_on],
            (Some(off), HandoffOrder::OnThenOff) => vec![note_on, off],
            (Some(off), HandoffOrder::OffThenOn) => vec![off, note_on],
        }
    }

    /// Release the active note, if any
    pub fn release_all(&mut self) -> Vec<MidiMessage> {
        match self.active_note.take() {
            Some(note) => {
                debug!("Releasing note {}", note);
                vec![MidiMessage::note_off(self.channel, note)]
            }
            None => Vec::new(),
        }
    }
}
