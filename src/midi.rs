//! MIDI note messages
//!
//! Encoding, decoding and display of the note messages the bridge emits.

use std::fmt;

/// Velocity sent with every note on
pub const DEFAULT_VELOCITY: u8 = 112;

/// Note number a button index is added to (middle C)
pub const BASE_NOTE: u8 = 60;

/// Highest valid MIDI note number
pub const MAX_NOTE: u8 = 127;

/// MIDI note messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
}

impl MidiMessage {
    /// Note on for `note` at `velocity`
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOn { channel, note, velocity }
    }

    /// Note off for `note`, always velocity 0
    pub fn note_off(channel: u8, note: u8) -> Self {
        MidiMessage::NoteOff { channel, note, velocity: 0 }
    }

    /// Decode raw bytes back into a note message, as captured from a sink
    ///
    /// A note on with velocity 0 is kept as `NoteOn`, not folded into `NoteOff`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }

        let status = data[0];
        let channel = status & 0x0F;
        let note = data[1] & 0x7F;
        let velocity = data[2] & 0x7F;

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff { channel, note, velocity }),
            0x90 => Some(MidiMessage::NoteOn { channel, note, velocity }),
            _ => None,
        }
    }

    /// Encode the message to its 3 MIDI bytes
    pub fn encode(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
