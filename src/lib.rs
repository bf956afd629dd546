//! Clicker MIDI - serial clicker to monophonic MIDI notes
//!
//! Reads status lines from a clicker receiver over a serial link and plays
//! one sustained note per button, released by the next press or by `?`.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod midi;
pub mod output;
pub mod ports;
pub mod serial;

pub use bridge::Bridge;
pub use config::{AppConfig, HandoffOrder};
pub use controller::{parse, parse_line, ButtonEvent, NoteController, ParsedLine};
pub use error::BridgeError;
pub use midi::MidiMessage;
pub use output::{MidirSink, NoteSink};
pub use serial::{ByteSource, LineSplitter};
