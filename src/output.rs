//! MIDI output transport
//!
//! Opens the synthesizer's output port through midir and sends encoded
//! note messages to it.

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::midi::{format_hex, MidiMessage};

const CLIENT_NAME: &str = "Clicker-MIDI";

/// Destination for the bridge's note messages
pub trait NoteSink {
    /// Send one raw MIDI message
    fn send_raw(&mut self, data: &[u8]) -> Result<()>;

    fn send(&mut self, message: &MidiMessage) -> Result<()> {
        self.send_raw(&message.encode())
    }
}

/// midir-backed output connection
pub struct MidirSink {
    conn: MidiOutputConnection,
    port_name: String,
}

impl MidirSink {
    /// Open the first output port, or the first whose name contains `pattern`
    pub fn open(pattern: Option<&str>) -> Result<Self> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| BridgeError::Midi(e.to_string()))?;

        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, port_name) =
            find_output_port(&midi_out, pattern).ok_or_else(|| BridgeError::MidiOutputNotFound {
                pattern: pattern.map(str::to_string),
            })?;

        info!("Connecting to MIDI output: {}", port_name);

        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| BridgeError::Midi(e.to_string()))?;

        Ok(Self { conn, port_name })
    }

    /// Release the port
    pub fn close(self) {
        self.conn.close();
    }
}

impl NoteSink for MidirSink {
    fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        debug!("MIDI TX -> {}: {}", self.port_name, format_hex(data));
        self.conn
            .send(data)
            .map_err(|e| BridgeError::Midi(e.to_string()))
    }
}

/// Find an output port by case-insensitive substring, or the first port
fn find_output_port(
    midi_out: &MidiOutput,
    pattern: Option<&str>,
) -> Option<(MidiOutputPort, String)> {
    let mut ports: Vec<(MidiOutputPort, String)> = midi_out
        .ports()
        .into_iter()
        .filter_map(|port| midi_out.port_name(&port).ok().map(|name| (port, name)))
        .collect();

    let index = select_port(ports.iter().map(|(_, name)| name.as_str()), pattern)?;
    Some(ports.swap_remove(index))
}

/// Index of the port to use among `names`
pub fn select_port<'a>(
    names: impl IntoIterator<Item = &'a str>,
    pattern: Option<&str>,
) -> Option<usize> {
    let mut names = names.into_iter();
    match pattern {
        None => names.next().map(|_| 0),
        Some(pattern) => {
            let pattern = pattern.to_lowercase();
            names.position(|name| name.to_lowercase().contains(&pattern))
        }
    }
}

/// List available MIDI output port names
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out =
        MidiOutput::new("Clicker-MIDI-Scanner").map_err(|e| BridgeError::Midi(e.to_string()))?;

    let mut port_names = Vec::new();
    for port in midi_out.ports() {
        if let Ok(name) = midi_out.port_name(&port) {
            port_names.push(name);
        }
    }

    Ok(port_names)
}
