//! Error types for the clicker bridge

use thiserror::Error;

/// Failures surfaced by the bridge and its device collaborators
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No serial port matched the vendor string, or the given path is absent
    #[error("The clicker isn't plugged in! (no serial port matching '{port}')")]
    SerialNotFound { port: String },

    /// No MIDI output port is available (or none matched the pattern)
    #[error("The synthesizer isn't plugged in!{}", pattern_suffix(.pattern))]
    MidiOutputNotFound { pattern: Option<String> },

    /// Opening or reading the serial device failed
    #[error("Serial transport failed: {0}")]
    Serial(String),

    /// Sending to the MIDI device failed
    #[error("MIDI transport failed: {0}")]
    Midi(String),

    /// Configuration holds a value outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn pattern_suffix(pattern: &Option<String>) -> String {
    match pattern {
        Some(p) => format!(" (no MIDI output matching '{}')", p),
        None => String::new(),
    }
}

impl From<serialport::Error> for BridgeError {
    fn from(e: serialport::Error) -> Self {
        BridgeError::Serial(e.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Serial(e.to_string())
    }
}

impl BridgeError {
    /// Whether this error means a device was absent at startup
    pub fn is_device_missing(&self) -> bool {
        matches!(
            self,
            BridgeError::SerialNotFound { .. } | BridgeError::MidiOutputNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_missing_messages() {
        let err = BridgeError::SerialNotFound {
            port: "FT232".to_string(),
        };
        assert!(err.is_device_missing());
        assert!(err.to_string().starts_with("The clicker isn't plugged in!"));

        let err = BridgeError::MidiOutputNotFound { pattern: None };
        assert_eq!(err.to_string(), "The synthesizer isn't plugged in!");

        let err = BridgeError::MidiOutputNotFound {
            pattern: Some("FluidSynth".to_string()),
        };
        assert!(err.to_string().contains("'FluidSynth'"));
    }

    #[test]
    fn test_transport_errors_are_not_device_missing() {
        assert!(!BridgeError::Midi("closed".to_string()).is_device_missing());
        assert!(!BridgeError::Serial("unplugged".to_string()).is_device_missing());
    }
}
