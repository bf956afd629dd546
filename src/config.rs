//! Configuration management for the clicker bridge
//!
//! Handles loading and validating the YAML configuration file. Every field
//! has a default, so running without a file uses the stock FT232 clicker
//! and the first MIDI output.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::error::BridgeError;
use crate::midi::{BASE_NOTE, DEFAULT_VELOCITY, MAX_NOTE};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub midi: MidiConfig,
    pub notes: NoteConfig,
}

/// Serial link to the clicker receiver
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SerialConfig {
    /// Substring matched against port name, manufacturer and product
    pub vendor: String,
    /// Explicit device path, bypasses vendor lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Maximum bytes taken per read
    pub chunk_size: usize,
    pub poll_interval_ms: u64,
}

/// MIDI output selection
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MidiConfig {
    /// Substring of the output port name; first port when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
    pub channel: u8,
}

/// Note mapping and hand-off behavior
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NoteConfig {
    pub base_note: u8,
    pub velocity: u8,
    pub handoff_delay_ms: u64,
    pub handoff_order: HandoffOrder,
}

/// Order of the two messages sent when one note replaces another
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandoffOrder {
    /// Start the new note, pause, then release the old one
    #[default]
    OnThenOff,
    /// Release the old note, pause, then start the new one
    OffThenOn,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            vendor: "FT232".to_string(),
            port: None,
            baud_rate: 115_200,
            read_timeout_ms: 250,
            chunk_size: 60,
            poll_interval_ms: 5,
        }
    }
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            base_note: BASE_NOTE,
            velocity: DEFAULT_VELOCITY,
            handoff_delay_ms: 10,
            handoff_order: HandoffOrder::default(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl NoteConfig {
    pub fn handoff_delay(&self) -> Duration {
        Duration::from_millis(self.handoff_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate YAML configuration
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Check ranges serde cannot express
    pub fn validate(&self) -> std::result::Result<(), BridgeError> {
        if self.midi.channel > 15 {
            return Err(BridgeError::InvalidConfig(format!(
                "midi.channel must be 0-15, got {}",
                self.midi.channel
            )));
        }
        if self.notes.base_note > MAX_NOTE {
            return Err(BridgeError::InvalidConfig(format!(
                "notes.base_note must be 0-127, got {}",
                self.notes.base_note
            )));
        }
        if self.notes.velocity == 0 || self.notes.velocity > 127 {
            return Err(BridgeError::InvalidConfig(format!(
                "notes.velocity must be 1-127, got {}",
                self.notes.velocity
            )));
        }
        if self.serial.chunk_size == 0 {
            return Err(BridgeError::InvalidConfig(
                "serial.chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
