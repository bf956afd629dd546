//! Port listing for `--list-ports`

use colored::*;

use crate::config::AppConfig;
use crate::output::{list_output_ports, select_port};
use crate::serial::{describe_port, find_port, list_ports};

/// Print serial and MIDI output ports, marking the ones the bridge would use
pub fn list_ports_formatted(config: &AppConfig) {
    println!("\n{}", "=== Available Ports ===".bold().cyan());

    println!("\n{}", "Serial Ports:".bold());
    match list_ports() {
        Ok(ports) if ports.is_empty() => println!("  {}", "No serial ports found".dimmed()),
        Ok(ports) => {
            let selected = find_port(&ports, &config.serial.vendor).map(|p| p.port_name.clone());
            for port in &ports {
                let marker = if Some(&port.port_name) == selected.as_ref() {
                    "[CLICKER]".green()
                } else {
                    "         ".normal()
                };
                println!("  {} {}", marker, describe_port(port));
            }
        }
        Err(e) => println!("  {}", format!("Failed to list serial ports: {}", e).red()),
    }

    println!("\n{}", "MIDI Output Ports:".bold());
    match list_output_ports() {
        Ok(names) if names.is_empty() => println!("  {}", "No output ports found".dimmed()),
        Ok(names) => {
            let selected = select_port(
                names.iter().map(String::as_str),
                config.midi.output_port.as_deref(),
            );
            for (i, name) in names.iter().enumerate() {
                let marker = if Some(i) == selected {
                    "[SYNTH]".green()
                } else {
                    "       ".normal()
                };
                println!("  {} {}", marker, name);
            }
        }
        Err(e) => println!("  {}", format!("Failed to list MIDI ports: {}", e).red()),
    }

    println!();
}
