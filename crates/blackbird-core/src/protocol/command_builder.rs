//! Command Builder
//!
//! Turns caller parameters into [`Command`]s and commands into wire bytes.
//!
//! Zone and source numbers are clamped into `1..=N` before encoding, never
//! wrapped. Every encoded command ends with the CR terminator.

use super::commands::{Command, PowerMode, ProtocolVariant};
use super::{DEFAULT_SOURCES, DEFAULT_ZONES, EOL};

/// Builds clamped commands and their wire encoding
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder {
    zones: u8,
    sources: u8,
    variant: ProtocolVariant,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ZONES, DEFAULT_SOURCES, ProtocolVariant::default())
    }
}

impl CommandBuilder {
    /// Builder for a matrix with the given zone and source counts
    pub fn new(zones: u8, sources: u8, variant: ProtocolVariant) -> Self {
        Self {
            zones: zones.max(1),
            sources: sources.max(1),
            variant,
        }
    }

    /// Firmware dialect used for encoding
    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Clamp a zone number into `1..=zones`
    pub fn clamp_zone(&self, zone: i32) -> u8 {
        zone.clamp(1, self.zones as i32) as u8
    }

    /// Clamp a source number into `1..=sources`
    pub fn clamp_source(&self, source: i32) -> u8 {
        source.clamp(1, self.sources as i32) as u8
    }

    /// Zone status query for a clamped zone
    pub fn zone_status(&self, zone: i32) -> Command {
        Command::ZoneStatus {
            zone: self.clamp_zone(zone),
        }
    }

    /// Open or close a clamped zone
    pub fn set_zone_power(&self, zone: i32, power: bool) -> Command {
        Command::SetZonePower {
            zone: self.clamp_zone(zone),
            power,
        }
    }

    /// Route a clamped source to a clamped zone
    pub fn set_zone_source(&self, zone: i32, source: i32) -> Command {
        Command::SetZoneSource {
            zone: self.clamp_zone(zone),
            source: self.clamp_source(source),
        }
    }

    /// Route a clamped source to every zone
    pub fn set_all_zone_source(&self, source: i32) -> Command {
        Command::SetAllZoneSource {
            source: self.clamp_source(source),
        }
    }

    /// Encode a command for the wire.
    ///
    /// Returns `None` when the variant has no literal for the command; the
    /// caller must then skip the round trip entirely.
    pub fn encode(&self, command: &Command) -> Option<Vec<u8>> {
        let text = match *command {
            Command::ZoneStatus { zone } => format!("Status{}.", zone),
            Command::SystemPowerStatus => "%9962.".to_string(),
            Command::SetSystemPower { mode } => self.variant.power_literal(mode)?.to_string(),
            Command::SetZonePower { zone, power } => {
                format!("{}{}.", zone, if power { '@' } else { '$' })
            }
            Command::SetZoneSource { zone, source } => format!("{}B{}.", source, zone),
            Command::SetAllZoneSource { source } => format!("{}All.", source),
            Command::LockFrontButtons => "/%Lock;".to_string(),
            Command::UnlockFrontButtons => "/%Unlock;".to_string(),
            Command::LockStatus => "%9961.".to_string(),
        };

        let mut bytes = text.into_bytes();
        bytes.extend_from_slice(EOL);
        Some(bytes)
    }

    /// Encode a system power switch for this variant
    pub fn encode_power(&self, mode: PowerMode) -> Option<Vec<u8>> {
        self.encode(&Command::SetSystemPower { mode })
    }
}
