//! Protocol commands
//!
//! Defines the commands understood by the Blackbird matrix and the
//! firmware dialects that decide which of them exist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

/// System power modes accepted by `set_system_power`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    /// System on
    On,
    /// System off
    Off,
    /// Low-power standby
    Standby,
}

impl FromStr for PowerMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(PowerMode::On),
            "off" => Ok(PowerMode::Off),
            "standby" => Ok(PowerMode::Standby),
            other => Err(ProtocolError::UnsupportedCommand(format!(
                "unknown power mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerMode::On => write!(f, "on"),
            PowerMode::Off => write!(f, "off"),
            PowerMode::Standby => write!(f, "standby"),
        }
    }
}

/// Firmware dialect spoken by the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Early 8x8 firmware: zone queries always answer, no standby command
    #[default]
    Classic,
    /// Later firmware: zone queries are invalid while the system is off
    PowerAware,
}

impl ProtocolVariant {
    /// Wire literal for a system power mode, if this dialect has one
    pub fn power_literal(&self, mode: PowerMode) -> Option<&'static str> {
        match (self, mode) {
            (_, PowerMode::On) => Some("PWON."),
            (_, PowerMode::Off) => Some("PWOFF."),
            (ProtocolVariant::PowerAware, PowerMode::Standby) => Some("PWSTANDBY."),
            (ProtocolVariant::Classic, PowerMode::Standby) => None,
        }
    }

    /// Whether zone status must be preceded by a system power query
    pub fn requires_power_precheck(&self) -> bool {
        matches!(self, ProtocolVariant::PowerAware)
    }
}

/// Protocol commands for matrix communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Query routing of one zone (`Status{zone}.`)
    ZoneStatus {
        /// Zone to query
        zone: u8,
    },

    /// Query system power (`%9962.`)
    SystemPowerStatus,

    /// Switch system power (`PWON.`, `PWOFF.`, `PWSTANDBY.`)
    SetSystemPower {
        /// Target power mode
        mode: PowerMode,
    },

    /// Open (`@`) or close (`$`) one zone output
    SetZonePower {
        /// Zone output
        zone: u8,
        /// Open when true, close when false
        power: bool,
    },

    /// Route a source to one zone (`{source}B{zone}.`)
    SetZoneSource {
        /// Zone output
        zone: u8,
        /// Source input
        source: u8,
    },

    /// Route a source to every zone (`{source}All.`)
    SetAllZoneSource {
        /// Source input
        source: u8,
    },

    /// Lock front panel buttons (`/%Lock;`)
    LockFrontButtons,

    /// Unlock front panel buttons (`/%Unlock;`)
    UnlockFrontButtons,

    /// Query front panel lock (`%9961.`)
    LockStatus,
}

impl Command {
    /// Minimum reply length before a CR is taken as end of frame.
    ///
    /// Zone status replies carry an embedded CR after the AV line.
    pub fn skip(&self) -> usize {
        match self {
            Command::ZoneStatus { .. } => 15,
            _ => 0,
        }
    }

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Command::ZoneStatus { .. } => "zone_status",
            Command::SystemPowerStatus => "system_power_status",
            Command::SetSystemPower { .. } => "set_system_power",
            Command::SetZonePower { .. } => "set_zone_power",
            Command::SetZoneSource { .. } => "set_zone_source",
            Command::SetAllZoneSource { .. } => "set_all_zone_source",
            Command::LockFrontButtons => "lock_front_buttons",
            Command::UnlockFrontButtons => "unlock_front_buttons",
            Command::LockStatus => "lock_status",
        }
    }

    /// Check if the caller interprets the reply
    pub fn expects_status(&self) -> bool {
        matches!(
            self,
            Command::ZoneStatus { .. } | Command::SystemPowerStatus | Command::LockStatus
        )
    }

    /// Recover a command from its wire form.
    ///
    /// Accepts the bytes produced by [`CommandBuilder`](super::CommandBuilder),
    /// with or without the trailing CR.
    pub fn from_wire(bytes: &[u8]) -> Option<Command> {
        let text = std::str::from_utf8(bytes).ok()?;
        let text = text.strip_suffix('\r').unwrap_or(text);

        match text {
            "%9962." => return Some(Command::SystemPowerStatus),
            "%9961." => return Some(Command::LockStatus),
            "/%Lock;" => return Some(Command::LockFrontButtons),
            "/%Unlock;" => return Some(Command::UnlockFrontButtons),
            "PWON." => return Some(Command::SetSystemPower { mode: PowerMode::On }),
            "PWOFF." => return Some(Command::SetSystemPower { mode: PowerMode::Off }),
            "PWSTANDBY." => {
                return Some(Command::SetSystemPower {
                    mode: PowerMode::Standby,
                })
            }
            _ => {}
        }

        let body = text.strip_suffix('.')?;

        if let Some(zone) = body.strip_prefix("Status") {
            return Some(Command::ZoneStatus {
                zone: parse_number(zone)?,
            });
        }
        if let Some(source) = body.strip_suffix("All") {
            return Some(Command::SetAllZoneSource {
                source: parse_number(source)?,
            });
        }
        if let Some(zone) = body.strip_suffix('@') {
            return Some(Command::SetZonePower {
                zone: parse_number(zone)?,
                power: true,
            });
        }
        if let Some(zone) = body.strip_suffix('$') {
            return Some(Command::SetZonePower {
                zone: parse_number(zone)?,
                power: false,
            });
        }
        if let Some((source, zone)) = body.split_once('B') {
            return Some(Command::SetZoneSource {
                zone: parse_number(zone)?,
                source: parse_number(source)?,
            });
        }

        None
    }
}

fn parse_number(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
