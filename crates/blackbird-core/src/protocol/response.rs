//! Response parsing
//!
//! Turns decoded reply frames into typed status values. A reply that
//! matches nothing is `None`, not an error.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Routing state of one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStatus {
    /// Zone number, as requested
    pub zone: u8,
    /// Whether the zone output is on
    pub power: bool,
    /// AV source routed to the zone (`None` when off)
    pub av: Option<u8>,
    /// IR source routed to the zone (`None` when off)
    pub ir: Option<u8>,
}

/// One structural pattern for zone status replies
struct ZoneMatcher {
    name: &'static str,
    pattern: &'static str,
    build: fn(u8, &Captures<'_>) -> Option<ZoneStatus>,
}

const ZONE_MATCHERS: &[ZoneMatcher] = &[
    ZoneMatcher {
        name: "on",
        pattern: r"\D\D\D\s(\d\d)\D\D\d\d\s\s\D\D\D\s(\d\d)\D\D\d\d\s",
        build: zone_on,
    },
    ZoneMatcher {
        name: "off",
        pattern: r"\D\D\DOFF\D\D\d\d\s\s\D\D\D\D\D\D\D\D\d\d\s",
        build: zone_off,
    },
];

fn zone_on(zone: u8, caps: &Captures<'_>) -> Option<ZoneStatus> {
    Some(ZoneStatus {
        zone,
        power: true,
        av: caps.get(1)?.as_str().parse().ok(),
        ir: caps.get(2)?.as_str().parse().ok(),
    })
}

fn zone_off(zone: u8, _caps: &Captures<'_>) -> Option<ZoneStatus> {
    Some(ZoneStatus::off(zone))
}

fn zone_regexes() -> &'static [Regex] {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        ZONE_MATCHERS
            .iter()
            .map(|m| Regex::new(m.pattern).expect("zone pattern is a valid regex"))
            .collect()
    })
}

impl ZoneStatus {
    /// A powered-off zone with no routing
    pub fn off(zone: u8) -> Self {
        Self {
            zone,
            power: false,
            av: None,
            ir: None,
        }
    }

    /// Parse a zone status reply.
    ///
    /// Matchers are tried in order and the first hit wins.
    pub fn from_response(zone: u8, response: Option<&str>) -> Option<Self> {
        let response = response.filter(|s| !s.is_empty())?;
        for (matcher, regex) in ZONE_MATCHERS.iter().zip(zone_regexes()) {
            if let Some(caps) = regex.captures(response) {
                tracing::trace!(zone, matcher = matcher.name, "zone status matched");
                return (matcher.build)(zone, &caps);
            }
        }
        None
    }
}

/// Front panel lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    /// Whether the front panel buttons are locked
    pub locked: bool,
}

impl LockStatus {
    /// Parse a lock status reply; anything but `System Locked...` is unlocked
    pub fn from_response(response: Option<&str>) -> Option<Self> {
        let response = response.filter(|s| !s.is_empty())?;
        Some(Self {
            locked: response.starts_with("System Locked"),
        })
    }
}

/// Reported system power state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemPowerStatus {
    /// System on
    On,
    /// System off
    Off,
    /// Standby
    Standby,
    /// Token outside the documented set, kept verbatim
    Other(String),
}

const POWER_PREFIX_LEN: usize = 2;

impl SystemPowerStatus {
    /// Parse a power reply such as `PWON\r` by dropping the two-character
    /// prefix and trimming.
    pub fn from_response(response: Option<&str>) -> Option<Self> {
        let token = response?.get(POWER_PREFIX_LEN..)?.trim();
        if token.is_empty() {
            return None;
        }
        Some(match token {
            "ON" => SystemPowerStatus::On,
            "OFF" => SystemPowerStatus::Off,
            "STANDBY" => SystemPowerStatus::Standby,
            other => SystemPowerStatus::Other(other.to_string()),
        })
    }

    /// Whether the system reports itself on
    pub fn is_on(&self) -> bool {
        matches!(self, SystemPowerStatus::On)
    }

    /// Normalized token as reported by the matrix
    pub fn as_str(&self) -> &str {
        match self {
            SystemPowerStatus::On => "ON",
            SystemPowerStatus::Off => "OFF",
            SystemPowerStatus::Standby => "STANDBY",
            SystemPowerStatus::Other(token) => token,
        }
    }
}

impl fmt::Display for SystemPowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_zone_status_on() {
        let status =
            ZoneStatus::from_response(1, Some("AV: 02->01\r\nIR: 02->01\r")).unwrap();
        assert_eq!(
            status,
            ZoneStatus {
                zone: 1,
                power: true,
                av: Some(2),
                ir: Some(2),
            }
        );
    }

    #[test]
    fn test_zone_status_distinct_sources() {
        let status =
            ZoneStatus::from_response(3, Some("AV: 05->03\r\nIR: 07->03\r")).unwrap();
        assert_eq!(status.av, Some(5));
        assert_eq!(status.ir, Some(7));
    }

    #[test]
    fn test_zone_status_off() {
        let status =
            ZoneStatus::from_response(4, Some("AV:OFF->04\r\nIR:OFF->04\r")).unwrap();
        assert_eq!(status, ZoneStatus::off(4));
    }

    #[test]
    fn test_zone_status_broken() {
        assert_eq!(ZoneStatus::from_response(1, None), None);
        assert_eq!(ZoneStatus::from_response(1, Some("")), None);
        assert_eq!(ZoneStatus::from_response(1, Some("VA: 09-<01\r")), None);
        assert_eq!(ZoneStatus::from_response(8, Some("\r\n\r\n")), None);
        assert_eq!(ZoneStatus::from_response(1, Some("AV: 02->01")), None);
    }

    #[test]
    fn test_zone_status_deterministic() {
        let raw = "AV: 03->02\r\nIR: 03->02\r";
        assert_eq!(
            ZoneStatus::from_response(2, Some(raw)),
            ZoneStatus::from_response(2, Some(raw))
        );
    }

    #[test]
    fn test_lock_status() {
        assert_eq!(
            LockStatus::from_response(Some("System Locked!\r")),
            Some(LockStatus { locked: true })
        );
        assert_eq!(
            LockStatus::from_response(Some("System UnLock!\r")),
            Some(LockStatus { locked: false })
        );
        assert_eq!(LockStatus::from_response(Some("")), None);
        assert_eq!(LockStatus::from_response(None), None);
    }

    #[test]
    fn test_power_status_tokens() {
        assert_eq!(
            SystemPowerStatus::from_response(Some("PWON\r")),
            Some(SystemPowerStatus::On)
        );
        assert_eq!(
            SystemPowerStatus::from_response(Some("PWOFF\r")),
            Some(SystemPowerStatus::Off)
        );
        assert_eq!(
            SystemPowerStatus::from_response(Some("PWSTANDBY\r")),
            Some(SystemPowerStatus::Standby)
        );
    }

    #[test]
    fn test_power_status_passthrough() {
        let status = SystemPowerStatus::from_response(Some("PWBOOTING \r")).unwrap();
        assert_eq!(status, SystemPowerStatus::Other("BOOTING".to_string()));
        assert!(!status.is_on());
        assert_eq!(status.to_string(), "BOOTING");
    }

    #[test]
    fn test_power_status_too_short() {
        assert_eq!(SystemPowerStatus::from_response(None), None);
        assert_eq!(SystemPowerStatus::from_response(Some("P")), None);
        assert_eq!(SystemPowerStatus::from_response(Some("PW\r")), None);
    }
}
