//! # Blackbird Core Library
//!
//! Client driver for Monoprice Blackbird multi-zone audio/video matrix
//! amplifiers.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Command encoding for the Blackbird ASCII control protocol
//! - CR-terminated frame reading with a per-command skip threshold
//! - Parsing of zone, lock and system power replies
//! - A blocking client ([`client::Blackbird`]) over serial or TCP
//! - A tokio client ([`client::AsyncBlackbird`]) fed by a background listener
//!
//! ## Example
//!
//! ```rust,ignore
//! use blackbird_core::prelude::*;
//!
//! let blackbird = Blackbird::open_serial("/dev/ttyUSB0")?;
//! blackbird.set_zone_source(1, 3)?;
//!
//! if let Some(status) = blackbird.zone_status(1)? {
//!     println!("zone {} power={} av={:?}", status.zone, status.power, status.av);
//! }
//! ```

pub mod client;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{AsyncBlackbird, Blackbird};
    pub use crate::protocol::{
        ConnectionConfig, LockStatus, PowerMode, ProtocolError, ProtocolVariant,
        SystemPowerStatus, TransportConfig, ZoneStatus,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
