//! Blocking client

use parking_lot::ReentrantMutex;
use std::cell::RefCell;

use super::encode_command;
use crate::protocol::{
    Command, CommandBuilder, CommunicationChannel, Connection, ConnectionConfig, LockStatus,
    PowerMode, Result, SystemPowerStatus, ZoneStatus,
};

/// Blocking Blackbird client.
///
/// Every operation holds a reentrant lock for its whole exchange, so the
/// client can be shared between threads behind an `Arc` and an operation
/// may call another one on the same thread.
pub struct Blackbird {
    connection: ReentrantMutex<RefCell<Connection>>,
    builder: CommandBuilder,
}

impl Blackbird {
    /// Open the link described by `config`
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        let connection = Connection::open(config)?;
        tracing::info!(endpoint = %connection.describe(), "Blackbird connected");
        Ok(Self::with_connection(connection, config.command_builder()))
    }

    /// Open a serial port with default settings
    pub fn open_serial(port: &str) -> Result<Self> {
        Self::open(&ConnectionConfig::serial(port))
    }

    /// Connect over TCP on the default port
    pub fn connect_tcp(host: &str) -> Result<Self> {
        Self::open(&ConnectionConfig::tcp(host))
    }

    /// Use an already opened channel
    pub fn with_channel(channel: Box<dyn CommunicationChannel>, config: &ConnectionConfig) -> Self {
        Self::with_connection(
            Connection::new(channel, config.timeout()),
            config.command_builder(),
        )
    }

    fn with_connection(connection: Connection, builder: CommandBuilder) -> Self {
        Self {
            connection: ReentrantMutex::new(RefCell::new(connection)),
            builder,
        }
    }

    /// Cumulative tx bytes, rx bytes, tx frames, rx frames
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        self.connection.lock().borrow().get_counters()
    }

    fn request(&self, command: &Command) -> Result<String> {
        let bytes = encode_command(&self.builder, command)?;
        let guard = self.connection.lock();
        let mut connection = guard.borrow_mut();
        connection.execute(&bytes, command.skip())
    }

    /// Status of one zone, or `None` when the reply is not understood.
    ///
    /// On power-aware firmware the system power is checked first; unless
    /// it is on, an off status is returned without querying the zone.
    pub fn zone_status(&self, zone: i32) -> Result<Option<ZoneStatus>> {
        let _guard = self.connection.lock();
        let zone = self.builder.clamp_zone(zone);

        if self.builder.variant().requires_power_precheck() {
            let power = self.system_power_status()?;
            if !power.as_ref().is_some_and(SystemPowerStatus::is_on) {
                tracing::debug!(zone, power = ?power, "System not on, zone reported off");
                return Ok(Some(ZoneStatus::off(zone)));
            }
        }

        let reply = self.request(&Command::ZoneStatus { zone })?;
        Ok(ZoneStatus::from_response(zone, Some(&reply)))
    }

    /// System power state
    pub fn system_power_status(&self) -> Result<Option<SystemPowerStatus>> {
        let reply = self.request(&Command::SystemPowerStatus)?;
        Ok(SystemPowerStatus::from_response(Some(&reply)))
    }

    /// Switch system power
    pub fn set_system_power(&self, mode: PowerMode) -> Result<()> {
        self.request(&Command::SetSystemPower { mode }).map(drop)
    }

    /// Turn zone on or off
    pub fn set_zone_power(&self, zone: i32, power: bool) -> Result<()> {
        self.request(&self.builder.set_zone_power(zone, power))
            .map(drop)
    }

    /// Set source for zone; the source is clamped to the valid range
    pub fn set_zone_source(&self, zone: i32, source: i32) -> Result<()> {
        self.request(&self.builder.set_zone_source(zone, source))
            .map(drop)
    }

    /// Set source for all zones
    pub fn set_all_zone_source(&self, source: i32) -> Result<()> {
        self.request(&self.builder.set_all_zone_source(source))
            .map(drop)
    }

    /// Lock front panel buttons
    pub fn lock_front_buttons(&self) -> Result<()> {
        self.request(&Command::LockFrontButtons).map(drop)
    }

    /// Unlock front panel buttons
    pub fn unlock_front_buttons(&self) -> Result<()> {
        self.request(&Command::UnlockFrontButtons).map(drop)
    }

    /// Report system locking status
    pub fn lock_status(&self) -> Result<Option<LockStatus>> {
        let reply = self.request(&Command::LockStatus)?;
        Ok(LockStatus::from_response(Some(&reply)))
    }
}
