//! Client facades
//!
//! [`Blackbird`] blocks the calling thread; [`AsyncBlackbird`] runs on tokio
//! with a background listener feeding received bytes into a queue. Both
//! expose the same operations and serialize commands per link.

mod async_client;
mod listener;
mod sync_client;

pub use async_client::AsyncBlackbird;
pub use sync_client::Blackbird;

use crate::protocol::{Command, CommandBuilder, ProtocolError, Result};

/// Encode a command, refusing ones the variant has no literal for
fn encode_command(builder: &CommandBuilder, command: &Command) -> Result<Vec<u8>> {
    builder.encode(command).ok_or_else(|| {
        tracing::warn!(
            command = command.name(),
            variant = ?builder.variant(),
            "Command not supported, nothing sent"
        );
        ProtocolError::UnsupportedCommand(format!("{:?} on {:?}", command, builder.variant()))
    })
}
