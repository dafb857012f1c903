//! HDMI-CEC command path: cooldown guard and the serialized command channel.
//!
//! CEC is treated as an opaque line protocol spoken by an external client
//! process (`cec-client` from libcec). Command text is passed through as-is.

pub mod channel;
pub mod limiter;
pub mod oneshot;
pub mod outcome;
pub mod persistent;

pub use channel::{ChannelIo, ChannelSpawner, CommandChannel, ConnectionState, ProcessSpawner};
pub use limiter::RateLimiter;
pub use oneshot::OneshotChannel;
pub use outcome::{CommandKind, CommandOutcome};
pub use persistent::PersistentChannel;

use crate::config::{CecConfig, ChannelMode};
use std::sync::Arc;

/// Build the channel selected by `config.mode`, backed by real processes.
pub fn channel_from_config(config: &CecConfig) -> Arc<dyn CommandChannel> {
    match config.mode {
        ChannelMode::Persistent => {
            let spawner = ProcessSpawner::new(&config.program, config.args.clone());
            Arc::new(PersistentChannel::new(spawner, config.clone()))
        }
        ChannelMode::Oneshot => {
            let spawner = ProcessSpawner::new(&config.program, config.oneshot_args.clone());
            Arc::new(OneshotChannel::new(spawner, config.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selects_channel() {
        let persistent = channel_from_config(&CecConfig::default());
        assert_eq!(
            persistent.connection_state(),
            Some(ConnectionState::Disconnected)
        );

        let oneshot = channel_from_config(&CecConfig {
            mode: ChannelMode::Oneshot,
            ..CecConfig::default()
        });
        assert_eq!(oneshot.connection_state(), None);
    }
}
