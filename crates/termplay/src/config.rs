use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

pub use audio_player::config::{PlayerConfig, RepeatMode};
use audio_player::transport::{MAX_VOLUME, MIN_VOLUME};

use crate::cli::PlayArgs;

#[derive(Clone, Debug)]
pub struct PlayConfig {
    /// File to play; `None` plays the default sample.
    pub path: Option<PathBuf>,
    pub device: Option<String>,
    pub player: PlayerConfig,
}

impl PlayConfig {
    pub fn from_args(device: Option<String>, args: &PlayArgs) -> Result<Self> {
        if !args.volume.is_finite() || !(MIN_VOLUME..=MAX_VOLUME).contains(&args.volume) {
            bail!(
                "--volume must be between {MIN_VOLUME} and {MAX_VOLUME}, got {}",
                args.volume
            );
        }
        if !(args.buffer_seconds.is_finite() && args.buffer_seconds > 0.0) {
            bail!("--buffer-seconds must be positive");
        }

        let repeat = match (args.loop_forever, args.repeat) {
            (true, _) => RepeatMode::Forever,
            (false, None | Some(0)) => RepeatMode::Once,
            (false, Some(n)) => RepeatMode::Times(n),
        };

        Ok(Self {
            path: args.path.clone(),
            device: normalize_device_name(device),
            player: PlayerConfig {
                initial_volume: args.volume,
                repeat,
                status_interval: Duration::from_millis(args.interval_ms),
                buffer_seconds: args.buffer_seconds,
                ..PlayerConfig::default()
            },
        })
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
