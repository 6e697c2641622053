use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "termplay", version, arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long, global = true)]
    pub device: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play an audio file, or the default sample when no path is given
    Play(PlayArgs),
}

#[derive(clap::Args, Debug)]
pub struct PlayArgs {
    /// Path to an MP3, WAV, FLAC or OGG file
    pub path: Option<PathBuf>,

    /// Starting volume exponent in [-1, 1] (0 is 100%, -1 is mute)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub volume: f64,

    /// Loop until quit
    #[arg(long = "loop", conflicts_with = "repeat")]
    pub loop_forever: bool,

    /// Extra passes after the first one
    #[arg(long)]
    pub repeat: Option<u32>,

    /// Progress bar refresh interval in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,

    /// Output buffer target in seconds
    #[arg(long, default_value_t = 0.1)]
    pub buffer_seconds: f32,
}
