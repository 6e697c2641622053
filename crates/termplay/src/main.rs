//! termplay: play an audio file in the terminal with live transport keys.
//!
//! Keys: arrows up/down change volume, left/right seek by a tenth of the track, space
//! pauses, `q` or Ctrl-C quits.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use termplay::cli::{Args, Command};
use termplay::config::PlayConfig;
use termplay::runtime;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.list_devices {
        return runtime::list_devices();
    }

    match args.cmd {
        Some(Command::Play(play)) => {
            let config = PlayConfig::from_args(args.device, &play)?;
            let reason = runtime::run_play(config)?;
            tracing::info!(%reason, "session ended");
            Ok(())
        }
        None => anyhow::bail!("no command given; try `termplay play`"),
    }
}
