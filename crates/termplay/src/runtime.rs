//! Play command runtime.
//!
//! Resolves the input file, decodes it, opens the output device and hands everything to a
//! [`Session`] driven by the process terminal.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cpal::traits::DeviceTrait;

use audio_player::decode;
use audio_player::device;
use audio_player::done::StopReason;
use audio_player::output::CpalSink;
use audio_player::resample;
use audio_player::session::{self, Session};
use audio_player::terminal::CrosstermTerminal;

use crate::config::PlayConfig;
use crate::fetch;

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host)
}

/// Play one file (or the default sample) until it ends or the user stops it.
pub fn run_play(config: PlayConfig) -> Result<StopReason> {
    let path = resolve_path(config.path.as_deref(), &std::env::temp_dir())?;
    check_extension(&path)?;

    let (stream, format, info) = decode::open_file(&path)?;
    tracing::info!(
        path = ?path,
        codec = info.codec.as_deref().unwrap_or("unknown"),
        duration_ms = ?info.duration_ms,
        skipped_packets = info.skipped_packets,
        rate_hz = format.sample_rate,
        channels = format.channels,
        "source"
    );

    let host = cpal::default_host();
    let device = device::pick_device(&host, config.device.as_deref())?;
    tracing::info!(device = %device.description()?, "output device");

    let mut session = Session::new(config.player.clone());
    let sink = CpalSink::open(
        device,
        format.sample_rate,
        config.player.buffer_seconds,
        session.done(),
    )?;
    let (stream, format) = resample::resample_stream(stream, format, sink.sample_rate())
        .context("resample to device rate")?;

    session::install_signal_handler(session.done())?;

    session.run(
        sink,
        CrosstermTerminal,
        io::stdin(),
        io::stdout(),
        Box::new(stream),
        format,
    )
}

/// The file to play: the given path, or a freshly downloaded default sample in `temp_dir`.
fn resolve_path(path: Option<&Path>, temp_dir: &Path) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => {
            eprintln!("No audio file provided. Playing the default audio...");
            fetch::fetch_default_sample(temp_dir).context("download default audio")
        }
    }
}

fn check_extension(path: &Path) -> Result<()> {
    if !decode::is_supported_extension(path) {
        bail!(
            "Unsupported file type {:?}. Please provide an MP3, WAV, FLAC, or OGG file.",
            path
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_used_as_is() {
        let got = resolve_path(Some(Path::new("music/a.ogg")), Path::new("/unused")).unwrap();
        assert_eq!(got, PathBuf::from("music/a.ogg"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(check_extension(Path::new("a.MP3")).is_ok());
        assert!(check_extension(Path::new("b.Flac")).is_ok());
        assert!(check_extension(Path::new("c.wav")).is_ok());
        assert!(check_extension(Path::new("d.ogg")).is_ok());
    }

    #[test]
    fn unsupported_extension_is_rejected_before_decode() {
        let err = check_extension(Path::new("missing/track.aac")).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
        assert!(check_extension(Path::new("noext")).is_err());
    }
}
