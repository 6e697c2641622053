//! Single-line progress bar on the terminal.

use std::io::Write;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::done::DoneSignal;
use crate::transport::{SharedTransport, TransportSnapshot, volume_percent};

/// Width of the bar between the brackets.
pub const BAR_WIDTH: usize = 50;

/// Format `frames` at `sample_rate` as `mm:ss`.
pub fn format_clock(frames: usize, sample_rate: u32) -> String {
    let secs = if sample_rate == 0 {
        0
    } else {
        frames as u64 / sample_rate as u64
    };
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Render the status line for `snap`, starting with `\r` and without a newline.
pub fn render_progress_line(snap: &TransportSnapshot, sample_rate: u32) -> String {
    let ratio = if snap.length == 0 {
        0.0
    } else {
        (snap.position as f64 / snap.length as f64).clamp(0.0, 1.0)
    };
    let filled = ((ratio * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    let mut line = format!(
        "\r[{}{}] {}% {}/{} Volume: {}%",
        "=".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        (ratio * 100.0) as u32,
        format_clock(snap.position, sample_rate),
        format_clock(snap.length, sample_rate),
        volume_percent(snap.volume),
    );
    if snap.paused {
        line.push_str(" (paused)");
    }
    line
}

/// Background thread redrawing the status line until the session ends.
pub struct StatusReporter<W> {
    handle: thread::JoinHandle<W>,
}

impl<W> StatusReporter<W>
where
    W: Write + Send + 'static,
{
    pub fn spawn(
        transport: SharedTransport,
        done: DoneSignal,
        sample_rate: u32,
        interval: Duration,
        mut out: W,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("status".into())
            .spawn(move || {
                loop {
                    let line = render_progress_line(&transport.snapshot(), sample_rate);
                    if let Err(e) = out.write_all(line.as_bytes()).and_then(|_| out.flush()) {
                        tracing::warn!("status write failed: {e}");
                        break;
                    }
                    if done.wait_timeout(interval).is_some() {
                        break;
                    }
                }
                out
            })?;
        Ok(Self { handle })
    }

    /// Wait for the thread to exit and take the writer back.
    ///
    /// The thread exits on its own once the done signal is raised.
    pub fn join(self) -> Result<W> {
        self.handle
            .join()
            .map_err(|_| anyhow!("status reporter panicked"))
    }
}
