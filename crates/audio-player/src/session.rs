//! Playback session: wires the engine, input controller and status reporter together and
//! owns shutdown.
//!
//! Phases run `Idle → Initializing → Playing → Stopping → Stopped`. Whatever raises the
//! [`DoneSignal`] first (end of stream, quit key, Ctrl-C byte, SIGINT/SIGTERM, input closure,
//! output error) ends `Playing`. `Stopping` always runs on the caller's thread:
//! - stop the sink
//! - join the status reporter
//! - restore the terminal
//! - move the cursor to a fresh line
//! - close the stream
//!
//! Every step runs even if an earlier one failed; the first failure is returned.

use std::fmt;
use std::io::{Read, Write};
use std::thread;

use anyhow::{Context, Result, bail};

use crate::config::PlayerConfig;
use crate::done::{DoneSignal, StopReason};
use crate::engine::{self, EngineOptions, OutputSink, RenderHandle};
use crate::input::InputController;
use crate::status::StatusReporter;
use crate::stream::{AudioFormat, DecodedStream};
use crate::terminal::{RawModeGuard, TerminalMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Initializing,
    Playing,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Initializing => "initializing",
            SessionPhase::Playing => "playing",
            SessionPhase::Stopping => "stopping",
            SessionPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Route SIGINT/SIGTERM into `done`.
///
/// The handler only raises the signal; terminal restoration stays with the session.
pub fn install_signal_handler(done: DoneSignal) -> Result<()> {
    ctrlc::set_handler(move || {
        done.raise(StopReason::Interrupted);
    })
    .context("install signal handler")
}

pub struct Session {
    config: PlayerConfig,
    done: DoneSignal,
    phase: SessionPhase,
}

impl Session {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            done: DoneSignal::new(),
            phase: SessionPhase::Idle,
        }
    }

    /// Handle for outside producers such as the signal handler.
    pub fn done(&self) -> DoneSignal {
        self.done.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Play `stream` through `sink` until something ends the session.
    ///
    /// `input` is read byte by byte for key commands and `status_out` receives the progress
    /// line. Returns why playback ended; setup failures return an error after undoing
    /// whatever was already set up.
    pub fn run<S, T, R, W>(
        &mut self,
        sink: S,
        terminal: T,
        input: R,
        status_out: W,
        stream: Box<dyn DecodedStream>,
        format: AudioFormat,
    ) -> Result<StopReason>
    where
        S: OutputSink,
        T: TerminalMode,
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        if self.phase != SessionPhase::Idle {
            bail!("session already {}", self.phase);
        }
        self.set_phase(SessionPhase::Initializing);

        let mut guard = match RawModeGuard::enable(terminal) {
            Ok(g) => g,
            Err(e) => {
                self.set_phase(SessionPhase::Stopped);
                return Err(e);
            }
        };

        let options = EngineOptions::from(&self.config);
        let mut handle = match engine::start(sink, stream, format, options, self.done.clone()) {
            Ok(h) => h,
            Err(e) => {
                if let Err(re) = guard.restore() {
                    tracing::warn!("terminal restore failed: {re:#}");
                }
                self.set_phase(SessionPhase::Stopped);
                return Err(e);
            }
        };
        let transport = handle.transport().clone();

        let reporter = match StatusReporter::spawn(
            transport.clone(),
            self.done.clone(),
            format.sample_rate,
            self.config.status_interval,
            status_out,
        )
        .context("spawn status reporter")
        {
            Ok(r) => r,
            Err(e) => {
                self.set_phase(SessionPhase::Stopping);
                self.shutdown::<S, T, W>(&mut handle, None, &mut guard);
                return Err(e);
            }
        };

        let controller = InputController::new(transport, self.done.clone(), &self.config);
        let input_thread = match thread::Builder::new()
            .name("input".into())
            .spawn(move || controller.run(input))
            .context("spawn input thread")
        {
            Ok(t) => t,
            Err(e) => {
                self.done.raise(StopReason::InputClosed);
                self.set_phase(SessionPhase::Stopping);
                self.shutdown(&mut handle, Some(reporter), &mut guard);
                return Err(e);
            }
        };

        self.set_phase(SessionPhase::Playing);
        let reason = self.done.wait();
        tracing::info!(%reason, "playback ending");

        self.set_phase(SessionPhase::Stopping);
        let first_err = self.shutdown(&mut handle, Some(reporter), &mut guard);

        if input_thread.is_finished() {
            if input_thread.join().is_err() {
                tracing::warn!("input thread panicked");
            }
        } else {
            // Still blocked reading the terminal; it exits with the process.
            tracing::debug!("leaving input thread blocked in read");
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(reason),
        }
    }

    fn shutdown<S, T, W>(
        &mut self,
        handle: &mut RenderHandle<S>,
        reporter: Option<StatusReporter<W>>,
        guard: &mut RawModeGuard<T>,
    ) -> Option<anyhow::Error>
    where
        S: OutputSink,
        T: TerminalMode,
        W: Write + Send + 'static,
    {
        let mut first: Option<anyhow::Error> = None;

        handle.stop();

        let out = match reporter.map(StatusReporter::join).transpose() {
            Ok(out) => out,
            Err(e) => {
                record(&mut first, "join status reporter", Err(e));
                None
            }
        };

        record(&mut first, "restore terminal", guard.restore());

        if let Some(mut out) = out {
            let res = out.write_all(b"\r\n").and_then(|_| out.flush());
            record(&mut first, "finish status line", res.map_err(Into::into));
        }

        record(&mut first, "close stream", handle.transport().close());

        self.set_phase(SessionPhase::Stopped);
        first
    }

    fn set_phase(&mut self, next: SessionPhase) {
        tracing::debug!(from = %self.phase, to = %next, "session phase");
        self.phase = next;
    }
}

fn record(first: &mut Option<anyhow::Error>, step: &'static str, res: Result<()>) {
    if let Err(e) = res {
        tracing::warn!("{step} failed: {e:#}");
        if first.is_none() {
            *first = Some(e.context(step));
        }
    }
}
