//! Terminal raw mode.

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Switches the controlling terminal in and out of raw mode.
pub trait TerminalMode {
    fn enable_raw(&mut self) -> Result<()>;
    fn restore(&mut self) -> Result<()>;
}

/// The process terminal, via crossterm.
#[derive(Debug, Default)]
pub struct CrosstermTerminal;

impl TerminalMode for CrosstermTerminal {
    fn enable_raw(&mut self) -> Result<()> {
        enable_raw_mode().context("enable raw mode")
    }

    fn restore(&mut self) -> Result<()> {
        disable_raw_mode().context("disable raw mode")
    }
}

/// Keeps the terminal in raw mode until [`RawModeGuard::restore`] or drop.
///
/// Restoration happens at most once.
pub struct RawModeGuard<T: TerminalMode> {
    terminal: T,
    active: bool,
}

impl<T: TerminalMode> RawModeGuard<T> {
    pub fn enable(mut terminal: T) -> Result<Self> {
        terminal.enable_raw()?;
        tracing::debug!("terminal in raw mode");
        Ok(Self {
            terminal,
            active: true,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Leave raw mode. A no-op after the first call.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.terminal.restore()?;
        tracing::debug!("terminal restored");
        Ok(())
    }
}

impl<T: TerminalMode> Drop for RawModeGuard<T> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("terminal restore failed: {e:#}");
        }
    }
}
