//! Input controller.
//!
//! Blocking single-byte reads from the terminal, decoded by [`KeyDecoder`] and applied to the
//! shared transport. The loop ends on quit/interrupt keys, on read error or end of input (both
//! raise [`StopReason::InputClosed`]), or when it notices the session already ended.

use std::io::{ErrorKind, Read};

use crate::config::PlayerConfig;
use crate::done::{DoneSignal, StopReason};
use crate::keys::{Command, KeyDecoder};
use crate::transport::SharedTransport;

pub struct InputController {
    transport: SharedTransport,
    done: DoneSignal,
    seek_divisor: usize,
    volume_step: f64,
}

impl InputController {
    pub fn new(transport: SharedTransport, done: DoneSignal, config: &PlayerConfig) -> Self {
        Self {
            transport,
            done,
            seek_divisor: config.seek_divisor.max(1),
            volume_step: config.volume_step,
        }
    }

    /// Apply one command. Returns `false` once the session should end.
    pub fn apply(&self, cmd: Command) -> bool {
        match cmd {
            Command::Quit => {
                self.done.raise(StopReason::Quit);
                false
            }
            Command::Interrupt => {
                self.done.raise(StopReason::Interrupted);
                false
            }
            Command::TogglePause => {
                let paused = self.transport.toggle_pause();
                tracing::debug!(paused, "pause toggled");
                true
            }
            Command::SeekForward | Command::SeekBackward => {
                let step = self.seek_step();
                let delta = if cmd == Command::SeekForward { step } else { -step };
                let position = self.transport.seek_relative(delta);
                tracing::debug!(delta, position, "seek");
                true
            }
            Command::VolumeUp | Command::VolumeDown => {
                let delta = if cmd == Command::VolumeUp {
                    self.volume_step
                } else {
                    -self.volume_step
                };
                let volume = self.transport.adjust_volume(delta);
                tracing::debug!(volume, "volume");
                true
            }
        }
    }

    /// Read and apply commands until the session ends.
    pub fn run<R: Read>(&self, mut input: R) {
        let mut decoder = KeyDecoder::new();
        let mut byte = [0u8; 1];
        loop {
            match input.read(&mut byte) {
                Ok(0) => {
                    tracing::info!("input closed");
                    self.done.raise(StopReason::InputClosed);
                    return;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("input read error: {e}");
                    self.done.raise(StopReason::InputClosed);
                    return;
                }
            }

            if self.done.is_raised() {
                return;
            }
            if let Some(cmd) = decoder.feed(byte[0]) {
                if !self.apply(cmd) {
                    return;
                }
            }
        }
    }

    fn seek_step(&self) -> i64 {
        let length = self.transport.with_lock(|st| st.length());
        (length / self.seek_divisor) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepeatMode;
    use crate::stream::BufferedStream;
    use crate::transport::volume_percent;
    use std::io::{self, Cursor};

    fn controller(frames: usize) -> (InputController, SharedTransport, DoneSignal) {
        let stream = BufferedStream::new(vec![0.0; frames], 1);
        let transport = SharedTransport::new(Box::new(stream), 0.0, RepeatMode::Once);
        let done = DoneSignal::new();
        let ctl = InputController::new(transport.clone(), done.clone(), &PlayerConfig::default());
        (ctl, transport, done)
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "gone"))
        }
    }

    /// Yields `Interrupted` once before delegating.
    struct InterruptOnce<R> {
        inner: R,
        fired: bool,
    }

    impl<R: Read> Read for InterruptOnce<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.fired {
                self.fired = true;
                return Err(io::Error::new(ErrorKind::Interrupted, "signal"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn quit_key_raises_quit_and_stops_reading() {
        let (ctl, transport, done) = controller(1_000);
        ctl.run(Cursor::new(b"q\x1b[C".to_vec()));
        assert_eq!(done.reason(), Some(StopReason::Quit));
        assert_eq!(transport.snapshot().position, 0);
    }

    #[test]
    fn ctrl_c_byte_raises_interrupted() {
        let (ctl, _transport, done) = controller(10);
        ctl.run(Cursor::new(vec![0x03]));
        assert_eq!(done.reason(), Some(StopReason::Interrupted));
    }

    #[test]
    fn end_of_input_raises_input_closed() {
        let (ctl, _transport, done) = controller(10);
        ctl.run(Cursor::new(b"\x1b[".to_vec()));
        assert_eq!(done.reason(), Some(StopReason::InputClosed));
    }

    #[test]
    fn read_error_raises_input_closed() {
        let (ctl, _transport, done) = controller(10);
        ctl.run(FailingReader);
        assert_eq!(done.reason(), Some(StopReason::InputClosed));
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let (ctl, _transport, done) = controller(10);
        ctl.run(InterruptOnce {
            inner: Cursor::new(b"q".to_vec()),
            fired: false,
        });
        assert_eq!(done.reason(), Some(StopReason::Quit));
    }

    #[test]
    fn hundred_second_stream_scenario() {
        let (ctl, transport, _done) = controller(4_410_000);
        ctl.run(Cursor::new(b"\x1b[A\x1b[A\x1b[A\x1b[Cq".to_vec()));
        let snap = transport.snapshot();
        assert_eq!(volume_percent(snap.volume), 130);
        assert_eq!(snap.position, 441_000);
    }

    #[test]
    fn seek_backward_from_zero_clamps() {
        let (ctl, transport, _done) = controller(4_410_000);
        assert!(ctl.apply(Command::SeekBackward));
        assert_eq!(transport.snapshot().position, 0);
    }

    #[test]
    fn seek_forward_past_end_clamps_to_length() {
        let (ctl, transport, _done) = controller(95);
        for _ in 0..20 {
            ctl.apply(Command::SeekForward);
        }
        assert_eq!(transport.snapshot().position, 95);
    }

    #[test]
    fn space_toggles_pause_and_garbage_is_ignored() {
        let (ctl, transport, _done) = controller(10);
        ctl.run(Cursor::new(b"x \x1bz\x1b[Zq".to_vec()));
        let snap = transport.snapshot();
        assert!(snap.paused);
        assert_eq!(snap.position, 0);
        assert_eq!(volume_percent(snap.volume), 100);
    }

    #[test]
    fn stops_once_session_already_ended() {
        let (ctl, transport, done) = controller(1_000);
        done.raise(StopReason::Finished);
        ctl.run(Cursor::new(b"\x1b[C\x1b[C".to_vec()));
        assert_eq!(transport.snapshot().position, 0);
        assert_eq!(done.reason(), Some(StopReason::Finished));
    }
}
