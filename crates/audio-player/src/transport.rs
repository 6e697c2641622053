//! Shared transport state.
//!
//! One mutex guards the decoded stream together with volume, pause and stop flags. The render
//! callback, the input controller and the status reporter all go through
//! [`SharedTransport::with_lock`], so a snapshot of position, length and volume is never torn
//! and a volume change never races a render-time read.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::config::RepeatMode;
use crate::stream::DecodedStream;

/// Lowest gain exponent; rendered as silence and displayed as 0%.
pub const MIN_VOLUME: f64 = -1.0;
/// Width of the band above [`MIN_VOLUME`] where gain fades linearly to silence instead of
/// following the exponential curve, so 10% is quieter than 20% and 0% is not a cliff.
pub const FADE_SPAN: f64 = 0.1;
/// Highest gain exponent; displayed as 200%.
pub const MAX_VOLUME: f64 = 1.0;

/// Point-in-time copy of the transport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSnapshot {
    pub position: usize,
    pub length: usize,
    pub volume: f64,
    pub paused: bool,
}

/// State behind the transport lock.
pub struct TransportState {
    pub(crate) stream: Box<dyn DecodedStream>,
    pub(crate) volume: f64,
    pub(crate) paused: bool,
    /// Terminal: set once the stream is exhausted with no repeat left.
    pub(crate) stopped: bool,
    /// Repeats left after the current pass; `None` loops forever.
    pub(crate) repeats_left: Option<u32>,
    /// Render scratch space, reused across callbacks.
    pub(crate) scratch: Vec<f32>,
}

impl TransportState {
    pub fn position(&self) -> usize {
        self.stream.position()
    }

    pub fn length(&self) -> usize {
        self.stream.len()
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Seek to `frame`, clamped to `[0, length]`.
    fn seek_clamped(&mut self, frame: usize) -> usize {
        let target = frame.min(self.stream.len());
        if let Err(e) = self.stream.seek(target) {
            tracing::warn!(target, "seek failed: {e:#}");
        }
        self.stream.position()
    }
}

/// Cloneable handle to the shared transport.
#[derive(Clone)]
pub struct SharedTransport {
    inner: Arc<Mutex<TransportState>>,
}

impl SharedTransport {
    pub fn new(stream: Box<dyn DecodedStream>, initial_volume: f64, repeat: RepeatMode) -> Self {
        let repeats_left = match repeat {
            RepeatMode::Once => Some(0),
            RepeatMode::Times(n) => Some(n),
            RepeatMode::Forever => None,
        };
        Self {
            inner: Arc::new(Mutex::new(TransportState {
                stream,
                volume: initial_volume.clamp(MIN_VOLUME, MAX_VOLUME),
                paused: false,
                stopped: false,
                repeats_left,
                scratch: Vec::new(),
            })),
        }
    }

    /// Run `f` with exclusive access to the state.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut TransportState) -> R) -> R {
        let mut g = self.lock();
        f(&mut g)
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.with_lock(|st| TransportSnapshot {
            position: st.position(),
            length: st.length(),
            volume: st.volume,
            paused: st.paused,
        })
    }

    /// Move by `delta_frames` (negative seeks backwards), clamped to `[0, length]`.
    ///
    /// Returns the new position.
    pub fn seek_relative(&self, delta_frames: i64) -> usize {
        self.with_lock(|st| {
            let pos = st.position() as i64;
            let target = pos.saturating_add(delta_frames).max(0) as usize;
            st.seek_clamped(target)
        })
    }

    /// Seek to `frame`, clamped to `[0, length]`. Returns the new position.
    pub fn seek_absolute(&self, frame: usize) -> usize {
        self.with_lock(|st| st.seek_clamped(frame))
    }

    /// Add `delta` to the gain exponent, clamped to `[MIN_VOLUME, MAX_VOLUME]`.
    ///
    /// Returns the new volume.
    pub fn adjust_volume(&self, delta: f64) -> f64 {
        self.with_lock(|st| {
            st.volume = (st.volume + delta).clamp(MIN_VOLUME, MAX_VOLUME);
            st.volume
        })
    }

    /// Flip the paused flag. Returns the new value.
    pub fn toggle_pause(&self) -> bool {
        self.with_lock(|st| {
            st.paused = !st.paused;
            st.paused
        })
    }

    /// Close the underlying stream.
    pub fn close(&self) -> Result<()> {
        self.with_lock(|st| {
            st.stopped = true;
            st.stream.close()
        })
    }

    fn lock(&self) -> MutexGuard<'_, TransportState> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// User-facing volume percentage: `(volume + 1) * 100`, clamped to `0..=200`.
pub fn volume_percent(volume: f64) -> u32 {
    let pct = ((volume + 1.0) * 100.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 200.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferedStream;
    use std::thread;

    fn transport(frames: usize) -> SharedTransport {
        let stream = BufferedStream::new(vec![0.0; frames], 1);
        SharedTransport::new(Box::new(stream), 0.0, RepeatMode::Once)
    }

    #[test]
    fn seek_relative_clamps_at_both_ends() {
        let t = transport(1_000);
        assert_eq!(t.seek_relative(-100), 0);
        assert_eq!(t.seek_relative(400), 400);
        assert_eq!(t.seek_relative(10_000), 1_000);
        assert_eq!(t.seek_relative(i64::MIN), 0);
        assert_eq!(t.seek_relative(i64::MAX), 1_000);
    }

    #[test]
    fn seek_absolute_clamps_to_length() {
        let t = transport(500);
        assert_eq!(t.seek_absolute(250), 250);
        assert_eq!(t.seek_absolute(501), 500);
        assert_eq!(t.snapshot().position, 500);
    }

    #[test]
    fn seek_on_empty_stream_stays_at_zero() {
        let t = transport(0);
        assert_eq!(t.seek_relative(10), 0);
        assert_eq!(t.seek_relative(-10), 0);
    }

    #[test]
    fn adjust_volume_accumulates_and_clamps() {
        let t = transport(10);
        t.adjust_volume(0.1);
        t.adjust_volume(0.1);
        t.adjust_volume(0.1);
        assert_eq!(volume_percent(t.snapshot().volume), 130);
        for _ in 0..30 {
            t.adjust_volume(0.1);
        }
        assert_eq!(t.snapshot().volume, MAX_VOLUME);
        for _ in 0..40 {
            t.adjust_volume(-0.1);
        }
        assert_eq!(t.snapshot().volume, MIN_VOLUME);
        assert_eq!(volume_percent(MIN_VOLUME), 0);
    }

    #[test]
    fn concurrent_volume_adjustments_are_not_lost() {
        let t = transport(10);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let t = t.clone();
                thread::spawn(move || {
                    let delta = if i % 2 == 0 { 0.1 } else { -0.1 };
                    for _ in 0..5 {
                        t.adjust_volume(delta);
                        let _ = t.snapshot();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // +1.0 and -1.0 in total, never hitting a clamp boundary on the way: each thread
        // moves by at most 0.5 so the running sum stays inside [-1, 1].
        assert_eq!(volume_percent(t.snapshot().volume), 100);
    }

    #[test]
    fn toggle_pause_flips() {
        let t = transport(10);
        assert!(t.toggle_pause());
        assert!(t.snapshot().paused);
        assert!(!t.toggle_pause());
    }

    #[test]
    fn initial_volume_is_clamped() {
        let stream = BufferedStream::new(vec![0.0; 4], 1);
        let t = SharedTransport::new(Box::new(stream), 5.0, RepeatMode::Forever);
        assert_eq!(t.snapshot().volume, MAX_VOLUME);
    }

    #[test]
    fn close_marks_stopped_and_reports_double_close() {
        let t = transport(10);
        t.close().unwrap();
        assert!(t.with_lock(|st| st.is_stopped()));
        assert!(t.close().is_err());
    }

    #[test]
    fn volume_percent_rounds_and_clamps() {
        assert_eq!(volume_percent(0.0), 100);
        assert_eq!(volume_percent(0.1 + 0.1 + 0.1), 130);
        assert_eq!(volume_percent(-0.25), 75);
        assert_eq!(volume_percent(3.0), 200);
        assert_eq!(volume_percent(-3.0), 0);
        assert_eq!(volume_percent(f64::NAN), 0);
    }
}
