//! Seekable decoded audio streams.
//!
//! The rest of the crate only sees the [`DecodedStream`] trait: a finite run of interleaved
//! `f32` frames with a fixed length, an absolute seek, and a position cursor that advances as
//! frames are read. [`BufferedStream`] is the in-memory implementation produced by `decode`.

use anyhow::{Result, anyhow};

/// Format descriptor supplied at open time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: usize,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of frames covering `seconds` at this rate.
    pub fn frames_for(&self, seconds: f64) -> usize {
        (self.sample_rate as f64 * seconds.max(0.0)).round() as usize
    }
}

/// A finite, seekable sequence of interleaved frames.
///
/// Position only moves through [`DecodedStream::seek`] or by reading.
pub trait DecodedStream: Send {
    /// Current frame index, `0 ..= len()`.
    fn position(&self) -> usize;

    /// Total frames.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interleaved channel count.
    fn channels(&self) -> usize;

    /// Move the cursor to `frame`. Fails when `frame > len()`.
    fn seek(&mut self, frame: usize) -> Result<()>;

    /// Fill `out` with whole interleaved frames starting at the cursor.
    ///
    /// Returns the number of frames written; `0` means end of stream.
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// Release the stream. Reads after close return end of stream.
    fn close(&mut self) -> Result<()>;
}

/// Fully decoded stream held in memory.
#[derive(Debug)]
pub struct BufferedStream {
    samples: Vec<f32>,
    channels: usize,
    pos: usize,
    closed: bool,
}

impl BufferedStream {
    /// Wrap interleaved samples. Trailing samples that do not fill a frame are dropped.
    pub fn new(mut samples: Vec<f32>, channels: usize) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() / channels * channels;
        samples.truncate(whole);
        Self {
            samples,
            channels,
            pos: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Take the interleaved samples back, e.g. to resample them.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

impl DecodedStream for BufferedStream {
    fn position(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn seek(&mut self, frame: usize) -> Result<()> {
        let len = self.len();
        if frame > len {
            return Err(anyhow!("seek to frame {frame} past end ({len})"));
        }
        self.pos = frame;
        Ok(())
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        if self.closed {
            return 0;
        }
        let want = out.len() / self.channels;
        let available = self.len().saturating_sub(self.pos);
        let frames = want.min(available);
        let start = self.pos * self.channels;
        let end = start + frames * self.channels;
        out[..frames * self.channels].copy_from_slice(&self.samples[start..end]);
        self.pos += frames;
        frames
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(anyhow!("stream already closed"));
        }
        self.closed = true;
        self.samples = Vec::new();
        self.pos = 0;
        Ok(())
    }
}
