//! Playback engine: the rendering chain and its output sink.
//!
//! Every output callback runs the chain under the transport lock:
//! - pause gate: silence without consuming input while paused or stopped
//! - repeat wrapper: rewind at end of stream while repeats remain, otherwise stop and raise
//!   [`StopReason::Finished`] exactly once
//! - gain: `volume_base ^ volume`, fading linearly to silence over the last
//!   [`FADE_SPAN`] above [`MIN_VOLUME`]
//! - channel mapping from stream channels to sink channels

use anyhow::{Context, Result, bail};

use crate::config::{PlayerConfig, RepeatMode};
use crate::done::{DoneSignal, StopReason};
use crate::stream::{AudioFormat, DecodedStream};
use crate::transport::{FADE_SPAN, MIN_VOLUME, SharedTransport, TransportState};

/// Something that pulls rendered audio on its own clock.
///
/// `play` may invoke the renderer from another thread; `stop` is called at most once.
pub trait OutputSink {
    fn play(&mut self, renderer: Renderer) -> Result<()>;
    fn stop(&mut self);
}

/// Engine start parameters.
#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    pub initial_volume: f64,
    pub volume_base: f64,
    pub repeat: RepeatMode,
}

impl From<&PlayerConfig> for EngineOptions {
    fn from(cfg: &PlayerConfig) -> Self {
        Self {
            initial_volume: cfg.initial_volume,
            volume_base: cfg.volume_base,
            repeat: cfg.repeat,
        }
    }
}

/// The rendering chain handed to a sink.
#[derive(Clone)]
pub struct Renderer {
    transport: SharedTransport,
    done: DoneSignal,
    volume_base: f64,
}

impl Renderer {
    pub fn new(transport: SharedTransport, done: DoneSignal, volume_base: f64) -> Self {
        Self {
            transport,
            done,
            volume_base,
        }
    }

    /// Fill `out` (interleaved, `out_channels` wide) with the next block of audio.
    ///
    /// Returns the number of stream frames consumed.
    pub fn render(&self, out: &mut [f32], out_channels: usize) -> usize {
        let out_channels = out_channels.max(1);
        let (consumed, finished) = self
            .transport
            .with_lock(|st| render_locked(st, out, out_channels, self.volume_base));
        if finished {
            tracing::info!("end of stream");
            self.done.raise(StopReason::Finished);
        }
        consumed
    }
}

/// Running engine: the transport plus the sink driving it.
pub struct RenderHandle<S: OutputSink> {
    transport: SharedTransport,
    format: AudioFormat,
    sink: Option<S>,
}

impl<S: OutputSink> RenderHandle<S> {
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Stop the sink. Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        match self.sink.take() {
            Some(mut sink) => {
                sink.stop();
                true
            }
            None => false,
        }
    }
}

impl<S: OutputSink> Drop for RenderHandle<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build the rendering chain over `stream` and start `sink` pulling from it.
pub fn start<S: OutputSink>(
    mut sink: S,
    stream: Box<dyn DecodedStream>,
    format: AudioFormat,
    options: EngineOptions,
    done: DoneSignal,
) -> Result<RenderHandle<S>> {
    if stream.channels() != format.channels {
        bail!(
            "stream has {} channels but format says {}",
            stream.channels(),
            format.channels
        );
    }
    if format.sample_rate == 0 {
        bail!("sample rate must be positive");
    }

    let transport = SharedTransport::new(stream, options.initial_volume, options.repeat);
    let renderer = Renderer::new(transport.clone(), done, options.volume_base);
    sink.play(renderer).context("start output")?;
    tracing::info!(
        rate_hz = format.sample_rate,
        channels = format.channels,
        repeat = ?options.repeat,
        "playback started"
    );

    Ok(RenderHandle {
        transport,
        format,
        sink: Some(sink),
    })
}

/// Gain multiplier for a volume exponent.
///
/// `base ^ volume` down to `MIN_VOLUME + FADE_SPAN`, then a straight line to 0 at
/// `MIN_VOLUME`. Continuous and monotonic over the whole range.
pub fn gain_for(volume: f64, base: f64) -> f32 {
    let knee = MIN_VOLUME + FADE_SPAN;
    if volume <= MIN_VOLUME {
        0.0
    } else if volume < knee {
        (base.powf(knee) * (volume - MIN_VOLUME) / FADE_SPAN) as f32
    } else {
        base.powf(volume) as f32
    }
}

fn render_locked(
    st: &mut TransportState,
    out: &mut [f32],
    out_channels: usize,
    volume_base: f64,
) -> (usize, bool) {
    if st.paused || st.stopped {
        out.fill(0.0);
        return (0, false);
    }

    let frames = out.len() / out_channels;
    let src_channels = st.stream.channels().max(1);
    let want = frames * src_channels;
    if st.scratch.len() < want {
        st.scratch.resize(want, 0.0);
    }

    let mut filled = 0usize;
    let mut finished = false;
    while filled < frames {
        let n = st
            .stream
            .read(&mut st.scratch[filled * src_channels..want]);
        if n > 0 {
            filled += n;
            continue;
        }

        // End of the current pass.
        match st.repeats_left {
            _ if st.stream.is_empty() => {
                finished = true;
            }
            Some(0) => finished = true,
            Some(left) => st.repeats_left = Some(left - 1),
            None => {}
        }
        if finished {
            st.stopped = true;
            break;
        }
        if let Err(e) = st.stream.seek(0) {
            tracing::warn!("rewind failed: {e:#}");
            st.stopped = true;
            finished = true;
            break;
        }
    }
    st.scratch[filled * src_channels..want].fill(0.0);

    let gain = gain_for(st.volume, volume_base);
    for (frame, dst) in out.chunks_exact_mut(out_channels).enumerate() {
        let src = &st.scratch[frame * src_channels..(frame + 1) * src_channels];
        map_frame(src, dst);
        for s in dst.iter_mut() {
            *s *= gain;
        }
    }
    let tail = frames * out_channels;
    out[tail..].fill(0.0);

    (filled, finished)
}

/// Copy one frame between channel layouts.
///
/// - mono → stereo: duplicate channel 0
/// - stereo → mono: average L/R
/// - same layout: pass-through
/// - other layouts: best-effort "clamp to available channels"
fn map_frame(src: &[f32], dst: &mut [f32]) {
    match (src.len(), dst.len()) {
        (2, 1) => dst[0] = 0.5 * (src[0] + src[1]),
        (s, _) if s == 0 => dst.fill(0.0),
        (s, _) => {
            for (ch, d) in dst.iter_mut().enumerate() {
                *d = src[ch.min(s - 1)];
            }
        }
    }
}
