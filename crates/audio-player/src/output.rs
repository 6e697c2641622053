//! CPAL output sink.
//!
//! Opens the selected device at a rate close to the source, and runs the [`Renderer`] inside
//! the real-time callback, converting `f32` to the device sample format.
//!
//! ## Real-time constraints
//! The callback only waits on the transport mutex, whose critical sections are short, and
//! reuses a local buffer so steady-state callbacks do not allocate.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::device;
use crate::done::{DoneSignal, StopReason};
use crate::engine::{OutputSink, Renderer};
use crate::stream::AudioFormat;

/// Output sink backed by a CPAL device.
pub struct CpalSink {
    device: cpal::Device,
    sample_format: cpal::SampleFormat,
    stream_config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
    done: DoneSignal,
}

impl CpalSink {
    /// Pick an output config for `target_rate` and a buffer of about `buffer_seconds`.
    ///
    /// The stream itself is built on [`OutputSink::play`].
    pub fn open(
        device: cpal::Device,
        target_rate: u32,
        buffer_seconds: f32,
        done: DoneSignal,
    ) -> Result<Self> {
        let config = device::pick_output_config(&device, Some(target_rate))?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        let target_frames =
            AudioFormat::new(stream_config.sample_rate, stream_config.channels as usize)
                .frames_for(buffer_seconds as f64);
        let target_frames = u32::try_from(target_frames).unwrap_or(u32::MAX).max(1);
        if let Some(buf) = device::pick_buffer_size(&config, target_frames) {
            stream_config.buffer_size = buf;
        }
        tracing::info!(
            source_rate_hz = target_rate,
            output_rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            sample_format = ?config.sample_format(),
            buffer_size = ?stream_config.buffer_size,
            "device output config"
        );

        Ok(Self {
            device,
            sample_format: config.sample_format(),
            stream_config,
            stream: None,
            done,
        })
    }

    /// Rate the device will be driven at; the stream must already be at this rate.
    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.stream_config.channels as usize
    }
}

impl OutputSink for CpalSink {
    fn play(&mut self, renderer: Renderer) -> Result<()> {
        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&self.device, &self.stream_config, renderer, &self.done)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&self.device, &self.stream_config, renderer, &self.done)
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&self.device, &self.stream_config, renderer, &self.done)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&self.device, &self.stream_config, renderer, &self.done)
            }
            other => Err(anyhow!("Unsupported sample format: {other:?}")),
        }?;
        stream.play().context("start output stream")?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::warn!("output pause failed: {e}");
            }
            drop(stream);
            tracing::debug!("output stream closed");
        }
    }
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    renderer: Renderer,
    done: &DoneSignal,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let mut buf: Vec<f32> = Vec::new();

    let done_err = done.clone();
    let err_fn = move |err: cpal::StreamError| {
        tracing::warn!("stream error: {err}");
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            done_err.raise(StopReason::OutputError);
        }
    };

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                if buf.len() != data.len() {
                    buf.resize(data.len(), 0.0);
                }
                renderer.render(&mut buf, channels_out);
                for (dst, src) in data.iter_mut().zip(buf.iter()) {
                    *dst = <T as cpal::Sample>::from_sample::<f32>(*src);
                }
            },
            err_fn,
            None,
        )
        .context("build output stream")?;

    Ok(stream)
}
