//! Offline resample stage.
//!
//! Uses Rubato to convert a fully decoded interleaved `f32` buffer from the source rate to the
//! output device rate before playback starts, so positions and lengths seen by the transport
//! are always in device frames.

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::stream::{AudioFormat, BufferedStream};

/// Input chunk size in frames for the resampling loop.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Resample `samples` (interleaved, `channels` wide) from `src_rate` to `dst_rate`.
///
/// Returns the input unchanged when the rates already match.
pub fn resample_interleaved(
    samples: Vec<f32>,
    channels: usize,
    src_rate: u32,
    dst_rate: u32,
    chunk_frames: usize,
) -> Result<Vec<f32>> {
    if src_rate == dst_rate {
        return Ok(samples);
    }
    if channels == 0 || src_rate == 0 || dst_rate == 0 {
        return Err(anyhow!(
            "cannot resample {channels}ch from {src_rate} Hz to {dst_rate} Hz"
        ));
    }

    let f_ratio = dst_rate as f64 / src_rate as f64;

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk_in_frames = chunk_frames.max(1);
    let mut resampler = Async::<f32>::new_sinc(
        f_ratio,
        1.1,
        &params,
        chunk_in_frames,
        channels,
        FixedAsync::Input,
    )
    .map_err(|e| anyhow!("resampler init error: {e}"))?;

    let total_frames = samples.len() / channels;
    let expected_frames = (total_frames as f64 * f_ratio).round() as usize;
    // Sinc filter latency in output frames; dropped from the front, then the tail is flushed
    // with empty chunks until everything after it has come out.
    let delay = resampler.output_delay();
    let wanted = (delay + expected_frames) * channels;

    let mut out: Vec<f32> = Vec::with_capacity(wanted);
    let mut out_interleaved = vec![0.0f32; channels * resampler.output_frames_max()];
    let mut chunk = vec![0.0f32; chunk_in_frames * channels];

    let mut indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: None,
    };

    let mut frame = 0usize;
    while out.len() < wanted {
        let take = (total_frames - frame).min(chunk_in_frames);
        // Rubato wants a full chunk; the tail is zero-padded and flagged via `partial_len`.
        chunk.fill(0.0);
        chunk[..take * channels]
            .copy_from_slice(&samples[frame * channels..(frame + take) * channels]);

        let input_adapter = InterleavedSlice::new(&chunk, channels, chunk_in_frames)
            .map_err(|e| anyhow!("interleaved slice (input) error: {e}"))?;
        let out_capacity_frames = out_interleaved.len() / channels;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut out_interleaved, channels, out_capacity_frames)
                .map_err(|e| anyhow!("interleaved slice (output) error: {e}"))?;

        indexing.input_offset = 0;
        indexing.output_offset = 0;
        indexing.partial_len = if take < chunk_in_frames {
            Some(take)
        } else {
            None
        };

        let (_nbr_in, nbr_out) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
            .map_err(|e| anyhow!("resampler process error: {e}"))?;

        if take == 0 && nbr_out == 0 {
            tracing::warn!(
                missing_frames = (wanted - out.len()) / channels,
                "resampler flush produced no output"
            );
            break;
        }
        out.extend_from_slice(&out_interleaved[..nbr_out * channels]);
        frame += take;
    }

    out.drain(..(delay * channels).min(out.len()));
    out.truncate(expected_frames * channels);

    tracing::info!(
        from_hz = src_rate,
        to_hz = dst_rate,
        in_frames = total_frames,
        out_frames = out.len() / channels,
        "resampled source"
    );
    Ok(out)
}

/// Bring a decoded stream to `dst_rate`, keeping its channel count.
pub fn resample_stream(
    stream: BufferedStream,
    format: AudioFormat,
    dst_rate: u32,
) -> Result<(BufferedStream, AudioFormat)> {
    if format.sample_rate == dst_rate {
        return Ok((stream, format));
    }
    let samples = resample_interleaved(
        stream.into_samples(),
        format.channels,
        format.sample_rate,
        dst_rate,
        DEFAULT_CHUNK_FRAMES,
    )?;
    Ok((
        BufferedStream::new(samples, format.channels),
        AudioFormat::new(dst_rate, format.channels),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rates_pass_through() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample_interleaved(input.clone(), 2, 44_100, 44_100, 1024).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(resample_interleaved(vec![0.0; 4], 2, 0, 48_000, 1024).is_err());
    }

    #[test]
    fn upsampling_grows_output_roughly_by_ratio() {
        let frames = 44_100;
        let input: Vec<f32> = (0..frames * 2)
            .map(|i| ((i / 2) as f32 * 0.01).sin() * 0.5)
            .collect();
        let out = resample_interleaved(input, 2, 44_100, 48_000, 1024).unwrap();
        let out_frames = out.len() / 2;
        assert_eq!(out.len() % 2, 0);
        assert_eq!(out_frames, 48_000);
    }

    #[test]
    fn output_is_aligned_with_input_and_keeps_the_tail() {
        // Silence, then a constant level: the edge must land at twice its input frame.
        let mut input = vec![0.0f32; 1_000];
        input.extend(std::iter::repeat_n(0.5, 1_000));
        let out = resample_interleaved(input, 1, 8_000, 16_000, 256).unwrap();
        assert_eq!(out.len(), 4_000);

        let edge = out.iter().position(|s| *s > 0.25).unwrap();
        assert!((1_990..=2_010).contains(&edge), "edge at {edge}");
        // The level holds until the very end instead of being cut short.
        let last = out.iter().rposition(|s| *s > 0.25).unwrap();
        assert!(last >= 3_980, "level ends at {last}");
        assert!(out[3_000..3_900].iter().all(|s| (s - 0.5).abs() < 0.05));
    }

    #[test]
    fn resample_stream_updates_format() {
        use crate::stream::DecodedStream;

        let stream = BufferedStream::new(vec![0.25; 2_000], 1);
        let (same, fmt) =
            resample_stream(stream, AudioFormat::new(8_000, 1), 8_000).unwrap();
        assert_eq!(fmt, AudioFormat::new(8_000, 1));
        assert_eq!(same.len(), 2_000);

        let (up, fmt) = resample_stream(same, fmt, 16_000).unwrap();
        assert_eq!(fmt, AudioFormat::new(16_000, 1));
        assert_eq!(up.len(), 4_000);
    }
}
