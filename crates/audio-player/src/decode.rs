//! Audio decode stage.
//!
//! Uses Symphonia to:
//! - probe the input container/codec
//! - decode every packet into interleaved `f32` samples
//! - hand back a seekable [`BufferedStream`] plus its [`AudioFormat`]

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::io::MediaSource;
use symphonia::core::{
    codecs::DecoderOptions, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};

use crate::stream::{AudioFormat, BufferedStream};

/// Metadata captured while probing the source.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Duration reported by the container, when known.
    pub duration_ms: Option<u64>,
    /// Packets that failed to decode and were skipped.
    pub skipped_packets: u64,
}

/// Decode a local file. The extension is used as a probe hint.
pub fn open_file(path: &Path) -> Result<(BufferedStream, AudioFormat, SourceInfo)> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    open_media_source(Box::new(file), hint).with_context(|| format!("decode {:?}", path))
}

/// Decode an arbitrary Symphonia [`MediaSource`] into memory.
///
/// Corrupt packets are skipped; the stream ends at the first packet read error.
pub fn open_media_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
) -> Result<(BufferedStream, AudioFormat, SourceInfo)> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let track_id = track.id;
    let codec_params: CodecParameters = track.codec_params.clone();

    let channels = codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;
    if rate == 0 || channels == 0 {
        return Err(anyhow!("Invalid stream format: {channels}ch @ {rate} Hz"));
    }

    let mut info = SourceInfo {
        codec: codec_name_from_params(&codec_params),
        duration_ms: duration_ms_from_codec_params(&codec_params),
        skipped_packets: 0,
    };

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut out: Vec<f32> = Vec::new();
    if let Some(frames) = codec_params.n_frames {
        out.reserve(frames as usize * channels);
    }

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                tracing::warn!("packet read stopped early: {e}");
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                info.skipped_packets += 1;
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        out.extend_from_slice(sample_buf.samples());
    }

    if out.is_empty() {
        return Err(anyhow!("No audio decoded"));
    }

    tracing::info!(
        codec = info.codec.as_deref().unwrap_or("unknown"),
        channels,
        rate_hz = rate,
        frames = out.len() / channels,
        skipped_packets = info.skipped_packets,
        "decoded source"
    );

    Ok((
        BufferedStream::new(out, channels),
        AudioFormat::new(rate, channels),
        info,
    ))
}

/// Check a path against the supported extension allow-list (case-insensitive).
pub fn is_supported_extension(path: &Path) -> bool {
    const SUPPORTED: [&str; 4] = ["mp3", "wav", "flac", "ogg"];
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Best-effort duration in milliseconds from codec metadata.
///
/// Returns `None` if the container does not provide total frames or sample rate.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Best-effort codec label used for logging.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::DecodedStream;
    use std::io::Cursor;
    use std::path::PathBuf;
    use symphonia::core::codecs::*;

    /// Minimal 16-bit PCM WAV with the given interleaved samples.
    fn wav_bytes(rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&(36 + data_len).to_le_bytes());
        b.extend_from_slice(b"WAVEfmt ");
        b.extend_from_slice(&16u32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&channels.to_le_bytes());
        b.extend_from_slice(&rate.to_le_bytes());
        b.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        b.extend_from_slice(&block_align.to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(b"data");
        b.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            b.extend_from_slice(&s.to_le_bytes());
        }
        b
    }

    #[test]
    fn open_media_source_decodes_wav_into_frames() {
        let samples: Vec<i16> = (0..2000).map(|i| (i % 100) as i16 * 100).collect();
        let bytes = wav_bytes(8_000, 2, &samples);
        let mut hint = Hint::new();
        hint.with_extension("wav");

        let (stream, format, info) =
            open_media_source(Box::new(Cursor::new(bytes)), hint).unwrap();
        assert_eq!(format, AudioFormat::new(8_000, 2));
        assert_eq!(stream.len(), 1000);
        assert_eq!(stream.position(), 0);
        assert_eq!(info.codec.as_deref(), Some("PCM_S16"));
    }

    #[test]
    fn open_media_source_rejects_garbage() {
        let hint = Hint::new();
        let res = open_media_source(Box::new(Cursor::new(vec![0u8; 64])), hint);
        assert!(res.is_err());
    }

    #[test]
    fn open_file_reports_missing_path() {
        let err = open_file(Path::new("/definitely/not/here.mp3")).unwrap_err();
        assert!(format!("{err:#}").contains("open"));
    }

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported_extension(&PathBuf::from("a.mp3")));
        assert!(is_supported_extension(&PathBuf::from("b.FLAC")));
        assert!(is_supported_extension(&PathBuf::from("c.Ogg")));
        assert!(is_supported_extension(&PathBuf::from("dir/d.wav")));
        assert!(!is_supported_extension(&PathBuf::from("e.aac")));
        assert!(!is_supported_extension(&PathBuf::from("noext")));
    }

    #[test]
    fn duration_ms_from_codec_params_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_ms_from_codec_params(&params).is_none());
    }

    #[test]
    fn duration_ms_from_codec_params_computes() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        params.n_frames = Some(96_000);
        assert_eq!(duration_ms_from_codec_params(&params), Some(2000));
    }

    #[test]
    fn codec_name_from_params_maps_known_codecs() {
        let mut params = CodecParameters::new();
        params.codec = CODEC_TYPE_MP3;
        assert_eq!(codec_name_from_params(&params), Some("MP3".to_string()));
        params.codec = CODEC_TYPE_NULL;
        assert!(codec_name_from_params(&params).is_none());
    }
}
