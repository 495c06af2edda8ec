//! Sound clips, decoded with symphonia.
//!
//! The clip is decoded all the way to PCM frames rather than trusting the
//! container header, so a truncated or corrupt stream is caught at import
//! time instead of at playback.

use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use symphonia::core::{
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, instrument, warn};

use crate::error::{ErrorKind, Result};
use crate::models::{AssetType, Imported, SourceFile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Decoded PCM frames (one sample per channel).
    pub frames: u64,
    /// Short codec name, e.g. `pcm_s16le` or `vorbis`.
    pub codec: String,
}

#[instrument(skip_all, fields(file = %file.name, size = file.data.len()))]
pub(crate) fn import(file: SourceFile) -> Result<Imported<AudioMetadata>> {
    file.ensure(AssetType::Audio)?;
    let metadata = decode(&file)?;
    debug!(duration = metadata.duration_secs, rate = metadata.sample_rate, channels = metadata.channels, "decoded audio");
    Ok(Imported { data: file.data, metadata, thumbnail: None })
}

fn decode(file: &SourceFile) -> Result<AudioMetadata> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(file.data.clone())), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = file.extension() {
        hint.with_extension(&extension);
    }
    if let Some(mime) = &file.mime {
        hint.mime_type(mime);
    }

    let mut format = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .or_raise(|| ErrorKind::unsupported(&file.name, "no known audio container"))?
        .format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ErrorKind::decode(&file.name, "no audio track"))?;
    let track_id = track.id;
    let codec = symphonia::default::get_codecs()
        .get_codec(track.codec_params.codec)
        .map(|descriptor| descriptor.short_name.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .or_raise(|| ErrorKind::unsupported(&file.name, format!("no decoder for codec {codec}")))?;

    let mut frames: u64 = 0;
    let mut skipped_packets = 0usize;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            },
            Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err).or_raise(|| ErrorKind::decode(&file.name, "unreadable packet")),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_rate == 0 || channels == 0 {
                    let spec = decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count();
                }
                frames += decoded.frames() as u64;
            },
            Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            // A single damaged packet is recoverable; the stream continues.
            Err(SymphoniaError::DecodeError(_)) => skipped_packets += 1,
            Err(err) => return Err(err).or_raise(|| ErrorKind::decode(&file.name, "undecodable packet")),
        }
    }

    if skipped_packets > 0 {
        warn!(skipped_packets, "skipped undecodable packets");
    }
    if frames == 0 || sample_rate == 0 {
        exn::bail!(ErrorKind::decode(&file.name, "stream contains no decodable audio frames"));
    }
    let channels = u16::try_from(channels).or_raise(|| ErrorKind::decode(&file.name, "too many channels"))?;
    Ok(AudioMetadata {
        duration_secs: frames as f64 / f64::from(sample_rate),
        sample_rate,
        channels,
        frames,
        codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn wav(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(sample).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[rstest]
    #[case(44_100, 1, 22_050, 0.5)]
    #[case(48_000, 2, 12_000, 0.25)]
    #[case(8_000, 1, 8_000, 1.0)]
    fn test_import_wav(#[case] rate: u32, #[case] channels: u16, #[case] frames: u32, #[case] duration: f64) {
        let data = wav(rate, channels, frames);
        let imported = import(SourceFile::new("sfx/blip.wav", data.clone())).unwrap();
        assert_eq!(imported.data, data);
        assert!(imported.thumbnail.is_none());
        let metadata = imported.metadata;
        assert_eq!(metadata.sample_rate, rate);
        assert_eq!(metadata.channels, channels);
        assert_eq!(metadata.frames, u64::from(frames));
        assert!((metadata.duration_secs - duration).abs() < 1e-6);
        assert!(metadata.codec.starts_with("pcm"));
    }

    #[test]
    fn test_mime_without_extension() {
        let imported = import(SourceFile::new("upload", wav(22_050, 1, 2_205)).with_mime("audio/wav")).unwrap();
        assert!((imported.metadata.duration_secs - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = import(SourceFile::new("noise.wav", b"definitely not a RIFF header".to_vec())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat { file, .. } if file == "noise.wav"));
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let err = import(SourceFile::new("theme.aiff", wav(8_000, 1, 100))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_empty_stream_is_rejected() {
        // Never registered as a zero-length clip.
        assert!(import(SourceFile::new("silence.wav", wav(8_000, 1, 0))).is_err());
    }
}
