// PCM WAV extraction using Symphonia
// Reads the whole file into one interleaved byte buffer at its native width

use keyclack_core::{KeyclackError, PcmData, PcmSpec, Result, SampleFormat, SoundLoader};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, RawSampleBuffer};
use symphonia::core::codecs::{
    CodecType, DecoderOptions, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_U8,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Loads uncompressed PCM wave files
#[derive(Debug, Default, Clone, Copy)]
pub struct WavLoader;

impl WavLoader {
    pub fn new() -> Self {
        Self
    }

    fn sample_format_for(codec: CodecType) -> Result<SampleFormat> {
        match codec {
            CODEC_TYPE_PCM_U8 => Ok(SampleFormat::U8),
            CODEC_TYPE_PCM_S16LE => Ok(SampleFormat::I16),
            CODEC_TYPE_PCM_S32LE => Ok(SampleFormat::I32),
            CODEC_TYPE_PCM_F32LE => Ok(SampleFormat::F32),
            other => Err(KeyclackError::UnsupportedFormat(format!(
                "Codec {:?} is not 8/16/32-bit PCM",
                other
            ))),
        }
    }

    /// Append one decoded packet to `out` as interleaved raw samples
    fn append_interleaved(out: &mut Vec<u8>, decoded: AudioBufferRef<'_>, format: SampleFormat) {
        let capacity = decoded.capacity() as u64;
        let spec = *decoded.spec();

        match format {
            SampleFormat::U8 => {
                let mut raw = RawSampleBuffer::<u8>::new(capacity, spec);
                raw.copy_interleaved_ref(decoded);
                out.extend_from_slice(raw.as_bytes());
            }
            SampleFormat::I16 => {
                let mut raw = RawSampleBuffer::<i16>::new(capacity, spec);
                raw.copy_interleaved_ref(decoded);
                out.extend_from_slice(raw.as_bytes());
            }
            SampleFormat::I32 => {
                let mut raw = RawSampleBuffer::<i32>::new(capacity, spec);
                raw.copy_interleaved_ref(decoded);
                out.extend_from_slice(raw.as_bytes());
            }
            SampleFormat::F32 => {
                let mut raw = RawSampleBuffer::<f32>::new(capacity, spec);
                raw.copy_interleaved_ref(decoded);
                out.extend_from_slice(raw.as_bytes());
            }
        }
    }
}

impl SoundLoader for WavLoader {
    fn load(&self, path: &Path) -> Result<PcmData> {
        let file = File::open(path).map_err(|e| {
            KeyclackError::LoadError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let media_source_stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                KeyclackError::UnsupportedFormat(format!("Failed to probe {}: {}", path.display(), e))
            })?;
        let mut format_reader = probe_result.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| KeyclackError::UnsupportedFormat("No audio track found".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_format = Self::sample_format_for(codec_params.codec)?;
        let channels = codec_params
            .channels
            .ok_or_else(|| KeyclackError::UnsupportedFormat("Channels not specified".to_string()))?
            .count() as u16;
        let frame_rate = codec_params
            .sample_rate
            .ok_or_else(|| KeyclackError::UnsupportedFormat("Sample rate not specified".to_string()))?;
        let spec = PcmSpec::new(channels, sample_format, frame_rate)?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| KeyclackError::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

        let mut bytes = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    return Err(KeyclackError::UnsupportedFormat(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| KeyclackError::UnsupportedFormat(format!("Failed to decode packet: {}", e)))?;
            Self::append_interleaved(&mut bytes, decoded, sample_format);
        }

        // The data chunk header declares the frame count; fewer frames means a cut-off file
        if let Some(declared) = codec_params.n_frames {
            let decoded = (bytes.len() / spec.frame_size()) as u64;
            if decoded < declared {
                return Err(KeyclackError::UnsupportedFormat(format!(
                    "{} is truncated: {} of {} frames present",
                    path.display(),
                    decoded,
                    declared
                )));
            }
        }

        let data = PcmData::new(spec, bytes)?;
        log::debug!(
            "Loaded {}: {} Hz, {} channels, {}-byte samples, {} frames",
            path.display(),
            data.frame_rate(),
            data.channels(),
            data.sample_width(),
            data.frame_count()
        );
        Ok(data)
    }
}
