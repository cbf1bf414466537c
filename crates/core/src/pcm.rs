// Decoded PCM payloads and the loader seam that produces them

use crate::error::{KeyclackError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Sample encoding of a PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, centred on 128
    U8,
    /// Signed 16-bit
    I16,
    /// Signed 32-bit
    I32,
    /// 32-bit IEEE float
    F32,
}

impl SampleFormat {
    /// Width of one sample in bytes
    pub fn sample_width(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::I16 => 2,
            SampleFormat::I32 | SampleFormat::F32 => 4,
        }
    }
}

/// Stream parameters of a PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub frame_rate: u32,
}

impl PcmSpec {
    pub fn new(channels: u16, sample_format: SampleFormat, frame_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(KeyclackError::UnsupportedFormat(
                "Channel count must be at least 1".to_string(),
            ));
        }
        if frame_rate == 0 {
            return Err(KeyclackError::UnsupportedFormat(
                "Frame rate must be positive".to_string(),
            ));
        }
        Ok(Self {
            channels,
            sample_format,
            frame_rate,
        })
    }

    /// Bytes per interleaved frame (all channels)
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.sample_format.sample_width()
    }
}

/// Immutable decoded sound: interleaved, native-endian sample bytes plus
/// the parameters needed to open an output stream for them.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone)]
pub struct PcmData {
    spec: PcmSpec,
    bytes: Arc<[u8]>,
}

impl PcmData {
    pub fn new(spec: PcmSpec, bytes: Vec<u8>) -> Result<Self> {
        let spec = PcmSpec::new(spec.channels, spec.sample_format, spec.frame_rate)?;
        if bytes.len() % spec.frame_size() != 0 {
            return Err(KeyclackError::UnsupportedFormat(format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                spec.frame_size()
            )));
        }
        Ok(Self {
            spec,
            bytes: bytes.into(),
        })
    }

    pub fn spec(&self) -> &PcmSpec {
        &self.spec
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn sample_width(&self) -> usize {
        self.spec.sample_format.sample_width()
    }

    pub fn frame_rate(&self) -> u32 {
        self.spec.frame_rate
    }

    pub fn frame_count(&self) -> usize {
        self.bytes.len() / self.spec.frame_size()
    }

    /// Playback length at the native frame rate
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.spec.frame_rate as f64)
    }
}

/// Reads a sound file into memory.
/// Implementations must not cache; the player owns caching.
pub trait SoundLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<PcmData>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_widths() {
        assert_eq!(SampleFormat::U8.sample_width(), 1);
        assert_eq!(SampleFormat::I16.sample_width(), 2);
        assert_eq!(SampleFormat::I32.sample_width(), 4);
        assert_eq!(SampleFormat::F32.sample_width(), 4);
    }

    #[test]
    fn test_spec_rejects_zero_channels_and_rate() {
        assert!(PcmSpec::new(0, SampleFormat::I16, 44100).is_err());
        assert!(PcmSpec::new(1, SampleFormat::I16, 0).is_err());
    }

    #[test]
    fn test_pcm_data_frames_and_duration() {
        let spec = PcmSpec::new(2, SampleFormat::I16, 1000).unwrap();
        let data = PcmData::new(spec, vec![0u8; 2 * 2 * 500]).unwrap();
        assert_eq!(data.frame_count(), 500);
        assert_eq!(data.duration(), Duration::from_millis(500));
        assert_eq!(data.sample_width(), 2);
        assert_eq!(data.channels(), 2);
    }

    #[test]
    fn test_pcm_data_rejects_partial_frame() {
        let spec = PcmSpec::new(2, SampleFormat::I16, 8000).unwrap();
        assert!(matches!(
            PcmData::new(spec, vec![0u8; 6]),
            Err(KeyclackError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_clone_shares_buffer() {
        let spec = PcmSpec::new(1, SampleFormat::U8, 8000).unwrap();
        let data = PcmData::new(spec, vec![128u8; 16]).unwrap();
        let copy = data.clone();
        assert_eq!(data.bytes().as_ptr(), copy.bytes().as_ptr());
    }
}
