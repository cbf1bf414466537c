// cpal-based output device for Windows, macOS and Linux
// Each stream plays one buffer: write() blocks until the callback has drained it

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use keyclack_core::{KeyclackError, PcmSpec, Result, SampleFormat};
use keyclack_renderer_api::{OutputDevice, OutputStream};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Extra time allowed beyond the buffer's duration before a write gives up
const WRITE_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

/// Time left for the device to play out its last period before the stream stops
const CLOSE_TAIL: Duration = Duration::from_millis(50);

/// Default system output device, acquired lazily and shared by all streams
pub struct CpalDevice {
    device: Mutex<Option<Arc<Device>>>,
}

impl CpalDevice {
    pub fn new() -> Self {
        Self {
            device: Mutex::new(None),
        }
    }

    fn acquire(&self) -> Result<Arc<Device>> {
        let mut slot = self.device.lock();
        if let Some(device) = slot.as_ref() {
            return Ok(device.clone());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| KeyclackError::DeviceError("No output device available".to_string()))?;
        log::info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let device = Arc::new(device);
        *slot = Some(device.clone());
        Ok(device)
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for CpalDevice {
    fn open_stream(&self, spec: &PcmSpec) -> Result<Box<dyn OutputStream>> {
        let device = self.acquire()?;
        Ok(Box::new(CpalStream::open(&device, *spec)?))
    }

    fn release(&self) -> Result<()> {
        if self.device.lock().take().is_some() {
            log::info!("Audio device released");
        }
        Ok(())
    }
}

struct QueueState {
    samples: Vec<f32>,
    position: usize,
    pending: bool,
}

/// Samples handed from write() to the device callback
struct PlaybackQueue {
    state: Mutex<QueueState>,
    drained: Condvar,
}

struct CpalStream {
    stream: Stream,
    queue: Arc<PlaybackQueue>,
    spec: PcmSpec,
}

impl CpalStream {
    fn open(device: &Device, spec: PcmSpec) -> Result<Self> {
        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.frame_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        log::debug!("Stream config: {:?}", config);

        let queue = Arc::new(PlaybackQueue {
            state: Mutex::new(QueueState {
                samples: Vec::new(),
                position: 0,
                pending: false,
            }),
            drained: Condvar::new(),
        });
        let callback_queue = queue.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut state = callback_queue.state.lock();
                    let start = state.position.min(state.samples.len());
                    let count = (state.samples.len() - start).min(data.len());

                    data[..count].copy_from_slice(&state.samples[start..start + count]);
                    data[count..].fill(0.0);
                    state.position = start + count;

                    if state.pending && state.position >= state.samples.len() {
                        state.pending = false;
                        callback_queue.drained.notify_all();
                    }
                },
                |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| KeyclackError::DeviceError(format!("Failed to build output stream: {}", e)))?;

        Ok(Self {
            stream,
            queue,
            spec,
        })
    }
}

impl OutputStream for CpalStream {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let samples = to_f32_samples(data, self.spec.sample_format);
        if samples.is_empty() {
            return Ok(());
        }

        let frames = samples.len() / self.spec.channels as usize;
        let duration = Duration::from_secs_f64(frames as f64 / self.spec.frame_rate as f64);
        let deadline = Instant::now() + duration + WRITE_TIMEOUT_MARGIN;

        {
            let mut state = self.queue.state.lock();
            state.samples = samples;
            state.position = 0;
            state.pending = true;
        }

        self.stream
            .play()
            .map_err(|e| KeyclackError::DeviceError(format!("Failed to start stream: {}", e)))?;

        let mut state = self.queue.state.lock();
        while state.pending {
            if self.queue.drained.wait_until(&mut state, deadline).timed_out() && state.pending {
                state.pending = false;
                return Err(KeyclackError::DeviceError(format!(
                    "Playback did not finish within {:?}",
                    duration + WRITE_TIMEOUT_MARGIN
                )));
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        std::thread::sleep(CLOSE_TAIL);
        self.stream
            .pause()
            .map_err(|e| KeyclackError::DeviceError(format!("Failed to stop stream: {}", e)))
    }
}

/// Decode interleaved native-endian samples to f32 in [-1.0, 1.0]
pub fn to_f32_samples(bytes: &[u8], format: SampleFormat) -> Vec<f32> {
    match format {
        SampleFormat::U8 => bytes.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect(),
        SampleFormat::I16 => bytes
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes([c[0], c[1]]) as f32 / 32768.0)
            .collect(),
        SampleFormat::I32 => bytes
            .chunks_exact(4)
            .map(|c| (i32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as f64 / 2147483648.0) as f32)
            .collect(),
        SampleFormat::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}
