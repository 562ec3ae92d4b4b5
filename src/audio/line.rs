//! Audio input lines: a blocking, byte-oriented view over a capture device
//!
//! `cpal` delivers audio through a callback. [`CpalLine`] collects those
//! callbacks into a bounded byte buffer of 16-bit little-endian mono samples
//! and hands them out through [`AudioLine::read`], so the sensor can work on
//! fixed-size blocks.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate};
use parking_lot::{Condvar, Mutex};

use crate::error::AudioError;

/// Capture rate requested from the device
pub const SAMPLE_RATE: u32 = 44_100;

/// One second of mono 16-bit audio; older bytes are dropped beyond this
const MAX_BUFFERED_BYTES: usize = SAMPLE_RATE as usize * 2;

/// How long a read waits for the device before reporting an underrun
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// An open capture line
pub trait AudioLine {
    /// Fill `buf` with up to `buf.len()` bytes; 0 means nothing arrived in time
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError>;

    /// Stop capturing and release the device
    fn close(&mut self);
}

/// Opens lines on a named device or the system default
pub trait LineOpener: Send + Sync {
    fn open(&self, device: Option<&str>) -> Result<Box<dyn AudioLine>, AudioError>;
}

#[derive(Default)]
struct Shared {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
    error: Mutex<Option<String>>,
}

impl Shared {
    fn push_frames<T: Copy>(&self, data: &[T], channels: usize, to_i16: impl Fn(T) -> i16) {
        let mut bytes = self.bytes.lock();
        for frame in data.chunks(channels.max(1)) {
            bytes.extend(to_i16(frame[0]).to_le_bytes());
        }
        let excess = bytes.len().saturating_sub(MAX_BUFFERED_BYTES);
        if excess > 0 {
            // drop whole samples so byte pairs stay aligned
            bytes.drain(..excess + excess % 2);
        }
        drop(bytes);
        self.ready.notify_all();
    }

    fn fail(&self, message: String) {
        *self.error.lock() = Some(message);
        self.ready.notify_all();
    }
}

/// Capture line backed by a `cpal` input stream
pub struct CpalLine {
    stream: Option<cpal::Stream>,
    shared: Arc<Shared>,
}

impl CpalLine {
    pub fn open(device_name: Option<&str>) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = find_device(&host, device_name)?;
        let supported = pick_config(&device)?;
        let channels = supported.channels() as usize;
        let config = supported.config();

        tracing::info!(
            "[AUDIO] Opening '{}' at {}Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            channels,
            supported.sample_format()
        );

        let shared = Arc::new(Shared::default());
        let stream = match supported.sample_format() {
            SampleFormat::I16 => {
                let data_shared = shared.clone();
                let err_shared = shared.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        data_shared.push_frames(data, channels, |s| s)
                    },
                    move |err| err_shared.fail(err.to_string()),
                    None,
                )
            }
            SampleFormat::F32 => {
                let data_shared = shared.clone();
                let err_shared = shared.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        data_shared.push_frames(data, channels, |s| {
                            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                        })
                    },
                    move |err| err_shared.fail(err.to_string()),
                    None,
                )
            }
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }
        .map_err(|e| AudioError::Stream(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(Self {
            stream: Some(stream),
            shared,
        })
    }
}

impl AudioLine for CpalLine {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::Read("line is closed".to_string()));
        }
        if let Some(message) = self.shared.error.lock().take() {
            return Err(AudioError::Read(message));
        }

        let mut bytes = self.shared.bytes.lock();
        if bytes.len() < 2 {
            self.shared.ready.wait_for(&mut bytes, READ_TIMEOUT);
        }

        let n = bytes.len().min(buf.len()) & !1;
        for (dst, src) in buf.iter_mut().zip(bytes.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("[AUDIO] Pausing stream before close failed: {}", e);
            }
            tracing::debug!("[AUDIO] Input line closed");
        }
    }
}

impl Drop for CpalLine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opener for the host's real capture devices
#[derive(Debug, Default)]
pub struct CpalOpener;

impl LineOpener for CpalOpener {
    fn open(&self, device: Option<&str>) -> Result<Box<dyn AudioLine>, AudioError> {
        Ok(Box::new(CpalLine::open(device)?))
    }
}

/// Names of the available capture devices
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::Stream(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let Some(name) = name else {
        return host.default_input_device().ok_or(AudioError::NoDevice);
    };
    host.input_devices()
        .map_err(|e| AudioError::Stream(e.to_string()))?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

/// Prefer a 44.1kHz config with the fewest channels, i16 before f32; fall back
/// to the device default otherwise.
fn pick_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let rate = SampleRate(SAMPLE_RATE);
    let ranges: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?
        .collect();

    for format in [SampleFormat::I16, SampleFormat::F32] {
        let candidate = ranges
            .iter()
            .filter(|r| r.sample_format() == format)
            .filter(|r| r.min_sample_rate() <= rate && r.max_sample_rate() >= rate)
            .min_by_key(|r| r.channels());
        if let Some(range) = candidate {
            return Ok(range.clone().with_sample_rate(rate));
        }
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;
    tracing::warn!(
        "[AUDIO] Device has no 44.1kHz capture mode, using {}Hz {:?}",
        fallback.sample_rate().0,
        fallback.sample_format()
    );
    Ok(fallback)
}
