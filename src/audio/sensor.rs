//! Instantaneous loudness of one block of 16-bit little-endian mono audio

use super::line::AudioLine;
use crate::error::AudioError;

/// Bytes requested per read
pub const BLOCK_BYTES: usize = 4096;

/// Magnitude of the most negative 16-bit sample
const FULL_SCALE: f64 = 32768.0;

/// Loudness reported for a full-scale signal
pub const MAX_LEVEL: f64 = 100.0;

/// RMS of the whole samples in `bytes`, scaled to `0..=MAX_LEVEL`.
///
/// A trailing odd byte is ignored; fewer than two bytes yields 0.
pub fn rms_level(bytes: &[u8]) -> f64 {
    let samples = bytes.len() / 2;
    if samples == 0 {
        return 0.0;
    }

    let sum: i64 = bytes
        .chunks_exact(2)
        .map(|pair| {
            let s = i16::from_le_bytes([pair[0], pair[1]]) as i64;
            s * s
        })
        .sum();

    let rms = (sum as f64 / samples as f64).sqrt();
    rms / FULL_SCALE * MAX_LEVEL
}

/// Reads one block from a line and converts it to a loudness value
pub struct AudioSensor {
    buffer: Vec<u8>,
}

impl Default for AudioSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSensor {
    pub fn new() -> Self {
        Self {
            buffer: vec![0; BLOCK_BYTES],
        }
    }

    /// Loudness of whatever a single read returns; an empty read is silence
    pub fn read_level(&mut self, line: &mut dyn AudioLine) -> Result<f64, AudioError> {
        let n = line.read(&mut self.buffer)?;
        Ok(rms_level(&self.buffer[..n.min(self.buffer.len())]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_silence_is_zero() {
        assert_eq!(rms_level(&encode(&[0; 2048])), 0.0);
    }

    #[test]
    fn test_empty_or_short_read_is_zero() {
        assert_eq!(rms_level(&[]), 0.0);
        assert_eq!(rms_level(&[0x7F]), 0.0);
    }

    #[test]
    fn test_full_scale_square_wave() {
        let samples: Vec<i16> = (0..2048)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let level = rms_level(&encode(&samples));
        assert!((level - MAX_LEVEL).abs() < 0.01, "level was {}", level);
    }

    #[test]
    fn test_half_scale_constant() {
        let level = rms_level(&encode(&[16384; 100]));
        assert!((level - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_odd_byte_ignored() {
        let mut bytes = encode(&[-16384, 16384]);
        bytes.push(0xFF);
        assert!((rms_level(&bytes) - 50.0).abs() < 1e-9);
    }

    struct Chunks(Vec<Vec<u8>>);

    impl AudioLine for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_sensor_uses_only_bytes_returned() {
        let mut line = Chunks(vec![encode(&[16384; 4]), vec![]]);
        let mut sensor = AudioSensor::new();
        assert!((sensor.read_level(&mut line).unwrap() - 50.0).abs() < 1e-9);
        // stale buffer contents from the previous read must not leak in
        assert_eq!(sensor.read_level(&mut line).unwrap(), 0.0);
    }
}
