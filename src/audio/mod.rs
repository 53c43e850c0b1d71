pub mod capture;
pub mod wav;

pub use capture::{CaptureSource, CaptureSourceFactory, WavFileSource};
#[cfg(feature = "audio")]
pub use capture::MicrophoneSource;
pub use wav::WavInfo;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started (audio time)
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        let per_second = u64::from(self.sample_rate) * u64::from(self.channels);
        if per_second == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / per_second
    }

    /// Timestamp of the end of this frame (audio time).
    pub fn end_ms(&self) -> u64 {
        self.timestamp_ms + self.duration_ms()
    }
}

/// Configuration for a capture source
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Samples per chunk, per channel
    pub chunk_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            chunk_size: 1024,
        }
    }
}

impl CaptureConfig {
    /// Interleaved samples per emitted frame.
    pub fn samples_per_frame(&self) -> usize {
        self.chunk_size * self.channels as usize
    }

    /// Wall-clock duration of one chunk in milliseconds.
    pub fn chunk_interval_ms(&self) -> u64 {
        (self.chunk_size as u64 * 1000) / u64::from(self.sample_rate.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_accounts_for_channels() {
        let frame = AudioFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 200,
        };
        assert_eq!(frame.duration_ms(), 100);
        assert_eq!(frame.end_ms(), 300);

        let stereo = AudioFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 2,
            timestamp_ms: 0,
        };
        assert_eq!(stereo.duration_ms(), 50);
    }

    #[test]
    fn chunk_interval_matches_sample_rate() {
        let config = CaptureConfig {
            sample_rate: 16000,
            channels: 1,
            chunk_size: 1600,
        };
        assert_eq!(config.chunk_interval_ms(), 100);
        assert_eq!(config.samples_per_frame(), 1600);
    }
}
