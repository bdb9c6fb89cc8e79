use std::io::Cursor;
use std::time::{Duration, Instant};

use super::{AudioError, Result};

/// Span of audio the energy is measured over, one frame at 60 fps
pub const ENERGY_WINDOW: Duration = Duration::from_micros(16_667);

/// Decoded mono samples of one clip plus the instant playback began
#[derive(Debug, Clone)]
pub struct EnergyMeter {
    samples: Vec<f32>,
    sample_rate: u32,
    started: Option<Instant>,
}

impl EnergyMeter {
    /// Decode a WAV file held in memory, mixing all channels down to mono
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| AudioError::Decode(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| AudioError::Decode(e.to_string()))?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self::from_samples(samples, spec.sample_rate))
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1),
            started: None,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    pub fn start(&mut self, at: Instant) {
        self.started = Some(at);
    }

    pub fn reset(&mut self) {
        self.started = None;
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started.map(|t| t.elapsed())
    }

    /// Whether the clip was started and has played out
    pub fn finished(&self) -> bool {
        match self.elapsed() {
            Some(elapsed) => elapsed >= self.duration(),
            None => false,
        }
    }

    /// RMS over the window that ends at `elapsed`
    pub fn rms_at(&self, elapsed: Duration) -> f32 {
        let rate = f64::from(self.sample_rate);
        let end = ((elapsed.as_secs_f64() * rate) as usize).min(self.samples.len());
        let window = ((ENERGY_WINDOW.as_secs_f64() * rate) as usize).max(1);
        let start = end.saturating_sub(window);
        if start >= end {
            return 0.0;
        }
        let slice = &self.samples[start..end];
        let sum: f32 = slice.iter().map(|s| s * s).sum();
        (sum / slice.len() as f32).sqrt()
    }

    /// RMS at the current playback position, 0 when not started
    pub fn energy_now(&self) -> f32 {
        self.elapsed().map(|e| self.rms_at(e)).unwrap_or(0.0)
    }
}
