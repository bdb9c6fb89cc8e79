use std::path::Path;
use std::time::Instant;

use super::{read_clip, AudioError, AudioPlayback, EnergyMeter, Result};

/// Playback without an output device
///
/// Clips are decoded and "played" against the wall clock, so busy state and
/// energy behave as they would with sound. Used with `--audio none` and on
/// machines without a sound card.
#[derive(Debug, Default)]
pub struct SilentPlayback {
    loaded: Option<EnergyMeter>,
    current: Option<EnergyMeter>,
}

impl SilentPlayback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioPlayback for SilentPlayback {
    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = read_clip(path)?;
        self.loaded = Some(EnergyMeter::decode(&bytes)?);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut meter = self.loaded.take().ok_or(AudioError::NothingLoaded)?;
        meter.start(Instant::now());
        self.current = Some(meter);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|m| !m.finished())
    }

    fn current_energy(&self) -> f32 {
        match &self.current {
            Some(meter) if !meter.finished() => meter.energy_now(),
            _ => 0.0,
        }
    }

    fn stop(&mut self) {
        self.current = None;
    }
}
