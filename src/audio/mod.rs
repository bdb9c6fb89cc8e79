//! Audio playback seam
//!
//! One global channel: loading a new clip replaces whatever was loaded
//! before, and only one clip plays at a time. Energy for lip sync comes from
//! the decoded samples at the current playback position ([`EnergyMeter`]),
//! not from the output device.

mod meter;
mod rodio_playback;
mod silent;

pub use meter::{EnergyMeter, ENERGY_WINDOW};
pub use rodio_playback::RodioPlayback;
pub use silent::SilentPlayback;

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read audio {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported or corrupt audio: {0}")]
    Decode(String),
    #[error("No clip loaded")]
    NothingLoaded,
    #[error("Audio device unavailable: {0}")]
    Device(String),
    #[error("Audio thread is gone")]
    ThreadGone,
}

pub type Result<T> = std::result::Result<T, AudioError>;

pub trait AudioPlayback {
    /// Read and decode the clip at `path`; the file is not touched again
    /// after this returns
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Start the loaded clip from the beginning
    fn play(&mut self) -> Result<()>;

    /// True while the started clip still has samples to play
    fn is_busy(&self) -> bool;

    /// RMS amplitude of the clip around the current playback position
    fn current_energy(&self) -> f32;

    fn stop(&mut self);
}

pub(crate) fn read_clip(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| AudioError::Io {
        path: path.to_path_buf(),
        source,
    })
}
