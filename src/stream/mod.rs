//! Live egress: one raw RGBA frame per tick into an external encoder
//!
//! Writes are synchronous. If the encoder stops reading, the render loop
//! stalls with it instead of dropping frames, which keeps audio and video
//! aligned. Any encoder failure ends the stream.

mod encoder;

pub use encoder::{AudioTrack, EncoderProcess, EncoderSettings};

use std::path::PathBuf;
use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to start encoder {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Encoder has no input pipe")]
    NoInput,
    #[error("Encoder input closed: {0}")]
    Write(#[source] std::io::Error),
    #[error("Encoder exited: {0}")]
    Exited(String),
    #[error("Frame is {actual} bytes, encoder expects {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("Invalid stream audio '{0}'. Valid options: silent, input:<format>:<source>")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Frame sink for the render loop
pub struct StreamEgress {
    encoder: EncoderProcess,
    width: u32,
    height: u32,
    frames: u64,
}

impl StreamEgress {
    /// Spawn the encoder described by `settings`
    pub fn start(settings: &EncoderSettings) -> Result<Self> {
        let encoder = EncoderProcess::spawn(settings)?;
        Ok(Self::new(encoder, settings.width, settings.height))
    }

    /// Wrap an already running encoder taking `width`x`height` frames
    pub fn new(encoder: EncoderProcess, width: u32, height: u32) -> Self {
        Self {
            encoder,
            width,
            height,
            frames: 0,
        }
    }

    /// Write this tick's frame, blocking until the encoder accepts it
    pub fn submit(&mut self, frame: &RgbaImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(StreamError::FrameSize {
                expected: self.encoder.frame_bytes(),
                actual: frame.as_raw().len(),
            });
        }
        self.encoder.write_frame(frame.as_raw())?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames_streamed(&self) -> u64 {
        self.frames
    }

    /// Close the input and wait up to `timeout` for the encoder to flush
    pub fn finish(self, timeout: Duration) -> Result<()> {
        log::info!("closing stream after {} frames", self.frames);
        self.encoder.finish(timeout)
    }
}
