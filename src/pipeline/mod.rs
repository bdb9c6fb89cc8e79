//! Producer/consumer pipeline between content generation and the render loop
//!
//! ```text
//!  producer thread                         render thread
//!  ---------------                         -------------
//!  wait_until_free ◄──── complete ──────── PlaybackConsumer::tick
//!  compose + synthesize                      │ claim ─► load/play (resource lock)
//!  commit (resource lock)                    │ lip sync while busy
//!  push ─────────► DeliveryQueue ──► pop ────┘ complete when audio ends
//! ```
//!
//! At most one utterance plays at a time: the consumer only claims from the
//! queue while the gate is free, and the claim itself marks the gate busy.

mod consumer;
mod gate;
mod producer;
mod queue;
mod source;
mod utterance;

pub use consumer::{PlaybackConsumer, PlaybackState, TickReport};
pub use gate::{AudioResource, GateWait, PlaybackGate};
pub use producer::{ProducerSettings, UtteranceProducer};
pub use queue::DeliveryQueue;
pub use source::{Draft, UtteranceSource};
pub use utterance::{Utterance, UtteranceState};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::audio::AudioError;
use crate::generation::GenerationError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Failed to commit {staged} as {location}: {source}")]
    Commit {
        staged: PathBuf,
        location: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Playback failed: {0}")]
    Playback(#[from] AudioError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Counters shared by the producer and the render thread
#[derive(Debug, Default)]
pub struct PipelineStats {
    produced: AtomicU64,
    played: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub produced: u64,
    pub played: u64,
    pub dropped: u64,
    pub failures: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_played(&self) {
        self.played.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            produced: self.produced.load(Ordering::Relaxed),
            played: self.played.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
