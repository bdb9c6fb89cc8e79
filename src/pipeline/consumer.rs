use std::sync::Arc;

use super::{
    AudioResource, DeliveryQueue, PipelineStats, PlaybackGate, Utterance, UtteranceState,
};
use crate::audio::AudioPlayback;
use crate::engine::RenderEngine;
use crate::lipsync::LipSyncMapper;

/// Playback bookkeeping owned by the render thread
#[derive(Debug, Default)]
pub struct PlaybackState {
    active: Option<Utterance>,
    /// Highest sequence that finished or was dropped; the queue is FIFO so
    /// everything at or below it is settled
    last_retired: Option<u64>,
}

impl PlaybackState {
    /// The utterance currently playing
    pub fn active(&self) -> Option<&Utterance> {
        self.active.as_ref()
    }

    /// Dropped utterances read as `Done`
    pub fn state_of(&self, sequence: u64) -> UtteranceState {
        match &self.active {
            Some(u) if u.sequence() == sequence => UtteranceState::Playing,
            _ if self.last_retired.is_some_and(|last| sequence <= last) => UtteranceState::Done,
            _ => UtteranceState::Pending,
        }
    }

    fn retire(&mut self, sequence: u64) {
        self.last_retired = Some(self.last_retired.map_or(sequence, |last| last.max(sequence)));
    }
}

/// What one tick did, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub started: Option<u64>,
    pub dropped: Option<u64>,
    pub finished: Option<u64>,
    /// Energy fed to lip sync this tick
    pub rms: Option<f32>,
}

/// Per-tick consumption protocol, driven from the render loop
pub struct PlaybackConsumer {
    gate: Arc<PlaybackGate>,
    resource: Arc<AudioResource>,
    queue: DeliveryQueue,
    mapper: LipSyncMapper,
    neutral: Option<String>,
    stats: Arc<PipelineStats>,
    state: PlaybackState,
}

impl PlaybackConsumer {
    pub fn new(
        gate: Arc<PlaybackGate>,
        resource: Arc<AudioResource>,
        queue: DeliveryQueue,
        mapper: LipSyncMapper,
        neutral: Option<String>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            gate,
            resource,
            queue,
            mapper,
            neutral,
            stats,
            state: PlaybackState::default(),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn tick(
        &mut self,
        engine: &mut dyn RenderEngine,
        audio: &mut dyn AudioPlayback,
    ) -> TickReport {
        let mut report = TickReport::default();

        if self.state.active.is_none() {
            self.start_next(engine, audio, &mut report);
        }

        if self.state.active.is_some() {
            if audio.is_busy() {
                let rms = audio.current_energy();
                self.mapper.apply(rms, engine);
                report.rms = Some(rms);
            } else {
                self.finish(engine, &mut report);
            }
        }

        report
    }

    fn start_next(
        &mut self,
        engine: &mut dyn RenderEngine,
        audio: &mut dyn AudioPlayback,
        report: &mut TickReport,
    ) {
        let queue = &self.queue;
        let Some(utterance) = self.gate.claim(|| queue.try_pop()) else {
            return;
        };

        if let Some(cue) = utterance.cue() {
            if let Err(e) = engine.apply_expression(cue) {
                log::debug!("cue '{}' ignored: {}", cue, e);
            }
        }

        let started = self.resource.with_locked(|_| {
            audio.load(utterance.audio())?;
            audio.play()
        });

        match started {
            Ok(()) => {
                log::info!("playing utterance {}", utterance.sequence());
                report.started = Some(utterance.sequence());
                self.state.active = Some(utterance);
            }
            Err(e) => {
                log::warn!("dropping utterance {}: {}", utterance.sequence(), e);
                self.gate.abandon();
                self.state.retire(utterance.sequence());
                self.stats.record_dropped();
                report.dropped = Some(utterance.sequence());
                self.reset_expression(engine);
            }
        }
    }

    fn finish(&mut self, engine: &mut dyn RenderEngine, report: &mut TickReport) {
        let Some(done) = self.state.active.take() else {
            return;
        };
        log::info!("utterance {} finished", done.sequence());
        self.state.retire(done.sequence());
        report.finished = Some(done.sequence());
        self.gate.complete();
        self.stats.record_played();
        self.reset_expression(engine);
    }

    fn reset_expression(&self, engine: &mut dyn RenderEngine) {
        if let Some(neutral) = &self.neutral {
            if let Err(e) = engine.apply_expression(neutral) {
                log::debug!("neutral expression ignored: {}", e);
            }
        }
    }

    /// Stop whatever is playing; used at shutdown
    pub fn stop(&mut self, audio: &mut dyn AudioPlayback) {
        audio.stop();
        if self.state.active.take().is_some() {
            self.gate.abandon();
        }
    }
}
