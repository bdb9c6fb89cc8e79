use std::sync::Arc;
use std::time::Duration;

use super::{
    AudioResource, DeliveryQueue, GateWait, PipelineStats, PlaybackGate, Result, Utterance,
    UtteranceSource,
};
use crate::config::ProducerOptions;
use crate::threading::{RunFlag, ThreadError, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Pause after each delivered utterance
    pub cadence: Duration,
    /// Longest wait for the previous playback to finish
    pub gate_timeout: Duration,
    /// Pause after a failed round
    pub error_backoff: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(3),
            gate_timeout: Duration::from_secs(10),
            error_backoff: Duration::from_secs(2),
        }
    }
}

impl From<&ProducerOptions> for ProducerSettings {
    fn from(opts: &ProducerOptions) -> Self {
        Self {
            cadence: opts.cadence(),
            gate_timeout: opts.gate_timeout(),
            error_backoff: opts.error_backoff(),
        }
    }
}

/// Worker that keeps the delivery queue supplied
pub struct UtteranceProducer {
    source: UtteranceSource,
    gate: Arc<PlaybackGate>,
    resource: Arc<AudioResource>,
    queue: DeliveryQueue,
    stats: Arc<PipelineStats>,
    settings: ProducerSettings,
    run: RunFlag,
    sequence: u64,
}

impl UtteranceProducer {
    pub fn new(
        source: UtteranceSource,
        gate: Arc<PlaybackGate>,
        resource: Arc<AudioResource>,
        queue: DeliveryQueue,
        stats: Arc<PipelineStats>,
        settings: ProducerSettings,
        run: RunFlag,
    ) -> Self {
        Self {
            source,
            gate,
            resource,
            queue,
            stats,
            settings,
            run,
            sequence: 0,
        }
    }

    /// One round: wait for the gate, compose, synthesize, commit, deliver
    ///
    /// Returns the delivered sequence number, or `None` if shutdown began
    /// or the wait timed out with an utterance still queued. A busy gate is
    /// only bypassed once nothing undelivered refers to the artifact.
    pub fn produce_once(&mut self) -> Result<Option<u64>> {
        let queue = &self.queue;
        match self
            .gate
            .wait_until_free(self.settings.gate_timeout, || !queue.is_empty())
        {
            GateWait::Released => return Ok(None),
            // A queued utterance still points at the artifact; committing now
            // would replace its audio before it plays.
            GateWait::TimedOut if !self.queue.is_empty() => {
                log::warn!(
                    "{} utterance(s) still undelivered after {:?}, skipping this round",
                    self.queue.len(),
                    self.settings.gate_timeout
                );
                return Ok(None);
            }
            GateWait::TimedOut => log::warn!(
                "previous playback still busy after {:?}, continuing anyway",
                self.settings.gate_timeout
            ),
            GateWait::Free | GateWait::Completed => {}
        }
        if !self.run.is_running() {
            return Ok(None);
        }

        let draft = self.source.compose()?;
        let staged = self.source.synthesize(&draft)?;
        let audio = self.resource.commit(&staged)?;

        self.sequence += 1;
        let utterance = Utterance::new(self.sequence, draft.text, draft.cue, audio);
        log::info!(
            "utterance {} ready (cue {:?}): {}",
            utterance.sequence(),
            utterance.cue(),
            utterance.text()
        );
        self.queue.push(utterance);
        self.stats.record_produced();
        Ok(Some(self.sequence))
    }

    /// Produce until the run flag is cleared; individual failures never end
    /// the loop
    pub fn run(mut self) {
        log::info!("producer started");
        while self.run.is_running() {
            let pause = match self.produce_once() {
                Ok(Some(_)) => self.settings.cadence,
                Ok(None) => self.settings.error_backoff,
                Err(e) => {
                    self.stats.record_failure();
                    log::warn!("utterance round failed: {}", e);
                    self.settings.error_backoff
                }
            };
            if !self.run.wait_timeout(pause) {
                break;
            }
        }
        log::info!("producer stopped");
    }

    pub fn spawn(self) -> std::result::Result<Worker<()>, ThreadError> {
        Worker::spawn("producer", move || self.run())
    }
}
