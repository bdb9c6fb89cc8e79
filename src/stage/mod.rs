//! Startup wiring, the fixed-rate tick loop, and shutdown
//!
//! The calling thread becomes the render thread: it alone owns the render
//! engine and the audio channel. Three workers run beside it (producer, idle
//! motion, gaze) and reach the engine only through the command queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::audio::{AudioPlayback, RodioPlayback, SilentPlayback};
use crate::behavior::{self, GazeSelector, IdleMotionSelector};
use crate::config::{
    parse_volume, AudioDriver, GeneratorProvider, Options, Secrets, SynthesizerProvider,
};
use crate::engine::{Catalog, CommandQueue, HeadlessEngine, RenderEngine};
use crate::generation::{
    ContentGenerator, GeminiGenerator, ScriptedGenerator, SpeechSynthesizer, SynthesizerBackend,
};
use crate::lipsync::{ChannelMap, LipSyncMapper};
use crate::pipeline::{
    AudioResource, DeliveryQueue, PipelineStats, PlaybackConsumer, PlaybackGate,
    ProducerSettings, UtteranceProducer, UtteranceSource,
};
use crate::stream::{EncoderSettings, StreamEgress};
use crate::threading::{RunFlag, ThreadError, Worker};

/// Collaborators chosen at startup
pub struct StageParts {
    pub engine: Box<dyn RenderEngine>,
    pub audio: Box<dyn AudioPlayback>,
    pub generator: Box<dyn ContentGenerator>,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    pub expressions: Catalog,
    pub motions: Catalog,
    pub egress: Option<StreamEgress>,
}

/// Build every collaborator `opts` asks for
///
/// A missing secret for the selected provider or an unloadable model is an
/// error. An unavailable audio device falls back to silent playback.
pub fn build_parts(opts: &Options, secrets: &Secrets) -> Result<StageParts> {
    let manifest = opts.model_manifest();
    let mut engine = HeadlessEngine::new(opts.resolution.width, opts.resolution.height);
    engine
        .load_model(&manifest)
        .with_context(|| format!("Failed to load model {}", manifest.display()))?;

    let expressions = Catalog::discover(&opts.model_dir.join("expressions"));
    let motions = Catalog::discover(&opts.model_dir.join("motions"));
    log::info!(
        "{} expressions, {} motion groups",
        expressions.len(),
        motions.len()
    );

    let audio: Box<dyn AudioPlayback> = match opts.audio.driver {
        AudioDriver::Rodio => match RodioPlayback::start(parse_volume(opts.audio.volume)) {
            Ok(playback) => Box::new(playback),
            Err(e) => {
                log::warn!("audio device unavailable ({}), playing silently", e);
                Box::new(SilentPlayback::new())
            }
        },
        AudioDriver::None => Box::new(SilentPlayback::new()),
    };

    let generator: Box<dyn ContentGenerator> = match opts.generator.provider {
        GeneratorProvider::Gemini => {
            let key = Secrets::require(&secrets.gemini_api_key, "GEMINI_API_KEY")?;
            Box::new(GeminiGenerator::new(key, &opts.generator.model))
        }
        GeneratorProvider::Script => {
            let path = opts
                .generator
                .script_file
                .as_deref()
                .context("generator provider 'script' requires generator.script_file")?;
            Box::new(
                ScriptedGenerator::from_file(path)
                    .with_context(|| format!("Failed to load script {}", path.display()))?,
            )
        }
    };

    let voice = opts.synthesizer.voice.as_deref();
    let synthesizer = match opts.synthesizer.provider {
        SynthesizerProvider::Smallest => SynthesizerBackend::smallest(
            Secrets::require(&secrets.smallest_api_key, "SMALLEST_API_KEY")?,
            voice,
        ),
        SynthesizerProvider::ElevenLabs => SynthesizerBackend::elevenlabs(
            Secrets::require(&secrets.elevenlabs_api_key, "ELEVENLABS_API_KEY")?,
            voice,
            opts.synthesizer.model_id.as_deref(),
        ),
        SynthesizerProvider::PlayHt => SynthesizerBackend::playht(
            Secrets::require(&secrets.play_ht_user_id, "PLAY_HT_USER_ID")?,
            Secrets::require(&secrets.play_ht_api_key, "PLAY_HT_API_KEY")?,
            voice,
        ),
        SynthesizerProvider::Command => SynthesizerBackend::command(&opts.synthesizer.command)?,
    };
    log::info!("speech synthesizer: {}", synthesizer.name());

    let egress = if opts.stream.enabled {
        let settings = EncoderSettings::from_options(opts)?;
        Some(StreamEgress::start(&settings).context("Failed to start stream encoder")?)
    } else {
        None
    };

    Ok(StageParts {
        engine: Box::new(engine),
        audio,
        generator,
        synthesizer: Box::new(synthesizer),
        expressions,
        motions,
        egress,
    })
}

/// Counts logged when the stage shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub produced: u64,
    pub played: u64,
    pub dropped: u64,
    pub failures: u64,
    pub frames_rendered: u64,
    pub frames_streamed: u64,
}

pub struct Stage {
    options: Options,
    parts: StageParts,
    run: RunFlag,
}

impl Stage {
    pub fn new(options: &Options, parts: StageParts) -> Self {
        Self {
            options: options.clone(),
            parts,
            run: RunFlag::new(),
        }
    }

    /// Handle for stopping the stage from another thread or a signal handler
    pub fn run_flag(&self) -> RunFlag {
        self.run.clone()
    }

    /// Run the tick loop until the flag clears, `run_for` elapses, or the
    /// stream fails
    pub fn run(self) -> Result<RunSummary> {
        let Stage {
            options: opts,
            parts,
            run,
        } = self;
        let StageParts {
            mut engine,
            mut audio,
            generator,
            synthesizer,
            expressions,
            motions,
            mut egress,
        } = parts;

        let stats = Arc::new(PipelineStats::new());
        let gate = Arc::new(PlaybackGate::new());
        let resource = Arc::new(AudioResource::new(&opts.audio.artifact_path));
        let queue = DeliveryQueue::new();
        let commands = CommandQueue::new();

        let channels = ChannelMap::classify(&engine.list_parameters());
        let mapper = LipSyncMapper::new(channels, opts.lip_sync_multiplier);
        let neutral = expressions.neutral().map(str::to_string);
        if let Some(neutral) = &neutral {
            if let Err(e) = engine.apply_expression(neutral) {
                log::debug!("neutral expression ignored: {}", e);
            }
        }
        let mut consumer = PlaybackConsumer::new(
            Arc::clone(&gate),
            Arc::clone(&resource),
            queue.clone(),
            mapper,
            neutral,
            Arc::clone(&stats),
        );

        let source =
            UtteranceSource::new(generator, synthesizer, expressions, &opts.audio.temp_path)
                .with_persona(opts.producer.persona.clone());
        let producer = UtteranceProducer::new(
            source,
            Arc::clone(&gate),
            Arc::clone(&resource),
            queue.clone(),
            Arc::clone(&stats),
            ProducerSettings::from(&opts.producer),
            run.clone(),
        );

        let mut workers: Vec<Worker<()>> = Vec::new();
        let started = Self::start_workers(&opts, producer, motions, &commands, &run, &mut workers);
        if let Err(e) = started {
            run.stop();
            gate.release();
            Self::join_all(&mut workers, opts.shutdown_timeout());
            return Err(e);
        }

        let frame_interval = opts.frame_interval();
        let run_for = opts.run_for();
        log::info!(
            "stage running at {} fps, {}",
            opts.fps,
            opts.resolution
        );

        let begin = Instant::now();
        let mut last = begin;
        let mut frames_rendered = 0u64;
        let mut outcome = Ok(());

        while run.is_running() {
            let tick_start = Instant::now();
            let dt = tick_start - last;
            last = tick_start;

            commands.drain_into(engine.as_mut());
            engine.update(dt);
            let report = consumer.tick(engine.as_mut(), audio.as_mut());
            if let Some(seq) = report.dropped {
                log::debug!("tick dropped utterance {}", seq);
            }
            engine.draw();
            frames_rendered += 1;

            if let Some(stream) = egress.as_mut() {
                if let Err(e) = stream.submit(engine.frame()) {
                    log::error!("stream failed: {}", e);
                    outcome = Err(anyhow::Error::new(e).context("Stream egress failed"));
                    break;
                }
            }

            if run_for.is_some_and(|limit| begin.elapsed() >= limit) {
                log::info!("run time elapsed, stopping");
                break;
            }

            let remaining = frame_interval.saturating_sub(tick_start.elapsed());
            if !remaining.is_zero() && !run.wait_timeout(remaining) {
                break;
            }
        }

        log::info!("shutting down");
        let shutdown_start = Instant::now();
        run.stop();
        gate.release();
        Self::join_all(&mut workers, opts.shutdown_timeout());
        consumer.stop(audio.as_mut());

        let frames_streamed = egress.as_ref().map_or(0, StreamEgress::frames_streamed);
        if let Some(stream) = egress.take() {
            if let Err(e) = stream.finish(opts.shutdown_timeout()) {
                log::warn!("encoder did not exit cleanly: {}", e);
            }
        }
        log::debug!("shutdown took {:?}", shutdown_start.elapsed());

        let snapshot = stats.snapshot();
        let summary = RunSummary {
            produced: snapshot.produced,
            played: snapshot.played,
            dropped: snapshot.dropped,
            failures: snapshot.failures,
            frames_rendered,
            frames_streamed,
        };
        log::info!(
            "summary: {} produced, {} played, {} dropped, {} failed rounds, {} frames rendered, {} streamed",
            summary.produced,
            summary.played,
            summary.dropped,
            summary.failures,
            summary.frames_rendered,
            summary.frames_streamed
        );

        outcome.map(|()| summary)
    }

    fn start_workers(
        opts: &Options,
        producer: UtteranceProducer,
        motions: Catalog,
        commands: &CommandQueue,
        run: &RunFlag,
        workers: &mut Vec<Worker<()>>,
    ) -> Result<()> {
        workers.push(producer.spawn()?);

        let idle = IdleMotionSelector::new(
            motions,
            opts.behavior.idle_min(),
            opts.behavior.idle_max(),
        )?;
        workers.push(behavior::spawn_idle(
            idle,
            commands.handle(),
            opts.behavior.motion_priority,
            run.clone(),
        )?);

        let gaze = GazeSelector::new(
            opts.behavior.gaze_weights,
            opts.resolution.width,
            opts.resolution.height,
        )?;
        workers.push(behavior::spawn_gaze(
            gaze,
            commands.handle(),
            opts.behavior.gaze_interval(),
            run.clone(),
        )?);
        Ok(())
    }

    fn join_all(workers: &mut [Worker<()>], timeout: Duration) {
        for worker in workers.iter_mut() {
            match worker.join_timeout(timeout) {
                Ok(()) => log::debug!("{} worker joined", worker.name()),
                Err(ThreadError::JoinTimeout { .. }) => log::warn!(
                    "{} worker still running after {:?}, abandoning it",
                    worker.name(),
                    timeout
                ),
                Err(e) => log::warn!("{} worker: {}", worker.name(), e),
            }
        }
    }
}
