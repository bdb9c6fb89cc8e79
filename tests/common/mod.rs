//! Fake collaborators shared by the integration tests

#![allow(dead_code)]

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use performer::audio::{AudioError, AudioPlayback};
use performer::engine::{EngineError, ParameterInfo, RenderEngine};
use performer::generation::{
    ContentGenerator, GenerationError, PromptContext, SpeechSynthesizer,
};

/// Write a short mono 16-bit tone
pub fn write_wav(path: &Path, samples: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("wav create should succeed");
    for i in 0..samples {
        let s = if i % 16 < 8 { 8000 } else { -8000 };
        writer.write_sample(s as i16).expect("wav write should succeed");
    }
    writer.finalize().expect("wav finalize should succeed");
}

/// Numbered lines; classification picks the first candidate
///
/// Fails every call listed in `fail_on` (1-based generate calls).
pub struct FakeGenerator {
    pub calls: usize,
    pub fail_on: Vec<usize>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            calls: 0,
            fail_on: Vec::new(),
        }
    }

    pub fn failing_on(fail_on: &[usize]) -> Self {
        Self {
            calls: 0,
            fail_on: fail_on.to_vec(),
        }
    }
}

impl ContentGenerator for FakeGenerator {
    fn generate(&mut self, _context: &PromptContext<'_>) -> Result<String, GenerationError> {
        self.calls += 1;
        if self.fail_on.contains(&self.calls) {
            return Err(GenerationError::Http {
                service: "fake",
                message: "simulated outage".to_string(),
            });
        }
        Ok(format!("line number {}", self.calls))
    }

    fn classify_expression(
        &mut self,
        _text: &str,
        candidates: &[&str],
    ) -> Result<String, GenerationError> {
        Ok(candidates.first().copied().unwrap_or("normal").to_string())
    }
}

/// Writes a valid WAV to the staging path, optionally slowly
pub struct SlowSynthesizer {
    pub delay: Duration,
    pub samples: usize,
    pub calls: Arc<AtomicUsize>,
}

impl SlowSynthesizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            samples: 400,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SpeechSynthesizer for SlowSynthesizer {
    fn synthesize(&mut self, _text: &str, staging: &Path) -> Result<PathBuf, GenerationError> {
        std::thread::sleep(self.delay);
        write_wav(staging, self.samples);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(staging.to_path_buf())
    }
}

/// Playback that stays busy for a fixed number of busy checks
///
/// Counts every `play` that arrives while a clip is still playing.
pub struct ScriptedPlayback {
    pub busy_ticks: u32,
    remaining: Cell<u32>,
    loaded: bool,
    pub plays: usize,
    pub overlaps: usize,
    pub stuck: bool,
}

impl ScriptedPlayback {
    pub fn new(busy_ticks: u32) -> Self {
        Self {
            busy_ticks,
            remaining: Cell::new(0),
            loaded: false,
            plays: 0,
            overlaps: 0,
            stuck: false,
        }
    }

    /// Never reports the clip as finished
    pub fn stuck() -> Self {
        Self {
            stuck: true,
            ..Self::new(1)
        }
    }
}

impl AudioPlayback for ScriptedPlayback {
    fn load(&mut self, path: &Path) -> Result<(), AudioError> {
        let bytes = std::fs::read(path).map_err(|source| AudioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        hound::WavReader::new(std::io::Cursor::new(bytes))
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if !self.loaded {
            return Err(AudioError::NothingLoaded);
        }
        if self.remaining.get() > 0 {
            self.overlaps += 1;
        }
        self.loaded = false;
        self.plays += 1;
        self.remaining.set(self.busy_ticks);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        if self.stuck {
            return true;
        }
        let left = self.remaining.get();
        if left == 0 {
            return false;
        }
        self.remaining.set(left - 1);
        true
    }

    fn current_energy(&self) -> f32 {
        if self.remaining.get() > 0 {
            0.045
        } else {
            0.0
        }
    }

    fn stop(&mut self) {
        self.remaining.set(0);
    }
}

/// Render engine that records what it was asked to do
pub struct RecordingEngine {
    pub parameters: Vec<ParameterInfo>,
    pub expressions: Vec<String>,
    pub deltas: Vec<(String, f32)>,
    pub known_expressions: Vec<String>,
    pub motions: Vec<(String, u32)>,
    pub look: Option<(f32, f32)>,
    pub updates: usize,
    frame: RgbaImage,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            parameters: vec![
                ParameterInfo::new("ParamMouthOpenY", 0.0, 1.0, 0.0),
                ParameterInfo::new("ParamMouthForm", -1.0, 1.0, 0.0),
                ParameterInfo::new("ParamA", 0.0, 1.0, 0.0),
                ParameterInfo::new("ParamI", 0.0, 1.0, 0.0),
                ParameterInfo::new("ParamO", 0.0, 1.0, 0.0),
            ],
            expressions: Vec::new(),
            deltas: Vec::new(),
            known_expressions: vec!["normal".to_string(), "smile".to_string()],
            motions: Vec::new(),
            look: None,
            updates: 0,
            frame: RgbaImage::new(4, 4),
        }
    }
}

impl RenderEngine for RecordingEngine {
    fn load_model(&mut self, _manifest: &Path) -> Result<(), EngineError> {
        Ok(())
    }

    fn list_parameters(&self) -> Vec<ParameterInfo> {
        self.parameters.clone()
    }

    fn apply_expression(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.known_expressions.iter().any(|e| e == name) {
            return Err(EngineError::UnknownExpression(name.to_string()));
        }
        self.expressions.push(name.to_string());
        Ok(())
    }

    fn add_parameter_delta(&mut self, id: &str, value: f32) -> Result<(), EngineError> {
        if !self.parameters.iter().any(|p| p.id == id) {
            return Err(EngineError::UnknownParameter(id.to_string()));
        }
        self.deltas.push((id.to_string(), value));
        Ok(())
    }

    fn start_motion(&mut self, group: &str, priority: u32) -> Result<(), EngineError> {
        self.motions.push((group.to_string(), priority));
        Ok(())
    }

    fn set_look_target(&mut self, x: f32, y: f32) {
        self.look = Some((x, y));
    }

    fn update(&mut self, _dt: Duration) {
        self.updates += 1;
    }

    fn draw(&mut self) {}

    fn frame(&self) -> &RgbaImage {
        &self.frame
    }
}
