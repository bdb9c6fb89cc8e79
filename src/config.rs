use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logging::LogLevel;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "performer.toml";

/// Application options that can be set via config file or CLI
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Directory holding the model manifest, `expressions/` and `motions/`
    pub model_dir: PathBuf,
    /// Manifest file name inside `model_dir`
    pub model_file: String,
    pub resolution: Resolution,
    /// Target tick rate of the render loop
    pub fps: u32,
    pub lip_sync_multiplier: f32,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    /// Stop after this many seconds (runs until interrupted when unset)
    pub run_for_secs: Option<f64>,
    /// Bound on each worker join at shutdown
    pub shutdown_timeout_secs: f64,

    pub producer: ProducerOptions,
    pub audio: AudioOptions,
    pub generator: GeneratorOptions,
    pub synthesizer: SynthesizerOptions,
    pub behavior: BehaviorOptions,
    pub stream: StreamOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerOptions {
    pub cadence_secs: f64,
    pub gate_timeout_secs: f64,
    pub error_backoff_secs: f64,
    /// Replaces the built-in persona prompt; `{expressions}` is substituted
    pub persona: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioOptions {
    pub driver: AudioDriver,
    /// Well-known artifact location shared by producer and consumer
    pub artifact_path: PathBuf,
    /// Staging name the synthesizer writes before commit
    pub temp_path: PathBuf,
    /// 0-100
    pub volume: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    pub provider: GeneratorProvider,
    pub model: String,
    pub script_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesizerOptions {
    pub provider: SynthesizerProvider,
    pub voice: Option<String>,
    pub model_id: Option<String>,
    /// Program and arguments for the `command` provider; `{output}` is replaced
    /// by the staging path
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BehaviorOptions {
    pub idle_min_secs: f64,
    pub idle_max_secs: f64,
    pub gaze_interval_secs: f64,
    pub motion_priority: u32,
    /// Weights for straight, left, right, up, down
    pub gaze_weights: [u32; 5],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    pub enabled: bool,
    pub encoder: String,
    pub bitrate: String,
    pub output: String,
    pub audio: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioDriver {
    #[default]
    Rodio,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    #[default]
    Gemini,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesizerProvider {
    #[default]
    Smallest,
    ElevenLabs,
    PlayHt,
    Command,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("Resources/Mao"),
            model_file: "Mao.model3.json".to_string(),
            resolution: Resolution {
                width: 1000,
                height: 1700,
            },
            fps: 60,
            lip_sync_multiplier: 10.0,
            log_level: LogLevel::Info,
            log_file: None,
            run_for_secs: None,
            shutdown_timeout_secs: 5.0,
            producer: ProducerOptions::default(),
            audio: AudioOptions::default(),
            generator: GeneratorOptions::default(),
            synthesizer: SynthesizerOptions::default(),
            behavior: BehaviorOptions::default(),
            stream: StreamOptions::default(),
        }
    }
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            cadence_secs: 3.0,
            gate_timeout_secs: 10.0,
            error_backoff_secs: 2.0,
            persona: None,
        }
    }
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            driver: AudioDriver::Rodio,
            artifact_path: PathBuf::from("output_performer.wav"),
            temp_path: PathBuf::from("output_temp.wav"),
            volume: 100,
        }
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::Gemini,
            model: "gemini-1.5-flash".to_string(),
            script_file: None,
        }
    }
}

impl Default for SynthesizerOptions {
    fn default() -> Self {
        Self {
            provider: SynthesizerProvider::Smallest,
            voice: None,
            model_id: None,
            command: Vec::new(),
        }
    }
}

impl Default for BehaviorOptions {
    fn default() -> Self {
        Self {
            idle_min_secs: 8.0,
            idle_max_secs: 20.0,
            gaze_interval_secs: 5.0,
            motion_priority: 3,
            gaze_weights: [6, 1, 1, 1, 1],
        }
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            encoder: "ffmpeg".to_string(),
            bitrate: "3000k".to_string(),
            output: "performer.flv".to_string(),
            audio: "silent".to_string(),
        }
    }
}

impl Options {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(secs_to_duration)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        secs_to_duration(self.shutdown_timeout_secs)
    }

    pub fn model_manifest(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    /// Reject combinations that would only fail later, deep inside a worker
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 || self.fps > 240 {
            anyhow::bail!("fps must be between 1 and 240, got {}", self.fps);
        }
        if let Some(run_for) = self.run_for_secs {
            check_secs("run_for_secs", run_for)?;
        }
        check_secs("shutdown_timeout_secs", self.shutdown_timeout_secs)?;
        check_secs("producer.cadence_secs", self.producer.cadence_secs)?;
        check_secs("producer.gate_timeout_secs", self.producer.gate_timeout_secs)?;
        check_secs("producer.error_backoff_secs", self.producer.error_backoff_secs)?;
        check_secs("behavior.idle_min_secs", self.behavior.idle_min_secs)?;
        check_secs("behavior.idle_max_secs", self.behavior.idle_max_secs)?;
        check_secs("behavior.gaze_interval_secs", self.behavior.gaze_interval_secs)?;
        if self.behavior.idle_min_secs <= 0.0
            || self.behavior.idle_max_secs <= self.behavior.idle_min_secs
        {
            anyhow::bail!(
                "idle interval must satisfy 0 < min < max, got [{}, {})",
                self.behavior.idle_min_secs,
                self.behavior.idle_max_secs
            );
        }
        if self.behavior.gaze_weights.iter().all(|w| *w == 0) {
            anyhow::bail!("at least one gaze weight must be non-zero");
        }
        if self.audio.artifact_path == self.audio.temp_path {
            anyhow::bail!("audio artifact_path and temp_path must differ");
        }
        if self.synthesizer.provider == SynthesizerProvider::Command
            && self.synthesizer.command.is_empty()
        {
            anyhow::bail!("synthesizer provider 'command' requires synthesizer.command");
        }
        if self.generator.provider == GeneratorProvider::Script
            && self.generator.script_file.is_none()
        {
            anyhow::bail!("generator provider 'script' requires generator.script_file");
        }
        Ok(())
    }
}

impl ProducerOptions {
    pub fn cadence(&self) -> Duration {
        secs_to_duration(self.cadence_secs)
    }

    pub fn gate_timeout(&self) -> Duration {
        secs_to_duration(self.gate_timeout_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        secs_to_duration(self.error_backoff_secs)
    }
}

impl BehaviorOptions {
    pub fn idle_min(&self) -> Duration {
        secs_to_duration(self.idle_min_secs)
    }

    pub fn idle_max(&self) -> Duration {
        secs_to_duration(self.idle_max_secs)
    }

    pub fn gaze_interval(&self) -> Duration {
        secs_to_duration(self.gaze_interval_secs)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_resolution(s)
    }
}

impl TryFrom<String> for Resolution {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        parse_resolution(&s)
    }
}

/// Secrets for the external services, read from the environment only
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub smallest_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub play_ht_user_id: Option<String>,
    pub play_ht_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }
        Self {
            gemini_api_key: var("GEMINI_API_KEY"),
            smallest_api_key: var("SMALLEST_API_KEY"),
            elevenlabs_api_key: var("ELEVENLABS_API_KEY"),
            play_ht_user_id: var("PLAY_HT_USER_ID"),
            play_ht_api_key: var("PLAY_HT_API_KEY"),
        }
    }

    pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .with_context(|| format!("{} is not set", name))
    }
}

/// Load configuration from a TOML file
///
/// An explicit path must exist; otherwise `performer.toml` in the working
/// directory is used when present, and built-in defaults when not.
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(Options::default());
            }
            fallback
        }
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(text: &str) -> Result<Options> {
    let options: Options = toml::from_str(text)?;
    Ok(options)
}

/// Parse a resolution string in the format "WIDTHxHEIGHT"
pub fn parse_resolution(s: &str) -> Result<Resolution> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        anyhow::bail!("Resolution must be in WIDTHxHEIGHT format");
    }

    let width: u32 = parts[0].trim().parse().context("Invalid width value")?;
    let height: u32 = parts[1].trim().parse().context("Invalid height value")?;

    if width == 0 || height == 0 {
        anyhow::bail!("Resolution values must be positive");
    }

    Ok(Resolution { width, height })
}

/// Parse a volume value (0-100) to a float (0.0-1.0)
pub fn parse_volume(vol: i32) -> f32 {
    if vol < 0 {
        return 0.0;
    }
    if vol > 100 {
        return 1.0;
    }
    vol as f32 / 100.0
}

/// Non-negative, finite and representable as a [`Duration`]
fn check_secs(name: &str, secs: f64) -> Result<()> {
    if secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
        anyhow::bail!("{} must be a finite, non-negative number of seconds, got {}", name, secs);
    }
    Ok(())
}

// Saturates instead of panicking on values validate() would have rejected
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_valid() {
        let res = parse_resolution("1000x1700").unwrap();
        assert_eq!(res.width, 1000);
        assert_eq!(res.height, 1700);
    }

    #[test]
    fn test_parse_resolution_invalid_format() {
        assert!(parse_resolution("640-480").is_err());
        assert!(parse_resolution("640x480x120").is_err());
    }

    #[test]
    fn test_parse_resolution_invalid_values() {
        assert!(parse_resolution("0x480").is_err());
        assert!(parse_resolution("640x0").is_err());
        assert!(parse_resolution("abcxdef").is_err());
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume(0), 0.0);
        assert_eq!(parse_volume(50), 0.5);
        assert_eq!(parse_volume(100), 1.0);
        assert_eq!(parse_volume(-10), 0.0);
        assert_eq!(parse_volume(150), 1.0);
    }

    #[test]
    fn test_options_default() {
        let opts = Options::default();
        assert_eq!(
            opts.resolution,
            Resolution {
                width: 1000,
                height: 1700
            }
        );
        assert_eq!(opts.fps, 60);
        assert_eq!(opts.lip_sync_multiplier, 10.0);
        assert_eq!(opts.producer.gate_timeout(), Duration::from_secs(10));
        assert_eq!(opts.producer.cadence(), Duration::from_secs(3));
        assert_eq!(opts.behavior.gaze_weights, [6, 1, 1, 1, 1]);
        assert!(!opts.stream.enabled);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_parse_config_partial_overrides() {
        let opts = parse_config(
            r#"
            fps = 30
            resolution = "720x1280"

            [producer]
            cadence_secs = 1.5

            [synthesizer]
            provider = "elevenlabs"
            voice = "rachel"

            [stream]
            enabled = true
            output = "rtmp://localhost/live/key"
            "#,
        )
        .unwrap();

        assert_eq!(opts.fps, 30);
        assert_eq!(opts.resolution.to_string(), "720x1280");
        assert_eq!(opts.producer.cadence_secs, 1.5);
        // untouched fields keep their defaults
        assert_eq!(opts.producer.gate_timeout_secs, 10.0);
        assert_eq!(opts.synthesizer.provider, SynthesizerProvider::ElevenLabs);
        assert_eq!(opts.synthesizer.voice.as_deref(), Some("rachel"));
        assert!(opts.stream.enabled);
        assert_eq!(opts.stream.encoder, "ffmpeg");
    }

    #[test]
    fn test_parse_config_rejects_bad_resolution() {
        assert!(parse_config(r#"resolution = "wide""#).is_err());
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage.toml");
        std::fs::write(&path, "lip_sync_multiplier = 4.0\n").unwrap();

        let opts = load_config(Some(&path)).unwrap();
        assert_eq!(opts.lip_sync_multiplier, 4.0);
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_idle_interval() {
        let mut opts = Options::default();
        opts.behavior.idle_min_secs = 20.0;
        opts.behavior.idle_max_secs = 8.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_validate_command_provider_needs_command() {
        let mut opts = Options::default();
        opts.synthesizer.provider = SynthesizerProvider::Command;
        assert!(opts.validate().is_err());
        opts.synthesizer.command = vec!["piper".into(), "--output_file".into(), "{output}".into()];
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_frame_interval() {
        let mut opts = Options::default();
        opts.fps = 50;
        assert_eq!(opts.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_validate_rejects_infinite_duration() {
        let opts = parse_config(
            r#"
            [producer]
            gate_timeout_secs = inf
            "#,
        )
        .expect("parse_config should succeed");
        assert!(opts.validate().is_err());
        assert_eq!(opts.producer.gate_timeout(), Duration::MAX);
    }

    #[test]
    fn test_validate_rejects_unrepresentable_duration() {
        let mut opts = Options::default();
        opts.run_for_secs = Some(1e30);
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("run_for_secs"));
        assert_eq!(opts.run_for(), Some(Duration::MAX));

        let mut opts = Options::default();
        opts.behavior.gaze_interval_secs = f64::NAN;
        assert!(opts.validate().is_err());
        assert_eq!(opts.behavior.gaze_interval(), Duration::ZERO);

        let mut opts = Options::default();
        opts.shutdown_timeout_secs = -1.0;
        assert!(opts.validate().is_err());
    }
}
