use crate::config::{parse_resolution, parse_volume};
use crate::config::{AudioDriver, GeneratorProvider, Options, SynthesizerProvider};
use crate::logging::LogLevel;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Performer - drives an animated character from generated speech
#[derive(Parser, Debug, Default)]
#[command(name = "performer")]
#[command(version)]
#[command(
    about = "Generates speech, plays it with lip sync, and optionally streams the result",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (defaults to ./performer.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model directory containing the manifest, expressions/ and motions/
    #[arg(short, long, value_name = "DIR")]
    pub model: Option<PathBuf>,

    /// Frame size (e.g., 1000x1700)
    #[arg(short, long, value_name = "WIDTHxHEIGHT")]
    pub res: Option<String>,

    /// Render loop rate
    #[arg(long, value_name = "FPS")]
    pub fps: Option<u32>,

    /// Mouth opening gain applied to playback energy
    #[arg(long, value_name = "GAIN")]
    pub multiplier: Option<f32>,

    /// Audio output driver (rodio, none)
    #[arg(long, value_name = "DRIVER")]
    pub audio: Option<String>,

    /// Playback volume (0-100)
    #[arg(long, value_name = "VOLUME")]
    pub volume: Option<String>,

    /// Content generator (gemini, script)
    #[arg(long, value_name = "PROVIDER")]
    pub generator: Option<String>,

    /// Lines file for the script generator
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Speech synthesizer (smallest, elevenlabs, playht, command)
    #[arg(long, value_name = "PROVIDER")]
    pub synth: Option<String>,

    /// Voice identifier passed to the synthesizer
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Enable stream egress to the given destination (file path or rtmp:// URL)
    #[arg(short, long, value_name = "DESTINATION")]
    pub stream: Option<String>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub run_for: Option<f64>,

    /// Log verbosity (nothing, error, warning, info, debug, all)
    #[arg(short = 'v', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(short, long, value_name = "FILE")]
    pub logfile: Option<PathBuf>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref model) = self.model {
            opts.model_dir = model.clone();
        }

        if let Some(ref res) = self.res {
            opts.resolution = parse_resolution(res).context("Invalid resolution format")?;
        }

        if let Some(fps) = self.fps {
            opts.fps = fps;
        }

        if let Some(multiplier) = self.multiplier {
            opts.lip_sync_multiplier = multiplier;
        }

        if let Some(ref audio) = self.audio {
            opts.audio.driver = Self::parse_audio_driver(audio)?;
        }

        if let Some(ref vol) = self.volume {
            let int_vol: i32 = vol.parse().context("Invalid volume")?;
            opts.audio.volume = (parse_volume(int_vol) * 100.0).round() as i32;
        }

        if let Some(ref generator) = self.generator {
            opts.generator.provider = Self::parse_generator(generator)?;
        }

        if let Some(ref script) = self.script {
            opts.generator.script_file = Some(script.clone());
        }

        if let Some(ref synth) = self.synth {
            opts.synthesizer.provider = Self::parse_synthesizer(synth)?;
        }

        if let Some(ref voice) = self.voice {
            opts.synthesizer.voice = Some(voice.clone());
        }

        if let Some(ref destination) = self.stream {
            opts.stream.enabled = true;
            opts.stream.output = destination.clone();
        }

        if let Some(run_for) = self.run_for {
            if !(run_for > 0.0) {
                anyhow::bail!("--run-for must be positive, got {}", run_for);
            }
            opts.run_for_secs = Some(run_for);
        }

        if let Some(ref level) = self.log_level {
            opts.log_level = level.parse::<LogLevel>()?;
        }

        if let Some(ref log_file) = self.logfile {
            opts.log_file = Some(log_file.clone());
        }

        Ok(opts)
    }

    fn parse_audio_driver(s: &str) -> Result<AudioDriver> {
        match s.to_lowercase().as_str() {
            "rodio" => Ok(AudioDriver::Rodio),
            "none" | "nosound" => Ok(AudioDriver::None),
            _ => anyhow::bail!("Invalid audio driver: {}. Valid options: rodio, none", s),
        }
    }

    fn parse_generator(s: &str) -> Result<GeneratorProvider> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(GeneratorProvider::Gemini),
            "script" => Ok(GeneratorProvider::Script),
            _ => anyhow::bail!("Invalid generator: {}. Valid options: gemini, script", s),
        }
    }

    fn parse_synthesizer(s: &str) -> Result<SynthesizerProvider> {
        match s.to_lowercase().as_str() {
            "smallest" => Ok(SynthesizerProvider::Smallest),
            "elevenlabs" => Ok(SynthesizerProvider::ElevenLabs),
            "playht" => Ok(SynthesizerProvider::PlayHt),
            "command" => Ok(SynthesizerProvider::Command),
            _ => anyhow::bail!(
                "Invalid synthesizer: {}. Valid options: smallest, elevenlabs, playht, command",
                s
            ),
        }
    }
}
