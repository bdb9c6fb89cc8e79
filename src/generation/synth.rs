//! Speech synthesizer variants
//!
//! The provider is chosen once at startup. Every variant writes a complete
//! WAV file at the staging path before returning.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde_json::json;

use super::{GenerationError, Result, SpeechSynthesizer};

const SMALLEST_URL: &str = "https://waves-api.smallest.ai/api/v1/lightning/get_speech";
const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const PLAYHT_URL: &str = "https://api.play.ht/api/v2/tts/stream";

pub const SMALLEST_DEFAULT_VOICE: &str = "emily";
pub const ELEVENLABS_DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
pub const ELEVENLABS_DEFAULT_MODEL: &str = "eleven_multilingual_v2";
pub const PLAYHT_DEFAULT_VOICE: &str =
    "s3://voice-cloning-zero-shot/775ae416-49bb-4fb6-bd45-740f205d20a1/jennifersaad/manifest.json";

/// Sample rate of the raw PCM requested from ElevenLabs
const ELEVENLABS_PCM_RATE: u32 = 22_050;

/// Placeholder in command arguments replaced by the staging path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

pub enum SynthesizerBackend {
    Smallest {
        agent: ureq::Agent,
        api_key: String,
        voice: String,
    },
    ElevenLabs {
        agent: ureq::Agent,
        api_key: String,
        voice: String,
        model_id: String,
    },
    PlayHt {
        agent: ureq::Agent,
        user_id: String,
        api_key: String,
        voice: String,
    },
    /// Local program reading text on stdin and writing the WAV itself
    Command { program: String, args: Vec<String> },
}

fn http_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(120)))
        .build();
    config.into()
}

fn http_error(service: &'static str) -> impl Fn(ureq::Error) -> GenerationError {
    move |e| GenerationError::Http {
        service,
        message: e.to_string(),
    }
}

/// Stream a response body into `staging`
fn save_body(service: &'static str, mut body: ureq::Body, staging: &Path) -> Result<()> {
    let mut file = File::create(staging).map_err(|e| GenerationError::io(staging, e))?;
    let written = io::copy(&mut body.as_reader(), &mut file).map_err(|e| GenerationError::Http {
        service,
        message: format!("body read failed: {}", e),
    })?;
    file.sync_all().map_err(|e| GenerationError::io(staging, e))?;
    if written == 0 {
        return Err(GenerationError::BadResponse {
            service,
            message: "empty audio body".to_string(),
        });
    }
    Ok(())
}

/// Wrap 16-bit little-endian mono PCM into a WAV container
pub(crate) fn write_pcm_wav(pcm: &[u8], sample_rate: u32, staging: &Path) -> Result<()> {
    if pcm.len() < 2 {
        return Err(GenerationError::Encode("no PCM samples".to_string()));
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(staging, spec)
        .map_err(|e| GenerationError::Encode(e.to_string()))?;
    for pair in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
            .map_err(|e| GenerationError::Encode(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| GenerationError::Encode(e.to_string()))
}

impl SynthesizerBackend {
    pub fn smallest(api_key: &str, voice: Option<&str>) -> Self {
        SynthesizerBackend::Smallest {
            agent: http_agent(),
            api_key: api_key.to_string(),
            voice: voice.unwrap_or(SMALLEST_DEFAULT_VOICE).to_string(),
        }
    }

    pub fn elevenlabs(api_key: &str, voice: Option<&str>, model_id: Option<&str>) -> Self {
        SynthesizerBackend::ElevenLabs {
            agent: http_agent(),
            api_key: api_key.to_string(),
            voice: voice.unwrap_or(ELEVENLABS_DEFAULT_VOICE).to_string(),
            model_id: model_id.unwrap_or(ELEVENLABS_DEFAULT_MODEL).to_string(),
        }
    }

    pub fn playht(user_id: &str, api_key: &str, voice: Option<&str>) -> Self {
        SynthesizerBackend::PlayHt {
            agent: http_agent(),
            user_id: user_id.to_string(),
            api_key: api_key.to_string(),
            voice: voice.unwrap_or(PLAYHT_DEFAULT_VOICE).to_string(),
        }
    }

    /// `command` is the program followed by its arguments
    pub fn command(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| GenerationError::Command("no program given".to_string()))?;
        Ok(SynthesizerBackend::Command {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SynthesizerBackend::Smallest { .. } => "smallest",
            SynthesizerBackend::ElevenLabs { .. } => "elevenlabs",
            SynthesizerBackend::PlayHt { .. } => "playht",
            SynthesizerBackend::Command { .. } => "command",
        }
    }

    fn run_command(program: &str, args: &[String], text: &str, staging: &Path) -> Result<()> {
        let staging_str = staging.to_string_lossy();
        let args: Vec<String> = args
            .iter()
            .map(|a| a.replace(OUTPUT_PLACEHOLDER, &staging_str))
            .collect();

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| GenerationError::Command(format!("failed to spawn {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| GenerationError::Command(format!("failed to write text: {}", e)))?;
        }

        let status = child
            .wait()
            .map_err(|e| GenerationError::Command(e.to_string()))?;
        if !status.success() {
            return Err(GenerationError::Command(format!(
                "{} exited with {}",
                program, status
            )));
        }

        let len = std::fs::metadata(staging)
            .map_err(|e| GenerationError::io(staging, e))?
            .len();
        if len == 0 {
            return Err(GenerationError::Command(format!(
                "{} produced an empty file",
                program
            )));
        }
        Ok(())
    }
}

impl SpeechSynthesizer for SynthesizerBackend {
    fn synthesize(&mut self, text: &str, staging: &Path) -> Result<PathBuf> {
        match self {
            SynthesizerBackend::Smallest {
                agent,
                api_key,
                voice,
            } => {
                let resp = agent
                    .post(SMALLEST_URL)
                    .header("Authorization", &format!("Bearer {}", api_key))
                    .send_json(json!({
                        "text": text,
                        "voice_id": voice,
                        "sample_rate": 24000,
                        "speed": 1.0,
                        "add_wav_header": true
                    }))
                    .map_err(http_error("smallest"))?;
                save_body("smallest", resp.into_body(), staging)?;
            }
            SynthesizerBackend::ElevenLabs {
                agent,
                api_key,
                voice,
                model_id,
            } => {
                let url = format!(
                    "{}/{}?output_format=pcm_{}",
                    ELEVENLABS_URL, voice, ELEVENLABS_PCM_RATE
                );
                let resp = agent
                    .post(&url)
                    .header("xi-api-key", api_key.as_str())
                    .send_json(json!({
                        "text": text,
                        "model_id": model_id
                    }))
                    .map_err(http_error("elevenlabs"))?;
                let mut pcm = Vec::new();
                resp.into_body()
                    .into_reader()
                    .read_to_end(&mut pcm)
                    .map_err(|e| GenerationError::Http {
                        service: "elevenlabs",
                        message: format!("body read failed: {}", e),
                    })?;
                write_pcm_wav(&pcm, ELEVENLABS_PCM_RATE, staging)?;
            }
            SynthesizerBackend::PlayHt {
                agent,
                user_id,
                api_key,
                voice,
            } => {
                let resp = agent
                    .post(PLAYHT_URL)
                    .header("X-USER-ID", user_id.as_str())
                    .header("AUTHORIZATION", api_key.as_str())
                    .header("accept", "audio/wav")
                    .send_json(json!({
                        "text": text,
                        "voice": voice,
                        "voice_engine": "PlayDialog",
                        "output_format": "wav"
                    }))
                    .map_err(http_error("playht"))?;
                save_body("playht", resp.into_body(), staging)?;
            }
            SynthesizerBackend::Command { program, args } => {
                Self::run_command(program, args, text, staging)?;
            }
        }
        log::debug!("{} wrote {}", self.name(), staging.display());
        Ok(staging.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_pcm_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        let pcm: Vec<u8> = [0i16, 1000, -1000, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        write_pcm_wav(&pcm, ELEVENLABS_PCM_RATE, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, [0, 1000, -1000, i16::MAX]);
    }

    #[test]
    fn test_write_pcm_wav_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            write_pcm_wav(&[], 22_050, &dir.path().join("x.wav")),
            Err(GenerationError::Encode(_))
        ));
    }

    #[test]
    fn test_command_needs_program() {
        assert!(SynthesizerBackend::command(&[]).is_err());
        let backend =
            SynthesizerBackend::command(&["piper".to_string(), "{output}".to_string()]).unwrap();
        assert_eq!(backend.name(), "command");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_pipes_text_to_program() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("out.wav");
        let mut backend = SynthesizerBackend::command(&[
            "sh".to_string(),
            "-c".to_string(),
            "cat > \"$0\"".to_string(),
            OUTPUT_PLACEHOLDER.to_string(),
        ])
        .unwrap();

        let path = backend.synthesize("hello there", &staging).unwrap();
        assert_eq!(path, staging);
        assert_eq!(std::fs::read_to_string(&staging).unwrap(), "hello there");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = SynthesizerBackend::command(&["false".to_string()]).unwrap();
        assert!(matches!(
            backend.synthesize("hi", &dir.path().join("out.wav")),
            Err(GenerationError::Command(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_empty_output_reported() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("out.wav");
        let mut backend = SynthesizerBackend::command(&[
            "sh".to_string(),
            "-c".to_string(),
            "cat > /dev/null; : > \"$0\"".to_string(),
            OUTPUT_PLACEHOLDER.to_string(),
        ])
        .unwrap();
        assert!(matches!(
            backend.synthesize("hi", &staging),
            Err(GenerationError::Command(_))
        ));
    }
}
