use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::str::FromStr;
use std::time::{Duration, Instant};

use super::{Result, StreamError};
use crate::config::Options;

/// Audio muxed alongside the frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioTrack {
    /// Generated silence
    Silent,
    /// An encoder-side capture input, e.g. `pulse` + `default`
    Input { format: String, source: String },
}

impl FromStr for AudioTrack {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("silent") {
            return Ok(AudioTrack::Silent);
        }
        match s.strip_prefix("input:").and_then(|rest| rest.split_once(':')) {
            Some((format, source)) if !format.is_empty() && !source.is_empty() => {
                Ok(AudioTrack::Input {
                    format: format.to_string(),
                    source: source.to_string(),
                })
            }
            _ => Err(StreamError::Audio(s.to_string())),
        }
    }
}

/// Fixed encoding parameters, chosen once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub program: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: String,
    pub output: String,
    pub audio: AudioTrack,
}

impl EncoderSettings {
    pub fn from_options(opts: &Options) -> Result<Self> {
        Ok(Self {
            program: PathBuf::from(&opts.stream.encoder),
            width: opts.resolution.width,
            height: opts.resolution.height,
            fps: opts.fps,
            bitrate: opts.stream.bitrate.clone(),
            output: opts.stream.output.clone(),
            audio: opts.stream.audio.parse()?,
        })
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Encoder command line: raw RGBA on stdin plus the audio input, H.264 + AAC out
    pub fn args(&self) -> Vec<OsString> {
        let size = format!("{}x{}", self.width, self.height);
        let rate = self.fps.to_string();
        let gop = (self.fps * 2).to_string();

        let mut args: Vec<&str> = vec!["-hide_banner", "-loglevel", "error", "-y"];
        // video from stdin
        args.extend(["-f", "rawvideo", "-pix_fmt", "rgba"]);
        args.extend(["-s", size.as_str(), "-r", rate.as_str(), "-i", "pipe:0"]);
        match &self.audio {
            AudioTrack::Silent => {
                args.extend(["-f", "lavfi", "-i", "anullsrc=r=44100:cl=stereo"]);
            }
            AudioTrack::Input { format, source } => {
                args.extend(["-f", format.as_str(), "-i", source.as_str()]);
            }
        }
        args.extend(["-map", "0:v", "-map", "1:a"]);
        args.extend(["-c:v", "libx264", "-preset", "veryfast", "-tune", "zerolatency"]);
        args.extend(["-pix_fmt", "yuv420p", "-b:v", self.bitrate.as_str(), "-g", gop.as_str()]);
        args.extend(["-c:a", "aac", "-b:a", "128k", "-ar", "44100", "-shortest"]);
        if self.output.starts_with("rtmp://") || self.output.starts_with("rtmps://") {
            args.extend(["-f", "flv"]);
        }
        args.push(self.output.as_str());

        args.into_iter().map(OsString::from).collect()
    }
}

/// A running encoder fed through its stdin
pub struct EncoderProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    frame_bytes: usize,
}

impl EncoderProcess {
    pub fn spawn(settings: &EncoderSettings) -> Result<Self> {
        let mut cmd = Command::new(&settings.program);
        cmd.args(settings.args());
        log::info!(
            "starting encoder: {} {}",
            settings.program.display(),
            settings
                .args()
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        Self::spawn_command(cmd, settings.frame_bytes())
    }

    /// Spawn `cmd` as the encoder; each frame must be exactly `frame_bytes`
    pub fn spawn_command(mut cmd: Command, frame_bytes: usize) -> Result<Self> {
        let program = PathBuf::from(cmd.get_program());
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| StreamError::Spawn { program, source })?;
        let stdin = child.stdin.take().ok_or(StreamError::NoInput)?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            frame_bytes,
        })
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Blocking write of one frame
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() != self.frame_bytes {
            return Err(StreamError::FrameSize {
                expected: self.frame_bytes,
                actual: frame.len(),
            });
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            return Err(StreamError::Exited(status.to_string()));
        }
        let stdin = self.stdin.as_mut().ok_or(StreamError::NoInput)?;
        stdin.write_all(frame).map_err(StreamError::Write)
    }

    /// Close stdin and wait for the encoder to exit, killing it after `timeout`
    pub fn finish(mut self, timeout: Duration) -> Result<()> {
        drop(self.stdin.take());

        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(StreamError::Exited(status.to_string())),
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Ok(None) => {
                    log::warn!("encoder still running after {:?}, killing it", timeout);
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    return Ok(());
                }
                Err(e) => return Err(StreamError::Write(e)),
            }
        }
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
