//! Rodio-backed playback
//!
//! The output stream lives on a dedicated thread since rodio's `OutputStream`
//! is not Send. The render thread talks to it over a command channel and keeps
//! its own decoded copy of the clip for energy measurement.

use std::io::Cursor;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use rodio::{OutputStream, Sink};

use super::{read_clip, AudioError, AudioPlayback, EnergyMeter, Result};
use crate::threading::Worker;

/// How long the render thread waits for the audio thread to answer
const REPLY_TIMEOUT: Duration = Duration::from_millis(200);

/// Commands sent to the audio thread
enum AudioCommand {
    /// Replace the current clip with this WAV data and start it
    Play(Vec<u8>, Sender<std::result::Result<(), String>>),
    /// Check if the current clip is still playing (responds via channel)
    IsPlaying(Sender<bool>),
    Stop,
    Shutdown,
}

struct Loaded {
    bytes: Vec<u8>,
    meter: EnergyMeter,
}

pub struct RodioPlayback {
    tx: Sender<AudioCommand>,
    worker: Option<Worker<()>>,
    loaded: Option<Loaded>,
    playing: Option<EnergyMeter>,
}

/// Audio thread main function
fn audio_thread_main(
    rx: Receiver<AudioCommand>,
    ready: Sender<std::result::Result<(), String>>,
    volume: f32,
) {
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    log::info!("audio output stream opened");

    let mut sink: Option<Sink> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::Play(data, response) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                let result = rodio::Decoder::new(Cursor::new(data))
                    .map_err(|e| format!("decode error: {}", e))
                    .and_then(|source| {
                        let new_sink = Sink::try_new(&stream_handle)
                            .map_err(|e| format!("sink error: {}", e))?;
                        new_sink.set_volume(volume);
                        new_sink.append(source);
                        Ok(new_sink)
                    })
                    .map(|new_sink| {
                        sink = Some(new_sink);
                    });
                let _ = response.send(result);
            }
            AudioCommand::IsPlaying(response) => {
                let playing = sink.as_ref().is_some_and(|s| !s.empty());
                let _ = response.send(playing);
            }
            AudioCommand::Stop => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
            }
            AudioCommand::Shutdown => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                break;
            }
        }
    }

    log::debug!("audio thread exited");
}

impl RodioPlayback {
    /// Open the default output device on a new audio thread
    ///
    /// `volume` is 0.0-1.0.
    pub fn start(volume: f32) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let volume = volume.clamp(0.0, 1.0);

        let worker = Worker::spawn("audio", move || audio_thread_main(rx, ready_tx, volume))
            .map_err(|e| AudioError::Device(e.to_string()))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(AudioError::Device(e)),
            Err(_) => return Err(AudioError::ThreadGone),
        }

        Ok(Self {
            tx,
            worker: Some(worker),
            loaded: None,
            playing: None,
        })
    }

    fn ask_playing(&self) -> Option<bool> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx.send(AudioCommand::IsPlaying(reply_tx)).ok()?;
        reply_rx.recv_timeout(REPLY_TIMEOUT).ok()
    }
}

impl AudioPlayback for RodioPlayback {
    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = read_clip(path)?;
        let meter = EnergyMeter::decode(&bytes)?;
        self.loaded = Some(Loaded { bytes, meter });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let Loaded { bytes, mut meter } = self.loaded.take().ok_or(AudioError::NothingLoaded)?;

        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(AudioCommand::Play(bytes, reply_tx))
            .map_err(|_| AudioError::ThreadGone)?;
        match reply_rx.recv_timeout(REPLY_TIMEOUT * 10) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(AudioError::Decode(e)),
            Err(_) => return Err(AudioError::ThreadGone),
        }

        meter.start(Instant::now());
        self.playing = Some(meter);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        let Some(meter) = &self.playing else {
            return false;
        };
        match self.ask_playing() {
            Some(playing) => playing,
            // thread unreachable: fall back to the clip's own length
            None => !meter.finished(),
        }
    }

    fn current_energy(&self) -> f32 {
        self.playing
            .as_ref()
            .map(EnergyMeter::energy_now)
            .unwrap_or(0.0)
    }

    fn stop(&mut self) {
        self.playing = None;
        let _ = self.tx.send(AudioCommand::Stop);
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        let _ = self.tx.send(AudioCommand::Shutdown);
        if let Some(mut worker) = self.worker.take() {
            if let Err(e) = worker.join_timeout(Duration::from_secs(1)) {
                log::warn!("audio thread: {}", e);
            }
        }
    }
}
