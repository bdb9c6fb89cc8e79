use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One generated line: what to say, how to look while saying it, and where
/// the audio was committed
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    sequence: u64,
    text: String,
    cue: Option<String>,
    audio: PathBuf,
    created_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    Pending,
    Playing,
    Done,
}

impl Utterance {
    pub fn new(sequence: u64, text: String, cue: Option<String>, audio: PathBuf) -> Self {
        Self {
            sequence,
            text,
            cue,
            audio,
            created_at: SystemTime::now(),
        }
    }

    /// Position in generation order, starting at 1
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Expression to show, `None` when the catalog offered nothing usable
    pub fn cue(&self) -> Option<&str> {
        self.cue.as_deref()
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}
