//! Content and speech generation collaborators
//!
//! Text comes from a [`ContentGenerator`] (a hosted LLM or a local script),
//! speech from a [`SpeechSynthesizer`]. Both are called only from the
//! producer thread and may block on the network.

mod gemini;
mod prompts;
mod sanitize;
mod script;
mod synth;

pub use gemini::GeminiGenerator;
pub use prompts::{expression_prompt, persona_prompt, DEFAULT_PERSONA};
pub use sanitize::sanitize_speech;
pub use script::ScriptedGenerator;
pub use synth::SynthesizerBackend;

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{service} request failed: {message}")]
    Http {
        service: &'static str,
        message: String,
    },
    #[error("{service} returned an unusable response: {message}")]
    BadResponse {
        service: &'static str,
        message: String,
    },
    #[error("Generated text is empty")]
    EmptyText,
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Synthesizer command failed: {0}")]
    Command(String),
    #[error("Audio encoding failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, GenerationError>;

impl GenerationError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        GenerationError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the content generator is conditioned on
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// The expression catalog, so the tone stays within what can be shown
    pub expressions: &'a [String],
    /// Replaces [`DEFAULT_PERSONA`] when set
    pub persona: Option<&'a str>,
}

impl PromptContext<'_> {
    pub fn render(&self) -> String {
        persona_prompt(self.persona.unwrap_or(DEFAULT_PERSONA), self.expressions)
    }
}

pub trait ContentGenerator: Send {
    /// Produce the next thing to say
    fn generate(&mut self, context: &PromptContext<'_>) -> Result<String>;

    /// Pick one of `candidates` for `text`
    ///
    /// The answer is free-form; callers normalize it against the catalog.
    fn classify_expression(&mut self, text: &str, candidates: &[&str]) -> Result<String>;
}

pub trait SpeechSynthesizer: Send {
    /// Write a complete audio file for `text` at `staging` and return its path
    fn synthesize(&mut self, text: &str, staging: &Path) -> Result<PathBuf>;
}
