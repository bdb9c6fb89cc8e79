use std::path::{Path, PathBuf};

use super::Result;
use crate::engine::Catalog;
use crate::generation::{sanitize_speech, ContentGenerator, PromptContext, SpeechSynthesizer};

/// Text and cue decided for the next utterance, before any audio exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub cue: Option<String>,
}

/// Turns generator and synthesizer calls into utterance material
pub struct UtteranceSource {
    generator: Box<dyn ContentGenerator>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    expressions: Catalog,
    persona: Option<String>,
    staging: PathBuf,
    last_cue: Option<String>,
}

impl UtteranceSource {
    /// `staging` is where the synthesizer writes before commit
    pub fn new(
        generator: Box<dyn ContentGenerator>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        expressions: Catalog,
        staging: impl Into<PathBuf>,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            expressions,
            persona: None,
            staging: staging.into(),
            last_cue: None,
        }
    }

    pub fn with_persona(mut self, persona: Option<String>) -> Self {
        self.persona = persona;
        self
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn expressions(&self) -> &Catalog {
        &self.expressions
    }

    /// Generate the text and pick its expression cue
    pub fn compose(&mut self) -> Result<Draft> {
        let context = PromptContext {
            expressions: self.expressions.names(),
            persona: self.persona.as_deref(),
        };
        let raw = self.generator.generate(&context)?;
        let text = sanitize_speech(&raw)?;
        log::debug!("generated: {}", text);

        let cue = self.pick_cue(&text)?;
        Ok(Draft { text, cue })
    }

    /// Ask the classifier for a cue, steering it away from the previous one
    ///
    /// An answer outside the catalog falls back to the neutral expression.
    fn pick_cue(&mut self, text: &str) -> Result<Option<String>> {
        if self.expressions.is_empty() {
            return Ok(None);
        }
        let candidates = self.expressions.candidates(self.last_cue.as_deref());
        let answer = self.generator.classify_expression(text, &candidates)?;

        let cue = match self.expressions.resolve(&answer) {
            Some(cue) => Some(cue.to_string()),
            None => {
                log::debug!(
                    "classifier answer {:?} not in catalog, using neutral",
                    answer.trim()
                );
                self.expressions.neutral().map(str::to_string)
            }
        };
        if cue.is_some() {
            self.last_cue = cue.clone();
        }
        Ok(cue)
    }

    /// Synthesize `draft` into the staging file
    pub fn synthesize(&mut self, draft: &Draft) -> Result<PathBuf> {
        let path = self.synthesizer.synthesize(&draft.text, &self.staging)?;
        Ok(path)
    }
}
