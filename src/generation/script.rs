use std::path::Path;

use super::{ContentGenerator, GenerationError, PromptContext, Result};
use crate::engine::NEUTRAL_EXPRESSION;

/// Offline generator that cycles through prepared lines
///
/// Blank lines and lines starting with `#` are skipped. Classification picks
/// the first candidate named in the line itself, else the neutral expression.
pub struct ScriptedGenerator {
    lines: Vec<String>,
    next: usize,
}

impl ScriptedGenerator {
    pub fn new<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(Into::into)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        if lines.is_empty() {
            return Err(GenerationError::EmptyText);
        }
        Ok(Self { lines, next: 0 })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GenerationError::io(path, e))?;
        Self::new(text.lines())
    }
}

impl ContentGenerator for ScriptedGenerator {
    fn generate(&mut self, _context: &PromptContext<'_>) -> Result<String> {
        let line = self.lines[self.next % self.lines.len()].clone();
        self.next = self.next.wrapping_add(1);
        Ok(line)
    }

    fn classify_expression(&mut self, text: &str, candidates: &[&str]) -> Result<String> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .collect();
        let found = candidates
            .iter()
            .find(|c| words.iter().any(|w| *w == c.to_lowercase()));
        Ok(found.map_or(NEUTRAL_EXPRESSION, |c| *c).to_string())
    }
}
