use super::{GenerationError, Result};

/// Strip everything a speech engine would read out literally
///
/// Keeps letters, digits, whitespace and `. , ' ? !`, then collapses runs of
/// whitespace into single spaces.
pub fn sanitize_speech(text: &str) -> Result<String> {
    let kept: String = text
        .chars()
        .filter(|c| {
            c.is_alphanumeric() || c.is_whitespace() || matches!(c, '.' | ',' | '\'' | '?' | '!')
        })
        .collect();
    let cleaned = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().any(char::is_alphanumeric) {
        Ok(cleaned)
    } else {
        Err(GenerationError::EmptyText)
    }
}
