use std::path::Path;

/// Expression applied when nothing else is playing
pub const NEUTRAL_EXPRESSION: &str = "normal";

/// Read-only list of expression or motion names, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    names: Vec<String>,
}

/// Catalog name of a model asset file: everything before the first dot
///
/// `smile.exp3.json` and `smile.json` both name `smile`.
pub fn catalog_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

impl Catalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    /// Build a catalog from the file names inside `dir`
    ///
    /// A missing or unreadable directory yields an empty catalog.
    pub fn discover(dir: &Path) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("catalog directory {} unavailable: {}", dir.display(), e);
                return Self::default();
            }
        };

        let catalog = Self::new(entries.filter_map(|entry| {
            let entry = entry.ok()?;
            let file_name = entry.file_name();
            let file_name = file_name.to_str()?;
            if file_name.starts_with('.') {
                return None;
            }
            Some(catalog_name(file_name).to_string())
        }));
        log::info!(
            "loaded {} entries from {}: {:?}",
            catalog.len(),
            dir.display(),
            catalog.names
        );
        catalog
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// The neutral expression, if this catalog has one
    pub fn neutral(&self) -> Option<&str> {
        self.names
            .iter()
            .find(|n| n.as_str() == NEUTRAL_EXPRESSION)
            .map(String::as_str)
    }

    /// Candidates offered to the classifier, leaving out `previous` when
    /// something else remains
    pub fn candidates(&self, previous: Option<&str>) -> Vec<&str> {
        let all: Vec<&str> = self.names.iter().map(String::as_str).collect();
        match previous {
            Some(prev) if self.names.len() > 1 => {
                let filtered: Vec<&str> = all.iter().copied().filter(|n| *n != prev).collect();
                if filtered.is_empty() {
                    all
                } else {
                    filtered
                }
            }
            _ => all,
        }
    }

    /// Match a free-form classifier answer against the catalog
    ///
    /// Surrounding quotes, backticks, asterisks and trailing punctuation are
    /// ignored, and the comparison is case-insensitive. Returns the catalog's
    /// own spelling.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let first_line = raw.trim().lines().next().unwrap_or("");
        let cleaned = first_line
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*'))
            .trim_end_matches(|c: char| matches!(c, '.' | '!' | ',' | ';' | ':'))
            .trim();
        if cleaned.is_empty() {
            return None;
        }
        self.names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(cleaned))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_name_strips_all_extensions() {
        assert_eq!(catalog_name("smile.exp3.json"), "smile");
        assert_eq!(catalog_name("idle"), "idle");
        assert_eq!(catalog_name("mtn_01.motion3.json"), "mtn_01");
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let catalog = Catalog::new(["sad", "normal", "angry", "sad"]);
        assert_eq!(catalog.names(), ["angry", "normal", "sad"]);
        assert_eq!(catalog.neutral(), Some("normal"));
    }

    #[test]
    fn test_discover_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["normal.exp3.json", "smile.exp3.json", ".DS_Store"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let catalog = Catalog::discover(dir.path());
        assert_eq!(catalog.names(), ["normal", "smile"]);
    }

    #[test]
    fn test_discover_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::discover(&dir.path().join("expressions"));
        assert!(catalog.is_empty());
        assert_eq!(catalog.neutral(), None);
    }

    #[test]
    fn test_resolve_normalizes_answer() {
        let catalog = Catalog::new(["normal", "smile", "exp_06"]);
        assert_eq!(catalog.resolve("smile"), Some("smile"));
        assert_eq!(catalog.resolve("  \"Smile\".\n"), Some("smile"));
        assert_eq!(catalog.resolve("`EXP_06`"), Some("exp_06"));
        assert_eq!(catalog.resolve("**normal**"), Some("normal"));
        assert_eq!(catalog.resolve("grin"), None);
        assert_eq!(catalog.resolve(""), None);
    }

    #[test]
    fn test_candidates_exclude_previous() {
        let catalog = Catalog::new(["normal", "smile"]);
        assert_eq!(catalog.candidates(Some("smile")), ["normal"]);
        assert_eq!(catalog.candidates(None), ["normal", "smile"]);
        // unknown previous leaves everything in
        assert_eq!(catalog.candidates(Some("grin")), ["normal", "smile"]);
    }

    #[test]
    fn test_candidates_single_entry_keeps_it() {
        let catalog = Catalog::new(["normal"]);
        assert_eq!(catalog.candidates(Some("normal")), ["normal"]);
    }
}
