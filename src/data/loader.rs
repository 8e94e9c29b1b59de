// ============================================================
// Layer 4 — Line Corpus Loader
// ============================================================
// Loads a non-parallel style corpus stored as two plain-text
// files sharing a prefix:
//
//   data/yelp/sentiment.train.0   ← one style-0 sentence per line
//   data/yelp/sentiment.train.1   ← one style-1 sentence per line
//
// The file suffix IS the label; the lines carry no markup.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (Reading a File)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::sentence::{StyleLabel, StyledSentence};
use crate::domain::traits::CorpusSource;

/// Loads `<prefix>.0` and `<prefix>.1`.
pub struct LineCorpusLoader {
    prefix: String,
}

impl LineCorpusLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Path of the file holding sentences of the given style.
    pub fn path_for(&self, label: StyleLabel) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.prefix, label.index()))
    }

    /// Load only one side of the corpus.
    pub fn load_style(&self, label: StyleLabel) -> Result<Vec<StyledSentence>> {
        let path = self.path_for(label);

        // A missing side is not fatal here. Training rejects a one-sided
        // corpus later; a one-sided dev set only disables dev eval.
        if !path.exists() {
            tracing::warn!(
                "Corpus file '{}' does not exist, treating it as empty",
                path.display()
            );
            return Ok(Vec::new());
        }

        read_lines(&path).map(|lines| {
            lines
                .into_iter()
                .map(|line| StyledSentence::new(line, label))
                .collect()
        })
    }
}

impl CorpusSource for LineCorpusLoader {
    fn load(&self) -> Result<Vec<StyledSentence>> {
        let mut all = Vec::new();
        for label in StyleLabel::ALL {
            let sentences = self.load_style(label)?;
            tracing::debug!(
                "Loaded {} sentences of style {} from '{}'",
                sentences.len(),
                label.index(),
                self.path_for(label).display()
            );
            all.extend(sentences);
        }
        tracing::info!("Loaded {} sentences with prefix '{}'", all.len(), self.prefix);
        Ok(all)
    }
}

/// Read a UTF-8 file and return its non-blank lines.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_both_styles_with_labels() {
        let dir    = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("sentiment.train");
        fs::write(format!("{}.0", prefix.display()), "bad food\n\nrude staff\n").unwrap();
        fs::write(format!("{}.1", prefix.display()), "great food\n").unwrap();

        let loader = LineCorpusLoader::new(prefix.to_string_lossy());
        let all    = loader.load().unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(all[0], StyledSentence::new("bad food", StyleLabel::Style0));
        assert_eq!(all[1].label, StyleLabel::Style0);
        assert_eq!(all[2], StyledSentence::new("great food", StyleLabel::Style1));
    }

    #[test]
    fn test_missing_side_is_empty() {
        let dir    = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("only_zero");
        fs::write(format!("{}.0", prefix.display()), "one line\n").unwrap();

        let loader = LineCorpusLoader::new(prefix.to_string_lossy());
        assert!(loader.load_style(StyleLabel::Style1).unwrap().is_empty());
        assert_eq!(loader.load().unwrap().len(), 1);
    }
}
