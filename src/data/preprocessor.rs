// ============================================================
// Layer 4 — Sentence Preprocessor
// ============================================================
// Cleans one raw corpus line before it reaches the vocabulary.
//
// Cleaning steps (applied in order):
//   1. Replace Unicode whitespace variants and control
//      characters with a plain space
//   2. Lowercase
//   3. Collapse runs of whitespace (split/join on words)
//   4. Truncate to `max_words` words
//
// Lines that end up empty are dropped (None).
//
// Reference: Rust Book §8 (Strings in Rust)
//            Rust Book §13 (Iterators)

use crate::domain::sentence::StyledSentence;

pub struct Preprocessor {
    /// Sentences longer than this are cut, not discarded
    max_words: usize,
}

impl Preprocessor {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    /// Clean a single line. Returns None if nothing is left.
    pub fn clean(&self, text: &str) -> Option<String> {
        let normalised: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect::<String>()
            .to_lowercase();

        let words: Vec<&str> = normalised
            .split_whitespace()
            .take(self.max_words)
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    /// Clean a whole corpus, keeping the labels attached.
    pub fn clean_all(&self, sentences: Vec<StyledSentence>) -> Vec<StyledSentence> {
        sentences
            .into_iter()
            .filter_map(|s| {
                self.clean(&s.text)
                    .map(|text| StyledSentence::new(text, s.label))
            })
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentence::StyleLabel;

    #[test]
    fn test_collapses_whitespace_and_lowercases() {
        let p = Preprocessor::default();
        assert_eq!(p.clean("  The\tFood   WAS\u{00A0}good "), Some("the food was good".into()));
    }

    #[test]
    fn test_truncates_long_sentences() {
        let p = Preprocessor::new(3);
        assert_eq!(p.clean("a b c d e"), Some("a b c".into()));
    }

    #[test]
    fn test_blank_line_is_dropped() {
        let p = Preprocessor::default();
        assert_eq!(p.clean(" \x01 \r"), None);
        let kept = p.clean_all(vec![
            StyledSentence::new("   ", StyleLabel::Style0),
            StyledSentence::new("ok", StyleLabel::Style1),
        ]);
        assert_eq!(kept, vec![StyledSentence::new("ok", StyleLabel::Style1)]);
    }
}
