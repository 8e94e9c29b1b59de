use anyhow::{bail, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One training item: a style-0 sentence and a style-1 sentence,
/// already mapped to token ids (no specials).
///
/// The two sentences are unrelated; they are paired only so that
/// every batch holds the same number of rows of each style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentencePair {
    pub style0: Vec<u32>,
    pub style1: Vec<u32>,
}

pub struct StylePairDataset {
    pairs: Vec<SentencePair>,
}

impl StylePairDataset {
    /// Pair the two sides index by index. The shorter side is
    /// oversampled by cycling through it until both are equally long.
    pub fn new(style0: Vec<Vec<u32>>, style1: Vec<Vec<u32>>) -> Result<Self> {
        if style0.is_empty() != style1.is_empty() {
            bail!(
                "both styles need at least one sentence (style 0: {}, style 1: {})",
                style0.len(),
                style1.len()
            );
        }

        let n = style0.len().max(style1.len());
        let pairs = (0..n)
            .map(|i| SentencePair {
                style0: style0[i % style0.len()].clone(),
                style1: style1[i % style1.len()].clone(),
            })
            .collect();

        Ok(Self { pairs })
    }

    pub fn pair_count(&self) -> usize { self.pairs.len() }
}

impl Dataset<SentencePair> for StylePairDataset {
    fn get(&self, index: usize) -> Option<SentencePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorter_side_is_cycled() {
        let ds = StylePairDataset::new(
            vec![vec![1], vec![2], vec![3]],
            vec![vec![10]],
        ).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(0).unwrap(), SentencePair { style0: vec![1], style1: vec![10] });
        assert_eq!(ds.get(2).unwrap().style1, vec![10]);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_one_empty_side_is_rejected() {
        assert!(StylePairDataset::new(vec![vec![1]], Vec::new()).is_err());
    }

    #[test]
    fn test_both_empty_is_an_empty_dataset() {
        let ds = StylePairDataset::new(Vec::new(), Vec::new()).unwrap();
        assert!(ds.is_empty());
    }
}
