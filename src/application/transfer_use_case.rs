// ============================================================
// Layer 2 — TransferUseCase
// ============================================================
// Rewrites a corpus into the opposite style:
//
//   <input>.0  ──transfer──►  <output>.0.tsf   (now style 1)
//              ──rebuild───►  <output>.0.rec
//   <input>.1  ──transfer──►  <output>.1.tsf   (now style 0)
//              ──rebuild───►  <output>.1.rec
//
// Output line i corresponds to the i-th non-blank input line. A missing
// input side produces no files for that side.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::data::loader::LineCorpusLoader;
use crate::domain::{sentence::StyleLabel, traits::StyleTransferer};
use crate::infra::checkpoint::{CheckpointChoice, CheckpointManager};
use crate::ml::inferencer::{InferBackend, Transferer};

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub checkpoint_dir: String,
    pub input_prefix:   String,
    pub output_prefix:  String,
    pub batch_size:     usize,
    pub checkpoint:     CheckpointChoice,
}

/// Lines written per style, indexed by label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub sentences: [usize; 2],
}

pub struct TransferUseCase<T: StyleTransferer> {
    config:     TransferConfig,
    transferer: T,
}

impl TransferUseCase<Transferer<InferBackend>> {
    /// Load the trained generator and vocabulary from `checkpoint_dir`.
    pub fn from_checkpoint(config: TransferConfig) -> Result<Self> {
        let ckpt = CheckpointManager::new(&config.checkpoint_dir);
        let device = burn::backend::wgpu::WgpuDevice::default();
        let transferer = Transferer::from_checkpoint(&ckpt, config.checkpoint, config.batch_size, device)?;
        Ok(Self::new(config, transferer))
    }
}

impl<T: StyleTransferer> TransferUseCase<T> {
    pub fn new(config: TransferConfig, transferer: T) -> Self {
        Self { config, transferer }
    }

    pub fn execute(&self) -> Result<TransferSummary> {
        let loader = LineCorpusLoader::new(&self.config.input_prefix);
        let mut summary = TransferSummary::default();

        for label in StyleLabel::ALL {
            let sentences: Vec<String> = loader
                .load_style(label)?
                .into_iter()
                .map(|s| s.text)
                .collect();
            if sentences.is_empty() {
                continue;
            }

            let transferred = self.transferer.transfer(&sentences, label)?;
            let rebuilt     = self.transferer.reconstruct(&sentences, label)?;
            self.write(label, "tsf", &transferred)?;
            self.write(label, "rec", &rebuilt)?;

            tracing::info!(
                "Style {}: {} sentences → {}",
                label.index(), sentences.len(), self.output_path(label, "tsf").display(),
            );
            summary.sentences[label.index()] = sentences.len();
        }
        Ok(summary)
    }

    pub fn output_path(&self, label: StyleLabel, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}.{}", self.config.output_prefix, label.index(), suffix))
    }

    fn write(&self, label: StyleLabel, suffix: &str, lines: &[String]) -> Result<()> {
        let path = self.output_path(label, suffix);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(&path, text).with_context(|| format!("Cannot write '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Tags every sentence with the style it was decoded into.
    struct Tagger;

    impl StyleTransferer for Tagger {
        fn transfer(&self, sentences: &[String], from: StyleLabel) -> Result<Vec<String>> {
            Ok(sentences.iter().map(|s| format!("{s} <{}>", from.flipped().index())).collect())
        }

        fn reconstruct(&self, sentences: &[String], label: StyleLabel) -> Result<Vec<String>> {
            Ok(sentences.iter().map(|s| format!("{s} <{}>", label.index())).collect())
        }
    }

    fn config(dir: &std::path::Path) -> TransferConfig {
        TransferConfig {
            checkpoint_dir: dir.join("ckpt").to_string_lossy().into_owned(),
            input_prefix:   dir.join("test").to_string_lossy().into_owned(),
            output_prefix:  dir.join("out/test").to_string_lossy().into_owned(),
            batch_size:     2,
            checkpoint:     CheckpointChoice::Best,
        }
    }

    #[test]
    fn test_writes_tsf_and_rec_per_style() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.0"), "it was bad\nnever again\n").unwrap();
        fs::write(dir.path().join("test.1"), "lovely place\n").unwrap();

        let uc = TransferUseCase::new(config(dir.path()), Tagger);
        let summary = uc.execute().unwrap();
        assert_eq!(summary.sentences, [2, 1]);

        let tsf0 = fs::read_to_string(uc.output_path(StyleLabel::Style0, "tsf")).unwrap();
        assert_eq!(tsf0, "it was bad <1>\nnever again <1>\n");
        let rec1 = fs::read_to_string(uc.output_path(StyleLabel::Style1, "rec")).unwrap();
        assert_eq!(rec1, "lovely place <1>\n");
    }

    #[test]
    fn test_missing_side_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.1"), "lovely place\n").unwrap();

        let uc = TransferUseCase::new(config(dir.path()), Tagger);
        assert_eq!(uc.execute().unwrap().sentences, [0, 1]);
        assert!(!uc.output_path(StyleLabel::Style0, "tsf").exists());
    }
}
