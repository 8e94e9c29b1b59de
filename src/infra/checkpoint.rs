// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the full Tsf record (generator and both
// critics) with Burn's CompactRecorder.
//
// Layout:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← all weights after epoch 1
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json      ← last epoch written
//     best_epoch.json        ← epoch with the lowest dev loss
//     train_config.json      ← TrainConfig used for the run
//     vocab.json             ← word-level vocabulary (VocabStore)
//
// The config is needed at load time: the recorder only restores
// parameters into a model that already has the right shape.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::Tsf;

/// Which saved epoch to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointChoice {
    #[default]
    Latest,
    /// Falls back to the latest epoch when no dev set picked a best one.
    Best,
    Epoch(usize),
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating `dir` if needed.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write {dir}/model_epoch_{epoch}.mpk.gz and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &Tsf<B>, epoch: usize) -> Result<()> {
        let path = self.epoch_path(epoch);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_pointer("latest_epoch.json", epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Record `epoch` as the best one seen so far.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        self.write_pointer("best_epoch.json", epoch)
    }

    /// Restore weights into `model`, which must have the saved shape.
    pub fn load_model<B: Backend>(
        &self,
        model:  Tsf<B>,
        choice: CheckpointChoice,
        device: &B::Device,
    ) -> Result<Tsf<B>> {
        let epoch = match choice {
            CheckpointChoice::Latest   => self.latest_epoch()?,
            CheckpointChoice::Epoch(n) => n,
            CheckpointChoice::Best     => match self.best_epoch()? {
                Some(n) => n,
                None => {
                    tracing::warn!("No best epoch recorded, using the latest checkpoint");
                    self.latest_epoch()?
                }
            },
        };
        let path = self.epoch_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'transfer'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed training config '{}'", path.display()))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_pointer("latest_epoch.json")?
            .context("Cannot find 'latest_epoch.json'. Have you run 'train' first?")
    }

    pub fn best_epoch(&self) -> Result<Option<usize>> {
        self.read_pointer("best_epoch.json")
    }

    fn epoch_path(&self, epoch: usize) -> PathBuf {
        // the recorder appends .mpk.gz
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    fn write_pointer(&self, name: &str, epoch: usize) -> Result<()> {
        fs::write(self.dir.join(name), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {name}"))
    }

    fn read_pointer(&self, name: &str) -> Result<Option<usize>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str::<usize>(s.trim())?))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::tiny_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn first_weights(model: &Tsf<TestBackend>) -> Vec<f32> {
        model.generator.label_proj.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_save_and_reload_restores_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().to_str().unwrap());
        let device = Default::default();

        let trained: Tsf<TestBackend> = tiny_config().init(&device);
        ckpt.save_model(&trained, 3).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 3);

        let fresh: Tsf<TestBackend> = tiny_config().init(&device);
        let loaded = ckpt.load_model(fresh, CheckpointChoice::Latest, &device).unwrap();
        // The recorder stores half precision, so compare within f16 rounding.
        let (loaded, trained) = (first_weights(&loaded), first_weights(&trained));
        assert_eq!(loaded.len(), trained.len());
        for (a, b) in loaded.iter().zip(&trained) {
            assert!((a - b).abs() <= 1e-3 * b.abs().max(1.0), "{a} vs {b}");
        }
    }

    #[test]
    fn test_best_falls_back_to_latest() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        let device = Default::default();

        let model: Tsf<TestBackend> = tiny_config().init(&device);
        ckpt.save_model(&model, 1).unwrap();
        assert_eq!(ckpt.best_epoch().unwrap(), None);
        assert!(ckpt.load_model(model.clone(), CheckpointChoice::Best, &device).is_ok());

        ckpt.mark_best(1).unwrap();
        assert_eq!(ckpt.best_epoch().unwrap(), Some(1));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_config().is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().to_str().unwrap());
        let cfg  = TrainConfig { epochs: 7, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();
        assert_eq!(ckpt.load_config().unwrap().epochs, 7);
    }
}
