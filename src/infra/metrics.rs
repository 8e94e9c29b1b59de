// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to checkpoints/metrics.csv.
//
// Columns:
//   epoch, gamma                       schedule state for the epoch
//   train_loss, train_loss_g           mean generator objective / reconstruction
//   train_ppl                          exp(mean per-token cross-entropy)
//   train_loss_d0, train_loss_d1       mean critic losses (NaN while pretraining)
//   dev_loss, dev_loss_g, dev_ppl,     same on the dev set (NaN without one)
//   dev_loss_d
//
// Reading it:
//   - train_loss_g should fall steadily during pretraining
//   - critic losses near ln(2)·2 ≈ 1.39 mean the critics are guessing;
//     below the threshold the generator starts its adversarial updates
//   - a rising dev_loss_g with a falling train_loss_g is overfitting

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,gamma,train_loss,train_loss_g,train_ppl,train_loss_d0,train_loss_d1,\
dev_loss,dev_loss_g,dev_ppl,dev_loss_d";

/// One row of metrics for a single epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Gumbel temperature used during the epoch
    pub gamma: f64,

    pub train_loss:    f64,
    pub train_loss_g:  f64,
    pub train_ppl:     f64,
    pub train_loss_d0: f64,
    pub train_loss_d1: f64,

    pub dev_loss:   f64,
    pub dev_loss_g: f64,
    pub dev_ppl:    f64,
    pub dev_loss_d: f64,
}

impl EpochMetrics {
    /// True if this epoch's dev loss beats `best_dev_loss`. NaN never wins.
    pub fn is_improvement(&self, best_dev_loss: f64) -> bool {
        self.dev_loss < best_dev_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header when the file is new; existing logs are appended to.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.gamma,
            m.train_loss, m.train_loss_g, m.train_ppl, m.train_loss_d0, m.train_loss_d1,
            m.dev_loss, m.dev_loss_g, m.dev_ppl, m.dev_loss_d,
        )?;
        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, dev_loss={:.4}",
            m.epoch, m.train_loss, m.dev_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
