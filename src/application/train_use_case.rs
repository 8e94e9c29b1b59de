// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the training pipeline in order:
//
//   Step 1: Load <train>.0 / <train>.1     (Layer 4 - data)
//   Step 2: Clean and truncate sentences   (Layer 4 - data)
//   Step 3: Load <dev>.0 / <dev>.1, or
//           hold out a dev split           (Layer 4 - data)
//   Step 4: Build / load vocabulary        (Layer 6 - infra)
//   Step 5: Encode and pair sentences      (Layer 4 - data)
//   Step 6: Save config                    (Layer 6 - infra)
//   Step 7: Run the training schedule      (Layer 5 - ml)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{
    batcher::WordNoise,
    dataset::StylePairDataset,
    loader::LineCorpusLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{sentence::StyledSentence, traits::CorpusSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::{encode_words, VocabStore},
};
use crate::ml::{model::TsfConfig, trainer::{run_training, TrainingSummary}};

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved as train_config.json so transfer can rebuild the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub train_prefix:   String,
    pub dev_prefix:     Option<String>,
    pub checkpoint_dir: String,

    // vocabulary / data
    pub vocab_size:     usize,
    pub min_count:      usize,
    pub max_seq_len:    usize,
    /// Held out from training when no dev prefix is given (0 disables)
    pub dev_fraction:   f64,
    pub noise:          bool,
    pub word_drop:      f64,
    pub shuffle_window: usize,

    // schedule
    /// Rows per batch; half style 0, half style 1
    pub batch_size:      usize,
    pub epochs:          usize,
    pub pretrain_epochs: usize,
    pub lr:              f64,
    pub beta1:           f64,
    pub beta2:           f64,
    pub rho:             f64,
    pub gamma_init:      f64,
    pub gamma_decay:     f64,
    pub gamma_min:       f64,
    pub disc_threshold:  f64,
    pub log_every:       usize,
    pub seed:            u64,

    // architecture
    pub embed_dim:        usize,
    pub dim_y:            usize,
    pub dim_z:            usize,
    pub input_keep_prob:  f64,
    pub output_keep_prob: f64,
    pub cnn_filters:      usize,
    pub cnn_kernel_sizes: Vec<usize>,
    pub cnn_dropout:      f64,
    pub max_decoding_length_train: usize,
    pub max_decoding_length_infer: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_prefix:   "data/yelp/sentiment.train".to_string(),
            dev_prefix:     None,
            checkpoint_dir: "checkpoints".to_string(),

            vocab_size:     10000,
            min_count:      5,
            max_seq_len:    20,
            dev_fraction:   0.05,
            noise:          false,
            word_drop:      0.1,
            shuffle_window: 3,

            batch_size:      64,
            epochs:          20,
            pretrain_epochs: 10,
            lr:              1e-4,
            beta1:           0.9,
            beta2:           0.999,
            rho:             1.0,
            gamma_init:      1.0,
            gamma_decay:     0.5,
            gamma_min:       0.001,
            disc_threshold:  1.2,
            log_every:       100,
            seed:            42,

            embed_dim:        100,
            dim_y:            200,
            dim_z:            500,
            input_keep_prob:  0.5,
            output_keep_prob: 0.5,
            cnn_filters:      128,
            cnn_kernel_sizes: vec![3, 4, 5],
            cnn_dropout:      0.5,
            max_decoding_length_train: 21,
            max_decoding_length_infer: 20,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> TsfConfig {
        TsfConfig::new()
            .with_vocab_size(self.vocab_size)
            .with_embed_dim(self.embed_dim)
            .with_dim_y(self.dim_y)
            .with_dim_z(self.dim_z)
            .with_input_keep_prob(self.input_keep_prob)
            .with_output_keep_prob(self.output_keep_prob)
            .with_cnn_filters(self.cnn_filters)
            .with_cnn_kernel_sizes(self.cnn_kernel_sizes.clone())
            .with_cnn_dropout(self.cnn_dropout)
            .with_max_decoding_length_train(self.max_decoding_length_train)
            .with_max_decoding_length_infer(self.max_decoding_length_infer)
    }

    pub fn noise(&self) -> Option<WordNoise> {
        self.noise.then_some(WordNoise {
            word_drop:      self.word_drop,
            shuffle_window: self.shuffle_window,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 2 || self.batch_size % 2 != 0 {
            bail!("batch_size must be even and at least 2, got {}", self.batch_size);
        }
        if self.epochs == 0 {
            bail!("epochs must be at least 1");
        }
        if self.gamma_init <= 0.0 || self.gamma_min <= 0.0 {
            bail!("gamma_init and gamma_min must be positive");
        }
        if !(self.gamma_decay > 0.0 && self.gamma_decay <= 1.0) {
            bail!("gamma_decay must be in (0, 1], got {}", self.gamma_decay);
        }
        for (name, p) in [("input_keep_prob", self.input_keep_prob), ("output_keep_prob", self.output_keep_prob)] {
            if !(p > 0.0 && p <= 1.0) {
                bail!("{name} must be in (0, 1], got {p}");
            }
        }
        if self.lr <= 0.0 {
            bail!("lr must be positive, got {}", self.lr);
        }
        if self.cnn_kernel_sizes.is_empty() || self.cnn_kernel_sizes.contains(&0) {
            bail!("cnn_kernel_sizes must be a non-empty list of positive widths");
        }
        if self.max_seq_len == 0 || self.max_decoding_length_infer == 0 {
            bail!("sequence and decoding lengths must be at least 1");
        }
        Ok(())
    }
}

/// Encoded datasets plus the vocabulary they were encoded with.
pub struct PreparedData {
    pub train:     StylePairDataset,
    pub dev:       Option<StylePairDataset>,
    pub tokenizer: Tokenizer,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Run the full pipeline end to end.
    pub fn execute(&mut self) -> Result<TrainingSummary> {
        self.config.validate()?;
        let data = self.prepare()?;

        let ckpt_manager = CheckpointManager::new(&self.config.checkpoint_dir);
        ckpt_manager.save_config(&self.config)?;
        let metrics = MetricsLogger::new(&self.config.checkpoint_dir)?;

        run_training(&self.config, data.train, data.dev, ckpt_manager, metrics)
    }

    /// Steps 1 to 5. Shrinks `vocab_size` to the vocabulary actually built.
    pub fn prepare(&mut self) -> Result<PreparedData> {
        let cfg = &self.config;
        let preprocessor = Preprocessor::new(cfg.max_seq_len);

        // ── Step 1–2: training corpus ─────────────────────────────────────────
        tracing::info!("Loading training corpus '{}'", cfg.train_prefix);
        let train = preprocessor.clean_all(LineCorpusLoader::new(&cfg.train_prefix).load()?);
        if train.is_empty() {
            bail!("No training sentences found for prefix '{}'", cfg.train_prefix);
        }

        // ── Step 3: dev corpus ────────────────────────────────────────────────
        let (train, dev) = match &cfg.dev_prefix {
            Some(prefix) => {
                tracing::info!("Loading dev corpus '{}'", prefix);
                (train, preprocessor.clean_all(LineCorpusLoader::new(prefix).load()?))
            }
            None if cfg.dev_fraction > 0.0 => {
                split_train_val(train, 1.0 - cfg.dev_fraction, cfg.seed)
            }
            None => (train, Vec::new()),
        };
        tracing::info!("Sentences: {} train, {} dev", train.len(), dev.len());

        // ── Step 4: vocabulary ────────────────────────────────────────────────
        let texts: Vec<String> = train.iter().map(|s| s.text.clone()).collect();
        let tokenizer = VocabStore::new(&cfg.checkpoint_dir)
            .load_or_build(&texts, cfg.vocab_size, cfg.min_count)?;
        let actual = tokenizer.get_vocab_size(true);
        tracing::info!("Vocabulary size: {}", actual);

        // ── Step 5: encode and pair ───────────────────────────────────────────
        let train_ds = encode_pairs(&train, &tokenizer)?;
        let dev_ds   = encode_dev_pairs(&dev, &tokenizer)?;
        tracing::info!(
            "Pairs per epoch: {} train, {} dev",
            train_ds.pair_count(),
            dev_ds.as_ref().map_or(0, |d| d.pair_count()),
        );

        self.config.vocab_size = actual;
        Ok(PreparedData { train: train_ds, dev: dev_ds, tokenizer })
    }
}

fn encode_sides(sentences: &[StyledSentence], tokenizer: &Tokenizer) -> Result<[Vec<Vec<u32>>; 2]> {
    let mut sides: [Vec<Vec<u32>>; 2] = [Vec::new(), Vec::new()];
    for s in sentences {
        sides[s.label.index()].push(encode_words(tokenizer, &s.text)?);
    }
    Ok(sides)
}

/// Training needs both styles; an error names the empty side.
fn encode_pairs(sentences: &[StyledSentence], tokenizer: &Tokenizer) -> Result<StylePairDataset> {
    let [style0, style1] = encode_sides(sentences, tokenizer)?;
    StylePairDataset::new(style0, style1)
}

/// A dev set missing one style cannot feed the crossed critic losses,
/// so it disables dev evaluation instead of failing the run.
fn encode_dev_pairs(sentences: &[StyledSentence], tokenizer: &Tokenizer) -> Result<Option<StylePairDataset>> {
    let [style0, style1] = encode_sides(sentences, tokenizer)?;
    if style0.is_empty() || style1.is_empty() {
        if !(style0.is_empty() && style1.is_empty()) {
            tracing::warn!(
                "Dev set has only one style ({} / {} sentences); dev evaluation disabled",
                style0.len(), style1.len(),
            );
        }
        return Ok(None);
    }
    StylePairDataset::new(style0, style1).map(Some)
}
