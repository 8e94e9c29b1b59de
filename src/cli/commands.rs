// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// `train` and `transfer` with one flag per config field.
// Defaults mirror TrainConfig::default().

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{train_use_case::TrainConfig, transfer_use_case::TransferConfig};
use crate::infra::checkpoint::CheckpointChoice;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the style transfer model on a non-parallel corpus
    Train(TrainArgs),

    /// Rewrite a corpus into the opposite style with a trained checkpoint
    Transfer(TransferArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training corpus prefix; reads <prefix>.0 and <prefix>.1
    #[arg(long, default_value = "data/yelp/sentiment.train")]
    pub train_prefix: String,

    /// Dev corpus prefix. Without it a slice of the training data is held out
    #[arg(long)]
    pub dev_prefix: Option<String>,

    /// Directory for checkpoints, vocabulary, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 10000)]
    pub vocab_size: usize,

    /// Words seen fewer times map to <unk>
    #[arg(long, default_value_t = 5)]
    pub min_count: usize,

    /// Sentences are truncated to this many words
    #[arg(long, default_value_t = 20)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 0.05)]
    pub dev_fraction: f64,

    /// Corrupt encoder inputs with word dropout and a local shuffle
    #[arg(long)]
    pub noise: bool,

    #[arg(long, default_value_t = 0.1)]
    pub word_drop: f64,

    #[arg(long, default_value_t = 3)]
    pub shuffle_window: usize,

    /// Rows per batch (even; half of each style)
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    /// Epochs of reconstruction-only training before the critics join
    #[arg(long, default_value_t = 10)]
    pub pretrain_epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.9)]
    pub beta1: f64,

    #[arg(long, default_value_t = 0.999)]
    pub beta2: f64,

    /// Weight of the adversarial term in the generator loss
    #[arg(long, default_value_t = 1.0)]
    pub rho: f64,

    #[arg(long, default_value_t = 1.0)]
    pub gamma_init: f64,

    #[arg(long, default_value_t = 0.5)]
    pub gamma_decay: f64,

    #[arg(long, default_value_t = 0.001)]
    pub gamma_min: f64,

    /// Both critic losses must be below this for an adversarial update
    #[arg(long, default_value_t = 1.2)]
    pub disc_threshold: f64,

    #[arg(long, default_value_t = 100)]
    pub log_every: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 100)]
    pub embed_dim: usize,

    /// Style part of the hidden state
    #[arg(long, default_value_t = 200)]
    pub dim_y: usize,

    /// Content part of the hidden state
    #[arg(long, default_value_t = 500)]
    pub dim_z: usize,

    #[arg(long, default_value_t = 0.5)]
    pub input_keep_prob: f64,

    #[arg(long, default_value_t = 0.5)]
    pub output_keep_prob: f64,

    #[arg(long, default_value_t = 128)]
    pub cnn_filters: usize,

    /// Convolution widths of each critic, e.g. 3,4,5
    #[arg(long, value_delimiter = ',', default_values_t = [3, 4, 5])]
    pub cnn_kernel_sizes: Vec<usize>,

    #[arg(long, default_value_t = 0.5)]
    pub cnn_dropout: f64,

    #[arg(long, default_value_t = 21)]
    pub max_decoding_length_train: usize,

    #[arg(long, default_value_t = 20)]
    pub max_decoding_length_infer: usize,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_prefix:   a.train_prefix,
            dev_prefix:     a.dev_prefix,
            checkpoint_dir: a.checkpoint_dir,
            vocab_size:     a.vocab_size,
            min_count:      a.min_count,
            max_seq_len:    a.max_seq_len,
            dev_fraction:   a.dev_fraction,
            noise:          a.noise,
            word_drop:      a.word_drop,
            shuffle_window: a.shuffle_window,
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            pretrain_epochs: a.pretrain_epochs,
            lr:              a.lr,
            beta1:           a.beta1,
            beta2:           a.beta2,
            rho:             a.rho,
            gamma_init:      a.gamma_init,
            gamma_decay:     a.gamma_decay,
            gamma_min:       a.gamma_min,
            disc_threshold:  a.disc_threshold,
            log_every:       a.log_every,
            seed:            a.seed,
            embed_dim:        a.embed_dim,
            dim_y:            a.dim_y,
            dim_z:            a.dim_z,
            input_keep_prob:  a.input_keep_prob,
            output_keep_prob: a.output_keep_prob,
            cnn_filters:      a.cnn_filters,
            cnn_kernel_sizes: a.cnn_kernel_sizes,
            cnn_dropout:      a.cnn_dropout,
            max_decoding_length_train: a.max_decoding_length_train,
            max_decoding_length_infer: a.max_decoding_length_infer,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum WhichCheckpoint {
    /// Lowest dev loss, falling back to the latest epoch
    #[default]
    Best,
    Latest,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Input corpus prefix; reads <prefix>.0 and <prefix>.1
    #[arg(long)]
    pub input_prefix: String,

    /// Writes <prefix>.{0,1}.tsf and <prefix>.{0,1}.rec
    #[arg(long)]
    pub output_prefix: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, value_enum, default_value_t = WhichCheckpoint::Best)]
    pub checkpoint: WhichCheckpoint,

    /// Load this epoch instead of --checkpoint
    #[arg(long)]
    pub epoch: Option<usize>,
}

impl From<TransferArgs> for TransferConfig {
    fn from(a: TransferArgs) -> Self {
        let checkpoint = match (a.epoch, a.checkpoint) {
            (Some(n), _)                     => CheckpointChoice::Epoch(n),
            (None, WhichCheckpoint::Best)    => CheckpointChoice::Best,
            (None, WhichCheckpoint::Latest)  => CheckpointChoice::Latest,
        };
        TransferConfig {
            checkpoint_dir: a.checkpoint_dir,
            input_prefix:   a.input_prefix,
            output_prefix:  a.output_prefix,
            batch_size:     a.batch_size,
            checkpoint,
        }
    }
}
