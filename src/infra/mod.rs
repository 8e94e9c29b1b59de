// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by training and transfer:
//
//   checkpoint.rs      — Tsf weights via CompactRecorder, plus the
//                        latest/best epoch pointers and TrainConfig
//                        as JSON so transfer can rebuild the model.
//
//   tokenizer_store.rs — Word-level vocabulary with the four
//                        reserved ids. Built once from the training
//                        corpus and reloaded for transfer.
//
//   metrics.rs         — Per-epoch loss / perplexity CSV.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
