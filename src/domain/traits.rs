// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so the
// corpus format and the model behind a transfer can change
// without touching the workflows.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sentence::{StyleLabel, StyledSentence};

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Anything that can produce labelled sentences.
///
/// Implementations:
///   - LineCorpusLoader → `<prefix>.0` / `<prefix>.1` text files
pub trait CorpusSource {
    fn load(&self) -> Result<Vec<StyledSentence>>;
}

// ─── StyleTransferer ──────────────────────────────────────────────────────────
/// Rewrites sentences written in `from` into the opposite style.
///
/// Implementations:
///   - Transferer → greedy decoding with a trained generator
pub trait StyleTransferer {
    fn transfer(&self, sentences: &[String], from: StyleLabel) -> Result<Vec<String>>;

    /// Re-generate the sentences in their own style (autoencoder path).
    fn reconstruct(&self, sentences: &[String], label: StyleLabel) -> Result<Vec<String>>;
}
