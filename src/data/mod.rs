// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the corpus files on disk and the tensor
// batches the training loop consumes:
//
//   <prefix>.0 / <prefix>.1
//       │
//       ▼
//   LineCorpusLoader   → reads lines, tags them with their style
//       │
//       ▼
//   Preprocessor       → normalises and truncates sentences
//       │
//       ▼
//   VocabStore (infra) → words to token ids
//       │
//       ▼
//   StylePairDataset   → pairs style-0 and style-1 sentences
//       │
//       ▼
//   StyleBatcher       → builds enc/dec/target/weight tensors
//       │
//       ▼
//   DataLoader         → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads `<prefix>.0` / `<prefix>.1` sentence files
pub mod loader;

/// Cleans and truncates raw sentences
pub mod preprocessor;

/// Implements Burn's Dataset trait over sentence pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create model inputs
pub mod batcher;

/// Holds out a dev split when no dev corpus is given
pub mod splitter;
