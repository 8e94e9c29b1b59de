// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Builds, saves and reloads the word-level vocabulary.
//
// The corpus is already tokenised (one space between tokens),
// so a WordLevel model with a WhitespaceSplit pre-tokenizer is
// all that is needed. The vocabulary is written directly as a
// HuggingFace tokenizer JSON and loaded back with
// Tokenizer::from_file, which sidesteps the trainer API.
//
// Fixed ids (the decoder's end token depends on them):
//   <pad> = 0, <go> = 1, <eos> = 2, <unk> = 3

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::PathBuf};
use tokenizers::Tokenizer;

pub const PAD_ID: u32 = 0;
pub const GO_ID:  u32 = 1;
pub const EOS_ID: u32 = 2;
pub const UNK_ID: u32 = 3;

const SPECIALS: [&str; 4] = ["<pad>", "<go>", "<eos>", "<unk>"];

const VOCAB_FILE: &str = "vocab.json";

pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    /// Load the saved vocabulary, or build one from `sentences`.
    pub fn load_or_build(
        &self,
        sentences:  &[String],
        vocab_size: usize,
        min_count:  usize,
    ) -> Result<Tokenizer> {
        if self.dir.join(VOCAB_FILE).exists() {
            tracing::info!("Loading existing vocabulary from disk");
            self.load()
        } else {
            tracing::info!(
                "Building new vocabulary (max size={}, min count={})",
                vocab_size, min_count
            );
            self.build_and_save(sentences, vocab_size, min_count)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join(VOCAB_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load vocabulary from '{}': {}", path.display(), e
            ))
    }

    fn build_and_save(
        &self,
        sentences:  &[String],
        vocab_size: usize,
        min_count:  usize,
    ) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut freq: HashMap<&str, usize> = HashMap::new();
        for sentence in sentences {
            for word in sentence.split_whitespace() {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Frequency descending, then alphabetical so the ids are stable.
        let mut words: Vec<(&str, usize)> = freq
            .into_iter()
            .filter(|(w, c)| *c >= min_count && !SPECIALS.contains(w))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIALS.len()));

        let mut vocab = serde_json::Map::new();
        for (id, special) in SPECIALS.iter().enumerate() {
            vocab.insert(special.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.to_string(), serde_json::json!(SPECIALS.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, content)| serde_json::json!({
                "id": id, "content": content, "single_word": false,
                "lstrip": false, "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "<unk>"
            }
        });

        let path = self.dir.join(VOCAB_FILE);
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;

        tracing::info!(
            "Vocabulary built with {} entries, saved to '{}'",
            SPECIALS.len() + words.len(),
            path.display()
        );

        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot reload vocabulary: {e}"))
    }
}

/// Map a cleaned sentence to token ids (no specials added).
pub fn encode_words(tokenizer: &Tokenizer, sentence: &str) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(sentence, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
    Ok(enc.get_ids().to_vec())
}

/// Turn decoder output back into text: everything up to the first
/// `<eos>`, with `<pad>` and `<go>` dropped.
pub fn decode_ids(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    let words: Vec<u32> = ids
        .iter()
        .copied()
        .take_while(|&id| id != EOS_ID)
        .filter(|&id| id != PAD_ID && id != GO_ID)
        .collect();

    // <unk> is marked special, so ask the tokenizer to keep it.
    let tokens: Vec<String> = words
        .iter()
        .map(|&id| tokenizer.id_to_token(id).unwrap_or_else(|| "<unk>".to_string()))
        .collect();
    Ok(tokens.join(" "))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "the food was good".to_string(),
            "the food was bad".to_string(),
            "the staff was rude".to_string(),
        ]
    }

    #[test]
    fn test_specials_have_fixed_ids() {
        let dir = tempfile::tempdir().unwrap();
        let tok = VocabStore::new(dir.path().to_string_lossy())
            .load_or_build(&corpus(), 100, 1)
            .unwrap();

        assert_eq!(tok.token_to_id("<pad>"), Some(PAD_ID));
        assert_eq!(tok.token_to_id("<go>"),  Some(GO_ID));
        assert_eq!(tok.token_to_id("<eos>"), Some(EOS_ID));
        assert_eq!(tok.token_to_id("<unk>"), Some(UNK_ID));
        // most frequent words come first
        assert_eq!(tok.token_to_id("the"), Some(4));
        assert_eq!(tok.token_to_id("was"), Some(5));
    }

    #[test]
    fn test_min_count_and_cap() {
        let dir = tempfile::tempdir().unwrap();
        let tok = VocabStore::new(dir.path().to_string_lossy())
            .load_or_build(&corpus(), 100, 2)
            .unwrap();

        // "the", "was" (3x) and "food" (2x) survive
        assert_eq!(tok.get_vocab_size(true), 7);
        let ids = encode_words(&tok, "the staff was good").unwrap();
        assert_eq!(ids[1], UNK_ID);
        assert_eq!(ids[3], UNK_ID);
    }

    #[test]
    fn test_reload_gives_same_vocabulary() {
        let dir   = tempfile::tempdir().unwrap();
        let store = VocabStore::new(dir.path().to_string_lossy());
        let built = store.load_or_build(&corpus(), 100, 1).unwrap();
        let again = store.load().unwrap();
        assert_eq!(built.get_vocab(true), again.get_vocab(true));
    }

    #[test]
    fn test_decode_stops_at_eos() {
        let dir = tempfile::tempdir().unwrap();
        let tok = VocabStore::new(dir.path().to_string_lossy())
            .load_or_build(&corpus(), 100, 1)
            .unwrap();

        let mut ids = vec![GO_ID];
        ids.extend(encode_words(&tok, "the food was good").unwrap());
        ids.push(EOS_ID);
        ids.extend(encode_words(&tok, "rude").unwrap());

        assert_eq!(decode_ids(&tok, &ids).unwrap(), "the food was good");
    }
}
