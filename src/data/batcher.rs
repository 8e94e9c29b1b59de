// ============================================================
// Layer 4 — Style Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a list of
// SentencePairs into the tensors the model consumes.
//
// A batch of n pairs becomes 2n rows:
//   rows 0..n   → the style-0 sentences, label 0.0
//   rows n..2n  → the style-1 sentences, label 1.0
// The two discriminators rely on this layout: each one sees the
// real sentences of one half and the transferred sentences of
// the other half.
//
// Per row, with l = sentence length and L = padded length:
//
//   enc_inputs  <pad> … <pad>  w_l … w_2 w_1      (length L)
//   dec_inputs  <go>  w_1 … w_l  <pad> … <pad>    (length L+1)
//   targets     w_1 … w_l  <eos> <pad> … <pad>    (length L+1)
//   weights     1 … 1 (l+1 ones)  0 … 0           (length L+1)
//
// The encoder reads the sentence reversed and left-padded, so
// the padding is consumed first and the final state sits right
// after the first word.
//
// L is at least `min_len` so the widest discriminator kernel
// always fits.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use rand::Rng;

use crate::data::dataset::SentencePair;
use crate::domain::sentence::StyleLabel;
use crate::infra::tokenizer_store::{EOS_ID, GO_ID, PAD_ID, UNK_ID};

/// Smallest padded length of a batch.
pub const MIN_LEN: usize = 5;

// ─── StyleBatch ───────────────────────────────────────────────────────────────
/// Model inputs for one step. Row count is the batch size B.
#[derive(Debug, Clone)]
pub struct StyleBatch<B: Backend> {
    /// [B, L] reversed, left-padded sentences
    pub enc_inputs: Tensor<B, 2, Int>,
    /// [B, L+1] `<go>` + sentence, right-padded
    pub dec_inputs: Tensor<B, 2, Int>,
    /// [B, L+1] sentence + `<eos>`, right-padded
    pub targets: Tensor<B, 2, Int>,
    /// [B, L+1] 1.0 on real target tokens, 0.0 on padding
    pub weights: Tensor<B, 2>,
    /// [B] style of each row as 0.0 / 1.0
    pub labels: Tensor<B, 1>,
}

impl<B: Backend> StyleBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.labels.dims()[0]
    }
}

// ─── Word noise ───────────────────────────────────────────────────────────────
/// Optional corruption of the encoder input (denoising autoencoder).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordNoise {
    /// Probability of replacing a word by `<unk>`
    pub word_drop: f64,
    /// Maximum displacement of a word by the local shuffle
    pub shuffle_window: usize,
}

impl WordNoise {
    /// Drop words, then shuffle so that no word moves more than
    /// `shuffle_window` positions: sort positions by `i + (k+1)·U(0,1)`.
    pub fn apply<R: Rng + ?Sized>(&self, ids: &[u32], rng: &mut R) -> Vec<u32> {
        let dropped: Vec<u32> = ids
            .iter()
            .map(|&id| if rng.gen::<f64>() < self.word_drop { UNK_ID } else { id })
            .collect();

        let spread = (self.shuffle_window + 1) as f64;
        let mut keys: Vec<(f64, usize)> = (0..dropped.len())
            .map(|i| (i as f64 + spread * rng.gen::<f64>(), i))
            .collect();
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));

        keys.into_iter().map(|(_, i)| dropped[i]).collect()
    }
}

// ─── Batch construction ───────────────────────────────────────────────────────
/// Build a batch from rows of (token ids, label) in the given order.
pub fn build_batch<B: Backend>(
    rows:   &[(Vec<u32>, StyleLabel)],
    noise:  Option<WordNoise>,
    device: &B::Device,
) -> StyleBatch<B> {
    let batch_size = rows.len();
    let max_len = rows
        .iter()
        .map(|(ids, _)| ids.len())
        .max()
        .unwrap_or(0)
        .max(MIN_LEN);
    let dec_len = max_len + 1;

    let mut enc     = Vec::with_capacity(batch_size * max_len);
    let mut dec     = Vec::with_capacity(batch_size * dec_len);
    let mut tgt     = Vec::with_capacity(batch_size * dec_len);
    let mut weights = Vec::with_capacity(batch_size * dec_len);
    let mut labels  = Vec::with_capacity(batch_size);

    let mut rng = rand::thread_rng();

    for (ids, label) in rows {
        let len     = ids.len().min(max_len);
        let ids     = &ids[..len];
        let padding = max_len - len;

        let enc_ids = match noise {
            Some(n) => n.apply(ids, &mut rng),
            None    => ids.to_vec(),
        };
        enc.extend(std::iter::repeat(PAD_ID as i64).take(padding));
        enc.extend(enc_ids.iter().rev().map(|&x| x as i64));

        dec.push(GO_ID as i64);
        dec.extend(ids.iter().map(|&x| x as i64));
        dec.extend(std::iter::repeat(PAD_ID as i64).take(padding));

        tgt.extend(ids.iter().map(|&x| x as i64));
        tgt.push(EOS_ID as i64);
        tgt.extend(std::iter::repeat(PAD_ID as i64).take(padding));

        weights.extend(std::iter::repeat(1.0f32).take(len + 1));
        weights.extend(std::iter::repeat(0.0f32).take(padding));

        labels.push(label.as_f32());
    }

    StyleBatch {
        enc_inputs: Tensor::from_data(TensorData::new(enc, [batch_size, max_len]), device),
        dec_inputs: Tensor::from_data(TensorData::new(dec, [batch_size, dec_len]), device),
        targets:    Tensor::from_data(TensorData::new(tgt, [batch_size, dec_len]), device),
        weights:    Tensor::from_data(TensorData::new(weights, [batch_size, dec_len]), device),
        labels:     Tensor::from_data(TensorData::new(labels, [batch_size]), device),
    }
}

// ─── StyleBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct StyleBatcher<B: Backend> {
    pub device: B::Device,
    pub noise:  Option<WordNoise>,
}

impl<B: Backend> StyleBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device, noise: None }
    }

    pub fn with_noise(mut self, noise: Option<WordNoise>) -> Self {
        self.noise = noise;
        self
    }
}

impl<B: Backend> Batcher<SentencePair, StyleBatch<B>> for StyleBatcher<B> {
    fn batch(&self, items: Vec<SentencePair>) -> StyleBatch<B> {
        let rows: Vec<(Vec<u32>, StyleLabel)> = items
            .iter()
            .map(|p| (p.style0.clone(), StyleLabel::Style0))
            .chain(items.iter().map(|p| (p.style1.clone(), StyleLabel::Style1)))
            .collect();

        build_batch(&rows, self.noise, &self.device)
    }
}
