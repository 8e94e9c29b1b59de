// ============================================================
// Layer 5 — Style Transfer Model (Burn)
// ============================================================
// Cross-aligned autoencoder with two adversarial critics.
//
//   enc_inputs ─embed─▶ GRU encoder ─▶ state[:, dim_y..] = z
//
//   h_ori = [proj(y),     z]      h_tsf = [proj(1 − y), z]
//
//   h_ori ─teacher forcing over dec_inputs─▶ g_logits, cell outputs
//          teach_h = [h_ori ; cell outputs]          (real)
//   h_tsf ─Gumbel-softmax decoding─────────▶ soft_h_tsf (fake)
//
//   Rows 0..B/2 are style 0, rows B/2..B are style 1, so
//     cnn0 judges  real style-0 rows  vs  style-1 rows moved to style 0
//     cnn1 judges  real style-1 rows  vs  style-0 rows moved to style 1
//
//   loss = loss_g − rho · (loss_d0 + loss_d1)
//
// The generator owns every parameter that the generator
// optimizers update (embedder included); each critic is its
// own module so it can be stepped on its own.

use anyhow::{bail, Result};
use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::StyleBatch;
use crate::ml::decoder::{embed_tokens, DecoderOutput, GreedyOutput, RnnDecoder, RnnDecoderConfig};
use crate::ml::discriminator::{Conv1dClassifier, Conv1dClassifierConfig};
use crate::ml::losses::{binary_adversarial_losses, sequence_cross_entropy};
use crate::ml::rnn::{GruCellConfig, RnnEncoder};

const PPL_EPS: f64 = 1e-8;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TsfConfig {
    #[config(default = 10000)]
    pub vocab_size: usize,
    #[config(default = 100)]
    pub embed_dim: usize,
    /// Width of the style part of the decoder state
    #[config(default = 200)]
    pub dim_y: usize,
    /// Width of the latent content code
    #[config(default = 500)]
    pub dim_z: usize,
    #[config(default = 0.5)]
    pub input_keep_prob: f64,
    #[config(default = 0.5)]
    pub output_keep_prob: f64,
    #[config(default = 21)]
    pub max_decoding_length_train: usize,
    #[config(default = 20)]
    pub max_decoding_length_infer: usize,
    #[config(default = 128)]
    pub cnn_filters: usize,
    #[config(default = "vec![3, 4, 5]")]
    pub cnn_kernel_sizes: Vec<usize>,
    #[config(default = 0.5)]
    pub cnn_dropout: f64,
    #[config(default = 2)]
    pub end_token: u32,
}

impl TsfConfig {
    /// Encoder and decoder GRUs share this width: dim_y + dim_z.
    pub fn hidden_size(&self) -> usize {
        self.dim_y + self.dim_z
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Tsf<B> {
        Tsf {
            generator: self.init_generator(device),
            cnn0:      self.init_discriminator(device),
            cnn1:      self.init_discriminator(device),
        }
    }

    pub fn init_generator<B: Backend>(&self, device: &B::Device) -> TsfGenerator<B> {
        let hidden = self.hidden_size();
        let input_dropout = 1.0 - self.input_keep_prob;

        TsfGenerator {
            embedder: EmbeddingConfig::new(self.vocab_size, self.embed_dim).init(device),
            encoder:  RnnEncoder::new(
                GruCellConfig::new(self.embed_dim, hidden)
                    .with_input_dropout(input_dropout)
                    .init(device),
            ),
            label_proj: LinearConfig::new(1, self.dim_y).init(device),
            decoder: RnnDecoderConfig::new(self.embed_dim, hidden, self.vocab_size)
                .with_input_dropout(input_dropout)
                .with_output_dropout(1.0 - self.output_keep_prob)
                .init(device),
            dim_y: self.dim_y,
            max_decoding_length_train: self.max_decoding_length_train,
            max_decoding_length_infer: self.max_decoding_length_infer,
            end_token: self.end_token,
        }
    }

    fn init_discriminator<B: Backend>(&self, device: &B::Device) -> Conv1dClassifier<B> {
        Conv1dClassifierConfig::new(self.hidden_size())
            .with_filters(self.cnn_filters)
            .with_kernel_sizes(self.cnn_kernel_sizes.clone())
            .with_dropout(self.cnn_dropout)
            .init(device)
    }
}

// ─── Modules ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TsfGenerator<B: Backend> {
    pub embedder:   Embedding<B>,
    pub encoder:    RnnEncoder<B>,
    pub label_proj: Linear<B>,
    pub decoder:    RnnDecoder<B>,
    pub dim_y:      usize,
    pub max_decoding_length_train: usize,
    pub max_decoding_length_infer: usize,
    pub end_token:  u32,
}

#[derive(Module, Debug)]
pub struct Tsf<B: Backend> {
    pub generator: TsfGenerator<B>,
    pub cnn0:      Conv1dClassifier<B>,
    pub cnn1:      Conv1dClassifier<B>,
}

// ─── Graph outputs ────────────────────────────────────────────────────────────
/// Decoder states conditioned on the original and the flipped style.
#[derive(Debug, Clone)]
pub struct Latent<B: Backend> {
    /// [batch, hidden]
    pub h_ori: Tensor<B, 2>,
    /// [batch, hidden]
    pub h_tsf: Tensor<B, 2>,
}

/// Teacher-forced reconstruction of the batch.
#[derive(Debug, Clone)]
pub struct Reconstruction<B: Backend> {
    /// [batch, steps, vocab]
    pub g_logits: Tensor<B, 3>,
    /// [batch, steps + 1, hidden] — h_ori followed by the cell outputs
    pub teach_h: Tensor<B, 3>,
    /// Σ token NLL / batch size
    pub loss_g: Tensor<B, 1>,
    /// Σ token NLL / Σ weights
    pub ppl_g: Tensor<B, 1>,
}

#[derive(Debug, Clone)]
pub struct TsfLosses<B: Backend> {
    pub loss:    Tensor<B, 1>,
    pub loss_g:  Tensor<B, 1>,
    pub ppl_g:   Tensor<B, 1>,
    pub loss_d:  Tensor<B, 1>,
    pub loss_d0: Tensor<B, 1>,
    pub loss_d1: Tensor<B, 1>,
}

/// Every named tensor of the graph.
#[derive(Debug, Clone)]
pub struct TsfOutputs<B: Backend> {
    pub h_ori:           Tensor<B, 2>,
    pub h_tsf:           Tensor<B, 2>,
    pub hard_logits_ori: Tensor<B, 3>,
    pub hard_logits_tsf: Tensor<B, 3>,
    pub soft_logits_ori: Tensor<B, 3>,
    pub soft_logits_tsf: Tensor<B, 3>,
    pub g_logits:        Tensor<B, 3>,
    pub teach_h:         Tensor<B, 3>,
    pub soft_h_tsf:      Tensor<B, 3>,
}

/// Reject inputs the graph cannot be built for.
pub fn check_inputs<B: Backend>(batch: &StyleBatch<B>, gamma: f64) -> Result<()> {
    let rows = batch.batch_size();
    if rows < 2 || rows % 2 != 0 {
        bail!("batch must hold an even number (≥ 2) of rows, got {rows}");
    }
    let [enc_rows, _] = batch.enc_inputs.dims();
    let [dec_rows, _] = batch.dec_inputs.dims();
    if enc_rows != rows || dec_rows != rows {
        bail!("label count {rows} does not match input rows ({enc_rows}, {dec_rows})");
    }
    if gamma.is_nan() || gamma <= 0.0 {
        bail!("Gumbel-softmax temperature must be positive, got {gamma}");
    }
    Ok(())
}

impl<B: Backend> TsfGenerator<B> {
    /// Encode the batch and build both initial decoder states.
    pub fn encode(&self, batch: &StyleBatch<B>) -> Latent<B> {
        let state = self.encoder.forward(self.embedder.forward(batch.enc_inputs.clone()));
        let [batch_size, hidden] = state.dims();
        let z = state.slice([0..batch_size, self.dim_y..hidden]);

        let labels  = batch.labels.clone().reshape([batch_size, 1]);
        let flipped = labels.clone().neg().add_scalar(1.0);

        let h_ori = Tensor::cat(vec![self.label_proj.forward(labels),  z.clone()], 1);
        let h_tsf = Tensor::cat(vec![self.label_proj.forward(flipped), z], 1);
        Latent { h_ori, h_tsf }
    }

    pub fn reconstruct(&self, latent: &Latent<B>, batch: &StyleBatch<B>) -> Reconstruction<B> {
        let batch_size = batch.batch_size();
        let DecoderOutput { cell_outputs, logits } = self.decoder.decode_teacher_forced(
            latent.h_ori.clone(),
            self.embedder.forward(batch.dec_inputs.clone()),
        );

        let teach_h = Tensor::cat(vec![latent.h_ori.clone().unsqueeze_dim::<3>(1), cell_outputs], 1);

        let token_loss = sequence_cross_entropy(
            logits.clone(),
            batch.targets.clone(),
            batch.weights.clone(),
        );
        let total  = token_loss.sum();
        let ppl_g  = total.clone() / batch.weights.clone().sum().add_scalar(PPL_EPS);
        let loss_g = total.div_scalar(batch_size as f64);

        Reconstruction { g_logits: logits, teach_h, loss_g, ppl_g }
    }

    fn start_tokens(&self, batch: &StyleBatch<B>) -> Tensor<B, 1, Int> {
        let batch_size = batch.batch_size();
        batch.dec_inputs.clone().slice([0..batch_size, 0..1]).reshape([batch_size])
    }

    /// Gumbel-softmax decoding from `initial_state`, at least as many
    /// steps as the gold decoder inputs.
    pub fn decode_soft(
        &self,
        initial_state: Tensor<B, 2>,
        batch:         &StyleBatch<B>,
        gamma:         f64,
    ) -> DecoderOutput<B> {
        let [_, dec_len] = batch.dec_inputs.dims();
        let steps = dec_len.max(self.max_decoding_length_train);
        self.decoder.decode_gumbel(
            initial_state,
            embed_tokens(&self.embedder, self.start_tokens(batch)),
            self.embedder.weight.val(),
            gamma,
            steps,
        )
    }

    pub fn decode_hard(&self, initial_state: Tensor<B, 2>, batch: &StyleBatch<B>) -> GreedyOutput<B> {
        self.decoder.decode_greedy(
            initial_state,
            self.start_tokens(batch),
            &self.embedder,
            self.end_token,
            self.max_decoding_length_infer,
        )
    }

    /// `[h_tsf ; first `steps` Gumbel cell outputs]`, aligned with teach_h.
    pub fn soft_transfer_states(
        &self,
        latent: &Latent<B>,
        batch:  &StyleBatch<B>,
        gamma:  f64,
    ) -> (Tensor<B, 3>, DecoderOutput<B>) {
        let [batch_size, dec_len] = batch.dec_inputs.dims();
        let soft = self.decode_soft(latent.h_tsf.clone(), batch, gamma);
        let [_, _, hidden] = soft.cell_outputs.dims();

        let aligned    = soft.cell_outputs.clone().slice([0..batch_size, 0..dec_len, 0..hidden]);
        let soft_h_tsf = Tensor::cat(vec![latent.h_tsf.clone().unsqueeze_dim::<3>(1), aligned], 1);
        (soft_h_tsf, soft)
    }
}

impl<B: Backend> Tsf<B> {
    /// Both critics' losses. `teach_h` rows are real, `soft_h_tsf` rows are
    /// transferred; the halves are crossed so each critic sees one style.
    pub fn adversarial_losses(
        &self,
        teach_h:    Tensor<B, 3>,
        soft_h_tsf: Tensor<B, 3>,
    ) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let loss_d0 = self.critic_loss(0, teach_h.clone(), soft_h_tsf.clone());
        let loss_d1 = self.critic_loss(1, teach_h, soft_h_tsf);
        (loss_d0, loss_d1)
    }

    /// Loss of critic `index` (0 or 1) on the crossed halves.
    pub fn critic_loss(&self, index: usize, teach_h: Tensor<B, 3>, soft_h_tsf: Tensor<B, 3>) -> Tensor<B, 1> {
        let [rows, steps, hidden] = teach_h.dims();
        let [_, soft_steps, _]    = soft_h_tsf.dims();
        let half = rows / 2;

        let first  = |t: Tensor<B, 3>, s: usize| t.slice([0..half, 0..s, 0..hidden]);
        let second = |t: Tensor<B, 3>, s: usize| t.slice([half..rows, 0..s, 0..hidden]);

        let (real, fake, critic) = if index == 0 {
            (first(teach_h, steps), second(soft_h_tsf, soft_steps), &self.cnn0)
        } else {
            (second(teach_h, steps), first(soft_h_tsf, soft_steps), &self.cnn1)
        };
        let (_, d_loss) = binary_adversarial_losses(real, fake, critic);
        d_loss
    }

    /// All scalar losses of the graph.
    pub fn losses(&self, batch: &StyleBatch<B>, rho: f64, gamma: f64) -> TsfLosses<B> {
        let latent = self.generator.encode(batch);
        let rec    = self.generator.reconstruct(&latent, batch);
        let (soft_h_tsf, _) = self.generator.soft_transfer_states(&latent, batch, gamma);
        self.combine(rec, soft_h_tsf, rho).0
    }

    fn combine(
        &self,
        rec:        Reconstruction<B>,
        soft_h_tsf: Tensor<B, 3>,
        rho:        f64,
    ) -> (TsfLosses<B>, Reconstruction<B>) {
        let (loss_d0, loss_d1) = self.adversarial_losses(rec.teach_h.clone(), soft_h_tsf);
        let loss_d = loss_d0.clone() + loss_d1.clone();
        let loss   = rec.loss_g.clone() - loss_d.clone().mul_scalar(rho);

        let losses = TsfLosses {
            loss,
            loss_g: rec.loss_g.clone(),
            ppl_g:  rec.ppl_g.clone(),
            loss_d,
            loss_d0,
            loss_d1,
        };
        (losses, rec)
    }

    /// The full graph: every loss and every named output.
    pub fn forward(&self, batch: &StyleBatch<B>, rho: f64, gamma: f64) -> (TsfLosses<B>, TsfOutputs<B>) {
        let generator = &self.generator;
        let latent    = generator.encode(batch);
        let rec       = generator.reconstruct(&latent, batch);

        let soft_ori = generator.decode_soft(latent.h_ori.clone(), batch, gamma);
        let (soft_h_tsf, soft_tsf) = generator.soft_transfer_states(&latent, batch, gamma);
        let hard_ori = generator.decode_hard(latent.h_ori.clone(), batch);
        let hard_tsf = generator.decode_hard(latent.h_tsf.clone(), batch);

        let (losses, rec) = self.combine(rec, soft_h_tsf.clone(), rho);

        let outputs = TsfOutputs {
            h_ori:           latent.h_ori,
            h_tsf:           latent.h_tsf,
            hard_logits_ori: hard_ori.logits,
            hard_logits_tsf: hard_tsf.logits,
            soft_logits_ori: soft_ori.logits,
            soft_logits_tsf: soft_tsf.logits,
            g_logits:        rec.g_logits,
            teach_h:         rec.teach_h,
            soft_h_tsf,
        };
        (losses, outputs)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::batcher::build_batch;
    use crate::domain::sentence::StyleLabel;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    pub(crate) fn tiny_config() -> TsfConfig {
        TsfConfig::new()
            .with_vocab_size(12)
            .with_embed_dim(4)
            .with_dim_y(3)
            .with_dim_z(5)
            .with_cnn_filters(2)
            .with_max_decoding_length_train(7)
            .with_max_decoding_length_infer(6)
    }

    pub(crate) fn tiny_batch<B: Backend>(device: &B::Device) -> StyleBatch<B> {
        let rows = vec![
            (vec![4, 5, 6],          StyleLabel::Style0),
            (vec![7, 8],             StyleLabel::Style0),
            (vec![9, 10, 11, 4, 5],  StyleLabel::Style1),
            (vec![6],                StyleLabel::Style1),
        ];
        build_batch(&rows, None, device)
    }

    #[test]
    fn test_hidden_size_is_style_plus_content() {
        assert_eq!(TsfConfig::new().hidden_size(), 700);
        assert_eq!(tiny_config().hidden_size(), 8);
    }

    #[test]
    fn test_latent_states_share_the_content_code() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);
        let batch  = tiny_batch::<TestBackend>(&device);

        let latent = model.generator.encode(&batch);
        assert_eq!(latent.h_ori.dims(), [4, 8]);
        assert_eq!(latent.h_tsf.dims(), [4, 8]);

        let z_ori = latent.h_ori.clone().slice([0..4, 3..8]);
        let z_tsf = latent.h_tsf.clone().slice([0..4, 3..8]);
        let diff  = (z_ori - z_tsf).abs().max().into_scalar().elem::<f32>();
        assert!(diff < 1e-6);

        // style parts differ because the labels were flipped
        let y_ori = latent.h_ori.slice([0..4, 0..3]);
        let y_tsf = latent.h_tsf.slice([0..4, 0..3]);
        let gap   = (y_ori - y_tsf).abs().sum().into_scalar().elem::<f32>();
        assert!(gap > 0.0);
    }

    #[test]
    fn test_forward_output_shapes() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);
        let batch  = tiny_batch::<TestBackend>(&device);
        // longest sentence 5 → dec length 6
        let (_, out) = model.forward(&batch, 1.0, 0.5);

        assert_eq!(out.g_logits.dims(),        [4, 6, 12]);
        assert_eq!(out.teach_h.dims(),         [4, 7, 8]);
        assert_eq!(out.soft_h_tsf.dims(),      [4, 7, 8]);
        // max(6, max_decoding_length_train = 7)
        assert_eq!(out.soft_logits_ori.dims(), [4, 7, 12]);
        assert_eq!(out.soft_logits_tsf.dims(), [4, 7, 12]);
        let [rows, steps, vocab] = out.hard_logits_tsf.dims();
        assert_eq!((rows, vocab), (4, 12));
        assert!(steps <= 6);
    }

    #[test]
    fn test_total_loss_combines_terms() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);
        let batch  = tiny_batch::<TestBackend>(&device);
        let rho    = 0.5;

        let l = model.losses(&batch, rho, 1.0);
        let v = |t: Tensor<TestBackend, 1>| t.into_scalar().elem::<f64>();
        let (loss, loss_g, ppl_g, loss_d, d0, d1) =
            (v(l.loss), v(l.loss_g), v(l.ppl_g), v(l.loss_d), v(l.loss_d0), v(l.loss_d1));

        assert!((loss_d - (d0 + d1)).abs() < 1e-5);
        assert!((loss - (loss_g - rho * loss_d)).abs() < 1e-4);
        assert!(loss_g > 0.0 && ppl_g > 0.0);
        // 4 rows, 15 weighted tokens: loss_g = Σ/4, ppl_g = Σ/15
        assert!((loss_g * 4.0 / 15.0 - ppl_g).abs() < 1e-3);
    }

    #[test]
    fn test_check_inputs() {
        let device = Default::default();
        let batch  = tiny_batch::<TestBackend>(&device);
        assert!(check_inputs(&batch, 0.5).is_ok());
        assert!(check_inputs(&batch, 0.0).is_err());

        let odd = build_batch::<TestBackend>(&[(vec![4], StyleLabel::Style0)], None, &device);
        assert!(check_inputs(&odd, 1.0).is_err());
    }
}
