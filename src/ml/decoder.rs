// ============================================================
// Layer 5 — Style-Conditioned Decoder
// ============================================================
// One GRU cell plus an output layer (dropout → dense over the
// vocabulary), driven three different ways with shared weights:
//
//   teacher forcing  — the gold previous token is fed back
//                      (reconstruction loss)
//   Gumbel-softmax   — a relaxed one-hot sample is fed back as a
//                      weighted mix of embeddings, so gradients
//                      reach the decoder through generated text
//                      (adversarial signal)
//   greedy           — the argmax token is fed back
//                      (actual transfer at inference time)
//
// The initial state always comes from the generator: the
// projected style label concatenated with the latent code.

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, Linear, LinearConfig},
    prelude::*,
    tensor::{activation, Distribution},
};

use crate::ml::rnn::{GruCell, GruCellConfig};

const GUMBEL_EPS: f64 = 1e-20;

#[derive(Config, Debug)]
pub struct RnnDecoderConfig {
    pub embed_dim:   usize,
    pub hidden_size: usize,
    pub vocab_size:  usize,
    #[config(default = 0.0)]
    pub input_dropout: f64,
    #[config(default = 0.0)]
    pub output_dropout: f64,
}

impl RnnDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnDecoder<B> {
        RnnDecoder {
            cell: GruCellConfig::new(self.embed_dim, self.hidden_size)
                .with_input_dropout(self.input_dropout)
                .init(device),
            output_dropout: DropoutConfig::new(self.output_dropout).init(),
            softmax_proj:   LinearConfig::new(self.hidden_size, self.vocab_size).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct RnnDecoder<B: Backend> {
    pub cell:           GruCell<B>,
    pub output_dropout: Dropout,
    pub softmax_proj:   Linear<B>,
}

/// Per-step cell outputs and vocabulary logits.
#[derive(Debug, Clone)]
pub struct DecoderOutput<B: Backend> {
    /// [batch, steps, hidden]
    pub cell_outputs: Tensor<B, 3>,
    /// [batch, steps, vocab]
    pub logits: Tensor<B, 3>,
}

/// Greedy decoding also reports the chosen tokens.
#[derive(Debug, Clone)]
pub struct GreedyOutput<B: Backend> {
    pub cell_outputs: Tensor<B, 3>,
    pub logits:       Tensor<B, 3>,
    /// [batch, steps]
    pub sample_ids: Tensor<B, 2, Int>,
}

impl<B: Backend> RnnDecoder<B> {
    fn project<const D: usize>(&self, h: Tensor<B, D>) -> Tensor<B, D> {
        self.softmax_proj.forward(self.output_dropout.forward(h))
    }

    /// Feed the gold inputs. `inputs`: [batch, steps, embed_dim].
    pub fn decode_teacher_forced(
        &self,
        initial_state: Tensor<B, 2>,
        inputs:        Tensor<B, 3>,
    ) -> DecoderOutput<B> {
        let [batch_size, steps, embed_dim] = inputs.dims();
        let mut h       = initial_state;
        let mut outputs = Vec::with_capacity(steps);

        for t in 0..steps {
            let x_t = inputs
                .clone()
                .slice([0..batch_size, t..t + 1, 0..embed_dim])
                .reshape([batch_size, embed_dim]);
            h = self.cell.step(x_t, h);
            outputs.push(h.clone());
        }

        let cell_outputs = Tensor::stack::<3>(outputs, 1);
        let logits       = self.project(cell_outputs.clone());
        DecoderOutput { cell_outputs, logits }
    }

    /// Feed back a Gumbel-softmax relaxed sample at temperature `gamma`
    /// for exactly `steps` steps. `embedding`: [vocab, embed_dim].
    pub fn decode_gumbel(
        &self,
        initial_state: Tensor<B, 2>,
        start_inputs:  Tensor<B, 2>,
        embedding:     Tensor<B, 2>,
        gamma:         f64,
        steps:         usize,
    ) -> DecoderOutput<B> {
        let mut h       = initial_state;
        let mut x       = start_inputs;
        let mut outputs = Vec::with_capacity(steps);
        let mut logits  = Vec::with_capacity(steps);

        for _ in 0..steps {
            h = self.cell.step(x, h);
            let step_logits = self.project(h.clone());
            let soft        = gumbel_softmax(step_logits.clone(), gamma);
            x = soft.matmul(embedding.clone());

            outputs.push(h.clone());
            logits.push(step_logits);
        }

        DecoderOutput {
            cell_outputs: Tensor::stack::<3>(outputs, 1),
            logits:       Tensor::stack::<3>(logits, 1),
        }
    }

    /// Feed back the argmax token. Stops after `max_steps` steps or
    /// once every row has produced `end_token`.
    pub fn decode_greedy(
        &self,
        initial_state: Tensor<B, 2>,
        start_tokens:  Tensor<B, 1, Int>,
        embedder:      &Embedding<B>,
        end_token:     u32,
        max_steps:     usize,
    ) -> GreedyOutput<B> {
        let [batch_size] = start_tokens.dims();
        let device       = start_tokens.device();

        let mut h        = initial_state;
        let mut x        = embed_tokens(embedder, start_tokens);
        let mut finished = Tensor::<B, 1, Int>::zeros([batch_size], &device);
        let mut outputs  = Vec::with_capacity(max_steps);
        let mut logits   = Vec::with_capacity(max_steps);
        let mut ids      = Vec::with_capacity(max_steps);

        for _ in 0..max_steps.max(1) {
            h = self.cell.step(x, h);
            let step_logits = self.project(h.clone());
            let step_ids    = step_logits.clone().argmax(1).reshape([batch_size]);

            finished = (finished + step_ids.clone().equal_elem(end_token as i64).int())
                .clamp_max(1);
            x = embed_tokens(embedder, step_ids.clone());

            outputs.push(h.clone());
            logits.push(step_logits);
            ids.push(step_ids);

            let done = finished.clone().sum().into_scalar().elem::<i64>();
            if done as usize == batch_size {
                break;
            }
        }

        GreedyOutput {
            cell_outputs: Tensor::stack::<3>(outputs, 1),
            logits:       Tensor::stack::<3>(logits, 1),
            sample_ids:   Tensor::stack::<2>(ids, 1),
        }
    }
}

/// [batch] token ids → [batch, embed_dim]
pub fn embed_tokens<B: Backend>(embedder: &Embedding<B>, ids: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    let [batch_size] = ids.dims();
    let embedded     = embedder.forward(ids.reshape([batch_size, 1]));
    let [_, _, dim]  = embedded.dims();
    embedded.reshape([batch_size, dim])
}

/// softmax((logits + g) / tau) with g = −log(−log(U + ε) + ε), U ~ U(0, 1).
pub fn gumbel_softmax<B: Backend>(logits: Tensor<B, 2>, tau: f64) -> Tensor<B, 2> {
    let noise = Tensor::<B, 2>::random(
        logits.shape(),
        Distribution::Uniform(0.0, 1.0),
        &logits.device(),
    )
    .add_scalar(GUMBEL_EPS)
    .log()
    .neg()
    .add_scalar(GUMBEL_EPS)
    .log()
    .neg();

    activation::softmax((logits + noise).div_scalar(tau), 1)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, module::Param, nn::EmbeddingConfig, tensor::TensorData};

    type TestBackend = NdArray;

    fn decoder(device: &<TestBackend as Backend>::Device) -> RnnDecoder<TestBackend> {
        RnnDecoderConfig::new(3, 4, 9).init(device)
    }

    #[test]
    fn test_teacher_forced_shapes() {
        let device = Default::default();
        let dec    = decoder(&device);
        let out    = dec.decode_teacher_forced(
            Tensor::zeros([2, 4], &device),
            Tensor::ones([2, 5, 3], &device),
        );
        assert_eq!(out.cell_outputs.dims(), [2, 5, 4]);
        assert_eq!(out.logits.dims(),       [2, 5, 9]);
    }

    #[test]
    fn test_gumbel_runs_exactly_the_requested_steps() {
        let device   = Default::default();
        let dec      = decoder(&device);
        let embedder = EmbeddingConfig::new(9, 3).init::<TestBackend>(&device);
        let out = dec.decode_gumbel(
            Tensor::zeros([2, 4], &device),
            Tensor::zeros([2, 3], &device),
            embedder.weight.val(),
            0.5,
            6,
        );
        assert_eq!(out.cell_outputs.dims(), [2, 6, 4]);
        assert_eq!(out.logits.dims(),       [2, 6, 9]);
    }

    #[test]
    fn test_gumbel_softmax_is_a_distribution() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::random([4, 10], Distribution::Normal(0.0, 1.0), &device);
        let soft   = gumbel_softmax(logits, 0.1);
        let sums   = soft.clone().sum_dim(1).into_data().to_vec::<f32>().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-4);
        }
        let values = soft.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| *v >= 0.0 && v.is_finite()));
    }

    #[test]
    fn test_greedy_respects_max_steps() {
        let device   = Default::default();
        let dec      = decoder(&device);
        let embedder = EmbeddingConfig::new(9, 3).init::<TestBackend>(&device);
        let out = dec.decode_greedy(
            Tensor::zeros([3, 4], &device),
            Tensor::<TestBackend, 1, Int>::ones([3], &device),
            &embedder,
            2,
            4,
        );
        let [batch, steps] = out.sample_ids.dims();
        assert_eq!(batch, 3);
        assert!(steps >= 1 && steps <= 4);
        assert_eq!(out.logits.dims(), [3, steps, 9]);
    }

    #[test]
    fn test_greedy_stops_once_every_row_emits_end_token() {
        let device  = Default::default();
        let mut dec = decoder(&device);
        // Zero weights and a bias peaked at id 2 make every row pick <eos> first.
        let mut bias = vec![0.0f32; 9];
        bias[2] = 10.0;
        dec.softmax_proj.weight = Param::from_tensor(Tensor::zeros([4, 9], &device));
        dec.softmax_proj.bias   = Some(Param::from_tensor(Tensor::from_data(TensorData::new(bias, [9]), &device)));

        let embedder = EmbeddingConfig::new(9, 3).init::<TestBackend>(&device);
        let out = dec.decode_greedy(
            Tensor::zeros([3, 4], &device),
            Tensor::<TestBackend, 1, Int>::ones([3], &device),
            &embedder,
            2,
            5,
        );
        assert_eq!(out.sample_ids.dims(), [3, 1]);
        assert_eq!(out.logits.dims(),     [3, 1, 9]);
        assert_eq!(out.sample_ids.into_data().to_vec::<i64>().unwrap(), vec![2, 2, 2]);
    }
}
