// ============================================================
// Layer 5 — Convolutional Discriminator
// ============================================================
// Scores a sequence of decoder hidden states as "real"
// (teacher-forced on an actual sentence of this style) or
// "fake" (free-running Gumbel decoding of a sentence
// transferred from the other style).
//
//   [batch, steps, hidden]
//        │ swap to channels-first
//        ▼
//   Conv1d (k=3) ─┐
//   Conv1d (k=4) ─┼─ ReLU → max over time → concat
//   Conv1d (k=5) ─┘
//        │
//        ▼ dropout → dense
//   [batch, 1] logit
//
// Each bank pads by k/2 so every kernel fits even on very short
// sequences; the global max-pool makes the output length-free.

use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d,
    },
    prelude::*,
    tensor::activation,
};

#[derive(Config, Debug)]
pub struct Conv1dClassifierConfig {
    /// Channels of the input sequence (decoder hidden size)
    pub input_size: usize,
    #[config(default = 128)]
    pub filters: usize,
    #[config(default = "vec![3, 4, 5]")]
    pub kernel_sizes: Vec<usize>,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl Conv1dClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Conv1dClassifier<B> {
        let convs = self
            .kernel_sizes
            .iter()
            .map(|&k| {
                Conv1dConfig::new(self.input_size, self.filters, k)
                    .with_padding(PaddingConfig1d::Explicit(k / 2))
                    .init(device)
            })
            .collect();

        Conv1dClassifier {
            convs,
            dropout: DropoutConfig::new(self.dropout).init(),
            logit:   LinearConfig::new(self.filters * self.kernel_sizes.len(), 1).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Conv1dClassifier<B: Backend> {
    pub convs:   Vec<Conv1d<B>>,
    pub dropout: Dropout,
    pub logit:   Linear<B>,
}

impl<B: Backend> Conv1dClassifier<B> {
    /// inputs: [batch, steps, channels] → logits [batch, 1]
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, _, _] = inputs.dims();
        let x = inputs.swap_dims(1, 2);

        let pooled: Vec<Tensor<B, 2>> = self
            .convs
            .iter()
            .map(|conv| {
                let features = activation::relu(conv.forward(x.clone()));
                let [_, filters, _] = features.dims();
                features.max_dim(2).reshape([batch_size, filters])
            })
            .collect();

        let features = self.dropout.forward(Tensor::cat(pooled, 1));
        self.logit.forward(features)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_one_logit_per_row() {
        let device = Default::default();
        let cnn    = Conv1dClassifierConfig::new(6)
            .with_filters(4)
            .init::<TestBackend>(&device);
        assert_eq!(cnn.convs.len(), 3);

        let logits = cnn.forward(Tensor::ones([5, 9, 6], &device));
        assert_eq!(logits.dims(), [5, 1]);
    }

    #[test]
    fn test_accepts_sequences_shorter_than_the_widest_kernel() {
        let device = Default::default();
        let cnn    = Conv1dClassifierConfig::new(3)
            .with_filters(2)
            .init::<TestBackend>(&device);
        let logits = cnn.forward(Tensor::ones([2, 1, 3], &device));
        assert_eq!(logits.dims(), [2, 1]);
    }
}
