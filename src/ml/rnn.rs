// ============================================================
// Layer 5 — Recurrent Building Blocks
// ============================================================
// A GRU cell that can be stepped one token at a time (the
// decoders feed their own predictions back in, so the whole
// sequence is not known up front) and an encoder that unrolls
// it over an embedded sentence.
//
// Cell update (gate biases start at 1.0 so the cell initially
// keeps most of its state):
//
//   [r, u] = σ(W_g · [x, h] + b_g)
//   c      = tanh(W_c · [x, r ⊙ h] + b_c)
//   h'     = u ⊙ h + (1 − u) ⊙ c
//
// Dropout is applied to the cell input at every step.

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

#[derive(Config, Debug)]
pub struct GruCellConfig {
    pub input_size:  usize,
    pub hidden_size: usize,
    /// Probability of zeroing an input unit (1 - input keep prob)
    #[config(default = 0.0)]
    pub input_dropout: f64,
}

impl GruCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruCell<B> {
        let mut gates = LinearConfig::new(self.input_size + self.hidden_size, 2 * self.hidden_size)
            .init(device);
        gates.bias = Some(Param::from_tensor(Tensor::ones([2 * self.hidden_size], device)));

        let candidate = LinearConfig::new(self.input_size + self.hidden_size, self.hidden_size)
            .init(device);

        GruCell {
            gates,
            candidate,
            input_dropout: DropoutConfig::new(self.input_dropout).init(),
            hidden_size:   self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    pub gates:         Linear<B>,
    pub candidate:     Linear<B>,
    pub input_dropout: Dropout,
    pub hidden_size:   usize,
}

impl<B: Backend> GruCell<B> {
    /// x: [batch, input_size], h: [batch, hidden] → [batch, hidden]
    pub fn step(&self, x: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, _] = h.dims();
        let hs = self.hidden_size;

        let x = self.input_dropout.forward(x);
        let gates = activation::sigmoid(
            self.gates.forward(Tensor::cat(vec![x.clone(), h.clone()], 1)),
        );
        let r = gates.clone().slice([0..batch_size, 0..hs]);
        let u = gates.slice([0..batch_size, hs..2 * hs]);

        let c = activation::tanh(
            self.candidate.forward(Tensor::cat(vec![x, r * h.clone()], 1)),
        );

        u.clone() * h + u.neg().add_scalar(1.0) * c
    }

    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        Tensor::zeros([batch_size, self.hidden_size], device)
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct RnnEncoder<B: Backend> {
    pub cell: GruCell<B>,
}

impl<B: Backend> RnnEncoder<B> {
    pub fn new(cell: GruCell<B>) -> Self {
        Self { cell }
    }

    /// inputs: [batch, seq_len, input_size] → final state [batch, hidden]
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, seq_len, input_size] = inputs.dims();
        let mut h = self.cell.zero_state(batch_size, &inputs.device());

        for t in 0..seq_len {
            let x_t = inputs
                .clone()
                .slice([0..batch_size, t..t + 1, 0..input_size])
                .reshape([batch_size, input_size]);
            h = self.cell.step(x_t, h);
        }
        h
    }
}
