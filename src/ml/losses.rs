// ============================================================
// Layer 5 — Loss Functions
// ============================================================
// Two losses drive the whole model:
//
//   sequence_cross_entropy     — per-token reconstruction NLL,
//                                masked by the target weights
//   binary_adversarial_losses  — sigmoid cross-entropy of a
//                                discriminator on real vs fake
//                                hidden-state sequences

use burn::{
    nn::loss::BinaryCrossEntropyLossConfig,
    prelude::*,
    tensor::activation,
};

use crate::ml::discriminator::Conv1dClassifier;

/// logits [batch, steps, vocab], targets/weights [batch, steps]
/// → weighted negative log-likelihood per token [batch, steps]
pub fn sequence_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 2> {
    let [batch_size, steps] = targets.dims();
    let log_probs = activation::log_softmax(logits, 2);
    let picked    = log_probs.gather(2, targets.unsqueeze_dim::<3>(2));
    picked.reshape([batch_size, steps]).neg() * weights
}

/// Returns `(generator_loss, discriminator_loss)`.
///
///   discriminator_loss = BCE(D(real), 1) + BCE(D(fake), 0)
///   generator_loss     = BCE(D(fake), 1)
pub fn binary_adversarial_losses<B: Backend>(
    real:          Tensor<B, 3>,
    fake:          Tensor<B, 3>,
    discriminator: &Conv1dClassifier<B>,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let device      = real.device();
    let real_logits = discriminator.forward(real);
    let fake_logits = discriminator.forward(fake);

    let bce = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&device);

    let real_ones  = Tensor::<B, 2, Int>::ones(real_logits.dims(), &device);
    let fake_zeros = Tensor::<B, 2, Int>::zeros(fake_logits.dims(), &device);
    let fake_ones  = Tensor::<B, 2, Int>::ones(fake_logits.dims(), &device);

    let d_loss = bce.forward(real_logits, real_ones)
        + bce.forward(fake_logits.clone(), fake_zeros);
    let g_loss = bce.forward(fake_logits, fake_ones);

    (g_loss, d_loss)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::discriminator::Conv1dClassifierConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 3>::zeros([2, 3, 8], &device);
        let targets = Tensor::<TestBackend, 2, Int>::ones([2, 3], &device);
        let weights = Tensor::<TestBackend, 2>::ones([2, 3], &device);

        let loss   = sequence_cross_entropy(logits, targets, weights);
        let values = loss.into_data().to_vec::<f32>().unwrap();
        for v in values {
            assert!((v - (8.0f32).ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_weight_masks_the_token() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 3>::random(
            [1, 2, 5], burn::tensor::Distribution::Normal(0.0, 1.0), &device,
        );
        let targets = Tensor::<TestBackend, 2, Int>::zeros([1, 2], &device);
        let weights = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0], [1, 2]), &device,
        );

        let values = sequence_cross_entropy(logits, targets, weights)
            .into_data().to_vec::<f32>().unwrap();
        assert!(values[0] > 0.0);
        assert_eq!(values[1], 0.0);
    }

    #[test]
    fn test_adversarial_losses_are_positive() {
        let device = Default::default();
        let cnn    = Conv1dClassifierConfig::new(4).with_filters(3).init::<TestBackend>(&device);
        let real   = Tensor::<TestBackend, 3>::ones([2, 6, 4], &device);
        let fake   = Tensor::<TestBackend, 3>::zeros([2, 6, 4], &device);

        let (g, d) = binary_adversarial_losses(real, fake, &cnn);
        let g = g.into_scalar().elem::<f32>();
        let d = d.into_scalar().elem::<f32>();
        assert!(g > 0.0 && g.is_finite());
        // two BCE terms, each > 0
        assert!(d > 0.0 && d.is_finite());
    }
}
