// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here.
//
//   rnn.rs           — GRU cell with per-step control and the
//                      sequence encoder built on it
//   decoder.rs       — Style-conditioned decoder: teacher-forced,
//                      Gumbel-softmax and greedy decoding
//   discriminator.rs — Convolutional sentence classifier (critic)
//   losses.rs        — Masked sequence cross-entropy and the
//                      binary adversarial losses
//   model.rs         — TsfConfig, the generator and the full
//                      model with its named outputs
//   trainer.rs       — Four optimizers, the step functions and
//                      the pretrain → adversarial schedule
//   inferencer.rs    — Checkpoint loading and greedy transfer
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Shen et al. (2017) Style Transfer from Non-Parallel
//            Text by Cross-Alignment
//            Jang et al. (2017) Categorical Reparameterization
//            with Gumbel-Softmax

pub mod rnn;

pub mod decoder;

pub mod discriminator;

pub mod losses;

/// Generator, critics and the combined losses
pub mod model;

/// Step functions and the training loop
pub mod trainer;

/// Greedy style transfer from a checkpoint
pub mod inferencer;
