// ============================================================
// Layer 4 — Train/Dev Splitter
// ============================================================
// Only used when no dev corpus prefix is given: a slice of the
// training sentences is held out so that the best epoch can
// still be chosen on unseen data.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with a fixed seed and split into (train, dev).
///
/// `train_fraction` is clamped into `[0, 1]`.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let split_at = split_at.min(total);

    let dev = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} dev",
        samples.len(),
        dev.len(),
    );

    (samples, dev)
}
