// ============================================================
// Layer 5 — Training-Step Orchestration
// ============================================================
// Four Adam optimizers over three parameter groups:
//
//   optimizer_all  loss   = loss_g − rho·loss_d   → generator
//   optimizer_ae   loss_g                         → generator
//   optimizer_d0   loss_d0                        → cnn0
//   optimizer_d1   loss_d1                        → cnn1
//
// Each step function runs the part of the graph it needs and
// applies exactly one optimizer. Critic steps detach the
// generator's hidden states, so no gradient reaches it.
//
// Schedule (run_training):
//   epochs 1..=pretrain_epochs   train_ae_step only
//   later epochs, per batch      train_d0_step, train_d1_step, then
//                                train_g_step if both critic losses
//                                are below disc_threshold, otherwise
//                                train_ae_step
//   after each adversarial epoch gamma ← max(gamma_min, gamma·decay)
//
// Evaluation and decoding run on model.valid(), i.e. the inner
// backend: no autodiff graph and dropout disabled.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::{StyleBatch, StyleBatcher}, dataset::StylePairDataset};
use crate::infra::{checkpoint::CheckpointManager, metrics::{EpochMetrics, MetricsLogger}};
use crate::ml::discriminator::Conv1dClassifier;
use crate::ml::model::{check_inputs, Tsf, TsfGenerator, TsfLosses};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Temperature used by `decode_step_soft` when none is given.
pub const DEFAULT_SOFT_GAMMA: f64 = 0.01;

/// Feed values that are not part of the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Weight of the adversarial term
    pub rho: f64,
    /// Gumbel-softmax temperature
    pub gamma: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeneratorStepLosses {
    pub loss:   f64,
    pub loss_g: f64,
    pub ppl_g:  f64,
    pub loss_d: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvalLosses {
    pub loss:    f64,
    pub loss_g:  f64,
    pub ppl_g:   f64,
    pub loss_d:  f64,
    pub loss_d0: f64,
    pub loss_d1: f64,
}

fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

impl<B: Backend> From<&TsfLosses<B>> for GeneratorStepLosses {
    fn from(l: &TsfLosses<B>) -> Self {
        Self {
            loss:   scalar(&l.loss),
            loss_g: scalar(&l.loss_g),
            ppl_g:  scalar(&l.ppl_g),
            loss_d: scalar(&l.loss_d),
        }
    }
}

impl<B: Backend> From<&TsfLosses<B>> for EvalLosses {
    fn from(l: &TsfLosses<B>) -> Self {
        Self {
            loss:    scalar(&l.loss),
            loss_g:  scalar(&l.loss_g),
            ppl_g:   scalar(&l.ppl_g),
            loss_d:  scalar(&l.loss_d),
            loss_d0: scalar(&l.loss_d0),
            loss_d1: scalar(&l.loss_d1),
        }
    }
}

/// Greedy decoding logits, [batch, steps, vocab] each.
#[derive(Debug, Clone)]
pub struct HardDecode<B: Backend> {
    pub logits_ori: Tensor<B, 3>,
    pub logits_tsf: Tensor<B, 3>,
}

/// Gumbel decoding logits plus the teacher-forced logits.
#[derive(Debug, Clone)]
pub struct SoftDecode<B: Backend> {
    pub logits_ori: Tensor<B, 3>,
    pub logits_tsf: Tensor<B, 3>,
    pub g_logits:   Tensor<B, 3>,
}

#[derive(Debug, Clone, Copy)]
enum Objective {
    /// loss_g − rho·loss_d
    Adversarial,
    /// loss_g alone
    Reconstruction,
}

// ─── TsfTrainer ───────────────────────────────────────────────────────────────
pub struct TsfTrainer<B, OG, OD>
where
    B:  AutodiffBackend,
    OG: Optimizer<TsfGenerator<B>, B>,
    OD: Optimizer<Conv1dClassifier<B>, B>,
{
    model:         Tsf<B>,
    optimizer_all: OG,
    optimizer_ae:  OG,
    optimizer_d0:  OD,
    optimizer_d1:  OD,
    learning_rate: f64,
}

impl<B, OG, OD> TsfTrainer<B, OG, OD>
where
    B:  AutodiffBackend,
    OG: Optimizer<TsfGenerator<B>, B>,
    OD: Optimizer<Conv1dClassifier<B>, B>,
{
    pub fn new(
        model:         Tsf<B>,
        optimizer_all: OG,
        optimizer_ae:  OG,
        optimizer_d0:  OD,
        optimizer_d1:  OD,
        learning_rate: f64,
    ) -> Self {
        Self { model, optimizer_all, optimizer_ae, optimizer_d0, optimizer_d1, learning_rate }
    }

    pub fn model(&self) -> &Tsf<B> {
        &self.model
    }

    /// Update cnn0 on real style-0 rows vs rows transferred into style 0.
    pub fn train_d0_step(&mut self, batch: &StyleBatch<B>, params: StepParams) -> Result<f64> {
        self.train_critic_step(0, batch, params)
    }

    /// Update cnn1 on real style-1 rows vs rows transferred into style 1.
    pub fn train_d1_step(&mut self, batch: &StyleBatch<B>, params: StepParams) -> Result<f64> {
        self.train_critic_step(1, batch, params)
    }

    /// Update the generator on `loss_g − rho·loss_d`.
    pub fn train_g_step(&mut self, batch: &StyleBatch<B>, params: StepParams) -> Result<GeneratorStepLosses> {
        self.train_generator_step(Objective::Adversarial, batch, params)
    }

    /// Update the generator on the reconstruction loss only.
    pub fn train_ae_step(&mut self, batch: &StyleBatch<B>, params: StepParams) -> Result<GeneratorStepLosses> {
        self.train_generator_step(Objective::Reconstruction, batch, params)
    }

    fn train_critic_step(&mut self, index: usize, batch: &StyleBatch<B>, params: StepParams) -> Result<f64> {
        check_inputs(batch, params.gamma)?;

        let generator = &self.model.generator;
        let latent    = generator.encode(batch);
        let rec       = generator.reconstruct(&latent, batch);
        let (soft_h_tsf, _) = generator.soft_transfer_states(&latent, batch, params.gamma);

        let loss  = self.model.critic_loss(index, rec.teach_h.detach(), soft_h_tsf.detach());
        let value = scalar(&loss);
        let grads = loss.backward();

        if index == 0 {
            let grads = GradientsParams::from_grads(grads, &self.model.cnn0);
            self.model.cnn0 = self.optimizer_d0.step(self.learning_rate, self.model.cnn0.clone(), grads);
        } else {
            let grads = GradientsParams::from_grads(grads, &self.model.cnn1);
            self.model.cnn1 = self.optimizer_d1.step(self.learning_rate, self.model.cnn1.clone(), grads);
        }
        Ok(value)
    }

    fn train_generator_step(
        &mut self,
        objective: Objective,
        batch:     &StyleBatch<B>,
        params:    StepParams,
    ) -> Result<GeneratorStepLosses> {
        check_inputs(batch, params.gamma)?;

        let losses  = self.model.losses(batch, params.rho, params.gamma);
        let summary = GeneratorStepLosses::from(&losses);

        let (target, optimizer) = match objective {
            Objective::Adversarial    => (losses.loss,   &mut self.optimizer_all),
            Objective::Reconstruction => (losses.loss_g, &mut self.optimizer_ae),
        };
        let grads = GradientsParams::from_grads(target.backward(), &self.model.generator);
        self.model.generator = optimizer.step(self.learning_rate, self.model.generator.clone(), grads);

        Ok(summary)
    }

    /// All losses with dropout off and no parameter update.
    pub fn eval_step(&self, batch: &StyleBatch<B::InnerBackend>, params: StepParams) -> Result<EvalLosses> {
        check_inputs(batch, params.gamma)?;
        let model = self.model.valid();
        Ok(EvalLosses::from(&model.losses(batch, params.rho, params.gamma)))
    }

    /// Greedy decoding logits for the original and the flipped style.
    pub fn decode_step(&self, batch: &StyleBatch<B::InnerBackend>) -> HardDecode<B::InnerBackend> {
        let generator = self.model.generator.valid();
        let latent    = generator.encode(batch);
        HardDecode {
            logits_ori: generator.decode_hard(latent.h_ori, batch).logits,
            logits_tsf: generator.decode_hard(latent.h_tsf, batch).logits,
        }
    }

    /// Gumbel decoding logits for both styles plus the reconstruction
    /// logits (`gamma` defaults to DEFAULT_SOFT_GAMMA).
    pub fn decode_step_soft(
        &self,
        batch: &StyleBatch<B::InnerBackend>,
        gamma: Option<f64>,
    ) -> Result<SoftDecode<B::InnerBackend>> {
        let gamma = gamma.unwrap_or(DEFAULT_SOFT_GAMMA);
        if gamma.is_nan() || gamma <= 0.0 {
            bail!("Gumbel-softmax temperature must be positive, got {gamma}");
        }

        let generator = self.model.generator.valid();
        let latent    = generator.encode(batch);
        let rec       = generator.reconstruct(&latent, batch);
        Ok(SoftDecode {
            logits_ori: generator.decode_soft(latent.h_ori.clone(), batch, gamma).logits,
            logits_tsf: generator.decode_soft(latent.h_tsf, batch, gamma).logits,
            g_logits:   rec.g_logits,
        })
    }
}

// ─── Training loop ────────────────────────────────────────────────────────────
/// What a finished run reports back to the use case.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub epochs:        usize,
    pub steps:         usize,
    /// Batches on which the generator took the adversarial update
    pub adversarial_steps: usize,
    pub final_gamma:   f64,
    pub best_epoch:    Option<usize>,
    pub best_dev_loss: Option<f64>,
}

/// Running sums for one epoch.
#[derive(Debug, Default)]
struct EpochTotals {
    generator: GeneratorStepLosses,
    generator_steps: usize,
    adversarial_steps: usize,
    loss_d0: f64,
    loss_d1: f64,
    critic_steps: usize,
}

impl EpochTotals {
    fn add_generator(&mut self, l: GeneratorStepLosses, adversarial: bool) {
        self.generator.loss   += l.loss;
        self.generator.loss_g += l.loss_g;
        self.generator.ppl_g  += l.ppl_g;
        self.generator.loss_d += l.loss_d;
        self.generator_steps  += 1;
        if adversarial {
            self.adversarial_steps += 1;
        }
    }

    fn add_critics(&mut self, d0: f64, d1: f64) {
        self.loss_d0 += d0;
        self.loss_d1 += d1;
        self.critic_steps += 1;
    }

    fn mean(sum: f64, n: usize) -> f64 {
        if n > 0 { sum / n as f64 } else { f64::NAN }
    }

    fn generator_mean(&self) -> GeneratorStepLosses {
        let n = self.generator_steps;
        GeneratorStepLosses {
            loss:   Self::mean(self.generator.loss, n),
            loss_g: Self::mean(self.generator.loss_g, n),
            ppl_g:  Self::mean(self.generator.ppl_g, n),
            loss_d: Self::mean(self.generator.loss_d, n),
        }
    }
}

pub fn run_training(
    cfg:          &TrainConfig,
    train:        StylePairDataset,
    dev:          Option<StylePairDataset>,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
) -> Result<TrainingSummary> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(cfg, train, dev, ckpt_manager, metrics, device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    train:        StylePairDataset,
    dev:          Option<StylePairDataset>,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
    device:       B::Device,
) -> Result<TrainingSummary> {
    cfg.validate()?;
    B::seed(cfg.seed);

    // ── Model and the four optimizers ─────────────────────────────────────────
    let model_cfg = cfg.model_config();
    let model: Tsf<B> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: vocab={}, hidden={} (dim_y={}, dim_z={})",
        model_cfg.vocab_size, model_cfg.hidden_size(), model_cfg.dim_y, model_cfg.dim_z,
    );

    let adam = AdamConfig::new()
        .with_beta_1(cfg.beta1 as f32)
        .with_beta_2(cfg.beta2 as f32)
        .with_epsilon(1e-8);
    let mut trainer = TsfTrainer::new(
        model,
        adam.init::<B, TsfGenerator<B>>(),
        adam.init::<B, TsfGenerator<B>>(),
        adam.init::<B, Conv1dClassifier<B>>(),
        adam.init::<B, Conv1dClassifier<B>>(),
        cfg.lr,
    );

    // ── Data loaders: pairs per batch = rows / 2 ──────────────────────────────
    let pairs_per_batch = cfg.batch_size / 2;
    let train_loader = DataLoaderBuilder::new(
        StyleBatcher::<B>::new(device.clone()).with_noise(cfg.noise()),
    )
    .batch_size(pairs_per_batch)
    .shuffle(cfg.seed)
    .num_workers(1)
    .build(train);

    let dev_loader = dev.filter(|d| d.pair_count() > 0).map(|d| {
        DataLoaderBuilder::new(StyleBatcher::<B::InnerBackend>::new(device.clone()))
            .batch_size(pairs_per_batch)
            .num_workers(1)
            .build(d)
    });

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut gamma         = cfg.gamma_init;
    let mut steps         = 0usize;
    let mut adversarial_steps = 0usize;
    let mut best_epoch    = None;
    let mut best_dev_loss = f64::INFINITY;

    for epoch in 1..=cfg.epochs {
        let pretraining = epoch <= cfg.pretrain_epochs;
        let params      = StepParams { rho: cfg.rho, gamma };
        let mut totals  = EpochTotals::default();

        for batch in train_loader.iter() {
            if pretraining {
                totals.add_generator(trainer.train_ae_step(&batch, params)?, false);
            } else {
                let d0 = trainer.train_d0_step(&batch, params)?;
                let d1 = trainer.train_d1_step(&batch, params)?;
                totals.add_critics(d0, d1);

                // Poor critics give a useless signal; fall back to reconstruction.
                let adversarial = d0 < cfg.disc_threshold && d1 < cfg.disc_threshold;
                let l = if adversarial {
                    trainer.train_g_step(&batch, params)?
                } else {
                    trainer.train_ae_step(&batch, params)?
                };
                totals.add_generator(l, adversarial);
            }

            steps += 1;
            if cfg.log_every > 0 && steps % cfg.log_every == 0 {
                let g = totals.generator_mean();
                tracing::info!(
                    "step {} | loss={:.4} rec={:.4} ppl={:.2} d0={:.4} d1={:.4} gamma={:.4}",
                    steps, g.loss, g.loss_g, g.ppl_g.exp(),
                    EpochTotals::mean(totals.loss_d0, totals.critic_steps),
                    EpochTotals::mean(totals.loss_d1, totals.critic_steps),
                    gamma,
                );
            }
        }

        if totals.generator_steps == 0 {
            bail!("training set produced no batches");
        }

        // ── Dev evaluation ────────────────────────────────────────────────────
        let dev_losses = match &dev_loader {
            Some(loader) => {
                let mut sum = EvalLosses::default();
                let mut n   = 0usize;
                for batch in loader.iter() {
                    let l = trainer.eval_step(&batch, params)?;
                    sum.loss   += l.loss;
                    sum.loss_g += l.loss_g;
                    sum.ppl_g  += l.ppl_g;
                    sum.loss_d += l.loss_d;
                    n += 1;
                }
                (n > 0).then(|| EvalLosses {
                    loss:   sum.loss   / n as f64,
                    loss_g: sum.loss_g / n as f64,
                    ppl_g:  sum.ppl_g  / n as f64,
                    loss_d: sum.loss_d / n as f64,
                    ..EvalLosses::default()
                })
            }
            None => None,
        };

        let g = totals.generator_mean();
        let row = EpochMetrics {
            epoch,
            gamma,
            train_loss:    g.loss,
            train_loss_g:  g.loss_g,
            train_ppl:     g.ppl_g.exp(),
            train_loss_d0: EpochTotals::mean(totals.loss_d0, totals.critic_steps),
            train_loss_d1: EpochTotals::mean(totals.loss_d1, totals.critic_steps),
            dev_loss:      dev_losses.map_or(f64::NAN, |d| d.loss),
            dev_loss_g:    dev_losses.map_or(f64::NAN, |d| d.loss_g),
            dev_ppl:       dev_losses.map_or(f64::NAN, |d| d.ppl_g.exp()),
            dev_loss_d:    dev_losses.map_or(f64::NAN, |d| d.loss_d),
        };
        metrics.log(&row)?;

        println!(
            "Epoch {:>3}/{} [{}] | loss={:.4} | rec={:.4} | ppl={:.2} | adv steps={}/{} | dev loss={:.4} | gamma={:.4}",
            epoch, cfg.epochs,
            if pretraining { "pretrain" } else { "adversarial" },
            row.train_loss, row.train_loss_g, row.train_ppl,
            totals.adversarial_steps, totals.generator_steps,
            row.dev_loss, gamma,
        );

        ckpt_manager.save_model(trainer.model(), epoch)?;
        if let Some(d) = dev_losses {
            if row.is_improvement(best_dev_loss) {
                best_dev_loss = d.loss;
                best_epoch    = Some(epoch);
                ckpt_manager.mark_best(epoch)?;
                tracing::info!("New best dev loss {:.4} at epoch {}", d.loss, epoch);
            }
        }

        adversarial_steps += totals.adversarial_steps;
        if !pretraining {
            gamma = (gamma * cfg.gamma_decay).max(cfg.gamma_min);
        }
    }

    tracing::info!("Training complete after {} steps", steps);
    Ok(TrainingSummary {
        epochs: cfg.epochs,
        steps,
        adversarial_steps,
        final_gamma: gamma,
        best_epoch,
        best_dev_loss: best_epoch.map(|_| best_dev_loss),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::{tiny_batch, tiny_config};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn trainer() -> TsfTrainer<
        TestBackend,
        impl Optimizer<TsfGenerator<TestBackend>, TestBackend>,
        impl Optimizer<Conv1dClassifier<TestBackend>, TestBackend>,
    > {
        let device = Default::default();
        let model  = tiny_config()
            .with_input_keep_prob(1.0)
            .with_output_keep_prob(1.0)
            .init::<TestBackend>(&device);
        let adam = AdamConfig::new();
        TsfTrainer::new(
            model,
            adam.init::<TestBackend, TsfGenerator<TestBackend>>(),
            adam.init::<TestBackend, TsfGenerator<TestBackend>>(),
            adam.init::<TestBackend, Conv1dClassifier<TestBackend>>(),
            adam.init::<TestBackend, Conv1dClassifier<TestBackend>>(),
            1e-2,
        )
    }

    fn params() -> StepParams {
        StepParams { rho: 0.5, gamma: 1.0 }
    }

    /// Snapshot of one weight matrix from each parameter group.
    fn snapshot(model: &Tsf<TestBackend>) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let read = |w: Tensor<TestBackend, 2>| w.into_data().to_vec::<f32>().unwrap();
        (
            read(model.generator.label_proj.weight.val()),
            read(model.cnn0.logit.weight.val()),
            read(model.cnn1.logit.weight.val()),
        )
    }

    #[test]
    fn test_d0_step_only_moves_cnn0() {
        let mut t = trainer();
        let batch = tiny_batch::<TestBackend>(&Default::default());
        let (g, c0, c1) = snapshot(t.model());

        let loss = t.train_d0_step(&batch, params()).unwrap();
        assert!(loss.is_finite() && loss > 0.0);

        let (g2, c0_2, c1_2) = snapshot(t.model());
        assert_eq!(g2, g);
        assert_ne!(c0_2, c0);
        assert_eq!(c1_2, c1);
    }

    #[test]
    fn test_d1_step_only_moves_cnn1() {
        let mut t = trainer();
        let batch = tiny_batch::<TestBackend>(&Default::default());
        let (g, c0, c1) = snapshot(t.model());

        t.train_d1_step(&batch, params()).unwrap();

        let (g2, c0_2, c1_2) = snapshot(t.model());
        assert_eq!(g2, g);
        assert_eq!(c0_2, c0);
        assert_ne!(c1_2, c1);
    }

    #[test]
    fn test_generator_steps_leave_critics_alone() {
        let mut t = trainer();
        let batch = tiny_batch::<TestBackend>(&Default::default());
        let (g, c0, c1) = snapshot(t.model());

        let ae = t.train_ae_step(&batch, params()).unwrap();
        assert!(ae.loss_g > 0.0 && ae.ppl_g > 0.0);
        assert!((ae.loss - (ae.loss_g - 0.5 * ae.loss_d)).abs() < 1e-3);
        let (after_ae, _, _) = snapshot(t.model());
        assert_ne!(after_ae, g);

        let all = t.train_g_step(&batch, params()).unwrap();
        assert!(all.loss.is_finite());

        let (after_all, c0_2, c1_2) = snapshot(t.model());
        assert_ne!(after_all, after_ae);
        assert_eq!(c0_2, c0);
        assert_eq!(c1_2, c1);
    }

    #[test]
    fn test_reconstruction_loss_goes_down() {
        let mut t = trainer();
        let batch = tiny_batch::<TestBackend>(&Default::default());
        let first = t.train_ae_step(&batch, params()).unwrap().loss_g;
        let mut last = first;
        for _ in 0..30 {
            last = t.train_ae_step(&batch, params()).unwrap().loss_g;
        }
        assert!(last < first, "loss_g did not decrease: {first} -> {last}");
    }

    #[test]
    fn test_eval_step_does_not_update() {
        let t     = trainer();
        let batch = tiny_batch::<NdArray>(&Default::default());
        let before = snapshot(t.model());

        let l = t.eval_step(&batch, params()).unwrap();
        assert!((l.loss_d - (l.loss_d0 + l.loss_d1)).abs() < 1e-4);
        assert!((l.loss - (l.loss_g - 0.5 * l.loss_d)).abs() < 1e-3);
        assert_eq!(snapshot(t.model()), before);
    }

    #[test]
    fn test_decode_steps_shapes() {
        let t     = trainer();
        let batch = tiny_batch::<NdArray>(&Default::default());

        let hard = t.decode_step(&batch);
        let [rows, steps, vocab] = hard.logits_tsf.dims();
        assert_eq!((rows, vocab), (4, 12));
        assert!(steps >= 1 && steps <= 6);

        let soft = t.decode_step_soft(&batch, None).unwrap();
        assert_eq!(soft.logits_ori.dims(), [4, 7, 12]);
        assert_eq!(soft.logits_tsf.dims(), [4, 7, 12]);
        assert_eq!(soft.g_logits.dims(),   [4, 6, 12]);
        assert!(t.decode_step_soft(&batch, Some(0.0)).is_err());
    }

    #[test]
    fn test_invalid_temperature_is_rejected() {
        let mut t = trainer();
        let batch = tiny_batch::<TestBackend>(&Default::default());
        let bad   = StepParams { rho: 1.0, gamma: -1.0 };
        assert!(t.train_d0_step(&batch, bad).is_err());
        assert!(t.train_g_step(&batch, bad).is_err());
    }
}
