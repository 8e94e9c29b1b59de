// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   1. `train`    — fit the model on <prefix>.0 / <prefix>.1
//   2. `transfer` — rewrite a corpus into the opposite style
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs, TransferArgs};

#[derive(Parser, Debug)]
#[command(
    name = "text-style-transfer",
    version = "0.1.0",
    about = "Train an adversarial style transfer model on non-parallel text, then transfer sentences."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand; no computation happens here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Transfer(args) => run_transfer(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on corpus: {}", args.train_prefix);
    let mut use_case = TrainUseCase::new(args.into());
    let summary = use_case.execute()?;

    match summary.best_epoch {
        Some(epoch) => println!(
            "Training complete. Best epoch {} (dev loss {:.4}), checkpoints in '{}'.",
            epoch,
            summary.best_dev_loss.unwrap_or(f64::NAN),
            use_case.config().checkpoint_dir,
        ),
        None => println!(
            "Training complete. Checkpoints in '{}'.",
            use_case.config().checkpoint_dir,
        ),
    }
    Ok(())
}

fn run_transfer(args: TransferArgs) -> Result<()> {
    use crate::application::transfer_use_case::TransferUseCase;

    let use_case = TransferUseCase::from_checkpoint(args.into())?;
    let summary  = use_case.execute()?;
    println!(
        "Transferred {} style-0 and {} style-1 sentences.",
        summary.sentences[0], summary.sentences[1],
    );
    Ok(())
}
