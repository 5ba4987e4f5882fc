use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_dcgan::artifacts::Artifacts;
use burn_dcgan::backend::{MainAutoBackend, MainBackend, MainDevice};
use burn_dcgan::data::{DatasetKind, ImageDataset};
use burn_dcgan::error::{Error, Result};
use burn_dcgan::training::{self, TrainingConfig};
use burn_dcgan::inference;
use tracing_subscriber::EnvFilter;

pub mod cli;

use cli::AppArgs;

/// The `--training-config` file, else the config saved in `artifacts`, else the `--dataset` preset.
///
/// A requested dataset must match the one of a loaded config.
pub fn resolve_config<AutoB: AutodiffBackend>(
    app_args: &AppArgs,
    artifacts: &Artifacts,
) -> Result<TrainingConfig> {
    let loaded = artifacts.load_config::<TrainingConfig>(app_args.training_config.as_deref())?;
    let mut training_config = match loaded {
        Some(config) => match app_args.dataset {
            Some(requested) if requested != config.dataset => {
                return Err(Error::DatasetMismatch {
                    requested,
                    configured: config.dataset,
                });
            }
            _ => config,
        },
        None => TrainingConfig::for_dataset::<AutoB>(app_args.dataset.unwrap_or(DatasetKind::Mnist)),
    };
    if app_args.max_steps.is_some() {
        training_config.max_steps = app_args.max_steps;
    }
    Ok(training_config)
}

pub fn launch<B, AutoB>(app_args: &AppArgs) -> Result<()>
where
    B: Backend + MainDevice,
    AutoB: AutodiffBackend + MainDevice,
{
    let artifacts = Artifacts::create::<AutoB>(
        &app_args.artifacts_path,
        app_args.remove_artifacts && app_args.training,
    )?;

    let training_config = resolve_config::<AutoB>(app_args, &artifacts)?;
    artifacts.save_config(&training_config)?;

    if app_args.training {
        let dataset = ImageDataset::load(training_config.dataset, app_args.data_dir.as_deref())?;
        let history = training::train::<AutoB>(
            &training_config,
            dataset,
            &artifacts,
            AutoB::main_device(),
        )?;
        if let Some(last) = history.records.last() {
            tracing::info!(
                step = last.step,
                discriminator = last.discriminator,
                generator = last.generator,
                "last reported losses"
            );
        }
    }

    if let Some(count) = app_args.generate {
        let path = inference::infer::<B>(&training_config, &artifacts, count, B::main_device())?;
        println!("generated images written to {path:?}");
    }

    if app_args.generate.is_none() && !app_args.training {
        println!("neither training nor generation were enabled");
        println!("{}", cli::HELP);
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_args = match AppArgs::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{}", cli::HELP);
            std::process::exit(2);
        }
    };

    if let Err(e) = launch::<MainBackend, MainAutoBackend>(&app_args) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
