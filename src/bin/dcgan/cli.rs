use burn_dcgan::data::DatasetKind;
use std::path::PathBuf;

pub const HELP: &str = "\
Burn DCGAN

Trains a deep convolutional GAN on MNIST digits or SVHN house numbers,
and/or generates images with a trained generator.
Configuration, weights, optimizer states, loss history and samples are kept in an artifacts directory.

USAGE:
    dcgan [OPTIONS]

When neither --training nor --generate is provided, the program exits after handling configuration logic.

BEHAVIOR OVERVIEW
- If --training-config is given, the config is loaded from that file and saved to the artifacts directory.
- Otherwise the config is loaded from the artifacts directory; if absent, the preset for --dataset is created and saved.
- A --dataset that differs from the one of a loaded config is an error.
- Weights and optimizer states found in the artifacts directory are resumed from; otherwise new ones are created.
- Training continues the step count, epoch count and loss history of earlier runs.
- With --remove-artifacts, saved weights, optimizer states and loss history are deleted before training.
- Samples of a fixed latent batch are rendered into <artifacts>/samples during training.
- If both --training and --generate are specified, training executes first.

FLAGS:
    -h, --help                  Show this help message and exit

OPTIONS:
    -t, --training              Run training (creates or resumes the networks)
    -g, --generate <N>          Write N generated images to <artifacts>/generated.png
    -r, --remove-artifacts      Delete saved weights, optimizer states and losses before training
                                (has no effect if --training is not used)
    -d, --dataset <NAME>        mnist (default for new configs, downloaded on first use) or svhn
        --data-dir <PATH>       Directory of SVHN image files (png, jpg, bmp); required for svhn
    -c, --training-config <PATH>
                                Load the training configuration from this file
    -a, --artifacts-path <PATH>
                                Directory where everything is saved and loaded.
                                If the directory does not exist, it will be created.
                                Defaults to a newly created temporary directory (path will be printed).
        --max-steps <N>         Stop this training run after N adversarial steps
";

#[derive(Debug)]
pub struct AppArgs {
    pub training: bool,
    pub generate: Option<usize>,
    pub remove_artifacts: bool,
    pub dataset: Option<DatasetKind>,
    pub data_dir: Option<PathBuf>,
    pub training_config: Option<PathBuf>,
    pub artifacts_path: PathBuf,
    pub max_steps: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error(transparent)]
    Parse(#[from] pico_args::Error),
    #[error("unused arguments: {0:?}")]
    Unused(Vec<std::ffi::OsString>),
    #[error("failed to create a temporary artifacts directory: {0}")]
    TempDir(std::io::Error),
}

impl AppArgs {
    pub fn parse() -> Result<Self, ArgsError> {
        let mut pargs = pico_args::Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            println!("{}", HELP);
            std::process::exit(0);
        }

        Self::from_arguments(pargs)
    }

    pub fn from_arguments(mut pargs: pico_args::Arguments) -> Result<Self, ArgsError> {
        let artifacts_path = match pargs.opt_value_from_os_str(["-a", "--artifacts-path"], parse_path)? {
            Some(path) => path,
            None => {
                // e.g. /tmp/burn-dcgan-dcgan-abcd-0
                let name = format!(
                    "{}-{}-",
                    std::env!("CARGO_PKG_NAME"),
                    std::env!("CARGO_BIN_NAME")
                );
                let tmp = temp_dir::TempDir::with_prefix(name)
                    .map_err(ArgsError::TempDir)?
                    .dont_delete_on_drop();
                let path = tmp.path().to_path_buf();
                println!("new artifacts directory: {path:?}");
                path
            }
        };

        let args = AppArgs {
            artifacts_path,
            generate: pargs.opt_value_from_str(["-g", "--generate"])?,
            dataset: pargs.opt_value_from_str(["-d", "--dataset"])?,
            data_dir: pargs.opt_value_from_os_str("--data-dir", parse_path)?,
            training_config: pargs
                .opt_value_from_os_str(["-c", "--training-config"], parse_path)?,
            max_steps: pargs.opt_value_from_str("--max-steps")?,
            // must parse flags after values
            training: pargs.contains(["-t", "--training"]),
            remove_artifacts: pargs.contains(["-r", "--remove-artifacts"]),
        };

        // It's up to the caller what to do with the remaining arguments.
        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(ArgsError::Unused(remaining));
        }

        Ok(args)
    }
}

fn parse_path(s: &std::ffi::OsStr) -> Result<PathBuf, &'static str> {
    Ok(s.into())
}
