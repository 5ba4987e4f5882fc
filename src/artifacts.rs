//! The artifacts directory: configuration, network weights, optimizer state,
//! loss history and rendered samples of one training run.

use crate::backend::RecorderTy;
use crate::error::{Error, Result};
use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::record::{FileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use std::path::{Path, PathBuf};

pub const TRAINING_CONFIG_NAME: &str = "training_config";
pub const GENERATOR_NAME: &str = "generator";
pub const DISCRIMINATOR_NAME: &str = "discriminator";
pub const GENERATOR_OPTIM_NAME: &str = "generator_optim";
pub const DISCRIMINATOR_OPTIM_NAME: &str = "discriminator_optim";
pub const LOSSES_NAME: &str = "losses.json";
pub const SAMPLES_DIR: &str = "samples";

#[derive(Debug, Clone)]
pub struct Artifacts {
    dir: PathBuf,
}

impl Artifacts {
    /// Creates the directory if needed.
    ///
    /// With `remove_records`, previously saved weights, optimizer states and loss history
    /// are deleted so that training starts over from freshly initialized networks.
    pub fn create<B: Backend>(dir: impl Into<PathBuf>, remove_records: bool) -> Result<Self> {
        let artifacts = Self { dir: dir.into() };
        std::fs::create_dir_all(&artifacts.dir).map_err(|e| Error::io(&artifacts.dir, e))?;
        if remove_records {
            for name in [
                GENERATOR_NAME,
                DISCRIMINATOR_NAME,
                GENERATOR_OPTIM_NAME,
                DISCRIMINATOR_OPTIM_NAME,
            ] {
                let path = artifacts.record_path::<B>(name);
                artifacts.remove(path)?;
            }
            artifacts.remove(artifacts.dir.join(LOSSES_NAME))?;
        }
        Ok(artifacts)
    }

    fn remove(&self, path: PathBuf) -> Result<()> {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = ?path, "removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a record file, with the recorder's extension.
    pub fn record_path<B: Backend>(&self, name: &str) -> PathBuf {
        let file_ext = <RecorderTy as FileRecorder<B>>::file_extension();
        self.dir.join(name).with_extension(file_ext)
    }

    pub fn training_config_path(&self) -> PathBuf {
        self.dir.join(TRAINING_CONFIG_NAME).with_extension("json")
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.dir.join(SAMPLES_DIR)
    }

    pub fn save_config(&self, config: &impl Config) -> Result<()> {
        let path = self.training_config_path();
        tracing::info!(path = ?path, "saving training config");
        config.save(&path).map_err(|e| Error::io(&path, e))
    }

    /// Loads `path`, or the config saved in this directory when `path` is `None`.
    ///
    /// `Ok(None)` when there is nothing to load.
    pub fn load_config<C: Config>(&self, path: Option<&Path>) -> Result<Option<C>> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.training_config_path());
        if !path.exists() {
            return Ok(None);
        }
        tracing::info!(path = ?path, "loading training config");
        C::load(&path).map(Some).map_err(|e| Error::Config {
            path,
            message: e.to_string(),
        })
    }

    pub fn save_module<B: Backend>(&self, name: &'static str, module: &impl Module<B>) -> Result<()> {
        let path = self.dir.join(name);
        tracing::debug!(path = ?path, "saving {name}");
        module
            .clone()
            .save_file(path.clone(), &RecorderTy::new()) // ext added automatically
            .map_err(|source| Error::Recorder {
                what: name,
                path,
                source,
            })
    }

    /// Loads the record saved under `name` into `init`, or `Ok(None)` if it was never saved.
    pub fn load_module<B: Backend, M: Module<B>>(
        &self,
        name: &'static str,
        init: M,
        device: &B::Device,
    ) -> Result<Option<M>> {
        if !self.record_path::<B>(name).exists() {
            return Ok(None);
        }
        let path = self.dir.join(name);
        tracing::info!(path = ?path, "loading {name}");
        init.load_file(path.clone(), &RecorderTy::new(), device)
            .map(Some)
            .map_err(|source| Error::Recorder {
                what: name,
                path,
                source,
            })
    }

    pub fn save_optim<AutoB, AutoM>(
        &self,
        name: &'static str,
        optim: &impl Optimizer<AutoM, AutoB>,
    ) -> Result<()>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
    {
        let path = self.dir.join(name);
        tracing::debug!(path = ?path, "saving {name}");
        Recorder::<AutoB>::record(&RecorderTy::new(), optim.to_record(), path.clone())
            .map_err(|source| Error::Recorder {
                what: name,
                path,
                source,
            })
    }

    /// Loads the optimizer state saved under `name` into `init`, or `Ok(None)` if it was never saved.
    pub fn load_optim<AutoB, AutoM, O>(
        &self,
        name: &'static str,
        init: O,
        device: &AutoB::Device,
    ) -> Result<Option<O>>
    where
        AutoB: AutodiffBackend,
        AutoM: AutodiffModule<AutoB>,
        O: Optimizer<AutoM, AutoB>,
    {
        if !self.record_path::<AutoB>(name).exists() {
            return Ok(None);
        }
        let path = self.dir.join(name);
        tracing::info!(path = ?path, "loading {name}");
        let record = Recorder::<AutoB>::load(&RecorderTy::new(), path.clone(), device).map_err(
            |source| Error::Recorder {
                what: name,
                path,
                source,
            },
        )?;
        Ok(Some(init.load_record(record)))
    }

    pub fn save_losses<T: serde::Serialize>(&self, losses: &T) -> Result<()> {
        let path = self.dir.join(LOSSES_NAME);
        let json = serde_json::to_string_pretty(losses)?;
        std::fs::write(&path, json).map_err(|e| Error::io(path, e))
    }

    /// Loads the loss history saved by [`save_losses`](Self::save_losses), or `Ok(None)` if there is none.
    pub fn load_losses<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>> {
        let path = self.dir.join(LOSSES_NAME);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        tracing::info!(path = ?path, "loading loss history");
        Ok(Some(serde_json::from_str(&json)?))
    }
}
