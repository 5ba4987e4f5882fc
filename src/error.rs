use crate::data::DatasetKind;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to record {what} at {path:?}: {source}")]
    Recorder {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: burn::record::RecorderError,
    },

    #[error("no {what} record at {path:?}, run the training first")]
    MissingRecord { what: &'static str, path: PathBuf },

    #[error("failed to load config from {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("image error on {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("malformed idx file {name}: {reason}")]
    Idx { name: String, reason: String },

    #[error("dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("the {0} dataset requires a data directory")]
    MissingDataDir(String),

    #[error("the saved training config is for {configured}, but {requested} was requested")]
    DatasetMismatch {
        requested: DatasetKind,
        configured: DatasetKind,
    },

    #[error("unknown dataset {0:?}, expected \"mnist\" or \"svhn\"")]
    UnknownDataset(String),

    #[error("{0}")]
    Shape(String),

    #[error("loss history json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
