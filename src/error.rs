use std::path::PathBuf;
use thiserror::Error;

use crate::client::ClientError;

#[derive(Error, Debug)]
pub enum LeafError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode visualization: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to load detections: {0}")]
    Detections(String),

    #[error("Failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Server appears to be offline. Make sure the backend is running at {0}")]
    BackendOffline(String),

    #[error("Please select an image file first")]
    NoImageSelected,

    #[error("Analysis is not available right now")]
    AnalyzeUnavailable,
}

pub type LeafResult<T> = Result<T, LeafError>;
