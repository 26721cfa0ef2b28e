use thiserror::Error;
use wp_core::{DistanceError, RoundKey, TransformError, TransformKind};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Transform required")]
    TransformRequired,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV schema error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Decompression error")]
    Decompression,

    #[error("Corrupted data")]
    Corrupted,

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("No outcome recorded for round ({0})")]
    MissingOutcome(RoundKey),

    #[error("Sample index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Transform failed for round ({round}): {source}")]
    Transform {
        round: RoundKey,
        #[source]
        source: TransformError,
    },

    #[error("Navigation mesh error: {0}")]
    Distance(#[from] DistanceError),

    #[error("Cache holds {found} tensors, expected {expected}")]
    TransformMismatch { found: TransformKind, expected: TransformKind },

    #[error("Invalid round file name: {0}")]
    InvalidFileName(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl DatasetError {
    /// Whether rebuilding the affected cache could clear the error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DatasetError::Io(_) => true,
            DatasetError::FileNotFound { .. } => true,
            DatasetError::ChecksumMismatch => true,
            DatasetError::Corrupted => true,
            DatasetError::Decompression => true,
            DatasetError::VersionMismatch { .. } => true,
            DatasetError::TransformMismatch { .. } => true,
            DatasetError::TransformRequired => false,
            DatasetError::Config(_) => false,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
