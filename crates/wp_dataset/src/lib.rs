//! Dataset builder library
//!
//! Frames CSV → train/val/test split archives → per-transform tensor caches
//! (MessagePack → LZ4 → SHA256 trailer), plus an on-demand per-round CSV
//! dataset.

pub mod config;
pub mod dataset;
pub mod error;
pub mod frames;
pub mod round_files;
pub mod split;
pub mod store;

pub use config::{DatasetConfig, DATASET_DIR_ENV};
pub use dataset::{build_splits, transform_rounds, CsgoDataset, CsgoDatasetBuilder, DatasetState};
pub use error::{DatasetError, Result};
pub use frames::{read_frames, read_outcomes, FramesLayout, Outcomes, ParseStats};
pub use round_files::{export_round_files, RoundFileDataset, RoundFileName};
pub use split::{assign_splits, group_rounds, Split, SplitAssignment, SplitStats, SplitThresholds, SplitUnit};
pub use store::{verify_cache, CacheMetadata, SplitArchive, TensorCache};
