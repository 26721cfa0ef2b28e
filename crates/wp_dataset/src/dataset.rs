//! Index-addressable dataset of transformed samples.
//!
//! Opening a dataset moves the folder through three states:
//!
//! | state            | on disk                                  | action                        |
//! |------------------|------------------------------------------|-------------------------------|
//! | `Uninitialized`  | no `test/` split directory               | read CSVs, assign, save splits |
//! | `SplitReady`     | split archive, no tensor cache           | transform rounds, save cache  |
//! | `Ready`          | tensor cache for (split, transform)      | load it                       |
//!
//! The build path is not safe to run from several processes at once; run it
//! once before handing the dataset to parallel workers.

use std::path::Path;

use ndarray::{concatenate, Array1, Array4, ArrayView3, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wp_core::{MapDistance, RoundFrames, TransformKind};

use crate::config::DatasetConfig;
use crate::error::{DatasetError, Result};
use crate::frames::{read_frames, read_outcomes, Outcomes};
use crate::split::{assign_splits, group_rounds, Split, SplitAssignment};
use crate::store::{self, SplitArchive, TensorCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetState {
    Uninitialized,
    SplitReady,
    Ready,
}

impl DatasetState {
    pub fn probe(folder: &Path, split: Split, transform: TransformKind) -> Self {
        if !store::split_dir(folder, Split::Test).exists() {
            DatasetState::Uninitialized
        } else if !store::tensor_cache_path(folder, split, transform).exists() {
            DatasetState::SplitReady
        } else {
            DatasetState::Ready
        }
    }
}

/// Read the raw CSVs, assign every unit to a split and persist all three
/// split archives. The RNG is seeded from `config.seed`.
pub fn build_splits(config: &DatasetConfig) -> Result<SplitAssignment> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    build_splits_with_rng(config, &mut rng)
}

pub fn build_splits_with_rng<R: rand::Rng>(
    config: &DatasetConfig,
    rng: &mut R,
) -> Result<SplitAssignment> {
    log::info!("Train/val/test splits not found, loading {:?}", config.frames_path());

    let (rows, stats) = read_frames(&config.frames_path(), config.frames_layout)?;
    log::info!(
        "Parsed {} frame rows (failed: {}, total rows: {})",
        stats.parsed,
        stats.failed,
        stats.total_rows
    );

    let groups = group_rounds(rows, config.split_unit);
    let assignment = assign_splits(groups, rng, &config.thresholds);

    for split in Split::ALL {
        let archive = SplitArchive::new(split, assignment.rounds(split).to_vec());
        let meta = store::write_split_archive(&config.folder, &archive)?;
        log::info!(
            "Saved {} split: {} rounds, {}",
            split,
            archive.rounds.len(),
            store::human_bytes(meta.compressed_size)
        );
    }

    Ok(assignment)
}

/// Transform rounds in order and concatenate them, broadcasting each round's
/// outcome to all of its samples.
pub fn transform_rounds(
    rounds: &[RoundFrames],
    transform: TransformKind,
    outcomes: &Outcomes,
    distance: &dyn MapDistance,
) -> Result<(Array4<f32>, Array1<f32>)> {
    let (channels, rows, cols) = transform.sample_shape();
    let mut tensors = Vec::with_capacity(rounds.len());
    let mut labels = Vec::new();

    for (idx, round) in rounds.iter().enumerate() {
        log::debug!("Transforming {}/{}: {}", idx + 1, rounds.len(), round.key);

        let label = outcomes.label(&round.key)?;
        let tensor = transform
            .apply(round, distance)
            .map_err(|source| DatasetError::Transform { round: round.key.clone(), source })?;

        labels.extend(std::iter::repeat(label).take(tensor.shape()[0]));
        tensors.push(tensor);
    }

    let features = if tensors.is_empty() {
        Array4::zeros((0, channels, rows, cols))
    } else {
        let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
        concatenate(Axis(0), &views).map_err(|_| DatasetError::Corrupted)?
    };

    Ok((features, Array1::from(labels)))
}

pub struct CsgoDatasetBuilder {
    config: DatasetConfig,
    split: Split,
    transform: Option<TransformKind>,
}

impl CsgoDatasetBuilder {
    pub fn split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    pub fn transform(mut self, transform: TransformKind) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn transform_opt(mut self, transform: Option<TransformKind>) -> Self {
        self.transform = transform;
        self
    }

    /// Open the dataset, building whatever is missing on disk.
    pub fn open(self, distance: &dyn MapDistance) -> Result<CsgoDataset> {
        let transform = self.transform.ok_or(DatasetError::TransformRequired)?;
        let config = self.config;
        let split = self.split;
        let folder = config.folder.as_path();

        let opened_from = DatasetState::probe(folder, split, transform);
        let mut bad_rounds = 0;

        if opened_from == DatasetState::Ready {
            log::info!("Reading transformed data...");
            let cache = store::read_tensor_cache(folder, split, transform)?;
            return Ok(CsgoDataset {
                split,
                transform,
                features: cache.features,
                labels: cache.labels,
                bad_rounds,
                opened_from,
            });
        }

        let rounds = if opened_from == DatasetState::Uninitialized {
            let mut assignment = build_splits(&config)?;
            bad_rounds = assignment.stats.bad_rounds;
            assignment.take(split)
        } else {
            store::read_split_archive(folder, split)?.rounds
        };

        log::info!("Transforming raw data ({} rounds, {})...", rounds.len(), transform);
        let outcomes = read_outcomes(&config.rounds_path())?;
        let (features, labels) = transform_rounds(&rounds, transform, &outcomes, distance)?;

        let cache = TensorCache::new(split, transform, features, labels)?;
        let meta = store::write_tensor_cache(folder, &cache)?;
        log::info!(
            "Saved {} samples for {}/{} ({})",
            cache.labels.len(),
            split,
            transform,
            store::human_bytes(meta.compressed_size)
        );

        Ok(CsgoDataset {
            split,
            transform,
            features: cache.features,
            labels: cache.labels,
            bad_rounds,
            opened_from,
        })
    }
}

/// Samples of one split under one transform.
#[derive(Debug, Clone)]
pub struct CsgoDataset {
    split: Split,
    transform: TransformKind,
    features: Array4<f32>,
    labels: Array1<f32>,
    bad_rounds: usize,
    opened_from: DatasetState,
}

impl CsgoDataset {
    /// Defaults: train split, no transform (must be set before `open`).
    pub fn builder(config: DatasetConfig) -> CsgoDatasetBuilder {
        CsgoDatasetBuilder { config, split: Split::Train, transform: None }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sample `idx` in concatenation order: `(channels × rows × cols, label)`.
    pub fn get(&self, idx: usize) -> Result<(ArrayView3<'_, f32>, f32)> {
        if idx >= self.len() {
            return Err(DatasetError::IndexOutOfRange { index: idx, len: self.len() });
        }
        Ok((self.features.index_axis(Axis(0), idx), self.labels[idx]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArrayView3<'_, f32>, f32)> + '_ {
        self.features.outer_iter().zip(self.labels.iter().copied())
    }

    pub fn features(&self) -> &Array4<f32> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f32> {
        &self.labels
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn transform(&self) -> TransformKind {
        self.transform
    }

    /// Rounds dropped while building splits; 0 unless this open built them.
    pub fn bad_round_count(&self) -> usize {
        self.bad_rounds
    }

    pub fn opened_from(&self) -> DatasetState {
        self.opened_from
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wp_core::{synthetic, RoundKey, Side};

    fn outcomes(keys: &[(RoundKey, Side)]) -> Outcomes {
        keys.iter().cloned().collect()
    }

    #[test]
    fn test_label_broadcast() {
        let mesh = synthetic::line_mesh("de_dust2", 20);
        let ticks: Vec<i64> = (0..40).collect();
        let ct_win = synthetic::full_round(RoundKey::new(1, "de_dust2", 1), &ticks, 0);
        let t_win = synthetic::full_round(RoundKey::new(1, "de_dust2", 2), &ticks[..3], 0);
        let outcomes = outcomes(&[
            (ct_win.key.clone(), Side::CT),
            (t_win.key.clone(), Side::T),
        ]);

        let (features, labels) = transform_rounds(
            &[ct_win, t_win],
            TransformKind::MultiChannel,
            &outcomes,
            &mesh,
        )
        .unwrap();

        assert_eq!(features.shape(), &[43, 6, 5, 5]);
        assert_eq!(labels.len(), 43);
        assert!(labels.iter().take(40).all(|&l| l == 1.0));
        assert!(labels.iter().skip(40).all(|&l| l == 0.0));
    }

    #[test]
    fn test_missing_outcome_is_error() {
        let mesh = synthetic::line_mesh("de_dust2", 20);
        let round = synthetic::full_round(RoundKey::new(1, "de_dust2", 1), &[1], 0);
        let err = transform_rounds(&[round], TransformKind::Basic, &Outcomes::default(), &mesh)
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingOutcome(_)));
    }

    #[test]
    fn test_empty_split_has_sample_shape() {
        let mesh = synthetic::line_mesh("de_dust2", 20);
        let (features, labels) =
            transform_rounds(&[], TransformKind::Extended, &Outcomes::default(), &mesh).unwrap();
        assert_eq!(features.shape(), &[0, 7, 5, 5]);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_transform_required() {
        let dir = tempfile::TempDir::new().unwrap();
        let mesh = synthetic::line_mesh("de_dust2", 20);
        let err = CsgoDataset::builder(DatasetConfig::new(dir.path()))
            .split(Split::Val)
            .open(&mesh)
            .unwrap_err();
        assert!(matches!(err, DatasetError::TransformRequired));
        // nothing was built
        assert!(!dir.path().join("test").exists());
    }

    #[test]
    fn test_probe_states() {
        let dir = tempfile::TempDir::new().unwrap();
        let folder = dir.path();
        let kind = TransformKind::Basic;
        assert_eq!(DatasetState::probe(folder, Split::Train, kind), DatasetState::Uninitialized);

        std::fs::create_dir_all(folder.join("test")).unwrap();
        assert_eq!(DatasetState::probe(folder, Split::Train, kind), DatasetState::SplitReady);

        let cache = TensorCache::new(
            Split::Train,
            kind,
            Array4::zeros((0, 1, 12, 10)),
            Array1::zeros(0),
        )
        .unwrap();
        store::write_tensor_cache(folder, &cache).unwrap();
        assert_eq!(DatasetState::probe(folder, Split::Train, kind), DatasetState::Ready);
        assert_eq!(
            DatasetState::probe(folder, Split::Train, TransformKind::Extended),
            DatasetState::SplitReady
        );
    }
}
