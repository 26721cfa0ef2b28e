//! One CSV per round, transformed on demand.
//!
//! Files live at `<folder>/rounds/<split>/<match>_<map>_<round>_<ticks>.csv`.
//! The tick count in the name lets the dataset build its index without
//! opening any file. Every `get` re-reads and re-transforms one round; nothing
//! is cached between calls.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array3, Axis};
use wp_core::{MapDistance, MatchId, RoundFrames, RoundKey, RoundNum, TransformKind};

use crate::config::DatasetConfig;
use crate::error::{DatasetError, Result};
use crate::frames::{read_frames_from, read_outcomes, write_round_csv, FramesLayout};
use crate::split::Split;
use crate::store;

pub const ROUNDS_DIR: &str = "rounds";

pub fn round_files_dir(folder: &Path, split: Split) -> PathBuf {
    folder.join(ROUNDS_DIR).join(split.as_str())
}

/// Parsed `<match>_<map>_<round>_<ticks>.csv`. The map may contain `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundFileName {
    pub key: RoundKey,
    pub ticks: usize,
}

impl RoundFileName {
    pub fn new(key: RoundKey, ticks: usize) -> Self {
        Self { key, ticks }
    }

    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || DatasetError::InvalidFileName(name.to_string());

        let stem = name.strip_suffix(".csv").ok_or_else(invalid)?;
        let (match_id, rest) = stem.split_once('_').ok_or_else(invalid)?;
        let mut tail = rest.rsplitn(3, '_');
        let ticks = tail.next().ok_or_else(invalid)?;
        let round = tail.next().ok_or_else(invalid)?;
        let map = tail.next().filter(|m| !m.is_empty()).ok_or_else(invalid)?;

        let match_id: MatchId = match_id.parse().map_err(|_| invalid())?;
        let round: RoundNum = round.parse().map_err(|_| invalid())?;
        let ticks: usize = ticks.parse().map_err(|_| invalid())?;

        Ok(Self { key: RoundKey::new(match_id, map, round), ticks })
    }
}

impl fmt::Display for RoundFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}.csv",
            self.key.match_id, self.key.map_name, self.key.round_num, self.ticks
        )
    }
}

/// Write every round of every split archive as its own CSV.
/// Returns the number of files written per split.
pub fn export_round_files(config: &DatasetConfig) -> Result<Vec<(Split, usize)>> {
    let mut written = Vec::with_capacity(Split::ALL.len());

    for split in Split::ALL {
        let archive = store::read_split_archive(&config.folder, split)?;
        let dir = round_files_dir(&config.folder, split);
        fs::create_dir_all(&dir)?;

        for round in &archive.rounds {
            let name = RoundFileName::new(round.key.clone(), round.tick_count());
            let file = File::create(dir.join(name.to_string()))?;
            write_round_csv(BufWriter::new(file), round)?;
        }

        log::info!("Exported {} {} rounds to {:?}", archive.rounds.len(), split, dir);
        written.push((split, archive.rounds.len()));
    }

    Ok(written)
}

#[derive(Debug, Clone)]
struct RoundFileEntry {
    path: PathBuf,
    name: RoundFileName,
    label: f32,
}

/// Dataset over the per-round files of one split.
pub struct RoundFileDataset {
    split: Split,
    transform: TransformKind,
    entries: Vec<RoundFileEntry>,
    /// Cumulative tick counts; `ends[i]` is one past the last sample of file `i`
    ends: Vec<usize>,
    distance: Arc<dyn MapDistance>,
}

impl RoundFileDataset {
    pub fn open(
        config: &DatasetConfig,
        split: Split,
        transform: Option<TransformKind>,
        distance: Arc<dyn MapDistance>,
    ) -> Result<Self> {
        let transform = transform.ok_or(DatasetError::TransformRequired)?;
        let dir = round_files_dir(&config.folder, split);
        if !dir.exists() {
            return Err(DatasetError::FileNotFound { path: dir.display().to_string() });
        }

        let outcomes = read_outcomes(&config.rounds_path())?;

        let mut files: Vec<(PathBuf, RoundFileName)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let name = RoundFileName::parse(file_name)?;
            files.push((path, name));
        }
        // numeric (match, map, round) order, not file-name order
        files.sort_by(|a, b| a.1.key.cmp(&b.1.key));

        let mut entries = Vec::with_capacity(files.len());
        let mut ends = Vec::with_capacity(files.len());
        let mut total = 0;
        for (path, name) in files {
            let label = outcomes.label(&name.key)?;
            total += name.ticks;
            ends.push(total);
            entries.push(RoundFileEntry { path, name, label });
        }

        log::info!("Indexed {} round files ({} samples) in {:?}", entries.len(), total, dir);

        Ok(Self { split, transform, entries, ends, distance })
    }

    pub fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn round_count(&self) -> usize {
        self.entries.len()
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn transform(&self) -> TransformKind {
        self.transform
    }

    pub fn get(&self, idx: usize) -> Result<(Array3<f32>, f32)> {
        if idx >= self.len() {
            return Err(DatasetError::IndexOutOfRange { index: idx, len: self.len() });
        }

        let file = self.ends.partition_point(|&end| end <= idx);
        let start = if file == 0 { 0 } else { self.ends[file - 1] };
        let entry = &self.entries[file];

        let round = self.read_round(entry)?;
        let tensor = self
            .transform
            .apply(&round, self.distance.as_ref())
            .map_err(|source| DatasetError::Transform { round: round.key.clone(), source })?;

        if tensor.shape()[0] != entry.name.ticks {
            log::warn!(
                "{:?} holds {} ticks, name says {}",
                entry.path,
                tensor.shape()[0],
                entry.name.ticks
            );
            return Err(DatasetError::Corrupted);
        }

        Ok((tensor.index_axis(Axis(0), idx - start).to_owned(), entry.label))
    }

    fn read_round(&self, entry: &RoundFileEntry) -> Result<RoundFrames> {
        let file = File::open(&entry.path)?;
        let (rows, _) = read_frames_from(BufReader::new(file), FramesLayout::Headered)?;
        Ok(RoundFrames::new(entry.name.key.clone(), rows))
    }
}

impl fmt::Debug for RoundFileDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundFileDataset")
            .field("split", &self.split)
            .field("transform", &self.transform)
            .field("rounds", &self.entries.len())
            .field("samples", &self.len())
            .finish()
    }
}
