//! Train/val/test assignment.
//!
//! Rows are grouped into units, (match, map) by default or
//! (match, map, round), in first-appearance order. Each unit gets one draw
//! from the caller's RNG; every round of the unit follows that draw, so no
//! unit is spread across splits. Rounds breaking the 5 vs 5 invariant are
//! dropped and counted.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use wp_core::{FrameRow, MatchId, RoundFrames, RoundKey, RoundNum};

use crate::error::{DatasetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Split {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "val" | "valid" | "validation" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            _ => Err(DatasetError::Config(format!("unknown split '{}'", s))),
        }
    }
}

/// Granularity of split assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitUnit {
    /// All rounds of a (match, map) share a split
    Match,
    /// Each (match, map, round) is drawn independently
    Round,
}

/// `draw > test_above` → test, `draw < train_below` → train, else val.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitThresholds {
    pub train_below: f64,
    pub test_above: f64,
}

impl Default for SplitThresholds {
    fn default() -> Self {
        Self { train_below: 0.6, test_above: 0.8 }
    }
}

impl SplitThresholds {
    pub fn assign(&self, draw: f64) -> Split {
        if draw > self.test_above {
            Split::Test
        } else if draw < self.train_below {
            Split::Train
        } else {
            Split::Val
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub match_id: MatchId,
    pub map_name: String,
    pub round_num: Option<RoundNum>,
}

impl UnitKey {
    pub fn of(key: &RoundKey, unit: SplitUnit) -> Self {
        Self {
            match_id: key.match_id,
            map_name: key.map_name.clone(),
            round_num: match unit {
                SplitUnit::Match => None,
                SplitUnit::Round => Some(key.round_num),
            },
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.round_num {
            Some(round) => write!(f, "{}, {}, {}", self.match_id, self.map_name, round),
            None => write!(f, "{}, {}", self.match_id, self.map_name),
        }
    }
}

/// One split unit and its rounds, both in first-appearance order.
#[derive(Debug, Clone)]
pub struct SplitGroup {
    pub unit: UnitKey,
    pub rounds: Vec<RoundFrames>,
}

/// Group rows into units and rounds, preserving first-appearance order.
pub fn group_rounds(rows: Vec<FrameRow>, unit: SplitUnit) -> Vec<SplitGroup> {
    let mut groups: Vec<SplitGroup> = Vec::new();
    let mut unit_index: FxHashMap<UnitKey, usize> = FxHashMap::default();
    let mut round_index: FxHashMap<RoundKey, (usize, usize)> = FxHashMap::default();

    for row in rows {
        let round_key = row.round_key();
        if let Some(&(g, r)) = round_index.get(&round_key) {
            groups[g].rounds[r].rows.push(row);
            continue;
        }

        let unit_key = UnitKey::of(&round_key, unit);
        let g = *unit_index.entry(unit_key.clone()).or_insert_with(|| {
            groups.push(SplitGroup { unit: unit_key, rounds: Vec::new() });
            groups.len() - 1
        });
        let r = groups[g].rounds.len();
        groups[g].rounds.push(RoundFrames::new(round_key.clone(), vec![row]));
        round_index.insert(round_key, (g, r));
    }

    groups
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    pub units: usize,
    pub rounds_kept: usize,
    pub bad_rounds: usize,
    pub train_rounds: usize,
    pub val_rounds: usize,
    pub test_rounds: usize,
}

/// Rounds per split plus the unit → split table.
#[derive(Debug, Clone, Default)]
pub struct SplitAssignment {
    pub train: Vec<RoundFrames>,
    pub val: Vec<RoundFrames>,
    pub test: Vec<RoundFrames>,
    pub units: Vec<(UnitKey, Split)>,
    pub stats: SplitStats,
}

impl SplitAssignment {
    pub fn rounds(&self, split: Split) -> &[RoundFrames] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    pub fn take(&mut self, split: Split) -> Vec<RoundFrames> {
        match split {
            Split::Train => std::mem::take(&mut self.train),
            Split::Val => std::mem::take(&mut self.val),
            Split::Test => std::mem::take(&mut self.test),
        }
    }

    fn push(&mut self, split: Split, round: RoundFrames) {
        match split {
            Split::Train => {
                self.stats.train_rounds += 1;
                self.train.push(round);
            }
            Split::Val => {
                self.stats.val_rounds += 1;
                self.val.push(round);
            }
            Split::Test => {
                self.stats.test_rounds += 1;
                self.test.push(round);
            }
        }
    }
}

/// Assign each unit to a split with one draw from `rng`, dropping bad rounds.
pub fn assign_splits<R: Rng>(
    groups: Vec<SplitGroup>,
    rng: &mut R,
    thresholds: &SplitThresholds,
) -> SplitAssignment {
    let mut assignment = SplitAssignment::default();

    for group in groups {
        let draw: f64 = rng.gen();
        let split = thresholds.assign(draw);
        assignment.stats.units += 1;

        for round in group.rounds {
            if let Some(defect) = round.defect() {
                log::debug!("Dropping round ({}): {}", round.key, defect);
                assignment.stats.bad_rounds += 1;
                continue;
            }
            assignment.stats.rounds_kept += 1;
            assignment.push(split, round);
        }

        assignment.units.push((group.unit, split));
    }

    log::info!(
        "Found {} rounds with fewer than 10 players ({} kept across {} units)",
        assignment.stats.bad_rounds,
        assignment.stats.rounds_kept,
        assignment.stats.units
    );

    assignment
}
