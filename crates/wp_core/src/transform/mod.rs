//! Per-tick tensor transforms.
//!
//! Every transform turns one round into a `(ticks, channels, rows, cols)`
//! tensor, one sample per distinct tick in ascending tick order. Rows of a
//! tick are deduplicated on (tick, player), keeping the first occurrence.
//! Player ordering is always ascending player id.

mod basic;
mod extended;
mod multichannel;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result, TransformError};
use crate::geometry::MapDistance;
use crate::models::{FrameRow, PlayerId, RoundFrames, Side, Tick, TEAM_SIZE};

pub use basic::transform_basic;
pub use extended::transform_extended;
pub use multichannel::transform_multichannel;

/// The closed set of transforms; each maps to a stable cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    /// Area distances plus alive/side rows, `1 × 12 × 10`.
    Basic,
    /// Team-vs-team distance blocks plus alive diagonals, `6 × 5 × 5`.
    MultiChannel,
    /// CT-vs-T attribute differences, `7 × 5 × 5`.
    Extended,
}

impl TransformKind {
    pub const ALL: [TransformKind; 3] =
        [TransformKind::Basic, TransformKind::MultiChannel, TransformKind::Extended];

    /// File stem of the cached tensor for this transform.
    pub fn cache_key(self) -> &'static str {
        match self {
            TransformKind::Basic => "transform_data",
            TransformKind::MultiChannel => "transform_multichannel",
            TransformKind::Extended => "transform_nfl",
        }
    }

    /// `(channels, rows, cols)` of one sample.
    pub fn sample_shape(self) -> (usize, usize, usize) {
        match self {
            TransformKind::Basic => basic::SAMPLE_SHAPE,
            TransformKind::MultiChannel => multichannel::SAMPLE_SHAPE,
            TransformKind::Extended => extended::SAMPLE_SHAPE,
        }
    }

    pub fn apply(self, round: &RoundFrames, distance: &dyn MapDistance) -> Result<Array4<f32>> {
        match self {
            TransformKind::Basic => transform_basic(round, distance),
            TransformKind::MultiChannel => transform_multichannel(round, distance),
            TransformKind::Extended => transform_extended(round, distance),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

impl FromStr for TransformKind {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "transform_data" => Ok(TransformKind::Basic),
            "multichannel" | "multi-channel" | "transform_multichannel" => {
                Ok(TransformKind::MultiChannel)
            }
            "extended" | "nfl" | "transform_nfl" => Ok(TransformKind::Extended),
            _ => Err(ModelError::UnknownTransform(s.to_string())),
        }
    }
}

/// Rows of one tick keyed by player id (ascending).
pub(crate) struct TickFrame<'a> {
    pub tick: Tick,
    pub players: BTreeMap<PlayerId, &'a FrameRow>,
}

impl<'a> TickFrame<'a> {
    /// Row for `player_id`, or `MissingPlayer` if absent on this tick.
    pub fn row(&self, player_id: PlayerId) -> Result<&'a FrameRow> {
        self.players
            .get(&player_id)
            .copied()
            .ok_or(TransformError::MissingPlayer { tick: self.tick, player_id })
    }
}

pub(crate) fn tick_frames(round: &RoundFrames) -> Vec<TickFrame<'_>> {
    let mut by_tick: BTreeMap<Tick, BTreeMap<PlayerId, &FrameRow>> = BTreeMap::new();
    for row in &round.rows {
        by_tick.entry(row.tick).or_default().entry(row.player_id).or_insert(row);
    }
    by_tick.into_iter().map(|(tick, players)| TickFrame { tick, players }).collect()
}

/// Per-side rosters sorted by player id, fixed for the whole round.
pub(crate) struct Rosters {
    pub ct: Vec<PlayerId>,
    pub t: Vec<PlayerId>,
}

impl Rosters {
    pub fn of(round: &RoundFrames) -> Result<Self> {
        let ct = round.roster(Side::CT);
        let t = round.roster(Side::T);
        for (side, roster) in [(Side::CT, &ct), (Side::T, &t)] {
            if roster.len() != TEAM_SIZE {
                return Err(TransformError::RosterSize {
                    side,
                    expected: TEAM_SIZE,
                    found: roster.len(),
                });
            }
        }
        Ok(Self { ct, t })
    }

    /// Rows of both rosters on `frame`, T first then CT.
    pub fn rows<'a>(&self, frame: &TickFrame<'a>) -> Result<(Vec<&'a FrameRow>, Vec<&'a FrameRow>)> {
        if frame.players.len() != 2 * TEAM_SIZE {
            return Err(TransformError::ShapeMismatch {
                tick: frame.tick,
                expected: 2 * TEAM_SIZE,
                found: frame.players.len(),
            });
        }
        let t = self.t.iter().map(|&p| frame.row(p)).collect::<Result<Vec<_>>>()?;
        let ct = self.ct.iter().map(|&p| frame.row(p)).collect::<Result<Vec<_>>>()?;
        Ok((t, ct))
    }
}

fn area_distance(
    distance: &dyn MapDistance,
    map: &str,
    a: &FrameRow,
    b: &FrameRow,
) -> Result<f32> {
    Ok(distance.area_distance(map, a.area_id, b.area_id)? as f32)
}
