use ndarray::Array4;

use super::{area_distance, tick_frames};
use crate::error::{Result, TransformError};
use crate::geometry::MapDistance;
use crate::models::{RoundFrames, PLAYERS_PER_TICK};

const ROWS: usize = PLAYERS_PER_TICK + 2;
const COLS: usize = PLAYERS_PER_TICK;

pub(super) const SAMPLE_SHAPE: (usize, usize, usize) = (1, ROWS, COLS);

/// Single-channel `12 × 10` matrix per tick.
///
/// Rows 0..10 hold the area distance from each player (row) to every player
/// (column), self-pairs included. The trailing 20 cells hold an
/// `[alive, is_ct]` pair per player in rank order, packed row-major, so
/// player `r` lands at flat offsets `100 + 2r` and `101 + 2r`.
pub fn transform_basic(round: &RoundFrames, distance: &dyn MapDistance) -> Result<Array4<f32>> {
    let frames = tick_frames(round);
    let map = round.key.map_name.as_str();
    let mut out = Array4::<f32>::zeros((frames.len(), 1, ROWS, COLS));

    for (sample, frame) in frames.iter().enumerate() {
        if frame.players.len() != PLAYERS_PER_TICK {
            return Err(TransformError::ShapeMismatch {
                tick: frame.tick,
                expected: PLAYERS_PER_TICK,
                found: frame.players.len(),
            });
        }

        let players: Vec<_> = frame.players.values().copied().collect();

        for (i, from) in players.iter().enumerate() {
            for (j, to) in players.iter().enumerate() {
                out[[sample, 0, i, j]] = area_distance(distance, map, from, to)?;
            }
        }

        for (rank, player) in players.iter().enumerate() {
            let alive = PLAYERS_PER_TICK * PLAYERS_PER_TICK + 2 * rank;
            let is_ct = alive + 1;
            out[[sample, 0, alive / COLS, alive % COLS]] = player.is_alive as u8 as f32;
            out[[sample, 0, is_ct / COLS, is_ct % COLS]] = player.side.is_ct() as u8 as f32;
        }
    }

    Ok(out)
}
