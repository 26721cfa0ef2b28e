use ndarray::Array4;

use super::{area_distance, tick_frames, Rosters};
use crate::error::Result;
use crate::geometry::MapDistance;
use crate::models::{FrameRow, RoundFrames, TEAM_SIZE};

pub(super) const SAMPLE_SHAPE: (usize, usize, usize) = (7, TEAM_SIZE, TEAM_SIZE);

const HP_DIFF: usize = 0;
const ARMOR_DIFF: usize = 1;
const EQUIP_DIFF: usize = 2;
const BOMB_A_DIFF: usize = 3;
const BOMB_B_DIFF: usize = 4;
const AREA_DIST: usize = 5;
const BOMB_A_MIRRORED: usize = 6;

type Attribute = fn(&FrameRow) -> f32;

const DIFF_CHANNELS: [(usize, Attribute); 5] = [
    (HP_DIFF, |r| r.hp as f32),
    (ARMOR_DIFF, |r| r.armor as f32),
    (EQUIP_DIFF, |r| r.eq_value as f32),
    (BOMB_A_DIFF, |r| r.dist_to_bombsite_a),
    (BOMB_B_DIFF, |r| r.dist_to_bombsite_b),
];

/// CT-vs-T attribute tensor, `7 × 5 × 5` per tick.
///
/// Rows are CT players, columns T players. Difference channels hold
/// `value(row) - value(column)`. Channel 6 is the T-vs-CT bombsite-A block,
/// transposed back into CT-by-T layout, so it is the negation of channel 3.
pub fn transform_extended(round: &RoundFrames, distance: &dyn MapDistance) -> Result<Array4<f32>> {
    let frames = tick_frames(round);
    let map = round.key.map_name.as_str();
    let (channels, rows, cols) = SAMPLE_SHAPE;
    let mut out = Array4::<f32>::zeros((frames.len(), channels, rows, cols));

    if frames.is_empty() {
        return Ok(out);
    }
    let rosters = Rosters::of(round)?;

    for (sample, frame) in frames.iter().enumerate() {
        let (t, ct) = rosters.rows(frame)?;

        for (i, ct_row) in ct.iter().enumerate() {
            for (j, t_row) in t.iter().enumerate() {
                for (channel, value) in DIFF_CHANNELS {
                    out[[sample, channel, i, j]] = value(ct_row) - value(t_row);
                }
                out[[sample, AREA_DIST, i, j]] = area_distance(distance, map, ct_row, t_row)?;
            }
        }

        // T-vs-CT block: row = T rank, column = CT rank; written transposed
        for (r, t_row) in t.iter().enumerate() {
            for (c, ct_row) in ct.iter().enumerate() {
                out[[sample, BOMB_A_MIRRORED, c, r]] =
                    t_row.dist_to_bombsite_a - ct_row.dist_to_bombsite_a;
            }
        }
    }

    Ok(out)
}
