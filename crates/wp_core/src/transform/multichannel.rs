use ndarray::Array4;

use super::{area_distance, tick_frames, Rosters};
use crate::error::Result;
use crate::geometry::MapDistance;
use crate::models::{FrameRow, RoundFrames, TEAM_SIZE};

pub(super) const SAMPLE_SHAPE: (usize, usize, usize) = (6, TEAM_SIZE, TEAM_SIZE);

const T_VS_T: usize = 0;
const CT_VS_CT: usize = 1;
const T_VS_CT: usize = 2;
const CT_VS_T: usize = 3;
const T_ALIVE: usize = 4;
const CT_ALIVE: usize = 5;

/// Team-aware `6 × 5 × 5` tensor per tick.
///
/// Channels: T-vs-T, CT-vs-CT, T-vs-CT and CT-vs-T area distances, then the
/// T and CT alive flags on the diagonal.
pub fn transform_multichannel(
    round: &RoundFrames,
    distance: &dyn MapDistance,
) -> Result<Array4<f32>> {
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

        let blocks: [(usize, &[&FrameRow], &[&FrameRow]); 4] = [
            (T_VS_T, t.as_slice(), t.as_slice()),
            (CT_VS_CT, ct.as_slice(), ct.as_slice()),
            (T_VS_CT, t.as_slice(), ct.as_slice()),
            (CT_VS_T, ct.as_slice(), t.as_slice()),
        ];
        for (channel, from, to) in blocks {
            for (i, a) in from.iter().enumerate() {
                for (j, b) in to.iter().enumerate() {
                    out[[sample, channel, i, j]] = area_distance(distance, map, a, b)?;
                }
            }
        }

        for (rank, player) in t.iter().enumerate() {
            out[[sample, T_ALIVE, rank, rank]] = player.is_alive as u8 as f32;
        }
        for (rank, player) in ct.iter().enumerate() {
            out[[sample, CT_ALIVE, rank, rank]] = player.is_alive as u8 as f32;
        }
    }

    Ok(out)
}
