//! Deterministic synthetic rounds and navigation meshes for tests.

use crate::geometry::{NavArea, NavMesh};
use crate::models::{FrameRow, PlayerId, RoundFrames, RoundKey, Side, Tick};

/// Areas `1..=n` on a straight line, 100 units apart.
pub fn line_mesh(map: &str, n: u32) -> NavMesh {
    let areas = (1..=n)
        .map(|id| NavArea {
            id,
            center: [100.0 * id as f32, 0.0, 0.0],
            connections: if id < n { vec![id + 1] } else { vec![] },
        })
        .collect();
    NavMesh::from_areas(map, areas)
}

/// A row whose attributes are derived from the player id and tick.
///
/// Area ids fall in `1..=10`.
pub fn frame_row(key: &RoundKey, tick: Tick, player_id: PlayerId, side: Side) -> FrameRow {
    FrameRow {
        match_id: key.match_id,
        map_name: key.map_name.clone(),
        round_num: key.round_num,
        tick,
        player_id,
        side,
        x: player_id as f32 * 10.0,
        y: tick as f32,
        z: 0.0,
        area_id: ((player_id + tick as u64) % 10) as u32 + 1,
        hp: 100 - ((player_id as i64 + tick) % 50) as i32,
        armor: ((player_id * 13) % 101) as i32,
        is_alive: (player_id + tick as u64) % 7 != 0,
        eq_value: 650 + (player_id as i32 % 9) * 400,
        dist_to_bombsite_a: player_id as f32 * 12.5,
        dist_to_bombsite_b: 2000.0 - tick as f32,
    }
}

/// One round with the given rosters on every tick.
pub fn round(key: RoundKey, ticks: &[Tick], ct: &[PlayerId], t: &[PlayerId]) -> RoundFrames {
    let mut rows = Vec::with_capacity(ticks.len() * (ct.len() + t.len()));
    for &tick in ticks {
        for &p in ct {
            rows.push(frame_row(&key, tick, p, Side::CT));
        }
        for &p in t {
            rows.push(frame_row(&key, tick, p, Side::T));
        }
    }
    RoundFrames::new(key, rows)
}

/// A valid 5 vs 5 round: CT players `base+1..=base+5`, T `base+6..=base+10`.
pub fn full_round(key: RoundKey, ticks: &[Tick], base: PlayerId) -> RoundFrames {
    let ct: Vec<PlayerId> = (1..=5).map(|p| base + p).collect();
    let t: Vec<PlayerId> = (6..=10).map(|p| base + p).collect();
    round(key, ticks, &ct, &t)
}
