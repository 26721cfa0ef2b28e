//! Telemetry model: one row per (match, map, round, tick, player).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::geometry::Point3;

pub type MatchId = i64;
pub type RoundNum = u32;
pub type Tick = i64;
pub type PlayerId = u64;
pub type AreaId = u32;

/// Players per side on every tick of a valid round.
pub const TEAM_SIZE: usize = 5;

/// Players on every tick of a valid round.
pub const PLAYERS_PER_TICK: usize = 2 * TEAM_SIZE;

/// Team affiliation within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    CT,
    T,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::CT, Side::T];

    /// Classifier label for a round won by this side (CT = 1, T = 0).
    pub fn label(self) -> f32 {
        match self {
            Side::CT => 1.0,
            Side::T => 0.0,
        }
    }

    pub fn is_ct(self) -> bool {
        self == Side::CT
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::CT => "CT",
            Side::T => "T",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CT" | "COUNTERTERRORIST" | "COUNTER-TERRORIST" => Ok(Side::CT),
            "T" | "TERRORIST" => Ok(Side::T),
            _ => Err(ModelError::InvalidSide(s.to_string())),
        }
    }
}

/// Identity of a round within the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundKey {
    pub match_id: MatchId,
    pub map_name: String,
    pub round_num: RoundNum,
}

impl RoundKey {
    pub fn new(match_id: MatchId, map_name: impl Into<String>, round_num: RoundNum) -> Self {
        Self { match_id, map_name: map_name.into(), round_num }
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.match_id, self.map_name, self.round_num)
    }
}

/// One player observation on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub match_id: MatchId,
    pub map_name: String,
    pub round_num: RoundNum,
    pub tick: Tick,
    pub player_id: PlayerId,
    pub side: Side,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub area_id: AreaId,
    pub hp: i32,
    pub armor: i32,
    pub is_alive: bool,
    pub eq_value: i32,
    pub dist_to_bombsite_a: f32,
    pub dist_to_bombsite_b: f32,
}

impl FrameRow {
    pub fn round_key(&self) -> RoundKey {
        RoundKey::new(self.match_id, self.map_name.clone(), self.round_num)
    }

    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Why a round cannot be turned into fixed-shape samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundDefect {
    /// A side does not field exactly [`TEAM_SIZE`] distinct players.
    TeamSize { side: Side, found: usize },
    /// A tick without exactly one row per player, [`TEAM_SIZE`] per side.
    RaggedTick { tick: Tick, rows: usize, ct: usize, t: usize },
}

impl fmt::Display for RoundDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundDefect::TeamSize { side, found } => {
                write!(f, "{} {} players (expected {})", found, side, TEAM_SIZE)
            }
            RoundDefect::RaggedTick { tick, rows, ct, t } => write!(
                f,
                "tick {}: {} rows, {} CT / {} T players (expected {} rows, {} per side)",
                tick, rows, ct, t, PLAYERS_PER_TICK, TEAM_SIZE
            ),
        }
    }
}

#[derive(Default)]
struct TickTally {
    rows: usize,
    players: BTreeSet<PlayerId>,
    ct: BTreeSet<PlayerId>,
    t: BTreeSet<PlayerId>,
}

/// All rows recorded for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundFrames {
    pub key: RoundKey,
    pub rows: Vec<FrameRow>,
}

impl RoundFrames {
    pub fn new(key: RoundKey, rows: Vec<FrameRow>) -> Self {
        Self { key, rows }
    }

    pub fn distinct_ticks(&self) -> BTreeSet<Tick> {
        self.rows.iter().map(|r| r.tick).collect()
    }

    pub fn tick_count(&self) -> usize {
        self.distinct_ticks().len()
    }

    /// Distinct player ids seen on `side`, ascending.
    pub fn roster(&self, side: Side) -> Vec<PlayerId> {
        self.rows
            .iter()
            .filter(|r| r.side == side)
            .map(|r| r.player_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Checks the 5 vs 5 invariant across the whole round.
    ///
    /// Both sides must field exactly [`TEAM_SIZE`] distinct players over the
    /// round. Every tick must hold exactly [`PLAYERS_PER_TICK`] raw rows from
    /// as many distinct players, [`TEAM_SIZE`] on each side.
    pub fn defect(&self) -> Option<RoundDefect> {
        for side in Side::BOTH {
            let found = self.roster(side).len();
            if found != TEAM_SIZE {
                return Some(RoundDefect::TeamSize { side, found });
            }
        }

        let mut ticks: BTreeMap<Tick, TickTally> = BTreeMap::new();
        for row in &self.rows {
            let tally = ticks.entry(row.tick).or_default();
            tally.rows += 1;
            tally.players.insert(row.player_id);
            match row.side {
                Side::CT => tally.ct.insert(row.player_id),
                Side::T => tally.t.insert(row.player_id),
            };
        }

        ticks.into_iter().find_map(|(tick, tally)| {
            let complete = tally.rows == PLAYERS_PER_TICK
                && tally.players.len() == PLAYERS_PER_TICK
                && tally.ct.len() == TEAM_SIZE
                && tally.t.len() == TEAM_SIZE;
            (!complete).then(|| RoundDefect::RaggedTick {
                tick,
                rows: tally.rows,
                ct: tally.ct.len(),
                t: tally.t.len(),
            })
        })
    }

    pub fn is_valid(&self) -> bool {
        self.defect().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tick: Tick, player_id: PlayerId, side: Side) -> FrameRow {
        FrameRow {
            match_id: 1,
            map_name: "de_dust2".to_string(),
            round_num: 1,
            tick,
            player_id,
            side,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            area_id: 1,
            hp: 100,
            armor: 100,
            is_alive: true,
            eq_value: 800,
            dist_to_bombsite_a: 0.0,
            dist_to_bombsite_b: 0.0,
        }
    }

    fn round(ct: usize, t: usize, ticks: &[Tick]) -> RoundFrames {
        let mut rows = Vec::new();
        for &tick in ticks {
            for p in 0..ct {
                rows.push(row(tick, p as PlayerId + 1, Side::CT));
            }
            for p in 0..t {
                rows.push(row(tick, p as PlayerId + 100, Side::T));
            }
        }
        RoundFrames::new(RoundKey::new(1, "de_dust2", 1), rows)
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("CT".parse::<Side>().unwrap(), Side::CT);
        assert_eq!(" t ".parse::<Side>().unwrap(), Side::T);
        assert_eq!("Terrorist".parse::<Side>().unwrap(), Side::T);
        assert!("SPECTATOR".parse::<Side>().is_err());
        assert_eq!(Side::CT.label(), 1.0);
        assert_eq!(Side::T.label(), 0.0);
    }

    #[test]
    fn test_valid_round_has_no_defect() {
        let r = round(5, 5, &[10, 11, 12]);
        assert!(r.is_valid());
        assert_eq!(r.tick_count(), 3);
        assert_eq!(r.roster(Side::CT), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_short_side_is_defect() {
        let r = round(4, 5, &[10, 11]);
        assert_eq!(r.defect(), Some(RoundDefect::TeamSize { side: Side::CT, found: 4 }));
    }

    #[test]
    fn test_missing_side_is_defect() {
        let r = round(5, 0, &[10]);
        assert_eq!(r.defect(), Some(RoundDefect::TeamSize { side: Side::T, found: 0 }));
    }

    #[test]
    fn test_ragged_ticks_are_defect() {
        let mut r = round(5, 5, &[10, 11]);
        // drop one player from the second tick
        r.rows.pop();
        assert_eq!(
            r.defect(),
            Some(RoundDefect::RaggedTick { tick: 11, rows: 9, ct: 5, t: 4 })
        );
    }

    #[test]
    fn test_duplicate_row_hiding_missing_player_is_defect() {
        let mut r = round(5, 5, &[1, 2]);
        // player 1 twice on tick 1, player 2 absent on tick 2: still 20 rows
        let dup = row(1, 1, Side::CT);
        r.rows.retain(|x| !(x.tick == 2 && x.player_id == 2));
        r.rows.push(dup);
        assert_eq!(r.rows.len(), 20);
        assert_eq!(
            r.defect(),
            Some(RoundDefect::RaggedTick { tick: 1, rows: 11, ct: 5, t: 5 })
        );
    }

    #[test]
    fn test_player_on_both_sides_in_one_tick_is_defect() {
        let mut r = round(5, 5, &[1]);
        // T player 100 also recorded as CT instead of CT player 5
        r.rows.retain(|x| x.player_id != 5);
        r.rows.push(row(1, 100, Side::CT));
        assert_eq!(r.roster(Side::CT).len(), TEAM_SIZE);
        assert_eq!(
            r.defect(),
            Some(RoundDefect::RaggedTick { tick: 1, rows: 10, ct: 5, t: 5 })
        );
    }
}
