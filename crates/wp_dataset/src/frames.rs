//! Frames and round-outcome CSV readers.
//!
//! The frames dump comes in two layouts: the headerless 30-column database
//! export, and headered files (including the per-round files written by
//! [`write_round_csv`]) whose columns are located by name.

use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use wp_core::{FrameRow, RoundFrames, RoundKey, Side};

use crate::error::{DatasetError, Result};

/// Column order of the headerless player-frames export.
pub const HEADERLESS_COLUMNS: [&str; 30] = [
    "MatchId",
    "MapName",
    "RoundNum",
    "Tick",
    "Second",
    "PlayerId",
    "PlayerSteamId",
    "TeamId",
    "Side",
    "X",
    "Y",
    "Z",
    "ViewX",
    "ViewY",
    "AreaId",
    "Hp",
    "Armor",
    "IsAlive",
    "IsFlashed",
    "IsAirborne",
    "IsDucking",
    "IsScoped",
    "IsWalking",
    "EqValue",
    "HasHelmet",
    "HasDefuse",
    "DistToBombsiteA",
    "DistToBombsiteB",
    "Created",
    "Updated",
];

/// Columns written to per-round files, in order.
pub const ROUND_FILE_COLUMNS: [&str; 16] = [
    "MatchId",
    "MapName",
    "RoundNum",
    "Tick",
    "PlayerSteamId",
    "Side",
    "X",
    "Y",
    "Z",
    "AreaId",
    "Hp",
    "Armor",
    "IsAlive",
    "EqValue",
    "DistToBombsiteA",
    "DistToBombsiteB",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramesLayout {
    Headerless,
    Headered,
}

/// CSV parsing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub total_rows: u32,
    pub parsed: u32,
    pub failed: u32,
}

/// Positions of the columns a [`FrameRow`] is built from.
#[derive(Debug, Clone, Copy)]
struct FrameColumns {
    match_id: usize,
    map_name: usize,
    round_num: usize,
    tick: usize,
    player_id: usize,
    side: usize,
    x: usize,
    y: usize,
    z: usize,
    area_id: usize,
    hp: usize,
    armor: usize,
    is_alive: usize,
    eq_value: usize,
    dist_a: usize,
    dist_b: usize,
}

impl FrameColumns {
    fn locate<S: AsRef<str>>(header: &[S]) -> Result<Self> {
        let find = |names: &[&str]| -> Result<usize> {
            header
                .iter()
                .position(|h| names.iter().any(|n| h.as_ref().trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| DatasetError::Schema(format!("missing column {}", names[0])))
        };

        Ok(Self {
            match_id: find(&["MatchId"])?,
            map_name: find(&["MapName"])?,
            round_num: find(&["RoundNum"])?,
            tick: find(&["Tick"])?,
            player_id: find(&["PlayerSteamId", "SteamId"])?,
            side: find(&["Side"])?,
            x: find(&["X"])?,
            y: find(&["Y"])?,
            z: find(&["Z"])?,
            area_id: find(&["AreaId"])?,
            hp: find(&["Hp"])?,
            armor: find(&["Armor"])?,
            is_alive: find(&["IsAlive"])?,
            eq_value: find(&["EqValue"])?,
            dist_a: find(&["DistToBombsiteA"])?,
            dist_b: find(&["DistToBombsiteB"])?,
        })
    }

    fn width(&self) -> usize {
        [
            self.match_id,
            self.map_name,
            self.round_num,
            self.tick,
            self.player_id,
            self.side,
            self.x,
            self.y,
            self.z,
            self.area_id,
            self.hp,
            self.armor,
            self.is_alive,
            self.eq_value,
            self.dist_a,
            self.dist_b,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }

    fn parse(&self, record: &csv::StringRecord) -> std::result::Result<FrameRow, String> {
        if record.len() < self.width() {
            return Err(format!("{} fields (expected at least {})", record.len(), self.width()));
        }
        let field = |idx: usize| record[idx].trim();

        Ok(FrameRow {
            match_id: parse_int(field(self.match_id), "MatchId")?,
            map_name: field(self.map_name).to_string(),
            round_num: parse_int(field(self.round_num), "RoundNum")?,
            tick: parse_int(field(self.tick), "Tick")?,
            player_id: parse_int(field(self.player_id), "PlayerSteamId")?,
            side: Side::from_str(field(self.side)).map_err(|e| e.to_string())?,
            x: parse_float(field(self.x), "X")?,
            y: parse_float(field(self.y), "Y")?,
            z: parse_float(field(self.z), "Z")?,
            area_id: parse_int(field(self.area_id), "AreaId")?,
            hp: parse_int(field(self.hp), "Hp")?,
            armor: parse_int(field(self.armor), "Armor")?,
            is_alive: parse_bool(field(self.is_alive), "IsAlive")?,
            eq_value: parse_int(field(self.eq_value), "EqValue")?,
            dist_to_bombsite_a: parse_float(field(self.dist_a), "DistToBombsiteA")?,
            dist_to_bombsite_b: parse_float(field(self.dist_b), "DistToBombsiteB")?,
        })
    }
}

/// Integers may be exported as `"1234"` or `"1234.0"`. The integer part is
/// parsed exactly, so 17-digit steam ids survive a float-style export.
fn parse_int<T: FromStr>(value: &str, name: &str) -> std::result::Result<T, String> {
    let digits = match value.split_once('.') {
        Some((int, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => int,
        Some(_) => return Err(format!("Invalid {} value: '{}'", name, value)),
        None => value,
    };
    digits.parse::<T>().map_err(|_| format!("Invalid {} value: '{}'", name, value))
}

fn parse_float(value: &str, name: &str) -> std::result::Result<f32, String> {
    value.parse::<f32>().map_err(|_| format!("Invalid {} value: '{}'", name, value))
}

fn parse_bool(value: &str, name: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "1.0" => Ok(true),
        "false" | "f" | "0" | "0.0" | "" => Ok(false),
        _ => Err(format!("Invalid {} value: '{}'", name, value)),
    }
}

/// Parse a frames CSV file.
pub fn read_frames(path: &Path, layout: FramesLayout) -> Result<(Vec<FrameRow>, ParseStats)> {
    if !path.exists() {
        return Err(DatasetError::FileNotFound { path: path.display().to_string() });
    }
    let file = File::open(path)?;
    read_frames_from(file, layout)
}

/// Parse frames from any reader.
///
/// Malformed lines are counted in [`ParseStats::failed`] and skipped. An
/// input with lines but no parseable row is an error.
pub fn read_frames_from<R: io::Read>(
    reader: R,
    layout: FramesLayout,
) -> Result<(Vec<FrameRow>, ParseStats)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(layout == FramesLayout::Headered)
        .flexible(true)
        .from_reader(reader);

    let columns = match layout {
        FramesLayout::Headerless => FrameColumns::locate(&HEADERLESS_COLUMNS)?,
        FramesLayout::Headered => {
            let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
            FrameColumns::locate(&header)?
        }
    };

    let mut rows = Vec::new();
    let mut stats = ParseStats::default();

    for result in reader.records() {
        stats.total_rows += 1;
        match result {
            Ok(record) => match columns.parse(&record) {
                Ok(row) => {
                    rows.push(row);
                    stats.parsed += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    log::warn!("Line {} - {}, skipping", stats.total_rows, e);
                }
            },
            Err(e) => {
                stats.failed += 1;
                log::warn!("Line {} - CSV parse error: {}", stats.total_rows, e);
            }
        }
    }

    if stats.total_rows > 0 && stats.parsed == 0 {
        return Err(DatasetError::Schema("No valid frame rows parsed from CSV".to_string()));
    }

    Ok((rows, stats))
}

/// Winning side per round.
#[derive(Debug, Clone, Default)]
pub struct Outcomes {
    winners: FxHashMap<RoundKey, Side>,
}

impl Outcomes {
    pub fn insert(&mut self, key: RoundKey, winner: Side) {
        self.winners.insert(key, winner);
    }

    pub fn winner(&self, key: &RoundKey) -> Option<Side> {
        self.winners.get(key).copied()
    }

    /// Label for `key`: CT = 1, T = 0.
    pub fn label(&self, key: &RoundKey) -> Result<f32> {
        self.winner(key)
            .map(Side::label)
            .ok_or_else(|| DatasetError::MissingOutcome(key.clone()))
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}

impl FromIterator<(RoundKey, Side)> for Outcomes {
    fn from_iter<I: IntoIterator<Item = (RoundKey, Side)>>(iter: I) -> Self {
        Self { winners: iter.into_iter().collect() }
    }
}

/// Parse a headered rounds CSV (`WinningSide` or `RoundWinnerSide`).
pub fn read_outcomes(path: &Path) -> Result<Outcomes> {
    if !path.exists() {
        return Err(DatasetError::FileNotFound { path: path.display().to_string() });
    }
    read_outcomes_from(File::open(path)?)
}

pub fn read_outcomes_from<R: io::Read>(reader: R) -> Result<Outcomes> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let header = reader.headers()?.clone();
    let find = |names: &[&str]| {
        header
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
            .ok_or_else(|| DatasetError::Schema(format!("rounds CSV missing column {}", names[0])))
    };
    let match_col = find(&["MatchId"])?;
    let map_col = find(&["MapName"])?;
    let round_col = find(&["RoundNum"])?;
    let winner_col = find(&["WinningSide", "RoundWinnerSide"])?;

    let mut outcomes = Outcomes::default();
    let mut skipped = 0u32;

    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let parsed = (|| -> std::result::Result<(RoundKey, Side), String> {
            let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");
            let key = RoundKey::new(
                parse_int(field(match_col), "MatchId")?,
                field(map_col),
                parse_int(field(round_col), "RoundNum")?,
            );
            let winner = Side::from_str(field(winner_col)).map_err(|e| e.to_string())?;
            Ok((key, winner))
        })();

        match parsed {
            Ok((key, winner)) => outcomes.insert(key, winner),
            Err(e) => {
                skipped += 1;
                log::warn!("Rounds line {} - {}, skipping", line + 1, e);
            }
        }
    }

    log::debug!("Read {} round outcomes ({} skipped)", outcomes.len(), skipped);
    Ok(outcomes)
}

/// Write one round as a headered CSV with [`ROUND_FILE_COLUMNS`].
pub fn write_round_csv<W: io::Write>(writer: W, round: &RoundFrames) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(ROUND_FILE_COLUMNS)?;
    for row in &round.rows {
        writer.write_record([
            row.match_id.to_string(),
            row.map_name.clone(),
            row.round_num.to_string(),
            row.tick.to_string(),
            row.player_id.to_string(),
            row.side.to_string(),
            row.x.to_string(),
            row.y.to_string(),
            row.z.to_string(),
            row.area_id.to_string(),
            row.hp.to_string(),
            row.armor.to_string(),
            row.is_alive.to_string(),
            row.eq_value.to_string(),
            row.dist_to_bombsite_a.to_string(),
            row.dist_to_bombsite_b.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wp_core::synthetic;

    const HEADERLESS: &str = "\
101,de_dust2,1,5000,78.1,1,76561198000000001,11,CT,-100.5,200.25,10.0,0,0,1234,100,100,True,False,False,False,False,False,4700,True,False,1500.5,900.0,2020-01-01,2020-01-01
101,de_dust2,1,5000,78.1,2,76561198000000002,12,T,1.0,2.0,3.0,0,0,77.0,35,0,False,False,False,False,False,False,850,False,False,10.0,20.0,2020-01-01,2020-01-01
";

    #[test]
    fn test_headerless_layout() {
        let (rows, stats) = read_frames_from(HEADERLESS.as_bytes(), FramesLayout::Headerless).unwrap();
        assert_eq!(stats, ParseStats { total_rows: 2, parsed: 2, failed: 0 });

        let ct = &rows[0];
        assert_eq!(ct.match_id, 101);
        assert_eq!(ct.map_name, "de_dust2");
        assert_eq!(ct.tick, 5000);
        assert_eq!(ct.player_id, 76561198000000001);
        assert_eq!(ct.side, Side::CT);
        assert_eq!(ct.x, -100.5);
        assert_eq!(ct.area_id, 1234);
        assert!(ct.is_alive);
        assert_eq!(ct.eq_value, 4700);
        assert_eq!(ct.dist_to_bombsite_a, 1500.5);

        let t = &rows[1];
        assert_eq!(t.area_id, 77);
        assert!(!t.is_alive);
        assert_eq!(t.hp, 35);
    }

    #[test]
    fn test_float_style_steam_ids_stay_exact() {
        let csv = "\
MatchId,MapName,RoundNum,Tick,PlayerSteamId,Side,X,Y,Z,AreaId,Hp,Armor,IsAlive,EqValue,DistToBombsiteA,DistToBombsiteB
1.0,de_dust2,2.0,10.0,76561198000000001.0,CT,0,0,0,3.0,100.0,50,1,1000,1.5,2.5
1.0,de_dust2,2.0,10.0,76561198000000003.0,T,0,0,0,3.0,100.0,50,1,1000,1.5,2.5
1,de_dust2,2,10,76561198000000005.5,T,0,0,0,3,100,50,1,1000,1.5,2.5
";
        let (rows, stats) = read_frames_from(csv.as_bytes(), FramesLayout::Headered).unwrap();
        assert_eq!(stats, ParseStats { total_rows: 3, parsed: 2, failed: 1 });
        assert_eq!(rows[0].player_id, 76561198000000001);
        assert_eq!(rows[1].player_id, 76561198000000003);
        assert_eq!(rows[0].round_num, 2);
        assert_eq!(rows[0].area_id, 3);

        assert_eq!(parse_int::<i64>("-12.00", "Tick"), Ok(-12));
        assert!(parse_int::<i64>("12.", "Tick").is_err());
    }

    #[test]
    fn test_headered_layout_with_alias_and_bad_line() {
        let csv = "\
Tick,SteamId,Side,MatchId,MapName,RoundNum,X,Y,Z,AreaId,Hp,Armor,IsAlive,EqValue,DistToBombsiteA,DistToBombsiteB
10,5,CT,1,de_dust2,2,0,0,0,3,100,50,1,1000,1.5,2.5
11,5,SPEC,1,de_dust2,2,0,0,0,3,100,50,1,1000,1.5,2.5
";
        let (rows, stats) = read_frames_from(csv.as_bytes(), FramesLayout::Headered).unwrap();
        assert_eq!(stats, ParseStats { total_rows: 2, parsed: 1, failed: 1 });
        assert_eq!(rows[0].player_id, 5);
        assert_eq!(rows[0].round_num, 2);
        assert_eq!(rows[0].dist_to_bombsite_b, 2.5);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let csv = "MatchId,MapName\n1,de_dust2\n";
        let err = read_frames_from(csv.as_bytes(), FramesLayout::Headered).unwrap_err();
        assert!(matches!(err, DatasetError::Schema(_)));
    }

    #[test]
    fn test_nothing_parsed_is_error() {
        let csv = "garbage,line\n";
        assert!(read_frames_from(csv.as_bytes(), FramesLayout::Headerless).is_err());
    }

    #[test]
    fn test_outcomes_accept_both_winner_columns() {
        let a = "MatchId,MapName,RoundNum,WinningSide\n1,de_dust2,1,CT\n1,de_dust2,2,T\n";
        let b = "RoundNum,MapName,MatchId,RoundWinnerSide\n1,de_dust2,1,CT\n";

        let outcomes = read_outcomes_from(a.as_bytes()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.label(&RoundKey::new(1, "de_dust2", 1)).unwrap(), 1.0);
        assert_eq!(outcomes.label(&RoundKey::new(1, "de_dust2", 2)).unwrap(), 0.0);
        assert!(matches!(
            outcomes.label(&RoundKey::new(1, "de_dust2", 3)),
            Err(DatasetError::MissingOutcome(_))
        ));

        let outcomes = read_outcomes_from(b.as_bytes()).unwrap();
        assert_eq!(outcomes.winner(&RoundKey::new(1, "de_dust2", 1)), Some(Side::CT));
    }

    #[test]
    fn test_round_csv_reads_back() {
        let round = synthetic::full_round(RoundKey::new(9, "de_dust2", 4), &[1, 2, 3], 0);
        let mut bytes = Vec::new();
        write_round_csv(&mut bytes, &round).unwrap();

        let (rows, stats) = read_frames_from(bytes.as_slice(), FramesLayout::Headered).unwrap();
        assert_eq!(stats.failed, 0);
        assert_eq!(rows, round.rows);
    }
}
