//! Map-aware distances between players.
//!
//! Area distance is the shortest walkable path between two navigation areas,
//! following area connections with Euclidean edge costs between area centres.
//! Shortest paths are computed once per source area and memoised.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ordered_float::OrderedFloat;
use pathfinding::prelude::dijkstra_all;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::DistanceError;
use crate::models::AreaId;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        let dz = self.z as f64 - other.z as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl From<[f32; 3]> for Point3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Distance lookups used by the tensor transforms.
///
/// Implementations must be deterministic, and `area_distance` must be
/// symmetric, non-negative, and zero for identical areas.
pub trait MapDistance: Send + Sync {
    fn area_distance(&self, map: &str, a: AreaId, b: AreaId) -> Result<f64, DistanceError>;

    /// Straight-line distance; map geometry is not consulted.
    fn point_distance(&self, _map: &str, a: Point3, b: Point3) -> Result<f64, DistanceError> {
        Ok(a.distance(&b))
    }
}

/// One navigation area as stored in a nav JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavArea {
    pub id: AreaId,
    pub center: [f32; 3],
    #[serde(default)]
    pub connections: Vec<AreaId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NavFile {
    map: String,
    areas: Vec<NavArea>,
}

type DistanceRow = Arc<FxHashMap<AreaId, f64>>;

/// Navigation graph for a single map.
#[derive(Debug)]
pub struct NavMesh {
    map: String,
    centers: FxHashMap<AreaId, [f32; 3]>,
    adjacency: FxHashMap<AreaId, Vec<AreaId>>,
    memo: Mutex<FxHashMap<AreaId, DistanceRow>>,
}

impl NavMesh {
    /// Builds the graph; connections are made undirected.
    pub fn from_areas(map: impl Into<String>, areas: Vec<NavArea>) -> Self {
        let mut centers = FxHashMap::default();
        let mut adjacency: FxHashMap<AreaId, Vec<AreaId>> = FxHashMap::default();

        for area in &areas {
            centers.insert(area.id, area.center);
            adjacency.entry(area.id).or_default();
        }

        for area in &areas {
            for &other in &area.connections {
                if other == area.id || !centers.contains_key(&other) {
                    continue;
                }
                adjacency.entry(area.id).or_default().push(other);
                adjacency.entry(other).or_default().push(area.id);
            }
        }

        for neighbours in adjacency.values_mut() {
            neighbours.sort_unstable();
            neighbours.dedup();
        }

        Self { map: map.into(), centers, adjacency, memo: Mutex::new(FxHashMap::default()) }
    }

    pub fn from_json_str(json: &str) -> Result<Self, DistanceError> {
        let file: NavFile = serde_json::from_str(json)?;
        Ok(Self::from_areas(file.map, file.areas))
    }

    pub fn load(path: &Path) -> Result<Self, DistanceError> {
        let json = fs::read_to_string(path)?;
        let mesh = Self::from_json_str(&json)?;
        log::debug!("Loaded nav mesh '{}' ({} areas) from {:?}", mesh.map, mesh.len(), path);
        Ok(mesh)
    }

    pub fn map_name(&self) -> &str {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn area_center(&self, area: AreaId) -> Option<Point3> {
        self.centers.get(&area).copied().map(Point3::from)
    }

    /// Shortest path length between two areas, `INFINITY` when disconnected.
    pub fn path_length(&self, a: AreaId, b: AreaId) -> Result<f64, DistanceError> {
        self.check_area(a)?;
        self.check_area(b)?;

        if a == b {
            return Ok(0.0);
        }

        // Both directions give the same value; always expand from the lower id
        // so the memo is shared.
        let (source, target) = if a < b { (a, b) } else { (b, a) };
        let row = self.distances_from(source);
        Ok(row.get(&target).copied().unwrap_or(f64::INFINITY))
    }

    fn check_area(&self, area: AreaId) -> Result<(), DistanceError> {
        if self.centers.contains_key(&area) {
            Ok(())
        } else {
            Err(DistanceError::UnknownArea { map: self.map.clone(), area })
        }
    }

    fn distances_from(&self, source: AreaId) -> DistanceRow {
        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(row) = memo.get(&source) {
            return Arc::clone(row);
        }

        let reached = dijkstra_all(&source, |&area| self.successors(area));
        let row: FxHashMap<AreaId, f64> =
            reached.into_iter().map(|(area, (_, cost))| (area, cost.into_inner())).collect();
        let row = Arc::new(row);
        memo.insert(source, Arc::clone(&row));
        row
    }

    fn successors(&self, area: AreaId) -> Vec<(AreaId, OrderedFloat<f64>)> {
        let from = Point3::from(self.centers[&area]);
        self.adjacency
            .get(&area)
            .map(|neighbours| {
                neighbours
                    .iter()
                    .map(|n| (*n, OrderedFloat(from.distance(&Point3::from(self.centers[n])))))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl MapDistance for NavMesh {
    fn area_distance(&self, map: &str, a: AreaId, b: AreaId) -> Result<f64, DistanceError> {
        if map != self.map {
            return Err(DistanceError::UnknownMap(map.to_string()));
        }
        self.path_length(a, b)
    }
}

/// Navigation meshes for several maps, keyed by map name.
#[derive(Debug, Default)]
pub struct NavLibrary {
    meshes: FxHashMap<String, NavMesh>,
}

impl NavLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: NavMesh) {
        self.meshes.insert(mesh.map_name().to_string(), mesh);
    }

    /// Loads every `*.json` nav file in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, DistanceError> {
        let mut library = Self::new();
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            library.insert(NavMesh::load(&path)?);
        }

        log::info!("Loaded {} nav meshes from {:?}", library.len(), dir);
        Ok(library)
    }

    pub fn get(&self, map: &str) -> Option<&NavMesh> {
        self.meshes.get(map)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn maps(&self) -> Vec<&str> {
        let mut maps: Vec<&str> = self.meshes.keys().map(String::as_str).collect();
        maps.sort_unstable();
        maps
    }
}

impl From<NavMesh> for NavLibrary {
    fn from(mesh: NavMesh) -> Self {
        let mut library = Self::new();
        library.insert(mesh);
        library
    }
}

impl MapDistance for NavLibrary {
    fn area_distance(&self, map: &str, a: AreaId, b: AreaId) -> Result<f64, DistanceError> {
        self.get(map)
            .ok_or_else(|| DistanceError::UnknownMap(map.to_string()))?
            .path_length(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Square 1-2-3-4 with a diagonal shortcut 1-3 and an island area 9.
    fn square() -> NavMesh {
        NavMesh::from_areas(
            "de_test",
            vec![
                NavArea { id: 1, center: [0.0, 0.0, 0.0], connections: vec![2, 3] },
                NavArea { id: 2, center: [3.0, 0.0, 0.0], connections: vec![3] },
                NavArea { id: 3, center: [3.0, 4.0, 0.0], connections: vec![4] },
                NavArea { id: 4, center: [0.0, 4.0, 0.0], connections: vec![] },
                NavArea { id: 9, center: [50.0, 50.0, 0.0], connections: vec![] },
            ],
        )
    }

    #[test]
    fn test_point_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 12.0);
        assert!((a.distance(&b) - 13.0).abs() < 1e-9);
        assert_eq!(square().point_distance("de_test", a, b).unwrap(), a.distance(&b));
    }

    #[test]
    fn test_same_area_is_zero() {
        let mesh = square();
        assert_eq!(mesh.area_distance("de_test", 3, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_shortest_path_uses_diagonal() {
        let mesh = square();
        // 1 -> 3 directly is 5.0, cheaper than 1 -> 2 -> 3 (7.0)
        assert!((mesh.area_distance("de_test", 1, 3).unwrap() - 5.0).abs() < 1e-9);
        // 1 -> 4 has no direct edge: via 3 is 5 + 3
        assert!((mesh.area_distance("de_test", 1, 4).unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_connections_are_undirected() {
        let mesh = square();
        // area 4 lists no connections but is reachable through 3
        assert!((mesh.area_distance("de_test", 4, 3).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_disconnected_area_is_infinite() {
        let mesh = square();
        assert!(mesh.area_distance("de_test", 1, 9).unwrap().is_infinite());
    }

    #[test]
    fn test_unknown_area_and_map() {
        let mesh = square();
        assert!(matches!(
            mesh.area_distance("de_test", 1, 77),
            Err(DistanceError::UnknownArea { area: 77, .. })
        ));
        assert!(matches!(mesh.area_distance("de_inferno", 1, 2), Err(DistanceError::UnknownMap(_))));
    }

    #[test]
    fn test_library_dispatches_by_map() {
        let library = NavLibrary::from(square());
        assert_eq!(library.maps(), vec!["de_test"]);
        assert!((library.area_distance("de_test", 1, 2).unwrap() - 3.0).abs() < 1e-9);
        assert!(matches!(library.area_distance("de_nuke", 1, 2), Err(DistanceError::UnknownMap(_))));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let json = serde_json::json!({
            "map": "de_line",
            "areas": [
                { "id": 1, "center": [0.0, 0.0, 0.0], "connections": [2] },
                { "id": 2, "center": [10.0, 0.0, 0.0] }
            ]
        });
        fs::write(dir.path().join("de_line.json"), json.to_string()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = NavLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert!((library.area_distance("de_line", 2, 1).unwrap() - 10.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_area_distance_symmetric(a in prop::sample::select(vec![1u32, 2, 3, 4, 9]),
                                        b in prop::sample::select(vec![1u32, 2, 3, 4, 9])) {
            let mesh = square();
            let ab = mesh.area_distance("de_test", a, b).unwrap();
            let ba = mesh.area_distance("de_test", b, a).unwrap();
            prop_assert!(ab >= 0.0);
            prop_assert_eq!(ab.to_bits(), ba.to_bits());
        }
    }
}
