use thiserror::Error;

use crate::models::{AreaId, Side, Tick};

/// Errors raised while parsing telemetry values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid side: '{0}' (expected CT or T)")]
    InvalidSide(String),

    #[error("Unknown transform: '{0}'")]
    UnknownTransform(String),
}

/// Errors raised by map distance lookups.
#[derive(Error, Debug)]
pub enum DistanceError {
    #[error("No navigation mesh loaded for map '{0}'")]
    UnknownMap(String),

    #[error("Area {area} not present in navigation mesh for '{map}'")]
    UnknownArea { map: String, area: AreaId },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Navigation mesh parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while building per-tick tensors.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Tick {tick}: expected {expected} players, found {found}")]
    ShapeMismatch { tick: Tick, expected: usize, found: usize },

    #[error("Round has {found} {side} players, expected {expected}")]
    RosterSize { side: Side, expected: usize, found: usize },

    #[error("Tick {tick}: roster player {player_id} missing")]
    MissingPlayer { tick: Tick, player_id: u64 },

    #[error(transparent)]
    Distance(#[from] DistanceError),
}

impl TransformError {
    /// Shape errors mean the round should have been rejected upstream.
    pub fn is_shape_error(&self) -> bool {
        !matches!(self, TransformError::Distance(_))
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
