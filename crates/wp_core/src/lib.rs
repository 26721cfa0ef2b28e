//! # wp_core - round telemetry to per-tick tensors
//!
//! Turns CS:GO player-frame telemetry into fixed-shape tensors for a round
//! win-probability classifier.
//!
//! ## Features
//! - Telemetry model with the 5 vs 5 round invariant
//! - Map-aware area distances over navigation meshes
//! - Three transforms: basic (`1×12×10`), multi-channel (`6×5×5`),
//!   extended attributes (`7×5×5`)

pub mod error;
pub mod geometry;
pub mod models;
#[cfg(any(test, feature = "synthetic"))]
pub mod synthetic;
pub mod transform;

pub use error::{DistanceError, ModelError, TransformError};
pub use geometry::{MapDistance, NavArea, NavLibrary, NavMesh, Point3};
pub use models::{
    AreaId, FrameRow, MatchId, PlayerId, RoundDefect, RoundFrames, RoundKey, RoundNum, Side, Tick,
    PLAYERS_PER_TICK, TEAM_SIZE,
};
pub use transform::{transform_basic, transform_extended, transform_multichannel, TransformKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
