//! ViaStitch - stitching-via placement for PCB copper zones
//!
//! This library fills a copper zone with stitching vias: it scans the
//! zone's filled copper row by row, keeps candidates clear of the zone
//! edge and of existing board items, and tracks which vias it owns so an
//! array can be regenerated or removed later.
//!
//! # Quick Start
//!
//! ```no_run
//! use viastitch::{MemoryBoard, RunOptions, StitchCore, StitchState, UpdateOptions};
//! use std::path::Path;
//!
//! let mut board = MemoryBoard::load(Path::new("board.json")).unwrap();
//! let mut state = StitchState::load(Path::new("stitching.json")).unwrap();
//!
//! let report = StitchCore::update_array(
//!     &mut board,
//!     &mut state,
//!     "gnd-top",
//!     &UpdateOptions::default(),
//!     &mut RunOptions::default(),
//! ).unwrap();
//!
//! println!("placed {} vias ({})", report.placed(), report.placement.strategy);
//! state.save(Path::new("stitching.json")).unwrap();
//! ```
//!
//! # Features
//!
//! - **Grid placement**: phase-aligned or centered columns per filled row
//! - **Maximize**: phase search over grid offsets plus a dense packer
//! - **Target count**: exact-count grid, staggered or spiral patterns
//! - **Ownership**: regenerate, remove and orphan cleanup of owned vias

pub mod board;
pub mod candidates;
pub mod core;
pub mod geometry;
pub mod host;
pub mod obstacles;
pub mod ownership;
pub mod placement;
pub mod settings;
pub mod spatial;
pub mod state;
pub mod zone;

// Re-export main types
pub use board::{BoardPad, BoardSnapshot, BoardTrack, BoardVia};
pub use core::{
    CleanReport, RemoveReport, StitchCore, StitchError, UpdateOptions, UpdateReport,
};
pub use geometry::{BoundingBox, Interval, Point, Polygon};
pub use host::{BoardHost, HostError, MemoryBoard};
pub use obstacles::{Obstacle, ObstacleFilter, ObstacleIndex};
pub use ownership::{OrphanScan, OrphanVia};
pub use placement::{
    place_vias, CancelFlag, PlacementParams, PlacementResult, PlacementStats, RunOptions,
    Strategy, TargetPattern, TargetSpec, ViaPlacement, ZeroPlacementDiagnosis,
};
pub use settings::ZoneSettings;
pub use state::{StitchState, ZoneEntry};
pub use zone::{FilledRegion, LayerSet, Zone};

/// Place vias in one zone of a snapshot without a host transaction.
pub fn place_in_snapshot(
    snapshot: &BoardSnapshot,
    zone_id: &str,
    settings: &ZoneSettings,
    options: &mut RunOptions<'_>,
) -> Result<PlacementResult, StitchError> {
    let zone = snapshot
        .zone(zone_id)
        .ok_or_else(|| StitchError::ZoneNotFound(zone_id.to_string()))?;
    let params = settings.to_params()?;
    let filter = ObstacleFilter {
        include_other_layers: params.include_other_layers,
        ..Default::default()
    };
    let mut index = ObstacleIndex::from_snapshot(snapshot, zone, &filter, params.min_spacing().max(1));
    place_vias(zone, &mut index, &params, options)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardHost, BoardSnapshot, CancelFlag, MemoryBoard, PlacementParams, PlacementResult,
        RunOptions, StitchCore, StitchError, StitchState, UpdateOptions, ZoneSettings,
    };
}
