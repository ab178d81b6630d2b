//! Board item snapshots supplied by the host.
//!
//! All positions and sizes are in board units (nm). A snapshot is taken
//! once per placement run and treated as immutable for its duration.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::zone::{LayerSet, Zone};

/// An existing via on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardVia {
    pub id: String,
    pub position: Point,
    pub diameter: i64,
    #[serde(default)]
    pub drill: i64,
    #[serde(default)]
    pub net: String,
    /// Empty means the via spans every copper layer.
    #[serde(default)]
    pub layers: LayerSet,
}

impl BoardVia {
    pub fn radius(&self) -> i64 {
        self.diameter / 2
    }
}

/// A footprint pad, described by its bounding size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPad {
    #[serde(default)]
    pub id: String,
    pub position: Point,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub net: String,
    #[serde(default)]
    pub layers: LayerSet,
    /// Zero for SMD pads.
    #[serde(default)]
    pub drill: i64,
}

impl BoardPad {
    /// Through-hole pads exist on every copper layer regardless of the
    /// layers they list.
    pub fn is_through_hole(&self) -> bool {
        self.drill > 0
    }

    /// Half of the larger bounding dimension, never below one unit.
    pub fn half_extent(&self) -> i64 {
        (self.width.max(self.height) / 2).max(1)
    }
}

/// A straight track segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardTrack {
    #[serde(default)]
    pub id: String,
    pub start: Point,
    pub end: Point,
    pub width: i64,
    #[serde(default)]
    pub net: String,
    #[serde(default)]
    pub layers: LayerSet,
}

/// Everything the engine reads from a board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub vias: Vec<BoardVia>,
    #[serde(default)]
    pub pads: Vec<BoardPad>,
    #[serde(default)]
    pub tracks: Vec<BoardTrack>,
}

impl BoardSnapshot {
    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn via(&self, id: &str) -> Option<&BoardVia> {
        self.vias.iter().find(|v| v.id == id)
    }
}
