//! Placement parameters in board units, with validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::StitchError;

/// Deterministic layouts tried by target-count placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPattern {
    #[default]
    Grid,
    /// Every other row shifted by half a pitch, neighbours on 45° diagonals.
    Staggered,
    /// Archimedean spiral outward from the zone center.
    Spiral,
}

impl fmt::Display for TargetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetPattern::Grid => "grid",
            TargetPattern::Staggered => "staggered",
            TargetPattern::Spiral => "spiral",
        };
        f.write_str(name)
    }
}

/// Place exactly `count` vias using `pattern` when the zone allows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub count: usize,
    pub pattern: TargetPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementParams {
    pub via_diameter: i64,
    pub drill_diameter: i64,
    pub pitch_x: i64,
    pub pitch_y: i64,
    pub offset_x: i64,
    pub offset_y: i64,
    /// Extra clearance from the via edge to the zone boundary.
    pub edge_margin: i64,
    /// Extra clearance added to every obstacle test.
    pub pad_margin: i64,
    pub include_other_layers: bool,
    pub center_segments: bool,
    pub maximize: bool,
    pub target: Option<TargetSpec>,
    /// Jitter grid candidates by up to a fifth of the pitch. Not reproducible.
    pub randomize: bool,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            via_diameter: 500_000,
            drill_diameter: 300_000,
            pitch_x: 1_000_000,
            pitch_y: 1_000_000,
            offset_x: 0,
            offset_y: 0,
            edge_margin: 0,
            pad_margin: 0,
            include_other_layers: false,
            center_segments: false,
            maximize: false,
            target: None,
            randomize: false,
        }
    }
}

impl PlacementParams {
    /// Reject inconsistent parameters before any geometry work.
    pub fn validate(&self) -> Result<(), StitchError> {
        let invalid = |msg: &str| Err(StitchError::InvalidParameters(msg.to_string()));

        if self.via_diameter <= 0 || self.drill_diameter <= 0 {
            return invalid("Via size and drill must be greater than 0.");
        }
        if self.drill_diameter >= self.via_diameter {
            return invalid("Via drill must be smaller than via size.");
        }
        if self.edge_margin < 0 {
            return invalid("Edge margin cannot be negative.");
        }
        if self.pad_margin < 0 {
            return invalid("Pad margin cannot be negative.");
        }
        if self.maximize && self.target.is_some() {
            return invalid("Maximize and target-count modes cannot be combined.");
        }
        if let Some(target) = &self.target {
            if target.count == 0 {
                return invalid("Target via count must be greater than 0.");
            }
        }
        let free_pitch = self.maximize || self.target.is_some();
        if !free_pitch && (self.pitch_x <= 0 || self.pitch_y <= 0) {
            return invalid("Spacing values must be greater than 0.");
        }
        if self.pitch_x < 0 || self.pitch_y < 0 {
            return invalid("Spacing values cannot be negative.");
        }
        Ok(())
    }

    pub fn via_radius(&self) -> i64 {
        self.via_diameter / 2
    }

    /// Required distance from a via center to the filled copper boundary.
    pub fn boundary_margin(&self) -> i64 {
        self.via_radius() + self.edge_margin
    }

    /// Minimum center distance between two vias of this array.
    pub fn min_spacing(&self) -> i64 {
        self.via_radius() * 2 + self.pad_margin
    }

    /// Pitch used when the user leaves it unset in free-pitch modes.
    pub fn effective_pitch(&self) -> (i64, i64) {
        let fallback = self.min_spacing().max(1);
        let px = if self.pitch_x > 0 { self.pitch_x } else { fallback };
        let py = if self.pitch_y > 0 { self.pitch_y } else { fallback };
        (px, py)
    }

    /// Seed derived from the parameters and a caller-provided salt (the
    /// zone bounds), so packing runs are reproducible.
    pub fn seed(&self, salt: &[i64]) -> u64 {
        // FNV-1a over the integer fields
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        let fields = [
            self.via_diameter,
            self.drill_diameter,
            self.pitch_x,
            self.pitch_y,
            self.offset_x,
            self.offset_y,
            self.edge_margin,
            self.pad_margin,
        ];
        for value in fields.iter().chain(salt.iter()) {
            for byte in value.to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
        }
        hash
    }
}
