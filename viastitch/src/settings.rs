//! Per-zone user settings in millimetres.
//!
//! Keys are persisted in PascalCase. Missing keys take their defaults, so
//! state files written by older versions still load.

use serde::{Deserialize, Serialize};

use crate::core::StitchError;
use crate::placement::{PlacementParams, TargetPattern, TargetSpec};

/// Board units per millimetre.
pub const NM_PER_MM: f64 = 1_000_000.0;

pub fn mm_to_nm(mm: f64) -> i64 {
    (mm * NM_PER_MM).round() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ZoneSettings {
    pub via_size: f64,
    pub via_drill: f64,
    pub h_spacing: f64,
    pub v_spacing: f64,
    pub h_offset: f64,
    pub v_offset: f64,
    pub edge_margin: f64,
    pub pad_margin: f64,
    pub include_other_layers: bool,
    pub center_segments: bool,
    pub maximize_vias: bool,
    pub target_mode: bool,
    /// Signed so that a bad value is reported instead of failing to load.
    pub target_count: i64,
    pub target_pattern: TargetPattern,
    pub allow_heuristic_fallback: bool,
    pub randomize: bool,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            via_size: 0.50,
            via_drill: 0.30,
            h_spacing: 1.00,
            v_spacing: 1.00,
            h_offset: 0.0,
            v_offset: 0.0,
            edge_margin: 0.0,
            pad_margin: 0.0,
            include_other_layers: false,
            center_segments: false,
            maximize_vias: false,
            target_mode: false,
            target_count: 0,
            target_pattern: TargetPattern::Grid,
            allow_heuristic_fallback: false,
            randomize: false,
        }
    }
}

impl ZoneSettings {
    /// Convert to board units. The engine validates the result again.
    pub fn to_params(&self) -> Result<PlacementParams, StitchError> {
        let target = if self.target_mode {
            if self.target_count <= 0 {
                return Err(StitchError::InvalidParameters(
                    "Target via count must be greater than 0.".to_string(),
                ));
            }
            Some(TargetSpec {
                count: self.target_count as usize,
                pattern: self.target_pattern,
            })
        } else {
            None
        };

        let params = PlacementParams {
            via_diameter: mm_to_nm(self.via_size),
            drill_diameter: mm_to_nm(self.via_drill),
            pitch_x: mm_to_nm(self.h_spacing),
            pitch_y: mm_to_nm(self.v_spacing),
            offset_x: mm_to_nm(self.h_offset),
            offset_y: mm_to_nm(self.v_offset),
            edge_margin: mm_to_nm(self.edge_margin),
            pad_margin: mm_to_nm(self.pad_margin),
            include_other_layers: self.include_other_layers,
            center_segments: self.center_segments,
            maximize: self.maximize_vias,
            target,
            randomize: self.randomize && !self.maximize_vias,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_convert() {
        let params = ZoneSettings::default().to_params().unwrap();
        assert_eq!(params, PlacementParams::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: ZoneSettings =
            serde_json::from_str(r#"{"ViaSize": 0.8, "HSpacing": 1.5, "TargetPattern": "spiral"}"#)
                .unwrap();
        assert_eq!(settings.via_size, 0.8);
        assert_eq!(settings.h_spacing, 1.5);
        assert_eq!(settings.via_drill, 0.30);
        assert_eq!(settings.target_pattern, TargetPattern::Spiral);
    }

    #[test]
    fn test_keys_are_pascal_case() {
        let json = serde_json::to_value(ZoneSettings::default()).unwrap();
        for key in ["ViaSize", "ViaDrill", "HSpacing", "VOffset", "EdgeMargin", "TargetCount"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_mm_rounding() {
        assert_eq!(mm_to_nm(0.1 + 0.2), 300_000);
    }

    #[test]
    fn test_target_count_validated() {
        let settings = ZoneSettings {
            target_mode: true,
            target_count: -3,
            ..Default::default()
        };
        assert!(matches!(
            settings.to_params(),
            Err(StitchError::InvalidParameters(_))
        ));

        let settings = ZoneSettings {
            target_mode: true,
            target_count: 12,
            target_pattern: TargetPattern::Staggered,
            ..Default::default()
        };
        let params = settings.to_params().unwrap();
        assert_eq!(params.target.map(|t| t.count), Some(12));
    }

    #[test]
    fn test_randomize_disabled_when_maximizing() {
        let settings = ZoneSettings {
            randomize: true,
            maximize_vias: true,
            ..Default::default()
        };
        assert!(!settings.to_params().unwrap().randomize);
    }
}
