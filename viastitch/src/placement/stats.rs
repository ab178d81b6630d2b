//! Candidate counters and the zero-placement diagnosis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final state of one tested candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Not in filled copper at all. Counted as an edge rejection.
    Outside,
    /// In copper but closer to the boundary than the margin allows.
    RejectedEdge,
    RejectedOverlap,
    Accepted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementStats {
    pub tested: usize,
    /// Candidates that passed the boundary margin test.
    pub inside: usize,
    /// Every containment failure, including `outside`.
    pub rejected_edge: usize,
    pub rejected_overlap: usize,
    pub accepted: usize,
    /// Containment failures that were not in copper at all.
    #[serde(default)]
    pub outside: usize,
}

impl PlacementStats {
    pub fn record(&mut self, outcome: CandidateOutcome) {
        self.tested += 1;
        match outcome {
            CandidateOutcome::Outside => {
                self.rejected_edge += 1;
                self.outside += 1;
            }
            CandidateOutcome::RejectedEdge => self.rejected_edge += 1,
            CandidateOutcome::RejectedOverlap => {
                self.inside += 1;
                self.rejected_overlap += 1;
            }
            CandidateOutcome::Accepted => {
                self.inside += 1;
                self.accepted += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &PlacementStats) {
        self.tested += other.tested;
        self.inside += other.inside;
        self.rejected_edge += other.rejected_edge;
        self.rejected_overlap += other.rejected_overlap;
        self.accepted += other.accepted;
        self.outside += other.outside;
    }

    /// Ranking key for competing runs; larger is better.
    ///
    /// More accepted vias first, then fewer total rejections, then fewer
    /// edge rejections.
    pub fn score(&self) -> (i64, i64, i64) {
        (
            self.accepted as i64,
            -((self.rejected_overlap + self.rejected_edge) as i64),
            -(self.rejected_edge as i64),
        )
    }

    /// Why nothing was placed, if nothing was.
    pub fn diagnose(&self) -> Option<ZeroPlacementDiagnosis> {
        if self.accepted > 0 {
            return None;
        }
        let diagnosis = if self.inside > 0 {
            ZeroPlacementDiagnosis::AllOverlap
        } else if self.outside == self.tested {
            ZeroPlacementDiagnosis::NoContainment
        } else if self.outside == 0 {
            ZeroPlacementDiagnosis::AllEdgeMargin
        } else {
            ZeroPlacementDiagnosis::Mixed
        };
        Some(diagnosis)
    }
}

/// Reason reported alongside an empty placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPlacementDiagnosis {
    /// No candidate landed inside the filled copper.
    NoContainment,
    /// Every in-zone candidate hit an obstacle.
    AllOverlap,
    /// Every candidate was in copper but failed the edge margin.
    AllEdgeMargin,
    /// Some candidates missed the copper, the rest failed the margin.
    Mixed,
}

impl ZeroPlacementDiagnosis {
    /// Actionable advice. `include_other_layers` selects the layer tip
    /// shown for overlap failures.
    pub fn hints(&self, include_other_layers: bool) -> Vec<&'static str> {
        match self {
            ZeroPlacementDiagnosis::NoContainment => vec![
                "No candidate points landed inside filled zone copper. Refill the zone and/or adjust spacing/offset.",
            ],
            ZeroPlacementDiagnosis::AllOverlap => {
                let tip = if include_other_layers {
                    "Tip: disable \"check overlaps on all copper layers\" to only check the zone's own layers."
                } else {
                    "Tip: this run only checked overlaps on the zone's own layers."
                };
                vec![
                    "All in-zone points were rejected by overlap/pad-margin checks. Reduce pad margin or spacing if needed.",
                    tip,
                ]
            }
            ZeroPlacementDiagnosis::AllEdgeMargin => {
                vec!["All in-zone points were rejected by edge margin. Reduce edge margin or spacing."]
            }
            ZeroPlacementDiagnosis::Mixed => vec![
                "In-copper points were rejected by edge margin, the rest missed the filled copper. Reduce edge margin or adjust spacing/offset.",
            ],
        }
    }
}

impl fmt::Display for ZeroPlacementDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ZeroPlacementDiagnosis::NoContainment => "no candidate inside zone copper",
            ZeroPlacementDiagnosis::AllOverlap => "all candidates overlap obstacles",
            ZeroPlacementDiagnosis::AllEdgeMargin => "all candidates violate the edge margin",
            ZeroPlacementDiagnosis::Mixed => "candidates missed the copper or violate the edge margin",
        };
        f.write_str(text)
    }
}
