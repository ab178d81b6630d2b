//! High-level stitching workflow shared by the CLI and library users.
//! Every board change runs inside one host transaction.

use serde::Serialize;
use std::collections::HashSet;

use crate::host::{BoardHost, HostError};
use crate::obstacles::{ObstacleFilter, ObstacleIndex};
use crate::ownership::{self, OrphanScan};
use crate::placement::{place_vias, PlacementResult, RunOptions, ZeroPlacementDiagnosis};
use crate::state::StitchState;
use crate::zone::Zone;

pub const COMMIT_UPDATE: &str = "ViaStitching: Update Array";
pub const COMMIT_REMOVE: &str = "ViaStitching: Remove Array";
pub const COMMIT_CLEAN: &str = "ViaStitching: Clean Orphans";
pub const COMMIT_PRUNE: &str = "ViaStitching: Prune Outside Zone";

#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Zone {0} has no filled copper. Refill the zone and try again.")]
    NoUsableZoneGeometry(String),
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options for update and remove runs.
#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// Also replace unowned vias of the zone's net inside the zone.
    pub include_user_vias: bool,
    /// Compute the placement without touching the board or the state.
    pub dry_run: bool,
}

/// Outcome of an update-array run.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub zone_id: String,
    pub placement: PlacementResult,
    pub created_ids: Vec<String>,
    pub removed_owned: usize,
    pub removed_user: usize,
    /// Owned vias that had drifted outside the zone.
    pub pruned: usize,
    /// Owned ids with no via left on the board.
    pub stale_ids: usize,
    pub obstacles: usize,
    /// Zone geometry, net or layers changed since the last update.
    pub zone_changed: bool,
    pub committed: bool,
}

impl UpdateReport {
    pub fn placed(&self) -> usize {
        self.placement.len()
    }

    pub fn diagnosis(&self) -> Option<ZeroPlacementDiagnosis> {
        self.placement.diagnosis()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoveReport {
    pub zone_id: String,
    pub removed_owned: usize,
    pub removed_user: usize,
    pub stale_ids: usize,
}

impl RemoveReport {
    pub fn removed(&self) -> usize {
        self.removed_owned + self.removed_user
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub scan: OrphanScan,
    pub removed: usize,
    pub stale_cleaned: usize,
    pub state_changed: bool,
}

/// Stitching API used by the CLI and embedding hosts.
pub struct StitchCore;

impl StitchCore {
    /// Remove the zone's owned array and place a fresh one.
    ///
    /// Nothing is committed when the run is cancelled, a dry run, or
    /// places no vias; the board and the state are then left as they were.
    pub fn update_array<H: BoardHost + ?Sized>(
        host: &mut H,
        state: &mut StitchState,
        zone_id: &str,
        options: &UpdateOptions,
        run: &mut RunOptions<'_>,
    ) -> Result<UpdateReport, StitchError> {
        let zone = find_zone(host, zone_id)?;
        let params = state.settings_for(zone_id).to_params()?;
        let snapshot = host.snapshot();

        let owned_ids = state.owned_ids(zone_id);
        let live = ownership::live_owned(&snapshot, state, zone_id);
        let stale_ids = owned_ids.len() - live.len();
        let owned: HashSet<String> = live.iter().cloned().collect();
        let pruned = ownership::owned_outside(&zone, &snapshot.vias, &owned).len();
        let user = if options.include_user_vias {
            ownership::user_vias_in_zone(&*host, &zone, &owned)
        } else {
            Vec::new()
        };

        let filter = ObstacleFilter {
            include_other_layers: params.include_other_layers,
            exclude_via_ids: owned.iter().chain(user.iter()).cloned().collect(),
        };
        let mut index =
            ObstacleIndex::from_snapshot(&snapshot, &zone, &filter, params.min_spacing().max(1));
        let obstacles = index.counts().total();
        let placement = place_vias(&zone, &mut index, &params, run)?;

        let signature = zone.signature();
        let zone_changed = state
            .zone(zone_id)
            .is_some_and(|entry| entry.zone_changed(&signature));
        if zone_changed {
            tracing::info!("Zone {} changed since its last update", zone.label());
        }

        let mut report = UpdateReport {
            zone_id: zone_id.to_string(),
            placement,
            created_ids: Vec::new(),
            removed_owned: 0,
            removed_user: 0,
            pruned,
            stale_ids,
            obstacles,
            zone_changed,
            committed: false,
        };

        if options.dry_run || report.placement.cancelled {
            return Ok(report);
        }
        if report.placement.is_empty() {
            tracing::warn!(
                "No vias placed in zone {}; leaving {} owned vias in place",
                zone.label(),
                live.len()
            );
            return Ok(report);
        }

        let removals: Vec<String> = live.iter().chain(user.iter()).cloned().collect();
        let vias = report.placement.vias.clone();
        let created = with_transaction(host, COMMIT_UPDATE, |host| {
            if !removals.is_empty() {
                host.remove_vias(&removals)?;
            }
            host.create_vias(&vias)
        })?;

        report.removed_owned = live.len();
        report.removed_user = user.len();
        report.created_ids = created.clone();
        report.committed = true;

        let entry = state.zone_mut(zone_id);
        entry.set_owned(created);
        entry.zone_signature = Some(signature);
        tracing::info!(
            "Updated zone {}: removed {} owned and {} user vias, created {}",
            zone.label(),
            report.removed_owned,
            report.removed_user,
            report.created_ids.len()
        );
        Ok(report)
    }

    /// Remove the zone's owned vias, and optionally unowned vias of its net
    /// inside the zone. Settings are kept.
    pub fn remove_array<H: BoardHost + ?Sized>(
        host: &mut H,
        state: &mut StitchState,
        zone_id: &str,
        include_user_vias: bool,
    ) -> Result<RemoveReport, StitchError> {
        let zone = find_zone(host, zone_id)?;
        let snapshot = host.snapshot();
        let live = ownership::live_owned(&snapshot, state, zone_id);
        let owned: HashSet<String> = live.iter().cloned().collect();
        let user = if include_user_vias {
            ownership::user_vias_in_zone(&*host, &zone, &owned)
        } else {
            Vec::new()
        };

        let report = RemoveReport {
            zone_id: zone_id.to_string(),
            removed_owned: live.len(),
            removed_user: user.len(),
            stale_ids: state.owned_ids(zone_id).len() - live.len(),
        };

        if report.removed() > 0 {
            let removals: Vec<String> = live.into_iter().chain(user).collect();
            with_transaction(host, COMMIT_REMOVE, |host| host.remove_vias(&removals))?;
            tracing::info!("Removed {} vias from zone {}", report.removed(), zone.label());
        } else {
            tracing::info!("No owned vias found for zone {}", zone.label());
        }
        if let Some(entry) = state.zones.get_mut(zone_id) {
            if !entry.owned_via_ids.is_empty() {
                entry.set_owned(Vec::new());
            }
        }
        Ok(report)
    }

    /// Classify every owned id against the current board.
    pub fn scan_orphans<H: BoardHost + ?Sized>(host: &H, state: &StitchState) -> OrphanScan {
        ownership::scan_orphans(&host.snapshot(), state)
    }

    /// Remove orphan vias and drop them and stale ids from the state.
    pub fn clean_orphans<H: BoardHost + ?Sized>(
        host: &mut H,
        state: &mut StitchState,
    ) -> Result<CleanReport, StitchError> {
        let scan = Self::scan_orphans(host, state);
        if scan.is_clean() {
            return Ok(CleanReport {
                scan,
                ..Default::default()
            });
        }

        let orphan_ids: Vec<String> = scan.orphans.iter().map(|o| o.via_id.clone()).collect();
        if !orphan_ids.is_empty() {
            with_transaction(host, COMMIT_CLEAN, |host| host.remove_vias(&orphan_ids))?;
        }

        let mut forget = scan.orphan_ids();
        forget.extend(scan.missing_ids.iter().cloned());
        let state_changed = ownership::cleanup_ids(state, &forget);
        tracing::info!(
            "Cleaned {} orphan vias and {} stale ids",
            orphan_ids.len(),
            scan.missing_ids.len()
        );
        Ok(CleanReport {
            removed: orphan_ids.len(),
            stale_cleaned: scan.missing_ids.len(),
            state_changed,
            scan,
        })
    }

    /// Remove owned vias of one zone that no longer fit inside it.
    pub fn prune_outside<H: BoardHost + ?Sized>(
        host: &mut H,
        state: &mut StitchState,
        zone_id: &str,
    ) -> Result<usize, StitchError> {
        let zone = find_zone(host, zone_id)?;
        let owned: HashSet<String> = state.owned_ids(zone_id).into_iter().collect();
        if owned.is_empty() {
            return Ok(0);
        }
        let outside = ownership::owned_outside(&zone, &host.vias(), &owned);
        if outside.is_empty() {
            return Ok(0);
        }
        with_transaction(host, COMMIT_PRUNE, |host| host.remove_vias(&outside))?;
        let gone: HashSet<String> = outside.iter().cloned().collect();
        state.zone_mut(zone_id).forget(&gone);
        tracing::info!("Pruned {} vias outside zone {}", outside.len(), zone.label());
        Ok(outside.len())
    }
}

fn find_zone<H: BoardHost + ?Sized>(host: &H, zone_id: &str) -> Result<Zone, StitchError> {
    host.zone(zone_id)
        .ok_or_else(|| StitchError::ZoneNotFound(zone_id.to_string()))
}

/// Run `body` between begin and commit; abort on any failure.
fn with_transaction<H, T, F>(host: &mut H, message: &str, body: F) -> Result<T, StitchError>
where
    H: BoardHost + ?Sized,
    F: FnOnce(&mut H) -> Result<T, HostError>,
{
    host.begin()?;
    let outcome = body(&mut *host).and_then(|value| host.commit(message).map(|_| value));
    match outcome {
        Ok(value) => Ok(value),
        Err(e) => {
            host.abort();
            tracing::warn!("Transaction '{}' aborted: {}", message, e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardSnapshot, BoardVia};
    use crate::geometry::{Point, Polygon};
    use crate::host::MemoryBoard;
    use crate::zone::{FilledRegion, LayerSet};

    const MM: i64 = 1_000_000;

    fn zone(id: &str, size: i64) -> Zone {
        Zone {
            id: id.into(),
            net: "GND".into(),
            layers: LayerSet::new(["F.Cu", "B.Cu"]),
            outline: Polygon::rect(0, 0, size, size),
            regions: vec![FilledRegion::new(Polygon::rect(0, 0, size, size))],
            ..Default::default()
        }
    }

    fn user_via(id: &str, x: i64, y: i64) -> BoardVia {
        BoardVia {
            id: id.into(),
            position: Point::new(x, y),
            diameter: 500_000,
            drill: 300_000,
            net: "GND".into(),
            layers: LayerSet::default(),
        }
    }

    fn board(vias: Vec<BoardVia>) -> MemoryBoard {
        MemoryBoard::new(BoardSnapshot {
            zones: vec![zone("z1", 10 * MM)],
            vias,
            ..Default::default()
        })
    }

    fn update(host: &mut MemoryBoard, state: &mut StitchState, options: UpdateOptions) -> UpdateReport {
        StitchCore::update_array(host, state, "z1", &options, &mut RunOptions::default()).unwrap()
    }

    #[test]
    fn test_update_creates_and_owns() {
        let mut host = board(vec![]);
        let mut state = StitchState::default();
        let report = update(&mut host, &mut state, UpdateOptions::default());

        assert!(report.committed);
        assert_eq!(report.placed(), 81);
        assert_eq!(host.vias().len(), 81);
        assert_eq!(state.owned_ids("z1").len(), 81);
        assert_eq!(host.commits(), [COMMIT_UPDATE]);
        assert!(state.zone("z1").and_then(|e| e.zone_signature.as_ref()).is_some());
    }

    #[test]
    fn test_update_replaces_owned_array() {
        let mut host = board(vec![]);
        let mut state = StitchState::default();
        let first = update(&mut host, &mut state, UpdateOptions::default());
        let second = update(&mut host, &mut state, UpdateOptions::default());

        assert_eq!(second.removed_owned, 81);
        assert_eq!(host.vias().len(), 81);
        let first_ids: HashSet<&String> = first.created_ids.iter().collect();
        assert!(second.created_ids.iter().all(|id| !first_ids.contains(id)));
    }

    #[test]
    fn test_user_vias_kept_or_replaced() {
        let mut host = board(vec![user_via("user", 5 * MM, 5 * MM)]);
        let mut state = StitchState::default();
        let report = update(&mut host, &mut state, UpdateOptions::default());
        assert_eq!(report.placed(), 80);
        assert_eq!(host.vias().len(), 81);

        let mut host = board(vec![user_via("user", 5 * MM, 5 * MM)]);
        let mut state = StitchState::default();
        let report = update(
            &mut host,
            &mut state,
            UpdateOptions {
                include_user_vias: true,
                ..Default::default()
            },
        );
        assert_eq!(report.removed_user, 1);
        assert_eq!(report.placed(), 81);
        assert!(host.board().via("user").is_none());
    }

    #[test]
    fn test_dry_run_leaves_board_alone() {
        let mut host = board(vec![]);
        let mut state = StitchState::default();
        let report = update(
            &mut host,
            &mut state,
            UpdateOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        assert_eq!(report.placed(), 81);
        assert!(!report.committed);
        assert!(host.vias().is_empty());
        assert!(state.zones.is_empty());
    }

    #[test]
    fn test_zero_placements_not_committed() {
        let mut host = board(vec![]);
        let mut state = StitchState::default();
        update(&mut host, &mut state, UpdateOptions::default());

        state.zone_mut("z1").settings.edge_margin = 20.0;
        let report = update(&mut host, &mut state, UpdateOptions::default());
        assert!(!report.committed);
        assert!(report.diagnosis().is_some());
        assert_eq!(report.placement.stats.accepted, 0);
        assert_eq!(host.vias().len(), 81);
        assert_eq!(state.owned_ids("z1").len(), 81);
    }

    #[test]
    fn test_remove_array() {
        let mut host = board(vec![user_via("user", 5 * MM, 5 * MM)]);
        let mut state = StitchState::default();
        update(&mut host, &mut state, UpdateOptions::default());

        let report = StitchCore::remove_array(&mut host, &mut state, "z1", false).unwrap();
        assert_eq!(report.removed_owned, 80);
        assert_eq!(report.removed_user, 0);
        assert_eq!(host.vias().len(), 1);
        assert!(state.owned_ids("z1").is_empty());

        let report = StitchCore::remove_array(&mut host, &mut state, "z1", true).unwrap();
        assert_eq!(report.removed(), 1);
        assert!(host.vias().is_empty());
    }

    #[test]
    fn test_missing_zone() {
        let mut host = board(vec![]);
        let mut state = StitchState::default();
        let err = StitchCore::update_array(
            &mut host,
            &mut state,
            "nope",
            &UpdateOptions::default(),
            &mut RunOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StitchError::ZoneNotFound(_)));
        assert!(host.commits().is_empty());
    }

    #[test]
    fn test_clean_orphans() {
        let mut host = board(vec![
            user_via("inside", 5 * MM, 5 * MM),
            user_via("outside", 20 * MM, 5 * MM),
        ]);
        let mut state = StitchState::default();
        state.zone_mut("z1").set_owned(
            ["inside", "outside", "stale"].iter().map(|s| s.to_string()),
        );

        let report = StitchCore::clean_orphans(&mut host, &mut state).unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.stale_cleaned, 1);
        assert!(report.state_changed);
        assert_eq!(state.owned_ids("z1"), vec!["inside"]);
        assert_eq!(host.commits(), [COMMIT_CLEAN]);

        let again = StitchCore::clean_orphans(&mut host, &mut state).unwrap();
        assert!(again.scan.is_clean());
        assert_eq!(host.commits().len(), 1);
    }

    #[test]
    fn test_prune_outside() {
        let mut host = board(vec![
            user_via("a", 5 * MM, 5 * MM),
            user_via("b", 9_900_000, 5 * MM),
        ]);
        let mut state = StitchState::default();
        state
            .zone_mut("z1")
            .set_owned(["a", "b"].iter().map(|s| s.to_string()));
        assert_eq!(StitchCore::prune_outside(&mut host, &mut state, "z1").unwrap(), 1);
        assert_eq!(state.owned_ids("z1"), vec!["a"]);
        assert!(host.board().via("b").is_none());
    }
}
