//! Ownership and orphan tracking.
//!
//! A via id is owned by at most one zone. Owned ids move through
//! `owned -> pruned` (outside the zone, or the zone is gone) or
//! `owned -> unowned` (explicit removal). Ids whose via no longer exists
//! on the board are stale and dropped from the record silently.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::board::{BoardSnapshot, BoardVia};
use crate::geometry::Point;
use crate::host::BoardHost;
use crate::state::StitchState;
use crate::zone::Zone;

/// Net label used when neither the via nor its zone has one.
pub const NO_NET: &str = "(no net)";

/// An owned via that no longer sits inside its zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanVia {
    pub zone_id: String,
    pub via_id: String,
    pub net: String,
    pub position: Point,
    /// The owning zone no longer exists on the board.
    pub zone_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrphanScan {
    pub orphans: Vec<OrphanVia>,
    /// Owned ids with no via on the board.
    pub missing_ids: BTreeSet<String>,
    pub counts_by_net: BTreeMap<String, usize>,
}

impl OrphanScan {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty() && self.missing_ids.is_empty()
    }

    pub fn orphan_ids(&self) -> HashSet<String> {
        self.orphans.iter().map(|o| o.via_id.clone()).collect()
    }
}

/// True when the whole via disk lies inside the zone's filled copper.
pub fn via_inside_zone(zone: &Zone, via: &BoardVia) -> bool {
    zone.contains_with_margin(via.position, via.radius() as f64)
}

/// Walk every zone's owned ids and classify them against the board.
pub fn scan_orphans(board: &BoardSnapshot, state: &StitchState) -> OrphanScan {
    let mut scan = OrphanScan::default();
    let mut seen = HashSet::new();

    for (zone_id, entry) in &state.zones {
        let zone = board.zone(zone_id);
        for via_id in entry.owned_via_ids.iter().filter(|id| !id.is_empty()) {
            let Some(via) = board.via(via_id) else {
                scan.missing_ids.insert(via_id.clone());
                continue;
            };
            let orphaned = zone.map_or(true, |z| !via_inside_zone(z, via));
            if !orphaned || !seen.insert(via_id.clone()) {
                continue;
            }

            let net = if !via.net.is_empty() {
                via.net.clone()
            } else {
                zone.map(|z| z.net.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| NO_NET.to_string())
            };
            *scan.counts_by_net.entry(net.clone()).or_default() += 1;
            scan.orphans.push(OrphanVia {
                zone_id: zone_id.clone(),
                via_id: via_id.clone(),
                net,
                position: via.position,
                zone_missing: zone.is_none(),
            });
        }
    }

    if !scan.is_clean() {
        tracing::debug!(
            "Orphan scan: {} orphan vias, {} stale ids",
            scan.orphans.len(),
            scan.missing_ids.len()
        );
    }
    scan
}

/// Remove `ids` from every zone's owned list. Returns true when the
/// state changed.
pub fn cleanup_ids(state: &mut StitchState, ids: &HashSet<String>) -> bool {
    let mut changed = false;
    for entry in state.zones.values_mut() {
        changed |= entry.forget(ids);
    }
    changed
}

/// Owned ids of `zone_id` that still exist on the board.
pub fn live_owned(board: &BoardSnapshot, state: &StitchState, zone_id: &str) -> Vec<String> {
    state
        .zone(zone_id)
        .map(|entry| {
            entry
                .owned_via_ids
                .iter()
                .filter(|id| board.via(id).is_some())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Owned vias of `zone` whose disk is no longer inside it.
pub fn owned_outside(zone: &Zone, vias: &[BoardVia], owned: &HashSet<String>) -> Vec<String> {
    vias.iter()
        .filter(|v| owned.contains(&v.id) && !via_inside_zone(zone, v))
        .map(|v| v.id.clone())
        .collect()
}

/// Vias on the zone's net that nobody owns and that the host reports as
/// hitting the zone's filled copper.
pub fn user_vias_in_zone<H: BoardHost + ?Sized>(
    host: &H,
    zone: &Zone,
    owned: &HashSet<String>,
) -> Vec<String> {
    if zone.net.is_empty() {
        return Vec::new();
    }
    host.vias()
        .into_iter()
        .filter(|v| {
            v.net == zone.net && !owned.contains(&v.id) && host.hit_test_filled(zone, v.position)
        })
        .map(|v| v.id)
        .collect()
}
