//! Persisted stitching state: per-zone settings and owned via ids.
//!
//! ```json
//! { "zones": { "<zone id>": { "settings": {..}, "owned_via_ids": [..],
//!   "zone_signature": "..", "updated_at": "2026-01-01T00:00:00Z" } } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::StitchError;
use crate::settings::ZoneSettings;

/// Ownership record and settings of one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneEntry {
    pub settings: ZoneSettings,
    pub owned_via_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ZoneEntry {
    /// Replace the owned set wholesale. Ids are stored sorted and unique.
    pub fn set_owned<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids: Vec<String> = ids.into_iter().filter(|id| !id.is_empty()).collect();
        ids.sort();
        ids.dedup();
        self.owned_via_ids = ids;
        self.updated_at = Some(Utc::now());
    }

    /// Drop the given ids. Returns true when anything changed.
    pub fn forget(&mut self, ids: &HashSet<String>) -> bool {
        let before = self.owned_via_ids.len();
        self.owned_via_ids.retain(|id| !ids.contains(id));
        let changed = self.owned_via_ids.len() != before;
        if changed {
            self.updated_at = Some(Utc::now());
        }
        changed
    }

    /// True when `signature` differs from the one stored at the last update.
    pub fn zone_changed(&self, signature: &str) -> bool {
        self.zone_signature
            .as_deref()
            .is_some_and(|stored| stored != signature)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StitchState {
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneEntry>,
}

impl StitchState {
    /// Load state from `path`.
    ///
    /// A missing file is an empty state. A file that does not parse is
    /// logged and replaced by an empty state.
    pub fn load(path: &Path) -> Result<Self, StitchError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&text) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    "Failed to load state file {}; starting with empty state: {}",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Write to `<path>.tmp`, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<(), StitchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(path);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        tracing::debug!("Saved stitching state to {}", path.display());
        Ok(())
    }

    pub fn zone(&self, zone_id: &str) -> Option<&ZoneEntry> {
        self.zones.get(zone_id)
    }

    /// Entry for `zone_id`, created with default settings when missing.
    pub fn zone_mut(&mut self, zone_id: &str) -> &mut ZoneEntry {
        self.zones.entry(zone_id.to_string()).or_default()
    }

    /// Settings for a zone, or the defaults.
    pub fn settings_for(&self, zone_id: &str) -> ZoneSettings {
        self.zone(zone_id)
            .map(|entry| entry.settings.clone())
            .unwrap_or_default()
    }

    pub fn owned_ids(&self, zone_id: &str) -> Vec<String> {
        self.zone(zone_id)
            .map(|entry| entry.owned_via_ids.clone())
            .unwrap_or_default()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
