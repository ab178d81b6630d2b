//! Board host abstraction.
//!
//! The engine only ever reads a [`BoardSnapshot`]; every board mutation
//! goes through a [`BoardHost`] transaction opened by the caller.
//! [`MemoryBoard`] is the in-process host used by the CLI and the tests.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::board::{BoardPad, BoardSnapshot, BoardTrack, BoardVia};
use crate::core::StitchError;
use crate::geometry::Point;
use crate::placement::ViaPlacement;
use crate::zone::{LayerSet, Zone};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("No transaction is open")]
    NoTransaction,

    #[error("A transaction is already open")]
    TransactionActive,

    #[error("Unknown board item: {0}")]
    UnknownItem(String),

    #[error("Host rejected the change: {0}")]
    Rejected(String),
}

/// Minimal capability set the stitching workflow needs from a board.
pub trait BoardHost {
    /// All copper zones on the board.
    fn zones(&self) -> Vec<Zone>;

    fn zone(&self, id: &str) -> Option<Zone> {
        self.zones().into_iter().find(|z| z.id == id)
    }

    fn vias(&self) -> Vec<BoardVia>;

    fn pads(&self) -> Vec<BoardPad>;

    fn tracks(&self) -> Vec<BoardTrack>;

    /// Open a transaction. Nested transactions are rejected.
    fn begin(&mut self) -> Result<(), HostError>;

    /// Stage new vias and return their ids in input order.
    fn create_vias(&mut self, vias: &[ViaPlacement]) -> Result<Vec<String>, HostError>;

    /// Stage removal of existing vias. Returns how many were staged.
    fn remove_vias(&mut self, ids: &[String]) -> Result<usize, HostError>;

    /// Apply the staged changes as one undoable step.
    fn commit(&mut self, message: &str) -> Result<(), HostError>;

    /// Drop staged changes. A no-op without an open transaction.
    fn abort(&mut self);

    /// Point-in-filled-copper test for `zone`.
    fn hit_test_filled(&self, zone: &Zone, point: Point) -> bool {
        zone.contains(point)
    }

    /// Read-only copy of everything the engine reads.
    fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            zones: self.zones(),
            vias: self.vias(),
            pads: self.pads(),
            tracks: self.tracks(),
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    added: Vec<BoardVia>,
    removed: HashSet<String>,
}

/// In-memory board. Staged changes are invisible until commit.
#[derive(Debug, Default)]
pub struct MemoryBoard {
    board: BoardSnapshot,
    pending: Option<Pending>,
    commits: Vec<String>,
}

impl MemoryBoard {
    pub fn new(board: BoardSnapshot) -> Self {
        Self {
            board,
            pending: None,
            commits: Vec::new(),
        }
    }

    /// Load a board snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StitchError> {
        let text = fs::read_to_string(path)?;
        let board: BoardSnapshot = serde_json::from_str(&text)?;
        tracing::debug!(
            "Loaded board {}: {} zones, {} vias, {} pads, {} tracks",
            path.display(),
            board.zones.len(),
            board.vias.len(),
            board.pads.len(),
            board.tracks.len()
        );
        Ok(Self::new(board))
    }

    /// Write the committed board as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), StitchError> {
        let json = serde_json::to_string_pretty(&self.board)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn board(&self) -> &BoardSnapshot {
        &self.board
    }

    pub fn into_board(self) -> BoardSnapshot {
        self.board
    }

    /// Messages of committed transactions, oldest first.
    pub fn commits(&self) -> &[String] {
        &self.commits
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    fn pending_mut(&mut self) -> Result<&mut Pending, HostError> {
        self.pending.as_mut().ok_or(HostError::NoTransaction)
    }
}

impl BoardHost for MemoryBoard {
    fn zones(&self) -> Vec<Zone> {
        self.board.zones.clone()
    }

    fn zone(&self, id: &str) -> Option<Zone> {
        self.board.zone(id).cloned()
    }

    fn vias(&self) -> Vec<BoardVia> {
        self.board.vias.clone()
    }

    fn pads(&self) -> Vec<BoardPad> {
        self.board.pads.clone()
    }

    fn tracks(&self) -> Vec<BoardTrack> {
        self.board.tracks.clone()
    }

    fn begin(&mut self) -> Result<(), HostError> {
        if self.pending.is_some() {
            return Err(HostError::TransactionActive);
        }
        self.pending = Some(Pending::default());
        Ok(())
    }

    fn create_vias(&mut self, vias: &[ViaPlacement]) -> Result<Vec<String>, HostError> {
        if let Some(bad) = vias.iter().find(|v| v.diameter <= 0 || v.drill >= v.diameter) {
            return Err(HostError::Rejected(format!(
                "via at ({}, {}) has diameter {} and drill {}",
                bad.position.x, bad.position.y, bad.diameter, bad.drill
            )));
        }
        let pending = self.pending_mut()?;
        let mut ids = Vec::with_capacity(vias.len());
        for via in vias {
            let id = Uuid::new_v4().to_string();
            pending.added.push(BoardVia {
                id: id.clone(),
                position: via.position,
                diameter: via.diameter,
                drill: via.drill,
                net: via.net.clone(),
                layers: LayerSet::default(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    fn remove_vias(&mut self, ids: &[String]) -> Result<usize, HostError> {
        let Self { board, pending, .. } = self;
        let pending = pending.as_mut().ok_or(HostError::NoTransaction)?;

        if let Some(unknown) = ids
            .iter()
            .find(|id| board.via(id).is_none() && !pending.added.iter().any(|v| &v.id == *id))
        {
            return Err(HostError::UnknownItem(unknown.clone()));
        }

        let mut staged = 0;
        for id in ids {
            if let Some(pos) = pending.added.iter().position(|v| &v.id == id) {
                pending.added.remove(pos);
                staged += 1;
            } else if pending.removed.insert(id.clone()) {
                staged += 1;
            }
        }
        Ok(staged)
    }

    fn commit(&mut self, message: &str) -> Result<(), HostError> {
        let pending = self.pending.take().ok_or(HostError::NoTransaction)?;
        let removed = pending.removed.len();
        let added = pending.added.len();
        self.board.vias.retain(|v| !pending.removed.contains(&v.id));
        self.board.vias.extend(pending.added);
        self.commits.push(message.to_string());
        tracing::debug!("Commit '{}': +{} -{} vias", message, added, removed);
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(
                "Aborted transaction with {} staged vias and {} staged removals",
                pending.added.len(),
                pending.removed.len()
            );
        }
    }
}
