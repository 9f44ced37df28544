//! Execution Snapshots
//!
//! A snapshot captures every relevant holder of a paused engine: enough to
//! resume the run later, in this process or another. Serialization of the
//! snapshot is owned by the caller; the types here only fix the shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workplan::ElementId;

use super::token::Token;

/// Captured state of a single holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderSnapshot {
    /// Element id of the holder (place or transition)
    pub holder_id: ElementId,

    /// Tokens resting on the holder at capture time
    pub tokens: Vec<Token>,

    /// Opaque holder state, not interpreted by the engine
    #[serde(default)]
    pub holder_state: serde_json::Value,
}

/// Serializable capture of a paused workplan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the workplan this was taken from
    pub workplan_name: String,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,

    /// Every place, plus every holder that carried at least one token
    pub holders: Vec<HolderSnapshot>,
}

impl Snapshot {
    /// Creates an empty snapshot shell tagged with the workplan name.
    pub fn new(workplan_name: impl Into<String>) -> Self {
        Self {
            workplan_name: workplan_name.into(),
            taken_at: Utc::now(),
            holders: Vec::new(),
        }
    }

    /// Finds the record for a holder id.
    pub fn holder(&self, id: ElementId) -> Option<&HolderSnapshot> {
        self.holders.iter().find(|h| h.holder_id == id)
    }

    /// Total number of captured tokens.
    pub fn token_count(&self) -> usize {
        self.holders.iter().map(|h| h.tokens.len()).sum()
    }

    /// Records for holders that carried at least one token.
    pub fn occupied(&self) -> impl Iterator<Item = &HolderSnapshot> {
        self.holders.iter().filter(|h| !h.tokens.is_empty())
    }
}
