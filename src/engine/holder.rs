//! Token Holders
//!
//! Places and runtime transitions are structurally unrelated, but both hold
//! tokens, pause, resume, and are captured into snapshots. They share one
//! arena of holder records keyed by element id; step/connector edges stay
//! id-based, so no reference cycles form.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::workplan::{Connector, ElementId, NodeClassification};

use super::snapshot::HolderSnapshot;
use super::token::Token;

/// Whether a holder was instantiated from a connector or a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    Place,
    Transition,
}

/// A token holder: a place, or a runtime transition carrying in-flight
/// tokens.
#[derive(Debug, Clone)]
pub struct Holder {
    /// Element id shared with the workplan element this was built from
    pub id: ElementId,

    /// Place or transition
    pub kind: HolderKind,

    /// Name of the source element
    pub name: String,

    /// Classification (NONE for transitions)
    pub classification: NodeClassification,

    /// Tokens currently resting here
    tokens: Vec<Token>,

    /// Cooperative pause signal
    paused: bool,

    /// Opaque state captured into snapshots; the engine never interprets it
    internal_state: serde_json::Value,
}

impl Holder {
    /// Creates a place holder from a connector.
    pub fn place(connector: &Connector) -> Self {
        Self {
            id: connector.id,
            kind: HolderKind::Place,
            name: connector.name.clone(),
            classification: connector.classification,
            tokens: Vec::new(),
            paused: false,
            internal_state: serde_json::Value::Null,
        }
    }

    /// Creates a transition holder.
    pub fn transition(id: ElementId, name: impl Into<String>) -> Self {
        Self {
            id,
            kind: HolderKind::Transition,
            name: name.into(),
            classification: NodeClassification::NONE,
            tokens: Vec::new(),
            paused: false,
            internal_state: serde_json::Value::Null,
        }
    }

    /// Tokens currently resting on this holder.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Adds a token.
    pub fn add_token(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Takes the oldest token, if any.
    pub fn take_token(&mut self) -> Option<Token> {
        if self.tokens.is_empty() {
            None
        } else {
            Some(self.tokens.remove(0))
        }
    }

    /// Takes every token.
    pub fn take_all(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.tokens)
    }

    /// True if at least one token rests here.
    pub fn has_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Signals a cooperative pause. Paused holders block transitions from
    /// firing; in-flight execution is drained separately.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clears the pause signal.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// True while the pause signal is set.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Opaque snapshot state.
    pub fn internal_state(&self) -> &serde_json::Value {
        &self.internal_state
    }

    /// Replaces the opaque snapshot state.
    pub fn set_internal_state(&mut self, state: serde_json::Value) {
        self.internal_state = state;
    }

    /// Relevant holders are captured into snapshots and signalled on
    /// pause/resume: every place, plus any holder carrying tokens.
    pub fn is_relevant(&self) -> bool {
        self.kind == HolderKind::Place || self.has_tokens()
    }

    /// Captures this holder into a snapshot record.
    pub fn capture(&self) -> HolderSnapshot {
        HolderSnapshot {
            holder_id: self.id,
            tokens: self.tokens.clone(),
            holder_state: self.internal_state.clone(),
        }
    }

    /// Overwrites tokens and state from a snapshot record.
    pub fn apply(&mut self, snapshot: &HolderSnapshot) {
        self.tokens = snapshot.tokens.clone();
        self.internal_state = snapshot.holder_state.clone();
    }
}

/// Arena of holder records keyed by element id.
#[derive(Debug, Default)]
pub struct HolderArena {
    holders: BTreeMap<ElementId, Holder>,
}

impl HolderArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, holder: Holder) {
        self.holders.insert(holder.id, holder);
    }

    pub fn get(&self, id: ElementId) -> Option<&Holder> {
        self.holders.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Holder> {
        self.holders.get_mut(&id)
    }

    /// Holders in ascending id order.
    pub fn iter(&self) -> btree_map::Values<'_, ElementId, Holder> {
        self.holders.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, ElementId, Holder> {
        self.holders.values_mut()
    }

    pub fn clear(&mut self) {
        self.holders.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}
