//! Workplan Data Model
//!
//! Core data structures for workplan graphs: places (connectors) where
//! tokens wait, and steps that move tokens between them. Steps reference
//! connectors positionally by element id, so the graph carries no object
//! reference cycles.
//!
//! Element ids are assigned by the owning [`Workplan`] from a monotonically
//! increasing counter; ids are unique within a workplan and never reused.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Identifier for workplan elements (connectors and steps) and the holders
/// instantiated from them.
pub type ElementId = i64;

/// Classification bit flags for connectors.
///
/// The composites are what the engine actually tests against: a Start place
/// is both an entry and a workplan border, an End place is an exit border,
/// and a Failed place is an exit marked as failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeClassification(u8);

impl NodeClassification {
    /// No classification.
    pub const NONE: Self = Self(0);
    /// Tokens enter the workplan here.
    pub const ENTRY: Self = Self(0b0001);
    /// Tokens leave the workplan here.
    pub const EXIT: Self = Self(0b0010);
    /// The connector sits on the workplan border.
    pub const BORDER: Self = Self(0b0100);
    /// Reaching this connector means the process failed.
    pub const FAILURE: Self = Self(0b1000);

    /// Start place: `ENTRY | BORDER`.
    pub const START: Self = Self(Self::ENTRY.0 | Self::BORDER.0);
    /// End place: `EXIT | BORDER`.
    pub const END: Self = Self(Self::EXIT.0 | Self::BORDER.0);
    /// Failed place: `EXIT | FAILURE`.
    pub const FAILED: Self = Self(Self::EXIT.0 | Self::FAILURE.0);

    /// Returns true if all bits of `other` are set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Start-classified: entry on the workplan border.
    pub fn is_start(self) -> bool {
        self.contains(Self::START)
    }

    /// Any exit bit, regardless of success or failure.
    pub fn is_exit(self) -> bool {
        self.contains(Self::EXIT)
    }

    /// Failure-classified.
    pub fn is_failure(self) -> bool {
        self.contains(Self::FAILURE)
    }

    /// Returns the raw bit value.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitAnd for NodeClassification {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for NodeClassification {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeClassification {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for NodeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "None");
        }
        let mut parts = Vec::new();
        if self.contains(Self::ENTRY) {
            parts.push("Entry");
        }
        if self.contains(Self::EXIT) {
            parts.push("Exit");
        }
        if self.contains(Self::BORDER) {
            parts.push("Border");
        }
        if self.contains(Self::FAILURE) {
            parts.push("Failure");
        }
        write!(f, "{}", parts.join("|"))
    }
}

/// A place in the workplan graph where tokens wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    /// Element id, assigned when added to a workplan (0 until then)
    #[serde(default)]
    pub id: ElementId,

    /// Human-readable name
    pub name: String,

    /// Classification flags
    #[serde(default)]
    pub classification: NodeClassification,
}

impl Connector {
    /// Creates a connector; the id is assigned by [`Workplan::add_connector`].
    pub fn new(name: impl Into<String>, classification: NodeClassification) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
            classification,
        }
    }
}

/// How a step moves tokens when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepKind {
    /// Consumes one token per input, emits on the context-selected output.
    /// Waits for an explicit fire from the executing layer.
    #[default]
    Task,

    /// Fans out: the main token follows the first output, fresh branch
    /// tokens follow the rest. Fires automatically.
    Split,

    /// Merges: forwards any arriving token to the first output, the main
    /// token winning if several arrived. Fires automatically.
    Join,
}

/// A transition prototype: references connectors positionally via ordered
/// input and output slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Element id, assigned when added to a workplan (0 until then)
    #[serde(default)]
    pub id: ElementId,

    /// Human-readable name
    pub name: String,

    /// Firing behavior
    #[serde(default)]
    pub kind: StepKind,

    /// Ordered input connector ids
    #[serde(default)]
    pub inputs: Vec<ElementId>,

    /// Ordered output connector ids
    #[serde(default)]
    pub outputs: Vec<ElementId>,
}

impl Step {
    /// Creates a task step; the id is assigned by [`Workplan::add_step`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
            kind: StepKind::Task,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Sets the firing behavior.
    pub fn with_kind(mut self, kind: StepKind) -> Self {
        self.kind = kind;
        self
    }

    /// Appends an input connector slot.
    pub fn with_input(mut self, connector: ElementId) -> Self {
        self.inputs.push(connector);
        self
    }

    /// Appends an output connector slot.
    pub fn with_output(mut self, connector: ElementId) -> Self {
        self.outputs.push(connector);
        self
    }
}

/// Editing state of a workplan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkplanState {
    /// Still being edited
    #[default]
    New,
    /// Released for execution
    Released,
    /// Superseded by a newer version
    Retired,
}

/// A complete workplan graph: connectors plus steps, owned element ids.
///
/// Workplans are created and mutated by an editing session, loaded from a
/// [`Workplans`](crate::workplan::Workplans) store, and are immutable to the
/// engine once execution begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workplan {
    /// Workplan id (assigned by the owning store/session)
    #[serde(default)]
    pub id: i64,

    /// Workplan name, also the snapshot tag
    pub name: String,

    /// Revision number
    #[serde(default)]
    pub version: u32,

    /// Editing state
    #[serde(default)]
    pub state: WorkplanState,

    /// Highest element id handed out so far; ids are never reused
    #[serde(default)]
    max_element_id: ElementId,

    /// Places, in declared order
    connectors: Vec<Connector>,

    /// Steps, in declared order
    steps: Vec<Step>,
}

impl Workplan {
    /// Creates a new empty workplan.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
            version: 0,
            state: WorkplanState::New,
            max_element_id: 0,
            connectors: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Adds a connector, assigning it the next element id.
    pub fn add_connector(&mut self, mut connector: Connector) -> ElementId {
        self.max_element_id += 1;
        connector.id = self.max_element_id;
        let id = connector.id;
        self.connectors.push(connector);
        id
    }

    /// Adds a step, assigning it the next element id.
    pub fn add_step(&mut self, mut step: Step) -> ElementId {
        self.max_element_id += 1;
        step.id = self.max_element_id;
        let id = step.id;
        self.steps.push(step);
        id
    }

    /// Removes a connector from the owning sequence.
    ///
    /// Only detaches: steps still referencing the id are left alone, since
    /// edges live on each step's input/output slots. Callers are responsible
    /// for consistency after removal.
    pub fn remove_connector(&mut self, id: ElementId) -> bool {
        let before = self.connectors.len();
        self.connectors.retain(|c| c.id != id);
        self.connectors.len() != before
    }

    /// Removes a step from the owning sequence. Only detaches.
    pub fn remove_step(&mut self, id: ElementId) -> bool {
        let before = self.steps.len();
        self.steps.retain(|s| s.id != id);
        self.steps.len() != before
    }

    /// Gets a connector by id.
    pub fn connector(&self, id: ElementId) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == id)
    }

    /// Gets a step by id.
    pub fn step(&self, id: ElementId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// All connectors in declared order.
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// All steps in declared order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Start-classified places in declared order.
    pub fn start_places(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.iter().filter(|c| c.classification.is_start())
    }

    /// Exit-classified places in declared order.
    pub fn exit_places(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.iter().filter(|c| c.classification.is_exit())
    }

    /// Highest element id handed out so far.
    pub fn max_element_id(&self) -> ElementId {
        self.max_element_id
    }
}
