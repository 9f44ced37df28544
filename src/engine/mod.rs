//! Engine Module
//!
//! Token-passing execution: holders, runtime transitions, the lifecycle
//! state machine, pause snapshots, and the [`WorkflowEngine`] orchestrator
//! tying them together.

pub mod holder;
pub mod lifecycle;
pub mod snapshot;
pub mod token;
pub mod transition;
pub mod workflow;

pub use holder::{Holder, HolderArena, HolderKind};
pub use lifecycle::{EngineOp, EngineState};
pub use snapshot::{HolderSnapshot, Snapshot};
pub use token::Token;
pub use transition::{
    DefaultContext, ExecutionGauge, RuntimeTransition, TransitionKind, WorkGuard, WorkplanContext,
};
pub use workflow::{
    CompletedListener, EngineError, EngineId, PlaceListener, PlaceReached, ProcessCompleted,
    TransitionTriggered, TriggeredListener, WorkflowEngine,
};
