//! planrun - Workplan Execution Engine
//!
//! A graph-based, token-passing execution engine for manufacturing process
//! workflows: a Petri-net-like model where places hold tokens and
//! transitions move them, with pause/resume snapshotting and early outcome
//! prediction for running instances.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`workplan`]: The workplan graph model, validation, and persistence
//! - [`engine`]: Token-passing execution with lifecycle and snapshots
//! - [`prediction`]: Reachability analysis and terminal outcome forecasting
//!
//! # Example
//!
//! ```rust
//! use planrun::engine::WorkflowEngine;
//! use planrun::workplan::{Connector, NodeClassification, Step, Workplan};
//!
//! let mut plan = Workplan::new("mill");
//! let start = plan.add_connector(Connector::new("start", NodeClassification::START));
//! let end = plan.add_connector(Connector::new("end", NodeClassification::END));
//! plan.add_step(Step::new("machine-part").with_input(start).with_output(end));
//!
//! let mut engine = WorkflowEngine::new();
//! engine.initialize(plan);
//! engine.start();
//! while let Some(&next) = engine.pending_transitions().first() {
//!     engine.fire_transition(next);
//! }
//! ```

pub mod engine;
pub mod prediction;
pub mod workplan;

// Re-export commonly used types
pub use engine::{EngineState, Snapshot, Token, WorkflowEngine};
pub use prediction::{PathPrediction, PathPredictor};
pub use workplan::{Connector, NodeClassification, Step, Workplan};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "planrun";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "planrun");
    }

    #[test]
    fn test_module_exports_workplan() {
        let plan = Workplan::new("test");
        assert!(plan.connectors().is_empty());
        assert!(plan.steps().is_empty());
    }

    #[test]
    fn test_module_exports_engine() {
        let engine = WorkflowEngine::new();
        assert_eq!(engine.state(), &EngineState::Idle);
    }
}
