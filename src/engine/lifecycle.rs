//! Engine Lifecycle
//!
//! The lifecycle state is a tagged value; legality of each operation is a
//! pure function of `(state, operation)`. Operations invalid for the current
//! state are absorbed silently by the engine rather than raising an error —
//! a deliberate permissive contract.

use super::snapshot::Snapshot;

/// Lifecycle operations an engine can be asked to perform. `Complete` is an
/// internal trigger raised when a token ends the run, not caller-invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Initialize,
    Start,
    Pause,
    Restore,
    Complete,
    Destroy,
}

/// Lifecycle state of a workflow engine. Paused and Restored carry the last
/// snapshot as payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineState {
    /// No workplan bound
    #[default]
    Idle,

    /// Workplan bound, tokens not yet seeded
    Ready,

    /// Tokens in play
    Running,

    /// Paused with the snapshot taken at pause time
    Paused(Snapshot),

    /// Ready with a snapshot applied; a subsequent start resumes
    Restored(Snapshot),
}

impl EngineState {
    /// The legality table: which operations are permitted in which state.
    ///
    /// | operation  | precondition              |
    /// |------------|---------------------------|
    /// | Initialize | Idle                      |
    /// | Start      | Ready, Paused, Restored   |
    /// | Pause      | Running                   |
    /// | Restore    | Ready                     |
    /// | Complete   | Running                   |
    /// | Destroy    | any                       |
    pub fn permits(&self, op: EngineOp) -> bool {
        matches!(
            (self, op),
            (EngineState::Idle, EngineOp::Initialize)
                | (EngineState::Ready, EngineOp::Start)
                | (EngineState::Paused(_), EngineOp::Start)
                | (EngineState::Restored(_), EngineOp::Start)
                | (EngineState::Running, EngineOp::Pause)
                | (EngineState::Ready, EngineOp::Restore)
                | (EngineState::Running, EngineOp::Complete)
                | (_, EngineOp::Destroy)
        )
    }

    /// The snapshot carried by Paused or Restored.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            EngineState::Paused(s) | EngineState::Restored(s) => Some(s),
            _ => None,
        }
    }

    /// Short state name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "Idle",
            EngineState::Ready => "Ready",
            EngineState::Running => "Running",
            EngineState::Paused(_) => "Paused",
            EngineState::Restored(_) => "Restored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ops() -> [EngineOp; 6] {
        [
            EngineOp::Initialize,
            EngineOp::Start,
            EngineOp::Pause,
            EngineOp::Restore,
            EngineOp::Complete,
            EngineOp::Destroy,
        ]
    }

    #[test]
    fn test_idle_permits_only_initialize_and_destroy() {
        let state = EngineState::Idle;
        for op in all_ops() {
            let expected = matches!(op, EngineOp::Initialize | EngineOp::Destroy);
            assert_eq!(state.permits(op), expected, "{:?}", op);
        }
    }

    #[test]
    fn test_ready_permits_start_restore_destroy() {
        let state = EngineState::Ready;
        for op in all_ops() {
            let expected = matches!(op, EngineOp::Start | EngineOp::Restore | EngineOp::Destroy);
            assert_eq!(state.permits(op), expected, "{:?}", op);
        }
    }

    #[test]
    fn test_running_permits_pause_complete_destroy() {
        let state = EngineState::Running;
        for op in all_ops() {
            let expected = matches!(op, EngineOp::Pause | EngineOp::Complete | EngineOp::Destroy);
            assert_eq!(state.permits(op), expected, "{:?}", op);
        }
    }

    #[test]
    fn test_paused_and_restored_permit_start_destroy() {
        for state in [
            EngineState::Paused(Snapshot::new("p")),
            EngineState::Restored(Snapshot::new("p")),
        ] {
            for op in all_ops() {
                let expected = matches!(op, EngineOp::Start | EngineOp::Destroy);
                assert_eq!(state.permits(op), expected, "{:?} in {}", op, state.name());
            }
        }
    }

    #[test]
    fn test_snapshot_payload() {
        assert!(EngineState::Idle.snapshot().is_none());
        assert!(EngineState::Running.snapshot().is_none());

        let state = EngineState::Paused(Snapshot::new("mill"));
        assert_eq!(state.snapshot().unwrap().workplan_name, "mill");
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(EngineState::default(), EngineState::Idle);
    }
}
