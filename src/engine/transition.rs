//! Runtime Transitions
//!
//! Transitions are instantiated from workplan steps when an engine
//! initializes. Task transitions announce themselves as pending and wait for
//! the executing layer to fire them; split, join, and null (disabled-step)
//! transitions fire automatically as tokens arrive.
//!
//! The [`ExecutionGauge`] replaces the original busy-wait drain: every
//! execution context holds a [`WorkGuard`] while transition logic runs, and
//! pause blocks on a condvar until the count reaches zero.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::workplan::{ElementId, Step, StepKind};

/// Execution context consulted when a workplan is instantiated and while
/// transitions fire.
pub trait WorkplanContext {
    /// Disabled steps are instantiated as null pass-through transitions.
    fn is_disabled(&self, step_id: ElementId) -> bool {
        let _ = step_id;
        false
    }

    /// Selects which output slot a firing task routes its token to.
    /// The returned index is clamped to the slot count.
    fn select_output(&self, step_id: ElementId, output_count: usize) -> usize {
        let _ = (step_id, output_count);
        0
    }
}

/// Context with nothing disabled and first-output routing.
#[derive(Debug, Default)]
pub struct DefaultContext;

impl WorkplanContext for DefaultContext {}

/// Firing behavior of a runtime transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Consumes one token per input, routes to the context-selected output;
    /// fired explicitly by the executing layer.
    Task,

    /// Fans the main token out to the first output and branch tokens to the
    /// rest; fires automatically.
    Split,

    /// Forwards any arriving token to the first output, the main token
    /// winning if several arrived; fires automatically.
    Join,

    /// Pass-through substituted for a disabled step; fires automatically.
    Null,
}

/// A transition instantiated from a step for one engine run.
#[derive(Debug, Clone)]
pub struct RuntimeTransition {
    pub id: ElementId,
    pub name: String,
    pub kind: TransitionKind,
    pub inputs: Vec<ElementId>,
    pub outputs: Vec<ElementId>,
}

impl RuntimeTransition {
    /// Instantiates a step, substituting a null transition when the context
    /// disables it.
    pub fn instantiate(step: &Step, context: &dyn WorkplanContext) -> Self {
        let kind = if context.is_disabled(step.id) {
            TransitionKind::Null
        } else {
            match step.kind {
                StepKind::Task => TransitionKind::Task,
                StepKind::Split => TransitionKind::Split,
                StepKind::Join => TransitionKind::Join,
            }
        };

        Self {
            id: step.id,
            name: step.name.clone(),
            kind,
            inputs: step.inputs.clone(),
            outputs: step.outputs.clone(),
        }
    }

    /// Automatic transitions fire as soon as their tokens arrive; tasks wait
    /// for an explicit fire.
    pub fn is_auto(&self) -> bool {
        !matches!(self.kind, TransitionKind::Task)
    }

    /// Whether all-input (Petri) or any-input arrival enables this
    /// transition.
    pub fn requires_all_inputs(&self) -> bool {
        matches!(self.kind, TransitionKind::Task | TransitionKind::Split)
    }
}

/// Shared count of execution contexts currently inside transition logic.
///
/// Cloning yields a handle to the same gauge, so external execution contexts
/// (device callbacks, tests) can hold guards while the engine waits.
#[derive(Clone, Default)]
pub struct ExecutionGauge {
    inner: Arc<GaugeInner>,
}

#[derive(Default)]
struct GaugeInner {
    count: Mutex<usize>,
    released: Condvar,
}

impl ExecutionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // A poisoned count is still a valid count
        self.inner
            .count
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks an execution context as active until the guard drops.
    pub fn begin(&self) -> WorkGuard {
        *self.lock() += 1;
        WorkGuard {
            gauge: self.clone(),
        }
    }

    /// Number of currently active execution contexts.
    pub fn active(&self) -> usize {
        *self.lock()
    }

    /// Blocks until no execution context is active. Returns false if the
    /// timeout elapsed first; `None` waits indefinitely.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut count = self.lock();

        while *count > 0 {
            match deadline {
                None => {
                    count = self
                        .inner
                        .released
                        .wait(count)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    let (guard, result) = self
                        .inner
                        .released
                        .wait_timeout(count, remaining)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    count = guard;
                    if result.timed_out() && *count > 0 {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// RAII marker for one active execution context.
pub struct WorkGuard {
    gauge: ExecutionGauge,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        let mut count = self.gauge.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.gauge.inner.released.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workplan::Step;
    use std::thread;

    struct DisableAll;

    impl WorkplanContext for DisableAll {
        fn is_disabled(&self, _step_id: ElementId) -> bool {
            true
        }
    }

    #[test]
    fn test_instantiate_task() {
        let mut step = Step::new("work").with_input(1).with_output(2);
        step.id = 3;

        let transition = RuntimeTransition::instantiate(&step, &DefaultContext);
        assert_eq!(transition.id, 3);
        assert_eq!(transition.kind, TransitionKind::Task);
        assert!(!transition.is_auto());
        assert!(transition.requires_all_inputs());
    }

    #[test]
    fn test_instantiate_disabled_step_as_null() {
        let mut step = Step::new("work").with_input(1).with_output(2);
        step.id = 3;

        let transition = RuntimeTransition::instantiate(&step, &DisableAll);
        assert_eq!(transition.kind, TransitionKind::Null);
        assert!(transition.is_auto());
    }

    #[test]
    fn test_instantiate_split_and_join() {
        let mut split = Step::new("fork").with_kind(StepKind::Split);
        split.id = 1;
        let mut join = Step::new("merge").with_kind(StepKind::Join);
        join.id = 2;

        let split = RuntimeTransition::instantiate(&split, &DefaultContext);
        let join = RuntimeTransition::instantiate(&join, &DefaultContext);

        assert!(split.is_auto());
        assert!(split.requires_all_inputs());
        assert!(join.is_auto());
        assert!(!join.requires_all_inputs());
    }

    #[test]
    fn test_gauge_counts_guards() {
        let gauge = ExecutionGauge::new();
        assert_eq!(gauge.active(), 0);

        let a = gauge.begin();
        let b = gauge.begin();
        assert_eq!(gauge.active(), 2);

        drop(a);
        assert_eq!(gauge.active(), 1);
        drop(b);
        assert_eq!(gauge.active(), 0);
    }

    #[test]
    fn test_wait_idle_when_already_idle() {
        let gauge = ExecutionGauge::new();
        assert!(gauge.wait_idle(None));
        assert!(gauge.wait_idle(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_wait_idle_times_out_while_held() {
        let gauge = ExecutionGauge::new();
        let _guard = gauge.begin();
        assert!(!gauge.wait_idle(Some(Duration::from_millis(20))));
    }

    #[test]
    fn test_wait_idle_blocks_until_release() {
        let gauge = ExecutionGauge::new();
        let guard = gauge.begin();

        let waiter = {
            let gauge = gauge.clone();
            thread::spawn(move || gauge.wait_idle(None))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        drop(guard);
        assert!(waiter.join().unwrap());
    }
}
