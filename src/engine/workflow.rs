//! Workflow Engine
//!
//! The orchestrator binding one workplan instance to one lifecycle. The
//! engine seeds tokens, moves them as transitions fire, produces and
//! consumes snapshots, and reports progress through registered callbacks.
//!
//! Each engine instance is cooperative and single-threaded: callers must
//! serialize initialize/start/pause/restore/destroy on one instance, and
//! callbacks fire synchronously on the mutating thread — listeners must not
//! call back into the engine. Parallelism comes from running many
//! independent instances.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::workplan::{ElementId, NodeClassification, Workplan};

use super::holder::{Holder, HolderArena};
use super::lifecycle::{EngineOp, EngineState};
use super::snapshot::Snapshot;
use super::token::Token;
use super::transition::{
    DefaultContext, ExecutionGauge, RuntimeTransition, TransitionKind, WorkplanContext,
};

/// Process-unique engine instance id.
pub type EngineId = u64;

fn next_engine_id() -> EngineId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Errors the engine reports. Operations illegal for the current lifecycle
/// state are not errors; they are absorbed silently.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pause drain timed out after {0:?}")]
    DrainTimeout(Duration),
}

/// A transition fired: consumed its input tokens and produced outputs.
#[derive(Debug, Clone)]
pub struct TransitionTriggered {
    pub engine: EngineId,
    pub transition: ElementId,
    pub name: String,
}

/// A token landed on a place.
#[derive(Debug, Clone)]
pub struct PlaceReached {
    pub engine: EngineId,
    pub place: ElementId,
    pub name: String,
    pub classification: NodeClassification,
    pub token: Token,
}

/// The run ended at an exit place.
#[derive(Debug, Clone)]
pub struct ProcessCompleted {
    pub engine: EngineId,
    pub place: ElementId,
    pub name: String,
    pub classification: NodeClassification,
}

pub type TriggeredListener = Arc<dyn Fn(&TransitionTriggered) + Send + Sync>;
pub type PlaceListener = Arc<dyn Fn(&PlaceReached) + Send + Sync>;
pub type CompletedListener = Arc<dyn Fn(&ProcessCompleted) + Send + Sync>;

/// Token-passing execution engine for one workplan instance.
///
/// # Example
///
/// ```rust
/// use planrun::engine::WorkflowEngine;
/// use planrun::workplan::{Connector, NodeClassification, Step, Workplan};
///
/// let mut plan = Workplan::new("demo");
/// let start = plan.add_connector(Connector::new("start", NodeClassification::START));
/// let end = plan.add_connector(Connector::new("end", NodeClassification::END));
/// plan.add_step(Step::new("work").with_input(start).with_output(end));
///
/// let mut engine = WorkflowEngine::new();
/// engine.initialize(plan);
/// engine.start();
/// engine.fire_pending();
/// ```
pub struct WorkflowEngine {
    id: EngineId,
    state: EngineState,
    workplan: Option<Workplan>,
    context: Box<dyn WorkplanContext + Send + Sync>,
    holders: HolderArena,
    transitions: Vec<RuntimeTransition>,
    gauge: ExecutionGauge,
    drain_timeout: Option<Duration>,
    triggered_listeners: Vec<TriggeredListener>,
    place_listeners: Vec<PlaceListener>,
    completed_listeners: Vec<CompletedListener>,
}

impl WorkflowEngine {
    /// Creates an idle engine with the default context.
    pub fn new() -> Self {
        Self {
            id: next_engine_id(),
            state: EngineState::Idle,
            workplan: None,
            context: Box::new(DefaultContext),
            holders: HolderArena::new(),
            transitions: Vec::new(),
            gauge: ExecutionGauge::new(),
            drain_timeout: None,
            triggered_listeners: Vec::new(),
            place_listeners: Vec::new(),
            completed_listeners: Vec::new(),
        }
    }

    /// Process-unique id of this engine instance.
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// The bound workplan, if initialized.
    pub fn workplan(&self) -> Option<&Workplan> {
        self.workplan.as_ref()
    }

    /// Handle to the execution gauge. External execution contexts hold a
    /// guard from it while running transition logic, so pause drains them.
    pub fn gauge(&self) -> ExecutionGauge {
        self.gauge.clone()
    }

    /// Bounds the pause drain wait. Default is no bound: pause waits until
    /// every execution context finishes, the observed behavior of the
    /// original engine.
    pub fn set_drain_timeout(&mut self, timeout: Option<Duration>) {
        self.drain_timeout = timeout;
    }

    /// Looks up a holder (place or transition) by element id.
    pub fn holder(&self, id: ElementId) -> Option<&Holder> {
        self.holders.get(id)
    }

    /// Registers a callback for fired transitions.
    pub fn on_transition_triggered(&mut self, listener: TriggeredListener) {
        self.triggered_listeners.push(listener);
    }

    /// Registers a callback for tokens landing on places.
    pub fn on_place_reached(&mut self, listener: PlaceListener) {
        self.place_listeners.push(listener);
    }

    /// Registers a callback for run completion.
    pub fn on_completed(&mut self, listener: CompletedListener) {
        self.completed_listeners.push(listener);
    }

    /// Binds a workplan: Idle → Ready. Absorbed in any other state.
    pub fn initialize(&mut self, workplan: Workplan) {
        self.initialize_with_context(workplan, Box::new(DefaultContext));
    }

    /// Binds a workplan with an explicit execution context.
    pub fn initialize_with_context(
        &mut self,
        workplan: Workplan,
        context: Box<dyn WorkplanContext + Send + Sync>,
    ) {
        if !self.state.permits(EngineOp::Initialize) {
            debug!("Initialize absorbed in state {}", self.state.name());
            return;
        }

        for connector in workplan.connectors() {
            self.holders.insert(Holder::place(connector));
        }
        for step in workplan.steps() {
            let transition = RuntimeTransition::instantiate(step, context.as_ref());
            self.holders
                .insert(Holder::transition(transition.id, &transition.name));
            self.transitions.push(transition);
        }

        info!(
            "Engine {} initialized with workplan '{}' ({} places, {} transitions)",
            self.id,
            workplan.name,
            workplan.connectors().len(),
            self.transitions.len()
        );

        self.context = context;
        self.workplan = Some(workplan);
        self.state = EngineState::Ready;
    }

    /// Starts or resumes execution: Ready|Paused|Restored → Running.
    ///
    /// From Ready, a main token is seeded on every start place in declared
    /// connector order. From Paused or Restored, relevant holders are
    /// resumed instead of reseeding; a restored engine whose holders are all
    /// empty stays Running with no tokens until destroyed.
    pub fn start(&mut self) {
        if !self.state.permits(EngineOp::Start) {
            debug!("Start absorbed in state {}", self.state.name());
            return;
        }

        let resuming = self.state.snapshot().is_some();
        self.state = EngineState::Running;
        info!("Engine {} {}", self.id, if resuming { "resuming" } else { "starting" });

        if resuming {
            for holder in self.holders.iter_mut() {
                if holder.is_relevant() {
                    holder.resume();
                }
            }
        } else {
            let starts: Vec<ElementId> = self
                .workplan
                .as_ref()
                .map(|p| p.start_places().map(|c| c.id).collect())
                .unwrap_or_default();
            for place in starts {
                self.deliver(place, Token::Main);
            }
        }

        self.advance();
    }

    /// Pauses a running engine and returns the snapshot: Running → Paused.
    ///
    /// Signals every relevant holder, waits until no execution context is
    /// inside transition logic, then captures every place and every
    /// token-carrying holder. When already Paused or Restored, the stored
    /// snapshot is returned; any other state is a no-op returning `None`.
    pub fn pause(&mut self) -> Result<Option<Snapshot>, EngineError> {
        match &self.state {
            EngineState::Running => {}
            EngineState::Paused(s) | EngineState::Restored(s) => return Ok(Some(s.clone())),
            other => {
                debug!("Pause absorbed in state {}", other.name());
                return Ok(None);
            }
        }

        let name = self
            .workplan
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let mut snapshot = Snapshot::new(name);

        for holder in self.holders.iter_mut() {
            if holder.is_relevant() {
                holder.pause();
            }
        }

        if !self.gauge.wait_idle(self.drain_timeout) {
            // Roll the pause signal back so the engine keeps running
            for holder in self.holders.iter_mut() {
                if holder.is_relevant() {
                    holder.resume();
                }
            }
            let waited = self.drain_timeout.unwrap_or_default();
            return Err(EngineError::DrainTimeout(waited));
        }

        for holder in self.holders.iter() {
            if holder.is_relevant() {
                snapshot.holders.push(holder.capture());
            }
        }

        info!(
            "Engine {} paused, captured {} holders ({} tokens)",
            self.id,
            snapshot.holders.len(),
            snapshot.token_count()
        );

        self.state = EngineState::Paused(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Applies a snapshot onto the live holders: Ready → Restored. Absorbed
    /// in any other state.
    ///
    /// # Panics
    ///
    /// Panics if a holder snapshot has no matching live holder — a
    /// workplan/snapshot mismatch is a programmer or data error, not a
    /// runtime condition.
    pub fn restore(&mut self, snapshot: Snapshot) {
        if !self.state.permits(EngineOp::Restore) {
            debug!("Restore absorbed in state {}", self.state.name());
            return;
        }

        for record in &snapshot.holders {
            match self.holders.get_mut(record.holder_id) {
                Some(holder) => holder.apply(record),
                None => panic!(
                    "snapshot holder {} has no matching holder in workplan '{}'",
                    record.holder_id, snapshot.workplan_name
                ),
            }
        }

        info!(
            "Engine {} restored snapshot of '{}' ({} tokens)",
            self.id,
            snapshot.workplan_name,
            snapshot.token_count()
        );

        self.state = EngineState::Restored(snapshot);
    }

    /// Tears the engine down from any state. A running engine is drained
    /// first (best effort), then every subscription and the workplan
    /// binding are dropped and the engine returns to Idle.
    pub fn destroy(&mut self) {
        if matches!(self.state, EngineState::Running) {
            for holder in self.holders.iter_mut() {
                if holder.is_relevant() {
                    holder.pause();
                }
            }
            let _ = self.gauge.wait_idle(self.drain_timeout);
        }

        if self.workplan.is_some() {
            info!("Engine {} destroyed", self.id);
        }

        self.triggered_listeners.clear();
        self.place_listeners.clear();
        self.completed_listeners.clear();
        self.transitions.clear();
        self.holders.clear();
        self.workplan = None;
        self.state = EngineState::Idle;
    }

    /// Enabled task transitions awaiting an explicit fire, in declared step
    /// order. Empty unless Running.
    pub fn pending_transitions(&self) -> Vec<ElementId> {
        if !matches!(self.state, EngineState::Running) {
            return Vec::new();
        }
        self.transitions
            .iter()
            .filter(|t| t.kind == TransitionKind::Task && self.is_enabled(t))
            .map(|t| t.id)
            .collect()
    }

    /// Fires one enabled task transition: consumes a token from each input,
    /// routes the surviving token to the context-selected output, and lets
    /// automatic transitions cascade. Returns false if the transition is
    /// unknown, not enabled, or the engine is not Running.
    pub fn fire_transition(&mut self, transition: ElementId) -> bool {
        if !matches!(self.state, EngineState::Running) {
            debug!("Fire absorbed in state {}", self.state.name());
            return false;
        }

        let Some(index) = self.transitions.iter().position(|t| t.id == transition) else {
            return false;
        };
        if !self.is_enabled(&self.transitions[index]) {
            return false;
        }

        self.fire_at(index);
        self.advance();
        true
    }

    /// Drives a deterministic run: fires the first pending transition until
    /// none remain or the run completes. Does not terminate on workplans
    /// whose cycles never reach an exit.
    pub fn fire_pending(&mut self) {
        while matches!(self.state, EngineState::Running) {
            let Some(&next) = self.pending_transitions().first() else {
                break;
            };
            self.fire_transition(next);
        }
    }

    /// A transition is enabled when its required inputs hold tokens and
    /// nothing involved is paused.
    fn is_enabled(&self, transition: &RuntimeTransition) -> bool {
        if transition.inputs.is_empty() || transition.outputs.is_empty() {
            return false;
        }
        if self
            .holders
            .get(transition.id)
            .map(|h| h.is_paused())
            .unwrap_or(true)
        {
            return false;
        }

        let mut any = false;
        for input in &transition.inputs {
            let Some(holder) = self.holders.get(*input) else {
                return false;
            };
            if holder.is_paused() {
                return false;
            }
            if holder.has_tokens() {
                any = true;
            } else if transition.requires_all_inputs() {
                return false;
            }
        }
        any
    }

    /// Fires automatic transitions (split/join/null) until none are enabled
    /// or the run completes.
    fn advance(&mut self) {
        while matches!(self.state, EngineState::Running) {
            let next = self
                .transitions
                .iter()
                .position(|t| t.is_auto() && self.is_enabled(t));
            match next {
                Some(index) => self.fire_at(index),
                None => break,
            }
        }
    }

    /// Consumes input tokens and routes the results for one transition. The
    /// execution gauge is held while tokens move, so a concurrent pause
    /// drains this critical section.
    fn fire_at(&mut self, index: usize) {
        let transition = self.transitions[index].clone();
        let guard = self.gauge.begin();

        // Task and split take one token per input, a join merges one from
        // every non-empty input, a null transition passes the first along
        let mut consumed: Vec<Token> = Vec::new();
        for input in &transition.inputs {
            if let Some(token) = self.holders.get_mut(*input).and_then(Holder::take_token) {
                consumed.push(token);
                if transition.kind == TransitionKind::Null {
                    break;
                }
            }
        }
        if consumed.is_empty() {
            return;
        }

        // The main token survives a merge; otherwise the first consumed does
        let primary_index = consumed.iter().position(Token::is_main).unwrap_or(0);
        let primary = consumed.swap_remove(primary_index);

        let mut deliveries: Vec<(ElementId, Token)> = Vec::new();
        match transition.kind {
            TransitionKind::Task => {
                let slot = self
                    .context
                    .select_output(transition.id, transition.outputs.len())
                    .min(transition.outputs.len() - 1);
                deliveries.push((transition.outputs[slot], primary));
            }
            TransitionKind::Null | TransitionKind::Join => {
                deliveries.push((transition.outputs[0], primary));
            }
            TransitionKind::Split => {
                deliveries.push((transition.outputs[0], primary));
                for (slot, output) in transition.outputs.iter().enumerate().skip(1) {
                    deliveries.push((*output, Token::branch(format!("{}:{}", transition.name, slot))));
                }
            }
        }

        drop(guard);

        debug!("Engine {} fired '{}'", self.id, transition.name);
        let event = TransitionTriggered {
            engine: self.id,
            transition: transition.id,
            name: transition.name,
        };
        for listener in self.triggered_listeners.clone() {
            listener(&event);
        }

        for (place, token) in deliveries {
            if !matches!(self.state, EngineState::Running) {
                break;
            }
            self.deliver(place, token);
        }
    }

    /// Lands a token on a place, announces it, and applies the completion
    /// rule: a failure place ends the run for any token, any exit place
    /// ends it for the main token.
    fn deliver(&mut self, place: ElementId, token: Token) {
        let Some(holder) = self.holders.get_mut(place) else {
            return;
        };
        holder.add_token(token.clone());
        let name = holder.name.clone();
        let classification = holder.classification;

        let event = PlaceReached {
            engine: self.id,
            place,
            name: name.clone(),
            classification,
            token: token.clone(),
        };
        for listener in self.place_listeners.clone() {
            listener(&event);
        }

        if classification.is_exit() && (classification.is_failure() || token.is_main()) {
            self.complete(place, name, classification);
        }
    }

    /// Internal completion trigger: Running → Idle.
    fn complete(&mut self, place: ElementId, name: String, classification: NodeClassification) {
        if !self.state.permits(EngineOp::Complete) {
            return;
        }
        self.state = EngineState::Idle;
        info!(
            "Engine {} completed at '{}' ({})",
            self.id, name, classification
        );

        let event = ProcessCompleted {
            engine: self.id,
            place,
            name,
            classification,
        };
        for listener in self.completed_listeners.clone() {
            listener(&event);
        }
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkflowEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
