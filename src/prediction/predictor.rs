//! Path Predictor
//!
//! Forecasts the terminal classification of running engines before they
//! physically complete. One predictor is built per workplan and monitors any
//! number of concurrently running engine instances of that workplan; the
//! only shared mutable state is the lock-guarded monitored set, since engine
//! callbacks arrive from arbitrary threads.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};

use crate::engine::{EngineId, PlaceReached, WorkflowEngine};
use crate::workplan::{ElementId, NodeClassification, ValidationError, Workplan};

use super::reachability::ReachabilityTable;

/// A forecast outcome for a monitored engine. Predictions are final: the
/// engine is deregistered the moment one is raised.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPrediction {
    pub engine: EngineId,

    /// Place whose aggregated classification resolved the outcome
    pub place: ElementId,

    /// Aggregated classification of every exit still reachable
    pub outcome: NodeClassification,

    /// Confidence; the aggregation commits only to certain outcomes
    pub probability: f64,
}

pub type PredictionListener = Arc<dyn Fn(&PathPrediction) + Send + Sync>;

/// Monitors running engines against a precomputed reachability table and
/// announces the terminal outcome as soon as it is certain.
///
/// A prediction is raised when a token reaches a place whose aggregated
/// classification resolves unambiguously: every reachable exit carries the
/// failure bit, or every reachable exit is a normal end. A bare common Exit
/// bit means both outcomes remain possible and no prediction is made.
pub struct PathPredictor {
    table: ReachabilityTable,
    monitored: Mutex<HashSet<EngineId>>,
    listeners: Mutex<Vec<PredictionListener>>,
}

impl PathPredictor {
    /// Builds a predictor for one workplan, precomputing its reachability
    /// table.
    pub fn new(workplan: &Workplan) -> Result<Self, ValidationError> {
        Ok(Self {
            table: ReachabilityTable::build(workplan)?,
            monitored: Mutex::new(HashSet::new()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// The precomputed reachability table.
    pub fn table(&self) -> &ReachabilityTable {
        &self.table
    }

    /// Registers a callback for raised predictions.
    pub fn on_prediction(&self, listener: PredictionListener) {
        self.lock_listeners().push(listener);
    }

    /// Subscribes to an engine's place-reached and completed events.
    /// Monitoring the same engine twice is a no-op.
    pub fn monitor(self: &Arc<Self>, engine: &mut WorkflowEngine) {
        if !self.lock_monitored().insert(engine.id()) {
            return;
        }
        debug!("Monitoring engine {}", engine.id());

        let predictor = Arc::downgrade(self);
        engine.on_place_reached(Arc::new(move |event| {
            if let Some(predictor) = predictor.upgrade() {
                predictor.place_reached(event);
            }
        }));

        let predictor = Arc::downgrade(self);
        engine.on_completed(Arc::new(move |event| {
            if let Some(predictor) = predictor.upgrade() {
                predictor.remove(event.engine);
            }
        }));
    }

    /// Deregisters an engine. Idempotent: returns whether the engine was
    /// still monitored.
    pub fn remove(&self, engine: EngineId) -> bool {
        self.lock_monitored().remove(&engine)
    }

    /// Whether an engine is currently monitored.
    pub fn is_monitored(&self, engine: EngineId) -> bool {
        self.lock_monitored().contains(&engine)
    }

    fn place_reached(&self, event: &PlaceReached) {
        let outcome = self.table.aggregated_classification(event.place);
        let certain = outcome.is_failure() || outcome.contains(NodeClassification::END);
        if !certain {
            return;
        }

        // The prediction is final: deregister before announcing, and only
        // announce once even if callbacks race
        if !self.remove(event.engine) {
            return;
        }

        info!(
            "Engine {} predicted {} from place '{}'",
            event.engine, outcome, event.name
        );
        let prediction = PathPrediction {
            engine: event.engine,
            place: event.place,
            outcome,
            probability: 1.0,
        };
        for listener in self.lock_listeners().clone() {
            listener(&prediction);
        }
    }

    fn lock_monitored(&self) -> MutexGuard<'_, HashSet<EngineId>> {
        self.monitored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<PredictionListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WorkplanContext;
    use crate::workplan::{Connector, Step};

    /// start → decide → {ok-path, doom-path}; ok-path → succeed → end;
    /// doom-path → fail → failed. Outcome is open until decide routes.
    fn forked_plan() -> Workplan {
        let mut plan = Workplan::new("forked");
        let start = plan.add_connector(Connector::new("start", NodeClassification::START));
        let ok_path = plan.add_connector(Connector::new("ok-path", NodeClassification::NONE));
        let doom_path = plan.add_connector(Connector::new("doom-path", NodeClassification::NONE));
        let end = plan.add_connector(Connector::new("end", NodeClassification::END));
        let failed = plan.add_connector(Connector::new("failed", NodeClassification::FAILED));
        plan.add_step(
            Step::new("decide")
                .with_input(start)
                .with_output(ok_path)
                .with_output(doom_path),
        );
        plan.add_step(Step::new("succeed").with_input(ok_path).with_output(end));
        plan.add_step(Step::new("fail").with_input(doom_path).with_output(failed));
        plan
    }

    struct RouteTo(usize);

    impl WorkplanContext for RouteTo {
        fn select_output(&self, _step_id: ElementId, output_count: usize) -> usize {
            self.0.min(output_count.saturating_sub(1))
        }
    }

    fn record_predictions(predictor: &PathPredictor) -> Arc<Mutex<Vec<PathPrediction>>> {
        let predictions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&predictions);
        predictor.on_prediction(Arc::new(move |p| {
            sink.lock().unwrap().push(p.clone());
        }));
        predictions
    }

    #[test]
    fn test_no_prediction_while_outcome_is_open() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());
        let predictions = record_predictions(&predictor);

        let mut engine = WorkflowEngine::new();
        predictor.monitor(&mut engine);
        engine.initialize(plan);
        engine.start();

        // The start place still reaches both exits
        assert!(predictions.lock().unwrap().is_empty());
        assert!(predictor.is_monitored(engine.id()));
    }

    #[test]
    fn test_failure_predicted_before_completion() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());
        let predictions = record_predictions(&predictor);

        let mut engine = WorkflowEngine::new();
        predictor.monitor(&mut engine);
        engine.initialize_with_context(plan, Box::new(RouteTo(1)));
        engine.start();
        engine.fire_transition(6); // decide → doom-path

        // Predicted failed while the engine is still running
        assert_eq!(engine.state().name(), "Running");
        {
            let predictions = predictions.lock().unwrap();
            assert_eq!(predictions.len(), 1);
            assert!(predictions[0].outcome.is_failure());
            assert_eq!(predictions[0].probability, 1.0);
        }
        assert!(!predictor.is_monitored(engine.id()));

        // Completing the run raises no further prediction
        engine.fire_pending();
        assert_eq!(engine.state().name(), "Idle");
        assert_eq!(predictions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_success_predicted_once_recovery_paths_are_gone() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());
        let predictions = record_predictions(&predictor);

        let mut engine = WorkflowEngine::new();
        predictor.monitor(&mut engine);
        engine.initialize(plan);
        engine.start();
        engine.fire_transition(6); // decide → ok-path

        let predictions = predictions.lock().unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].outcome, NodeClassification::END);
        assert!(!predictions[0].outcome.is_failure());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());

        let mut engine = WorkflowEngine::new();
        predictor.monitor(&mut engine);

        assert!(predictor.remove(engine.id()));
        assert!(!predictor.remove(engine.id()));
    }

    #[test]
    fn test_completed_engine_is_deregistered() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());

        let mut engine = WorkflowEngine::new();
        predictor.monitor(&mut engine);
        engine.initialize(plan);
        engine.start();
        engine.fire_pending();

        assert_eq!(engine.state().name(), "Idle");
        assert!(!predictor.is_monitored(engine.id()));
    }

    #[test]
    fn test_engines_are_monitored_independently() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());
        let predictions = record_predictions(&predictor);

        let mut a = WorkflowEngine::new();
        let mut b = WorkflowEngine::new();
        predictor.monitor(&mut a);
        predictor.monitor(&mut b);
        a.initialize(plan.clone());
        b.initialize(plan);

        a.start();
        a.fire_transition(6);

        // Resolving engine A leaves engine B monitored
        assert!(!predictor.is_monitored(a.id()));
        assert!(predictor.is_monitored(b.id()));

        let predictions = predictions.lock().unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].engine, a.id());
    }

    #[test]
    fn test_monitor_twice_registers_once() {
        let plan = forked_plan();
        let predictor = Arc::new(PathPredictor::new(&plan).unwrap());
        let predictions = record_predictions(&predictor);

        let mut engine = WorkflowEngine::new();
        predictor.monitor(&mut engine);
        predictor.monitor(&mut engine);
        engine.initialize(plan);
        engine.start();
        engine.fire_transition(6);

        assert_eq!(predictions.lock().unwrap().len(), 1);
    }
}
