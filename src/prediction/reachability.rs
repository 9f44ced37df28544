//! Reachability Analysis
//!
//! Precomputed backward reachability over a workplan graph: for every place,
//! which exit places a token resting there can still reach. Built once per
//! workplan and shared read-only across every engine the predictor monitors.

use std::collections::{BTreeSet, HashMap};

use crate::workplan::{ElementId, NodeClassification, ValidationError, Workplan};

/// Map from every place to the exit places reachable from it.
///
/// Construction reverses each step's output→input edges and walks backward
/// from every exit. Recording a result a second time for the same place
/// stops the walk along that path, which makes the analysis terminate on
/// cyclic graphs and bounds work to exits × edges.
#[derive(Debug)]
pub struct ReachabilityTable {
    reachable_exits: HashMap<ElementId, BTreeSet<ElementId>>,
    exit_classifications: HashMap<ElementId, NodeClassification>,
}

impl ReachabilityTable {
    /// Builds the table for a workplan. A step edge referencing a
    /// non-existent connector is a configuration error and fails fast.
    pub fn build(workplan: &Workplan) -> Result<Self, ValidationError> {
        let mut predecessors: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for step in workplan.steps() {
            for slot in step.inputs.iter().chain(step.outputs.iter()) {
                if workplan.connector(*slot).is_none() {
                    return Err(ValidationError::UnknownConnector {
                        step: step.name.clone(),
                        connector: *slot,
                    });
                }
            }
            for output in &step.outputs {
                predecessors
                    .entry(*output)
                    .or_default()
                    .extend(step.inputs.iter().copied());
            }
        }

        let mut reachable_exits: HashMap<ElementId, BTreeSet<ElementId>> = HashMap::new();
        let mut exit_classifications = HashMap::new();
        for exit in workplan.exit_places() {
            exit_classifications.insert(exit.id, exit.classification);

            let mut stack = vec![exit.id];
            while let Some(place) = stack.pop() {
                // Already recorded: every path through here was walked
                if !reachable_exits.entry(place).or_default().insert(exit.id) {
                    continue;
                }
                if let Some(preds) = predecessors.get(&place) {
                    stack.extend(preds.iter().copied());
                }
            }
        }

        Ok(Self {
            reachable_exits,
            exit_classifications,
        })
    }

    /// Exit places reachable from a place, in ascending id order.
    pub fn exits_from(&self, place: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.reachable_exits
            .get(&place)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Bitwise AND of the classification over every exit reachable from a
    /// place; `NONE` when no exit is reachable.
    ///
    /// The AND keeps the failure bit only when every reachable exit carries
    /// it, so the result commits to a failed outcome only when no recovery
    /// path exists.
    pub fn aggregated_classification(&self, place: ElementId) -> NodeClassification {
        let mut exits = self
            .exits_from(place)
            .filter_map(|e| self.exit_classifications.get(&e).copied());
        match exits.next() {
            None => NodeClassification::NONE,
            Some(first) => exits.fold(first, |acc, c| acc & c),
        }
    }
}
