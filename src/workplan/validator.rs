//! Workplan Validation
//!
//! Fail-fast structural checks for workplan graphs. A malformed workplan is
//! a configuration error, not a runtime condition: validation findings are
//! reported before execution, and the reachability builder repeats the
//! edge-reference check itself so prediction fails fast even on unvalidated
//! input.

use std::collections::HashSet;

use log::{debug, info};
use thiserror::Error;

use super::model::{ElementId, Step, Workplan};

/// Structural problems in a workplan graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("workplan has no elements")]
    EmptyWorkplan,

    #[error("duplicate element id {0}")]
    DuplicateElementId(ElementId),

    #[error("step '{step}' references unknown connector {connector}")]
    UnknownConnector { step: String, connector: ElementId },

    #[error("step '{0}' has no input slots")]
    StepWithoutInputs(String),

    #[error("step '{0}' has no output slots")]
    StepWithoutOutputs(String),

    #[error("workplan has no start place (Entry|Border)")]
    NoStartPlace,

    #[error("workplan has no exit place")]
    NoExitPlace,
}

/// Validates a single step's slots against the known connector ids.
fn validate_step(step: &Step, known: &HashSet<ElementId>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.inputs.is_empty() {
        errors.push(ValidationError::StepWithoutInputs(step.name.clone()));
    }
    if step.outputs.is_empty() {
        errors.push(ValidationError::StepWithoutOutputs(step.name.clone()));
    }

    for connector in step.inputs.iter().chain(step.outputs.iter()) {
        if !known.contains(connector) {
            errors.push(ValidationError::UnknownConnector {
                step: step.name.clone(),
                connector: *connector,
            });
        }
    }

    errors
}

/// Validates the entire workplan structure.
///
/// Checks, in order:
/// 1. The workplan is not empty
/// 2. Element ids are unique across connectors and steps
/// 3. Every step has input and output slots referencing known connectors
/// 4. At least one start place and one exit place exist
///
/// Returns every finding rather than stopping at the first.
pub fn validate_workplan(plan: &Workplan) -> Result<(), Vec<ValidationError>> {
    info!(
        "Validating workplan '{}' ({} connectors, {} steps)",
        plan.name,
        plan.connectors().len(),
        plan.steps().len()
    );

    if plan.connectors().is_empty() && plan.steps().is_empty() {
        return Err(vec![ValidationError::EmptyWorkplan]);
    }

    let mut errors = Vec::new();

    // Element ids must be unique across both sequences
    let mut seen: HashSet<ElementId> = HashSet::new();
    let all_ids = plan
        .connectors()
        .iter()
        .map(|c| c.id)
        .chain(plan.steps().iter().map(|s| s.id));
    for id in all_ids {
        if !seen.insert(id) {
            errors.push(ValidationError::DuplicateElementId(id));
        }
    }

    let known: HashSet<ElementId> = plan.connectors().iter().map(|c| c.id).collect();
    for step in plan.steps() {
        let step_errors = validate_step(step, &known);
        for error in &step_errors {
            debug!("Step '{}': {}", step.name, error);
        }
        errors.extend(step_errors);
    }

    if plan.start_places().next().is_none() {
        errors.push(ValidationError::NoStartPlace);
    }
    if plan.exit_places().next().is_none() {
        errors.push(ValidationError::NoExitPlace);
    }

    if errors.is_empty() {
        info!("Workplan '{}' is valid", plan.name);
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workplan::model::{Connector, NodeClassification};

    fn valid_plan() -> Workplan {
        let mut plan = Workplan::new("valid");
        let start = plan.add_connector(Connector::new("start", NodeClassification::START));
        let end = plan.add_connector(Connector::new("end", NodeClassification::END));
        plan.add_step(Step::new("work").with_input(start).with_output(end));
        plan
    }

    #[test]
    fn test_valid_workplan() {
        assert!(validate_workplan(&valid_plan()).is_ok());
    }

    #[test]
    fn test_empty_workplan() {
        let plan = Workplan::new("empty");
        let errors = validate_workplan(&plan).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyWorkplan]);
    }

    #[test]
    fn test_unknown_connector_reference() {
        let mut plan = valid_plan();
        plan.add_step(Step::new("dangling").with_input(99).with_output(1));

        let errors = validate_workplan(&plan).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownConnector { connector: 99, .. }
        )));
    }

    #[test]
    fn test_removed_connector_leaves_dangling_edge() {
        let mut plan = valid_plan();
        plan.remove_connector(2); // the end place

        let errors = validate_workplan(&plan).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownConnector { connector: 2, .. })));
        assert!(errors.contains(&ValidationError::NoExitPlace));
    }

    #[test]
    fn test_step_without_slots() {
        let mut plan = valid_plan();
        plan.add_step(Step::new("isolated"));

        let errors = validate_workplan(&plan).unwrap_err();
        assert!(errors.contains(&ValidationError::StepWithoutInputs("isolated".to_string())));
        assert!(errors.contains(&ValidationError::StepWithoutOutputs("isolated".to_string())));
    }

    #[test]
    fn test_missing_start_place() {
        let mut plan = Workplan::new("no-start");
        let mid = plan.add_connector(Connector::new("mid", NodeClassification::NONE));
        let end = plan.add_connector(Connector::new("end", NodeClassification::END));
        plan.add_step(Step::new("work").with_input(mid).with_output(end));

        let errors = validate_workplan(&plan).unwrap_err();
        assert!(errors.contains(&ValidationError::NoStartPlace));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::UnknownConnector {
            step: "work".to_string(),
            connector: 7,
        };
        assert_eq!(err.to_string(), "step 'work' references unknown connector 7");

        assert_eq!(
            ValidationError::EmptyWorkplan.to_string(),
            "workplan has no elements"
        );
    }

    #[test]
    fn test_all_findings_reported() {
        let mut plan = Workplan::new("broken");
        plan.add_step(Step::new("dangling").with_input(5).with_output(6));

        let errors = validate_workplan(&plan).unwrap_err();
        // Two unknown connectors plus missing start and exit places
        assert!(errors.len() >= 4);
    }
}
