//! Workplan Definition Module
//!
//! Data structures and utilities for defining, validating, and persisting
//! workplan graphs.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Workplan, Connector, Step)
//! - [`validator`]: Fail-fast structural validation
//! - [`store`]: Load/save interface and YAML file-backed store

pub mod model;
pub mod store;
pub mod validator;

pub use model::{Connector, ElementId, NodeClassification, Step, StepKind, Workplan, WorkplanState};
pub use store::{FileWorkplans, StoreError, Workplans};
pub use validator::{validate_workplan, ValidationError};
