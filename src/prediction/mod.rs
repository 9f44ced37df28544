//! Prediction Module
//!
//! Early outcome forecasting: a precomputed reachability table per workplan
//! and a predictor that watches live engines for the moment their terminal
//! classification becomes certain.

pub mod predictor;
pub mod reachability;

pub use predictor::{PathPrediction, PathPredictor, PredictionListener};
pub use reachability::ReachabilityTable;
