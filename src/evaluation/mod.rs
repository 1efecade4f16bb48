//! Model evaluation
//!
//! Loads a persisted pipeline with its feature manifest and scores it on the
//! test split only.

mod evaluator;

pub use evaluator::{evaluate_model, EvaluationReport, Evaluator};
