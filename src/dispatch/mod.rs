//! Request dispatch
//!
//! A free-text request is classified into a [`TaskKind`] and handed to the
//! handler registered for that kind. Handlers check their own preconditions:
//! modeling runs the analysis first when its artifact is absent, evaluation
//! needs a persisted model.

mod handlers;
mod router;

pub use handlers::{
    global_analysis, model_evaluation, model_training, run_modeling, ModelingReport,
    PipelineContext, ScorePair, IMBALANCE_NOTE_THRESHOLD,
};
pub use router::{classify, TaskKind};

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::info;

/// A delegate: takes the pipeline context, returns a JSON result
pub type Handler = fn(&PipelineContext) -> Result<Value>;

/// Which delegate ran and what it returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegate: String,
    pub result: Value,
}

/// Task kind -> named handler
#[derive(Clone)]
pub struct DispatchTable {
    handlers: BTreeMap<TaskKind, (&'static str, Handler)>,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.handlers.iter().map(|(kind, (name, _))| (kind, name)))
            .finish()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::empty()
            .register(TaskKind::Analysis, "global_analysis", global_analysis)
            .register(TaskKind::Modeling, "model_training", model_training)
            .register(TaskKind::Evaluation, "model_evaluation", model_evaluation)
    }
}

impl DispatchTable {
    /// The standard three delegates
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register (or replace) the handler for `kind`
    pub fn register(mut self, kind: TaskKind, name: &'static str, handler: Handler) -> Self {
        self.handlers.insert(kind, (name, handler));
        self
    }

    pub fn delegate_name(&self, kind: TaskKind) -> Option<&'static str> {
        self.handlers.get(&kind).map(|(name, _)| *name)
    }

    /// Classify `request` and run the matching handler
    pub fn dispatch(&self, ctx: &PipelineContext, request: &str) -> Result<Delegation> {
        let kind = classify(request)?;
        self.run(ctx, kind)
    }

    /// Run the handler for `kind` directly
    pub fn run(&self, ctx: &PipelineContext, kind: TaskKind) -> Result<Delegation> {
        let (name, handler) = self.handlers.get(&kind).ok_or_else(|| {
            PipelineError::UnroutableRequest(format!("no handler registered for {}", kind))
        })?;

        let start = Instant::now();
        info!(task = %kind, delegate = name, "Dispatching request");
        let result = handler(ctx)?;
        info!(
            delegate = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Delegate finished"
        );

        Ok(Delegation {
            delegate: name.to_string(),
            result,
        })
    }
}
