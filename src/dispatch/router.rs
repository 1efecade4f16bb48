//! Keyword routing of free-text requests

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Analysis,
    Modeling,
    Evaluation,
}

impl TaskKind {
    /// Tie-break order, strongest first
    pub const PRIORITY: [TaskKind; 3] = [TaskKind::Evaluation, TaskKind::Modeling, TaskKind::Analysis];

    /// Lower-case word prefixes that vote for this kind
    ///
    /// A multi-word keyword matches consecutive words of the request.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            TaskKind::Analysis => &[
                "analy",
                "explor",
                "eda",
                "statistic",
                "distribution",
                "correlation",
                "summar",
                "profile",
                "describe",
            ],
            TaskKind::Modeling => &[
                "train",
                "model",
                "fit",
                "classifier",
                "boost",
                "forest",
                "regression",
                "build",
            ],
            TaskKind::Evaluation => &[
                "evaluat",
                "test set",
                "test split",
                "metric",
                "accuracy",
                "auc",
                "assess",
                "performance",
                "score",
            ],
        }
    }

    /// Number of distinct keywords found in `words` (already lower-cased)
    fn score(&self, words: &[&str]) -> usize {
        self.keywords()
            .iter()
            .filter(|k| keyword_matches(k, words))
            .count()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Analysis => "analysis",
            TaskKind::Modeling => "modeling",
            TaskKind::Evaluation => "evaluation",
        };
        f.write_str(name)
    }
}

/// True when each part of `keyword` starts a consecutive word of `words`
fn keyword_matches(keyword: &str, words: &[&str]) -> bool {
    let parts: Vec<&str> = keyword.split_whitespace().collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(word, part)| word.starts_with(part)))
}

/// Route `request` to the kind with the most keyword hits
///
/// The request is split into words on anything that is not alphanumeric and
/// a keyword counts when it starts a word, so "fit" does not match inside
/// "benefits". Ties go to Evaluation, then Modeling, then Analysis. No hits
/// at all is `UnroutableRequest`.
pub fn classify(request: &str) -> Result<TaskKind> {
    let lowered = request.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mut best: Option<(TaskKind, usize)> = None;

    for kind in TaskKind::PRIORITY {
        let score = kind.score(&words);
        if score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if top >= score => {}
            _ => best = Some((kind, score)),
        }
    }

    best.map(|(kind, _)| kind)
        .ok_or_else(|| PipelineError::UnroutableRequest(request.to_string()))
}
