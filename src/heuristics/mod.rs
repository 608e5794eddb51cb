pub mod body;
pub mod header;
pub mod links;

use crate::config::HeuristicsConfig;
use crate::ParsedMessage;
use serde::{Deserialize, Serialize};

pub use body::BodyEvaluator;
pub use header::HeaderEvaluator;
pub use links::UrlEvaluator;

/// Upper bound of the combined heuristic score
pub const HEURISTIC_TOTAL_CAP: u32 = 100;

/// Bounded score and ordered reasons produced by one evaluator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: u32,
    pub reasons: Vec<String>,
}

impl EvaluationResult {
    /// Clamp a raw accumulated score to the evaluator's cap
    pub fn capped(raw_score: u32, cap: u32, reasons: Vec<String>) -> Self {
        Self {
            score: raw_score.min(cap),
            reasons,
        }
    }
}

pub trait Evaluator: Send + Sync {
    fn evaluate(&self, message: &ParsedMessage) -> EvaluationResult;
    fn name(&self) -> &str;
    fn cap(&self) -> u32;
}

#[derive(Debug, Clone, Serialize)]
pub struct HeuristicAnalysis {
    pub results: Vec<(String, EvaluationResult)>,
    pub total_score: u32,
}

impl HeuristicAnalysis {
    /// Reasons of every evaluator, in evaluation order
    pub fn reasons(&self) -> Vec<String> {
        self.results
            .iter()
            .flat_map(|(_, result)| result.reasons.iter().cloned())
            .collect()
    }
}

/// Runs the header, URL and body evaluators in that fixed order
pub struct HeuristicEngine {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl Default for HeuristicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicEngine {
    pub fn new() -> Self {
        Self {
            evaluators: vec![
                Box::new(HeaderEvaluator::new()),
                Box::new(UrlEvaluator::new()),
                Box::new(BodyEvaluator::new()),
            ],
        }
    }

    pub fn from_config(config: &HeuristicsConfig) -> Self {
        Self {
            evaluators: vec![
                Box::new(HeaderEvaluator::new()),
                Box::new(UrlEvaluator::from_config(config)),
                Box::new(BodyEvaluator::from_config(config)),
            ],
        }
    }

    pub fn analyze(&self, message: &ParsedMessage) -> HeuristicAnalysis {
        let mut results = Vec::with_capacity(self.evaluators.len());
        let mut total_score = 0u32;

        for evaluator in &self.evaluators {
            let mut result = evaluator.evaluate(message);
            result.score = result.score.min(evaluator.cap());
            log::debug!(
                "{} scored {}/{} ({} reason(s))",
                evaluator.name(),
                result.score,
                evaluator.cap(),
                result.reasons.len()
            );
            total_score = total_score.saturating_add(result.score);
            results.push((evaluator.name().to_string(), result));
        }

        HeuristicAnalysis {
            results,
            total_score: total_score.min(HEURISTIC_TOTAL_CAP),
        }
    }
}
