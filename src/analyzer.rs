//! Analysis pipeline
//!
//! Runs the heuristic evaluators, the classifier and the reputation lookup
//! over one message and hands their outputs to the fusion engine. Holds no
//! per-message state, so one `Analyzer` can serve many messages at once.

use crate::classifier::{ClassifierAdapter, TextClassifier};
use crate::config::Config;
use crate::fusion::{FusionEngine, Verdict};
use crate::heuristics::HeuristicEngine;
use crate::reputation::{lookup_from_config, ReputationAdapter, ReputationLookup};
use crate::ParsedMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub heuristics: u32,
    pub ml: f64,
    pub vt_malicious: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    pub subject: String,
    pub from_addr: String,
    pub urls: Vec<String>,
}

/// Final decision for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub verdict: Verdict,
    /// Rounded to 3 decimals
    pub confidence: f64,
    pub scores: Scores,
    /// Header, URL, body, classifier, then fusion reasons
    pub reasons: Vec<String>,
    pub artifacts: Artifacts,
}

impl AnalysisResult {
    pub fn heuristic_score(&self) -> u32 {
        self.scores.heuristics
    }

    pub fn classifier_probability(&self) -> f64 {
        self.scores.ml
    }

    pub fn reputation_malicious_total(&self) -> u64 {
        self.scores.vt_malicious
    }
}

pub struct Analyzer {
    heuristics: HeuristicEngine,
    classifier: ClassifierAdapter,
    reputation: ReputationAdapter,
    fusion: FusionEngine,
}

impl Analyzer {
    pub fn new(
        heuristics: HeuristicEngine,
        classifier: ClassifierAdapter,
        reputation: ReputationAdapter,
        fusion: FusionEngine,
    ) -> Self {
        Self {
            heuristics,
            classifier,
            reputation,
            fusion,
        }
    }

    /// Build the pipeline with capabilities loaded from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let lookup = lookup_from_config(&config.reputation)?;

        Ok(Self::new(
            HeuristicEngine::from_config(&config.heuristics),
            ClassifierAdapter::from_config(&config.classifier),
            ReputationAdapter::from_config(lookup, &config.reputation),
            FusionEngine::new(config.fusion.clone()),
        ))
    }

    /// Build the pipeline around caller-supplied capabilities
    pub fn with_capabilities(
        config: &Config,
        classifier: Option<Arc<dyn TextClassifier>>,
        reputation: Arc<dyn ReputationLookup>,
    ) -> Self {
        Self::new(
            HeuristicEngine::from_config(&config.heuristics),
            ClassifierAdapter::new(classifier, config.classifier.prior),
            ReputationAdapter::from_config(reputation, &config.reputation),
            FusionEngine::new(config.fusion.clone()),
        )
    }

    pub async fn analyze(&self, message: &ParsedMessage) -> AnalysisResult {
        let local_signals = async {
            (
                self.heuristics.analyze(message),
                self.classifier.assess(&message.subject, &message.body),
            )
        };
        let (reputation, (heuristics, classifier)) =
            tokio::join!(self.reputation.collect(&message.urls), local_signals);

        let outcome = self
            .fusion
            .fuse(heuristics.total_score, classifier.probability, &reputation);

        let mut reasons = heuristics.reasons();
        reasons.push(classifier.reason);
        reasons.extend(outcome.reasons);

        log::info!(
            "Verdict {} (confidence {:.3}, heuristics {}, ml {:.3}{}, reputation {})",
            outcome.verdict,
            outcome.confidence,
            heuristics.total_score,
            classifier.probability,
            if classifier.degraded { " prior" } else { "" },
            outcome.reputation_malicious_total
        );

        AnalysisResult {
            verdict: outcome.verdict,
            confidence: round3(outcome.confidence),
            scores: Scores {
                heuristics: heuristics.total_score,
                ml: round3(classifier.probability),
                vt_malicious: outcome.reputation_malicious_total,
            },
            reasons,
            artifacts: Artifacts {
                subject: message.subject.clone(),
                from_addr: message.from_address.clone(),
                urls: message.urls.clone(),
            },
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
