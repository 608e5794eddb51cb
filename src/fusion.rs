//! Fusion Engine
//!
//! Blends the heuristic total, the classifier probability and the URL
//! reputation signal into one confidence value and maps it onto a verdict
//! band. Pure: the same inputs always produce the same outcome.

use crate::heuristics::HEURISTIC_TOTAL_CAP;
use crate::reputation::ReputationEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    Quarantine,
    Block,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "ALLOW"),
            Verdict::Quarantine => write!(f, "QUARANTINE"),
            Verdict::Block => write!(f, "BLOCK"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub heuristic_weight: f64,
    pub classifier_weight: f64,
    pub reputation_weight: f64,
    pub block_threshold: f64,
    pub quarantine_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            heuristic_weight: 0.45,
            classifier_weight: 0.45,
            reputation_weight: 0.10,
            block_threshold: 0.80,
            quarantine_threshold: 0.55,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let weights = [
            self.heuristic_weight,
            self.classifier_weight,
            self.reputation_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            anyhow::bail!("fusion weights must be non-negative, got {:?}", weights);
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("fusion weights must sum to 1.0, got {}", sum);
        }

        for threshold in [self.block_threshold, self.quarantine_threshold] {
            if !(0.0..=1.0).contains(&threshold) {
                anyhow::bail!("fusion thresholds must be within [0, 1], got {}", threshold);
            }
        }
        if self.quarantine_threshold > self.block_threshold {
            anyhow::bail!(
                "quarantine threshold {} exceeds block threshold {}",
                self.quarantine_threshold,
                self.block_threshold
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionOutcome {
    pub verdict: Verdict,
    pub confidence: f64,
    pub reputation_malicious_total: u64,
    pub reasons: Vec<String>,
}

pub struct FusionEngine {
    config: FusionConfig,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Combine the three signals into a verdict.
    ///
    /// Out-of-range inputs are clamped; a NaN probability counts as
    /// neutral (0.5). An empty reputation list and a list with zero
    /// malicious detections are treated the same.
    pub fn fuse(
        &self,
        heuristic_total: u32,
        classifier_probability: f64,
        reputation: &[ReputationEntry],
    ) -> FusionOutcome {
        let heuristic = clamp_unit(heuristic_total as f64 / HEURISTIC_TOTAL_CAP as f64);
        let probability = if classifier_probability.is_nan() {
            0.5
        } else {
            clamp_unit(classifier_probability)
        };

        let reputation_malicious_total = reputation
            .iter()
            .fold(0u64, |total, entry| total.saturating_add(entry.malicious_count as u64));
        // Any detection counts fully, more detections add nothing
        let reputation_signal = if reputation_malicious_total > 0 { 1.0 } else { 0.0 };

        let confidence = clamp_unit(
            self.config.heuristic_weight * heuristic
                + self.config.classifier_weight * probability
                + self.config.reputation_weight * reputation_signal,
        );
        let verdict = self.verdict_for(confidence);

        let mut reasons = Vec::new();
        if reputation_malicious_total > 0 {
            reasons.push(format!(
                "URL reputation flagged {} malicious detection(s)",
                reputation_malicious_total
            ));
        }

        log::debug!(
            "Fusion: heuristic={:.3} classifier={:.3} reputation={} -> {:.3} {}",
            heuristic,
            probability,
            reputation_signal,
            confidence,
            verdict
        );

        FusionOutcome {
            verdict,
            confidence,
            reputation_malicious_total,
            reasons,
        }
    }

    /// Bands are closed on their lower bound
    pub fn verdict_for(&self, confidence: f64) -> Verdict {
        if confidence >= self.config.block_threshold {
            Verdict::Block
        } else if confidence >= self.config.quarantine_threshold {
            Verdict::Quarantine
        } else {
            Verdict::Allow
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
