use crate::config::ClassifierConfig;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

lazy_static! {
    static ref TOKEN_REGEX: Regex = Regex::new(r"\b\w\w+\b").unwrap();
}

/// Probabilistic phishing classifier over free text
pub trait TextClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Probability in [0, 1] that the text is phishing
    fn probability(&self, text: &str) -> anyhow::Result<f64>;
}

fn default_max_ngram() -> usize {
    2
}

/// Logistic model over word unigrams and bigrams.
///
/// Each distinct token present adds its weight once; the probability is the
/// logistic of `bias` plus that sum. Training happens elsewhere, this only
/// loads the exported weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearTextModel {
    pub bias: f64,
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub stop_words: HashSet<String>,
    #[serde(default = "default_max_ngram")]
    pub max_ngram: usize,
}

impl LinearTextModel {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: LinearTextModel = serde_json::from_str(&content)?;
        if !model.bias.is_finite() || model.weights.values().any(|w| !w.is_finite()) {
            anyhow::bail!("model {} contains non-finite weights", path);
        }
        log::info!(
            "Loaded text model from {} ({} weighted token(s))",
            path,
            model.weights.len()
        );
        Ok(model)
    }

    /// Distinct lower-cased n-grams of the text, stop words removed
    pub fn tokens(&self, text: &str) -> BTreeSet<String> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = TOKEN_REGEX
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|word| !self.stop_words.contains(*word))
            .collect();

        let mut tokens = BTreeSet::new();
        for n in 1..=self.max_ngram.max(1) {
            for window in words.windows(n) {
                tokens.insert(window.join(" "));
            }
        }
        tokens
    }
}

impl TextClassifier for LinearTextModel {
    fn name(&self) -> &str {
        "linear_text_model"
    }

    fn probability(&self, text: &str) -> anyhow::Result<f64> {
        let logit = self
            .tokens(text)
            .iter()
            .filter_map(|token| self.weights.get(token))
            .fold(self.bias, |sum, weight| sum + weight);
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

/// Classifier output as consumed by fusion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierSignal {
    pub probability: f64,
    /// True when the prior was substituted for a missing or failed classifier
    pub degraded: bool,
    pub reason: String,
}

pub struct ClassifierAdapter {
    classifier: Option<Arc<dyn TextClassifier>>,
    prior: f64,
}

impl ClassifierAdapter {
    pub fn new(classifier: Option<Arc<dyn TextClassifier>>, prior: f64) -> Self {
        Self {
            classifier,
            prior: prior.clamp(0.0, 1.0),
        }
    }

    /// Load the configured model; an unusable model leaves the adapter on its prior
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let classifier = config.model_path.as_deref().and_then(|path| {
            match LinearTextModel::from_file(path) {
                Ok(model) => Some(Arc::new(model) as Arc<dyn TextClassifier>),
                Err(e) => {
                    log::warn!("Failed to load text model {}: {}, using prior", path, e);
                    None
                }
            }
        });
        if config.model_path.is_none() {
            log::info!("No text model configured, classifier uses prior {}", config.prior);
        }
        Self::new(classifier, config.prior)
    }

    pub fn assess(&self, subject: &str, body: &str) -> ClassifierSignal {
        let text = format!("{} {}", subject, body);
        let text = text.trim();

        let (probability, degraded) = match &self.classifier {
            Some(classifier) => match classifier.probability(text) {
                Ok(p) if p.is_nan() => {
                    log::warn!("{} returned NaN, using prior", classifier.name());
                    (self.prior, true)
                }
                Ok(p) => (p.clamp(0.0, 1.0), false),
                Err(e) => {
                    log::warn!("{} unavailable: {}, using prior", classifier.name(), e);
                    (self.prior, true)
                }
            },
            None => (self.prior, true),
        };

        let reason = if probability >= 0.5 {
            format!("ML suggests phishing (p={:.2})", probability)
        } else {
            format!("ML suggests ham (p={:.2})", 1.0 - probability)
        };

        ClassifierSignal {
            probability,
            degraded,
            reason,
        }
    }
}
