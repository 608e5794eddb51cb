use crate::fusion::FusionConfig;
use crate::heuristics::links::DEFAULT_MAX_URLS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub heuristics: HeuristicsConfig,
    pub classifier: ClassifierConfig,
    pub reputation: ReputationConfig,
    pub fusion: FusionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// URLs scored per message; the rest only count toward the volume bonus
    pub max_urls: usize,
    pub extra_phrases: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
            extra_phrases: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: Option<String>,
    /// Probability used when no model is available
    pub prior: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            prior: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub base_url: String,
    pub max_urls: usize,
    pub request_timeout_secs: u64,
    pub pacing_ms: u64,
    pub submit_wait_ms: u64,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub total_budget_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_key_env: "VT_API_KEY".to_string(),
            base_url: "https://www.virustotal.com/api/v3".to_string(),
            max_urls: 10,
            request_timeout_secs: 15,
            pacing_ms: 1500,
            submit_wait_ms: 2000,
            poll_attempts: 5,
            poll_interval_ms: 2000,
            total_budget_secs: 60,
        }
    }
}

impl ReputationConfig {
    /// API key from the file, else from the configured environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn total_budget(&self) -> Duration {
        Duration::from_secs(self.total_budget_secs)
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.fusion.validate()?;

        if !(0.0..=1.0).contains(&self.classifier.prior) {
            anyhow::bail!(
                "classifier prior must be within [0, 1], got {}",
                self.classifier.prior
            );
        }

        if self.reputation.request_timeout_secs == 0 || self.reputation.total_budget_secs == 0 {
            anyhow::bail!("reputation timeouts must be greater than zero");
        }

        Ok(())
    }
}
