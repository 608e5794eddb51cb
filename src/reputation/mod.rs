pub mod virustotal;

use crate::config::ReputationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use virustotal::VirusTotalClient;

/// Third-party detection counts for one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationEntry {
    pub url: String,
    pub malicious_count: u32,
    pub suspicious_count: u32,
    pub harmless_count: u32,
}

/// External URL reputation source.
///
/// Implementations report only URLs they actually resolved and may fail as
/// a whole; callers go through [`ReputationAdapter`], which turns failures
/// and timeouts into an empty result.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, urls: &[String], limit: usize) -> anyhow::Result<Vec<ReputationEntry>>;
}

/// Reputation source used when lookups are disabled or unconfigured
pub struct DisabledReputation;

#[async_trait]
impl ReputationLookup for DisabledReputation {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn lookup(&self, _urls: &[String], _limit: usize) -> anyhow::Result<Vec<ReputationEntry>> {
        Ok(Vec::new())
    }
}

/// Pick the reputation source for a configuration
pub fn lookup_from_config(config: &ReputationConfig) -> anyhow::Result<Arc<dyn ReputationLookup>> {
    if !config.enabled {
        log::info!("URL reputation lookups disabled by configuration");
        return Ok(Arc::new(DisabledReputation));
    }

    match config.resolve_api_key() {
        Some(api_key) => Ok(Arc::new(VirusTotalClient::new(config, api_key)?)),
        None => {
            log::info!(
                "No reputation API key (set {} or reputation.api_key), skipping URL reputation",
                config.api_key_env
            );
            Ok(Arc::new(DisabledReputation))
        }
    }
}

/// Best-effort wrapper: bounded wall time, empty on any failure
pub struct ReputationAdapter {
    lookup: Arc<dyn ReputationLookup>,
    limit: usize,
    budget: Duration,
}

impl ReputationAdapter {
    pub fn new(lookup: Arc<dyn ReputationLookup>, limit: usize, budget: Duration) -> Self {
        Self {
            lookup,
            limit,
            budget,
        }
    }

    pub fn from_config(lookup: Arc<dyn ReputationLookup>, config: &ReputationConfig) -> Self {
        Self::new(lookup, config.max_urls, config.total_budget())
    }

    pub async fn collect(&self, urls: &[String]) -> Vec<ReputationEntry> {
        if urls.is_empty() || self.limit == 0 {
            return Vec::new();
        }

        let requested = &urls[..urls.len().min(self.limit)];
        let entries =
            match tokio::time::timeout(self.budget, self.lookup.lookup(requested, self.limit)).await
            {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    log::warn!("Reputation lookup via {} failed: {}", self.lookup.name(), e);
                    return Vec::new();
                }
                Err(_) => {
                    log::warn!(
                        "Reputation lookup via {} exceeded {:?}, continuing without it",
                        self.lookup.name(),
                        self.budget
                    );
                    return Vec::new();
                }
            };

        // Entries for URLs that were never requested are dropped
        let kept: Vec<ReputationEntry> = entries
            .into_iter()
            .filter(|entry| requested.contains(&entry.url))
            .take(self.limit)
            .collect();
        log::debug!(
            "Reputation via {}: {} entr(ies) for {} URL(s)",
            self.lookup.name(),
            kept.len(),
            requested.len()
        );
        kept
    }
}
