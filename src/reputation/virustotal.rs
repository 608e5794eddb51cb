//! VirusTotal URL reputation client
//!
//! Known URLs are read from their last analysis. Unknown URLs (404) are
//! submitted, then the analysis is polled a bounded number of times.

use super::{ReputationEntry, ReputationLookup};
use crate::config::ReputationConfig;
use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// The service refused the client as a whole, not just one URL
#[derive(Debug)]
pub struct ServiceRefusal(String);

impl fmt::Display for ServiceRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reputation service refused requests: {}", self.0)
    }
}

impl std::error::Error for ServiceRefusal {}

#[derive(Debug, Default, Deserialize)]
struct AnalysisStats {
    #[serde(default)]
    malicious: i64,
    #[serde(default)]
    suspicious: i64,
    #[serde(default)]
    harmless: i64,
}

impl AnalysisStats {
    fn into_entry(self, url: &str) -> ReputationEntry {
        ReputationEntry {
            url: url.to_string(),
            malicious_count: clamp_count(self.malicious),
            suspicious_count: clamp_count(self.suspicious),
            harmless_count: clamp_count(self.harmless),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct UrlObject {
    attributes: UrlAttributes,
}

#[derive(Debug, Deserialize)]
struct UrlAttributes {
    #[serde(default)]
    last_analysis_stats: AnalysisStats,
}

#[derive(Debug, Deserialize)]
struct SubmissionObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisObject {
    attributes: AnalysisAttributes,
}

#[derive(Debug, Deserialize)]
struct AnalysisAttributes {
    status: String,
    #[serde(default)]
    stats: AnalysisStats,
}

pub struct VirusTotalClient {
    client: Client,
    api_key: String,
    base_url: String,
    pacing: Duration,
    submit_wait: Duration,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl VirusTotalClient {
    pub fn new(config: &ReputationConfig, api_key: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("phishgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pacing: Duration::from_millis(config.pacing_ms),
            submit_wait: Duration::from_millis(config.submit_wait_ms),
            poll_attempts: config.poll_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    /// URL identifier: unpadded URL-safe base64 of the URL itself
    pub fn url_id(url: &str) -> String {
        URL_SAFE_NO_PAD.encode(url)
    }

    async fn report(&self, url: &str) -> anyhow::Result<Option<ReputationEntry>> {
        let endpoint = format!("{}/urls/{}", self.base_url, Self::url_id(url));
        let response = self
            .client
            .get(&endpoint)
            .header("x-apikey", &self.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => self.submit_and_poll(url).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceRefusal(format!(
                "API key rejected ({})",
                response.status()
            ))
            .into()),
            StatusCode::TOO_MANY_REQUESTS => Err(ServiceRefusal("rate limited".to_string()).into()),
            status if status.is_success() => {
                let report: Envelope<UrlObject> = response
                    .json()
                    .await
                    .context("malformed URL report")?;
                Ok(Some(report.data.attributes.last_analysis_stats.into_entry(url)))
            }
            status => anyhow::bail!("unexpected status {}", status),
        }
    }

    async fn submit_and_poll(&self, url: &str) -> anyhow::Result<Option<ReputationEntry>> {
        log::debug!("URL unknown to reputation service, submitting: {}", url);
        let response = self
            .client
            .post(format!("{}/urls", self.base_url))
            .header("x-apikey", &self.api_key)
            .form(&[("url", url)])
            .send()
            .await?;

        if !response.status().is_success() {
            log::debug!("Submission of {} refused: {}", url, response.status());
            return Ok(None);
        }

        let submission: Envelope<SubmissionObject> = response
            .json()
            .await
            .context("malformed submission response")?;
        let endpoint = format!("{}/analyses/{}", self.base_url, submission.data.id);
        tokio::time::sleep(self.submit_wait).await;

        for attempt in 1..=self.poll_attempts {
            let response = self
                .client
                .get(&endpoint)
                .header("x-apikey", &self.api_key)
                .send()
                .await?;

            if response.status().is_success() {
                let analysis: Envelope<AnalysisObject> = response
                    .json()
                    .await
                    .context("malformed analysis response")?;
                if analysis.data.attributes.status == "completed" {
                    return Ok(Some(analysis.data.attributes.stats.into_entry(url)));
                }
            }

            log::debug!(
                "Analysis for {} not ready (attempt {}/{})",
                url,
                attempt,
                self.poll_attempts
            );
            tokio::time::sleep(self.poll_interval).await;
        }

        Ok(None)
    }
}

#[async_trait]
impl ReputationLookup for VirusTotalClient {
    fn name(&self) -> &str {
        "virustotal"
    }

    async fn lookup(&self, urls: &[String], limit: usize) -> anyhow::Result<Vec<ReputationEntry>> {
        let mut entries = Vec::new();

        for (index, url) in urls.iter().take(limit).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            match self.report(url).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => log::debug!("No reputation verdict for {}", url),
                // Remaining URLs would be refused too
                Err(e) if e.is::<ServiceRefusal>() => return Err(e),
                Err(e) => log::warn!("Reputation lookup for {} failed: {:#}", url, e),
            }
        }

        Ok(entries)
    }
}

fn clamp_count(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reputation::ReputationAdapter;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KNOWN: &str = "https://known.example/login";
    const UNKNOWN: &str = "https://fresh.example/";
    const BROKEN: &str = "https://broken.example/";

    fn report_path(url: &str) -> String {
        format!("/api/v3/urls/{}", VirusTotalClient::url_id(url))
    }

    async fn mock_service() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(report_path(KNOWN)))
            .and(header("x-apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"attributes": {"last_analysis_stats":
                    {"malicious": 4, "suspicious": 1, "harmless": 60, "undetected": 10}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(report_path(UNKNOWN)))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": {"code": "NotFoundError"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(report_path(BROKEN)))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/urls"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"type": "analysis", "id": "an-1"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/analyses/an-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"attributes": {"status": "completed",
                    "stats": {"malicious": -2, "suspicious": 0, "harmless": 70}}}
            })))
            .mount(&server)
            .await;

        server
    }

    fn fast_config(server: &MockServer) -> ReputationConfig {
        ReputationConfig {
            base_url: format!("{}/api/v3/", server.uri()),
            request_timeout_secs: 5,
            pacing_ms: 0,
            submit_wait_ms: 0,
            poll_attempts: 2,
            poll_interval_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_url_id_is_unpadded_urlsafe_base64() {
        assert_eq!(
            VirusTotalClient::url_id("http://www.somedomain.com/this/is/my/url"),
            "aHR0cDovL3d3dy5zb21lZG9tYWluLmNvbS90aGlzL2lzL215L3VybA"
        );
        assert!(!VirusTotalClient::url_id("https://a.b/?q=~~~").contains('='));
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(-5), 0);
        assert_eq!(clamp_count(7), 7);
        assert_eq!(clamp_count(i64::MAX), u32::MAX);
    }

    #[test]
    fn test_stats_missing_fields_default_to_zero() {
        let stats: AnalysisStats = serde_json::from_str(r#"{"malicious":3}"#).unwrap();
        let entry = stats.into_entry("https://x.example/");
        assert_eq!(entry.malicious_count, 3);
        assert_eq!(entry.suspicious_count, 0);
        assert_eq!(entry.harmless_count, 0);
    }

    #[tokio::test]
    async fn test_lookup_known_unknown_and_failed_urls() {
        let server = mock_service().await;
        let client = VirusTotalClient::new(&fast_config(&server), "test-key".to_string()).unwrap();

        let urls = vec![KNOWN.to_string(), UNKNOWN.to_string(), BROKEN.to_string()];
        let entries = client.lookup(&urls, 10).await.unwrap();

        // The broken URL is skipped, never reported as clean
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, KNOWN);
        assert_eq!(entries[0].malicious_count, 4);
        assert_eq!(entries[0].suspicious_count, 1);
        assert_eq!(entries[1].url, UNKNOWN);
        assert_eq!(entries[1].malicious_count, 0);
        assert_eq!(entries[1].harmless_count, 70);
    }

    #[tokio::test]
    async fn test_lookup_respects_limit() {
        let server = mock_service().await;
        let client = VirusTotalClient::new(&fast_config(&server), "test-key".to_string()).unwrap();

        let urls = vec![KNOWN.to_string(), UNKNOWN.to_string()];
        let entries = client.lookup(&urls, 1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, KNOWN);
    }

    #[tokio::test]
    async fn test_rejected_key_stops_remaining_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(report_path(KNOWN)))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(report_path(UNKNOWN)))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = VirusTotalClient::new(&fast_config(&server), "bad-key".to_string()).unwrap();
        let urls = vec![KNOWN.to_string(), UNKNOWN.to_string()];
        let error = client.lookup(&urls, 10).await.unwrap_err();
        assert!(error.is::<ServiceRefusal>());
        assert!(error.to_string().contains("API key rejected"));
    }

    #[tokio::test]
    async fn test_rate_limit_degrades_without_pacing_through_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let config = ReputationConfig {
            pacing_ms: 10_000,
            ..fast_config(&server)
        };
        let client = VirusTotalClient::new(&config, "test-key".to_string()).unwrap();
        let adapter = ReputationAdapter::from_config(Arc::new(client), &config);

        let started = std::time::Instant::now();
        let urls = vec![KNOWN.to_string(), UNKNOWN.to_string(), BROKEN.to_string()];
        assert!(adapter.collect(&urls).await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_no_entries() {
        // Bind then drop so the port refuses connections
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ReputationConfig {
            base_url: format!("http://{}/api/v3", addr),
            request_timeout_secs: 5,
            ..Default::default()
        };
        let client = VirusTotalClient::new(&config, "test-key".to_string()).unwrap();
        let entries = client.lookup(&[KNOWN.to_string()], 10).await.unwrap();
        assert!(entries.is_empty());
    }
}
