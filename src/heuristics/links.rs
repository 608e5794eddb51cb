use super::{EvaluationResult, Evaluator};
use crate::config::HeuristicsConfig;
use crate::domain_utils::DomainUtils;
use crate::ParsedMessage;
use lazy_static::lazy_static;
use regex::Regex;

pub const URL_SCORE_CAP: u32 = 50;
pub const DEFAULT_MAX_URLS: usize = 20;

const VOLUME_SCORE_PER_URL: u32 = 2;
const VOLUME_SCORE_CAP: u32 = 10;

#[derive(Debug, Clone, Copy)]
enum UrlCheck {
    /// Hostname is a dotted IPv4 literal
    Ipv4Host,
    /// Hostname has at least this many dots
    HostDots(usize),
    /// Lower-cased URL or normalized hostname contains the marker
    Contains(&'static str),
    /// Authority segment (userinfo included) contains the character
    AuthorityContains(char),
}

#[derive(Debug)]
struct UrlRule {
    check: UrlCheck,
    score: u32,
    reason: &'static str,
}

const URL_RULES: &[UrlRule] = &[
    UrlRule {
        check: UrlCheck::Ipv4Host,
        score: 15,
        reason: "Suspicious URL: IP address used",
    },
    UrlRule {
        check: UrlCheck::HostDots(4),
        score: 8,
        reason: "Suspicious URL: many subdomains",
    },
    UrlRule {
        check: UrlCheck::Contains("xn--"),
        score: 8,
        reason: "Suspicious URL: punycode detected",
    },
    UrlRule {
        check: UrlCheck::AuthorityContains('@'),
        score: 10,
        reason: "Suspicious URL: @ in hostname (obfuscation)",
    },
];

lazy_static! {
    static ref IPV4_HOST_REGEX: Regex = Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").unwrap();
}

/// Obfuscation and evasion checks over the extracted URLs
pub struct UrlEvaluator {
    max_urls: usize,
}

impl Default for UrlEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlEvaluator {
    pub fn new() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
        }
    }

    pub fn from_config(config: &HeuristicsConfig) -> Self {
        Self {
            max_urls: config.max_urls,
        }
    }

    /// Score at most `max_urls` URLs; the volume bonus counts all of them
    pub fn evaluate_urls(&self, urls: &[String]) -> EvaluationResult {
        let mut score = 0;
        let mut reasons = Vec::new();

        for url in urls.iter().take(self.max_urls) {
            let host = DomainUtils::host(url);
            for rule in URL_RULES {
                if self.matches(rule.check, url, host.as_deref()) {
                    score += rule.score;
                    reasons.push(rule.reason.to_string());
                }
            }
        }

        let volume = (urls.len() as u32)
            .saturating_mul(VOLUME_SCORE_PER_URL)
            .min(VOLUME_SCORE_CAP);
        score += volume;
        if !urls.is_empty() {
            reasons.push(format!("Email contains {} URL(s)", urls.len()));
        }

        EvaluationResult::capped(score, URL_SCORE_CAP, reasons)
    }

    fn matches(&self, check: UrlCheck, url: &str, host: Option<&str>) -> bool {
        match check {
            UrlCheck::Ipv4Host => host.is_some_and(|h| IPV4_HOST_REGEX.is_match(h)),
            UrlCheck::HostDots(min) => host.is_some_and(|h| h.matches('.').count() >= min),
            UrlCheck::Contains(marker) => {
                url.to_lowercase().contains(marker) || host.is_some_and(|h| h.contains(marker))
            }
            UrlCheck::AuthorityContains(c) => {
                DomainUtils::authority(url).is_some_and(|authority| authority.contains(c))
            }
        }
    }
}

impl Evaluator for UrlEvaluator {
    fn evaluate(&self, message: &ParsedMessage) -> EvaluationResult {
        self.evaluate_urls(&message.urls)
    }

    fn name(&self) -> &str {
        "url_evaluator"
    }

    fn cap(&self) -> u32 {
        URL_SCORE_CAP
    }
}
