use super::{EvaluationResult, Evaluator};
use crate::domain_utils::DomainUtils;
use crate::ParsedMessage;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref REPLY_TO_REGEX: Regex = Regex::new(r"(?im)^reply-to:[ \t]*(.+)$").unwrap();
    static ref FROM_REGEX: Regex = Regex::new(r"(?im)^from:[ \t]*(.+)$").unwrap();
}

pub const HEADER_SCORE_CAP: u32 = 60;

const AUTH_RESULTS_MARKER: &str = "authentication-results";
const MISSING_AUTH_RESULTS_SCORE: u32 = 5;
const REPLY_TO_MISMATCH_SCORE: u32 = 10;

/// A header anomaly recognised by a plain lower-case substring
#[derive(Debug)]
struct MarkerRule {
    markers: &'static [&'static str],
    score: u32,
    reason: &'static str,
}

/// Within a group only the first matching rule fires
const MARKER_GROUPS: &[&[MarkerRule]] = &[
    &[
        MarkerRule {
            markers: &["spf=fail", "received-spf: fail"],
            score: 20,
            reason: "Header anomaly: SPF fail",
        },
        MarkerRule {
            markers: &["spf=softfail"],
            score: 10,
            reason: "Header anomaly: SPF softfail",
        },
    ],
    &[
        MarkerRule {
            markers: &["dkim=fail"],
            score: 15,
            reason: "Header anomaly: DKIM fail",
        },
        MarkerRule {
            markers: &["dkim=none"],
            score: 8,
            reason: "Header anomaly: DKIM none",
        },
    ],
];

/// Authentication and spoofing checks over the raw header block
#[derive(Default)]
pub struct HeaderEvaluator;

impl HeaderEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate_headers(&self, raw_headers: &str, from_address: &str) -> EvaluationResult {
        let mut score = 0;
        let mut reasons = Vec::new();
        let headers_lower = raw_headers.to_lowercase();

        if !headers_lower.contains(AUTH_RESULTS_MARKER) {
            score += MISSING_AUTH_RESULTS_SCORE;
            reasons.push("Missing Authentication-Results header".to_string());
        }

        for group in MARKER_GROUPS {
            if let Some(rule) = group
                .iter()
                .find(|rule| rule.markers.iter().any(|m| headers_lower.contains(m)))
            {
                score += rule.score;
                reasons.push(rule.reason.to_string());
            }
        }

        if let Some((reply_domain, from_domain)) = self.reply_to_mismatch(raw_headers, from_address)
        {
            score += REPLY_TO_MISMATCH_SCORE;
            reasons.push(format!(
                "Reply-To domain differs from From domain ({} vs {})",
                reply_domain, from_domain
            ));
        }

        EvaluationResult::capped(score, HEADER_SCORE_CAP, reasons)
    }

    /// Domains of Reply-To and From when both exist and differ.
    ///
    /// The From header line wins over the envelope-style address so the
    /// comparison stays within the header block.
    fn reply_to_mismatch(&self, raw_headers: &str, from_address: &str) -> Option<(String, String)> {
        let reply_to = Self::first_value(&REPLY_TO_REGEX, raw_headers)?;
        let from = Self::first_value(&FROM_REGEX, raw_headers)
            .or_else(|| Some(from_address.trim()).filter(|s| !s.is_empty()))?;

        let reply_domain = DomainUtils::extract_domain(reply_to)?;
        let from_domain = DomainUtils::extract_domain(from)?;

        if reply_domain != from_domain {
            Some((reply_domain, from_domain))
        } else {
            None
        }
    }

    fn first_value<'a>(regex: &Regex, raw_headers: &'a str) -> Option<&'a str> {
        regex
            .captures(raw_headers)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().trim())
            .filter(|value| !value.is_empty())
    }
}

impl Evaluator for HeaderEvaluator {
    fn evaluate(&self, message: &ParsedMessage) -> EvaluationResult {
        self.evaluate_headers(&message.raw_headers, &message.from_address)
    }

    fn name(&self) -> &str {
        "header_evaluator"
    }

    fn cap(&self) -> u32 {
        HEADER_SCORE_CAP
    }
}
