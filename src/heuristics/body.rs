use super::{EvaluationResult, Evaluator};
use crate::config::HeuristicsConfig;
use crate::ParsedMessage;

pub const BODY_SCORE_CAP: u32 = 35;

const PHRASE_SCORE: u32 = 5;
const PHRASE_SCORE_CAP: u32 = 25;
const PHRASES_IN_REASON: usize = 5;
const EXCLAMATION_THRESHOLD: usize = 3;
const EXCLAMATION_SCORE: u32 = 5;
const NON_ASCII_SCORE: u32 = 2;

/// Social-engineering phrases, matched case-insensitively as substrings
pub const SUSPICIOUS_PHRASES: &[&str] = &[
    "verify your account",
    "urgent",
    "immediately",
    "password",
    "reset",
    "limited time",
    "action required",
    "suspended",
    "unusual activity",
    "gift",
    "lottery",
    "click below",
    "confirm your identity",
    "invoice",
    "payment",
    "bank",
    "security alert",
    "otp",
    "one time password",
];

pub struct BodyEvaluator {
    phrases: Vec<String>,
}

impl Default for BodyEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyEvaluator {
    pub fn new() -> Self {
        Self {
            phrases: SUSPICIOUS_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Built-in phrases followed by any configured extras
    pub fn from_config(config: &HeuristicsConfig) -> Self {
        let mut evaluator = Self::new();
        for phrase in &config.extra_phrases {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && !evaluator.phrases.contains(&phrase) {
                evaluator.phrases.push(phrase);
            }
        }
        evaluator
    }

    pub fn evaluate_body(&self, body: &str) -> EvaluationResult {
        let mut score = 0;
        let mut reasons = Vec::new();
        let body_lower = body.to_lowercase();

        let hits: Vec<&str> = self
            .phrases
            .iter()
            .filter(|phrase| body_lower.contains(phrase.as_str()))
            .map(|phrase| phrase.as_str())
            .collect();

        if !hits.is_empty() {
            score += (PHRASE_SCORE * hits.len() as u32).min(PHRASE_SCORE_CAP);
            let shown: Vec<&str> = hits.iter().take(PHRASES_IN_REASON).copied().collect();
            let ellipsis = if hits.len() > PHRASES_IN_REASON { "..." } else { "" };
            reasons.push(format!("Suspicious keywords: {}{}", shown.join(", "), ellipsis));
        }

        if body_lower.matches('!').count() >= EXCLAMATION_THRESHOLD {
            score += EXCLAMATION_SCORE;
            reasons.push("Excessive exclamation marks".to_string());
        }

        if !body_lower.is_ascii() {
            score += NON_ASCII_SCORE;
            reasons.push("Non-ASCII characters present (could be homoglyphs)".to_string());
        }

        EvaluationResult::capped(score, BODY_SCORE_CAP, reasons)
    }
}

impl Evaluator for BodyEvaluator {
    fn evaluate(&self, message: &ParsedMessage) -> EvaluationResult {
        self.evaluate_body(&message.body)
    }

    fn name(&self) -> &str {
        "body_evaluator"
    }

    fn cap(&self) -> u32 {
        BODY_SCORE_CAP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body() {
        let result = BodyEvaluator::new().evaluate_body("");
        assert_eq!(result, EvaluationResult::default());
    }

    #[test]
    fn test_keyword_hits_in_table_order() {
        let result =
            BodyEvaluator::new().evaluate_body("This is URGENT: complete your Password Reset.");
        // urgent, password, reset
        assert_eq!(result.score, 15);
        assert_eq!(result.reasons, vec!["Suspicious keywords: urgent, password, reset"]);
    }

    #[test]
    fn test_keyword_reason_truncated_with_ellipsis() {
        let body = "verify your account urgent immediately password reset lottery";
        let result = BodyEvaluator::new().evaluate_body(body);
        assert_eq!(result.score, 25);
        assert_eq!(
            result.reasons[0],
            "Suspicious keywords: verify your account, urgent, immediately, password, reset..."
        );
    }

    #[test]
    fn test_exclamation_marks() {
        let evaluator = BodyEvaluator::new();
        assert_eq!(evaluator.evaluate_body("wow!!").score, 0);
        let result = evaluator.evaluate_body("wow! really! yes!");
        assert_eq!(result.score, 5);
        assert_eq!(result.reasons, vec!["Excessive exclamation marks"]);
    }

    #[test]
    fn test_non_ascii() {
        let result = BodyEvaluator::new().evaluate_body("Hello wоrld");
        assert_eq!(result.score, 2);
        assert_eq!(
            result.reasons,
            vec!["Non-ASCII characters present (could be homoglyphs)"]
        );
    }

    #[test]
    fn test_capped_at_35() {
        let body = "verify your account urgent immediately password reset gift!!! é";
        let result = BodyEvaluator::new().evaluate_body(body);
        assert_eq!(result.score, 25 + 5 + 2);
        assert!(result.score <= BODY_SCORE_CAP);
    }

    #[test]
    fn test_extra_phrases_from_config() {
        let config = HeuristicsConfig {
            extra_phrases: vec!["Wire Transfer".to_string(), "urgent".to_string()],
            ..Default::default()
        };
        let evaluator = BodyEvaluator::from_config(&config);
        let result = evaluator.evaluate_body("please send a wire transfer");
        assert_eq!(result.score, 5);
        assert_eq!(result.reasons, vec!["Suspicious keywords: wire transfer"]);
        assert_eq!(evaluator.phrases.len(), SUSPICIOUS_PHRASES.len() + 1);
    }
}
