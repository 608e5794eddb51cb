use lazy_static::lazy_static;
use mail_parser::MessageParser;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r#"(?i)https?://[^\s<>"')\]]+"#).unwrap();
}

const TRAILING_PUNCTUATION: &[char] = &[')', '.', ',', ';', '!', '?', '"', '\''];

/// Structured view of one email message, ready for scoring
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub subject: String,
    pub from_address: String,
    pub raw_headers: String,
    pub body: String,
    pub urls: Vec<String>,
}

impl ParsedMessage {
    /// Build a message from loose text fields (no headers available)
    pub fn from_text(subject: &str, from_address: &str, body: &str) -> Self {
        Self {
            subject: subject.to_string(),
            from_address: from_address.to_string(),
            raw_headers: String::new(),
            body: body.to_string(),
            urls: extract_urls(body),
        }
    }

    /// Parse an RFC 5322 message.
    ///
    /// Headers are unfolded into `Name: value` lines. The body is the
    /// concatenation of the text parts; URLs are extracted from it.
    pub fn parse_eml_bytes(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let (header_block, raw_body) = split_header_block(&text);
        let headers = unfold_headers(header_block);

        let mut raw_headers = String::new();
        for (name, value) in &headers {
            raw_headers.push_str(&format!("{}: {}\n", name, value));
        }

        let header_value = |wanted: &str| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value.clone())
        };

        let parsed = MessageParser::default().parse(raw);

        let subject = parsed
            .as_ref()
            .and_then(|message| message.subject().map(|s| s.to_string()))
            .or_else(|| header_value("subject"))
            .unwrap_or_default();
        let from_address = header_value("from").unwrap_or_default();

        let body = match &parsed {
            Some(message) => {
                let mut body = String::new();
                let mut index = 0;
                while let Some(part) = message.body_text(index) {
                    body.push_str(&part);
                    index += 1;
                }
                body
            }
            None => {
                log::debug!("MIME parsing failed, using raw body text");
                raw_body.to_string()
            }
        };

        let urls = extract_urls(&body);
        log::debug!(
            "Parsed message: {} header(s), {} body byte(s), {} URL(s)",
            headers.len(),
            body.len(),
            urls.len()
        );

        Self {
            subject,
            from_address,
            raw_headers,
            body,
            urls,
        }
    }
}

/// Extract http(s) URLs from free text.
///
/// Trailing punctuation is stripped and duplicates are dropped while the
/// first-seen order is kept.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    for m in URL_REGEX.find_iter(text) {
        let url = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if !urls.iter().any(|existing| existing == url) {
            urls.push(url.to_string());
        }
    }

    urls
}

/// Split at the first blank line, whichever line ending it uses
fn split_header_block(text: &str) -> (&str, &str) {
    ["\r\n\r\n", "\n\n"]
        .into_iter()
        .filter_map(|separator| text.find(separator).map(|pos| (pos, separator.len())))
        .min_by_key(|(pos, _)| *pos)
        .map_or((text, ""), |(pos, len)| (&text[..pos], &text[pos + len..]))
}

fn unfold_headers(block: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation of previous header
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_urls_strips_and_dedups() {
        let text = "Visit https://example.com/login. Or (http://1.2.3.4/a) \
                    and again https://example.com/login!";
        let urls = extract_urls(text);
        assert_eq!(
            urls,
            vec![
                "https://example.com/login".to_string(),
                "http://1.2.3.4/a".to_string()
            ]
        );
    }

    #[test]
    fn test_extract_urls_empty() {
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_from_text() {
        let message = ParsedMessage::from_text("Hi", "a@b.com", "see http://x.io/p");
        assert_eq!(message.subject, "Hi");
        assert!(message.raw_headers.is_empty());
        assert_eq!(message.urls, vec!["http://x.io/p".to_string()]);
    }

    #[test]
    fn test_parse_eml_bytes() {
        let raw = b"From: PayPal <service@paypal.com>\r\n\
Reply-To: help@evil.example\r\n\
Subject: Account notice\r\n\
Authentication-Results: mx.example.com;\r\n\
\tspf=fail smtp.mailfrom=paypal.com\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please verify your account at http://192.168.0.1/login now.\r\n";

        let message = ParsedMessage::parse_eml_bytes(raw);
        assert_eq!(message.subject, "Account notice");
        assert_eq!(message.from_address, "PayPal <service@paypal.com>");
        assert!(message
            .raw_headers
            .contains("Authentication-Results: mx.example.com; spf=fail smtp.mailfrom=paypal.com\n"));
        assert!(message.raw_headers.contains("Reply-To: help@evil.example\n"));
        assert!(message.body.contains("verify your account"));
        assert_eq!(message.urls, vec!["http://192.168.0.1/login".to_string()]);
    }

    #[test]
    fn test_parse_eml_prefers_plain_text_part() {
        let raw = b"From: a@b.com\r\n\
Subject: Multi\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
plain body https://plain.example/\r\n\
--XYZ\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html body <a href=\"https://html.example/\">x</a></p>\r\n\
--XYZ--\r\n";

        let message = ParsedMessage::parse_eml_bytes(raw);
        assert!(message.body.contains("plain body"));
        assert_eq!(message.urls, vec!["https://plain.example/".to_string()]);
    }

    #[test]
    fn test_split_header_block_uses_earliest_blank_line() {
        let text = "Subject: lf\nFrom: a@b.com\n\nfirst section\r\n\r\nsecond section";
        let (headers, body) = split_header_block(text);
        assert_eq!(headers, "Subject: lf\nFrom: a@b.com");
        assert_eq!(body, "first section\r\n\r\nsecond section");

        let (headers, body) = split_header_block("Subject: crlf\r\n\r\nbody\n\nmore");
        assert_eq!(headers, "Subject: crlf");
        assert_eq!(body, "body\n\nmore");

        assert_eq!(split_header_block("Subject: only"), ("Subject: only", ""));
    }

    #[test]
    fn test_lf_message_with_crlf_body_keeps_headers_clean() {
        let raw = b"Subject: Mixed endings\nFrom: a@b.com\n\nfirst section\r\n\r\nsecond https://late.example/\n";

        let message = ParsedMessage::parse_eml_bytes(raw);
        assert_eq!(message.raw_headers, "Subject: Mixed endings\nFrom: a@b.com\n");
        assert!(!message.raw_headers.contains("first section"));
    }
}
