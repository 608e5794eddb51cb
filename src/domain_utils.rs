use url::Url;

/// Minimal address and URL host helpers
pub struct DomainUtils;

impl DomainUtils {
    /// Extract the domain from an address such as `Name <user@example.com>`
    pub fn extract_domain(address: &str) -> Option<String> {
        let (_, domain) = address.rsplit_once('@')?;
        let domain = domain
            .trim()
            .trim_matches(|c: char| c == '<' || c == '>' || c == '"' || c.is_whitespace())
            .to_lowercase();

        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }

    /// Authority segment of a URL (`user@host:port`), if it has one.
    ///
    /// Never panics on scheme-less or truncated input.
    pub fn authority(url: &str) -> Option<&str> {
        let (_, rest) = url.split_once("://")?;
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..end];

        if authority.is_empty() {
            None
        } else {
            Some(authority)
        }
    }

    /// Lower-cased hostname of a URL.
    ///
    /// Internationalized hosts come back in their ASCII-compatible form when
    /// the URL parses; otherwise the raw authority is stripped of userinfo
    /// and port.
    pub fn host(url: &str) -> Option<String> {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                return Some(host.to_lowercase());
            }
        }

        let authority = Self::authority(url)?;
        let host = authority.rsplit('@').next().unwrap_or(authority);
        let host = host.split(':').next().unwrap_or(host);

        if host.is_empty() {
            None
        } else {
            Some(host.to_lowercase())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            DomainUtils::extract_domain("user@example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(
            DomainUtils::extract_domain("Bank Support <help@Bank.COM>"),
            Some("bank.com".to_string())
        );
        assert_eq!(DomainUtils::extract_domain("invalid"), None);
        assert_eq!(DomainUtils::extract_domain("user@"), None);
    }

    #[test]
    fn test_authority() {
        assert_eq!(
            DomainUtils::authority("https://paypal.com@evil.example/login"),
            Some("paypal.com@evil.example")
        );
        assert_eq!(
            DomainUtils::authority("http://example.com?q=1"),
            Some("example.com")
        );
        assert_eq!(DomainUtils::authority("https://"), None);
        assert_eq!(DomainUtils::authority("not a url"), None);
    }

    #[test]
    fn test_host() {
        assert_eq!(
            DomainUtils::host("https://Login.Example.com/path"),
            Some("login.example.com".to_string())
        );
        assert_eq!(
            DomainUtils::host("http://user@192.168.1.10:8080/x"),
            Some("192.168.1.10".to_string())
        );
        assert_eq!(
            DomainUtils::host("https://bücher.example/"),
            Some("xn--bcher-kva.example".to_string())
        );
        assert_eq!(DomainUtils::host("mailto:someone"), None);
    }
}
