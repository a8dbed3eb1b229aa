use url::Url;

/// Compound public suffixes recognized when extracting registrable domains.
///
/// A full Public Suffix List is out of scope; this covers the common
/// two-label suffixes.
const COMPOUND_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "com.au", "org.au", "net.au", "co.jp", "or.jp", "ne.jp",
];

/// Extracts the lowercased host from a URL string
///
/// # Returns
///
/// * `Some(String)` - The host (e.g., "sub.example.com")
/// * `None` - The URL is invalid or has no host
pub fn extract_domain(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the host plus any non-default port from a URL string
///
/// This is the per-site key used for rate limiting and robots.txt caching:
/// "https://example.com/x" -> "example.com", but
/// "http://127.0.0.1:8080/x" -> "127.0.0.1:8080".
pub fn extract_site(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Extracts the registrable domain from a URL string
///
/// E.g., "https://www.sub.example.com/page" -> "example.com" and
/// "https://news.bbc.co.uk/" -> "bbc.co.uk".
pub fn registrable_domain(url_str: &str) -> Option<String> {
    let host = extract_domain(url_str)?;
    Some(registrable_domain_from_host(&host))
}

/// Extracts the registrable domain from a hostname
pub fn registrable_domain_from_host(host: &str) -> String {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() <= 2 {
        return host.to_string();
    }

    // Compound suffixes like co.uk need three labels
    let compound = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);
    if COMPOUND_SUFFIXES.contains(&compound.as_str()) {
        return format!("{}.{}", parts[parts.len() - 3], compound);
    }

    format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1])
}

/// Checks if a URL belongs to a domain or one of its subdomains
pub fn matches_domain(url_str: &str, domain: &str) -> bool {
    let Some(url_domain) = extract_domain(url_str) else {
        return false;
    };
    let domain = domain.to_lowercase();
    url_domain == domain || url_domain.ends_with(&format!(".{}", domain))
}

/// Checks if two URLs share the same host
pub fn same_domain(url_a: &str, url_b: &str) -> bool {
    match (extract_domain(url_a), extract_domain(url_b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://Example.COM/page"),
            Some("example.com".to_string())
        );
        assert_eq!(
            extract_domain("http://sub.example.com:8080/"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
    }

    #[test]
    fn test_extract_site() {
        assert_eq!(
            extract_site("https://example.com/page"),
            Some("example.com".to_string())
        );
        assert_eq!(
            extract_site("http://127.0.0.1:8080/page"),
            Some("127.0.0.1:8080".to_string())
        );
        // Default ports are dropped by the parser
        assert_eq!(
            extract_site("http://example.com:80/page"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_domain_simple() {
        assert_eq!(
            registrable_domain("https://www.sub.example.com/page"),
            Some("example.com".to_string())
        );
        assert_eq!(
            registrable_domain("https://example.com/"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_domain_compound_suffix() {
        assert_eq!(
            registrable_domain("https://news.bbc.co.uk/"),
            Some("bbc.co.uk".to_string())
        );
        assert_eq!(
            registrable_domain("https://shop.example.com.au/"),
            Some("example.com.au".to_string())
        );
    }

    #[test]
    fn test_registrable_domain_short_host() {
        assert_eq!(registrable_domain_from_host("localhost"), "localhost");
        assert_eq!(registrable_domain_from_host("example.com"), "example.com");
    }

    #[test]
    fn test_matches_domain() {
        assert!(matches_domain("https://example.com/page", "example.com"));
        assert!(matches_domain("https://sub.example.com/page", "example.com"));
        assert!(!matches_domain("https://other.com/page", "example.com"));
        assert!(!matches_domain(
            "https://notexample.com/page",
            "example.com"
        ));
    }

    #[test]
    fn test_same_domain() {
        assert!(same_domain("https://a.com/x", "https://a.com/y"));
        assert!(!same_domain("https://a.com/x", "https://b.com/x"));
        assert!(!same_domain("bad", "https://a.com/"));
    }
}
