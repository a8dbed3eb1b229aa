//! Link extraction from fetched HTML
//!
//! Resolves every anchor href against the page URL and keeps only
//! absolute http(s) links worth offering to the frontier.

use scraper::{Html, Selector};
use url::Url;

/// Extracts outbound links from an HTML document
///
/// **Excluded:** `javascript:`, `mailto:`, `tel:`, and `data:` pseudo
/// schemes, bare-fragment anchors, anchors with a `download` attribute,
/// and anything that does not resolve to http(s).
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(absolute) = resolve_link(href, base_url) {
                links.push(absolute);
            }
        }
    }

    links
}

/// Extracts the page title, trimmed, if present and non-empty
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Resolves an href to an absolute URL, filtering non-crawlable schemes
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/folder/page").unwrap()
    }

    #[test]
    fn test_absolute_links() {
        let html = r#"<html><body><a href="https://other.com/page">Link</a></body></html>"#;
        let links = extract_links(html, &base());
        assert_eq!(links, vec!["https://other.com/page"]);
    }

    #[test]
    fn test_relative_links_resolved() {
        let html = r#"<html><body>
            <a href="/rooted">Rooted</a>
            <a href="sibling">Sibling</a>
            <a href="../parent">Parent</a>
        </body></html>"#;
        let links = extract_links(html, &base());

        assert!(links.contains(&"https://example.com/rooted".to_string()));
        assert!(links.contains(&"https://example.com/folder/sibling".to_string()));
        assert!(links.contains(&"https://example.com/parent".to_string()));
    }

    #[test]
    fn test_pseudo_schemes_filtered() {
        let html = r#"<html><body>
            <a href="https://example.com/keep">Keep</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:+1234567890">Phone</a>
            <a href="javascript:void(0)">JS</a>
            <a href="data:text/html,hi">Data</a>
        </body></html>"#;
        let links = extract_links(html, &base());
        assert_eq!(links, vec!["https://example.com/keep"]);
    }

    #[test]
    fn test_fragment_only_filtered() {
        let html = r##"<html><body><a href="#section">Jump</a></body></html>"##;
        assert!(extract_links(html, &base()).is_empty());
    }

    #[test]
    fn test_fragment_on_path_kept() {
        let html = r##"<html><body><a href="/page#section">Link</a></body></html>"##;
        let links = extract_links(html, &base());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_download_links_filtered() {
        let html = r#"<html><body><a href="/file.bin" download>Get</a></body></html>"#;
        assert!(extract_links(html, &base()).is_empty());
    }

    #[test]
    fn test_anchors_without_href_ignored() {
        let html = r#"<html><body>
            <a name="section1">Section</a>
            <a href="https://example.com/page">Valid</a>
        </body></html>"#;
        assert_eq!(extract_links(html, &base()).len(), 1);
    }

    #[test]
    fn test_duplicates_kept() {
        // Deduplication is the frontier's job, not the extractor's
        let html = r#"<html><body>
            <a href="/same">One</a>
            <a href="/same">Two</a>
        </body></html>"#;
        assert_eq!(extract_links(html, &base()).len(), 2);
    }

    #[test]
    fn test_empty_document() {
        assert!(extract_links("<html><body></body></html>", &base()).is_empty());
        assert!(extract_links("", &base()).is_empty());
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>  My Page  </title></head><body></body></html>";
        assert_eq!(extract_title(html), Some("My Page".to_string()));
    }

    #[test]
    fn test_extract_title_missing_or_empty() {
        assert_eq!(extract_title("<html><body></body></html>"), None);
        assert_eq!(
            extract_title("<html><head><title> </title></head></html>"),
            None
        );
    }
}
