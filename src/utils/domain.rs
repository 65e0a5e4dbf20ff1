//! Domain derivation and favicon URL resolution
//!
//! A catalogue entry's `domain` is never independent truth: it is always
//! recomputed from the entry's `url` with these helpers.

use url::Url;

use crate::errors::{FetchError, FetchResult};

/// Favicon path used when a record carries no explicit reference
pub const DEFAULT_FAVICON_PATH: &str = "/favicon.ico";

/// Derive the catalogue dedup key from a page URL
///
/// The hostname is lowercased and a single leading `www.` is stripped.
/// Bare hostnames without a scheme are accepted and treated as `http://`.
pub fn domain_from_url(page_url: &str) -> Option<String> {
    let parsed = parse_page_url(page_url)?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Resolve the absolute favicon URL for a page
///
/// `reference` may be absolute, protocol-relative, root-relative or
/// document-relative; it is joined against the page URL. When absent the
/// conventional `/favicon.ico` is used.
pub fn resolve_favicon_url(page_url: &str, reference: Option<&str>) -> FetchResult<String> {
    let base = parse_page_url(page_url)
        .ok_or_else(|| FetchError::invalid_url(page_url, "page URL is not a valid URL"))?;

    let reference = reference
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_FAVICON_PATH);

    let resolved = base
        .join(reference)
        .map_err(|e| FetchError::invalid_url(reference, e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved.to_string()),
        other => Err(FetchError::invalid_url(
            resolved.as_str(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

/// Whether the URL path looks like an ICO container
pub fn url_suggests_ico(icon_url: &str) -> bool {
    Url::parse(icon_url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".ico"))
        .unwrap_or(false)
}

fn parse_page_url(page_url: &str) -> Option<Url> {
    let trimmed = page_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) if url.has_host() => Some(url),
        _ => Url::parse(&format!("http://{trimmed}"))
            .ok()
            .filter(|u| u.has_host()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://www.example.com/", Some("example.com"))]
    #[case("https://Example.COM/path?q=1", Some("example.com"))]
    #[case("http://www.www.example.com", Some("www.example.com"))]
    #[case("news.ycombinator.com", Some("news.ycombinator.com"))]
    #[case("https://sub.example.co.uk:8443/x", Some("sub.example.co.uk"))]
    #[case("", None)]
    fn test_domain_from_url(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(domain_from_url(input).as_deref(), expected);
    }

    #[rstest]
    #[case("https://example.com/blog/", None, "https://example.com/favicon.ico")]
    #[case("https://example.com/blog/", Some("icon.png"), "https://example.com/blog/icon.png")]
    #[case("https://example.com/blog/", Some("/static/fav.ico"), "https://example.com/static/fav.ico")]
    #[case("https://example.com/", Some("//cdn.example.net/f.ico"), "https://cdn.example.net/f.ico")]
    #[case("https://example.com/", Some("http://other.org/a.png"), "http://other.org/a.png")]
    #[case("https://example.com/", Some("  "), "https://example.com/favicon.ico")]
    fn test_resolve_favicon_url(
        #[case] page: &str,
        #[case] reference: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve_favicon_url(page, reference).unwrap(), expected);
    }

    #[test]
    fn test_resolve_rejects_non_http_schemes() {
        let err = resolve_favicon_url("https://example.com/", Some("data:image/png;base64,AAAA"))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_resolve_rejects_blank_page_url() {
        assert!(resolve_favicon_url("   ", None).is_err());
    }

    #[test]
    fn test_url_suggests_ico() {
        assert!(url_suggests_ico("https://example.com/FAVICON.ICO"));
        assert!(url_suggests_ico("https://example.com/favicon.ico?v=2"));
        assert!(!url_suggests_ico("https://example.com/icon.png"));
    }
}
