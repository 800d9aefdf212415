use url::Url;

/// Extracts the site key from a URL
///
/// The site key is the lowercase host, followed by `:port` when the URL names
/// a port other than its scheme's default. URLs without a host have no key.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pull_frontier::uri::extract_site_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_site_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://example.com:8080/").unwrap();
/// assert_eq!(extract_site_key(&url), Some("example.com:8080".to_string()));
/// ```
pub fn extract_site_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Computes the key under which a URL is deduplicated
///
/// Fragments never reach the server, so two URLs that differ only by
/// fragment are the same candidate.
pub fn uniq_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_site_key(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_site_key(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_default_port_is_dropped() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_site_key(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_explicit_port_is_kept() {
        let url = Url::parse("http://127.0.0.1:3000/page").unwrap();
        assert_eq!(extract_site_key(&url), Some("127.0.0.1:3000".to_string()));
    }

    #[test]
    fn test_no_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(extract_site_key(&url), None);
    }

    #[test]
    fn test_uniq_key_ignores_fragment() {
        let a = Url::parse("https://example.com/page#top").unwrap();
        let b = Url::parse("https://example.com/page#bottom").unwrap();
        assert_eq!(uniq_key(&a), uniq_key(&b));
        assert_eq!(uniq_key(&a), "https://example.com/page");
    }
}
