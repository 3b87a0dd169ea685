use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Key used for per-host state: the domain plus any non-default port
///
/// Two servers on the same machine but different ports get separate robots.txt
/// caches and separate politeness budgets.
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::host_key;
///
/// let url = Url::parse("http://127.0.0.1:8080/a").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", domain, port),
        None => domain,
    })
}

/// The site root (`scheme://host[:port]/`) of a URL
pub fn site_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Host name with a leading `www.` removed, for same-site comparisons
pub(crate) fn site_host(domain: &str) -> &str {
    domain.strip_prefix("www.").unwrap_or(domain)
}
