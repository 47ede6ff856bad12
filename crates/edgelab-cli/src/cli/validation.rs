use reqwest::Url;

/// Parse and validate a local upstream origin.
///
/// Accepts `host`, `host:port`, or a full `http(s)://host[:port]` origin. A
/// scheme-less value is treated as `http`. Paths, queries, and fragments are
/// rejected because only the host is rewritten.
///
/// # Examples
///
/// ```
/// use edgelab_cli::cli::parse_local_upstream;
///
/// let url = parse_local_upstream("localhost:3000").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:3000/");
///
/// assert!(parse_local_upstream("https://api.example.com").is_ok());
/// assert!(parse_local_upstream("ftp://example.com").is_err());
/// assert!(parse_local_upstream("localhost:3000/api").is_err());
/// ```
pub fn parse_local_upstream(s: &str) -> Result<Url, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Local upstream cannot be empty".to_string());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| format!("Local upstream '{}' is not a valid URL: {}", s, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "Local upstream must use http or https (got '{}')",
            url.scheme()
        ));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("Local upstream '{}' has no host", s));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(format!(
            "Local upstream '{}' must be an origin without a path or query",
            s
        ));
    }

    Ok(url)
}
