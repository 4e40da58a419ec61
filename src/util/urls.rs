use url::Url;

/// Resolves a potentially relative URL against a base URL.
///
/// Absolute and protocol-relative hrefs are normalized by the URL parser.
/// When the base itself cannot be parsed the href is returned unchanged.
pub fn resolve_url(href: &str, base_url: &str) -> String {
    let href = href.trim();

    if let Ok(absolute) = Url::parse(href) {
        return absolute.to_string();
    }

    // Protocol-relative: inherit the base scheme, default https
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = Url::parse(base_url)
            .map(|b| b.scheme().to_owned())
            .unwrap_or_else(|_| "https".to_owned());
        if let Ok(parsed) = Url::parse(&format!("{scheme}://{rest}")) {
            return parsed.to_string();
        }
    }

    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_owned(),
    }
}
