//! Link canonicalization.
//!
//! Canonical links decide exact duplicates, so two links that only differ in
//! tracking parameters, fragment, trailing slash or host case must map to the
//! same string. Links that fail to parse still get a best-effort canonical form.
use url::Url;

/// Deny-list of query parameter names; entries ending in `*` match by prefix.
#[derive(Debug, Clone, Default)]
pub struct TrackingParams {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl TrackingParams {
    #[must_use]
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = Vec::new();
        let mut prefixes = Vec::new();
        for param in params {
            let param = param.as_ref().trim().to_lowercase();
            if let Some(prefix) = param.strip_suffix('*') {
                prefixes.push(prefix.to_string());
            } else {
                exact.push(param);
            }
        }
        Self { exact, prefixes }
    }

    #[must_use]
    pub fn is_tracking(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.exact.iter().any(|p| *p == name) || self.prefixes.iter().any(|p| name.starts_with(p))
    }
}

/// Canonical form of a link used as the exact-duplicate key.
#[must_use]
pub fn canonicalize(link: &str, tracking: &TrackingParams) -> String {
    let link = link.trim();
    match Url::parse(link) {
        Ok(url) if url.has_host() => canonicalize_parsed(&url, tracking),
        _ => canonicalize_fallback(link),
    }
}

fn canonicalize_parsed(url: &Url, tracking: &TrackingParams) -> String {
    // `Url` already lower-cases scheme and host.
    let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(url.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, value)| !value.is_empty() && !tracking.is_tracking(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    params.sort();
    if !params.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        out.push('?');
        out.push_str(&query);
    }
    out
}

fn canonicalize_fallback(link: &str) -> String {
    let without_fragment = link.split('#').next().unwrap_or(link);
    without_fragment.trim_end_matches('/').to_lowercase()
}

/// Scheme-less `host/path` key; `http` and `https` copies of a story share it.
#[must_use]
pub fn url_key(canonical: &str) -> String {
    match Url::parse(canonical) {
        Ok(url) if url.has_host() => format!(
            "{}{}",
            url.host_str().unwrap_or_default(),
            url.path().trim_end_matches('/')
        ),
        _ => canonical
            .split_once("://")
            .map_or(canonical, |(_, rest)| rest)
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_lowercase(),
    }
}

/// Lower-cased host of a link, without port.
#[must_use]
pub fn host(link: &str) -> Option<String> {
    Url::parse(link.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
        .filter(|host| !host.is_empty())
}
