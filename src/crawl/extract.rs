//! Element and fingerprint extraction from fetched pages.
//!
//! Element IDs:
//! - `link:<absolute-url>` for anchors (`link:mailto:<address>` for mail links)
//! - `form:<METHOD>:<absolute-action>` for forms

use regex::Regex;
use reqwest::Url;
use reqwest::header::{HeaderMap, SERVER};
use std::collections::HashSet;
use std::sync::LazyLock;

static HREF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["']"#).expect("Invalid href regex")
});

static FORM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<form\b([^>]*)>").expect("Invalid form regex"));

static ACTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\baction\s*=\s*["']([^"']*)["']"#).expect("Invalid action regex")
});

static METHOD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bmethod\s*=\s*["']?([a-z]+)"#).expect("Invalid method regex")
});

/// What a page body yields: its element IDs and the links worth following.
#[derive(Debug, Default)]
pub struct Extracted {
    pub elements: Vec<String>,
    pub links: Vec<Url>,
}

pub fn extract(base: &Url, body: &str) -> Extracted {
    let mut seen = HashSet::new();
    let mut out = Extracted::default();

    for cap in HREF_REGEX.captures_iter(body) {
        let href = cap[1].trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }

        if let Some(address) = href.strip_prefix("mailto:") {
            let id = format!("link:mailto:{}", address);
            if seen.insert(id.clone()) {
                out.elements.push(id);
            }
            continue;
        }

        let Ok(mut link) = base.join(href) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        link.set_fragment(None);

        let id = format!("link:{}", link);
        if seen.insert(id.clone()) {
            out.elements.push(id);
            out.links.push(link);
        }
    }

    for cap in FORM_REGEX.captures_iter(body) {
        let attrs = &cap[1];
        let action = ACTION_REGEX
            .captures(attrs)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        let method = METHOD_REGEX
            .captures(attrs)
            .map(|c| c[1].to_uppercase())
            .unwrap_or_else(|| "GET".to_string());

        let Ok(mut action_url) = base.join(&action) else {
            continue;
        };
        action_url.set_fragment(None);

        let id = format!("form:{}:{}", method, action_url);
        if seen.insert(id.clone()) {
            out.elements.push(id);
        }
    }

    out
}

/// Platform hints from response headers, e.g. `nginx`, `php`.
pub fn fingerprint(headers: &HeaderMap) -> Vec<String> {
    let mut platforms = Vec::new();

    for value in [headers.get(SERVER), headers.get("x-powered-by")]
        .into_iter()
        .flatten()
    {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let name = value
            .split(['/', ' '])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if !name.is_empty() && !platforms.contains(&name) {
            platforms.push(name);
        }
    }

    platforms
}

/// Same scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}
