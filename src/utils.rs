//! URL and text helpers shared by modules and the fetch collaborator.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static BASE_URL_WITH_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+://.[^/:?]*)[:/?].*").expect("static pattern"));

static BASE_URL_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.[^/:?]*)[:/?]").expect("static pattern"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([%a-zA-Z.0-9_\-+]+@[a-zA-Z.0-9\-]+\.[a-zA-Z.0-9\-]+)").expect("static pattern")
});

/// Extract the scheme and host portion of a URL, lowercased, without a
/// trailing slash ("https://Example.com/a/b" -> "https://example.com").
pub fn url_base_url(url: &str) -> String {
    let rx = if url.contains("://") {
        &BASE_URL_WITH_SCHEME
    } else {
        &BASE_URL_BARE
    };
    match rx.captures(url).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_lowercase(),
        None => url.to_lowercase(),
    }
}

/// Extract the FQDN from a URL ("https://www.example.com/x" -> "www.example.com").
pub fn url_fqdn(url: &str) -> String {
    let base = url_base_url(url);
    let index = if base.contains("://") { 2 } else { 0 };
    base.split('/')
        .nth(index)
        .unwrap_or(&base)
        .to_lowercase()
}

/// Extract the directory a URL sits in, always with a trailing slash.
pub fn url_base_dir(url: &str) -> String {
    // Scheme-only URLs like "http://www.example.com" have no path to strip.
    if url.contains("://") && url.matches('/').count() < 3 {
        return format!("{}/", url);
    }
    let bits: Vec<&str> = url.split('/').collect();
    if bits.len() <= 1 {
        return format!("{}/", url);
    }
    format!("{}/", bits[..bits.len() - 1].join("/"))
}

/// Collapse "../" segments in a URL path into an absolute path.
pub fn url_relative_to_absolute(url: &str) -> String {
    if !url.contains("..") {
        return url.to_string();
    }

    let mut kept: Vec<&str> = Vec::new();
    let has_scheme = url.contains("://");
    for chunk in url.split('/') {
        if chunk == ".." {
            // Never pop past the top, nor into the scheme/host portion.
            if kept.len() <= 1 {
                continue;
            }
            if has_scheme && kept.len() <= 3 {
                continue;
            }
            kept.pop();
            continue;
        }
        kept.push(chunk);
    }
    kept.join("/")
}

/// Find all e-mail addresses in the supplied content, filtering the
/// usual false positives (too short, mangled encodings, truncations).
pub fn parse_emails(data: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut emails = Vec::new();

    for m in EMAIL_PATTERN.find_iter(data) {
        let email = m.as_str();
        if email.len() < 5 {
            log::debug!("Skipped likely invalid email address");
            continue;
        }
        if email.contains('%') {
            log::debug!("Skipped invalid email address: {}", email);
            continue;
        }
        if email.contains("...") {
            log::debug!("Skipped incomplete e-mail address: {}", email);
            continue;
        }
        if seen.insert(email.to_string()) {
            emails.push(email.to_string());
        }
    }

    emails
}
