//! URL fetch collaborator.
//!
//! Modules never construct HTTP clients themselves; they go through the
//! `UrlFetcher` contract. Failures surface as an empty content field plus
//! an error reason, never as an `Err` — module policy decides whether to
//! retry elsewhere, skip, or emit nothing.

use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{FerretError, FerretResult};

/// Maximum `refresh`-header redirects followed per fetch.
const MAX_REFRESH_HOPS: usize = 5;

/// Options controlling one fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// One is picked at random per request when several are configured.
    pub user_agents: Vec<String>,
    pub headers: HashMap<String, String>,
    pub cookies: Option<String>,
    /// Sending a body turns the request into a POST.
    pub post_data: Option<String>,
    /// Responses larger than this are returned headers-only.
    pub size_limit: Option<usize>,
    pub head_only: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agents: vec!["ferret".to_string()],
            headers: HashMap::new(),
            cookies: None,
            post_data: None,
            size_limit: None,
            head_only: false,
        }
    }
}

/// Outcome of one fetch. `content == None` with a populated `error`
/// means the fetch failed; headers may still be present when only the
/// body was withheld (size cap, HEAD request).
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub code: Option<u16>,
    pub final_url: String,
    pub headers: HashMap<String, String>,
    pub content: Option<String>,
    pub error: Option<String>,
}

/// The fetch contract modules call through.
pub trait UrlFetcher: Send + Sync {
    fn fetch(&self, url: &str, opts: &FetchOptions) -> FetchResult;
}

/// reqwest-backed fetcher. TLS certificate verification is disabled:
/// reconnaissance targets routinely present self-signed or mismatched
/// certificates and a fetch must not fail on them.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> FerretResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| FerretError::external("http client", e.to_string()))?;
        Ok(Self { client })
    }

    fn fetch_once(&self, url: &str, opts: &FetchOptions, hops: usize) -> FetchResult {
        let user_agent = opts
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "ferret".to_string());

        log::info!(
            "Fetching: {} [user-agent: {}] [timeout: {}s]",
            url,
            user_agent,
            opts.timeout.as_secs()
        );

        let mut request = if opts.head_only {
            self.client.head(url)
        } else if let Some(body) = &opts.post_data {
            self.client.post(url).body(body.clone())
        } else {
            self.client.get(url)
        };
        request = request
            .timeout(opts.timeout)
            .header(reqwest::header::USER_AGENT, user_agent);
        for (key, value) in &opts.headers {
            request = request.header(key, value);
        }
        if let Some(cookies) = &opts.cookies {
            request = request.header(reqwest::header::COOKIE, cookies);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Fetch of {} failed: {}", url, e);
                return FetchResult {
                    final_url: url.to_string(),
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        let code = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_lowercase(),
                    String::from_utf8_lossy(v.as_bytes()).to_string(),
                )
            })
            .collect();

        let mut result = FetchResult {
            code: Some(code),
            final_url,
            headers,
            content: None,
            error: None,
        };

        if opts.head_only {
            return result;
        }

        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                result.error = Some(e.to_string());
                return result;
            }
        };

        // Content can exceed the cap after decompression; keep headers only.
        if let Some(limit) = opts.size_limit {
            if body.len() > limit {
                log::debug!("Content of {} exceeded size limit, returning headers only", url);
                return result;
            }
        }

        // Meta-refresh style redirects arrive as a `refresh` header.
        if let Some(refresh) = result.headers.get("refresh") {
            match parse_refresh_url(refresh) {
                Some(next) if hops < MAX_REFRESH_HOPS => {
                    log::debug!("Refresh header found, re-directing to {}", next);
                    let next = next.to_string();
                    return self.fetch_once(&next, opts, hops + 1);
                }
                Some(_) => log::debug!("Refresh redirect limit reached for {}", url),
                None => log::debug!("Refresh header found but was not parsable: {}", refresh),
            }
        }

        result.content = Some(body);
        result
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch(&self, url: &str, opts: &FetchOptions) -> FetchResult {
        self.fetch_once(url, opts, 0)
    }
}

/// Extract the destination of a `refresh: 0;url=https://...` header.
pub fn parse_refresh_url(value: &str) -> Option<&str> {
    let (_, url) = value.split_once(";url=")?;
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}
