//! PGP key-server lookups.
//!
//! Searches public key servers for addresses on a discovered domain and
//! retrieves the public key behind each discovered address. Every lookup
//! tries a primary server and falls back to a backup when the fetch
//! comes back empty.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::dispatch::ScanHandle;
use crate::errors::{FerretError, FerretResult};
use crate::event::Event;
use crate::module::{Module, ModuleOptions, SharedServices, WatchSet};
use crate::utils::parse_emails;

static PGP_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)-----BEGIN.*END.*BLOCK-----").expect("static pattern"));

/// Anything shorter is truncated or mangled server output, not a key.
const MIN_KEY_LEN: usize = 300;

const DEFAULT_SEARCH_URLS: [&str; 2] = [
    "https://pgp.key-server.io/pks/lookup?fingerprint=on&op=vindex&search=",
    "http://the.earth.li:11371/pks/lookup?op=index&search=",
];
const DEFAULT_FETCH_URLS: [&str; 2] = [
    "https://pgp.key-server.io/pks/lookup?op=get&search=",
    "http://the.earth.li:11371/pks/lookup?op=get&search=",
];

pub struct PgpModule {
    services: Option<Arc<SharedServices>>,
    search_urls: Vec<String>,
    fetch_urls: Vec<String>,
    seen: HashSet<String>,
}

impl PgpModule {
    pub fn new() -> Self {
        Self {
            services: None,
            search_urls: DEFAULT_SEARCH_URLS.iter().map(|u| u.to_string()).collect(),
            fetch_urls: DEFAULT_FETCH_URLS.iter().map(|u| u.to_string()).collect(),
            seen: HashSet::new(),
        }
    }

    /// Try each key server in order; first non-empty body wins.
    fn fetch_with_fallback(
        &self,
        services: &SharedServices,
        bases: &[String],
        suffix: &str,
    ) -> Option<String> {
        for base in bases {
            let url = format!("{}{}", base, suffix);
            let result = services.fetcher.fetch(&url, &services.default_fetch);
            if let Some(content) = result.content {
                return Some(content);
            }
            log::debug!("Key server {} returned nothing, trying next", base);
        }
        None
    }
}

impl Default for PgpModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for PgpModule {
    fn name(&self) -> &'static str {
        "recon_pgp"
    }

    fn watched_events(&self) -> WatchSet {
        WatchSet::of(&["DOMAIN_NAME", "INTERNET_NAME", "EMAILADDR"])
    }

    fn produced_events(&self) -> Vec<&'static str> {
        vec!["EMAILADDR", "AFFILIATE_EMAILADDR", "PGP_KEY"]
    }

    fn setup(&mut self, services: Arc<SharedServices>, options: &ModuleOptions) -> FerretResult<()> {
        for (i, key) in ["keyserver_search1", "keyserver_search2"].iter().enumerate() {
            if let Some(url) = options.get_str(key) {
                self.search_urls[i] = url.to_string();
            }
        }
        for (i, key) in ["keyserver_fetch1", "keyserver_fetch2"].iter().enumerate() {
            if let Some(url) = options.get_str(key) {
                self.fetch_urls[i] = url.to_string();
            }
        }
        self.services = Some(services);
        Ok(())
    }

    fn handle_event(&mut self, scan: &mut ScanHandle, event: &Arc<Event>) -> FerretResult<()> {
        let services = Arc::clone(
            self.services
                .as_ref()
                .ok_or_else(|| FerretError::module(self.name(), "setup was not run"))?,
        );
        let data = event.data().to_string();

        // Each value is looked up against the key servers once per scan.
        if !self.seen.insert(data.to_lowercase()) {
            log::debug!("Already looked up {}", data);
            return Ok(());
        }

        log::debug!(
            "Received event {} from {}",
            event.event_type(),
            event.module()
        );

        let searchable = match event.event_type() {
            "DOMAIN_NAME" => true,
            // Hostnames are only worth a domain-wide search at the
            // registrable boundary; subdomains would just repeat it.
            "INTERNET_NAME" => services.suffixes.is_domain(&data),
            _ => false,
        };
        if searchable {
            if let Some(content) = self.fetch_with_fallback(&services, &self.search_urls, &data) {
                for email in parse_emails(&content) {
                    let Some(domain) = email.split('@').nth(1) else {
                        continue;
                    };
                    let event_type = if scan.target().matches(domain, true, true) {
                        "EMAILADDR"
                    } else {
                        "AFFILIATE_EMAILADDR"
                    };
                    log::info!("Found e-mail address: {}", email);
                    scan.emit(Event::new(event_type, email, self.name(), event));
                }
            }
        }

        if event.event_type() == "EMAILADDR" {
            if let Some(content) = self.fetch_with_fallback(&services, &self.fetch_urls, &data) {
                for m in PGP_BLOCK.find_iter(&content) {
                    let key = m.as_str();
                    if key.len() < MIN_KEY_LEN {
                        log::debug!("Likely invalid public key, skipping");
                        continue;
                    }
                    scan.emit(Event::new("PGP_KEY", key, self.name(), event));
                }
            }
        }

        Ok(())
    }
}
