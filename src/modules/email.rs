//! E-mail address extraction from any textual content event.

use std::collections::HashSet;
use std::sync::Arc;

use crate::dispatch::ScanHandle;
use crate::errors::FerretResult;
use crate::event::Event;
use crate::module::{Module, WatchSet};
use crate::utils::parse_emails;

/// Scans delivered content for e-mail addresses, classifying each as
/// in-scope (`EMAILADDR`) or external (`AFFILIATE_EMAILADDR`) against
/// the scan target.
#[derive(Debug, Default)]
pub struct EmailModule;

impl EmailModule {
    pub fn new() -> Self {
        Self
    }
}

impl Module for EmailModule {
    fn name(&self) -> &'static str {
        "recon_email"
    }

    fn watched_events(&self) -> WatchSet {
        WatchSet::of(&[
            "TARGET_WEB_CONTENT",
            "SEARCH_ENGINE_WEB_CONTENT",
            "LEAKSITE_CONTENT",
            "BASE64_DATA",
            "DOMAIN_WHOIS",
            "NETBLOCK_WHOIS",
            "AFFILIATE_DOMAIN_WHOIS",
            "RAW_DNS_RECORDS",
            "RAW_FILE_META_DATA",
            "RAW_RIR_DATA",
            "SSL_CERTIFICATE_RAW",
            "TCP_PORT_OPEN_BANNER",
            "WEBSERVER_BANNER",
            "WEBSERVER_HTTPHEADERS",
        ])
    }

    fn produced_events(&self) -> Vec<&'static str> {
        vec!["EMAILADDR", "AFFILIATE_EMAILADDR"]
    }

    fn handle_event(&mut self, scan: &mut ScanHandle, event: &Arc<Event>) -> FerretResult<()> {
        log::debug!(
            "Received event {} from {}",
            event.event_type(),
            event.module()
        );

        let mut found: HashSet<String> = HashSet::new();
        for email in parse_emails(event.data()) {
            let mail = email.trim_end_matches('.').to_string();
            if !found.insert(mail.to_lowercase()) {
                log::debug!("Already found {} in this content", mail);
                continue;
            }

            let Some(domain) = mail.split('@').nth(1).map(|d| d.trim_end_matches('.')) else {
                continue;
            };

            let mut event_type = if scan.target().matches(domain, true, true)
                || scan.target().matches(&mail, false, false)
            {
                "EMAILADDR"
            } else {
                // External mail domain, so possible affiliate.
                "AFFILIATE_EMAILADDR"
            };
            // Content that came from an affiliate can only yield
            // affiliate addresses, whatever their domain.
            if event.event_type().starts_with("AFFILIATE_") {
                event_type = "AFFILIATE_EMAILADDR";
            }

            log::info!("Found e-mail address: {}", mail);
            scan.emit(Event::new(event_type, mail, self.name(), event));
        }

        Ok(())
    }
}
