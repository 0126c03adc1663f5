//! Human name extraction.
//!
//! Two detectors: a structural one turning `first.last@` e-mail local
//! parts into names, and a dictionary-scored heuristic over free text.
//! The heuristic is deliberately error-prone; the score threshold trades
//! junk for misses.

use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::dict::Dictionary;
use crate::dispatch::ScanHandle;
use crate::errors::FerretResult;
use crate::event::Event;
use crate::module::{Module, ModuleOptions, SharedServices, WatchSet};

static NAME_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    // Two capitalized words, allowing an optional middle initial.
    Regex::new(r"([A-Z][a-z'\-]+)\s+.?.?\s?([A-Z][a-zA-Z'\-]+)").expect("static pattern")
});

/// Default score threshold; candidates must exceed it to be emitted.
const DEFAULT_ALGO_LIMIT: i64 = 75;

pub struct NamesModule {
    dictionary: Arc<Dictionary>,
    algo_limit: i64,
    email_to_name: bool,
}

impl NamesModule {
    pub fn new() -> Self {
        Self {
            dictionary: Arc::new(Dictionary::empty()),
            algo_limit: DEFAULT_ALGO_LIMIT,
            email_to_name: true,
        }
    }

    fn score(&self, first: &str, second: &str) -> i64 {
        let mut points = 0;
        let first_is_word = self.dictionary.is_word(first);
        let second_is_word = self.dictionary.is_word(second);

        // Two adjacent non-dictionary words are the strongest signal.
        let neither_in_dict = !first_is_word && !second_is_word;
        if neither_in_dict {
            points += 75;
        }

        if self.dictionary.is_name(first) {
            points += 50;
        }

        if first.len() == 2 || second.len() == 2 {
            points -= 50;
        }

        if !neither_in_dict {
            if first_is_word && !second_is_word {
                points -= 20;
            }
            if !first_is_word && second_is_word {
                points -= 40;
            }
        }

        points
    }
}

impl Default for NamesModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for NamesModule {
    fn name(&self) -> &'static str {
        "recon_names"
    }

    fn watched_events(&self) -> WatchSet {
        WatchSet::of(&[
            "TARGET_WEB_CONTENT",
            "EMAILADDR",
            "DOMAIN_WHOIS",
            "NETBLOCK_WHOIS",
            "RAW_RIR_DATA",
            "RAW_FILE_META_DATA",
        ])
    }

    fn produced_events(&self) -> Vec<&'static str> {
        vec!["HUMAN_NAME"]
    }

    fn setup(&mut self, services: Arc<SharedServices>, options: &ModuleOptions) -> FerretResult<()> {
        self.dictionary = Arc::clone(&services.dictionary);
        self.algo_limit = options.get_i64("algolimit", DEFAULT_ALGO_LIMIT);
        self.email_to_name = options.get_bool("emailtoname", true);
        Ok(())
    }

    fn handle_event(&mut self, scan: &mut ScanHandle, event: &Arc<Event>) -> FerretResult<()> {
        log::debug!(
            "Received event {} from {}",
            event.event_type(),
            event.module()
        );

        if event.event_type() == "EMAILADDR" {
            if self.email_to_name {
                if let Some(local) = event.data().split('@').next() {
                    if local.contains('.') {
                        let name = local
                            .split('.')
                            .map(capitalize)
                            .collect::<Vec<_>>()
                            .join(" ");
                        scan.emit(Event::new("HUMAN_NAME", name, self.name(), event));
                    }
                }
            }
            return Ok(());
        }

        for caps in NAME_CANDIDATE.captures_iter(event.data()) {
            let first_orig = &caps[1];
            let first = first_orig.to_lowercase();
            // "Firstname's" is a possessive, not a first name.
            if first.ends_with('\'') || first[..first.len() - 1].ends_with('\'') {
                continue;
            }

            let second_orig = caps[2].replace("'s", "");
            let second_orig = second_orig.trim_end_matches('\'');
            let second = second_orig.to_lowercase();

            let points = self.score(&first, &second);
            let name = format!("{} {}", first_orig, second_orig);
            log::debug!("Name candidate {} scored {}", name, points);

            if points > self.algo_limit {
                scan.emit(Event::new("HUMAN_NAME", name, self.name(), event));
            }
        }

        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}
