//! Public-suffix decomposition.
//!
//! Splits a hostname into its public suffix (the boundary under which
//! unrelated parties may register names, e.g. "co.uk") and the
//! organizational label above it. Rules follow the publicsuffix.org list
//! format: dot-separated labels, `*` wildcard labels, `!` exception
//! prefixes, `//` comments. Longest rule wins and explicit exceptions
//! override wildcards.

use std::collections::HashMap;

#[derive(Debug, Default)]
struct SuffixNode {
    /// True when this boundary is an explicit exception to a wildcard rule.
    negate: bool,
    children: HashMap<String, SuffixNode>,
}

/// Trie over reversed domain labels. Built once per ruleset, immutable
/// afterwards, freely shareable across scans.
#[derive(Debug, Default)]
pub struct PublicSuffixTrie {
    root: SuffixNode,
}

impl PublicSuffixTrie {
    /// Build a trie from public-suffix rules, one per line. Blank lines
    /// and `//` comments are skipped; only the first whitespace-separated
    /// token of each line is used.
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = PublicSuffixTrie::default();
        for line in rules {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let rule = line.split_whitespace().next().unwrap_or("");
            trie.add_rule(rule.trim_start_matches('.'));
        }
        trie
    }

    fn add_rule(&mut self, rule: &str) {
        let (negate, rule) = match rule.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, rule),
        };
        if rule.is_empty() {
            return;
        }

        let mut node = &mut self.root;
        for label in rule.to_lowercase().split('.').rev() {
            node = node.children.entry(label.to_string()).or_default();
        }
        node.negate = negate;
    }

    /// The registrable domain for `host`: the public suffix plus one
    /// label ("www.example.co.uk" -> "example.co.uk"). Returns `None`
    /// for an empty host.
    pub fn registrable_domain(&self, host: &str) -> Option<String> {
        let host = host.to_lowercase();
        let host = host.trim_start_matches('.');
        if host.is_empty() {
            return None;
        }

        let parts: Vec<&str> = host.split('.').collect();
        let mut hits: Vec<Option<bool>> = vec![None; parts.len()];
        lookup(&self.root, 1, &parts, &mut hits);

        // The shallowest depth whose recorded flag is a genuine boundary
        // (not an exception) starts the suffix.
        hits.iter()
            .position(|flag| *flag == Some(false))
            .map(|i| parts[i..].join("."))
    }

    /// True when `host` rests directly atop a public suffix, i.e. it is
    /// itself a registrable domain ("example.com" yes, "www.example.com" no).
    pub fn is_domain(&self, host: &str) -> bool {
        self.registrable_domain(host)
            .map(|d| d == host.to_lowercase())
            .unwrap_or(false)
    }

    /// The keyword of a hostname: the label directly above the public
    /// suffix ("www.example.co.uk" -> "example").
    pub fn domain_keyword(&self, host: &str) -> Option<String> {
        let registrable = self.registrable_domain(host)?;
        registrable.split('.').next().map(str::to_string)
    }
}

fn lookup(node: &SuffixNode, depth: usize, parts: &[&str], hits: &mut [Option<bool>]) {
    let n = parts.len();
    hits[n - depth] = Some(node.negate);

    if depth < n {
        // Wildcard first so an exact label match overwrites it.
        for label in ["*", parts[n - depth]] {
            if let Some(child) = node.children.get(label) {
                lookup(child, depth + 1, parts, hits);
            }
        }
    }
}
