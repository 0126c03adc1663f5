//! Scan target model and scope matching.
//!
//! A `Target` anchors one scan: a typed value plus a growing set of
//! aliases other modules establish as equivalent to it (reverse-resolved
//! hostnames, nested subnets, and so on). Scope matching decides whether
//! a discovered value is "inside" the target's boundary, with IP/subnet
//! containment and domain-hierarchy semantics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::{LazyLock, RwLock};

use crate::errors::{FerretError, FerretResult};

/// The kinds of identity a scan can be anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    IpAddress,
    Ipv6Address,
    NetblockOwner,
    InternetName,
    EmailAddr,
    HumanName,
    BgpAsOwner,
    PhoneNumber,
}

impl TargetKind {
    /// Wire name as used in event types ("IP_ADDRESS", ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::IpAddress => "IP_ADDRESS",
            TargetKind::Ipv6Address => "IPV6_ADDRESS",
            TargetKind::NetblockOwner => "NETBLOCK_OWNER",
            TargetKind::InternetName => "INTERNET_NAME",
            TargetKind::EmailAddr => "EMAILADDR",
            TargetKind::HumanName => "HUMAN_NAME",
            TargetKind::BgpAsOwner => "BGP_AS_OWNER",
            TargetKind::PhoneNumber => "PHONE_NUMBER",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = FerretError;

    fn from_str(s: &str) -> FerretResult<Self> {
        match s {
            "IP_ADDRESS" => Ok(TargetKind::IpAddress),
            "IPV6_ADDRESS" => Ok(TargetKind::Ipv6Address),
            "NETBLOCK_OWNER" => Ok(TargetKind::NetblockOwner),
            "INTERNET_NAME" => Ok(TargetKind::InternetName),
            "EMAILADDR" => Ok(TargetKind::EmailAddr),
            "HUMAN_NAME" => Ok(TargetKind::HumanName),
            "BGP_AS_OWNER" => Ok(TargetKind::BgpAsOwner),
            "PHONE_NUMBER" => Ok(TargetKind::PhoneNumber),
            other => Err(FerretError::target(other, "not a valid target type")),
        }
    }
}

static KIND_PATTERNS: LazyLock<Vec<(Regex, TargetKind)>> = LazyLock::new(|| {
    // Order matters: first match wins.
    let table: [(&str, TargetKind); 8] = [
        (r"^\d+\.\d+\.\d+\.\d+$", TargetKind::IpAddress),
        (r"^\d+\.\d+\.\d+\.\d+/\d+$", TargetKind::NetblockOwner),
        (r"^.*@.*$", TargetKind::EmailAddr),
        (r"^\+\d+$", TargetKind::PhoneNumber),
        (r#"^".*"$"#, TargetKind::HumanName),
        (r"^\d+$", TargetKind::BgpAsOwner),
        (r"^[0-9a-f:]+$", TargetKind::Ipv6Address),
        (
            r"^(([a-z0-9]|[a-z0-9][a-z0-9\-]*[a-z0-9])\.)+([a-z0-9]|[a-z0-9][a-z0-9\-]*[a-z0-9])$",
            TargetKind::InternetName,
        ),
    ];
    table
        .iter()
        .map(|(rx, kind)| {
            (
                Regex::new(&format!("(?i){}", rx)).expect("static kind pattern"),
                *kind,
            )
        })
        .collect()
});

/// Guess the target kind for a raw user-supplied value.
pub fn guess_target_kind(value: &str) -> Option<TargetKind> {
    KIND_PATTERNS
        .iter()
        .find(|(rx, _)| rx.is_match(value))
        .map(|(_, kind)| *kind)
}

/// A (kind, value) pair established as equivalent to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub kind: TargetKind,
    pub value: String,
}

/// The identity under investigation. Created once per scan; aliases are
/// appended monotonically by module enrichment and never removed.
#[derive(Debug)]
pub struct Target {
    kind: TargetKind,
    value: String,
    // Alias appends happen-before dependent reads under the default
    // single-thread-per-scan execution; the lock makes concurrent
    // dispatch redesigns safe as well.
    aliases: RwLock<Vec<Alias>>,
}

impl Target {
    pub fn new(value: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            kind,
            value: value.into().to_lowercase(),
            aliases: RwLock::new(Vec::new()),
        }
    }

    /// Build a target from a raw value, detecting the kind.
    pub fn from_value(value: &str) -> FerretResult<Self> {
        let kind = guess_target_kind(value)
            .ok_or_else(|| FerretError::target(value, "could not determine target type"))?;
        Ok(Self::new(value, kind))
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Register another value as equivalent to this target. Duplicates
    /// are ignored; aliases are never removed.
    pub fn add_alias(&self, value: &str, kind: TargetKind) {
        let alias = Alias {
            kind,
            value: value.to_lowercase(),
        };
        let mut aliases = self.aliases.write().expect("alias lock poisoned");
        if !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }

    pub fn aliases(&self) -> Vec<Alias> {
        self.aliases.read().expect("alias lock poisoned").clone()
    }

    fn equivalents(&self, kind: TargetKind) -> Vec<String> {
        self.aliases
            .read()
            .expect("alias lock poisoned")
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.value.clone())
            .collect()
    }

    /// All internet names associated with the target (aliases plus the
    /// target's own value when it is a name).
    pub fn names(&self) -> Vec<String> {
        let mut names = self.equivalents(TargetKind::InternetName);
        if self.kind == TargetKind::InternetName && !names.contains(&self.value) {
            names.push(self.value.clone());
        }
        names
    }

    /// All IPv4 addresses associated with the target.
    pub fn addresses(&self) -> Vec<String> {
        let mut addrs = self.equivalents(TargetKind::IpAddress);
        if self.kind == TargetKind::IpAddress {
            addrs.push(self.value.clone());
        }
        addrs
    }

    /// Check whether `value` is tightly related to the target:
    ///
    /// 1. For IPv4 values: is it the target/an alias, or inside the
    ///    target's netblock (an IP_ADDRESS target being a degenerate
    ///    single-host netblock)?
    /// 2. For name values: does it equal a target name; with
    ///    `include_parents`, is it an ancestor domain of one; with
    ///    `include_children`, is it a subdomain of one?
    ///
    /// Unparseable or empty values return false; never fails.
    pub fn matches(&self, value: &str, include_parents: bool, include_children: bool) -> bool {
        let value = value.to_lowercase();
        if value.is_empty() {
            return false;
        }

        // No scoping is meaningful for these target kinds.
        if self.kind == TargetKind::HumanName || self.kind == TargetKind::PhoneNumber {
            return true;
        }

        if let Ok(ip) = value.parse::<Ipv4Addr>() {
            if self.addresses().contains(&value) {
                return true;
            }
            if self.kind == TargetKind::NetblockOwner && ipv4_in_netblock(ip, &self.value) {
                return true;
            }
            if self.kind == TargetKind::IpAddress && self.value == value {
                return true;
            }
        } else {
            for name in self.names() {
                if value == name {
                    return true;
                }
                if include_parents && name.ends_with(&format!(".{}", value)) {
                    return true;
                }
                if include_children && value.ends_with(&format!(".{}", name)) {
                    return true;
                }
            }
        }

        false
    }
}

/// True if `ip` falls inside the CIDR block `cidr` ("10.0.0.0/24").
/// Malformed blocks never match.
pub fn ipv4_in_netblock(ip: Ipv4Addr, cidr: &str) -> bool {
    let Some((net, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(net) = net.parse::<Ipv4Addr>() else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u32>() else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    (u32::from(ip) & mask) == (u32::from(net) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_target_kind() {
        assert_eq!(guess_target_kind("1.2.3.4"), Some(TargetKind::IpAddress));
        assert_eq!(
            guess_target_kind("10.0.0.0/24"),
            Some(TargetKind::NetblockOwner)
        );
        assert_eq!(
            guess_target_kind("bob@example.com"),
            Some(TargetKind::EmailAddr)
        );
        assert_eq!(guess_target_kind("+61400000000"), Some(TargetKind::PhoneNumber));
        assert_eq!(
            guess_target_kind("\"John Smith\""),
            Some(TargetKind::HumanName)
        );
        assert_eq!(guess_target_kind("64496"), Some(TargetKind::BgpAsOwner));
        assert_eq!(
            guess_target_kind("2001:db8::1"),
            Some(TargetKind::Ipv6Address)
        );
        assert_eq!(
            guess_target_kind("www.example.com"),
            Some(TargetKind::InternetName)
        );
        assert_eq!(guess_target_kind("not a target!"), None);
    }

    #[test]
    fn test_matches_reflexive() {
        let name = Target::new("Example.COM", TargetKind::InternetName);
        assert!(name.matches("example.com", false, false));

        let ip = Target::new("192.0.2.10", TargetKind::IpAddress);
        assert!(ip.matches("192.0.2.10", false, false));
    }

    #[test]
    fn test_matches_children_flag() {
        let target = Target::new("10.0.0.1", TargetKind::IpAddress);
        target.add_alias("example.com", TargetKind::InternetName);
        assert!(target.matches("sub.example.com", false, true));
        assert!(!target.matches("sub.example.com", false, false));
    }

    #[test]
    fn test_matches_parents_flag() {
        let target = Target::new("mail.example.com", TargetKind::InternetName);
        assert!(target.matches("example.com", true, false));
        assert!(!target.matches("example.com", false, false));
    }

    #[test]
    fn test_netblock_containment() {
        let target = Target::new("10.0.0.0/24", TargetKind::NetblockOwner);
        assert!(target.matches("10.0.0.5", false, false));
        assert!(!target.matches("10.0.1.5", false, false));
    }

    #[test]
    fn test_unscoped_kinds_always_match() {
        let human = Target::new("\"john smith\"", TargetKind::HumanName);
        assert!(human.matches("anything-at-all", false, false));

        let phone = Target::new("+61400000000", TargetKind::PhoneNumber);
        assert!(phone.matches("1.2.3.4", false, false));
    }

    #[test]
    fn test_empty_value_never_matches() {
        let human = Target::new("\"john smith\"", TargetKind::HumanName);
        assert!(!human.matches("", true, true));
    }

    #[test]
    fn test_alias_dedup_and_projection() {
        let target = Target::new("example.com", TargetKind::InternetName);
        target.add_alias("192.0.2.1", TargetKind::IpAddress);
        target.add_alias("192.0.2.1", TargetKind::IpAddress);
        target.add_alias("Mail.Example.com", TargetKind::InternetName);
        assert_eq!(target.aliases().len(), 2);
        assert_eq!(target.addresses(), vec!["192.0.2.1"]);
        let names = target.names();
        assert!(names.contains(&"mail.example.com".to_string()));
        assert!(names.contains(&"example.com".to_string()));
    }

    #[test]
    fn test_netblock_edge_prefixes() {
        assert!(ipv4_in_netblock("1.2.3.4".parse().unwrap(), "0.0.0.0/0"));
        assert!(ipv4_in_netblock("1.2.3.4".parse().unwrap(), "1.2.3.4/32"));
        assert!(!ipv4_in_netblock("1.2.3.5".parse().unwrap(), "1.2.3.4/32"));
        assert!(!ipv4_in_netblock("1.2.3.4".parse().unwrap(), "garbage"));
        assert!(!ipv4_in_netblock("1.2.3.4".parse().unwrap(), "1.2.3.0/40"));
    }
}
