//! Handler registry keyed by `(x402_version, scheme, network pattern)`.
//!
//! Lookup is most-specific-first: an exact network entry beats a CAIP
//! family wildcard (`eip155:*`), and within each specificity class the
//! first-registered entry wins. Entries are held in registration order
//! so the tiebreak is observable and deterministic.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

/// A pattern a registered handler claims to serve.
///
/// Either an exact network identifier (`eip155:8453`, or a V1 alias like
/// `base-sepolia`), or a CAIP family wildcard — a single `*` after the
/// family separator (`eip155:*`). No other glob syntax exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkPattern {
    /// Matches one network exactly.
    Exact(String),
    /// Matches every network in a CAIP-2 family.
    Family(String),
}

impl NetworkPattern {
    /// Returns whether the given network is covered by this pattern.
    #[must_use]
    pub fn matches(&self, network: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == network,
            Self::Family(family) => network
                .split_once(':')
                .is_some_and(|(namespace, _)| namespace == family),
        }
    }

    /// Returns `true` for family wildcards.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Family(_))
    }
}

impl FromStr for NetworkPattern {
    type Err = InvalidNetworkPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidNetworkPattern(s.to_owned()));
        }
        match s.strip_suffix(":*") {
            Some(family) if !family.is_empty() && !family.contains(':') && !family.contains('*') => {
                Ok(Self::Family(family.to_owned()))
            }
            Some(_) => Err(InvalidNetworkPattern(s.to_owned())),
            None if s.contains('*') => Err(InvalidNetworkPattern(s.to_owned())),
            None => Ok(Self::Exact(s.to_owned())),
        }
    }
}

impl Display for NetworkPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Family(family) => write!(f, "{family}:*"),
        }
    }
}

/// Error returned for malformed network patterns.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid network pattern: {0}")]
pub struct InvalidNetworkPattern(pub String);

struct Entry<T> {
    x402_version: u32,
    scheme: String,
    pattern: NetworkPattern,
    handler: T,
}

/// Ordered registry of scheme handlers.
///
/// Shared by all three roles; `T` is the role-specific boxed handler.
pub struct SchemeRegistry<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for SchemeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for SchemeRegistry<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let slugs: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("v{}:{}:{}", e.x402_version, e.scheme, e.pattern))
            .collect();
        f.debug_tuple("SchemeRegistry").field(&slugs).finish()
    }
}

impl<T> SchemeRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a handler for `(version, scheme, pattern)`.
    ///
    /// Later registrations never shadow earlier ones of the same
    /// specificity; the first registration wins ties.
    pub fn register(
        &mut self,
        x402_version: u32,
        scheme: impl Into<String>,
        pattern: NetworkPattern,
        handler: T,
    ) {
        self.entries.push(Entry {
            x402_version,
            scheme: scheme.into(),
            pattern,
            handler,
        });
    }

    /// Finds the handler for `(version, scheme, network)`.
    ///
    /// Exact-network entries are preferred over family wildcards; within
    /// each class the first-registered entry is returned.
    #[must_use]
    pub fn lookup(&self, x402_version: u32, scheme: &str, network: &str) -> Option<&T> {
        let candidates = || {
            self.entries
                .iter()
                .filter(move |e| e.x402_version == x402_version && e.scheme == scheme)
        };
        candidates()
            .find(|e| !e.pattern.is_wildcard() && e.pattern.matches(network))
            .or_else(|| candidates().find(|e| e.pattern.is_wildcard() && e.pattern.matches(network)))
            .map(|e| &e.handler)
    }

    /// Returns whether a handler exists for `(version, scheme, network)`.
    #[must_use]
    pub fn contains(&self, x402_version: u32, scheme: &str, network: &str) -> bool {
        self.lookup(x402_version, scheme, network).is_some()
    }

    /// Iterates over `(version, scheme, pattern, handler)` in
    /// registration order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, &NetworkPattern, &T)> {
        self.entries
            .iter()
            .map(|e| (e.x402_version, e.scheme.as_str(), &e.pattern, &e.handler))
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_parsing() {
        assert_eq!(
            "eip155:*".parse::<NetworkPattern>().unwrap(),
            NetworkPattern::Family("eip155".into())
        );
        assert_eq!(
            "eip155:8453".parse::<NetworkPattern>().unwrap(),
            NetworkPattern::Exact("eip155:8453".into())
        );
        // V1 aliases have no family separator but are valid exact patterns.
        assert_eq!(
            "base-sepolia".parse::<NetworkPattern>().unwrap(),
            NetworkPattern::Exact("base-sepolia".into())
        );
        assert!(":*".parse::<NetworkPattern>().is_err());
        assert!("eip155:8*".parse::<NetworkPattern>().is_err());
        assert!("".parse::<NetworkPattern>().is_err());
    }

    #[test]
    fn exact_beats_wildcard_regardless_of_order() {
        let mut registry = SchemeRegistry::new();
        registry.register(2, "exact", "eip155:*".parse().unwrap(), "wildcard");
        registry.register(2, "exact", "eip155:8453".parse().unwrap(), "base");

        assert_eq!(registry.lookup(2, "exact", "eip155:8453"), Some(&"base"));
        assert_eq!(registry.lookup(2, "exact", "eip155:1"), Some(&"wildcard"));
        assert_eq!(registry.lookup(2, "exact", "solana:devnet"), None);
        assert_eq!(registry.lookup(1, "exact", "eip155:8453"), None);
        assert_eq!(registry.lookup(2, "other", "eip155:8453"), None);
    }

    #[test]
    fn first_registration_wins_ties() {
        let mut registry = SchemeRegistry::new();
        registry.register(2, "exact", "eip155:*".parse().unwrap(), "first");
        registry.register(2, "exact", "eip155:*".parse().unwrap(), "second");
        assert_eq!(registry.lookup(2, "exact", "eip155:10"), Some(&"first"));
    }
}
