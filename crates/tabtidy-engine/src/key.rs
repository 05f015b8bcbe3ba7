//! Locator keys: extraction, rewrite rules, and the collation order over them.
//!
//! A locator's comparison key is its host's dot-labels with the top-level
//! domain dropped and the remainder reversed, so `mail.google.com` keys as
//! `["google", "mail"]` and related hosts sort adjacently. Numeric hosts are
//! kept whole. The path rides along as an opaque tiebreak string.

use std::{cmp::Ordering, net::Ipv4Addr, num::NonZeroUsize, sync::Arc};

use config::AltDomainRule;
use icu_collator::{Collator, CollatorOptions, Strength};
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

/// Maximum number of cached compiled rewrite patterns.
const PATTERN_CACHE_CAPACITY: usize = 64;

/// Hierarchical comparison key derived from a locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    /// Host labels, most significant first (TLD removed, rest reversed).
    pub labels: Vec<String>,
    /// Path component, compared as an opaque string.
    pub path: String,
}

impl SortKey {
    /// The key's labels joined the way group names are spelled.
    pub fn joined_labels(&self) -> String {
        self.labels.join(" ")
    }
}

/// Size-bounded cache of compiled rewrite patterns.
///
/// Invalid patterns are remembered as `None` so a broken rule is compiled
/// (and warned about) once, not once per organizing run.
struct PatternCache {
    map: Mutex<LruCache<String, Option<Arc<Regex>>>>,
}

impl PatternCache {
    fn new() -> Self {
        let cap = NonZeroUsize::new(PATTERN_CACHE_CAPACITY).unwrap();
        Self {
            map: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Compiled regex for `pattern`, or `None` for a pattern that does not
    /// compile.
    fn get(&self, pattern: &str) -> Option<Arc<Regex>> {
        let mut map = self.map.lock();
        if let Some(found) = map.get(pattern) {
            return found.clone();
        }
        let compiled = match Regex::new(pattern) {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                warn!("skipping invalid alternate-domain pattern {:?}: {}", pattern, e);
                None
            }
        };
        map.put(pattern.to_string(), compiled.clone());
        compiled
    }
}

/// Derives [`SortKey`]s from raw locators, applying rewrite rules first.
///
/// One extractor lives for the life of the [`crate::Organizer`]; only the
/// compiled-pattern cache persists across runs.
pub struct KeyExtractor {
    patterns: PatternCache,
}

impl Default for KeyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExtractor {
    /// Create an extractor with an empty pattern cache.
    pub fn new() -> Self {
        Self {
            patterns: PatternCache::new(),
        }
    }

    /// Extract the comparison key for `raw`.
    ///
    /// Returns `None` for locators that do not parse or carry no usable
    /// http(s) host; such tabs belong to the unknown bucket.
    pub fn extract(&self, rules: &[AltDomainRule], raw: &str) -> Option<SortKey> {
        let url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let mut host = url.host_str()?.to_string();
        if let Some(port) = url.port() {
            host.push(':');
            host.push_str(&port.to_string());
        }
        let path = url.path().to_string();
        let host = self.rewrite(rules, &host, &path);
        Some(SortKey {
            labels: split_labels(&host),
            path,
        })
    }

    /// Apply the first matching rewrite rule to the effective host.
    fn rewrite(&self, rules: &[AltDomainRule], host: &str, path: &str) -> String {
        if rules.is_empty() {
            return host.to_string();
        }
        let probe = format!("{host}{path}");
        for rule in rules {
            if let Some(re) = self.patterns.get(&rule.pattern)
                && re.is_match(&probe)
            {
                return rule.host.clone();
            }
        }
        host.to_string()
    }
}

/// Split a host into its key labels.
fn split_labels(host: &str) -> Vec<String> {
    if is_numeric_host(host) {
        return vec![host.to_string()];
    }
    let mut labels: Vec<String> = host.split('.').map(str::to_string).collect();
    if labels.len() > 1 {
        labels.pop();
        labels.reverse();
    }
    labels
}

/// True for dotted-quad hosts, optionally with a `:port` suffix.
fn is_numeric_host(host: &str) -> bool {
    let (addr, port) = match host.split_once(':') {
        Some((addr, port)) => (addr, Some(port)),
        None => (host, None),
    };
    if port.is_some_and(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return false;
    }
    addr.parse::<Ipv4Addr>().is_ok()
}

/// Locale-aware comparison over keys and group names.
///
/// Root locale, tertiary strength; built once per organizing run and used
/// only within the run's synchronous planning phase.
pub struct KeyOrder {
    collator: Collator,
}

impl KeyOrder {
    /// Build the collator.
    pub fn new() -> Result<Self> {
        let mut options = CollatorOptions::new();
        options.strength = Some(Strength::Tertiary);
        let collator = Collator::try_new(&Default::default(), options)
            .map_err(|e| Error::Msg(format!("collator unavailable: {e}")))?;
        Ok(Self { collator })
    }

    /// Compare two plain strings (group names).
    pub fn strings(&self, a: &str, b: &str) -> Ordering {
        self.collator.compare(a, b)
    }

    /// Compare two keys: labels element-wise, shorter prefix first, then
    /// path.
    pub fn keys(&self, a: &SortKey, b: &SortKey) -> Ordering {
        for (la, lb) in a.labels.iter().zip(&b.labels) {
            let ord = self.collator.compare(la, lb);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        match a.labels.len().cmp(&b.labels.len()) {
            Ordering::Equal => self.collator.compare(&a.path, &b.path),
            shorter_first => shorter_first,
        }
    }
}
