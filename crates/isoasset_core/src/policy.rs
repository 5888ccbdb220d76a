//! Inclusion policy for intercepted asset keys.
//!
//! # Responsibility
//! - Model include/exclude matchers as a closed variant.
//! - Decide whether one canonical key belongs to an asset type.
//!
//! # Invariants
//! - Exclude always dominates include.
//! - An empty include list includes every key.
//! - Descriptors are immutable once shared with a load hook.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// One unit of inclusion/exclusion policy.
#[derive(Clone)]
pub enum Matcher {
    /// Exact key equality.
    Literal(String),
    /// Regex search against the key.
    Pattern(Regex),
    /// Caller-supplied predicate.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Literal(value) => value == key,
            Self::Pattern(regex) => regex.is_match(key),
            Self::Predicate(f) => f(key),
        }
    }
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// One configured asset type: the extensions it claims and its key policy.
#[derive(Debug, Clone, Default)]
pub struct AssetTypeDescriptor {
    pub extensions: BTreeSet<String>,
    pub include: Vec<Matcher>,
    pub exclude: Vec<Matcher>,
}

impl AssetTypeDescriptor {
    /// Creates a descriptor with normalized extensions; invalid entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .filter_map(|value| normalize_extension(value.as_ref()))
                .collect(),
            include: vec![],
            exclude: vec![],
        }
    }

    pub fn include(mut self, matcher: Matcher) -> Self {
        self.include.push(matcher);
        self
    }

    pub fn exclude(mut self, matcher: Matcher) -> Self {
        self.exclude.push(matcher);
        self
    }

    pub fn accepts(&self, key: &str) -> bool {
        decide(key, self)
    }
}

/// Returns whether `key` should be intercepted under `descriptor`.
pub fn decide(key: &str, descriptor: &AssetTypeDescriptor) -> bool {
    let included =
        descriptor.include.is_empty() || descriptor.include.iter().any(|m| m.matches(key));
    included && !descriptor.exclude.iter().any(|m| m.matches(key))
}

/// Lowercases and strips a leading dot; `None` for blank or dotted values.
pub fn normalize_extension(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if bare.is_empty() || bare.contains('.') || bare.contains('/') {
        return None;
    }
    Some(bare.to_ascii_lowercase())
}
