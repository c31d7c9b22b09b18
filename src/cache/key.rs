//! Cache Keys
//!
//! Namespaced keys. Only the cache repository applies or strips the prefix.

use std::borrow::Cow;

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{CacheError, Result};

/// Key space holding tag bookkeeping. User keys may not start with it.
pub const RESERVED_KEY_SPACE: &str = "__tags:";

// == Cache Key ==
/// A key handed to the cache repository.
///
/// Plain strings convert into keys that still need the namespace prefix.
/// [`CacheKey::prepared`] marks a key that already carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey<'a> {
    key: Cow<'a, str>,
    prepare: bool,
}

impl<'a> CacheKey<'a> {
    pub fn new(key: impl Into<Cow<'a, str>>) -> Self {
        Self {
            key: key.into(),
            prepare: true,
        }
    }

    /// Key that bypasses prefixing.
    pub fn prepared(key: impl Into<Cow<'a, str>>) -> Self {
        Self {
            key: key.into(),
            prepare: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn needs_prefix(&self) -> bool {
        self.prepare
    }
}

impl<'a> From<&'a str> for CacheKey<'a> {
    fn from(key: &'a str) -> Self {
        CacheKey::new(key)
    }
}

impl<'a> From<&'a String> for CacheKey<'a> {
    fn from(key: &'a String) -> Self {
        CacheKey::new(key.as_str())
    }
}

impl From<String> for CacheKey<'static> {
    fn from(key: String) -> Self {
        CacheKey::new(key)
    }
}

// == Namespace ==
/// Key prefix shared by everything one repository writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefixes a raw key: `"{prefix}:{key}"`, or the key itself without a prefix.
    pub fn apply(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    /// Strips the prefix if present.
    pub fn strip<'k>(&self, key: &'k str) -> &'k str {
        if self.prefix.is_empty() {
            return key;
        }
        key.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key)
    }

    /// Resolves a [`CacheKey`] to the string that reaches the store.
    pub fn resolve(&self, key: &CacheKey<'_>) -> Result<String> {
        if key.as_str().is_empty() {
            return Err(CacheError::InvalidRequest(
                "Key cannot be empty".to_string(),
            ));
        }

        let resolved = if key.needs_prefix() {
            self.apply(key.as_str())
        } else {
            key.as_str().to_string()
        };

        if self.strip(&resolved).starts_with(RESERVED_KEY_SPACE) {
            return Err(CacheError::InvalidRequest(format!(
                "Keys starting with '{}' are reserved",
                RESERVED_KEY_SPACE
            )));
        }
        if resolved.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(resolved)
    }
}
