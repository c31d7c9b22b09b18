//! Tag Index
//!
//! Maps tag names to the prepared keys stored under them, and each key back to
//! its tags. Both directions live in the store itself under derived keys in the
//! reserved `__tags:` key space, so the index works on backends without native
//! secondary indexes and never collides with user keys.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use crate::cache::{Namespace, Store, MAX_KEY_LENGTH, RESERVED_KEY_SPACE};
use crate::error::{CacheError, Result};

// == Tag Index ==
#[derive(Clone)]
pub struct TagIndex {
    store: Arc<dyn Store>,
    namespace: Namespace,
}

impl TagIndex {
    pub fn new(store: Arc<dyn Store>, namespace: Namespace) -> Self {
        Self { store, namespace }
    }

    /// Store key holding the members of `tag`.
    pub fn tag_set_key(&self, tag: &str) -> String {
        self.namespace
            .apply(&format!("{}tag:{}:keys", RESERVED_KEY_SPACE, tag))
    }

    /// Store key holding the tags of a prepared key. The key is kept whole,
    /// so keys from different namespaces never share a set.
    pub fn key_tags_key(&self, key: &str) -> String {
        self.namespace
            .apply(&format!("{}key:{}", RESERVED_KEY_SPACE, key))
    }

    /// Rejects tags whose bookkeeping keys the store could not hold.
    ///
    /// Runs before the value is written, so a bad tag never leaves a value
    /// without its index entries.
    pub fn check(&self, key: &str, tags: &[&str]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        if tags.iter().any(|tag| tag.is_empty()) {
            return Err(CacheError::InvalidRequest("Tag cannot be empty".to_string()));
        }

        let longest = tags
            .iter()
            .map(|tag| self.tag_set_key(tag))
            .chain(std::iter::once(self.key_tags_key(key)))
            .max_by_key(String::len)
            .unwrap_or_default();
        if longest.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Tag bookkeeping key '{}' exceeds maximum length of {} bytes",
                longest, MAX_KEY_LENGTH
            )));
        }
        Ok(())
    }

    // == Attach ==
    /// Records `key` under every tag. Repeating the call changes nothing.
    pub fn attach_key_to_tags(&self, key: &str, tags: &[&str]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let member = [key.to_string()];
        for tag in tags {
            self.store.set_add(&self.tag_set_key(tag), &member)?;
        }

        let names: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.store.set_add(&self.key_tags_key(key), &names)
    }

    // == Remove Tag ==
    /// Detaches and returns every key that was under `tag`.
    ///
    /// The caller deletes the returned keys from the store.
    pub fn remove_tag(&self, tag: &str) -> Result<BTreeSet<String>> {
        let keys = self.store.set_take(&self.tag_set_key(tag))?;

        let tag_name = [tag.to_string()];
        for key in &keys {
            if let Err(err) = self.store.set_remove(&self.key_tags_key(key), &tag_name) {
                warn!(tag, key = %key, error = %err, "failed to drop tag from reverse index");
            }
        }
        Ok(keys)
    }

    pub fn tags_for_key(&self, key: &str) -> Result<BTreeSet<String>> {
        self.store.set_members(&self.key_tags_key(key))
    }

    pub fn keys_for_tag(&self, tag: &str) -> Result<BTreeSet<String>> {
        self.store.set_members(&self.tag_set_key(tag))
    }

    /// Removes a key from all of its tags. Returns the tags it was under.
    pub fn detach_key(&self, key: &str) -> Result<BTreeSet<String>> {
        let tags = self.store.set_take(&self.key_tags_key(key))?;

        let member = [key.to_string()];
        for tag in &tags {
            self.store.set_remove(&self.tag_set_key(tag), &member)?;
        }
        Ok(tags)
    }

    /// Drops `stale` keys from `tag` without touching their values.
    pub fn prune(&self, tag: &str, stale: &[String]) -> Result<()> {
        if stale.is_empty() {
            return Ok(());
        }
        self.store.set_remove(&self.tag_set_key(tag), stale)
    }
}
