use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::structural::EntityClass;
use crate::model::user::Actor;
use crate::tree::node::TreeNode;

/// Tag carried by every cached tree; invalidated on any group change.
pub const GROUPS_TAG: &str = "groups";

/// An undecorated forest as stored in a [TreeCache]. Shared read-only between
/// requests; decoration always works on a clone.
pub type CachedForest = Arc<Vec<TreeNode>>;

/// Key/value store for whole-class forests with tag based bulk invalidation.
/// Errors mean the store is unavailable; callers treat them as a miss.
#[async_trait]
pub trait TreeCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedForest>>;

    /// Stores `forest` under `key`, replacing any previous value atomically.
    async fn put(&self, key: &str, forest: CachedForest, tags: &[String]) -> Result<()>;

    /// Evicts every entry tagged with `tag`, returning how many were evicted.
    async fn invalidate_tag(&self, tag: &str) -> Result<usize>;
}

#[derive(Debug)]
struct CacheEntry {
    forest: CachedForest,
    tags: Vec<String>,
}

/// Process local [TreeCache].
///
/// Every mutation of a key happens while holding that key's shard lock in
/// `entries`, and `tag_index` is only locked inside it, so a put and an
/// invalidation of the same key never interleave. Each entry remembers its own
/// tags; evicting it unlinks the key from all of them and drops tags left empty.
#[derive(Debug, Default)]
pub struct InMemoryTreeCache {
    entries: DashMap<String, CacheEntry>,
    tag_index: DashMap<String, HashSet<String>>,
}

impl InMemoryTreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tags currently referencing at least one entry.
    pub fn tag_count(&self) -> usize {
        self.tag_index.len()
    }

    fn link(&self, tag: &str, key: &str) {
        self.tag_index
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());
    }

    fn unlink(&self, tag: &str, key: &str) {
        if let Some(mut keys) = self.tag_index.get_mut(tag) {
            keys.remove(key);
        }
        self.tag_index.remove_if(tag, |_, keys| keys.is_empty());
    }
}

#[async_trait]
impl TreeCache for InMemoryTreeCache {
    async fn get(&self, key: &str) -> Result<Option<CachedForest>> {
        Ok(self.entries.get(key).map(|entry| entry.forest.clone()))
    }

    async fn put(&self, key: &str, forest: CachedForest, tags: &[String]) -> Result<()> {
        let entry = CacheEntry {
            forest,
            tags: tags.to_vec(),
        };
        // tags are linked before the entry becomes visible
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                for tag in tags {
                    self.link(tag, key);
                }
                let previous = slot.insert(entry);
                for stale in previous.tags.iter().filter(|t| !tags.contains(t)) {
                    self.unlink(stale, key);
                }
            }
            Entry::Vacant(slot) => {
                for tag in tags {
                    self.link(tag, key);
                }
                slot.insert(entry);
            }
        }
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<usize> {
        let Some((_, keys)) = self.tag_index.remove(tag) else {
            return Ok(0);
        };
        let mut evicted = 0;
        for key in keys {
            if let Entry::Occupied(slot) = self.entries.entry(key) {
                for other in &slot.get().tags {
                    self.unlink(other, slot.key());
                }
                slot.remove();
                evicted += 1;
            }
        }
        debug!("Invalidated tag {tag}, evicted {evicted} cached trees");
        Ok(evicted)
    }
}

/// A cache that never stores anything, used when tree caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTreeCache;

#[async_trait]
impl TreeCache for NullTreeCache {
    async fn get(&self, _key: &str) -> Result<Option<CachedForest>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _forest: CachedForest, _tags: &[String]) -> Result<()> {
        Ok(())
    }

    async fn invalidate_tag(&self, _tag: &str) -> Result<usize> {
        Ok(0)
    }
}

/// Produces the identity string that namespaces cached trees per caller.
pub trait CacheKeyProvider: Send + Sync {
    fn cache_key(&self, actor: Option<&Actor>) -> String;
}

/// Users without own permission overrides share the entries of their group;
/// everyone else gets a per-user key that rotates with the permission version.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupCacheKeyProvider;

impl CacheKeyProvider for GroupCacheKeyProvider {
    fn cache_key(&self, actor: Option<&Actor>) -> String {
        match actor {
            None => "anonymous".to_string(),
            Some(actor) => match actor.user.group_id {
                Some(group_id) if actor.user.permissions.is_empty() => format!("group_{group_id}"),
                _ => format!(
                    "user_{}_v{}",
                    actor.user.id, actor.user.permissions_version
                ),
            },
        }
    }
}

/// Cache key of the whole-class forest of `class` for the caller `identity`.
pub fn tree_cache_key(class: EntityClass, identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(class.name().as_bytes());
    hasher.update(b"|");
    hasher.update(identity.as_bytes());
    format!("tree_{:x}", hasher.finalize())
}

/// Tags attached to the cached forest of `class` for `identity`.
pub fn tree_cache_tags(class: EntityClass, identity: &str) -> Vec<String> {
    vec![
        GROUPS_TAG.to_string(),
        class.tree_tag(),
        identity.to_string(),
    ]
}

/// The invalidation side channel. Whoever mutates structural entities, group
/// membership or user permissions calls into this; the tree generator itself
/// never invalidates.
#[derive(Clone)]
pub struct TreeCacheInvalidator {
    cache: Arc<dyn TreeCache>,
}

impl TreeCacheInvalidator {
    pub fn new(cache: Arc<dyn TreeCache>) -> Self {
        Self { cache }
    }

    pub async fn entity_changed(&self, class: EntityClass) -> Result<usize> {
        let evicted = self.cache.invalidate_tag(&class.tree_tag()).await?;
        info!("Entity of class {class} changed, evicted {evicted} cached trees");
        Ok(evicted)
    }

    pub async fn groups_changed(&self) -> Result<usize> {
        let evicted = self.cache.invalidate_tag(GROUPS_TAG).await?;
        info!("Groups changed, evicted {evicted} cached trees");
        Ok(evicted)
    }

    /// Evicts everything cached for a cache key that is no longer in use.
    pub async fn cache_key_rotated(&self, old_key: &str) -> Result<usize> {
        let evicted = self.cache.invalidate_tag(old_key).await?;
        info!("Cache key {old_key} rotated, evicted {evicted} cached trees");
        Ok(evicted)
    }
}
