//! versioned-store: Append-only versioned entity storage.
//!
//! This crate defines the persistence seam the revision engine depends on:
//! entities identified by a stable slug, an append-only sequence of content
//! versions per entity, and arbitrary scalar metadata slots per entity.
//!
//! Implementations:
//! - `InMemoryStore` - reference implementation, also used in tests
//!
//! Backends wrapping a database or a CMS post/revision facility implement
//! the same trait.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error("Version not found: {0}")]
    VersionNotFound(u64),

    #[error("Store error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Opaque entity handle, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// Opaque version handle, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionId(pub u64);

/// One immutable content snapshot of an entity.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    pub id: VersionId,
    pub content: Vec<u8>,
    /// Unix seconds. Strictly increasing within one entity.
    pub created_at: u64,
    pub author: String,
}

/// Append-only versioned entity storage with per-entity metadata slots.
///
/// Versions are immutable once appended. `created_at` timestamps within an
/// entity are strictly monotonic: a version appended in the same wall-clock
/// second as its predecessor is stamped one second later, so any two
/// versions are distinguishable when restoring by timestamp.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Create a new entity under a unique slug.
    async fn create_entity(&self, slug: &str, title: &str) -> Result<EntityId>;

    /// Look up an entity by slug.
    async fn find_entity(&self, slug: &str) -> Result<Option<EntityId>>;

    /// Human-readable title recorded at creation.
    async fn title(&self, entity: EntityId) -> Result<String>;

    /// Append a new version after the current latest.
    async fn append_version(
        &self,
        entity: EntityId,
        content: &[u8],
        author: &str,
    ) -> Result<VersionRecord>;

    /// All versions of an entity, most-recent first.
    async fn versions(&self, entity: EntityId) -> Result<Vec<VersionRecord>>;

    /// Fetch a single version. `Ok(None)` if the id does not belong to the entity.
    async fn version(&self, entity: EntityId, id: VersionId) -> Result<Option<VersionRecord>>;

    /// Set (`Some`) or remove (`None`) a scalar metadata slot.
    async fn set_meta(&self, entity: EntityId, key: &str, value: Option<&str>) -> Result<()>;

    /// Read a scalar metadata slot.
    async fn get_meta(&self, entity: EntityId, key: &str) -> Result<Option<String>>;

    /// Delete an entity together with all its versions and metadata.
    async fn delete_entity(&self, entity: EntityId) -> Result<()>;

    /// All entities currently in the store.
    async fn entities(&self) -> Result<Vec<EntityId>>;
}

// Implement VersionedStore for Arc<T> where T: VersionedStore.
// This allows sharing one store between the revision and draft layers.
#[async_trait]
impl<T: VersionedStore + Send + Sync> VersionedStore for std::sync::Arc<T> {
    async fn create_entity(&self, slug: &str, title: &str) -> Result<EntityId> {
        (**self).create_entity(slug, title).await
    }

    async fn find_entity(&self, slug: &str) -> Result<Option<EntityId>> {
        (**self).find_entity(slug).await
    }

    async fn title(&self, entity: EntityId) -> Result<String> {
        (**self).title(entity).await
    }

    async fn append_version(
        &self,
        entity: EntityId,
        content: &[u8],
        author: &str,
    ) -> Result<VersionRecord> {
        (**self).append_version(entity, content, author).await
    }

    async fn versions(&self, entity: EntityId) -> Result<Vec<VersionRecord>> {
        (**self).versions(entity).await
    }

    async fn version(&self, entity: EntityId, id: VersionId) -> Result<Option<VersionRecord>> {
        (**self).version(entity, id).await
    }

    async fn set_meta(&self, entity: EntityId, key: &str, value: Option<&str>) -> Result<()> {
        (**self).set_meta(entity, key, value).await
    }

    async fn get_meta(&self, entity: EntityId, key: &str) -> Result<Option<String>> {
        (**self).get_meta(entity, key).await
    }

    async fn delete_entity(&self, entity: EntityId) -> Result<()> {
        (**self).delete_entity(entity).await
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        (**self).entities().await
    }
}

struct EntityRecord {
    slug: String,
    title: String,
    versions: Vec<VersionRecord>,
    meta: HashMap<String, String>,
}

struct Inner {
    next_entity: u64,
    next_version: u64,
    entities: HashMap<u64, EntityRecord>,
    slugs: HashMap<String, u64>,
}

/// In-memory store for tests and single-process use.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_entity: 1,
                next_version: 1,
                entities: HashMap::new(),
                slugs: HashMap::new(),
            }),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionedStore for InMemoryStore {
    async fn create_entity(&self, slug: &str, title: &str) -> Result<EntityId> {
        let mut inner = self.inner.write().unwrap();
        if inner.slugs.contains_key(slug) {
            return Err(StoreError::AlreadyExists(slug.to_string()));
        }
        let id = inner.next_entity;
        inner.next_entity += 1;
        inner.entities.insert(
            id,
            EntityRecord {
                slug: slug.to_string(),
                title: title.to_string(),
                versions: Vec::new(),
                meta: HashMap::new(),
            },
        );
        inner.slugs.insert(slug.to_string(), id);
        tracing::debug!("Created entity {} for slug {}", id, slug);
        Ok(EntityId(id))
    }

    async fn find_entity(&self, slug: &str) -> Result<Option<EntityId>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.slugs.get(slug).copied().map(EntityId))
    }

    async fn title(&self, entity: EntityId) -> Result<String> {
        let inner = self.inner.read().unwrap();
        let record = inner
            .entities
            .get(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;
        Ok(record.title.clone())
    }

    async fn append_version(
        &self,
        entity: EntityId,
        content: &[u8],
        author: &str,
    ) -> Result<VersionRecord> {
        let mut inner = self.inner.write().unwrap();
        let version_id = inner.next_version;
        inner.next_version += 1;

        let record = inner
            .entities
            .get_mut(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;

        // Strictly monotonic timestamps within an entity.
        let floor = record.versions.last().map(|v| v.created_at + 1).unwrap_or(0);
        let created_at = Self::now_secs().max(floor);

        let version = VersionRecord {
            id: VersionId(version_id),
            content: content.to_vec(),
            created_at,
            author: author.to_string(),
        };
        record.versions.push(version.clone());
        Ok(version)
    }

    async fn versions(&self, entity: EntityId) -> Result<Vec<VersionRecord>> {
        let inner = self.inner.read().unwrap();
        let record = inner
            .entities
            .get(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;
        let mut versions = record.versions.clone();
        versions.reverse();
        Ok(versions)
    }

    async fn version(&self, entity: EntityId, id: VersionId) -> Result<Option<VersionRecord>> {
        let inner = self.inner.read().unwrap();
        let record = inner
            .entities
            .get(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;
        Ok(record.versions.iter().find(|v| v.id == id).cloned())
    }

    async fn set_meta(&self, entity: EntityId, key: &str, value: Option<&str>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .entities
            .get_mut(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;
        match value {
            Some(value) => {
                record.meta.insert(key.to_string(), value.to_string());
            }
            None => {
                record.meta.remove(key);
            }
        }
        Ok(())
    }

    async fn get_meta(&self, entity: EntityId, key: &str) -> Result<Option<String>> {
        let inner = self.inner.read().unwrap();
        let record = inner
            .entities
            .get(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;
        Ok(record.meta.get(key).cloned())
    }

    async fn delete_entity(&self, entity: EntityId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .entities
            .remove(&entity.0)
            .ok_or_else(|| StoreError::NotFound(format!("#{}", entity.0)))?;
        inner.slugs.remove(&record.slug);
        tracing::debug!("Deleted entity {} ({})", entity.0, record.slug);
        Ok(())
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        let inner = self.inner.read().unwrap();
        let mut ids: Vec<u64> = inner.entities.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(EntityId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_entity() {
        let store = InMemoryStore::new();

        let id = store.create_entity("theme-style-css", "Theme: style.css").await.unwrap();
        assert_eq!(store.find_entity("theme-style-css").await.unwrap(), Some(id));
        assert_eq!(store.title(id).await.unwrap(), "Theme: style.css");
        assert_eq!(store.find_entity("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let store = InMemoryStore::new();

        store.create_entity("dup", "Dup").await.unwrap();
        let result = store.create_entity("dup", "Dup").await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_versions_are_ordered_most_recent_first() {
        let store = InMemoryStore::new();
        let id = store.create_entity("file", "File").await.unwrap();

        store.append_version(id, b"one", "alice").await.unwrap();
        store.append_version(id, b"two", "alice").await.unwrap();
        store.append_version(id, b"three", "bob").await.unwrap();

        let versions = store.versions(id).await.unwrap();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].content, b"three");
        assert_eq!(versions[2].content, b"one");
        assert!(versions[0].created_at > versions[2].created_at);
    }

    #[tokio::test]
    async fn test_timestamps_are_strictly_monotonic() {
        let store = InMemoryStore::new();
        let id = store.create_entity("file", "File").await.unwrap();

        // Appended within the same wall-clock second.
        let first = store.append_version(id, b"a", "system").await.unwrap();
        let second = store.append_version(id, b"b", "user").await.unwrap();

        assert!(second.created_at > first.created_at);
    }

    #[tokio::test]
    async fn test_version_lookup_scoped_to_entity() {
        let store = InMemoryStore::new();
        let a = store.create_entity("a", "A").await.unwrap();
        let b = store.create_entity("b", "B").await.unwrap();

        let v = store.append_version(a, b"content", "alice").await.unwrap();

        assert!(store.version(a, v.id).await.unwrap().is_some());
        // A foreign version id does not resolve on another entity.
        assert!(store.version(b, v.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_meta_set_get_remove() {
        let store = InMemoryStore::new();
        let id = store.create_entity("file", "File").await.unwrap();

        assert_eq!(store.get_meta(id, "checksum").await.unwrap(), None);

        store.set_meta(id, "checksum", Some("abc")).await.unwrap();
        assert_eq!(store.get_meta(id, "checksum").await.unwrap(), Some("abc".into()));

        store.set_meta(id, "checksum", Some("def")).await.unwrap();
        assert_eq!(store.get_meta(id, "checksum").await.unwrap(), Some("def".into()));

        store.set_meta(id, "checksum", None).await.unwrap();
        assert_eq!(store.get_meta(id, "checksum").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_entity_removes_everything() {
        let store = InMemoryStore::new();
        let id = store.create_entity("file", "File").await.unwrap();
        store.append_version(id, b"content", "alice").await.unwrap();
        store.set_meta(id, "draft", Some("pending")).await.unwrap();

        store.delete_entity(id).await.unwrap();

        assert_eq!(store.find_entity("file").await.unwrap(), None);
        assert!(matches!(store.versions(id).await, Err(StoreError::NotFound(_))));
        // Slug is reusable after deletion.
        store.create_entity("file", "File").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_entity_errors() {
        let store = InMemoryStore::new();
        let ghost = EntityId(42);

        assert!(matches!(
            store.append_version(ghost, b"x", "a").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.get_meta(ghost, "k").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.title(ghost).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_entity(ghost).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_entities_lists_all() {
        let store = InMemoryStore::new();
        let a = store.create_entity("a", "A").await.unwrap();
        let b = store.create_entity("b", "B").await.unwrap();

        let all = store.entities().await.unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[tokio::test]
    async fn test_arc_passthrough() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let id = store.create_entity("shared", "Shared").await.unwrap();

        let clone = std::sync::Arc::clone(&store);
        clone.append_version(id, b"via clone", "alice").await.unwrap();

        assert_eq!(store.versions(id).await.unwrap().len(), 1);
    }
}
