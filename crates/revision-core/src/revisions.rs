//! Revision store: append-only committed history per tracked file.
//!
//! Sits on top of the `VersionedStore` seam. The entity's `checksum`
//! metadata slot always carries the fingerprint of the most recent
//! revision; it is the single source of truth for drift detection.

use std::sync::Arc;

use versioned_store::{EntityId, VersionId, VersionRecord, VersionedStore};

use crate::checksum::fingerprint;
use crate::error::{EngineError, Result};
use crate::tracked::TrackedFile;

/// Author recorded on seed and drift-capture revisions.
pub const SYSTEM_AUTHOR: &str = "system";

const CHECKSUM_KEY: &str = "checksum";
const KIND_KEY: &str = "type";
const PACKAGE_KEY: &str = "package";
const FILE_KEY: &str = "file";

/// Immutable, ordered snapshot of a tracked file's content.
#[derive(Debug, Clone)]
pub struct Revision {
    pub id: VersionId,
    pub content: Vec<u8>,
    pub checksum: String,
    /// Unix seconds; strictly increasing within one file's history.
    pub created_at: u64,
    pub author: String,
}

impl From<VersionRecord> for Revision {
    fn from(record: VersionRecord) -> Self {
        let checksum = fingerprint(&record.content);
        Self {
            id: record.id,
            content: record.content,
            checksum,
            created_at: record.created_at,
            author: record.author,
        }
    }
}

/// Find the entity for a tracked file, creating it (with its identity
/// metadata) on first contact.
pub(crate) async fn ensure_entity(
    store: &dyn VersionedStore,
    tracked: &TrackedFile,
) -> Result<EntityId> {
    let slug = tracked.slug();
    if let Some(entity) = store.find_entity(&slug).await? {
        return Ok(entity);
    }
    let entity = store.create_entity(&slug, &tracked.title()).await?;
    store.set_meta(entity, KIND_KEY, Some(tracked.kind.as_str())).await?;
    store.set_meta(entity, PACKAGE_KEY, Some(&tracked.package)).await?;
    store.set_meta(entity, FILE_KEY, Some(&tracked.relative_path)).await?;
    Ok(entity)
}

pub struct RevisionStore {
    store: Arc<dyn VersionedStore>,
}

impl RevisionStore {
    pub fn new(store: Arc<dyn VersionedStore>) -> Self {
        Self { store }
    }

    /// Most recent revision, if any history exists.
    pub async fn latest(&self, tracked: &TrackedFile) -> Result<Option<Revision>> {
        let Some(entity) = self.store.find_entity(&tracked.slug()).await? else {
            return Ok(None);
        };
        let mut versions = self.store.versions(entity).await?;
        Ok(if versions.is_empty() {
            None
        } else {
            Some(versions.remove(0).into())
        })
    }

    /// Append a revision after the current latest, establishing the file's
    /// identity record on first use, and move the recorded checksum forward.
    pub async fn append(
        &self,
        tracked: &TrackedFile,
        content: &[u8],
        author: &str,
    ) -> Result<Revision> {
        let entity = ensure_entity(self.store.as_ref(), tracked).await?;
        let record = self.store.append_version(entity, content, author).await?;
        let checksum = fingerprint(content);
        self.store.set_meta(entity, CHECKSUM_KEY, Some(&checksum)).await?;
        tracing::debug!(
            "Appended revision {} for {} by {}",
            record.id.0,
            tracked.title(),
            author
        );
        Ok(record.into())
    }

    /// Full history, most-recent first.
    pub async fn history(&self, tracked: &TrackedFile) -> Result<Vec<Revision>> {
        let Some(entity) = self.store.find_entity(&tracked.slug()).await? else {
            return Ok(Vec::new());
        };
        let versions = self.store.versions(entity).await?;
        Ok(versions.into_iter().map(Revision::from).collect())
    }

    /// Content of one revision. `RevisionNotFound` if the id does not
    /// belong to this file.
    pub async fn restore_content(
        &self,
        tracked: &TrackedFile,
        revision_id: VersionId,
    ) -> Result<Vec<u8>> {
        let Some(entity) = self.store.find_entity(&tracked.slug()).await? else {
            return Err(EngineError::RevisionNotFound);
        };
        let record = self
            .store
            .version(entity, revision_id)
            .await?
            .ok_or(EngineError::RevisionNotFound)?;
        Ok(record.content)
    }

    /// Checksum of the most recent revision, as recorded on the entity.
    pub async fn recorded_checksum(&self, tracked: &TrackedFile) -> Result<Option<String>> {
        let Some(entity) = self.store.find_entity(&tracked.slug()).await? else {
            return Ok(None);
        };
        Ok(self.store.get_meta(entity, CHECKSUM_KEY).await?)
    }

    /// Overwrite the recorded checksum (restore path writes disk content
    /// that belongs to an older revision).
    pub async fn set_recorded_checksum(&self, tracked: &TrackedFile, checksum: &str) -> Result<()> {
        let entity = ensure_entity(self.store.as_ref(), tracked).await?;
        self.store.set_meta(entity, CHECKSUM_KEY, Some(checksum)).await?;
        Ok(())
    }

    /// Drop the file's identity, all revisions, and any draft. No-op when
    /// the file was never tracked.
    pub async fn delete_all(&self, tracked: &TrackedFile) -> Result<()> {
        if let Some(entity) = self.store.find_entity(&tracked.slug()).await? {
            self.store.delete_entity(entity).await?;
            tracing::info!("Dropped revision history for {}", tracked.title());
        }
        Ok(())
    }

    /// Uninstall flow: drop every tracked file belonging to a package.
    pub async fn delete_all_for_package(&self, package: &str) -> Result<usize> {
        let mut dropped = 0;
        for entity in self.store.entities().await? {
            if self.store.get_meta(entity, PACKAGE_KEY).await?.as_deref() == Some(package) {
                self.store.delete_entity(entity).await?;
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::info!("Dropped revision history for {} files of {}", dropped, package);
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracked::FileKind;
    use versioned_store::InMemoryStore;

    fn plugin_file() -> TrackedFile {
        TrackedFile::new(FileKind::Plugin, "hello/hello.php", "hello/hello.php")
    }

    fn theme_file() -> TrackedFile {
        TrackedFile::new(FileKind::Theme, "twentythirteen", "style.css")
    }

    fn store() -> RevisionStore {
        RevisionStore::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_append_establishes_identity_and_checksum() {
        let revisions = store();
        let tracked = plugin_file();

        assert!(revisions.latest(&tracked).await.unwrap().is_none());

        let revision = revisions.append(&tracked, b"<?php // v1", "alice").await.unwrap();
        assert_eq!(revision.checksum, fingerprint(b"<?php // v1"));

        let recorded = revisions.recorded_checksum(&tracked).await.unwrap();
        assert_eq!(recorded, Some(revision.checksum.clone()));
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let revisions = store();
        let tracked = plugin_file();

        revisions.append(&tracked, b"v1", SYSTEM_AUTHOR).await.unwrap();
        revisions.append(&tracked, b"v2", "alice").await.unwrap();

        let history = revisions.history(&tracked).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, b"v2");
        assert_eq!(history[1].content, b"v1");
        assert!(history[0].created_at > history[1].created_at);
    }

    #[tokio::test]
    async fn test_recorded_checksum_tracks_latest_append() {
        let revisions = store();
        let tracked = plugin_file();

        revisions.append(&tracked, b"seed", SYSTEM_AUTHOR).await.unwrap();
        revisions.append(&tracked, b"edit", "alice").await.unwrap();

        // Always the newest revision's fingerprint, never the seed's.
        let recorded = revisions.recorded_checksum(&tracked).await.unwrap();
        assert_eq!(recorded, Some(fingerprint(b"edit")));
    }

    #[tokio::test]
    async fn test_restore_content_by_id() {
        let revisions = store();
        let tracked = plugin_file();

        let first = revisions.append(&tracked, b"v1", "alice").await.unwrap();
        revisions.append(&tracked, b"v2", "alice").await.unwrap();

        let content = revisions.restore_content(&tracked, first.id).await.unwrap();
        assert_eq!(content, b"v1");
    }

    #[tokio::test]
    async fn test_restore_foreign_revision_not_found() {
        let revisions = store();

        let plugin_rev = revisions.append(&plugin_file(), b"v1", "alice").await.unwrap();
        revisions.append(&theme_file(), b"body {}", "alice").await.unwrap();

        // A revision id from another file never resolves.
        let result = revisions.restore_content(&theme_file(), plugin_rev.id).await;
        assert!(matches!(result, Err(EngineError::RevisionNotFound)));

        let result = revisions.restore_content(&plugin_file(), VersionId(9999)).await;
        assert!(matches!(result, Err(EngineError::RevisionNotFound)));
    }

    #[tokio::test]
    async fn test_delete_all_is_noop_for_untracked() {
        let revisions = store();
        revisions.delete_all(&plugin_file()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all_for_package() {
        let backing = Arc::new(InMemoryStore::new());
        let revisions = RevisionStore::new(backing.clone());

        let a = TrackedFile::new(FileKind::Plugin, "hello/hello.php", "hello/hello.php");
        let b = TrackedFile::new(FileKind::Plugin, "hello/hello.php", "hello/readme.txt");
        let other = theme_file();

        revisions.append(&a, b"a", "alice").await.unwrap();
        revisions.append(&b, b"b", "alice").await.unwrap();
        revisions.append(&other, b"c", "alice").await.unwrap();

        let dropped = revisions.delete_all_for_package("hello/hello.php").await.unwrap();
        assert_eq!(dropped, 2);

        assert!(revisions.history(&a).await.unwrap().is_empty());
        assert!(revisions.history(&b).await.unwrap().is_empty());
        assert_eq!(revisions.history(&other).await.unwrap().len(), 1);
    }
}
