//! Draft store: the single pending unvalidated edit per tracked file.
//!
//! A draft only exists between a failed save and the next visit. It lives
//! in the entity's `draft` metadata slot, so it dies with the entity and
//! can never outnumber it.

use std::sync::Arc;

use versioned_store::VersionedStore;

use crate::error::Result;
use crate::revisions::ensure_entity;
use crate::tracked::TrackedFile;

const DRAFT_KEY: &str = "draft";

pub struct DraftStore {
    store: Arc<dyn VersionedStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn VersionedStore>) -> Self {
        Self { store }
    }

    /// Replace any existing draft for the file.
    pub async fn save(&self, tracked: &TrackedFile, content: &[u8]) -> Result<()> {
        let entity = ensure_entity(self.store.as_ref(), tracked).await?;
        let text = String::from_utf8_lossy(content);
        self.store.set_meta(entity, DRAFT_KEY, Some(&text)).await?;
        tracing::debug!("Saved draft for {}", tracked.title());
        Ok(())
    }

    pub async fn load(&self, tracked: &TrackedFile) -> Result<Option<Vec<u8>>> {
        let Some(entity) = self.store.find_entity(&tracked.slug()).await? else {
            return Ok(None);
        };
        let draft = self.store.get_meta(entity, DRAFT_KEY).await?;
        Ok(draft.map(String::into_bytes))
    }

    /// Idempotent; clearing a nonexistent draft is not an error.
    pub async fn clear(&self, tracked: &TrackedFile) -> Result<()> {
        let Some(entity) = self.store.find_entity(&tracked.slug()).await? else {
            return Ok(());
        };
        self.store.set_meta(entity, DRAFT_KEY, None).await?;
        Ok(())
    }
}
