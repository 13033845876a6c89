//! File sync engine: reconciles the on-disk file, the committed revision
//! history, and the pending draft.
//!
//! Each request is handled synchronously to completion; the only
//! loop-like behavior is the editor re-issuing `visit` on every page
//! load. Disk content is re-read immediately before every comparison or
//! write, and the recorded checksum on the revision store is the single
//! source of truth for "last known good".

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use versioned_store::{VersionId, VersionedStore};

use crate::checksum::{fingerprint, has_drifted};
use crate::draft::DraftStore;
use crate::error::{EngineError, Result};
use crate::fs::{FileSystem, FsError};
use crate::payload::{render_revisions_list, EditorPayload, SyntaxNotice};
use crate::revisions::{RevisionStore, SYSTEM_AUTHOR};
use crate::tracked::{FileKind, RootResolver, TrackedFile};
use crate::validator::SyntaxChecker;

/// Shown when a checker rejects content without its own message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Your changes contain errors, not saved.";

/// Per-request context, constructed once and passed explicitly. Replaces
/// the ambient request state a CMS would provide.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub tracked: TrackedFile,
    pub absolute_path: PathBuf,
    /// True when the editor was reached through a save-failure redirect;
    /// the pending draft survives only in that context.
    pub viewing_error: bool,
}

impl EditSession {
    pub fn new(tracked: TrackedFile, resolver: &dyn RootResolver, viewing_error: bool) -> Self {
        let absolute_path = resolver.resolve(&tracked);
        Self {
            tracked,
            absolute_path,
            viewing_error,
        }
    }
}

/// Result of an explicit save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Proposed content equals disk content; nothing touched.
    Unchanged,
    Saved {
        revision_id: VersionId,
        /// True when a baseline revision was first created from the
        /// pre-edit disk content.
        seeded: bool,
    },
    /// Recoverable: the draft holds the attempted content, history is
    /// untouched by this edit.
    ValidationFailed {
        line: Option<u32>,
        message: String,
    },
}

/// Result of a passive editor visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    Clean,
    /// The file changed outside the editor; the change was captured as a
    /// system revision and the user should be notified.
    DriftCaptured { revision_id: VersionId },
}

/// Kind-specific side effect after a restore write, e.g. a plugin
/// deactivate/reactivate cycle or a theme cache flush.
#[async_trait]
pub trait PostRestoreAction: Send + Sync {
    async fn after_restore(&self, tracked: &TrackedFile) -> std::result::Result<(), String>;
}

/// Registry mapping file kinds to their post-restore action. Kinds
/// without an entry get no side effect; new kinds register here without
/// engine changes.
#[derive(Default)]
pub struct RestoreHooks {
    actions: HashMap<FileKind, Arc<dyn PostRestoreAction>>,
}

impl RestoreHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: FileKind, action: Arc<dyn PostRestoreAction>) -> Self {
        self.actions.insert(kind, action);
        self
    }

    async fn run(&self, tracked: &TrackedFile) -> Result<()> {
        if let Some(action) = self.actions.get(&tracked.kind) {
            action
                .after_restore(tracked)
                .await
                .map_err(EngineError::Hook)?;
        }
        Ok(())
    }
}

pub struct FileSyncEngine<F: FileSystem> {
    fs: F,
    revisions: RevisionStore,
    drafts: DraftStore,
    checker: Box<dyn SyntaxChecker>,
    hooks: RestoreHooks,
}

impl<F: FileSystem> FileSyncEngine<F> {
    pub fn new(
        fs: F,
        store: Arc<dyn VersionedStore>,
        checker: Box<dyn SyntaxChecker>,
        hooks: RestoreHooks,
    ) -> Self {
        Self {
            fs,
            revisions: RevisionStore::new(store.clone()),
            drafts: DraftStore::new(store),
            checker,
            hooks,
        }
    }

    pub fn revisions(&self) -> &RevisionStore {
        &self.revisions
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    /// Explicit save of proposed content.
    ///
    /// An unreadable disk file aborts with `Io` and leaves every store
    /// untouched. On a first-ever save the pre-edit disk content is
    /// committed first, so the history's earliest entry is the real
    /// baseline rather than a synthetic empty file.
    pub async fn save(
        &self,
        session: &EditSession,
        proposed: &[u8],
        author: &str,
    ) -> Result<SaveOutcome> {
        let old = self.fs.read(&session.absolute_path).await?;

        if old == proposed {
            return Ok(SaveOutcome::Unchanged);
        }

        let seeded = if self.revisions.latest(&session.tracked).await?.is_none() {
            self.revisions
                .append(&session.tracked, &old, SYSTEM_AUTHOR)
                .await?;
            tracing::info!("Seeded history for {} from disk", session.tracked.title());
            true
        } else {
            false
        };

        if session.tracked.requires_syntax_check() {
            let verdict = self.checker.check(proposed).await;
            if !verdict.ok {
                self.drafts.save(&session.tracked, proposed).await?;
                let message = verdict
                    .message
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                tracing::info!(
                    "Rejected save of {}: {} (line {:?})",
                    session.tracked.title(),
                    message,
                    verdict.line
                );
                return Ok(SaveOutcome::ValidationFailed {
                    line: verdict.line,
                    message,
                });
            }
        }

        let revision = self.revisions.append(&session.tracked, proposed, author).await?;
        self.drafts.clear(&session.tracked).await?;
        Ok(SaveOutcome::Saved {
            revision_id: revision.id,
            seeded,
        })
    }

    /// Passive editor visit: drop any stale draft, then capture external
    /// changes made directly on disk since the last recorded revision.
    pub async fn visit(&self, session: &EditSession) -> Result<VisitOutcome> {
        if !session.viewing_error {
            self.drafts.clear(&session.tracked).await?;
        }

        let Some(recorded) = self.revisions.recorded_checksum(&session.tracked).await? else {
            // Never tracked; nothing to compare against.
            return Ok(VisitOutcome::Clean);
        };

        let disk = match self.fs.read(&session.absolute_path).await {
            Ok(disk) => disk,
            Err(e) => {
                // Inconclusive, not actionable from a background probe.
                tracing::debug!(
                    "Drift probe for {} skipped: {}",
                    session.tracked.title(),
                    e
                );
                return Ok(VisitOutcome::Clean);
            }
        };

        if !has_drifted(Some(&recorded), &disk) {
            return Ok(VisitOutcome::Clean);
        }

        let revision = self
            .revisions
            .append(&session.tracked, &disk, SYSTEM_AUTHOR)
            .await?;
        tracing::info!(
            "Captured out-of-band change to {} as revision {}",
            session.tracked.title(),
            revision.id.0
        );
        Ok(VisitOutcome::DriftCaptured {
            revision_id: revision.id,
        })
    }

    /// Write a past revision's content back to disk and run the kind's
    /// post-restore action. Permission failures surface; a silently
    /// dropped restore is unacceptable.
    pub async fn restore(&self, session: &EditSession, revision_id: VersionId) -> Result<()> {
        let content = self
            .revisions
            .restore_content(&session.tracked, revision_id)
            .await?;

        match self.fs.write(&session.absolute_path, &content).await {
            Ok(()) => {}
            Err(FsError::PermissionDenied(path)) => return Err(EngineError::Permission(path)),
            Err(e) => return Err(e.into()),
        }

        self.revisions
            .set_recorded_checksum(&session.tracked, &fingerprint(&content))
            .await?;

        self.hooks.run(&session.tracked).await?;
        tracing::info!(
            "Restored {} to revision {}",
            session.tracked.title(),
            revision_id.0
        );
        Ok(())
    }

    /// Build the JSON payload for one editor view.
    pub async fn editor_payload(
        &self,
        session: &EditSession,
        notice: Option<&SyntaxNotice>,
    ) -> Result<EditorPayload> {
        let history = self.revisions.history(&session.tracked).await?;
        let draft = self.drafts.load(&session.tracked).await?;
        Ok(EditorPayload {
            file_id: session.tracked.slug(),
            revision_count: history.len(),
            revisions_list_html: render_revisions_list(&history),
            draft_content: draft.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            error_line: notice.and_then(|n| n.line),
            error_message: notice.map(|n| n.message.clone()),
        })
    }

    /// Uninstall flow for one file.
    pub async fn forget_file(&self, tracked: &TrackedFile) -> Result<()> {
        self.revisions.delete_all(tracked).await
    }

    /// Uninstall flow for a whole package. Returns how many tracked files
    /// were dropped.
    pub async fn forget_package(&self, package: &str) -> Result<usize> {
        self.revisions.delete_all_for_package(package).await
    }
}
