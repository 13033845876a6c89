//! revision-core: Revision history and syntax validation for file-based
//! code editors.
//!
//! The crate reconciles three loosely-synchronized copies of a file's
//! content: the on-disk file, the committed revision history, and the
//! pending draft kept when a save fails validation. It provides:
//! - Content fingerprints and drift detection
//! - Syntax validation (interpreter lint with a lexical-scan fallback)
//! - Draft and revision stores over a `VersionedStore` backend
//! - The `FileSyncEngine` orchestrating save / visit / restore requests
//! - `FileSystem` and `RootResolver` trait abstractions

pub mod checksum;
pub mod draft;
pub mod engine;
pub mod error;
pub mod fs;
pub mod payload;
pub mod revisions;
pub mod tracked;
pub mod validator;

pub use draft::DraftStore;
pub use engine::{
    EditSession, FileSyncEngine, PostRestoreAction, RestoreHooks, SaveOutcome, VisitOutcome,
    DEFAULT_FAILURE_MESSAGE,
};
pub use error::EngineError;
pub use fs::{FileSystem, FsError, InMemoryFs, NativeFs};
pub use payload::{save_failure_redirect, EditorPayload, SyntaxNotice};
pub use revisions::{Revision, RevisionStore, SYSTEM_AUTHOR};
pub use tracked::{DirRoots, FileKind, RootResolver, TrackedFile};
pub use validator::{
    select_checker, PhpLintChecker, ScanChecker, SyntaxChecker, ValidationResult, LINT_TIMEOUT,
};
