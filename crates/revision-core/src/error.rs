//! Error types for the sync engine.

use std::path::PathBuf;

use thiserror::Error;
use versioned_store::StoreError;

use crate::fs::FsError;

/// Hard failures of the engine. Validation failures are not errors; they
/// are an outcome variant carrying the draft recovery data.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Filesystem error: {0}")]
    Io(#[from] FsError),

    #[error("Write permission denied: {0}")]
    Permission(PathBuf),

    #[error("Revision not found")]
    RevisionNotFound,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Post-restore hook failed: {0}")]
    Hook(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
