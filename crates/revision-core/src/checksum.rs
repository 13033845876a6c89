//! Content fingerprints for drift detection.

use sha2::{Digest, Sha256};

/// Deterministic content hash (SHA-256 hex). Pure function.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// True iff the disk content no longer matches the recorded checksum,
/// or no checksum was ever recorded.
///
/// Callers must resolve unreadable files before calling this; a read
/// failure is a distinct outcome, never silently equal.
pub fn has_drifted(recorded: Option<&str>, disk_content: &[u8]) -> bool {
    match recorded {
        Some(recorded) => fingerprint(disk_content) != recorded,
        None => true,
    }
}
