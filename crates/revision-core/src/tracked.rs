//! Tracked file identity: which on-disk file a revision history belongs to.

use std::path::{Path, PathBuf};

/// Package kind a tracked file belongs to.
///
/// The kind decides where the file lives on disk and which post-restore
/// hook runs. New kinds register their own hook in `RestoreHooks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Theme,
    Plugin,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Theme => "theme",
            FileKind::Plugin => "plugin",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record for one file under revision management.
///
/// Identity is `(kind, package, relative_path)` and stays stable for the
/// lifetime of the file's history regardless of content changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedFile {
    pub kind: FileKind,
    pub package: String,
    pub relative_path: String,
}

impl TrackedFile {
    pub fn new(kind: FileKind, package: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            kind,
            package: package.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Human-readable title, `"Package: subfolder/file.ext"`.
    pub fn title(&self) -> String {
        format!("{}: {}", self.package, self.relative_path)
    }

    /// Stable storage key derived from the title.
    pub fn slug(&self) -> String {
        slugify(&self.title())
    }

    /// Only executable script files go through the syntax validator.
    pub fn requires_syntax_check(&self) -> bool {
        Path::new(&self.relative_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("php"))
    }
}

/// Lowercase, ascii-alphanumeric slug with single dashes.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Resolves a tracked file to its absolute on-disk location.
///
/// Kind-specific root lookup is platform territory; the core only needs
/// the resolved path.
pub trait RootResolver: Send + Sync {
    fn resolve(&self, file: &TrackedFile) -> PathBuf;
}

/// Resolver over fixed theme/plugin root directories.
///
/// Themes live in a per-package directory under the theme root; plugin
/// paths already carry their package directory.
pub struct DirRoots {
    pub theme_root: PathBuf,
    pub plugin_root: PathBuf,
}

impl RootResolver for DirRoots {
    fn resolve(&self, file: &TrackedFile) -> PathBuf {
        match file.kind {
            FileKind::Theme => self
                .theme_root
                .join(&file.package)
                .join(&file.relative_path),
            FileKind::Plugin => self.plugin_root.join(&file.relative_path),
        }
    }
}
