//! Content-merge seam.
//!
//! When both sides changed a file and nothing else decides the outcome,
//! the engine hands the three versions to a [`ContentMerger`] if one is
//! configured. Without one, the engine runs degraded: side 1's version is
//! kept and the path stays conflicted.

use bstr::BStr;
use tern_odb::ObjectStore;

use crate::paths::Version;

/// Labels identifying the three inputs in user-facing conflict output.
#[derive(Debug, Clone, Copy)]
pub struct MergeLabels<'a> {
    pub ancestor: &'a str,
    pub branch1: &'a str,
    pub branch2: &'a str,
}

/// Three-way merge of one file's content.
pub trait ContentMerger {
    /// Merge `base`, `side1`, and `side2` versions of the file at `path`.
    ///
    /// `pathnames` holds the per-stage paths, which can differ from
    /// `path` when renames moved content. Returns the version to record
    /// and whether it merged cleanly. Conflicts are an outcome, not an
    /// error: an implementation that cannot merge returns a version
    /// carrying markers (or one side's content) and `false`.
    fn merge_content(
        &self,
        store: &dyn ObjectStore,
        path: &BStr,
        base: &Version,
        side1: &Version,
        side2: &Version,
        pathnames: [&BStr; 3],
        labels: &MergeLabels<'_>,
    ) -> (Version, bool);
}
