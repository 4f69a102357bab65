//! Rename-detection seam.

use tern_hash::ObjectId;

use crate::paths::PathTable;

/// Detects renames between the base and each side, rewriting path table
/// entries so content follows its new location.
///
/// Implementations may move a conflicted entry's version on side *i* from
/// one path to another and must update `pathnames[i]` accordingly; all
/// entry invariants (mask consistency, interned pathnames) must be
/// preserved. The return value reports whether the merge is still clean
/// after rename handling.
pub trait RenameDetector {
    fn detect_and_process(
        &self,
        paths: &mut PathTable,
        base: &ObjectId,
        side1: &ObjectId,
        side2: &ObjectId,
    ) -> bool;
}

/// The no-op detector.
///
/// Files are considered similar iff they have the same filename; by that
/// rule there are no renames, so the table is left untouched and the
/// merge stays clean. Merging without rename detection is degraded but
/// correct.
pub struct NoRenames;

impl RenameDetector for NoRenames {
    fn detect_and_process(
        &self,
        _paths: &mut PathTable,
        _base: &ObjectId,
        _side1: &ObjectId,
        _side2: &ObjectId,
    ) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_clean_and_changes_nothing() {
        let mut paths = PathTable::new();
        let oid = ObjectId::Sha1([1; 20]);
        assert!(NoRenames.detect_and_process(&mut paths, &oid, &oid, &oid));
        assert!(paths.is_empty());
    }
}
