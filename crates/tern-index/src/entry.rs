//! Index entry types.

use bstr::BString;
use tern_hash::ObjectId;
use tern_object::FileMode;

use crate::Stage;

/// A single entry in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root.
    pub path: BString,
    /// Id of the entry's content.
    pub oid: ObjectId,
    /// File mode.
    pub mode: FileMode,
    /// Merge stage (0 = resolved, 1/2/3 = base/ours/theirs).
    pub stage: Stage,
    /// Entry flags.
    pub flags: EntryFlags,
}

/// Per-entry flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    /// The entry should not be materialized in the working tree.
    pub skip_worktree: bool,
    /// Transient mark used during bulk updates; swept by
    /// [`Index::remove_marked`](crate::Index::remove_marked).
    pub remove: bool,
}
