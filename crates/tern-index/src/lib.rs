//! The staging area between working tree and object store.
//!
//! Entries are kept sorted by the cache-name comparator: byte-wise by path,
//! then by stage. Besides ordinary sorted access, the index supports the
//! bulk pattern merge-conflict recording relies on: append new entries
//! unordered at the end, mark stale ones for removal, then sweep and
//! re-sort once at the end.

mod cache_tree;
mod entry;

use std::cmp::Ordering;

use bstr::{BStr, ByteSlice};

pub use cache_tree::{CacheTree, CacheTreeNode};
pub use entry::{EntryFlags, IndexEntry};

/// Errors produced by index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid stage: {0}")]
    InvalidStage(u8),
}

/// Merge stage of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Resolved entry (stage 0).
    Normal,
    /// Common ancestor version in a conflict (stage 1).
    Base,
    /// Our version in a conflict (stage 2).
    Ours,
    /// Their version in a conflict (stage 3).
    Theirs,
}

impl Stage {
    pub fn as_u8(&self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u8(n: u8) -> Result<Self, IndexError> {
        match n {
            0 => Ok(Stage::Normal),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(IndexError::InvalidStage(n)),
        }
    }
}

/// Cache-name comparison: path bytes first, stage breaks ties.
pub fn cmp_cache_name(a: &IndexEntry, b: &IndexEntry) -> Ordering {
    a.path
        .as_bstr()
        .cmp(b.path.as_bstr())
        .then(a.stage.cmp(&b.stage))
}

/// The in-memory index.
#[derive(Debug, Default)]
pub struct Index {
    /// Entries sorted by [`cmp_cache_name`], except while a bulk update is
    /// in flight (unordered appends past the pre-update length).
    entries: Vec<IndexEntry>,
    /// Cached tree ids, invalidated as entries change.
    cache_tree: Option<CacheTree>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (all stages).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by path and stage.
    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.path.as_bstr() == path && e.stage == stage)
    }

    /// The entry at a position in the current order.
    pub fn entry_at(&self, pos: usize) -> &IndexEntry {
        &self.entries[pos]
    }

    /// Mutable access to the entry at a position.
    pub fn entry_at_mut(&mut self, pos: usize) -> &mut IndexEntry {
        &mut self.entries[pos]
    }

    /// Add or replace an entry, maintaining sort order.
    pub fn add(&mut self, entry: IndexEntry) {
        self.entries
            .retain(|e| !(e.path == entry.path && e.stage == entry.stage));
        if let Some(tree) = &mut self.cache_tree {
            tree.invalidate(entry.path.as_bstr());
        }
        let pos = self
            .entries
            .binary_search_by(|e| cmp_cache_name(e, &entry))
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
    }

    /// Remove entries matching path and stage. Returns true if any were
    /// removed.
    pub fn remove(&mut self, path: &BStr, stage: Stage) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.path.as_bstr() == path && e.stage == stage));
        let removed = self.entries.len() < before;
        if removed {
            if let Some(tree) = &mut self.cache_tree {
                tree.invalidate(path);
            }
        }
        removed
    }

    /// Binary-search for the stage-0 entry of `path`, looking only at the
    /// first `limit` entries. Bulk updates append unordered entries past
    /// the original length; bounding the search keeps it sound.
    pub fn find_stage0(&self, path: &BStr, limit: usize) -> Option<usize> {
        let bounded = &self.entries[..limit.min(self.entries.len())];
        bounded
            .binary_search_by(|e| {
                e.path
                    .as_bstr()
                    .cmp(path)
                    .then(e.stage.cmp(&Stage::Normal))
            })
            .ok()
    }

    /// Append an entry at the end, ignoring sort order. Callers must
    /// finish the bulk update with [`sort_entries`](Self::sort_entries).
    pub fn push_unordered(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    /// Flag the entry at `pos` for removal by
    /// [`remove_marked`](Self::remove_marked).
    pub fn mark_removed(&mut self, pos: usize) {
        self.entries[pos].flags.remove = true;
    }

    /// Drop every entry flagged for removal, invalidating covering cached
    /// trees.
    pub fn remove_marked(&mut self) {
        if let Some(tree) = &mut self.cache_tree {
            for e in self.entries.iter().filter(|e| e.flags.remove) {
                tree.invalidate(e.path.as_bstr());
            }
        }
        self.entries.retain(|e| !e.flags.remove);
    }

    /// Restore the cache-name sort order after unordered appends.
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(cmp_cache_name);
    }

    /// Whether the path has conflict stages (1, 2, or 3).
    pub fn has_conflicts(&self, path: &BStr) -> bool {
        self.entries
            .iter()
            .any(|e| e.path.as_bstr() == path && e.stage != Stage::Normal)
    }

    /// All paths that currently carry conflict stages, deduplicated.
    pub fn conflicted_paths(&self) -> Vec<&BStr> {
        let mut paths: Vec<&BStr> = self
            .entries
            .iter()
            .filter(|e| e.stage != Stage::Normal)
            .map(|e| e.path.as_bstr())
            .collect();
        paths.dedup();
        paths
    }

    /// Iterate entries in the current order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// The cache tree, if one is attached.
    pub fn cache_tree(&self) -> Option<&CacheTree> {
        self.cache_tree.as_ref()
    }

    /// Attach or replace the cache tree.
    pub fn set_cache_tree(&mut self, tree: Option<CacheTree>) {
        self.cache_tree = tree;
    }

    /// Invalidate any cached tree covering `path`.
    pub fn invalidate_cache_tree(&mut self, path: &BStr) {
        if let Some(tree) = &mut self.cache_tree {
            tree.invalidate(path);
        }
    }
}
