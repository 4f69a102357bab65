//! Shared helpers: building objects in a memory store and a minimal
//! checkout emulation for switch tests.
#![allow(dead_code)]

use bstr::{BStr, BString};
use tern_hash::{HashAlgorithm, ObjectId};
use tern_index::{EntryFlags, Index, IndexEntry, Stage};
use tern_merge::{MergeError, WorktreeUpdater};
use tern_object::{Commit, FileMode, ObjectType, Tree, TreeEntry};
use tern_odb::{MemoryStore, ObjectStore};

pub fn store() -> MemoryStore {
    MemoryStore::new(HashAlgorithm::Sha1)
}

pub fn blob(store: &MemoryStore, content: &[u8]) -> ObjectId {
    store.write_object(ObjectType::Blob, content).unwrap()
}

/// Write a single-level tree from `(name, mode, oid)` triples.
pub fn tree(store: &MemoryStore, entries: &[(&str, FileMode, ObjectId)]) -> ObjectId {
    let tree = Tree {
        entries: entries
            .iter()
            .map(|(name, mode, oid)| TreeEntry {
                mode: *mode,
                name: BString::from(*name),
                oid: *oid,
            })
            .collect(),
    };
    store
        .write_object(ObjectType::Tree, &tree.serialize_content())
        .unwrap()
}

pub fn commit(store: &MemoryStore, tree: ObjectId, parents: &[ObjectId]) -> ObjectId {
    let commit = Commit::new(tree, parents.to_vec(), "x\n");
    store
        .write_object(ObjectType::Commit, &commit.serialize_content())
        .unwrap()
}

/// The file entries of a tree, flattened to `(path, mode, oid)`.
pub fn flatten(store: &MemoryStore, tree_oid: &ObjectId) -> Vec<(String, FileMode, ObjectId)> {
    let mut out = Vec::new();
    flatten_into(store, tree_oid, String::new(), &mut out);
    out
}

fn flatten_into(
    store: &MemoryStore,
    tree_oid: &ObjectId,
    prefix: String,
    out: &mut Vec<(String, FileMode, ObjectId)>,
) {
    let tree = store.parse_tree(tree_oid).unwrap();
    for entry in tree.iter() {
        let path = if prefix.is_empty() {
            entry.name.to_string()
        } else {
            format!("{}/{}", prefix, entry.name)
        };
        if entry.mode.is_tree() {
            flatten_into(store, &entry.oid, path, out);
        } else {
            out.push((path, entry.mode, entry.oid));
        }
    }
}

/// Checkout emulation: after a switch the index mirrors the target tree's
/// stage-0 entries. Good enough to exercise conflict-stage reconciliation.
pub struct TestWorktree<'a> {
    pub store: &'a MemoryStore,
}

impl WorktreeUpdater for TestWorktree<'_> {
    fn checkout(
        &mut self,
        index: &mut Index,
        _head: &ObjectId,
        target: &ObjectId,
    ) -> Result<(), MergeError> {
        // Drop stage-0 entries the target no longer has, then mirror it.
        let target_paths: Vec<String> = flatten(self.store, target)
            .into_iter()
            .map(|(path, _, _)| path)
            .collect();
        let stale: Vec<BString> = index
            .iter()
            .filter(|e| {
                e.stage == Stage::Normal && !target_paths.contains(&e.path.to_string())
            })
            .map(|e| e.path.clone())
            .collect();
        for path in stale {
            index.remove(BStr::new(path.as_slice()), Stage::Normal);
        }
        for (path, mode, oid) in flatten(self.store, target) {
            // Unchanged entries are left alone, as a real two-way switch
            // would leave them.
            let unchanged = index
                .get(BStr::new(path.as_bytes()), Stage::Normal)
                .is_some_and(|e| e.oid == oid && e.mode == mode);
            if unchanged {
                continue;
            }
            index.add(IndexEntry {
                path: BString::from(path),
                oid,
                mode,
                stage: Stage::Normal,
                flags: EntryFlags::default(),
            });
        }
        Ok(())
    }
}

/// A checkout that always fails, for hard-failure paths.
pub struct BrokenWorktree;

impl WorktreeUpdater for BrokenWorktree {
    fn checkout(
        &mut self,
        _index: &mut Index,
        _head: &ObjectId,
        _target: &ObjectId,
    ) -> Result<(), MergeError> {
        Err(MergeError::Checkout("disk full".into()))
    }
}
