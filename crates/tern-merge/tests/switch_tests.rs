//! Applying results: checkout delegation, conflict stages in the index,
//! message drain.

mod common;

use bstr::BStr;
use common::{blob, store, tree, BrokenWorktree, TestWorktree};
use tern_hash::ObjectId;
use tern_index::{CacheTree, CacheTreeNode, Index, Stage};
use tern_merge::{
    merge_incore_nonrecursive, merge_switch_to_result, MergeError, MergeOptions,
    WorktreeUpdater,
};
use tern_object::FileMode;
use tern_odb::MemoryStore;

fn options() -> MergeOptions {
    let mut opt = MergeOptions::new("main", "feature");
    opt.ancestor = Some("base".to_string());
    opt
}

fn merge(
    store: &MemoryStore,
    base: ObjectId,
    side1: ObjectId,
    side2: ObjectId,
) -> tern_merge::MergeResult {
    merge_incore_nonrecursive(&options(), store, &base, &side1, &side2).unwrap()
}

#[test]
fn modify_delete_surfaces_stages_one_and_two() {
    let store = store();
    let o0 = blob(&store, b"original\n");
    let o1 = blob(&store, b"modified\n");
    let base = tree(&store, &[("a", FileMode::Regular, o0)]);
    let side1 = tree(&store, &[("a", FileMode::Regular, o1)]);
    let side2 = tree(&store, &[]);

    let result = merge(&store, base, side1, side2);

    let mut index = Index::new();
    let mut worktree = TestWorktree { store: &store };
    // Working copy currently reflects side 1.
    worktree.checkout(&mut index, &side1, &side1).unwrap();

    let mut messages = Vec::new();
    merge_switch_to_result(
        &mut worktree,
        &mut index,
        &side1,
        result,
        true,
        Some(&mut messages),
    )
    .unwrap();

    let path = BStr::new("a");
    assert!(index.get(path, Stage::Normal).is_none());
    let stage1 = index.get(path, Stage::Base).unwrap();
    assert_eq!(stage1.oid, o0);
    let stage2 = index.get(path, Stage::Ours).unwrap();
    assert_eq!(stage2.oid, o1);
    assert!(index.get(path, Stage::Theirs).is_none());
    assert!(index.has_conflicts(path));

    let text = String::from_utf8(messages).unwrap();
    assert_eq!(
        text,
        "CONFLICT (modify/delete): a deleted in feature and modified in main. \
         Version main of a left in tree.\n"
    );

    // The index is fully sorted again after the bulk update.
    let order: Vec<_> = index.iter().map(|e| (e.path.clone(), e.stage)).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[test]
fn both_modified_surfaces_all_three_stages() {
    let store = store();
    let o0 = blob(&store, b"v0\n");
    let o1 = blob(&store, b"v1\n");
    let o2 = blob(&store, b"v2\n");
    let base = tree(&store, &[("f", FileMode::Regular, o0)]);
    let side1 = tree(&store, &[("f", FileMode::Regular, o1)]);
    let side2 = tree(&store, &[("f", FileMode::Regular, o2)]);

    let result = merge(&store, base, side1, side2);

    let mut index = Index::new();
    let mut worktree = TestWorktree { store: &store };
    worktree.checkout(&mut index, &side1, &side1).unwrap();

    merge_switch_to_result(&mut worktree, &mut index, &side1, result, true, None).unwrap();

    let path = BStr::new("f");
    assert_eq!(index.get(path, Stage::Base).unwrap().oid, o0);
    assert_eq!(index.get(path, Stage::Ours).unwrap().oid, o1);
    assert_eq!(index.get(path, Stage::Theirs).unwrap().oid, o2);
    assert!(index.get(path, Stage::Normal).is_none());
}

#[test]
fn base_file_under_df_conflict_invalidates_cache_tree() {
    let store = store();
    // Base has file "x"; both sides replaced it with a directory.
    let f0 = blob(&store, b"was a file\n");
    let inner = blob(&store, b"inner\n");
    let sub = tree(&store, &[("f", FileMode::Regular, inner)]);

    let base = tree(&store, &[("x", FileMode::Regular, f0)]);
    let sides = tree(&store, &[("x", FileMode::Tree, sub)]);

    let result = merge(&store, base, sides, sides);
    assert!(!result.clean);
    assert_eq!(result.conflicted_paths(), vec![BStr::new("x")]);

    let mut index = Index::new();
    let mut worktree = TestWorktree { store: &store };
    worktree.checkout(&mut index, &sides, &sides).unwrap();
    // Attach a valid cached tree after the checkout so only the
    // reconciler can be the one to invalidate it.
    index.set_cache_tree(Some(CacheTree {
        root: CacheTreeNode {
            name: "".into(),
            entry_count: 1,
            oid: Some(base),
            children: vec![],
        },
    }));

    merge_switch_to_result(&mut worktree, &mut index, &sides, result, true, None).unwrap();

    // No stage-0 "x" existed (the tree has a directory there), so the
    // covering cache tree was invalidated and the base file surfaced as
    // stage 1.
    assert!(!index.cache_tree().unwrap().root.is_valid());
    let path = BStr::new("x");
    assert_eq!(index.get(path, Stage::Base).unwrap().oid, f0);
    assert!(index.get(path, Stage::Ours).is_none());
    assert!(index.get(path, Stage::Theirs).is_none());
}

#[test]
fn skipping_worktree_update_still_drains_messages() {
    let store = store();
    let o0 = blob(&store, b"v0\n");
    let o1 = blob(&store, b"v1\n");
    let base = tree(&store, &[("a", FileMode::Regular, o0)]);
    let side1 = tree(&store, &[("a", FileMode::Regular, o1)]);
    let side2 = tree(&store, &[]);

    let result = merge(&store, base, side1, side2);

    let mut index = Index::new();
    let mut worktree = TestWorktree { store: &store };
    let mut messages = Vec::new();
    merge_switch_to_result(
        &mut worktree,
        &mut index,
        &side1,
        result,
        false,
        Some(&mut messages),
    )
    .unwrap();

    assert!(index.is_empty());
    assert!(!messages.is_empty());
}

#[test]
fn checkout_failure_propagates() {
    let store = store();
    let o0 = blob(&store, b"v\n");
    let empty = tree(&store, &[]);
    let side2 = tree(&store, &[("a", FileMode::Regular, o0)]);

    let result = merge(&store, empty, empty, side2);

    let mut index = Index::new();
    let err = merge_switch_to_result(
        &mut BrokenWorktree,
        &mut index,
        &empty,
        result,
        true,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, MergeError::Checkout(_)));
}
