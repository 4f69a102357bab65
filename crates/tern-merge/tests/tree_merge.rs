//! Nonrecursive three-way tree merge scenarios.

mod common;

use bstr::BStr;
use common::{blob, flatten, store, tree};
use tern_hash::ObjectId;
use tern_merge::{merge_incore_nonrecursive, MergeOptions, MergeResult};
use tern_object::FileMode;
use tern_odb::{MemoryStore, ObjectStore};

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
) -> MergeResult {
    merge_incore_nonrecursive(&options(), store, &base, &side1, &side2).unwrap()
}

#[test]
fn add_on_one_side_only() {
    let store = store();
    let oa = blob(&store, b"a-content\n");
    let empty = tree(&store, &[]);
    let side2 = tree(&store, &[("a", FileMode::Regular, oa)]);

    let result = merge(&store, empty, empty, side2);
    assert!(result.clean);
    assert!(result.conflicted_paths().is_empty());
    assert_eq!(result.tree, side2);
}

#[test]
fn both_sides_add_identical_file() {
    let store = store();
    let oa = blob(&store, b"same\n");
    let empty = tree(&store, &[]);
    let added = tree(&store, &[("a", FileMode::Regular, oa)]);

    let result = merge(&store, empty, added, added);
    assert!(result.clean);
    assert_eq!(result.tree, added);
}

#[test]
fn modify_delete_keeps_modified_version_at_top_level() {
    let store = store();
    let o0 = blob(&store, b"original\n");
    let o1 = blob(&store, b"modified\n");
    let base = tree(&store, &[("a", FileMode::Regular, o0)]);
    let side1 = tree(&store, &[("a", FileMode::Regular, o1)]);
    let side2 = tree(&store, &[]);

    let result = merge(&store, base, side1, side2);
    assert!(!result.clean);
    assert_eq!(result.conflicted_paths(), vec![BStr::new("a")]);
    assert!(result.is_path_conflicted(BStr::new("a")));

    // The modified version survives in the tree.
    let files = flatten(&store, &result.tree);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "a");
    assert_eq!(files[0].2, o1);

    let messages = result.output().messages_for(BStr::new("a"));
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].text,
        "CONFLICT (modify/delete): a deleted in feature and modified in main. \
         Version main of a left in tree."
    );
}

#[test]
fn deleted_on_both_sides_is_clean() {
    let store = store();
    let o0 = blob(&store, b"doomed\n");
    let base = tree(&store, &[("a", FileMode::Regular, o0)]);
    let empty = tree(&store, &[]);

    let result = merge(&store, base, empty, empty);
    assert!(result.clean);
    assert!(flatten(&store, &result.tree).is_empty());
}

#[test]
fn untouched_subtree_is_reused_without_recursing() {
    let store = store();
    let lib_file = blob(&store, b"pub fn lib() {}\n");
    let lib_tree = tree(&store, &[("core.rs", FileMode::Regular, lib_file)]);
    let readme0 = blob(&store, b"v0\n");
    let readme1 = blob(&store, b"v1\n");

    let base = tree(
        &store,
        &[
            ("README", FileMode::Regular, readme0),
            ("lib", FileMode::Tree, lib_tree),
        ],
    );
    let side1 = tree(
        &store,
        &[
            ("README", FileMode::Regular, readme1),
            ("lib", FileMode::Tree, lib_tree),
        ],
    );

    let result = merge(&store, base, side1, base);
    assert!(result.clean);
    assert_eq!(result.tree, side1);

    // The collector stopped at "lib": nothing beneath it entered the
    // table, so the merged tree points at the original subtree object.
    let merged = store.parse_tree(&result.tree).unwrap();
    assert_eq!(merged.find(BStr::new("lib")).unwrap().oid, lib_tree);
    assert!(!result.is_path_conflicted(BStr::new("lib/core.rs")));
}

#[test]
fn each_side_changes_a_different_file() {
    let store = store();
    let a0 = blob(&store, b"a0\n");
    let a1 = blob(&store, b"a1\n");
    let b0 = blob(&store, b"b0\n");
    let b2 = blob(&store, b"b2\n");

    let base = tree(
        &store,
        &[("a", FileMode::Regular, a0), ("b", FileMode::Regular, b0)],
    );
    let side1 = tree(
        &store,
        &[("a", FileMode::Regular, a1), ("b", FileMode::Regular, b0)],
    );
    let side2 = tree(
        &store,
        &[("a", FileMode::Regular, a0), ("b", FileMode::Regular, b2)],
    );

    let result = merge(&store, base, side1, side2);
    assert!(result.clean);
    let files = flatten(&store, &result.tree);
    assert_eq!(files[0].2, a1);
    assert_eq!(files[1].2, b2);
}

#[test]
fn both_modify_without_content_merger_stays_conflicted_on_side1() {
    let store = store();
    let a0 = blob(&store, b"v0\n");
    let a1 = blob(&store, b"v1\n");
    let a2 = blob(&store, b"v2\n");
    let base = tree(&store, &[("a", FileMode::Regular, a0)]);
    let side1 = tree(&store, &[("a", FileMode::Regular, a1)]);
    let side2 = tree(&store, &[("a", FileMode::Regular, a2)]);

    let result = merge(&store, base, side1, side2);
    assert!(!result.clean);
    assert_eq!(result.conflicted_paths(), vec![BStr::new("a")]);
    assert_eq!(flatten(&store, &result.tree)[0].2, a1);
    assert_eq!(
        result.output().messages_for(BStr::new("a"))[0].text,
        "CONFLICT (content): Merge conflict in a"
    );
}

#[test]
fn file_to_symlink_type_change_stays_conflicted() {
    let store = store();
    let a0 = blob(&store, b"v0\n");
    let a1 = blob(&store, b"v1\n");
    let link = blob(&store, b"target");
    let base = tree(&store, &[("a", FileMode::Regular, a0)]);
    let side1 = tree(&store, &[("a", FileMode::Regular, a1)]);
    let side2 = tree(&store, &[("a", FileMode::Symlink, link)]);

    let result = merge(&store, base, side1, side2);
    assert!(!result.clean);
    assert_eq!(flatten(&store, &result.tree)[0].2, a1);
    assert!(result.output().messages_for(BStr::new("a"))[0]
        .text
        .starts_with("CONFLICT (distinct types)"));
}

#[test]
fn mode_only_change_is_carried_over() {
    let store = store();
    let a0 = blob(&store, b"script\n");
    let base = tree(&store, &[("run", FileMode::Regular, a0)]);
    let side1 = tree(&store, &[("run", FileMode::Executable, a0)]);

    let result = merge(&store, base, side1, base);
    assert!(result.clean);
    assert_eq!(flatten(&store, &result.tree)[0].1, FileMode::Executable);
}

#[test]
fn directory_file_conflict_keeps_directory_in_tree() {
    let store = store();
    let f0 = blob(&store, b"file\n");
    let inner = blob(&store, b"inner\n");
    let sub = tree(&store, &[("inner", FileMode::Regular, inner)]);

    let base = tree(&store, &[]);
    let side1 = tree(&store, &[("x", FileMode::Regular, f0)]);
    let side2 = tree(&store, &[("x", FileMode::Tree, sub)]);

    let result = merge(&store, base, side1, side2);
    assert!(!result.clean);
    assert!(result.is_path_conflicted(BStr::new("x")));

    // The directory holds the slot; the file half lives on in the stages.
    let merged = store.parse_tree(&result.tree).unwrap();
    assert!(merged.find(BStr::new("x")).unwrap().mode.is_tree());
    assert!(result.output().messages_for(BStr::new("x"))[0]
        .text
        .starts_with("CONFLICT (directory/file)"));
}

#[test]
fn empty_inputs_merge_to_the_empty_tree() {
    let store = store();
    let empty = tree(&store, &[]);
    let result = merge(&store, empty, empty, empty);
    assert!(result.clean);
    assert_eq!(result.tree, store.hash_algo().empty_tree());
}

// Universal properties.

fn sample_tree(store: &MemoryStore) -> ObjectId {
    let a = blob(store, b"alpha\n");
    let b = blob(store, b"beta\n");
    let c = blob(store, b"gamma\n");
    let deep = tree(store, &[("leaf", FileMode::Regular, c)]);
    let sub = tree(
        store,
        &[
            ("b.txt", FileMode::Regular, b),
            ("deep", FileMode::Tree, deep),
        ],
    );
    tree(
        store,
        &[
            ("a.txt", FileMode::Regular, a),
            ("sub", FileMode::Tree, sub),
            ("sub.txt", FileMode::Regular, b),
        ],
    )
}

#[test]
fn merging_identical_trees_is_identity() {
    let store = store();
    let t = sample_tree(&store);
    let result = merge(&store, t, t, t);
    assert!(result.clean);
    assert!(result.conflicted_paths().is_empty());
    assert_eq!(result.tree, t);
}

#[test]
fn unchanged_side_yields_the_other_side() {
    let store = store();
    let t = sample_tree(&store);
    let d = blob(&store, b"delta\n");
    let changed = tree(&store, &[("a.txt", FileMode::Regular, d)]);

    let result = merge(&store, t, changed, t);
    assert!(result.clean);
    assert_eq!(result.tree, changed);
}

#[test]
fn clean_merges_are_symmetric_in_the_sides() {
    let store = store();
    let oa = blob(&store, b"a\n");
    let ob = blob(&store, b"b\n");
    let empty = tree(&store, &[]);
    let s1 = tree(&store, &[("a", FileMode::Regular, oa)]);
    let s2 = tree(&store, &[("b", FileMode::Regular, ob)]);

    let forward = merge(&store, empty, s1, s2);
    let backward = merge(&store, empty, s2, s1);
    assert!(forward.clean && backward.clean);
    assert_eq!(forward.tree, backward.tree);
}

#[test]
fn conflicted_set_matches_conflicted_query() {
    let store = store();
    let o0 = blob(&store, b"0\n");
    let o1 = blob(&store, b"1\n");
    let o2 = blob(&store, b"2\n");
    let base = tree(
        &store,
        &[("x", FileMode::Regular, o0), ("y", FileMode::Regular, o0)],
    );
    let side1 = tree(
        &store,
        &[("x", FileMode::Regular, o1), ("y", FileMode::Regular, o1)],
    );
    let side2 = tree(
        &store,
        &[("x", FileMode::Regular, o2), ("y", FileMode::Regular, o1)],
    );

    let result = merge(&store, base, side1, side2);
    // "x" double-modified (conflicted), "y" same change on both (clean).
    assert_eq!(result.conflicted_paths(), vec![BStr::new("x")]);
    assert!(result.is_path_conflicted(BStr::new("x")));
    assert!(!result.is_path_conflicted(BStr::new("y")));
}

#[test]
fn produced_trees_roundtrip_through_the_store() {
    let store = store();
    let t = sample_tree(&store);
    let d = blob(&store, b"delta\n");
    let side2 = tree(
        &store,
        &[("zzz", FileMode::Regular, d), ("a.txt", FileMode::Regular, d)],
    );
    let empty = tree(&store, &[]);

    let result = merge(&store, empty, t, side2);
    // Re-serializing the parsed result must reproduce the same object.
    let parsed = store.parse_tree(&result.tree).unwrap();
    let rewritten = store
        .write_object(tern_object::ObjectType::Tree, &parsed.serialize_content())
        .unwrap();
    assert_eq!(rewritten, result.tree);
}
