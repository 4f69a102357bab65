//! Entry processing: resolve every collected path and assemble the result
//! tree bottom-up.
//!
//! Paths are sorted with a D/F-aware comparator and walked in reverse, so
//! everything inside a directory is handled before the directory itself.
//! Completed directories are serialized as tree objects as soon as the
//! walk leaves them; by the time the walk ends, only the root remains.

use std::cmp::Ordering;
use std::collections::HashSet;

use bstr::{BStr, BString, ByteSlice};
use tern_object::{FileMode, ObjectType, Tree, TreeEntry};
use tern_odb::ObjectStore;

use crate::collect::df_name_compare;
use crate::content::MergeLabels;
use crate::output::OutputLog;
use crate::paths::{MergedInfo, PathId, PathInfo, PathTable, Version};
use crate::{MergeContext, MergeError, MergeOptions};

/// Accumulator for not-yet-written tree entries.
///
/// `versions` holds `(basename, version)` pairs for the files and
/// completed subtrees of every directory still open; `offsets` stacks the
/// open directories with the index into `versions` where each one's
/// entries start. The last stacked directory is mirrored in
/// `last_directory` for cheap comparison.
#[derive(Default)]
struct DirectoryVersions {
    versions: Vec<(BString, Version)>,
    offsets: Vec<(PathId, usize)>,
    last_directory: Option<PathId>,
}

/// Full-path ordering for the processing list: compare as if every path
/// were a directory, so `foo` and `foo/...` are adjacent, then put the
/// shorter path first. Forward iteration meets a D/F-conflicted file just
/// before its directory's contents; the reverse walk therefore meets it
/// just after them.
fn df_path_compare(a: &BStr, b: &BStr) -> Ordering {
    df_name_compare(a.as_bytes(), true, b.as_bytes(), true).then(a.len().cmp(&b.len()))
}

/// Resolve every entry and write out the merged tree, returning its id.
pub(crate) fn process_entries(
    opt: &MergeOptions,
    ctx: &mut MergeContext,
    store: &dyn ObjectStore,
) -> Result<tern_hash::ObjectId, MergeError> {
    let MergeContext {
        paths,
        conflicted,
        log,
        call_depth,
        branch1,
        branch2,
        ancestor,
    } = ctx;

    if paths.is_empty() {
        return Ok(store.hash_algo().empty_tree());
    }

    let mut plist: Vec<PathId> = paths.entry_ids().collect();
    plist.sort_by(|&a, &b| df_path_compare(paths.path(a), paths.path(b)));

    let mut dirs = DirectoryVersions::default();

    // Reverse order: paths below a directory come before the directory
    // itself, so subtrees are written before the trees that contain them,
    // and a D/F file is processed when its directory's fate is known.
    for &id in plist.iter().rev() {
        let directory = paths.get(id).expect("listed entry").merged().directory;
        write_completed_directory(&mut dirs, store, paths, directory)?;
        if paths.get(id).expect("listed entry").is_conflicted() {
            process_entry(
                opt,
                store,
                paths,
                conflicted,
                log,
                branch1,
                branch2,
                ancestor.as_deref().unwrap_or(""),
                *call_depth,
                id,
                &mut dirs,
            )?;
        } else {
            let mi = *paths.get(id).expect("listed entry").merged();
            let path = paths.path(id).to_owned();
            record_entry_for_tree(&mut dirs, path.as_bstr(), &mi);
        }
    }

    if dirs.offsets.len() != 1 || dirs.offsets[0].1 != 0 {
        panic!(
            "directory accounting is off: {} directories left open at finish (expected 1)",
            dirs.offsets.len()
        );
    }
    write_tree(store, &dirs.versions, 0)
}

/// Serialize `versions[offset..]` as one tree object and return its id.
fn write_tree(
    store: &dyn ObjectStore,
    versions: &[(BString, Version)],
    offset: usize,
) -> Result<tern_hash::ObjectId, MergeError> {
    let entries: Vec<TreeEntry> = versions[offset..]
        .iter()
        .map(|(name, v)| TreeEntry {
            mode: FileMode::from_raw(v.mode),
            name: name.clone(),
            oid: v.oid,
        })
        .collect();
    let tree = Tree { entries };
    Ok(store.write_object(ObjectType::Tree, &tree.serialize_content())?)
}

/// Queue one finished path for inclusion in its directory's tree.
fn record_entry_for_tree(dirs: &mut DirectoryVersions, path: &BStr, mi: &MergedInfo) {
    if mi.is_null {
        // Nothing to record.
        return;
    }
    let basename = &path[mi.basename_offset..];
    debug_assert!(!basename.contains(&b'/'));
    dirs.versions.push((BString::from(basename), mi.result));
}

/// React to the walk moving from one directory to another.
///
/// Descending just opens the new directory on the stack. Leaving a
/// directory serializes its accumulated entries as a tree (or marks the
/// directory omitted when none survived) and records the result on the
/// directory's own path entry; the loop unwinds as many levels as the move
/// crosses.
fn write_completed_directory(
    dirs: &mut DirectoryVersions,
    store: &dyn ObjectStore,
    paths: &mut PathTable,
    new_directory: PathId,
) -> Result<(), MergeError> {
    loop {
        if dirs.last_directory == Some(new_directory) {
            return Ok(());
        }

        let descending = match dirs.last_directory {
            None => true,
            Some(last) => paths
                .path(new_directory)
                .starts_with(paths.path(last).as_bytes()),
        };
        if descending {
            dirs.offsets.push((new_directory, dirs.versions.len()));
            dirs.last_directory = Some(new_directory);
            return Ok(());
        }

        // Every entry belonging to last_directory has been recorded; turn
        // them into a tree object now.
        let (dir_id, offset) = dirs
            .offsets
            .pop()
            .expect("open directory on the offsets stack");
        debug_assert_eq!(Some(dir_id), dirs.last_directory);
        let dir_info = paths
            .get_mut(dir_id)
            .expect("directory has a path entry")
            .merged_mut();
        if offset == dirs.versions.len() {
            // All contents disappeared in the merge; the directory is
            // omitted from its parent as well.
            dir_info.is_null = true;
        } else {
            let oid = write_tree(store, &dirs.versions, offset)?;
            dir_info.is_null = false;
            dir_info.result = Version {
                oid,
                mode: FileMode::Tree.raw(),
            };
        }
        dirs.versions.truncate(offset);
        dirs.last_directory = dirs.offsets.last().map(|&(dir, _)| dir);
    }
}

/// Decide the fate of one still-conflicted path.
#[allow(clippy::too_many_arguments)]
fn process_entry(
    opt: &MergeOptions,
    store: &dyn ObjectStore,
    paths: &mut PathTable,
    conflicted: &mut HashSet<PathId>,
    log: &mut OutputLog,
    branch1: &str,
    branch2: &str,
    ancestor: &str,
    call_depth: u32,
    id: PathId,
    dirs: &mut DirectoryVersions,
) -> Result<(), MergeError> {
    let ci = paths
        .get(id)
        .and_then(PathInfo::as_conflict)
        .expect("processing a conflicted entry")
        .clone();
    let path = paths.path(id).to_owned();

    debug_assert!(ci.filemask <= 7);
    // match_mask 7 was resolved during collection.
    debug_assert!(matches!(ci.match_mask, 0 | 3 | 5 | 6));

    if ci.dirmask != 0 {
        // The directory half first: its result (tree id, or omission) was
        // settled when the walk left the subtree.
        let mi = *paths.get(id).expect("entry present").merged();
        record_entry_for_tree(dirs, path.as_bstr(), &mi);
        if ci.filemask == 0 {
            // A plain directory: fully accounted for by its children.
            paths.get_mut(id).expect("entry present").resolve_clean();
            return Ok(());
        }
        debug_assert!(ci.df_conflict);
    }

    if ci.df_conflict {
        // No real directory/file resolution yet: the directory (if it
        // survived) keeps the slot in the tree, the file halves stay as
        // higher stages. When the directory vanished entirely, the file
        // content takes the slot instead.
        let side = if ci.filemask & 0b010 != 0 {
            1
        } else if ci.filemask & 0b100 != 0 {
            2
        } else {
            0
        };
        let file_version = ci.stages[side];
        let info = paths
            .get_mut(id)
            .and_then(PathInfo::as_conflict_mut)
            .expect("entry still conflicted");
        if info.merged.is_null {
            info.merged.result = file_version;
            info.merged.is_null = false;
            let mi = info.merged;
            record_entry_for_tree(dirs, path.as_bstr(), &mi);
        }
        log.push(
            path.as_bstr(),
            false,
            format!(
                "CONFLICT (directory/file): {} is a directory on one side of history and a file on the other.",
                path
            ),
        );
        conflicted.insert(id);
        return Ok(());
    }

    let result;
    let mut is_null = false;
    let clean;

    if ci.match_mask != 0 {
        clean = true;
        if ci.match_mask == 6 {
            // Both sides made the same change; stages[1] == stages[2].
            result = ci.stages[1];
        } else {
            // Exactly one side differs from the base; it wins.
            let othermask = 7 & !ci.match_mask;
            let side = if othermask == 4 { 2 } else { 1 };
            result = ci.stages[side];
            is_null = result.mode == 0;
            debug_assert!(othermask == 2 || othermask == 4);
            debug_assert_eq!(is_null, ci.filemask == ci.match_mask);
        }
    } else if ci.filemask >= 6 && ci.stages[1].type_bits() != ci.stages[2].type_bits() {
        // Two different kinds of entry (file/symlink/link-to-repo); no
        // resolution implemented beyond flagging it.
        clean = false;
        result = ci.stages[1];
        log.push(
            path.as_bstr(),
            false,
            format!(
                "CONFLICT (distinct types): {} had different types on each side.",
                path
            ),
        );
    } else if ci.filemask >= 6 {
        // Both sides modified the file.
        match &opt.content_merger {
            Some(merger) => {
                let labels = MergeLabels {
                    ancestor,
                    branch1,
                    branch2,
                };
                let p0 = paths.path(ci.pathnames[0]).to_owned();
                let p1 = paths.path(ci.pathnames[1]).to_owned();
                let p2 = paths.path(ci.pathnames[2]).to_owned();
                let (version, content_clean) = merger.merge_content(
                    store,
                    path.as_bstr(),
                    &ci.stages[0],
                    &ci.stages[1],
                    &ci.stages[2],
                    [p0.as_bstr(), p1.as_bstr(), p2.as_bstr()],
                    &labels,
                );
                result = version;
                clean = content_clean;
            }
            None => {
                // Degraded mode: keep side 1's content, stay conflicted.
                result = ci.stages[1];
                clean = false;
            }
        }
        if !clean {
            log.push(
                path.as_bstr(),
                false,
                format!("CONFLICT (content): Merge conflict in {}", path),
            );
        }
    } else if ci.filemask == 3 || ci.filemask == 5 {
        // Modify/delete.
        let side = if ci.filemask == 5 { 2 } else { 1 };
        // In a recursive inner merge the base content stands in for the
        // unresolvable conflict; at the top level the modification wins.
        let stage = if call_depth > 0 { 0 } else { side };
        result = ci.stages[stage];
        clean = false;

        let (modify_branch, delete_branch) = if side == 1 {
            (branch1, branch2)
        } else {
            (branch2, branch1)
        };
        log.push(
            path.as_bstr(),
            false,
            format!(
                "CONFLICT (modify/delete): {path} deleted in {delete_branch} and modified in {modify_branch}. Version {modify_branch} of {path} left in tree.",
            ),
        );
    } else if ci.filemask == 2 || ci.filemask == 4 {
        // Added on one side.
        let side = if ci.filemask == 4 { 2 } else { 1 };
        result = ci.stages[side];
        clean = !ci.df_conflict;
    } else if ci.filemask == 1 {
        // Deleted on both sides.
        is_null = true;
        result = Version::absent(store.hash_algo());
        clean = true;
    } else {
        unreachable!("no file halves left to resolve at {:?}", path);
    }

    let entry = paths.get_mut(id).expect("entry present");
    {
        let info = entry.as_conflict_mut().expect("entry still conflicted");
        info.merged.result = result;
        info.merged.is_null = is_null;
    }
    if clean {
        entry.resolve_clean();
    } else {
        // Remembered separately so index reconciliation can visit just
        // the conflicted paths instead of rescanning the whole table.
        conflicted.insert(id);
    }
    let mi = *entry.merged();
    record_entry_for_tree(dirs, path.as_bstr(), &mi);
    Ok(())
}
