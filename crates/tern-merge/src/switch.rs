//! Applying a merge result: two-way checkout, conflict stages in the
//! index, message drain.

use std::io;

use tern_hash::ObjectId;
use tern_index::{EntryFlags, Index, IndexEntry, Stage};
use tern_object::FileMode;

use crate::paths::PathInfo;
use crate::{MergeContext, MergeError, MergeResult};

/// The working-tree updater the engine delegates to: a two-way merge walk
/// from one tree to another that refreshes both the working copy and the
/// index ("unpack trees" in the original). Out of scope here; callers
/// supply an implementation.
pub trait WorktreeUpdater {
    fn checkout(
        &mut self,
        index: &mut Index,
        head: &ObjectId,
        target: &ObjectId,
    ) -> Result<(), MergeError>;
}

/// Switch the caller's index and working tree over to the merge result,
/// surface conflicts as stage 1–3 index entries, emit accumulated
/// messages, and release the merge context.
///
/// `head_tree` is the tree the working copy currently reflects. With
/// `update_worktree_and_index` unset, only messages are emitted. Message
/// emission goes to `display_update_msgs` when given.
pub fn merge_switch_to_result(
    updater: &mut dyn WorktreeUpdater,
    index: &mut Index,
    head_tree: &ObjectId,
    result: MergeResult,
    update_worktree_and_index: bool,
    display_update_msgs: Option<&mut dyn io::Write>,
) -> Result<(), MergeError> {
    if update_worktree_and_index {
        updater.checkout(index, head_tree, &result.tree)?;
        record_conflicted_index_entries(&result.context, index);
    }

    if let Some(out) = display_update_msgs {
        result.context.log.write_to(out)?;
    }

    crate::merge_finalize(result);
    Ok(())
}

/// Rewrite the index so conflicted paths carry their higher-stage entries.
///
/// The checkout left a stage-0 entry per path (the as-merged-as-possible
/// version placed in the tree). For every conflicted path that entry is
/// dropped and one entry per populated stage is appended; appends ignore
/// sort order, so the index is re-sorted once at the end. The stage-0
/// lookup is bounded to the pre-update index length, because earlier loop
/// iterations have already appended out-of-order entries past it.
pub(crate) fn record_conflicted_index_entries(ctx: &MergeContext, index: &mut Index) {
    if ctx.conflicted.is_empty() {
        return;
    }

    let original_len = index.len();

    for &id in &ctx.conflicted {
        let path = ctx.paths.path(id);
        let ci = ctx
            .paths
            .get(id)
            .and_then(PathInfo::as_conflict)
            .expect("conflicted set points at conflicted entries");

        match index.find_stage0(path, original_len) {
            Some(pos) => {
                // TODO: a stage-0 entry with skip_worktree set was not
                // materialized by the checkout; this pass needs to write
                // the file out itself before hiding the entry.
                index.mark_removed(pos);
            }
            None => {
                if ci.filemask != 1 {
                    panic!(
                        "conflicted path {:?} has no stage-0 entry in the index",
                        path
                    );
                }
                // Deleted on both sides: nothing was checked out, but a
                // cached tree may still cover the old path.
                index.invalidate_cache_tree(path);
            }
        }

        for (i, stage) in [Stage::Base, Stage::Ours, Stage::Theirs].into_iter().enumerate() {
            if ci.filemask & (1 << i) == 0 {
                continue;
            }
            let vi = ci.stages[i];
            index.push_unordered(IndexEntry {
                path: path.to_owned(),
                oid: vi.oid,
                mode: FileMode::from_raw(vi.mode),
                stage,
                flags: EntryFlags::default(),
            });
        }
    }

    index.remove_marked();
    index.sort_entries();
}
