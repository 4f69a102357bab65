//! Three-way in-core tree merge (the "ort" strategy).
//!
//! Given a common-ancestor tree and two side trees, the engine produces a
//! merged tree object plus the data a caller needs to surface remaining
//! conflicts: a conflicted-path set, stage 1–3 versions for the index,
//! and per-path conflict notices. It is the machinery behind merge,
//! rebase, cherry-pick, and revert.
//!
//! The pipeline: walk the three trees in lockstep into an interned
//! path table ([`collect`]), give the rename seam a chance to move things
//! ([`rename`]), resolve each path and write subtrees bottom-up
//! ([`process`]), and, when heads have several merge bases, first merge
//! the bases themselves into a virtual ancestor ([`driver`]). After the
//! caller checks the result out, [`switch`] re-inserts higher-stage index
//! entries for whatever stayed conflicted.
//!
//! Everything runs synchronously on the calling thread; the engine holds
//! no global state, and one [`MergeResult`] owns all per-merge storage.

mod collect;
pub mod content;
mod driver;
pub mod output;
pub mod paths;
mod process;
pub mod rename;
pub mod switch;

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use bstr::BStr;
use tern_hash::ObjectId;
use tern_odb::{ObjectStore, StoreError};

pub use content::{ContentMerger, MergeLabels};
pub use rename::{NoRenames, RenameDetector};
pub use switch::{merge_switch_to_result, WorktreeUpdater};

use output::OutputLog;
use paths::{PathId, PathTable};

/// Upper bound of the rename similarity score scale.
pub const MAX_RENAME_SCORE: u32 = 60000;

/// Diff algorithm used by content merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffAlgorithm {
    /// Histogram diff (the default).
    #[default]
    Histogram,
    Myers,
    Patience,
}

impl DiffAlgorithm {
    /// Parse a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "histogram" => Some(Self::Histogram),
            "myers" => Some(Self::Myers),
            "patience" => Some(Self::Patience),
            _ => None,
        }
    }

    /// The canonical configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Myers => "myers",
            Self::Patience => "patience",
        }
    }
}

/// How one-sided a recursive merge should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecursiveVariant {
    /// Ordinary three-way resolution.
    #[default]
    Normal,
    /// Favor our side in content conflicts.
    Ours,
    /// Favor their side in content conflicts.
    Theirs,
}

/// Options for a merge invocation.
///
/// Labels and knobs are validated when a merge starts; the hooks default
/// to the no-rename stub and no content merger (degraded but correct).
#[derive(Clone)]
pub struct MergeOptions {
    /// Label for side 1 in conflict output (usually the current branch).
    pub branch1: String,
    /// Label for side 2 in conflict output (the branch being merged).
    pub branch2: String,
    /// Label for the common ancestor. Required by
    /// [`merge_incore_nonrecursive`]; derived internally by
    /// [`merge_incore_recursive`].
    pub ancestor: Option<String>,
    /// Whether to run the rename detector at all.
    pub detect_renames: bool,
    /// Most file pairs the rename detector may consider; -1 = unlimited.
    pub rename_limit: i32,
    /// Minimum similarity score for a rename, on the
    /// [`MAX_RENAME_SCORE`] scale.
    pub rename_score: u32,
    pub recursive_variant: RecursiveVariant,
    /// Message verbosity, 0–5.
    pub verbosity: u8,
    pub diff_algorithm: DiffAlgorithm,
    /// Rename detection implementation.
    pub rename_detector: Rc<dyn RenameDetector>,
    /// Content-level three-way merger; `None` leaves both-modified files
    /// conflicted with side 1's content.
    pub content_merger: Option<Rc<dyn ContentMerger>>,
}

impl MergeOptions {
    /// Options with default knobs and the given branch labels.
    pub fn new(branch1: impl Into<String>, branch2: impl Into<String>) -> Self {
        Self {
            branch1: branch1.into(),
            branch2: branch2.into(),
            ancestor: None,
            detect_renames: true,
            rename_limit: 7000,
            rename_score: MAX_RENAME_SCORE / 2,
            recursive_variant: RecursiveVariant::Normal,
            verbosity: 2,
            diff_algorithm: DiffAlgorithm::Histogram,
            rename_detector: Rc::new(NoRenames),
            content_merger: None,
        }
    }
}

impl fmt::Debug for MergeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeOptions")
            .field("branch1", &self.branch1)
            .field("branch2", &self.branch2)
            .field("ancestor", &self.ancestor)
            .field("detect_renames", &self.detect_renames)
            .field("rename_limit", &self.rename_limit)
            .field("rename_score", &self.rename_score)
            .field("recursive_variant", &self.recursive_variant)
            .field("verbosity", &self.verbosity)
            .field("diff_algorithm", &self.diff_algorithm)
            .field("content_merger", &self.content_merger.is_some())
            .finish()
    }
}

/// Errors a merge can fail with. Conflicts are not errors; they are part
/// of a successful [`MergeResult`].
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("collecting merge info failed for trees {merge_base}, {side1}, {side2}")]
    CollectFailed {
        merge_base: ObjectId,
        side1: ObjectId,
        side2: ObjectId,
        #[source]
        source: StoreError,
    },

    #[error("checkout failed: {0}")]
    Checkout(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-merge working state, owned by the eventual [`MergeResult`].
pub(crate) struct MergeContext {
    pub(crate) paths: PathTable,
    /// Subset of `paths`: the ids still conflicted after processing, so
    /// index reconciliation need not rescan the whole table.
    pub(crate) conflicted: HashSet<PathId>,
    pub(crate) log: OutputLog,
    /// 0 at the user's call; >0 while recursively merging merge bases.
    pub(crate) call_depth: u32,
    pub(crate) branch1: String,
    pub(crate) branch2: String,
    pub(crate) ancestor: Option<String>,
}

impl MergeContext {
    fn new(opt: &MergeOptions) -> Self {
        Self {
            paths: PathTable::new(),
            conflicted: HashSet::new(),
            log: OutputLog::new(),
            call_depth: 0,
            branch1: opt.branch1.clone(),
            branch2: opt.branch2.clone(),
            ancestor: opt.ancestor.clone(),
        }
    }

    /// Reset between iterations of merging merge bases: the path table
    /// and conflicted set start over, accumulated messages stay.
    pub(crate) fn clear_for_reiteration(&mut self) {
        self.paths.clear();
        self.conflicted.clear();
    }
}

/// The outcome of a merge.
///
/// Owns the merge's internal state; pass it on to
/// [`merge_switch_to_result`] or release it with [`merge_finalize`].
/// Dropping the result releases everything either way.
pub struct MergeResult {
    /// Id of the merged tree.
    pub tree: ObjectId,
    /// True when no conflicts remain.
    pub clean: bool,
    pub(crate) context: MergeContext,
}

impl MergeResult {
    /// Paths that remain conflicted, sorted.
    pub fn conflicted_paths(&self) -> Vec<&BStr> {
        let mut paths: Vec<&BStr> = self
            .context
            .conflicted
            .iter()
            .map(|&id| self.context.paths.path(id))
            .collect();
        paths.sort();
        paths
    }

    /// Whether a specific path remains conflicted.
    pub fn is_path_conflicted(&self, path: &BStr) -> bool {
        self.context
            .paths
            .get_by_path(path)
            .is_some_and(|info| info.is_conflicted())
    }

    /// The accumulated per-path messages.
    pub fn output(&self) -> &OutputLog {
        &self.context.log
    }
}

/// Validate options and set up the per-merge context.
fn merge_start(opt: &MergeOptions) -> MergeContext {
    assert!(
        !opt.branch1.is_empty() && !opt.branch2.is_empty(),
        "both branch labels must be set"
    );
    assert!(opt.rename_limit >= -1, "rename_limit must be >= -1");
    assert!(
        opt.rename_score <= MAX_RENAME_SCORE,
        "rename_score out of range"
    );
    assert!(opt.verbosity <= 5, "verbosity out of range");
    MergeContext::new(opt)
}

/// Merge three trees, with the ancestor chosen by the caller.
///
/// `opt.ancestor` must name the base for conflict output. The returned
/// result carries the merged tree id even when conflicts remain; hard
/// failures (unreadable trees, store errors) come back as `Err`.
pub fn merge_incore_nonrecursive(
    opt: &MergeOptions,
    store: &dyn ObjectStore,
    merge_base: &ObjectId,
    side1: &ObjectId,
    side2: &ObjectId,
) -> Result<MergeResult, MergeError> {
    assert!(
        opt.ancestor.is_some(),
        "nonrecursive merge requires an ancestor label"
    );
    let mut ctx = merge_start(opt);
    let (tree, clean) =
        driver::merge_ort_nonrecursive_internal(opt, &mut ctx, store, merge_base, side1, side2)?;
    Ok(MergeResult {
        tree,
        clean,
        context: ctx,
    })
}

/// Merge two commits, computing (or receiving) their merge bases and
/// recursively reducing multiple bases to a single virtual ancestor.
///
/// `merge_bases`, when supplied, lists base commit ids in the order they
/// should be used; when absent the bases are computed from the commit
/// graph. The ancestor label is derived here, so `opt.ancestor` must be
/// unset.
pub fn merge_incore_recursive(
    opt: &MergeOptions,
    store: &dyn ObjectStore,
    merge_bases: Option<Vec<ObjectId>>,
    side1: &ObjectId,
    side2: &ObjectId,
) -> Result<MergeResult, MergeError> {
    assert!(
        opt.ancestor.is_none(),
        "the ancestor label is derived from the merge bases"
    );
    let mut ctx = merge_start(opt);
    let mut graph = driver::CommitGraph::new(store);
    let bases = merge_bases
        .map(|bases| bases.into_iter().map(driver::NodeId::Commit).collect());
    let (tree, clean) = driver::merge_ort_internal(
        opt,
        &mut ctx,
        store,
        &mut graph,
        bases,
        driver::NodeId::Commit(*side1),
        driver::NodeId::Commit(*side2),
    )?;
    Ok(MergeResult {
        tree,
        clean,
        context: ctx,
    })
}

/// Release a merge result without applying it.
pub fn merge_finalize(result: MergeResult) {
    drop(result);
}
