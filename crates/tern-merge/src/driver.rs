//! The recursive driver: when two heads have more than one merge base,
//! the bases are merged among themselves, pairwise, into a virtual
//! ancestor, and the real merge runs against that.

use std::collections::{HashMap, HashSet, VecDeque};

use tern_hash::ObjectId;
use tern_odb::ObjectStore;

use crate::collect::collect_merge_info;
use crate::process::process_entries;
use crate::{MergeContext, MergeError, MergeOptions};

const DEFAULT_ABBREV: usize = 7;

/// A node in the commit graph the driver walks: either a real commit in
/// the store or a virtual commit fabricated while merging bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NodeId {
    Commit(ObjectId),
    Virtual(u32),
}

/// An in-memory commit standing in for merged bases. Never written to the
/// store; its parents are the two nodes whose merge produced it.
struct VirtualCommit {
    tree: ObjectId,
    parents: Vec<NodeId>,
}

/// The store's commit graph extended with virtual commits.
pub(crate) struct CommitGraph<'a> {
    store: &'a dyn ObjectStore,
    virtuals: Vec<VirtualCommit>,
}

impl<'a> CommitGraph<'a> {
    pub(crate) fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            virtuals: Vec::new(),
        }
    }

    fn make_virtual(&mut self, tree: ObjectId, parents: Vec<NodeId>) -> NodeId {
        let id = self.virtuals.len() as u32;
        self.virtuals.push(VirtualCommit { tree, parents });
        NodeId::Virtual(id)
    }

    fn tree_of(&self, node: NodeId) -> Result<ObjectId, MergeError> {
        match node {
            NodeId::Commit(oid) => Ok(self.store.parse_commit(&oid)?.tree),
            NodeId::Virtual(i) => Ok(self.virtuals[i as usize].tree),
        }
    }

    fn parents_of(&self, node: NodeId) -> Result<Vec<NodeId>, MergeError> {
        match node {
            NodeId::Commit(oid) => Ok(self
                .store
                .parse_commit(&oid)?
                .parents
                .into_iter()
                .map(NodeId::Commit)
                .collect()),
            NodeId::Virtual(i) => Ok(self.virtuals[i as usize].parents.clone()),
        }
    }
}

const PARENT1: u8 = 1;
const PARENT2: u8 = 2;

/// All lowest common ancestors of `a` and `b`.
pub(crate) fn merge_bases_of(
    graph: &CommitGraph<'_>,
    a: NodeId,
    b: NodeId,
) -> Result<Vec<NodeId>, MergeError> {
    if a == b {
        return Ok(vec![a]);
    }
    let common = paint_down_to_common(graph, a, b)?;
    remove_redundant(graph, common)
}

/// Walk down from both heads, painting each commit with the color(s) it is
/// reachable from. A commit painted both colors is a common ancestor; the
/// walk does not continue past it.
fn paint_down_to_common(
    graph: &CommitGraph<'_>,
    a: NodeId,
    b: NodeId,
) -> Result<Vec<NodeId>, MergeError> {
    let mut flags: HashMap<NodeId, u8> = HashMap::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    let mut recorded: HashSet<NodeId> = HashSet::new();
    let mut results: Vec<NodeId> = Vec::new();

    flags.insert(a, PARENT1);
    flags.insert(b, PARENT2);
    queue.push_back(a);
    queue.push_back(b);

    while let Some(node) = queue.pop_front() {
        let f = *flags.get(&node).unwrap_or(&0);
        if f & (PARENT1 | PARENT2) == (PARENT1 | PARENT2) {
            if recorded.insert(node) {
                results.push(node);
            }
            continue;
        }
        for parent in graph.parents_of(node)? {
            let pf = flags.entry(parent).or_insert(0);
            let nf = *pf | f;
            if nf != *pf {
                *pf = nf;
                queue.push_back(parent);
            }
        }
    }

    Ok(results)
}

/// Drop any base that is an ancestor of another base.
fn remove_redundant(
    graph: &CommitGraph<'_>,
    bases: Vec<NodeId>,
) -> Result<Vec<NodeId>, MergeError> {
    if bases.len() <= 1 {
        return Ok(bases);
    }

    let mut redundant: HashSet<usize> = HashSet::new();
    for i in 0..bases.len() {
        if redundant.contains(&i) {
            continue;
        }
        for j in (i + 1)..bases.len() {
            if redundant.contains(&j) {
                continue;
            }
            if is_ancestor(graph, bases[i], bases[j])? {
                redundant.insert(i);
                break;
            } else if is_ancestor(graph, bases[j], bases[i])? {
                redundant.insert(j);
            }
        }
    }

    Ok(bases
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !redundant.contains(idx))
        .map(|(_, node)| node)
        .collect())
}

/// Breadth-first reachability check.
fn is_ancestor(
    graph: &CommitGraph<'_>,
    ancestor: NodeId,
    descendant: NodeId,
) -> Result<bool, MergeError> {
    if ancestor == descendant {
        return Ok(true);
    }
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(descendant);
    visited.insert(descendant);

    while let Some(current) = queue.pop_front() {
        if current == ancestor {
            return Ok(true);
        }
        for parent in graph.parents_of(current)? {
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(false)
}

/// One plain three-way tree merge: collect, (maybe) detect renames,
/// process. Returns the merged tree and whether it was fully clean.
pub(crate) fn merge_ort_nonrecursive_internal(
    opt: &MergeOptions,
    ctx: &mut MergeContext,
    store: &dyn ObjectStore,
    merge_base: &ObjectId,
    side1: &ObjectId,
    side2: &ObjectId,
) -> Result<(ObjectId, bool), MergeError> {
    collect_merge_info(&mut ctx.paths, store, merge_base, side1, side2).map_err(|source| {
        MergeError::CollectFailed {
            merge_base: *merge_base,
            side1: *side1,
            side2: *side2,
            source,
        }
    })?;

    let clean_renames = if opt.detect_renames {
        opt.rename_detector
            .detect_and_process(&mut ctx.paths, merge_base, side1, side2)
    } else {
        true
    };

    let tree = process_entries(opt, ctx, store)?;
    let clean = clean_renames && ctx.conflicted.is_empty();
    Ok((tree, clean))
}

/// The recursive merge: reduce the merge bases to a single (possibly
/// virtual) ancestor, then run the plain merge of the two heads over it.
pub(crate) fn merge_ort_internal(
    opt: &MergeOptions,
    ctx: &mut MergeContext,
    store: &dyn ObjectStore,
    graph: &mut CommitGraph<'_>,
    merge_bases: Option<Vec<NodeId>>,
    h1: NodeId,
    h2: NodeId,
) -> Result<(ObjectId, bool), MergeError> {
    let mut merge_bases = match merge_bases {
        Some(bases) => bases,
        None => {
            let mut bases = merge_bases_of(graph, h1, h2)?;
            // Process oldest bases first.
            bases.reverse();
            bases
        }
    };

    let ancestor_label;
    let mut merged_merge_bases;
    if merge_bases.is_empty() {
        // No common ancestor: merge against the empty tree.
        merged_merge_bases = graph.make_virtual(store.hash_algo().empty_tree(), Vec::new());
        ancestor_label = "empty tree".to_string();
    } else {
        merged_merge_bases = merge_bases.remove(0);
        ancestor_label = if merge_bases.is_empty() {
            match merged_merge_bases {
                NodeId::Commit(oid) => oid.abbrev(DEFAULT_ABBREV),
                NodeId::Virtual(_) => "merged common ancestors".to_string(),
            }
        } else {
            "merged common ancestors".to_string()
        };
    }

    for base in merge_bases {
        let prev = merged_merge_bases;

        ctx.call_depth += 1;
        let saved_b1 =
            std::mem::replace(&mut ctx.branch1, "Temporary merge branch 1".to_string());
        let saved_b2 =
            std::mem::replace(&mut ctx.branch2, "Temporary merge branch 2".to_string());
        let (tree, _clean) = merge_ort_internal(opt, ctx, store, graph, None, prev, base)?;
        ctx.branch1 = saved_b1;
        ctx.branch2 = saved_b2;
        ctx.call_depth -= 1;

        merged_merge_bases = graph.make_virtual(tree, vec![prev, base]);
        ctx.clear_for_reiteration();
    }

    ctx.ancestor = Some(ancestor_label);
    let base_tree = graph.tree_of(merged_merge_bases)?;
    let tree1 = graph.tree_of(h1)?;
    let tree2 = graph.tree_of(h2)?;
    let out = merge_ort_nonrecursive_internal(opt, ctx, store, &base_tree, &tree1, &tree2);
    // The label was tied to this level's ancestor; drop it so it cannot
    // leak into an unrelated merge.
    ctx.ancestor = None;
    out
}
