//! Tree co-traversal: walk the three input trees in lockstep and populate
//! the path table with one entry per visited name, files and directories
//! alike.

use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use tern_hash::{HashAlgorithm, ObjectId};
use tern_object::Tree;
use tern_odb::{ObjectStore, StoreError};

use crate::paths::{ConflictInfo, MergedInfo, PathId, PathInfo, PathTable, Version};

/// Compare names the way the multi-tree walk needs: a directory carries an
/// implicit trailing '/', and a name that continues past the other with a
/// '/' compares equal to the ended file name ("foo/bar" vs "foo"). Within
/// one directory level the practical effect is that a file `x` on one side
/// and a directory `x` on another coincide at a single visit.
pub(crate) fn df_name_compare(
    name1: &[u8],
    is_dir1: bool,
    name2: &[u8],
    is_dir2: bool,
) -> Ordering {
    let min_len = name1.len().min(name2.len());
    let cmp = name1[..min_len].cmp(&name2[..min_len]);
    if cmp != Ordering::Equal {
        return cmp;
    }
    if name1.len() == name2.len() {
        return Ordering::Equal;
    }
    let c1 = if name1.len() > min_len {
        name1[min_len]
    } else if is_dir1 {
        b'/'
    } else {
        0
    };
    let c2 = if name2.len() > min_len {
        name2[min_len]
    } else if is_dir2 {
        b'/'
    } else {
        0
    };
    if c1 == b'/' && c2 == 0 {
        return Ordering::Equal;
    }
    if c2 == b'/' && c1 == 0 {
        return Ordering::Equal;
    }
    c1.cmp(&c2)
}

/// Walk `merge_base`, `side1`, and `side2` together, interning every
/// visited path and recording which sides have it, as what, and with which
/// content.
///
/// Fails only when a tree cannot be read or parsed; the caller wraps the
/// failure with the three input ids.
pub(crate) fn collect_merge_info(
    paths: &mut PathTable,
    store: &dyn ObjectStore,
    merge_base: &ObjectId,
    side1: &ObjectId,
    side2: &ObjectId,
) -> Result<(), StoreError> {
    let algo = store.hash_algo();
    let root = paths.intern(BStr::new(""));
    let t0 = store.parse_tree(merge_base)?;
    let t1 = store.parse_tree(side1)?;
    let t2 = store.parse_tree(side2)?;
    let mut collector = Collector { store, algo, paths };
    collector.traverse([Some(&t0), Some(&t1), Some(&t2)], root)
}

struct Collector<'a> {
    store: &'a dyn ObjectStore,
    algo: HashAlgorithm,
    paths: &'a mut PathTable,
}

impl Collector<'_> {
    /// Merge-iterate the entry lists of up to three trees in walk order,
    /// visiting each distinct name once. `None` stands for "no tree on
    /// this side" and contributes nothing.
    fn traverse(&mut self, trees: [Option<&Tree>; 3], dir: PathId) -> Result<(), StoreError> {
        let mut idx = [0usize; 3];
        loop {
            // The smallest not-yet-visited name across the three trees.
            let mut min: Option<(BString, bool)> = None;
            for (i, tree) in trees.iter().enumerate() {
                let Some(tree) = tree else { continue };
                let Some(e) = tree.entries.get(idx[i]) else { continue };
                let replace = match &min {
                    None => true,
                    Some((name, is_dir)) => {
                        df_name_compare(&e.name, e.mode.is_tree(), name, *is_dir)
                            == Ordering::Less
                    }
                };
                if replace {
                    min = Some((e.name.clone(), e.mode.is_tree()));
                }
            }
            let Some((name, is_dir)) = min else { break };

            // Gather every side whose current entry coincides with it.
            let mut mask = 0u8;
            let mut dirmask = 0u8;
            let mut names = [Version::absent(self.algo); 3];
            for (i, tree) in trees.iter().enumerate() {
                let Some(tree) = tree else { continue };
                let Some(e) = tree.entries.get(idx[i]) else { continue };
                if df_name_compare(&e.name, e.mode.is_tree(), &name, is_dir) != Ordering::Equal
                {
                    continue;
                }
                mask |= 1 << i;
                if e.mode.is_tree() {
                    dirmask |= 1 << i;
                }
                names[i] = Version {
                    oid: e.oid,
                    mode: e.mode.raw(),
                };
                idx[i] += 1;
            }

            self.visit(dir, name.as_bstr(), mask, dirmask, names)?;
        }
        Ok(())
    }

    fn visit(
        &mut self,
        dir: PathId,
        name: &BStr,
        mask: u8,
        dirmask: u8,
        names: [Version; 3],
    ) -> Result<(), StoreError> {
        debug_assert!(mask > 0 && mask < 8);
        let filemask = mask & !dirmask;
        let mbase_null = mask & 1 == 0;
        let side1_null = mask & 2 == 0;
        let side2_null = mask & 4 == 0;
        let side1_matches_mbase = !side1_null && !mbase_null && names[0] == names[1];
        let side2_matches_mbase = !side2_null && !mbase_null && names[0] == names[2];
        let sides_match = !side1_null && !side2_null && names[1] == names[2];

        // A file on one side, a directory on another. Directories are
        // left where they are and files moved aside, so the flag only
        // matters for the file halves of the path.
        let df_conflict = filemask != 0 && dirmask != 0;

        let match_mask: u8 = if side1_matches_mbase {
            if side2_matches_mbase {
                7
            } else {
                3
            }
        } else if side2_matches_mbase {
            5
        } else if sides_match {
            6
        } else {
            0
        };

        let dir_path = self.paths.path(dir);
        let (fullpath, basename_offset) = if dir_path.is_empty() {
            (BString::from(name.as_bytes()), 0)
        } else {
            let mut p = BString::from(dir_path.as_bytes());
            p.push(b'/');
            p.extend_from_slice(name.as_bytes());
            (p, dir_path.len() + 1)
        };

        // All three match: resolve with the base version right here and
        // skip the whole subtree; nothing below can differ either.
        if side1_matches_mbase && side2_matches_mbase {
            let mi = MergedInfo {
                result: names[0],
                is_null: false,
                basename_offset,
                directory: dir,
            };
            self.paths.insert(fullpath.as_bstr(), PathInfo::Merged(mi));
            return Ok(());
        }

        let id = self.paths.intern(fullpath.as_bstr());
        let ci = ConflictInfo {
            merged: MergedInfo {
                result: Version::absent(self.algo),
                // Directories tentatively vanish; the tree writer flips
                // this once something beneath them survives the merge.
                is_null: dirmask != 0,
                basename_offset,
                directory: dir,
            },
            stages: names,
            pathnames: [id; 3],
            df_conflict,
            path_conflict: false,
            filemask,
            dirmask,
            // Match bits for directory sides stop mattering once we
            // recurse; only the file halves keep theirs.
            match_mask: if dirmask != 0 {
                match_mask & filemask
            } else {
                match_mask
            },
        };
        self.paths.set(id, PathInfo::Conflicted(ci));

        if dirmask != 0 {
            // Recurse, reusing an already-parsed tree wherever a side
            // matched another at this level.
            let mut parsed: [Option<Tree>; 3] = [None, None, None];
            for i in 0..3 {
                if dirmask & (1 << i) == 0 {
                    continue;
                }
                if i == 1 && side1_matches_mbase {
                    continue;
                }
                if i == 2 && (side2_matches_mbase || sides_match) {
                    continue;
                }
                parsed[i] = Some(self.store.parse_tree(&names[i].oid)?);
            }
            let t0 = parsed[0].as_ref();
            let t1 = if side1_matches_mbase {
                t0
            } else {
                parsed[1].as_ref()
            };
            let t2 = if side2_matches_mbase {
                t0
            } else if sides_match {
                t1
            } else {
                parsed[2].as_ref()
            };
            self.traverse([t0, t1, t2], id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn df_compare_treats_dir_as_trailing_slash() {
        assert_eq!(
            df_name_compare(b"foo", true, b"foo.c", false),
            Ordering::Greater
        );
        assert_eq!(
            df_name_compare(b"foo", true, b"foo0", false),
            Ordering::Less
        );
    }

    #[test]
    fn df_compare_same_name_file_and_dir_coincide() {
        assert_eq!(df_name_compare(b"x", false, b"x", true), Ordering::Equal);
    }

    #[test]
    fn df_compare_path_under_dir_equals_file() {
        // "foo" and "foo/bar" compare equal; callers break the tie on
        // length so the shorter path comes first.
        assert_eq!(
            df_name_compare(b"foo", false, b"foo/bar", false),
            Ordering::Equal
        );
        assert_eq!(
            df_name_compare(b"foo/bar", false, b"foo", true),
            Ordering::Equal
        );
    }
}
