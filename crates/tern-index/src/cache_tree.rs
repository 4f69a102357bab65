//! Cached tree ids over index prefixes.
//!
//! Each node remembers how many index entries a directory covers and, while
//! valid, the tree id those entries hash to. When an entry under a
//! directory changes, that directory and its ancestors are invalidated
//! (`entry_count` set to -1).

use bstr::{BStr, BString, ByteSlice};
use tern_hash::ObjectId;

/// Cached tree ids for the index.
#[derive(Debug, Clone, Default)]
pub struct CacheTree {
    pub root: CacheTreeNode,
}

/// A single node covering one directory.
#[derive(Debug, Clone)]
pub struct CacheTreeNode {
    /// Name of this subtree (empty for the root).
    pub name: BString,
    /// Number of entries covered (-1 = invalid).
    pub entry_count: i32,
    /// Tree id; meaningful only while `entry_count >= 0`.
    pub oid: Option<ObjectId>,
    /// Child subtrees.
    pub children: Vec<CacheTreeNode>,
}

impl Default for CacheTreeNode {
    fn default() -> Self {
        Self {
            name: BString::from(""),
            entry_count: -1,
            oid: None,
            children: Vec::new(),
        }
    }
}

impl CacheTreeNode {
    /// Whether this node currently holds a usable tree id.
    pub fn is_valid(&self) -> bool {
        self.entry_count >= 0
    }

    fn invalidate_path(&mut self, path: &BStr) {
        self.entry_count = -1;
        self.oid = None;

        let (dir, rest) = match path.find_byte(b'/') {
            Some(pos) => (&path[..pos], BStr::new(&path[pos + 1..])),
            None => return,
        };
        if let Some(child) = self
            .children
            .iter_mut()
            .find(|c| c.name.as_bstr() == BStr::new(dir))
        {
            child.invalidate_path(rest);
        }
    }
}

impl CacheTree {
    /// Invalidate every node on the way to `path`.
    pub fn invalidate(&mut self, path: &BStr) {
        self.root.invalidate_path(path);
    }
}
