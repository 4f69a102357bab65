//! The path table: the primary data structure of the whole merge.
//!
//! Keys are full paths from the repository root, files and every
//! directory the walk reaches, interned so that id comparison replaces
//! byte comparison. Values describe how far each path has come toward a
//! resolution: either already [`Merged`](PathInfo::Merged), or still
//! [`Conflicted`](PathInfo::Conflicted) with the three stage versions and
//! masks attached.
//!
//! A path usually starts out conflicted and is downgraded to merged once a
//! later step resolves it; the conversion drops the conflict-only fields,
//! so nothing can read them afterwards. Interned strings are owned by the
//! table's arena and stay alive until the table is cleared or dropped,
//! even if an entry is removed mid-run, since other entries' `pathnames` may
//! still refer to them.

use std::collections::HashMap;

use bstr::{BStr, BString, ByteSlice};
use tern_hash::{HashAlgorithm, ObjectId};
use tern_object::FileMode;

/// An interned path. Id equality is string equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(u32);

/// One tree's version of a path: content id plus raw mode word.
///
/// Mode 0 means the side has no entry at this path; only the type bits of
/// the mode are ever compared semantically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub oid: ObjectId,
    pub mode: u32,
}

impl Version {
    /// The "no entry on this side" version.
    pub fn absent(algo: HashAlgorithm) -> Self {
        Self {
            oid: algo.null_oid(),
            mode: 0,
        }
    }

    /// Whether this side has no entry.
    pub fn is_absent(&self) -> bool {
        self.mode == 0
    }

    /// The entry-kind bits of the mode word.
    pub fn type_bits(&self) -> u32 {
        self.mode & FileMode::TYPE_MASK
    }

    /// Whether the mode word names a directory.
    pub fn is_tree(&self) -> bool {
        self.type_bits() == FileMode::Tree.raw()
    }
}

/// Resolution data every path ends up with.
#[derive(Debug, Clone, Copy)]
pub struct MergedInfo {
    /// The version that goes into the result tree.
    pub result: Version,
    /// When set, the path is omitted from the result tree.
    pub is_null: bool,
    /// Offset of the basename within the full path (0 at the top level).
    pub basename_offset: usize,
    /// Containing directory, interned. Equal directories share one id, so
    /// the tree writer can compare directories without touching bytes.
    pub directory: PathId,
}

/// Everything known about a path that is not (or not yet) cleanly merged.
#[derive(Debug, Clone)]
pub struct ConflictInfo {
    /// The would-be resolution; filled in as processing decides what to
    /// put in the working tree even when the path stays conflicted.
    pub merged: MergedInfo,
    /// Versions from base, side 1, and side 2.
    pub stages: [Version; 3],
    /// Path each stage came from; differs from the entry's own key only
    /// once rename handling has moved things.
    pub pathnames: [PathId; 3],
    /// Involved in a directory/file conflict.
    pub df_conflict: bool,
    /// Involved in a path-level (non-content, non-D/F) conflict.
    pub path_conflict: bool,
    /// Bit i set: side i has this path as a file.
    pub filemask: u8,
    /// Bit i set: side i has this path as a directory.
    pub dirmask: u8,
    /// Which stages hold identical versions: 0, or at least two bits.
    pub match_mask: u8,
}

/// A path table entry.
#[derive(Debug, Clone)]
pub enum PathInfo {
    Merged(MergedInfo),
    Conflicted(ConflictInfo),
}

impl PathInfo {
    /// Whether the entry still carries conflict data.
    pub fn is_conflicted(&self) -> bool {
        matches!(self, Self::Conflicted(_))
    }

    /// The resolution view, valid for both variants.
    pub fn merged(&self) -> &MergedInfo {
        match self {
            Self::Merged(mi) => mi,
            Self::Conflicted(ci) => &ci.merged,
        }
    }

    /// Mutable resolution view.
    pub fn merged_mut(&mut self) -> &mut MergedInfo {
        match self {
            Self::Merged(mi) => mi,
            Self::Conflicted(ci) => &mut ci.merged,
        }
    }

    /// The conflict data, if the entry is still conflicted.
    pub fn as_conflict(&self) -> Option<&ConflictInfo> {
        match self {
            Self::Merged(_) => None,
            Self::Conflicted(ci) => Some(ci),
        }
    }

    /// Mutable conflict data, if the entry is still conflicted.
    pub fn as_conflict_mut(&mut self) -> Option<&mut ConflictInfo> {
        match self {
            Self::Merged(_) => None,
            Self::Conflicted(ci) => Some(ci),
        }
    }

    /// Downgrade a conflicted entry to a clean one, keeping only its
    /// resolution. After this, the conflict fields are gone for good.
    pub fn resolve_clean(&mut self) {
        if let Self::Conflicted(ci) = self {
            debug_assert!(
                !ci.merged.result.is_absent() || ci.merged.is_null,
                "resolving clean without a result version"
            );
            *self = Self::Merged(ci.merged);
        }
    }
}

/// Interned full paths mapping to entries.
#[derive(Debug, Default)]
pub struct PathTable {
    /// Arena owning every interned path for the table's lifetime.
    strings: Vec<BString>,
    lookup: HashMap<BString, PathId>,
    entries: HashMap<PathId, PathInfo>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a path, returning its id. Repeated calls with equal bytes
    /// return the same id.
    pub fn intern(&mut self, path: &BStr) -> PathId {
        if let Some(&id) = self.lookup.get(path) {
            return id;
        }
        let id = PathId(self.strings.len() as u32);
        let owned = BString::from(path);
        self.lookup.insert(owned.clone(), id);
        self.strings.push(owned);
        id
    }

    /// The bytes of an interned path.
    pub fn path(&self, id: PathId) -> &BStr {
        self.strings[id.0 as usize].as_bstr()
    }

    /// Intern `path` and store `info` under it.
    pub fn insert(&mut self, path: &BStr, info: PathInfo) -> PathId {
        let id = self.intern(path);
        self.entries.insert(id, info);
        id
    }

    /// Store `info` under an already-interned id.
    pub fn set(&mut self, id: PathId, info: PathInfo) {
        self.entries.insert(id, info);
    }

    /// Remove the entry for an id. The interned string stays alive.
    pub fn remove(&mut self, id: PathId) -> Option<PathInfo> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: PathId) -> Option<&PathInfo> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PathId) -> Option<&mut PathInfo> {
        self.entries.get_mut(&id)
    }

    /// Look up an entry by path bytes.
    pub fn get_by_path(&self, path: &BStr) -> Option<&PathInfo> {
        self.lookup.get(path).and_then(|id| self.entries.get(id))
    }

    /// Ids of all paths that have entries, in no particular order.
    pub fn entry_ids(&self) -> impl Iterator<Item = PathId> + '_ {
        self.entries.keys().copied()
    }

    /// Visit every entry mutably.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(PathId, &mut PathInfo)) {
        for (&id, info) in self.entries.iter_mut() {
            f(id, info);
        }
    }

    /// Number of entries (not interned strings).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and interned strings. Previously handed-out ids
    /// are invalidated.
    pub fn clear(&mut self) {
        self.strings.clear();
        self.lookup.clear();
        self.entries.clear();
    }
}
