//! Object storage seam for the merge engine.
//!
//! The engine is written against the [`ObjectStore`] trait: it reads trees
//! and commits during collection and writes freshly built tree objects
//! while assembling its result. Implementations must be internally
//! synchronized (or single-writer); the engine performs no locking.
//!
//! [`MemoryStore`] is the bundled implementation: a hash-map-backed store
//! used by the test suites and by embedders that merge without a
//! persistent object database.

mod memory;

pub use memory::MemoryStore;

use tern_hash::{HashAlgorithm, ObjectId};
use tern_object::{Commit, Object, ObjectType, Tree};

/// Errors produced by object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("expected {expected} object, got {actual} for {oid}")]
    UnexpectedType {
        oid: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error(transparent)]
    Hash(#[from] tern_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read and write access to a content-addressed object store.
pub trait ObjectStore {
    /// The hash algorithm this store addresses objects with.
    fn hash_algo(&self) -> HashAlgorithm;

    /// Read and parse an object by id. `Ok(None)` when absent.
    fn read(&self, oid: &ObjectId) -> Result<Option<Object>, StoreError>;

    /// Write an object given its type and content bytes; returns its id.
    fn write_object(&self, obj_type: ObjectType, content: &[u8])
        -> Result<ObjectId, StoreError>;

    /// Read an object that must be a tree.
    fn parse_tree(&self, oid: &ObjectId) -> Result<Tree, StoreError> {
        match self.read(oid)?.ok_or(StoreError::NotFound(*oid))? {
            Object::Tree(t) => Ok(t),
            other => Err(StoreError::UnexpectedType {
                oid: *oid,
                expected: "tree",
                actual: other.object_type().name(),
            }),
        }
    }

    /// Read an object that must be a commit.
    fn parse_commit(&self, oid: &ObjectId) -> Result<Commit, StoreError> {
        match self.read(oid)?.ok_or(StoreError::NotFound(*oid))? {
            Object::Commit(c) => Ok(c),
            other => Err(StoreError::UnexpectedType {
                oid: *oid,
                expected: "commit",
                actual: other.object_type().name(),
            }),
        }
    }
}
