//! Hash-map-backed object store.

use std::collections::HashMap;
use std::sync::RwLock;

use tern_hash::hasher::Hasher;
use tern_hash::{HashAlgorithm, ObjectId};
use tern_object::{header, Object, ObjectType};

use crate::{ObjectStore, StoreError};

/// An in-memory object store.
///
/// Objects are kept in their framed form, `"<type> <len>\0" + content`,
/// keyed by the hash of exactly those bytes. Interior locking makes reads
/// and writes safe from multiple threads.
pub struct MemoryStore {
    algo: HashAlgorithm,
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store for the given algorithm.
    ///
    /// The empty tree is pre-seeded: callers may hold its well-known id
    /// without ever having written it.
    pub fn new(algo: HashAlgorithm) -> Self {
        let store = Self {
            algo,
            objects: RwLock::new(HashMap::new()),
        };
        store
            .write_object(ObjectType::Tree, &[])
            .expect("seeding the empty tree");
        store
    }

    /// Whether an object with this id is present.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.objects.read().unwrap().contains_key(oid)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// Whether the store holds nothing beyond the pre-seeded empty tree.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl ObjectStore for MemoryStore {
    fn hash_algo(&self) -> HashAlgorithm {
        self.algo
    }

    fn read(&self, oid: &ObjectId) -> Result<Option<Object>, StoreError> {
        let objects = self.objects.read().unwrap();
        let Some(data) = objects.get(oid) else {
            return Ok(None);
        };
        let corrupt = |reason: String| StoreError::Corrupt { oid: *oid, reason };
        let (obj_type, size, header_len) =
            header::parse_header(data).map_err(|e| corrupt(e.to_string()))?;
        let content = &data[header_len..];
        if content.len() != size {
            return Err(corrupt(format!(
                "size mismatch: header says {size}, got {}",
                content.len()
            )));
        }
        let obj = Object::parse_content(obj_type, content, self.algo)
            .map_err(|e| corrupt(e.to_string()))?;
        Ok(Some(obj))
    }

    fn write_object(
        &self,
        obj_type: ObjectType,
        content: &[u8],
    ) -> Result<ObjectId, StoreError> {
        let mut data = header::write_header(obj_type, content.len());
        data.extend_from_slice(content);
        let oid = Hasher::digest(self.algo, &data)?;
        self.objects
            .write()
            .unwrap()
            .entry(oid)
            .or_insert(data);
        Ok(oid)
    }
}
