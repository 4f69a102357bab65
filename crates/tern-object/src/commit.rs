//! Commit objects, as far as the merge machinery needs them: a root tree,
//! parent links, and the message. Other headers (identities, signatures)
//! are preserved as raw lines for round-trip but never interpreted.

use bstr::{BString, ByteSlice};
use tern_hash::ObjectId;

use crate::ObjectError;

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Id of the root tree.
    pub tree: ObjectId,
    /// Parent commit ids (empty for a root commit).
    pub parents: Vec<ObjectId>,
    /// Headers other than tree/parent, kept verbatim as (key, value).
    pub extra_headers: Vec<(BString, BString)>,
    /// Commit message (everything after the blank separator line).
    pub message: BString,
}

impl Commit {
    /// Create a commit with just the fields the merge driver cares about.
    pub fn new(tree: ObjectId, parents: Vec<ObjectId>, message: impl Into<BString>) -> Self {
        Self {
            tree,
            parents,
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    /// Parse commit content from raw bytes (no object header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectId> = None;
        let mut parents = Vec::new();
        let mut extra_headers = Vec::new();

        let mut pos = 0;
        while pos < content.len() {
            // A blank line separates headers from the message.
            if content[pos] == b'\n' {
                pos += 1;
                break;
            }

            let line_end = content[pos..]
                .find_byte(b'\n')
                .map(|p| p + pos)
                .unwrap_or(content.len());
            let line = &content[pos..line_end];

            let space_pos = line.find_byte(b' ').ok_or_else(|| {
                ObjectError::InvalidHeader(format!(
                    "malformed commit header line: {:?}",
                    line.as_bstr()
                ))
            })?;
            let (key, value) = (&line[..space_pos], &line[space_pos + 1..]);

            match key {
                b"tree" => {
                    let hex = std::str::from_utf8(value)
                        .map_err(|_| ObjectError::InvalidHeader("non-UTF8 tree id".into()))?;
                    tree = Some(ObjectId::from_hex(hex)?);
                }
                b"parent" => {
                    let hex = std::str::from_utf8(value)
                        .map_err(|_| ObjectError::InvalidHeader("non-UTF8 parent id".into()))?;
                    parents.push(ObjectId::from_hex(hex)?);
                }
                _ => {
                    extra_headers.push((BString::from(key), BString::from(value)));
                }
            }
            pos = line_end + 1;
        }

        let tree = tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?;
        let message = BString::from(&content[pos.min(content.len())..]);

        Ok(Self {
            tree,
            parents,
            extra_headers,
            message,
        })
    }

    /// Serialize commit content (no object header).
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');
        for parent in &self.parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }
        for (key, value) in &self.extra_headers {
            out.extend_from_slice(key);
            out.push(b' ');
            out.extend_from_slice(value);
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}
