//! Per-path diagnostic log.
//!
//! Conflict notices and warnings accumulate here keyed by path; the caller
//! drains them after the merge, sorted by path, each message on its own
//! line.

use std::collections::HashMap;
use std::io;

use bstr::{BStr, BString, ByteSlice};

/// One logged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    /// Skippable when replaying the merge for a remerge diff.
    pub omittable: bool,
}

/// Append-only map of path → messages.
#[derive(Debug, Default)]
pub struct OutputLog {
    messages: HashMap<BString, Vec<Message>>,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message for `path`.
    pub fn push(&mut self, path: &BStr, omittable: bool, text: String) {
        self.messages
            .entry(BString::from(path))
            .or_default()
            .push(Message { text, omittable });
    }

    /// Messages recorded for one path, in insertion order.
    pub fn messages_for(&self, path: &BStr) -> &[Message] {
        self.messages.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether anything was logged.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All paths with messages, sorted.
    pub fn paths(&self) -> Vec<&BStr> {
        let mut paths: Vec<&BStr> = self.messages.keys().map(|p| p.as_bstr()).collect();
        paths.sort();
        paths
    }

    /// Emit every message, paths sorted, one line per message.
    pub fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for path in self.paths() {
            for msg in self.messages_for(path) {
                out.write_all(msg.text.as_bytes())?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}
