/// A blob: raw file content, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Parse blob content. A blob is exactly its bytes.
    pub fn parse(content: &[u8]) -> Self {
        Self {
            data: content.to_vec(),
        }
    }

    /// Serialize: the raw data.
    pub fn serialize_content(&self) -> &[u8] {
        &self.data
    }
}
