//! Object identity for tern's content-addressed storage.
//!
//! Provides the core [`ObjectId`] type, the [`HashAlgorithm`] parameter the
//! rest of the system is generic over (SHA-1 or SHA-256), hex
//! encoding/decoding, and a streaming [`hasher::Hasher`].

mod algorithm;
pub mod hasher;
pub mod hex;
mod oid;

pub use algorithm::HashAlgorithm;
pub use oid::ObjectId;

/// Errors produced by hash and object-id operations.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("SHA-1 collision detected")]
    Sha1Collision,
}
