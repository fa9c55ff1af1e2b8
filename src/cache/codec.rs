//! Binary representation of embedding vectors.
//!
//! An embedding is stored as its raw little-endian `f32` bytes, four bytes
//! per element with no header or length prefix. The element count is the
//! blob length divided by four.

// Author: kelexine (https://github.com/kelexine)

use crate::error::{ProxyError, Result};

const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Encode an embedding into its storage blob.
pub fn encode(embedding: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(embedding.len() * F32_WIDTH);
    for value in embedding {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

/// Decode a storage blob back into an embedding.
///
/// Values are reinterpreted bit for bit, so NaN payloads and infinities
/// come back unchanged.
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % F32_WIDTH != 0 {
        return Err(ProxyError::CorruptEmbedding { len: bytes.len() });
    }

    Ok(bytes
        .chunks_exact(F32_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
