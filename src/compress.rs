//! Zlib round-trip for stored text content.
//!
//! Memory and knowledge-node content is compressed at rest; readers get it
//! back decompressed and lossless.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{StoreError, StoreResult};

/// Compress text for storage.
pub fn compress(text: &str) -> StoreResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| StoreError::Compression {
            message: format!("encode failed: {e}"),
        })?;
    encoder.finish().map_err(|e| StoreError::Compression {
        message: format!("finish failed: {e}"),
    })
}

/// Decompress stored content back to text.
pub fn decompress(bytes: &[u8]) -> StoreResult<String> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| StoreError::Compression {
            message: format!("decode failed: {e}"),
        })?;
    Ok(text)
}
