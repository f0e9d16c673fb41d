use std::io::prelude::*;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::CompressionError;

/// Compresses payloads before they are stored.
///
/// Implementations are shared between batches, and between stages when wrapped
/// in an `Arc`, hence the `Send + Sync` bound. They must be deterministic for
/// identical input.
pub trait Compressor: Send + Sync {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError>;
}

/// Read-side counterpart of a `Compressor`.
pub trait Decompressor: Send + Sync {
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCompressor;

impl Compressor for NoOpCompressor {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDecompressor;

impl Decompressor for NoOpDecompressor {
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZlibCompressor {
    level: Compression,
}

impl ZlibCompressor {
    /// `level` ranges from 0 (store only) to 9 (best compression).
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for ZlibCompressor {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
        encoder.write_all(bytes)?;
        Ok(encoder.finish()?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibDecompressor;

impl Decompressor for ZlibDecompressor {
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut decoder = ZlibDecoder::new(bytes);
        let mut out = Vec::with_capacity(bytes.len() * 2);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = br#"{"event_sequence":{"user_id":"alice","events":[{"created":null,"type":"job_succeeded","job_id":"a"},{"created":null,"type":"job_succeeded","job_id":"b"}]}}"#;

    #[test]
    fn zlib_compresses_and_restores() {
        let compressed = ZlibCompressor::new(9).compress(PAYLOAD).unwrap();
        assert_ne!(compressed, PAYLOAD);
        assert_eq!(ZlibDecompressor.decompress(&compressed).unwrap(), PAYLOAD);
    }

    #[test]
    fn zlib_is_deterministic() {
        let compressor = ZlibCompressor::default();
        assert_eq!(
            compressor.compress(PAYLOAD).unwrap(),
            compressor.compress(PAYLOAD).unwrap()
        );
    }

    #[test]
    fn zlib_rejects_corrupt_input() {
        assert!(ZlibDecompressor.decompress(b"not zlib at all").is_err());
    }

    #[test]
    fn noop_passes_bytes_through() {
        let compressed = NoOpCompressor.compress(PAYLOAD).unwrap();
        assert_eq!(compressed, PAYLOAD);
        assert_eq!(NoOpDecompressor.decompress(&compressed).unwrap(), PAYLOAD);
    }
}
