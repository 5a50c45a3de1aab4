//! Codec façade: one `compress`/`uncompress` pair per CRAM block
//! compression method.
//!
//! The container layer stores a method tag per block and hands this module
//! the block payload; everything here is a pure in-memory transform. All
//! compressors are stateless beyond construction-time parameters, so one
//! instance can serve concurrent blocks on different threads.

pub mod golomb;
pub mod huffman;
pub mod name_tok;
pub mod primitives;
pub mod range;
pub mod rans;

use anyhow::Result;
use std::io::{Read, Write};
use tracing::debug;

use crate::error::{malformed, unsupported};

/// CRAM block compression method tags. Values 0-8 follow the published
/// external compression ids; HUFFMAN and GOLOMB are descriptor-level
/// codecs exposed through the same byte-level contract under private-use
/// ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockMethod {
    /// Stored uncompressed.
    Raw,
    /// gzip (RFC 1952).
    Gzip,
    /// bzip2.
    Bzip2,
    /// LZMA; recognized but not implemented by this build.
    Lzma,
    /// rANS 4x8, order 0 or 1 (a leading byte inside the payload).
    Rans,
    /// Adaptive arithmetic (range) coding.
    Range,
    /// Read-name tokenizer.
    NameTok,
    /// FQZComp quality codec; recognized but not implemented.
    Fqzcomp,
    /// Canonical Huffman byte coding (legacy descriptor codec).
    Huffman,
    /// Golomb coding (legacy descriptor codec).
    Golomb,
}

impl BlockMethod {
    /// Wire id of this method.
    pub fn id(&self) -> u8 {
        match self {
            BlockMethod::Raw => 0,
            BlockMethod::Gzip => 1,
            BlockMethod::Bzip2 => 2,
            BlockMethod::Lzma => 3,
            BlockMethod::Rans => 4,
            BlockMethod::Range => 6,
            BlockMethod::NameTok => 7,
            BlockMethod::Fqzcomp => 8,
            BlockMethod::Huffman => 16,
            BlockMethod::Golomb => 17,
        }
    }

    /// Resolve a wire id. Ids that exist in the wild but are not built
    /// (rANS Nx16) report unsupported; ids outside the format are
    /// malformed.
    pub fn from_id(id: u8) -> Result<Self> {
        Ok(match id {
            0 => BlockMethod::Raw,
            1 => BlockMethod::Gzip,
            2 => BlockMethod::Bzip2,
            3 => BlockMethod::Lzma,
            4 => BlockMethod::Rans,
            5 => return Err(unsupported("block method rANS Nx16")),
            6 => BlockMethod::Range,
            7 => BlockMethod::NameTok,
            8 => BlockMethod::Fqzcomp,
            16 => BlockMethod::Huffman,
            17 => BlockMethod::Golomb,
            other => return Err(malformed("block", format!("unknown method id {other}"))),
        })
    }
}

/// Uniform byte-level compression contract shared by every block method.
pub trait ByteCodec {
    /// Compress a whole block payload.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    /// Decompress a whole block payload.
    fn uncompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Concrete per-method compressor. Construction-time parameters only; no
/// state is carried between calls.
#[derive(Debug, Clone, Copy)]
pub enum BlockCompressor {
    /// Pass-through.
    Raw,
    /// gzip at the given level (0-9).
    Gzip {
        /// flate2 compression level.
        level: u32,
    },
    /// bzip2 at the given level (1-9).
    Bzip2 {
        /// bzip2 compression level.
        level: u32,
    },
    /// rANS 4x8; `order: None` tries both orders and keeps the smaller.
    Rans {
        /// Fixed statistical order, or automatic selection.
        order: Option<rans::Order>,
    },
    /// Adaptive range coder with automatic flag selection.
    Range,
    /// Read-name tokenizer over NUL-separated name blocks.
    NameTok {
        /// Entropy-code sub-streams with the range coder instead of rANS.
        use_arith: bool,
    },
    /// Canonical Huffman with the table built from each block.
    Huffman,
    /// Golomb coding of byte values with fixed `(m, offset)`.
    Golomb {
        /// Divisor, >= 2.
        m: i64,
        /// Value shift.
        offset: i64,
    },
}

impl BlockCompressor {
    /// Default compressor for a method tag. LZMA and FQZComp are
    /// recognized methods without an implementation here, reported as
    /// unsupported rather than malformed.
    pub fn for_method(method: BlockMethod) -> Result<Self> {
        Ok(match method {
            BlockMethod::Raw => BlockCompressor::Raw,
            BlockMethod::Gzip => BlockCompressor::Gzip { level: 6 },
            BlockMethod::Bzip2 => BlockCompressor::Bzip2 { level: 9 },
            BlockMethod::Rans => BlockCompressor::Rans { order: None },
            BlockMethod::Range => BlockCompressor::Range,
            BlockMethod::NameTok => BlockCompressor::NameTok { use_arith: false },
            BlockMethod::Huffman => BlockCompressor::Huffman,
            BlockMethod::Golomb => BlockCompressor::Golomb { m: 16, offset: 0 },
            BlockMethod::Lzma => return Err(unsupported("block method LZMA")),
            BlockMethod::Fqzcomp => return Err(unsupported("block method FQZComp")),
        })
    }

    /// Method tag this compressor writes.
    pub fn method(&self) -> BlockMethod {
        match self {
            BlockCompressor::Raw => BlockMethod::Raw,
            BlockCompressor::Gzip { .. } => BlockMethod::Gzip,
            BlockCompressor::Bzip2 { .. } => BlockMethod::Bzip2,
            BlockCompressor::Rans { .. } => BlockMethod::Rans,
            BlockCompressor::Range => BlockMethod::Range,
            BlockCompressor::NameTok { .. } => BlockMethod::NameTok,
            BlockCompressor::Huffman => BlockMethod::Huffman,
            BlockCompressor::Golomb { .. } => BlockMethod::Golomb,
        }
    }
}

impl ByteCodec for BlockCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let out = match *self {
            BlockCompressor::Raw => Ok(data.to_vec()),
            BlockCompressor::Gzip { level } => gzip_compress(data, level),
            BlockCompressor::Bzip2 { level } => bzip2_compress(data, level),
            BlockCompressor::Rans { order: Some(order) } => rans::compress(data, order),
            BlockCompressor::Rans { order: None } => {
                let o0 = rans::compress(data, rans::Order::Zero)?;
                let o1 = rans::compress(data, rans::Order::One)?;
                Ok(if o1.len() < o0.len() { o1 } else { o0 })
            }
            BlockCompressor::Range => range::compress(data),
            BlockCompressor::NameTok { use_arith } => name_tok::compress_block(data, use_arith),
            BlockCompressor::Huffman => huffman::compress(data),
            BlockCompressor::Golomb { m, offset } => golomb::compress(data, m, offset),
        }?;
        debug!(
            method = ?self.method(),
            raw = data.len(),
            compressed = out.len(),
            "block compress"
        );
        Ok(out)
    }

    fn uncompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match *self {
            BlockCompressor::Raw => Ok(data.to_vec()),
            BlockCompressor::Gzip { .. } => gzip_uncompress(data),
            BlockCompressor::Bzip2 { .. } => bzip2_uncompress(data),
            BlockCompressor::Rans { .. } => rans::uncompress(data),
            BlockCompressor::Range => range::uncompress(data),
            BlockCompressor::NameTok { .. } => name_tok::uncompress_block(data),
            BlockCompressor::Huffman => huffman::uncompress(data),
            BlockCompressor::Golomb { .. } => golomb::uncompress(data),
        }
    }
}

/// Compress `data` with the default compressor for `method`.
pub fn compress(method: BlockMethod, data: &[u8]) -> Result<Vec<u8>> {
    BlockCompressor::for_method(method)?.compress(data)
}

/// Decompress `data` that was compressed with `method`.
pub fn uncompress(method: BlockMethod, data: &[u8]) -> Result<Vec<u8>> {
    BlockCompressor::for_method(method)?.uncompress(data)
}

fn gzip_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut enc = flate2::write::GzEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        flate2::Compression::new(level),
    );
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn gzip_uncompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| malformed("gzip", e.to_string()))?;
    Ok(out)
}

fn bzip2_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut enc = bzip2::write::BzEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        bzip2::Compression::new(level),
    );
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn bzip2_uncompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    bzip2::read::BzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| malformed("bzip2", e.to_string()))?;
    Ok(out)
}
