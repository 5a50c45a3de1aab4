//! # cramz
//!
//! Entropy-coding and block-compression core for CRAM containers: the
//! byte-level codecs that pack and unpack genomic read data inside CRAM
//! blocks.
//!
//! - [`codec::rans`] — rANS 4x8 order-0/order-1, four interleaved states
//! - [`codec::range`] — adaptive arithmetic (range) coding
//! - [`codec::huffman`] — canonical Huffman over byte alphabets
//! - [`codec::golomb`] — Golomb/Golomb-Rice (legacy encodings)
//! - [`codec::name_tok`] — read-name tokenizer/detokenizer
//! - [`codec`] — per-block-method façade ([`BlockMethod`], [`compress`],
//!   [`uncompress`])
//!
//! Every codec is a pure, synchronous transform over complete in-memory
//! buffers: no streaming, no internal threads, no state shared between
//! calls. Callers may compress independent blocks concurrently with the
//! same (or no) compressor instance.
//!
//! Failures carry a [`CodecError`] inside the `anyhow::Error`, separating
//! corrupt streams from bad parameters and from codec variants this build
//! does not implement:
//!
//! ```
//! use cramz_lib::{compress, uncompress, BlockMethod};
//!
//! let block = b"read1\0read2\0read10\0";
//! let packed = compress(BlockMethod::Rans, block)?;
//! assert_eq!(uncompress(BlockMethod::Rans, &packed)?, block);
//! # anyhow::Ok(())
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod error;

pub use codec::{compress, uncompress, BlockCompressor, BlockMethod, ByteCodec};
pub use error::CodecError;
