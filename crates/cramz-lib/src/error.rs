//! Error taxonomy for the codec core.
//!
//! All public entry points return `anyhow::Result`, but every failure this
//! crate originates carries a [`CodecError`] so the block layer can
//! `downcast_ref::<CodecError>()` and tell a corrupt file apart from a bad
//! construction parameter or a codec variant this build does not implement.

use thiserror::Error;

/// Classified failures produced by the codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input byte stream violates the codec's wire format (bad magic or
    /// order byte, frequency table not summing to its total, truncation).
    /// Decoding aborts without producing partial output.
    #[error("malformed {codec} stream: {reason}")]
    Malformed {
        /// Codec that rejected the stream.
        codec: &'static str,
        /// What was wrong with the bytes.
        reason: String,
    },

    /// Construction-time parameter error (Golomb `m < 2`, Huffman code
    /// overflow, mismatched parallel arrays). Raised before any encode or
    /// decode work starts.
    #[error("invalid {codec} parameters: {reason}")]
    InvalidParams {
        /// Codec whose parameters were rejected.
        codec: &'static str,
        /// Which parameter constraint failed.
        reason: String,
    },

    /// The stream or method is recognized but not implemented by this build.
    /// Distinct from [`CodecError::Malformed`]: the file may be fine.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub(crate) fn malformed(codec: &'static str, reason: impl Into<String>) -> anyhow::Error {
    CodecError::Malformed {
        codec,
        reason: reason.into(),
    }
    .into()
}

pub(crate) fn invalid_params(codec: &'static str, reason: impl Into<String>) -> anyhow::Error {
    CodecError::InvalidParams {
        codec,
        reason: reason.into(),
    }
    .into()
}

pub(crate) fn unsupported(what: impl Into<String>) -> anyhow::Error {
    CodecError::Unsupported(what.into()).into()
}
