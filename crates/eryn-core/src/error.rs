//! Low-level errors from the BDP832 codec and buffer primitives.
//!
//! These are distinct from [`crate::chunk`]'s line/column reporting and from
//! the higher-level `CompilationError`/`RenderingError` types defined in the
//! `eryn-compiler` and `eryn-render` crates: this enum only ever surfaces
//! when a byte buffer does not contain a structurally valid BDP832 pair
//! stream, which should not happen for OSH produced by a correct compiler.

/// Errors raised while reading or writing BDP832-encoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum CoreError {
    /// The buffer ended before a length-prefixed field could be read in full.
    #[cfg_attr(feature = "std", error("unexpected end of buffer: needed {needed} bytes at offset {at}"))]
    UnexpectedEof {
        /// Bytes required to complete the read.
        needed: usize,
        /// Offset at which the read began.
        at: usize,
    },
    /// A name or value length field exceeded what its byte width can hold,
    /// or a caller-supplied name/value exceeds the BDP832 header's maximum.
    #[cfg_attr(feature = "std", error("length {len} exceeds the maximum for a {field} field"))]
    LengthOverflow {
        /// Which field overflowed (`"name"` or `"value"`).
        field: &'static str,
        /// The length that was rejected.
        len: usize,
    },
    /// Bytes remained in the buffer after decoding, where the caller expected
    /// exactly one complete structure.
    #[cfg_attr(feature = "std", error("{extra} trailing byte(s) after decoding"))]
    TrailingBytes {
        /// Number of unconsumed bytes.
        extra: usize,
    },
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CoreError::UnexpectedEof { needed, at } => {
                write!(f, "unexpected end of buffer: needed {needed} bytes at offset {at}")
            },
            CoreError::LengthOverflow { field, len } => {
                write!(f, "length {len} exceeds the maximum for a {field} field")
            },
            CoreError::TrailingBytes { extra } => write!(f, "{extra} trailing byte(s) after decoding"),
        }
    }
}
