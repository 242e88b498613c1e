//! Core primitives for the OSH bytecode format: BDP832 name/value pairs,
//! the growable [`Buffer`] writer and non-owning [`ConstBuffer`] reader,
//! and the chunk-based error snippet extractor used by compilation errors.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bdp;
pub mod buffer;
pub mod chunk;
pub mod error;

pub use bdp::{Header, BDP832};
pub use buffer::{Buffer, ConstBuffer};
pub use chunk::Chunk;
pub use error::CoreError;

/// Byte width of a single jump offset slot (`end_off`, `true_end_off`,
/// `back_off`, `content_len`, …). All such slots are 4-byte little-endian
/// unsigned integers.
pub const OSH_FORMAT: usize = 4;

/// Result alias for the low-level codec operations in this crate.
pub type CoreResult<T> = Result<T, CoreError>;
