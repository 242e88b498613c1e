//! [`Buffer`], the growable byte vector the compiler writes OSH into, and
//! [`ConstBuffer`], a non-owning view used to scan source text and cached
//! OSH bytes. A thin wrapper around `Vec<u8>`/`&[u8]` plus the handful of
//! operations the compiler and the iterator-localization rewriter actually
//! need: `write`, `write_at`, `move_right`, and BDP832 pair/name/value
//! writers.

use alloc::vec::Vec;

use crate::bdp::{self, BDP832};
use crate::error::CoreError;
use crate::CoreResult;

/// A growable, owned byte buffer with the primitives the OSH compiler needs:
/// appending raw bytes, patching a previously-reserved slot, and opening an
/// in-place gap for the iterator-localization rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Creates a buffer pre-sized for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity) }
    }

    /// Current length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the buffer's contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer, returning the owned bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Appends `bytes` to the end of the buffer, returning the offset they
    /// were written at.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let at = self.data.len();
        self.data.extend_from_slice(bytes);
        at
    }

    /// Appends `byte` repeated `count` times.
    pub fn repeat(&mut self, byte: u8, count: usize) -> usize {
        let at = self.data.len();
        self.data.resize(self.data.len() + count, byte);
        at
    }

    /// Overwrites `bytes.len()` existing bytes starting at `offset`. The
    /// region `[offset, offset + bytes.len())` must already exist (typically
    /// a zeroed slot reserved earlier with [`Buffer::repeat`]).
    ///
    /// # Panics
    /// Panics if the region is out of bounds.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Patches a previously reserved little-endian jump-offset slot.
    ///
    /// # Panics
    /// Panics if `offset + width` is out of bounds.
    pub fn write_length_at(&mut self, offset: usize, value: u32, width: usize) {
        let bytes = value.to_le_bytes();
        self.data[offset..offset + width].copy_from_slice(&bytes[..width]);
    }

    /// Opens an `n`-byte gap at `offset` by shifting every byte currently at
    /// or past `offset` right by `n`, filling the gap with zero. Used by the
    /// iterator-localization rewriter to splice in namespace prefix/suffix
    /// bytes in place.
    pub fn move_right(&mut self, offset: usize, n: usize) {
        if n == 0 {
            return;
        }
        let old_len = self.data.len();
        self.data.resize(old_len + n, 0);
        self.data.copy_within(offset..old_len, offset + n);
        self.data[offset..offset + n].fill(0);
    }

    /// Writes a BDP832 name field (`u8` length prefix + bytes).
    pub fn write_name(&mut self, name: &[u8]) -> CoreResult<()> {
        let len = bdp::length_to_bytes(name.len(), BDP832.name_length_byte_size, "name")?;
        self.write(&len[..BDP832.name_length_byte_size]);
        self.write(name);
        Ok(())
    }

    /// Writes a BDP832 value field (`u32_le` length prefix + bytes).
    pub fn write_value(&mut self, value: &[u8]) -> CoreResult<()> {
        let len = bdp::length_to_bytes(value.len(), BDP832.value_length_byte_size, "value")?;
        self.write(&len[..BDP832.value_length_byte_size]);
        self.write(value);
        Ok(())
    }

    /// Writes a full BDP832 name/value pair and returns the offset of the
    /// pair's first byte (the compiler's template-stack frames record this
    /// as `outputIndex`).
    pub fn write_pair(&mut self, name: &[u8], value: &[u8]) -> CoreResult<usize> {
        let at = self.data.len();
        self.write_name(name)?;
        self.write_value(value)?;
        Ok(at)
    }

    /// Writes a pair whose value is `n` zeroed jump-offset slots
    /// (`crate::OSH_FORMAT` bytes each), returning `(pair_offset, body_offset)`
    /// where `body_offset` is the first byte past the reserved slots — what
    /// the compiler records as a template-stack frame's `outputBodyIndex`.
    pub fn write_pair_with_reserved_slots(
        &mut self,
        name: &[u8],
        value: &[u8],
        slot_count: usize,
    ) -> CoreResult<(usize, usize)> {
        let at = self.data.len();
        self.write_name(name)?;
        let total_value_len = value.len() + slot_count * crate::OSH_FORMAT;
        let len = bdp::length_to_bytes(total_value_len, BDP832.value_length_byte_size, "value")?;
        self.write(&len[..BDP832.value_length_byte_size]);
        self.write(value);
        self.repeat(0, slot_count * crate::OSH_FORMAT);
        let body = self.data.len();
        Ok((at, body))
    }
}

/// A non-owning view over a byte slice, used to scan source text or cached
/// OSH without copying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstBuffer<'a> {
    data: &'a [u8],
}

impl<'a> ConstBuffer<'a> {
    /// Wraps `data` in a view.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Length of the underlying slice.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the underlying bytes.
    #[must_use]
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// One past the last valid index — the sentinel the renderer's loop and
    /// conditional stacks compare cursors against.
    #[must_use]
    pub fn end(&self) -> usize {
        self.data.len()
    }

    /// Whether `pattern` occurs starting exactly at `offset`.
    #[must_use]
    pub fn match_at(&self, offset: usize, pattern: &[u8]) -> bool {
        let end = offset.saturating_add(pattern.len());
        end <= self.data.len() && &self.data[offset..end] == pattern
    }

    /// Finds the first occurrence of `pattern` at or after `offset`.
    #[must_use]
    pub fn find_index(&self, offset: usize, pattern: &[u8]) -> Option<usize> {
        if pattern.is_empty() || offset > self.data.len() {
            return None;
        }
        self.data[offset..]
            .windows(pattern.len())
            .position(|w| w == pattern)
            .map(|i| i + offset)
    }

    /// Finds the first occurrence of `pattern` anywhere in the buffer.
    #[must_use]
    pub fn find(&self, pattern: &[u8]) -> Option<usize> {
        self.find_index(0, pattern)
    }

    /// Reads a `width`-byte little-endian jump-offset slot starting at `offset`.
    pub fn read_u32_le(&self, offset: usize, width: usize) -> CoreResult<u32> {
        if offset + width > self.data.len() {
            return Err(CoreError::UnexpectedEof { needed: width, at: offset });
        }
        Ok(bdp::bytes_to_length(&self.data[offset..offset + width], width) as u32)
    }

    /// Decodes one BDP832 pair starting at `offset`, returning
    /// `(name, value, next_offset)`.
    pub fn read_pair(&self, offset: usize) -> CoreResult<(&'a [u8], &'a [u8], usize)> {
        let name_len_width = BDP832.name_length_byte_size;
        if offset + name_len_width > self.data.len() {
            return Err(CoreError::UnexpectedEof { needed: name_len_width, at: offset });
        }
        let name_len = bdp::bytes_to_length(&self.data[offset..offset + name_len_width], name_len_width);
        let name_start = offset + name_len_width;
        let name_end = name_start + name_len;
        if name_end > self.data.len() {
            return Err(CoreError::UnexpectedEof { needed: name_len, at: name_start });
        }

        let value_len_width = BDP832.value_length_byte_size;
        let value_len_start = name_end;
        let value_len_end = value_len_start + value_len_width;
        if value_len_end > self.data.len() {
            return Err(CoreError::UnexpectedEof { needed: value_len_width, at: value_len_start });
        }
        let value_len = bdp::bytes_to_length(&self.data[value_len_start..value_len_end], value_len_width);
        let value_start = value_len_end;
        let value_end = value_start + value_len;
        if value_end > self.data.len() {
            return Err(CoreError::UnexpectedEof { needed: value_len, at: value_start });
        }

        Ok((&self.data[name_start..name_end], &self.data[value_start..value_end], value_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_pair_roundtrips() {
        let mut buf = Buffer::new();
        buf.write_pair(b"p", b"hello").unwrap();
        let view = ConstBuffer::new(buf.as_slice());
        let (name, value, next) = view.read_pair(0).unwrap();
        assert_eq!(name, b"p");
        assert_eq!(value, b"hello");
        assert_eq!(next, view.end());
    }

    #[test]
    fn reserved_slots_are_patchable() {
        let mut buf = Buffer::new();
        let (pair_at, body_at) = buf.write_pair_with_reserved_slots(b"?", b"x>1", 2).unwrap();
        assert!(pair_at == 0);
        buf.write_length_at(body_at - 2 * crate::OSH_FORMAT, 42, crate::OSH_FORMAT);
        buf.write_length_at(body_at - crate::OSH_FORMAT, 7, crate::OSH_FORMAT);
        let view = ConstBuffer::new(buf.as_slice());
        assert_eq!(view.read_u32_le(body_at - 2 * crate::OSH_FORMAT, crate::OSH_FORMAT).unwrap(), 42);
        assert_eq!(view.read_u32_le(body_at - crate::OSH_FORMAT, crate::OSH_FORMAT).unwrap(), 7);
    }

    #[test]
    fn move_right_opens_a_gap() {
        let mut buf = Buffer::new();
        buf.write(b"abcdef");
        buf.move_right(2, 3);
        assert_eq!(buf.as_slice(), b"ab\0\0\0cdef");
        buf.write_at(2, b"XYZ");
        assert_eq!(buf.as_slice(), b"abXYZcdef");
    }

    #[test]
    fn find_index_scans_forward() {
        let data = b"hello world hello";
        let view = ConstBuffer::new(data);
        assert_eq!(view.find(b"hello"), Some(0));
        assert_eq!(view.find_index(1, b"hello"), Some(12));
        assert_eq!(view.find(b"nope"), None);
    }
}
