//! Input buffers: a cursor over text or file bytes.
//!
//! The matcher moves the cursor with [`InputBuffer::read`] and its exact
//! inverse [`InputBuffer::unread`], or jumps back to a position it has already
//! visited with [`InputBuffer::seek`]. Cloning a buffer copies the cursor but
//! shares the storage, so exploring a branch never duplicates the input.

use std::sync::Arc;

use ropey::Rope;

#[derive(Debug, Clone)]
enum Storage {
    /// In-memory text. `Rope` clones share their chunks.
    Text(Rope),
    /// Raw bytes, which need not be valid UTF-8.
    Bytes(Arc<[u8]>),
}

/// A position-addressable, byte-oriented view over some input.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    storage: Storage,
    pos: u64,
}

impl InputBuffer {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Self {
        Self::from_rope(Rope::from_str(text))
    }

    pub fn from_rope(rope: Rope) -> Self {
        Self {
            storage: Storage::Text(rope),
            pos: 0,
        }
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            storage: Storage::Bytes(bytes.into()),
            pos: 0,
        }
    }

    /// Total number of bytes in the input.
    pub fn size(&self) -> u64 {
        match &self.storage {
            Storage::Text(rope) => rope.len_bytes() as u64,
            Storage::Bytes(bytes) => bytes.len() as u64,
        }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.size()
    }

    /// Peek at an arbitrary byte without moving the cursor.
    pub fn byte_at(&self, pos: u64) -> Option<u8> {
        if pos >= self.size() {
            return None;
        }
        let idx = pos as usize;
        match &self.storage {
            Storage::Text(rope) => Some(rope.byte(idx)),
            Storage::Bytes(bytes) => Some(bytes[idx]),
        }
    }

    /// Read a single byte, advancing only if one was available.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = self.byte_at(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Read up to `len` bytes. A short result means the end of input was hit;
    /// the cursor advances by exactly the number of bytes returned.
    pub fn read(&mut self, len: u64) -> Vec<u8> {
        let end = self.pos.saturating_add(len).min(self.size());
        let out = self.slice(self.pos, end);
        self.pos = end;
        out
    }

    /// Move the cursor back `len` bytes.
    pub fn unread(&mut self, len: u64) {
        debug_assert!(len <= self.pos, "unread past start of input");
        self.pos = self.pos.saturating_sub(len);
    }

    /// Put the cursor at `pos`, which must lie within the input.
    pub fn seek(&mut self, pos: u64) {
        debug_assert!(pos <= self.size(), "seek past end of input");
        self.pos = pos.min(self.size());
    }

    /// Roll the cursor back to an earlier position.
    pub fn rewind_to(&mut self, pos: u64) {
        debug_assert!(pos <= self.pos, "rewind must move backwards");
        self.unread(self.pos - pos);
    }

    /// Copy the bytes in `start..end` without moving the cursor.
    pub fn slice(&self, start: u64, end: u64) -> Vec<u8> {
        let end = end.min(self.size());
        if start >= end {
            return Vec::new();
        }
        match &self.storage {
            Storage::Text(rope) => (start..end).map(|i| rope.byte(i as usize)).collect(),
            Storage::Bytes(bytes) => bytes[start as usize..end as usize].to_vec(),
        }
    }

    /// The whole input as bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.storage {
            Storage::Text(rope) => rope.bytes().collect(),
            Storage::Bytes(bytes) => bytes.to_vec(),
        }
    }

    /// A fresh buffer holding exactly `bytes`.
    ///
    /// Text stays in a rope while it is valid UTF-8. A replacement that splits
    /// a multi-byte character falls back to raw bytes.
    pub fn with_contents(&self, bytes: Vec<u8>) -> Self {
        match &self.storage {
            Storage::Text(_) => match String::from_utf8(bytes) {
                Ok(text) => Self::from_str(&text),
                Err(err) => Self::from_bytes(err.into_bytes()),
            },
            Storage::Bytes(_) => Self::from_bytes(bytes),
        }
    }

    /// A clone of this buffer with the cursor at the start.
    pub fn rewound(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            pos: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_read_advances() {
        let mut buf = InputBuffer::from_str("hello");
        assert_eq!(buf.read(3), b"hel");
        assert_eq!(buf.position(), 3);
        assert!(!buf.at_end());
    }

    #[test]
    fn test_short_read_at_end() {
        let mut buf = InputBuffer::from_str("abc");
        buf.read(2);
        assert_eq!(buf.read(5), b"c");
        assert_eq!(buf.position(), 3);
        assert!(buf.at_end());
        assert!(buf.read(1).is_empty());
        assert_eq!(buf.read_byte(), None);
        assert_eq!(buf.position(), 3);
    }

    #[test]
    fn test_unread_restores_position() {
        let mut buf = InputBuffer::from_bytes(b"abcdef".to_vec());
        buf.read(4);
        buf.unread(4);
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.read_byte(), Some(b'a'));
    }

    #[test]
    fn test_clone_has_independent_cursor() {
        let mut a = InputBuffer::from_str("xyz");
        a.read(1);
        let mut b = a.clone();
        b.read(2);
        assert_eq!(a.position(), 1);
        assert_eq!(b.position(), 3);
    }

    #[test]
    fn test_byte_at_and_slice() {
        let buf = InputBuffer::from_str("a\nb");
        assert_eq!(buf.byte_at(1), Some(b'\n'));
        assert_eq!(buf.byte_at(3), None);
        assert_eq!(buf.slice(0, 2), b"a\n");
        assert_eq!(buf.slice(2, 10), b"b");
        assert!(buf.slice(2, 1).is_empty());
    }

    #[test]
    fn test_with_contents_keeps_kind() {
        let text = InputBuffer::from_str("old");
        let replaced = text.with_contents(b"new!".to_vec());
        assert_eq!(replaced.size(), 4);
        assert_eq!(replaced.to_bytes(), b"new!");

        let raw = InputBuffer::from_bytes(vec![0xff, 0x00]);
        assert_eq!(raw.with_contents(vec![0xfe]).to_bytes(), vec![0xfe]);
    }

    #[test]
    fn test_with_contents_keeps_split_characters() {
        let text = InputBuffer::from_str("é");
        let replaced = text.with_contents(vec![0xa9]);
        assert_eq!(replaced.size(), 1);
        assert_eq!(replaced.to_bytes(), vec![0xa9]);
        assert_eq!(replaced.byte_at(0), Some(0xa9));
    }

    #[test]
    fn test_seek_moves_both_ways() {
        let mut buf = InputBuffer::from_str("abcdef");
        buf.seek(4);
        assert_eq!(buf.read_byte(), Some(b'e'));
        buf.seek(1);
        assert_eq!(buf.read_byte(), Some(b'b'));
    }

    proptest! {
        #[test]
        fn prop_read_then_unread_is_identity(text in ".{0,40}", skip in 0u64..20, len in 0u64..20) {
            let mut buf = InputBuffer::from_str(&text);
            let skipped = buf.read(skip).len() as u64;
            let before = buf.position();
            prop_assert_eq!(before, skipped);
            let got = buf.read(len).len() as u64;
            buf.unread(got);
            prop_assert_eq!(buf.position(), before);
        }
    }
}
