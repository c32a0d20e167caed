//! Chunk locations and buffer handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a chunk inside an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkLoc {
    /// Slab class index (0 = smallest chunk size)
    pub class: u32,
    /// Slab index within the class
    pub slab: u32,
    /// Chunk index within the slab
    pub chunk: u32,
}

impl ChunkLoc {
    /// Null sentinel, never a valid location
    pub const EMPTY: ChunkLoc = ChunkLoc {
        class: u32::MAX,
        slab: u32::MAX,
        chunk: u32::MAX,
    };

    /// Create a new chunk location
    pub fn new(class: u32, slab: u32, chunk: u32) -> Self {
        Self { class, slab, chunk }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn class_index(&self) -> usize {
        self.class as usize
    }

    pub fn slab_index(&self) -> usize {
        self.slab as usize
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk as usize
    }
}

impl Default for ChunkLoc {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for ChunkLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Chunk(empty)");
        }
        write!(
            f,
            "Chunk(class={}, slab={}, chunk={})",
            self.class, self.slab, self.chunk
        )
    }
}

/// Handle to a buffer handed out by an [`Arena`](super::Arena)
///
/// A `Buf` is a view of `len` bytes at the start of a chunk. It carries no
/// lifetime: the arena owns the memory and checks every handle it is given.
/// Copying a handle does not take a reference; use `add_ref` for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Buf {
    pub(crate) magic: u32,
    pub(crate) loc: ChunkLoc,
    pub(crate) len: usize,
}

impl Buf {
    pub(crate) fn new(magic: u32, loc: ChunkLoc, len: usize) -> Self {
        Self { magic, loc, len }
    }

    /// The null handle. No arena owns it.
    pub fn null() -> Self {
        Self {
            magic: 0,
            loc: ChunkLoc::EMPTY,
            len: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.loc.is_empty()
    }

    /// Number of bytes visible through this handle
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the backing chunk
    pub fn loc(&self) -> ChunkLoc {
        self.loc
    }

    /// A shorter view of the same chunk.
    ///
    /// Lengths beyond the current one are clamped; a view never grows.
    pub fn truncate(&self, len: usize) -> Buf {
        Buf {
            len: len.min(self.len),
            ..*self
        }
    }
}

impl Default for Buf {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for Buf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buf(len={}, {})", self.len, self.loc)
    }
}
