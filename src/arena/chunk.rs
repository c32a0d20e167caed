//! Chunk metadata

use super::loc::ChunkLoc;

/// Stored `next` pointer of a live chunk: the target chunk and the length of
/// the buffer view that was linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub loc: ChunkLoc,
    pub len: usize,
}

/// A free chunk sits on its class free list and nowhere else; a live chunk
/// is never on the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Free { next_free: Option<ChunkLoc> },
    InUse { refs: u32, next: Option<Link> },
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub loc: ChunkLoc,
    pub state: ChunkState,
}

impl Chunk {
    pub fn free(loc: ChunkLoc, next_free: Option<ChunkLoc>) -> Self {
        Self {
            loc,
            state: ChunkState::Free { next_free },
        }
    }

    /// Current reference count; 0 for a free chunk.
    pub fn refs(&self) -> u32 {
        match self.state {
            ChunkState::Free { .. } => 0,
            ChunkState::InUse { refs, .. } => refs,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, ChunkState::Free { .. })
    }

    pub fn next(&self) -> Option<Link> {
        match self.state {
            ChunkState::Free { .. } => None,
            ChunkState::InUse { next, .. } => next,
        }
    }
}
