//! Slab class management for the slab arena

use super::chunk::{Chunk, ChunkState};
use super::footer::{Footer, FOOTER_LEN};
use super::loc::ChunkLoc;
use super::size_class::chunks_per_slab;
use super::source::SlabSource;
use crate::error::{Error, Result};
use tracing::debug;

/// One contiguous memory block sliced into equal chunks.
///
/// Chunk `i` occupies `[i * stride, i * stride + chunk_size)` followed by its
/// footer, where `stride = chunk_size + FOOTER_LEN`.
#[derive(Debug)]
pub struct Slab {
    memory: Box<[u8]>,
    chunks: Vec<Chunk>,
}

/// A pool of chunks sharing one chunk size
///
/// Free chunks are threaded into a LIFO list through their own metadata, so
/// the most recently released chunk is the next one handed out.
#[derive(Debug)]
pub struct SlabClass {
    index: u32,
    chunk_size: usize,
    slabs: Vec<Slab>,
    free_head: Option<ChunkLoc>,
    free_count: usize,
    pushes: u64,
    pops: u64,
}

impl SlabClass {
    /// Create an empty class; memory is only acquired on first use.
    pub fn new(index: u32, chunk_size: usize) -> Self {
        Self {
            index,
            chunk_size,
            slabs: Vec::new(),
            free_head: None,
            free_count: 0,
            pushes: 0,
            pops: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn num_slabs(&self) -> usize {
        self.slabs.len()
    }

    pub fn num_chunks(&self) -> usize {
        self.slabs.iter().map(|s| s.chunks.len()).sum()
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    pub fn in_use_count(&self) -> usize {
        self.num_chunks() - self.free_count
    }

    pub fn free_is_empty(&self) -> bool {
        self.free_head.is_none()
    }

    pub fn free_head(&self) -> Option<ChunkLoc> {
        self.free_head
    }

    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    pub fn pops(&self) -> u64 {
        self.pops
    }

    fn stride(&self) -> usize {
        self.chunk_size + FOOTER_LEN
    }

    fn slab(&self, loc: ChunkLoc) -> Option<&Slab> {
        if loc.class != self.index {
            return None;
        }
        let slab = self.slabs.get(loc.slab_index())?;
        (loc.chunk_index() < slab.chunks.len()).then_some(slab)
    }

    fn slab_mut(&mut self, loc: ChunkLoc) -> Option<&mut Slab> {
        if loc.class != self.index {
            return None;
        }
        let slab = self.slabs.get_mut(loc.slab_index())?;
        (loc.chunk_index() < slab.chunks.len()).then_some(slab)
    }

    /// Chunk metadata; `None` for the empty sentinel or out-of-range locations.
    pub fn chunk(&self, loc: ChunkLoc) -> Option<&Chunk> {
        self.slab(loc).map(|s| &s.chunks[loc.chunk_index()])
    }

    pub fn chunk_mut(&mut self, loc: ChunkLoc) -> Option<&mut Chunk> {
        self.slab_mut(loc).map(|s| &mut s.chunks[loc.chunk_index()])
    }

    /// Usable memory of a chunk, without its footer.
    pub fn chunk_mem(&self, loc: ChunkLoc) -> Option<&[u8]> {
        let start = loc.chunk_index() * self.stride();
        let end = start + self.chunk_size;
        self.slab(loc).map(|s| &s.memory[start..end])
    }

    pub fn chunk_mem_mut(&mut self, loc: ChunkLoc) -> Option<&mut [u8]> {
        let start = loc.chunk_index() * self.stride();
        let end = start + self.chunk_size;
        self.slab_mut(loc).map(|s| &mut s.memory[start..end])
    }

    pub fn footer(&self, loc: ChunkLoc) -> Option<Footer> {
        let start = loc.chunk_index() * self.stride() + self.chunk_size;
        self.slab(loc)
            .and_then(|s| Footer::decode(&s.memory[start..start + FOOTER_LEN]))
    }

    pub fn write_footer(&mut self, footer: Footer) {
        let loc = footer.loc;
        let start = loc.chunk_index() * self.stride() + self.chunk_size;
        if let Some(slab) = self.slab_mut(loc) {
            slab.memory[start..start + FOOTER_LEN].copy_from_slice(&footer.encode());
        }
    }

    /// Hand out a chunk, growing by one slab when the free list is empty.
    ///
    /// The returned chunk is live with one reference.
    pub fn chunk_for(&mut self, slab_size: usize, source: &mut dyn SlabSource) -> Result<ChunkLoc> {
        if self.free_is_empty() {
            return self.grow(slab_size, source);
        }
        Ok(self.pop_free_chunk())
    }

    /// Add one slab; returns its first chunk (live) and frees the rest.
    fn grow(&mut self, slab_size: usize, source: &mut dyn SlabSource) -> Result<ChunkLoc> {
        let num_chunks = chunks_per_slab(slab_size, self.chunk_size);
        let out_of_memory = |bytes| Error::OutOfMemory {
            class: self.index(),
            chunk_size: self.chunk_size,
            bytes,
        };

        let bytes = num_chunks
            .checked_mul(self.stride())
            .ok_or_else(|| out_of_memory(usize::MAX))?;
        let memory = source
            .allocate(bytes)
            .filter(|m| m.len() >= bytes)
            .ok_or_else(|| out_of_memory(bytes))?;

        let slab_index = self.slabs.len() as u32;
        let loc = |chunk: usize| ChunkLoc::new(self.index, slab_index, chunk as u32);

        let mut chunks = Vec::with_capacity(num_chunks);
        chunks.push(Chunk {
            loc: loc(0),
            state: ChunkState::InUse { refs: 1, next: None },
        });
        for i in 1..num_chunks {
            let next_free = if i + 1 < num_chunks {
                Some(loc(i + 1))
            } else {
                self.free_head
            };
            chunks.push(Chunk::free(loc(i), next_free));
        }

        if num_chunks > 1 {
            self.free_head = Some(loc(1));
            self.free_count += num_chunks - 1;
            self.pushes += (num_chunks - 1) as u64;
        }
        let first = loc(0);
        self.slabs.push(Slab { memory, chunks });

        debug!(
            class = self.index,
            chunk_size = self.chunk_size,
            slab = slab_index,
            chunks = num_chunks,
            bytes,
            "Added slab"
        );
        Ok(first)
    }

    /// Return a fully released chunk to the free list.
    ///
    /// # Panics
    /// If the chunk is unknown, still referenced, or already free.
    pub fn push_free_chunk(&mut self, loc: ChunkLoc) {
        let head = self.free_head;
        let chunk = self
            .chunk_mut(loc)
            .unwrap_or_else(|| panic!("push_free_chunk: {} is not in this class", loc));
        match chunk.state {
            ChunkState::InUse { refs: 0, next: None } => {
                chunk.state = ChunkState::Free { next_free: head };
            }
            ChunkState::InUse { refs: 0, next: Some(_) } => {
                panic!("push_free_chunk: {} is still chained", loc)
            }
            ChunkState::InUse { refs, .. } => {
                panic!("push_free_chunk: {} still has {} references", loc, refs)
            }
            ChunkState::Free { .. } => panic!("push_free_chunk: {} is already free", loc),
        }
        self.free_head = Some(loc);
        self.free_count += 1;
        self.pushes += 1;
    }

    /// Take the head of the free list and mark it live with one reference.
    ///
    /// # Panics
    /// If the free list is empty or its head is referenced.
    pub fn pop_free_chunk(&mut self) -> ChunkLoc {
        let loc = self
            .free_head
            .unwrap_or_else(|| panic!("pop_free_chunk: free list of class {} is empty", self.index));
        let chunk = self
            .chunk_mut(loc)
            .unwrap_or_else(|| panic!("pop_free_chunk: free head {} is not in this class", loc));
        let next_free = match chunk.state {
            ChunkState::Free { next_free } => next_free,
            ChunkState::InUse { refs, .. } => {
                panic!("pop_free_chunk: free head {} has {} references", loc, refs)
            }
        };
        chunk.state = ChunkState::InUse { refs: 1, next: None };
        self.free_head = next_free;
        self.free_count -= 1;
        self.pops += 1;
        loc
    }
}
