//! Slab arena implementation

use super::chunk::{Chunk, ChunkState, Link};
use super::footer::Footer;
use super::loc::{Buf, ChunkLoc};
use super::size_class::next_chunk_size;
use super::slab_class::SlabClass;
use super::source::{SlabSource, SystemSource};
use crate::config::ArenaConfig;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace, warn};

const ARENA_MAGIC: u32 = 0xC0C1_C2C3;

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

/// Operation counters, reported by `stats`
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub allocs: u64,
    pub add_refs: u64,
    pub dec_refs: u64,
    pub dec_ref_zeroes: u64,
    pub set_nexts: u64,
    pub get_nexts: u64,
    pub too_big_errs: u64,
    pub add_slab_errs: u64,
}

/// Reference-counted slab arena
///
/// Hands out [`Buf`] handles backed by fixed-size chunks. Chunk sizes grow
/// geometrically from `start_chunk_size` by `growth_factor`; a request is
/// served by the smallest class that fits it.
///
/// The arena is not synchronized. Wrap it in a
/// [`SharedArena`](super::SharedArena) to share it between threads.
///
/// Handle misuse (foreign buffer, touching a released buffer) is a
/// programming error and panics. Capacity problems are reported as
/// [`Error`].
pub struct Arena {
    magic: u32,
    start_chunk_size: usize,
    slab_size: usize,
    growth_factor: f64,
    classes: Vec<SlabClass>,
    source: Box<dyn SlabSource>,
    counters: Counters,
}

impl Arena {
    /// Create an arena backed by the system allocator
    ///
    /// # Arguments
    /// * `start_chunk_size` - Chunk size of the smallest class (> 0)
    /// * `slab_size` - Bytes per slab, also the largest allocation (> 0)
    /// * `growth_factor` - Ratio between consecutive chunk sizes (> 1.0)
    pub fn new(start_chunk_size: usize, slab_size: usize, growth_factor: f64) -> Result<Self> {
        Self::with_source(start_chunk_size, slab_size, growth_factor, SystemSource)
    }

    /// Create an arena drawing slab memory from `source`
    pub fn with_source<S>(
        start_chunk_size: usize,
        slab_size: usize,
        growth_factor: f64,
        source: S,
    ) -> Result<Self>
    where
        S: SlabSource + 'static,
    {
        let config = ArenaConfig {
            start_chunk_size,
            slab_size,
            growth_factor,
        };
        config.validate()?;

        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed);
        let magic = ARENA_MAGIC ^ id.wrapping_mul(0x9E37_79B9);

        debug!(
            start_chunk_size,
            slab_size, growth_factor, "Initializing slab arena"
        );

        Ok(Self {
            magic,
            start_chunk_size,
            slab_size,
            growth_factor,
            classes: vec![SlabClass::new(0, start_chunk_size)],
            source: Box::new(source),
            counters: Counters::default(),
        })
    }

    /// Create an arena from configuration
    pub fn from_config(config: &ArenaConfig) -> Result<Self> {
        Self::new(config.start_chunk_size, config.slab_size, config.growth_factor)
    }

    pub fn start_chunk_size(&self) -> usize {
        self.start_chunk_size
    }

    pub fn slab_size(&self) -> usize {
        self.slab_size
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Number of slab classes derived so far
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Chunk size of an already derived class
    pub fn class_chunk_size(&self, index: usize) -> Option<usize> {
        self.classes.get(index).map(SlabClass::chunk_size)
    }

    pub(crate) fn classes(&self) -> &[SlabClass] {
        &self.classes
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Index of the smallest class whose chunks hold `size` bytes.
    ///
    /// Derives and caches classes as needed; the answer depends only on the
    /// arena's policy, never on allocation history.
    pub fn find_class_index(&mut self, size: usize) -> usize {
        loop {
            let last = self.classes[self.classes.len() - 1].chunk_size();
            if last >= size {
                break;
            }
            let index = self.classes.len() as u32;
            let chunk_size = next_chunk_size(last, self.growth_factor);
            debug!(class = index, chunk_size, "Added slab class");
            self.classes.push(SlabClass::new(index, chunk_size));
        }
        self.classes.partition_point(|c| c.chunk_size() < size)
    }

    /// Allocate a buffer of `size` bytes with one reference
    ///
    /// Fails with [`Error::TooLarge`] if `size` exceeds the slab size, and
    /// with [`Error::OutOfMemory`] if the memory source cannot supply a new
    /// slab. Neither failure changes existing classes or slabs.
    pub fn alloc(&mut self, size: usize) -> Result<Buf> {
        if size > self.slab_size {
            self.counters.too_big_errs += 1;
            warn!(size, slab_size = self.slab_size, "Allocation larger than slab size");
            return Err(Error::TooLarge {
                requested: size,
                slab_size: self.slab_size,
            });
        }

        let index = self.find_class_index(size);
        let class = &mut self.classes[index];
        let loc = match class.chunk_for(self.slab_size, self.source.as_mut()) {
            Ok(loc) => loc,
            Err(e) => {
                self.counters.add_slab_errs += 1;
                warn!(size, class = index, error = %e, "Slab growth failed");
                return Err(e);
            }
        };
        class.write_footer(Footer::new(self.magic, loc));

        self.counters.allocs += 1;
        trace!(size, %loc, "Allocated buffer");
        Ok(Buf::new(self.magic, loc, size))
    }

    /// Whether `buf` was handed out by this arena.
    ///
    /// Never panics. Released buffers still count as owned: their footer
    /// survives until the chunk is reused.
    pub fn owns(&self, buf: &Buf) -> bool {
        self.locate(buf).is_some()
    }

    /// Take an additional reference on `buf`.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena or was already released.
    pub fn add_ref(&mut self, buf: &Buf) {
        let loc = self.resolve(buf, "add_ref");
        self.retain(loc, "add_ref");
        self.counters.add_refs += 1;
        trace!(%loc, "Added reference");
    }

    /// Drop a reference on `buf`; returns true if it was the last one.
    ///
    /// A chunk reaching zero goes back to its class free list and releases
    /// its `next` link in turn, so dropping the head of a chain frees every
    /// chunk only the chain was keeping alive.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena or was already released.
    pub fn dec_ref(&mut self, buf: &Buf) -> bool {
        self.counters.dec_refs += 1;
        let loc = self.resolve(buf, "dec_ref");
        self.release(loc, "dec_ref")
    }

    /// Link `buf` to `next`, or clear its link with `None`.
    ///
    /// The new target gains a reference; the previous target, if any, loses
    /// one (possibly releasing it and its own chain).
    ///
    /// # Panics
    /// If either buffer is not owned by this arena or was already released.
    pub fn set_next(&mut self, buf: &Buf, next: Option<&Buf>) {
        self.counters.set_nexts += 1;
        let loc = self.resolve(buf, "set_next");
        self.ensure_live(loc, "set_next");

        let link = next.map(|next| {
            let target = self.resolve(next, "set_next");
            self.retain(target, "set_next");
            Link {
                loc: target,
                len: next.len(),
            }
        });

        let previous = match &mut self.chunk_mut(loc).state {
            ChunkState::InUse { next, .. } => std::mem::replace(next, link),
            ChunkState::Free { .. } => panic!("set_next: {} was released while linking", loc),
        };
        if let Some(previous) = previous {
            self.release(previous.loc, "set_next");
        }
        trace!(%loc, next = ?link.map(|l| l.loc), "Set next");
    }

    /// The buffer `buf` links to, if any.
    ///
    /// The returned buffer carries a reference owned by the caller, who must
    /// `dec_ref` it when done.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena or was already released.
    pub fn get_next(&mut self, buf: &Buf) -> Option<Buf> {
        self.counters.get_nexts += 1;
        let loc = self.resolve(buf, "get_next");
        self.ensure_live(loc, "get_next");

        let link = self.chunk(loc).next()?;
        self.retain(link.loc, "get_next");
        Some(Buf::new(self.magic, link.loc, link.len))
    }

    /// Current reference count of the chunk behind `buf`; 0 once released.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena.
    pub fn ref_count(&self, buf: &Buf) -> u32 {
        let loc = self.resolve(buf, "ref_count");
        self.chunk(loc).refs()
    }

    /// Usable capacity of the chunk behind `buf`.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena.
    pub fn capacity(&self, buf: &Buf) -> usize {
        let loc = self.resolve(buf, "capacity");
        self.classes[loc.class_index()].chunk_size()
    }

    /// The bytes visible through `buf`.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena or was already released.
    pub fn bytes(&self, buf: &Buf) -> &[u8] {
        let loc = self.resolve(buf, "bytes");
        self.ensure_live(loc, "bytes");
        match self.classes[loc.class_index()].chunk_mem(loc) {
            Some(mem) => &mem[..buf.len()],
            None => panic!("bytes: {} has no memory", loc),
        }
    }

    /// Mutable access to the bytes visible through `buf`.
    ///
    /// # Panics
    /// If `buf` is not owned by this arena or was already released.
    pub fn bytes_mut(&mut self, buf: &Buf) -> &mut [u8] {
        let loc = self.resolve(buf, "bytes_mut");
        self.ensure_live(loc, "bytes_mut");
        match self.classes[loc.class_index()].chunk_mem_mut(loc) {
            Some(mem) => &mut mem[..buf.len()],
            None => panic!("bytes_mut: {} has no memory", loc),
        }
    }

    fn locate(&self, buf: &Buf) -> Option<ChunkLoc> {
        if buf.is_null() || buf.magic != self.magic {
            return None;
        }
        let class = self.classes.get(buf.loc.class_index())?;
        if buf.len() > class.chunk_size() {
            return None;
        }
        let footer = class.footer(buf.loc)?;
        (footer == Footer::new(self.magic, buf.loc)).then_some(buf.loc)
    }

    fn resolve(&self, buf: &Buf, op: &str) -> ChunkLoc {
        match self.locate(buf) {
            Some(loc) => loc,
            None => panic!("{}: {} is not owned by this arena", op, buf),
        }
    }

    fn chunk(&self, loc: ChunkLoc) -> &Chunk {
        self.classes
            .get(loc.class_index())
            .and_then(|c| c.chunk(loc))
            .unwrap_or_else(|| panic!("{} does not exist", loc))
    }

    fn chunk_mut(&mut self, loc: ChunkLoc) -> &mut Chunk {
        self.classes
            .get_mut(loc.class_index())
            .and_then(|c| c.chunk_mut(loc))
            .unwrap_or_else(|| panic!("{} does not exist", loc))
    }

    fn ensure_live(&self, loc: ChunkLoc, op: &str) {
        if self.chunk(loc).is_free() {
            panic!("{}: {} was already released", op, loc);
        }
    }

    fn retain(&mut self, loc: ChunkLoc, op: &str) {
        match &mut self.chunk_mut(loc).state {
            ChunkState::InUse { refs, .. } => {
                *refs = refs
                    .checked_add(1)
                    .unwrap_or_else(|| panic!("{}: reference count overflow on {}", op, loc));
            }
            ChunkState::Free { .. } => panic!("{}: {} was already released", op, loc),
        }
    }

    /// Drop one reference and walk the chain while chunks reach zero.
    fn release(&mut self, loc: ChunkLoc, op: &str) -> bool {
        let Some(mut next) = self.drop_ref(loc, op) else {
            return false;
        };
        while let Some(loc) = next {
            match self.drop_ref(loc, op) {
                Some(after) => next = after,
                None => break,
            }
        }
        true
    }

    /// `None` while the chunk stays referenced, otherwise the link it held.
    fn drop_ref(&mut self, loc: ChunkLoc, op: &str) -> Option<Option<ChunkLoc>> {
        let next = match &mut self.chunk_mut(loc).state {
            ChunkState::InUse { refs, next } => {
                *refs -= 1;
                if *refs > 0 {
                    return None;
                }
                next.take()
            }
            ChunkState::Free { .. } => panic!("{}: {} was already released", op, loc),
        };

        self.classes[loc.class_index()].push_free_chunk(loc);
        self.counters.dec_ref_zeroes += 1;
        trace!(%loc, "Released chunk");
        Some(next.map(|l| l.loc))
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("start_chunk_size", &self.start_chunk_size)
            .field("slab_size", &self.slab_size)
            .field("growth_factor", &self.growth_factor)
            .field("classes", &self.classes.len())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
