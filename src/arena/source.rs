//! Raw memory sources for slab growth

/// Provider of raw slab memory.
///
/// Returning `None` signals exhaustion; the arena turns it into a failed
/// allocation and stays usable. Blocks shorter than requested are treated
/// the same way.
pub trait SlabSource: Send {
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>>;
}

impl<F> SlabSource for F
where
    F: FnMut(usize) -> Option<Box<[u8]>> + Send,
{
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>> {
        self(len)
    }
}

/// Default source backed by the global allocator.
///
/// Reserves fallibly so that exhaustion is reported rather than aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSource;

impl SlabSource for SystemSource {
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>> {
        let mut block = Vec::new();
        block.try_reserve_exact(len).ok()?;
        block.resize(len, 0);
        Some(block.into_boxed_slice())
    }
}
