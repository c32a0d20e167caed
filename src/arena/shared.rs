//! Thread-shareable arena

use super::allocator::Arena;
use super::loc::Buf;
use super::stats::ArenaStats;
use crate::config::ArenaConfig;
use crate::error::Result;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// An [`Arena`] behind a single lock, cloneable across threads.
///
/// Every operation takes the lock for its own duration only. Callers that
/// need several operations to happen atomically (e.g. walk a chain while no
/// one relinks it) should hold [`SharedArena::lock`] instead.
#[derive(Debug, Clone)]
pub struct SharedArena {
    inner: Arc<Mutex<Arena>>,
}

impl SharedArena {
    pub fn new(arena: Arena) -> Self {
        Self {
            inner: Arc::new(Mutex::new(arena)),
        }
    }

    pub fn from_config(config: &ArenaConfig) -> Result<Self> {
        Ok(Self::new(Arena::from_config(config)?))
    }

    /// Exclusive access to the underlying arena
    pub fn lock(&self) -> MutexGuard<'_, Arena> {
        self.inner.lock()
    }

    pub fn alloc(&self, size: usize) -> Result<Buf> {
        self.inner.lock().alloc(size)
    }

    pub fn owns(&self, buf: &Buf) -> bool {
        self.inner.lock().owns(buf)
    }

    pub fn add_ref(&self, buf: &Buf) {
        self.inner.lock().add_ref(buf)
    }

    pub fn dec_ref(&self, buf: &Buf) -> bool {
        self.inner.lock().dec_ref(buf)
    }

    pub fn set_next(&self, buf: &Buf, next: Option<&Buf>) {
        self.inner.lock().set_next(buf, next)
    }

    pub fn get_next(&self, buf: &Buf) -> Option<Buf> {
        self.inner.lock().get_next(buf)
    }

    pub fn ref_count(&self, buf: &Buf) -> u32 {
        self.inner.lock().ref_count(buf)
    }

    /// Run `f` over the bytes of `buf` while holding the lock
    pub fn with_bytes<R>(&self, buf: &Buf, f: impl FnOnce(&[u8]) -> R) -> R {
        let arena = self.inner.lock();
        f(arena.bytes(buf))
    }

    /// Run `f` over the mutable bytes of `buf` while holding the lock
    pub fn with_bytes_mut<R>(&self, buf: &Buf, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut arena = self.inner.lock();
        f(arena.bytes_mut(buf))
    }

    pub fn snapshot(&self) -> ArenaStats {
        self.inner.lock().snapshot()
    }

    pub fn stats<M>(&self, into: M) -> M
    where
        M: Extend<(String, i64)>,
    {
        self.inner.lock().stats(into)
    }
}

impl From<Arena> for SharedArena {
    fn from(arena: Arena) -> Self {
        Self::new(arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_shared_across_threads() {
        let shared = SharedArena::new(Arena::new(16, 4096, 2.0).unwrap());

        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..200usize {
                        let buf = shared.alloc(16 + i % 48).unwrap();
                        shared.with_bytes_mut(&buf, |b| b[0] = t);
                        assert_eq!(shared.with_bytes(&buf, |b| b[0]), t);
                        assert!(shared.dec_ref(&buf));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = shared.snapshot();
        assert_eq!(stats.num_allocs, 800);
        assert_eq!(stats.num_dec_refs, 800);
        assert_eq!(stats.bytes_in_use(), 0);
    }

    #[test]
    fn test_chain_through_shared() {
        let shared: SharedArena = Arena::new(8, 256, 2.0).unwrap().into();
        let a = shared.alloc(8).unwrap();
        let b = shared.alloc(8).unwrap();
        shared.set_next(&a, Some(&b));
        shared.dec_ref(&b);

        let next = shared.get_next(&a).unwrap();
        assert_eq!(next.loc(), b.loc());
        assert_eq!(shared.ref_count(&b), 2);
        shared.dec_ref(&next);

        assert!(shared.dec_ref(&a));
        assert_eq!(shared.ref_count(&b), 0);
        assert!(shared.owns(&b));
    }

    #[test]
    fn test_lock_for_compound_operations() {
        let shared = SharedArena::new(Arena::new(8, 256, 2.0).unwrap());
        let buf = {
            let mut arena = shared.lock();
            let buf = arena.alloc(4).unwrap();
            arena.bytes_mut(&buf).copy_from_slice(b"abcd");
            buf
        };
        assert_eq!(shared.with_bytes(&buf, |b| b.to_vec()), b"abcd");
    }
}
