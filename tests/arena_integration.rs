//! Integration tests for the slab arena public API

use slabarena::error::Error;
use slabarena::{Arena, ArenaConfig, Buf, Settings, SharedArena};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn small_arena() -> Arena {
    Arena::new(1, 1024, 2.0).unwrap()
}

#[test]
fn test_alloc_contract() {
    let mut arena = small_arena();

    for size in [0, 1, 2, 3, 100, 255, 256, 257, 1000, 1024] {
        let buf = arena.alloc(size).unwrap();
        assert_eq!(buf.len(), size);
        assert!(arena.capacity(&buf) >= size);
        assert_eq!(arena.ref_count(&buf), 1);
        assert!(arena.owns(&buf));
        assert_eq!(arena.bytes(&buf).len(), size);
    }
}

#[test]
fn test_class_selection() {
    let mut arena = small_arena();
    let expected = [(1, 0), (2, 1), (3, 2), (4, 2), (5, 3), (256, 8), (257, 9), (1024, 10)];

    for (size, index) in expected {
        assert_eq!(arena.find_class_index(size), index, "size {}", size);
        assert_eq!(arena.class_chunk_size(index), Some(1usize << index));
    }
}

#[test]
fn test_too_large_is_refused() {
    let mut arena = small_arena();
    let err = arena.alloc(1025).unwrap_err();
    assert!(matches!(
        err,
        Error::TooLarge {
            requested: 1025,
            slab_size: 1024
        }
    ));
    assert!(err.is_capacity());

    let stats = arena.stats(HashMap::new());
    assert_eq!(stats["numTooBigErrs"], 1);
    assert_eq!(stats["numAllocs"], 0);
}

#[test]
fn test_out_of_memory_then_recover() {
    let budget = Arc::new(AtomicUsize::new(1));
    let remaining = budget.clone();
    let mut arena = Arena::with_source(1, 16, 2.0, move |len: usize| {
        if remaining.load(Ordering::SeqCst) == 0 {
            return None;
        }
        remaining.fetch_sub(1, Ordering::SeqCst);
        Some(vec![0u8; len].into_boxed_slice())
    })
    .unwrap();

    let first = arena.alloc(16).unwrap();
    let err = arena.alloc(16).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { chunk_size: 16, .. }));
    assert_eq!(arena.snapshot().num_add_slab_errs, 1);

    // Releasing recycles the chunk without asking the source again.
    arena.dec_ref(&first);
    let again = arena.alloc(10).unwrap();
    assert_eq!(again.loc(), first.loc());

    budget.store(1, Ordering::SeqCst);
    arena.alloc(16).unwrap();
}

#[test]
fn test_data_survives_until_release() {
    let mut arena = small_arena();
    let a = arena.alloc(5).unwrap();
    let b = arena.alloc(5).unwrap();
    arena.bytes_mut(&a).copy_from_slice(b"hello");
    arena.bytes_mut(&b).copy_from_slice(b"world");

    assert_eq!(arena.bytes(&a), b"hello");
    assert_eq!(arena.bytes(&b), b"world");
    assert_ne!(a.loc(), b.loc());
}

#[test]
fn test_refcount_lifecycle() {
    let mut arena = small_arena();
    let buf = arena.alloc(10).unwrap();

    arena.add_ref(&buf);
    arena.add_ref(&buf);
    assert_eq!(arena.ref_count(&buf), 3);

    assert!(!arena.dec_ref(&buf));
    assert!(!arena.dec_ref(&buf));
    assert!(arena.dec_ref(&buf));
    assert_eq!(arena.ref_count(&buf), 0);
    assert!(arena.owns(&buf));

    let stats = arena.snapshot();
    assert_eq!(stats.num_add_refs, 2);
    assert_eq!(stats.num_dec_refs, 3);
    assert_eq!(stats.num_dec_ref_zeroes, 1);
}

#[test]
fn test_chain_release_frees_every_link() {
    let mut arena = small_arena();
    let bufs: Vec<Buf> = (1..=10).map(|n| arena.alloc(n * 10).unwrap()).collect();

    for pair in bufs.windows(2) {
        arena.set_next(&pair[0], Some(&pair[1]));
    }
    // Drop the allocation references; only the links keep the tail alive.
    for buf in &bufs[1..] {
        arena.dec_ref(buf);
        assert_eq!(arena.ref_count(buf), 1);
    }

    let mut walked = 0;
    let mut cursor = arena.get_next(&bufs[0]);
    while let Some(next) = cursor {
        walked += 1;
        cursor = arena.get_next(&next);
        arena.dec_ref(&next);
    }
    assert_eq!(walked, 9);

    assert!(arena.dec_ref(&bufs[0]));
    for buf in &bufs {
        assert_eq!(arena.ref_count(buf), 0);
    }
    assert_eq!(arena.snapshot().bytes_in_use(), 0);
}

#[test]
fn test_set_next_replaces_and_clears() {
    let mut arena = small_arena();
    let head = arena.alloc(4).unwrap();
    let a = arena.alloc(4).unwrap();
    let b = arena.alloc(4).unwrap();

    arena.set_next(&head, Some(&a));
    assert_eq!(arena.ref_count(&a), 2);

    arena.set_next(&head, Some(&b));
    assert_eq!(arena.ref_count(&a), 1);
    assert_eq!(arena.ref_count(&b), 2);

    arena.set_next(&head, None);
    assert_eq!(arena.ref_count(&b), 1);
    assert!(arena.get_next(&head).is_none());
}

#[test]
fn test_truncated_view_through_chain() {
    let mut arena = small_arena();
    let head = arena.alloc(8).unwrap();
    let tail = arena.alloc(100).unwrap();

    arena.set_next(&head, Some(&tail.truncate(40)));
    let next = arena.get_next(&head).unwrap();
    assert_eq!(next.len(), 40);
    assert_eq!(next.loc(), tail.loc());
    assert_eq!(arena.capacity(&next), 128);
}

#[test]
fn test_foreign_buffers_are_not_owned() {
    let mut a = small_arena();
    let mut b = small_arena();
    let buf = a.alloc(16).unwrap();
    b.alloc(16).unwrap();

    assert!(a.owns(&buf));
    assert!(!b.owns(&buf));
    assert!(!a.owns(&Buf::null()));
}

#[test]
#[should_panic(expected = "add_ref")]
fn test_foreign_add_ref_panics() {
    let mut a = small_arena();
    let mut b = small_arena();
    let buf = a.alloc(16).unwrap();
    b.alloc(16).unwrap();
    b.add_ref(&buf);
}

#[test]
#[should_panic(expected = "already released")]
fn test_double_release_panics() {
    let mut arena = small_arena();
    let buf = arena.alloc(16).unwrap();
    arena.dec_ref(&buf);
    arena.dec_ref(&buf);
}

#[test]
fn test_growth_factor_property() {
    for growth_factor in [1.1, 1.25, 1.5, 2.0, 3.3, 16.7] {
        let mut arena = Arena::new(1, 1024, growth_factor).unwrap();
        let mut last_index = 0;
        for size in 0..=1024 {
            let buf = arena.alloc(size).unwrap();
            let index = buf.loc().class_index();
            assert!(index >= last_index, "class order at {} / {}", size, growth_factor);
            assert!(arena.capacity(&buf) >= size);
            last_index = index;
            arena.dec_ref(&buf);
        }
    }
}

#[test]
fn test_stats_entries_shape() {
    let mut arena = small_arena();
    arena.alloc(4096 / 4).unwrap();
    let stats = arena.stats(HashMap::new());

    assert_eq!(stats["numSlabClasses"], 11);
    assert_eq!(stats["slabClass-000010-chunkSize"], 1024);
    assert_eq!(stats["slabClass-000010-numChunksInUse"], 1);
    assert_eq!(stats["slabClass-000010-numSlabs"], 1);
    assert_eq!(stats["slabClass-000003-numSlabs"], 0);
}

#[test]
fn test_arena_from_settings() {
    let settings = Settings::from_toml_str(
        r#"
        [arena]
        start_chunk_size = 48
        slab_size = 4096
        growth_factor = 1.5
        "#,
    )
    .unwrap();
    let mut arena = Arena::from_config(&settings.arena).unwrap();

    assert_eq!(arena.start_chunk_size(), 48);
    assert_eq!(arena.slab_size(), 4096);
    let buf = arena.alloc(50).unwrap();
    assert_eq!(arena.capacity(&buf), 72);

    let bad = ArenaConfig {
        growth_factor: 0.5,
        ..ArenaConfig::default()
    };
    assert!(matches!(Arena::from_config(&bad), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_shared_arena_across_threads() {
    let shared = SharedArena::new(small_arena());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let arena = shared.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let size = (t * 37 + i) % 1024;
                    let buf = arena.alloc(size).unwrap();
                    arena.with_bytes_mut(&buf, |bytes| bytes.fill(t as u8));
                    arena.add_ref(&buf);
                    assert!(!arena.dec_ref(&buf));
                    assert!(arena.with_bytes(&buf, |bytes| bytes.iter().all(|b| *b == t as u8)));
                    assert!(arena.dec_ref(&buf));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = shared.snapshot();
    assert_eq!(stats.num_allocs, 2000);
    assert_eq!(stats.num_dec_ref_zeroes, 2000);
    assert_eq!(stats.bytes_in_use(), 0);
}
