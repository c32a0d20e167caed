//! Timing smoke tests for the hot paths

#[cfg(test)]
mod bench {
    use crate::arena::Arena;
    use std::time::Instant;

    const ITERATIONS: usize = 100_000;

    /// Warm the arena so the timed loop only recycles chunks
    fn warmed(size_of: impl Fn(usize) -> usize, growth_factor: f64) -> Arena {
        let mut arena = Arena::new(1, 1024, growth_factor).unwrap();
        let bufs: Vec<_> = (0..1024).map(|i| arena.alloc(size_of(i)).unwrap()).collect();
        for buf in &bufs {
            arena.dec_ref(buf);
        }
        arena
    }

    #[test]
    fn bench_reffing() {
        let mut arena = Arena::new(1, 1024, 2.0).unwrap();
        let data = arena.alloc(1).unwrap();

        let start = Instant::now();
        for _ in 0..ITERATIONS {
            arena.add_ref(&data);
            arena.dec_ref(&data);
        }
        println!("add_ref/dec_ref: {:?} for {} pairs", start.elapsed(), ITERATIONS);
        assert_eq!(arena.ref_count(&data), 1);
    }

    #[test]
    fn bench_alloc_constant_sizes() {
        for size in [1, 128, 256] {
            let mut arena = warmed(|_| size, 2.0);
            let before = arena.snapshot();

            let start = Instant::now();
            for _ in 0..ITERATIONS {
                let buf = arena.alloc(size).unwrap();
                arena.dec_ref(&buf);
            }
            println!("alloc({}): {:?} for {} cycles", size, start.elapsed(), ITERATIONS);

            let after = arena.snapshot();
            let slabs = |s: &crate::arena::ArenaStats| -> usize {
                s.slab_classes.iter().map(|c| c.num_slabs).sum()
            };
            assert_eq!(slabs(&before), slabs(&after), "recycling must not grow slabs");
        }
    }

    #[test]
    fn bench_alloc_mod_sizes() {
        for growth_factor in [2.0, 1.1] {
            let mut arena = warmed(|i| i % 1024, growth_factor);

            let start = Instant::now();
            for i in 0..ITERATIONS {
                let buf = arena.alloc(i % 1024).unwrap();
                arena.dec_ref(&buf);
            }
            println!(
                "alloc(i % 1024) at growth {}: {:?} for {} cycles",
                growth_factor,
                start.elapsed(),
                ITERATIONS
            );
        }
    }
}
