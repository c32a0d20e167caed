//! Size class derivation for the slab arena

/// Chunk size of the class following one of `prev` bytes.
///
/// Grows geometrically by `growth_factor`, but always by at least one byte so
/// that factors close to 1.0 still yield strictly increasing sizes.
pub fn next_chunk_size(prev: usize, growth_factor: f64) -> usize {
    let grown = (prev as f64 * growth_factor).ceil() as usize;
    grown.max(prev.saturating_add(1))
}

/// Number of chunks carved out of one slab.
///
/// Classes whose chunks are larger than a slab still get one chunk per slab.
pub fn chunks_per_slab(slab_size: usize, chunk_size: usize) -> usize {
    (slab_size / chunk_size).max(1)
}

/// Calculate the chunk sizes of every class up to the first one that can
/// hold `max_size` bytes.
///
/// Returns e.g. `[1, 2, 4, 8, 16]` for `(1, 10, 2.0)`.
pub fn calculate_size_classes(start_size: usize, max_size: usize, growth_factor: f64) -> Vec<usize> {
    let mut classes = vec![start_size];
    let mut current = start_size;

    while current < max_size {
        current = next_chunk_size(current, growth_factor);
        classes.push(current);
    }

    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling() {
        assert_eq!(calculate_size_classes(1, 10, 2.0), vec![1, 2, 4, 8, 16]);
        assert_eq!(calculate_size_classes(1, 256, 2.0).len(), 9);
    }

    #[test]
    fn test_small_factor_still_grows() {
        let classes = calculate_size_classes(1, 20, 1.01);
        for i in 1..classes.len() {
            assert!(classes[i] > classes[i - 1], "classes: {:?}", classes);
        }
        assert_eq!(&classes[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_fractional_factor_rounds_up() {
        // 64 * 1.2 = 76.8 -> 77, 77 * 1.2 = 92.4 -> 93
        assert_eq!(next_chunk_size(64, 1.2), 77);
        assert_eq!(next_chunk_size(77, 1.2), 93);
    }

    #[test]
    fn test_chunks_per_slab() {
        assert_eq!(chunks_per_slab(1024 * 1024, 4096), 256);
        assert_eq!(chunks_per_slab(100, 30), 3);
        assert_eq!(chunks_per_slab(100, 128), 1);
    }
}
