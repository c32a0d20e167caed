//! Arena statistics

use super::allocator::Arena;
use serde::{Deserialize, Serialize};

/// Point-in-time view of an arena's counters and classes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaStats {
    pub num_allocs: u64,
    pub num_add_refs: u64,
    pub num_dec_refs: u64,
    pub num_dec_ref_zeroes: u64,
    pub num_set_nexts: u64,
    pub num_get_nexts: u64,
    pub num_too_big_errs: u64,
    pub num_add_slab_errs: u64,
    pub num_push_free_chunks: u64,
    pub num_pop_free_chunks: u64,
    pub slab_classes: Vec<SlabClassStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlabClassStats {
    pub index: usize,
    pub chunk_size: usize,
    pub num_chunks: usize,
    pub num_chunks_free: usize,
    pub num_chunks_in_use: usize,
    pub num_slabs: usize,
}

impl ArenaStats {
    /// Flatten into `(key, value)` pairs.
    ///
    /// Per-class keys look like `slabClass-000012-numChunks`.
    pub fn entries(&self) -> Vec<(String, i64)> {
        let mut out = vec![
            ("numAllocs".to_string(), self.num_allocs as i64),
            ("numAddRefs".to_string(), self.num_add_refs as i64),
            ("numDecRefs".to_string(), self.num_dec_refs as i64),
            ("numDecRefZeroes".to_string(), self.num_dec_ref_zeroes as i64),
            ("numSetNexts".to_string(), self.num_set_nexts as i64),
            ("numGetNexts".to_string(), self.num_get_nexts as i64),
            ("numTooBigErrs".to_string(), self.num_too_big_errs as i64),
            ("numAddSlabErrs".to_string(), self.num_add_slab_errs as i64),
            ("numPushFreeChunks".to_string(), self.num_push_free_chunks as i64),
            ("numPopFreeChunks".to_string(), self.num_pop_free_chunks as i64),
            ("numSlabClasses".to_string(), self.slab_classes.len() as i64),
        ];

        for class in &self.slab_classes {
            let prefix = format!("slabClass-{:06}", class.index);
            out.extend([
                (format!("{}-chunkSize", prefix), class.chunk_size as i64),
                (format!("{}-numChunks", prefix), class.num_chunks as i64),
                (format!("{}-numChunksFree", prefix), class.num_chunks_free as i64),
                (format!("{}-numChunksInUse", prefix), class.num_chunks_in_use as i64),
                (format!("{}-numSlabs", prefix), class.num_slabs as i64),
            ]);
        }
        out
    }

    /// Bytes currently handed out, counted in whole chunks
    pub fn bytes_in_use(&self) -> usize {
        self.slab_classes
            .iter()
            .map(|c| c.chunk_size * c.num_chunks_in_use)
            .sum()
    }
}

impl Arena {
    /// Snapshot of counters and per-class utilization
    pub fn snapshot(&self) -> ArenaStats {
        let counters = self.counters();
        let classes = self.classes();

        ArenaStats {
            num_allocs: counters.allocs,
            num_add_refs: counters.add_refs,
            num_dec_refs: counters.dec_refs,
            num_dec_ref_zeroes: counters.dec_ref_zeroes,
            num_set_nexts: counters.set_nexts,
            num_get_nexts: counters.get_nexts,
            num_too_big_errs: counters.too_big_errs,
            num_add_slab_errs: counters.add_slab_errs,
            num_push_free_chunks: classes.iter().map(|c| c.pushes()).sum(),
            num_pop_free_chunks: classes.iter().map(|c| c.pops()).sum(),
            slab_classes: classes
                .iter()
                .map(|c| SlabClassStats {
                    index: c.index(),
                    chunk_size: c.chunk_size(),
                    num_chunks: c.num_chunks(),
                    num_chunks_free: c.free_count(),
                    num_chunks_in_use: c.in_use_count(),
                    num_slabs: c.num_slabs(),
                })
                .collect(),
        }
    }

    /// Merge the flattened snapshot into `into` and hand it back.
    ///
    /// Works with any map that extends from `(String, i64)` pairs, e.g.
    /// `HashMap` or `BTreeMap`. Existing keys are overwritten.
    pub fn stats<M>(&self, mut into: M) -> M
    where
        M: Extend<(String, i64)>,
    {
        into.extend(self.snapshot().entries());
        into
    }
}
