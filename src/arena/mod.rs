//! Slab Arena
//!
//! Reference-counted buffers carved out of fixed-size chunks. Chunks of one
//! size form a slab class; classes are derived on demand by multiplying the
//! previous chunk size by the growth factor.
//!
//! # Architecture
//!
//! ```text
//! Arena (start=1, growth=2.0, slab=1 MiB)
//!   ├─→ SlabClass(1B)    → Slabs: [#0]      Free: 3 → 7 → 12
//!   ├─→ SlabClass(2B)    → Slabs: [#0, #1]  Free: 1 → 4
//!   ├─→ SlabClass(4B)    → Slabs: []        Free: -
//!   └─→ SlabClass(8B)    → Slabs: [#0]      Free: -
//!
//! Slab memory (per chunk):
//!   [ usable: chunk_size bytes ][ footer: magic | class | slab | chunk ]
//! ```
//!
//! A [`Buf`] names a chunk and a view length. The arena checks the footer
//! behind every handle it receives, so buffers from another arena or forged
//! locations are caught before any state changes.
//!
//! Live chunks may point at one other chunk (`set_next`). A link holds a
//! reference on its target; releasing the last reference on a chunk releases
//! its link too, which frees whole chains at once.

pub mod allocator;
pub mod bench;
pub mod chunk;
pub mod footer;
pub mod loc;
pub mod shared;
pub mod size_class;
pub mod slab_class;
pub mod source;
pub mod stats;

pub use allocator::Arena;
pub use footer::FOOTER_LEN;
pub use loc::{Buf, ChunkLoc};
pub use shared::SharedArena;
pub use size_class::{calculate_size_classes, chunks_per_slab, next_chunk_size};
pub use slab_class::SlabClass;
pub use source::{SlabSource, SystemSource};
pub use stats::{ArenaStats, SlabClassStats};
