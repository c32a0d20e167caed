// slabarena - reference-counted slab allocator
// Pooled, chainable byte buffers carved out of large pre-allocated slabs

#![warn(rust_2018_idioms)]

pub mod arena;
pub mod config;
pub mod logging;
pub mod metrics;

// Re-exports for convenience
pub use arena::{Arena, ArenaStats, Buf, ChunkLoc, SharedArena, SlabSource, SystemSource};
pub use config::{ArenaConfig, LogConfig, Settings};

/// slabarena error types
///
/// Only recoverable conditions live here. Misuse of a buffer handle
/// (double release, foreign buffer) panics instead.
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Requested size {requested} exceeds slab size {slab_size}")]
        TooLarge { requested: usize, slab_size: usize },

        #[error("Out of memory: could not add a {bytes} byte slab to class {class} (chunk size {chunk_size})")]
        OutOfMemory {
            class: usize,
            chunk_size: usize,
            bytes: usize,
        },

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Serialization error: {0}")]
        Serialization(String),

        #[error("Metrics error: {0}")]
        Metrics(String),
    }

    impl Error {
        /// Whether the failure came from the allocator's capacity limits,
        /// as opposed to bad input or configuration.
        pub fn is_capacity(&self) -> bool {
            matches!(self, Error::TooLarge { .. } | Error::OutOfMemory { .. })
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
