//! Per-chunk footer
//!
//! Every chunk is followed in slab memory by a small footer naming the arena
//! and the chunk's own location. Handles are checked against it before any
//! state is touched.
//!
//! ```text
//! [ magic: u32 BE ][ class: u32 BE ][ slab: u32 BE ][ chunk: u32 BE ]
//! ```

use super::loc::ChunkLoc;

/// Bytes reserved after each chunk's usable region
pub const FOOTER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub magic: u32,
    pub loc: ChunkLoc,
}

impl Footer {
    pub fn new(magic: u32, loc: ChunkLoc) -> Self {
        Self { magic, loc }
    }

    pub fn encode(&self) -> [u8; FOOTER_LEN] {
        let mut out = [0u8; FOOTER_LEN];
        out[0..4].copy_from_slice(&self.magic.to_be_bytes());
        out[4..8].copy_from_slice(&self.loc.class.to_be_bytes());
        out[8..12].copy_from_slice(&self.loc.slab.to_be_bytes());
        out[12..16].copy_from_slice(&self.loc.chunk.to_be_bytes());
        out
    }

    /// Decode a footer; `None` if the slice is too short.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FOOTER_LEN {
            return None;
        }
        let word = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(Self {
            magic: word(0),
            loc: ChunkLoc::new(word(4), word(8), word(12)),
        })
    }
}
