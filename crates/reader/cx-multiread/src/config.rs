//! Prefetch configuration.

/// Default size of one prefetch block, in bytes (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default capacity of the block channel, in blocks.
pub const DEFAULT_BLOCK_COUNT: usize = 4;

/// Configuration for the background prefetch pipeline.
///
/// The bounded block channel acts as a ring: the loop stalls once
/// `block_count` blocks are unconsumed, so prefetch memory stays at roughly
/// `block_count * block_size` bytes.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Size of one prefetch block, in bytes. Minimum 1.
    pub block_size: usize,

    /// Capacity of the block channel, in blocks. Minimum 1.
    pub block_count: usize,
}

impl PrefetchConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
        }
    }

    /// Sets the block size (clamped to at least 1 byte).
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes.max(1);
        self
    }

    /// Sets the block channel capacity (clamped to at least 1 block).
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.block_count = blocks.max(1);
        self
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self::new()
    }
}
