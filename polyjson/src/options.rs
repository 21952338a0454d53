/// Default nesting limit for skipped sibling values (matches serde_json's recursion limit).
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default initial buffer capacity for reader-based decoding (8KB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Options for polymorphic decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// How deep a skipped sibling value may nest before it is rejected (default: 128)
    pub max_depth: usize,

    /// Initial buffer size for [`StreamDeserializer`](crate::StreamDeserializer) (default: 8KB)
    pub buffer_capacity: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl DecodeOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nesting limit for skipped values.
    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the initial buffer capacity for reader-based decoding.
    ///
    /// The buffer still grows when a single object does not fit.
    pub const fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }
}
