//! Shared geometry buffer management
//!
//! Key concepts:
//! - Backing Buffer: one fixed-capacity array per declared attribute plus
//!   one index array; capacity is set once and never grows
//! - Free List: per-stream bookkeeping of unused regions, reused across
//!   chunk loads to keep fragmentation down
//! - Geometry Binding: the set of regions allocated for one chunk's mesh,
//!   the unit of alloc/free
//! - Draw Groups: contiguous used index ranges, recomputed after every
//!   alloc or free so draw submission always matches live geometry

pub mod allocator;
pub mod buffer;
pub mod free_list;

pub use allocator::{
    AllocatorStats, BindingId, DrawGroup, GeometryAllocator, GeometryBinding, StreamStats,
};
pub use buffer::{
    AttributeSpec, AttributeStream, BufferConfig, ByteRange, Scalar, ScalarKind,
    ATTR_BIOMES, ATTR_BIOME_WEIGHTS, ATTR_NORMAL, ATTR_POSITION, DEFAULT_STREAM_BYTES,
};
pub use free_list::{FreeList, Region};
