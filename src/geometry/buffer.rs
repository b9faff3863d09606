//! Fixed-capacity backing storage for geometry streams
//!
//! One storage array per declared attribute plus one index array. Capacity
//! is fixed at construction and never grows; writes land at element offsets
//! handed out by the allocator and mark the touched byte range dirty for
//! the (out-of-scope) device upload layer.

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

/// Default byte budget per stream (a 20 MiB geometry buffer)
pub const DEFAULT_STREAM_BYTES: usize = 20 * 1024 * 1024;

/// Vertex position attribute, 3 floats per vertex. The position stream
/// anchors the shared vertex-index space.
pub const ATTR_POSITION: &str = "position";
/// Vertex normal attribute, 3 floats per vertex
pub const ATTR_NORMAL: &str = "normal";
/// Biome id attribute, 4 ints per vertex
pub const ATTR_BIOMES: &str = "biomes";
/// Biome blend weight attribute, 4 floats per vertex
pub const ATTR_BIOME_WEIGHTS: &str = "biome_weights";

/// Scalar element type of one stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    F32,
    I32,
    U32,
}

impl ScalarKind {
    /// Size of one scalar in bytes
    pub fn size(self) -> usize {
        match self {
            ScalarKind::F32 | ScalarKind::I32 | ScalarKind::U32 => 4,
        }
    }
}

/// Scalar types storable in an attribute stream
pub trait Scalar: Pod {
    /// The stream type this scalar belongs to
    const KIND: ScalarKind;
}

impl Scalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;
}

impl Scalar for i32 {
    const KIND: ScalarKind = ScalarKind::I32;
}

impl Scalar for u32 {
    const KIND: ScalarKind = ScalarKind::U32;
}

/// Declaration of one named, strided attribute stream
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub kind: ScalarKind,
    /// Scalars per vertex (3 for a position, 4 for a biome blend)
    pub item_size: usize,
}

impl AttributeSpec {
    /// Create a new attribute declaration
    pub fn new(name: &str, kind: ScalarKind, item_size: usize) -> Self {
        Self {
            name: name.to_string(),
            kind,
            item_size,
        }
    }
}

/// Backing buffer construction parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Declared attribute streams; the first entry anchors the shared
    /// vertex space used for index remapping
    pub attributes: Vec<AttributeSpec>,
    /// Fixed byte capacity of every attribute stream and the index stream
    pub stream_bytes: usize,
}

impl BufferConfig {
    /// The dual-contouring terrain surface format: positions, normals and
    /// two biome blend attributes
    pub fn terrain_surface(stream_bytes: usize) -> Self {
        Self {
            attributes: vec![
                AttributeSpec::new(ATTR_POSITION, ScalarKind::F32, 3),
                AttributeSpec::new(ATTR_NORMAL, ScalarKind::F32, 3),
                AttributeSpec::new(ATTR_BIOMES, ScalarKind::I32, 4),
                AttributeSpec::new(ATTR_BIOME_WEIGHTS, ScalarKind::F32, 4),
            ],
            stream_bytes,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::terrain_surface(DEFAULT_STREAM_BYTES)
    }
}

/// A dirty byte range pending upload to the device layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

/// Fixed-capacity storage for one stream plus dirty-range tracking
pub struct AttributeStream {
    spec: AttributeSpec,
    data: Vec<u8>,
    /// Capacity in scalar elements
    capacity: usize,
    dirty: Vec<ByteRange>,
}

impl AttributeStream {
    /// Allocate zeroed storage of `stream_bytes` for the given declaration
    pub fn new(spec: AttributeSpec, stream_bytes: usize) -> Self {
        let capacity = stream_bytes / spec.kind.size();
        Self {
            data: vec![0u8; capacity * spec.kind.size()],
            capacity,
            spec,
            dirty: Vec::new(),
        }
    }

    /// The stream's declaration
    pub fn spec(&self) -> &AttributeSpec {
        &self.spec
    }

    /// Capacity in scalar elements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `src` into the stream starting at `offset` (in scalar elements)
    /// and mark the touched bytes dirty
    pub fn write<T: Scalar>(&mut self, offset: usize, src: &[T]) {
        debug_assert_eq!(T::KIND, self.spec.kind);
        let start = offset * self.spec.kind.size();
        let bytes: &[u8] = bytemuck::cast_slice(src);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.dirty.push(ByteRange {
            start,
            end: start + bytes.len(),
        });
    }

    /// Typed view of the whole stream
    pub fn scalars<T: Scalar>(&self) -> &[T] {
        debug_assert_eq!(T::KIND, self.spec.kind);
        bytemuck::cast_slice(&self.data)
    }

    /// Raw bytes of the whole stream
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Drain the byte ranges written since the last call, sorted and merged
    /// for the upload layer
    pub fn take_dirty(&mut self) -> Vec<ByteRange> {
        let mut ranges = std::mem::take(&mut self.dirty);
        if ranges.len() <= 1 {
            return ranges;
        }
        ranges.sort_by_key(|r| r.start);
        let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
        for r in ranges {
            match merged.last_mut() {
                Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
                _ => merged.push(r),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_bytes() {
        let spec = AttributeSpec::new(ATTR_POSITION, ScalarKind::F32, 3);
        let stream = AttributeStream::new(spec, 120);
        assert_eq!(stream.capacity(), 30);
        assert_eq!(stream.bytes().len(), 120);
    }

    #[test]
    fn test_write_and_read_back() {
        let spec = AttributeSpec::new(ATTR_BIOMES, ScalarKind::I32, 4);
        let mut stream = AttributeStream::new(spec, 64);

        stream.write(4, &[7i32, 8, 9, 10]);
        assert_eq!(&stream.scalars::<i32>()[4..8], &[7, 8, 9, 10]);
    }

    #[test]
    fn test_take_dirty_merges_ranges() {
        let spec = AttributeSpec::new(ATTR_POSITION, ScalarKind::F32, 3);
        let mut stream = AttributeStream::new(spec, 400);

        stream.write(0, &[1.0f32; 3]);
        stream.write(3, &[2.0f32; 3]);
        stream.write(20, &[3.0f32; 3]);

        let dirty = stream.take_dirty();
        assert_eq!(
            dirty,
            vec![ByteRange { start: 0, end: 24 }, ByteRange { start: 80, end: 92 }]
        );
        assert!(stream.take_dirty().is_empty());
    }

    #[test]
    fn test_default_config_is_terrain_surface() {
        let config = BufferConfig::default();
        assert_eq!(config.stream_bytes, DEFAULT_STREAM_BYTES);
        assert_eq!(config.attributes.len(), 4);
        assert_eq!(config.attributes[0].name, ATTR_POSITION);
        assert_eq!(config.attributes[0].item_size, 3);
    }
}
