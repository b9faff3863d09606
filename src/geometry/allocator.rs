//! Shared geometry buffer sub-allocation
//!
//! Carves per-chunk regions out of one fixed-capacity backing buffer per
//! attribute stream plus one index stream. Allocation is all-or-nothing
//! across streams; freed regions return to per-stream free lists and are
//! reused by later chunks. Draw groups are recomputed from the index free
//! list at explicit synchronization points, never implicitly.
//!
//! The allocator is owned by a single coordinating context; it is not safe
//! to mutate from multiple threads without external locking. Worker tasks
//! never touch it directly, they hand their results back to the owner.

use std::collections::HashMap;
use std::fmt;

use crate::core::types::Result;
use crate::core::Error;
use crate::math::Aabb;

use super::buffer::{AttributeSpec, AttributeStream, BufferConfig, ByteRange, Scalar, ScalarKind};
use super::free_list::{FreeList, Region};

/// Name used for the index stream in errors and stats
const INDEX_STREAM: &str = "index";

/// Identifier of one live geometry binding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

impl BindingId {
    /// Raw numeric id
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A contiguous used range of the index stream, in submission order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawGroup {
    /// First index element of the group
    pub start: usize,
    /// Number of index elements in the group
    pub count: usize,
}

/// The set of regions allocated for one chunk's mesh
///
/// Created only by [`GeometryAllocator::alloc`], destroyed only by
/// [`GeometryAllocator::free`]. Offsets are stable for the binding's
/// lifetime and invalid after the free.
#[derive(Clone, Debug)]
pub struct GeometryBinding {
    id: BindingId,
    vertex_count: usize,
    index_count: usize,
    /// Start of the binding in the shared vertex-index space
    vertex_base: usize,
    /// One region per declared attribute, in declaration order (scalar space)
    attributes: Vec<Region>,
    /// Region in the index stream (u32 element space)
    index_region: Region,
    bounds: Option<Aabb>,
}

impl GeometryBinding {
    /// Binding identifier
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Vertices covered by every attribute region
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Elements in the index region
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Vertex-element index where this binding starts in the shared vertex
    /// space; added to every stored index
    pub fn vertex_base(&self) -> usize {
        self.vertex_base
    }

    /// Bounding volume supplied at allocation, if any
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }
}

/// Allocation counters and live-binding count
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub live_bindings: usize,
    pub allocs: u64,
    pub frees: u64,
    pub failed_allocs: u64,
}

/// Per-stream utilization snapshot
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub name: String,
    /// Capacity in elements
    pub capacity: usize,
    /// Free elements
    pub free: usize,
    /// Live elements
    pub live: usize,
}

struct StreamState {
    stream: AttributeStream,
    free: FreeList,
}

/// Sub-allocator over the shared geometry backing buffers
pub struct GeometryAllocator {
    attributes: Vec<StreamState>,
    index_stream: AttributeStream,
    index_free: FreeList,
    /// Live bindings by id; the authoritative record used to validate
    /// frees and writes
    live: HashMap<BindingId, GeometryBinding>,
    draw_groups: Vec<DrawGroup>,
    next_id: u64,
    allocs: u64,
    frees: u64,
    failed_allocs: u64,
}

impl GeometryAllocator {
    /// Create backing streams and free lists for the declared layout
    pub fn new(config: BufferConfig) -> Self {
        assert!(
            !config.attributes.is_empty(),
            "at least one attribute stream must be declared"
        );
        let attributes: Vec<StreamState> = config
            .attributes
            .iter()
            .map(|spec| {
                let stream = AttributeStream::new(spec.clone(), config.stream_bytes);
                let free = FreeList::new(stream.capacity());
                StreamState { stream, free }
            })
            .collect();
        let index_spec = AttributeSpec::new(INDEX_STREAM, ScalarKind::U32, 1);
        let index_stream = AttributeStream::new(index_spec, config.stream_bytes);
        let index_free = FreeList::new(index_stream.capacity());

        log::info!(
            "created geometry buffers: {} attribute streams + indices, {} KiB per stream",
            attributes.len(),
            config.stream_bytes / 1024
        );

        Self {
            attributes,
            index_stream,
            index_free,
            live: HashMap::new(),
            draw_groups: Vec::new(),
            next_id: 0,
            allocs: 0,
            frees: 0,
            failed_allocs: 0,
        }
    }

    /// Reserve regions for one chunk's mesh in every stream
    ///
    /// All streams succeed or none are committed: on exhaustion the regions
    /// already reserved are rolled back and `Error::OutOfSpace` is returned.
    pub fn alloc(
        &mut self,
        vertex_count: usize,
        index_count: usize,
        bounds: Option<Aabb>,
    ) -> Result<GeometryBinding> {
        debug_assert!(vertex_count > 0 && index_count > 0);
        let mut regions: Vec<Region> = Vec::with_capacity(self.attributes.len());
        for i in 0..self.attributes.len() {
            let len = vertex_count * self.attributes[i].stream.spec().item_size;
            match self.attributes[i].free.alloc(len) {
                Some(offset) => regions.push(Region::new(offset, len)),
                None => {
                    let stream = self.attributes[i].stream.spec().name.clone();
                    self.rollback(&regions);
                    self.failed_allocs += 1;
                    log::error!(
                        "geometry buffer exhausted: stream `{}` cannot fit {} elements",
                        stream,
                        len
                    );
                    return Err(Error::OutOfSpace {
                        stream,
                        requested: len,
                    });
                }
            }
        }
        let Some(index_offset) = self.index_free.alloc(index_count) else {
            self.rollback(&regions);
            self.failed_allocs += 1;
            log::error!(
                "geometry buffer exhausted: index stream cannot fit {} elements",
                index_count
            );
            return Err(Error::OutOfSpace {
                stream: INDEX_STREAM.to_string(),
                requested: index_count,
            });
        };

        let vertex_base = regions[0].offset / self.attributes[0].stream.spec().item_size;
        let id = BindingId(self.next_id);
        self.next_id += 1;
        let binding = GeometryBinding {
            id,
            vertex_count,
            index_count,
            vertex_base,
            attributes: regions,
            index_region: Region::new(index_offset, index_count),
            bounds,
        };
        self.live.insert(id, binding.clone());
        self.allocs += 1;
        log::trace!(
            "allocated binding {} ({} vertices at base {}, {} indices at {})",
            id,
            vertex_count,
            vertex_base,
            index_count,
            index_offset
        );
        Ok(binding)
    }

    /// Return every region owned by the binding to its stream's free list
    ///
    /// Freeing a binding that is not live (double free, or a binding this
    /// allocator never issued) is a lifecycle violation and reported as
    /// `Error::UnknownBinding`.
    pub fn free(&mut self, binding: &GeometryBinding) -> Result<()> {
        let Some(stored) = self.live.remove(&binding.id) else {
            log::error!("free of non-live geometry binding {}", binding.id);
            return Err(Error::UnknownBinding {
                binding: binding.id.raw(),
            });
        };
        for (state, region) in self.attributes.iter_mut().zip(&stored.attributes) {
            state.free.free(*region);
        }
        self.index_free.free(stored.index_region);
        self.frees += 1;
        log::trace!("freed binding {}", binding.id);
        Ok(())
    }

    /// Element offset of the binding's region in the named attribute stream
    pub fn attribute_offset(&self, binding: &GeometryBinding, name: &str) -> Result<usize> {
        let idx = self.attribute_index(name)?;
        Ok(binding.attributes[idx].offset)
    }

    /// Element offset of the binding's region in the index stream
    pub fn index_offset(&self, binding: &GeometryBinding) -> usize {
        binding.index_region.offset
    }

    /// Copy `data` into the named attribute stream at the binding's offset
    pub fn write_attribute<T: Scalar>(
        &mut self,
        binding: &GeometryBinding,
        name: &str,
        data: &[T],
    ) -> Result<()> {
        if !self.live.contains_key(&binding.id) {
            log::error!("write against non-live geometry binding {}", binding.id);
            return Err(Error::UnknownBinding {
                binding: binding.id.raw(),
            });
        }
        let idx = self.attribute_index(name)?;
        let kind = self.attributes[idx].stream.spec().kind;
        if kind != T::KIND {
            return Err(Error::ScalarMismatch {
                attribute: name.to_string(),
                expected: kind,
                got: T::KIND,
            });
        }
        let region = binding.attributes[idx];
        if data.len() != region.len {
            return Err(Error::AttributeMismatch {
                attribute: name.to_string(),
                expected: region.len,
                got: data.len(),
            });
        }
        self.attributes[idx].stream.write(region.offset, data);
        Ok(())
    }

    /// Write a binding's triangle indices, remapping each source index by
    /// the binding's vertex base
    ///
    /// All bindings share one global vertex-index space, so stored indices
    /// must be global, not mesh-local.
    pub fn write_indices(&mut self, binding: &GeometryBinding, indices: &[u32]) -> Result<()> {
        if !self.live.contains_key(&binding.id) {
            log::error!("index write against non-live geometry binding {}", binding.id);
            return Err(Error::UnknownBinding {
                binding: binding.id.raw(),
            });
        }
        let region = binding.index_region;
        if indices.len() != region.len {
            return Err(Error::AttributeMismatch {
                attribute: INDEX_STREAM.to_string(),
                expected: region.len,
                got: indices.len(),
            });
        }
        let base = binding.vertex_base as u32;
        let remapped: Vec<u32> = indices.iter().map(|i| i + base).collect();
        self.index_stream.write(region.offset, &remapped);
        Ok(())
    }

    /// Rebuild the draw-group list from the index free list
    ///
    /// Must be called after any alloc or free before the buffer is next
    /// drawn; draw submission over stale groups would reference freed or
    /// unwritten geometry.
    pub fn recompute_draw_groups(&mut self) {
        self.draw_groups = self
            .index_free
            .used_spans()
            .into_iter()
            .map(|span| DrawGroup {
                start: span.offset,
                count: span.len,
            })
            .collect();
        log::trace!("recomputed {} draw groups", self.draw_groups.len());
    }

    /// Current draw groups, in submission order
    pub fn draw_groups(&self) -> &[DrawGroup] {
        &self.draw_groups
    }

    /// Typed view of the named attribute stream
    pub fn attribute_scalars<T: Scalar>(&self, name: &str) -> Result<&[T]> {
        let idx = self.attribute_index(name)?;
        Ok(self.attributes[idx].stream.scalars())
    }

    /// View of the whole index stream
    pub fn indices(&self) -> &[u32] {
        self.index_stream.scalars()
    }

    /// Drain dirty byte ranges for the named attribute stream
    pub fn take_dirty_attribute(&mut self, name: &str) -> Result<Vec<ByteRange>> {
        let idx = self.attribute_index(name)?;
        Ok(self.attributes[idx].stream.take_dirty())
    }

    /// Drain dirty byte ranges for the index stream
    pub fn take_dirty_indices(&mut self) -> Vec<ByteRange> {
        self.index_stream.take_dirty()
    }

    /// Whether the binding is currently live
    pub fn is_live(&self, binding: &GeometryBinding) -> bool {
        self.live.contains_key(&binding.id)
    }

    /// Allocation counters
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live_bindings: self.live.len(),
            allocs: self.allocs,
            frees: self.frees,
            failed_allocs: self.failed_allocs,
        }
    }

    /// Utilization snapshot of every stream, index stream last
    pub fn stream_stats(&self) -> Vec<StreamStats> {
        let mut stats: Vec<StreamStats> = self
            .attributes
            .iter()
            .map(|state| StreamStats {
                name: state.stream.spec().name.clone(),
                capacity: state.free.capacity(),
                free: state.free.free_total(),
                live: state.free.used_total(),
            })
            .collect();
        stats.push(StreamStats {
            name: INDEX_STREAM.to_string(),
            capacity: self.index_free.capacity(),
            free: self.index_free.free_total(),
            live: self.index_free.used_total(),
        });
        stats
    }

    fn attribute_index(&self, name: &str) -> Result<usize> {
        self.attributes
            .iter()
            .position(|s| s.stream.spec().name == name)
            .ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    /// Undo attribute reservations made by a partially failed alloc
    fn rollback(&mut self, regions: &[Region]) {
        for (state, region) in self.attributes.iter_mut().zip(regions) {
            state.free.free(*region);
        }
    }
}
