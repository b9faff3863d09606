//! Mesh generator boundary
//!
//! The dual-contouring mesher itself lives outside this crate (a worker
//! service, typically off-thread); the pipeline only consumes this
//! contract.

use std::future::Future;

use crate::core::types::{Result, Vec3};
use crate::streaming::chunk::ChunkKey;

use super::mesh::MeshPayload;

/// Asynchronous mesh generation service for terrain chunks
///
/// Cancellation is by abandonment: a disposed chunk's pipeline simply
/// discards the result, the generator is not interrupted.
pub trait ChunkGenerator: Send + Sync + 'static {
    /// Generate the surface mesh for one chunk
    ///
    /// Returns `Ok(None)` for chunks without any surface (air or solid
    /// interior); that is a terminal outcome for the chunk, not a failure.
    fn generate(&self, key: ChunkKey)
        -> impl Future<Output = Result<Option<MeshPayload>>> + Send;

    /// Carve a sphere of damage out of the terrain field
    ///
    /// Fire-and-forget edit; the LOD scheduler re-generates affected
    /// chunks on its own.
    fn erase_sphere(&self, center: Vec3, radius: f32);
}
