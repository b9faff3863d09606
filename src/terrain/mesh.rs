//! Mesh data produced by the terrain generator

use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use crate::core::Error;
use crate::math::Aabb;

/// Surface mesh data for one chunk, as parallel per-vertex arrays
///
/// The generator returns `None` instead of a payload for chunks whose
/// surface does not intersect them (air, solid interior); that is a valid
/// terminal outcome, not an error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeshPayload {
    /// xyz positions, 3 floats per vertex
    pub positions: Vec<f32>,
    /// xyz normals, 3 floats per vertex
    pub normals: Vec<f32>,
    /// Biome ids, 4 ints per vertex
    pub biomes: Vec<i32>,
    /// Biome blend weights, 4 floats per vertex
    pub biome_weights: Vec<f32>,
    /// Triangle list, mesh-local vertex indices
    pub indices: Vec<u32>,
}

impl MeshPayload {
    /// Number of vertices described by the payload
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of index elements
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Whether the payload describes no geometry at all
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Tightest bounding box around the payload's positions
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_positions(&self.positions)
    }

    /// Check that the parallel arrays agree on the vertex count and that
    /// every index points at a vertex
    pub fn validate(&self) -> Result<()> {
        let vertices = self.vertex_count();
        if self.positions.len() != vertices * 3
            || self.normals.len() != vertices * 3
            || self.biomes.len() != vertices * 4
            || self.biome_weights.len() != vertices * 4
        {
            return Err(Error::Generation(format!(
                "inconsistent payload arrays for {} vertices",
                vertices
            )));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(Error::Generation(format!(
                "index {} out of range for {} vertices",
                index, vertices
            )));
        }
        Ok(())
    }

    /// Positions and indices only, the shape the physics cooker consumes
    pub fn triangle_mesh(&self) -> TriangleMesh {
        TriangleMesh {
            positions: self.positions.clone(),
            indices: self.indices.clone(),
        }
    }
}

/// A bare triangle soup handed to the physics cooker
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    /// xyz positions, 3 floats per vertex
    pub positions: Vec<f32>,
    /// Triangle list, mesh-local vertex indices
    pub indices: Vec<u32>,
}
