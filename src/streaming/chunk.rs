//! Chunk identity in the streamed terrain grid

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;

/// Integer coordinate identifying a chunk in the world grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert a world position to the containing chunk coordinate
    pub fn from_world_pos(pos: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).floor() as i32,
            y: (pos.y / chunk_size).floor() as i32,
            z: (pos.z / chunk_size).floor() as i32,
        }
    }

    /// World-space origin (minimum corner) of this chunk
    pub fn world_origin(&self, chunk_size: f32) -> Vec3 {
        Vec3::new(
            self.x as f32 * chunk_size,
            self.y as f32 * chunk_size,
            self.z as f32 * chunk_size,
        )
    }
}

/// Identity of one streamed chunk: grid coordinate plus LOD level
///
/// Immutable once issued by the scheduler; two keys are the same chunk
/// only when both coordinate and LOD match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub coord: ChunkCoord,
    pub lod: u32,
}

impl ChunkKey {
    /// Create a new chunk key
    pub fn new(coord: ChunkCoord, lod: u32) -> Self {
        Self { coord, lod }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})@{}",
            self.coord.x, self.coord.y, self.coord.z, self.lod
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_round_trip() {
        let coord = ChunkCoord::from_world_pos(Vec3::new(33.0, -0.5, 64.0), 16.0);
        assert_eq!(coord, ChunkCoord::new(2, -1, 4));
        assert_eq!(coord.world_origin(16.0), Vec3::new(32.0, -16.0, 64.0));
    }

    #[test]
    fn test_key_equality_includes_lod() {
        let coord = ChunkCoord::new(1, 2, 3);
        assert_eq!(ChunkKey::new(coord, 0), ChunkKey::new(coord, 0));
        assert_ne!(ChunkKey::new(coord, 0), ChunkKey::new(coord, 1));
    }
}
