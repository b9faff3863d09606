//! Per-chunk streaming pipeline
//!
//! Key concepts:
//! - Chunk Key: integer grid coordinate plus LOD level, issued by the
//!   external LOD scheduler
//! - Cancellation Token: one-way abort signal carrying release callbacks,
//!   observed by every in-flight pipeline stage
//! - Chunk Registry: maps each active chunk to its pipeline entry for
//!   lookup during disposal
//! - Terrain Streamer: orchestrates generate -> buffer write -> physics
//!   cook -> register per chunk, with symmetric teardown

pub mod cancel;
pub mod chunk;
pub mod pipeline;
pub mod registry;

pub use cancel::CancellationToken;
pub use chunk::{ChunkCoord, ChunkKey};
pub use pipeline::{StreamerConfig, TerrainStreamer};
pub use registry::{ChunkRegistry, ChunkState};
