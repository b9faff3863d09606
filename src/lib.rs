//! Terrastream - chunked level-of-detail terrain streaming
//!
//! Streams a chunked terrain surface into a small set of large, fixed-capacity
//! geometry buffers:
//! - Geometry Allocator: free-list sub-allocation of shared vertex/index storage
//! - Chunk Pipeline: async generate -> buffer write -> physics cook -> register
//! - Cancellation Tokens: one-way abort signals with release callbacks for
//!   safe teardown of in-flight chunks

pub mod core;
pub mod geometry;
pub mod math;
pub mod physics;
pub mod streaming;
pub mod terrain;
