//! Physics collaborator boundary
//!
//! Cooking and collision live in the physics engine; the pipeline owns the
//! lifecycle: a cooked chunk is registered exactly once, and removed
//! exactly once on disposal.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::types::{Quat, Result, Vec3};
use crate::streaming::cancel::CancellationToken;
use crate::terrain::mesh::TriangleMesh;

/// Opaque handle to a collision object registered with the physics world
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicsHandle(pub u64);

/// Cooked collision data; the contents are meaningful only to the physics
/// backend that produced them
#[derive(Clone, Debug, Default)]
pub struct CookedBuffer(pub Vec<u8>);

/// Asynchronous cooking of a triangle mesh into collision data
pub trait PhysicsCooker: Send + Sync + 'static {
    /// Cook a triangle mesh
    ///
    /// Implementations must observe `token` and fail with `Error::Aborted`
    /// when the owning chunk is disposed mid-cook.
    fn cook(
        &self,
        mesh: TriangleMesh,
        token: CancellationToken,
    ) -> impl Future<Output = Result<CookedBuffer>> + Send;
}

/// The physics world that owns registered collision geometry
pub trait PhysicsWorld: Send + Sync + 'static {
    /// Register cooked geometry at a world transform
    fn add_cooked_geometry(
        &self,
        buffer: CookedBuffer,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> PhysicsHandle;

    /// Remove previously registered geometry
    fn remove_geometry(&self, handle: PhysicsHandle);
}
