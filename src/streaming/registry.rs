//! Registry of active chunk pipelines

use std::collections::HashMap;

use crate::geometry::GeometryBinding;
use crate::physics::PhysicsHandle;

use super::cancel::CancellationToken;
use super::chunk::ChunkKey;

/// Pipeline stage of one chunk
///
/// `Cancelled` is absorbing and reachable from every non-terminal state;
/// `Empty` is the terminal state of chunks whose generator produced no
/// surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Requested,
    Generating,
    Empty,
    MeshAllocated,
    PhysicsPending,
    Active,
    Cancelled,
}

/// Pipeline binding of one active chunk
pub struct ChunkEntry {
    token: CancellationToken,
    state: ChunkState,
    binding: Option<GeometryBinding>,
    physics: Option<PhysicsHandle>,
}

impl ChunkEntry {
    /// The chunk's cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Current pipeline stage
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Geometry binding, once the chunk reached `MeshAllocated`
    pub fn binding(&self) -> Option<&GeometryBinding> {
        self.binding.as_ref()
    }

    /// Physics handle, once the chunk reached `Active`
    pub fn physics(&self) -> Option<PhysicsHandle> {
        self.physics
    }
}

/// Maps each active chunk to its pipeline entry
///
/// Owned by the coordinating context; disposal consults it to find the
/// token to cancel, and removal is idempotent.
#[derive(Default)]
pub struct ChunkRegistry {
    entries: HashMap<ChunkKey, ChunkEntry>,
}

impl ChunkRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly requested chunk
    ///
    /// Returns `false` without touching the registry when the chunk is
    /// already tracked; a chunk may never hold two pipeline entries.
    pub fn insert(&mut self, key: ChunkKey, token: CancellationToken) -> bool {
        if self.entries.contains_key(&key) {
            log::warn!("chunk {} already has a pipeline entry", key);
            return false;
        }
        self.entries.insert(
            key,
            ChunkEntry {
                token,
                state: ChunkState::Requested,
                binding: None,
                physics: None,
            },
        );
        true
    }

    /// Remove and return a chunk's entry, if tracked
    pub fn remove(&mut self, key: ChunkKey) -> Option<ChunkEntry> {
        self.entries.remove(&key)
    }

    /// Look up a chunk's entry
    pub fn get(&self, key: ChunkKey) -> Option<&ChunkEntry> {
        self.entries.get(&key)
    }

    /// Advance a chunk's pipeline stage
    pub fn set_state(&mut self, key: ChunkKey, state: ChunkState) {
        if let Some(entry) = self.entries.get_mut(&key) {
            log::trace!("chunk {} {:?} -> {:?}", key, entry.state, state);
            entry.state = state;
        }
    }

    /// Record the chunk's geometry binding
    pub fn set_binding(&mut self, key: ChunkKey, binding: GeometryBinding) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.binding = Some(binding);
        }
    }

    /// Record the chunk's physics handle
    pub fn set_physics(&mut self, key: ChunkKey, handle: PhysicsHandle) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.physics = Some(handle);
        }
    }

    /// Current pipeline stage of a chunk
    pub fn state_of(&self, key: ChunkKey) -> Option<ChunkState> {
        self.entries.get(&key).map(|e| e.state)
    }

    /// Number of tracked chunks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no chunks are tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain every entry, for shutdown
    pub fn drain(&mut self) -> Vec<(ChunkKey, ChunkEntry)> {
        self.entries.drain().collect()
    }
}
