//! Per-chunk streaming pipeline
//!
//! Orchestrates, for every chunk the LOD scheduler requests, the sequence
//! generate -> write-to-buffer -> cook-physics -> register. Long-latency
//! stages run as spawned tasks and report back over a channel; all
//! allocator and registry mutation happens on the coordinating context,
//! inside [`TerrainStreamer::pump`] and [`TerrainStreamer::dispose`].
//! Every stage re-checks its cancellation token on resume, so a disposed
//! chunk never mutates shared state, no matter how late its results
//! arrive.

use std::sync::{Arc, Mutex};

use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;

use crate::core::types::{Quat, Result, Vec3};
use crate::core::Error;
use crate::geometry::{
    BufferConfig, GeometryAllocator, GeometryBinding, ATTR_BIOMES, ATTR_BIOME_WEIGHTS,
    ATTR_NORMAL, ATTR_POSITION,
};
use crate::physics::{CookedBuffer, PhysicsCooker, PhysicsHandle, PhysicsWorld};
use crate::terrain::generator::ChunkGenerator;
use crate::terrain::mesh::MeshPayload;

use super::cancel::CancellationToken;
use super::chunk::ChunkKey;
use super::registry::{ChunkRegistry, ChunkState};

/// Streamer construction parameters
#[derive(Clone, Debug)]
pub struct StreamerConfig {
    /// Backing buffer layout and per-stream capacity
    pub buffer: BufferConfig,
    /// World transform applied when registering cooked geometry
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Stage results reported back to the coordinating context
enum PipelineEvent {
    MeshReady {
        key: ChunkKey,
        token: CancellationToken,
        result: Result<Option<MeshPayload>>,
    },
    CookReady {
        key: ChunkKey,
        token: CancellationToken,
        result: Result<CookedBuffer>,
    },
}

/// Streams terrain chunks through generation, geometry upload and physics
/// registration
///
/// `generate` and `dispose` return immediately; stage results are applied
/// when the owner of the geometry buffers calls [`pump`](Self::pump) (or
/// the async variants). The generator, cooker and physics world are
/// external collaborators shared with the rest of the engine.
pub struct TerrainStreamer<G, C, W> {
    config: StreamerConfig,
    allocator: Arc<Mutex<GeometryAllocator>>,
    registry: ChunkRegistry,
    generator: Arc<G>,
    cooker: Arc<C>,
    world: Arc<W>,
    /// Handles of every chunk currently registered with the physics world
    physics_objects: Arc<Mutex<Vec<PhysicsHandle>>>,
    events_tx: mpsc::UnboundedSender<PipelineEvent>,
    events_rx: mpsc::UnboundedReceiver<PipelineEvent>,
    /// Spawned stages whose results have not been handled yet
    in_flight: usize,
    /// Dedicated runtime, kept alive when the caller has none
    #[allow(dead_code)]
    runtime: Option<Runtime>,
    handle: Handle,
}

impl<G, C, W> TerrainStreamer<G, C, W>
where
    G: ChunkGenerator,
    C: PhysicsCooker,
    W: PhysicsWorld,
{
    /// Create a streamer with its own tokio runtime for stage tasks
    pub fn new(config: StreamerConfig, generator: Arc<G>, cooker: Arc<C>, world: Arc<W>) -> Self {
        let runtime = Runtime::new().expect("failed to create tokio runtime");
        let handle = runtime.handle().clone();
        Self::build(config, generator, cooker, world, Some(runtime), handle)
    }

    /// Create a streamer that spawns stage tasks on the current runtime
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new_with_current_runtime(
        config: StreamerConfig,
        generator: Arc<G>,
        cooker: Arc<C>,
        world: Arc<W>,
    ) -> Self {
        let handle = Handle::current();
        Self::build(config, generator, cooker, world, None, handle)
    }

    fn build(
        config: StreamerConfig,
        generator: Arc<G>,
        cooker: Arc<C>,
        world: Arc<W>,
        runtime: Option<Runtime>,
        handle: Handle,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let allocator = GeometryAllocator::new(config.buffer.clone());
        Self {
            config,
            allocator: Arc::new(Mutex::new(allocator)),
            registry: ChunkRegistry::new(),
            generator,
            cooker,
            world,
            physics_objects: Arc::new(Mutex::new(Vec::new())),
            events_tx,
            events_rx,
            in_flight: 0,
            runtime,
            handle,
        }
    }

    /// Start streaming a chunk; returns immediately
    ///
    /// Returns `false` when the chunk already has a pipeline entry. Called
    /// by the LOD scheduler when the chunk comes into range.
    pub fn generate(&mut self, key: ChunkKey) -> bool {
        let token = CancellationToken::new();
        if !self.registry.insert(key, token.clone()) {
            return false;
        }
        self.registry.set_state(key, ChunkState::Generating);
        log::debug!("generating chunk {}", key);

        let generator = Arc::clone(&self.generator);
        let events = self.events_tx.clone();
        self.in_flight += 1;
        self.handle.spawn(async move {
            let result = generator.generate(key).await;
            let _ = events.send(PipelineEvent::MeshReady { key, token, result });
        });
        true
    }

    /// Dispose of a chunk; returns immediately, idempotent
    ///
    /// Cancels the chunk's token, which releases whatever the pipeline has
    /// acquired so far (geometry regions, physics registration) through
    /// the registered release callbacks, regardless of which stage is in
    /// flight. Called by the LOD scheduler when the chunk leaves range.
    pub fn dispose(&mut self, key: ChunkKey) {
        let Some(entry) = self.registry.get(key) else {
            log::trace!("dispose of untracked chunk {}", key);
            return;
        };
        let token = entry.token().clone();
        self.registry.set_state(key, ChunkState::Cancelled);
        log::debug!("disposing chunk {}", key);
        token.cancel("chunk disposed");
        self.registry.remove(key);
    }

    /// Forward a damage hit to the terrain generator
    ///
    /// The LOD scheduler re-generates affected chunks on its own.
    pub fn hit(&self, position: Vec3, radius: f32) {
        log::debug!("terrain hit at {:?} radius {}", position, radius);
        self.generator.erase_sphere(position, radius);
    }

    /// Apply every stage result currently queued, without blocking
    ///
    /// Call once per frame from the thread that owns the geometry buffers;
    /// this is where all allocator mutation happens. Returns the number of
    /// events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Await and apply a single stage result
    ///
    /// Returns `false` when no stage is in flight.
    pub async fn pump_one(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Drain stage results until no pipeline stage is in flight
    pub async fn settle(&mut self) {
        while self.pump_one().await {}
    }

    /// Handles of every chunk currently registered with the physics world
    pub fn active_physics_objects(&self) -> Vec<PhysicsHandle> {
        self.physics_objects.lock().unwrap().clone()
    }

    /// Current pipeline stage of a chunk, `None` once disposed
    pub fn chunk_state(&self, key: ChunkKey) -> Option<ChunkState> {
        self.registry.state_of(key)
    }

    /// Number of chunks with a pipeline entry
    pub fn tracked_chunks(&self) -> usize {
        self.registry.len()
    }

    /// Shared geometry allocator, for the upload layer and diagnostics
    ///
    /// Lock it only from the coordinating context; see the module docs.
    pub fn allocator(&self) -> &Arc<Mutex<GeometryAllocator>> {
        &self.allocator
    }

    /// Cancel every tracked chunk and release its resources
    pub fn shutdown(&mut self) {
        for (key, entry) in self.registry.drain() {
            log::debug!("shutdown disposing chunk {}", key);
            entry.token().cancel("streamer shutdown");
        }
    }

    fn handle_event(&mut self, event: PipelineEvent) {
        self.in_flight -= 1;
        match event {
            PipelineEvent::MeshReady { key, token, result } => {
                self.handle_mesh_ready(key, token, result)
            }
            PipelineEvent::CookReady { key, token, result } => {
                self.handle_cook_ready(key, token, result)
            }
        }
    }

    /// Continuation of the generation stage, on the coordinating context
    fn handle_mesh_ready(
        &mut self,
        key: ChunkKey,
        token: CancellationToken,
        result: Result<Option<MeshPayload>>,
    ) {
        if token.is_cancelled() {
            // nothing was allocated yet, abandoning leaks nothing
            log::trace!("discarding mesh result for cancelled chunk {}", key);
            return;
        }
        let payload = match result {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                log::debug!("chunk {} is empty", key);
                self.registry.set_state(key, ChunkState::Empty);
                return;
            }
            Err(err) => {
                log::warn!("chunk {} generation failed: {}", key, err);
                self.registry.remove(key);
                return;
            }
        };
        if let Err(err) = payload.validate() {
            log::warn!("chunk {} produced a bad payload: {}", key, err);
            self.registry.remove(key);
            return;
        }
        if payload.is_empty() {
            self.registry.set_state(key, ChunkState::Empty);
            return;
        }

        let binding = {
            let mut allocator = self.allocator.lock().unwrap();
            let binding = match allocator.alloc(
                payload.vertex_count(),
                payload.index_count(),
                payload.bounds(),
            ) {
                Ok(binding) => binding,
                Err(err) => {
                    log::error!("chunk {} allocation failed: {}", key, err);
                    self.registry.remove(key);
                    return;
                }
            };
            if let Err(err) = Self::write_payload(&mut allocator, &binding, &payload) {
                log::error!("chunk {} buffer write failed: {}", key, err);
                let _ = allocator.free(&binding);
                allocator.recompute_draw_groups();
                self.registry.remove(key);
                return;
            }
            allocator.recompute_draw_groups();
            binding
        };
        self.registry.set_binding(key, binding.clone());
        self.registry.set_state(key, ChunkState::MeshAllocated);

        // from here on the binding is owned by the token's release chain
        let allocator = Arc::clone(&self.allocator);
        token.on_cancel(move || {
            let mut allocator = allocator.lock().unwrap();
            if let Err(err) = allocator.free(&binding) {
                log::error!("release of chunk {} geometry failed: {}", key, err);
            }
            allocator.recompute_draw_groups();
        });

        let cooker = Arc::clone(&self.cooker);
        let events = self.events_tx.clone();
        let cook_token = token.clone();
        let mesh = payload.triangle_mesh();
        self.registry.set_state(key, ChunkState::PhysicsPending);
        self.in_flight += 1;
        self.handle.spawn(async move {
            let result = cooker.cook(mesh, cook_token.clone()).await;
            let _ = events.send(PipelineEvent::CookReady {
                key,
                token: cook_token,
                result,
            });
        });
    }

    /// Continuation of the cooking stage, on the coordinating context
    fn handle_cook_ready(
        &mut self,
        key: ChunkKey,
        token: CancellationToken,
        result: Result<CookedBuffer>,
    ) {
        if token.is_cancelled() {
            // the release chain already freed the chunk's geometry; a cook
            // result that arrived after disposal must never register, or
            // the collision object would outlive its chunk
            log::debug!("discarding late cook result for cancelled chunk {}", key);
            return;
        }
        let buffer = match result {
            Ok(buffer) => buffer,
            Err(Error::Aborted) => {
                log::debug!("chunk {} cook aborted", key);
                return;
            }
            Err(err) => {
                // the chunk keeps its mesh but never reaches Active
                log::warn!("chunk {} cook failed: {}", key, err);
                return;
            }
        };

        let handle = self.world.add_cooked_geometry(
            buffer,
            self.config.position,
            self.config.rotation,
            self.config.scale,
        );
        self.physics_objects.lock().unwrap().push(handle);
        self.registry.set_physics(key, handle);
        self.registry.set_state(key, ChunkState::Active);
        log::debug!("chunk {} active (physics {:?})", key, handle);

        let world = Arc::clone(&self.world);
        let objects = Arc::clone(&self.physics_objects);
        token.on_cancel(move || {
            world.remove_geometry(handle);
            objects.lock().unwrap().retain(|h| *h != handle);
        });
    }

    /// Write every payload attribute plus the remapped indices
    fn write_payload(
        allocator: &mut GeometryAllocator,
        binding: &GeometryBinding,
        payload: &MeshPayload,
    ) -> Result<()> {
        allocator.write_attribute(binding, ATTR_POSITION, &payload.positions)?;
        allocator.write_attribute(binding, ATTR_NORMAL, &payload.normals)?;
        allocator.write_attribute(binding, ATTR_BIOMES, &payload.biomes)?;
        allocator.write_attribute(binding, ATTR_BIOME_WEIGHTS, &payload.biome_weights)?;
        allocator.write_indices(binding, &payload.indices)?;
        Ok(())
    }
}

impl<G, C, W> Drop for TerrainStreamer<G, C, W> {
    fn drop(&mut self) {
        for (_, entry) in self.registry.drain() {
            entry.token().cancel("streamer dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Semaphore;

    use crate::geometry::DrawGroup;
    use crate::streaming::chunk::ChunkCoord;
    use crate::terrain::mesh::TriangleMesh;

    fn quad_payload() -> MeshPayload {
        MeshPayload {
            positions: vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0,
            ],
            normals: [0.0f32, 1.0, 0.0].repeat(4),
            biomes: vec![2; 16],
            biome_weights: [1.0f32, 0.0, 0.0, 0.0].repeat(4),
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    fn key(x: i32) -> ChunkKey {
        ChunkKey::new(ChunkCoord::new(x, 0, 0), 0)
    }

    /// Generator returning a fixed payload, optionally gated on a semaphore
    struct StaticGenerator {
        payload: Option<MeshPayload>,
        gate: Option<Arc<Semaphore>>,
        erased: Mutex<Vec<(Vec3, f32)>>,
    }

    impl StaticGenerator {
        fn immediate(payload: Option<MeshPayload>) -> Self {
            Self {
                payload,
                gate: None,
                erased: Mutex::new(Vec::new()),
            }
        }

        fn gated(payload: Option<MeshPayload>, gate: Arc<Semaphore>) -> Self {
            Self {
                payload,
                gate: Some(gate),
                erased: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChunkGenerator for StaticGenerator {
        async fn generate(&self, _key: ChunkKey) -> Result<Option<MeshPayload>> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            Ok(self.payload.clone())
        }

        fn erase_sphere(&self, center: Vec3, radius: f32) {
            self.erased.lock().unwrap().push((center, radius));
        }
    }

    enum CookMode {
        Succeed,
        Abort,
        Fail,
    }

    /// Cooker with a configurable outcome, optionally gated on a semaphore.
    /// Deliberately ignores the token so tests can deliver late results.
    struct MockCooker {
        gate: Option<Arc<Semaphore>>,
        mode: CookMode,
    }

    impl PhysicsCooker for MockCooker {
        async fn cook(
            &self,
            _mesh: TriangleMesh,
            _token: CancellationToken,
        ) -> Result<CookedBuffer> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            match self.mode {
                CookMode::Succeed => Ok(CookedBuffer(vec![0xC0, 0x0C])),
                CookMode::Abort => Err(Error::Aborted),
                CookMode::Fail => Err(Error::Cooking("mock cooker failure".into())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingWorld {
        next: AtomicU64,
        added: Mutex<Vec<PhysicsHandle>>,
        removed: Mutex<Vec<PhysicsHandle>>,
    }

    impl PhysicsWorld for RecordingWorld {
        fn add_cooked_geometry(
            &self,
            _buffer: CookedBuffer,
            _position: Vec3,
            _rotation: Quat,
            _scale: Vec3,
        ) -> PhysicsHandle {
            let handle = PhysicsHandle(self.next.fetch_add(1, Ordering::Relaxed));
            self.added.lock().unwrap().push(handle);
            handle
        }

        fn remove_geometry(&self, handle: PhysicsHandle) {
            self.removed.lock().unwrap().push(handle);
        }
    }

    fn streamer(
        generator: StaticGenerator,
        cooker: MockCooker,
    ) -> (
        TerrainStreamer<StaticGenerator, MockCooker, RecordingWorld>,
        Arc<RecordingWorld>,
    ) {
        let world = Arc::new(RecordingWorld::default());
        let streamer = TerrainStreamer::new_with_current_runtime(
            StreamerConfig::default(),
            Arc::new(generator),
            Arc::new(cooker),
            Arc::clone(&world),
        );
        (streamer, world)
    }

    #[tokio::test]
    async fn test_chunk_lifecycle() {
        let cook_gate = Arc::new(Semaphore::new(0));
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: Some(Arc::clone(&cook_gate)),
                mode: CookMode::Succeed,
            },
        );

        let key = key(0);
        assert!(streamer.generate(key));
        assert_eq!(streamer.chunk_state(key), Some(ChunkState::Generating));

        // mesh result: geometry allocated and written, cook in flight
        assert!(streamer.pump_one().await);
        assert_eq!(streamer.chunk_state(key), Some(ChunkState::PhysicsPending));
        {
            let allocator = streamer.allocator().lock().unwrap();
            assert_eq!(allocator.stats().live_bindings, 1);
            assert_eq!(
                allocator.draw_groups(),
                &[DrawGroup { start: 0, count: 6 }]
            );
            // mesh-local indices were remapped into the shared vertex space
            assert_eq!(&allocator.indices()[..6], &[0, 1, 2, 0, 2, 3]);
        }

        cook_gate.add_permits(1);
        assert!(streamer.pump_one().await);
        assert_eq!(streamer.chunk_state(key), Some(ChunkState::Active));
        assert_eq!(world.added.lock().unwrap().len(), 1);
        assert_eq!(streamer.active_physics_objects().len(), 1);

        streamer.dispose(key);
        assert_eq!(streamer.chunk_state(key), None);
        assert!(streamer.active_physics_objects().is_empty());
        assert_eq!(world.removed.lock().unwrap().len(), 1);
        let allocator = streamer.allocator().lock().unwrap();
        let stats = allocator.stats();
        assert_eq!(stats.live_bindings, 0);
        assert_eq!(stats.frees, 1);
        assert!(allocator.draw_groups().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_mesh_touches_nothing() {
        let gen_gate = Arc::new(Semaphore::new(0));
        let (mut streamer, world) = streamer(
            StaticGenerator::gated(Some(quad_payload()), Arc::clone(&gen_gate)),
            MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            },
        );

        let key = key(1);
        streamer.generate(key);
        streamer.dispose(key);

        gen_gate.add_permits(1);
        streamer.settle().await;

        let stats = streamer.allocator().lock().unwrap().stats();
        assert_eq!(stats.allocs, 0);
        assert_eq!(stats.frees, 0);
        assert!(world.added.lock().unwrap().is_empty());
        assert_eq!(streamer.tracked_chunks(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_mesh_discards_late_cook() {
        let cook_gate = Arc::new(Semaphore::new(0));
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: Some(Arc::clone(&cook_gate)),
                mode: CookMode::Succeed,
            },
        );

        let key = key(2);
        streamer.generate(key);
        assert!(streamer.pump_one().await);
        assert_eq!(streamer.allocator().lock().unwrap().stats().allocs, 1);

        // dispose while the cook is suspended: the release chain frees the
        // geometry immediately
        streamer.dispose(key);
        {
            let allocator = streamer.allocator().lock().unwrap();
            assert_eq!(allocator.stats().frees, 1);
            assert_eq!(allocator.stats().live_bindings, 0);
            assert!(allocator.draw_groups().is_empty());
        }

        // the cook completes successfully afterwards; its result must be
        // discarded, never registered
        cook_gate.add_permits(1);
        streamer.settle().await;

        assert!(world.added.lock().unwrap().is_empty());
        assert!(streamer.active_physics_objects().is_empty());
        assert_eq!(streamer.allocator().lock().unwrap().stats().frees, 1);
    }

    #[tokio::test]
    async fn test_empty_chunk_is_terminal() {
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(None),
            MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            },
        );

        let key = key(3);
        streamer.generate(key);
        streamer.settle().await;

        assert_eq!(streamer.chunk_state(key), Some(ChunkState::Empty));
        let stats = streamer.allocator().lock().unwrap().stats();
        assert_eq!(stats.allocs, 0);
        assert!(world.added.lock().unwrap().is_empty());

        // disposing an empty chunk is clean
        streamer.dispose(key);
        assert_eq!(streamer.chunk_state(key), None);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            },
        );

        // unknown chunk: no effect
        streamer.dispose(key(9));

        let key = key(4);
        streamer.generate(key);
        streamer.settle().await;
        assert_eq!(streamer.chunk_state(key), Some(ChunkState::Active));

        streamer.dispose(key);
        streamer.dispose(key);

        assert_eq!(world.removed.lock().unwrap().len(), 1);
        assert_eq!(streamer.allocator().lock().unwrap().stats().frees, 1);
    }

    #[tokio::test]
    async fn test_duplicate_generate_rejected() {
        let (mut streamer, _world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            },
        );

        let key = key(5);
        assert!(streamer.generate(key));
        assert!(!streamer.generate(key));
        streamer.settle().await;

        assert_eq!(streamer.allocator().lock().unwrap().stats().allocs, 1);
    }

    #[tokio::test]
    async fn test_cook_abort_is_swallowed() {
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: None,
                mode: CookMode::Abort,
            },
        );

        let key = key(6);
        streamer.generate(key);
        streamer.settle().await;

        // mesh stays allocated, physics never registered
        assert_eq!(streamer.chunk_state(key), Some(ChunkState::PhysicsPending));
        assert!(world.added.lock().unwrap().is_empty());
        assert_eq!(streamer.allocator().lock().unwrap().stats().live_bindings, 1);
    }

    #[tokio::test]
    async fn test_cook_failure_never_reaches_active() {
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: None,
                mode: CookMode::Fail,
            },
        );

        let key = key(7);
        streamer.generate(key);
        streamer.settle().await;

        assert_eq!(streamer.chunk_state(key), Some(ChunkState::PhysicsPending));
        assert!(world.added.lock().unwrap().is_empty());

        // disposal still frees the mesh exactly once
        streamer.dispose(key);
        let stats = streamer.allocator().lock().unwrap().stats();
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.live_bindings, 0);
    }

    #[tokio::test]
    async fn test_out_of_space_surfaces_and_rolls_back() {
        // 8 bytes per stream: 2 scalars, far too small for the quad
        let world = Arc::new(RecordingWorld::default());
        let mut streamer = TerrainStreamer::new_with_current_runtime(
            StreamerConfig {
                buffer: BufferConfig::terrain_surface(8),
                ..StreamerConfig::default()
            },
            Arc::new(StaticGenerator::immediate(Some(quad_payload()))),
            Arc::new(MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            }),
            Arc::clone(&world),
        );

        let key = key(8);
        streamer.generate(key);
        streamer.settle().await;

        assert_eq!(streamer.chunk_state(key), None);
        let allocator = streamer.allocator().lock().unwrap();
        assert_eq!(allocator.stats().failed_allocs, 1);
        for stream in allocator.stream_stats() {
            assert_eq!(stream.live, 0);
        }
    }

    #[tokio::test]
    async fn test_hit_forwards_to_generator() {
        let generator = Arc::new(StaticGenerator::immediate(None));
        let streamer = TerrainStreamer::new_with_current_runtime(
            StreamerConfig::default(),
            Arc::clone(&generator),
            Arc::new(MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            }),
            Arc::new(RecordingWorld::default()),
        );

        streamer.hit(Vec3::new(4.0, 5.0, 6.0), 3.0);
        let erased = generator.erased.lock().unwrap();
        assert_eq!(erased.as_slice(), &[(Vec3::new(4.0, 5.0, 6.0), 3.0)]);
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let (mut streamer, world) = streamer(
            StaticGenerator::immediate(Some(quad_payload())),
            MockCooker {
                gate: None,
                mode: CookMode::Succeed,
            },
        );

        for x in 0..3 {
            streamer.generate(key(10 + x));
        }
        streamer.settle().await;
        assert_eq!(streamer.active_physics_objects().len(), 3);

        streamer.shutdown();
        assert_eq!(streamer.tracked_chunks(), 0);
        assert!(streamer.active_physics_objects().is_empty());
        assert_eq!(world.removed.lock().unwrap().len(), 3);
        let stats = streamer.allocator().lock().unwrap().stats();
        assert_eq!(stats.frees, 3);
        assert_eq!(stats.live_bindings, 0);
    }
}
