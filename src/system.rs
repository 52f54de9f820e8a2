//! The public model/animation system: acquire/release, geometry and
//! animation queries, and the per-frame update/publish pair (§6).
//!
//! Ties together the handle registry, the bone-palette pool, the
//! codec, geometry upload, the skeleton evaluator, and the animator,
//! per §2's dependency order and §9's "explicit state, no globals"
//! redesign note.

use crate::animator::Animator;
use crate::codec::{Animation, Bone, ModelAsset, Node, Submesh};
use crate::error::RuntimeError;
use crate::frame_publisher::{FramePublisher, ANIMATIONS_GLOBAL_BUFFER_NAME};
use crate::geometry::{self, SubmeshGeometry};
use crate::handle::{BaseState, HandleRegistry, INVALID_ID};
use crate::math::Mat4;
use crate::pool::PoolAllocator;
use crate::renderer::{RenderBackend, RenderBufferFlags, RenderBufferType};
use crate::skeleton::{self, BonePalette};

/// The one configurable knob the spec actually needs: pool/instance
/// capacity (§9's ambient config note — there is no config-file
/// subsystem upstream to imitate, so this is a plain struct).
#[derive(Debug, Clone, Copy)]
pub struct ModelSystemConfig {
    pub max_instance_count: usize,
}

impl Default for ModelSystemConfig {
    fn default() -> Self {
        ModelSystemConfig { max_instance_count: 256 }
    }
}

enum AssetKind {
    Static,
    Animated,
}

#[derive(Default)]
struct InstanceData {
    material_instances: Vec<u32>,
    animator: Option<Animator>,
}

struct ModelBase {
    kind: AssetKind,
    submeshes: Vec<Submesh>,
    geometry: Vec<Option<SubmeshGeometry>>,
    bones: Vec<Bone>,
    nodes: Vec<Node>,
    animations: Vec<Animation>,
    global_inverse_transform: Mat4,
    instances: Vec<Option<InstanceData>>,
}

impl Default for ModelBase {
    fn default() -> Self {
        ModelBase {
            kind: AssetKind::Static,
            submeshes: Vec::new(),
            geometry: Vec::new(),
            bones: Vec::new(),
            nodes: Vec::new(),
            animations: Vec::new(),
            global_inverse_transform: Mat4::IDENTITY,
            instances: Vec::new(),
        }
    }
}

struct QueueEntry {
    base_id: u16,
    instance_id: u16,
    on_loaded: Box<dyn FnOnce(u16, u16)>,
}

/// Top-level system state, passed by reference/handle through every
/// public operation rather than held as process-wide global state.
pub struct ModelSystem<B: RenderBackend> {
    config: ModelSystemConfig,
    registry: HandleRegistry,
    bases: Vec<ModelBase>,
    bone_pool: PoolAllocator<BonePalette>,
    frame_publisher: FramePublisher<B::Handle>,
    vertex_buffer: B::Handle,
    index_buffer: B::Handle,
    queue: Vec<QueueEntry>,
}

impl<B: RenderBackend> ModelSystem<B> {
    /// Creates the animations SSBO (owned by the system for its
    /// lifetime, per §9) and wires up the pool allocator at
    /// `config.max_instance_count` capacity.
    pub fn new(
        backend: &mut B,
        config: ModelSystemConfig,
        vertex_buffer: B::Handle,
        index_buffer: B::Handle,
    ) -> Result<Self, RuntimeError> {
        let capacity_bytes = config.max_instance_count as u64 * std::mem::size_of::<BonePalette>() as u64;
        let animations_buffer = backend.renderbuffer_create(
            ANIMATIONS_GLOBAL_BUFFER_NAME,
            RenderBufferType::Storage,
            capacity_bytes,
            RenderBufferFlags::MAPPED,
        )?;

        Ok(ModelSystem {
            config,
            registry: HandleRegistry::new(),
            bases: Vec::new(),
            bone_pool: PoolAllocator::new(config.max_instance_count),
            frame_publisher: FramePublisher::new(animations_buffer),
            vertex_buffer,
            index_buffer,
            queue: Vec::new(),
        })
    }

    pub fn shutdown(&mut self, backend: &mut B) {
        backend.renderbuffer_destroy(self.frame_publisher.handle());
    }

    /// Acquires a base/instance pair for `(asset_name, package_name)`.
    /// If the base is already `LOADED`, `on_loaded` fires immediately;
    /// otherwise the request is queued and drained in FIFO order by
    /// [`Self::finish_load`] (§5's ordering guarantees — the instance
    /// id is always returned, queued or not).
    pub fn acquire(
        &mut self,
        asset_name: &str,
        package_name: &str,
        on_loaded: impl FnOnce(u16, u16) + 'static,
    ) -> (u16, u16) {
        let (base_id, existed) = self.registry.get_base_id(asset_name, package_name);
        if !existed && base_id as usize == self.bases.len() {
            self.bases.push(ModelBase::default());
        }

        let instance_id = self.registry.get_new_instance_id(base_id);
        self.ensure_instance_slot(base_id, instance_id);

        if self.registry.base_state(base_id) == BaseState::Loaded {
            self.attach_animator_if_needed(base_id, instance_id);
            on_loaded(base_id, instance_id);
        } else {
            if self.registry.base_state(base_id) == BaseState::Acquired {
                self.registry.set_base_state(base_id, BaseState::Loading);
            }
            self.queue.push(QueueEntry {
                base_id,
                instance_id,
                on_loaded: Box::new(on_loaded),
            });
        }

        (base_id, instance_id)
    }

    /// Alias for [`Self::acquire`] — the spec's capability sketch lists
    /// a package-qualified entry point with identical semantics.
    pub fn acquire_from_package(
        &mut self,
        asset_name: &str,
        package_name: &str,
        on_loaded: impl FnOnce(u16, u16) + 'static,
    ) -> (u16, u16) {
        self.acquire(asset_name, package_name, on_loaded)
    }

    /// Feeds the bytes a completed async load produced (the
    /// filesystem/package dispatch itself is the out-of-scope
    /// collaborator per §1). Decodes, uploads geometry, transitions the
    /// base to `LOADED`, and drains its queue entries.
    pub fn finish_load(&mut self, backend: &mut B, base_id: u16, data: &[u8]) {
        match ModelAsset::deserialize(data) {
            Ok(asset) => self.populate_base(backend, base_id, asset),
            Err(error) => {
                tracing::error!(base_id, %error, "model asset load failed");
                self.fail_queue_for_base(base_id);
            }
        }
    }

    fn populate_base(&mut self, backend: &mut B, base_id: u16, asset: ModelAsset) {
        let uploaded = geometry::upload_submeshes(backend, self.vertex_buffer, self.index_buffer, &asset.submeshes);
        let mut geometry_slots = vec![None; asset.submeshes.len()];
        for (index, geometry) in uploaded {
            geometry_slots[index] = Some(geometry);
        }

        let kind = if asset.bones.is_empty() && asset.animations.is_empty() {
            AssetKind::Static
        } else {
            AssetKind::Animated
        };

        let instances = std::mem::take(&mut self.bases[base_id as usize].instances);
        self.bases[base_id as usize] = ModelBase {
            kind,
            submeshes: asset.submeshes,
            geometry: geometry_slots,
            bones: asset.bones,
            nodes: asset.nodes,
            animations: asset.animations,
            global_inverse_transform: asset.inverse_global_transform,
            instances,
        };

        self.registry.set_base_state(base_id, BaseState::Loaded);

        let (for_base, remaining) = partition_queue(std::mem::take(&mut self.queue), base_id);
        self.queue = remaining;
        for entry in for_base {
            self.attach_animator_if_needed(entry.base_id, entry.instance_id);
            (entry.on_loaded)(entry.base_id, entry.instance_id);
        }
    }

    /// Per §7: `InvalidAsset` aborts the load, leaves the base
    /// `ACQUIRED` (not `LOADED`), and fails every queued entry with an
    /// invalid instance sentinel (the Open Question resolution
    /// recorded in `DESIGN.md`).
    fn fail_queue_for_base(&mut self, base_id: u16) {
        self.registry.set_base_state(base_id, BaseState::Acquired);
        let (failed, remaining) = partition_queue(std::mem::take(&mut self.queue), base_id);
        self.queue = remaining;
        for entry in failed {
            (entry.on_loaded)(INVALID_ID, INVALID_ID);
        }
    }

    fn ensure_instance_slot(&mut self, base_id: u16, instance_id: u16) {
        let instances = &mut self.bases[base_id as usize].instances;
        if instances.len() <= instance_id as usize {
            instances.resize_with(instance_id as usize + 1, || None);
        }
        if instances[instance_id as usize].is_none() {
            instances[instance_id as usize] = Some(InstanceData::default());
        }
    }

    fn attach_animator_if_needed(&mut self, base_id: u16, instance_id: u16) {
        let base = &mut self.bases[base_id as usize];
        if !matches!(base.kind, AssetKind::Animated) {
            return;
        }
        let Some(Some(instance)) = base.instances.get_mut(instance_id as usize) else {
            return;
        };
        if instance.animator.is_some() {
            return;
        }
        match self.bone_pool.allocate() {
            Ok(slot) => {
                *self.bone_pool.get_mut(slot) = BonePalette::default();
                instance.animator = Some(Animator::new(base_id, slot));
            }
            Err(error) => {
                tracing::error!(base_id, instance_id, %error, "bone palette pool exhausted");
            }
        }
    }

    /// Releases an instance. If it was the base's last live instance,
    /// its geometry is freed and the base slot returns to
    /// `UNINITIALIZED` (§4.4, invariant 8).
    pub fn release(&mut self, backend: &mut B, base_id: u16, instance_id: u16) {
        if let Some(Some(instance)) = self.bases[base_id as usize].instances.get_mut(instance_id as usize) {
            if let Some(animator) = instance.animator.take() {
                self.bone_pool.free(animator.shader_data_index);
            }
        }
        if let Some(slot) = self.bases[base_id as usize].instances.get_mut(instance_id as usize) {
            *slot = None;
        }

        // Cancellation = release (§5): a queued entry for an
        // instance released while its base is still LOADING is
        // dropped silently, its callback never invoked.
        self.queue
            .retain(|entry| !(entry.base_id == base_id && entry.instance_id == instance_id));

        if self.registry.release_instance(base_id, instance_id) {
            self.unload_base(backend, base_id);
        }
    }

    fn unload_base(&mut self, backend: &mut B, base_id: u16) {
        let base = &mut self.bases[base_id as usize];
        for geometry in base.geometry.iter().flatten() {
            geometry::free_submesh(backend, self.vertex_buffer, self.index_buffer, geometry);
        }
        *base = ModelBase::default();
        self.registry.release_base(base_id);
    }

    pub fn submesh_count(&self, base_id: u16) -> u16 {
        self.bases[base_id as usize].submeshes.len() as u16
    }

    pub fn submesh_geometry(&self, base_id: u16, submesh_index: u16) -> Option<SubmeshGeometry> {
        match self.bases[base_id as usize].geometry.get(submesh_index as usize) {
            Some(Some(geometry)) => Some(*geometry),
            _ => {
                tracing::warn!(base_id, submesh_index, "submesh geometry not available");
                None
            }
        }
    }

    pub fn submesh_material(&self, base_id: u16, instance_id: u16, submesh_index: u16) -> Option<u32> {
        self.bases[base_id as usize]
            .instances
            .get(instance_id as usize)?
            .as_ref()?
            .material_instances
            .get(submesh_index as usize)
            .copied()
    }

    pub fn query_animations(&self, base_id: u16) -> Vec<&str> {
        self.bases[base_id as usize]
            .animations
            .iter()
            .filter_map(|animation| animation.name.as_deref())
            .collect()
    }

    pub fn set_animation(&mut self, base_id: u16, instance_id: u16, name: &str) {
        let base = &mut self.bases[base_id as usize];
        if let Some(Some(instance)) = base.instances.get_mut(instance_id as usize) {
            if let Some(animator) = instance.animator.as_mut() {
                animator.set_animation(name, &base.animations);
            }
        }
    }

    /// The pool index published to shaders, or `INVALID_ID` if the
    /// instance has no animator (static base, or not yet attached).
    pub fn animation_slot_id(&self, base_id: u16, instance_id: u16) -> u32 {
        self.animator(base_id, instance_id)
            .map(|animator| animator.shader_data_index)
            .unwrap_or(u32::from(INVALID_ID))
    }

    pub fn set_time_scale(&mut self, base_id: u16, instance_id: u16, scale: f32) {
        if let Some(animator) = self.animator_mut(base_id, instance_id) {
            animator.time_scale = scale;
        }
    }

    pub fn set_looping(&mut self, base_id: u16, instance_id: u16, looping: bool) {
        if let Some(animator) = self.animator_mut(base_id, instance_id) {
            animator.looping = looping;
        }
    }

    pub fn play(&mut self, base_id: u16, instance_id: u16) {
        if let Some(animator) = self.animator_mut(base_id, instance_id) {
            animator.play();
        }
    }

    pub fn pause(&mut self, base_id: u16, instance_id: u16) {
        if let Some(animator) = self.animator_mut(base_id, instance_id) {
            animator.pause();
        }
    }

    pub fn stop(&mut self, base_id: u16, instance_id: u16) {
        if let Some(animator) = self.animator_mut(base_id, instance_id) {
            animator.stop();
        }
    }

    pub fn seek_time(&mut self, base_id: u16, instance_id: u16, seconds: f32) {
        let base = &mut self.bases[base_id as usize];
        if let Some(Some(instance)) = base.instances.get_mut(instance_id as usize) {
            if let Some(animator) = instance.animator.as_mut() {
                animator.seek(seconds, &base.animations);
            }
        }
    }

    pub fn seek_percent(&mut self, base_id: u16, instance_id: u16, percent: f32) {
        let base = &mut self.bases[base_id as usize];
        if let Some(Some(instance)) = base.instances.get_mut(instance_id as usize) {
            if let Some(animator) = instance.animator.as_mut() {
                animator.seek_percent(percent, &base.animations);
            }
        }
    }

    fn animator(&self, base_id: u16, instance_id: u16) -> Option<&Animator> {
        self.bases[base_id as usize]
            .instances
            .get(instance_id as usize)?
            .as_ref()?
            .animator
            .as_ref()
    }

    fn animator_mut(&mut self, base_id: u16, instance_id: u16) -> Option<&mut Animator> {
        self.bases[base_id as usize]
            .instances
            .get_mut(instance_id as usize)?
            .as_mut()?
            .animator
            .as_mut()
    }

    /// Advances every animator, then re-evaluates the skeleton of every
    /// animated instance into its bone palette slot (§2's per-frame
    /// data flow, up to but not including the frame publish step).
    pub fn update(&mut self, dt_seconds: f32, global_time_scale: f32) {
        for base in &mut self.bases {
            for instance in base.instances.iter_mut().flatten() {
                if let Some(animator) = instance.animator.as_mut() {
                    animator.update(dt_seconds, global_time_scale, &base.animations);
                }
            }

            if !matches!(base.kind, AssetKind::Animated) {
                continue;
            }

            for instance in base.instances.iter().flatten() {
                let Some(animator) = instance.animator.as_ref() else {
                    continue;
                };
                let animation = animator
                    .current_animation_index
                    .and_then(|index| base.animations.get(index as usize));
                let palette = self.bone_pool.get_mut(animator.shader_data_index);
                *palette = BonePalette::default();
                skeleton::evaluate(
                    &base.nodes,
                    &base.bones,
                    animation,
                    animator.time_in_ticks,
                    base.global_inverse_transform,
                    palette,
                );
            }
        }
    }

    /// Bulk-copies the bone palette pool into the mapped animation
    /// SSBO. Must run between the renderer's `frame_prepare` and
    /// `frame_submit` (§5).
    pub fn publish_frame(&self, backend: &mut B) {
        self.frame_publisher.publish(backend, &self.bone_pool);
    }

    pub fn config(&self) -> ModelSystemConfig {
        self.config
    }
}

fn partition_queue(queue: Vec<QueueEntry>, base_id: u16) -> (Vec<QueueEntry>, Vec<QueueEntry>) {
    queue.into_iter().partition(|entry| entry.base_id == base_id)
}
