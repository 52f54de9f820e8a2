//! End-to-end exercises of [`ModelSystem`] against an in-memory mock of
//! the renderer surface (§4.9, §5, §6) — acquire/finish_load/release and
//! the per-frame update/publish pair.

use std::cell::RefCell;
use std::rc::Rc;

use kohi_core::codec::{Bone, MeshType, ModelAsset, Node, Submesh, NO_PARENT};
use kohi_core::handle::INVALID_ID;
use kohi_core::math::Vec3;
use kohi_core::renderer::{FrameWorkload, RenderBackend, RenderBufferFlags, RenderBufferType};
use kohi_core::{ModelSystem, ModelSystemConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferHandle(usize);

struct MockBuffer {
    data: Vec<u8>,
    watermark: u64,
    mapped: bool,
}

#[derive(Default)]
struct MockBackend {
    buffers: Vec<MockBuffer>,
}

impl RenderBackend for MockBackend {
    type Handle = BufferHandle;

    fn renderbuffer_create(
        &mut self,
        _name: &str,
        _ty: RenderBufferType,
        size: u64,
        flags: RenderBufferFlags,
    ) -> Result<Self::Handle, kohi_core::RuntimeError> {
        self.buffers.push(MockBuffer {
            data: vec![0u8; size as usize],
            watermark: 0,
            mapped: flags.contains(RenderBufferFlags::MAPPED),
        });
        Ok(BufferHandle(self.buffers.len() - 1))
    }

    fn renderbuffer_allocate(&mut self, handle: Self::Handle, size: u64) -> Result<u64, kohi_core::RuntimeError> {
        let buf = &mut self.buffers[handle.0];
        let offset = buf.watermark;
        if offset + size > buf.data.len() as u64 {
            return Err(kohi_core::RuntimeError::BackendAllocationFailed {
                detail: "mock buffer exhausted".to_string(),
            });
        }
        buf.watermark += size;
        Ok(offset)
    }

    fn renderbuffer_free(&mut self, _handle: Self::Handle, _size: u64, _offset: u64) {
        // Bump allocator with no reclamation; sufficient for these tests.
    }

    fn renderbuffer_load_range(
        &mut self,
        handle: Self::Handle,
        offset: u64,
        bytes: &[u8],
        _workload: FrameWorkload,
    ) -> Result<(), kohi_core::RuntimeError> {
        let buf = &mut self.buffers[handle.0];
        let start = offset as usize;
        buf.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn renderbuffer_mapped_memory_mut(&mut self, handle: Self::Handle) -> Option<&mut [u8]> {
        let buf = &mut self.buffers[handle.0];
        buf.mapped.then_some(buf.data.as_mut_slice())
    }

    fn renderbuffer_destroy(&mut self, _handle: Self::Handle) {}
}

fn new_system(backend: &mut MockBackend) -> ModelSystem<MockBackend> {
    let vertex_buffer = backend
        .renderbuffer_create("vertices", RenderBufferType::Vertex, 1 << 20, RenderBufferFlags::NONE)
        .unwrap();
    let index_buffer = backend
        .renderbuffer_create("indices", RenderBufferType::Index, 1 << 20, RenderBufferFlags::NONE)
        .unwrap();
    ModelSystem::new(backend, ModelSystemConfig::default(), vertex_buffer, index_buffer).unwrap()
}

fn static_cube_asset() -> ModelAsset {
    let mut asset = ModelAsset::default();
    asset.submeshes.push(Submesh {
        name: Some("cube".to_string()),
        material_name: Some("mat_cube".to_string()),
        mesh_type: MeshType::Static,
        vertex_count: 24,
        index_count: 36,
        center: Vec3::ZERO,
        extents_min: Vec3::ZERO,
        extents_max: Vec3::ZERO,
        vertex_data: vec![0u8; 24 * MeshType::Static.vertex_stride() as usize],
        index_data: vec![0u8; 36 * 4],
    });
    asset
}

fn animated_asset() -> ModelAsset {
    let mut asset = static_cube_asset();
    asset.submeshes[0].mesh_type = MeshType::Skinned;
    asset.submeshes[0].vertex_data = vec![0u8; 24 * MeshType::Skinned.vertex_stride() as usize];
    asset.bones.push(Bone {
        name: Some("root".to_string()),
        offset_matrix: kohi_core::math::Mat4::IDENTITY,
        id: 0,
    });
    asset.nodes.push(Node {
        name: Some("root".to_string()),
        local_transform: kohi_core::math::Mat4::IDENTITY,
        parent_index: NO_PARENT,
        children: vec![],
    });
    asset.animations.push(kohi_core::codec::Animation {
        name: Some("idle".to_string()),
        duration: 60.0,
        ticks_per_second: 30.0,
        channels: vec![],
    });
    asset
}

#[test]
fn acquire_before_load_queues_and_drains_on_finish_load() {
    let mut backend = MockBackend::default();
    let mut system = new_system(&mut backend);

    let fired = Rc::new(RefCell::new(None));
    let fired_clone = fired.clone();
    let (base_id, instance_id) = system.acquire("cube", "pkg", move |b, i| {
        *fired_clone.borrow_mut() = Some((b, i));
    });
    assert!(fired.borrow().is_none(), "callback must not fire before the load completes");

    let bytes = static_cube_asset().serialize();
    system.finish_load(&mut backend, base_id, &bytes);

    assert_eq!(*fired.borrow(), Some((base_id, instance_id)));
    assert_eq!(system.submesh_count(base_id), 1);
    assert!(system.submesh_geometry(base_id, 0).is_some());
}

#[test]
fn acquire_after_loaded_fires_immediately_and_shares_the_base() {
    let mut backend = MockBackend::default();
    let mut system = new_system(&mut backend);

    let (base_id, _) = system.acquire("cube", "pkg", |_, _| {});
    let bytes = static_cube_asset().serialize();
    system.finish_load(&mut backend, base_id, &bytes);

    let fired = Rc::new(RefCell::new(false));
    let fired_clone = fired.clone();
    let (second_base, _second_instance) = system.acquire("cube", "pkg", move |_, _| {
        *fired_clone.borrow_mut() = true;
    });

    assert_eq!(second_base, base_id);
    assert!(*fired.borrow(), "callback should fire immediately for an already-LOADED base");
}

#[test]
fn failed_load_invokes_queued_callbacks_with_invalid_sentinel() {
    let mut backend = MockBackend::default();
    let mut system = new_system(&mut backend);

    let fired = Rc::new(RefCell::new(None));
    let fired_clone = fired.clone();
    let (base_id, _) = system.acquire("broken", "pkg", move |b, i| {
        *fired_clone.borrow_mut() = Some((b, i));
    });

    let mut bad_bytes = static_cube_asset().serialize();
    bad_bytes[0] ^= 0xFF; // corrupt the magic
    system.finish_load(&mut backend, base_id, &bad_bytes);

    assert_eq!(*fired.borrow(), Some((INVALID_ID, INVALID_ID)));
}

#[test]
fn release_of_last_instance_frees_the_base_for_reacquire() {
    let mut backend = MockBackend::default();
    let mut system = new_system(&mut backend);

    let (base_id, instance_id) = system.acquire("cube", "pkg", |_, _| {});
    let bytes = static_cube_asset().serialize();
    system.finish_load(&mut backend, base_id, &bytes);

    system.release(&mut backend, base_id, instance_id);

    let (new_base_id, _new_instance_id) = system.acquire("cube", "pkg", |_, _| {});
    assert_eq!(system.submesh_count(new_base_id), 0, "freshly re-acquired base has not loaded yet");
}

#[test]
fn release_during_loading_cancels_the_queue_entry_without_invoking_callback() {
    let mut backend = MockBackend::default();
    let mut system = new_system(&mut backend);

    let fired = Rc::new(RefCell::new(false));
    let fired_clone = fired.clone();
    let (base_id, instance_id) = system.acquire("cube", "pkg", move |_, _| {
        *fired_clone.borrow_mut() = true;
    });

    system.release(&mut backend, base_id, instance_id);

    let bytes = static_cube_asset().serialize();
    system.finish_load(&mut backend, base_id, &bytes);

    assert!(!*fired.borrow(), "a released queue entry must never invoke its callback");
}

#[test]
fn animated_instance_updates_and_publishes_into_the_mapped_ssbo() {
    let mut backend = MockBackend::default();
    let mut system = new_system(&mut backend);

    let (base_id, instance_id) = system.acquire("guy", "pkg", |_, _| {});
    let bytes = animated_asset().serialize();
    system.finish_load(&mut backend, base_id, &bytes);

    system.set_animation(base_id, instance_id, "idle");
    system.play(base_id, instance_id);
    assert_ne!(system.animation_slot_id(base_id, instance_id), u32::from(INVALID_ID));

    system.update(1.0 / 30.0, 1.0);
    system.publish_frame(&mut backend);

    let slot = system.animation_slot_id(base_id, instance_id) as usize;
    let palette_size = std::mem::size_of::<kohi_core::skeleton::BonePalette>();
    let ssbo = backend
        .renderbuffer_mapped_memory_mut(BufferHandle(2))
        .expect("animations SSBO is the third buffer created (vertex, index, animations)");
    assert_eq!(ssbo.len(), system.config().max_instance_count * palette_size);
    // The published palette for this slot should not be all-zero: the
    // identity matrices the evaluator writes have non-zero diagonal bytes.
    let start = slot * palette_size;
    assert!(ssbo[start..start + palette_size].iter().any(|&b| b != 0));
}
