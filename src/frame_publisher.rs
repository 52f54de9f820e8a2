//! Bulk-copies the pool allocator's bone palette array into the
//! renderer-mapped animation SSBO, once per frame (§4.8).

use crate::pool::PoolAllocator;
use crate::renderer::RenderBackend;
use crate::skeleton::BonePalette;

/// The storage buffer name every instance's `shader_data_index`
/// indexes into (§3, §6).
pub const ANIMATIONS_GLOBAL_BUFFER_NAME: &str = "Kohi.StorageBuffer.AnimationsGlobal";

pub struct FramePublisher<H> {
    buffer: H,
}

impl<H: Copy> FramePublisher<H> {
    pub fn new(buffer: H) -> Self {
        FramePublisher { buffer }
    }

    pub fn handle(&self) -> H {
        self.buffer
    }

    /// Copies every bone palette — free slots included, since their
    /// contents are inert identity matrices — into the mapped region.
    /// Does nothing but log if the buffer is not currently mapped.
    pub fn publish<B: RenderBackend<Handle = H>>(&self, backend: &mut B, pool: &PoolAllocator<BonePalette>) {
        let Some(mapped) = backend.renderbuffer_mapped_memory_mut(self.buffer) else {
            tracing::error!("animation SSBO is not mapped, skipping frame publish");
            return;
        };
        let src: &[u8] = bytemuck::cast_slice(pool.backing_slice());
        let len = src.len().min(mapped.len());
        mapped[..len].copy_from_slice(&src[..len]);
    }
}
