//! The renderer surface the model runtime consumes (§4.9).
//!
//! This is a contract, not an implementation: the concrete Vulkan (or
//! any other) backend lives outside this crate and is injected as a
//! [`RenderBackend`] implementation, matching §9's redesign note that
//! rules out process-wide global state in favor of explicit state
//! threaded by reference.

use crate::error::RuntimeError;

bitflags::bitflags! {
    /// Creation flags for [`RenderBackend::renderbuffer_create`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderBufferFlags: u32 {
        const NONE = 0;
        /// Request host-visible, persistently mapped memory.
        const MAPPED = 1 << 0;
    }
}

/// Whether an upload must land before the caller proceeds, or may be
/// deferred to a later point in the frame (§4.9's `frame_workload`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWorkload {
    MainThread,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderBufferType {
    Vertex,
    Index,
    Storage,
}

/// The narrow set of render-buffer operations the core needs,
/// regardless of backend (§4.9).
pub trait RenderBackend {
    type Handle: Copy + Eq + std::fmt::Debug;

    fn renderbuffer_create(
        &mut self,
        name: &str,
        ty: RenderBufferType,
        size: u64,
        flags: RenderBufferFlags,
    ) -> Result<Self::Handle, RuntimeError>;

    /// Sub-allocates a contiguous range, returning its offset.
    fn renderbuffer_allocate(&mut self, handle: Self::Handle, size: u64) -> Result<u64, RuntimeError>;

    /// Returns a size-matched range to the buffer's free pool.
    fn renderbuffer_free(&mut self, handle: Self::Handle, size: u64, offset: u64);

    fn renderbuffer_load_range(
        &mut self,
        handle: Self::Handle,
        offset: u64,
        bytes: &[u8],
        workload: FrameWorkload,
    ) -> Result<(), RuntimeError>;

    /// A host-visible view of an auto-mapped buffer, stable for the
    /// buffer's lifetime. `None` if the buffer was not created with
    /// [`RenderBufferFlags::MAPPED`].
    fn renderbuffer_mapped_memory_mut(&mut self, handle: Self::Handle) -> Option<&mut [u8]>;

    fn renderbuffer_destroy(&mut self, handle: Self::Handle);
}
